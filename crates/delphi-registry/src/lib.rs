//! Unit registry for the Delphi semantic engine.
//!
//! Holds every resolved unit behind an `Arc`, the built-in `System` unit and
//! the `uses` graph between units.
//!
//! # Example
//!
//! ```
//! use delphi_registry::{UnitOrigin, UnitRegistry};
//!
//! let registry = UnitRegistry::new();
//! let id = registry.reserve("Shapes", UnitOrigin::Source).unwrap();
//! assert_eq!(registry.lookup("SHAPES"), Some(id));
//! assert!(registry.resolve_import("Missing").is_unresolved());
//! ```

mod import_graph;
mod registry;
pub mod system;
mod unit;

pub use import_graph::{ImportEdge, ImportGraph};
pub use registry::UnitRegistry;
pub use system::{build_system_unit, known};
pub use unit::{Import, Unit, UnitBuilder, UnitOrigin, UnitStage};
