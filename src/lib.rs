//! Semantic analysis for Delphi units.
//!
//! Feeds parsed units through the resolver and exposes the resolved program
//! to checks: declarations, static types, overload outcomes, dispatch
//! targets, usage, imports and compiler directive state.
//!
//! The workspace is split into:
//!
//! - [`core`]: spans, names, handles, declaration and type entries, errors
//! - [`parser`]: the syntax tree boundary and the reference parser
//! - [`registry`]: units, the unit registry, `System` and the import graph
//! - [`sema`]: the resolver and the [`ProgramFacts`] query surface
//!
//! Most callers only need [`Project`].

mod project;

pub use delphi_core as core;
pub use delphi_parser as parser;
pub use delphi_registry as registry;
pub use delphi_sema as sema;

pub use project::{Project, ProjectError, ResolvedProgram};

pub use delphi_core::{
    AnalysisError, DeclRef, Declaration, DirectiveValue, NodeId, OverloadOutcome, SectionSet,
    SemanticError, TypeRef, UnitId, Visibility,
};
pub use delphi_registry::{UnitOrigin, known};
pub use delphi_sema::{Argument, DeclarationPattern, ProgramFacts, ProgramView, ResolveOptions};

/// Common imports for checks.
pub mod prelude {
    pub use crate::project::{Project, ProjectError, ResolvedProgram};
    pub use delphi_core::{
        DeclKind, DeclRef, Declaration, NodeId, OverloadOutcome, SemanticError, TypeKind, TypeRef,
        UnitId,
    };
    pub use delphi_registry::{Unit, UnitOrigin, known};
    pub use delphi_sema::{Argument, DeclarationPattern, ProgramFacts, ProgramView, ResolveOptions};
}
