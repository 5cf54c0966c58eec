//! Shared vocabulary of the Delphi semantic engine.
//!
//! Everything the parser, the unit registry and the resolver exchange lives
//! here: source spans, case-insensitive names, arena handles, declaration and
//! type entries, per-node facts, directive snapshots and the error hierarchy.

pub mod directives;
pub mod entries;
pub mod error;
pub mod facts;
pub mod fingerprint;
mod ids;
mod qualified_name;
mod span;
mod visibility;

pub use directives::{DirectiveSnapshot, DirectiveTable, DirectiveValue};
pub use entries::*;
pub use error::{
    AnalysisError, ErrorCategory, InvalidConfiguration, LexError, ParseError, ParseErrorKind,
    ParseErrors, SemanticError,
};
pub use facts::{OverloadOutcome, Reference, SectionSet, UnitFacts};
pub use fingerprint::{Fingerprint, FingerprintBuilder};
pub use ids::{DeclId, DeclRef, NodeId, ScopeId, TypeId, TypeRef, UnitId};
pub use qualified_name::{Name, QualifiedName};
pub use span::Span;
pub use visibility::Visibility;
