//! Resolution passes over one unit.
//!
//! - [`registration`]: declare the types, constants, variables and routine
//!   headings of a section, with forward placeholders backfilled in place
//! - [`completion`]: build effective member tables base before derived,
//!   match overrides, property accessors and interface methods
//! - [`compilation`]: check routine bodies and the initialization and
//!   finalization blocks

pub mod compilation;
pub mod completion;
pub mod registration;

pub use compilation::{CompilationOutput, CompilationPass};
pub use completion::{CompletionOutput, TypeCompletionPass};
pub use registration::{RegistrationOutput, RegistrationPass};

use delphi_core::{DeclRef, ScopeId, Span, TypeRef};
use delphi_parser::ast::{PropertyDecl, RoutineDecl};

/// A routine implementation whose body is checked by the compilation pass.
#[derive(Debug, Clone, Copy)]
pub struct PendingBody<'ast> {
    /// The declaration the body implements.
    pub decl: DeclRef,
    pub routine: &'ast RoutineDecl<'ast>,
    /// Scope the routine scope nests in.
    pub parent: ScopeId,
    /// Class or record of a method.
    pub self_type: Option<TypeRef>,
}

/// A class or interface waiting for its effective member table.
#[derive(Debug, Clone, Copy)]
pub struct PendingType {
    pub ty: TypeRef,
    pub decl: DeclRef,
    /// Span of the type's name, where hierarchy diagnostics point.
    pub span: Span,
}

/// A property whose accessors are resolved once member tables are complete.
#[derive(Debug, Clone, Copy)]
pub struct PendingProperty<'ast> {
    pub decl: DeclRef,
    pub host: TypeRef,
    pub property: &'ast PropertyDecl<'ast>,
}
