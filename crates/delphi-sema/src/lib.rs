//! Delphi Semantic Resolution
//!
//! Turns parsed units plus the unit registry into a fully resolved program:
//! every identifier bound to a declaration, every expression typed, every
//! overloaded call bound to one candidate, every method call bound to its
//! dispatch target and every visibility and import rule evaluated.
//!
//! ## Architecture
//!
//! Each unit is resolved in two stages, interface first, by three passes:
//!
//! - **Registration**: declare types, constants, variables and routine headings
//! - **Completion**: effective member tables, overrides, property accessors
//! - **Compilation**: check routine bodies, `initialization` and `finalization`
//!
//! ## Modules
//!
//! - [`context`]: per-unit working state layered over published units
//! - [`scope`]: scope chain lookup
//! - [`types`], [`conversion`], [`operators`]: the type system
//! - [`type_resolver`], [`expr`], [`stmt`]: the declaration resolver
//! - [`overload`]: overload selection
//! - [`inheritance`]: dispatch, `inherited` and interface implementation
//! - [`usage`]: used declarations and imports
//! - [`directives`]: compiler directive sweep
//! - [`facts`]: the read-only query surface
//! - [`driver`]: resolution of a batch of units in dependency waves

pub mod const_eval;
pub mod context;
pub mod conversion;
pub mod directives;
pub mod driver;
pub mod expr;
mod expr_info;
pub mod facts;
pub mod inheritance;
pub mod operators;
pub mod options;
pub mod overload;
pub mod passes;
pub mod pattern;
pub mod scope;
pub mod stmt;
pub mod type_resolver;
pub mod types;
pub mod usage;
pub mod view;
pub mod visibility;

pub use context::{ResolveContext, Site};
pub use conversion::{Conversion, ConversionKind, find_conversion};
pub use driver::{SourceUnit, resolve_program};
pub use expr::ExprChecker;
pub use expr_info::ExprInfo;
pub use facts::ProgramFacts;
pub use options::ResolveOptions;
pub use overload::{Argument, OverloadMatch, select_overload};
pub use pattern::DeclarationPattern;
pub use stmt::StmtChecker;
pub use type_resolver::TypeResolver;
pub use usage::UsageIndex;
pub use view::{Program, ProgramView};

#[cfg(test)]
pub(crate) mod test_support {
    //! Helpers for resolving Pascal snippets in unit tests.

    use bumpalo::Bump;
    use delphi_core::{DeclRef, SemanticError, TypeRef};
    use delphi_parser::Parser;
    use delphi_registry::{UnitOrigin, UnitRegistry};

    use crate::driver::{SourceUnit, resolve_program};
    use crate::facts::ProgramFacts;
    use crate::options::ResolveOptions;
    use crate::view::ProgramView;

    /// Resolve several source units, in any order.
    pub fn resolve(sources: &[&str]) -> ProgramFacts {
        let arena = Bump::new();
        let parsed: Vec<_> = sources
            .iter()
            .map(|source| Parser::parse(source, &arena).unwrap_or_else(|e| panic!("parse failed: {e}\n{source}")))
            .collect();
        let units: Vec<_> = parsed
            .iter()
            .map(|p| SourceUnit::new(p, UnitOrigin::Source))
            .collect();
        resolve_program(&UnitRegistry::new(), &units, &ResolveOptions::new().with_parallel(false))
            .expect("resolution failed")
    }

    pub fn resolve_one(source: &str) -> ProgramFacts {
        resolve(&[source])
    }

    pub fn errors_of(facts: &ProgramFacts, unit: &str) -> Vec<SemanticError> {
        facts
            .unit(unit)
            .map(|u| u.errors.clone())
            .unwrap_or_else(|| panic!("no unit {unit}"))
    }

    /// Types recorded for nodes anchored on `line`, in column order.
    pub fn types_on_line(facts: &ProgramFacts, unit: &str, line: u32) -> Vec<TypeRef> {
        let unit = facts.unit(unit).unwrap_or_else(|| panic!("no unit {unit}"));
        let mut found: Vec<_> = unit
            .facts
            .types
            .iter()
            .filter_map(|(&node, &ty)| {
                let span = unit.anchor(node)?;
                (span.line == line).then_some((span.col, node, ty))
            })
            .collect();
        found.sort_by_key(|&(col, node, _)| (col, node));
        found.into_iter().map(|(_, _, ty)| ty).collect()
    }

    /// Declarations bound to nodes anchored on `line`, in column order.
    pub fn declarations_on_line(facts: &ProgramFacts, unit: &str, line: u32) -> Vec<DeclRef> {
        let unit = facts.unit(unit).unwrap_or_else(|| panic!("no unit {unit}"));
        let mut found: Vec<_> = unit
            .facts
            .declarations
            .iter()
            .filter_map(|(&node, &decl)| {
                let span = unit.anchor(node)?;
                (span.line == line).then_some((span.col, node, decl))
            })
            .collect();
        found.sort_by_key(|&(col, node, _)| (col, node));
        found.into_iter().map(|(_, _, decl)| decl).collect()
    }

    /// The declaration with qualified name `path`, e.g. `Shapes.TShape.Draw`.
    ///
    /// Panics when none or several match.
    pub fn decl_named(facts: &ProgramFacts, path: &str) -> DeclRef {
        let found: Vec<DeclRef> = facts
            .units()
            .flat_map(|unit| unit.declarations())
            .filter(|(_, d)| d.qualified_name.to_string().eq_ignore_ascii_case(path))
            .map(|(decl, _)| decl)
            .collect();
        match found.as_slice() {
            [only] => *only,
            [] => panic!("no declaration {path}"),
            _ => panic!("{} declarations named {path}", found.len()),
        }
    }

    pub fn type_named(facts: &ProgramFacts, path: &str) -> TypeRef {
        let decl = decl_named(facts, path);
        facts
            .decl(decl)
            .and_then(|d| d.kind.declared_type())
            .unwrap_or_else(|| panic!("{path} is not a type"))
    }
}
