//! Scope chain lookup.
//!
//! An unqualified name is searched in this order, first match wins:
//!
//! 1. the stored scopes from the innermost outwards (blocks, routine
//!    locals, the members of a method's `Self` type, type bodies, the
//!    implementation and interface sections)
//! 2. the interface sections of imported units, in search order
//! 3. `System`
//!
//! `with` subjects are searched by the expression checker before any of
//! this, since they are not stored scopes.

use delphi_core::{Name, ScopeId, ScopeKind, SymbolGroup, TypeRef, UnitId};

use crate::types::lookup_member;
use crate::view::ProgramView;

/// How a name was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Via {
    /// Declared in a stored scope of the current unit.
    Scope(ScopeId),
    /// A member of the enclosing method's or type body's type.
    Member(TypeRef),
    /// Exported by an imported unit.
    Import(UnitId),
    /// Declared by `System`.
    System,
}

/// A successful name lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub group: SymbolGroup,
    pub via: Via,
}

/// Resolve an unqualified name from `scope` of `unit`.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn lookup(
    view: &dyn ProgramView,
    unit: UnitId,
    scope: ScopeId,
    name: &str,
    imports: &[UnitId],
) -> Option<Lookup> {
    let key = Name::new(name);

    let mut current = Some(scope);
    while let Some(id) = current {
        let Some(data) = view.scope(unit, id) else {
            break;
        };
        if let Some(group) = data.symbols.get(&key) {
            return Some(Lookup {
                group: group.clone(),
                via: Via::Scope(id),
            });
        }
        let member_host = match data.kind {
            ScopeKind::Routine {
                self_type: Some(ty), ..
            } => Some(ty),
            ScopeKind::TypeBody(ty) => Some(ty),
            _ => None,
        };
        if let Some(ty) = member_host
            && let Some(group) = lookup_member(view, ty, name)
        {
            return Some(Lookup {
                group,
                via: Via::Member(ty),
            });
        }
        current = data.parent;
    }

    lookup_in_imports(view, name, imports)
}

/// Search the imported units and then `System`.
pub fn lookup_in_imports(view: &dyn ProgramView, name: &str, imports: &[UnitId]) -> Option<Lookup> {
    for &import in imports {
        if let Some(group) = view.unit(import).and_then(|u| u.lookup_interface(name)) {
            return Some(Lookup {
                group: group.clone(),
                via: Via::Import(import),
            });
        }
    }
    view.unit(UnitId::SYSTEM)
        .and_then(|u| u.lookup_interface(name))
        .map(|group| Lookup {
            group: group.clone(),
            via: Via::System,
        })
}

/// Look up a name exported by one specific unit.
pub fn lookup_in_unit(view: &dyn ProgramView, unit: UnitId, name: &str) -> Option<SymbolGroup> {
    view.unit(unit)
        .and_then(|u| u.lookup_interface(name))
        .cloned()
}

/// Longest prefix of `path` naming a unit visible from the current unit.
///
/// Candidates are the imports, the current unit itself and `System`. The
/// returned length counts path segments; at least one segment must remain
/// after the prefix.
pub fn match_unit_prefix(
    view: &dyn ProgramView,
    path: &[&str],
    current: UnitId,
    imports: &[UnitId],
) -> Option<(UnitId, usize)> {
    let candidates = imports
        .iter()
        .copied()
        .chain([current, UnitId::SYSTEM]);
    let mut best: Option<(UnitId, usize)> = None;
    for unit in candidates {
        let Some(u) = view.unit(unit) else {
            continue;
        };
        let segments: Vec<&str> = u.name.as_str().split('.').collect();
        if segments.len() >= path.len() {
            continue;
        }
        let matches = segments
            .iter()
            .zip(path)
            .all(|(a, b)| a.eq_ignore_ascii_case(b));
        if matches && best.is_none_or(|(_, len)| segments.len() > len) {
            best = Some((unit, segments.len()));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::Program;
    use delphi_core::{Constant, DeclKind, Declaration, QualifiedName};
    use delphi_registry::{Unit, UnitBuilder, UnitOrigin, UnitRegistry, UnitStage, known};

    fn constant(b: &mut UnitBuilder, scope: ScopeId, name: &str, ty: TypeRef) {
        let decl = Declaration::new(
            name,
            QualifiedName::from_dotted(&format!("{}.{name}", b.name())),
            DeclKind::Constant(Constant {
                ty,
                value: None,
                is_typed: false,
            }),
            b.id(),
            scope,
        );
        b.add_and_declare(scope, decl).unwrap();
    }

    /// `Strings` exports `Limit: Integer`; `Numbers` exports `Limit: Double`.
    fn program() -> (Program, UnitId, UnitId) {
        let registry = UnitRegistry::new();
        let strings = registry.reserve("Lib.Strings", UnitOrigin::Source).unwrap();
        let numbers = registry.reserve("Numbers", UnitOrigin::Source).unwrap();
        let mut a = UnitBuilder::new(strings, "Lib.Strings", UnitOrigin::Source);
        constant(&mut a, Unit::INTERFACE_SCOPE, "Limit", known::INTEGER);
        let mut b = UnitBuilder::new(numbers, "Numbers", UnitOrigin::Source);
        constant(&mut b, Unit::INTERFACE_SCOPE, "Limit", known::DOUBLE);
        constant(&mut b, Unit::IMPLEMENTATION_SCOPE, "Hidden", known::DOUBLE);
        registry.publish(a.finish(UnitStage::Interface)).unwrap();
        registry.publish(b.finish(UnitStage::Interface)).unwrap();
        (Program::snapshot(&registry), strings, numbers)
    }

    fn value_type(p: &Program, found: &Lookup) -> TypeRef {
        p.decl(found.group.decls[0]).unwrap().kind.value_type().unwrap()
    }

    #[test]
    fn first_import_in_search_order_wins() {
        let (p, strings, numbers) = program();
        let found = lookup_in_imports(&p, "limit", &[numbers, strings]).unwrap();
        assert_eq!(found.via, Via::Import(numbers));
        assert_eq!(value_type(&p, &found), known::DOUBLE);

        let found = lookup_in_imports(&p, "LIMIT", &[strings, numbers]).unwrap();
        assert_eq!(value_type(&p, &found), known::INTEGER);
    }

    #[test]
    fn implementation_names_are_not_exported() {
        let (p, _, numbers) = program();
        assert!(lookup_in_imports(&p, "Hidden", &[numbers]).is_none());
        assert!(lookup_in_unit(&p, numbers, "Hidden").is_none());
    }

    #[test]
    fn system_is_searched_last() {
        let (p, strings, _) = program();
        let found = lookup_in_imports(&p, "TObject", &[strings]).unwrap();
        assert_eq!(found.via, Via::System);
    }

    #[test]
    fn local_scopes_shadow_imports() {
        let (p, strings, numbers) = program();
        let found = lookup(&p, numbers, Unit::IMPLEMENTATION_SCOPE, "Limit", &[strings]).unwrap();
        assert_eq!(found.via, Via::Scope(Unit::INTERFACE_SCOPE));
        assert_eq!(value_type(&p, &found), known::DOUBLE);
    }

    #[test]
    fn longest_unit_prefix() {
        let (p, strings, numbers) = program();
        let path = ["Lib", "Strings", "Limit"];
        assert_eq!(match_unit_prefix(&p, &path, numbers, &[strings]), Some((strings, 2)));
        assert_eq!(match_unit_prefix(&p, &["Numbers", "Limit"], numbers, &[]), Some((numbers, 1)));
        assert_eq!(match_unit_prefix(&p, &["Lib", "Strings"], numbers, &[strings]), None);
        assert_eq!(match_unit_prefix(&p, &["System", "TObject"], numbers, &[]), Some((UnitId::SYSTEM, 1)));
    }
}
