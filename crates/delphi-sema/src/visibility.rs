//! Member visibility.
//!
//! | Visibility         | Reachable from                                   |
//! |--------------------|--------------------------------------------------|
//! | `strict private`   | the declaring type only                          |
//! | `private`          | the declaring unit                               |
//! | `strict protected` | the declaring type and its descendants           |
//! | `protected`        | the declaring unit, the type and its descendants |
//! | `public`           | everywhere                                       |
//! | `published`        | everywhere                                       |

use delphi_core::{Declaration, TypeRef, UnitId, Visibility};

use crate::types::{is_class_descendant, representation};
use crate::view::ProgramView;

/// Where an access happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessSite {
    pub unit: UnitId,
    /// Type whose body or method contains the access.
    pub enclosing: Option<TypeRef>,
}

/// Whether `decl` may be referenced from `site`.
///
/// Declarations without an owner are unit-level and always reachable once
/// lookup found them.
pub fn is_accessible(view: &dyn ProgramView, decl: &Declaration, site: &AccessSite) -> bool {
    let Some(owner) = decl.owner else {
        return true;
    };
    let same_unit = decl.unit == site.unit;
    let inside_owner = site
        .enclosing
        .is_some_and(|t| representation(view, t) == representation(view, owner));
    let inside_descendant = site
        .enclosing
        .is_some_and(|t| is_class_descendant(view, t, owner));

    match decl.visibility {
        Visibility::Public | Visibility::Published => true,
        Visibility::Private => same_unit,
        Visibility::StrictPrivate => inside_owner,
        Visibility::Protected => same_unit || inside_owner || inside_descendant,
        Visibility::StrictProtected => inside_owner || inside_descendant,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::Program;
    use delphi_core::{
        ClassType, DeclKind, Field, QualifiedName, ScopeKind, TypeEntry, TypeKind,
    };
    use delphi_registry::{Unit, UnitBuilder, UnitOrigin, UnitRegistry, UnitStage, known};

    fn field(owner: TypeRef, visibility: Visibility) -> Declaration {
        Declaration::new(
            "FValue",
            QualifiedName::from_dotted("Base.TBase.FValue"),
            DeclKind::Field(Field {
                ty: known::INTEGER,
                is_class_var: false,
            }),
            owner.unit,
            Unit::INTERFACE_SCOPE,
        )
        .with_owner(owner)
        .with_visibility(visibility)
    }

    /// `Base.TBase`, and `Derived.TDerived = class(TBase)` plus an unrelated `Derived.TOther`.
    fn program() -> (Program, TypeRef, TypeRef, TypeRef) {
        let registry = UnitRegistry::new();
        let base_id = registry.reserve("Base", UnitOrigin::Source).unwrap();
        let derived_id = registry.reserve("Derived", UnitOrigin::Source).unwrap();

        let mut base = UnitBuilder::new(base_id, "Base", UnitOrigin::Source);
        let scope = base.add_scope(ScopeKind::UnitInterface, None);
        let tbase = base.add_type(TypeEntry::named(
            "TBase",
            TypeKind::Class(ClassType::new(scope).with_ancestor(known::TOBJECT)),
        ));
        registry.publish(base.finish(UnitStage::Complete)).unwrap();

        let mut derived = UnitBuilder::new(derived_id, "Derived", UnitOrigin::Source);
        let scope = derived.add_scope(ScopeKind::UnitInterface, None);
        let tderived = derived.add_type(TypeEntry::named(
            "TDerived",
            TypeKind::Class(ClassType::new(scope).with_ancestor(tbase)),
        ));
        let tother = derived.add_type(TypeEntry::named(
            "TOther",
            TypeKind::Class(ClassType::new(scope).with_ancestor(known::TOBJECT)),
        ));
        registry.publish(derived.finish(UnitStage::Complete)).unwrap();

        (Program::snapshot(&registry), tbase, tderived, tother)
    }

    #[test]
    fn private_is_unit_wide_strict_private_is_not() {
        let (p, tbase, _, _) = program();
        let same_unit = AccessSite {
            unit: tbase.unit,
            enclosing: None,
        };
        assert!(is_accessible(&p, &field(tbase, Visibility::Private), &same_unit));
        assert!(!is_accessible(&p, &field(tbase, Visibility::StrictPrivate), &same_unit));

        let in_owner = AccessSite {
            unit: tbase.unit,
            enclosing: Some(tbase),
        };
        assert!(is_accessible(&p, &field(tbase, Visibility::StrictPrivate), &in_owner));
    }

    #[test]
    fn protected_reaches_descendants_in_other_units() {
        let (p, tbase, tderived, tother) = program();
        let in_descendant = AccessSite {
            unit: tderived.unit,
            enclosing: Some(tderived),
        };
        let in_stranger = AccessSite {
            unit: tother.unit,
            enclosing: Some(tother),
        };
        for visibility in [Visibility::Protected, Visibility::StrictProtected] {
            assert!(is_accessible(&p, &field(tbase, visibility), &in_descendant));
            assert!(!is_accessible(&p, &field(tbase, visibility), &in_stranger));
        }
        assert!(!is_accessible(&p, &field(tbase, Visibility::Private), &in_descendant));
        assert!(is_accessible(&p, &field(tbase, Visibility::Published), &in_stranger));
    }
}
