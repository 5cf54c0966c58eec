//! Reference conversions: `nil`, classes, interfaces, pointers, metaclasses
//! and procedural values.

use delphi_core::{ArrayShape, Signature, TypeKind, TypeRef};

use super::{Conversion, ConversionKind};
use crate::types::{class_distance, interface_distance, kind_of, same_type};
use crate::view::ProgramView;

/// Conversions between reference-like types.
///
/// Both types are canonical and distinct.
pub fn find_reference_conversion(
    view: &dyn ProgramView,
    from: TypeRef,
    to: TypeRef,
    _literal: bool,
) -> Option<Conversion> {
    let from_kind = kind_of(view, from);
    let to_kind = kind_of(view, to);

    match (from_kind, to_kind) {
        (TypeKind::Nil, target) if accepts_nil(target) => {
            Some(Conversion::implicit(ConversionKind::NilToReference, 0))
        }

        (TypeKind::Class(_), TypeKind::Class(_)) => Some(match class_distance(view, from, to) {
            Some(distance) => Conversion::implicit(ConversionKind::DerivedToBase { distance }, distance),
            None if class_distance(view, to, from).is_some() => Conversion::explicit(ConversionKind::Downcast),
            None => Conversion::explicit(ConversionKind::Reinterpret),
        }),
        (TypeKind::Class(_), TypeKind::Interface(_)) => Some(match interface_distance(view, from, to) {
            Some(distance) => Conversion::implicit(ConversionKind::ClassToInterface { distance }, distance),
            None => Conversion::explicit(ConversionKind::Downcast),
        }),
        (TypeKind::Interface(_), TypeKind::Interface(_)) => Some(match interface_distance(view, from, to) {
            Some(distance) => Conversion::implicit(ConversionKind::InterfaceToAncestor { distance }, distance),
            None => Conversion::explicit(ConversionKind::Downcast),
        }),
        (TypeKind::Interface(_), TypeKind::Class(_)) => Some(Conversion::explicit(ConversionKind::Downcast)),

        (TypeKind::Pointer(Some(_)), TypeKind::Pointer(None)) | (TypeKind::Pointer(None), TypeKind::Pointer(Some(_))) => {
            Some(Conversion::implicit(ConversionKind::PointerConversion, 1))
        }
        (TypeKind::Pointer(Some(a)), TypeKind::Pointer(Some(b))) => Some(if same_type(view, *a, *b) {
            Conversion::implicit(ConversionKind::PointerConversion, 0)
        } else {
            Conversion::explicit(ConversionKind::Reinterpret)
        }),

        (TypeKind::MetaClass(a), TypeKind::MetaClass(b)) => Some(match class_distance(view, *a, *b) {
            Some(distance) => Conversion::implicit(ConversionKind::MetaClassToAncestor { distance }, distance),
            None => Conversion::explicit(ConversionKind::Downcast),
        }),

        (TypeKind::Procedural(a), TypeKind::Procedural(b)) => {
            signatures_match(view, &a.signature, &b.signature)
                .then(|| Conversion::implicit(ConversionKind::Procedural, 0))
        }

        (a, b) if is_reinterpretable(a) && is_reinterpretable(b) => {
            Some(Conversion::explicit(ConversionKind::Reinterpret))
        }
        _ => None,
    }
}

fn accepts_nil(kind: &TypeKind) -> bool {
    match kind {
        TypeKind::Class(_)
        | TypeKind::Interface(_)
        | TypeKind::Pointer(_)
        | TypeKind::Procedural(_)
        | TypeKind::MetaClass(_) => true,
        TypeKind::Array(array) => array.shape == ArrayShape::Dynamic,
        _ => false,
    }
}

/// Types a hard cast may reinterpret as one another.
fn is_reinterpretable(kind: &TypeKind) -> bool {
    matches!(
        kind,
        TypeKind::Class(_)
            | TypeKind::Interface(_)
            | TypeKind::Pointer(_)
            | TypeKind::MetaClass(_)
            | TypeKind::Procedural(_)
            | TypeKind::Integer(_)
    )
}

/// Whether two signatures have the same parameter types, passing modes and result.
pub fn signatures_match(view: &dyn ProgramView, a: &Signature, b: &Signature) -> bool {
    a.params.len() == b.params.len()
        && a.params.iter().zip(&b.params).all(|(x, y)| {
            same_type(view, x.ty, y.ty) && x.flags.is_by_reference() == y.flags.is_by_reference()
        })
        && match (a.result, b.result) {
            (Some(x), Some(y)) => same_type(view, x, y),
            (None, None) => true,
            _ => false,
        }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::{find_conversion, is_assignable, is_explicit_cast_allowed};
    use crate::view::Program;
    use delphi_core::{ClassType, ScopeKind, TypeEntry, UnitId};
    use delphi_registry::{UnitBuilder, UnitOrigin, UnitRegistry, UnitStage, known};

    /// `TBase = class(TObject)`, `TChild = class(TBase)`, `TIntf = class(TInterfacedObject)`.
    fn hierarchy() -> Program {
        let registry = UnitRegistry::new();
        let id = registry.reserve("Shapes", UnitOrigin::Source).unwrap();
        let mut b = UnitBuilder::new(id, "Shapes", UnitOrigin::Source);
        let base_scope = b.add_scope(ScopeKind::UnitInterface, None);
        let base = b.add_type(TypeEntry::named(
            "TBase",
            TypeKind::Class(ClassType::new(base_scope).with_ancestor(known::TOBJECT)),
        ));
        let child_scope = b.add_scope(ScopeKind::UnitInterface, None);
        b.add_type(TypeEntry::named(
            "TChild",
            TypeKind::Class(ClassType::new(child_scope).with_ancestor(base)),
        ));
        let intf_scope = b.add_scope(ScopeKind::UnitInterface, None);
        b.add_type(TypeEntry::named(
            "TIntf",
            TypeKind::Class(ClassType::new(intf_scope).with_ancestor(known::TINTERFACEDOBJECT)),
        ));
        registry.publish(b.finish(UnitStage::Complete)).unwrap();
        Program::snapshot(&registry)
    }

    fn ty(index: usize) -> TypeRef {
        TypeRef::new(UnitId::new(1), index.into())
    }

    #[test]
    fn derived_to_base_ranks_by_distance() {
        let p = hierarchy();
        let (base, child) = (ty(0), ty(1));
        let near = find_conversion(&p, child, base, false).unwrap();
        let far = find_conversion(&p, child, known::TOBJECT, false).unwrap();
        assert!(near.is_implicit && far.is_implicit);
        assert!(near.rank < far.rank);
        assert!(!is_assignable(&p, base, child));
        assert!(is_explicit_cast_allowed(&p, base, child));
    }

    #[test]
    fn class_to_implemented_interface() {
        let p = hierarchy();
        assert!(is_assignable(&p, ty(2), known::IINTERFACE));
        assert!(!is_assignable(&p, ty(1), known::IINTERFACE));
        assert!(!is_assignable(&p, known::IINTERFACE, ty(2)));
    }

    #[test]
    fn nil_and_pointers() {
        let p = hierarchy();
        assert!(is_assignable(&p, known::NIL, ty(0)));
        assert!(is_assignable(&p, known::NIL, known::POINTER));
        assert!(is_assignable(&p, known::PCHAR, known::POINTER));
        assert!(is_assignable(&p, known::POINTER, known::PANSICHAR));
        assert!(!is_assignable(&p, known::PCHAR, known::PANSICHAR));
        assert!(!is_assignable(&p, known::NIL, known::INTEGER));
    }

    #[test]
    fn metaclass_to_ancestor_metaclass() {
        let p = hierarchy();
        assert!(is_assignable(&p, known::TCLASS, known::TCLASS));
        assert!(is_explicit_cast_allowed(&p, known::TOBJECT, known::POINTER));
        assert!(!is_explicit_cast_allowed(&p, known::TOBJECT, known::DOUBLE));
    }
}
