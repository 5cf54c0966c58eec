//! Structural queries over type entries.
//!
//! Two views of a type matter:
//!
//! - **Identity** ([`canonical`]): weak aliases are transparent, strong
//!   aliases are distinct nominal types.
//! - **Representation** ([`representation`]): every alias is followed, so a
//!   strong alias keeps its target's operators and members.

use delphi_core::{
    ArrayShape, ArrayType, CharKind, DeclKind, IntegerKind, Name, ProceduralKind, RealKind,
    Signature, StringKind, SymbolGroup, SymbolTable, TypeKind, TypeRef,
};
use delphi_registry::known;

use crate::view::ProgramView;

/// Longest alias or ancestor chain followed before giving up.
pub(crate) const MAX_CHAIN: usize = 64;

static UNRESOLVED: TypeKind = TypeKind::Unresolved;

/// Follow weak aliases to the type they stand for.
pub fn canonical(view: &dyn ProgramView, ty: TypeRef) -> TypeRef {
    let mut current = ty;
    for _ in 0..MAX_CHAIN {
        match view.type_entry(current).map(|t| &t.kind) {
            Some(TypeKind::Alias(alias)) if !alias.strong => current = alias.target,
            Some(_) => return current,
            None => return known::UNRESOLVED,
        }
    }
    known::UNRESOLVED
}

/// Follow every alias, strong or weak.
pub fn representation(view: &dyn ProgramView, ty: TypeRef) -> TypeRef {
    let mut current = ty;
    for _ in 0..MAX_CHAIN {
        match view.type_entry(current).map(|t| &t.kind) {
            Some(TypeKind::Alias(alias)) => current = alias.target,
            Some(_) => return current,
            None => return known::UNRESOLVED,
        }
    }
    known::UNRESOLVED
}

/// Structure of a type after following every alias.
pub fn kind_of(view: &dyn ProgramView, ty: TypeRef) -> &TypeKind {
    view.type_entry(representation(view, ty))
        .map(|t| &t.kind)
        .unwrap_or(&UNRESOLVED)
}

/// Whether the type failed to resolve (or is a placeholder never backfilled).
pub fn is_unresolved(view: &dyn ProgramView, ty: TypeRef) -> bool {
    matches!(
        kind_of(view, ty),
        TypeKind::Unresolved | TypeKind::Placeholder
    )
}

/// Whether two types are the same type once weak aliases are stripped.
pub fn same_type(view: &dyn ProgramView, a: TypeRef, b: TypeRef) -> bool {
    canonical(view, a) == canonical(view, b)
}

// ============================================================================
// Families
// ============================================================================

pub fn integer_kind(view: &dyn ProgramView, ty: TypeRef) -> Option<IntegerKind> {
    match kind_of(view, ty) {
        TypeKind::Integer(kind) => Some(*kind),
        TypeKind::Subrange(sub) => integer_kind(view, sub.base),
        _ => None,
    }
}

pub fn real_kind(view: &dyn ProgramView, ty: TypeRef) -> Option<RealKind> {
    match kind_of(view, ty) {
        TypeKind::Real(kind) => Some(*kind),
        _ => None,
    }
}

pub fn char_kind(view: &dyn ProgramView, ty: TypeRef) -> Option<CharKind> {
    match kind_of(view, ty) {
        TypeKind::Char(kind) => Some(*kind),
        TypeKind::Subrange(sub) => char_kind(view, sub.base),
        _ => None,
    }
}

pub fn string_kind(view: &dyn ProgramView, ty: TypeRef) -> Option<StringKind> {
    match kind_of(view, ty) {
        TypeKind::String { kind, .. } => Some(*kind),
        _ => None,
    }
}

pub fn is_boolean(view: &dyn ProgramView, ty: TypeRef) -> bool {
    match kind_of(view, ty) {
        TypeKind::Boolean => true,
        TypeKind::Subrange(sub) => is_boolean(view, sub.base),
        _ => false,
    }
}

pub fn is_numeric(view: &dyn ProgramView, ty: TypeRef) -> bool {
    integer_kind(view, ty).is_some() || real_kind(view, ty).is_some()
}

pub fn is_ordinal(view: &dyn ProgramView, ty: TypeRef) -> bool {
    kind_of(view, ty).is_ordinal()
}

/// Base type of a subrange, or the type itself.
pub fn ordinal_base(view: &dyn ProgramView, ty: TypeRef) -> TypeRef {
    match kind_of(view, ty) {
        TypeKind::Subrange(sub) => ordinal_base(view, sub.base),
        _ => ty,
    }
}

/// `Low..High` of an ordinal type, when statically known.
pub fn ordinal_bounds(view: &dyn ProgramView, ty: TypeRef) -> Option<(i64, i64)> {
    match kind_of(view, ty) {
        TypeKind::Subrange(sub) => Some((sub.low, sub.high)),
        TypeKind::Boolean => Some((0, 1)),
        TypeKind::Char(CharKind::Ansi) => Some((0, 0xFF)),
        TypeKind::Char(CharKind::Wide) => Some((0, 0xFFFF)),
        TypeKind::Enum(e) => {
            let ordinals = e.values.iter().filter_map(|v| match view.decl(*v)?.kind {
                DeclKind::EnumValue { ordinal, .. } => Some(ordinal),
                _ => None,
            });
            let (low, high) = ordinals.fold((i64::MAX, i64::MIN), |(lo, hi), o| (lo.min(o), hi.max(o)));
            (low <= high).then_some((low, high))
        }
        TypeKind::Integer(kind) => Some(integer_bounds(*kind)),
        _ => None,
    }
}

pub fn integer_bounds(kind: IntegerKind) -> (i64, i64) {
    match kind {
        IntegerKind::ShortInt => (i8::MIN.into(), i8::MAX.into()),
        IntegerKind::SmallInt => (i16::MIN.into(), i16::MAX.into()),
        IntegerKind::Integer => (i32::MIN.into(), i32::MAX.into()),
        IntegerKind::Byte => (0, u8::MAX.into()),
        IntegerKind::Word => (0, u16::MAX.into()),
        IntegerKind::Cardinal => (0, u32::MAX.into()),
        IntegerKind::Int64 | IntegerKind::NativeInt => (i64::MIN, i64::MAX),
        IntegerKind::UInt64 | IntegerKind::NativeUInt => (0, i64::MAX),
    }
}

// ============================================================================
// Structure
// ============================================================================

/// Element type produced by indexing or iterating a value of `ty`.
pub fn element_type(view: &dyn ProgramView, ty: TypeRef) -> Option<TypeRef> {
    match kind_of(view, ty) {
        TypeKind::Array(array) => Some(array.element),
        TypeKind::String { kind, .. } => Some(match kind {
            StringKind::Short | StringKind::Ansi => known::ANSICHAR,
            StringKind::Wide | StringKind::Unicode => known::CHAR,
        }),
        TypeKind::Pointer(Some(target)) => Some(*target),
        TypeKind::Set(element) => Some(*element),
        _ => None,
    }
}

/// Number of index dimensions consumed by one `[...]` on an array.
pub fn array_dimensions(view: &dyn ProgramView, ty: TypeRef) -> usize {
    match kind_of(view, ty) {
        TypeKind::Array(ArrayType {
            shape: ArrayShape::Static(dims),
            ..
        }) => dims.len().max(1),
        _ => 1,
    }
}

/// Signature of a procedural type.
pub fn procedural_signature(view: &dyn ProgramView, ty: TypeRef) -> Option<(&Signature, ProceduralKind)> {
    match kind_of(view, ty) {
        TypeKind::Procedural(p) => Some((&p.signature, p.kind)),
        _ => None,
    }
}

/// Member table of a class, interface or record.
///
/// Classes and interfaces answer with their effective table (own members
/// overlaid on the ancestors'), records with their own members.
pub fn member_table(view: &dyn ProgramView, ty: TypeRef) -> Option<&SymbolTable> {
    let ty = representation(view, ty);
    let entry = view.type_entry(ty)?;
    match &entry.kind {
        TypeKind::Class(class) => Some(&class.effective),
        TypeKind::Interface(intf) => Some(&intf.effective),
        TypeKind::Record(record) => view.scope(ty.unit, record.members).map(|s| &s.symbols),
        _ => None,
    }
}

/// Type whose members `value.Name` looks in.
///
/// Metaclasses expose their instance class; typed pointers to records are
/// dereferenced implicitly.
pub fn member_host(view: &dyn ProgramView, ty: TypeRef) -> TypeRef {
    match kind_of(view, ty) {
        TypeKind::MetaClass(instance) => *instance,
        TypeKind::Pointer(Some(target))
            if matches!(kind_of(view, *target), TypeKind::Record(_)) =>
        {
            *target
        }
        _ => ty,
    }
}

/// Look up a member group of a type by name.
pub fn lookup_member(view: &dyn ProgramView, ty: TypeRef, name: &str) -> Option<SymbolGroup> {
    let host = member_host(view, ty);
    member_table(view, host)
        .and_then(|table| table.get(&Name::new(name)))
        .cloned()
}

// ============================================================================
// Hierarchies
// ============================================================================

/// Class ancestors from the direct parent up to `TObject`.
pub fn class_ancestors(view: &dyn ProgramView, ty: TypeRef) -> Vec<TypeRef> {
    let mut chain = Vec::new();
    let mut current = representation(view, ty);
    for _ in 0..MAX_CHAIN {
        let Some(parent) = kind_of(view, current).as_class().and_then(|c| c.ancestor) else {
            break;
        };
        let parent = representation(view, parent);
        if parent == ty || chain.contains(&parent) {
            break;
        }
        chain.push(parent);
        current = parent;
    }
    chain
}

/// Inheritance distance from `ty` up to `ancestor`; `Some(0)` when they are the same class.
pub fn class_distance(view: &dyn ProgramView, ty: TypeRef, ancestor: TypeRef) -> Option<u32> {
    let ty = representation(view, ty);
    let ancestor = representation(view, ancestor);
    kind_of(view, ty).as_class()?;
    if ty == ancestor {
        return Some(0);
    }
    class_ancestors(view, ty)
        .iter()
        .position(|&a| a == ancestor)
        .map(|i| i as u32 + 1)
}

pub fn is_class_descendant(view: &dyn ProgramView, ty: TypeRef, ancestor: TypeRef) -> bool {
    class_distance(view, ty, ancestor).is_some()
}

/// Every interface `intf` extends, nearest first, without `intf` itself.
pub fn interface_ancestors(view: &dyn ProgramView, intf: TypeRef) -> Vec<TypeRef> {
    let mut out: Vec<TypeRef> = Vec::new();
    let mut queue = vec![representation(view, intf)];
    while let Some(next) = queue.pop() {
        let Some(i) = kind_of(view, next).as_interface() else {
            continue;
        };
        for &ancestor in &i.ancestors {
            let ancestor = representation(view, ancestor);
            if ancestor != intf && !out.contains(&ancestor) && out.len() < MAX_CHAIN {
                out.push(ancestor);
                queue.push(ancestor);
            }
        }
    }
    out
}

/// Interfaces a class implements, its own and its ancestors', with their ancestors.
pub fn implemented_interfaces(view: &dyn ProgramView, class: TypeRef) -> Vec<TypeRef> {
    let mut out: Vec<TypeRef> = Vec::new();
    let mut chain = vec![representation(view, class)];
    chain.extend(class_ancestors(view, class));
    for ty in chain {
        let Some(c) = kind_of(view, ty).as_class() else {
            continue;
        };
        for &intf in &c.interfaces {
            let intf = representation(view, intf);
            for candidate in std::iter::once(intf).chain(interface_ancestors(view, intf)) {
                if !out.contains(&candidate) {
                    out.push(candidate);
                }
            }
        }
    }
    out
}

/// Distance from a class or interface to an interface it implements or extends.
pub fn interface_distance(view: &dyn ProgramView, ty: TypeRef, intf: TypeRef) -> Option<u32> {
    let ty = representation(view, ty);
    let intf = representation(view, intf);
    kind_of(view, intf).as_interface()?;
    match kind_of(view, ty) {
        TypeKind::Interface(_) if ty == intf => Some(0),
        TypeKind::Interface(_) => interface_ancestors(view, ty)
            .iter()
            .position(|&a| a == intf)
            .map(|i| i as u32 + 1),
        TypeKind::Class(_) => implemented_interfaces(view, ty)
            .iter()
            .position(|&a| a == intf)
            .map(|i| i as u32 + 1),
        _ => None,
    }
}

// ============================================================================
// Display
// ============================================================================

/// Human-readable type name for diagnostics.
pub fn display_type(view: &dyn ProgramView, ty: TypeRef) -> String {
    display_depth(view, ty, 0)
}

fn display_depth(view: &dyn ProgramView, ty: TypeRef, depth: usize) -> String {
    let Some(entry) = view.type_entry(ty) else {
        return "<unresolved>".to_string();
    };
    if let Some(name) = &entry.name {
        return name.as_str().to_string();
    }
    if depth > 8 {
        return "...".to_string();
    }
    let inner = |t: TypeRef| display_depth(view, t, depth + 1);
    match &entry.kind {
        TypeKind::String { kind, max_len } => match max_len {
            Some(n) => format!("string[{n}]"),
            None => kind.name().to_string(),
        },
        TypeKind::Set(element) => format!("set of {}", inner(*element)),
        TypeKind::Array(array) => match &array.shape {
            ArrayShape::Static(dims) => {
                let dims: Vec<_> = dims.iter().map(|d| inner(*d)).collect();
                format!("array[{}] of {}", dims.join(", "), inner(array.element))
            }
            ArrayShape::Dynamic | ArrayShape::Open => format!("array of {}", inner(array.element)),
            ArrayShape::OfConst => "array of const".to_string(),
        },
        TypeKind::Pointer(Some(target)) => format!("^{}", inner(*target)),
        TypeKind::Pointer(None) => "Pointer".to_string(),
        TypeKind::MetaClass(instance) => format!("class of {}", inner(*instance)),
        TypeKind::Subrange(sub) => format!("{}..{}", sub.low, sub.high),
        TypeKind::Procedural(p) => {
            let params: Vec<_> = p.signature.params.iter().map(|p| inner(p.ty)).collect();
            let head = match p.signature.result {
                Some(result) => format!("function({}): {}", params.join(", "), inner(result)),
                None => format!("procedure({})", params.join(", ")),
            };
            match p.kind {
                ProceduralKind::Plain => head,
                ProceduralKind::OfObject => format!("{head} of object"),
                ProceduralKind::Reference => format!("reference to {head}"),
            }
        }
        TypeKind::Alias(alias) => inner(alias.target),
        other => other.describe().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::Program;
    use delphi_core::{AliasType, TypeEntry, UnitId};
    use delphi_registry::{UnitBuilder, UnitOrigin, UnitRegistry, UnitStage};

    fn program_with(build: impl FnOnce(&mut UnitBuilder)) -> Program {
        let registry = UnitRegistry::new();
        let id = registry.reserve("Types", UnitOrigin::Source).unwrap();
        let mut builder = UnitBuilder::new(id, "Types", UnitOrigin::Source);
        build(&mut builder);
        registry.publish(builder.finish(UnitStage::Complete)).unwrap();
        Program::snapshot(&registry)
    }

    #[test]
    fn weak_aliases_are_transparent_strong_are_not() {
        let program = program_with(|b| {
            b.add_type(TypeEntry::named(
                "TWeak",
                TypeKind::Alias(AliasType { target: known::INTEGER, strong: false }),
            ));
            b.add_type(TypeEntry::named(
                "TStrong",
                TypeKind::Alias(AliasType { target: known::INTEGER, strong: true }),
            ));
        });
        let unit = UnitId::new(1);
        let weak = TypeRef::new(unit, 0usize.into());
        let strong = TypeRef::new(unit, 1usize.into());

        assert_eq!(canonical(&program, weak), known::INTEGER);
        assert_eq!(canonical(&program, strong), strong);
        assert_eq!(representation(&program, strong), known::INTEGER);
        assert_eq!(integer_kind(&program, strong), Some(IntegerKind::Integer));
        assert!(same_type(&program, weak, known::INTEGER));
        assert!(!same_type(&program, strong, known::INTEGER));
    }

    #[test]
    fn system_hierarchy_queries() {
        let program = program_with(|_| {});
        assert_eq!(class_distance(&program, known::TINTERFACEDOBJECT, known::TOBJECT), Some(1));
        assert_eq!(class_distance(&program, known::TOBJECT, known::TINTERFACEDOBJECT), None);
        assert_eq!(interface_distance(&program, known::TINTERFACEDOBJECT, known::IINTERFACE), Some(1));
        assert!(lookup_member(&program, known::TCLASS, "Create").is_some());
        assert!(lookup_member(&program, known::TGUID, "D4").is_some());
    }

    #[test]
    fn display_names() {
        let program = program_with(|b| {
            b.add_type(TypeEntry::anonymous(TypeKind::Set(known::ANSICHAR)));
        });
        assert_eq!(display_type(&program, known::UNICODESTRING), "UnicodeString");
        assert_eq!(
            display_type(&program, TypeRef::new(UnitId::new(1), 0usize.into())),
            "set of AnsiChar"
        );
        assert_eq!(element_type(&program, known::ANSISTRING), Some(known::ANSICHAR));
        assert_eq!(ordinal_bounds(&program, known::BYTE), Some((0, 255)));
    }
}
