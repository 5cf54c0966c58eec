//! Type conversion system.
//!
//! Decides whether a value of one type can stand where another type is
//! required, and at what cost. Used for:
//!
//! - Assignment and argument checking (`is_assignable`)
//! - Overload resolution (which routine is the best match?)
//! - Explicit typecasts (`TFoo(X)`, `Integer(C)`)
//!
//! ## Conversion Priority
//!
//! Conversions are checked in this order:
//! 1. Unresolved operands (always accepted so errors do not cascade)
//! 2. Identity once weak aliases are stripped
//! 3. Untyped `var`/`const` parameters
//! 4. Strong aliases (explicit only, except for literals)
//! 5. Primitive conversions (ordinal, real, char and string families)
//! 6. Reference conversions (classes, interfaces, pointers, metaclasses, procedural types)
//!
//! ## Cost Model
//!
//! There are two tiers: [`Conversion::COST_EXACT`] and
//! [`Conversion::COST_IMPLICIT`]. Explicit-only conversions carry
//! [`Conversion::COST_EXPLICIT_ONLY`] and are never used implicitly. Inside
//! the implicit tier a `rank` orders conversions of the same cost (widening
//! before narrowing, nearer ancestors before farther ones). Overload
//! selection compares costs only, so a rank never decides a call.

use delphi_core::{TypeKind, TypeRef};

use crate::types::{canonical, is_unresolved, kind_of, representation};
use crate::view::ProgramView;

mod primitive;
mod reference;

pub use primitive::find_primitive_conversion;
pub use reference::{find_reference_conversion, signatures_match};

/// A type conversion with its cost for overload resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conversion {
    pub kind: ConversionKind,
    /// Tier cost (lower is better).
    pub cost: u32,
    /// Order within the tier (lower is better).
    pub rank: u32,
    pub is_implicit: bool,
}

/// The kind of conversion being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionKind {
    /// No conversion needed.
    Identity,
    /// One side failed to resolve.
    Unresolved,
    /// Passing to an untyped `var`/`const` parameter.
    Untyped,
    /// Integer to integer of another size or signedness.
    Integer,
    IntegerToReal,
    /// Real to real of another precision.
    Real,
    /// `AnsiChar` to `Char`, or a char literal to `AnsiChar`.
    CharWidening,
    /// Between string families; narrow to wide unless a literal.
    StringConversion,
    CharToString,
    /// String literal to `PChar`/`PAnsiChar`.
    LiteralToPointer,
    SubrangeToBase,
    /// Ordinal to a subrange of the same family.
    ToSubrange,
    /// Set constructor or compatible set.
    SetConversion,
    /// Array or set constructor passed to an open array parameter.
    OpenArray,
    /// Anything passed to `array of const`.
    ArrayOfConst,
    NilToReference,
    DerivedToBase { distance: u32 },
    ClassToInterface { distance: u32 },
    InterfaceToAncestor { distance: u32 },
    /// Typed pointer to `Pointer` and back.
    PointerConversion,
    MetaClassToAncestor { distance: u32 },
    /// Procedural values with matching signatures.
    Procedural,
    /// Between a strong alias and its target, or sibling strong aliases.
    StrongAlias,
    /// Explicit-only narrowing: wide to narrow char or string.
    Narrowing,
    /// Explicit-only cast between ordinal families.
    OrdinalCast,
    /// Explicit-only cast to a descendant class or interface.
    Downcast,
    /// Explicit-only reinterpretation (class, pointer or integer).
    Reinterpret,
}

impl Conversion {
    /// Cost for exact match (identity conversion).
    pub const COST_EXACT: u32 = 0;
    /// Cost for any implicit conversion.
    pub const COST_IMPLICIT: u32 = 1;
    /// Cost marker for explicit-only conversions (not usable implicitly).
    pub const COST_EXPLICIT_ONLY: u32 = 100;

    /// Rank of a narrowing conversion is offset so every widening sorts first.
    pub const RANK_NARROWING: u32 = 8;

    /// Create an identity conversion (no conversion needed).
    pub fn identity() -> Self {
        Self {
            kind: ConversionKind::Identity,
            cost: Self::COST_EXACT,
            rank: 0,
            is_implicit: true,
        }
    }

    /// An implicit conversion at rank `rank`.
    pub fn implicit(kind: ConversionKind, rank: u32) -> Self {
        Self {
            kind,
            cost: Self::COST_IMPLICIT,
            rank,
            is_implicit: true,
        }
    }

    /// A conversion only allowed through an explicit cast.
    pub fn explicit(kind: ConversionKind) -> Self {
        Self {
            kind,
            cost: Self::COST_EXPLICIT_ONLY,
            rank: 0,
            is_implicit: false,
        }
    }

    /// Demote an implicit conversion to explicit-only.
    fn into_explicit(self) -> Self {
        Self::explicit(self.kind)
    }

    pub fn is_implicit(&self) -> bool {
        self.is_implicit
    }

    /// Check if this is an exact match (no conversion).
    pub fn is_exact(&self) -> bool {
        matches!(self.kind, ConversionKind::Identity)
    }
}

/// Find a conversion from a value of type `from` to `to`.
///
/// `literal` is set when the value is a constant literal, which widens the
/// set of implicit conversions (an integer literal fits any integer or real
/// type, a string literal any string type).
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn find_conversion(
    view: &dyn ProgramView,
    from: TypeRef,
    to: TypeRef,
    literal: bool,
) -> Option<Conversion> {
    if is_unresolved(view, from) || is_unresolved(view, to) {
        return Some(Conversion::implicit(ConversionKind::Unresolved, 0));
    }

    let from_canonical = canonical(view, from);
    let to_canonical = canonical(view, to);
    if from_canonical == to_canonical {
        return Some(Conversion::identity());
    }

    if matches!(kind_of(view, to), TypeKind::Untyped) || matches!(kind_of(view, from), TypeKind::Untyped) {
        return Some(Conversion::implicit(ConversionKind::Untyped, 0));
    }

    if is_strong_alias(view, from_canonical) || is_strong_alias(view, to_canonical) {
        let from_repr = representation(view, from);
        let to_repr = representation(view, to);
        if from_repr == to_repr {
            return Some(if literal {
                Conversion::implicit(ConversionKind::StrongAlias, 0)
            } else {
                Conversion::explicit(ConversionKind::StrongAlias)
            });
        }
        let inner = find_structural(view, from_repr, to_repr, literal)?;
        return Some(if literal { inner } else { inner.into_explicit() });
    }

    find_structural(view, from_canonical, to_canonical, literal)
}

fn find_structural(
    view: &dyn ProgramView,
    from: TypeRef,
    to: TypeRef,
    literal: bool,
) -> Option<Conversion> {
    if from == to {
        return Some(Conversion::identity());
    }
    find_primitive_conversion(view, from, to, literal)
        .or_else(|| find_reference_conversion(view, from, to, literal))
}

/// Whether a value of `from` converts implicitly to `to`.
pub fn can_implicitly_convert(view: &dyn ProgramView, from: TypeRef, to: TypeRef, literal: bool) -> bool {
    find_conversion(view, from, to, literal).is_some_and(|c| c.is_implicit)
}

/// Whether a value of `from` may be assigned to a location of type `to`.
pub fn is_assignable(view: &dyn ProgramView, from: TypeRef, to: TypeRef) -> bool {
    can_implicitly_convert(view, from, to, false)
}

/// Whether `to(value)` is a valid typecast for a value of type `from`.
pub fn is_explicit_cast_allowed(view: &dyn ProgramView, from: TypeRef, to: TypeRef) -> bool {
    find_conversion(view, from, to, false).is_some()
}

fn is_strong_alias(view: &dyn ProgramView, ty: TypeRef) -> bool {
    matches!(
        view.type_entry(ty).map(|t| &t.kind),
        Some(TypeKind::Alias(alias)) if alias.strong
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::Program;
    use delphi_core::{AliasType, TypeEntry, UnitId};
    use delphi_registry::{UnitBuilder, UnitOrigin, UnitRegistry, UnitStage, known};

    fn program_with(build: impl FnOnce(&mut UnitBuilder)) -> Program {
        let registry = UnitRegistry::new();
        let id = registry.reserve("Conv", UnitOrigin::Source).unwrap();
        let mut builder = UnitBuilder::new(id, "Conv", UnitOrigin::Source);
        build(&mut builder);
        registry.publish(builder.finish(UnitStage::Complete)).unwrap();
        Program::snapshot(&registry)
    }

    fn ty(index: usize) -> TypeRef {
        TypeRef::new(UnitId::new(1), index.into())
    }

    #[test]
    fn identity_through_weak_alias() {
        let program = program_with(|_| {});
        let conv = find_conversion(&program, known::INTEGER, known::INTEGER, false).unwrap();
        assert!(conv.is_exact());
        // LongInt is a weak alias of Integer.
        let longint = program
            .unit(UnitId::SYSTEM)
            .and_then(|u| u.lookup_interface("LongInt"))
            .and_then(|g| program.decl(g.decls[0]))
            .and_then(|d| d.kind.declared_type())
            .unwrap();
        assert!(find_conversion(&program, longint, known::INTEGER, false).unwrap().is_exact());
    }

    #[test]
    fn strong_alias_needs_explicit_cast() {
        let program = program_with(|b| {
            b.add_type(TypeEntry::named(
                "TMyInt",
                TypeKind::Alias(AliasType { target: known::INTEGER, strong: true }),
            ));
        });
        let strong = ty(0);
        assert!(!is_assignable(&program, known::INTEGER, strong));
        assert!(!is_assignable(&program, strong, known::INTEGER));
        assert!(is_explicit_cast_allowed(&program, known::INTEGER, strong));
        assert!(can_implicitly_convert(&program, known::INTEGER, strong, true));
    }

    #[test]
    fn unresolved_is_accepted() {
        let program = program_with(|_| {});
        let conv = find_conversion(&program, known::UNRESOLVED, known::TOBJECT, false).unwrap();
        assert!(conv.is_implicit);
        assert_eq!(conv.kind, ConversionKind::Unresolved);
    }

    #[test]
    fn untyped_parameters_accept_anything() {
        let program = program_with(|_| {});
        assert!(is_assignable(&program, known::TGUID, known::UNTYPED));
    }
}
