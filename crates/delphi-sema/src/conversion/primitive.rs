//! Ordinal, real, character, string, set and array conversions.

use delphi_core::{ArrayShape, CharKind, IntegerKind, RealKind, StringKind, TypeKind, TypeRef};
use delphi_registry::known;

use super::{Conversion, ConversionKind};
use crate::types::{canonical, char_kind, kind_of, ordinal_base, same_type};
use crate::view::ProgramView;

/// Rank of integer-to-real conversions: after every integer widening and
/// narrowing, and equal for every real target.
const RANK_INT_TO_REAL: u32 = 16;

/// Conversions between the built-in value families.
///
/// Both types are canonical (weak aliases stripped) and distinct.
pub fn find_primitive_conversion(
    view: &dyn ProgramView,
    from: TypeRef,
    to: TypeRef,
    literal: bool,
) -> Option<Conversion> {
    let from_kind = kind_of(view, from);
    let to_kind = kind_of(view, to);

    match (from_kind, to_kind) {
        (TypeKind::Subrange(_), _) => {
            let base = canonical(view, ordinal_base(view, from));
            if base == to {
                return Some(Conversion::implicit(ConversionKind::SubrangeToBase, 0));
            }
            find_primitive_conversion(view, base, to, literal)
        }
        (_, TypeKind::Subrange(_)) => {
            let base = canonical(view, ordinal_base(view, to));
            let inner = if base == from {
                Conversion::identity()
            } else {
                find_primitive_conversion(view, from, base, literal)?
            };
            Some(if inner.is_implicit {
                Conversion::implicit(ConversionKind::ToSubrange, Conversion::RANK_NARROWING)
            } else {
                inner
            })
        }

        (TypeKind::Integer(a), TypeKind::Integer(b)) => {
            Some(Conversion::implicit(ConversionKind::Integer, integer_rank(*a, *b)))
        }
        (TypeKind::Integer(_), TypeKind::Real(_)) => {
            Some(Conversion::implicit(ConversionKind::IntegerToReal, RANK_INT_TO_REAL))
        }
        (TypeKind::Real(a), TypeKind::Real(b)) => {
            Some(Conversion::implicit(ConversionKind::Real, real_rank(*a, *b)))
        }

        (TypeKind::Char(a), TypeKind::Char(b)) => match (a, b) {
            (CharKind::Ansi, CharKind::Wide) => Some(Conversion::implicit(ConversionKind::CharWidening, 1)),
            _ if literal => Some(Conversion::implicit(ConversionKind::CharWidening, 1)),
            _ => Some(Conversion::explicit(ConversionKind::Narrowing)),
        },
        (TypeKind::Char(c), TypeKind::String { kind, .. }) => {
            if *c == CharKind::Ansi || kind.is_wide() {
                Some(Conversion::implicit(ConversionKind::CharToString, 2 + u32::from(kind.is_wide())))
            } else if literal {
                Some(Conversion::implicit(ConversionKind::CharToString, 3))
            } else {
                Some(Conversion::explicit(ConversionKind::Narrowing))
            }
        }
        (TypeKind::String { kind: a, .. }, TypeKind::String { kind: b, .. }) => string_conversion(*a, *b, literal),
        (TypeKind::String { .. }, TypeKind::Pointer(Some(target))) if is_char_pointer(view, *target) => {
            Some(if literal {
                Conversion::implicit(ConversionKind::LiteralToPointer, 4)
            } else {
                Conversion::explicit(ConversionKind::Reinterpret)
            })
        }
        (TypeKind::Pointer(Some(target)), TypeKind::String { .. }) if is_char_pointer(view, *target) => {
            Some(Conversion::implicit(ConversionKind::StringConversion, 4))
        }

        (TypeKind::Set(a), TypeKind::Set(b)) => {
            let a = *a;
            let b = *b;
            if a == known::UNTYPED || same_type(view, ordinal_base(view, a), ordinal_base(view, b)) {
                Some(Conversion::implicit(ConversionKind::SetConversion, 0))
            } else if literal && super::can_implicitly_convert(view, a, b, true) {
                Some(Conversion::implicit(ConversionKind::SetConversion, 1))
            } else {
                None
            }
        }

        (_, TypeKind::Array(target)) if target.shape == ArrayShape::OfConst => {
            let accepts = (literal && matches!(from_kind, TypeKind::Set(_)))
                || matches!(from_kind, TypeKind::Array(_));
            accepts.then(|| Conversion::implicit(ConversionKind::ArrayOfConst, 2))
        }
        (TypeKind::Set(element), TypeKind::Array(target)) if target.shape == ArrayShape::Open && literal => {
            let element = *element;
            (element == known::UNTYPED || super::can_implicitly_convert(view, element, target.element, true))
                .then(|| Conversion::implicit(ConversionKind::OpenArray, 1))
        }
        (TypeKind::Array(source), TypeKind::Array(target)) => match (&source.shape, &target.shape) {
            (_, ArrayShape::Open) if same_type(view, source.element, target.element) => {
                Some(Conversion::implicit(ConversionKind::OpenArray, 0))
            }
            (ArrayShape::Dynamic, ArrayShape::Dynamic) if same_type(view, source.element, target.element) => {
                Some(Conversion::implicit(ConversionKind::OpenArray, 1))
            }
            _ => None,
        },

        (a, b) if a.is_ordinal() && b.is_ordinal() => Some(Conversion::explicit(ConversionKind::OrdinalCast)),
        _ => None,
    }
}

/// Size class (0 for one byte up to 3 for eight).
fn size_class(kind: IntegerKind) -> u32 {
    u32::from(kind.size()).trailing_zeros()
}

fn integer_rank(from: IntegerKind, to: IntegerKind) -> u32 {
    let (f, t) = (size_class(from), size_class(to));
    let sign = if from.is_signed() == to.is_signed() { 0 } else { 4 };
    if t >= f {
        t - f + sign
    } else {
        Conversion::RANK_NARROWING + (f - t) + sign
    }
}

fn real_position(kind: RealKind) -> u32 {
    match kind {
        RealKind::Single => 0,
        RealKind::Double | RealKind::Comp | RealKind::Currency => 1,
        RealKind::Extended => 2,
    }
}

fn real_rank(from: RealKind, to: RealKind) -> u32 {
    let (f, t) = (real_position(from), real_position(to));
    if t > f {
        t - f
    } else if t == f {
        1
    } else {
        Conversion::RANK_NARROWING + (f - t)
    }
}

fn string_conversion(from: StringKind, to: StringKind, literal: bool) -> Option<Conversion> {
    let kind = ConversionKind::StringConversion;
    match (from.is_wide(), to.is_wide()) {
        (false, false) | (true, true) => Some(Conversion::implicit(kind, 1)),
        (false, true) => Some(Conversion::implicit(kind, 2)),
        (true, false) if literal => Some(Conversion::implicit(kind, 2)),
        (true, false) => Some(Conversion::explicit(ConversionKind::Narrowing)),
    }
}

fn is_char_pointer(view: &dyn ProgramView, target: TypeRef) -> bool {
    char_kind(view, target).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::{can_implicitly_convert, find_conversion, is_assignable, is_explicit_cast_allowed};
    use crate::view::Program;
    use delphi_registry::UnitRegistry;

    fn system() -> Program {
        Program::snapshot(&UnitRegistry::new())
    }

    #[test]
    fn narrow_to_wide_is_implicit_reverse_is_explicit() {
        let p = system();
        assert!(is_assignable(&p, known::ANSICHAR, known::CHAR));
        assert!(!is_assignable(&p, known::CHAR, known::ANSICHAR));
        assert!(is_explicit_cast_allowed(&p, known::CHAR, known::ANSICHAR));

        assert!(is_assignable(&p, known::ANSISTRING, known::UNICODESTRING));
        assert!(!is_assignable(&p, known::UNICODESTRING, known::ANSISTRING));
        let conv = find_conversion(&p, known::UNICODESTRING, known::ANSISTRING, false).unwrap();
        assert_eq!(conv.kind, ConversionKind::Narrowing);
        assert_eq!(conv.cost, Conversion::COST_EXPLICIT_ONLY);
    }

    #[test]
    fn literals_fit_narrow_targets() {
        let p = system();
        assert!(can_implicitly_convert(&p, known::CHAR, known::ANSICHAR, true));
        assert!(can_implicitly_convert(&p, known::UNICODESTRING, known::ANSISTRING, true));
        assert!(can_implicitly_convert(&p, known::UNICODESTRING, known::PCHAR, true));
        assert!(!can_implicitly_convert(&p, known::UNICODESTRING, known::PCHAR, false));
    }

    #[test]
    fn integer_widening_ranks_before_narrowing() {
        let p = system();
        let widen = find_conversion(&p, known::BYTE, known::WORD, false).unwrap();
        let narrow = find_conversion(&p, known::INTEGER, known::BYTE, false).unwrap();
        let to_real = find_conversion(&p, known::INTEGER, known::DOUBLE, false).unwrap();
        assert_eq!(widen.cost, Conversion::COST_IMPLICIT);
        assert_eq!(narrow.cost, Conversion::COST_IMPLICIT);
        assert!(widen.rank < narrow.rank);
        assert!(narrow.rank < to_real.rank);
    }

    #[test]
    fn integer_to_every_real_ranks_equal() {
        let p = system();
        let ranks: Vec<_> = [known::SINGLE, known::DOUBLE, known::EXTENDED]
            .into_iter()
            .map(|r| find_conversion(&p, known::INTEGER, r, true).unwrap())
            .map(|c| (c.cost, c.rank))
            .collect();
        assert!(ranks.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn real_to_integer_is_not_a_conversion() {
        let p = system();
        assert!(find_conversion(&p, known::DOUBLE, known::INTEGER, false).is_none());
    }

    #[test]
    fn ordinal_families_need_casts() {
        let p = system();
        assert!(!is_assignable(&p, known::BOOLEAN, known::INTEGER));
        assert!(!is_assignable(&p, known::INTEGER, known::CHAR));
        assert!(is_explicit_cast_allowed(&p, known::INTEGER, known::CHAR));
        assert!(is_explicit_cast_allowed(&p, known::CHAR, known::BYTE));
    }

    #[test]
    fn char_to_string() {
        let p = system();
        assert!(is_assignable(&p, known::ANSICHAR, known::ANSISTRING));
        assert!(is_assignable(&p, known::CHAR, known::UNICODESTRING));
        assert!(!is_assignable(&p, known::CHAR, known::ANSISTRING));
    }
}
