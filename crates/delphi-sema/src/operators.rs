//! Operator typing.
//!
//! Binary and unary operators on the built-in families. Operands are looked
//! at through their representation, so strong aliases keep the operator set
//! of their target.
//!
//! An operator whose operands do not combine produces `None`; callers type
//! the node as unresolved instead of guessing.

use delphi_core::{TypeKind, TypeRef};
use delphi_parser::ast::{BinaryOp, UnaryOp};
use delphi_registry::known;

use crate::types::{
    char_kind, integer_kind, is_boolean, is_numeric, is_unresolved, kind_of, real_kind, same_type,
    string_kind,
};
use crate::view::ProgramView;

/// The type both operands of an arithmetic or concatenation operator are
/// brought to.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn common_type(view: &dyn ProgramView, a: TypeRef, b: TypeRef) -> Option<TypeRef> {
    if is_unresolved(view, a) || is_unresolved(view, b) {
        return Some(known::UNRESOLVED);
    }

    if let (Some(x), Some(y)) = (integer_kind(view, a), integer_kind(view, b)) {
        return Some(if x.is_64_bit() || y.is_64_bit() {
            known::INT64
        } else {
            known::INTEGER
        });
    }
    if is_numeric(view, a) && is_numeric(view, b) {
        return Some(known::EXTENDED);
    }

    if is_textual(view, a) && is_textual(view, b) {
        return Some(if is_wide_text(view, a) || is_wide_text(view, b) {
            known::UNICODESTRING
        } else {
            known::ANSISTRING
        });
    }

    match (kind_of(view, a), kind_of(view, b)) {
        (TypeKind::Set(x), TypeKind::Set(_)) if *x == known::UNTYPED => Some(b),
        (TypeKind::Set(_), TypeKind::Set(_)) => Some(a),
        _ if is_boolean(view, a) && is_boolean(view, b) => Some(known::BOOLEAN),
        _ if same_type(view, a, b) => Some(a),
        _ => None,
    }
}

/// Result type of `left op right`.
///
/// For `as` the right operand is the type expression's value type, a
/// metaclass for class names.
pub fn binary_result(view: &dyn ProgramView, op: BinaryOp, left: TypeRef, right: TypeRef) -> Option<TypeRef> {
    if op.is_comparison() || matches!(op, BinaryOp::In | BinaryOp::Is) {
        return Some(known::BOOLEAN);
    }
    if op == BinaryOp::As {
        return Some(match kind_of(view, right) {
            TypeKind::MetaClass(instance) => *instance,
            _ => right,
        });
    }
    if is_unresolved(view, left) || is_unresolved(view, right) {
        return Some(known::UNRESOLVED);
    }

    match op {
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => {
            if is_boolean(view, left) && is_boolean(view, right) {
                Some(known::BOOLEAN)
            } else {
                integer_common(view, left, right)
            }
        }
        BinaryOp::Add => {
            if let Some(ptr) = pointer_arithmetic(view, left, right) {
                return Some(ptr);
            }
            common_type(view, left, right)
        }
        BinaryOp::Sub => {
            if let Some(ptr) = pointer_arithmetic(view, left, right) {
                return Some(ptr);
            }
            numeric_or_set(view, left, right)
        }
        BinaryOp::Mul => numeric_or_set(view, left, right),
        BinaryOp::Divide => (is_numeric(view, left) && is_numeric(view, right)).then_some(known::EXTENDED),
        BinaryOp::IntDiv | BinaryOp::Mod => integer_common(view, left, right),
        BinaryOp::Shl | BinaryOp::Shr => integer_common(view, left, right),
        _ => None,
    }
}

/// Result type of `op operand`.
///
/// `not` is logical on booleans and bitwise on integers, keeping the
/// operand's integer type.
pub fn unary_result(view: &dyn ProgramView, op: UnaryOp, operand: TypeRef) -> Option<TypeRef> {
    if is_unresolved(view, operand) {
        return Some(known::UNRESOLVED);
    }
    match op {
        UnaryOp::Not => {
            if is_boolean(view, operand) {
                Some(known::BOOLEAN)
            } else if integer_kind(view, operand).is_some() {
                Some(operand)
            } else {
                None
            }
        }
        UnaryOp::Negate | UnaryOp::Plus => is_numeric(view, operand).then_some(operand),
        UnaryOp::AddressOf => Some(known::POINTER),
    }
}

/// Whether `not` on a value of this type is a bitwise operation.
pub fn is_bitwise_not(view: &dyn ProgramView, operand: TypeRef) -> bool {
    integer_kind(view, operand).is_some()
}

fn integer_common(view: &dyn ProgramView, a: TypeRef, b: TypeRef) -> Option<TypeRef> {
    let (x, y) = (integer_kind(view, a)?, integer_kind(view, b)?);
    Some(if x.is_64_bit() || y.is_64_bit() {
        known::INT64
    } else {
        known::INTEGER
    })
}

fn numeric_or_set(view: &dyn ProgramView, a: TypeRef, b: TypeRef) -> Option<TypeRef> {
    match (kind_of(view, a), kind_of(view, b)) {
        (TypeKind::Set(_), TypeKind::Set(_)) => common_type(view, a, b),
        _ if is_numeric(view, a) && is_numeric(view, b) => common_type(view, a, b),
        _ => None,
    }
}

/// `P + N`, `N + P` and `P - N` on typed pointers.
fn pointer_arithmetic(view: &dyn ProgramView, a: TypeRef, b: TypeRef) -> Option<TypeRef> {
    match (kind_of(view, a), kind_of(view, b)) {
        (TypeKind::Pointer(_), _) if integer_kind(view, b).is_some() => Some(a),
        (_, TypeKind::Pointer(_)) if integer_kind(view, a).is_some() => Some(b),
        _ => None,
    }
}

fn is_textual(view: &dyn ProgramView, ty: TypeRef) -> bool {
    string_kind(view, ty).is_some() || char_kind(view, ty).is_some()
}

fn is_wide_text(view: &dyn ProgramView, ty: TypeRef) -> bool {
    string_kind(view, ty).is_some_and(|k| k.is_wide())
        || char_kind(view, ty).is_some_and(|k| k == delphi_core::CharKind::Wide)
}

/// Whether a value of `ty` is a real number.
pub fn is_real(view: &dyn ProgramView, ty: TypeRef) -> bool {
    real_kind(view, ty).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::Program;
    use delphi_registry::UnitRegistry;

    fn system() -> Program {
        Program::snapshot(&UnitRegistry::new())
    }

    #[test]
    fn arithmetic_widening() {
        let p = system();
        assert_eq!(common_type(&p, known::BYTE, known::SMALLINT), Some(known::INTEGER));
        assert_eq!(common_type(&p, known::INTEGER, known::INT64), Some(known::INT64));
        assert_eq!(common_type(&p, known::INTEGER, known::SINGLE), Some(known::EXTENDED));
        assert_eq!(
            binary_result(&p, BinaryOp::Divide, known::INTEGER, known::INTEGER),
            Some(known::EXTENDED)
        );
        assert_eq!(binary_result(&p, BinaryOp::IntDiv, known::INTEGER, known::DOUBLE), None);
    }

    #[test]
    fn concatenation_prefers_unicode() {
        let p = system();
        assert_eq!(common_type(&p, known::ANSISTRING, known::CHAR), Some(known::UNICODESTRING));
        assert_eq!(common_type(&p, known::ANSICHAR, known::ANSISTRING), Some(known::ANSISTRING));
    }

    #[test]
    fn not_is_bitwise_on_integers() {
        let p = system();
        assert_eq!(unary_result(&p, UnaryOp::Not, known::BOOLEAN), Some(known::BOOLEAN));
        assert_eq!(unary_result(&p, UnaryOp::Not, known::WORD), Some(known::WORD));
        assert!(is_bitwise_not(&p, known::WORD));
        assert!(!is_bitwise_not(&p, known::BOOLEAN));
        assert_eq!(unary_result(&p, UnaryOp::Not, known::UNICODESTRING), None);
    }

    #[test]
    fn comparisons_and_casts() {
        let p = system();
        assert_eq!(
            binary_result(&p, BinaryOp::Less, known::INTEGER, known::DOUBLE),
            Some(known::BOOLEAN)
        );
        assert_eq!(
            binary_result(&p, BinaryOp::As, known::TOBJECT, known::TCLASS),
            Some(known::TOBJECT)
        );
        assert_eq!(
            binary_result(&p, BinaryOp::And, known::BOOLEAN, known::BOOLEAN),
            Some(known::BOOLEAN)
        );
        assert_eq!(
            binary_result(&p, BinaryOp::And, known::BYTE, known::INTEGER),
            Some(known::INTEGER)
        );
    }
}
