//! Binary operators and set constructors.

use delphi_core::{TypeKind, TypeRef};
use delphi_parser::ast::{BinaryOp, Expr, SetElement};
use delphi_registry::known;

use super::ExprChecker;
use crate::context::DerivedType;
use crate::conversion::can_implicitly_convert;
use crate::expr_info::ExprInfo;
use crate::operators::{binary_result, common_type};
use crate::types::{element_type, is_unresolved, kind_of, ordinal_base};

/// Type `left op right`.
///
/// Operands that do not combine leave the node unresolved without a
/// diagnostic; the misuse surfaces where the value is consumed.
pub(super) fn check_binary(
    checker: &mut ExprChecker,
    _expr: &Expr<'_>,
    op: BinaryOp,
    left: &Expr<'_>,
    right: &Expr<'_>,
) -> ExprInfo {
    let lhs = checker.infer_read(left);
    let left_ty = checker.value_type(&lhs);

    let rhs = match op {
        // `X in []` and `X in [A..B]` read the set in terms of the left operand.
        BinaryOp::In => {
            let base = ordinal_base(checker.ctx(), left_ty);
            let set = checker.ctx_mut().derived_type(DerivedType::Set(base));
            checker.infer_with(right, Some(set))
        }
        // The right side of `is`/`as` is a type name or a metaclass value.
        BinaryOp::Is | BinaryOp::As => checker.infer_read(right),
        _ if op.is_comparison() => checker.infer_with(right, Some(left_ty)),
        _ => checker.infer_read(right),
    };
    let right_ty = checker.value_type(&rhs);

    let view = checker.ctx();
    let result = if op.is_comparison() && !comparable(checker, left_ty, right_ty) {
        known::UNRESOLVED
    } else {
        binary_result(view, op, left_ty, right_ty).unwrap_or(known::UNRESOLVED)
    };

    if lhs.is_literal && rhs.is_literal && !matches!(op, BinaryOp::Is | BinaryOp::As) {
        ExprInfo::literal(result)
    } else {
        ExprInfo::value(result)
    }
}

/// Whether `=`/`<>`/`<`... may compare values of these types.
fn comparable(checker: &ExprChecker, a: TypeRef, b: TypeRef) -> bool {
    let view = checker.ctx();
    if is_unresolved(view, a) || is_unresolved(view, b) {
        return true;
    }
    common_type(view, a, b).is_some()
        || can_implicitly_convert(view, a, b, false)
        || can_implicitly_convert(view, b, a, false)
}

/// `[A, B..C]`.
///
/// The constructor is a literal of an anonymous `set of` its element type.
/// The expected type, a set or an array for open array arguments, guides
/// the elements so `[]` and `[1, 2]` fit wherever they are written.
pub(super) fn check_set_ctor(
    checker: &mut ExprChecker,
    _expr: &Expr<'_>,
    elements: &[SetElement<'_>],
    expected: Option<TypeRef>,
) -> ExprInfo {
    let guide = expected.and_then(|ty| element_type(checker.ctx(), ty));

    let mut element: Option<TypeRef> = None;
    for item in elements {
        let low = checker.infer_with(item.low, guide);
        let mut ty = checker.value_type(&low);
        if let Some(high) = item.high {
            let info = checker.infer_with(high, guide.or(Some(ty)));
            let high_ty = checker.value_type(&info);
            ty = common_type(checker.ctx(), ty, high_ty).unwrap_or(ty);
        }
        element = Some(match element {
            None => ty,
            Some(prev) => common_type(checker.ctx(), prev, ty).unwrap_or(prev),
        });
    }

    let element = match element {
        None => known::UNTYPED,
        Some(ty) if is_unresolved(checker.ctx(), ty) => return ExprInfo::literal(known::UNRESOLVED),
        Some(ty) => match kind_of(checker.ctx(), ty) {
            TypeKind::Subrange(_) => ordinal_base(checker.ctx(), ty),
            _ => ty,
        },
    };
    let set = checker.ctx_mut().derived_type(DerivedType::Set(element));
    ExprInfo::literal(set)
}
