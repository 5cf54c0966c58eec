//! Constant folding.
//!
//! Folds expressions that the expression checker has already resolved, so
//! identifiers are read through the node facts. Used for enum ordinals,
//! subrange bounds, `string[N]` lengths and constant values.

use ordered_float::OrderedFloat;

use delphi_core::{ConstValue, DeclKind, Intrinsic, UnitFacts};
use delphi_parser::ast::{BinaryOp, Expr, ExprKind, Literal, UnaryOp};

use crate::types::ordinal_bounds;
use crate::view::ProgramView;

/// Evaluates resolved constant expressions.
pub struct ConstEvaluator<'a> {
    view: &'a dyn ProgramView,
    facts: &'a UnitFacts,
}

impl<'a> ConstEvaluator<'a> {
    pub fn new(view: &'a dyn ProgramView, facts: &'a UnitFacts) -> Self {
        Self { view, facts }
    }

    /// Value of `expr`, or `None` when it is not constant.
    pub fn eval(&self, expr: &Expr<'_>) -> Option<ConstValue> {
        match expr.kind {
            ExprKind::Literal(lit) => Some(literal_value(&lit)),
            ExprKind::Paren(inner) => self.eval(inner),
            ExprKind::Ident(_) | ExprKind::Member { .. } => self.eval_name(expr),
            ExprKind::Unary { op, operand } => unary(op, self.eval(operand)?),
            ExprKind::Binary { op, left, right } => binary(op, self.eval(left)?, self.eval(right)?),
            ExprKind::Call { callee, args } => self.eval_call(callee, args),
            _ => None,
        }
    }

    /// Ordinal value of `expr`; characters and booleans count as ordinals.
    pub fn eval_ordinal(&self, expr: &Expr<'_>) -> Option<i64> {
        self.eval(expr)?.as_int()
    }

    fn eval_name(&self, expr: &Expr<'_>) -> Option<ConstValue> {
        let decl = self.facts.declaration_of(expr.id)?;
        match &self.view.decl(decl)?.kind {
            DeclKind::Constant(c) => c.value.clone(),
            DeclKind::EnumValue { ordinal, .. } => Some(ConstValue::Integer(*ordinal)),
            _ => None,
        }
    }

    fn eval_call(&self, callee: &Expr<'_>, args: &[Expr<'_>]) -> Option<ConstValue> {
        let decl = self.facts.declaration_of(callee.id)?;
        let declaration = self.view.decl(decl)?;
        let [arg] = args else {
            return None;
        };

        // `Byte(5)`: a cast of a constant keeps its value.
        if declaration.kind.is_type() {
            return self.eval(arg);
        }

        let intrinsic = declaration.as_routine()?.intrinsic?;
        match intrinsic {
            Intrinsic::Ord => self.eval_ordinal(arg).map(ConstValue::Integer),
            Intrinsic::Chr => {
                let code = u32::try_from(self.eval_ordinal(arg)?).ok()?;
                char::from_u32(code).map(ConstValue::Char)
            }
            Intrinsic::Succ => self.eval_ordinal(arg).map(|v| ConstValue::Integer(v + 1)),
            Intrinsic::Pred => self.eval_ordinal(arg).map(|v| ConstValue::Integer(v - 1)),
            Intrinsic::Abs => match self.eval(arg)? {
                ConstValue::Integer(v) => Some(ConstValue::Integer(v.abs())),
                ConstValue::Real(v) => Some(ConstValue::Real(OrderedFloat(v.abs()))),
                _ => None,
            },
            Intrinsic::Length => match self.eval(arg)? {
                ConstValue::String(s) => Some(ConstValue::Integer(s.chars().count() as i64)),
                ConstValue::Char(_) => Some(ConstValue::Integer(1)),
                _ => None,
            },
            Intrinsic::High | Intrinsic::Low => {
                let ty = self.facts.type_of(arg.id)?;
                let (low, high) = ordinal_bounds(self.view, ty)?;
                Some(ConstValue::Integer(if intrinsic == Intrinsic::High { high } else { low }))
            }
            _ => None,
        }
    }
}

/// The value of a literal token.
pub fn literal_value(lit: &Literal<'_>) -> ConstValue {
    match *lit {
        Literal::Integer(v) => ConstValue::Integer(v),
        Literal::Real(v) => ConstValue::Real(OrderedFloat(v)),
        Literal::String(s) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => ConstValue::Char(c),
                _ => ConstValue::String(s.to_string()),
            }
        }
        Literal::Nil => ConstValue::Nil,
    }
}

fn text(value: &ConstValue) -> Option<String> {
    match value {
        ConstValue::String(s) => Some(s.clone()),
        ConstValue::Char(c) => Some(c.to_string()),
        _ => None,
    }
}

fn unary(op: UnaryOp, value: ConstValue) -> Option<ConstValue> {
    match (op, value) {
        (UnaryOp::Negate, ConstValue::Integer(v)) => v.checked_neg().map(ConstValue::Integer),
        (UnaryOp::Negate, ConstValue::Real(v)) => Some(ConstValue::Real(-v)),
        (UnaryOp::Plus, v @ (ConstValue::Integer(_) | ConstValue::Real(_))) => Some(v),
        (UnaryOp::Not, ConstValue::Boolean(b)) => Some(ConstValue::Boolean(!b)),
        (UnaryOp::Not, ConstValue::Integer(v)) => Some(ConstValue::Integer(!v)),
        _ => None,
    }
}

fn binary(op: BinaryOp, left: ConstValue, right: ConstValue) -> Option<ConstValue> {
    use ConstValue::{Boolean, Integer, Real};

    if let (Boolean(a), Boolean(b)) = (&left, &right) {
        let (a, b) = (*a, *b);
        return match op {
            BinaryOp::And => Some(Boolean(a && b)),
            BinaryOp::Or => Some(Boolean(a || b)),
            BinaryOp::Xor => Some(Boolean(a ^ b)),
            BinaryOp::Equal => Some(Boolean(a == b)),
            BinaryOp::NotEqual => Some(Boolean(a != b)),
            _ => None,
        };
    }

    if op == BinaryOp::Add
        && let (Some(a), Some(b)) = (text(&left), text(&right))
    {
        return Some(ConstValue::String(a + &b));
    }

    if let (Integer(a), Integer(b)) = (&left, &right) {
        let (a, b) = (*a, *b);
        return match op {
            BinaryOp::Add => a.checked_add(b).map(Integer),
            BinaryOp::Sub => a.checked_sub(b).map(Integer),
            BinaryOp::Mul => a.checked_mul(b).map(Integer),
            BinaryOp::IntDiv => a.checked_div(b).map(Integer),
            BinaryOp::Mod => a.checked_rem(b).map(Integer),
            BinaryOp::Divide if b != 0 => Some(Real(OrderedFloat(a as f64 / b as f64))),
            BinaryOp::And => Some(Integer(a & b)),
            BinaryOp::Or => Some(Integer(a | b)),
            BinaryOp::Xor => Some(Integer(a ^ b)),
            BinaryOp::Shl => u32::try_from(b).ok().and_then(|s| a.checked_shl(s)).map(Integer),
            BinaryOp::Shr => u32::try_from(b).ok().and_then(|s| a.checked_shr(s)).map(Integer),
            _ if op.is_comparison() => Some(Boolean(compare(op, a.cmp(&b)))),
            _ => None,
        };
    }

    if let (Some(a), Some(b)) = (left.as_real(), right.as_real()) {
        return match op {
            BinaryOp::Add => Some(Real(OrderedFloat(a + b))),
            BinaryOp::Sub => Some(Real(OrderedFloat(a - b))),
            BinaryOp::Mul => Some(Real(OrderedFloat(a * b))),
            BinaryOp::Divide if b != 0.0 => Some(Real(OrderedFloat(a / b))),
            _ if op.is_comparison() => {
                Some(Boolean(compare(op, OrderedFloat(a).cmp(&OrderedFloat(b)))))
            }
            _ => None,
        };
    }

    None
}

fn compare(op: BinaryOp, ordering: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering::{Equal, Greater, Less};
    match op {
        BinaryOp::Equal => ordering == Equal,
        BinaryOp::NotEqual => ordering != Equal,
        BinaryOp::Less => ordering == Less,
        BinaryOp::Greater => ordering == Greater,
        BinaryOp::LessEqual => ordering != Greater,
        BinaryOp::GreaterEqual => ordering != Less,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_arithmetic() {
        assert_eq!(
            binary(BinaryOp::Add, ConstValue::Integer(2), ConstValue::Integer(3)),
            Some(ConstValue::Integer(5))
        );
        assert_eq!(
            binary(BinaryOp::Shl, ConstValue::Integer(1), ConstValue::Integer(4)),
            Some(ConstValue::Integer(16))
        );
        assert_eq!(binary(BinaryOp::IntDiv, ConstValue::Integer(1), ConstValue::Integer(0)), None);
        assert_eq!(
            binary(BinaryOp::Less, ConstValue::Integer(1), ConstValue::Integer(2)),
            Some(ConstValue::Boolean(true))
        );
    }

    #[test]
    fn mixed_reals_and_strings() {
        assert_eq!(
            binary(BinaryOp::Divide, ConstValue::Integer(1), ConstValue::Integer(2)),
            Some(ConstValue::Real(OrderedFloat(0.5)))
        );
        assert_eq!(
            binary(BinaryOp::Mul, ConstValue::Integer(2), ConstValue::Real(OrderedFloat(1.5))),
            Some(ConstValue::Real(OrderedFloat(3.0)))
        );
        assert_eq!(
            binary(
                BinaryOp::Add,
                ConstValue::String("ab".into()),
                ConstValue::Char('c')
            ),
            Some(ConstValue::String("abc".into()))
        );
    }

    #[test]
    fn unary_and_literals() {
        assert_eq!(unary(UnaryOp::Negate, ConstValue::Integer(4)), Some(ConstValue::Integer(-4)));
        assert_eq!(unary(UnaryOp::Not, ConstValue::Boolean(false)), Some(ConstValue::Boolean(true)));
        assert_eq!(literal_value(&Literal::String("x")), ConstValue::Char('x'));
        assert_eq!(literal_value(&Literal::String("")), ConstValue::String(String::new()));
    }
}
