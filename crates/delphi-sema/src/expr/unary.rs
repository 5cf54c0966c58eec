//! Unary operators and the address-of operator.

use delphi_core::TypeRef;
use delphi_parser::ast::{Expr, UnaryOp};
use delphi_registry::known;

use super::{ExprChecker, identifiers};
use crate::context::DerivedType;
use crate::expr_info::ExprInfo;
use crate::operators::unary_result;

pub(super) fn check_unary(
    checker: &mut ExprChecker,
    _expr: &Expr<'_>,
    op: UnaryOp,
    operand: &Expr<'_>,
    expected: Option<TypeRef>,
) -> ExprInfo {
    if op == UnaryOp::AddressOf {
        return address_of(checker, operand, expected);
    }

    let info = checker.infer_read(operand);
    let ty = checker.value_type(&info);
    let result = unary_result(checker.ctx(), op, ty).unwrap_or(known::UNRESOLVED);
    if info.is_literal {
        ExprInfo::literal(result)
    } else {
        ExprInfo::value(result)
    }
}

/// `@X`: a routine yields its procedural type, anything else `Pointer`.
fn address_of(checker: &mut ExprChecker, operand: &Expr<'_>, expected: Option<TypeRef>) -> ExprInfo {
    if let Some(ident) = operand.unparen().as_ident()
        && let Some(found) = checker.lookup_name(ident.name)
        && found.group.routines
    {
        let decl = expected
            .and_then(|ty| identifiers::procedural_match(checker, &found.group.decls, ty))
            .or_else(|| found.group.decls.first().copied());
        if let Some(decl) = decl {
            checker.bind(ident.id, ident.span, decl);
            let ty = checker.ctx_mut().derived_type(DerivedType::Routine(decl));
            checker.record(operand.id, &ExprInfo::value(ty));
            return ExprInfo::value(ty).with_decl(decl);
        }
    }

    checker.infer_read(operand);
    ExprInfo::value(known::POINTER)
}

#[cfg(test)]
mod tests {
    use delphi_registry::known;

    use crate::test_support::{decl_named, declarations_on_line, errors_of, resolve_one, types_on_line};

    #[test]
    fn negation_and_not() {
        let facts = resolve_one(
            "unit Signs; interface implementation
             procedure Run;
             var I: Integer; B: Boolean;
             begin
               I := -I;
               B := not B;
               I := not I;
             end;
             end.",
        );
        assert!(errors_of(&facts, "Signs").is_empty(), "{:?}", errors_of(&facts, "Signs"));
        assert!(types_on_line(&facts, "Signs", 6).contains(&known::BOOLEAN));
        assert!(types_on_line(&facts, "Signs", 7).contains(&known::INTEGER));
    }

    #[test]
    fn address_of_routine_and_variable() {
        let facts = resolve_one(
            "unit Addr; interface
             type TProc = procedure;
             implementation
             procedure Tick; begin end;
             procedure Run;
             var P: Pointer; F: TProc; N: Integer;
             begin
               F := @Tick;
               P := @N;
             end;
             end.",
        );
        assert!(errors_of(&facts, "Addr").is_empty(), "{:?}", errors_of(&facts, "Addr"));
        let tick = decl_named(&facts, "Addr.Tick");
        assert!(declarations_on_line(&facts, "Addr", 8).contains(&tick));
        assert!(types_on_line(&facts, "Addr", 9).contains(&known::POINTER));
    }
}
