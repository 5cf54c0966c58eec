//! Literal, aggregate and record constant typing.

use delphi_core::{SemanticError, TypeKind, TypeRef};
use delphi_parser::ast::{Expr, FieldInit, Literal};
use delphi_registry::known;

use super::ExprChecker;
use crate::expr_info::ExprInfo;
use crate::types::{display_type, element_type, kind_of, lookup_member};

/// Integer literals are `Integer` unless they need 64 bits; real literals are `Extended`.
pub(super) fn check_literal(_checker: &mut ExprChecker, _expr: &Expr<'_>, lit: &Literal<'_>) -> ExprInfo {
    let ty = match *lit {
        Literal::Integer(v) if i32::try_from(v).is_ok() => known::INTEGER,
        Literal::Integer(_) => known::INT64,
        Literal::Real(_) => known::EXTENDED,
        Literal::String(_) if lit.is_char() => known::CHAR,
        Literal::String(_) => known::UNICODESTRING,
        Literal::Nil => known::NIL,
    };
    ExprInfo::literal(ty)
}

/// `(1, 2, 3)` in a typed constant: each item is checked against the element type.
pub(super) fn check_aggregate(
    checker: &mut ExprChecker,
    _expr: &Expr<'_>,
    items: &[Expr<'_>],
    expected: Option<TypeRef>,
) -> ExprInfo {
    let element = expected.and_then(|ty| element_type(checker.ctx(), ty));
    for item in items {
        match element {
            Some(element) => {
                checker.check(item, element);
            }
            None => {
                checker.infer(item);
            }
        }
    }
    match expected {
        Some(ty) => ExprInfo::literal(ty),
        None => ExprInfo::unresolved(),
    }
}

/// `(X: 1; Y: 2)` in a typed record constant: field names bind to the record's fields.
pub(super) fn check_record_const(
    checker: &mut ExprChecker,
    _expr: &Expr<'_>,
    fields: &[FieldInit<'_>],
    expected: Option<TypeRef>,
) -> ExprInfo {
    let Some(record) = expected.filter(|&ty| matches!(kind_of(checker.ctx(), ty), TypeKind::Record(_))) else {
        for field in fields {
            checker.infer(field.value);
        }
        return ExprInfo::unresolved();
    };

    for field in fields {
        let found = lookup_member(checker.ctx(), record, field.name.name).and_then(|g| g.decls.first().copied());
        match found {
            Some(decl) => {
                checker.bind(field.name.id, field.name.span, decl);
                let ty = checker.decl_info(decl).ty;
                checker.check(field.value, ty);
            }
            None => {
                let type_name = display_type(checker.ctx(), record);
                checker.ctx_mut().report(SemanticError::UnknownMember {
                    type_name,
                    member: field.name.name.to_string(),
                    span: field.name.span,
                });
                checker.infer(field.value);
            }
        }
    }
    ExprInfo::literal(record)
}

#[cfg(test)]
mod tests {
    use delphi_registry::known;

    use crate::test_support::{errors_of, resolve_one, types_on_line};

    #[test]
    fn literal_types() {
        let facts = resolve_one(
            "unit Lits; interface implementation
             procedure Run;
             var I: Int64; S: string; C: Char; E: Extended;
             begin
               I := 5000000000;
               S := 'text';
               C := 'x';
               E := 1.5;
             end;
             end.",
        );
        assert!(errors_of(&facts, "Lits").is_empty());
        assert!(types_on_line(&facts, "Lits", 5).contains(&known::INT64));
        assert!(types_on_line(&facts, "Lits", 6).contains(&known::UNICODESTRING));
        assert!(types_on_line(&facts, "Lits", 7).contains(&known::CHAR));
        assert!(types_on_line(&facts, "Lits", 8).contains(&known::EXTENDED));
    }

    #[test]
    fn typed_record_and_array_constants() {
        let facts = resolve_one(
            "unit Consts; interface
             type TPoint = record X, Y: Integer; end;
             const Origin: TPoint = (X: 0; Y: 0);
             const Primes: array[0..2] of Integer = (2, 3, 5);
             implementation end.",
        );
        assert!(errors_of(&facts, "Consts").is_empty(), "{:?}", errors_of(&facts, "Consts"));
    }
}
