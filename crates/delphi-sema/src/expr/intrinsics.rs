//! Compiler intrinsics.
//!
//! Intrinsics have no fixed signature; each is typed by its own rule from
//! the types of its arguments.

use delphi_core::{ArrayShape, DeclRef, Intrinsic, SemanticError, Span, TypeKind, TypeRef};
use delphi_parser::ast::Expr;
use delphi_registry::known;

use super::ExprChecker;
use crate::expr_info::ExprInfo;
use crate::types::{display_type, integer_kind, is_ordinal, is_unresolved, kind_of};
use crate::view::ProgramView;

pub(super) fn check_intrinsic(
    checker: &mut ExprChecker,
    intrinsic: Intrinsic,
    decl: DeclRef,
    args: &[Expr<'_>],
    span: Span,
) -> ExprInfo {
    if intrinsic == Intrinsic::Exit {
        return check_exit(checker, decl, args, span);
    }

    let writes_first = matches!(
        intrinsic,
        Intrinsic::Inc
            | Intrinsic::Dec
            | Intrinsic::SetLength
            | Intrinsic::Include
            | Intrinsic::Exclude
            | Intrinsic::New
            | Intrinsic::Dispose
    );
    let infos: Vec<ExprInfo> = args
        .iter()
        .enumerate()
        .map(|(i, arg)| {
            if i == 0 && writes_first {
                checker.infer_write(arg)
            } else {
                checker.infer_read(arg)
            }
        })
        .collect();
    let first = infos.first().copied();
    // Type names stand for themselves (`High(TColor)`, `SizeOf(Integer)`).
    let first_ty = first.map(|info| info.ty);

    let result = match intrinsic {
        Intrinsic::Length | Intrinsic::Pos | Intrinsic::SizeOf => known::INTEGER,
        Intrinsic::High | Intrinsic::Low => first_ty.map_or(known::UNRESOLVED, |ty| bound_type(checker, ty)),
        Intrinsic::Ord => match first_ty {
            Some(ty) if integer_kind(checker.ctx(), ty).is_some_and(|k| k.is_64_bit()) => known::INT64,
            Some(ty) => {
                check_ordinal(checker, ty, args, span);
                known::INTEGER
            }
            None => known::INTEGER,
        },
        Intrinsic::Chr => known::CHAR,
        Intrinsic::Succ | Intrinsic::Pred => match first_ty {
            Some(ty) => {
                check_ordinal(checker, ty, args, span);
                value_of(checker, ty)
            }
            None => known::UNRESOLVED,
        },
        Intrinsic::Abs => first_ty.map_or(known::UNRESOLVED, |ty| value_of(checker, ty)),
        Intrinsic::Assigned | Intrinsic::Odd => known::BOOLEAN,
        Intrinsic::Trunc | Intrinsic::Round => known::INT64,
        Intrinsic::Copy => first_ty.map_or(known::UNRESOLVED, |ty| value_of(checker, ty)),
        Intrinsic::Concat => known::UNICODESTRING,
        Intrinsic::SetLength
        | Intrinsic::Inc
        | Intrinsic::Dec
        | Intrinsic::Exit
        | Intrinsic::Break
        | Intrinsic::Continue
        | Intrinsic::Halt
        | Intrinsic::Include
        | Intrinsic::Exclude
        | Intrinsic::New
        | Intrinsic::Dispose => return ExprInfo::nothing(Some(decl)),
    };

    // Folding keeps `Length('abc')` usable in constant expressions.
    let literal = intrinsic != Intrinsic::Length
        && !infos.is_empty()
        && infos.iter().all(|i| i.is_literal || i.is_type());
    let info = if literal {
        ExprInfo::literal(result)
    } else {
        ExprInfo::value(result)
    };
    info.with_decl(decl)
}

/// `High`/`Low`: ordinal types give themselves, arrays their index type,
/// dynamic arrays and strings `Integer`.
fn bound_type(checker: &ExprChecker, ty: TypeRef) -> TypeRef {
    let view = checker.ctx();
    match kind_of(view, ty) {
        TypeKind::Array(array) => match &array.shape {
            ArrayShape::Static(dims) => dims.first().copied().unwrap_or(known::INTEGER),
            _ => known::INTEGER,
        },
        TypeKind::String { .. } => known::INTEGER,
        TypeKind::MetaClass(_) => known::UNRESOLVED,
        _ if is_ordinal(view, ty) => ty,
        _ => known::UNRESOLVED,
    }
}

fn value_of(checker: &ExprChecker, ty: TypeRef) -> TypeRef {
    if is_unresolved(checker.ctx(), ty) { known::UNRESOLVED } else { ty }
}

fn check_ordinal(checker: &mut ExprChecker, ty: TypeRef, args: &[Expr<'_>], span: Span) {
    let view = checker.ctx();
    if is_unresolved(view, ty) || is_ordinal(view, ty) {
        return;
    }
    let from = display_type(view, ty);
    let span = args.first().map_or(span, |a| a.span);
    checker.ctx_mut().report(SemanticError::TypeMismatch {
        from,
        to: "ordinal type".to_string(),
        span,
    });
}

/// `Exit(X)` checks `X` against the enclosing function's result.
fn check_exit(checker: &mut ExprChecker, decl: DeclRef, args: &[Expr<'_>], span: Span) -> ExprInfo {
    let result = checker
        .ctx()
        .enclosing_routine(checker.site().scope)
        .and_then(|r| checker.ctx().decl(r))
        .and_then(|d| d.as_routine())
        .and_then(|r| r.signature.result);
    match (args, result) {
        ([], _) => {}
        ([value], Some(result)) => {
            checker.check(value, result);
        }
        (_, _) => {
            for arg in args {
                checker.infer_read(arg);
            }
            checker.ctx_mut().report(SemanticError::Unsupported {
                message: "'Exit' with a value outside a function".to_string(),
                span,
            });
        }
    }
    ExprInfo::nothing(Some(decl))
}

#[cfg(test)]
mod tests {
    use delphi_core::SemanticError;
    use delphi_registry::known;

    use crate::test_support::{errors_of, resolve_one, types_on_line};

    #[test]
    fn intrinsic_result_types() {
        let facts = resolve_one(
            "unit Intr; interface
             type TColor = (Red, Green, Blue);
             implementation
             function Pick(const S: string): Integer;
             var C: TColor; N: Integer; B: Boolean;
             begin
               C := High(TColor);
               N := Length(S) + Ord(C);
               B := Assigned(nil);
               Exit(N);
             end;
             end.",
        );
        assert!(errors_of(&facts, "Intr").is_empty(), "{:?}", errors_of(&facts, "Intr"));
        assert!(types_on_line(&facts, "Intr", 8).contains(&known::INTEGER));
        assert!(types_on_line(&facts, "Intr", 9).contains(&known::BOOLEAN));
    }

    #[test]
    fn exit_value_is_checked_against_result() {
        let facts = resolve_one(
            "unit Early; interface implementation
             function Name: string;
             begin
               Exit(1.5);
             end;
             end.",
        );
        let errors = errors_of(&facts, "Early");
        assert!(matches!(errors.as_slice(), [SemanticError::TypeMismatch { .. }]), "{errors:?}");
    }
}
