//! `try` blocks, exception handlers and `raise`.

use delphi_core::{SemanticError, Span, TypeRef, VariableKind};
use delphi_parser::ast::{ExceptHandler, Expr, TryHandler, TryStmt};
use delphi_registry::known;

use super::StmtChecker;
use crate::type_resolver::TypeResolver;
use crate::types::{display_type, is_class_descendant, is_unresolved, kind_of};
use crate::view::ProgramView;

impl<'a, 'p> StmtChecker<'a, 'p> {
    pub(super) fn check_try(&mut self, try_stmt: &TryStmt<'_>) {
        self.check_stmts(try_stmt.body);
        match try_stmt.handler {
            TryHandler::Except {
                handlers,
                stmts,
                else_branch,
            } => {
                for handler in handlers {
                    self.check_handler(handler);
                }
                self.check_stmts(stmts);
                if let Some(else_branch) = else_branch {
                    self.check_stmts(else_branch);
                }
            }
            TryHandler::Finally(stmts) => self.check_stmts(stmts),
        }
    }

    /// `on E: EClass do`: the handler body sees `E` in its own block scope.
    fn check_handler(&mut self, handler: &ExceptHandler<'_>) {
        let ty = TypeResolver::new(self.ctx, self.site).resolve(handler.ty);
        self.check_exception_type(ty, handler.ty.span);
        match handler.var {
            Some(var) => self.in_block(|this, scope| {
                this.declare_local(scope, &var, ty, VariableKind::Handler);
                this.check(handler.body);
            }),
            None => self.check(handler.body),
        }
    }

    /// `raise E` needs a class instance; `at` takes an address.
    pub(super) fn check_raise(&mut self, exception: Option<&Expr<'_>>, at: Option<&Expr<'_>>) {
        if let Some(exception) = exception {
            let info = self.expr_checker().infer(exception);
            let ty = self.expr_checker().value_type(&info);
            self.check_exception_type(ty, exception.span);
        }
        if let Some(at) = at {
            self.expr_checker().check(at, known::POINTER);
        }
    }

    fn check_exception_type(&mut self, ty: TypeRef, span: Span) {
        let view: &dyn ProgramView = &*self.ctx;
        if is_unresolved(view, ty)
            || (kind_of(view, ty).as_class().is_some() && is_class_descendant(view, ty, known::TOBJECT))
        {
            return;
        }
        let from = display_type(view, ty);
        self.ctx.report(SemanticError::TypeMismatch {
            from,
            to: "class".to_string(),
            span,
        });
    }
}

#[cfg(test)]
mod tests {
    use delphi_core::SemanticError;

    use crate::test_support::{decl_named, declarations_on_line, errors_of, resolve_one};

    #[test]
    fn handler_variable_is_scoped_to_its_body() {
        let facts = resolve_one(
            "unit Guard; interface
             type EFailure = class(TObject) Code: Integer; end;
             implementation
             procedure Run;
             var N: Integer;
             begin
               try
                 raise EFailure.Create;
               except
                 on E: EFailure do N := E.Code;
               end;
             end;
             end.",
        );
        assert!(errors_of(&facts, "Guard").is_empty(), "{:?}", errors_of(&facts, "Guard"));
        let e = decl_named(&facts, "Guard.Run.E");
        assert!(declarations_on_line(&facts, "Guard", 10).contains(&e));
    }

    #[test]
    fn raising_a_non_class_is_rejected() {
        let facts = resolve_one(
            "unit Throw; interface implementation
             procedure Run;
             begin
               raise 42;
             end;
             end.",
        );
        let errors = errors_of(&facts, "Throw");
        assert!(
            matches!(errors.as_slice(), [SemanticError::TypeMismatch { to, .. }] if to == "class"),
            "{errors:?}"
        );
    }
}
