//! `with` statements.

use delphi_core::{SemanticError, TypeKind};
use delphi_parser::ast::{Expr, Stmt};

use super::StmtChecker;
use crate::types::{display_type, is_unresolved, kind_of, member_host};
use crate::view::ProgramView;

impl<'a, 'p> StmtChecker<'a, 'p> {
    /// Each subject's members shadow everything outside the `with` body,
    /// later subjects shadowing earlier ones.
    pub(super) fn check_with(&mut self, subjects: &[Expr<'_>], body: &Stmt<'_>) {
        let depth = self.with_subjects.len();
        for subject in subjects {
            let info = self.expr_checker().infer(subject);
            let ty = self.expr_checker().value_type(&info);

            let view: &dyn ProgramView = &*self.ctx;
            if is_unresolved(view, ty) {
                continue;
            }
            let host = member_host(view, ty);
            match kind_of(view, host) {
                TypeKind::Record(_) | TypeKind::Class(_) | TypeKind::Interface(_) => {
                    self.with_subjects.push(host);
                }
                _ => {
                    let from = display_type(view, ty);
                    self.ctx.report(SemanticError::TypeMismatch {
                        from,
                        to: "record, class or interface".to_string(),
                        span: subject.span,
                    });
                }
            }
        }
        self.check(body);
        self.with_subjects.truncate(depth);
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::{decl_named, declarations_on_line, errors_of, resolve_one};

    #[test]
    fn with_members_shadow_locals() {
        let facts = resolve_one(
            "unit Shapes; interface
             type TRect = record Left, Width: Integer; end;
             implementation
             procedure Run(var R: TRect);
             var Width: string;
             begin
               with R do
                 Width := Left + 1;
             end;
             end.",
        );
        assert!(errors_of(&facts, "Shapes").is_empty(), "{:?}", errors_of(&facts, "Shapes"));
        let field = decl_named(&facts, "Shapes.TRect.Width");
        assert!(declarations_on_line(&facts, "Shapes", 8).contains(&field));
    }
}
