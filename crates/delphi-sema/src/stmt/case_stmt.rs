//! `case` statements.

use delphi_core::SemanticError;
use delphi_parser::ast::CaseStmt;

use super::StmtChecker;
use crate::types::{display_type, is_ordinal, is_unresolved};
use crate::view::ProgramView;

impl<'a, 'p> StmtChecker<'a, 'p> {
    /// The selector must be ordinal; every label is checked against its type.
    pub(super) fn check_case(&mut self, case: &CaseStmt<'_>) {
        let info = self.expr_checker().infer(case.selector);
        let selector = self.expr_checker().value_type(&info);

        let view: &dyn ProgramView = &*self.ctx;
        let usable = !is_unresolved(view, selector) && is_ordinal(view, selector);
        if !is_unresolved(view, selector) && !usable {
            let from = display_type(view, selector);
            self.ctx.report(SemanticError::TypeMismatch {
                from,
                to: "ordinal type".to_string(),
                span: case.selector.span,
            });
        }

        for arm in case.arms {
            for label in arm.labels {
                let mut checker = self.expr_checker();
                for bound in std::iter::once(label.low).chain(label.high) {
                    if usable {
                        checker.check(bound, selector);
                    } else {
                        checker.infer(bound);
                    }
                }
            }
            self.check(arm.body);
        }
        if let Some(else_branch) = case.else_branch {
            self.check_stmts(else_branch);
        }
    }
}

#[cfg(test)]
mod tests {
    use delphi_core::SemanticError;

    use crate::test_support::{errors_of, resolve_one};

    #[test]
    fn labels_follow_the_selector() {
        let facts = resolve_one(
            "unit Cases; interface
             type TShape = (Circle, Square, Triangle);
             implementation
             function Corners(Shape: TShape): Integer;
             begin
               case Shape of
                 Circle: Result := 0;
                 Square, Triangle: Result := 4;
               else
                 Result := -1;
               end;
             end;
             end.",
        );
        assert!(errors_of(&facts, "Cases").is_empty(), "{:?}", errors_of(&facts, "Cases"));
    }

    #[test]
    fn string_selector_is_rejected() {
        let facts = resolve_one(
            "unit Words; interface implementation
             procedure Run(const S: string);
             begin
               case S of
                 'a': ;
               end;
             end;
             end.",
        );
        let errors = errors_of(&facts, "Words");
        assert!(
            matches!(errors.as_slice(), [SemanticError::TypeMismatch { to, .. }] if to == "ordinal type"),
            "{errors:?}"
        );
    }
}
