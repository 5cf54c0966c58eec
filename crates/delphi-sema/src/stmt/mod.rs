//! Statement checking for routine bodies and unit initialization.
//!
//! The [`StmtChecker`] walks statements and hands every expression to an
//! [`ExprChecker`], handling:
//! - Assignment targets, which record write accessors of properties
//! - Conditions checked against `Boolean`
//! - `for` loops, including inline loop variables
//! - `with` subjects, whose members are searched before the scope chain
//! - Exception handlers that declare their exception variable
//!
//! # Example
//!
//! ```ignore
//! let mut checker = StmtChecker::new(&mut ctx, Site::new(body_scope).with_context(routine));
//! checker.check_block(&body.block);
//! ```

mod case_stmt;
mod loops;
mod try_except;
mod with_stmt;

use delphi_core::{
    DeclKind, DeclRef, Declaration, ScopeId, ScopeKind, SemanticError, Span, TypeRef, Variable,
    VariableKind,
};
use delphi_parser::ast::{Block, Expr, Ident, Stmt, StmtKind};
use delphi_registry::known;

use crate::context::{ResolveContext, Site};
use crate::expr::ExprChecker;
use crate::expr_info::ExprInfo;
use crate::view::ProgramView;

/// Checks statements at one site.
pub struct StmtChecker<'a, 'p> {
    ctx: &'a mut ResolveContext<'p>,
    site: Site,
    /// Types of the enclosing `with` subjects, innermost last.
    with_subjects: Vec<TypeRef>,
}

impl<'a, 'p> StmtChecker<'a, 'p> {
    pub fn new(ctx: &'a mut ResolveContext<'p>, site: Site) -> Self {
        Self {
            ctx,
            site,
            with_subjects: Vec::new(),
        }
    }

    /// Check every statement of a `begin ... end` block.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn check_block(&mut self, block: &Block<'_>) {
        self.check_stmts(block.stmts);
    }

    pub fn check_stmts(&mut self, stmts: &[Stmt<'_>]) {
        for stmt in stmts {
            self.check(stmt);
        }
    }

    /// Check a statement.
    pub fn check(&mut self, stmt: &Stmt<'_>) {
        match stmt.kind {
            StmtKind::Compound(block) => self.check_block(&block),
            StmtKind::Assign { target, value } => self.check_assign(target, value),
            StmtKind::Expr(expr) => {
                self.expr_checker().infer(expr);
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.check_condition(condition);
                self.check(then_branch);
                if let Some(else_branch) = else_branch {
                    self.check(else_branch);
                }
            }
            StmtKind::Case(case) => self.check_case(case),
            StmtKind::While { condition, body } => {
                self.check_condition(condition);
                self.check(body);
            }
            StmtKind::Repeat { body, condition } => {
                self.check_stmts(body);
                self.check_condition(condition);
            }
            StmtKind::For(for_stmt) => self.check_for(for_stmt),
            StmtKind::ForIn(for_in) => self.check_for_in(for_in),
            StmtKind::With { subjects, body } => self.check_with(subjects, body),
            StmtKind::Try(try_stmt) => self.check_try(try_stmt),
            StmtKind::Raise { exception, at } => self.check_raise(exception, at),
            StmtKind::Empty => {}
        }
    }

    /// An expression checker at the current site and `with` nesting.
    pub(crate) fn expr_checker(&mut self) -> ExprChecker<'_, 'p> {
        ExprChecker::new(&mut *self.ctx, self.site).with_subjects(&self.with_subjects)
    }

    fn check_assign(&mut self, target: &Expr<'_>, value: &Expr<'_>) {
        let target_info = self.expr_checker().for_write().infer(target);
        let mut checker = self.expr_checker();
        let target_ty = checker.value_type(&target_info);
        if target_info.is_value() {
            checker.check(value, target_ty);
        } else {
            checker.infer(value);
        }
    }

    fn check_condition(&mut self, condition: &Expr<'_>) -> ExprInfo {
        self.expr_checker().check(condition, known::BOOLEAN)
    }

    // =========================================================================
    // Block-scoped declarations
    // =========================================================================

    /// Run `f` in a new block scope nested in the current one.
    fn in_block<R>(&mut self, f: impl FnOnce(&mut Self, ScopeId) -> R) -> R {
        let scope = self
            .ctx
            .builder_mut()
            .add_scope(ScopeKind::Block, Some(self.site.scope));
        let outer = self.site;
        self.site = Site { scope, ..outer };
        let result = f(self, scope);
        self.site = outer;
        result
    }

    /// Declare a block-local variable (inline loop variable, handler variable).
    fn declare_local(&mut self, scope: ScopeId, name: &Ident<'_>, ty: TypeRef, kind: VariableKind) -> DeclRef {
        let declaration = Declaration::new(
            name.name,
            self.ctx.qualify(scope, name.name),
            DeclKind::Variable(Variable { ty, kind }),
            self.ctx.unit_id(),
            scope,
        )
        .with_section(self.ctx.section())
        .with_span(name.span)
        .with_node(name.id);

        let decl = match self.ctx.builder_mut().add_and_declare(scope, declaration) {
            Ok(decl) => decl,
            Err((decl, taken)) => {
                let original = self.ctx.decl(taken.existing).map_or(Span::default(), |d| d.span);
                self.ctx.report(SemanticError::DuplicateDeclaration {
                    name: name.name.to_string(),
                    original,
                    span: name.span,
                });
                decl
            }
        };
        self.ctx.bind_node(name.id, decl);
        self.ctx.record_type(name.id, ty);
        decl
    }
}
