//! `for ... to` and `for ... in` loops.

use delphi_core::{DeclKind, SemanticError, Span, TypeRef, VariableKind};
use delphi_parser::ast::{Expr, ExprKind, ForInStmt, ForStmt, LoopVar};
use delphi_registry::known;

use super::StmtChecker;
use crate::conversion::can_implicitly_convert;
use crate::type_resolver::TypeResolver;
use crate::types::{display_type, element_type, is_ordinal, is_unresolved, lookup_member, member_host};
use crate::view::ProgramView;

impl<'a, 'p> StmtChecker<'a, 'p> {
    /// Check a counting loop. The control variable must be ordinal.
    pub(super) fn check_for(&mut self, for_stmt: &ForStmt<'_>) {
        if for_stmt.var.is_inline {
            let from = self.expr_checker().infer(for_stmt.from);
            let from_ty = self.expr_checker().value_type(&from);
            self.in_block(|this, scope| {
                let ty = this.loop_var_type(&for_stmt.var, from_ty);
                this.declare_local(scope, &for_stmt.var.name, ty, VariableKind::Loop);
                this.check_bounds(for_stmt, ty, true);
            });
            return;
        }

        let var = ident_expr(&for_stmt.var);
        let info = self.expr_checker().infer_write(&var);
        let ty = self.expr_checker().value_type(&info);
        self.check_ordinal(ty, for_stmt.var.name.span);
        self.expr_checker().check(for_stmt.from, ty);
        self.check_bounds(for_stmt, ty, false);
    }

    fn check_bounds(&mut self, for_stmt: &ForStmt<'_>, ty: TypeRef, check_from: bool) {
        if check_from {
            self.check_ordinal(ty, for_stmt.var.name.span);
        }
        self.expr_checker().check(for_stmt.to, ty);
        self.check(for_stmt.body);
    }

    /// Check `for X in Collection`.
    ///
    /// Arrays, strings and sets yield their element type; classes and
    /// records go through `GetEnumerator` and the enumerator's `Current`.
    pub(super) fn check_for_in(&mut self, for_in: &ForInStmt<'_>) {
        let info = self.expr_checker().infer(for_in.collection);
        let collection = self.expr_checker().value_type(&info);
        let element = self.enumerated_type(collection, for_in.collection);

        if for_in.var.is_inline {
            self.in_block(|this, scope| {
                let ty = this.loop_var_type(&for_in.var, element);
                this.declare_local(scope, &for_in.var.name, ty, VariableKind::Loop);
                this.check(for_in.body);
            });
            return;
        }

        let var = ident_expr(&for_in.var);
        let var_info = self.expr_checker().infer_write(&var);
        let var_ty = self.expr_checker().value_type(&var_info);
        self.check_element(element, var_ty, for_in.collection.span);
        self.check(for_in.body);
    }

    /// Declared type of an inline loop variable, or the type it is inferred from.
    fn loop_var_type(&mut self, var: &LoopVar<'_>, inferred: TypeRef) -> TypeRef {
        match var.ty {
            Some(texpr) => TypeResolver::new(self.ctx, self.site).resolve(texpr),
            None => inferred,
        }
    }

    fn enumerated_type(&mut self, collection: TypeRef, expr: &Expr<'_>) -> TypeRef {
        let view: &dyn ProgramView = &*self.ctx;
        if is_unresolved(view, collection) {
            return known::UNRESOLVED;
        }
        if let Some(element) = element_type(view, collection) {
            return element;
        }

        let host = member_host(view, collection);
        let enumerator = lookup_member(view, host, "GetEnumerator")
            .and_then(|g| g.decls.first().copied())
            .and_then(|d| Some((d, view.decl(d)?.as_routine()?.signature.result?)));
        let current = enumerator.and_then(|(_, ty)| {
            let group = lookup_member(view, member_host(view, ty), "Current")?;
            let decl = *group.decls.first()?;
            let ty = view.decl(decl)?.kind.value_type()?;
            Some((decl, ty))
        });

        match (enumerator, current) {
            (Some((get_enumerator, _)), Some((current, ty))) => {
                let site = self.site;
                self.ctx.record_reference(expr.id, expr.span, get_enumerator, site);
                self.ctx.record_reference(expr.id, expr.span, current, site);
                // `Current` is normally a property; its read accessor is used too.
                if let Some(DeclKind::Property(prop)) = self.ctx.decl(current).map(|d| &d.kind)
                    && let Some(getter) = prop.read.as_ref().and_then(|a| a.target)
                {
                    self.ctx
                        .record_reference(expr.id, expr.span, getter, site.with_context(current));
                }
                ty
            }
            _ => {
                let from = display_type(&*self.ctx, collection);
                self.ctx.report(SemanticError::TypeMismatch {
                    from,
                    to: "enumerable type".to_string(),
                    span: expr.span,
                });
                known::UNRESOLVED
            }
        }
    }

    fn check_element(&mut self, element: TypeRef, var_ty: TypeRef, span: Span) {
        let view: &dyn ProgramView = &*self.ctx;
        if is_unresolved(view, element)
            || is_unresolved(view, var_ty)
            || can_implicitly_convert(view, element, var_ty, false)
        {
            return;
        }
        let from = display_type(view, element);
        let to = display_type(view, var_ty);
        self.ctx.report(SemanticError::TypeMismatch { from, to, span });
    }

    fn check_ordinal(&mut self, ty: TypeRef, span: Span) {
        let view: &dyn ProgramView = &*self.ctx;
        if is_unresolved(view, ty) || is_ordinal(view, ty) {
            return;
        }
        let from = display_type(view, ty);
        self.ctx.report(SemanticError::TypeMismatch {
            from,
            to: "ordinal type".to_string(),
            span,
        });
    }
}

/// The loop variable as an identifier expression; identifier expressions
/// share the id of their identifier.
fn ident_expr<'ast>(var: &LoopVar<'ast>) -> Expr<'ast> {
    Expr {
        id: var.name.id,
        kind: ExprKind::Ident(var.name),
        span: var.name.span,
    }
}
