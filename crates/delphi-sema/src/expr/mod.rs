//! Expression checking using bidirectional typing.
//!
//! The [`ExprChecker`] resolves AST expressions and records their facts:
//! - `infer()` - synthesizes the type from the expression (bottom-up)
//! - `check()` - checks the expression against an expected type (top-down)
//!
//! Resolution never fails outright. A name that cannot be resolved is
//! reported once and typed `Unresolved`, and everything built on top of it
//! degrades quietly.
//!
//! # Example
//!
//! ```ignore
//! let mut checker = ExprChecker::new(&mut ctx, Site::new(scope));
//! let info = checker.infer(&expr);
//! let info = checker.check(&expr, known::INTEGER);
//! ```

mod binary;
mod calls;
mod identifiers;
mod intrinsics;
mod literals;
pub(crate) mod member;
mod unary;

use delphi_core::{DeclKind, DeclRef, Declaration, Name, NodeId, SemanticError, Span, SymbolGroup, TypeRef};
use delphi_parser::ast::{Expr, ExprKind};
use delphi_registry::known;

use crate::context::{ResolveContext, Site};
use crate::conversion::can_implicitly_convert;
use crate::expr_info::{Denotes, ExprInfo};
use crate::scope::{Via, lookup};
use crate::types::{display_type, is_unresolved, lookup_member};
use crate::view::ProgramView;
use crate::visibility::{AccessSite, is_accessible};

/// Whether the expression being checked is read or written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Access {
    #[default]
    Read,
    Write,
}

/// A name found from the current site.
#[derive(Debug, Clone)]
pub(crate) struct Found {
    pub group: SymbolGroup,
    /// Type the name is a member of, when found through `with`, `Self` or a type body.
    pub receiver: Option<TypeRef>,
}

/// Resolves expressions and records their facts.
pub struct ExprChecker<'a, 'p> {
    ctx: &'a mut ResolveContext<'p>,
    site: Site,
    /// Types of the enclosing `with` subjects, innermost last.
    with_subjects: Vec<TypeRef>,
    access: Access,
}

impl<'a, 'p> ExprChecker<'a, 'p> {
    pub fn new(ctx: &'a mut ResolveContext<'p>, site: Site) -> Self {
        Self {
            ctx,
            site,
            with_subjects: Vec::new(),
            access: Access::Read,
        }
    }

    /// Search the members of these `with` subjects before the scope chain.
    pub fn with_subjects(mut self, subjects: &[TypeRef]) -> Self {
        self.with_subjects = subjects.to_vec();
        self
    }

    /// Check the outermost expression as an assignment target.
    pub fn for_write(mut self) -> Self {
        self.access = Access::Write;
        self
    }

    pub(crate) fn ctx(&self) -> &ResolveContext<'p> {
        self.ctx
    }

    pub(crate) fn ctx_mut(&mut self) -> &mut ResolveContext<'p> {
        self.ctx
    }

    pub(crate) fn site(&self) -> Site {
        self.site
    }

    pub(crate) fn access(&self) -> Access {
        self.access
    }

    /// Synthesize the type of an expression (infer mode).
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn infer(&mut self, expr: &Expr<'_>) -> ExprInfo {
        self.infer_with(expr, None)
    }

    /// Check an expression against an expected type (check mode).
    ///
    /// The expected type guides set constructors, aggregates, `nil` and bare
    /// routine names; a value that does not convert implicitly is reported
    /// as a type mismatch unless either side is already unresolved.
    pub fn check(&mut self, expr: &Expr<'_>, expected: TypeRef) -> ExprInfo {
        let info = self.infer_with(expr, Some(expected));
        if !info.is_value() && !info.is_type() {
            return info;
        }
        let actual = self.value_type(&info);
        let view: &dyn ProgramView = &*self.ctx;
        if !is_unresolved(view, actual)
            && !is_unresolved(view, expected)
            && !can_implicitly_convert(view, actual, expected, info.is_literal)
        {
            let from = display_type(view, actual);
            let to = display_type(view, expected);
            self.ctx.report(SemanticError::TypeMismatch {
                from,
                to,
                span: expr.span,
            });
        }
        info
    }

    /// Infer an operand that is read even when the whole expression is written.
    pub(crate) fn infer_read(&mut self, expr: &Expr<'_>) -> ExprInfo {
        let access = std::mem::replace(&mut self.access, Access::Read);
        let info = self.infer(expr);
        self.access = access;
        info
    }

    /// Infer an operand the enclosing construct writes (`Inc(X)`, `for X :=`).
    pub(crate) fn infer_write(&mut self, expr: &Expr<'_>) -> ExprInfo {
        let access = std::mem::replace(&mut self.access, Access::Write);
        let info = self.infer(expr);
        self.access = access;
        info
    }

    pub(crate) fn infer_with(&mut self, expr: &Expr<'_>, expected: Option<TypeRef>) -> ExprInfo {
        let info = match expr.kind {
            ExprKind::Literal(lit) => literals::check_literal(self, expr, &lit),
            ExprKind::Ident(ident) => identifiers::check_ident(self, expr, &ident, expected),
            ExprKind::Inherited(name) => calls::check_inherited(self, expr, name.as_ref(), &[]),
            ExprKind::Member { base, name } => member::check_member(self, expr, base, &name, expected),
            ExprKind::Call { callee, args } => calls::check_call(self, expr, callee, args),
            ExprKind::Index { base, indices } => member::check_index(self, expr, base, indices),
            ExprKind::Deref(inner) => member::check_deref(self, expr, inner),
            ExprKind::Unary { op, operand } => unary::check_unary(self, expr, op, operand, expected),
            ExprKind::Binary { op, left, right } => binary::check_binary(self, expr, op, left, right),
            ExprKind::SetCtor(elements) => binary::check_set_ctor(self, expr, elements, expected),
            ExprKind::Paren(inner) => self.infer_with(inner, expected),
            ExprKind::Aggregate(items) => literals::check_aggregate(self, expr, items, expected),
            ExprKind::RecordConst(fields) => literals::check_record_const(self, expr, fields, expected),
        };
        self.record(expr.id, &info);
        info
    }

    pub(super) fn record(&mut self, node: NodeId, info: &ExprInfo) {
        match info.denotes {
            Denotes::Value => self.ctx.record_type(node, info.ty),
            Denotes::Type => {
                let ty = self.ctx.type_value(info.ty);
                self.ctx.record_type(node, ty);
            }
            Denotes::Unit(_) | Denotes::Nothing => {}
        }
        if info.is_literal {
            self.ctx.record_literal(node);
        }
    }

    /// Static type of the value an expression produces; type names yield their metaclass.
    pub(crate) fn value_type(&mut self, info: &ExprInfo) -> TypeRef {
        if info.is_type() {
            self.ctx.type_value(info.ty)
        } else {
            info.ty
        }
    }

    // =========================================================================
    // Names
    // =========================================================================

    /// Find an unqualified name: `with` subjects first, then the scope chain.
    ///
    /// `Self` is never taken from a `with` subject.
    pub(crate) fn lookup_name(&self, name: &str) -> Option<Found> {
        if !name.eq_ignore_ascii_case("Self") {
            for &subject in self.with_subjects.iter().rev() {
                if let Some(group) = lookup_member(&*self.ctx, subject, name) {
                    return Some(Found {
                        group,
                        receiver: Some(subject),
                    });
                }
            }
        }
        let imports = self.ctx.import_search_order();
        lookup(&*self.ctx, self.ctx.unit_id(), self.site.scope, name, &imports).map(|found| Found {
            receiver: match found.via {
                Via::Member(ty) => Some(ty),
                _ => None,
            },
            group: found.group,
        })
    }

    /// Bind `node` to `decl`, record the reference and check visibility.
    pub(crate) fn bind(&mut self, node: NodeId, span: Span, decl: DeclRef) {
        self.ctx.record_declaration(node, span, decl, self.site);
        self.check_access(node, span, decl);
    }

    fn check_access(&mut self, node: NodeId, span: Span, decl: DeclRef) {
        let site = AccessSite {
            unit: self.ctx.unit_id(),
            enclosing: self.ctx.enclosing_type(self.site.scope),
        };
        let Some(declaration) = self.ctx.decl(decl) else {
            return;
        };
        if is_accessible(&*self.ctx, declaration, &site) {
            return;
        }
        let name = declaration.qualified_name.to_string();
        let visibility = declaration.visibility.as_str().to_string();
        self.ctx.mark_inaccessible(node);
        self.ctx.report(SemanticError::Inaccessible { name, visibility, span });
    }

    /// Report an unknown name unless a missing import may declare it.
    pub(crate) fn unknown(&mut self, name: &str, span: Span) -> ExprInfo {
        if !self.ctx.has_unresolved_imports() {
            self.ctx.report(SemanticError::UnknownIdentifier {
                name: name.to_string(),
                span,
            });
        }
        ExprInfo::unresolved()
    }

    /// Information for a non-routine declaration used as a value or type.
    pub(crate) fn decl_info(&self, decl: DeclRef) -> ExprInfo {
        let Some(declaration) = self.ctx.decl(decl) else {
            return ExprInfo::unresolved();
        };
        if let Some(ty) = declaration.kind.declared_type() {
            return ExprInfo::type_name(ty, Some(decl));
        }
        let ty = declaration.kind.value_type().unwrap_or(known::UNRESOLVED);
        let info = match &declaration.kind {
            // Untyped constants convert like the literal they stand for.
            DeclKind::Constant(c) if !c.is_typed => ExprInfo::literal(ty),
            _ => ExprInfo::value(ty),
        };
        info.with_decl(decl)
    }

    /// Record use of the property accessor matching the current access.
    pub(crate) fn record_accessor(&mut self, node: NodeId, span: Span, property: DeclRef) {
        let Some(Declaration {
            kind: DeclKind::Property(prop),
            ..
        }) = self.ctx.decl(property)
        else {
            return;
        };
        let accessor = match self.access {
            Access::Read => prop.read.as_ref(),
            Access::Write => prop.write.as_ref(),
        };
        if let Some(target) = accessor.and_then(|a| a.target) {
            self.ctx
                .record_reference(node, span, target, self.site.with_context(property));
        }
    }
}

/// Name of a declaration for diagnostics.
pub(crate) fn decl_name(view: &dyn ProgramView, decl: DeclRef) -> Name {
    view.decl(decl)
        .map(|d| d.name.clone())
        .unwrap_or_else(|| Name::new("?"))
}

#[cfg(test)]
mod tests {
    use delphi_core::SemanticError;
    use delphi_registry::known;

    use crate::test_support::{errors_of, resolve_one, types_on_line};

    #[test]
    fn check_reports_mismatch_once() {
        let facts = resolve_one(
            "unit Mix; interface implementation
             procedure Run;
             var S: string; I: Integer;
             begin
               I := S;
               I := 1 + 2;
             end;
             end.",
        );
        let errors = errors_of(&facts, "Mix");
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert!(matches!(
            &errors[0],
            SemanticError::TypeMismatch { from, to, .. } if from == "UnicodeString" && to == "Integer"
        ));
        assert!(types_on_line(&facts, "Mix", 6).contains(&known::INTEGER));
    }

    #[test]
    fn unresolved_operands_stay_silent() {
        let facts = resolve_one(
            "unit Quiet; interface implementation
             procedure Run;
             var I: Integer;
             begin
               I := Missing + 1;
             end;
             end.",
        );
        let errors = errors_of(&facts, "Quiet");
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert!(matches!(&errors[0], SemanticError::UnknownIdentifier { name, .. } if name == "Missing"));
    }
}
