//! Member access, indexing and dereference.
//!
//! `A.B.C` is read either as member selection on a value or as a name
//! qualified by a dotted unit prefix. The local reading wins unless its first
//! segment is unknown, or the local reading cannot continue while the unit
//! reading can.

use delphi_core::{
    DeclKind, DeclRef, Declaration, Name, SemanticError, SymbolGroup, TypeKind, TypeRef, UnitId,
};
use delphi_parser::ast::{Expr, Ident};
use delphi_registry::known;

use super::{ExprChecker, Found, calls, identifiers};
use crate::expr_info::{Denotes, ExprInfo};
use crate::scope::{lookup_in_unit, match_unit_prefix};
use crate::type_resolver::member_decl;
use crate::types::{
    array_dimensions, display_type, element_type, is_unresolved, kind_of, lookup_member, member_host,
    member_table,
};
use crate::view::ProgramView;

/// What a member selection found.
pub(super) enum Selected {
    /// An overload group, not yet bound; the caller selects from it.
    Routines {
        decls: Vec<DeclRef>,
        receiver: Option<TypeRef>,
    },
    /// A bound value, type or unit.
    Done(ExprInfo),
}

pub(super) fn check_member(
    checker: &mut ExprChecker,
    expr: &Expr<'_>,
    base: &Expr<'_>,
    name: &Ident<'_>,
    expected: Option<TypeRef>,
) -> ExprInfo {
    match select_member(checker, expr, base, name) {
        Selected::Done(info) => info,
        Selected::Routines { decls, receiver } => {
            if let Some(expected) = expected
                && let Some(decl) = identifiers::procedural_match(checker, &decls, expected)
            {
                checker.bind(expr.id, name.span, decl);
                checker.ctx_mut().bind_node(name.id, decl);
                return ExprInfo::value(expected).with_decl(decl);
            }
            calls::call_group(checker, calls::CallSite::member(expr, name), &decls, receiver, &[])
        }
    }
}

/// Resolve `base.name`, binding everything except an overload group.
pub(super) fn select_member(
    checker: &mut ExprChecker,
    expr: &Expr<'_>,
    base: &Expr<'_>,
    name: &Ident<'_>,
) -> Selected {
    let base_info = match unit_prefix(checker, expr) {
        Some(unit) => ExprInfo::unit(unit),
        None => checker.infer_read(base),
    };

    let (found, host) = match base_info.denotes {
        Denotes::Unit(unit) => {
            let found = lookup_in_unit(checker.ctx(), unit, name.name).map(|group| Found { group, receiver: None });
            if found.is_none() {
                let unit_name = checker
                    .ctx()
                    .unit(unit)
                    .map(|u| u.name.as_str().to_string())
                    .unwrap_or_default();
                checker.ctx_mut().report(SemanticError::UnknownMember {
                    type_name: unit_name,
                    member: name.name.to_string(),
                    span: name.span,
                });
                return Selected::Done(ExprInfo::unresolved());
            }
            (found, None)
        }
        Denotes::Type => {
            let receiver = checker.ctx_mut().type_value(base_info.ty);
            (find_member(checker, base_info.ty, name.name, receiver), Some(base_info.ty))
        }
        Denotes::Value => (
            find_member(checker, base_info.ty, name.name, base_info.ty),
            Some(base_info.ty),
        ),
        Denotes::Nothing => return Selected::Done(ExprInfo::unresolved()),
    };

    let Some(found) = found else {
        if let Some(host) = host {
            report_unknown_member(checker, host, name);
        }
        return Selected::Done(ExprInfo::unresolved());
    };

    if found.group.routines {
        return Selected::Routines {
            decls: found.group.decls,
            receiver: found.receiver,
        };
    }

    let Some(&decl) = found.group.decls.first() else {
        return Selected::Done(ExprInfo::unresolved());
    };
    checker.bind(expr.id, name.span, decl);
    checker.ctx_mut().bind_node(name.id, decl);
    if matches!(checker.ctx().decl(decl).map(|d| &d.kind), Some(DeclKind::Property(_))) {
        checker.record_accessor(expr.id, name.span, decl);
    }
    Selected::Done(checker.decl_info(decl).with_receiver(found.receiver))
}

/// The unit named by `base` when `expr` reads as a unit-qualified name.
fn unit_prefix(checker: &ExprChecker, expr: &Expr<'_>) -> Option<UnitId> {
    let path = expr.dotted_path()?;
    let base_len = path.len() - 1;
    let names: Vec<&str> = path.iter().map(|p| p.name).collect();
    let ctx = checker.ctx();
    let imports = ctx.import_search_order();
    let (unit, len) = match_unit_prefix(ctx, &names, ctx.unit_id(), &imports)?;
    if len != base_len {
        return None;
    }

    let Some(local) = checker.lookup_name(names[0]) else {
        return Some(unit);
    };
    // The local reading wins while it can continue.
    let head = local.group.decls.first().and_then(|&d| ctx.decl(d));
    let continues = head.is_some_and(|d| local_continues(checker, d, names[1]));
    let qualified = lookup_in_unit(ctx, unit, names[len]).is_some();
    (!continues && qualified).then_some(unit)
}

fn local_continues(checker: &ExprChecker, head: &Declaration, next: &str) -> bool {
    let ctx = checker.ctx();
    let host = head
        .kind
        .declared_type()
        .or_else(|| head.kind.value_type())
        .or_else(|| head.as_routine().and_then(|r| r.signature.result));
    host.is_some_and(|ty| member_decl(ctx, ty, next).is_some())
}

/// Look up `name` on a type or value of type `ty`; enum type names expose their values.
fn find_member(checker: &ExprChecker, ty: TypeRef, name: &str, receiver: TypeRef) -> Option<Found> {
    let ctx = checker.ctx();
    if let TypeKind::Enum(_) = kind_of(ctx, ty) {
        let decl = member_decl(ctx, ty, name)?;
        return Some(Found {
            group: SymbolGroup {
                name: Name::new(name),
                decls: vec![decl],
                routines: false,
            },
            receiver: None,
        });
    }
    lookup_member(ctx, ty, name).map(|group| Found {
        group,
        receiver: Some(receiver),
    })
}

/// Members are only reported missing on types that have members.
fn report_unknown_member(checker: &mut ExprChecker, host: TypeRef, name: &Ident<'_>) {
    let ctx = checker.ctx();
    if is_unresolved(ctx, host) {
        return;
    }
    let host = member_host(ctx, host);
    let has_members = member_table(ctx, host).is_some() || matches!(kind_of(ctx, host), TypeKind::Enum(_));
    if !has_members {
        let from = display_type(ctx, host);
        checker.ctx_mut().report(SemanticError::TypeMismatch {
            from,
            to: "record, class or interface".to_string(),
            span: name.span,
        });
        return;
    }
    let type_name = display_type(ctx, host);
    checker.ctx_mut().report(SemanticError::UnknownMember {
        type_name,
        member: name.name.to_string(),
        span: name.span,
    });
}

// ============================================================================
// Indexing
// ============================================================================

/// `base[i, j]`: strings give characters, arrays peel one dimension per
/// index, indexed and default array properties give the property type.
pub(super) fn check_index(
    checker: &mut ExprChecker,
    expr: &Expr<'_>,
    base: &Expr<'_>,
    indices: &[Expr<'_>],
) -> ExprInfo {
    let base_info = checker.infer(base);
    for index in indices {
        checker.infer_read(index);
    }
    if base_info.is_type() || is_unresolved(checker.ctx(), base_info.ty) {
        return ExprInfo::unresolved();
    }

    // An indexed property: `Items[I]`.
    if let Some(decl) = base_info.decl
        && let Some(prop) = indexed_property(checker, decl)
    {
        checker.ctx_mut().bind_node(expr.id, decl);
        return ExprInfo::value(prop).with_decl(decl);
    }

    let mut ty = base_info.ty;
    let mut pending = 0usize;
    let mut remaining = indices.len();
    while remaining > 0 {
        let ctx = checker.ctx();
        match kind_of(ctx, ty) {
            TypeKind::Array(array) => {
                if pending == 0 {
                    pending = array_dimensions(ctx, ty);
                }
                pending -= 1;
                remaining -= 1;
                if pending == 0 {
                    ty = array.element;
                }
            }
            TypeKind::String { .. } | TypeKind::Pointer(Some(_)) => {
                let Some(element) = element_type(ctx, ty) else {
                    return ExprInfo::unresolved();
                };
                ty = element;
                remaining -= 1;
            }
            TypeKind::Class(_) | TypeKind::Interface(_) | TypeKind::Record(_) => {
                let Some(prop) = default_property(checker, ty) else {
                    return not_indexable(checker, ty, expr);
                };
                let prop_ty = checker.decl_info(prop).ty;
                checker.ctx_mut().bind_node(expr.id, prop);
                checker.record_accessor(expr.id, expr.span, prop);
                return ExprInfo::value(prop_ty).with_decl(prop);
            }
            TypeKind::Unresolved => return ExprInfo::unresolved(),
            _ => return not_indexable(checker, ty, expr),
        }
    }
    ExprInfo::value(ty)
}

fn not_indexable(checker: &mut ExprChecker, ty: TypeRef, expr: &Expr<'_>) -> ExprInfo {
    let from = display_type(checker.ctx(), ty);
    checker.ctx_mut().report(SemanticError::TypeMismatch {
        from,
        to: "array".to_string(),
        span: expr.span,
    });
    ExprInfo::unresolved()
}

/// Type of a property that takes index parameters.
fn indexed_property(checker: &ExprChecker, decl: DeclRef) -> Option<TypeRef> {
    match &checker.ctx().decl(decl)?.kind {
        DeclKind::Property(prop) if !prop.params.is_empty() => Some(prop.ty),
        _ => None,
    }
}

/// The `default` array property of a class, interface or record.
fn default_property(checker: &ExprChecker, ty: TypeRef) -> Option<DeclRef> {
    let ctx = checker.ctx();
    let table = member_table(ctx, member_host(ctx, ty))?;
    table.iter().flat_map(|group| group.decls.iter().copied()).find(|&decl| {
        matches!(
            ctx.decl(decl).map(|d| &d.kind),
            Some(DeclKind::Property(prop)) if prop.is_default
        )
    })
}

/// `P^`: typed pointers give their target; untyped pointers stay untyped.
pub(super) fn check_deref(checker: &mut ExprChecker, expr: &Expr<'_>, inner: &Expr<'_>) -> ExprInfo {
    let info = checker.infer_read(inner);
    let ctx = checker.ctx();
    match kind_of(ctx, info.ty) {
        TypeKind::Pointer(Some(target)) => ExprInfo::value(*target),
        TypeKind::Pointer(None) => ExprInfo::value(known::UNTYPED),
        TypeKind::Unresolved => ExprInfo::unresolved(),
        _ => {
            let from = display_type(ctx, info.ty);
            checker.ctx_mut().report(SemanticError::TypeMismatch {
                from,
                to: "pointer".to_string(),
                span: expr.span,
            });
            ExprInfo::unresolved()
        }
    }
}
