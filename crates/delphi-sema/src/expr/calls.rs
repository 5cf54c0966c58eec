//! Calls, casts and `inherited`.
//!
//! A call binds through overload selection when its callee names a routine
//! group. A callee naming a type with one argument is a cast; a callee of
//! procedural type is called through its signature.

use delphi_core::{DeclRef, NodeId, OverloadOutcome, RoutineKind, SemanticError, Span, TypeRef};
use delphi_parser::ast::{Expr, ExprKind, Ident};
use delphi_registry::known;

use super::member::{self, Selected};
use super::{ExprChecker, identifiers, intrinsics};
use crate::conversion::{is_explicit_cast_allowed, signatures_match};
use crate::expr_info::{Denotes, ExprInfo};
use crate::overload::{Argument, overload_error, select_overload};
use crate::types::{display_type, is_unresolved, kind_of, lookup_member, member_host, procedural_signature};
use crate::view::ProgramView;

/// The nodes a routine call binds.
pub(super) struct CallSite {
    /// Node that receives the overload outcome.
    call: NodeId,
    /// Node the reference is recorded on.
    reference: NodeId,
    /// Further nodes bound to the same declaration, e.g. the name of `A.Name`.
    alias: Option<NodeId>,
    name: String,
    span: Span,
}

impl CallSite {
    /// A routine named without arguments: `Name`.
    pub(super) fn implicit(expr: &Expr<'_>, ident: &Ident<'_>) -> Self {
        Self {
            call: expr.id,
            reference: ident.id,
            alias: None,
            name: ident.name.to_string(),
            span: ident.span,
        }
    }

    /// A method named without arguments: `Value.Name`.
    pub(super) fn member(expr: &Expr<'_>, name: &Ident<'_>) -> Self {
        Self {
            call: expr.id,
            reference: expr.id,
            alias: Some(name.id),
            name: name.name.to_string(),
            span: name.span,
        }
    }

    /// An explicit call `callee(args)`.
    fn explicit(call: &Expr<'_>, callee: &Expr<'_>, name: &Ident<'_>) -> Self {
        Self {
            call: call.id,
            reference: callee.id,
            alias: (name.id != callee.id).then_some(name.id),
            name: name.name.to_string(),
            span: name.span,
        }
    }

    fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        [Some(self.call), self.alias]
            .into_iter()
            .flatten()
            .filter(move |&n| n != self.reference)
    }
}

pub(super) fn check_call(
    checker: &mut ExprChecker,
    expr: &Expr<'_>,
    callee: &Expr<'_>,
    args: &[Expr<'_>],
) -> ExprInfo {
    match callee.kind {
        ExprKind::Ident(ident) if ident.is("string") => {
            let info = ExprInfo::type_name(known::UNICODESTRING, None);
            checker.record(callee.id, &info);
            call_value(checker, expr, info, args)
        }
        ExprKind::Ident(ident) => match checker.lookup_name(ident.name) {
            None => {
                infer_all(checker, args);
                checker.unknown(ident.name, ident.span)
            }
            Some(found) if found.group.routines => call_group(
                checker,
                CallSite::explicit(expr, callee, &ident),
                &found.group.decls,
                found.receiver,
                args,
            ),
            Some(found) => {
                let info = identifiers::bind_value(checker, &ident, &found);
                checker.record(callee.id, &info);
                call_value(checker, expr, info, args)
            }
        },
        ExprKind::Member { base, name } => match member::select_member(checker, callee, base, &name) {
            Selected::Routines { decls, receiver } => {
                call_group(checker, CallSite::explicit(expr, callee, &name), &decls, receiver, args)
            }
            Selected::Done(info) => {
                checker.record(callee.id, &info);
                call_value(checker, expr, info, args)
            }
        },
        ExprKind::Inherited(name) => inherited_call(checker, callee, name.as_ref(), Some(args), Some(expr.id)),
        _ => {
            let info = checker.infer(callee);
            call_value(checker, expr, info, args)
        }
    }
}

fn infer_all(checker: &mut ExprChecker, args: &[Expr<'_>]) {
    for arg in args {
        checker.infer_read(arg);
    }
}

/// Infer call arguments, guided by the parameter types of a lone candidate.
fn infer_arguments(checker: &mut ExprChecker, decls: &[DeclRef], args: &[Expr<'_>]) -> Vec<Argument> {
    let params: Vec<TypeRef> = match decls {
        [only] => checker
            .ctx()
            .decl(*only)
            .and_then(|d| d.as_routine())
            .map(|r| r.signature.params.iter().map(|p| p.ty).collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    };

    let mut arguments = Vec::with_capacity(args.len());
    for (index, arg) in args.iter().enumerate() {
        let info = match identifiers::routine_value(checker, arg) {
            Some(info) => {
                checker.record(arg.id, &info);
                info
            }
            None => checker.infer_with(arg, params.get(index).copied()),
        };
        let ty = checker.value_type(&info);
        arguments.push(Argument {
            ty,
            is_literal: info.is_literal,
        });
    }
    arguments
}

/// Select from an overload group and bind the call.
#[cfg_attr(feature = "profiling", profiling::function)]
pub(super) fn call_group(
    checker: &mut ExprChecker,
    site: CallSite,
    decls: &[DeclRef],
    receiver: Option<TypeRef>,
    args: &[Expr<'_>],
) -> ExprInfo {
    if let [only] = decls
        && let Some(intrinsic) = checker.ctx().decl(*only).and_then(|d| d.as_routine()).and_then(|r| r.intrinsic)
    {
        bind_site(checker, &site, *only);
        checker
            .ctx_mut()
            .record_overload(site.call, OverloadOutcome::Resolved(*only));
        return intrinsics::check_intrinsic(checker, intrinsic, *only, args, site.span);
    }

    let arguments = infer_arguments(checker, decls, args);
    let outcome = select_overload(checker.ctx(), decls, &arguments);
    checker.ctx_mut().record_overload(site.call, outcome.clone());

    match outcome {
        OverloadOutcome::Resolved(decl) => {
            bind_site(checker, &site, decl);
            if checker.ctx().decl(decl).is_some_and(|d| d.is_member()) {
                checker.ctx_mut().record_dispatch(site.call, decl);
            }
            call_result(checker, decl, receiver)
        }
        OverloadOutcome::Ambiguous(ref tied) => {
            // Every tied candidate counts as referenced.
            let context = checker.site();
            for &candidate in tied {
                checker
                    .ctx_mut()
                    .record_reference(site.reference, site.span, candidate, context);
            }
            report_overload(checker, &site, &outcome, &arguments);
            ExprInfo::unresolved()
        }
        OverloadOutcome::NoMatch => {
            report_overload(checker, &site, &outcome, &arguments);
            ExprInfo::unresolved()
        }
    }
}

fn bind_site(checker: &mut ExprChecker, site: &CallSite, decl: DeclRef) {
    checker.bind(site.reference, site.span, decl);
    for node in site.nodes() {
        checker.ctx_mut().bind_node(node, decl);
    }
}

fn report_overload(checker: &mut ExprChecker, site: &CallSite, outcome: &OverloadOutcome, args: &[Argument]) {
    if let Some(error) = overload_error(checker.ctx(), &site.name, outcome, args, site.span) {
        checker.ctx_mut().report(error);
    }
}

/// Type of a call to `decl`.
///
/// Constructors produce an instance of the class they were called through;
/// procedures produce nothing.
fn call_result(checker: &ExprChecker, decl: DeclRef, receiver: Option<TypeRef>) -> ExprInfo {
    let view = checker.ctx();
    let Some(declaration) = view.decl(decl) else {
        return ExprInfo::unresolved();
    };
    let Some(routine) = declaration.as_routine() else {
        return ExprInfo::unresolved();
    };
    if routine.kind == RoutineKind::Constructor {
        let class = receiver
            .map(|r| member_host(view, r))
            .or(declaration.owner)
            .unwrap_or(known::UNRESOLVED);
        return ExprInfo::value(class).with_decl(decl);
    }
    match routine.signature.result {
        Some(result) => ExprInfo::value(result).with_decl(decl),
        None => ExprInfo::nothing(Some(decl)),
    }
}

/// Call something that is not a routine group: a cast or a procedural value.
fn call_value(checker: &mut ExprChecker, expr: &Expr<'_>, info: ExprInfo, args: &[Expr<'_>]) -> ExprInfo {
    if info.is_type() {
        let [arg] = args else {
            infer_all(checker, args);
            checker.ctx_mut().report(SemanticError::Unsupported {
                message: "a typecast takes exactly one argument".to_string(),
                span: expr.span,
            });
            return ExprInfo::unresolved();
        };
        return check_cast(checker, expr, info, arg);
    }

    let ty = checker.value_type(&info);
    if info.denotes != Denotes::Value || is_unresolved(checker.ctx(), ty) {
        infer_all(checker, args);
        return ExprInfo::unresolved();
    }

    let Some((signature, _)) = procedural_signature(checker.ctx(), ty) else {
        infer_all(checker, args);
        let from = display_type(checker.ctx(), ty);
        checker.ctx_mut().report(SemanticError::TypeMismatch {
            from,
            to: "routine".to_string(),
            span: expr.span,
        });
        return ExprInfo::unresolved();
    };
    let signature = signature.clone();

    if args.len() < signature.required_params() || args.len() > signature.params.len() {
        let mut arguments = Vec::with_capacity(args.len());
        for arg in args {
            let arg_info = checker.infer_read(arg);
            arguments.push(Argument::new(checker.value_type(&arg_info)));
        }
        let name = display_type(checker.ctx(), ty);
        if let Some(error) = overload_error(checker.ctx(), &name, &OverloadOutcome::NoMatch, &arguments, expr.span) {
            checker.ctx_mut().report(error);
        }
        return ExprInfo::unresolved();
    }
    for (arg, param) in args.iter().zip(&signature.params) {
        checker.check(arg, param.ty);
    }
    match signature.result {
        Some(result) => ExprInfo::value(result),
        None => ExprInfo::nothing(None),
    }
}

/// `T(x)`: allowed when any conversion, implicit or explicit, exists.
fn check_cast(checker: &mut ExprChecker, expr: &Expr<'_>, target: ExprInfo, arg: &Expr<'_>) -> ExprInfo {
    let arg_info = checker.infer_read(arg);
    let from = checker.value_type(&arg_info);
    let to = target.ty;
    let view = checker.ctx();
    if !is_unresolved(view, from)
        && !is_unresolved(view, to)
        && !is_explicit_cast_allowed(view, from, to)
    {
        let (from, to) = (display_type(view, from), display_type(view, to));
        checker
            .ctx_mut()
            .report(SemanticError::InvalidCast { from, to, span: expr.span });
    }
    if let Some(decl) = target.decl {
        checker.ctx_mut().bind_node(expr.id, decl);
    }
    ExprInfo::value(to)
}

// ============================================================================
// inherited
// ============================================================================

/// A bare `inherited` or `inherited Name` outside call syntax.
pub(super) fn check_inherited(
    checker: &mut ExprChecker,
    expr: &Expr<'_>,
    name: Option<&Ident<'_>>,
    args: &[Expr<'_>],
) -> ExprInfo {
    let args = (!args.is_empty()).then_some(args);
    inherited_call(checker, expr, name, args, None)
}

/// Resolve `inherited` against the ancestor of the method being defined.
///
/// Without a name the target is the ancestor's method of the same name and,
/// where several exist, the same signature. Nested blocks inside the method
/// do not change the binding.
fn inherited_call(
    checker: &mut ExprChecker,
    expr: &Expr<'_>,
    name: Option<&Ident<'_>>,
    args: Option<&[Expr<'_>]>,
    call: Option<NodeId>,
) -> ExprInfo {
    let Some((method, self_type)) = checker.ctx().enclosing_method(checker.site().scope) else {
        if let Some(args) = args {
            infer_all(checker, args);
        }
        checker.ctx_mut().report(SemanticError::Unsupported {
            message: "'inherited' outside a method".to_string(),
            span: expr.span,
        });
        return ExprInfo::unresolved();
    };

    let view = checker.ctx();
    let class = member_host(view, self_type);
    let Some(method_decl) = view.decl(method) else {
        return ExprInfo::unresolved();
    };
    let target_name = name.map_or_else(|| method_decl.name.as_str().to_string(), |n| n.name.to_string());
    let method_signature = method_decl.as_routine().map(|r| r.signature.clone()).unwrap_or_default();
    let ancestor = kind_of(view, class).as_class().and_then(|c| c.ancestor);
    let candidates = ancestor
        .and_then(|a| lookup_member(view, a, &target_name))
        .filter(|g| g.routines)
        .map(|g| g.decls)
        .unwrap_or_default();

    let outcome = match (name, args) {
        (None, None) => {
            let same = candidates.iter().copied().find(|&c| {
                view.decl(c)
                    .and_then(|d| d.as_routine())
                    .is_some_and(|r| signatures_match(view, &r.signature, &method_signature))
            });
            match (same, candidates.as_slice()) {
                (Some(decl), _) => OverloadOutcome::Resolved(decl),
                (None, [only]) => OverloadOutcome::Resolved(*only),
                (None, []) => OverloadOutcome::NoMatch,
                (None, _) => {
                    let args: Vec<Argument> = method_signature.params.iter().map(|p| Argument::new(p.ty)).collect();
                    select_overload(view, &candidates, &args)
                }
            }
        }
        (_, args) => {
            let arguments = infer_arguments(checker, &candidates, args.unwrap_or_default());
            select_overload(checker.ctx(), &candidates, &arguments)
        }
    };

    let target = outcome.resolved();
    let nodes = std::iter::once(expr.id).chain(call);
    for node in nodes.clone() {
        checker.ctx_mut().record_inherited(node, target);
    }
    if let Some(call) = call {
        checker.ctx_mut().record_overload(call, outcome.clone());
    }

    let Some(target) = target else {
        if candidates.is_empty() {
            let type_name = display_type(checker.ctx(), class);
            checker.ctx_mut().report(SemanticError::NoInheritedTarget {
                type_name,
                name: target_name,
                span: expr.span,
            });
        } else if let Some(error) = overload_error(checker.ctx(), &target_name, &outcome, &[], expr.span) {
            checker.ctx_mut().report(error);
        }
        return ExprInfo::unresolved();
    };

    checker.bind(expr.id, expr.span, target);
    for node in nodes.skip(1).chain(name.map(|n| n.id)) {
        checker.ctx_mut().bind_node(node, target);
    }
    let info = call_result(checker, target, Some(self_type));
    match info.denotes {
        // An inherited constructor call initializes `Self`; it does not create a new instance.
        Denotes::Value if is_constructor(checker, target) => ExprInfo::nothing(Some(target)),
        _ => info,
    }
}

fn is_constructor(checker: &ExprChecker, decl: DeclRef) -> bool {
    checker
        .ctx()
        .decl(decl)
        .and_then(|d| d.as_routine())
        .is_some_and(|r| r.is_constructor())
}
