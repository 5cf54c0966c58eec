//! Bare identifier resolution.

use delphi_core::{DeclKind, DeclRef, TypeRef};
use delphi_parser::ast::{Expr, Ident};
use delphi_registry::known;

use super::{ExprChecker, Found, calls};
use crate::context::DerivedType;
use crate::conversion::signatures_match;
use crate::expr_info::ExprInfo;
use crate::types::procedural_signature;
use crate::view::ProgramView;

/// Resolve an identifier outside call position.
///
/// A routine name used as a value is an implicit call with no arguments,
/// unless the expected type is procedural and one of the overloads fits it.
pub(super) fn check_ident(
    checker: &mut ExprChecker,
    expr: &Expr<'_>,
    ident: &Ident<'_>,
    expected: Option<TypeRef>,
) -> ExprInfo {
    // `string` is a keyword type, not a System declaration.
    if ident.is("string") {
        return ExprInfo::type_name(known::UNICODESTRING, None);
    }

    let Some(found) = checker.lookup_name(ident.name) else {
        return checker.unknown(ident.name, ident.span);
    };

    if found.group.routines {
        if let Some(expected) = expected
            && let Some(decl) = procedural_match(checker, &found.group.decls, expected)
        {
            checker.bind(ident.id, ident.span, decl);
            return ExprInfo::value(expected).with_decl(decl);
        }
        return calls::call_group(
            checker,
            calls::CallSite::implicit(expr, ident),
            &found.group.decls,
            found.receiver,
            &[],
        );
    }

    bind_value(checker, ident, &found)
}

/// Bind a non-routine name and describe what it denotes.
pub(super) fn bind_value(checker: &mut ExprChecker, ident: &Ident<'_>, found: &Found) -> ExprInfo {
    let Some(&decl) = found.group.decls.first() else {
        return ExprInfo::unresolved();
    };
    checker.bind(ident.id, ident.span, decl);
    if matches!(checker.ctx().decl(decl).map(|d| &d.kind), Some(DeclKind::Property(_))) {
        checker.record_accessor(ident.id, ident.span, decl);
    }
    checker.decl_info(decl).with_receiver(found.receiver)
}

/// The overload whose signature fits a procedural type.
pub(super) fn procedural_match(checker: &ExprChecker, decls: &[DeclRef], expected: TypeRef) -> Option<DeclRef> {
    let view = checker.ctx();
    let (wanted, _) = procedural_signature(view, expected)?;
    decls.iter().copied().find(|&decl| {
        view.decl(decl)
            .and_then(|d| d.as_routine())
            .is_some_and(|r| r.intrinsic.is_none() && signatures_match(view, &r.signature, wanted))
    })
}

/// A routine passed as an argument without being called.
///
/// Only routines that cannot be called implicitly qualify: procedures and
/// routines whose parameters are all required.
pub(super) fn routine_value(checker: &mut ExprChecker, expr: &Expr<'_>) -> Option<ExprInfo> {
    let ident = expr.unparen().as_ident()?;
    let found = checker.lookup_name(ident.name)?;
    if !found.group.routines {
        return None;
    }
    let view = checker.ctx();
    let callable_bare = found.group.decls.iter().any(|&decl| {
        view.decl(decl).and_then(|d| d.as_routine()).is_some_and(|r| {
            r.intrinsic.is_none() && r.signature.result.is_some() && r.signature.required_params() == 0
        })
    });
    if callable_bare {
        return None;
    }
    let decl = *found.group.decls.first()?;
    if view.decl(decl).and_then(|d| d.as_routine()).is_some_and(|r| r.intrinsic.is_some()) {
        return None;
    }
    checker.bind(ident.id, ident.span, decl);
    let ty = checker.ctx_mut().derived_type(DerivedType::Routine(decl));
    Some(ExprInfo::value(ty).with_decl(decl))
}

#[cfg(test)]
mod tests {
    use delphi_core::SemanticError;

    use crate::test_support::{decl_named, declarations_on_line, errors_of, resolve_one};

    #[test]
    fn locals_shadow_globals_case_insensitively() {
        let facts = resolve_one(
            "unit Shadow; interface
             var Count: Integer;
             implementation
             procedure Run;
             var count: string;
             begin
               COUNT := 'x';
             end;
             end.",
        );
        assert!(errors_of(&facts, "Shadow").is_empty(), "{:?}", errors_of(&facts, "Shadow"));
        let local = decl_named(&facts, "Shadow.Run.count");
        assert!(declarations_on_line(&facts, "Shadow", 7).contains(&local));
    }

    #[test]
    fn procedure_passed_as_value() {
        let facts = resolve_one(
            "unit Callbacks; interface
             type TNotify = procedure(Code: Integer);
             procedure Handle(Code: Integer);
             procedure Subscribe(Callback: TNotify);
             implementation
             procedure Handle(Code: Integer); begin end;
             procedure Subscribe(Callback: TNotify); begin end;
             initialization
               Subscribe(Handle);
             end.",
        );
        assert!(errors_of(&facts, "Callbacks").is_empty(), "{:?}", errors_of(&facts, "Callbacks"));
        let handle = decl_named(&facts, "Callbacks.Handle");
        assert!(declarations_on_line(&facts, "Callbacks", 9).contains(&handle));
    }

    #[test]
    fn unknown_identifier() {
        let facts = resolve_one(
            "unit Missing; interface implementation
             initialization
               Nothing := 1;
             end.",
        );
        let errors = errors_of(&facts, "Missing");
        assert!(matches!(errors.as_slice(), [SemanticError::UnknownIdentifier { name, .. }] if name == "Nothing"));
    }
}
