//! Overload resolution for routine calls.
//!
//! Selects the best matching routine from an overload group based on
//! argument types and conversion costs.
//!
//! ## Algorithm
//!
//! 1. Filter candidates by argument count (default parameters may be
//!    omitted; a trailing open array or `array of const` absorbs extra
//!    arguments)
//! 2. Convert each argument to its parameter type; a candidate needing an
//!    explicit-only conversion is not viable
//! 3. Sum conversion costs per viable candidate
//! 4. Select the minimum; candidates tied at the minimal cost are
//!    ambiguous, never resolved to the first candidate

mod ranking;

pub use ranking::find_best_match;

use delphi_core::{
    ArrayShape, DeclRef, OverloadOutcome, Param, SemanticError, Span, TypeKind, TypeRef,
};
use tracing::trace;

use crate::conversion::{Conversion, ConversionKind, find_conversion};
use crate::types::{display_type, is_unresolved, kind_of};
use crate::view::ProgramView;

/// One argument at a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argument {
    pub ty: TypeRef,
    /// Constant literal (or constructor) argument.
    pub is_literal: bool,
}

impl Argument {
    pub fn new(ty: TypeRef) -> Self {
        Self { ty, is_literal: false }
    }

    pub fn literal(ty: TypeRef) -> Self {
        Self { ty, is_literal: true }
    }
}

/// Result of matching one viable candidate.
#[derive(Debug, Clone)]
pub struct OverloadMatch {
    pub decl: DeclRef,
    /// Conversions needed for each parameter (None = default value used).
    pub arg_conversions: Vec<Option<Conversion>>,
    /// Total conversion cost (lower is better).
    pub total_cost: u32,
}

/// Select the overload a call binds to.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn select_overload(view: &dyn ProgramView, candidates: &[DeclRef], args: &[Argument]) -> OverloadOutcome {
    let viable: Vec<OverloadMatch> = candidates
        .iter()
        .filter_map(|&decl| try_match_candidate(view, decl, args))
        .collect();

    let outcome = if viable.is_empty() {
        OverloadOutcome::NoMatch
    } else {
        match find_best_match(&viable) {
            Ok(best) => OverloadOutcome::Resolved(best.decl),
            Err(tied) => OverloadOutcome::Ambiguous(tied),
        }
    };
    trace!(candidates = candidates.len(), viable = viable.len(), ?outcome, "overload selection");
    outcome
}

/// Try to match arguments against a candidate routine.
///
/// Returns `Some(OverloadMatch)` if every argument converts implicitly to
/// its parameter, `None` otherwise.
pub fn try_match_candidate(view: &dyn ProgramView, decl: DeclRef, args: &[Argument]) -> Option<OverloadMatch> {
    let routine = view.decl(decl)?.as_routine()?;

    // Intrinsics are typed by their own rules and accept what they are given.
    if routine.intrinsic.is_some() {
        return Some(OverloadMatch {
            decl,
            arg_conversions: vec![Some(Conversion::identity()); args.len()],
            total_cost: 0,
        });
    }

    let params = &routine.signature.params;
    let required_params = routine.signature.required_params();
    let absorbing = params.last().is_some_and(|p| absorbs_extra(view, p));

    // Too few arguments
    if args.len() < required_params {
        return None;
    }
    // Too many arguments (unless the last parameter absorbs them)
    if !absorbing && args.len() > params.len() {
        return None;
    }

    // The absorbing parameter takes the remaining arguments one by one
    // unless a single array or set value is passed in its place.
    let last = params.len().saturating_sub(1);
    let spread = absorbing
        && (args.len() > params.len()
            || args
                .get(last)
                .zip(params.get(last))
                .is_some_and(|(arg, param)| convert_argument(view, param, arg).is_none()));

    let mut arg_conversions = Vec::with_capacity(params.len().max(args.len()));
    let mut total_cost = 0u32;

    for (index, arg) in args.iter().enumerate() {
        let conv = if spread && index >= last {
            absorbed_conversion(view, params.get(last)?, arg)?
        } else {
            convert_argument(view, params.get(index)?, arg)?
        };
        total_cost = total_cost.saturating_add(conv.cost);
        arg_conversions.push(Some(conv));
    }

    // Fill in None for default parameters not provided
    for _ in args.len()..params.len() {
        arg_conversions.push(None);
    }

    Some(OverloadMatch {
        decl,
        arg_conversions,
        total_cost,
    })
}

/// Conversion of one argument to its parameter.
///
/// `var` and `out` parameters take no conversion at all: the argument must
/// already have the parameter's type.
fn convert_argument(view: &dyn ProgramView, param: &Param, arg: &Argument) -> Option<Conversion> {
    let conv = find_conversion(view, arg.ty, param.ty, arg.is_literal)?;
    if !conv.is_implicit {
        return None;
    }
    if param.flags.is_by_reference()
        && !matches!(
            conv.kind,
            ConversionKind::Identity | ConversionKind::Unresolved | ConversionKind::Untyped
        )
    {
        return None;
    }
    Some(conv)
}

/// Conversion of one argument spread into an absorbing last parameter.
fn absorbed_conversion(view: &dyn ProgramView, param: &Param, arg: &Argument) -> Option<Conversion> {
    match kind_of(view, param.ty) {
        TypeKind::Array(array) if array.shape == ArrayShape::OfConst => {
            Some(Conversion::implicit(ConversionKind::ArrayOfConst, 2))
        }
        TypeKind::Array(array) => {
            let conv = find_conversion(view, arg.ty, array.element, arg.is_literal)?;
            conv.is_implicit
                .then(|| Conversion::implicit(ConversionKind::OpenArray, conv.rank + 1))
        }
        _ => None,
    }
}

fn absorbs_extra(view: &dyn ProgramView, param: &Param) -> bool {
    matches!(
        kind_of(view, param.ty),
        TypeKind::Array(array) if matches!(array.shape, ArrayShape::Open | ArrayShape::OfConst)
    )
}

/// Diagnostic for a failed selection.
///
/// Nothing is reported when an argument is unresolved: the failure that
/// produced it has already been reported.
pub fn overload_error(
    view: &dyn ProgramView,
    name: &str,
    outcome: &OverloadOutcome,
    args: &[Argument],
    span: Span,
) -> Option<SemanticError> {
    if args.iter().any(|a| is_unresolved(view, a.ty)) {
        return None;
    }
    match outcome {
        OverloadOutcome::Resolved(_) => None,
        OverloadOutcome::Ambiguous(tied) => Some(SemanticError::AmbiguousOverload {
            name: name.to_string(),
            candidates: tied
                .iter()
                .map(|&d| describe_candidate(view, d))
                .collect::<Vec<_>>()
                .join(" and "),
            span,
        }),
        OverloadOutcome::NoMatch => Some(SemanticError::NoMatchingOverload {
            name: name.to_string(),
            args: args
                .iter()
                .map(|a| display_type(view, a.ty))
                .collect::<Vec<_>>()
                .join(", "),
            span,
        }),
    }
}

/// `Name(T1, T2)` for messages.
pub fn describe_candidate(view: &dyn ProgramView, decl: DeclRef) -> String {
    let Some(declaration) = view.decl(decl) else {
        return decl.to_string();
    };
    let params = declaration
        .as_routine()
        .map(|r| {
            r.signature
                .params
                .iter()
                .map(|p| display_type(view, p.ty))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default();
    format!("{}({})", declaration.qualified_name, params)
}
