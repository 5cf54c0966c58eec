//! Cost-based ranking for overload resolution.
//!
//! Selects the best match from the viable candidates by total conversion
//! cost alone. Every candidate tied at the minimal cost is ambiguous; ranks
//! inside a cost tier never pick between them.

use delphi_core::DeclRef;

use super::OverloadMatch;

/// Find the best match from viable candidates.
///
/// # Returns
///
/// * `Ok(OverloadMatch)` - The single candidate with the minimal cost
/// * `Err(Vec<DeclRef>)` - Every candidate tied at the minimum, in candidate order
pub fn find_best_match(viable: &[OverloadMatch]) -> Result<&OverloadMatch, Vec<DeclRef>> {
    let Some(best_cost) = viable.iter().map(|m| m.total_cost).min() else {
        return Err(Vec::new());
    };

    let tied: Vec<&OverloadMatch> = viable.iter().filter(|m| m.total_cost == best_cost).collect();
    match tied.as_slice() {
        [only] => Ok(*only),
        _ => Err(tied.iter().map(|m| m.decl).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::{Conversion, ConversionKind};
    use delphi_core::{DeclId, UnitId};

    fn candidate(index: u32, conversions: Vec<Option<Conversion>>) -> OverloadMatch {
        let total_cost = conversions.iter().flatten().map(|c| c.cost).sum();
        OverloadMatch {
            decl: DeclRef::new(UnitId::new(1), DeclId::new(index)),
            arg_conversions: conversions,
            total_cost,
        }
    }

    #[test]
    fn lowest_cost_wins() {
        let exact = candidate(0, vec![Some(Conversion::identity())]);
        let widened = candidate(1, vec![Some(Conversion::implicit(ConversionKind::Integer, 1))]);
        let viable = [widened, exact];
        assert_eq!(find_best_match(&viable).unwrap().decl.decl, DeclId::new(0));
    }

    #[test]
    fn rank_does_not_break_a_cost_tie() {
        let near = candidate(0, vec![Some(Conversion::implicit(ConversionKind::Integer, 1))]);
        let far = candidate(1, vec![Some(Conversion::implicit(ConversionKind::Integer, 3))]);
        let tied = find_best_match(&[far, near]).unwrap_err();
        assert_eq!(tied.len(), 2);
        assert_eq!(tied[0].decl, DeclId::new(1));
    }

    #[test]
    fn defaulted_parameters_do_not_break_a_tie() {
        let conv = Conversion::implicit(ConversionKind::IntegerToReal, 16);
        let exact = Some(Conversion::identity());
        let defaulted = candidate(0, vec![Some(conv), exact, None]);
        let converted = candidate(1, vec![Some(conv), exact]);
        assert!(find_best_match(&[converted, defaulted]).is_err());
    }

    #[test]
    fn full_tie_reports_every_tied_candidate() {
        let conv = Conversion::implicit(ConversionKind::IntegerToReal, 16);
        let viable = [
            candidate(0, vec![Some(conv)]),
            candidate(1, vec![Some(conv)]),
            candidate(2, vec![Some(Conversion::explicit(ConversionKind::Narrowing))]),
        ];
        let tied = find_best_match(&viable).unwrap_err();
        assert_eq!(tied.len(), 2);
        assert_eq!(tied[1].decl, DeclId::new(1));
    }
}
