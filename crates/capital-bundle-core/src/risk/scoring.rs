use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalogue::{Deal, RiskRatios};
use crate::types::Multiple;
use crate::{BundleError, BundleResult};

/// Aggregate risk score `R = debt service coverage + liquidity + solvency`.
/// Higher is safer. Always strictly positive once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskScore(Multiple);

impl RiskScore {
    pub fn value(self) -> Multiple {
        self.0
    }

    /// Per-pound penalty coefficient `risk_aversion / R`.
    ///
    /// A quotient outside the Decimal range is rejected as invalid input.
    pub fn penalty(self, risk_aversion: Decimal) -> BundleResult<Decimal> {
        risk_aversion
            .checked_div(self.0)
            .ok_or_else(|| BundleError::overflow("riskAversion"))
    }
}

impl std::fmt::Display for RiskScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Score a ratio triple. All-zero ratios have no defined penalty and are
/// reported as degenerate under the id `deal_id`.
pub fn score_ratios(deal_id: &str, ratios: &RiskRatios) -> BundleResult<RiskScore> {
    let total: Multiple = ratios
        .as_array()
        .iter()
        .try_fold(Decimal::ZERO, |acc, r| acc.checked_add(*r))
        .ok_or_else(|| BundleError::overflow(format!("{}.ratios", deal_id)))?;
    if total <= Decimal::ZERO {
        return Err(BundleError::DegenerateRisk {
            deal_id: deal_id.to_string(),
        });
    }
    Ok(RiskScore(total))
}

/// Score a deal from its ratios.
pub fn score(deal: &Deal) -> BundleResult<RiskScore> {
    score_ratios(&deal.id, &deal.ratios)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_score_is_exact_sum() {
        let r = RiskRatios::new(dec!(1.25), dec!(0.5), dec!(3.1));
        assert_eq!(score_ratios("D1", &r).unwrap().value(), dec!(4.85));
    }

    #[test]
    fn test_score_is_permutation_invariant() {
        let (a, b, c) = (dec!(0.3), dec!(7.25), dec!(1.05));
        let perms = [
            (a, b, c),
            (a, c, b),
            (b, a, c),
            (b, c, a),
            (c, a, b),
            (c, b, a),
        ];
        let scores: Vec<RiskScore> = perms
            .iter()
            .map(|(x, y, z)| score_ratios("P", &RiskRatios::new(*x, *y, *z)).unwrap())
            .collect();
        assert!(scores.iter().all(|s| *s == scores[0]));
    }

    #[test]
    fn test_all_zero_ratios_are_degenerate() {
        let r = RiskRatios::new(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO);
        match score_ratios("Z", &r) {
            Err(BundleError::DegenerateRisk { deal_id }) => assert_eq!(deal_id, "Z"),
            other => panic!("expected DegenerateRisk, got {:?}", other),
        }
    }

    #[test]
    fn test_single_positive_ratio_is_enough() {
        let r = RiskRatios::new(Decimal::ZERO, Decimal::ZERO, dec!(0.001));
        assert_eq!(score_ratios("S", &r).unwrap().value(), dec!(0.001));
    }

    #[test]
    fn test_penalty_inverse_to_score() {
        let safe = score_ratios("S", &RiskRatios::new(dec!(2), dec!(2), dec!(2))).unwrap();
        let risky = score_ratios("R", &RiskRatios::new(dec!(1), dec!(1), dec!(1))).unwrap();
        assert_eq!(safe.penalty(dec!(3)).unwrap(), dec!(0.5));
        assert_eq!(risky.penalty(dec!(3)).unwrap(), dec!(1));
        assert_eq!(safe.penalty(Decimal::ZERO).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_penalty_out_of_range_is_invalid_input() {
        let ratios = RiskRatios::new(Decimal::ZERO, Decimal::ZERO, dec!(0.0000000001));
        let tiny = score_ratios("T", &ratios).unwrap();
        let huge = Decimal::from_i128_with_scale(10i128.pow(20), 0);
        match tiny.penalty(huge) {
            Err(BundleError::InvalidInput { field, .. }) => assert_eq!(field, "riskAversion"),
            other => panic!("expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_ratio_sum_out_of_range_is_invalid_input() {
        let r = RiskRatios::new(Decimal::MAX, Decimal::MAX, Decimal::ONE);
        assert!(matches!(
            score_ratios("M", &r),
            Err(BundleError::InvalidInput { .. })
        ));
    }
}
