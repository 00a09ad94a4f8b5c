use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::catalogue::Sector;
use crate::types::{Money, Rate};
use crate::{BundleError, BundleResult};

/// Default tolerance on the sum of sector target fractions.
pub const TARGET_SUM_EPSILON: Decimal = dec!(0.000001);

/// A lender's strategy for one optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThesisConstraints {
    /// Ceiling on aggregate new capital deployed.
    pub total_budget: Money,
    /// Target share of the portfolio per sector. Absent sectors target 0.
    pub sector_targets: BTreeMap<Sector, Rate>,
    /// Weight of the risk penalty relative to sector misalignment.
    pub risk_aversion: Decimal,
    /// Capital already held per sector, for top-up rebalancing.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub current_holdings: BTreeMap<Sector, Money>,
}

impl ThesisConstraints {
    /// Build and validate a thesis with no existing holdings.
    pub fn new(
        total_budget: Money,
        sector_targets: BTreeMap<Sector, Rate>,
        risk_aversion: Decimal,
    ) -> BundleResult<Self> {
        let thesis = Self {
            total_budget,
            sector_targets,
            risk_aversion,
            current_holdings: BTreeMap::new(),
        };
        thesis.validate(TARGET_SUM_EPSILON)?;
        Ok(thesis)
    }

    /// Attach existing holdings; re-validates.
    pub fn with_holdings(mut self, holdings: BTreeMap<Sector, Money>) -> BundleResult<Self> {
        self.current_holdings = holdings;
        self.validate(TARGET_SUM_EPSILON)?;
        Ok(self)
    }

    /// Check the invariants the engine relies on. Producers of thesis data
    /// are not trusted to have done this.
    ///
    /// A non-positive budget is not rejected here; the formulator reports
    /// it as an empty formulation.
    pub fn validate(&self, epsilon: Decimal) -> BundleResult<()> {
        if self.sector_targets.is_empty() {
            return Err(BundleError::invalid(
                "sectorTargets",
                "at least one sector target is required",
            ));
        }

        for (sector, weight) in &self.sector_targets {
            if *weight < Decimal::ZERO || *weight > Decimal::ONE {
                return Err(BundleError::invalid(
                    format!("sectorTargets.{}", sector),
                    format!("must be in [0, 1], got {}", weight),
                ));
            }
        }

        let sum: Decimal = self.sector_targets.values().sum();
        if (sum - Decimal::ONE).abs() > epsilon {
            return Err(BundleError::invalid(
                "sectorTargets",
                format!("fractions must sum to 1 (±{}), got {}", epsilon, sum),
            ));
        }

        if self.risk_aversion < Decimal::ZERO {
            return Err(BundleError::invalid(
                "riskAversion",
                format!("must be non-negative, got {}", self.risk_aversion),
            ));
        }

        for (sector, held) in &self.current_holdings {
            if *held < Decimal::ZERO {
                return Err(BundleError::invalid(
                    format!("currentHoldings.{}", sector),
                    format!("must be non-negative, got {}", held),
                ));
            }
        }
        self.target_base()?;

        Ok(())
    }

    /// Target fraction for a sector (0 when unmentioned).
    pub fn target_weight(&self, sector: &Sector) -> Rate {
        self.sector_targets
            .get(sector)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn holding(&self, sector: &Sector) -> Money {
        self.current_holdings
            .get(sector)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn total_holdings(&self) -> BundleResult<Money> {
        self.current_holdings
            .values()
            .try_fold(Decimal::ZERO, |acc, held| acc.checked_add(*held))
            .ok_or_else(|| BundleError::overflow("currentHoldings"))
    }

    /// Portfolio size the targets apply to: holdings plus the full budget.
    pub fn target_base(&self) -> BundleResult<Money> {
        self.total_holdings()?
            .checked_add(self.total_budget)
            .ok_or_else(|| BundleError::overflow("totalBudget"))
    }

    /// Absolute capital target for a sector.
    pub fn sector_target_amount(&self, sector: &Sector) -> BundleResult<Money> {
        self.target_weight(sector)
            .checked_mul(self.target_base()?)
            .ok_or_else(|| BundleError::overflow(format!("sectorTargets.{}", sector)))
    }

    /// Sectors named by targets or holdings.
    pub fn referenced_sectors(&self) -> BTreeSet<Sector> {
        self.sector_targets
            .keys()
            .chain(self.current_holdings.keys())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(pairs: &[(Sector, Decimal)]) -> BTreeMap<Sector, Rate> {
        pairs.iter().cloned().collect()
    }

    #[test]
    fn test_valid_thesis() {
        let t = ThesisConstraints::new(
            dec!(100000),
            targets(&[(Sector::Retail, dec!(0.6)), (Sector::Other("Tech".into()), dec!(0.4))]),
            dec!(0.5),
        )
        .unwrap();
        assert_eq!(t.sector_target_amount(&Sector::Retail).unwrap(), dec!(60000));
        assert_eq!(t.target_weight(&Sector::Defence), Decimal::ZERO);
    }

    #[test]
    fn test_sum_within_epsilon_accepted() {
        let r = ThesisConstraints::new(
            dec!(1),
            targets(&[(Sector::Retail, dec!(0.6000004)), (Sector::Defence, dec!(0.4))]),
            Decimal::ZERO,
        );
        assert!(r.is_ok());
    }

    #[test]
    fn test_sum_outside_epsilon_rejected() {
        let r = ThesisConstraints::new(
            dec!(1),
            targets(&[(Sector::Retail, dec!(0.6)), (Sector::Defence, dec!(0.39))]),
            Decimal::ZERO,
        );
        match r {
            Err(BundleError::InvalidInput { field, .. }) => assert_eq!(field, "sectorTargets"),
            other => panic!("expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_weight_out_of_range_rejected() {
        let r = ThesisConstraints::new(
            dec!(1),
            targets(&[(Sector::Retail, dec!(1.5)), (Sector::Defence, dec!(-0.5))]),
            Decimal::ZERO,
        );
        assert!(r.is_err());
    }

    #[test]
    fn test_negative_risk_aversion_rejected() {
        let r = ThesisConstraints::new(
            dec!(1),
            targets(&[(Sector::Retail, Decimal::ONE)]),
            dec!(-1),
        );
        assert!(r.is_err());
    }

    #[test]
    fn test_empty_targets_rejected() {
        assert!(ThesisConstraints::new(dec!(1), BTreeMap::new(), Decimal::ZERO).is_err());
    }

    #[test]
    fn test_zero_budget_passes_validation() {
        let t = ThesisConstraints::new(
            Decimal::ZERO,
            targets(&[(Sector::Retail, Decimal::ONE)]),
            Decimal::ZERO,
        );
        assert!(t.is_ok());
    }

    #[test]
    fn test_holdings_shift_target_base() {
        let t = ThesisConstraints::new(
            dec!(100),
            targets(&[(Sector::Retail, dec!(0.5)), (Sector::Defence, dec!(0.5))]),
            Decimal::ZERO,
        )
        .unwrap()
        .with_holdings(targets(&[(Sector::Retail, dec!(300))]))
        .unwrap();
        assert_eq!(t.target_base().unwrap(), dec!(400));
        assert_eq!(t.sector_target_amount(&Sector::Defence).unwrap(), dec!(200));
        assert_eq!(t.holding(&Sector::Retail), dec!(300));
    }

    #[test]
    fn test_negative_holding_rejected() {
        let t = ThesisConstraints::new(
            dec!(100),
            targets(&[(Sector::Retail, Decimal::ONE)]),
            Decimal::ZERO,
        )
        .unwrap();
        assert!(t.with_holdings(targets(&[(Sector::Retail, dec!(-1))])).is_err());
    }

    #[test]
    fn test_target_base_out_of_range_rejected() {
        let t = ThesisConstraints::new(
            Decimal::MAX,
            targets(&[(Sector::Retail, Decimal::ONE)]),
            Decimal::ZERO,
        )
        .unwrap();
        match t.with_holdings(targets(&[(Sector::Retail, Decimal::ONE)])) {
            Err(BundleError::InvalidInput { field, .. }) => assert_eq!(field, "totalBudget"),
            other => panic!("expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_deserialize_camel_case() {
        let json = r#"{
            "totalBudget": 100000,
            "sectorTargets": {"Retail": 0.6, "Tech": 0.4},
            "riskAversion": 0
        }"#;
        let t: ThesisConstraints = serde_json::from_str(json).unwrap();
        assert!(t.current_holdings.is_empty());
        assert_eq!(t.target_weight(&Sector::Other("Tech".into())), dec!(0.4));
        t.validate(TARGET_SUM_EPSILON).unwrap();
    }
}
