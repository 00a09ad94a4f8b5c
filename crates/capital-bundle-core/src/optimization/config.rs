use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::thesis::TARGET_SUM_EPSILON;
use crate::types::Money;
use crate::{BundleError, BundleResult};

/// Tunables for one engine instance. Every field has a default so partial
/// JSON/YAML config files deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Upper bound on a single solve. `None` waits indefinitely.
    pub solve_timeout_ms: Option<u64>,
    /// Allocations below this amount are reported as zero.
    pub allocation_epsilon: Money,
    /// Slack allowed on the budget and per-deal bounds after rounding.
    pub bound_tolerance: Money,
    /// Absolute part of the objective drift tolerance.
    pub drift_abs_tolerance: Decimal,
    /// Relative part of the objective drift tolerance.
    pub drift_rel_tolerance: Decimal,
    /// Tolerance on the sum of sector target fractions.
    pub target_sum_epsilon: Decimal,
    /// Decimal places allocations are rounded to.
    pub rounding_dp: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            solve_timeout_ms: Some(30_000),
            allocation_epsilon: dec!(0.01),
            bound_tolerance: dec!(0.01),
            drift_abs_tolerance: dec!(1),
            drift_rel_tolerance: dec!(0.000001),
            target_sum_epsilon: TARGET_SUM_EPSILON,
            rounding_dp: 2,
        }
    }
}

impl EngineConfig {
    pub fn solve_timeout(&self) -> Option<Duration> {
        self.solve_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> BundleResult<()> {
        let non_negative = [
            ("allocationEpsilon", self.allocation_epsilon),
            ("boundTolerance", self.bound_tolerance),
            ("driftAbsTolerance", self.drift_abs_tolerance),
            ("driftRelTolerance", self.drift_rel_tolerance),
            ("targetSumEpsilon", self.target_sum_epsilon),
        ];
        for (field, value) in non_negative {
            if value < Decimal::ZERO {
                return Err(BundleError::invalid(
                    format!("config.{}", field),
                    format!("must be non-negative, got {}", value),
                ));
            }
        }
        if self.solve_timeout_ms == Some(0) {
            return Err(BundleError::invalid(
                "config.solveTimeoutMs",
                "must be positive when set",
            ));
        }
        if self.rounding_dp > 10 {
            return Err(BundleError::invalid(
                "config.roundingDp",
                format!("at most 10 decimal places, got {}", self.rounding_dp),
            ));
        }
        Ok(())
    }
}
