use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::config::EngineConfig;
use super::formulation::Formulation;
use super::solver::{SolveStatus, SolverOutput};
use crate::catalogue::Sector;
use crate::error::SolverFailure;
use crate::types::{Money, Multiple, Rate};
use crate::{BundleError, BundleResult};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Capital assigned to one deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationLine {
    pub deal_id: String,
    pub sector: Sector,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Money,
    /// Share of the deal's requested amount that was taken.
    #[serde(with = "rust_decimal::serde::float")]
    pub fraction_of_request: Rate,
    #[serde(with = "rust_decimal::serde::float")]
    pub risk_score: Multiple,
}

/// The engine's output for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub feasible: bool,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_deployed: Money,
    /// Objective recomputed from the rounded allocations.
    #[serde(with = "rust_decimal::serde::float")]
    pub objective_value: Decimal,
    #[serde(with = "float_map")]
    pub sector_breakdown: BTreeMap<Sector, Money>,
    /// Sorted by amount, largest first. Only non-zero allocations.
    pub allocations: Vec<AllocationLine>,
    pub diagnostics: Vec<String>,
    /// Share of deployed capital per sector.
    #[serde(with = "float_map")]
    pub sector_weights: BTreeMap<Sector, Rate>,
    /// Signed `holding + deployed - target` per sector.
    #[serde(with = "float_map")]
    pub sector_deviation: BTreeMap<Sector, Money>,
    /// Capital-weighted aggregate risk score of the allocation.
    #[serde(with = "rust_decimal::serde::float")]
    pub weighted_risk_score: Multiple,
    /// Deployed capital over budget.
    #[serde(with = "rust_decimal::serde::float")]
    pub utilization: Rate,
    /// Objective as reported by the solver, before rounding.
    pub solver_objective: Option<f64>,
    pub excluded_deals: Vec<String>,
}

/// Non-fatal findings attached to a bundle.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    DealExcluded { deal_id: String, reason: String },
    NumericDrift { reported: Decimal, recomputed: Decimal, tolerance: Decimal },
    NoSolution { status: SolveStatus, message: Option<String> },
    NegligibleAllocations { count: usize },
    BudgetTrimmed { excess: Money },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::DealExcluded { deal_id, reason } => {
                write!(f, "DegenerateRiskError: deal '{}' excluded ({})", deal_id, reason)
            }
            Diagnostic::NumericDrift {
                reported,
                recomputed,
                tolerance,
            } => write!(
                f,
                "NumericDriftWarning: solver objective {} vs recomputed {} (tolerance {})",
                reported, recomputed, tolerance
            ),
            Diagnostic::NoSolution { status, message } => match message {
                Some(m) => write!(f, "Solver status {}: {}", status, m),
                None => write!(f, "Solver status {}", status),
            },
            Diagnostic::NegligibleAllocations { count } => write!(
                f,
                "{} allocation(s) below tolerance reported as zero",
                count
            ),
            Diagnostic::BudgetTrimmed { excess } => {
                write!(f, "rounding overshoot of {} trimmed to stay within budget", excess)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Turn a solver result into a [`Bundle`].
///
/// Infeasible and unbounded outcomes yield `feasible = false`. An optimal
/// solution is clamped, rounded and re-checked against every bound before
/// it is returned; a violation beyond `bound_tolerance` is a solver error.
pub fn assemble(
    formulation: &Formulation,
    output: &SolverOutput,
    config: &EngineConfig,
) -> BundleResult<Bundle> {
    let mut diagnostics: Vec<Diagnostic> = formulation
        .excluded
        .iter()
        .map(|e| Diagnostic::DealExcluded {
            deal_id: e.deal_id.clone(),
            reason: e.reason.clone(),
        })
        .collect();

    match output.status {
        SolveStatus::Optimal => {}
        SolveStatus::Infeasible | SolveStatus::Unbounded => {
            diagnostics.push(Diagnostic::NoSolution {
                status: output.status,
                message: output.message.clone(),
            });
            return Ok(infeasible_bundle(formulation, diagnostics));
        }
        SolveStatus::Error => {
            return Err(SolverFailure::Backend(
                output
                    .message
                    .clone()
                    .unwrap_or_else(|| "solver reported an error".into()),
            )
            .into());
        }
    }

    let n_vars = formulation.model.variables.len();
    if output.values.len() != n_vars {
        return Err(SolverFailure::Backend(format!(
            "expected {} variable values, got {}",
            n_vars,
            output.values.len()
        ))
        .into());
    }

    let tol = config.bound_tolerance;

    // --- Clamp, drop noise, round ---
    let mut amounts: Vec<Money> = Vec::with_capacity(formulation.deals.len());
    let mut raw_total = Decimal::ZERO;
    let mut negligible = 0usize;
    for dv in &formulation.deals {
        let raw = decimal_value(output.values[dv.var.0], &dv.deal.id)?;
        let cap = dv.deal.requested_amount;
        if raw < -tol || raw > cap.saturating_add(tol) {
            return Err(SolverFailure::BoundViolation(format!(
                "deal '{}' allocated {} outside [0, {}]",
                dv.deal.id, raw, cap
            ))
            .into());
        }
        let clamped = raw.max(Decimal::ZERO).min(cap);
        raw_total = raw_total.saturating_add(clamped);

        let amount = if clamped < config.allocation_epsilon {
            if clamped > Decimal::ZERO {
                negligible += 1;
            }
            Decimal::ZERO
        } else {
            clamped.round_dp(config.rounding_dp).min(cap)
        };
        amounts.push(amount);
    }
    if negligible > 0 {
        diagnostics.push(Diagnostic::NegligibleAllocations { count: negligible });
    }

    let budget = formulation.total_budget;
    if raw_total > budget.saturating_add(tol) {
        return Err(SolverFailure::BoundViolation(format!(
            "solution deploys {} against a budget of {}",
            raw_total, budget
        ))
        .into());
    }

    // Per-deal rounding across many deals can push the total a few pennies
    // over budget; take the excess from the largest allocation.
    let mut total = checked_sum(&amounts, "totalDeployed")?;
    if total > budget {
        let excess = total - budget;
        if let Some(largest) = amounts.iter_mut().max() {
            *largest = (*largest - excess).max(Decimal::ZERO);
        }
        total = checked_sum(&amounts, "totalDeployed")?;
        diagnostics.push(Diagnostic::BudgetTrimmed { excess });
    }

    // --- Aggregates ---
    let mut sector_breakdown: BTreeMap<Sector, Money> = formulation
        .sectors
        .iter()
        .map(|row| (row.sector.clone(), Decimal::ZERO))
        .collect();
    let mut penalty_cost = Decimal::ZERO;
    let mut risk_weighted = Decimal::ZERO;
    let mut allocations = Vec::new();

    for (dv, amount) in formulation.deals.iter().zip(&amounts) {
        if amount.is_zero() {
            continue;
        }
        let deployed = sector_breakdown
            .entry(dv.deal.sector.clone())
            .or_insert(Decimal::ZERO);
        *deployed = deployed
            .checked_add(*amount)
            .ok_or_else(|| BundleError::overflow("sectorBreakdown"))?;
        penalty_cost = dv
            .penalty
            .checked_mul(*amount)
            .and_then(|cost| penalty_cost.checked_add(cost))
            .ok_or_else(|| BundleError::overflow("riskAversion"))?;
        risk_weighted = dv
            .risk_score
            .value()
            .checked_mul(*amount)
            .and_then(|w| risk_weighted.checked_add(w))
            .ok_or_else(|| BundleError::overflow("weightedRiskScore"))?;
        allocations.push(AllocationLine {
            deal_id: dv.deal.id.clone(),
            sector: dv.deal.sector.clone(),
            amount: *amount,
            fraction_of_request: *amount / dv.deal.requested_amount,
            risk_score: dv.risk_score.value(),
        });
    }
    allocations.sort_by(|a, b| b.amount.cmp(&a.amount).then_with(|| a.deal_id.cmp(&b.deal_id)));

    let mut misalignment = Decimal::ZERO;
    let mut sector_deviation = BTreeMap::new();
    for row in &formulation.sectors {
        let deployed = sector_breakdown
            .get(&row.sector)
            .copied()
            .unwrap_or(Decimal::ZERO);
        let deviation = row
            .holding
            .checked_add(deployed)
            .and_then(|held| held.checked_sub(row.target_amount))
            .ok_or_else(|| BundleError::overflow(format!("sectorDeviation.{}", row.sector)))?;
        misalignment = misalignment
            .checked_add(deviation.abs())
            .ok_or_else(|| BundleError::overflow("objectiveValue"))?;
        sector_deviation.insert(row.sector.clone(), deviation);
    }
    let objective_value = misalignment
        .checked_add(penalty_cost)
        .ok_or_else(|| BundleError::overflow("objectiveValue"))?;

    // --- Drift check against the solver's own objective ---
    let reported_f64 = output
        .objective
        .unwrap_or_else(|| formulation.model.objective_at(&output.values));
    let reported = decimal_value(reported_f64, "objective")?;
    // An unrepresentable tolerance saturates, so it can only widen.
    let drift_tolerance = config
        .drift_rel_tolerance
        .saturating_mul(reported.abs())
        .saturating_add(config.drift_abs_tolerance);
    if objective_value.saturating_sub(reported).abs() > drift_tolerance {
        tracing::warn!(
            reported = %reported,
            recomputed = %objective_value,
            "objective drift beyond tolerance"
        );
        diagnostics.push(Diagnostic::NumericDrift {
            reported,
            recomputed: objective_value,
            tolerance: drift_tolerance,
        });
    }

    let sector_weights = if total > Decimal::ZERO {
        sector_breakdown
            .iter()
            .map(|(s, v)| (s.clone(), *v / total))
            .collect()
    } else {
        BTreeMap::new()
    };
    let weighted_risk_score = if total > Decimal::ZERO {
        risk_weighted
            .checked_div(total)
            .ok_or_else(|| BundleError::overflow("weightedRiskScore"))?
    } else {
        Decimal::ZERO
    };

    let bundle = Bundle {
        feasible: true,
        total_deployed: total,
        objective_value,
        sector_breakdown,
        allocations,
        diagnostics: diagnostics.iter().map(ToString::to_string).collect(),
        sector_weights,
        sector_deviation,
        weighted_risk_score,
        utilization: total
            .checked_div(budget)
            .ok_or_else(|| BundleError::overflow("utilization"))?,
        solver_objective: Some(reported_f64),
        excluded_deals: formulation.excluded.iter().map(|e| e.deal_id.clone()).collect(),
    };

    verify_bounds(&bundle, formulation, tol)?;
    Ok(bundle)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn infeasible_bundle(formulation: &Formulation, diagnostics: Vec<Diagnostic>) -> Bundle {
    Bundle {
        feasible: false,
        total_deployed: Decimal::ZERO,
        objective_value: Decimal::ZERO,
        sector_breakdown: BTreeMap::new(),
        allocations: Vec::new(),
        diagnostics: diagnostics.iter().map(ToString::to_string).collect(),
        sector_weights: BTreeMap::new(),
        sector_deviation: BTreeMap::new(),
        weighted_risk_score: Decimal::ZERO,
        utilization: Decimal::ZERO,
        solver_objective: None,
        excluded_deals: formulation.excluded.iter().map(|e| e.deal_id.clone()).collect(),
    }
}

/// Final check of the budget and per-deal caps on the rounded bundle.
fn verify_bounds(bundle: &Bundle, formulation: &Formulation, tol: Money) -> BundleResult<()> {
    if bundle.total_deployed > formulation.total_budget.saturating_add(tol) {
        return Err(SolverFailure::BoundViolation(format!(
            "bundle deploys {} against a budget of {}",
            bundle.total_deployed, formulation.total_budget
        ))
        .into());
    }
    let caps: HashMap<&str, Money> = formulation
        .deals
        .iter()
        .map(|dv| (dv.deal.id.as_str(), dv.deal.requested_amount))
        .collect();
    for line in &bundle.allocations {
        let cap = caps
            .get(line.deal_id.as_str())
            .copied()
            .unwrap_or(Decimal::ZERO);
        if line.amount < Decimal::ZERO || line.amount > cap.saturating_add(tol) {
            return Err(SolverFailure::BoundViolation(format!(
                "deal '{}' allocated {} against a request of {}",
                line.deal_id, line.amount, cap
            ))
            .into());
        }
    }
    Ok(())
}

fn decimal_value(value: f64, context: &str) -> BundleResult<Decimal> {
    Decimal::from_f64(value).ok_or_else(|| {
        SolverFailure::Backend(format!("non-representable value {} for {}", value, context)).into()
    })
}

fn checked_sum(amounts: &[Money], field: &str) -> BundleResult<Money> {
    amounts
        .iter()
        .try_fold(Decimal::ZERO, |acc, a| acc.checked_add(*a))
        .ok_or_else(|| BundleError::overflow(field))
}

/// Serialize `Sector -> Decimal` maps with float values, matching the
/// numeric JSON contract of the bundle.
mod float_map {
    use super::*;
    use serde::de::Deserializer;
    use serde::ser::{SerializeMap, Serializer};

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<Sector, Decimal>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut out = serializer.serialize_map(Some(map.len()))?;
        for (k, v) in map {
            out.serialize_entry(k, &v.to_f64().unwrap_or(0.0))?;
        }
        out.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<Sector, Decimal>, D::Error> {
        let raw: BTreeMap<Sector, f64> = BTreeMap::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(k, v)| {
                Decimal::from_f64(v)
                    .map(|d| (k, d))
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid amount {}", v)))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{Deal, RiskRatios};
    use crate::optimization::formulation::formulate;
    use crate::thesis::ThesisConstraints;
    use rust_decimal_macros::dec;

    fn formulation(risk_aversion: Decimal) -> Formulation {
        let deals = vec![
            Deal {
                id: "R1".into(),
                sector: Sector::Retail,
                requested_amount: dec!(60000),
                ratios: RiskRatios::new(dec!(1), dec!(1), dec!(1)),
            },
            Deal {
                id: "T1".into(),
                sector: Sector::Other("Tech".into()),
                requested_amount: dec!(50000),
                ratios: RiskRatios::new(dec!(2), dec!(2), dec!(2)),
            },
            Deal {
                id: "Z1".into(),
                sector: Sector::Retail,
                requested_amount: dec!(1000),
                ratios: RiskRatios::new(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
            },
        ];
        let thesis = ThesisConstraints::new(
            dec!(100000),
            [
                (Sector::Retail, dec!(0.6)),
                (Sector::Other("Tech".into()), dec!(0.4)),
            ]
            .into_iter()
            .collect(),
            risk_aversion,
        )
        .unwrap();
        formulate(&deals, &thesis).unwrap()
    }

    /// Values vector: [x_R1, x_T1, d_Retail, d_Tech] (deal vars first, then
    /// sectors in label order).
    fn output(x_r: f64, x_t: f64) -> SolverOutput {
        let d_retail = (x_r - 60000.0).abs();
        let d_tech = (x_t - 40000.0).abs();
        SolverOutput::optimal(vec![x_r, x_t, d_retail, d_tech], None)
    }

    // ------------------------------------------------------------------
    // 1. Exact solution assembles cleanly
    // ------------------------------------------------------------------
    #[test]
    fn test_exact_solution() {
        let f = formulation(Decimal::ZERO);
        let b = assemble(&f, &output(60000.0, 40000.0), &EngineConfig::default()).unwrap();
        assert!(b.feasible);
        assert_eq!(b.total_deployed, dec!(100000));
        assert_eq!(b.objective_value, Decimal::ZERO);
        assert_eq!(b.allocations.len(), 2);
        assert_eq!(b.allocations[0].deal_id, "R1");
        assert_eq!(b.allocations[1].fraction_of_request, dec!(0.8));
        assert_eq!(b.sector_breakdown[&Sector::Retail], dec!(60000));
        assert_eq!(b.sector_weights[&Sector::Retail], dec!(0.6));
        assert_eq!(b.utilization, Decimal::ONE);
        assert_eq!(b.excluded_deals, vec!["Z1".to_string()]);
        assert!(b.diagnostics[0].starts_with("DegenerateRiskError"));
    }

    // ------------------------------------------------------------------
    // 2. Solver noise is rounded away
    // ------------------------------------------------------------------
    #[test]
    fn test_noise_rounded_and_negligible_dropped() {
        let f = formulation(Decimal::ZERO);
        let out = SolverOutput::optimal(vec![59999.999999, 1e-9, 0.0, 40000.0], None);
        let b = assemble(&f, &out, &EngineConfig::default()).unwrap();
        assert_eq!(b.allocations.len(), 1);
        assert_eq!(b.allocations[0].amount, dec!(60000));
        assert!(b
            .diagnostics
            .iter()
            .any(|d| d.contains("below tolerance reported as zero")));
    }

    // ------------------------------------------------------------------
    // 3. Small overshoot clamped, large overshoot rejected
    // ------------------------------------------------------------------
    #[test]
    fn test_overshoot_within_tolerance_clamped() {
        let f = formulation(Decimal::ZERO);
        let b = assemble(&f, &output(60000.004, 39999.996), &EngineConfig::default()).unwrap();
        assert_eq!(b.allocations[0].amount, dec!(60000));
        assert!(b.total_deployed <= dec!(100000));
    }

    #[test]
    fn test_overshoot_beyond_tolerance_is_error() {
        let f = formulation(Decimal::ZERO);
        let err = assemble(&f, &output(60500.0, 0.0), &EngineConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            BundleError::Solver(SolverFailure::BoundViolation(_))
        ));
    }

    #[test]
    fn test_over_budget_is_error() {
        let f = formulation(Decimal::ZERO);
        let err = assemble(&f, &output(60000.0, 50000.0), &EngineConfig::default()).unwrap_err();
        assert!(err.to_string().contains("budget"));
    }

    // ------------------------------------------------------------------
    // 4. Drift between reported and recomputed objective
    // ------------------------------------------------------------------
    #[test]
    fn test_drift_flagged_but_not_fatal() {
        let f = formulation(Decimal::ZERO);
        let mut out = output(60000.0, 40000.0);
        out.objective = Some(500.0);
        let b = assemble(&f, &out, &EngineConfig::default()).unwrap();
        assert!(b.feasible);
        assert!(b.diagnostics.iter().any(|d| d.starts_with("NumericDriftWarning")));
        assert_eq!(b.solver_objective, Some(500.0));
    }

    #[test]
    fn test_no_drift_when_consistent() {
        let f = formulation(dec!(3));
        // penalties: R1 = 3/3 = 1, T1 = 3/6 = 0.5
        let b = assemble(&f, &output(60000.0, 40000.0), &EngineConfig::default()).unwrap();
        assert_eq!(b.objective_value, dec!(80000));
        assert!(!b.diagnostics.iter().any(|d| d.contains("NumericDrift")));
    }

    // ------------------------------------------------------------------
    // 5. Non-optimal statuses
    // ------------------------------------------------------------------
    #[test]
    fn test_infeasible_yields_empty_bundle() {
        let f = formulation(Decimal::ZERO);
        let out = SolverOutput::without_solution(SolveStatus::Infeasible, "numerical trouble");
        let b = assemble(&f, &out, &EngineConfig::default()).unwrap();
        assert!(!b.feasible);
        assert!(b.allocations.is_empty());
        assert!(b
            .diagnostics
            .iter()
            .any(|d| d.contains("INFEASIBLE") && d.contains("numerical trouble")));
    }

    #[test]
    fn test_unbounded_yields_empty_bundle() {
        let f = formulation(Decimal::ZERO);
        let out = SolverOutput::without_solution(SolveStatus::Unbounded, "ray");
        let b = assemble(&f, &out, &EngineConfig::default()).unwrap();
        assert!(!b.feasible);
        assert_eq!(b.total_deployed, Decimal::ZERO);
    }

    #[test]
    fn test_wrong_value_count_is_error() {
        let f = formulation(Decimal::ZERO);
        let out = SolverOutput::optimal(vec![1.0], None);
        assert!(assemble(&f, &out, &EngineConfig::default()).is_err());
    }

    #[test]
    fn test_penalty_cost_overflow_is_invalid_input() {
        // R1 penalty is 1e25 / 3; times 60000 leaves the Decimal range.
        let f = formulation(dec!(10000000000000000000000000));
        let err = assemble(&f, &output(60000.0, 40000.0), &EngineConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            BundleError::InvalidInput { ref field, .. } if field == "riskAversion"
        ));
    }

    // ------------------------------------------------------------------
    // 6. JSON contract
    // ------------------------------------------------------------------
    #[test]
    fn test_bundle_json_shape() {
        let f = formulation(Decimal::ZERO);
        let b = assemble(&f, &output(60000.0, 40000.0), &EngineConfig::default()).unwrap();
        let v = serde_json::to_value(&b).unwrap();
        assert_eq!(v["feasible"], serde_json::json!(true));
        assert_eq!(v["totalDeployed"], serde_json::json!(100000.0));
        assert_eq!(v["sectorBreakdown"]["Retail"], serde_json::json!(60000.0));
        assert_eq!(v["allocations"][0]["dealId"], serde_json::json!("R1"));
        assert_eq!(v["allocations"][0]["sector"], serde_json::json!("Retail"));
        assert!(v["diagnostics"].is_array());

        let back: Bundle = serde_json::from_value(v).unwrap();
        assert_eq!(back.total_deployed, dec!(100000));
    }
}
