use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::model::{ConstraintSense, LpModel, VarId};
use crate::catalogue::{Deal, Sector};
use crate::risk::{self, RiskScore};
use crate::thesis::ThesisConstraints;
use crate::types::Money;
use crate::{BundleError, BundleResult};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// An included deal together with its allocation variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealVariable {
    pub deal: Deal,
    pub risk_score: RiskScore,
    /// Objective coefficient `risk_aversion / R`.
    pub penalty: Decimal,
    pub var: VarId,
}

/// One sector's deviation variable and the amounts it is measured against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorRow {
    pub sector: Sector,
    pub target_amount: Money,
    pub holding: Money,
    pub deviation_var: VarId,
}

/// A deal left out of the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcludedDeal {
    pub deal_id: String,
    pub reason: String,
}

/// The LP together with the bookkeeping needed to read its solution back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Formulation {
    pub model: LpModel,
    pub deals: Vec<DealVariable>,
    pub sectors: Vec<SectorRow>,
    pub excluded: Vec<ExcludedDeal>,
    pub total_budget: Money,
    pub risk_aversion: Decimal,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Build the allocation LP.
///
/// Minimise `Σ_s d_s + Σ_j p_j x_j` subject to `Σ_j x_j ≤ budget`,
/// `0 ≤ x_j ≤ requested_j` and, per sector,
/// `d_s ≥ deployed_s − target_s`, `d_s ≥ target_s − deployed_s`.
///
/// Deals with all-zero ratios are excluded rather than failing the run.
/// The thesis is assumed validated; the catalogue is not re-validated here.
pub fn formulate(deals: &[Deal], thesis: &ThesisConstraints) -> BundleResult<Formulation> {
    if thesis.total_budget <= Decimal::ZERO {
        return Err(BundleError::EmptyFormulation(format!(
            "total budget must be positive, got {}",
            thesis.total_budget
        )));
    }

    let mut included: Vec<(Deal, RiskScore)> = Vec::with_capacity(deals.len());
    let mut excluded = Vec::new();
    for deal in deals {
        match risk::score(deal) {
            Ok(score) => included.push((deal.clone(), score)),
            Err(err @ BundleError::DegenerateRisk { .. }) => {
                tracing::warn!(deal_id = %deal.id, "excluding deal: {}", err);
                excluded.push(ExcludedDeal {
                    deal_id: deal.id.clone(),
                    reason: err.to_string(),
                });
            }
            Err(other) => return Err(other),
        }
    }

    if included.is_empty() {
        return Err(BundleError::EmptyFormulation(format!(
            "no usable deals ({} supplied, {} excluded)",
            deals.len(),
            excluded.len()
        )));
    }

    let mut model = LpModel::new("capital_bundle");

    // --- Allocation variables x_j ---
    let mut deal_vars = Vec::with_capacity(included.len());
    for (deal, score) in included {
        let penalty = score.penalty(thesis.risk_aversion)?;
        let var = model.add_variable(
            format!("x_{}", deal.id),
            0.0,
            Some(to_f64(deal.requested_amount, "requestedAmount")?),
            to_f64(penalty, "risk penalty")?,
        );
        deal_vars.push(DealVariable {
            deal,
            risk_score: score,
            penalty,
            var,
        });
    }

    // --- Budget ---
    let all_terms: Vec<(VarId, f64)> = deal_vars.iter().map(|dv| (dv.var, 1.0)).collect();
    model.add_constraint(
        "budget",
        all_terms,
        ConstraintSense::LessEq,
        to_f64(thesis.total_budget, "totalBudget")?,
    );

    // --- Sector deviation d_s, linearised |deployed - target| ---
    let mut sector_set: BTreeSet<Sector> = thesis.referenced_sectors();
    sector_set.extend(deal_vars.iter().map(|dv| dv.deal.sector.clone()));

    let mut sectors = Vec::with_capacity(sector_set.len());
    for sector in sector_set {
        let target_amount = thesis.sector_target_amount(&sector)?;
        let holding = thesis.holding(&sector);
        let deviation_var = model.add_variable(format!("d_{}", sector), 0.0, None, 1.0);

        let members: Vec<VarId> = deal_vars
            .iter()
            .filter(|dv| dv.deal.sector == sector)
            .map(|dv| dv.var)
            .collect();
        let gap = to_f64(target_amount - holding, "sector target")?;

        // d_s - Σx ≥ holding - target
        let mut over: Vec<(VarId, f64)> = vec![(deviation_var, 1.0)];
        over.extend(members.iter().map(|v| (*v, -1.0)));
        model.add_constraint(
            format!("dev_over_{}", sector),
            over,
            ConstraintSense::GreaterEq,
            -gap,
        );

        // d_s + Σx ≥ target - holding
        let mut under: Vec<(VarId, f64)> = vec![(deviation_var, 1.0)];
        under.extend(members.iter().map(|v| (*v, 1.0)));
        model.add_constraint(
            format!("dev_under_{}", sector),
            under,
            ConstraintSense::GreaterEq,
            gap,
        );

        sectors.push(SectorRow {
            sector,
            target_amount,
            holding,
            deviation_var,
        });
    }

    tracing::debug!(
        deals = deal_vars.len(),
        excluded = excluded.len(),
        sectors = sectors.len(),
        variables = model.variables.len(),
        constraints = model.constraints.len(),
        "formulated capital bundle LP"
    );

    Ok(Formulation {
        model,
        deals: deal_vars,
        sectors,
        excluded,
        total_budget: thesis.total_budget,
        risk_aversion: thesis.risk_aversion,
    })
}

fn to_f64(value: Decimal, context: &str) -> BundleResult<f64> {
    value
        .to_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            BundleError::invalid(context, format!("{} is not representable as f64", value))
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
