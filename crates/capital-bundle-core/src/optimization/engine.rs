use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use super::assembly::{assemble, Bundle};
use super::config::EngineConfig;
use super::formulation::formulate;
use super::solver::{solve_with_timeout, SolverAdapter};
use crate::catalogue::{validate_catalogue, Deal};
use crate::thesis::ThesisConstraints;
use crate::types::{with_metadata, ComputationOutput};
use crate::BundleResult;

/// Everything one optimization run needs, in the shape external producers
/// (catalogue loader, thesis extraction) hand it over.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleInput {
    pub thesis: ThesisConstraints,
    pub deals: Vec<Deal>,
    #[serde(default)]
    pub config: EngineConfig,
}

/// Formulate → solve → assemble, with an injected solver.
///
/// Holds no per-run state, so one engine can serve concurrent runs.
#[derive(Clone)]
pub struct BundleEngine {
    solver: Arc<dyn SolverAdapter>,
    config: EngineConfig,
}

impl std::fmt::Debug for BundleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleEngine")
            .field("solver", &self.solver.name())
            .field("config", &self.config)
            .finish()
    }
}

impl BundleEngine {
    pub fn new(solver: Arc<dyn SolverAdapter>, config: EngineConfig) -> Self {
        Self { solver, config }
    }

    #[cfg(feature = "lp_solver")]
    pub fn with_default_solver(config: EngineConfig) -> Self {
        Self::new(Arc::new(super::good_lp_solver::GoodLpSolver), config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one optimization.
    ///
    /// Invariant violations are rejected before any numeric work. An
    /// infeasible or unbounded LP is a `feasible = false` bundle, not an error.
    pub fn run(
        &self,
        deals: &[Deal],
        thesis: &ThesisConstraints,
    ) -> BundleResult<ComputationOutput<Bundle>> {
        let start = Instant::now();

        self.config.validate()?;
        thesis.validate(self.config.target_sum_epsilon)?;
        validate_catalogue(deals)?;

        let formulation = formulate(deals, thesis)?;
        let output = solve_with_timeout(
            &self.solver,
            &formulation.model,
            self.config.solve_timeout(),
        )?;
        let bundle = assemble(&formulation, &output, &self.config)?;

        let elapsed = start.elapsed().as_micros() as u64;
        tracing::info!(
            solver = self.solver.name(),
            status = %output.status,
            feasible = bundle.feasible,
            deployed = %bundle.total_deployed,
            allocations = bundle.allocations.len(),
            elapsed_us = elapsed,
            "bundle optimization finished"
        );

        let warnings = bundle.diagnostics.clone();
        Ok(with_metadata(
            "Sector-target L1 misalignment + risk-penalised capital LP",
            &serde_json::json!({
                "solver": self.solver.name(),
                "status": output.status,
                "deals_supplied": deals.len(),
                "deals_included": formulation.deals.len(),
                "deals_excluded": formulation.excluded.len(),
                "sectors": formulation.sectors.len(),
                "total_budget": thesis.total_budget.to_string(),
                "risk_aversion": thesis.risk_aversion.to_string(),
                "current_holdings": thesis.total_holdings()?.to_string(),
                "solve_timeout_ms": self.config.solve_timeout_ms,
            }),
            warnings,
            elapsed,
            bundle,
        ))
    }
}

/// Optimize a bundle with the bundled LP solver.
#[cfg(feature = "lp_solver")]
pub fn optimize_bundle(input: &BundleInput) -> BundleResult<ComputationOutput<Bundle>> {
    BundleEngine::with_default_solver(input.config.clone()).run(&input.deals, &input.thesis)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
