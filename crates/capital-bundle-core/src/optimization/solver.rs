use serde::{Deserialize, Serialize};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::model::LpModel;
use crate::error::SolverFailure;
use crate::BundleResult;

/// Terminal status of one solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    Error,
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SolveStatus::Optimal => "OPTIMAL",
            SolveStatus::Infeasible => "INFEASIBLE",
            SolveStatus::Unbounded => "UNBOUNDED",
            SolveStatus::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Raw result of a solve: one value per model variable when `Optimal`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverOutput {
    pub status: SolveStatus,
    pub values: Vec<f64>,
    /// Objective reported by the backend; adapters that do not expose one
    /// leave it `None` and the engine evaluates the model at `values`.
    pub objective: Option<f64>,
    pub message: Option<String>,
}

impl SolverOutput {
    pub fn optimal(values: Vec<f64>, objective: Option<f64>) -> Self {
        Self {
            status: SolveStatus::Optimal,
            values,
            objective,
            message: None,
        }
    }

    pub fn without_solution(status: SolveStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            values: Vec::new(),
            objective: None,
            message: Some(message.into()),
        }
    }
}

/// A capability that solves a continuous linear program.
///
/// Implementations must be callable from a worker thread; the engine never
/// calls the same adapter re-entrantly for one run.
pub trait SolverAdapter: Send + Sync {
    fn name(&self) -> &str;

    fn solve(&self, model: &LpModel) -> SolverOutput;
}

/// Run `solver` on `model`, giving up after `timeout`.
///
/// On timeout the worker thread is abandoned; whatever it eventually
/// produces is dropped with the channel. `Error` statuses are converted to
/// [`crate::BundleError::Solver`]; every other status is returned to the caller.
pub fn solve_with_timeout(
    solver: &Arc<dyn SolverAdapter>,
    model: &LpModel,
    timeout: Option<Duration>,
) -> BundleResult<SolverOutput> {
    let output = match timeout {
        None => solver.solve(model),
        Some(limit) => {
            let (tx, rx) = mpsc::channel();
            let worker_solver = Arc::clone(solver);
            let worker_model = model.clone();
            thread::Builder::new()
                .name("bundle-solve".into())
                .spawn(move || {
                    let out = worker_solver.solve(&worker_model);
                    // Receiver is gone after a timeout.
                    let _ = tx.send(out);
                })
                .map_err(|e| SolverFailure::Backend(e.to_string()))?;

            match rx.recv_timeout(limit) {
                Ok(out) => out,
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    let timeout_ms = limit.as_millis() as u64;
                    tracing::warn!(
                        solver = solver.name(),
                        timeout_ms,
                        "solve abandoned on timeout"
                    );
                    return Err(SolverFailure::Timeout { timeout_ms }.into());
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(SolverFailure::Disconnected.into());
                }
            }
        }
    };

    if output.status == SolveStatus::Error {
        let msg = output
            .message
            .unwrap_or_else(|| format!("{} reported an error", solver.name()));
        return Err(SolverFailure::Backend(msg).into());
    }
    Ok(output)
}
