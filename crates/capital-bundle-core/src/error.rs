use thiserror::Error;

/// Why a solve did not produce a usable solution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolverFailure {
    /// The adapter reported `Error`.
    #[error("backend error: {0}")]
    Backend(String),
    /// The solve did not finish within the configured timeout.
    #[error("timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    /// The adapter returned values that break the model's bounds beyond tolerance.
    #[error("solution out of bounds: {0}")]
    BoundViolation(String),
    /// The worker running the solve vanished without reporting a status.
    #[error("solver worker exited without a status")]
    Disconnected,
}

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Degenerate risk: deal '{deal_id}' has all-zero ratios (aggregate risk score is zero)")]
    DegenerateRisk { deal_id: String },

    #[error("Empty formulation: {0}")]
    EmptyFormulation(String),

    #[error("Solver error: {0}")]
    Solver(#[from] SolverFailure),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl BundleError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        BundleError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// A Decimal operation on `field` left the representable range.
    pub(crate) fn overflow(field: impl Into<String>) -> Self {
        Self::invalid(field, "value out of Decimal range (arithmetic overflow)")
    }

    /// True when the run stopped on a solver timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, BundleError::Solver(SolverFailure::Timeout { .. }))
    }
}

impl From<serde_json::Error> for BundleError {
    fn from(e: serde_json::Error) -> Self {
        BundleError::SerializationError(e.to_string())
    }
}
