pub mod catalogue;
pub mod error;
pub mod optimization;
pub mod risk;
pub mod thesis;
pub mod types;

pub use error::{BundleError, SolverFailure};
pub use types::*;

/// Standard result type for all capital-bundle operations
pub type BundleResult<T> = Result<T, BundleError>;
