pub mod assembly;
pub mod config;
pub mod engine;
pub mod formulation;
pub mod model;
pub mod solver;

#[cfg(feature = "lp_solver")]
pub mod good_lp_solver;

pub use assembly::{assemble, AllocationLine, Bundle, Diagnostic};
pub use config::EngineConfig;
pub use engine::{BundleEngine, BundleInput};
pub use formulation::{formulate, Formulation};
pub use model::{ConstraintSense, LpModel, VarId};
pub use solver::{solve_with_timeout, SolveStatus, SolverAdapter, SolverOutput};

#[cfg(feature = "lp_solver")]
pub use engine::optimize_bundle;
#[cfg(feature = "lp_solver")]
pub use good_lp_solver::GoodLpSolver;
