pub mod scoring;

pub use scoring::{score, score_ratios, RiskScore};
