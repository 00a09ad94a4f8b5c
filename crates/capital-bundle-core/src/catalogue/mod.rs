pub mod deal;

#[cfg(feature = "financials_import")]
pub mod financials;

pub use deal::{filter_by_sector, validate_catalogue, Deal, RiskRatios, Sector};
