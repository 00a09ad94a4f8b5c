use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::constraints::ThesisConstraints;
use crate::catalogue::Sector;
use crate::types::{Money, Rate};
use crate::{BundleError, BundleResult};

const GBP_PER_MILLION: Money = dec!(1_000_000);

/// Raw record produced by thesis-document extraction. Weights are whatever
/// the extractor read off the document and need not sum to 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThesisExtract {
    #[serde(alias = "amount_millions")]
    pub amount_millions: Decimal,
    #[serde(alias = "desired_sectors")]
    pub desired_sectors: BTreeMap<Sector, Decimal>,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub kpis: Vec<String>,
    #[serde(default)]
    pub timeline: Option<String>,
}

/// Result of normalising an extraction record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedThesis {
    pub constraints: ThesisConstraints,
    /// Labels the extractor produced that are not marketplace sectors.
    pub dropped_sectors: Vec<String>,
    pub overview: String,
    pub kpis: Vec<String>,
    pub timeline: Option<String>,
}

impl ThesisExtract {
    /// Keep marketplace sectors with positive weight, rescale them to sum
    /// to 1 and convert the amount from millions to pounds.
    pub fn normalize(&self, risk_aversion: Decimal) -> BundleResult<NormalizedThesis> {
        let mut dropped_sectors = Vec::new();
        let mut kept: BTreeMap<Sector, Rate> = BTreeMap::new();

        for (sector, weight) in &self.desired_sectors {
            if !sector.is_known() {
                dropped_sectors.push(sector.label().to_string());
                continue;
            }
            if *weight > Decimal::ZERO {
                kept.insert(sector.clone(), *weight);
            }
        }

        let total = kept
            .values()
            .try_fold(Decimal::ZERO, |acc, w| acc.checked_add(*w))
            .ok_or_else(|| BundleError::overflow("desiredSectors"))?;
        if total <= Decimal::ZERO {
            return Err(BundleError::invalid(
                "desiredSectors",
                "no marketplace sector with a positive weight",
            ));
        }
        for weight in kept.values_mut() {
            *weight /= total;
        }

        if !dropped_sectors.is_empty() {
            tracing::warn!(
                dropped = ?dropped_sectors,
                "thesis names sectors outside the marketplace"
            );
        }

        let budget = self
            .amount_millions
            .checked_mul(GBP_PER_MILLION)
            .ok_or_else(|| BundleError::overflow("amountMillions"))?;
        let constraints = ThesisConstraints::new(budget, kept, risk_aversion)?;

        Ok(NormalizedThesis {
            constraints,
            dropped_sectors,
            overview: self.overview.clone(),
            kpis: self.kpis.clone(),
            timeline: self.timeline.clone(),
        })
    }
}
