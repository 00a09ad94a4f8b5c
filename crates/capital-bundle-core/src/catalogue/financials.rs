//! Normalisation of raw company-financials rows into deals.
//!
//! The marketplace dataset publishes one row per company with turnover,
//! balance-sheet size and a handful of ratios, some of which arrive as
//! spreadsheet error cells (`#DIV/0!`). Deal size is a fixed share of
//! turnover and each ratio is forced into a strictly positive range, so
//! every imported deal has a usable aggregate risk score.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

use super::deal::{Deal, RiskRatios, Sector};
use crate::types::{Money, Rate};

/// Share of turnover offered as the deal's requested amount.
pub const DEAL_SIZE_SHARE: Rate = dec!(0.10);
/// Value used when a ratio cell is missing, unparseable or non-positive.
const RATIO_DEFAULT: Decimal = dec!(1);
/// Lower floor applied to every ratio.
const RATIO_FLOOR: Decimal = dec!(0.1);
/// Upper clamp for the EBITDA margin.
const MARGIN_CAP: Decimal = dec!(10);

/// One raw row of the company-financials dataset. Every cell is optional
/// text because the source mixes numbers with spreadsheet error markers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyFinancials {
    #[serde(rename = "Company Name", default)]
    pub company_name: Option<String>,
    #[serde(rename = "Sector", default)]
    pub sector: Option<String>,
    #[serde(rename = "Turnover", default)]
    pub turnover: Option<String>,
    #[serde(rename = "Total Assets", default)]
    pub total_assets: Option<String>,
    // The published header carries the typo.
    #[serde(rename = "Currrent Ratio", alias = "Current Ratio", default)]
    pub current_ratio: Option<String>,
    #[serde(rename = "ICR", default)]
    pub interest_cover: Option<String>,
    #[serde(rename = "EBITDA", default)]
    pub ebitda: Option<String>,
}

/// A row that could not be turned into a deal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedRow {
    pub row: usize,
    pub company: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialsImport {
    pub deals: Vec<Deal>,
    pub skipped: Vec<SkippedRow>,
}

/// Convert raw rows into deals, optionally keeping only `sectors`.
pub fn import_financials(rows: &[CompanyFinancials], sectors: &[Sector]) -> FinancialsImport {
    let mut deals = Vec::with_capacity(rows.len());
    let mut skipped = Vec::new();
    let mut ids: HashSet<String> = HashSet::with_capacity(rows.len());

    for (idx, row) in rows.iter().enumerate() {
        let sector = row
            .sector
            .as_deref()
            .and_then(|s| Sector::from_str(s).ok())
            .unwrap_or_else(|| Sector::Other("Unknown".into()));
        if !sectors.is_empty() && !sectors.contains(&sector) {
            continue;
        }

        match normalise_row(row, sector) {
            Some((name, sector, size, ratios)) => {
                let mut id = name.unwrap_or_else(|| format!("Unknown_{}", idx));
                if ids.contains(&id) {
                    id = format!("{}#{}", id, idx);
                }
                ids.insert(id.clone());
                deals.push(Deal {
                    id,
                    sector,
                    requested_amount: size,
                    ratios,
                });
            }
            None => skipped.push(SkippedRow {
                row: idx,
                company: row.company_name.clone(),
                reason: "no positive turnover or total assets".into(),
            }),
        }
    }

    if !skipped.is_empty() {
        tracing::debug!(skipped = skipped.len(), "financials rows without a deal size");
    }

    FinancialsImport { deals, skipped }
}

fn normalise_row(
    row: &CompanyFinancials,
    sector: Sector,
) -> Option<(Option<String>, Sector, Money, RiskRatios)> {
    let turnover = parse_cell(row.turnover.as_deref()).unwrap_or(Decimal::ZERO);
    let base = if turnover > Decimal::ZERO {
        turnover
    } else {
        parse_cell(row.total_assets.as_deref()).unwrap_or(Decimal::ZERO)
    };
    if base <= Decimal::ZERO {
        return None;
    }

    let liquidity = positive_or(row.current_ratio.as_deref(), RATIO_DEFAULT).max(RATIO_FLOOR);
    let debt_service = positive_or(row.interest_cover.as_deref(), RATIO_DEFAULT).max(RATIO_FLOOR);

    let ebitda = positive_or(row.ebitda.as_deref(), Decimal::ZERO);
    let margin_base = positive_or(row.turnover.as_deref(), Decimal::ONE);
    // A margin too large for Decimal is past the cap anyway.
    let solvency = ebitda
        .checked_div(margin_base)
        .unwrap_or(MARGIN_CAP)
        .max(RATIO_FLOOR)
        .min(MARGIN_CAP);

    let name = row
        .company_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Some((
        name,
        sector,
        base * DEAL_SIZE_SHARE,
        RiskRatios::new(debt_service, liquidity, solvency),
    ))
}

/// Parse a numeric cell, tolerating thousands separators and scientific notation.
fn parse_cell(cell: Option<&str>) -> Option<Decimal> {
    let raw = cell?.trim();
    if raw.is_empty() || raw.starts_with('#') {
        return None;
    }
    let cleaned: String = raw.chars().filter(|c| *c != ',' && *c != '£').collect();
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}

fn positive_or(cell: Option<&str>, default: Decimal) -> Decimal {
    match parse_cell(cell) {
        Some(v) if v > Decimal::ZERO => v,
        _ => default,
    }
}
