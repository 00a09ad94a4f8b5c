use capital_bundle_core::catalogue::financials::{import_financials, CompanyFinancials};
use capital_bundle_core::catalogue::{RiskRatios, Sector};
use capital_bundle_core::optimization::BundleInput;
use capital_bundle_core::thesis::ThesisExtract;
use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Optimization
// ---------------------------------------------------------------------------

/// `BundleInput` JSON in, `ComputationOutput<Bundle>` JSON out.
#[napi]
pub fn optimize_bundle(input_json: String) -> NapiResult<String> {
    let input: BundleInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        capital_bundle_core::optimization::optimize_bundle(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Risk
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RiskScoreInput {
    #[serde(default)]
    deal_id: Option<String>,
    ratios: RiskRatios,
    #[serde(default)]
    risk_aversion: Option<Decimal>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RiskScoreOutput {
    risk_score: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    penalty: Option<Decimal>,
}

#[napi]
pub fn score_risk(input_json: String) -> NapiResult<String> {
    let input: RiskScoreInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let deal_id = input.deal_id.as_deref().unwrap_or("deal");
    let score =
        capital_bundle_core::risk::score_ratios(deal_id, &input.ratios).map_err(to_napi_error)?;
    let output = RiskScoreOutput {
        risk_score: score.value(),
        penalty: input
            .risk_aversion
            .map(|ra| score.penalty(ra))
            .transpose()
            .map_err(to_napi_error)?,
    };
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Thesis and catalogue
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NormalizeThesisInput {
    extract: ThesisExtract,
    risk_aversion: Decimal,
}

#[napi]
pub fn normalize_thesis(input_json: String) -> NapiResult<String> {
    let input: NormalizeThesisInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = input
        .extract
        .normalize(input.risk_aversion)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinancialsInput {
    rows: Vec<CompanyFinancials>,
    #[serde(default)]
    sectors: Vec<Sector>,
}

#[napi]
pub fn import_company_financials(input_json: String) -> NapiResult<String> {
    let input: FinancialsInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = import_financials(&input.rows, &input.sectors);
    serde_json::to_string(&output).map_err(to_napi_error)
}
