use capital_bundle_core::thesis::{ThesisConstraints, ThesisExtract};
use capital_bundle_core::with_metadata;
use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Instant;

use crate::input;

/// Risk aversion applied to extraction records when none is given.
pub const DEFAULT_RISK_AVERSION: Decimal = dec!(1);

/// Arguments for thesis validation
#[derive(Args)]
pub struct ValidateThesisArgs {
    /// Path to a thesis JSON/YAML file (constraints or extraction record)
    #[arg(long)]
    pub thesis: String,

    /// Risk aversion to apply (overrides the file; default 1 for extraction records)
    #[arg(long)]
    pub risk_aversion: Option<Decimal>,

    /// Tolerance on the sum of sector target fractions
    #[arg(long, default_value = "0.000001")]
    pub epsilon: Decimal,
}

/// Shape the thesis file was recognised as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThesisSource {
    Constraints,
    Extract,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedThesis {
    pub source: ThesisSource,
    pub constraints: ThesisConstraints,
    pub dropped_sectors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub kpis: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidatedThesis {
    #[serde(flatten)]
    thesis: LoadedThesis,
    target_amounts: BTreeMap<String, Decimal>,
    target_base: Decimal,
}

/// Load a thesis file. Constraint files carry `totalBudget`; anything else
/// is read as an extraction record and normalised.
pub fn load_thesis(
    path: &str,
    risk_aversion: Option<Decimal>,
    epsilon: Decimal,
) -> Result<LoadedThesis, Box<dyn std::error::Error>> {
    let value = input::file::read_value(path)?;
    thesis_from_value(value, risk_aversion, epsilon)
}

pub fn thesis_from_value(
    value: Value,
    risk_aversion: Option<Decimal>,
    epsilon: Decimal,
) -> Result<LoadedThesis, Box<dyn std::error::Error>> {
    if value.get("totalBudget").is_some() {
        let mut constraints: ThesisConstraints = serde_json::from_value(value)?;
        if let Some(ra) = risk_aversion {
            constraints.risk_aversion = ra;
        }
        constraints.validate(epsilon)?;
        return Ok(LoadedThesis {
            source: ThesisSource::Constraints,
            constraints,
            dropped_sectors: Vec::new(),
            overview: None,
            kpis: Vec::new(),
        });
    }

    let extract: ThesisExtract = serde_json::from_value(value)
        .map_err(|e| format!("Thesis is neither constraints nor an extraction record: {}", e))?;
    let normalized = extract.normalize(risk_aversion.unwrap_or(DEFAULT_RISK_AVERSION))?;
    Ok(LoadedThesis {
        source: ThesisSource::Extract,
        constraints: normalized.constraints,
        dropped_sectors: normalized.dropped_sectors,
        overview: Some(normalized.overview).filter(|s| !s.is_empty()),
        kpis: normalized.kpis,
    })
}

pub fn run_validate_thesis(args: ValidateThesisArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let thesis = load_thesis(&args.thesis, args.risk_aversion, args.epsilon)?;

    let c = &thesis.constraints;
    let target_amounts = c
        .referenced_sectors()
        .iter()
        .map(|s| c.sector_target_amount(s).map(|amount| (s.to_string(), amount)))
        .collect::<Result<_, _>>()?;
    let mut warnings = Vec::new();
    if c.total_budget <= Decimal::ZERO {
        warnings.push("totalBudget is not positive; optimization would be empty".to_string());
    }
    for s in &thesis.dropped_sectors {
        warnings.push(format!("sector '{}' is not a marketplace sector and was dropped", s));
    }

    let validated = ValidatedThesis {
        target_base: c.target_base()?,
        target_amounts,
        thesis,
    };
    let elapsed = start.elapsed().as_micros() as u64;
    let out = with_metadata(
        "Thesis constraint validation",
        &serde_json::json!({ "target_sum_epsilon": args.epsilon.to_string() }),
        warnings,
        elapsed,
        validated,
    );
    Ok(serde_json::to_value(out)?)
}
