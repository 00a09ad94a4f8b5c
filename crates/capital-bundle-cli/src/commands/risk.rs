use capital_bundle_core::catalogue::RiskRatios;
use capital_bundle_core::risk::score_ratios;
use capital_bundle_core::with_metadata;
use clap::Args;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

use crate::input;

/// Arguments for single-deal risk scoring
#[derive(Args)]
pub struct RiskScoreArgs {
    /// Comma-separated ratios: debt-service coverage, liquidity, solvency
    #[arg(long, value_delimiter = ',', num_args = 3)]
    pub ratios: Option<Vec<Decimal>>,

    /// Path to a JSON/YAML file with a `ratios` object (or a whole deal)
    #[arg(long)]
    pub input: Option<String>,

    /// Risk aversion used to derive the LP penalty coefficient
    #[arg(long, default_value = "1")]
    pub risk_aversion: Decimal,

    /// Label used in error messages
    #[arg(long, default_value = "cli")]
    pub deal_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RiskScoreOutput {
    deal_id: String,
    ratios: RiskRatios,
    risk_score: Decimal,
    risk_aversion: Decimal,
    penalty: Decimal,
}

#[derive(Deserialize)]
struct RatiosFile {
    ratios: RiskRatios,
}

pub fn run_risk_score(args: RiskScoreArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let ratios = get_ratios(&args)?;
    if args.risk_aversion < Decimal::ZERO {
        return Err("--risk-aversion must be non-negative".into());
    }

    let score = score_ratios(&args.deal_id, &ratios)?;
    let output = RiskScoreOutput {
        deal_id: args.deal_id.clone(),
        ratios,
        risk_score: score.value(),
        risk_aversion: args.risk_aversion,
        penalty: score.penalty(args.risk_aversion)?,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    let out = with_metadata(
        "Aggregate risk score R = DSCR + liquidity + solvency; penalty = lambda / R",
        &serde_json::json!({ "higher_is_safer": true }),
        Vec::new(),
        elapsed,
        output,
    );
    Ok(serde_json::to_value(out)?)
}

fn get_ratios(args: &RiskScoreArgs) -> Result<RiskRatios, Box<dyn std::error::Error>> {
    if let Some(ref path) = args.input {
        let file: RatiosFile = input::file::read_structured(path)?;
        Ok(file.ratios)
    } else if let Some(ref r) = args.ratios {
        match r.as_slice() {
            [dscr, liquidity, solvency] => Ok(RiskRatios::new(*dscr, *liquidity, *solvency)),
            _ => Err("--ratios takes exactly three values".into()),
        }
    } else if let Some(data) = input::stdin::read_stdin()? {
        let file: RatiosFile = serde_json::from_value(data)?;
        Ok(file.ratios)
    } else {
        Err("Provide --ratios or --input file or pipe JSON via stdin".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn args(ratios: Vec<Decimal>, risk_aversion: Decimal) -> RiskScoreArgs {
        RiskScoreArgs {
            ratios: Some(ratios),
            input: None,
            risk_aversion,
            deal_id: "T".into(),
        }
    }

    #[test]
    fn test_score_and_penalty() {
        let v = run_risk_score(args(vec![dec!(1), dec!(2), dec!(1)], dec!(2))).unwrap();
        let r: RiskScoreOutput = serde_json::from_value(v["result"].clone()).unwrap();
        assert_eq!(r.risk_score, dec!(4));
        assert_eq!(r.penalty, dec!(0.5));
    }

    #[test]
    fn test_degenerate_ratios_error() {
        let err = run_risk_score(args(vec![dec!(0), dec!(0), dec!(0)], dec!(1))).unwrap_err();
        assert!(err.to_string().contains("T"));
    }

    #[test]
    fn test_penalty_out_of_range_is_an_error() {
        let huge = Decimal::from_i128_with_scale(10i128.pow(20), 0);
        let ratios = vec![dec!(0), dec!(0), dec!(0.0000000001)];
        let err = run_risk_score(args(ratios, huge)).unwrap_err();
        assert!(err.to_string().contains("riskAversion"));
    }

    #[test]
    fn test_negative_risk_aversion_rejected() {
        assert!(run_risk_score(args(vec![dec!(1), dec!(1), dec!(1)], dec!(-1))).is_err());
    }
}
