use capital_bundle_core::catalogue::financials::{import_financials, CompanyFinancials};
use capital_bundle_core::catalogue::{filter_by_sector, Deal, RiskRatios, Sector};
use capital_bundle_core::optimization::{BundleEngine, BundleInput, EngineConfig};
use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::commands::thesis::load_thesis;
use crate::input;

/// Arguments for bundle optimization
#[derive(Args)]
pub struct OptimizeArgs {
    /// Path to a complete run input (thesis, deals, config) as JSON/YAML
    #[arg(long, conflicts_with_all = ["thesis", "deals"])]
    pub input: Option<String>,

    /// Path to a thesis JSON/YAML file (constraints or extraction record)
    #[arg(long, requires = "deals")]
    pub thesis: Option<String>,

    /// Path to the deal catalogue
    #[arg(long, requires = "thesis")]
    pub deals: Option<String>,

    /// Format of the --deals file
    #[arg(long, value_enum, default_value = "json")]
    pub deals_format: DealsFormat,

    /// Risk aversion (overrides the thesis file)
    #[arg(long)]
    pub risk_aversion: Option<Decimal>,

    /// Solver timeout in milliseconds; 0 waits indefinitely
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Path to an engine config JSON/YAML file
    #[arg(long)]
    pub config: Option<String>,

    /// Comma-separated sector labels; deals outside them are dropped
    #[arg(long, value_delimiter = ',')]
    pub sectors: Option<Vec<Sector>>,

    /// Also write the JSON result to this path
    #[arg(long)]
    pub save: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DealsFormat {
    /// JSON array of deals, or an object with a `deals` array
    Json,
    /// CSV with id, sector, requested_amount, debt_service_coverage, liquidity, solvency
    Csv,
    /// Raw company-financials CSV, normalised into deals
    Financials,
}

/// One row of the normalised deal CSV.
#[derive(Debug, Deserialize)]
struct DealRow {
    id: String,
    sector: Sector,
    #[serde(with = "rust_decimal::serde::str")]
    requested_amount: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    debt_service_coverage: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    liquidity: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    solvency: Decimal,
}

impl From<DealRow> for Deal {
    fn from(row: DealRow) -> Self {
        Deal {
            id: row.id,
            sector: row.sector,
            requested_amount: row.requested_amount,
            ratios: RiskRatios::new(row.debt_service_coverage, row.liquidity, row.solvency),
        }
    }
}

struct LoadedDeals {
    deals: Vec<Deal>,
    warnings: Vec<String>,
}

pub fn run_optimize(args: OptimizeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let sectors = args.sectors.clone().unwrap_or_default();
    let (mut run, mut warnings) = build_input(&args, &sectors)?;

    if let Some(ref path) = args.config {
        run.config = input::file::read_structured(path)?;
    }
    if let Some(ms) = args.timeout_ms {
        run.config.solve_timeout_ms = if ms == 0 { None } else { Some(ms) };
    }
    if let Some(ra) = args.risk_aversion {
        run.thesis.risk_aversion = ra;
    }
    if !sectors.is_empty() {
        run.deals = filter_by_sector(run.deals, &sectors);
    }

    tracing::debug!(
        deals = run.deals.len(),
        budget = %run.thesis.total_budget,
        timeout_ms = ?run.config.solve_timeout_ms,
        "starting optimization"
    );

    let engine = BundleEngine::with_default_solver(run.config.clone());
    let mut output = engine.run(&run.deals, &run.thesis)?;
    // Loader findings go ahead of the engine's own diagnostics.
    warnings.append(&mut output.warnings);
    output.warnings = warnings;

    let value = serde_json::to_value(&output)?;
    if let Some(ref path) = args.save {
        input::file::write_json(path, &value)?;
        tracing::info!(path = %path, "bundle saved");
    }
    Ok(value)
}

fn build_input(
    args: &OptimizeArgs,
    sectors: &[Sector],
) -> Result<(BundleInput, Vec<String>), Box<dyn std::error::Error>> {
    if let Some(ref path) = args.input {
        let run: BundleInput = input::file::read_structured(path)?;
        return Ok((run, Vec::new()));
    }

    if let (Some(thesis_path), Some(deals_path)) = (&args.thesis, &args.deals) {
        let thesis = load_thesis(
            thesis_path,
            args.risk_aversion,
            EngineConfig::default().target_sum_epsilon,
        )?;
        let loaded = load_deals(deals_path, args.deals_format, sectors)?;
        let mut warnings: Vec<String> = thesis
            .dropped_sectors
            .iter()
            .map(|s| format!("thesis sector '{}' is not a marketplace sector and was dropped", s))
            .collect();
        warnings.extend(loaded.warnings);
        let run = BundleInput {
            thesis: thesis.constraints,
            deals: loaded.deals,
            config: EngineConfig::default(),
        };
        return Ok((run, warnings));
    }

    if let Some(data) = input::stdin::read_stdin()? {
        let run: BundleInput = serde_json::from_value(data)?;
        return Ok((run, Vec::new()));
    }

    Err("Provide --input, or --thesis with --deals, or pipe a JSON run input via stdin".into())
}

fn load_deals(
    path: &str,
    format: DealsFormat,
    sectors: &[Sector],
) -> Result<LoadedDeals, Box<dyn std::error::Error>> {
    match format {
        DealsFormat::Json => {
            let value = input::file::read_value(path)?;
            let list = match value {
                Value::Object(mut map) => map
                    .remove("deals")
                    .ok_or("JSON object must contain a 'deals' array")?,
                other => other,
            };
            let deals: Vec<Deal> = serde_json::from_value(list)?;
            Ok(LoadedDeals {
                deals,
                warnings: Vec::new(),
            })
        }
        DealsFormat::Csv => {
            let rows: Vec<DealRow> = input::file::read_csv(path)?;
            Ok(LoadedDeals {
                deals: rows.into_iter().map(Deal::from).collect(),
                warnings: Vec::new(),
            })
        }
        DealsFormat::Financials => {
            let rows: Vec<CompanyFinancials> = input::file::read_csv(path)?;
            let import = import_financials(&rows, sectors);
            let warnings = import
                .skipped
                .iter()
                .map(|s| {
                    format!(
                        "row {} ({}) skipped: {}",
                        s.row,
                        s.company.as_deref().unwrap_or("unnamed"),
                        s.reason
                    )
                })
                .collect();
            tracing::info!(
                rows = rows.len(),
                deals = import.deals.len(),
                skipped = import.skipped.len(),
                "company financials imported"
            );
            Ok(LoadedDeals {
                deals: import.deals,
                warnings,
            })
        }
    }
}
