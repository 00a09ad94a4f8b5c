use capital_bundle_core::catalogue::financials::{import_financials, CompanyFinancials};
use capital_bundle_core::catalogue::{filter_by_sector, Sector};
use capital_bundle_core::optimization::{BundleEngine, EngineConfig};
use capital_bundle_core::risk::score;
use capital_bundle_core::thesis::ThesisExtract;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// Extraction record -> constraints -> bundle
// ===========================================================================

fn company(name: &str, sector: &str, turnover: &str, icr: &str) -> CompanyFinancials {
    CompanyFinancials {
        company_name: Some(name.into()),
        sector: Some(sector.into()),
        turnover: Some(turnover.into()),
        total_assets: Some("0".into()),
        current_ratio: Some("1.2".into()),
        interest_cover: Some(icr.into()),
        ebitda: Some("50000".into()),
    }
}

fn marketplace() -> Vec<CompanyFinancials> {
    vec![
        company("Northern Bakeries", "Retail", "2,000,000", "3"),
        company("Harbour Outfitters", "Retail", "1,500,000", "1.5"),
        company("Shield Systems", "Defence", "4,000,000", "6"),
        company("Helix Bio", "Life_Science", "800,000", "#DIV/0!"),
    ]
}

#[test]
fn test_extract_to_bundle() {
    let extract: ThesisExtract = serde_json::from_str(
        r#"{
            "amount_millions": 0.5,
            "desired_sectors": {"Retail": 2, "Defence": 2, "Quantum": 1},
            "overview": "Backbone UK manufacturing and retail",
            "kpis": ["DSCR > 1.25"]
        }"#,
    )
    .unwrap();
    let normalized = extract.normalize(dec!(0.5)).unwrap();
    assert_eq!(normalized.dropped_sectors, vec!["Quantum".to_string()]);
    assert_eq!(normalized.constraints.total_budget, dec!(500000));
    assert_eq!(
        normalized.constraints.target_weight(&Sector::Retail),
        dec!(0.5)
    );

    let import = import_financials(&marketplace(), &[]);
    assert_eq!(import.deals.len(), 4);
    assert!(import.skipped.is_empty());

    let engine = BundleEngine::with_default_solver(EngineConfig::default());
    let out = engine.run(&import.deals, &normalized.constraints).unwrap();
    let b = &out.result;

    assert!(b.feasible);
    assert!(b.total_deployed <= dec!(500000));
    // 350k of Retail capacity and 400k of Defence capacity cover both 250k targets.
    assert_eq!(b.sector_breakdown[&Sector::Retail], dec!(250000));
    assert_eq!(b.sector_breakdown[&Sector::Defence], dec!(250000));
    assert_eq!(b.sector_breakdown[&Sector::LifeScience], Decimal::ZERO);
}

#[test]
fn test_sector_filter_matches_import_filter() {
    let import_all = import_financials(&marketplace(), &[]);
    let filtered = filter_by_sector(import_all.deals, &[Sector::Retail]);
    let imported = import_financials(&marketplace(), &[Sector::Retail]);

    let a: Vec<&str> = filtered.iter().map(|d| d.id.as_str()).collect();
    let b: Vec<&str> = imported.deals.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(a, b);
}

#[test]
fn test_imported_deals_always_score() {
    let rows = vec![
        company("All Errors", "Retail", "100", "#DIV/0!"),
        CompanyFinancials {
            company_name: Some("Blank Ratios".into()),
            sector: Some("Financial".into()),
            turnover: Some("1e6".into()),
            ..Default::default()
        },
    ];
    let import = import_financials(&rows, &[]);
    assert_eq!(import.deals.len(), 2);
    for d in &import.deals {
        assert!(score(d).unwrap().value() > Decimal::ZERO, "{}", d.id);
    }
}
