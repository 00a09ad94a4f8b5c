use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::types::{Money, Multiple};
use crate::{BundleError, BundleResult};

// ---------------------------------------------------------------------------
// Sector
// ---------------------------------------------------------------------------

/// Marketplace sector. The named variants are the sectors the deal
/// marketplace publishes; `Other` keeps any other label intact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Sector {
    AdvancedManufacturing,
    CleanEnergy,
    CreativeIndustries,
    Defence,
    DigitalTechnologies,
    Financial,
    LifeScience,
    ProfessionalBusiness,
    RealEstate,
    Retail,
    Other(String),
}

impl Sector {
    /// Every named marketplace sector, in label order.
    pub const KNOWN: [Sector; 10] = [
        Sector::AdvancedManufacturing,
        Sector::CleanEnergy,
        Sector::CreativeIndustries,
        Sector::Defence,
        Sector::DigitalTechnologies,
        Sector::Financial,
        Sector::LifeScience,
        Sector::ProfessionalBusiness,
        Sector::RealEstate,
        Sector::Retail,
    ];

    pub fn label(&self) -> &str {
        match self {
            Sector::AdvancedManufacturing => "Advanced_Manufacturing",
            Sector::CleanEnergy => "Clean_Energy",
            Sector::CreativeIndustries => "Creative_Industries",
            Sector::Defence => "Defence",
            Sector::DigitalTechnologies => "Digital&Technologies",
            Sector::Financial => "Financial",
            Sector::LifeScience => "Life_Science",
            Sector::ProfessionalBusiness => "Professional_Business",
            Sector::RealEstate => "Real_Estate",
            Sector::Retail => "Retail",
            Sector::Other(label) => label,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Sector::Other(_))
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Sector {
    type Err = BundleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(BundleError::invalid("sector", "empty sector label"));
        }
        Ok(Sector::KNOWN
            .iter()
            .find(|known| known.label() == trimmed)
            .cloned()
            .unwrap_or_else(|| Sector::Other(trimmed.to_string())))
    }
}

impl Serialize for Sector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Sector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Deal
// ---------------------------------------------------------------------------

/// The three credit ratios that make up a deal's aggregate risk score.
/// Higher is safer for each.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskRatios {
    pub debt_service_coverage: Multiple,
    pub liquidity: Multiple,
    pub solvency: Multiple,
}

impl RiskRatios {
    pub fn new(debt_service_coverage: Multiple, liquidity: Multiple, solvency: Multiple) -> Self {
        Self {
            debt_service_coverage,
            liquidity,
            solvency,
        }
    }

    pub fn as_array(&self) -> [Multiple; 3] {
        [self.debt_service_coverage, self.liquidity, self.solvency]
    }
}

/// A candidate SME investment opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub id: String,
    pub sector: Sector,
    /// Maximum capital this deal can absorb.
    pub requested_amount: Money,
    pub ratios: RiskRatios,
}

impl Deal {
    pub fn new(
        id: impl Into<String>,
        sector: Sector,
        requested_amount: Money,
        ratios: RiskRatios,
    ) -> BundleResult<Self> {
        let deal = Self {
            id: id.into(),
            sector,
            requested_amount,
            ratios,
        };
        deal.validate()?;
        Ok(deal)
    }

    pub fn validate(&self) -> BundleResult<()> {
        if self.id.trim().is_empty() {
            return Err(BundleError::invalid("deal.id", "deal id must not be empty"));
        }
        if self.requested_amount <= Decimal::ZERO {
            return Err(BundleError::invalid(
                format!("deals[{}].requestedAmount", self.id),
                format!("must be positive, got {}", self.requested_amount),
            ));
        }
        let names = ["debtServiceCoverage", "liquidity", "solvency"];
        for (name, value) in names.iter().zip(self.ratios.as_array()) {
            if value < Decimal::ZERO {
                return Err(BundleError::invalid(
                    format!("deals[{}].ratios.{}", self.id, name),
                    format!("must be non-negative, got {}", value),
                ));
            }
        }
        Ok(())
    }
}

/// Validate every deal and reject duplicate ids.
pub fn validate_catalogue(deals: &[Deal]) -> BundleResult<()> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(deals.len());
    for deal in deals {
        deal.validate()?;
        if !seen.insert(deal.id.as_str()) {
            return Err(BundleError::invalid(
                "deals",
                format!("duplicate deal id '{}'", deal.id),
            ));
        }
    }
    Ok(())
}

/// Keep only deals whose sector is in `sectors`.
pub fn filter_by_sector(deals: Vec<Deal>, sectors: &[Sector]) -> Vec<Deal> {
    if sectors.is_empty() {
        return deals;
    }
    deals
        .into_iter()
        .filter(|d| sectors.contains(&d.sector))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ratios(a: Decimal, b: Decimal, c: Decimal) -> RiskRatios {
        RiskRatios::new(a, b, c)
    }

    #[test]
    fn test_sector_labels_round_trip_through_from_str() {
        for sector in Sector::KNOWN.iter() {
            let parsed: Sector = sector.label().parse().unwrap();
            assert_eq!(&parsed, sector);
        }
    }

    #[test]
    fn test_unknown_sector_kept_as_other() {
        let parsed: Sector = "Tech".parse().unwrap();
        assert_eq!(parsed, Sector::Other("Tech".into()));
        assert!(!parsed.is_known());
    }

    #[test]
    fn test_empty_sector_rejected() {
        assert!("  ".parse::<Sector>().is_err());
    }

    #[test]
    fn test_sector_serializes_as_label() {
        let json = serde_json::to_string(&Sector::DigitalTechnologies).unwrap();
        assert_eq!(json, "\"Digital&Technologies\"");
        let back: Sector = serde_json::from_str("\"Life_Science\"").unwrap();
        assert_eq!(back, Sector::LifeScience);
    }

    #[test]
    fn test_deal_deserializes_from_camel_case() {
        let json = r#"{
            "id": "D1",
            "sector": "Retail",
            "requestedAmount": 60000,
            "ratios": {"debtServiceCoverage": 1, "liquidity": 1.5, "solvency": "0.5"}
        }"#;
        let deal: Deal = serde_json::from_str(json).unwrap();
        assert_eq!(deal.requested_amount, dec!(60000));
        assert_eq!(deal.ratios.liquidity, dec!(1.5));
        assert_eq!(deal.ratios.solvency, dec!(0.5));
    }

    #[test]
    fn test_non_positive_request_rejected() {
        let r = Deal::new("D1", Sector::Retail, dec!(0), ratios(dec!(1), dec!(1), dec!(1)));
        assert!(matches!(r, Err(BundleError::InvalidInput { .. })));
    }

    #[test]
    fn test_negative_ratio_rejected() {
        let r = Deal::new(
            "D1",
            Sector::Retail,
            dec!(100),
            ratios(dec!(1), dec!(-0.1), dec!(1)),
        );
        match r {
            Err(BundleError::InvalidInput { field, .. }) => {
                assert_eq!(field, "deals[D1].ratios.liquidity")
            }
            other => panic!("expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_ratios_are_valid_deal_data() {
        // Degenerate risk is handled at formulation, not at construction.
        let r = Deal::new("D1", Sector::Retail, dec!(100), ratios(dec!(0), dec!(0), dec!(0)));
        assert!(r.is_ok());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let d = Deal::new("D1", Sector::Retail, dec!(100), ratios(dec!(1), dec!(1), dec!(1)))
            .unwrap();
        let err = validate_catalogue(&[d.clone(), d]).unwrap_err();
        assert!(err.to_string().contains("duplicate deal id 'D1'"));
    }

    #[test]
    fn test_filter_by_sector() {
        let unit = ratios(dec!(1), dec!(1), dec!(1));
        let a = Deal::new("A", Sector::Retail, dec!(1), unit).unwrap();
        let b = Deal::new("B", Sector::Defence, dec!(1), unit).unwrap();
        let kept = filter_by_sector(vec![a, b.clone()], &[Sector::Defence]);
        assert_eq!(kept, vec![b]);
    }
}
