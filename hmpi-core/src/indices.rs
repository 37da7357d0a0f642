//! Heavy Metal Pollution Index (HPI) and Degree of Contamination (Cd)
//!
//! Global invariants enforced:
//! - Deterministic, per-sample calculations with no shared mutable state
//! - Category bands are half-open with an inclusive lower bound
//! - HPI excludes unknown metals from both numerator and denominator
//! - Cd treats unknown metals as contributing nothing to the sum

use crate::sample::{Concentrations, Sample};
use crate::standards::Standards;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// HPI band boundaries
pub const HPI_MODERATE: f64 = 100.0;
pub const HPI_HIGH: f64 = 150.0;

/// Cd band boundaries
pub const CD_MODERATE: f64 = 1.0;
pub const CD_HIGH: f64 = 3.0;

/// HPI classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HpiCategory {
    #[serde(rename = "Low pollution")]
    Low, // < 100
    #[serde(rename = "Moderate pollution")]
    Moderate, // 100-150
    #[serde(rename = "High pollution")]
    High, // >= 150
    /// No metal concentration was known
    #[serde(rename = "No Data")]
    NoData,
}

impl HpiCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            HpiCategory::Low => "Low pollution",
            HpiCategory::Moderate => "Moderate pollution",
            HpiCategory::High => "High pollution",
            HpiCategory::NoData => "No Data",
        }
    }

    /// Band for a computed HPI value
    pub fn from_value(hpi: f64) -> Self {
        if hpi < HPI_MODERATE {
            HpiCategory::Low
        } else if hpi < HPI_HIGH {
            HpiCategory::Moderate
        } else {
            HpiCategory::High
        }
    }
}

/// Cd classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CdCategory {
    #[serde(rename = "Low degree of contamination")]
    Low, // < 1
    #[serde(rename = "Moderate degree of contamination")]
    Moderate, // 1-3
    #[serde(rename = "High degree of contamination")]
    High, // >= 3
}

impl CdCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CdCategory::Low => "Low degree of contamination",
            CdCategory::Moderate => "Moderate degree of contamination",
            CdCategory::High => "High degree of contamination",
        }
    }

    pub fn from_value(cd: f64) -> Self {
        if cd < CD_MODERATE {
            CdCategory::Low
        } else if cd < CD_HIGH {
            CdCategory::Moderate
        } else {
            CdCategory::High
        }
    }
}

impl fmt::Display for HpiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for CdCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HpiCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            HpiCategory::Low,
            HpiCategory::Moderate,
            HpiCategory::High,
            HpiCategory::NoData,
        ]
        .into_iter()
        .find(|c| c.as_str() == s)
        .ok_or_else(|| anyhow::anyhow!("unknown HPI category: {:?}", s))
    }
}

impl FromStr for CdCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [CdCategory::Low, CdCategory::Moderate, CdCategory::High]
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown Cd category: {:?}", s))
    }
}

/// Computed indices for one sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexResult {
    #[serde(rename = "heavy_metal_pollution_index")]
    pub hpi_value: f64,
    pub hpi_category: HpiCategory,
    #[serde(rename = "degree_of_contamination")]
    pub cd_value: f64,
    pub cd_category: CdCategory,
}

/// Round `value` to `places` decimal digits (half away from zero)
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Index calculator bound to a set of reference tables
#[derive(Debug, Clone, Copy)]
pub struct IndexCalculator<'a> {
    standards: &'a Standards,
}

impl<'a> IndexCalculator<'a> {
    pub fn new(standards: &'a Standards) -> Self {
        IndexCalculator { standards }
    }

    /// HPI = Σ(Q_i · W_i) / Σ W_i over known metals, Q_i = (M_i / S_i) · 100
    ///
    /// Returns `(0.0, NoData)` when no metal is known.
    pub fn hpi(&self, concentrations: &Concentrations) -> (f64, HpiCategory) {
        let mut numerator = 0.0;
        let mut denominator = 0.0;

        for (metal, concentration) in concentrations.known() {
            let weight = self.standards.unit_weights.get(metal);
            let sub_index = (concentration / self.standards.permissible.get(metal)) * 100.0;
            numerator += sub_index * weight;
            denominator += weight;
        }

        if denominator == 0.0 {
            return (0.0, HpiCategory::NoData);
        }

        let hpi = numerator / denominator;
        (round_to(hpi, 2), HpiCategory::from_value(hpi))
    }

    /// Cd = Σ CF_i over known metals, CF_i = M_i / S_i
    pub fn degree_of_contamination(&self, concentrations: &Concentrations) -> (f64, CdCategory) {
        let cd: f64 = concentrations
            .known()
            .map(|(metal, concentration)| concentration / self.standards.permissible.get(metal))
            .sum();

        (round_to(cd, 2), CdCategory::from_value(cd))
    }

    /// Both indices for one sample
    pub fn evaluate(&self, sample: &Sample) -> IndexResult {
        let (hpi_value, hpi_category) = self.hpi(&sample.concentrations);
        let (cd_value, cd_category) = self.degree_of_contamination(&sample.concentrations);
        IndexResult {
            hpi_value,
            hpi_category,
            cd_value,
            cd_category,
        }
    }
}

impl Default for IndexCalculator<'static> {
    fn default() -> Self {
        IndexCalculator::new(Standards::global())
    }
}

/// Calculate HPI with the standard tables
pub fn calculate_hpi(sample: &Sample) -> (f64, HpiCategory) {
    IndexCalculator::default().hpi(&sample.concentrations)
}

/// Calculate Degree of Contamination with the standard tables
pub fn calculate_degree_of_contamination(sample: &Sample) -> (f64, CdCategory) {
    IndexCalculator::default().degree_of_contamination(&sample.concentrations)
}

/// Calculate both indices with the standard tables
pub fn calculate_indices(sample: &Sample) -> IndexResult {
    IndexCalculator::default().evaluate(sample)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(c: Concentrations) -> Sample {
        Sample::new(28.7, 77.1, c)
    }

    fn moderate_sample() -> Sample {
        sample(Concentrations::complete(15.0, 4.0, 12.0, 5500.0))
    }

    fn low_sample() -> Sample {
        sample(Concentrations::complete(5.0, 1.0, 4.0, 2000.0))
    }

    #[test]
    fn test_hpi_moderate_pollution() {
        let (hpi, category) = calculate_hpi(&moderate_sample());
        assert!((hpi - 133.95).abs() < 1e-9, "got {}", hpi);
        assert_eq!(category, HpiCategory::Moderate);
    }

    #[test]
    fn test_hpi_low_pollution() {
        let (hpi, category) = calculate_hpi(&low_sample());
        assert!((hpi - 37.71).abs() < 1e-9, "got {}", hpi);
        assert_eq!(category, HpiCategory::Low);
    }

    #[test]
    fn test_cd_high_contamination() {
        let (cd, category) = calculate_degree_of_contamination(&moderate_sample());
        assert!((cd - 5.13).abs() < 1e-9, "got {}", cd);
        assert_eq!(category, CdCategory::High);
    }

    #[test]
    fn test_cd_moderate_contamination() {
        let (cd, category) = calculate_degree_of_contamination(&low_sample());
        assert!((cd - 1.63).abs() < 1e-9, "got {}", cd);
        assert_eq!(category, CdCategory::Moderate);
    }

    #[test]
    fn test_all_unknown_is_no_data_for_hpi_but_low_for_cd() {
        let s = sample(Concentrations::default());
        assert_eq!(calculate_hpi(&s), (0.0, HpiCategory::NoData));
        assert_eq!(
            calculate_degree_of_contamination(&s),
            (0.0, CdCategory::Low)
        );
    }

    #[test]
    fn test_all_nan_is_unknown() {
        let s = sample(Concentrations::new(
            Some(f64::NAN),
            Some(f64::NAN),
            Some(f64::NAN),
            Some(f64::NAN),
        ));
        assert_eq!(calculate_hpi(&s), (0.0, HpiCategory::NoData));
    }

    #[test]
    fn test_unknown_metal_excluded_not_zero() {
        // Only arsenic known: HPI is arsenic's sub-index alone
        let only_arsenic = sample(Concentrations::new(Some(15.0), None, None, None));
        let (hpi, _) = calculate_hpi(&only_arsenic);
        assert!((hpi - 150.0).abs() < 1e-9);

        // Known zeros pull the weighted mean down
        let with_zeros = sample(Concentrations::new(Some(15.0), Some(0.0), Some(0.0), Some(0.0)));
        let (hpi_zeros, _) = calculate_hpi(&with_zeros);
        assert!(hpi_zeros < hpi);
    }

    #[test]
    fn test_all_zero_is_low_not_no_data() {
        let s = sample(Concentrations::complete(0.0, 0.0, 0.0, 0.0));
        assert_eq!(calculate_hpi(&s), (0.0, HpiCategory::Low));
    }

    #[test]
    fn test_hpi_boundaries_are_half_open() {
        let at_100 = sample(Concentrations::new(Some(10.0), None, None, None));
        assert_eq!(calculate_hpi(&at_100), (100.0, HpiCategory::Moderate));

        let at_150 = sample(Concentrations::new(None, Some(4.5), None, None));
        assert_eq!(calculate_hpi(&at_150), (150.0, HpiCategory::High));

        assert_eq!(HpiCategory::from_value(99.99), HpiCategory::Low);
        assert_eq!(HpiCategory::from_value(100.0), HpiCategory::Moderate);
        assert_eq!(HpiCategory::from_value(149.99), HpiCategory::Moderate);
        assert_eq!(HpiCategory::from_value(150.0), HpiCategory::High);
    }

    #[test]
    fn test_cd_boundaries_are_half_open() {
        let at_1 = sample(Concentrations::new(Some(10.0), None, None, None));
        assert_eq!(
            calculate_degree_of_contamination(&at_1),
            (1.0, CdCategory::Moderate)
        );

        let at_3 = sample(Concentrations::new(None, Some(9.0), None, None));
        assert_eq!(
            calculate_degree_of_contamination(&at_3),
            (3.0, CdCategory::High)
        );

        assert_eq!(CdCategory::from_value(0.99), CdCategory::Low);
        assert_eq!(CdCategory::from_value(2.99), CdCategory::Moderate);
    }

    #[test]
    fn test_rounding_is_idempotent() {
        for v in [0.0, 1.005, 37.709_12, 133.949_35, 5.133_333, 1e6 / 7.0] {
            let once = round_to(v, 2);
            assert_eq!(round_to(once, 2), once);
            let once3 = round_to(v, 3);
            assert_eq!(round_to(once3, 3), once3);
        }
    }

    #[test]
    fn test_deterministic() {
        let s = moderate_sample();
        assert_eq!(calculate_indices(&s), calculate_indices(&s));
    }

    #[test]
    fn test_injected_standards_match_default() {
        let standards = Standards::new();
        let calculator = IndexCalculator::new(&standards);
        assert_eq!(calculator.evaluate(&low_sample()), calculate_indices(&low_sample()));
    }

    #[test]
    fn test_category_labels_round_trip() {
        for c in [
            HpiCategory::Low,
            HpiCategory::Moderate,
            HpiCategory::High,
            HpiCategory::NoData,
        ] {
            assert_eq!(c.as_str().parse::<HpiCategory>().unwrap(), c);
            assert_eq!(serde_json::to_value(c).unwrap(), c.as_str());
        }
        for c in [CdCategory::Low, CdCategory::Moderate, CdCategory::High] {
            assert_eq!(c.as_str().parse::<CdCategory>().unwrap(), c);
        }
        assert!("Severe".parse::<HpiCategory>().is_err());
    }

    #[test]
    fn test_index_result_field_names() {
        let json = serde_json::to_value(calculate_indices(&moderate_sample())).unwrap();
        assert_eq!(json["hpi_category"], "Moderate pollution");
        assert_eq!(json["cd_category"], "High degree of contamination");
        assert!(json["heavy_metal_pollution_index"].is_number());
        assert!(json["degree_of_contamination"].is_number());
    }
}
