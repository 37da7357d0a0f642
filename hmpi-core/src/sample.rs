//! Water sample model
//!
//! Global invariants enforced:
//! - An unknown concentration is `None`, never `0.0`
//! - `NaN` is normalized to unknown at construction time
//! - Metals are always visited in the fixed order arsenic, cadmium, lead, zinc

use serde::{Deserialize, Serialize};

/// Heavy metals tracked per sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metal {
    Arsenic,
    Cadmium,
    Lead,
    Zinc,
}

impl Metal {
    pub const COUNT: usize = 4;

    /// All metals in evaluation order
    pub const ALL: [Metal; Metal::COUNT] = [Metal::Arsenic, Metal::Cadmium, Metal::Lead, Metal::Zinc];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metal::Arsenic => "arsenic",
            Metal::Cadmium => "cadmium",
            Metal::Lead => "lead",
            Metal::Zinc => "zinc",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Metal::Arsenic => 0,
            Metal::Cadmium => 1,
            Metal::Lead => 2,
            Metal::Zinc => 3,
        }
    }
}

/// Measured metal concentrations in µg/L
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Concentrations {
    pub arsenic: Option<f64>,
    pub cadmium: Option<f64>,
    pub lead: Option<f64>,
    pub zinc: Option<f64>,
}

impl Concentrations {
    pub fn new(
        arsenic: Option<f64>,
        cadmium: Option<f64>,
        lead: Option<f64>,
        zinc: Option<f64>,
    ) -> Self {
        Concentrations {
            arsenic: known(arsenic),
            cadmium: known(cadmium),
            lead: known(lead),
            zinc: known(zinc),
        }
    }

    /// All four metals known
    pub fn complete(arsenic: f64, cadmium: f64, lead: f64, zinc: f64) -> Self {
        Self::new(Some(arsenic), Some(cadmium), Some(lead), Some(zinc))
    }

    /// Concentration for `metal`, or `None` when unknown
    pub fn get(&self, metal: Metal) -> Option<f64> {
        let value = match metal {
            Metal::Arsenic => self.arsenic,
            Metal::Cadmium => self.cadmium,
            Metal::Lead => self.lead,
            Metal::Zinc => self.zinc,
        };
        known(value)
    }

    /// Known concentrations in evaluation order
    pub fn known(&self) -> impl Iterator<Item = (Metal, f64)> + '_ {
        Metal::ALL
            .into_iter()
            .filter_map(|metal| self.get(metal).map(|value| (metal, value)))
    }
}

fn known(value: Option<f64>) -> Option<f64> {
    value.filter(|v| !v.is_nan())
}

/// A single geo-located water sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(flatten)]
    pub concentrations: Concentrations,
}

impl Sample {
    pub fn new(latitude: f64, longitude: f64, concentrations: Concentrations) -> Self {
        Sample {
            latitude,
            longitude,
            concentrations,
        }
    }
}
