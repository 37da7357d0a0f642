//! Fixed reference tables: permissible values and weights
//!
//! Global invariants enforced:
//! - Tables are built once and never mutated
//! - Unit weights are derived from permissible values, risk weights are not

use crate::sample::Metal;
use std::sync::OnceLock;

/// One `f64` per metal, indexed by [`Metal`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetalTable([f64; Metal::COUNT]);

impl MetalTable {
    pub const fn new(arsenic: f64, cadmium: f64, lead: f64, zinc: f64) -> Self {
        MetalTable([arsenic, cadmium, lead, zinc])
    }

    pub fn get(&self, metal: Metal) -> f64 {
        self.0[metal.index()]
    }

    /// Entries in evaluation order
    pub fn iter(&self) -> impl Iterator<Item = (Metal, f64)> + '_ {
        Metal::ALL.into_iter().map(|metal| (metal, self.get(metal)))
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }

    fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        MetalTable(self.0.map(f))
    }
}

/// Standard permissible concentrations (µg/L)
pub const PERMISSIBLE_VALUES: MetalTable = MetalTable::new(10.0, 3.0, 10.0, 5000.0);

/// Hotspot risk weights, tuned independently of the permissible values
pub const RISK_WEIGHTS: MetalTable = MetalTable::new(0.35, 0.25, 0.30, 0.10);

/// Reference tables shared by every calculator
#[derive(Debug, Clone, PartialEq)]
pub struct Standards {
    /// S_i: permissible value per metal
    pub permissible: MetalTable,
    /// W_i = 1 / S_i
    pub unit_weights: MetalTable,
    /// Weights of the contamination factors in the risk heuristic
    pub risk_weights: MetalTable,
}

impl Standards {
    pub fn new() -> Self {
        Standards {
            permissible: PERMISSIBLE_VALUES,
            unit_weights: PERMISSIBLE_VALUES.map(|s| 1.0 / s),
            risk_weights: RISK_WEIGHTS,
        }
    }

    /// Process-wide instance, initialized on first use
    pub fn global() -> &'static Standards {
        static STANDARDS: OnceLock<Standards> = OnceLock::new();
        STANDARDS.get_or_init(Standards::new)
    }
}

impl Default for Standards {
    fn default() -> Self {
        Self::new()
    }
}
