//! Calibration tables for the mass/nutrient model.
//!
//! The `area^1.5` volume heuristic, the per-material density and shape
//! factors, and the chemical composition factors are domain calibration
//! constants, not algorithmic logic. They are modeled as plain
//! serde-deserializable data so they can be recalibrated without touching
//! the pipeline. The defaults correspond to the standard straight
//! fertilizers: urea (46-0-0), DAP (18-46-0), MOP (0-0-60) and an inert
//! filler.

use crate::detection::ParticleClass;
use serde::{Deserialize, Serialize};

/// Default saturation threshold used when the caller supplies none.
pub const DEFAULT_SATURATION_THRESHOLD: u8 = 35;

/// Physical properties of one material class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialProps {
    /// Relative density of the material. Must be positive.
    pub density: f64,
    /// Dimensionless correction of the spherical-volume approximation for
    /// the material's typical granule shape. Must be positive.
    pub shape_factor: f64,
}

/// Fraction of a unit of physical mass of a material that is chemically
/// nitrogen, phosphorus or potassium. Each fraction lies in [0, 1] and
/// their sum must not exceed 1; the remainder is inert filler content.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NutrientFactors {
    /// Nitrogen fraction.
    pub n: f64,
    /// Phosphorus fraction.
    pub p: f64,
    /// Potassium fraction.
    pub k: f64,
}

impl NutrientFactors {
    /// Total nutrient fraction; `1 - total()` is the inert remainder.
    pub fn total(&self) -> f64 {
        self.n + self.p + self.k
    }
}

/// Calibration row for one material class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialRow {
    /// Density and shape factor.
    pub props: MaterialProps,
    /// Chemical composition factors.
    pub factors: NutrientFactors,
}

/// The full calibration table: one row per final particle class.
///
/// [`ParticleClass::Unknown`] has no row; looking it up yields `None` and
/// the aggregator surfaces that as a configuration error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisTables {
    /// Urea-type nitrogen granules.
    pub nitrogen: MaterialRow,
    /// DAP-type phosphorus granules (chemically part nitrogen).
    pub phosphorus: MaterialRow,
    /// MOP-type potassium granules.
    pub potassium: MaterialRow,
    /// Inert filler granules.
    pub filler: MaterialRow,
}

impl AnalysisTables {
    /// Looks up the calibration row for a final particle class.
    pub fn row(&self, class: ParticleClass) -> Option<&MaterialRow> {
        match class {
            ParticleClass::N => Some(&self.nitrogen),
            ParticleClass::P => Some(&self.phosphorus),
            ParticleClass::K => Some(&self.potassium),
            ParticleClass::Filler => Some(&self.filler),
            ParticleClass::Unknown => None,
        }
    }
}

impl Default for AnalysisTables {
    fn default() -> Self {
        Self {
            nitrogen: MaterialRow {
                props: MaterialProps {
                    density: 1.33,
                    shape_factor: 1.0,
                },
                factors: NutrientFactors {
                    n: 0.46,
                    p: 0.0,
                    k: 0.0,
                },
            },
            phosphorus: MaterialRow {
                props: MaterialProps {
                    density: 1.61,
                    shape_factor: 0.70,
                },
                factors: NutrientFactors {
                    n: 0.18,
                    p: 0.46,
                    k: 0.0,
                },
            },
            potassium: MaterialRow {
                props: MaterialProps {
                    density: 1.98,
                    shape_factor: 0.60,
                },
                factors: NutrientFactors {
                    n: 0.0,
                    p: 0.0,
                    k: 0.60,
                },
            },
            filler: MaterialRow {
                props: MaterialProps {
                    density: 2.40,
                    shape_factor: 0.80,
                },
                factors: NutrientFactors {
                    n: 0.0,
                    p: 0.0,
                    k: 0.0,
                },
            },
        }
    }
}
