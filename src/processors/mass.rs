//! Mass estimation and chemical decomposition.
//!
//! A particle's 2D silhouette area is raised to the power 1.5 as a proxy
//! for the volume of a roughly isotropic 3D granule. This is a documented
//! dimensional heuristic, not a volume integral; together with the
//! per-material density and shape factor it yields a relative physical
//! mass, which the composition-factor table then splits into chemical
//! nitrogen, phosphorus, potassium and an inert remainder. A DAP granule,
//! for example, contributes to both the N and P buckets.

use crate::core::{AnalysisError, AnalysisTables};
use crate::detection::ParticleClass;
use serde::Serialize;

/// Accumulated chemical-weight scores for one request.
///
/// Values only ever increase while particles are processed, and the final
/// values are independent of processing order. Serializes as the `areas`
/// object of the response.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MassScores {
    /// Chemical nitrogen weight.
    #[serde(rename = "N")]
    pub nitrogen: f64,
    /// Chemical phosphorus weight.
    #[serde(rename = "P")]
    pub phosphorus: f64,
    /// Chemical potassium weight.
    #[serde(rename = "K")]
    pub potassium: f64,
    /// Inert filler weight.
    #[serde(rename = "Filler")]
    pub filler: f64,
}

impl MassScores {
    /// Adds one particle's contribution to the accumulator.
    ///
    /// The per-particle contributions to the four buckets sum exactly to
    /// the particle's relative mass, so total mass is conserved across the
    /// decomposition.
    ///
    /// # Arguments
    ///
    /// * `area` - The particle's 2D outline area in px², non-negative
    /// * `class` - The particle's final class
    /// * `tables` - The calibration tables
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Config`] if the tables have no row for
    /// `class`. Callers must exclude [`ParticleClass::Unknown`] particles
    /// before aggregation.
    pub fn accumulate(
        &mut self,
        area: f64,
        class: ParticleClass,
        tables: &AnalysisTables,
    ) -> Result<(), AnalysisError> {
        let row = tables
            .row(class)
            .ok_or_else(|| AnalysisError::config(format!("no material row for {class:?}")))?;

        let volume = area.powf(1.5);
        let mass = volume * row.props.shape_factor * row.props.density;

        self.nitrogen += mass * row.factors.n;
        self.phosphorus += mass * row.factors.p;
        self.potassium += mass * row.factors.k;
        self.filler += mass * (1.0 - row.factors.total());

        Ok(())
    }

    /// Sum of all four buckets.
    pub fn total(&self) -> f64 {
        self.nitrogen + self.phosphorus + self.potassium + self.filler
    }
}
