//! # NPKSense
//!
//! A Rust library that estimates the nutrient composition (nitrogen,
//! phosphorus, potassium, and inert filler) of a photographed granular
//! fertilizer sample. Particle detection is delegated to an external
//! instance-segmentation model behind the [`ParticleDetector`] trait;
//! this crate implements the deterministic post-detection pipeline.
//!
//! ## Components
//!
//! - **Rectification**: perspective correction of the photographed sample
//!   region to a canonical top-down view
//! - **Particle classification**: resolution of visually similar particle
//!   classes using interior saturation statistics
//! - **Threshold calibration**: Otsu auto-threshold plus a per-request
//!   saturation histogram
//! - **Mass aggregation**: conversion of 2D particle outlines into
//!   per-nutrient chemical mass estimates
//! - **Visualization**: a diagnostic overlay image of the detections
//!
//! ## Modules
//!
//! * [`core`] - Error handling and calibration tables
//! * [`detection`] - The segmentation-model boundary
//! * [`pipeline`] - The per-request analysis orchestrator
//! * [`processors`] - Rectification, classification, calibration, aggregation
//! * [`utils`] - Image helpers and the overlay compositor
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use npksense::prelude::*;
//! use image::RgbImage;
//!
//! # struct MyDetector;
//! # impl ParticleDetector for MyDetector {
//! #     fn detect(&self, _: &RgbImage) -> Result<Vec<Detection>, AnalysisError> {
//! #         Ok(Vec::new())
//! #     }
//! # }
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let image = npksense::utils::decode_image(&std::fs::read("sample.jpg")?)?;
//! let detector = MyDetector;
//!
//! let analyzer = Analyzer::new();
//! let report = analyzer.analyze(&image, &AnalyzeOptions::default(), &detector)?;
//!
//! println!("{}", serde_json::to_string(&report)?);
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod detection;
pub mod pipeline;
pub mod processors;
pub mod utils;

/// Prelude module for convenient imports.
///
/// Bring the essentials into scope with a single use statement:
///
/// ```rust
/// use npksense::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::{AnalysisError, AnalysisTables, MaterialProps, NutrientFactors};
    pub use crate::detection::{Detection, ParticleClass, ParticleDetector, Point2f};
    pub use crate::pipeline::{AnalysisReport, AnalyzeOptions, Analyzer};
    pub use crate::processors::rectify::NormPoint;
    pub use crate::processors::MassScores;
}
