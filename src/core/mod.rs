//! Core error handling and calibration configuration.

pub mod config;
pub mod errors;

pub use config::{AnalysisTables, MaterialProps, MaterialRow, NutrientFactors};
pub use errors::{AnalysisError, AnalysisResult};
