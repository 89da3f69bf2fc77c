//! Post-detection processing: rectification, classification, threshold
//! calibration and mass aggregation.

pub mod classify;
pub mod mass;
pub mod rectify;
pub mod threshold;

pub use classify::{classify, Classification};
pub use mass::MassScores;
pub use rectify::{rectify, NormPoint};
pub use threshold::{calibrate, HISTOGRAM_BINS};
