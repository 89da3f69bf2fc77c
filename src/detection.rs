//! The segmentation-model boundary.
//!
//! Particle detection is a capability boundary: the pipeline consumes an
//! already-trained instance-segmentation model through the
//! [`ParticleDetector`] trait so it can be driven with synthetic detections
//! in tests without invoking any real model.

use crate::core::AnalysisError;
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// A 2D point with floating-point coordinates, in image pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2f {
    /// X coordinate of the point.
    pub x: f32,
    /// Y coordinate of the point.
    pub y: f32,
}

impl Point2f {
    /// Creates a new Point2f with the given coordinates.
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// One instance produced by the segmentation model.
///
/// The confidence has already been filtered by the model call's own
/// threshold; the pipeline does not re-filter by confidence. Polygons with
/// fewer than 3 vertices are tolerated here and skipped by the pipeline.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Ordered outline of the particle, in image pixel space.
    pub polygon: Vec<Point2f>,
    /// Class id from the model's label space: 0 = K, 1 = N (provisional),
    /// 2 = P.
    pub class_id: u32,
    /// Model confidence for this instance.
    pub confidence: f32,
}

/// Final class of a detected particle.
///
/// `K` and `P` come directly from the class id. Class id 1 is a
/// provisional `N` that saturation analysis resolves to `N` or `Filler`.
/// Unrecognized class ids become `Unknown`: drawn in the overlay but
/// excluded from mass aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticleClass {
    /// Nitrogen source (urea-type).
    N,
    /// Phosphorus source (DAP-type).
    P,
    /// Potassium source (MOP-type).
    K,
    /// Inert filler granule.
    Filler,
    /// Unrecognized class id.
    Unknown,
}

/// The external instance-segmentation model.
///
/// Implementations run inference on the (possibly rectified) sample image
/// and return zero or more detections. An empty detection list is a valid
/// success: the pipeline then reports empty mass scores, an all-zero
/// histogram and the default threshold.
pub trait ParticleDetector {
    /// Detects particles in the given image.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Model`] if inference fails; the request is
    /// then failed as a whole.
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, AnalysisError>;
}
