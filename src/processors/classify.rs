//! Per-particle class resolution.
//!
//! Class ids 0 (K) and 2 (P) map directly to their final class. Class id 1
//! is a provisional nitrogen label that urea and inert filler granules
//! share; the two are disambiguated by the mean saturation of the
//! particle's interior, since filler granules are noticeably more colorful
//! than urea. The interior excludes boundary pixels via a single 3x3
//! erosion pass so the statistic is not polluted by edge blending.

use crate::detection::{ParticleClass, Point2f};
use crate::utils::image::{mean_masked, polygon_mask};
use image::{GrayImage, Rgb};
use imageproc::distance_transform::Norm;
use imageproc::morphology::erode;

/// Class id the segmentation model assigns to potassium granules.
pub const CLASS_ID_K: u32 = 0;
/// Class id of the provisional nitrogen/filler category.
pub const CLASS_ID_N_PROVISIONAL: u32 = 1;
/// Class id the segmentation model assigns to phosphorus granules.
pub const CLASS_ID_P: u32 = 2;

const COLOR_K: Rgb<u8> = Rgb([255, 50, 50]);
const COLOR_P: Rgb<u8> = Rgb([50, 255, 50]);
const COLOR_N: Rgb<u8> = Rgb([200, 200, 200]);
const COLOR_FILLER: Rgb<u8> = Rgb([0, 255, 255]);
const COLOR_UNKNOWN: Rgb<u8> = Rgb([255, 255, 255]);

/// The outcome of classifying one particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    /// Final class of the particle.
    pub class: ParticleClass,
    /// Display color for the diagnostic overlay.
    pub color: Rgb<u8>,
    /// Interior mean saturation, produced only for provisional-nitrogen
    /// particles. Collected by the caller for threshold calibration.
    pub sample: Option<u8>,
}

/// Classifies one particle.
///
/// `saturation` is the saturation channel of the (possibly rectified)
/// sample image, computed once per request; the polygon is rasterized
/// against its dimensions. This is pure per-particle logic with no shared
/// mutable state.
///
/// # Arguments
///
/// * `polygon` - The particle outline, at least 3 vertices
/// * `class_id` - The model's class id for this instance
/// * `saturation` - Saturation channel of the working image
/// * `threshold` - Saturation threshold separating filler from nitrogen
pub fn classify(
    polygon: &[Point2f],
    class_id: u32,
    saturation: &GrayImage,
    threshold: u8,
) -> Classification {
    match class_id {
        CLASS_ID_K => Classification {
            class: ParticleClass::K,
            color: COLOR_K,
            sample: None,
        },
        CLASS_ID_P => Classification {
            class: ParticleClass::P,
            color: COLOR_P,
            sample: None,
        },
        CLASS_ID_N_PROVISIONAL => resolve_provisional(polygon, saturation, threshold),
        _ => Classification {
            class: ParticleClass::Unknown,
            color: COLOR_UNKNOWN,
            sample: None,
        },
    }
}

/// Resolves a provisional-nitrogen particle to `N` or `Filler`.
///
/// The polygon interior is rasterized and eroded once with a 3x3
/// structuring element. Particles smaller than the structuring element
/// erode to nothing; the un-eroded mask is used instead so tiny granules
/// still produce a statistic.
fn resolve_provisional(
    polygon: &[Point2f],
    saturation: &GrayImage,
    threshold: u8,
) -> Classification {
    let mask = polygon_mask(polygon, saturation.width(), saturation.height());
    let inner = erode(&mask, Norm::LInf, 1);
    let interior = if inner.pixels().any(|p| p.0[0] > 0) {
        &inner
    } else {
        &mask
    };

    let sample = mean_masked(saturation, interior).unwrap_or(0);

    if sample > threshold {
        Classification {
            class: ParticleClass::Filler,
            color: COLOR_FILLER,
            sample: Some(sample),
        }
    } else {
        Classification {
            class: ParticleClass::N,
            color: COLOR_N,
            sample: Some(sample),
        }
    }
}
