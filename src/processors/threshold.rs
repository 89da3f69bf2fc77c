//! Population-level saturation threshold calibration.
//!
//! Collects every provisional-nitrogen particle's saturation sample into a
//! 256-bin histogram and derives a binarization threshold with Otsu's
//! method. The threshold is advisory output for the caller (a suggestion
//! for the next request); it is never fed back into the request that
//! produced it, which already classified with the caller-supplied value.

use crate::core::config::DEFAULT_SATURATION_THRESHOLD;

/// Number of histogram bins, one per 8-bit saturation value.
pub const HISTOGRAM_BINS: usize = 256;

/// Builds the saturation histogram and the Otsu auto-threshold for one
/// request's sample population.
///
/// An empty population yields an all-zero histogram and the fixed default
/// threshold of 35.
pub fn calibrate(samples: &[u8]) -> ([u32; HISTOGRAM_BINS], u8) {
    let mut histogram = [0u32; HISTOGRAM_BINS];
    if samples.is_empty() {
        return (histogram, DEFAULT_SATURATION_THRESHOLD);
    }

    for &s in samples {
        histogram[s as usize] += 1;
    }

    let threshold = otsu_threshold(&histogram, samples.len() as f64);
    (histogram, threshold)
}

/// Otsu's method over a 256-bin histogram.
///
/// Finds the split that maximizes the between-class variance, which is
/// equivalent to minimizing the intra-class variance of the two implied
/// classes.
fn otsu_threshold(histogram: &[u32; HISTOGRAM_BINS], total: f64) -> u8 {
    let mut sum = 0.0;
    for (i, &count) in histogram.iter().enumerate() {
        sum += i as f64 * count as f64;
    }

    let mut sum_b = 0.0;
    let mut w_b = 0.0;

    let mut max_variance = 0.0;
    let mut threshold = 0u8;

    for (t, &count) in histogram.iter().enumerate() {
        w_b += count as f64;
        if w_b == 0.0 {
            continue;
        }

        let w_f = total - w_b;
        if w_f == 0.0 {
            break;
        }

        sum_b += t as f64 * count as f64;

        let m_b = sum_b / w_b;
        let m_f = (sum - sum_b) / w_f;

        let variance = w_b * w_f * (m_b - m_f).powi(2);
        if variance > max_variance {
            max_variance = variance;
            threshold = t as u8;
        }
    }

    threshold
}
