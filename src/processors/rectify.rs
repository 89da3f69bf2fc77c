//! Perspective rectification of the photographed sample region.
//!
//! Maps four user-supplied normalized corner points to a metric-consistent
//! top-down rectangle. The corner ordering is a caller contract: top-left,
//! top-right, bottom-right, bottom-left, in that fixed order. It is
//! documented rather than inferred; reordered input silently mis-rectifies.

use crate::core::AnalysisError;
use crate::detection::Point2f;
use image::{Rgb, RgbImage};
use nalgebra::{Matrix3, Vector3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// A corner point normalized to the image dimensions, both coordinates
/// in [0, 1]. Matches the JSON shape the capture frontend posts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormPoint {
    /// Normalized x coordinate.
    pub x: f32,
    /// Normalized y coordinate.
    pub y: f32,
}

/// Calculates the Euclidean distance between two points.
fn distance(p1: &Point2f, p2: &Point2f) -> f32 {
    (p1.x - p2.x).hypot(p1.y - p2.y)
}

/// Rectifies the sample region delimited by four normalized corners to a
/// top-down rectangle.
///
/// The target width is the larger of the two horizontal edge lengths and
/// the target height the larger of the two vertical edge lengths, so the
/// output never compresses the longer side of the region.
///
/// # Arguments
///
/// * `image` - The source image
/// * `corners` - Normalized corners ordered top-left, top-right,
///   bottom-right, bottom-left
///
/// # Errors
///
/// Returns [`AnalysisError::Geometry`] if the corners are degenerate
/// (either output dimension collapses to zero) or the perspective
/// transform cannot be solved. The orchestrator recovers from this by
/// falling back to the unrectified image.
pub fn rectify(image: &RgbImage, corners: &[NormPoint; 4]) -> Result<RgbImage, AnalysisError> {
    let (w, h) = (image.width() as f32, image.height() as f32);
    let [tl, tr, br, bl] = corners.map(|c| Point2f::new(c.x * w, c.y * h));

    let width_a = distance(&br, &bl);
    let width_b = distance(&tr, &tl);
    let max_width = (width_a as u32).max(width_b as u32);

    let height_a = distance(&tr, &br);
    let height_b = distance(&tl, &bl);
    let max_height = (height_a as u32).max(height_b as u32);

    if max_width == 0 || max_height == 0 {
        return Err(AnalysisError::geometry(format!(
            "degenerate corners yield a {max_width}x{max_height} output"
        )));
    }

    let src = [tl, tr, br, bl];
    let dst = [
        Point2f::new(0.0, 0.0),
        Point2f::new((max_width - 1) as f32, 0.0),
        Point2f::new((max_width - 1) as f32, (max_height - 1) as f32),
        Point2f::new(0.0, (max_height - 1) as f32),
    ];

    let transform = get_perspective_transform(&src, &dst)?;
    warp_perspective(image, &transform, max_width, max_height)
}

/// Solves the projective transform mapping four source points to four
/// destination points.
///
/// Sets up the standard 8x8 linear system for the eight free parameters of
/// the homography (the ninth is fixed to 1) and solves it by LU
/// decomposition.
///
/// # Errors
///
/// Returns [`AnalysisError::Geometry`] if the system is singular
/// (collinear or duplicate corners).
fn get_perspective_transform(
    src_points: &[Point2f; 4],
    dst_points: &[Point2f; 4],
) -> Result<Matrix3<f32>, AnalysisError> {
    let mut a = nalgebra::DMatrix::<f32>::zeros(8, 8);
    let mut b = nalgebra::DVector::<f32>::zeros(8);

    for i in 0..4 {
        let src = &src_points[i];
        let dst = &dst_points[i];

        a.set_row(
            i * 2,
            &nalgebra::RowDVector::from_row_slice(&[
                src.x,
                src.y,
                1.0,
                0.0,
                0.0,
                0.0,
                -src.x * dst.x,
                -src.y * dst.x,
            ]),
        );
        b[i * 2] = dst.x;

        a.set_row(
            i * 2 + 1,
            &nalgebra::RowDVector::from_row_slice(&[
                0.0,
                0.0,
                0.0,
                src.x,
                src.y,
                1.0,
                -src.x * dst.y,
                -src.y * dst.y,
            ]),
        );
        b[i * 2 + 1] = dst.y;
    }

    let decomp = a.lu();
    let solution = decomp
        .solve(&b)
        .ok_or_else(|| AnalysisError::geometry("cannot solve perspective transform"))?;

    Ok(Matrix3::new(
        solution[0],
        solution[1],
        solution[2],
        solution[3],
        solution[4],
        solution[5],
        solution[6],
        solution[7],
        1.0,
    ))
}

/// Resamples the source image onto the destination rectangle.
///
/// Uses inverse mapping with bilinear interpolation; rows are processed in
/// parallel. Destination pixels whose source lies outside the image are
/// black.
///
/// # Errors
///
/// Returns [`AnalysisError::Geometry`] if the transform is not invertible.
fn warp_perspective(
    src_image: &RgbImage,
    transform: &Matrix3<f32>,
    dst_width: u32,
    dst_height: u32,
) -> Result<RgbImage, AnalysisError> {
    let inv = transform
        .try_inverse()
        .ok_or_else(|| AnalysisError::geometry("cannot invert perspective transform"))?;

    let mut dst_image = RgbImage::new(dst_width, dst_height);
    let (src_width, src_height) = src_image.dimensions();
    let buffer: &mut [u8] = dst_image.as_mut();

    buffer
        .par_chunks_mut((dst_width * 3) as usize)
        .enumerate()
        .for_each(|(dst_y, row_buffer)| {
            for dst_x in 0..dst_width {
                let dst_point = Vector3::new(dst_x as f32, dst_y as f32, 1.0);
                let src_point = inv * dst_point;

                let mut pixel = Rgb([0, 0, 0]);
                if src_point.z.abs() > f32::EPSILON {
                    let src_x = src_point.x / src_point.z;
                    let src_y = src_point.y / src_point.z;

                    if src_x >= 0.0
                        && src_y >= 0.0
                        && src_x < (src_width - 1) as f32
                        && src_y < (src_height - 1) as f32
                    {
                        pixel = bilinear_interpolate(src_image, src_x, src_y);
                    }
                }

                let index = (dst_x * 3) as usize;
                row_buffer[index..index + 3].copy_from_slice(&pixel.0);
            }
        });

    Ok(dst_image)
}

/// Bilinear interpolation of a pixel value at fractional coordinates.
fn bilinear_interpolate(image: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let x1 = x.floor() as u32;
    let y1 = y.floor() as u32;
    let x2 = (x1 + 1).min(image.width() - 1);
    let y2 = (y1 + 1).min(image.height() - 1);

    let dx = x - x1 as f32;
    let dy = y - y1 as f32;

    let p11 = image.get_pixel(x1, y1);
    let p12 = image.get_pixel(x1, y2);
    let p21 = image.get_pixel(x2, y1);
    let p22 = image.get_pixel(x2, y2);

    let mut result = [0u8; 3];
    for (i, channel) in result.iter_mut().enumerate() {
        let val = (1.0 - dx) * (1.0 - dy) * p11.0[i] as f32
            + dx * (1.0 - dy) * p21.0[i] as f32
            + (1.0 - dx) * dy * p12.0[i] as f32
            + dx * dy * p22.0[i] as f32;
        *channel = val.round().clamp(0.0, 255.0) as u8;
    }

    Rgb(result)
}
