//! Image helpers: payload decoding, saturation extraction, polygon
//! rasterization and area, and JPEG/base64 encoding of the overlay.

use crate::core::AnalysisError;
use crate::detection::Point2f;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, GrayImage, Luma, RgbImage};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;

/// JPEG quality of the encoded diagnostic visualization.
const JPEG_QUALITY: u8 = 80;

/// Decodes an image payload into an RGB image.
///
/// # Errors
///
/// Returns [`AnalysisError::Decode`] if the payload is not a decodable
/// image.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, AnalysisError> {
    let img = image::load_from_memory(bytes).map_err(AnalysisError::Decode)?;
    Ok(img.to_rgb8())
}

/// Encodes an RGB image as a base64 JPEG string.
///
/// # Errors
///
/// Returns [`AnalysisError::Encode`] if JPEG encoding fails.
pub fn encode_jpeg_base64(image: &RgbImage) -> Result<String, AnalysisError> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
    encoder
        .encode(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(AnalysisError::Encode)?;
    Ok(STANDARD.encode(buf))
}

/// Extracts the saturation channel of an RGB image.
///
/// Uses the 8-bit HSV convention `s = 255 * (max - min) / max`, with
/// `s = 0` for black pixels, so values are directly comparable with
/// caller-supplied thresholds in [0, 255].
pub fn saturation_channel(image: &RgbImage) -> GrayImage {
    let mut out = GrayImage::new(image.width(), image.height());
    for (src, dst) in image.pixels().zip(out.pixels_mut()) {
        let max = src.0.iter().copied().max().unwrap_or(0) as f32;
        let min = src.0.iter().copied().min().unwrap_or(0) as f32;
        let s = if max > 0.0 {
            (255.0 * (max - min) / max).round() as u8
        } else {
            0
        };
        *dst = Luma([s]);
    }
    out
}

/// Computes the area of a polygon using the shoelace formula.
///
/// Returns 0.0 for polygons with fewer than 3 vertices.
pub fn polygon_area(polygon: &[Point2f]) -> f64 {
    if polygon.len() < 3 {
        return 0.0;
    }

    let mut area = 0.0;
    for i in 0..polygon.len() {
        let j = (i + 1) % polygon.len();
        area += polygon[i].x as f64 * polygon[j].y as f64;
        area -= polygon[j].x as f64 * polygon[i].y as f64;
    }
    area.abs() / 2.0
}

/// Converts a float polygon to integer raster vertices.
///
/// Coordinates are truncated toward zero, consecutive duplicates are
/// dropped, and a trailing vertex equal to the first is removed so the
/// result is an open ring as the rasterizer expects.
pub(crate) fn raster_vertices(polygon: &[Point2f]) -> Vec<Point<i32>> {
    let mut verts: Vec<Point<i32>> = Vec::with_capacity(polygon.len());
    for p in polygon {
        let v = Point::new(p.x as i32, p.y as i32);
        if verts.last() != Some(&v) {
            verts.push(v);
        }
    }
    while verts.len() > 1 && verts.last() == verts.first() {
        verts.pop();
    }
    verts
}

/// Rasterizes the interior of a polygon into a binary mask.
///
/// Degenerate polygons (fewer than 3 distinct raster vertices) yield an
/// all-zero mask.
pub(crate) fn polygon_mask(polygon: &[Point2f], width: u32, height: u32) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    let verts = raster_vertices(polygon);
    if verts.len() >= 3 {
        draw_polygon_mut(&mut mask, &verts, Luma([255u8]));
    }
    mask
}

/// Mean of `values` over the nonzero pixels of `mask`, rounded to `u8`.
///
/// Returns `None` if the mask is empty.
pub(crate) fn mean_masked(values: &GrayImage, mask: &GrayImage) -> Option<u8> {
    let mut sum: u64 = 0;
    let mut count: u64 = 0;
    for (value, mask_px) in values.pixels().zip(mask.pixels()) {
        if mask_px.0[0] > 0 {
            sum += value.0[0] as u64;
            count += 1;
        }
    }
    if count == 0 {
        return None;
    }
    Some((sum as f64 / count as f64).round() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_saturation_channel_known_colors() {
        let mut img = RgbImage::new(4, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 0])); // pure red: fully saturated
        img.put_pixel(1, 0, Rgb([255, 255, 255])); // white: unsaturated
        img.put_pixel(2, 0, Rgb([0, 0, 0])); // black: defined as 0
        img.put_pixel(3, 0, Rgb([255, 215, 215])); // pale red: 255*40/255

        let sat = saturation_channel(&img);
        assert_eq!(sat.get_pixel(0, 0).0[0], 255);
        assert_eq!(sat.get_pixel(1, 0).0[0], 0);
        assert_eq!(sat.get_pixel(2, 0).0[0], 0);
        assert_eq!(sat.get_pixel(3, 0).0[0], 40);
    }

    #[test]
    fn test_polygon_area_square_and_triangle() {
        let square = [
            Point2f::new(10.0, 10.0),
            Point2f::new(20.0, 10.0),
            Point2f::new(20.0, 20.0),
            Point2f::new(10.0, 20.0),
        ];
        assert_eq!(polygon_area(&square), 100.0);

        let triangle = [
            Point2f::new(0.0, 0.0),
            Point2f::new(10.0, 0.0),
            Point2f::new(0.0, 10.0),
        ];
        assert_eq!(polygon_area(&triangle), 50.0);
    }

    #[test]
    fn test_polygon_area_degenerate() {
        assert_eq!(polygon_area(&[]), 0.0);
        assert_eq!(
            polygon_area(&[Point2f::new(0.0, 0.0), Point2f::new(5.0, 5.0)]),
            0.0
        );
    }

    #[test]
    fn test_raster_vertices_deduplicates() {
        let polygon = [
            Point2f::new(0.2, 0.7),
            Point2f::new(0.9, 0.1), // truncates onto the previous vertex
            Point2f::new(5.0, 0.0),
            Point2f::new(5.0, 5.0),
            Point2f::new(0.0, 0.0), // closes the ring; must be dropped
        ];
        let verts = raster_vertices(&polygon);
        assert_eq!(verts.len(), 3);
        assert_ne!(verts.first(), verts.last());
    }

    #[test]
    fn test_polygon_mask_covers_interior() {
        let polygon = [
            Point2f::new(2.0, 2.0),
            Point2f::new(7.0, 2.0),
            Point2f::new(7.0, 7.0),
            Point2f::new(2.0, 7.0),
        ];
        let mask = polygon_mask(&polygon, 10, 10);
        assert_eq!(mask.get_pixel(4, 4).0[0], 255);
        assert_eq!(mask.get_pixel(0, 0).0[0], 0);
        assert_eq!(mask.get_pixel(9, 9).0[0], 0);
    }

    #[test]
    fn test_mean_masked_empty_mask() {
        let values = GrayImage::new(4, 4);
        let mask = GrayImage::new(4, 4);
        assert_eq!(mean_masked(&values, &mask), None);
    }

    #[test]
    fn test_mean_masked_rounding() {
        let mut values = GrayImage::new(2, 1);
        values.put_pixel(0, 0, Luma([10]));
        values.put_pixel(1, 0, Luma([11]));
        let mut mask = GrayImage::new(2, 1);
        mask.put_pixel(0, 0, Luma([255]));
        mask.put_pixel(1, 0, Luma([255]));
        // 10.5 rounds away from zero
        assert_eq!(mean_masked(&values, &mask), Some(11));
    }

    #[test]
    fn test_encode_jpeg_base64_roundtrips() {
        let img = RgbImage::from_pixel(16, 16, Rgb([120, 130, 140]));
        let b64 = encode_jpeg_base64(&img).unwrap();
        assert!(!b64.is_empty());

        let bytes = STANDARD.decode(b64).unwrap();
        let decoded = decode_image(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (16, 16));
    }

    #[test]
    fn test_decode_image_rejects_garbage() {
        let err = decode_image(&[0u8, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, AnalysisError::Decode(_)));
    }
}
