//! Diagnostic overlay compositing.
//!
//! The base image is darkened to 40% so the particle outlines stand out,
//! then two overlay layers are merged: a thick layer with each particle's
//! class color at 3px, added channel-wise with saturation, and a thin 1px
//! contrast layer whose nonzero pixels overwrite the result so contrast
//! outlines always render on top of thick outlines. The output is
//! deterministic for a given detection set.

use crate::detection::{ParticleClass, Point2f};
use crate::utils::image::raster_vertices;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;

const DARKEN_FACTOR: f32 = 0.4;
const THICK_OUTLINE_PX: i32 = 3;

const CONTRAST_DARK: Rgb<u8> = Rgb([0, 0, 0]);
const CONTRAST_LIGHT: Rgb<u8> = Rgb([255, 255, 255]);

/// One particle's contribution to the overlay.
#[derive(Debug, Clone)]
pub struct OverlayParticle {
    /// The particle outline, in working-image pixel space.
    pub polygon: Vec<Point2f>,
    /// Display color of the resolved class.
    pub color: Rgb<u8>,
    /// Final class; selects the contrast color of the thin outline.
    pub class: ParticleClass,
}

/// Renders the diagnostic visualization for one request.
pub fn composite(base: &RgbImage, particles: &[OverlayParticle]) -> RgbImage {
    let (width, height) = base.dimensions();

    let mut out = RgbImage::new(width, height);
    for (src, dst) in base.pixels().zip(out.pixels_mut()) {
        for c in 0..3 {
            dst.0[c] = (src.0[c] as f32 * DARKEN_FACTOR).round() as u8;
        }
    }

    let mut thick = RgbImage::new(width, height);
    let mut thin = RgbImage::new(width, height);

    for particle in particles {
        draw_polygon_outline(&mut thick, &particle.polygon, particle.color, THICK_OUTLINE_PX);

        let contrast = if particle.class == ParticleClass::N {
            CONTRAST_DARK
        } else {
            CONTRAST_LIGHT
        };
        draw_polygon_outline(&mut thin, &particle.polygon, contrast, 1);
    }

    for (dst, px) in out.pixels_mut().zip(thick.pixels()) {
        for c in 0..3 {
            dst.0[c] = dst.0[c].saturating_add(px.0[c]);
        }
    }

    for (dst, px) in out.pixels_mut().zip(thin.pixels()) {
        if px.0 != [0, 0, 0] {
            *dst = *px;
        }
    }

    out
}

/// Draws a closed polygon outline at the given thickness.
///
/// Each edge is stamped at every offset within the thickness
/// neighborhood, matching the square-brush stroke of the raster pipeline
/// this replicates.
fn draw_polygon_outline(img: &mut RgbImage, polygon: &[Point2f], color: Rgb<u8>, thickness: i32) {
    let verts = raster_vertices(polygon);
    if verts.len() < 3 {
        return;
    }

    let r = thickness / 2;
    for i in 0..verts.len() {
        let a = verts[i];
        let b = verts[(i + 1) % verts.len()];
        for dy in -r..=r {
            for dx in -r..=r {
                draw_line_segment_mut(
                    img,
                    ((a.x + dx) as f32, (a.y + dy) as f32),
                    ((b.x + dx) as f32, (b.y + dy) as f32),
                    color,
                );
            }
        }
    }
}
