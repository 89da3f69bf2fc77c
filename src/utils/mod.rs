//! Utility functions for images and the diagnostic overlay.

pub mod image;
pub mod visualization;

pub use image::{decode_image, encode_jpeg_base64, polygon_area, saturation_channel};
pub use visualization::{composite, OverlayParticle};
