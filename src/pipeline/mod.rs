//! The per-request analysis orchestrator.
//!
//! One request is a single linear pass: optional rectification (with a
//! fallback to the unrectified image on geometric failure), segmentation
//! through the injected [`ParticleDetector`], per-particle classification
//! and mass accumulation, threshold calibration, and finally the
//! diagnostic overlay. Every accumulator is local to the call; nothing is
//! shared across requests.

use crate::core::config::DEFAULT_SATURATION_THRESHOLD;
use crate::core::{AnalysisError, AnalysisTables};
use crate::detection::{ParticleClass, ParticleDetector};
use crate::processors::rectify::{rectify, NormPoint};
use crate::processors::{calibrate, classify, MassScores};
use crate::utils::image::{encode_jpeg_base64, polygon_area, saturation_channel};
use crate::utils::visualization::{composite, OverlayParticle};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Caller-supplied options for one analysis request.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyzeOptions {
    /// Saturation threshold separating filler from nitrogen granules.
    pub saturation_threshold: u8,
    /// Region-of-interest corners, ordered top-left, top-right,
    /// bottom-right, bottom-left. Absent means no rectification.
    pub corners: Option<[NormPoint; 4]>,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            saturation_threshold: DEFAULT_SATURATION_THRESHOLD,
            corners: None,
        }
    }
}

/// The result of one analysis request, shaped like the service response.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    /// Base64-encoded JPEG of the diagnostic visualization.
    pub image_b64: String,
    /// Final chemical-weight scores.
    pub areas: MassScores,
    /// 256-bin histogram of the request's saturation samples.
    pub histogram: Vec<u32>,
    /// Otsu auto-threshold suggestion for a subsequent request.
    pub auto_threshold: u8,
}

/// The analysis pipeline.
///
/// Holds the calibration tables; everything else is request-scoped. The
/// default tables carry the standard urea/DAP/MOP calibration.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    tables: AnalysisTables,
}

impl Analyzer {
    /// Creates an analyzer with the built-in calibration tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an analyzer with custom calibration tables.
    pub fn with_tables(tables: AnalysisTables) -> Self {
        Self { tables }
    }

    /// Analyzes one sample image.
    ///
    /// # Arguments
    ///
    /// * `image` - The decoded sample photograph
    /// * `options` - Threshold and optional region-of-interest corners
    /// * `detector` - The external segmentation model
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Model`] if segmentation fails,
    /// [`AnalysisError::Encode`] if the visualization cannot be encoded,
    /// or [`AnalysisError::Config`] on a calibration-table defect.
    /// Geometric rectification failures are absorbed: the unrectified
    /// image is analyzed instead.
    pub fn analyze<D: ParticleDetector>(
        &self,
        image: &RgbImage,
        options: &AnalyzeOptions,
        detector: &D,
    ) -> Result<AnalysisReport, AnalysisError> {
        let working = match &options.corners {
            Some(corners) => match rectify(image, corners) {
                Ok(rectified) => rectified,
                Err(err) if err.is_recoverable() => {
                    warn!(error = %err, "rectification failed, using original image");
                    image.clone()
                }
                Err(err) => return Err(err),
            },
            None => image.clone(),
        };

        let detections = detector.detect(&working)?;
        debug!(particles = detections.len(), "segmentation complete");

        let saturation = saturation_channel(&working);

        let mut scores = MassScores::default();
        let mut samples: Vec<u8> = Vec::new();
        let mut overlays: Vec<OverlayParticle> = Vec::with_capacity(detections.len());

        for detection in &detections {
            if detection.polygon.len() < 3 {
                debug!(
                    vertices = detection.polygon.len(),
                    "skipping degenerate polygon"
                );
                continue;
            }

            let result = classify(
                &detection.polygon,
                detection.class_id,
                &saturation,
                options.saturation_threshold,
            );
            if let Some(sample) = result.sample {
                samples.push(sample);
            }

            if result.class != ParticleClass::Unknown {
                let area = polygon_area(&detection.polygon);
                scores.accumulate(area, result.class, &self.tables)?;
            }

            overlays.push(OverlayParticle {
                polygon: detection.polygon.clone(),
                color: result.color,
                class: result.class,
            });
        }

        let (histogram, auto_threshold) = calibrate(&samples);
        let visualization = composite(&working, &overlays);
        let image_b64 = encode_jpeg_base64(&visualization)?;

        Ok(AnalysisReport {
            image_b64,
            areas: scores,
            histogram: histogram.to_vec(),
            auto_threshold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{Detection, Point2f};
    use image::Rgb;

    /// A detector returning a fixed set of synthetic detections.
    struct StubDetector(Vec<Detection>);

    impl ParticleDetector for StubDetector {
        fn detect(&self, _: &RgbImage) -> Result<Vec<Detection>, AnalysisError> {
            Ok(self.0.clone())
        }
    }

    struct FailingDetector;

    impl ParticleDetector for FailingDetector {
        fn detect(&self, _: &RgbImage) -> Result<Vec<Detection>, AnalysisError> {
            Err(AnalysisError::model("inference backend unavailable"))
        }
    }

    fn square(x0: f32, y0: f32, side: f32) -> Vec<Point2f> {
        vec![
            Point2f::new(x0, y0),
            Point2f::new(x0 + side, y0),
            Point2f::new(x0 + side, y0 + side),
            Point2f::new(x0, y0 + side),
        ]
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6 * expected.abs().max(1.0),
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_single_phosphorus_particle() {
        let image = RgbImage::from_pixel(100, 100, Rgb([120, 120, 120]));
        // 10x10 px outline: area 100, mass = 100^1.5 * 0.70 * 1.61
        let detector = StubDetector(vec![Detection {
            polygon: square(10.0, 10.0, 10.0),
            class_id: 2,
            confidence: 0.9,
        }]);

        let report = Analyzer::new()
            .analyze(&image, &AnalyzeOptions::default(), &detector)
            .unwrap();

        assert_close(report.areas.nitrogen, 202.86);
        assert_close(report.areas.phosphorus, 518.42);
        assert_close(report.areas.potassium, 0.0);
        assert_close(report.areas.filler, 405.72);

        // Phosphorus particles contribute no saturation samples.
        assert_eq!(report.histogram.len(), 256);
        assert!(report.histogram.iter().all(|&c| c == 0));
        assert_eq!(report.auto_threshold, 35);
        assert!(!report.image_b64.is_empty());
    }

    #[test]
    fn test_provisional_particle_resolves_against_threshold() {
        // Pale red: interior mean saturation is exactly 40.
        let image = RgbImage::from_pixel(100, 100, Rgb([255, 215, 215]));
        let detector = StubDetector(vec![Detection {
            polygon: square(20.0, 20.0, 30.0),
            class_id: 1,
            confidence: 0.8,
        }]);
        let analyzer = Analyzer::new();

        let low = AnalyzeOptions {
            saturation_threshold: 35,
            corners: None,
        };
        let report = analyzer.analyze(&image, &low, &detector).unwrap();
        assert!(report.areas.filler > 0.0);
        assert_close(report.areas.nitrogen, 0.0);
        assert_eq!(report.histogram[40], 1);
        assert_eq!(report.histogram.iter().sum::<u32>(), 1);

        let high = AnalyzeOptions {
            saturation_threshold: 45,
            corners: None,
        };
        let report = analyzer.analyze(&image, &high, &detector).unwrap();
        assert!(report.areas.nitrogen > 0.0);
        // Urea is pure N source: no phosphorus or potassium contribution.
        assert_close(report.areas.phosphorus, 0.0);
        assert_close(report.areas.potassium, 0.0);
    }

    #[test]
    fn test_degenerate_polygons_are_skipped() {
        let image = RgbImage::from_pixel(60, 60, Rgb([120, 120, 120]));
        let detector = StubDetector(vec![
            Detection {
                polygon: vec![Point2f::new(5.0, 5.0), Point2f::new(9.0, 9.0)],
                class_id: 2,
                confidence: 0.9,
            },
            Detection {
                polygon: square(20.0, 20.0, 10.0),
                class_id: 0,
                confidence: 0.9,
            },
        ]);

        let report = Analyzer::new()
            .analyze(&image, &AnalyzeOptions::default(), &detector)
            .unwrap();

        // Only the potassium particle contributes mass.
        assert_close(report.areas.phosphorus, 0.0);
        assert_close(report.areas.nitrogen, 0.0);
        let mop_mass = 100.0f64.powf(1.5) * 0.60 * 1.98;
        assert_close(report.areas.potassium, mop_mass * 0.60);
        assert_close(report.areas.filler, mop_mass * 0.40);
    }

    #[test]
    fn test_unknown_class_is_drawn_but_not_aggregated() {
        let image = RgbImage::from_pixel(60, 60, Rgb([120, 120, 120]));
        let detector = StubDetector(vec![Detection {
            polygon: square(10.0, 10.0, 20.0),
            class_id: 9,
            confidence: 0.9,
        }]);

        let report = Analyzer::new()
            .analyze(&image, &AnalyzeOptions::default(), &detector)
            .unwrap();

        assert_eq!(report.areas, MassScores::default());
        assert!(!report.image_b64.is_empty());
    }

    #[test]
    fn test_empty_detection_list_succeeds() {
        let image = RgbImage::from_pixel(32, 32, Rgb([50, 60, 70]));
        let detector = StubDetector(Vec::new());

        let report = Analyzer::new()
            .analyze(&image, &AnalyzeOptions::default(), &detector)
            .unwrap();

        assert_eq!(report.areas, MassScores::default());
        assert!(report.histogram.iter().all(|&c| c == 0));
        assert_eq!(report.auto_threshold, 35);
    }

    #[test]
    fn test_detector_failure_is_fatal() {
        let image = RgbImage::from_pixel(32, 32, Rgb([50, 60, 70]));
        let err = Analyzer::new()
            .analyze(&image, &AnalyzeOptions::default(), &FailingDetector)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Model { .. }));
    }

    #[test]
    fn test_degenerate_corners_fall_back_to_original() {
        let image = RgbImage::from_pixel(64, 48, Rgb([120, 120, 120]));
        let detector = StubDetector(vec![Detection {
            polygon: square(10.0, 10.0, 10.0),
            class_id: 2,
            confidence: 0.9,
        }]);
        let options = AnalyzeOptions {
            saturation_threshold: 35,
            corners: Some([NormPoint { x: 0.5, y: 0.5 }; 4]),
        };

        // The request still succeeds on the unrectified image.
        let report = Analyzer::new().analyze(&image, &options, &detector).unwrap();
        assert!(report.areas.phosphorus > 0.0);
    }

    #[test]
    fn test_rectified_request_end_to_end() {
        let image = RgbImage::from_pixel(80, 80, Rgb([255, 215, 215]));
        let detector = StubDetector(vec![Detection {
            polygon: square(10.0, 10.0, 15.0),
            class_id: 1,
            confidence: 0.9,
        }]);
        let options = AnalyzeOptions {
            saturation_threshold: 35,
            corners: Some([
                NormPoint { x: 0.0, y: 0.0 },
                NormPoint { x: 0.5, y: 0.0 },
                NormPoint { x: 0.5, y: 0.5 },
                NormPoint { x: 0.0, y: 0.5 },
            ]),
        };

        let report = Analyzer::new().analyze(&image, &options, &detector).unwrap();
        // The crop is uniform pale red, so the particle reads saturation 40
        // and resolves to filler at threshold 35.
        assert!(report.areas.filler > 0.0);
        assert_eq!(report.histogram.iter().sum::<u32>(), 1);
    }

    #[test]
    fn test_options_deserialize_from_request_json() {
        let json = r#"{
            "saturation_threshold": 42,
            "corners": [
                {"x": 0.1, "y": 0.1}, {"x": 0.9, "y": 0.1},
                {"x": 0.9, "y": 0.9}, {"x": 0.1, "y": 0.9}
            ]
        }"#;
        let options: AnalyzeOptions = serde_json::from_str(json).unwrap();
        assert_eq!(options.saturation_threshold, 42);
        assert!(options.corners.is_some());

        let defaults: AnalyzeOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(defaults.saturation_threshold, 35);
        assert!(defaults.corners.is_none());
    }

    #[test]
    fn test_report_serializes_response_shape() {
        let image = RgbImage::from_pixel(32, 32, Rgb([120, 120, 120]));
        let detector = StubDetector(Vec::new());
        let report = Analyzer::new()
            .analyze(&image, &AnalyzeOptions::default(), &detector)
            .unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["image_b64"].is_string());
        assert!(json["areas"]["N"].is_number());
        assert_eq!(json["histogram"].as_array().unwrap().len(), 256);
        assert_eq!(json["auto_threshold"], 35);
    }
}
