//! Error types for the analysis pipeline.
//!
//! Only [`AnalysisError::Decode`], [`AnalysisError::Model`] and internal
//! defects ([`AnalysisError::Config`], [`AnalysisError::Encode`]) are fatal
//! for a request. [`AnalysisError::Geometry`] is recovered by the
//! orchestrator, which falls back to the unrectified image.

use thiserror::Error;

/// Result type alias for analysis operations.
pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;

/// Errors that can occur while analyzing a fertilizer sample.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The image payload could not be decoded.
    #[error("image decode")]
    Decode(#[source] image::ImageError),

    /// Rectification input was malformed or the perspective transform
    /// could not be solved.
    #[error("geometry: {message}")]
    Geometry {
        /// A message describing the geometric failure.
        message: String,
    },

    /// A calibration-table lookup failed. This indicates a programming
    /// defect (table rows and tag sets out of sync), not bad user input.
    #[error("configuration: {message}")]
    Config {
        /// A message describing the configuration error.
        message: String,
    },

    /// The external segmentation model call failed.
    #[error("segmentation model: {message}")]
    Model {
        /// A message describing the model failure.
        message: String,
        /// The underlying error reported by the model integration.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The diagnostic visualization could not be encoded.
    #[error("visualization encode")]
    Encode(#[source] image::ImageError),
}

impl AnalysisError {
    /// Creates a geometry error with the given message.
    pub fn geometry(message: impl Into<String>) -> Self {
        Self::Geometry {
            message: message.into(),
        }
    }

    /// Creates a configuration error with the given message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a model error with the given message and no underlying source.
    pub fn model(message: impl Into<String>) -> Self {
        Self::Model {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a model error wrapping an underlying integration error.
    pub fn model_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Model {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns true if the orchestrator absorbs this error with a fallback
    /// instead of failing the request.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AnalysisError::Geometry { .. })
    }
}
