//! Error types for the OCR stages.
//!
//! This module defines the errors that can occur while loading models,
//! preparing batches, dispatching inference and decoding outputs. It also
//! provides constructor helpers for creating these errors with context.
//!
//! Two kinds are recovered locally by the decoders and never abort a call:
//! [`OCRError::DegenerateGeometry`] drops a single candidate and
//! [`OCRError::UncomputableConfidence`] replaces a single sample with its
//! default result.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Convenient result alias for OCR operations.
pub type OcrResult<T> = Result<T, OCRError>;

/// Enum representing various errors that can occur in the OCR stages.
#[derive(Error, Debug)]
pub enum OCRError {
    /// Error occurred while loading an image.
    #[error("image load")]
    ImageLoad(#[source] image::ImageError),

    /// The inference engine could not load or parse a model file.
    #[error("failed to load model '{}': {reason}{}", path.display(), suggestion.as_deref().map(|s| format!(" ({s})")).unwrap_or_default())]
    ModelLoad {
        /// Path of the model that failed to load.
        path: PathBuf,
        /// Short description of what failed.
        reason: String,
        /// Optional hint for the caller.
        suggestion: Option<String>,
        /// The underlying engine error, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The inference engine failed while running a batch.
    #[error("inference failed for model '{model_name}': {context}")]
    Inference {
        /// Name of the model that failed.
        model_name: String,
        /// Additional context (batch index, input shape).
        context: String,
        /// The underlying engine error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An output tensor violates the layout convention of the stage decoding it.
    #[error("shape mismatch for '{tensor}': expected {expected}, got {actual:?}")]
    ShapeMismatch {
        /// Name of the offending tensor.
        tensor: String,
        /// Human readable description of the expected layout.
        expected: String,
        /// The shape actually received.
        actual: Vec<i64>,
    },

    /// A detection or table candidate collapsed to an unusable shape.
    #[error("degenerate geometry: {context}")]
    DegenerateGeometry {
        /// What collapsed and why.
        context: String,
    },

    /// A sequence decoder accepted no symbols, so no mean confidence exists.
    #[error("uncomputable confidence for sample {index}")]
    UncomputableConfidence {
        /// Index of the sample inside its batch.
        index: usize,
    },

    /// Error indicating invalid input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Error indicating a configuration problem.
    #[error("configuration: {message}")]
    ConfigError {
        /// A message describing the configuration error.
        message: String,
    },

    /// Error from the ONNX Runtime session.
    #[error(transparent)]
    Session(#[from] ort::Error),

    /// Error from tensor operations.
    #[error("tensor operation")]
    Tensor(#[from] ndarray::ShapeError),

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),
}

impl OCRError {
    /// Creates an OCRError for a failed engine call.
    ///
    /// # Arguments
    ///
    /// * `model_name` - Name of the model whose forward pass failed.
    /// * `context` - Batch index, input shape or any other detail.
    /// * `error` - The underlying engine error.
    pub fn inference_error(
        model_name: impl Into<String>,
        context: impl Into<String>,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Inference {
            model_name: model_name.into(),
            context: context.into(),
            source: Box::new(error),
        }
    }

    /// Creates an OCRError for a model that could not be loaded.
    ///
    /// # Arguments
    ///
    /// * `path` - The model path that was attempted.
    /// * `reason` - Short description of the failure.
    /// * `suggestion` - Optional hint shown to the caller.
    /// * `source` - Optional underlying error.
    pub fn model_load_error(
        path: &Path,
        reason: impl Into<String>,
        suggestion: Option<&str>,
        source: Option<impl std::error::Error + Send + Sync + 'static>,
    ) -> Self {
        Self::ModelLoad {
            path: path.to_path_buf(),
            reason: reason.into(),
            suggestion: suggestion.map(str::to_string),
            source: source.map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
        }
    }

    /// Creates an OCRError for an output tensor with an unexpected layout.
    pub fn shape_mismatch(
        tensor: impl Into<String>,
        expected: impl Into<String>,
        actual: &[i64],
    ) -> Self {
        Self::ShapeMismatch {
            tensor: tensor.into(),
            expected: expected.into(),
            actual: actual.to_vec(),
        }
    }

    /// Creates an OCRError for a candidate that collapsed during decoding.
    pub fn degenerate_geometry(context: impl Into<String>) -> Self {
        Self::DegenerateGeometry {
            context: context.into(),
        }
    }

    /// Creates an OCRError for invalid input.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates an OCRError for configuration errors.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }
}

impl From<image::ImageError> for OCRError {
    fn from(error: image::ImageError) -> Self {
        Self::ImageLoad(error)
    }
}

impl From<crate::core::config::ConfigError> for OCRError {
    fn from(error: crate::core::config::ConfigError) -> Self {
        Self::ConfigError {
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_message() {
        let err = OCRError::shape_mismatch("softmax_0.tmp_0", "[B, T, C]", &[1, 2]);
        let msg = err.to_string();
        assert!(msg.contains("softmax_0.tmp_0"));
        assert!(msg.contains("[1, 2]"));
    }

    #[test]
    fn test_model_load_error_includes_suggestion() {
        let err = OCRError::model_load_error(
            Path::new("/models/det/inference.onnx"),
            "failed to create ONNX session",
            Some("verify model file exists"),
            None::<std::io::Error>,
        );
        let msg = err.to_string();
        assert!(msg.contains("inference.onnx"));
        assert!(msg.contains("verify model file exists"));
    }
}
