//! Configuration management for the OCR stages.
//!
//! This module provides the ONNX Runtime session options, the per-model
//! inference settings shared by every stage, validation traits and a JSON
//! loader for any stage config.

pub mod errors;
pub mod onnx;

pub use errors::{ConfigError, ConfigValidator};
pub use onnx::{OrtExecutionProvider, OrtGraphOptimizationLevel, OrtSessionConfig};

use crate::core::OcrResult;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upper bound on the number of ONNX sessions kept per model.
pub const MAX_SESSION_POOL_SIZE: usize = 64;

/// Inference settings shared by every stage's ONNX Runtime adapter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelInferenceConfig {
    /// Name used in logs and errors; defaults to the model file stem.
    pub model_name: Option<String>,
    /// Number of sessions to create for concurrent calls (default 1).
    pub session_pool_size: Option<usize>,
    /// Session options applied to every pooled session.
    pub ort_session: Option<OrtSessionConfig>,
}

impl ModelInferenceConfig {
    /// Effective pool size.
    pub fn pool_size(&self) -> usize {
        self.session_pool_size.unwrap_or(1).max(1)
    }
}

impl ConfigValidator for ModelInferenceConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(size) = self.session_pool_size {
            self.validate_batch_size_with_limits(size, MAX_SESSION_POOL_SIZE)
                .map_err(|_| ConfigError::InvalidConfig {
                    message: format!(
                        "session_pool_size must be in [1, {MAX_SESSION_POOL_SIZE}], got {size}"
                    ),
                })?;
        }
        if let Some(ort) = &self.ort_session {
            ort.validate()?;
        }
        Ok(())
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

/// Deserializes a config struct from a JSON file.
///
/// Missing fields fall back to the struct's defaults when it is annotated
/// with `#[serde(default)]`, as every stage config is.
pub fn load_config<T: DeserializeOwned>(path: &Path) -> OcrResult<T> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| {
        crate::core::OCRError::config_error(format!(
            "failed to parse config '{}': {}",
            path.display(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_pool_size_default_and_bounds() {
        let cfg = ModelInferenceConfig::default();
        assert_eq!(cfg.pool_size(), 1);
        assert!(cfg.validate().is_ok());

        let cfg = ModelInferenceConfig {
            session_pool_size: Some(0),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_load_config_from_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"model_name": "det", "session_pool_size": 2, "ort_session": {{"intra_threads": 1}}}}"#
        )
        .unwrap();

        let cfg: ModelInferenceConfig = load_config(file.path()).unwrap();
        assert_eq!(cfg.model_name.as_deref(), Some("det"));
        assert_eq!(cfg.pool_size(), 2);
        assert_eq!(cfg.ort_session.and_then(|o| o.intra_threads), Some(1));
    }

    #[test]
    fn test_load_config_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = load_config::<ModelInferenceConfig>(file.path()).unwrap_err();
        assert!(matches!(err, crate::core::OCRError::ConfigError { .. }));
    }
}
