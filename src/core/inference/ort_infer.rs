//! ONNX Runtime implementation of [`InferenceEngine`].

use super::session::{apply_ort_config, load_session_with, resolve_model_file};
use super::{InferenceEngine, NamedOutputs, TensorOutput};
use crate::core::batch::Tensor4D;
use crate::core::config::{ConfigValidator, ModelInferenceConfig};
use crate::core::{OCRError, OcrResult};
use ort::logging::LogLevel;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// A pool of ONNX Runtime sessions for one model.
///
/// `Session::run` needs exclusive access, so every session sits behind its own
/// mutex and calls are spread over the pool round-robin.
pub struct OrtInfer {
    sessions: Vec<Mutex<Session>>,
    next_idx: AtomicUsize,
    input_name: String,
    model_path: PathBuf,
    model_name: String,
}

impl std::fmt::Debug for OrtInfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrtInfer")
            .field("model_name", &self.model_name)
            .field("model_path", &self.model_path)
            .field("input_name", &self.input_name)
            .field("pool_size", &self.sessions.len())
            .finish()
    }
}

impl OrtInfer {
    /// Creates a single-session engine with default ONNX Runtime settings.
    pub fn new(model_path: impl AsRef<Path>, input_name: Option<&str>) -> OcrResult<Self> {
        Self::from_config(&ModelInferenceConfig::default(), model_path, input_name)
    }

    /// Creates an engine from [`ModelInferenceConfig`], applying the session
    /// options to every pooled session.
    ///
    /// `model_path` may be a model file or a directory holding
    /// `inference.onnx`. Without `input_name` the model's first declared
    /// input is fed.
    pub fn from_config(
        common: &ModelInferenceConfig,
        model_path: impl AsRef<Path>,
        input_name: Option<&str>,
    ) -> OcrResult<Self> {
        common.validate()?;
        let path = resolve_model_file(model_path.as_ref())?;
        let pool_size = common.pool_size();
        debug!(model = %path.display(), pool_size, "loading ONNX model");

        let mut sessions = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let session = match &common.ort_session {
                Some(cfg) => load_session_with(
                    &path,
                    |builder| apply_ort_config(builder, cfg),
                    Some("check device/EP configuration and model file"),
                )?,
                None => load_session_with(
                    &path,
                    |builder| builder.with_log_level(LogLevel::Error),
                    Some("verify model path and compatibility"),
                )?,
            };
            sessions.push(Mutex::new(session));
        }

        let model_name = common
            .model_name
            .clone()
            .or_else(|| model_stem(&path))
            .unwrap_or_else(|| "unknown_model".to_string());

        let input_name = match input_name {
            Some(name) => name.to_string(),
            None => sessions
                .first_mut()
                .and_then(|s| s.get_mut().ok())
                .and_then(|s| s.inputs.first().map(|i| i.name.clone()))
                .unwrap_or_else(|| "x".to_string()),
        };

        Ok(OrtInfer {
            sessions,
            next_idx: AtomicUsize::new(0),
            input_name,
            model_path: path,
            model_name,
        })
    }

    /// Returns the resolved model file.
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Returns the model name used in logs and errors.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Number of pooled sessions.
    pub fn pool_size(&self) -> usize {
        self.sessions.len()
    }
}

/// The model name is the parent directory for `<dir>/inference.onnx`, else the
/// file stem.
fn model_stem(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    if stem == "inference" {
        if let Some(dir) = path.parent().and_then(|p| p.file_name()).and_then(|s| s.to_str()) {
            return Some(dir.to_string());
        }
    }
    Some(stem.to_string())
}

impl InferenceEngine for OrtInfer {
    fn infer(&self, x: &Tensor4D) -> OcrResult<NamedOutputs> {
        let input_shape = x.shape().to_vec();
        let input_tensor = TensorRef::from_array_view(x.view()).map_err(|e| {
            OCRError::inference_error(
                &self.model_name,
                format!("failed to convert input tensor with shape {:?}", input_shape),
                e,
            )
        })?;
        let inputs = ort::inputs![self.input_name.as_str() => input_tensor];

        let idx = self.next_idx.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        let mut session = self.sessions[idx].lock().map_err(|_| {
            OCRError::inference_error(
                &self.model_name,
                format!("session {}/{} lock poisoned", idx, self.sessions.len()),
                std::io::Error::other("session lock poisoned"),
            )
        })?;

        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        let outputs = session.run(inputs).map_err(|e| {
            OCRError::inference_error(
                &self.model_name,
                format!("forward pass failed for input {:?}", input_shape),
                e,
            )
        })?;

        let mut named = Vec::with_capacity(output_names.len());
        for name in output_names {
            let value = &outputs[name.as_str()];
            let tensor = if let Ok((shape, data)) = value.try_extract_tensor::<f32>() {
                TensorOutput::F32 {
                    shape: shape.to_vec(),
                    data: data.to_vec(),
                }
            } else {
                let (shape, data) = value.try_extract_tensor::<i64>().map_err(|e| {
                    OCRError::inference_error(
                        &self.model_name,
                        format!("output '{}' is neither f32 nor i64", name),
                        e,
                    )
                })?;
                TensorOutput::I64 {
                    shape: shape.to_vec(),
                    data: data.to_vec(),
                }
            };
            named.push((name, tensor));
        }
        Ok(named)
    }

    fn engine_info(&self) -> String {
        format!(
            "onnxruntime model={} path={} sessions={}",
            self.model_name,
            self.model_path.display(),
            self.sessions.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_stem_prefers_directory_for_inference_onnx() {
        assert_eq!(
            model_stem(Path::new("/models/PP-OCRv5_det/inference.onnx")).as_deref(),
            Some("PP-OCRv5_det")
        );
        assert_eq!(
            model_stem(Path::new("/models/slanet_plus.onnx")).as_deref(),
            Some("slanet_plus")
        );
    }

    #[test]
    fn test_missing_model_is_model_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = OrtInfer::new(dir.path().join("absent.onnx"), None).unwrap_err();
        assert!(matches!(err, OCRError::ModelLoad { .. }));
    }
}
