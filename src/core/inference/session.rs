//! Helpers for working directly with ONNX Runtime sessions.

use crate::core::config::{OrtExecutionProvider, OrtGraphOptimizationLevel, OrtSessionConfig};
use crate::core::constants::DEFAULT_MODEL_FILE;
use crate::core::{OCRError, OcrResult};
use ort::execution_providers::ExecutionProviderDispatch;
use ort::logging::LogLevel;
use ort::session::Session;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use std::path::{Path, PathBuf};

const SESSION_CREATION_FAILURE: &str = "failed to create ONNX session";

/// Resolves a model path: a directory stands for `<dir>/inference.onnx`.
///
/// # Errors
///
/// Returns `ModelLoad` when neither the path nor the resolved file exists.
pub fn resolve_model_file(model_path: &Path) -> OcrResult<PathBuf> {
    let resolved = if model_path.is_dir() {
        model_path.join(DEFAULT_MODEL_FILE)
    } else {
        model_path.to_path_buf()
    };
    if !resolved.is_file() {
        return Err(OCRError::model_load_error(
            &resolved,
            "model file not found",
            Some("pass an .onnx file or a directory containing inference.onnx"),
            None::<std::io::Error>,
        ));
    }
    Ok(resolved)
}

/// Builds a session using a caller-provided builder configuration.
pub(crate) fn load_session_with<F>(
    model_path: impl AsRef<Path>,
    configure_builder: F,
    suggestion: Option<&str>,
) -> OcrResult<Session>
where
    F: FnOnce(SessionBuilder) -> Result<SessionBuilder, ort::Error>,
{
    let path = model_path.as_ref();
    let builder = Session::builder()?;
    let builder = configure_builder(builder)?;
    let session = builder.commit_from_file(path).map_err(|e| {
        OCRError::model_load_error(path, SESSION_CREATION_FAILURE, suggestion, Some(e))
    })?;
    Ok(session)
}

/// Applies [`OrtSessionConfig`] options to a session builder.
pub(crate) fn apply_ort_config(
    mut builder: SessionBuilder,
    cfg: &OrtSessionConfig,
) -> Result<SessionBuilder, ort::Error> {
    builder = builder.with_log_level(LogLevel::Error)?;
    if let Some(intra) = cfg.intra_threads {
        builder = builder.with_intra_threads(intra)?;
    }
    if let Some(inter) = cfg.inter_threads {
        builder = builder.with_inter_threads(inter)?;
    }
    if let Some(par) = cfg.parallel_execution {
        builder = builder.with_parallel_execution(par)?;
    }
    if let Some(level) = cfg.optimization_level {
        let mapped = match level {
            OrtGraphOptimizationLevel::DisableAll => GraphOptimizationLevel::Disable,
            OrtGraphOptimizationLevel::Level1 => GraphOptimizationLevel::Level1,
            OrtGraphOptimizationLevel::Level2 => GraphOptimizationLevel::Level2,
            OrtGraphOptimizationLevel::Level3 => GraphOptimizationLevel::Level3,
        };
        builder = builder.with_optimization_level(mapped)?;
    }
    if let Some(eps) = &cfg.execution_providers {
        let providers = build_execution_providers(eps);
        if !providers.is_empty() {
            builder = builder.with_execution_providers(providers)?;
        }
    }
    Ok(builder)
}

fn build_execution_providers(eps: &[OrtExecutionProvider]) -> Vec<ExecutionProviderDispatch> {
    let mut providers = Vec::new();
    for ep in eps {
        match ep {
            OrtExecutionProvider::CPU => {
                providers.push(ort::execution_providers::CPUExecutionProvider::default().build());
            }
            #[cfg(feature = "cuda")]
            OrtExecutionProvider::CUDA { device_id } => {
                let mut cuda = ort::execution_providers::CUDAExecutionProvider::default();
                if let Some(id) = device_id {
                    cuda = cuda.with_device_id(*id);
                }
                providers.push(cuda.build());
            }
            #[cfg(not(feature = "cuda"))]
            OrtExecutionProvider::CUDA { .. } => {
                tracing::warn!("CUDA execution provider requested without the `cuda` feature; skipping");
            }
        }
    }
    providers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_model_file_directory() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join(DEFAULT_MODEL_FILE);
        std::fs::write(&model, b"onnx").unwrap();

        assert_eq!(resolve_model_file(dir.path()).unwrap(), model);
        assert_eq!(resolve_model_file(&model).unwrap(), model);
    }

    #[test]
    fn test_resolve_model_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_model_file(dir.path()).unwrap_err();
        assert!(matches!(err, OCRError::ModelLoad { .. }));
    }

    #[test]
    fn test_cpu_provider_is_built() {
        let providers = build_execution_providers(&[OrtExecutionProvider::CPU]);
        assert_eq!(providers.len(), 1);
    }
}
