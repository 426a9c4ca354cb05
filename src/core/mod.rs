//! The core module of the OCR stages.
//!
//! This module contains the pieces every stage is built from:
//! - Batch sampling, tensor aliases and the aspect-ratio permutation
//! - Configuration management
//! - Constants used throughout the stages
//! - Error handling and validation
//! - The inference engine seam
//! - Phase timings and the stage orchestration trait

pub mod batch;
pub mod config;
pub mod constants;
pub mod errors;
pub mod inference;
pub mod timing;
pub mod traits;
pub mod validation;

pub use batch::{AspectOrder, BatchSampler, Tensor3D, Tensor4D};
pub use config::{ConfigError, ModelInferenceConfig, OrtSessionConfig, load_config};
pub use errors::{OCRError, OcrResult};
pub use inference::{InferenceEngine, OrtInfer, TensorOutput};
pub use timing::StageTimings;
pub use traits::StagePredictor;

/// Initializes the tracing subscriber for logging.
///
/// Sets up a registry with an `EnvFilter` read from `RUST_LOG` and a fmt
/// layer. Call it once at application start.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
