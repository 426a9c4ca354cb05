//! Stage models.
//!
//! Each model owns an inference engine plus the transforms and decoder for
//! its network, and implements [`StagePredictor`](crate::core::StagePredictor).
//! Models are created through builders: `build(path)` loads an ONNX Runtime
//! engine, `build_with_engine(engine)` injects any [`InferenceEngine`].
//!
//! [`InferenceEngine`]: crate::core::InferenceEngine

/// Implements the shared builder surface for a stage model.
///
/// The builder must have `config` and `inference: ModelInferenceConfig`
/// fields, the config must have a `validate(&self) -> OcrResult<()>` method,
/// and the model must provide `with_engine(config, engine)` and a `name`
/// field.
macro_rules! impl_stage_builder {
    ($builder:ident, $model:ident, $config:ty, $input_name:expr) => {
        impl $builder {
            /// Creates a builder with default settings.
            pub fn new() -> Self {
                Self {
                    config: <$config>::default(),
                    inference: $crate::core::ModelInferenceConfig::default(),
                }
            }

            /// Replaces the stage configuration.
            pub fn config(mut self, config: $config) -> Self {
                self.config = config;
                self
            }

            /// Sets the ONNX Runtime session options.
            pub fn with_ort_config(mut self, config: $crate::core::OrtSessionConfig) -> Self {
                self.inference.ort_session = Some(config);
                self
            }

            /// Sets the number of pooled sessions.
            pub fn session_pool_size(mut self, size: usize) -> Self {
                self.inference.session_pool_size = Some(size);
                self
            }

            /// Sets the name used in logs and errors.
            pub fn model_name(mut self, name: impl Into<String>) -> Self {
                self.inference.model_name = Some(name.into());
                self
            }

            /// Loads the model with ONNX Runtime. `model_path` may be a file
            /// or a directory holding `inference.onnx`.
            pub fn build(self, model_path: &std::path::Path) -> $crate::core::OcrResult<$model> {
                self.config.validate()?;
                let engine = $crate::core::OrtInfer::from_config(
                    &self.inference,
                    model_path,
                    $input_name,
                )?;
                let name = engine.model_name().to_string();
                let mut model = $model::with_engine(self.config, std::sync::Arc::new(engine))?;
                model.name = name;
                Ok(model)
            }

            /// Builds the model around an existing engine.
            pub fn build_with_engine(
                self,
                engine: std::sync::Arc<dyn $crate::core::InferenceEngine>,
            ) -> $crate::core::OcrResult<$model> {
                let mut model = $model::with_engine(self.config, engine)?;
                if let Some(name) = self.inference.model_name {
                    model.name = name;
                }
                Ok(model)
            }
        }

        impl Default for $builder {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

pub(crate) use impl_stage_builder;

pub mod classification;
pub mod detection;
pub mod recognition;

pub use classification::*;
pub use detection::*;
pub use recognition::*;
