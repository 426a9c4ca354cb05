//! The inference engine seam and its ONNX Runtime implementation.
//!
//! Stages only see [`InferenceEngine`]: a named-input, named-outputs contract
//! over a `[B, 3, H, W]` f32 tensor. [`OrtInfer`] is the production engine;
//! tests drive the stages with a scripted engine instead.

pub mod ort_infer;
pub mod session;
pub mod tensor_output;

pub use ort_infer::OrtInfer;
pub use session::resolve_model_file;
pub use tensor_output::{NamedOutputs, TensorOutput, take_output};

use crate::core::OcrResult;
use crate::core::batch::Tensor4D;
use std::sync::Arc;

/// Runs a model's forward pass.
///
/// Implementations must be usable from several threads at once; loading
/// happens in the implementation's constructor.
pub trait InferenceEngine: Send + Sync + std::fmt::Debug {
    /// Runs the model on one packed batch and returns its outputs in model
    /// order.
    fn infer(&self, input: &Tensor4D) -> OcrResult<NamedOutputs>;

    /// Short human readable description of the engine and model.
    fn engine_info(&self) -> String;
}

impl<T: InferenceEngine + ?Sized> InferenceEngine for Arc<T> {
    fn infer(&self, input: &Tensor4D) -> OcrResult<NamedOutputs> {
        (**self).infer(input)
    }

    fn engine_info(&self) -> String {
        (**self).engine_info()
    }
}

impl<T: InferenceEngine + ?Sized> InferenceEngine for Box<T> {
    fn infer(&self, input: &Tensor4D) -> OcrResult<NamedOutputs> {
        (**self).infer(input)
    }

    fn engine_info(&self) -> String {
        (**self).engine_info()
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use crate::core::OCRError;
    use std::sync::Mutex;

    type Responder = Box<dyn Fn(&Tensor4D) -> OcrResult<NamedOutputs> + Send + Sync>;

    /// Scripted engine: answers every call through a closure and records the
    /// input shapes it was given.
    pub struct FakeEngine {
        responder: Responder,
        calls: Mutex<Vec<Vec<usize>>>,
    }

    impl std::fmt::Debug for FakeEngine {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("FakeEngine").finish_non_exhaustive()
        }
    }

    impl FakeEngine {
        pub fn new(
            responder: impl Fn(&Tensor4D) -> OcrResult<NamedOutputs> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                responder: Box::new(responder),
                calls: Mutex::new(Vec::new()),
            })
        }

        /// An engine whose every call fails.
        pub fn failing() -> Arc<Self> {
            Self::new(|_| Err(OCRError::invalid_input("engine exploded")))
        }

        pub fn input_shapes(&self) -> Vec<Vec<usize>> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl InferenceEngine for FakeEngine {
        fn infer(&self, input: &Tensor4D) -> OcrResult<NamedOutputs> {
            self.calls.lock().unwrap().push(input.shape().to_vec());
            (self.responder)(input)
        }

        fn engine_info(&self) -> String {
            "fake".to_string()
        }
    }

    /// Shorthand for a single named f32 output.
    pub fn output(name: &str, shape: &[usize], data: Vec<f32>) -> (String, TensorOutput) {
        (
            name.to_string(),
            TensorOutput::f32(
                shape.iter().map(|&d| d as i64).collect::<Vec<_>>(),
                data,
            ),
        )
    }
}
