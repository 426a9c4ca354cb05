//! The stage orchestration trait.
//!
//! Every stage is a [`StagePredictor`]: it knows how to turn a slice of images
//! into one packed tensor and how to decode the engine's outputs for that
//! slice. The batching loop, engine dispatch, error wrapping and phase timing
//! live in [`run_batched`] and are shared by all stages.

use crate::core::batch::{BatchSampler, Tensor4D};
use crate::core::inference::{InferenceEngine, NamedOutputs};
use crate::core::timing::{Phase, PhaseTimer, StageTimings};
use crate::core::validation::validate_image_batch;
use crate::core::{OCRError, OcrResult};
use image::RgbImage;
use std::time::Instant;
use tracing::debug;

/// A single model stage: preprocess, engine call and decode.
pub trait StagePredictor {
    /// Per-batch data carried from preprocessing to decoding.
    type Meta;
    /// One result per input image.
    type Output;

    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Number of images packed into one engine call.
    fn batch_size(&self) -> usize;

    /// The engine running the forward pass.
    fn engine(&self) -> &dyn InferenceEngine;

    /// Resizes, normalizes and packs one batch.
    fn preprocess(&self, images: &[&RgbImage]) -> OcrResult<(Tensor4D, Self::Meta)>;

    /// Decodes the engine outputs of one batch into one result per image.
    fn postprocess(&self, outputs: NamedOutputs, meta: Self::Meta)
    -> OcrResult<Vec<Self::Output>>;

    /// Runs the stage over `images`.
    ///
    /// Results are index-aligned with `images`, and exactly one
    /// [`StageTimings`] record is appended to `timings`.
    ///
    /// # Errors
    ///
    /// Fails on invalid images, on engine errors (wrapped with the model name
    /// and batch index) and on outputs that violate the stage's layout.
    fn run(
        &self,
        images: &[RgbImage],
        timings: &mut Vec<StageTimings>,
    ) -> OcrResult<Vec<Self::Output>> {
        let refs: Vec<&RgbImage> = images.iter().collect();
        run_batched(self, &refs, timings)
    }
}

/// The shared batching loop behind [`StagePredictor::run`].
///
/// Chunks run sequentially; each chunk's results land at the chunk's global
/// offset.
pub fn run_batched<P: StagePredictor + ?Sized>(
    predictor: &P,
    images: &[&RgbImage],
    timings: &mut Vec<StageTimings>,
) -> OcrResult<Vec<P::Output>> {
    let mut timer = PhaseTimer::new();
    validate_image_batch(images, predictor.name())?;
    let sampler = BatchSampler::new(predictor.batch_size())?;

    let mut results = Vec::with_capacity(images.len());
    for (batch_idx, (offset, chunk)) in sampler.batches_with_offsets(images).enumerate() {
        let (tensor, meta) = timer.time(Phase::Preprocess, || predictor.preprocess(chunk))?;
        debug!(
            stage = predictor.name(),
            batch = batch_idx,
            shape = ?tensor.shape(),
            "dispatching batch"
        );

        let start = Instant::now();
        let outputs = predictor.engine().infer(&tensor).map_err(|e| {
            OCRError::inference_error(
                predictor.name(),
                format!(
                    "batch {} (images {}..{}, input shape {:?})",
                    batch_idx,
                    offset,
                    offset + chunk.len(),
                    tensor.shape()
                ),
                e,
            )
        })?;
        timer.add(Phase::Inference, start.elapsed());

        let decoded = timer.time(Phase::Postprocess, || predictor.postprocess(outputs, meta))?;
        if decoded.len() != chunk.len() {
            return Err(OCRError::shape_mismatch(
                format!("{} batch {}", predictor.name(), batch_idx),
                format!("{} results", chunk.len()),
                &[decoded.len() as i64],
            ));
        }
        results.extend(decoded);
    }

    timer.finish(timings);
    Ok(results)
}
