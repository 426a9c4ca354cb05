//! CRNN / SVTR text-line recognition.
//!
//! Lines are sorted by aspect ratio before batching so that each batch is
//! padded as little as possible; results are put back in caller order before
//! returning.

use crate::core::batch::AspectOrder;
use crate::core::constants::{
    DEFAULT_REC_BATCH_SIZE, DEFAULT_REC_CHARACTERS, DEFAULT_REC_IMAGE_SHAPE,
};
use crate::core::inference::{NamedOutputs, take_output};
use crate::core::timing::StageTimings;
use crate::core::traits::run_batched;
use crate::core::validation::{validate_non_empty, validate_positive};
use crate::core::{
    InferenceEngine, ModelInferenceConfig, OCRError, OcrResult, StagePredictor, Tensor3D,
    Tensor4D,
};
use crate::models::impl_stage_builder;
use crate::processors::{
    CTCLabelDecode, ColorOrder, NormalizeImage, RecResize, RecResult, pack_batch,
};
use crate::utils::{chars_to_dict, read_dict};
use image::RgbImage;
use ndarray::Ix3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Configuration of the recognition stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecConfig {
    pub batch_size: usize,
    /// Input shape `[C, H, W]`; `W` is the minimum batch width
    pub image_shape: [usize; 3],
    /// Dictionary entries in model order, without the blank
    pub character_dict: Option<Vec<String>>,
    /// Reads the dictionary from a file when set; takes precedence over
    /// `character_dict`
    pub character_dict_path: Option<PathBuf>,
    pub color_order: ColorOrder,
}

impl Default for RecConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_REC_BATCH_SIZE,
            image_shape: DEFAULT_REC_IMAGE_SHAPE,
            character_dict: None,
            character_dict_path: None,
            color_order: ColorOrder::BGR,
        }
    }
}

impl RecConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> OcrResult<()> {
        validate_positive(self.batch_size, "batch_size")?;
        if let Some(dict) = &self.character_dict {
            validate_non_empty(dict, "character_dict")?;
        }
        Ok(())
    }

    fn dictionary(&self) -> OcrResult<Vec<String>> {
        if let Some(path) = &self.character_dict_path {
            return read_dict(path);
        }
        Ok(self
            .character_dict
            .clone()
            .unwrap_or_else(|| chars_to_dict(DEFAULT_REC_CHARACTERS)))
    }
}

/// Text-line recognizer with greedy CTC decoding.
#[derive(Debug)]
pub struct CRNNModel {
    name: String,
    engine: Arc<dyn InferenceEngine>,
    batch_size: usize,
    resizer: RecResize,
    normalizer: NormalizeImage,
    decoder: CTCLabelDecode,
}

impl CRNNModel {
    /// Creates the recognizer around an engine.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an invalid configuration and `ConfigError`
    /// when the dictionary file cannot be read.
    pub fn with_engine(config: RecConfig, engine: Arc<dyn InferenceEngine>) -> OcrResult<Self> {
        config.validate()?;
        let decoder = CTCLabelDecode::new(config.dictionary()?);
        debug!("recognition decoder has {} classes", decoder.num_classes());
        Ok(Self {
            name: "text_recognition".to_string(),
            engine,
            batch_size: config.batch_size,
            resizer: RecResize::new(config.image_shape)?,
            normalizer: NormalizeImage::symmetric(config.color_order)?,
            decoder,
        })
    }

    /// The decoder's label list, blank first.
    pub fn labels(&self) -> &[String] {
        self.decoder.labels()
    }
}

impl StagePredictor for CRNNModel {
    type Meta = usize;
    type Output = RecResult;

    fn name(&self) -> &str {
        &self.name
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn engine(&self) -> &dyn InferenceEngine {
        self.engine.as_ref()
    }

    fn preprocess(&self, images: &[&RgbImage]) -> OcrResult<(Tensor4D, usize)> {
        let batch_width = self.resizer.batch_width(images);
        let normalized: Vec<Tensor3D> = images
            .par_iter()
            .map(|img| {
                self.normalizer
                    .normalize(&self.resizer.apply(img, batch_width))
            })
            .collect();
        let tensor = pack_batch(
            &normalized,
            self.resizer.img_h as usize,
            batch_width as usize,
        )?;
        Ok((tensor, images.len()))
    }

    fn postprocess(&self, mut outputs: NamedOutputs, count: usize) -> OcrResult<Vec<RecResult>> {
        let (name, tensor) = take_output(&mut outputs, None, 0)?;
        let preds = tensor.into_f32_array::<Ix3>(&name)?;
        let (batch, steps, classes) = preds.dim();
        if batch != count {
            return Err(OCRError::shape_mismatch(
                name,
                format!("[{count}, T, C]"),
                &[batch as i64, steps as i64, classes as i64],
            ));
        }
        self.decoder.apply(&preds.view())
    }

    /// Sorts the lines by aspect ratio, runs the batches, then restores
    /// caller order.
    fn run(
        &self,
        images: &[RgbImage],
        timings: &mut Vec<StageTimings>,
    ) -> OcrResult<Vec<RecResult>> {
        let order = AspectOrder::from_images(images);
        let sorted = order.permute(images);
        let results = run_batched(self, &sorted, timings)?;
        order.scatter(results)
    }
}

/// Builder for [`CRNNModel`].
#[derive(Debug, Clone)]
pub struct CRNNModelBuilder {
    config: RecConfig,
    inference: ModelInferenceConfig,
}

impl_stage_builder!(CRNNModelBuilder, CRNNModel, RecConfig, None);

impl CRNNModelBuilder {
    /// Loads the character dictionary from a file, one entry per line.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing or empty.
    pub fn character_dict_path(mut self, path: &Path) -> OcrResult<Self> {
        self.config.character_dict = Some(read_dict(path)?);
        self.config.character_dict_path = None;
        Ok(self)
    }

    /// Sets the character dictionary.
    pub fn character_dict(mut self, dict: Vec<String>) -> Self {
        self.config.character_dict = Some(dict);
        self
    }

    /// Sets the batch size.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }
}
