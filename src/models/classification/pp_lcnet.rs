//! PP-LCNet text-line orientation classification.
//!
//! Crops are resized to a fixed height with a capped width, normalized to
//! `[-1, 1]` and padded to the full input width. The network emits one
//! probability row per crop.

use crate::core::constants::{DEFAULT_CLS_BATCH_SIZE, DEFAULT_CLS_IMAGE_SHAPE, DEFAULT_CLS_THRESH};
use crate::core::inference::{NamedOutputs, take_output};
use crate::core::validation::{validate_non_empty, validate_positive, validate_range};
use crate::core::{
    InferenceEngine, ModelInferenceConfig, OCRError, OcrResult, StagePredictor, Tensor3D,
    Tensor4D,
};
use crate::models::impl_stage_builder;
use crate::processors::{ClsDecode, ClsResize, ClsResult, ColorOrder, NormalizeImage, pack_batch};
use crate::utils::DEFAULT_CLS_LABELS;
use image::RgbImage;
use ndarray::Ix2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration of the classification stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClsConfig {
    pub batch_size: usize,
    /// Input shape `[C, H, W]`
    pub image_shape: [usize; 3],
    /// Minimum score for a "180" prediction to request rotation
    pub threshold: f32,
    pub labels: Vec<String>,
    pub color_order: ColorOrder,
}

impl Default for ClsConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_CLS_BATCH_SIZE,
            image_shape: DEFAULT_CLS_IMAGE_SHAPE,
            threshold: DEFAULT_CLS_THRESH,
            labels: DEFAULT_CLS_LABELS.iter().map(|l| l.to_string()).collect(),
            color_order: ColorOrder::BGR,
        }
    }
}

impl ClsConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> OcrResult<()> {
        validate_positive(self.batch_size, "batch_size")?;
        validate_range(self.threshold, 0.0, 1.0, "threshold")?;
        validate_non_empty(&self.labels, "labels")?;
        Ok(())
    }
}

/// PP-LCNet orientation classifier.
#[derive(Debug)]
pub struct PPLCNetModel {
    name: String,
    engine: Arc<dyn InferenceEngine>,
    batch_size: usize,
    resizer: ClsResize,
    normalizer: NormalizeImage,
    decoder: ClsDecode,
}

impl PPLCNetModel {
    /// Creates the classifier around an engine.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the configuration is invalid.
    pub fn with_engine(config: ClsConfig, engine: Arc<dyn InferenceEngine>) -> OcrResult<Self> {
        config.validate()?;
        Ok(Self {
            name: "text_line_orientation".to_string(),
            engine,
            batch_size: config.batch_size,
            resizer: ClsResize::new(config.image_shape)?,
            normalizer: NormalizeImage::symmetric(config.color_order)?,
            decoder: ClsDecode::new(config.labels, config.threshold),
        })
    }
}

impl StagePredictor for PPLCNetModel {
    type Meta = usize;
    type Output = ClsResult;

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
        let normalized: Vec<Tensor3D> = images
            .par_iter()
            .map(|img| self.normalizer.normalize(&self.resizer.apply(img)))
            .collect();
        let tensor = pack_batch(
            &normalized,
            self.resizer.img_h as usize,
            self.resizer.img_w as usize,
        )?;
        Ok((tensor, images.len()))
    }

    fn postprocess(&self, mut outputs: NamedOutputs, count: usize) -> OcrResult<Vec<ClsResult>> {
        let (name, tensor) = take_output(&mut outputs, None, 0)?;
        let probs = tensor.into_f32_array::<Ix2>(&name)?;
        if probs.nrows() != count {
            return Err(OCRError::shape_mismatch(
                name,
                format!("[{count}, {}]", self.decoder.labels.len()),
                &[probs.nrows() as i64, probs.ncols() as i64],
            ));
        }
        self.decoder.apply(&probs.view())
    }
}

/// Builder for [`PPLCNetModel`].
#[derive(Debug, Clone)]
pub struct PPLCNetModelBuilder {
    config: ClsConfig,
    inference: ModelInferenceConfig,
}

impl_stage_builder!(PPLCNetModelBuilder, PPLCNetModel, ClsConfig, None);

impl PPLCNetModelBuilder {
    /// Sets the rotation threshold.
    pub fn threshold(mut self, threshold: f32) -> Self {
        self.config.threshold = threshold;
        self
    }

    /// Sets the batch size.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::inference::fake::{FakeEngine, output};
    use image::Rgb;

    /// Predicts "180" for crops whose first pixel is dark.
    fn orientation_engine() -> Arc<FakeEngine> {
        FakeEngine::new(|x| {
            let b = x.dim().0;
            let data: Vec<f32> = (0..b)
                .flat_map(|i| {
                    if x[[i, 0, 0, 0]] < 0.0 {
                        [0.05, 0.95]
                    } else {
                        [0.97, 0.03]
                    }
                })
                .collect();
            Ok(vec![output("softmax_0.tmp_0", &[b, 2], data)])
        })
    }

    fn crop(value: u8, w: u32) -> RgbImage {
        RgbImage::from_pixel(w, 32, Rgb([value, value, value]))
    }

    #[test]
    fn test_orientation_per_crop_across_batches() {
        let engine = orientation_engine();
        let model = PPLCNetModelBuilder::new()
            .batch_size(2)
            .build_with_engine(engine.clone())
            .unwrap();
        let crops = vec![crop(0, 100), crop(255, 40), crop(0, 400)];
        let mut timings = Vec::new();

        let out = model.run(&crops, &mut timings).unwrap();
        let labels: Vec<&str> = out.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["180", "0", "180"]);
        assert!(out[0].should_rotate());
        assert!(!out[1].should_rotate());
        assert_eq!(timings.len(), 1);
        assert_eq!(
            engine.input_shapes(),
            vec![vec![2, 3, 48, 192], vec![1, 3, 48, 192]]
        );
    }

    #[test]
    fn test_threshold_gates_rotation() {
        let model = PPLCNetModelBuilder::new()
            .threshold(0.99)
            .build_with_engine(orientation_engine())
            .unwrap();
        let out = model.run(&[crop(0, 64)], &mut Vec::new()).unwrap();
        assert_eq!(out[0].label, "180");
        assert!(!out[0].should_rotate());
    }

    #[test]
    fn test_wrong_class_count_is_shape_mismatch() {
        let engine = FakeEngine::new(|x| {
            let b = x.dim().0;
            Ok(vec![output("probs", &[b, 4], vec![0.25; b * 4])])
        });
        let model = PPLCNetModelBuilder::new().build_with_engine(engine).unwrap();
        let err = model.run(&[crop(0, 64)], &mut Vec::new()).unwrap_err();
        assert!(matches!(err, OCRError::ShapeMismatch { .. }));
    }
}
