//! PicoDet layout detection.
//!
//! The network takes a fixed 800×608 input. Its outputs are one score tensor
//! per FPN stride followed by one box-distribution tensor per stride, in that
//! order.

use crate::core::constants::{
    DEFAULT_FPN_STRIDES, DEFAULT_LAYOUT_BATCH_SIZE, DEFAULT_LAYOUT_INPUT_SHAPE,
    DEFAULT_LAYOUT_NMS_THRESHOLD, DEFAULT_LAYOUT_SCORE_THRESHOLD,
};
use crate::core::inference::NamedOutputs;
use crate::core::validation::{validate_non_empty, validate_positive, validate_range};
use crate::core::{
    InferenceEngine, ModelInferenceConfig, OcrResult, StagePredictor, Tensor3D, Tensor4D,
};
use crate::models::impl_stage_builder;
use crate::processors::{
    ColorOrder, ExactResize, LayoutBox, NormalizeImage, PicoDetPostProcess, ResizeMeta, pack_batch,
};
use crate::utils::{DEFAULT_LAYOUT_LABELS, read_dict};
use image::RgbImage;
use ndarray::{Array3, ArrayView3, Ix3};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration of the layout stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub batch_size: usize,
    /// Network input `(height, width)`
    pub input_shape: (u32, u32),
    pub fpn_strides: Vec<usize>,
    pub score_threshold: f32,
    pub nms_threshold: f32,
    /// Class names in model order
    pub labels: Vec<String>,
    /// Reads `labels` from a file, one name per line, when set
    pub label_dict_path: Option<PathBuf>,
    pub color_order: ColorOrder,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_LAYOUT_BATCH_SIZE,
            input_shape: DEFAULT_LAYOUT_INPUT_SHAPE,
            fpn_strides: DEFAULT_FPN_STRIDES.iter().map(|&s| s as usize).collect(),
            score_threshold: DEFAULT_LAYOUT_SCORE_THRESHOLD,
            nms_threshold: DEFAULT_LAYOUT_NMS_THRESHOLD,
            labels: DEFAULT_LAYOUT_LABELS.iter().map(|l| l.to_string()).collect(),
            label_dict_path: None,
            color_order: ColorOrder::BGR,
        }
    }
}

impl LayoutConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> OcrResult<()> {
        validate_positive(self.batch_size, "batch_size")?;
        validate_positive(self.input_shape.0, "input_shape.height")?;
        validate_positive(self.input_shape.1, "input_shape.width")?;
        validate_non_empty(&self.fpn_strides, "fpn_strides")?;
        for &stride in &self.fpn_strides {
            validate_positive(stride, "fpn_strides")?;
        }
        validate_range(self.score_threshold, 0.0, 1.0, "score_threshold")?;
        validate_range(self.nms_threshold, 0.0, 1.0, "nms_threshold")?;
        if self.label_dict_path.is_none() {
            validate_non_empty(&self.labels, "labels")?;
        }
        Ok(())
    }
}

/// PicoDet layout detector.
#[derive(Debug)]
pub struct PicoDetModel {
    name: String,
    engine: Arc<dyn InferenceEngine>,
    batch_size: usize,
    resizer: ExactResize,
    normalizer: NormalizeImage,
    postprocessor: PicoDetPostProcess,
}

impl PicoDetModel {
    /// Creates the detector around an engine.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an invalid configuration and `ConfigError`
    /// when the label file cannot be read.
    pub fn with_engine(config: LayoutConfig, engine: Arc<dyn InferenceEngine>) -> OcrResult<Self> {
        config.validate()?;
        let labels = match &config.label_dict_path {
            Some(path) => read_dict(path)?,
            None => config.labels,
        };
        let (height, width) = config.input_shape;
        Ok(Self {
            name: "layout_detection".to_string(),
            engine,
            batch_size: config.batch_size,
            resizer: ExactResize::new(height, width)?,
            normalizer: NormalizeImage::imagenet(config.color_order)?,
            postprocessor: PicoDetPostProcess {
                labels,
                fpn_strides: config.fpn_strides,
                score_threshold: config.score_threshold,
                nms_threshold: config.nms_threshold,
            },
        })
    }

    /// Class names in model order.
    pub fn labels(&self) -> &[String] {
        &self.postprocessor.labels
    }
}

impl StagePredictor for PicoDetModel {
    type Meta = Vec<ResizeMeta>;
    type Output = Vec<LayoutBox>;

    fn name(&self) -> &str {
        &self.name
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn engine(&self) -> &dyn InferenceEngine {
        self.engine.as_ref()
    }

    fn preprocess(&self, images: &[&RgbImage]) -> OcrResult<(Tensor4D, Self::Meta)> {
        let (normalized, metas): (Vec<Tensor3D>, Vec<ResizeMeta>) = images
            .iter()
            .map(|img| {
                let (resized, meta) = self.resizer.apply(img);
                (self.normalizer.normalize(&resized), meta)
            })
            .unzip();
        let tensor = pack_batch(
            &normalized,
            self.resizer.height as usize,
            self.resizer.width as usize,
        )?;
        Ok((tensor, metas))
    }

    fn postprocess(&self, outputs: NamedOutputs, metas: Self::Meta) -> OcrResult<Vec<Self::Output>> {
        let arrays = outputs
            .into_iter()
            .map(|(name, tensor)| tensor.into_f32_array::<Ix3>(&name))
            .collect::<OcrResult<Vec<Array3<f32>>>>()?;
        let views: Vec<ArrayView3<f32>> = arrays.iter().map(|a| a.view()).collect();
        let input_size = (self.resizer.height as usize, self.resizer.width as usize);
        self.postprocessor.apply(&views, input_size, &metas)
    }
}

/// Builder for [`PicoDetModel`].
#[derive(Debug, Clone)]
pub struct PicoDetModelBuilder {
    config: LayoutConfig,
    inference: ModelInferenceConfig,
}

impl_stage_builder!(PicoDetModelBuilder, PicoDetModel, LayoutConfig, None);

impl PicoDetModelBuilder {
    /// Sets the class names.
    pub fn labels(mut self, labels: Vec<String>) -> Self {
        self.config.labels = labels;
        self
    }

    /// Sets the score and NMS thresholds.
    pub fn thresholds(mut self, score_threshold: f32, nms_threshold: f32) -> Self {
        self.config.score_threshold = score_threshold;
        self.config.nms_threshold = nms_threshold;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OCRError;
    use crate::core::inference::fake::{FakeEngine, output};

    const REG_MAX: usize = 8;

    /// A 64×64 single-stride model: 4 cells of 32 px.
    fn small_config() -> LayoutConfig {
        LayoutConfig {
            batch_size: 2,
            input_shape: (64, 64),
            fpn_strides: vec![32],
            ..Default::default()
        }
    }

    /// Cell 0 predicts "table" at 0.9 with every side one stride long.
    fn table_engine() -> Arc<FakeEngine> {
        FakeEngine::new(|x| {
            let b = x.dim().0;
            let (cells, classes) = (4, DEFAULT_LAYOUT_LABELS.len());
            let mut scores = vec![0.0; b * cells * classes];
            let mut boxes = vec![0.0; b * cells * 4 * REG_MAX];
            for i in 0..b {
                scores[i * cells * classes + 3] = 0.9;
                for side in 0..4 {
                    boxes[i * cells * 4 * REG_MAX + side * REG_MAX + 1] = 100.0;
                }
            }
            Ok(vec![
                output("scores", &[b, cells, classes], scores),
                output("boxes", &[b, cells, 4 * REG_MAX], boxes),
            ])
        })
    }

    #[test]
    fn test_layout_boxes_in_source_pixels() {
        let engine = table_engine();
        let model = PicoDetModelBuilder::new()
            .config(small_config())
            .build_with_engine(engine.clone())
            .unwrap();
        let images = vec![RgbImage::new(128, 128); 3];
        let mut timings = Vec::new();

        let out = model.run(&images, &mut timings).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(timings.len(), 1);
        assert_eq!(
            engine.input_shapes(),
            vec![vec![2, 3, 64, 64], vec![1, 3, 64, 64]]
        );

        for boxes in &out {
            assert_eq!(boxes.len(), 1);
            assert_eq!(boxes[0].label, "table");
            let expected = [0.0, 0.0, 96.0, 96.0];
            for (got, want) in boxes[0].bbox.iter().zip(expected) {
                assert!((got - want).abs() < 1e-3, "{:?}", boxes[0].bbox);
            }
        }
    }

    #[test]
    fn test_missing_box_outputs_is_shape_mismatch() {
        let engine = FakeEngine::new(|x| {
            let b = x.dim().0;
            Ok(vec![output("scores", &[b, 4, 5], vec![0.0; b * 20])])
        });
        let model = PicoDetModelBuilder::new()
            .config(small_config())
            .build_with_engine(engine)
            .unwrap();
        let err = model
            .run(&[RgbImage::new(10, 10)], &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, OCRError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_labels_from_dict_file() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "text\ntitle").unwrap();
        let config = LayoutConfig {
            label_dict_path: Some(file.path().to_path_buf()),
            ..small_config()
        };
        let model = PicoDetModel::with_engine(config, table_engine()).unwrap();
        assert_eq!(model.labels(), ["text", "title"]);
    }

    #[test]
    fn test_default_config() {
        let cfg = LayoutConfig::default();
        assert_eq!(cfg.input_shape, (800, 608));
        assert_eq!(cfg.fpn_strides, vec![8, 16, 32, 64]);
        assert!(cfg.validate().is_ok());
    }
}
