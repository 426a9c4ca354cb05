//! DB (Differentiable Binarization) text detection.
//!
//! Every image is resized on its own so that both sides are multiples of 32,
//! which means two images rarely share a tensor shape. The stage therefore
//! always dispatches one image per engine call.

use crate::core::constants::{
    DEFAULT_DET_BOX_THRESH, DEFAULT_DET_THRESH, DEFAULT_LIMIT_SIDE_LEN, DEFAULT_MAX_CANDIDATES,
    DEFAULT_MAX_SIDE_LIMIT, DEFAULT_MIN_SIZE, DEFAULT_UNCLIP_RATIO,
};
use crate::core::inference::{NamedOutputs, take_output};
use crate::core::validation::{validate_positive, validate_range};
use crate::core::{
    InferenceEngine, ModelInferenceConfig, OcrResult, StagePredictor, Tensor3D, Tensor4D,
};
use crate::models::impl_stage_builder;
use crate::processors::{
    ColorOrder, DBPostProcess, DetResize, LimitType, NormalizeImage, ResizeMeta, ScoreMode,
    TextPolygon, pack_batch,
};
use image::RgbImage;
use ndarray::Ix4;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration of the detection stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetConfig {
    /// Target length of the limited side
    pub limit_side_len: u32,
    pub limit_type: LimitType,
    /// Hard cap on either side after scaling
    pub max_side_limit: u32,
    /// Pixel-level binarization threshold
    pub thresh: f32,
    /// Minimum mean probability of a kept region
    pub box_thresh: f32,
    /// Outward offset factor of each region
    pub unclip_ratio: f32,
    /// Maximum number of contours examined per image
    pub max_candidates: usize,
    /// Minimum short side of a candidate, in map pixels
    pub min_size: f32,
    pub score_mode: ScoreMode,
    pub use_dilation: bool,
    pub color_order: ColorOrder,
}

impl Default for DetConfig {
    fn default() -> Self {
        Self {
            limit_side_len: DEFAULT_LIMIT_SIDE_LEN,
            limit_type: LimitType::Max,
            max_side_limit: DEFAULT_MAX_SIDE_LIMIT,
            thresh: DEFAULT_DET_THRESH,
            box_thresh: DEFAULT_DET_BOX_THRESH,
            unclip_ratio: DEFAULT_UNCLIP_RATIO,
            max_candidates: DEFAULT_MAX_CANDIDATES,
            min_size: DEFAULT_MIN_SIZE,
            score_mode: ScoreMode::Slow,
            use_dilation: false,
            color_order: ColorOrder::BGR,
        }
    }
}

impl DetConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> OcrResult<()> {
        validate_range(self.thresh, 0.0, 1.0, "thresh")?;
        validate_range(self.box_thresh, 0.0, 1.0, "box_thresh")?;
        validate_positive(self.unclip_ratio, "unclip_ratio")?;
        validate_positive(self.max_candidates, "max_candidates")?;
        validate_positive(self.min_size, "min_size")?;
        validate_positive(self.limit_side_len, "limit_side_len")?;
        validate_positive(self.max_side_limit, "max_side_limit")?;
        Ok(())
    }

    fn postprocessor(&self) -> DBPostProcess {
        DBPostProcess {
            thresh: self.thresh,
            box_thresh: self.box_thresh,
            max_candidates: self.max_candidates,
            unclip_ratio: self.unclip_ratio,
            min_size: self.min_size,
            score_mode: self.score_mode,
            use_dilation: self.use_dilation,
        }
    }
}

/// DB text detector.
#[derive(Debug)]
pub struct DBModel {
    name: String,
    engine: Arc<dyn InferenceEngine>,
    resizer: DetResize,
    normalizer: NormalizeImage,
    postprocessor: DBPostProcess,
}

impl DBModel {
    /// Creates the detector around an engine.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the configuration is invalid.
    pub fn with_engine(config: DetConfig, engine: Arc<dyn InferenceEngine>) -> OcrResult<Self> {
        config.validate()?;
        Ok(Self {
            name: "text_detection".to_string(),
            engine,
            resizer: DetResize::new(
                config.limit_side_len,
                config.limit_type,
                config.max_side_limit,
            )?,
            normalizer: NormalizeImage::imagenet(config.color_order)?,
            postprocessor: config.postprocessor(),
        })
    }

    /// The decoder settings in use.
    pub fn postprocessor(&self) -> &DBPostProcess {
        &self.postprocessor
    }
}

impl StagePredictor for DBModel {
    type Meta = Vec<ResizeMeta>;
    type Output = Vec<TextPolygon>;

    fn name(&self) -> &str {
        &self.name
    }

    fn batch_size(&self) -> usize {
        1
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

        let height = normalized.iter().map(|t| t.dim().1).max().unwrap_or(0);
        let width = normalized.iter().map(|t| t.dim().2).max().unwrap_or(0);
        Ok((pack_batch(&normalized, height, width)?, metas))
    }

    fn postprocess(
        &self,
        mut outputs: NamedOutputs,
        metas: Self::Meta,
    ) -> OcrResult<Vec<Self::Output>> {
        let (name, tensor) = take_output(&mut outputs, None, 0)?;
        let maps = tensor.into_f32_array::<Ix4>(&name)?;
        self.postprocessor.apply(&maps.view(), &metas)
    }
}

/// Builder for [`DBModel`].
#[derive(Debug, Clone)]
pub struct DBModelBuilder {
    config: DetConfig,
    inference: ModelInferenceConfig,
}

impl_stage_builder!(DBModelBuilder, DBModel, DetConfig, None);

impl DBModelBuilder {
    /// Sets the binarization and box thresholds.
    pub fn thresholds(mut self, thresh: f32, box_thresh: f32) -> Self {
        self.config.thresh = thresh;
        self.config.box_thresh = box_thresh;
        self
    }

    /// Sets the unclip ratio.
    pub fn unclip_ratio(mut self, ratio: f32) -> Self {
        self.config.unclip_ratio = ratio;
        self
    }

    /// Sets the side limit policy.
    pub fn limit(mut self, limit_type: LimitType, limit_side_len: u32) -> Self {
        self.config.limit_type = limit_type;
        self.config.limit_side_len = limit_side_len;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OCRError;
    use crate::core::inference::fake::{FakeEngine, output};
    use image::Rgb;

    /// Answers every call with a probability map holding a 0.9 square over
    /// map pixels `lo..hi` on both axes.
    fn square_engine(lo: usize, hi: usize) -> Arc<FakeEngine> {
        FakeEngine::new(move |x| {
            let (b, _, h, w) = x.dim();
            let mut data = vec![0.0; b * h * w];
            for i in 0..b {
                for y in lo..hi.min(h) {
                    for xx in lo..hi.min(w) {
                        data[i * h * w + y * w + xx] = 0.9;
                    }
                }
            }
            Ok(vec![output("sigmoid_0.tmp_0", &[b, 1, h, w], data)])
        })
    }

    fn page(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([255, 255, 255]))
    }

    #[test]
    fn test_one_call_per_image() {
        let engine = square_engine(30, 66);
        let model = DBModelBuilder::new()
            .build_with_engine(engine.clone())
            .unwrap();
        let mut timings = Vec::new();

        let out = model
            .run(&[page(100, 100), page(200, 60)], &mut timings)
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(timings.len(), 1);
        assert_eq!(
            engine.input_shapes(),
            vec![vec![1, 3, 96, 96], vec![1, 3, 64, 192]]
        );
    }

    #[test]
    fn test_square_maps_back_to_source_pixels() {
        let model = DBModelBuilder::new()
            .build_with_engine(square_engine(30, 66))
            .unwrap();
        let out = model.run(&[page(100, 100)], &mut Vec::new()).unwrap();

        assert_eq!(out[0].len(), 1);
        let polygon = &out[0][0];
        assert!(polygon.score > 0.85);
        for &(x, y) in &polygon.points {
            assert!((0..100).contains(&x));
            assert!((0..100).contains(&y));
        }
        // The square spans 36 map pixels at ratio 0.96 and is unclipped outward.
        assert!(polygon.width() > 36.0);
    }

    #[test]
    fn test_blank_map_yields_no_polygons() {
        let model = DBModelBuilder::new()
            .build_with_engine(square_engine(0, 0))
            .unwrap();
        let out = model.run(&[page(64, 64)], &mut Vec::new()).unwrap();
        assert_eq!(out, vec![Vec::<TextPolygon>::new()]);
    }

    #[test]
    fn test_multi_channel_map_is_shape_mismatch() {
        let engine = FakeEngine::new(|x| {
            let (b, _, h, w) = x.dim();
            Ok(vec![output("maps", &[b, 2, h, w], vec![0.0; b * 2 * h * w])])
        });
        let model = DBModelBuilder::new().build_with_engine(engine).unwrap();
        let err = model.run(&[page(32, 32)], &mut Vec::new()).unwrap_err();
        assert!(matches!(err, OCRError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_engine_error_is_wrapped() {
        let model = DBModelBuilder::new()
            .model_name("det")
            .build_with_engine(FakeEngine::failing())
            .unwrap();
        let err = model.run(&[page(32, 32)], &mut Vec::new()).unwrap_err();
        assert!(matches!(err, OCRError::Inference { ref model_name, .. } if model_name == "det"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = DBModelBuilder::new()
            .thresholds(1.5, 0.6)
            .build_with_engine(FakeEngine::failing());
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_session_options_rejected_before_loading() {
        let dir = tempfile::tempdir().unwrap();
        let result = DBModelBuilder::new()
            .with_ort_config(crate::core::OrtSessionConfig::new().with_intra_threads(0))
            .build(dir.path());
        assert!(matches!(result, Err(OCRError::ConfigError { .. })));
    }

    #[test]
    fn test_config_from_partial_json() {
        let cfg: DetConfig =
            serde_json::from_str(r#"{"unclip_ratio": 2.0, "limit_type": "min"}"#).unwrap();
        assert_eq!(cfg.unclip_ratio, 2.0);
        assert_eq!(cfg.limit_type, LimitType::Min);
        assert_eq!(cfg.thresh, DEFAULT_DET_THRESH);
    }
}
