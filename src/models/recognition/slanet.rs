//! SLANet table structure recognition.
//!
//! The image's long side is scaled to `max_len` and the result is padded to a
//! `max_len`×`max_len` square. The network has a box head `loc_preds` and a
//! tag head `structure_probs`; cell boxes are normalized to the source image.

use crate::core::constants::{DEFAULT_TABLE_BATCH_SIZE, DEFAULT_TABLE_MAX_LEN};
use crate::core::inference::{NamedOutputs, take_output};
use crate::core::validation::{validate_non_empty, validate_positive};
use crate::core::{
    InferenceEngine, ModelInferenceConfig, OcrResult, StagePredictor, Tensor3D, Tensor4D,
};
use crate::models::impl_stage_builder;
use crate::processors::{
    ColorOrder, NormalizeImage, TableResize, TableResult, TableStructureDecode, pack_batch,
};
use crate::utils::{DEFAULT_TABLE_DICT, read_dict};
use image::RgbImage;
use ndarray::Ix3;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration of the table stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub batch_size: usize,
    /// Length of the longer side after resizing, and of the padded square
    pub max_len: u32,
    /// Structure tags in model order, without `sos`/`eos`
    pub dictionary: Option<Vec<String>>,
    /// Reads the tags from a file when set; takes precedence over
    /// `dictionary`
    pub dictionary_path: Option<PathBuf>,
    /// Replace `<td>` by `<td></td>` in the vocabulary
    pub merge_no_span_structure: bool,
    pub color_order: ColorOrder,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_TABLE_BATCH_SIZE,
            max_len: DEFAULT_TABLE_MAX_LEN,
            dictionary: None,
            dictionary_path: None,
            merge_no_span_structure: true,
            color_order: ColorOrder::BGR,
        }
    }
}

impl TableConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> OcrResult<()> {
        validate_positive(self.batch_size, "batch_size")?;
        validate_positive(self.max_len, "max_len")?;
        if let Some(dict) = &self.dictionary {
            validate_non_empty(dict, "dictionary")?;
        }
        Ok(())
    }

    fn tags(&self) -> OcrResult<Vec<String>> {
        if let Some(path) = &self.dictionary_path {
            return read_dict(path);
        }
        Ok(self
            .dictionary
            .clone()
            .unwrap_or_else(|| DEFAULT_TABLE_DICT.clone()))
    }
}

/// SLANet table structure recognizer.
#[derive(Debug)]
pub struct SLANetModel {
    name: String,
    engine: Arc<dyn InferenceEngine>,
    batch_size: usize,
    resizer: TableResize,
    normalizer: NormalizeImage,
    decoder: TableStructureDecode,
}

impl SLANetModel {
    /// Creates the recognizer around an engine.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an invalid configuration and `ConfigError`
    /// when the dictionary file cannot be read.
    pub fn with_engine(config: TableConfig, engine: Arc<dyn InferenceEngine>) -> OcrResult<Self> {
        config.validate()?;
        let decoder = TableStructureDecode::new(config.tags()?, config.merge_no_span_structure);
        Ok(Self {
            name: "table_structure".to_string(),
            engine,
            batch_size: config.batch_size,
            resizer: TableResize::new(config.max_len)?,
            normalizer: NormalizeImage::imagenet(config.color_order)?,
            decoder,
        })
    }

    /// The decoder's tag list, `sos` first and `eos` last.
    pub fn dictionary(&self) -> &[String] {
        self.decoder.dictionary()
    }
}

impl StagePredictor for SLANetModel {
    /// Source `(width, height)` of each image.
    type Meta = Vec<(u32, u32)>;
    type Output = TableResult;

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
        let normalized: Vec<Tensor3D> = images
            .iter()
            .map(|img| self.normalizer.normalize(&self.resizer.apply(img).0))
            .collect();
        let side = self.resizer.max_len as usize;
        let tensor = pack_batch(&normalized, side, side)?;
        Ok((tensor, images.iter().map(|img| img.dimensions()).collect()))
    }

    /// Expects `loc_preds` first and `structure_probs` second. When the
    /// first output's last dimension is the tag vocabulary size and the
    /// second's is not, the two are taken in the opposite order.
    fn postprocess(
        &self,
        mut outputs: NamedOutputs,
        src_sizes: Self::Meta,
    ) -> OcrResult<Vec<TableResult>> {
        let (loc_name, loc) = take_output(&mut outputs, None, 0)?;
        let (probs_name, probs) = take_output(&mut outputs, None, 0)?;
        let vocab = self.decoder.dictionary().len() as i64;
        let ((loc_name, loc), (probs_name, probs)) = if loc.shape().last() == Some(&vocab)
            && probs.shape().last() != Some(&vocab)
        {
            ((probs_name, probs), (loc_name, loc))
        } else {
            ((loc_name, loc), (probs_name, probs))
        };

        let loc_preds = loc.into_f32_array::<Ix3>(&loc_name)?;
        let structure_probs = probs.into_f32_array::<Ix3>(&probs_name)?;
        self.decoder
            .apply(&structure_probs.view(), &loc_preds.view(), &src_sizes)
    }
}

/// Builder for [`SLANetModel`].
#[derive(Debug, Clone)]
pub struct SLANetModelBuilder {
    config: TableConfig,
    inference: ModelInferenceConfig,
}

impl_stage_builder!(SLANetModelBuilder, SLANetModel, TableConfig, None);

impl SLANetModelBuilder {
    /// Sets the resize target.
    pub fn max_len(mut self, max_len: u32) -> Self {
        self.config.max_len = max_len;
        self
    }

    /// Reads the tag dictionary from a file when the model is built.
    pub fn dictionary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.dictionary_path = Some(path.into());
        self
    }
}
