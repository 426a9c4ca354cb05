//! # OCR Stages
//!
//! Batched preprocessing, inference dispatch and decoding for PaddleOCR-style
//! ONNX models. Each stage wraps one network and turns a list of images into
//! one structured result per image.
//!
//! ## Stages
//!
//! - **Text Detection** (DB): probability map to text polygons
//! - **Text Line Classification** (PP-LCNet): 0° / 180° orientation
//! - **Text Recognition** (CRNN/SVTR): greedy CTC decoding to strings
//! - **Layout Detection** (PicoDet): labelled layout boxes
//! - **Table Structure Recognition** (SLANet): HTML tags and cell boxes
//!
//! ## Modules
//!
//! * [`core`] - Errors, configuration, inference engine seam, batching and timings
//! * [`processors`] - Resize, normalization, batch packing and the decoders
//! * [`models`] - One orchestrator per stage
//! * [`utils`] - Dictionary and image loading helpers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ocr_stages::prelude::*;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let detector = DBModelBuilder::new().build(Path::new("models/det"))?;
//! let recognizer = CRNNModelBuilder::new()
//!     .character_dict_path(Path::new("models/ppocr_keys_v1.txt"))?
//!     .build(Path::new("models/rec"))?;
//!
//! let image = load_image(Path::new("document.jpg"))?;
//! let mut timings = Vec::new();
//! let polygons = detector.run(std::slice::from_ref(&image), &mut timings)?;
//! println!("{} text regions", polygons[0].len());
//!
//! let texts = recognizer.run(&[image], &mut timings)?;
//! println!("{:?}", texts[0]);
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod models;
pub mod processors;
pub mod utils;

/// Prelude module for convenient imports.
///
/// ```rust
/// use ocr_stages::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::traits::StagePredictor;
    pub use crate::core::{OCRError, OcrResult, StageTimings};

    pub use crate::models::classification::{ClsResult, PPLCNetModel, PPLCNetModelBuilder};
    pub use crate::models::detection::{
        DBModel, DBModelBuilder, LayoutBox, PicoDetModel, PicoDetModelBuilder, TextPolygon,
    };
    pub use crate::models::recognition::{
        CRNNModel, CRNNModelBuilder, RecResult, SLANetModel, SLANetModelBuilder, TableResult,
    };

    pub use crate::utils::{load_image, load_images};
}
