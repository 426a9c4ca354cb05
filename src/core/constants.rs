//! Constants used throughout the OCR stages.
//!
//! Default values for every stage's image processing parameters, thresholds
//! and batch sizes. The stage configs use these in their `Default` impls.

/// ImageNet mean, used by detection, table and layout models.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet standard deviation, used by detection, table and layout models.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Symmetric mean used by recognition and classification models.
pub const HALF_MEAN: [f32; 3] = [0.5, 0.5, 0.5];

/// Symmetric std used by recognition and classification models.
pub const HALF_STD: [f32; 3] = [0.5, 0.5, 0.5];

/// The default limit for the side length of detection inputs.
pub const DEFAULT_LIMIT_SIDE_LEN: u32 = 960;

/// Detection input sides are rounded to a multiple of this value.
pub const DET_SIZE_DIVISOR: u32 = 32;

/// The default maximum side limit for detection inputs.
///
/// Applied after the limit-type scaling; a `min` policy on a very elongated
/// image can otherwise produce a huge tensor.
pub const DEFAULT_MAX_SIDE_LIMIT: u32 = 4000;

/// Default binarization threshold of the DB decoder.
pub const DEFAULT_DET_THRESH: f32 = 0.3;

/// Default minimum region score of the DB decoder.
pub const DEFAULT_DET_BOX_THRESH: f32 = 0.6;

/// Default unclip ratio of the DB decoder.
pub const DEFAULT_UNCLIP_RATIO: f32 = 1.5;

/// Maximum number of contours traced per probability map.
pub const DEFAULT_MAX_CANDIDATES: usize = 1000;

/// Minimum short side, in map pixels, of a candidate box.
pub const DEFAULT_MIN_SIZE: f32 = 3.0;

/// Polygons whose top edge or left edge is not longer than this are dropped.
pub const DEFAULT_MIN_POLYGON_SIDE: i32 = 4;

/// The default shape (channels, height, width) for recognition inputs.
pub const DEFAULT_REC_IMAGE_SHAPE: [usize; 3] = [3, 48, 320];

/// The default batch size for recognition.
pub const DEFAULT_REC_BATCH_SIZE: usize = 6;

/// Characters used when no recognition dictionary is supplied.
pub const DEFAULT_REC_CHARACTERS: &str = "0123456789abcdefghijklmnopqrstuvwxyz";

/// The default shape (channels, height, width) for classification inputs.
pub const DEFAULT_CLS_IMAGE_SHAPE: [usize; 3] = [3, 48, 192];

/// The default batch size for classification.
pub const DEFAULT_CLS_BATCH_SIZE: usize = 6;

/// Minimum confidence before a "180" prediction triggers a rotation.
pub const DEFAULT_CLS_THRESH: f32 = 0.9;

/// The default length of the longer table side after resizing.
pub const DEFAULT_TABLE_MAX_LEN: u32 = 488;

/// The default batch size for table structure recognition.
pub const DEFAULT_TABLE_BATCH_SIZE: usize = 1;

/// The default input size (height, width) for layout detection.
pub const DEFAULT_LAYOUT_INPUT_SHAPE: (u32, u32) = (800, 608);

/// The default FPN strides of PicoDet heads.
pub const DEFAULT_FPN_STRIDES: [u32; 4] = [8, 16, 32, 64];

/// Default score threshold of the layout decoder.
pub const DEFAULT_LAYOUT_SCORE_THRESHOLD: f32 = 0.5;

/// Default IoU threshold of the layout NMS.
pub const DEFAULT_LAYOUT_NMS_THRESHOLD: f32 = 0.5;

/// The default batch size for layout detection.
pub const DEFAULT_LAYOUT_BATCH_SIZE: usize = 1;

/// The default threshold for parallel processing.
///
/// Per-image work inside a batch is only handed to rayon when the batch has
/// at least this many images.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 4;

/// File name looked up when a model path is a directory.
pub const DEFAULT_MODEL_FILE: &str = "inference.onnx";
