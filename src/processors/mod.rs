//! Image transforms and output decoders for the OCR stages.
//!
//! # Modules
//!
//! * `geometry` - Points, polygons, minimum-area rectangles and unclipping
//! * `normalization` - Per-channel normalization and batch packing
//! * `resize_detection` - Bounded-side resizing for detection
//! * `resize_recognition` - Fixed-height resizing for recognition and classification
//! * `resize_fixed` - Long-side and exact resizing for table and layout models
//! * `db_postprocess` - DB probability map to text polygons
//! * `ctc_decode` - Greedy CTC decoding
//! * `cls_decode` - Orientation classifier decoding
//! * `table_structure_decode` - Table tag sequence and cell box decoding
//! * `layout_postprocess` - PicoDet box decoding and NMS
//! * `types` - Policy enums and the per-image resize record
//! * `argmax` - First-maximum index of a score row

pub mod argmax;
pub mod cls_decode;
pub mod ctc_decode;
pub mod db_postprocess;
pub mod geometry;
pub mod layout_postprocess;
pub mod normalization;
pub mod resize_detection;
pub mod resize_fixed;
pub mod resize_recognition;
pub mod table_structure_decode;
pub mod types;

pub use cls_decode::{ClsDecode, ClsResult};
pub use ctc_decode::{CTCLabelDecode, RecResult};
pub use db_postprocess::{DBPostProcess, TextPolygon};
pub use geometry::{BoundingBox, MinAreaRect, Point};
pub use layout_postprocess::{LayoutBox, PicoDetPostProcess};
pub use normalization::{NormalizeImage, pack_batch};
pub use resize_detection::DetResize;
pub use resize_fixed::{ExactResize, TableResize};
pub use resize_recognition::{ClsResize, RecResize};
pub use table_structure_decode::{TableResult, TableStructureDecode};
pub use types::{ColorOrder, LimitType, ResizeMeta, ScoreMode};
