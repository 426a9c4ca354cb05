//! Detection models: DB text detection and PicoDet layout detection.

pub mod db;
pub mod picodet;

pub use crate::processors::{LayoutBox, TextPolygon};
pub use db::{DBModel, DBModelBuilder, DetConfig};
pub use picodet::{LayoutConfig, PicoDetModel, PicoDetModelBuilder};
