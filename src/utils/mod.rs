//! Utility functions for the OCR stages.
//!
//! Image loading and label dictionaries.

pub mod dict;
pub mod image;

pub use dict::{
    DEFAULT_CLS_LABELS, DEFAULT_LAYOUT_LABELS, DEFAULT_TABLE_DICT, chars_to_dict, read_dict,
};
pub use image::{load_image, load_images};
