//! Classification models.

pub mod pp_lcnet;

pub use crate::processors::ClsResult;
pub use pp_lcnet::{ClsConfig, PPLCNetModel, PPLCNetModelBuilder};
