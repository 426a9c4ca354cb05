//! Recognition models: CRNN text lines and SLANet table structure.

pub mod crnn;
pub mod slanet;

pub use crate::processors::{RecResult, TableResult};
pub use crnn::{CRNNModel, CRNNModelBuilder, RecConfig};
pub use slanet::{SLANetModel, SLANetModelBuilder, TableConfig};
