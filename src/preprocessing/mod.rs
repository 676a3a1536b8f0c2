//! Data preprocessing
//!
//! - Label encoding of the categorical features and the target
//! - Standardization of the encoded matrix

mod encoder;
mod scaler;

pub use encoder::{CategoryEncoder, TargetEncoder};
pub use scaler::StandardScaler;
