//! Inference module
//!
//! Turns raw household records into adaptation categories using a loaded
//! artifact bundle, and holds the process-wide predictor used by the server.

mod engine;
mod recommendations;
mod registry;

pub use engine::{ClassProbability, Prediction, Predictor};
pub use recommendations::AdaptationCategory;
pub use registry::SharedPredictor;
