pub mod ml_model;
pub mod inference;

pub use ml_model::{FruitNet, ModelConfig};
pub use inference::InferenceEngine;
