use serde::{Deserialize, Serialize};

mod error;
mod backbone;
mod model;
pub mod builder;
pub mod preprocess;
mod utils;

pub use error::ClassifierError;
pub use backbone::{Backbone, OnnxBackbone};
pub use model::Classifier;
pub use builder::ClassifierBuilder;

use crate::runtime::Device;

/// Top-1 prediction for a single image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Display name of the predicted species, or `"Unknown"`
    pub class: String,
    /// Softmax probability of the predicted class, in `[0, 1]`
    pub confidence: f32,
}

/// Information about the current state and configuration of a classifier
#[derive(Debug, Clone, Serialize)]
pub struct ClassifierInfo {
    /// Path to the model file, if the backbone was loaded from one
    pub model_path: Option<String>,
    /// Number of classes in the class-to-name table
    pub num_classes: usize,
    /// Device the forward pass runs on
    pub device: String,
    /// Side of the square image the network receives
    pub input_size: u32,
}

impl ClassifierInfo {
    pub(crate) fn new(model_path: Option<String>, num_classes: usize, device: Device) -> Self {
        Self {
            model_path,
            num_classes,
            device: device.to_string(),
            input_size: preprocess::CROP_SIZE,
        }
    }
}
