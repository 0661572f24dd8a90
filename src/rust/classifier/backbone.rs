use std::collections::HashMap;
use std::fmt::Debug;
use std::path::Path;

use log::info;
use ndarray::{Array1, Array4};
use ort::session::Session;
use ort::value::{Tensor, ValueType};

use super::error::ClassifierError;
use crate::runtime::{create_session_builder, Device, RuntimeConfig};

/// The network that turns a preprocessed image batch into raw class scores.
///
/// Implementations must be read-only once built: a single instance serves every request
/// concurrently.
pub trait Backbone: Debug + Send + Sync {
    /// Runs the forward pass on a `[1, 3, H, W]` tensor and returns one logit per class.
    fn forward(&self, input: &Array4<f32>) -> Result<Array1<f32>, ClassifierError>;

    /// Number of classes the network emits, when it is known before running it.
    fn output_width(&self) -> Option<usize> {
        None
    }
}

/// A [`Backbone`] backed by an ONNX Runtime session.
///
/// The ONNX model is expected to:
/// - Accept one float input of shape [batch_size, 3, 224, 224]
/// - Output raw (pre-softmax) scores of shape [batch_size, num_classes]
#[derive(Debug)]
pub struct OnnxBackbone {
    session: Session,
    input_name: String,
    output_width: Option<usize>,
    device: Device,
}

impl OnnxBackbone {
    /// Loads the model file and validates its input/output structure.
    pub fn from_file(model_path: &Path, config: &RuntimeConfig) -> Result<Self, ClassifierError> {
        if !model_path.exists() {
            return Err(ClassifierError::ConfigError(format!(
                "Model file not found: {}",
                model_path.display()
            )));
        }

        let (builder, device) = create_session_builder(config)?;
        let session = builder.commit_from_file(model_path)?;

        Self::validate_model(&session)?;
        let input_name = session.inputs[0].name.clone();
        let output_width = Self::declared_output_width(&session);
        info!(
            "Loaded model {} on {} (input '{}', output width {:?})",
            model_path.display(),
            device,
            input_name,
            output_width
        );

        Ok(Self {
            session,
            input_name,
            output_width,
            device,
        })
    }

    /// The device the session was committed to.
    pub fn device(&self) -> Device {
        self.device
    }

    /// Validates that the model has the expected input/output structure
    fn validate_model(session: &Session) -> Result<(), ClassifierError> {
        if session.inputs.is_empty() {
            return Err(ClassifierError::BuildError(
                "Model must have an image input".to_string(),
            ));
        }
        if session.outputs.is_empty() {
            return Err(ClassifierError::BuildError(
                "Model must have at least 1 output for class scores".to_string(),
            ));
        }
        Ok(())
    }

    fn declared_output_width(session: &Session) -> Option<usize> {
        match &session.outputs[0].output_type {
            ValueType::Tensor { dimensions, .. } => dimensions
                .last()
                .and_then(|&d| usize::try_from(d).ok())
                .filter(|&d| d > 0),
            _ => None,
        }
    }
}

impl Backbone for OnnxBackbone {
    fn forward(&self, input: &Array4<f32>) -> Result<Array1<f32>, ClassifierError> {
        let input_dyn = input.view().into_dyn();
        let input_standard = input_dyn.as_standard_layout();

        let mut input_tensors = HashMap::new();
        input_tensors.insert(
            self.input_name.as_str(),
            Tensor::from_array(&input_standard).map_err(|e| {
                ClassifierError::ModelExecutionError(format!("Failed to create input tensor: {}", e))
            })?,
        );

        let outputs = self.session.run(input_tensors).map_err(|e| {
            ClassifierError::ModelExecutionError(format!("Failed to run model: {}", e))
        })?;
        let output_tensor = outputs[0].try_extract_tensor::<f32>().map_err(|e| {
            ClassifierError::ModelExecutionError(format!("Failed to extract output tensor: {}", e))
        })?;

        // [1, num_classes]; anything else is flattened only if it holds a single sample.
        let scores = output_tensor.iter().cloned().collect::<Vec<f32>>();
        if output_tensor.ndim() > 1 && output_tensor.shape()[0] != 1 {
            return Err(ClassifierError::ModelExecutionError(format!(
                "Expected a single sample in the output, got shape {:?}",
                output_tensor.shape()
            )));
        }

        Ok(Array1::from_vec(scores))
    }

    fn output_width(&self) -> Option<usize> {
        self.output_width
    }
}
