use std::path::Path;
use std::sync::Arc;

use image::DynamicImage;
use log::debug;

use super::backbone::Backbone;
use super::error::ClassifierError;
use super::preprocess::{decode_bytes, decode_path, preprocess};
use super::utils::{argmax, softmax};
use super::{ClassifierInfo, PredictionResult};
use crate::labels::LabelResolver;
use crate::runtime::Device;

/// A thread-safe flower classifier: fixed preprocessing, one forward pass, label lookup.
///
/// # Thread Safety
///
/// This type is automatically `Send + Sync`: the backbone and label tables sit behind `Arc`
/// and are never mutated after [`build`](super::ClassifierBuilder::build). Share one instance
/// across request handlers with `Arc<Classifier>`.
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use florascope::{ArtifactStore, Classifier};
///
/// let store = ArtifactStore::new("/srv/florascope");
/// let classifier = Classifier::builder()
///     .with_artifacts(&store)?
///     .build()?;
///
/// let prediction = classifier.classify_path("rose.jpg".as_ref())?;
/// println!("{} ({:.1}%)", prediction.class, prediction.confidence * 100.0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Classifier {
    pub model_path: Option<String>,
    pub backbone: Arc<dyn Backbone>,
    pub labels: Arc<LabelResolver>,
    pub device: Device,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<Classifier>();
    }
};

impl Classifier {
    /// Creates a new ClassifierBuilder for fluent construction
    pub fn builder() -> super::builder::ClassifierBuilder {
        super::builder::ClassifierBuilder::new()
    }

    /// Returns information about the classifier's current state
    pub fn info(&self) -> ClassifierInfo {
        ClassifierInfo::new(self.model_path.clone(), self.labels.num_classes(), self.device)
    }

    /// Classifies an image file. The format is detected from the content.
    ///
    /// # Errors
    /// - `DecodeError` if the file cannot be read, is not an image, or has out-of-range dimensions
    /// - `ModelExecutionError` if the forward pass fails
    /// - `KeyNotFound` if the predicted index is missing from the index-to-class table
    pub fn classify_path(&self, path: &Path) -> Result<PredictionResult, ClassifierError> {
        let image = decode_path(path)?;
        self.classify_image(&image)
    }

    /// Classifies an encoded image held in memory.
    pub fn classify_bytes(&self, bytes: &[u8]) -> Result<PredictionResult, ClassifierError> {
        let image = decode_bytes(bytes)?;
        self.classify_image(&image)
    }

    /// Classifies an already decoded image. Any color mode is converted to RGB first.
    pub fn classify_image(&self, image: &DynamicImage) -> Result<PredictionResult, ClassifierError> {
        let input = preprocess(image)?;
        let logits = self.backbone.forward(&input)?;

        if logits.is_empty() {
            return Err(ClassifierError::ModelExecutionError("Model returned no class scores".into()));
        }
        if logits.iter().any(|v| !v.is_finite()) {
            return Err(ClassifierError::ModelExecutionError("Model returned non-finite class scores".into()));
        }

        let probabilities = softmax(&logits);
        let (index, confidence) = argmax(&probabilities)
            .ok_or_else(|| ClassifierError::ModelExecutionError("Empty probability distribution".into()))?;
        let class = self.labels.resolve(index)?.to_string();
        debug!("Top-1 index {} -> '{}' (p = {:.4})", index, class, confidence);

        Ok(PredictionResult { class, confidence })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array4};
    use std::collections::HashMap;

    #[derive(Debug)]
    struct ConstantBackbone(Vec<f32>);

    impl Backbone for ConstantBackbone {
        fn forward(&self, _input: &Array4<f32>) -> Result<Array1<f32>, ClassifierError> {
            Ok(Array1::from_vec(self.0.clone()))
        }
    }

    fn classifier(logits: Vec<f32>) -> Classifier {
        let labels = LabelResolver::new(
            HashMap::from([("21".to_string(), "fire lily".to_string())]),
            HashMap::from([(0, "21".to_string())]),
        );
        Classifier {
            model_path: None,
            backbone: Arc::new(ConstantBackbone(logits)),
            labels: Arc::new(labels),
            device: Device::Cpu,
        }
    }

    #[test]
    fn test_class_info() {
        let info = classifier(vec![1.0]).info();
        assert_eq!(info.num_classes, 1);
        assert_eq!(info.device, "cpu");
        assert_eq!(info.input_size, 224);
    }

    #[test]
    fn test_non_finite_scores_rejected() {
        let image = DynamicImage::new_rgb8(300, 300);
        let result = classifier(vec![f32::NAN]).classify_image(&image);
        assert!(matches!(result, Err(ClassifierError::ModelExecutionError(_))));
    }

    #[test]
    fn test_empty_scores_rejected() {
        let image = DynamicImage::new_rgb8(300, 300);
        let result = classifier(vec![]).classify_image(&image);
        assert!(matches!(result, Err(ClassifierError::ModelExecutionError(_))));
    }
}
