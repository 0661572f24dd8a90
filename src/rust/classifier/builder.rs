use std::path::Path;
use std::sync::Arc;

use log::info;

use super::backbone::{Backbone, OnnxBackbone};
use super::error::ClassifierError;
use super::model::Classifier;
use crate::artifacts::ArtifactStore;
use crate::labels::LabelResolver;
use crate::runtime::{resolve_device, Device, RuntimeConfig};

/// A builder for constructing a Classifier with a fluent interface.
#[derive(Default, Debug)]
pub struct ClassifierBuilder {
    model_path: Option<String>,
    backbone: Option<Arc<dyn Backbone>>,
    labels: Option<LabelResolver>,
    device: Option<Device>,
    runtime_config: RuntimeConfig,
}

impl ClassifierBuilder {
    /// Creates a new empty ClassifierBuilder instance with default configuration
    ///
    /// # Example
    /// ```
    /// use florascope::ClassifierBuilder;
    ///
    /// let builder = ClassifierBuilder::new();
    /// ```
    pub fn new() -> Self {
        Self {
            model_path: None,
            backbone: None,
            labels: None,
            device: None,
            runtime_config: RuntimeConfig::default(),
        }
    }

    /// Sets the runtime configuration for ONNX model execution.
    ///
    /// Must be called before [`with_model`](Self::with_model) to take effect.
    ///
    /// # Example
    /// ```
    /// use florascope::{ClassifierBuilder, Device, RuntimeConfig};
    ///
    /// let config = RuntimeConfig { device: Device::Cpu, ..RuntimeConfig::default() };
    /// let builder = ClassifierBuilder::new()
    ///     .with_runtime_config(config);
    /// ```
    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }

    /// Loads the ONNX model at `model_path` on the configured device.
    ///
    /// # Returns
    /// * `Result<Self, ClassifierError>` - The builder instance if successful, or an error if:
    ///   - A model or backbone is already set
    ///   - The file doesn't exist
    ///   - The session failed to load
    ///   - The model structure is invalid
    pub fn with_model(mut self, model_path: &Path) -> Result<Self, ClassifierError> {
        if self.backbone.is_some() {
            return Err(ClassifierError::BuildError("Model already set".to_string()));
        }

        let backbone = OnnxBackbone::from_file(model_path, &self.runtime_config)?;
        info!("Model structure validated successfully");

        self.device = Some(backbone.device());
        self.model_path = Some(model_path.to_string_lossy().to_string());
        self.backbone = Some(Arc::new(backbone));
        Ok(self)
    }

    /// Uses a caller-provided backbone instead of an ONNX file.
    ///
    /// The device reported by [`Classifier::info`] is resolved from the runtime configuration.
    pub fn with_backbone(mut self, backbone: Arc<dyn Backbone>) -> Result<Self, ClassifierError> {
        if self.backbone.is_some() {
            return Err(ClassifierError::BuildError("Model already set".to_string()));
        }
        self.backbone = Some(backbone);
        Ok(self)
    }

    /// Sets the label tables.
    pub fn with_labels(mut self, labels: LabelResolver) -> Self {
        self.labels = Some(labels);
        self
    }

    /// Loads the class-to-name and index-to-class tables from JSON files.
    pub fn with_label_files(
        self,
        class_names_path: &Path,
        index_to_class_path: &Path,
    ) -> Result<Self, ClassifierError> {
        let labels = LabelResolver::from_files(class_names_path, index_to_class_path)?;
        Ok(self.with_labels(labels))
    }

    /// Loads the label tables and the model from an artifact directory.
    ///
    /// # Example
    /// ```no_run
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// use florascope::{ArtifactStore, ClassifierBuilder};
    ///
    /// let store = ArtifactStore::new_default();
    /// let classifier = ClassifierBuilder::new()
    ///     .with_artifacts(&store)?
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_artifacts(self, store: &ArtifactStore) -> Result<Self, ClassifierError> {
        store.ensure_present()
            .map_err(|e| ClassifierError::ConfigError(e.to_string()))?;
        self.with_label_files(&store.class_names_path(), &store.index_to_class_path())?
            .with_model(&store.model_path())
    }

    /// Builds and returns the final Classifier instance
    ///
    /// # Returns
    /// * `Result<Classifier, ClassifierError>` - The constructed Classifier if successful, or an error if:
    ///   - No model or backbone is set
    ///   - No label tables are set, or the class-to-name table is empty
    ///   - The model's output width differs from the number of classes
    ///   - The index-to-class table does not cover every model output
    pub fn build(mut self) -> Result<Classifier, ClassifierError> {
        let backbone = self.backbone
            .take()
            .ok_or_else(|| ClassifierError::BuildError("Model must be set".to_string()))?;
        let labels = self.labels
            .take()
            .ok_or_else(|| ClassifierError::BuildError("Label tables must be set".to_string()))?;

        let num_classes = labels.num_classes();
        if num_classes == 0 {
            return Err(ClassifierError::BuildError("Class-to-name table is empty".to_string()));
        }

        let width = match backbone.output_width() {
            Some(width) if width != num_classes => {
                return Err(ClassifierError::ConfigError(format!(
                    "Model emits {} classes but the class-to-name table has {}",
                    width, num_classes
                )));
            }
            Some(width) => width,
            None => num_classes,
        };
        labels.check_covers(width)?;

        let device = match self.device {
            Some(device) => device,
            None => resolve_device(self.runtime_config.device)?,
        };

        info!("Classifier ready: {} classes on {}", num_classes, device);
        Ok(Classifier {
            model_path: self.model_path.take(),
            backbone,
            labels: Arc::new(labels),
            device,
        })
    }
}
