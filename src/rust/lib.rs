//! Flower species recognition: an ONNX image classifier behind a small HTTP service.
//!
//! # Basic Usage
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use florascope::{ArtifactStore, Classifier};
//!
//! // class_mapping.json, idx_to_class.json and model.onnx live under this directory
//! let store = ArtifactStore::new("/srv/florascope");
//! let classifier = Classifier::builder()
//!     .with_artifacts(&store)?
//!     .build()?;
//!
//! let prediction = classifier.classify_path("sunflower.jpg".as_ref())?;
//! println!("{}: {:.2}", prediction.class, prediction.confidence);
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! The classifier is read-only once built and can be shared across threads using `Arc`:
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use florascope::{ArtifactStore, Classifier};
//! use std::sync::Arc;
//! use std::thread;
//!
//! let classifier = Arc::new(Classifier::builder()
//!     .with_artifacts(&ArtifactStore::new_default())?
//!     .build()?);
//!
//! let mut handles = vec![];
//! for path in ["rose.jpg", "daisy.png"] {
//!     let classifier = Arc::clone(&classifier);
//!     handles.push(thread::spawn(move || {
//!         classifier.classify_path(path.as_ref()).unwrap();
//!     }));
//! }
//!
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//! # Ok(())
//! # }
//! ```

pub mod classifier;
mod runtime;
pub mod labels;
pub mod artifacts;
pub mod server;

pub use classifier::{
    Backbone, Classifier, ClassifierBuilder, ClassifierError, ClassifierInfo, OnnxBackbone,
    PredictionResult,
};
pub use runtime::{create_session_builder, optimization_level_from_u8, resolve_device, Device, RuntimeConfig};
pub use labels::{LabelResolver, UNKNOWN_LABEL};
pub use artifacts::{ArtifactError, ArtifactStore};
pub use server::{router, serve, ServerConfig};

/// Initializes `env_logger`, logging at `info` unless `RUST_LOG` says otherwise.
pub fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}
