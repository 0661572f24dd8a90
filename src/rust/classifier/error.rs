use ort::Error as OrtError;
use std::fmt;

/// Represents the different types of errors that can occur while classifying an image.
#[derive(Debug)]
pub enum ClassifierError {
    /// A startup artifact (label table, model file) is missing or malformed
    ConfigError(String),
    /// Error occurred during the build phase
    BuildError(String),
    /// The model emitted an index that the index-to-class table does not know
    KeyNotFound(usize),
    /// The input could not be decoded as a raster image
    DecodeError(String),
    /// The forward pass failed or produced unusable output
    ModelExecutionError(String),
    /// Error occurred due to invalid input parameters
    ValidationError(String),
}

impl ClassifierError {
    /// Whether the failure was caused by the caller's input rather than the service itself.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::DecodeError(_) | Self::ValidationError(_))
    }
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            Self::BuildError(msg) => write!(f, "Build error: {}", msg),
            Self::KeyNotFound(index) => write!(
                f,
                "Model output index {} has no entry in the index-to-class table",
                index
            ),
            Self::DecodeError(msg) => write!(f, "Decode error: {}", msg),
            Self::ModelExecutionError(msg) => write!(f, "Model execution error: {}", msg),
            Self::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ClassifierError {}

impl From<OrtError> for ClassifierError {
    fn from(err: OrtError) -> Self {
        ClassifierError::BuildError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_not_found_message() {
        let err = ClassifierError::KeyNotFound(42);
        assert!(err.to_string().contains("42"));
        assert!(!err.is_input_error());
    }

    #[test]
    fn test_decode_error_is_input_error() {
        assert!(ClassifierError::DecodeError("bad".into()).is_input_error());
        assert!(!ClassifierError::ModelExecutionError("bad".into()).is_input_error());
    }
}
