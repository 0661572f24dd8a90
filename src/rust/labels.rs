//! Two-stage lookup from a model output index to a display name.
//!
//! The model's output order does not match the dataset's class keys, so an index first goes
//! through the index-to-class table (`{"0": "1", "1": "10", ...}`) and the resulting class key
//! is then looked up in the class-to-name table (`{"21": "fire lily", ...}`).

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::{info, warn};

use crate::ClassifierError;

/// Returned when a class key has no display name.
pub const UNKNOWN_LABEL: &str = "Unknown";

#[derive(Debug, Clone)]
pub struct LabelResolver {
    class_names: HashMap<String, String>,
    index_to_class: HashMap<usize, String>,
}

impl LabelResolver {
    pub fn new(class_names: HashMap<String, String>, index_to_class: HashMap<usize, String>) -> Self {
        Self {
            class_names,
            index_to_class,
        }
    }

    /// Builds a resolver from the raw JSON shapes, where indices are string-encoded.
    pub fn from_string_keys(
        class_names: HashMap<String, String>,
        index_to_class: HashMap<String, String>,
    ) -> Result<Self, ClassifierError> {
        let index_to_class = index_to_class
            .into_iter()
            .map(|(key, class_key)| {
                key.trim()
                    .parse::<usize>()
                    .map(|index| (index, class_key))
                    .map_err(|_| {
                        ClassifierError::ConfigError(format!(
                            "Index-to-class key '{}' is not a non-negative integer",
                            key
                        ))
                    })
            })
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(Self::new(class_names, index_to_class))
    }

    /// Loads both tables from JSON files. Any missing or malformed file is a configuration error.
    pub fn from_files(class_names_path: &Path, index_to_class_path: &Path) -> Result<Self, ClassifierError> {
        let class_names = read_json_map(class_names_path)?;
        let index_to_class = read_json_map(index_to_class_path)?;
        let resolver = Self::from_string_keys(class_names, index_to_class)?;
        info!(
            "Loaded {} class names and {} index mappings",
            resolver.class_names.len(),
            resolver.index_to_class.len()
        );
        Ok(resolver)
    }

    /// Number of known classes, i.e. the size of the class-to-name table.
    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    /// Resolves a model output index to a display name.
    ///
    /// # Errors
    /// - `KeyNotFound` if the index has no entry in the index-to-class table
    ///
    /// A class key without a display name resolves to [`UNKNOWN_LABEL`].
    pub fn resolve(&self, index: usize) -> Result<&str, ClassifierError> {
        let class_key = self.index_to_class
            .get(&index)
            .ok_or(ClassifierError::KeyNotFound(index))?;
        Ok(self.class_names
            .get(class_key)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_LABEL))
    }

    /// Checks that every index in `0..width` has an index-to-class entry.
    ///
    /// Class keys without a display name only produce a warning.
    pub fn check_covers(&self, width: usize) -> Result<(), ClassifierError> {
        let mut missing: Vec<usize> = (0..width)
            .filter(|index| !self.index_to_class.contains_key(index))
            .collect();
        if !missing.is_empty() {
            missing.truncate(10);
            return Err(ClassifierError::ConfigError(format!(
                "Index-to-class table does not cover all {} model outputs (missing e.g. {:?})",
                width, missing
            )));
        }

        let unnamed = (0..width)
            .filter_map(|index| self.index_to_class.get(&index))
            .filter(|class_key| !self.class_names.contains_key(*class_key))
            .count();
        if unnamed > 0 {
            warn!("{} class keys have no display name and will resolve to '{}'", unnamed, UNKNOWN_LABEL);
        }
        Ok(())
    }
}

fn read_json_map(path: &Path) -> Result<HashMap<String, String>, ClassifierError> {
    let contents = fs::read_to_string(path).map_err(|e| {
        ClassifierError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&contents).map_err(|e| {
        ClassifierError::ConfigError(format!("Malformed mapping file {}: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(names: &[(&str, &str)], indices: &[(usize, &str)]) -> LabelResolver {
        LabelResolver::new(
            names.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            indices.iter().map(|(k, v)| (*k, v.to_string())).collect(),
        )
    }

    #[test]
    fn test_two_stage_lookup() {
        let labels = resolver(&[("21", "fire lily")], &[(0, "21")]);
        assert_eq!(labels.resolve(0).unwrap(), "fire lily");
    }

    #[test]
    fn test_missing_name_falls_back() {
        let labels = resolver(&[("5", "canna lily")], &[(0, "21")]);
        assert_eq!(labels.resolve(0).unwrap(), UNKNOWN_LABEL);
    }

    #[test]
    fn test_missing_index_fails() {
        let labels = resolver(&[("21", "fire lily")], &[(0, "21")]);
        assert!(matches!(labels.resolve(1), Err(ClassifierError::KeyNotFound(1))));
    }

    #[test]
    fn test_string_keys_must_be_integers() {
        let names = HashMap::new();
        let indices = HashMap::from([("zero".to_string(), "1".to_string())]);
        assert!(matches!(
            LabelResolver::from_string_keys(names, indices),
            Err(ClassifierError::ConfigError(_))
        ));
    }

    #[test]
    fn test_check_covers() {
        let labels = resolver(&[("1", "pink primrose"), ("10", "globe thistle")], &[(0, "1"), (1, "10")]);
        assert!(labels.check_covers(2).is_ok());
        assert!(labels.check_covers(3).is_err());
    }
}
