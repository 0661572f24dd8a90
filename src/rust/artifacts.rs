use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

/// File holding the dataset class key → display name table.
pub const CLASS_NAMES_FILE: &str = "class_mapping.json";
/// File holding the model output index → dataset class key table.
pub const INDEX_TO_CLASS_FILE: &str = "idx_to_class.json";
/// The exported classifier graph.
pub const MODEL_FILE: &str = "model.onnx";

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Missing artifacts: {}", display_paths(.0))]
    Missing(Vec<PathBuf>),
    #[error("Download error: {0}")]
    DownloadError(#[from] reqwest::Error),
    #[error("Download failed with HTTP status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Artifact verification failed")]
    VerificationFailed,
    #[error("Hash mismatch: expected {expected}, got {actual} for {file_type} file")]
    HashMismatch {
        file_type: String,
        expected: String,
        actual: String,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths.iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Locates the startup artifacts (label tables and model) under one base directory.
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    base_dir: PathBuf,
    download_lock: Arc<Mutex<()>>,
}

impl ArtifactStore {
    /// Creates a store rooted at the default artifact directory
    pub fn new_default() -> Self {
        Self::new(Self::get_default_base_dir())
    }

    /// Returns the default artifact directory path
    pub fn get_default_base_dir() -> PathBuf {
        // 1. Check environment variable
        if let Ok(path) = env::var("FLORASCOPE_HOME") {
            return PathBuf::from(path);
        }

        // 2. Use platform-specific data directory
        if let Some(data_dir) = dirs::data_dir() {
            return data_dir.join("florascope");
        }

        // 3. Fallback to user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".local").join("share").join("florascope");
        }

        // 4. If all else fails, use system temp directory (platform agnostic)
        env::temp_dir().join("florascope")
    }

    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            download_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn class_names_path(&self) -> PathBuf {
        self.base_dir.join(CLASS_NAMES_FILE)
    }

    pub fn index_to_class_path(&self) -> PathBuf {
        self.base_dir.join(INDEX_TO_CLASS_FILE)
    }

    pub fn model_path(&self) -> PathBuf {
        self.base_dir.join(MODEL_FILE)
    }

    /// Artifacts that are not present on disk.
    pub fn missing_artifacts(&self) -> Vec<PathBuf> {
        [self.class_names_path(), self.index_to_class_path(), self.model_path()]
            .into_iter()
            .filter(|path| !path.is_file())
            .collect()
    }

    /// Fails with [`ArtifactError::Missing`] unless all three artifacts exist.
    pub fn ensure_present(&self) -> Result<(), ArtifactError> {
        let missing = self.missing_artifacts();
        log::info!("Checking artifacts in {:?}", self.base_dir);
        if missing.is_empty() {
            Ok(())
        } else {
            log::error!("{} artifact(s) missing under {:?}", missing.len(), self.base_dir);
            Err(ArtifactError::Missing(missing))
        }
    }

    fn verify_file(&self, path: &Path, expected_hash: &str) -> Result<bool, ArtifactError> {
        log::info!("Verifying file: {:?}", path);
        let bytes = fs::read(path)?;
        let hash = sha256_hex(&bytes);
        log::debug!("Calculated hash: {}", hash);
        log::debug!("Expected hash:   {}", expected_hash);
        Ok(hash.eq_ignore_ascii_case(expected_hash))
    }

    /// Checks the model file against a SHA-256 digest. A missing file verifies as `false`.
    pub fn verify_model(&self, expected_hash: &str) -> Result<bool, ArtifactError> {
        let model_path = self.model_path();
        if !model_path.exists() {
            log::info!("Model file {:?} does not exist", model_path);
            return Ok(false);
        }
        self.verify_file(&model_path, expected_hash)
    }

    /// Downloads the model from `url` into the store, replacing an existing file only when it
    /// fails verification (or when no digest is given and `force` is set).
    pub async fn download_model(
        &self,
        url: &str,
        expected_hash: Option<&str>,
        force: bool,
    ) -> Result<(), ArtifactError> {
        let _lock = self.download_lock.lock().await;
        let model_path = self.model_path();

        if model_path.exists() && !force {
            match expected_hash {
                Some(hash) if self.verify_file(&model_path, hash)? => {
                    log::info!("Existing model file verified successfully");
                    return Ok(());
                }
                Some(_) => log::warn!("Model file verification failed, redownloading"),
                None => {
                    log::info!("Model file exists at {:?}, skipping download", model_path);
                    return Ok(());
                }
            }
        }

        let result = self.download_and_verify_file(url, &model_path, expected_hash, "model").await;
        if let Err(e) = &result {
            log::error!("Failed to setup model file: {}", e);
            // Cleanup on failure
            let _ = self.remove_model();
        }
        result
    }

    async fn download_and_verify_file(
        &self,
        url: &str,
        path: &Path,
        expected_hash: Option<&str>,
        file_type: &str,
    ) -> Result<(), ArtifactError> {
        log::info!("Downloading {} file from {} to {:?}", file_type, url, path);
        let response = reqwest::get(url).await?;
        log::info!("Download response status: {}", response.status());
        if !response.status().is_success() {
            return Err(ArtifactError::HttpStatus(response.status()));
        }
        let bytes = response.bytes().await?;
        log::info!("Downloaded {} bytes", bytes.len());

        if let Some(expected_hash) = expected_hash {
            let hash = sha256_hex(&bytes);
            if !hash.eq_ignore_ascii_case(expected_hash) {
                log::error!("{} hash mismatch: expected {}, got {}", file_type, expected_hash, hash);
                return Err(ArtifactError::HashMismatch {
                    file_type: file_type.to_string(),
                    expected: expected_hash.to_string(),
                    actual: hash,
                });
            }
        }

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        log::info!("Writing {} bytes to {:?}", bytes.len(), path);
        fs::write(path, &bytes)?;

        // Verify after writing
        if let Some(expected_hash) = expected_hash {
            if !self.verify_file(path, expected_hash)? {
                return Err(ArtifactError::VerificationFailed);
            }
        }

        log::info!("{} file downloaded successfully", file_type);
        Ok(())
    }

    pub fn remove_model(&self) -> Result<(), ArtifactError> {
        let model_path = self.model_path();
        if model_path.exists() {
            fs::remove_file(&model_path)?;
        }
        Ok(())
    }
}

/// Lowercase hex SHA-256 digest of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
