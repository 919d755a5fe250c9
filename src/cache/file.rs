//! File-backed trust record store with atomic writes.
//!
//! Stores the record at `<file_path>/<file_name>.<file_extension>`, by
//! default under `dirs::data_dir()/<namespace>/`. Uses temp file + rename
//! for atomic writes.

use crate::cache::format::TrustRecord;
use crate::cache::store::Store;
use crate::config::StoreOptions;
use crate::LicenseError;
use std::fs;
use std::path::{Path, PathBuf};

/// File-based store.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    clear_invalid: bool,
}

impl FileStore {
    /// Create a store for `namespace`.
    ///
    /// The directory is `options.file_path` when set, else
    /// `dirs::data_dir()/<namespace>`. It is created if missing.
    pub fn new(namespace: &str, options: &StoreOptions) -> Result<Self, LicenseError> {
        if namespace.is_empty() {
            return Err(LicenseError::ConfigError(
                "store namespace cannot be empty".to_string(),
            ));
        }
        if options.file_name.is_empty() {
            return Err(LicenseError::ConfigError(
                "store file_name cannot be empty".to_string(),
            ));
        }

        let dir = match &options.file_path {
            Some(dir) => dir.clone(),
            None => dirs::data_dir()
                .ok_or_else(|| {
                    LicenseError::StoreIO("Could not find data directory".to_string())
                })?
                .join(namespace),
        };

        fs::create_dir_all(&dir)
            .map_err(|e| LicenseError::StoreIO(format!("Failed to create store dir: {}", e)))?;

        let file_name = if options.file_extension.is_empty() {
            options.file_name.clone()
        } else {
            format!("{}.{}", options.file_name, options.file_extension)
        };

        Ok(Self {
            path: dir.join(file_name),
            clear_invalid: options.clear_invalid_config,
        })
    }

    /// Location of the record file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn remove(&self) -> Result<(), LicenseError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LicenseError::StoreIO(format!("Failed to delete record: {}", e))),
        }
    }
}

impl Store for FileStore {
    fn load(&self) -> Result<Option<TrustRecord>, LicenseError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&self.path)
            .map_err(|e| LicenseError::StoreIO(format!("Failed to read record: {}", e)))?;

        match TrustRecord::from_json(&json) {
            Ok(record) => Ok(Some(record)),
            Err(LicenseError::StoreInvalid(reason)) if self.clear_invalid => {
                tracing::warn!(path = %self.path.display(), %reason, "clearing invalid license record");
                self.remove()?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn save(&self, record: &TrustRecord) -> Result<(), LicenseError> {
        record.validate()?;
        let json = record.to_json()?;
        let temp_path = self.temp_path();

        fs::write(&temp_path, &json)
            .map_err(|e| LicenseError::StoreIO(format!("Failed to write temp file: {}", e)))?;

        fs::rename(&temp_path, &self.path)
            .map_err(|e| LicenseError::StoreIO(format!("Failed to rename record file: {}", e)))?;

        Ok(())
    }

    fn clear(&self) -> Result<(), LicenseError> {
        self.remove()
    }
}
