use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// CsvConnection manages the data directory shared by all repositories.
///
/// Constructed once at process start and passed by `Arc` into every service;
/// there is no global handle.
#[derive(Clone)]
pub struct CsvConnection {
    base_directory: Arc<Mutex<PathBuf>>,
}

impl CsvConnection {
    /// Create a new connection rooted at a base directory, creating it if
    /// needed.
    pub fn new<P: AsRef<Path>>(base_directory: P) -> Result<Self> {
        let base_path = base_directory.as_ref().to_path_buf();

        if !base_path.exists() {
            fs::create_dir_all(&base_path)?;
        }

        Ok(Self {
            base_directory: Arc::new(Mutex::new(base_path)),
        })
    }

    /// Get the base directory path.
    pub fn base_directory(&self) -> PathBuf {
        self.base_directory.lock().unwrap().clone()
    }

    /// Directory holding one kid's files.
    pub fn kid_directory(&self, directory_name: &str) -> PathBuf {
        self.base_directory().join(directory_name)
    }

    /// Path of the shared reward catalog file.
    pub fn rewards_file_path(&self) -> PathBuf {
        self.base_directory().join("rewards.csv")
    }

    /// Path of the shared redemption history file.
    pub fn redemptions_file_path(&self) -> PathBuf {
        self.base_directory().join("redemptions.csv")
    }

    /// Path of the global configuration file.
    pub fn global_config_path(&self) -> PathBuf {
        self.base_directory().join("global_config.yaml")
    }

    /// Write a file atomically: temp file in the same directory, then rename.
    pub fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, contents)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Generate a safe directory name from a kid's name.
    /// "Emma Smith" -> "emma_smith", "Kid #1" -> "kid_1".
    pub fn safe_directory_name(name: &str) -> String {
        let mut result = String::with_capacity(name.len());
        let mut last_was_underscore = true;
        for c in name.chars() {
            if c.is_ascii_alphanumeric() {
                result.push(c.to_ascii_lowercase());
                last_was_underscore = false;
            } else if !last_was_underscore {
                result.push('_');
                last_was_underscore = true;
            }
        }
        result.trim_matches('_').to_string()
    }
}
