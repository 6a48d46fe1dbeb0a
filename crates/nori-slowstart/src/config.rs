//! Slow-start configuration.
//!
//! Loads and validates configuration from YAML files or environment variables.
//!
//! Example YAML:
//! ```yaml
//! storage_root: "/var/lib/app/slowstart"
//! namespace: "6f1c8a52-3d4e-5b8f-9a21-7c3e0d4b5a69"
//! max_payload_len: 1048576
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Namespace for deriving per-key buffer directories when none is configured.
pub const DEFAULT_NAMESPACE: Uuid = Uuid::from_u128(0x9d3e_41b2_7c65_5a0f_8e14_2b6c_d07a_3f59);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlowStartConfig {
    /// Root under which one directory per key is created on demand.
    #[serde(default = "default_storage_root")]
    pub storage_root: PathBuf,

    /// Namespace for the name-based hash that turns a key into a directory name.
    #[serde(default = "default_namespace")]
    pub namespace: Uuid,

    /// File name of the buffer inside each key directory.
    #[serde(default = "default_buffer_file_name")]
    pub buffer_file_name: String,

    /// Largest accepted payload. Also bounds the length field the drain trusts.
    #[serde(default = "default_max_payload_len")]
    pub max_payload_len: u32,

    /// Bytes requested per read while draining.
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("slowstart")
}

fn default_namespace() -> Uuid {
    DEFAULT_NAMESPACE
}

fn default_buffer_file_name() -> String {
    "store.dat".to_string()
}

fn default_max_payload_len() -> u32 {
    16 * 1024 * 1024 // 16 MiB
}

fn default_read_buffer_size() -> usize {
    64 * 1024 // 64 KiB
}

impl Default for SlowStartConfig {
    fn default() -> Self {
        Self {
            storage_root: default_storage_root(),
            namespace: default_namespace(),
            buffer_file_name: default_buffer_file_name(),
            max_payload_len: default_max_payload_len(),
            read_buffer_size: default_read_buffer_size(),
        }
    }
}

impl SlowStartConfig {
    /// Create a config rooted at `storage_root` with default values otherwise.
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            ..Self::default()
        }
    }

    pub fn with_namespace(mut self, namespace: Uuid) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn with_buffer_file_name(mut self, name: impl Into<String>) -> Self {
        self.buffer_file_name = name.into();
        self
    }

    pub fn with_max_payload_len(mut self, max: u32) -> Self {
        self.max_payload_len = max;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Load configuration from a YAML file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(format!("Failed to read config file: {}", e)))?;

        let config: SlowStartConfig = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(format!("Failed to parse YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    ///
    /// Supported variables:
    /// - SLOWSTART_STORAGE_ROOT (required)
    /// - SLOWSTART_NAMESPACE (UUID)
    /// - SLOWSTART_MAX_PAYLOAD_LEN (bytes)
    pub fn load_from_env() -> Result<Self, ConfigError> {
        let storage_root = std::env::var("SLOWSTART_STORAGE_ROOT")
            .map_err(|_| ConfigError::MissingField("SLOWSTART_STORAGE_ROOT".to_string()))?;

        let mut config = SlowStartConfig::new(storage_root);

        if let Ok(ns) = std::env::var("SLOWSTART_NAMESPACE") {
            config.namespace = ns
                .parse()
                .map_err(|e| ConfigError::InvalidField(format!("Invalid SLOWSTART_NAMESPACE: {}", e)))?;
        }

        if let Ok(max) = std::env::var("SLOWSTART_MAX_PAYLOAD_LEN") {
            config.max_payload_len = max.parse().map_err(|e| {
                ConfigError::InvalidField(format!("Invalid SLOWSTART_MAX_PAYLOAD_LEN: {}", e))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_root.as_os_str().is_empty() {
            return Err(ConfigError::InvalidField(
                "storage_root cannot be empty".to_string(),
            ));
        }

        // The buffer must be a plain file name inside the key directory.
        let file_name = Path::new(&self.buffer_file_name);
        if self.buffer_file_name.is_empty()
            || file_name.file_name() != Some(file_name.as_os_str())
        {
            return Err(ConfigError::InvalidField(format!(
                "buffer_file_name must be a bare file name, got {:?}",
                self.buffer_file_name
            )));
        }

        if self.max_payload_len == 0 {
            return Err(ConfigError::InvalidField(
                "max_payload_len must be > 0".to_string(),
            ));
        }

        if self.read_buffer_size < crate::record::HEADER_LEN {
            return Err(ConfigError::InvalidField(format!(
                "read_buffer_size must be at least {} bytes",
                crate::record::HEADER_LEN
            )));
        }

        Ok(())
    }

    /// Directory holding the buffer for `key`.
    ///
    /// Name-based (UUID v5) so that any key maps to a filesystem-safe name that
    /// is stable for a given (namespace, key) pair.
    pub fn key_dir(&self, key: &str) -> PathBuf {
        self.storage_root
            .join(Uuid::new_v5(&self.namespace, key.as_bytes()).to_string())
    }

    /// Path of the buffer file for `key`.
    pub fn buffer_path(&self, key: &str) -> PathBuf {
        self.key_dir(key).join(&self.buffer_file_name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field: {0}")]
    InvalidField(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = SlowStartConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.buffer_file_name, "store.dat");
        assert_eq!(config.max_payload_len, 16 * 1024 * 1024);
        assert_eq!(config.read_buffer_size, 64 * 1024);
    }

    #[test]
    fn test_key_paths_are_stable_and_distinct() {
        let config = SlowStartConfig::new("/tmp/slowstart");

        assert_eq!(config.key_dir("alpha"), config.key_dir("alpha"));
        assert_ne!(config.key_dir("alpha"), config.key_dir("beta"));
        assert!(config.buffer_path("alpha").starts_with("/tmp/slowstart"));
        assert!(config.buffer_path("alpha").ends_with("store.dat"));

        // Keys that are not filesystem-safe still map to a single path component.
        let odd = config.key_dir("../tenant/with spaces");
        assert_eq!(odd.parent(), Some(Path::new("/tmp/slowstart")));
    }

    #[test]
    fn test_namespace_changes_paths() {
        let a = SlowStartConfig::new("/tmp/slowstart");
        let b = a.clone().with_namespace(Uuid::NAMESPACE_DNS);
        assert_ne!(a.key_dir("alpha"), b.key_dir("alpha"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(SlowStartConfig::new("").validate().is_err());
        assert!(SlowStartConfig::default()
            .with_max_payload_len(0)
            .validate()
            .is_err());
        assert!(SlowStartConfig::default()
            .with_read_buffer_size(4)
            .validate()
            .is_err());
        assert!(SlowStartConfig::default()
            .with_buffer_file_name("nested/store.dat")
            .validate()
            .is_err());
        assert!(SlowStartConfig::default()
            .with_buffer_file_name("")
            .validate()
            .is_err());
    }

    #[test]
    fn test_load_from_yaml_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("slowstart.yaml");
        std::fs::write(
            &path,
            "storage_root: /data/slowstart\nmax_payload_len: 4096\n",
        )
        .unwrap();

        let config = SlowStartConfig::load_from_file(&path).unwrap();
        assert_eq!(config.storage_root, PathBuf::from("/data/slowstart"));
        assert_eq!(config.max_payload_len, 4096);
        assert_eq!(config.namespace, DEFAULT_NAMESPACE);
        assert_eq!(config.buffer_file_name, "store.dat");
    }

    #[test]
    fn test_load_rejects_bad_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("slowstart.yaml");
        std::fs::write(&path, "max_payload_len: [not, a, number]\n").unwrap();

        assert!(matches!(
            SlowStartConfig::load_from_file(&path),
            Err(ConfigError::ParseError(_))
        ));
        assert!(matches!(
            SlowStartConfig::load_from_file(temp_dir.path().join("missing.yaml")),
            Err(ConfigError::IoError(_))
        ));
    }
}
