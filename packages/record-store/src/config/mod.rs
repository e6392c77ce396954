//! Store configuration
//!
//! Loaded from a versioned YAML file, then adjusted from the environment:
//!
//! - `RECORD_STORE_DEBUG`: `1`/`true` enables debug logging
//! - `RECORD_STORE_DATA_FILES`: extra data files, separated like `PATH`

pub mod io;

use std::path::{Path, PathBuf};
use std::time::Duration;

pub use io::{ConfigFileV1, IndexConfig, WatchSettings};

use crate::error::{Result, StoreError};
use crate::store::RecordStore;
use crate::watch::WatchConfig;

pub const SUPPORTED_VERSIONS: &[u32] = &[1];

pub const ENV_DEBUG: &str = "RECORD_STORE_DEBUG";
pub const ENV_DATA_FILES: &str = "RECORD_STORE_DATA_FILES";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub debug: bool,
    pub indexes: Vec<IndexConfig>,
    pub data_files: Vec<PathBuf>,
    pub watch: WatchSettings,
}

impl Default for StoreConfig {
    /// Address book indexes, no data files
    fn default() -> Self {
        Self {
            debug: false,
            indexes: vec![
                IndexConfig::new("byGender", "gender"),
                IndexConfig::new("byBirthday", "birthday"),
                IndexConfig::new("byName", "name"),
            ],
            data_files: Vec::new(),
            watch: WatchSettings::default(),
        }
    }
}

impl StoreConfig {
    /// Load a configuration file
    ///
    /// Relative `data_files` are resolved against the file's directory.
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml_str(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_data_files(base);
        }
        Ok(config)
    }

    /// Prefix every relative data file with `base`
    pub fn resolve_data_files(&mut self, base: &Path) {
        for file in &mut self.data_files {
            if file.is_relative() {
                *file = base.join(&*file);
            }
        }
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let file: ConfigFileV1 = serde_yaml::from_str(content)?;

        let version = file.version.ok_or_else(|| {
            StoreError::config(
                "Missing 'version' field in configuration file. Add 'version: 1' to the top of your YAML file.",
            )
        })?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(StoreError::config(format!(
                "Unsupported configuration version {}. Supported versions: 1",
                version
            )));
        }

        let defaults = Self::default();
        let config = Self {
            debug: file.debug.unwrap_or(defaults.debug),
            indexes: file.indexes.unwrap_or(defaults.indexes),
            data_files: file.data_files,
            watch: file.watch.unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        let file = ConfigFileV1 {
            version: Some(1),
            debug: Some(self.debug),
            indexes: Some(self.indexes.clone()),
            data_files: self.data_files.clone(),
            watch: Some(self.watch.clone()),
        };
        Ok(serde_yaml::to_string(&file)?)
    }

    /// Apply `RECORD_STORE_*` overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var_os(key))
    }

    /// Apply overrides from any variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<std::ffi::OsString>,
    {
        if let Some(raw) = lookup(ENV_DEBUG) {
            let raw = raw.to_string_lossy().to_ascii_lowercase();
            self.debug = match raw.as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                other => {
                    return Err(StoreError::config(format!(
                        "{} must be a boolean, got '{}'",
                        ENV_DEBUG, other
                    )))
                }
            };
        }

        if let Some(paths) = lookup(ENV_DATA_FILES) {
            for path in std::env::split_paths(&paths) {
                if !path.as_os_str().is_empty() && !self.data_files.contains(&path) {
                    self.data_files.push(path);
                }
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for (i, index) in self.indexes.iter().enumerate() {
            if index.name.is_empty() || index.field.is_empty() {
                return Err(StoreError::config(format!(
                    "Index #{} needs both a name and a field",
                    i + 1
                )));
            }
            if self.indexes[..i].iter().any(|other| other.name == index.name) {
                return Err(StoreError::config(format!(
                    "Index '{}' is declared twice",
                    index.name
                )));
            }
        }
        if self.watch.debounce_ms == 0 {
            return Err(StoreError::config("watch.debounce_ms must be positive"));
        }
        Ok(())
    }

    /// Default `tracing` filter when `RUST_LOG` is unset
    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "record_store=debug,info"
        } else {
            "info"
        }
    }

    /// Fresh store with every configured index registered
    pub fn build_store(&self) -> RecordStore {
        let mut store = RecordStore::new();
        for index in &self.indexes {
            store.register_index(&index.name, &index.field);
        }
        store
    }

    /// Watcher settings for the given (canonical) data files
    pub fn watch_config(&self, files: Vec<PathBuf>) -> WatchConfig {
        WatchConfig {
            files,
            debounce_duration: Duration::from_millis(self.watch.debounce_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::ffi::OsString;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_yaml_loading() {
        let yaml_content = r#"
version: 1
debug: true
indexes:
  - name: byGender
    field: gender
data_files:
  - data/addressbook.txt
watch:
  enabled: true
  debounce_ms: 250
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml_content.as_bytes()).unwrap();

        let config = StoreConfig::from_yaml(temp_file.path()).unwrap();
        let base = temp_file.path().parent().unwrap();
        assert!(config.debug);
        assert_eq!(config.indexes, vec![IndexConfig::new("byGender", "gender")]);
        assert_eq!(config.data_files, vec![base.join("data/addressbook.txt")]);
        assert!(config.watch.enabled);
        assert_eq!(config.watch.debounce_ms, 250);
    }

    #[test]
    fn test_yaml_defaults() {
        let config = StoreConfig::from_yaml_str("version: 1\n").unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn test_bundled_config() {
        let config = StoreConfig::from_yaml_str(include_str!("../../store.yaml")).unwrap();
        assert_eq!(config.indexes, StoreConfig::default().indexes);
        assert_eq!(config.data_files, vec![PathBuf::from("data/addressbook.txt")]);
    }

    #[test]
    fn test_data_files_relative_to_config_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("store.yaml");
        std::fs::write(
            &path,
            "version: 1\ndata_files:\n  - data/book.txt\n  - /abs/book.txt\n",
        )
        .unwrap();

        let config = StoreConfig::from_yaml(&path).unwrap();

        assert_eq!(
            config.data_files,
            vec![dir.path().join("data/book.txt"), PathBuf::from("/abs/book.txt")]
        );
    }

    #[test]
    fn test_yaml_missing_version() {
        let err = StoreConfig::from_yaml_str("debug: true\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Config);
        assert!(err.message.contains("version"));
    }

    #[test]
    fn test_yaml_unsupported_version() {
        let err = StoreConfig::from_yaml_str("version: 2\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Config);
        assert!(err.message.contains("Unsupported"));
    }

    #[test]
    fn test_yaml_unknown_field() {
        let err = StoreConfig::from_yaml_str("version: 1\ncache: true\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Config);
    }

    #[test]
    fn test_duplicate_index_rejected() {
        let yaml = r#"
version: 1
indexes:
  - { name: byName, field: name }
  - { name: byName, field: gender }
"#;
        assert!(StoreConfig::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut config = StoreConfig::default();
        config.data_files.push(PathBuf::from("/data/book.txt"));

        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("version: 1"));
        assert_eq!(StoreConfig::from_yaml_str(&yaml).unwrap(), config);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = StoreConfig::default();
        let files = std::env::join_paths(["/a.txt", "/b.txt"]).unwrap();

        config
            .apply_overrides(|key| match key {
                ENV_DEBUG => Some(OsString::from("TRUE")),
                ENV_DATA_FILES => Some(files.clone()),
                _ => None,
            })
            .unwrap();

        assert!(config.debug);
        assert_eq!(config.log_filter(), "record_store=debug,info");
        assert_eq!(
            config.data_files,
            vec![PathBuf::from("/a.txt"), PathBuf::from("/b.txt")]
        );
    }

    #[test]
    fn test_env_bad_boolean() {
        let mut config = StoreConfig::default();
        let result = config.apply_overrides(|key| {
            (key == ENV_DEBUG).then(|| OsString::from("maybe"))
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_build_store_registers_indexes() {
        let store = StoreConfig::default().build_store();
        // bySource + three address book indexes
        assert_eq!(store.revision(), 4);
        assert!(store.view("byBirthday", None).is_ok());
        assert!(store.view("byName", None).is_ok());
    }
}
