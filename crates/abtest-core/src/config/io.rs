//! YAML load/save for any serde configuration type

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Load a YAML config, falling back to `T::default()`.
///
/// A missing or empty file is normal (first run). A file that cannot be read
/// or parsed is logged and replaced by defaults in memory; it is left on disk
/// untouched so the user can fix it.
///
/// ```ignore
/// let config: TesterConfig = load_config(&default_config_path());
/// ```
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::info!("[CONFIG] {:?} not found, using defaults", path);
            return T::default();
        }
        Err(e) => {
            log::warn!("[CONFIG] Cannot read {:?}: {}, using defaults", path, e);
            return T::default();
        }
    };

    if contents.trim().is_empty() {
        return T::default();
    }

    match serde_yaml::from_str::<T>(&contents) {
        Ok(config) => {
            log::info!("[CONFIG] Loaded {:?}", path);
            config
        }
        Err(e) => {
            log::warn!("[CONFIG] Invalid config in {:?}: {}, using defaults", path, e);
            T::default()
        }
    }
}

/// Write a config as YAML, creating parent directories.
///
/// The file is written next to its destination first and renamed into place,
/// so a crash never leaves a truncated config behind.
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config")?;

    let staging = path.with_extension("yaml.tmp");
    std::fs::write(&staging, yaml)
        .with_context(|| format!("Failed to write {:?}", staging))?;
    std::fs::rename(&staging, path)
        .with_context(|| format!("Failed to move config into place at {:?}", path))?;

    log::info!("[CONFIG] Saved {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct SampleConfig {
        count: u32,
        label: String,
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config: SampleConfig = load_config(&dir.path().join("absent.yaml"));
        assert_eq!(config, SampleConfig::default());
    }

    #[test]
    fn test_save_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("config.yaml");
        let config = SampleConfig {
            count: 3,
            label: "x".into(),
        };
        save_config(&config, &path).unwrap();
        assert_eq!(load_config::<SampleConfig>(&path), config);
        assert!(!path.with_extension("yaml.tmp").exists());
    }

    #[test]
    fn test_invalid_and_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        std::fs::write(&path, "count: [not a number").unwrap();
        assert_eq!(load_config::<SampleConfig>(&path), SampleConfig::default());

        std::fs::write(&path, "  \n").unwrap();
        assert_eq!(load_config::<SampleConfig>(&path), SampleConfig::default());
    }
}
