//! YAML load/save for any serde type
//!
//! Loading is forgiving: a missing or broken file yields the type's default
//! and a warning, since a viewer should still come up with stock options.
//! [`try_load_config`] is the strict variant for callers that want the error.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Read and parse `path`, reporting any failure
pub fn try_load_config<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read options file: {:?}", path))?;
    serde_yaml::from_str(&contents)
        .with_context(|| format!("Failed to parse options file: {:?}", path))
}

/// Read `path`, falling back to `T::default()`
///
/// A missing file is not worth a warning; an unreadable or invalid one is.
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::debug!("load_config: {:?} not found, using defaults", path);
        return T::default();
    }

    match try_load_config(path) {
        Ok(config) => {
            log::info!("load_config: loaded {:?}", path);
            config
        }
        Err(e) => {
            log::warn!("load_config: {:#}, using defaults", e);
            T::default()
        }
    }
}

/// Write `config` to `path` as YAML, creating parent directories
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create options directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize options to YAML")?;
    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write options file: {:?}", path))?;

    log::info!("save_config: wrote {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Sample {
        zoom: f64,
        label: String,
    }

    impl Default for Sample {
        fn default() -> Self {
            Self {
                zoom: 1.0,
                label: "default".to_string(),
            }
        }
    }

    #[test]
    fn test_missing_file_yields_default() {
        let loaded: Sample = load_config(Path::new("/nonexistent/wavesurf/options.yaml"));
        assert_eq!(loaded, Sample::default());
    }

    #[test]
    fn test_invalid_file_yields_default_but_strict_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "zoom: [not a number").unwrap();

        let loaded: Sample = load_config(&path);
        assert_eq!(loaded, Sample::default());
        assert!(try_load_config::<Sample>(&path).is_err());
    }

    #[test]
    fn test_save_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/options.yaml");
        let sample = Sample {
            zoom: 2.5,
            label: "zoomed".to_string(),
        };

        save_config(&sample, &path).unwrap();
        let loaded: Sample = load_config(&path);
        assert_eq!(loaded, sample);
    }
}
