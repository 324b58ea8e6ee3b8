//! Standard locations of wavesurf files

use std::path::PathBuf;

/// Options file name inside [`config_dir`]
pub const OPTIONS_FILE: &str = "options.yaml";

/// Per-user configuration directory
///
/// Returns: `~/.config/wavesurf` (platform equivalent via `dirs`), or
/// `./wavesurf` when the platform reports no config directory.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wavesurf")
}

/// Returns: `{config_dir}/options.yaml`
pub fn default_config_path() -> PathBuf {
    config_dir().join(OPTIONS_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_is_namespaced() {
        assert!(config_dir().ends_with("wavesurf"));
    }

    #[test]
    fn test_default_path_is_options_file() {
        let path = default_config_path();
        assert!(path.ends_with("wavesurf/options.yaml"));
    }
}
