use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use pdfview_convert::ConversionConfig;
use pdfview_core::ViewerConfig;
use serde::{Deserialize, Serialize};

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub viewer: ViewerConfig,
    pub conversion: ConversionConfig,
}

impl Settings {
    pub fn default_path(project_dirs: &ProjectDirs) -> PathBuf {
        project_dirs.config_dir().join("config.toml")
    }

    /// Read settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {:?}", path))?;
        toml::from_str(&raw).with_context(|| format!("failed to parse config {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdfview_convert::HostKind;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn reads_both_sections() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
            [viewer]
            zoom_max = 4.0

            [conversion]
            acquire_timeout = 10

            [conversion.word]
            command = ["word-bridge"]
            "#,
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.viewer.zoom_max, 4.0);
        assert_eq!(settings.viewer.zoom_min, ViewerConfig::default().zoom_min);
        assert_eq!(settings.conversion.acquire_timeout, Duration::from_secs(10));
        assert_eq!(settings.conversion.host(HostKind::Word).command, vec!["word-bridge"]);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[viewer\nzoom_max = ").unwrap();
        let err = Settings::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse config"));
    }
}
