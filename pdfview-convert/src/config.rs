use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};

use crate::host::{FormatCodes, HostKind};

pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// `[conversion]` section of the configuration file.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Upper bound on launching an automation host.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub acquire_timeout: Duration,
    pub word: HostConfig,
    pub excel: HostConfig,
    pub powerpoint: HostConfig,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            word: HostConfig::default(),
            excel: HostConfig::default(),
            powerpoint: HostConfig::default(),
        }
    }
}

/// How to reach one automation host and which format codes it expects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Bridge program and its arguments. Empty means the host is unavailable.
    pub command: Vec<String>,
    pub native_format: Option<i32>,
    pub pdf_format: Option<i32>,
}

impl ConversionConfig {
    pub fn host(&self, kind: HostKind) -> &HostConfig {
        match kind {
            HostKind::Word => &self.word,
            HostKind::Excel => &self.excel,
            HostKind::PowerPoint => &self.powerpoint,
        }
    }

    pub fn host_mut(&mut self, kind: HostKind) -> &mut HostConfig {
        match kind {
            HostKind::Word => &mut self.word,
            HostKind::Excel => &mut self.excel,
            HostKind::PowerPoint => &mut self.powerpoint,
        }
    }

    /// Format codes for `kind`: the host's defaults with configured overrides.
    pub fn format_codes(&self, kind: HostKind) -> FormatCodes {
        let defaults = kind.default_codes();
        let host = self.host(kind);
        FormatCodes {
            native: host.native_format.unwrap_or(defaults.native),
            pdf: host.pdf_format.unwrap_or(defaults.pdf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_toml_with_overrides() {
        let config: ConversionConfig = toml::from_str(
            r#"
            acquire_timeout = 5

            [powerpoint]
            command = ["office-bridge", "--quiet"]
            pdf_format = 99
            "#,
        )
        .unwrap();

        assert_eq!(config.acquire_timeout, Duration::from_secs(5));
        assert_eq!(config.powerpoint.command, vec!["office-bridge", "--quiet"]);
        let codes = config.format_codes(HostKind::PowerPoint);
        assert_eq!(codes.pdf, 99);
        assert_eq!(codes.native, 24);
        assert!(config.word.command.is_empty());
    }

    #[test]
    fn defaults_use_host_constants() {
        let config = ConversionConfig::default();
        assert_eq!(config.acquire_timeout, DEFAULT_ACQUIRE_TIMEOUT);
        assert_eq!(config.format_codes(HostKind::Word).native, 16);
        assert_eq!(config.format_codes(HostKind::Excel).native, 51);
        assert_eq!(config.format_codes(HostKind::PowerPoint).pdf, 32);
    }
}
