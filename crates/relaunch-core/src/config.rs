//! relaunch.toml configuration parser.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::REPLACEMENT_TAG;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelaunchConfig {
    #[serde(default)]
    pub replacement: ReplacementConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplacementConfig {
    /// Group tag that enables replacement.
    #[serde(default = "default_tag_key")]
    pub tag_key: String,
}

impl Default for ReplacementConfig {
    fn default() -> Self {
        Self {
            tag_key: default_tag_key(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn default_tag_key() -> String {
    REPLACEMENT_TAG.to_string()
}

fn default_level() -> String {
    "info".to_string()
}

impl RelaunchConfig {
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> CoreResult<Self> {
        let config: RelaunchConfig =
            toml::from_str(content).map_err(|e| CoreError::Config(e.to_string()))?;
        if config.replacement.tag_key.trim().is_empty() {
            return Err(CoreError::Config(
                "replacement.tag_key must not be empty".to_string(),
            ));
        }
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_when_empty() {
        let config = RelaunchConfig::parse("").unwrap();
        assert_eq!(config.replacement.tag_key, "InstanceReplacement");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn parses_overrides() {
        let config = RelaunchConfig::parse(
            r#"
[replacement]
tag_key = "Rollout"

[logging]
level = "debug"
format = "json"
"#,
        )
        .unwrap();
        assert_eq!(config.replacement.tag_key, "Rollout");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn rejects_blank_tag_key() {
        let err = RelaunchConfig::parse("[replacement]\ntag_key = \" \"\n").unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn scaffold_parses_back() {
        let text = RelaunchConfig::default().to_toml_string().unwrap();
        assert_eq!(RelaunchConfig::parse(&text).unwrap(), RelaunchConfig::default());
    }

    #[test]
    fn reads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nlevel = \"warn\"").unwrap();
        let config = RelaunchConfig::from_file(file.path()).unwrap();
        assert_eq!(config.logging.level, "warn");
    }
}
