//! Application configuration — file paths and pacing profile.
//!
//! Loaded from a TOML file; every field has a default so a missing config
//! file just means the defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::fetch::FetchConfig;
use crate::pacer::PacerConfig;

/// Pacing/retry profile selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Normal delays, three attempts, 30-day segments.
    Standard,
    /// Long delays, two attempts, 15-day segments. For degraded networks.
    Conservative,
}

impl Profile {
    pub fn pacer_config(&self) -> PacerConfig {
        match self {
            Profile::Standard => PacerConfig::standard(),
            Profile::Conservative => PacerConfig::conservative(),
        }
    }

    pub fn fetch_config(&self) -> FetchConfig {
        match self {
            Profile::Standard => FetchConfig::standard(),
            Profile::Conservative => FetchConfig::conservative(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub progress_path: PathBuf,
    pub report_path: PathBuf,
    pub profile: Profile,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("barvault.db"),
            progress_path: PathBuf::from("update_progress.json"),
            report_path: PathBuf::from("completeness_report.json"),
            profile: Profile::Standard,
        }
    }
}

impl AppConfig {
    /// Load from a TOML file; a missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("read config file: {e}"))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("parse config TOML: {e}"))
    }

    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("serialize config: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_for_missing_fields() {
        let cfg = AppConfig::from_toml("db_path = \"other.db\"").unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("other.db"));
        assert_eq!(cfg.profile, Profile::Standard);
    }

    #[test]
    fn profile_parses_snake_case() {
        let cfg = AppConfig::from_toml("profile = \"conservative\"").unwrap();
        assert_eq!(cfg.profile, Profile::Conservative);
        assert_eq!(cfg.profile.fetch_config().max_attempts, 2);
    }

    #[test]
    fn toml_roundtrip() {
        let cfg = AppConfig::default();
        let text = cfg.to_toml().unwrap();
        let parsed = AppConfig::from_toml(&text).unwrap();
        assert_eq!(cfg.db_path, parsed.db_path);
        assert_eq!(cfg.profile, parsed.profile);
    }
}
