// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Configuration management

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::executor::ImportSettings;

/// Environment variable prefix for overrides, e.g. `BUNDLE_IMPORTER_RESOURCE_CHANNEL`
pub const ENV_PREFIX: &str = "BUNDLE_IMPORTER";

/// Importer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImporterConfig {
    /// Base url of the bundle service used for YAML bundles
    pub bundle_service_url: Option<String>,
    /// Request timeout for the bundle service, in seconds
    pub bundle_service_timeout_secs: u64,
    /// Store channel for pending resources
    pub resource_channel: String,
    /// Canvas shift for overlapping applications
    pub annotation_offset: i64,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        let settings = ImportSettings::default();
        Self {
            bundle_service_url: None,
            bundle_service_timeout_secs: 30,
            resource_channel: settings.resource_channel,
            annotation_offset: settings.annotation_offset,
            log_level: "info".to_string(),
        }
    }
}

impl ImporterConfig {
    /// Execution settings for an importer
    #[must_use]
    pub fn import_settings(&self) -> ImportSettings {
        ImportSettings {
            resource_channel: self.resource_channel.clone(),
            annotation_offset: self.annotation_offset,
        }
    }

    /// Bundle service request timeout
    #[must_use]
    pub fn bundle_service_timeout(&self) -> Duration {
        Duration::from_secs(self.bundle_service_timeout_secs)
    }
}

/// Default config file location (`config.toml` in the platform config dir)
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "hyperpolymath", "bundle-importer")
        .map(|d| d.config_dir().join("config.toml"))
}

/// Load configuration: defaults, then a TOML file, then environment overrides
///
/// An explicit `path` must exist; the default location is optional.
pub fn load(path: Option<&Path>) -> Result<ImporterConfig> {
    let defaults = serde_json::to_string(&ImporterConfig::default())
        .context("Failed to serialize default configuration")?;
    let mut builder = Config::builder().add_source(File::from_str(&defaults, FileFormat::Json));

    match path {
        Some(path) => {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        None => {
            if let Some(path) = default_config_path().filter(|p| p.exists()) {
                builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Toml));
            }
        }
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    builder
        .build()
        .context("Failed to load configuration")?
        .try_deserialize()
        .context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ImporterConfig::default();
        assert_eq!(config.resource_channel, "stable");
        assert_eq!(config.annotation_offset, 150);
        assert!(config.bundle_service_url.is_none());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("importer.toml");
        std::fs::write(
            &path,
            "bundle_service_url = \"http://localhost:8080\"\nannotation_offset = 75\n",
        )
        .unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.bundle_service_url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(config.annotation_offset, 75);
        assert_eq!(config.resource_channel, "stable");
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let err = load(Some(Path::new("/nonexistent/importer.toml"))).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_settings_follow_config() {
        let config = ImporterConfig {
            resource_channel: "edge".into(),
            annotation_offset: 10,
            ..ImporterConfig::default()
        };
        let settings = config.import_settings();
        assert_eq!(settings.resource_channel, "edge");
        assert_eq!(settings.annotation_offset, 10);
    }
}
