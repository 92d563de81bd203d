// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Bundle inputs: files on disk and legacy bundle layouts

use std::path::Path;
use tracing::debug;

use crate::error::ImportError;

/// Unwrap a legacy "basket" bundle into its single inner bundle
///
/// A v3 basket is a mapping of bundle name to bundle. Anything that already
/// has a top-level `applications` key, or a `services` key that is not
/// itself wrapping `services`, is v4 and comes back unchanged. The unwrapped
/// bundle is returned as JSON, which is also valid YAML. Text that does not
/// parse is returned unchanged for the generator to reject.
#[must_use]
pub fn ensure_v4_format(bundle_yaml: &str) -> String {
    let Ok(bundle) = serde_yaml::from_str::<serde_yaml::Value>(bundle_yaml) else {
        return bundle_yaml.to_string();
    };
    let Some(mapping) = bundle.as_mapping() else {
        return bundle_yaml.to_string();
    };
    if mapping.contains_key("applications")
        || mapping
            .get("services")
            .is_some_and(|services| services.get("services").is_none())
    {
        return bundle_yaml.to_string();
    }
    let Some((name, inner)) = mapping.iter().next() else {
        return bundle_yaml.to_string();
    };
    debug!(basket = ?name, "unwrapping v3 bundle");
    serde_json::to_string(inner).unwrap_or_else(|_| bundle_yaml.to_string())
}

/// How a bundle file is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleFileKind {
    /// Bundle YAML for the changeset generator
    Yaml,
    /// Changeset records as a JSON array
    Json,
}

/// A bundle file and its contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleFile {
    /// File name, used to pick the format
    pub name: String,
    /// File contents
    pub contents: String,
}

impl BundleFile {
    /// Wrap in-memory contents
    pub fn new(name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }

    /// Read a file from disk
    pub async fn read(path: &Path) -> Result<Self, ImportError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ImportError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Ok(Self { name, contents })
    }

    /// Format picked from the extension after the last dot
    pub fn kind(&self) -> Result<BundleFileKind, ImportError> {
        match self.name.rsplit_once('.').map(|(_, ext)| ext) {
            Some("yaml") => Ok(BundleFileKind::Yaml),
            Some("json") => Ok(BundleFileKind::Json),
            _ => Err(ImportError::UnsupportedFile {
                name: self.name.clone(),
            }),
        }
    }
}
