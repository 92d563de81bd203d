// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Error types for ordering and executing changesets

use std::path::PathBuf;
use thiserror::Error;

/// Fatal problems found while ordering a changeset
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// Two records share an id
    #[error("duplicate record id in changeset: {id}")]
    DuplicateRecord {
        /// The repeated id
        id: String,
    },

    /// A record requires an id that is not in the changeset
    #[error("record {record} requires unknown record {missing}")]
    MissingDependency {
        /// Requiring record
        record: String,
        /// Id that could not be found
        missing: String,
    },

    /// Some records can never become ready
    #[error("dependency cycle between records: {}", records.join(", "))]
    DependencyCycle {
        /// Records left unscheduled, in input order
        records: Vec<String>,
    },
}

/// Failure reported by a remote collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RemoteError {
    /// Server supplied message
    pub message: String,
}

impl RemoteError {
    /// Wrap a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors reported by the changeset generator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", .0.join(", "))]
pub struct GenerationErrors(pub Vec<String>);

impl GenerationErrors {
    /// A single error message
    pub fn single(message: impl Into<String>) -> Self {
        Self(vec![message.into()])
    }
}

/// Errors that stop an import
#[derive(Debug, Error)]
pub enum ImportError {
    /// The changeset could not be ordered
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The changeset generator refused the bundle
    #[error("changeset generation failed: {0}")]
    Generation(#[from] GenerationErrors),

    /// A changeset file was not a JSON array of records
    #[error("malformed changeset: {0}")]
    MalformedChangeset(#[from] serde_json::Error),

    /// Bundle file with an extension other than yaml or json
    #[error("unsupported bundle file: {name}")]
    UnsupportedFile {
        /// File name as supplied
        name: String,
    },

    /// Reading a bundle file failed
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Record method with no executor
    #[error("{method} is not supported")]
    UnknownMethod {
        /// Method as written in the record
        method: String,
    },

    /// Reference to a record that has not produced a result for this record
    #[error("record {record} cannot resolve ${reference}")]
    UnresolvedReference {
        /// Referring record
        record: String,
        /// Referenced record id
        reference: String,
    },

    /// Arguments of the wrong shape
    #[error("record {record} has invalid arguments: {reason}")]
    InvalidArguments {
        /// Offending record
        record: String,
        /// What was wrong
        reason: String,
    },

    /// The charm store could not canonicalise a charm id
    #[error("invalid charm id {charm}: {source}")]
    InvalidCharmId {
        /// Charm id as written
        charm: String,
        /// Store failure
        #[source]
        source: RemoteError,
    },

    /// The charm store could not return charm metadata
    #[error("charm {charm} could not be loaded: {source}")]
    CharmUnavailable {
        /// Canonical charm id
        charm: String,
        /// Store failure
        #[source]
        source: RemoteError,
    },
}

impl ImportError {
    /// Shorthand for [`ImportError::InvalidArguments`]
    pub fn invalid(record: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            record: record.to_string(),
            reason: reason.into(),
        }
    }

    /// Title and message of the user notification for this failure
    #[must_use]
    pub fn notice(&self) -> (&'static str, String) {
        match self {
            Self::Resolve(err) => ("Invalid changeset", err.to_string()),
            Self::Generation(errors) => (
                "Error generating changeSet",
                format!("The following errors occurred while retrieving bundle changes: {errors}"),
            ),
            Self::MalformedChangeset(_) => (
                "Invalid changeset format",
                "The supplied file could not be parsed as a changeset.".to_string(),
            ),
            Self::UnsupportedFile { name } => (
                "Unsupported file type",
                format!("{name} is not a bundle YAML or changeset JSON file."),
            ),
            Self::Io { path, source } => (
                "Unable to read file",
                format!("{}: {source}", path.display()),
            ),
            Self::UnknownMethod { method } => (
                "Unknown method type",
                format!("{method} is not supported. Stopping bundle import."),
            ),
            Self::UnresolvedReference { .. } | Self::InvalidArguments { .. } => {
                ("Invalid changeset record", self.to_string())
            }
            Self::InvalidCharmId { charm, .. } => {
                ("Unable to load charm", format!("Invalid charm id: {charm}"))
            }
            Self::CharmUnavailable { charm, .. } => (
                "Unable to load charm",
                format!("Charm {charm} was not able to be loaded."),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_lists_records() {
        let err = ResolveError::DependencyCycle {
            records: vec!["a-1".into(), "b-2".into()],
        };
        assert_eq!(err.to_string(), "dependency cycle between records: a-1, b-2");
    }

    #[test]
    fn test_generation_notice_joins_errors() {
        let err = ImportError::from(GenerationErrors(vec!["bad series".into(), "no charm".into()]));
        let (title, message) = err.notice();
        assert_eq!(title, "Error generating changeSet");
        assert!(message.ends_with("bad series, no charm"));
    }

    #[test]
    fn test_unknown_method_notice() {
        let (title, message) = ImportError::UnknownMethod {
            method: "destroy".into(),
        }
        .notice();
        assert_eq!(title, "Unknown method type");
        assert_eq!(message, "destroy is not supported. Stopping bundle import.");
    }
}
