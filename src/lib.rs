// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Bundle importer library - executes Juju bundle changesets against a model
//!
//! A bundle is turned into a changeset (a list of records such as
//! `addCharm`, `deploy`, `addMachines`, `addUnit`, `addRelation`) by an
//! external generator. This crate orders those records by their declared
//! dependencies, runs them one at a time against a [`api::ModelApi`], and
//! keeps a local [`store::DomainStore`] of ghost entities in step with the
//! remote confirmations as they arrive.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod bundleservice;
pub mod commands;
pub mod config;
pub mod error;
pub mod executor;
pub mod graph;
pub mod importer;
pub mod ingest;
pub mod sandbox;
pub mod store;

/// Core changeset data types
pub mod types {
    use serde::{Deserialize, Deserializer, Serialize};
    use serde_json::Value;
    use std::collections::BTreeMap;
    use std::fmt;
    use std::str::FromStr;

    use crate::error::ImportError;

    /// Free-form annotations (canvas placement and friends)
    pub type Annotations = BTreeMap<String, Value>;

    // =========================================================================
    // Record Arguments
    // =========================================================================

    /// A positional record argument
    ///
    /// The changeset generator writes references to other records as
    /// `"$<recordId>"` strings. They are split out at parse time so executors
    /// never sniff string prefixes.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(from = "Value", into = "Value")]
    pub enum Arg {
        /// Result of another record, by record id
        Reference(String),
        /// Any other JSON value
        Literal(Value),
    }

    impl Arg {
        /// Extract the record id from a `$<name>-<suffix>` reference string
        #[must_use]
        pub fn parse_reference(raw: &str) -> Option<&str> {
            let id = raw.strip_prefix('$')?;
            let (name, suffix) = id.split_once('-')?;
            let is_word = |s: &str| {
                !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            };
            (is_word(name) && is_word(suffix)).then_some(id)
        }

        /// Referenced record id, if this is a reference
        #[must_use]
        pub fn as_reference(&self) -> Option<&str> {
            match self {
                Self::Reference(id) => Some(id),
                Self::Literal(_) => None,
            }
        }

        /// Literal value, if this is not a reference
        #[must_use]
        pub fn as_literal(&self) -> Option<&Value> {
            match self {
                Self::Literal(value) => Some(value),
                Self::Reference(_) => None,
            }
        }

        /// Literal string value
        #[must_use]
        pub fn as_str(&self) -> Option<&str> {
            self.as_literal().and_then(Value::as_str)
        }

        /// Whether this is a literal `null`
        #[must_use]
        pub fn is_null(&self) -> bool {
            matches!(self, Self::Literal(Value::Null))
        }
    }

    impl From<Value> for Arg {
        fn from(value: Value) -> Self {
            if let Value::String(raw) = &value {
                if let Some(id) = Self::parse_reference(raw) {
                    return Self::Reference(id.to_string());
                }
            }
            Self::Literal(value)
        }
    }

    impl From<Arg> for Value {
        fn from(arg: Arg) -> Self {
            match arg {
                Arg::Reference(id) => Value::String(format!("${id}")),
                Arg::Literal(value) => value,
            }
        }
    }

    impl From<&str> for Arg {
        fn from(raw: &str) -> Self {
            Self::from(Value::String(raw.to_string()))
        }
    }

    // =========================================================================
    // Records
    // =========================================================================

    /// Operation kinds understood by the executor
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Method {
        /// Resolve and register a charm
        AddCharm,
        /// Create an application from a charm
        Deploy,
        /// Create a machine or container
        AddMachines,
        /// Add a unit to an application
        AddUnit,
        /// Relate two application endpoints
        AddRelation,
        /// Expose an application
        Expose,
        /// Replace an entity's annotations
        SetAnnotations,
    }

    impl Method {
        /// Wire name used by the changeset generator
        #[must_use]
        pub fn as_str(&self) -> &'static str {
            match self {
                Self::AddCharm => "addCharm",
                Self::Deploy => "deploy",
                Self::AddMachines => "addMachines",
                Self::AddUnit => "addUnit",
                Self::AddRelation => "addRelation",
                Self::Expose => "expose",
                Self::SetAnnotations => "setAnnotations",
            }
        }
    }

    impl fmt::Display for Method {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    impl FromStr for Method {
        type Err = ImportError;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s {
                "addCharm" => Ok(Self::AddCharm),
                "deploy" => Ok(Self::Deploy),
                "addMachines" => Ok(Self::AddMachines),
                "addUnit" => Ok(Self::AddUnit),
                "addRelation" => Ok(Self::AddRelation),
                "expose" => Ok(Self::Expose),
                "setAnnotations" => Ok(Self::SetAnnotations),
                other => Err(ImportError::UnknownMethod {
                    method: other.to_string(),
                }),
            }
        }
    }

    /// A single changeset operation
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Record {
        /// Unique id within the changeset, e.g. `addMachines-3`
        pub id: String,
        /// Executor tag; kept as text so unknown methods surface at dispatch
        pub method: String,
        /// Positional arguments
        #[serde(default)]
        pub args: Vec<Arg>,
        /// Records that must run first
        #[serde(default)]
        pub requires: Vec<String>,
        /// Metadata applied after the primary operation
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub annotations: Option<Annotations>,
    }

    impl Record {
        /// Create a record with no arguments or requirements
        pub fn new(id: impl Into<String>, method: Method) -> Self {
            Self {
                id: id.into(),
                method: method.as_str().to_string(),
                args: Vec::new(),
                requires: Vec::new(),
                annotations: None,
            }
        }

        /// Replace the arguments
        #[must_use]
        pub fn with_args<I, A>(mut self, args: I) -> Self
        where
            I: IntoIterator<Item = A>,
            A: Into<Arg>,
        {
            self.args = args.into_iter().map(Into::into).collect();
            self
        }

        /// Replace the requirements
        #[must_use]
        pub fn requiring<I, S>(mut self, requires: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            self.requires = requires.into_iter().map(Into::into).collect();
            self
        }

        /// Attach annotations
        #[must_use]
        pub fn with_annotations(mut self, annotations: Annotations) -> Self {
            self.annotations = Some(annotations);
            self
        }

        /// Positional argument
        #[must_use]
        pub fn arg(&self, index: usize) -> Option<&Arg> {
            self.args.get(index)
        }

        /// Literal string argument
        #[must_use]
        pub fn str_arg(&self, index: usize) -> Option<&str> {
            self.arg(index).and_then(Arg::as_str)
        }

        /// Whether this record declares `id` as a requirement
        #[must_use]
        pub fn depends_on(&self, id: &str) -> bool {
            self.requires.iter().any(|r| r == id)
        }
    }

    // =========================================================================
    // Charms
    // =========================================================================

    /// A charm configuration option
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct CharmOption {
        /// Option type (string, int, boolean, float)
        #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
        pub option_type: Option<String>,
        /// Declared default
        #[serde(default)]
        pub default: Option<Value>,
        /// Help text
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub description: Option<String>,
    }

    /// A resource declared by a charm
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct CharmResource {
        /// Resource name
        #[serde(default)]
        pub name: String,
        /// Resource type (file, oci-image)
        #[serde(default, rename = "type")]
        pub resource_type: String,
        /// Path inside the charm
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub path: Option<String>,
        /// Revision in the store
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub revision: Option<i64>,
        /// Human description
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub description: Option<String>,
    }

    /// Charm metadata as returned by the charm store
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct Charm {
        /// Fully qualified charm url, e.g. `cs:trusty/mysql-38`
        #[serde(default)]
        pub id: String,
        /// Short name
        #[serde(default)]
        pub name: String,
        /// Supported series, preferred first
        #[serde(default, deserialize_with = "one_or_many")]
        pub series: Vec<String>,
        /// Configuration options
        #[serde(default)]
        pub options: BTreeMap<String, CharmOption>,
        /// Declared resources
        #[serde(default)]
        pub resources: BTreeMap<String, CharmResource>,
        /// Subordinate charms attach to a principal unit
        #[serde(default)]
        pub subordinate: bool,
        /// Relation endpoints are visible once the charm is loaded
        #[serde(default)]
        pub loaded: bool,
    }

    impl Charm {
        /// Preferred series, if the charm declares any
        #[must_use]
        pub fn preferred_series(&self) -> Option<&str> {
            self.series.first().map(String::as_str)
        }
    }

    /// Charm store metadata carries `series` as either a string or a list
    fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OneOrMany {
            One(String),
            Many(Vec<String>),
        }

        Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
            Some(OneOrMany::One(series)) => vec![series],
            Some(OneOrMany::Many(series)) => series,
            None => Vec::new(),
        })
    }

    // =========================================================================
    // Machines
    // =========================================================================

    /// Parameters of an `addMachines` record
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MachineParams {
        /// Machine series
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub series: Option<String>,
        /// Provider constraints
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub constraints: Option<Value>,
        /// Container type when this is a container
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub container_type: Option<String>,
        /// Host machine id for containers
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub parent_id: Option<String>,
    }
}

/// Prelude for common imports
pub mod prelude {
    pub use crate::api::{ChangesetGenerator, CharmStore, ModelApi};
    pub use crate::error::{ImportError, RemoteError, ResolveError};
    pub use crate::executor::ImportSettings;
    pub use crate::importer::{BundleImporter, Collaborators, ImportEvent, ImportReport, RunOutcome};
    pub use crate::store::{DomainStore, SharedStore};
    pub use crate::types::*;
}
