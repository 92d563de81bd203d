// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Per-method record execution
//!
//! Records never change once parsed. What a record produces is published into
//! an [`ExecutionContext`] under the record id, and later records find it there
//! through their `$<recordId>` arguments.
//!
//! Executors mutate the [`DomainStore`](crate::store::DomainStore) right away
//! (ghost entities) and then fire the remote call in a background task that
//! reconciles the ghost when the model answers. Only charm store lookups are
//! awaited inline, because later records need their results.

mod annotations;
mod charm;
mod deploy;
mod machines;
mod relations;
mod units;

pub use deploy::effective_config;
pub use units::normalize_unit_args;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::api::{CharmStore, ModelApi};
use crate::error::ImportError;
use crate::store::{AppKey, MachineKey, SharedStore, UnitKey};
use crate::types::{Arg, Charm, Method, Record};

/// What a record left behind for later records
#[derive(Debug, Clone, PartialEq)]
pub enum Produced {
    /// `addCharm`: the resolved charm
    Charm(Charm),
    /// `addMachines`: the machine handle and its id when it was created
    Machine {
        /// Store handle
        key: MachineKey,
        /// Ghost id, used once the machine is gone from the store
        id: String,
    },
    /// `deploy`: the application handle
    Application(AppKey),
    /// `addUnit`: the unit handle and where it was placed
    Unit {
        /// Store handle
        key: UnitKey,
        /// Machine the unit went to, used once the unit is gone from the store
        placement: String,
    },
}

impl Produced {
    fn kind(&self) -> &'static str {
        match self {
            Self::Charm(_) => "charm",
            Self::Machine { .. } => "machine",
            Self::Application(_) => "application",
            Self::Unit { .. } => "unit",
        }
    }
}

/// Results of the records executed so far in one run
#[derive(Debug, Default)]
pub struct ExecutionContext {
    results: HashMap<String, Produced>,
}

impl ExecutionContext {
    /// Create an empty context
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the result of a record
    pub fn publish(&mut self, record_id: &str, produced: Produced) {
        self.results.insert(record_id.to_string(), produced);
    }

    /// Resolve a reference made by `record`
    ///
    /// The target must be one of the record's declared requirements and must
    /// already have produced something.
    pub fn resolve(&self, record: &Record, reference: &str) -> Result<&Produced, ImportError> {
        if !record.depends_on(reference) {
            return Err(ImportError::UnresolvedReference {
                record: record.id.clone(),
                reference: reference.to_string(),
            });
        }
        self.results
            .get(reference)
            .ok_or_else(|| ImportError::UnresolvedReference {
                record: record.id.clone(),
                reference: reference.to_string(),
            })
    }
}

/// Knobs that shape execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSettings {
    /// Store channel used for pending resources
    pub resource_channel: String,
    /// Canvas shift applied while an application's position overlaps another
    pub annotation_offset: i64,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            resource_channel: "stable".to_string(),
            annotation_offset: 150,
        }
    }
}

/// Collaborators every executor needs
#[derive(Clone)]
pub struct Services {
    /// Live model
    pub model: Arc<dyn ModelApi>,
    /// Charm metadata
    pub charm_store: Arc<dyn CharmStore>,
    /// Local mirror
    pub store: SharedStore,
    /// Execution knobs
    pub settings: ImportSettings,
    /// Held across every `update_annotations` call so sends never overlap
    pub annotation_sends: Arc<Mutex<()>>,
}

/// State of one changeset run
pub struct Run<'s> {
    services: &'s Services,
    context: ExecutionContext,
    applications: Vec<AppKey>,
    background: Vec<JoinHandle<()>>,
}

impl<'s> Run<'s> {
    /// Start a run with an empty context
    #[must_use]
    pub fn new(services: &'s Services) -> Self {
        Self {
            services,
            context: ExecutionContext::new(),
            applications: Vec::new(),
            background: Vec::new(),
        }
    }

    /// Execute one record
    pub async fn execute(&mut self, record: &Record) -> Result<(), ImportError> {
        let method: Method = record.method.parse()?;
        debug!(record = %record.id, %method, "executing record");
        match method {
            Method::AddCharm => self.add_charm(record).await,
            Method::Deploy => self.deploy(record).await,
            Method::AddMachines => self.add_machines(record).await,
            Method::AddUnit => self.add_unit(record).await,
            Method::AddRelation => self.add_relation(record).await,
            Method::Expose => self.expose(record).await,
            Method::SetAnnotations => self.set_annotations(record).await,
        }
    }

    /// Applications deployed by this run, in execution order
    #[must_use]
    pub fn applications(&self) -> &[AppKey] {
        &self.applications
    }

    /// Hand over the background confirmations still in flight
    #[must_use]
    pub fn into_background(self) -> Vec<JoinHandle<()>> {
        self.background
    }

    fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.background.push(tokio::spawn(task));
    }

    fn resolve(&self, record: &Record, reference: &str) -> Result<&Produced, ImportError> {
        self.context.resolve(record, reference)
    }

    /// Resolve an argument that must name an application
    async fn application_ref(&self, record: &Record, arg: Option<&Arg>) -> Result<AppKey, ImportError> {
        match arg {
            Some(Arg::Reference(id)) => match self.resolve(record, id)? {
                Produced::Application(key) => Ok(*key),
                other => Err(ImportError::invalid(
                    &record.id,
                    format!("${id} is a {}, not an application", other.kind()),
                )),
            },
            Some(Arg::Literal(serde_json::Value::String(name))) => self
                .services
                .store
                .lock()
                .await
                .application_by_name(name)
                .map(|app| app.key)
                .ok_or_else(|| ImportError::invalid(&record.id, format!("unknown application {name}"))),
            _ => Err(ImportError::invalid(
                &record.id,
                "expected a reference to an application",
            )),
        }
    }

    /// Machine id for a placement or parent reference
    ///
    /// A unit resolves to the machine it sits on, or its own id if unplaced.
    /// Entities rolled back after a failed remote call resolve to the id they
    /// had when their record ran.
    async fn machine_id(&self, record: &Record, reference: &str) -> Result<String, ImportError> {
        let produced = self.resolve(record, reference)?.clone();
        let store = self.services.store.lock().await;
        match produced {
            Produced::Machine { key, id } => Ok(store.machine(key).map_or(id, |m| m.id.clone())),
            Produced::Unit { key, placement } => Ok(store
                .unit(key)
                .map_or(placement, |u| u.machine.clone().unwrap_or_else(|| u.id.clone()))),
            other => Err(ImportError::invalid(
                &record.id,
                format!("${reference} is a {}, not a machine", other.kind()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_requires_declared_dependency() {
        let mut context = ExecutionContext::new();
        context.publish("addCharm-0", Produced::Charm(Charm::default()));

        let declared = Record::new("deploy-1", Method::Deploy)
            .with_args(["$addCharm-0"])
            .requiring(["addCharm-0"]);
        assert!(context.resolve(&declared, "addCharm-0").is_ok());

        let undeclared = Record::new("deploy-2", Method::Deploy).with_args(["$addCharm-0"]);
        assert!(matches!(
            context.resolve(&undeclared, "addCharm-0"),
            Err(ImportError::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn test_resolve_missing_result() {
        let context = ExecutionContext::new();
        let record = Record::new("deploy-1", Method::Deploy).requiring(["addCharm-0"]);
        let err = context.resolve(&record, "addCharm-0").unwrap_err();
        assert_eq!(err.to_string(), "record deploy-1 cannot resolve $addCharm-0");
    }
}
