// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! In-memory collaborators for offline imports and tests
//!
//! [`SandboxModel`] accepts every request and answers the way a fresh model
//! would, unless told to fail a call. [`FixtureCharmStore`] serves charms from
//! a JSON fixture. [`StaticGenerator`] hands back a prepared changeset.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tokio::sync::Mutex;

use crate::api::{
    ChangesetGenerator, ChangesetRequest, CharmStore, DeployRequest, Endpoint, ModelApi,
    PendingResourcesRequest, RelationResult,
};
use crate::error::{GenerationErrors, RemoteError};
use crate::types::{Annotations, Charm, MachineParams, Record};

// =============================================================================
// Model
// =============================================================================

/// A request received by [`SandboxModel`]
#[derive(Debug, Clone, PartialEq)]
pub enum ModelCall {
    /// `add_charm`
    AddCharm(String),
    /// `add_pending_resources`
    AddPendingResources(PendingResourcesRequest),
    /// `deploy`
    Deploy(DeployRequest),
    /// `add_machines`
    AddMachines(Vec<MachineParams>),
    /// `add_unit`
    AddUnit {
        /// Application name
        application: String,
        /// Units requested
        count: u64,
        /// Target machine
        placement: Option<String>,
    },
    /// `add_relation`
    AddRelation(Endpoint, Endpoint),
    /// `expose`
    Expose(String),
    /// `update_annotations`
    UpdateAnnotations {
        /// Entity name
        entity: String,
        /// Entity type
        entity_type: String,
        /// New annotations
        annotations: Annotations,
    },
}

/// A call the sandbox should reject
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Failure {
    /// Every `add_charm`
    AddCharm,
    /// Every `add_pending_resources`
    Resources,
    /// `deploy` of the named application
    Deploy(String),
    /// Every `add_machines`
    AddMachines,
    /// `add_unit` for the named application
    AddUnit(String),
    /// Every `add_relation`
    AddRelation,
    /// `expose` of the named application
    Expose(String),
}

#[derive(Debug, Default)]
struct SandboxState {
    calls: Vec<ModelCall>,
    next_machine: u64,
    containers: HashMap<String, u64>,
    units: HashMap<String, u64>,
}

/// Model that confirms everything it is asked to do
#[derive(Debug, Default)]
pub struct SandboxModel {
    state: Mutex<SandboxState>,
    failures: HashSet<Failure>,
}

impl SandboxModel {
    /// Create a sandbox that accepts every call
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject calls matching `failure`
    #[must_use]
    pub fn failing(mut self, failure: Failure) -> Self {
        self.failures.insert(failure);
        self
    }

    /// Calls received so far, in arrival order
    pub async fn calls(&self) -> Vec<ModelCall> {
        self.state.lock().await.calls.clone()
    }

    fn check(&self, failure: &Failure) -> Result<(), RemoteError> {
        if self.failures.contains(failure) {
            Err(RemoteError::new(format!("sandbox rejected {failure:?}")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ModelApi for SandboxModel {
    async fn add_charm(&self, charm_url: &str) -> Result<(), RemoteError> {
        self.state
            .lock()
            .await
            .calls
            .push(ModelCall::AddCharm(charm_url.to_string()));
        self.check(&Failure::AddCharm)
    }

    async fn add_pending_resources(
        &self,
        request: PendingResourcesRequest,
    ) -> Result<BTreeMap<String, String>, RemoteError> {
        let ids = request
            .resources
            .keys()
            .map(|name| (name.clone(), format!("{}/{name}", request.application_name)))
            .collect();
        self.state
            .lock()
            .await
            .calls
            .push(ModelCall::AddPendingResources(request));
        self.check(&Failure::Resources)?;
        Ok(ids)
    }

    async fn deploy(&self, request: DeployRequest) -> Result<String, RemoteError> {
        let name = request.application_name.clone();
        self.state.lock().await.calls.push(ModelCall::Deploy(request));
        self.check(&Failure::Deploy(name.clone()))?;
        Ok(name)
    }

    async fn add_machines(&self, machines: Vec<MachineParams>) -> Result<Vec<String>, RemoteError> {
        let mut state = self.state.lock().await;
        state.calls.push(ModelCall::AddMachines(machines.clone()));
        self.check(&Failure::AddMachines)?;

        let mut ids = Vec::with_capacity(machines.len());
        for params in machines {
            let id = match (params.parent_id, params.container_type) {
                (Some(parent), Some(container)) => {
                    let host = format!("{parent}/{container}");
                    let ordinal = state.containers.entry(host.clone()).or_insert(0);
                    let id = format!("{host}/{ordinal}");
                    *ordinal += 1;
                    id
                }
                _ => {
                    let id = state.next_machine.to_string();
                    state.next_machine += 1;
                    id
                }
            };
            ids.push(id);
        }
        Ok(ids)
    }

    async fn add_unit(
        &self,
        application: &str,
        count: u64,
        placement: Option<&str>,
    ) -> Result<Vec<String>, RemoteError> {
        let mut state = self.state.lock().await;
        state.calls.push(ModelCall::AddUnit {
            application: application.to_string(),
            count,
            placement: placement.map(str::to_string),
        });
        self.check(&Failure::AddUnit(application.to_string()))?;

        let next = state.units.entry(application.to_string()).or_insert(0);
        let names = (*next..*next + count)
            .map(|n| format!("{application}/{n}"))
            .collect();
        *next += count;
        Ok(names)
    }

    async fn add_relation(
        &self,
        first: Endpoint,
        second: Endpoint,
    ) -> Result<RelationResult, RemoteError> {
        let id = format!(
            "{}:{} {}:{}",
            first.application, first.name, second.application, second.name
        );
        let interface = first.name.clone();
        self.state
            .lock()
            .await
            .calls
            .push(ModelCall::AddRelation(first, second));
        self.check(&Failure::AddRelation)?;
        Ok(RelationResult {
            id,
            interface,
            scope: "global".to_string(),
        })
    }

    async fn expose(&self, application: &str) -> Result<(), RemoteError> {
        self.state
            .lock()
            .await
            .calls
            .push(ModelCall::Expose(application.to_string()));
        self.check(&Failure::Expose(application.to_string()))
    }

    async fn update_annotations(
        &self,
        entity: &str,
        entity_type: &str,
        annotations: &Annotations,
    ) -> Result<(), RemoteError> {
        self.state.lock().await.calls.push(ModelCall::UpdateAnnotations {
            entity: entity.to_string(),
            entity_type: entity_type.to_string(),
            annotations: annotations.clone(),
        });
        Ok(())
    }
}

// =============================================================================
// Charm store
// =============================================================================

/// Fixture files hold either a list of charms or a map keyed by charm id
#[derive(Deserialize)]
#[serde(untagged)]
enum CharmFixture {
    List(Vec<Charm>),
    Map(BTreeMap<String, Charm>),
}

/// Charm store serving a fixed set of charms
#[derive(Debug, Default)]
pub struct FixtureCharmStore {
    charms: BTreeMap<String, Charm>,
    unavailable: HashSet<String>,
}

impl FixtureCharmStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store serving `charms`
    pub fn with_charms(charms: impl IntoIterator<Item = Charm>) -> Self {
        Self {
            charms: charms.into_iter().map(|c| (c.id.clone(), c)).collect(),
            unavailable: HashSet::new(),
        }
    }

    /// Parse a JSON fixture
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let charms = match serde_json::from_str(json)? {
            CharmFixture::List(charms) => charms,
            CharmFixture::Map(charms) => charms
                .into_iter()
                .map(|(id, mut charm)| {
                    if charm.id.is_empty() {
                        charm.id = id;
                    }
                    charm
                })
                .collect(),
        };
        Ok(Self::with_charms(charms))
    }

    /// Read a JSON fixture from disk
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Make lookups of `id` fail, whether written as requested or canonical
    #[must_use]
    pub fn unavailable(mut self, id: impl Into<String>) -> Self {
        self.unavailable.insert(id.into());
        self
    }

    fn find(&self, id: &str) -> Option<&Charm> {
        if let Some(charm) = self.charms.get(id) {
            return Some(charm);
        }
        let bare = id.strip_prefix("cs:").unwrap_or(id);
        self.charms.values().find(|charm| {
            let canonical = charm.id.strip_prefix("cs:").unwrap_or(&charm.id);
            let unrevisioned = canonical
                .rsplit_once('-')
                .filter(|(_, rev)| rev.chars().all(|c| c.is_ascii_digit()))
                .map_or(canonical, |(base, _)| base);
            unrevisioned == bare || charm.name == bare
        })
    }
}

#[async_trait]
impl CharmStore for FixtureCharmStore {
    async fn canonical_id(&self, id: &str) -> Result<String, RemoteError> {
        if self.unavailable.contains(id) {
            return Err(RemoteError::new(format!("charm store rejected {id}")));
        }
        self.find(id)
            .map(|charm| charm.id.clone())
            .ok_or_else(|| RemoteError::new(format!("no such charm: {id}")))
    }

    async fn entity(&self, id: &str) -> Result<Charm, RemoteError> {
        if self.unavailable.contains(id) {
            return Err(RemoteError::new(format!("charm store rejected {id}")));
        }
        self.charms
            .get(id)
            .cloned()
            .ok_or_else(|| RemoteError::new(format!("no such charm: {id}")))
    }
}

// =============================================================================
// Generator
// =============================================================================

/// Generator returning a prepared answer
#[derive(Debug)]
pub struct StaticGenerator {
    answer: Result<Vec<Record>, GenerationErrors>,
    requests: Mutex<Vec<ChangesetRequest>>,
}

impl StaticGenerator {
    /// Always answer with `records`
    #[must_use]
    pub fn records(records: Vec<Record>) -> Self {
        Self {
            answer: Ok(records),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always fail with `errors`
    #[must_use]
    pub fn errors(errors: Vec<String>) -> Self {
        Self {
            answer: Err(GenerationErrors(errors)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Generator used when no bundle service is configured
    #[must_use]
    pub fn unavailable() -> Self {
        Self::errors(vec![
            "no bundle service configured; set bundle_service_url or pass --bundle-service".into(),
        ])
    }

    /// Requests received so far
    pub async fn requests(&self) -> Vec<ChangesetRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl ChangesetGenerator for StaticGenerator {
    async fn generate(&self, request: ChangesetRequest) -> Result<Vec<Record>, GenerationErrors> {
        self.requests.lock().await.push(request);
        self.answer.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> FixtureCharmStore {
        FixtureCharmStore::from_json(
            &json!({
                "cs:trusty/mysql-38": {"name": "mysql", "series": "trusty"},
                "cs:trusty/wordpress-5": {"name": "wordpress", "series": "trusty"}
            })
            .to_string(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_canonical_id_aliases() {
        let store = fixture();
        assert_eq!(store.canonical_id("cs:trusty/mysql-38").await.unwrap(), "cs:trusty/mysql-38");
        assert_eq!(store.canonical_id("cs:trusty/mysql").await.unwrap(), "cs:trusty/mysql-38");
        assert_eq!(store.canonical_id("wordpress").await.unwrap(), "cs:trusty/wordpress-5");
        assert!(store.canonical_id("cs:haproxy").await.is_err());
    }

    #[tokio::test]
    async fn test_unavailable_charm() {
        let store = fixture().unavailable("cs:trusty/mysql-38");
        assert!(store.canonical_id("cs:trusty/mysql-38").await.is_err());
        assert!(store.entity("cs:trusty/mysql-38").await.is_err());
        assert!(store.entity("cs:trusty/wordpress-5").await.is_ok());
    }

    #[tokio::test]
    async fn test_fixture_list_form() {
        let store = FixtureCharmStore::from_json(r#"[{"id": "cs:xenial/redis-1", "name": "redis"}]"#).unwrap();
        assert_eq!(store.entity("cs:xenial/redis-1").await.unwrap().name, "redis");
    }

    #[tokio::test]
    async fn test_machine_and_container_ids() {
        let model = SandboxModel::new();
        assert_eq!(model.add_machines(vec![MachineParams::default()]).await.unwrap(), ["0"]);
        let container = MachineParams {
            container_type: Some("lxd".into()),
            parent_id: Some("0".into()),
            ..MachineParams::default()
        };
        assert_eq!(model.add_machines(vec![container.clone()]).await.unwrap(), ["0/lxd/0"]);
        assert_eq!(model.add_machines(vec![container]).await.unwrap(), ["0/lxd/1"]);
        assert_eq!(model.calls().await.len(), 3);
    }

    #[tokio::test]
    async fn test_unit_names_count_up() {
        let model = SandboxModel::new();
        assert_eq!(model.add_unit("mysql", 2, None).await.unwrap(), ["mysql/0", "mysql/1"]);
        assert_eq!(model.add_unit("mysql", 1, Some("3")).await.unwrap(), ["mysql/2"]);
    }

    #[tokio::test]
    async fn test_failure_is_recorded_and_returned() {
        let model = SandboxModel::new().failing(Failure::Deploy("mysql".into()));
        let request = DeployRequest {
            charm_url: "cs:trusty/mysql-38".into(),
            application_name: "mysql".into(),
            series: None,
            config: json!({}),
            constraints: json!({}),
            resources: BTreeMap::new(),
        };
        assert!(model.deploy(request).await.is_err());
        assert!(matches!(model.calls().await[0], ModelCall::Deploy(_)));
    }
}
