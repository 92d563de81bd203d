// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Collaborator interfaces: changeset generation, the model and the charm store

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{GenerationErrors, RemoteError};
use crate::types::{Annotations, Charm, CharmResource, MachineParams, Record};

/// What to turn into a changeset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangesetRequest {
    /// Bundle YAML, already normalised to v4 layout
    Yaml(String),
    /// Token identifying a changeset prepared earlier
    Token(String),
}

/// Turns bundles into changeset records
#[async_trait]
pub trait ChangesetGenerator: Send + Sync {
    /// Generate the records for a bundle or token
    async fn generate(&self, request: ChangesetRequest) -> Result<Vec<Record>, GenerationErrors>;
}

/// Request to create an application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequest {
    /// Canonical charm url
    pub charm_url: String,
    /// Unique application name
    pub application_name: String,
    /// Series to deploy on
    pub series: Option<String>,
    /// Options supplied by the bundle, not the merged defaults
    pub config: Value,
    /// Provider constraints
    pub constraints: Value,
    /// Resource ids registered before deployment
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resources: BTreeMap<String, String>,
}

/// Request to register pending resources for an application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingResourcesRequest {
    /// Application the resources belong to
    pub application_name: String,
    /// Canonical charm url
    pub charm_url: String,
    /// Store channel to fetch from
    pub channel: String,
    /// Resources declared by the charm
    pub resources: BTreeMap<String, CharmResource>,
}

/// One side of a relation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Application name
    pub application: String,
    /// Relation endpoint name on that application
    pub name: String,
}

/// Relation details confirmed by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationResult {
    /// Model relation id
    pub id: String,
    /// Interface name
    pub interface: String,
    /// Relation scope (global or container)
    pub scope: String,
}

/// Operations issued against the live model
///
/// Every method is a single request; the importer decides which ones it waits
/// for and which ones it lets run in the background.
#[async_trait]
pub trait ModelApi: Send + Sync {
    /// Make a charm available to the model
    async fn add_charm(&self, charm_url: &str) -> Result<(), RemoteError>;

    /// Register pending resources, returning resource ids by name
    async fn add_pending_resources(
        &self,
        request: PendingResourcesRequest,
    ) -> Result<BTreeMap<String, String>, RemoteError>;

    /// Create an application, returning the name the model assigned
    async fn deploy(&self, request: DeployRequest) -> Result<String, RemoteError>;

    /// Create machines, returning their ids in request order
    async fn add_machines(&self, machines: Vec<MachineParams>) -> Result<Vec<String>, RemoteError>;

    /// Add units, returning the unit names
    async fn add_unit(
        &self,
        application: &str,
        count: u64,
        placement: Option<&str>,
    ) -> Result<Vec<String>, RemoteError>;

    /// Relate two endpoints
    async fn add_relation(
        &self,
        first: Endpoint,
        second: Endpoint,
    ) -> Result<RelationResult, RemoteError>;

    /// Expose an application
    async fn expose(&self, application: &str) -> Result<(), RemoteError>;

    /// Replace an entity's annotations
    async fn update_annotations(
        &self,
        entity: &str,
        entity_type: &str,
        annotations: &Annotations,
    ) -> Result<(), RemoteError>;
}

/// Charm metadata lookups
#[async_trait]
pub trait CharmStore: Send + Sync {
    /// Canonicalise a partial or aliased charm id
    async fn canonical_id(&self, id: &str) -> Result<String, RemoteError>;

    /// Fetch metadata for a canonical charm id
    async fn entity(&self, id: &str) -> Result<Charm, RemoteError>;
}
