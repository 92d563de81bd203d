// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Local mirror of the model: ghost entities, their confirmations and
//! user-facing notifications

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::types::{Annotations, Charm, MachineParams};

/// Store shared between the import driver and background confirmations
pub type SharedStore = Arc<Mutex<DomainStore>>;

macro_rules! entity_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_key!(
    /// Stable handle to a machine, valid across id changes
    MachineKey
);
entity_key!(
    /// Stable handle to an application, valid across renames
    AppKey
);
entity_key!(
    /// Stable handle to a unit
    UnitKey
);
entity_key!(
    /// Stable handle to a relation
    RelationKey
);

// =============================================================================
// Entities
// =============================================================================

/// A machine or container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    /// Store handle
    pub key: MachineKey,
    /// Ghost id (`new0`, `3/lxd/new1`) until confirmed
    pub id: String,
    /// Machine series
    pub series: Option<String>,
    /// Provider constraints
    pub constraints: Option<Value>,
    /// Container type
    pub container_type: Option<String>,
    /// Host machine id
    pub parent_id: Option<String>,
    /// Awaiting confirmation
    pub pending: bool,
}

/// A deployed application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    /// Store handle
    pub key: AppKey,
    /// Placeholder id until the model confirms, then the name
    pub id: String,
    /// Unique application name
    pub name: String,
    /// Canonical charm url
    pub charm: String,
    /// Deployment series
    pub series: Option<String>,
    /// Charm defaults overlaid with the bundle's options
    pub config: BTreeMap<String, Value>,
    /// Provider constraints
    pub constraints: Value,
    /// Canvas annotations
    pub annotations: Annotations,
    /// Resource ids by resource name
    pub resources: BTreeMap<String, String>,
    /// Subordinate charm
    pub subordinate: bool,
    /// Exposed to the network
    pub exposed: bool,
    /// Awaiting confirmation
    pub pending: bool,
}

/// A unit of an application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    /// Store handle
    pub key: UnitKey,
    /// `<application id>/<n>` while pending, the model's unit name afterwards
    pub id: String,
    /// Name shown to users
    pub display_name: String,
    /// Owning application
    pub application: AppKey,
    /// Owning application's confirmed name
    pub application_name: Option<String>,
    /// Charm url
    pub charm: String,
    /// Unit of a subordinate charm
    pub subordinate: bool,
    /// Machine id the unit is placed on
    pub machine: Option<String>,
    /// Awaiting confirmation
    pub pending: bool,
}

/// A relation between two application endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Store handle
    pub key: RelationKey,
    /// `pending-...` until confirmed, then the model relation id
    pub id: String,
    /// Name shown to users
    pub display_name: String,
    /// Interface name, known once confirmed
    pub interface: Option<String>,
    /// Relation scope, known once confirmed
    pub scope: Option<String>,
    /// Application id and endpoint name for each side
    pub endpoints: [(String, String); 2],
    /// Awaiting confirmation
    pub pending: bool,
}

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    /// Progress information
    Info,
    /// Milestones worth surfacing
    Important,
    /// Failures
    Error,
}

impl fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Important => "important",
            Self::Error => "error",
        })
    }
}

/// A user-facing notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Short title
    pub title: String,
    /// Detail
    pub message: String,
    /// Severity
    pub level: NotificationLevel,
    /// When it was raised
    pub timestamp: DateTime<Utc>,
}

/// Ghost unit to be added
#[derive(Debug, Clone)]
pub struct NewUnit {
    /// Owning application
    pub application: AppKey,
    /// Charm url
    pub charm: String,
    /// Subordinate charm
    pub subordinate: bool,
}

// =============================================================================
// Store
// =============================================================================

/// All entities the importer has created or learned about
#[derive(Debug, Default)]
pub struct DomainStore {
    charms: BTreeMap<String, Charm>,
    machines: BTreeMap<MachineKey, Machine>,
    applications: BTreeMap<AppKey, Application>,
    units: BTreeMap<UnitKey, Unit>,
    relations: BTreeMap<RelationKey, Relation>,
    notifications: Vec<Notification>,
    next_key: u64,
    next_ghost_machine: u64,
}

impl DomainStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap the store for sharing with background tasks
    #[must_use]
    pub fn shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    fn next_key(&mut self) -> u64 {
        self.next_key += 1;
        self.next_key
    }

    // --- charms ---

    /// Loaded charm by canonical id
    #[must_use]
    pub fn charm(&self, id: &str) -> Option<&Charm> {
        self.charms.get(id)
    }

    /// Register a charm; returns false if it was already known
    pub fn add_charm(&mut self, charm: Charm) -> bool {
        if self.charms.contains_key(&charm.id) {
            return false;
        }
        self.charms.insert(charm.id.clone(), charm);
        true
    }

    /// All known charms
    pub fn charms(&self) -> impl Iterator<Item = &Charm> {
        self.charms.values()
    }

    // --- machines ---

    /// Add a pending machine with a ghost id
    pub fn add_ghost_machine(&mut self, params: &MachineParams) -> MachineKey {
        let ordinal = self.next_ghost_machine;
        self.next_ghost_machine += 1;
        let id = match (&params.parent_id, &params.container_type) {
            (Some(parent), Some(container)) => format!("{parent}/{container}/new{ordinal}"),
            _ => format!("new{ordinal}"),
        };
        let key = MachineKey(self.next_key());
        self.machines.insert(
            key,
            Machine {
                key,
                id,
                series: params.series.clone(),
                constraints: params.constraints.clone(),
                container_type: params.container_type.clone(),
                parent_id: params.parent_id.clone(),
                pending: true,
            },
        );
        key
    }

    /// Machine by handle
    #[must_use]
    pub fn machine(&self, key: MachineKey) -> Option<&Machine> {
        self.machines.get(&key)
    }

    /// All machines
    pub fn machines(&self) -> impl Iterator<Item = &Machine> {
        self.machines.values()
    }

    /// Give a machine its model id, carrying placements and containers along
    pub fn confirm_machine(&mut self, key: MachineKey, id: &str) -> bool {
        let Some(machine) = self.machines.get_mut(&key) else {
            return false;
        };
        let ghost_id = std::mem::replace(&mut machine.id, id.to_string());
        machine.pending = false;

        for unit in self.units.values_mut() {
            if unit.machine.as_deref() == Some(ghost_id.as_str()) {
                unit.machine = Some(id.to_string());
            }
        }
        for container in self.machines.values_mut() {
            if container.parent_id.as_deref() == Some(ghost_id.as_str()) {
                container.parent_id = Some(id.to_string());
            }
        }
        true
    }

    /// Drop a machine
    pub fn remove_machine(&mut self, key: MachineKey) -> Option<Machine> {
        self.machines.remove(&key)
    }

    // --- applications ---

    fn name_taken(&self, name: &str) -> bool {
        self.applications.values().any(|a| a.name == name)
    }

    /// First free name among `name`, `name-a` .. `name-z`, `name-1`, ...
    #[must_use]
    pub fn unique_application_name(&self, name: &str) -> String {
        if !self.name_taken(name) {
            return name.to_string();
        }
        for suffix in 'a'..='z' {
            let candidate = format!("{name}-{suffix}");
            if !self.name_taken(&candidate) {
                return candidate;
            }
        }
        let mut counter = 1_u64;
        loop {
            let candidate = format!("{name}-{counter}");
            if !self.name_taken(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Add a pending application for `charm` under a unique variant of `name`
    pub fn add_ghost_application(&mut self, charm: &Charm, name: &str) -> AppKey {
        let name = self.unique_application_name(name);
        let key = AppKey(self.next_key());
        self.applications.insert(
            key,
            Application {
                key,
                id: format!("ghost-app-{key}"),
                name,
                charm: charm.id.clone(),
                series: charm.preferred_series().map(str::to_string),
                config: BTreeMap::new(),
                constraints: Value::Object(serde_json::Map::new()),
                annotations: Annotations::new(),
                resources: BTreeMap::new(),
                subordinate: charm.subordinate,
                exposed: false,
                pending: true,
            },
        );
        key
    }

    /// Application by handle
    #[must_use]
    pub fn application(&self, key: AppKey) -> Option<&Application> {
        self.applications.get(&key)
    }

    /// Mutable application by handle
    pub fn application_mut(&mut self, key: AppKey) -> Option<&mut Application> {
        self.applications.get_mut(&key)
    }

    /// Application by current name
    #[must_use]
    pub fn application_by_name(&self, name: &str) -> Option<&Application> {
        self.applications.values().find(|a| a.name == name)
    }

    /// All applications
    pub fn applications(&self) -> impl Iterator<Item = &Application> {
        self.applications.values()
    }

    /// Mark an application deployed; its id becomes its name
    pub fn confirm_application(&mut self, key: AppKey, name: &str) -> Option<&Application> {
        let app = self.applications.get_mut(&key)?;
        if !name.is_empty() {
            app.name = name.to_string();
        }
        app.id.clone_from(&app.name);
        app.pending = false;
        Some(app)
    }

    // --- units ---

    /// Number of units belonging to an application
    #[must_use]
    pub fn unit_count(&self, application: AppKey) -> usize {
        self.units
            .values()
            .filter(|u| u.application == application)
            .count()
    }

    /// Add a pending unit numbered after the application's existing units
    pub fn add_ghost_unit(&mut self, unit: NewUnit) -> Option<UnitKey> {
        let ordinal = self.unit_count(unit.application);
        let app = self.applications.get(&unit.application)?;
        let id = format!("{}/{ordinal}", app.id);
        let display_name = format!("{}/{ordinal}", app.name);
        let key = UnitKey(self.next_key());
        self.units.insert(
            key,
            Unit {
                key,
                id,
                display_name,
                application: unit.application,
                application_name: None,
                charm: unit.charm,
                subordinate: unit.subordinate,
                machine: None,
                pending: true,
            },
        );
        Some(key)
    }

    /// Unit by handle
    #[must_use]
    pub fn unit(&self, key: UnitKey) -> Option<&Unit> {
        self.units.get(&key)
    }

    /// All units
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    /// Record where a unit is placed
    pub fn place_unit(&mut self, key: UnitKey, machine: &str) -> bool {
        match self.units.get_mut(&key) {
            Some(unit) => {
                unit.machine = Some(machine.to_string());
                true
            }
            None => false,
        }
    }

    /// Replace a ghost unit with the units the model created
    ///
    /// The ghost keeps its handle and becomes the first confirmed unit.
    pub fn confirm_units(&mut self, key: UnitKey, application_name: &str, names: &[String]) {
        let Some((first, rest)) = names.split_first() else {
            self.units.remove(&key);
            return;
        };
        let Some(ghost) = self.units.get_mut(&key) else {
            return;
        };
        ghost.id.clone_from(first);
        ghost.display_name.clone_from(first);
        ghost.application_name = Some(application_name.to_string());
        ghost.pending = false;
        let template = ghost.clone();

        for name in rest {
            let key = UnitKey(self.next_key());
            self.units.insert(
                key,
                Unit {
                    key,
                    id: name.clone(),
                    display_name: name.clone(),
                    ..template.clone()
                },
            );
        }
    }

    /// Drop a unit
    pub fn remove_unit(&mut self, key: UnitKey) -> Option<Unit> {
        self.units.remove(&key)
    }

    // --- relations ---

    /// Add a pending relation
    pub fn add_pending_relation(
        &mut self,
        id: String,
        display_name: String,
        endpoints: [(String, String); 2],
    ) -> RelationKey {
        let key = RelationKey(self.next_key());
        self.relations.insert(
            key,
            Relation {
                key,
                id,
                display_name,
                interface: None,
                scope: None,
                endpoints,
                pending: true,
            },
        );
        key
    }

    /// Relation by handle
    #[must_use]
    pub fn relation(&self, key: RelationKey) -> Option<&Relation> {
        self.relations.get(&key)
    }

    /// All relations
    pub fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.relations.values()
    }

    /// Replace a pending relation with the confirmed one
    pub fn confirm_relation(&mut self, key: RelationKey, id: &str, interface: &str, scope: &str) {
        let Some(mut relation) = self.relations.remove(&key) else {
            return;
        };
        let key = RelationKey(self.next_key());
        relation.key = key;
        relation.id = id.to_string();
        relation.interface = Some(interface.to_string());
        relation.scope = Some(scope.to_string());
        relation.pending = false;
        self.relations.insert(key, relation);
    }

    /// Drop a relation
    pub fn remove_relation(&mut self, key: RelationKey) -> Option<Relation> {
        self.relations.remove(&key)
    }

    // --- notifications ---

    /// Raise a user notification
    pub fn notify(
        &mut self,
        title: impl Into<String>,
        message: impl Into<String>,
        level: NotificationLevel,
    ) {
        let notification = Notification {
            title: title.into(),
            message: message.into(),
            level,
            timestamp: Utc::now(),
        };
        match level {
            NotificationLevel::Error => {
                warn!(title = %notification.title, "{}", notification.message);
            }
            NotificationLevel::Info | NotificationLevel::Important => {
                info!(title = %notification.title, "{}", notification.message);
            }
        }
        self.notifications.push(notification);
    }

    /// Notifications raised so far, oldest first
    #[must_use]
    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn charm(id: &str) -> Charm {
        Charm {
            id: id.into(),
            name: "mysql".into(),
            series: vec!["trusty".into()],
            ..Charm::default()
        }
    }

    #[test]
    fn test_unique_application_names() {
        let mut store = DomainStore::new();
        let mysql = charm("cs:trusty/mysql-38");
        let first = store.add_ghost_application(&mysql, "mysql");
        let second = store.add_ghost_application(&mysql, "mysql");
        let third = store.add_ghost_application(&mysql, "mysql");

        assert_eq!(store.application(first).unwrap().name, "mysql");
        assert_eq!(store.application(second).unwrap().name, "mysql-a");
        assert_eq!(store.application(third).unwrap().name, "mysql-b");
    }

    #[test]
    fn test_ghost_machine_ids() {
        let mut store = DomainStore::new();
        let host = store.add_ghost_machine(&MachineParams::default());
        let container = store.add_ghost_machine(&MachineParams {
            container_type: Some("lxd".into()),
            parent_id: Some("new0".into()),
            ..MachineParams::default()
        });

        assert_eq!(store.machine(host).unwrap().id, "new0");
        assert_eq!(store.machine(container).unwrap().id, "new0/lxd/new1");
    }

    #[test]
    fn test_confirm_machine_moves_placements() {
        let mut store = DomainStore::new();
        let app = store.add_ghost_application(&charm("cs:trusty/mysql-38"), "mysql");
        let host = store.add_ghost_machine(&MachineParams::default());
        let unit = store
            .add_ghost_unit(NewUnit {
                application: app,
                charm: "cs:trusty/mysql-38".into(),
                subordinate: false,
            })
            .unwrap();
        store.place_unit(unit, "new0");

        assert!(store.confirm_machine(host, "4"));
        assert_eq!(store.machine(host).unwrap().id, "4");
        assert!(!store.machine(host).unwrap().pending);
        assert_eq!(store.unit(unit).unwrap().machine.as_deref(), Some("4"));
    }

    #[test]
    fn test_confirm_units_keeps_handle() {
        let mut store = DomainStore::new();
        let app = store.add_ghost_application(&charm("cs:trusty/mysql-38"), "mysql");
        let unit = store
            .add_ghost_unit(NewUnit {
                application: app,
                charm: "cs:trusty/mysql-38".into(),
                subordinate: false,
            })
            .unwrap();
        assert_eq!(store.unit(unit).unwrap().display_name, "mysql/0");

        store.confirm_units(unit, "mysql", &["mysql/0".into(), "mysql/1".into()]);

        let confirmed = store.unit(unit).unwrap();
        assert_eq!(confirmed.id, "mysql/0");
        assert_eq!(confirmed.application_name.as_deref(), Some("mysql"));
        assert!(!confirmed.pending);
        assert_eq!(store.unit_count(app), 2);
    }

    #[test]
    fn test_confirm_relation_replaces_pending() {
        let mut store = DomainStore::new();
        let key = store.add_pending_relation(
            "pending-$deploy-1mysql$deploy-2wordpress".into(),
            "mysql:db wordpress:db".into(),
            [("mysql".into(), "db".into()), ("wordpress".into(), "db".into())],
        );
        store.confirm_relation(key, "wordpress:db mysql:db", "mysql", "global");

        let relations: Vec<_> = store.relations().collect();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].id, "wordpress:db mysql:db");
        assert!(!relations[0].pending);
        assert!(store.relation(key).is_none());
    }

    #[test]
    fn test_notifications_are_kept_in_order() {
        let mut store = DomainStore::new();
        store.notify("first", "one", NotificationLevel::Info);
        store.notify("second", "two", NotificationLevel::Error);
        let titles: Vec<_> = store.notifications().iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, ["first", "second"]);
        assert_eq!(store.notifications()[1].level, NotificationLevel::Error);
    }
}
