// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! `addMachines`

use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::{Produced, Run};
use crate::error::ImportError;
use crate::store::{MachineKey, NotificationLevel};
use crate::types::{Arg, MachineParams, Record};

impl Run<'_> {
    pub(super) async fn add_machines(&mut self, record: &Record) -> Result<(), ImportError> {
        let raw = match record.arg(0) {
            Some(Arg::Literal(value @ Value::Object(_))) => value.clone(),
            None | Some(Arg::Literal(Value::Null)) => Value::Object(serde_json::Map::new()),
            _ => {
                return Err(ImportError::invalid(
                    &record.id,
                    "addMachines needs a parameter object",
                ))
            }
        };
        let mut params: MachineParams = serde_json::from_value(raw)
            .map_err(|err| ImportError::invalid(&record.id, err.to_string()))?;

        params.parent_id = match params.parent_id.take().filter(|p| !p.is_empty()) {
            Some(parent) => match Arg::parse_reference(&parent) {
                Some(reference) => Some(self.machine_id(record, reference).await?),
                None => Some(parent),
            },
            None => None,
        };
        if params.container_type.as_deref() == Some("lxc") {
            params.container_type = Some("lxd".to_string());
        }

        let (key, id) = self.create_machine(params).await;
        self.context.publish(&record.id, Produced::Machine { key, id });
        Ok(())
    }

    /// Add a ghost machine and ask the model for the real one
    ///
    /// Returns the handle and the ghost id.
    pub(super) async fn create_machine(&mut self, params: MachineParams) -> (MachineKey, String) {
        let (key, ghost_id) = {
            let mut store = self.services.store.lock().await;
            let key = store.add_ghost_machine(&params);
            let ghost_id = store.machine(key).map(|m| m.id.clone()).unwrap_or_default();
            (key, ghost_id)
        };
        debug!(machine = %ghost_id, "adding machine");
        let created = (key, ghost_id.clone());

        let model = Arc::clone(&self.services.model);
        let store = Arc::clone(&self.services.store);
        self.spawn(async move {
            let result = model.add_machines(vec![params]).await;
            let mut store = store.lock().await;
            match result {
                Ok(ids) => match ids.first() {
                    Some(id) => {
                        store.confirm_machine(key, id);
                    }
                    None => {
                        store.remove_machine(key);
                    }
                },
                Err(err) => {
                    store.remove_machine(key);
                    store.notify(
                        "Error adding machine",
                        format!("Could not add machine {ghost_id}. Server responded with: {err}"),
                        NotificationLevel::Error,
                    );
                }
            }
        });
        created
    }
}
