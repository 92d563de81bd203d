// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! `addUnit`

use serde_json::Value;
use std::sync::Arc;

use super::{Produced, Run};
use crate::error::ImportError;
use crate::store::{NewUnit, NotificationLevel};
use crate::types::{Arg, MachineParams, Record};

/// Bring `addUnit` arguments to `[application, count, placement]`
///
/// Older generators emit `[application, placement]` with an implied count of
/// one. Missing trailing arguments become `null`.
#[must_use]
pub fn normalize_unit_args(args: &[Arg]) -> Vec<Arg> {
    let mut normalized = match args {
        [application, placement] => vec![
            application.clone(),
            Arg::Literal(Value::from(1)),
            placement.clone(),
        ],
        _ => args.iter().take(3).cloned().collect(),
    };
    normalized.resize(3, Arg::Literal(Value::Null));
    normalized
}

impl Run<'_> {
    pub(super) async fn add_unit(&mut self, record: &Record) -> Result<(), ImportError> {
        let args = normalize_unit_args(&record.args);
        let normalized = Record {
            args,
            ..record.clone()
        };

        let app_key = self.application_ref(&normalized, normalized.arg(0)).await?;
        let count = match &normalized.args[1] {
            Arg::Literal(Value::Null) => 1,
            Arg::Literal(value) => value
                .as_u64()
                .filter(|n| *n > 0)
                .ok_or_else(|| ImportError::invalid(&record.id, "unit count must be a positive integer"))?,
            Arg::Reference(_) => {
                return Err(ImportError::invalid(&record.id, "unit count cannot be a reference"))
            }
        };
        let placement = match &normalized.args[2] {
            Arg::Reference(id) => Some(self.machine_id(&normalized, id).await?),
            Arg::Literal(Value::String(target)) if !target.is_empty() => Some(target.clone()),
            Arg::Literal(Value::Number(id)) => Some(id.to_string()),
            Arg::Literal(Value::Null | Value::String(_)) => None,
            Arg::Literal(_) => {
                return Err(ImportError::invalid(&record.id, "unit placement must be a machine"))
            }
        };

        let (unit_key, application_name) = {
            let mut store = self.services.store.lock().await;
            let Some(app) = store.application(app_key) else {
                return Err(ImportError::invalid(&record.id, "application no longer exists"));
            };
            let application_name = app.name.clone();
            let charm = app.charm.clone();
            let subordinate = store.charm(&charm).map_or(app.subordinate, |c| c.subordinate);
            let unit_key = store
                .add_ghost_unit(NewUnit {
                    application: app_key,
                    charm,
                    subordinate,
                })
                .ok_or_else(|| ImportError::invalid(&record.id, "application no longer exists"))?;
            (unit_key, application_name)
        };

        let (implicit, fallback) = match placement {
            Some(machine) => (None, machine),
            None => {
                let (key, ghost_id) = self.create_machine(MachineParams::default()).await;
                (Some(key), ghost_id)
            }
        };
        let machine = {
            let mut store = self.services.store.lock().await;
            // The implicit machine may already carry its confirmed id
            let machine = implicit
                .and_then(|key| store.machine(key))
                .map_or(fallback, |m| m.id.clone());
            store.place_unit(unit_key, &machine);
            machine
        };
        self.context.publish(
            &record.id,
            Produced::Unit {
                key: unit_key,
                placement: machine.clone(),
            },
        );

        let model = Arc::clone(&self.services.model);
        let store = Arc::clone(&self.services.store);
        self.spawn(async move {
            let result = model
                .add_unit(&application_name, count, Some(machine.as_str()))
                .await;
            let mut store = store.lock().await;
            match result {
                Ok(names) => store.confirm_units(unit_key, &application_name, &names),
                Err(err) => {
                    store.remove_unit(unit_key);
                    store.notify(
                        format!("Error adding unit to {application_name}"),
                        format!("Could not add the requested unit. Server responded with: {err}"),
                        NotificationLevel::Error,
                    );
                }
            }
        });
        Ok(())
    }
}
