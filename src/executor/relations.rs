// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! `addRelation`

use serde_json::Value;
use std::sync::Arc;

use super::Run;
use crate::api::Endpoint;
use crate::error::ImportError;
use crate::store::NotificationLevel;
use crate::types::{Arg, Record};

/// Split `"$deploy-1:db"` into the application part and the endpoint name
fn split_endpoint(raw: &str) -> (&str, &str) {
    raw.split_once(':').unwrap_or((raw, ""))
}

impl Run<'_> {
    pub(super) async fn add_relation(&mut self, record: &Record) -> Result<(), ImportError> {
        let mut raws = Vec::with_capacity(2);
        let mut sides = Vec::with_capacity(2);
        for index in 0..2 {
            let raw = match record.arg(index) {
                Some(Arg::Literal(Value::String(raw))) => raw.clone(),
                Some(Arg::Reference(id)) => format!("${id}"),
                _ => {
                    return Err(ImportError::invalid(
                        &record.id,
                        "addRelation needs two endpoints",
                    ))
                }
            };
            let (target, endpoint) = split_endpoint(&raw);
            let key = self
                .application_ref(record, Some(&Arg::from(target)))
                .await?;
            sides.push((key, endpoint.to_string()));
            raws.push(raw);
        }

        let (relation_key, first, second) = {
            let mut store = self.services.store.lock().await;
            let mut resolved = Vec::with_capacity(2);
            for (key, endpoint) in sides {
                let app = store.application(key).ok_or_else(|| {
                    ImportError::invalid(&record.id, "application no longer exists")
                })?;
                resolved.push((app.id.clone(), Endpoint {
                    application: app.name.clone(),
                    name: endpoint,
                }));
            }
            let (second_id, second) = resolved.pop().unwrap_or_default();
            let (first_id, first) = resolved.pop().unwrap_or_default();

            let relation_id = format!("pending-{}{first_id}{}{second_id}", raws[0], raws[1]);
            let display_name = format!(
                "{}:{} {}:{}",
                first.application, first.name, second.application, second.name
            );
            let relation_key = store.add_pending_relation(
                relation_id,
                display_name,
                [(first_id, first.name.clone()), (second_id, second.name.clone())],
            );
            (relation_key, first, second)
        };

        let model = Arc::clone(&self.services.model);
        let store = Arc::clone(&self.services.store);
        self.spawn(async move {
            let description = format!(
                "{}:{} {}:{}",
                first.application, first.name, second.application, second.name
            );
            let result = model.add_relation(first, second).await;
            let mut store = store.lock().await;
            match result {
                Ok(relation) => {
                    store.confirm_relation(relation_key, &relation.id, &relation.interface, &relation.scope);
                }
                Err(err) => {
                    store.remove_relation(relation_key);
                    store.notify(
                        "Error adding relation",
                        format!("Could not add relation {description}. Server responded with: {err}"),
                        NotificationLevel::Error,
                    );
                }
            }
        });
        Ok(())
    }
}
