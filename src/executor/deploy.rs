// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! `deploy` and `expose`

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::annotations::push_annotations;
use super::charm::charm_name_from_id;
use super::{Produced, Run};
use crate::api::{DeployRequest, PendingResourcesRequest};
use crate::error::ImportError;
use crate::store::NotificationLevel;
use crate::types::{Arg, Charm, Record};

/// Charm option defaults overlaid with the options a bundle supplies
///
/// A supplied key wins whenever it is present, including empty strings,
/// `false`, zero and `null`. Supplied keys the charm does not declare are
/// dropped.
#[must_use]
pub fn effective_config(charm: &Charm, supplied: Option<&Map<String, Value>>) -> BTreeMap<String, Value> {
    charm
        .options
        .iter()
        .map(|(key, option)| {
            let value = supplied
                .and_then(|options| options.get(key))
                .cloned()
                .or_else(|| option.default.clone())
                .unwrap_or(Value::Null);
            (key.clone(), value)
        })
        .collect()
}

impl Run<'_> {
    pub(super) async fn deploy(&mut self, record: &Record) -> Result<(), ImportError> {
        let charm_id = match record.arg(0) {
            Some(Arg::Reference(id)) => match self.resolve(record, id)? {
                Produced::Charm(charm) => charm.id.clone(),
                other => {
                    return Err(ImportError::invalid(
                        &record.id,
                        format!("${id} is a {}, not a charm", other.kind()),
                    ))
                }
            },
            Some(Arg::Literal(Value::String(id))) => id.clone(),
            _ => return Err(ImportError::invalid(&record.id, "deploy needs a charm")),
        };

        let charm = self
            .services
            .charm_store
            .entity(&charm_id)
            .await
            .map_err(|source| ImportError::CharmUnavailable {
                charm: charm_id.clone(),
                source,
            })?;
        let charm_url = if charm.id.is_empty() { charm_id } else { charm.id.clone() };

        let series = record
            .str_arg(1)
            .filter(|s| !s.is_empty())
            .or_else(|| charm.preferred_series())
            .map(str::to_string);
        let requested_name = record
            .str_arg(2)
            .filter(|s| !s.is_empty())
            .or_else(|| Some(charm.name.as_str()).filter(|s| !s.is_empty()))
            .unwrap_or_else(|| charm_name_from_id(&charm_url));
        let supplied = record
            .arg(3)
            .and_then(Arg::as_literal)
            .filter(|v| !v.is_null())
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        let constraints = record
            .arg(4)
            .and_then(Arg::as_literal)
            .filter(|v| !v.is_null())
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));

        let (key, name) = {
            let mut store = self.services.store.lock().await;
            let key = store.add_ghost_application(&charm, requested_name);
            let Some(app) = store.application_mut(key) else {
                return Err(ImportError::invalid(&record.id, "application vanished"));
            };
            app.charm.clone_from(&charm_url);
            app.series.clone_from(&series);
            app.config = effective_config(&charm, supplied.as_object());
            if let Some(annotations) = &record.annotations {
                for coord in ["gui-x", "gui-y"] {
                    if let Some(value) = annotations.get(coord) {
                        app.annotations.insert(coord.to_string(), value.clone());
                    }
                }
            }
            (key, app.name.clone())
        };
        debug!(record = %record.id, application = %name, charm = %charm_url, "deploying");

        let resources = (!charm.resources.is_empty()).then(|| PendingResourcesRequest {
            application_name: name.clone(),
            charm_url: charm_url.clone(),
            channel: self.services.settings.resource_channel.clone(),
            resources: charm.resources.clone(),
        });
        let mut request = DeployRequest {
            charm_url,
            application_name: name.clone(),
            series,
            config: supplied,
            constraints: constraints.clone(),
            resources: BTreeMap::new(),
        };

        let model = Arc::clone(&self.services.model);
        let store = Arc::clone(&self.services.store);
        let sends = Arc::clone(&self.services.annotation_sends);
        self.spawn(async move {
            if let Some(resources) = resources {
                let charm_url = resources.charm_url.clone();
                match model.add_pending_resources(resources).await {
                    Ok(ids) => {
                        if let Some(app) = store.lock().await.application_mut(key) {
                            app.resources.clone_from(&ids);
                        }
                        request.resources = ids;
                    }
                    Err(err) => store.lock().await.notify(
                        "Error adding resources",
                        format!("Could not add requested resources for {charm_url}. Server responded with: {err}"),
                        NotificationLevel::Error,
                    ),
                }
            }

            let assigned = match model.deploy(request).await {
                Ok(assigned) => assigned,
                Err(err) => {
                    store.lock().await.notify(
                        format!("Error deploying {name}"),
                        format!("Could not deploy the requested application. Server responded with: {err}"),
                        NotificationLevel::Error,
                    );
                    return;
                }
            };

            {
                let mut store = store.lock().await;
                if let Some(app) = store.application_mut(key) {
                    app.constraints = constraints;
                }
                store.confirm_application(key, &assigned);
            }
            push_annotations(model, store, sends, key).await;
        });

        self.context.publish(&record.id, Produced::Application(key));
        self.applications.push(key);
        Ok(())
    }

    pub(super) async fn expose(&mut self, record: &Record) -> Result<(), ImportError> {
        let key = self.application_ref(record, record.arg(0)).await?;
        let name = {
            let mut store = self.services.store.lock().await;
            let Some(app) = store.application_mut(key) else {
                return Err(ImportError::invalid(&record.id, "application no longer exists"));
            };
            app.exposed = true;
            app.name.clone()
        };

        let model = Arc::clone(&self.services.model);
        let store = Arc::clone(&self.services.store);
        self.spawn(async move {
            if let Err(err) = model.expose(&name).await {
                let mut store = store.lock().await;
                if let Some(app) = store.application_mut(key) {
                    app.exposed = false;
                }
                store.notify(
                    format!("Error exposing {name}"),
                    format!("Could not expose the requested application. Server responded with: {err}"),
                    NotificationLevel::Error,
                );
            }
        });
        Ok(())
    }
}
