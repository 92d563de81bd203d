// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! `addCharm`

use std::sync::Arc;
use tracing::debug;

use super::{Produced, Run};
use crate::error::ImportError;
use crate::store::NotificationLevel;
use crate::types::Record;

/// Short charm name from a url like `cs:~user/trusty/mysql-38`
#[must_use]
pub fn charm_name_from_id(id: &str) -> &str {
    let path = id.split_once(':').map_or(id, |(_, rest)| rest);
    let last = path.rsplit('/').next().unwrap_or(path);
    match last.rsplit_once('-') {
        Some((name, revision)) if !revision.is_empty() && revision.chars().all(|c| c.is_ascii_digit()) => name,
        _ => last,
    }
}

impl Run<'_> {
    pub(super) async fn add_charm(&mut self, record: &Record) -> Result<(), ImportError> {
        let requested = record
            .str_arg(0)
            .ok_or_else(|| ImportError::invalid(&record.id, "addCharm needs a charm id"))?;

        let charm_store = Arc::clone(&self.services.charm_store);
        let canonical = charm_store
            .canonical_id(requested)
            .await
            .map_err(|source| ImportError::InvalidCharmId {
                charm: requested.to_string(),
                source,
            })?;
        let mut charm = charm_store
            .entity(&canonical)
            .await
            .map_err(|source| ImportError::CharmUnavailable {
                charm: canonical.clone(),
                source,
            })?;

        if charm.id.is_empty() {
            charm.id.clone_from(&canonical);
        }
        if charm.name.is_empty() {
            charm.name = charm_name_from_id(&charm.id).to_string();
        }
        charm.loaded = true;

        if !self.services.store.lock().await.add_charm(charm.clone()) {
            debug!(charm = %charm.id, "charm already known");
        }

        let model = Arc::clone(&self.services.model);
        let store = Arc::clone(&self.services.store);
        let url = canonical;
        self.spawn(async move {
            if let Err(err) = model.add_charm(&url).await {
                store.lock().await.notify(
                    "Error adding charm",
                    format!("Could not add the requested charm {url}. Server responded with: {err}"),
                    NotificationLevel::Error,
                );
            }
        });

        self.context.publish(&record.id, Produced::Charm(charm));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::charm_name_from_id;

    #[test]
    fn test_charm_name_from_id() {
        assert_eq!(charm_name_from_id("cs:trusty/mysql-38"), "mysql");
        assert_eq!(charm_name_from_id("cs:~who/xenial/haproxy-7"), "haproxy");
        assert_eq!(charm_name_from_id("cs:apache2"), "apache2");
        assert_eq!(charm_name_from_id("cs:trusty/juju-gui"), "juju-gui");
        assert_eq!(charm_name_from_id("local:trusty/juju-gui-3"), "juju-gui");
    }
}
