// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! `setAnnotations`

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::Run;
use crate::api::ModelApi;
use crate::error::ImportError;
use crate::store::{AppKey, DomainStore, SharedStore};
use crate::types::{Annotations, Arg, Record};

/// Canvas coordinate, stored either as a number or a numeric string
fn coordinate(annotations: &Annotations, key: &str) -> Option<i64> {
    match annotations.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(whole_coordinate)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(whole_coordinate))
        }
        _ => None,
    }
}

/// Truncate a fractional coordinate; non-finite and out-of-range values have none
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn whole_coordinate(value: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which no i64 holds
    (value.is_finite() && value >= i64::MIN as f64 && value < i64::MAX as f64)
        .then(|| value.trunc() as i64)
}

/// Move `annotations` diagonally by `offset` until no other application sits
/// at the same canvas position
pub fn shift_overlapping(store: &DomainStore, target: AppKey, annotations: &mut Annotations, offset: i64) {
    if offset == 0 {
        return;
    }
    // At most one step per application
    for _ in 0..=store.applications().count() {
        let (Some(x), Some(y)) = (coordinate(annotations, "gui-x"), coordinate(annotations, "gui-y")) else {
            return;
        };
        let overlaps = store.applications().any(|app| {
            app.key != target
                && coordinate(&app.annotations, "gui-x") == Some(x)
                && coordinate(&app.annotations, "gui-y") == Some(y)
        });
        if !overlaps {
            return;
        }
        // Past the edge of the coordinate space the position is left alone
        let (Some(x), Some(y)) = (x.checked_add(offset), y.checked_add(offset)) else {
            return;
        };
        annotations.insert("gui-x".into(), Value::String(x.to_string()));
        annotations.insert("gui-y".into(), Value::String(y.to_string()));
    }
}

impl Run<'_> {
    pub(super) async fn set_annotations(&mut self, record: &Record) -> Result<(), ImportError> {
        let entity_type = record.str_arg(1).unwrap_or_default();
        if !matches!(entity_type, "application" | "service") {
            debug!(record = %record.id, entity_type, "skipping annotations for unsupported entity");
            return Ok(());
        }

        let key = self.application_ref(record, record.arg(0)).await?;
        let mut annotations = match record.arg(2).and_then(Arg::as_literal) {
            Some(Value::Object(map)) => map.clone().into_iter().collect::<Annotations>(),
            None | Some(Value::Null) => Annotations::new(),
            Some(_) => return Err(ImportError::invalid(&record.id, "annotations must be an object")),
        };

        let confirmed = {
            let mut store = self.services.store.lock().await;
            shift_overlapping(
                &store,
                key,
                &mut annotations,
                self.services.settings.annotation_offset,
            );
            let Some(app) = store.application_mut(key) else {
                return Err(ImportError::invalid(&record.id, "application no longer exists"));
            };
            app.annotations = annotations;
            !app.pending
        };

        // Pending applications send their annotations once the deploy lands
        if confirmed {
            let model = Arc::clone(&self.services.model);
            let store = Arc::clone(&self.services.store);
            let sends = Arc::clone(&self.services.annotation_sends);
            self.spawn(push_annotations(model, store, sends, key));
        }
        Ok(())
    }
}

/// Send an application's current annotations to the model
///
/// The annotations are read from the store only once `sends` is held, so the
/// last request to reach the model always carries the newest set.
pub(super) async fn push_annotations(
    model: Arc<dyn ModelApi>,
    store: SharedStore,
    sends: Arc<Mutex<()>>,
    key: AppKey,
) {
    let _turn = sends.lock().await;
    let current = store
        .lock()
        .await
        .application(key)
        .filter(|app| !app.pending)
        .map(|app| (app.name.clone(), app.annotations.clone()));
    let Some((name, annotations)) = current else {
        return;
    };
    if let Err(err) = model.update_annotations(&name, "application", &annotations).await {
        warn!(application = %name, error = %err, "failed to store annotations");
    }
}
