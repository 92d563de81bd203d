// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! The import driver: entry points, ordering, sequential execution and the
//! completion signal

use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api::{ChangesetGenerator, ChangesetRequest, CharmStore, ModelApi};
use crate::error::ImportError;
use crate::executor::{ImportSettings, Run, Services};
use crate::graph::sort_records;
use crate::ingest::{ensure_v4_format, BundleFile, BundleFileKind};
use crate::store::{Application, NotificationLevel, SharedStore};
use crate::types::Record;

/// Capacity of the completion event channel
const EVENT_CAPACITY: usize = 16;

/// Broadcast to subscribers when a run finishes issuing every record
#[derive(Debug, Clone, PartialEq)]
pub enum ImportEvent {
    /// All records executed; carries the applications the run deployed
    BundleImportComplete {
        /// Application snapshots, in deployment order
        applications: Vec<Application>,
    },
}

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    /// Every record was executed
    Completed {
        /// Applications deployed by the run, as they were when it finished
        applications: Vec<Application>,
    },
    /// A record failed; nothing after it ran
    Halted {
        /// The failing record
        record_id: String,
        /// Why it failed
        error: ImportError,
    },
    /// No record ran
    NotStarted {
        /// Why the run never began
        error: ImportError,
    },
}

/// Result of an import call
///
/// Remote confirmations keep arriving after the outcome is known;
/// [`ImportReport::settle`] waits for them.
#[derive(Debug)]
pub struct ImportReport {
    outcome: RunOutcome,
    pending: Vec<JoinHandle<()>>,
}

impl ImportReport {
    fn not_started(error: ImportError) -> Self {
        Self {
            outcome: RunOutcome::NotStarted { error },
            pending: Vec::new(),
        }
    }

    /// The outcome of issuing the records
    #[must_use]
    pub fn outcome(&self) -> &RunOutcome {
        &self.outcome
    }

    /// Whether every record was executed
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed { .. })
    }

    /// Background confirmations still tracked
    #[must_use]
    pub fn pending_confirmations(&self) -> usize {
        self.pending.iter().filter(|h| !h.is_finished()).count()
    }

    /// Wait for every background confirmation, then return the outcome
    pub async fn settle(self) -> RunOutcome {
        for handle in self.pending {
            if let Err(err) = handle.await {
                warn!(error = %err, "background confirmation did not finish");
            }
        }
        self.outcome
    }
}

/// Remote collaborators of an importer
#[derive(Clone)]
pub struct Collaborators {
    /// Bundle to changeset conversion
    pub generator: Arc<dyn ChangesetGenerator>,
    /// Live model
    pub model: Arc<dyn ModelApi>,
    /// Charm metadata
    pub charm_store: Arc<dyn CharmStore>,
}

/// Imports bundles and changesets into a model
pub struct BundleImporter {
    generator: Arc<dyn ChangesetGenerator>,
    services: Services,
    events: broadcast::Sender<ImportEvent>,
}

impl BundleImporter {
    /// Create an importer writing into `store`
    #[must_use]
    pub fn new(collaborators: Collaborators, store: SharedStore, settings: ImportSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            generator: collaborators.generator,
            services: Services {
                model: collaborators.model,
                charm_store: collaborators.charm_store,
                store,
                settings,
                annotation_sends: Arc::new(Mutex::new(())),
            },
            events,
        }
    }

    /// The store this importer writes into
    #[must_use]
    pub fn store(&self) -> SharedStore {
        Arc::clone(&self.services.store)
    }

    /// Receive [`ImportEvent`]s from runs started after this call
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ImportEvent> {
        self.events.subscribe()
    }

    /// Import a bundle YAML document
    pub async fn import_bundle_yaml(&mut self, bundle_yaml: &str) -> ImportReport {
        self.notify("Fetching bundle data", "Fetching detailed bundle data, this may take some time", NotificationLevel::Important)
            .await;
        let request = ChangesetRequest::Yaml(ensure_v4_format(bundle_yaml));
        self.fetch_dry_run(request).await
    }

    /// Import a changeset prepared earlier and identified by a token
    pub async fn import_changes_token(&mut self, token: &str) -> ImportReport {
        self.notify("Fetching bundle data", "Fetching detailed bundle data, this may take some time", NotificationLevel::Important)
            .await;
        self.fetch_dry_run(ChangesetRequest::Token(token.to_string()))
            .await
    }

    /// Import a file: YAML bundles go through the generator, JSON is taken as
    /// a changeset
    pub async fn import_bundle_file(&mut self, file: &BundleFile) -> ImportReport {
        let kind = match file.kind() {
            Ok(kind) => kind,
            Err(error) => return self.refuse(error).await,
        };
        self.notify(
            "Processing File",
            "Changeset processing started.",
            NotificationLevel::Important,
        )
        .await;
        match kind {
            BundleFileKind::Yaml => self.import_bundle_yaml(&file.contents).await,
            BundleFileKind::Json => match serde_json::from_str::<Vec<Record>>(&file.contents) {
                Ok(records) => self.import_bundle_dry_run(records).await,
                Err(err) => self.refuse(ImportError::MalformedChangeset(err)).await,
            },
        }
    }

    /// Order and execute a list of records
    pub async fn import_bundle_dry_run(&mut self, records: Vec<Record>) -> ImportReport {
        let ordered = match sort_records(records) {
            Ok(ordered) => ordered,
            Err(err) => return self.refuse(err.into()).await,
        };
        info!(records = ordered.len(), "executing changeset");

        let mut run = Run::new(&self.services);
        for record in &ordered {
            if let Err(error) = run.execute(record).await {
                let (title, message) = error.notice();
                self.notify(title, message, NotificationLevel::Error).await;
                warn!(record = %record.id, error = %error, "import halted");
                return ImportReport {
                    outcome: RunOutcome::Halted {
                        record_id: record.id.clone(),
                        error,
                    },
                    pending: run.into_background(),
                };
            }
        }

        let applications: Vec<Application> = {
            let store = self.services.store.lock().await;
            run.applications()
                .iter()
                .filter_map(|key| store.application(*key).cloned())
                .collect()
        };
        let pending = run.into_background();

        self.notify("Import Complete", "ChangeSet import complete.", NotificationLevel::Important)
            .await;
        info!(applications = applications.len(), "changeset import complete");
        // No subscribers is fine
        let _ = self.events.send(ImportEvent::BundleImportComplete {
            applications: applications.clone(),
        });

        ImportReport {
            outcome: RunOutcome::Completed { applications },
            pending,
        }
    }

    async fn fetch_dry_run(&mut self, request: ChangesetRequest) -> ImportReport {
        match self.generator.generate(request).await {
            Ok(records) => self.import_bundle_dry_run(records).await,
            Err(errors) => self.refuse(errors.into()).await,
        }
    }

    async fn refuse(&self, error: ImportError) -> ImportReport {
        let (title, message) = error.notice();
        self.notify(title, message, NotificationLevel::Error).await;
        warn!(error = %error, "import not started");
        ImportReport::not_started(error)
    }

    async fn notify(&self, title: impl Into<String>, message: impl Into<String>, level: NotificationLevel) {
        self.services.store.lock().await.notify(title, message, level);
    }
}
