// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Import command - runs a bundle or changeset against a sandbox model

use anyhow::{bail, Context, Result};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use super::Output;
use crate::api::ChangesetGenerator;
use crate::bundleservice::BundleServiceClient;
use crate::config::ImporterConfig;
use crate::importer::{BundleImporter, Collaborators, RunOutcome};
use crate::ingest::BundleFile;
use crate::sandbox::{FixtureCharmStore, SandboxModel, StaticGenerator};
use crate::store::{Application, DomainStore, Machine, Notification, NotificationLevel, Relation, Unit};
use crate::types::Charm;

/// Arguments of the import command
#[derive(Debug, Clone)]
pub struct ImportArgs {
    /// Bundle or changeset file
    pub path: PathBuf,
    /// Charm fixture for the charm store
    pub charms: Option<PathBuf>,
    /// Bundle service override
    pub bundle_service: Option<String>,
    /// Charm ids to refuse
    pub unavailable_charms: Vec<String>,
}

#[derive(Serialize)]
struct ImportSummary<'a> {
    outcome: &'static str,
    notifications: &'a [Notification],
    charms: Vec<&'a Charm>,
    applications: Vec<&'a Application>,
    machines: Vec<&'a Machine>,
    units: Vec<&'a Unit>,
    relations: Vec<&'a Relation>,
}

/// Run the import command
pub fn run(config: &ImporterConfig, args: ImportArgs, output: Output) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(import(config, args, output))
}

async fn import(config: &ImporterConfig, args: ImportArgs, output: Output) -> Result<()> {
    let mut charm_store = match &args.charms {
        Some(path) => FixtureCharmStore::from_file(path)?,
        None => FixtureCharmStore::new(),
    };
    for id in args.unavailable_charms {
        charm_store = charm_store.unavailable(id);
    }

    let generator: Arc<dyn ChangesetGenerator> =
        match args.bundle_service.or_else(|| config.bundle_service_url.clone()) {
            Some(url) => Arc::new(
                BundleServiceClient::new(url, config.bundle_service_timeout())
                    .context("Failed to build bundle service client")?,
            ),
            None => Arc::new(StaticGenerator::unavailable()),
        };

    let store = DomainStore::new().shared();
    let mut importer = BundleImporter::new(
        Collaborators {
            generator,
            model: Arc::new(SandboxModel::new()),
            charm_store: Arc::new(charm_store),
        },
        Arc::clone(&store),
        config.import_settings(),
    );

    let file = BundleFile::read(&args.path)
        .await
        .with_context(|| format!("Failed to load {}", args.path.display()))?;
    info!(file = %file.name, "importing");

    let report = importer.import_bundle_file(&file).await;
    info!(pending = report.pending_confirmations(), "waiting for model confirmations");
    let outcome = report.settle().await;
    let store = store.lock().await;

    let label = match &outcome {
        RunOutcome::Completed { .. } => "completed",
        RunOutcome::Halted { .. } => "halted",
        RunOutcome::NotStarted { .. } => "not-started",
    };
    if output.json {
        let summary = ImportSummary {
            outcome: label,
            notifications: store.notifications(),
            charms: store.charms().collect(),
            applications: store.applications().collect(),
            machines: store.machines().collect(),
            units: store.units().collect(),
            relations: store.relations().collect(),
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_human(&store, output);
    }

    match outcome {
        RunOutcome::Completed { .. } => Ok(()),
        RunOutcome::Halted { record_id, error } => {
            bail!("Import halted at {record_id}: {error}")
        }
        RunOutcome::NotStarted { error } => bail!("Import did not start: {error}"),
    }
}

fn print_human(store: &DomainStore, output: Output) {
    for notification in store.notifications() {
        let title = match (notification.level, output.color) {
            (NotificationLevel::Error, true) => notification.title.red().to_string(),
            (NotificationLevel::Important, true) => notification.title.bold().to_string(),
            _ => notification.title.clone(),
        };
        println!("[{}] {title}: {}", notification.level, notification.message);
    }

    println!();
    for charm in store.charms() {
        println!("charm {}", charm.id);
    }
    for app in store.applications() {
        let units: Vec<&str> = store
            .units()
            .filter(|u| u.application == app.key)
            .map(|u| u.display_name.as_str())
            .collect();
        println!(
            "application {} ({}){}{}",
            app.name,
            app.charm,
            if app.exposed { " exposed" } else { "" },
            if units.is_empty() {
                String::new()
            } else {
                format!(" units: {}", units.join(", "))
            }
        );
    }
    for machine in store.machines() {
        println!(
            "machine {}{}",
            machine.id,
            if machine.pending { " (pending)" } else { "" }
        );
    }
    for relation in store.relations() {
        println!("relation {}", relation.display_name);
    }
}
