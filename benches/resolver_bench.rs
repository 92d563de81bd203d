// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
#![allow(clippy::unwrap_used)]

//! Changeset ordering and sandbox import benchmarks
//!
//! ```bash
//! cargo bench --bench resolver_bench
//! ```

use bundle_importer::executor::ImportSettings;
use bundle_importer::graph::sort_records;
use bundle_importer::importer::{BundleImporter, Collaborators};
use bundle_importer::sandbox::{FixtureCharmStore, SandboxModel, StaticGenerator};
use bundle_importer::store::DomainStore;
use bundle_importer::types::{Arg, Charm, Method, Record};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Value};
use std::sync::Arc;

// ============================================================================
// Changeset Builders
// ============================================================================

/// `applications` deploys of one charm, each with a machine and a unit,
/// listed back to front so every record needs reordering
fn reversed_changeset(applications: usize) -> Vec<Record> {
    let mut records = vec![Record::new("addCharm-0", Method::AddCharm).with_args(["cs:trusty/mysql-38"])];
    for n in 0..applications {
        let deploy = format!("deploy-{}", 3 * n + 1);
        let machine = format!("addMachines-{}", 3 * n + 2);
        let unit = format!("addUnit-{}", 3 * n + 3);
        records.push(
            Record::new(&deploy, Method::Deploy)
                .with_args([
                    Arg::from("$addCharm-0"),
                    Arg::from("trusty"),
                    Arg::from(format!("mysql{n}").as_str()),
                    Arg::Literal(json!({})),
                    Arg::Literal(Value::Null),
                ])
                .requiring(["addCharm-0"]),
        );
        records.push(Record::new(&machine, Method::AddMachines).with_args([json!({})]));
        records.push(
            Record::new(&unit, Method::AddUnit)
                .with_args([
                    Arg::from(format!("${deploy}").as_str()),
                    Arg::Literal(json!(1)),
                    Arg::from(format!("${machine}").as_str()),
                ])
                .requiring([deploy, machine]),
        );
    }
    records.reverse();
    records
}

fn charm_store() -> FixtureCharmStore {
    FixtureCharmStore::with_charms([Charm {
        id: "cs:trusty/mysql-38".into(),
        name: "mysql".into(),
        series: vec!["trusty".into()],
        ..Charm::default()
    }])
}

// ============================================================================
// Benchmarks
// ============================================================================

fn benchmark_sort_records(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort_records");
    for applications in [10, 100, 1000] {
        let records = reversed_changeset(applications);
        group.throughput(Throughput::Elements(records.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(records.len()),
            &records,
            |b, records| b.iter(|| sort_records(black_box(records.clone())).unwrap()),
        );
    }
    group.finish();
}

fn benchmark_sandbox_import(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let mut group = c.benchmark_group("sandbox_import");
    for applications in [10, 100] {
        let records = reversed_changeset(applications);
        group.throughput(Throughput::Elements(records.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(records.len()),
            &records,
            |b, records| {
                b.iter(|| {
                    runtime.block_on(async {
                        let mut importer = BundleImporter::new(
                            Collaborators {
                                generator: Arc::new(StaticGenerator::records(Vec::new())),
                                model: Arc::new(SandboxModel::new()),
                                charm_store: Arc::new(charm_store()),
                            },
                            DomainStore::new().shared(),
                            ImportSettings::default(),
                        );
                        importer
                            .import_bundle_dry_run(black_box(records.clone()))
                            .await
                            .settle()
                            .await
                    })
                });
            },
        );
    }
    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(benches, benchmark_sort_records, benchmark_sandbox_import);
criterion_main!(benches);
