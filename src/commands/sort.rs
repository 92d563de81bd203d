// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Sort command - prints a changeset in dependency order

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

use super::Output;
use crate::graph::ChangeSetGraph;
use crate::types::Record;

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SortFormat {
    /// Numbered list
    Text,
    /// Ordered records as JSON
    Json,
    /// Graphviz DOT of the dependency graph
    Dot,
}

#[derive(Serialize)]
struct SortedChangeset<'a> {
    order: Vec<&'a str>,
    records: Vec<&'a Record>,
}

/// Run the sort command
pub fn run(path: &Path, format: SortFormat, output: Output) -> Result<()> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let records: Vec<Record> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse changeset {}", path.display()))?;

    let graph = ChangeSetGraph::build(&records)?;
    if format == SortFormat::Dot {
        print!("{}", graph.to_dot());
        return Ok(());
    }

    let order = graph.execution_order()?;
    info!(records = graph.node_count(), edges = graph.edge_count(), "changeset ordered");
    let sorted: Vec<&Record> = order.iter().map(|&position| &records[position]).collect();

    if format == SortFormat::Json || output.json {
        let body = SortedChangeset {
            order: sorted.iter().map(|r| r.id.as_str()).collect(),
            records: sorted,
        };
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let width = sorted.len().to_string().len();
    for (step, record) in sorted.iter().enumerate() {
        let id = if output.color {
            record.id.bold().to_string()
        } else {
            record.id.clone()
        };
        if record.requires.is_empty() {
            println!("{:>width$}. {id}", step + 1);
        } else {
            println!(
                "{:>width$}. {id}  (after {})",
                step + 1,
                record.requires.join(", ")
            );
        }
    }
    Ok(())
}
