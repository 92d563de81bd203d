// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Bundle importer CLI - order and run Juju bundle changesets

use anyhow::Result;
use bundle_importer::commands;
use bundle_importer::config;
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bundle-importer")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long)]
    quiet: bool,

    /// Configuration file path
    #[arg(short, long, env = "BUNDLE_IMPORTER_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR")]
    no_color: bool,

    /// Output in JSON format
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a changeset in execution order
    Sort {
        /// Changeset JSON file
        path: std::path::PathBuf,

        /// Output format (text, json, dot)
        #[arg(short, long, default_value = "text")]
        format: commands::sort::SortFormat,
    },

    /// Import a bundle (.yaml) or changeset (.json) into a sandbox model
    Import {
        /// Bundle or changeset file
        path: std::path::PathBuf,

        /// Charm fixture JSON served as the charm store
        #[arg(long)]
        charms: Option<std::path::PathBuf>,

        /// Bundle service base url (overrides config)
        #[arg(long)]
        bundle_service: Option<String>,

        /// Charm ids the charm store should refuse
        #[arg(long = "unavailable-charm")]
        unavailable_charms: Vec<String>,
    },

    /// Show configuration
    Config {
        /// Action: show, path
        #[arg(default_value = "show")]
        action: commands::config::ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: clap_complete::Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;

    // Initialize logging
    let log_level = match cli.verbose {
        0 if cli.quiet => "error",
        0 => config.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let output = commands::Output {
        json: cli.json,
        color: !cli.no_color,
    };

    // Execute command
    match cli.command {
        Commands::Sort { path, format } => commands::sort::run(&path, format, output),
        Commands::Import {
            path,
            charms,
            bundle_service,
            unavailable_charms,
        } => commands::import::run(
            &config,
            commands::import::ImportArgs {
                path,
                charms,
                bundle_service,
                unavailable_charms,
            },
            output,
        ),
        Commands::Config { action } => commands::config::run(&config, action, output),
        Commands::Completions { shell } => {
            commands::completions::run(shell, &mut Cli::command())
        }
    }
}
