// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! `config`: show the effective configuration

use anyhow::{Context, Result};

use super::Output;
use crate::config::{default_config_path, ImporterConfig};

/// What `config` prints
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ConfigAction {
    /// Effective configuration
    Show,
    /// Default config file location
    Path,
}

/// Print the effective configuration or its default location
pub fn run(config: &ImporterConfig, action: ConfigAction, output: Output) -> Result<()> {
    match action {
        ConfigAction::Show if output.json => {
            println!(
                "{}",
                serde_json::to_string_pretty(config).context("Failed to serialize config")?
            );
        }
        ConfigAction::Show => {
            print!(
                "{}",
                toml::to_string_pretty(config).context("Failed to serialize config")?
            );
        }
        ConfigAction::Path => match default_config_path() {
            Some(path) => println!("{}", path.display()),
            None => println!("(no config directory on this platform)"),
        },
    }
    Ok(())
}
