// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! `completions`: shell completion scripts

use anyhow::Result;
use clap_complete::Shell;

/// Write completions for `shell` to stdout
pub fn run(shell: Shell, command: &mut clap::Command) -> Result<()> {
    let name = command.get_name().to_string();
    clap_complete::generate(shell, command, name, &mut std::io::stdout());
    Ok(())
}
