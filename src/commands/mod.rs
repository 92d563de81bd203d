// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Command implementations

pub mod completions;
pub mod config;
pub mod import;
pub mod sort;

/// Output preferences shared by every command
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    /// Print machine-readable JSON
    pub json: bool,
    /// Colorize human output
    pub color: bool,
}
