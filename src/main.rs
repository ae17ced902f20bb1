/*
 * This file is part of dptf.
 *
 * Copyright (C) 2025 dptf contributors
 *
 * dptf is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * dptf is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with dptf. If not, see <https://www.gnu.org/licenses/>.
 */

mod cli;

use anyhow::Context;
use clap::Parser;
use tracing::debug;

use dptf::config;
use dptf::logger;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Settings pick the default log level, so a load failure is reported
    // once logging is up
    let loaded = config::load_settings(cli.config.as_deref());
    let level = cli
        .log_level
        .clone()
        .or_else(|| loaded.as_ref().ok().map(|s| s.log_level.clone()))
        .unwrap_or_else(|| "info".to_string());
    logger::init_logging(&level);

    let settings = loaded.context("Failed to load policy settings")?;
    debug!("Effective settings: {:?}", settings);

    cli::run_cli(&cli, settings)
}
