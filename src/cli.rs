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

//! Command Line Interface

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use dptf::config::{self, PolicySettings};
use dptf::platform::PlatformDescription;
use dptf::scenario::Session;
use dptf_core::to_pretty_json;

#[derive(Parser)]
#[command(name = "dptfctl")]
#[command(version)]
#[command(about = "dptfctl - Drive control-knob arbitration on a simulated platform")]
#[command(long_about = "dptfctl - Drive control-knob arbitration on a simulated platform

Loads a JSON platform description, binds a proxy to every domain and offers
limit or unlimit steps on behalf of one target. Results are printed as JSON.

EXAMPLES:
    dptfctl --platform demos/platform.json status
    dptfctl --platform demos/platform.json limit --target 1 --steps 3
    dptfctl --platform demos/platform.json cycle --target 1 --steps 5
    dptfctl settings show

ENVIRONMENT VARIABLES:
    RUST_LOG=debug         Override the log filter
    DPTF_CONFIG_DIR=<dir>  Directory holding settings.json

FILES:
    ~/.config/dptf/settings.json      Policy settings")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Platform description (JSON)
    #[arg(long, global = true)]
    pub platform: Option<PathBuf>,

    /// Settings file, instead of the config directory
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "dptf_core=trace"
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the status of every participant after initialization
    Status,

    /// Offer limit steps for one target
    Limit {
        #[arg(long, default_value_t = 0)]
        target: u32,
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },

    /// Offer unlimit steps for one target
    Unlimit {
        #[arg(long, default_value_t = 0)]
        target: u32,
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },

    /// Limit then unlimit by the same number of steps
    Cycle {
        #[arg(long, default_value_t = 0)]
        target: u32,
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },

    /// Settings management
    #[command(subcommand)]
    Settings(SettingsCommands),
}

#[derive(Subcommand)]
pub enum SettingsCommands {
    /// Show effective settings as JSON
    Show,
    /// Write the effective settings back to the settings file
    Save,
    /// Print the settings file path
    Path,
}

// ============================================================================
// CLI Execution
// ============================================================================

pub fn run_cli(cli: &Cli, settings: PolicySettings) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Status => cmd_status(cli, settings),
        Commands::Limit { target, steps } => cmd_run(cli, settings, |session| session.limit(*target, *steps), *target),
        Commands::Unlimit { target, steps } => {
            cmd_run(cli, settings, |session| session.unlimit(*target, *steps), *target)
        }
        Commands::Cycle { target, steps } => cmd_run(cli, settings, |session| session.cycle(*target, *steps), *target),
        Commands::Settings(sub) => cmd_settings(cli, sub, settings),
    }
}

fn open_session(cli: &Cli, settings: PolicySettings) -> anyhow::Result<Session> {
    let path = cli
        .platform
        .as_deref()
        .context("--platform <path> is required for this command")?;
    let description = PlatformDescription::load(path)
        .with_context(|| format!("Failed to load platform description {}", path.display()))?;
    let mut session = Session::new(&description, settings)?;
    session.initialize()?;
    Ok(session)
}

// ============================================================================
// Status Command
// ============================================================================

fn cmd_status(cli: &Cli, settings: PolicySettings) -> anyhow::Result<()> {
    let session = open_session(cli, settings)?;
    println!("{}", to_pretty_json(&session.status())?);
    Ok(())
}

// ============================================================================
// Limit / Unlimit Commands
// ============================================================================

fn cmd_run<F>(cli: &Cli, settings: PolicySettings, run: F, target: u32) -> anyhow::Result<()>
where
    F: FnOnce(&mut Session) -> dptf_error::Result<Vec<dptf::scenario::StepReport>>,
{
    let mut session = open_session(cli, settings)?;
    let steps = run(&mut session)?;
    info!("Ran {} step(s) for target {}", steps.len(), target);
    println!("{}", to_pretty_json(&session.report(target, steps))?);
    Ok(())
}

// ============================================================================
// Settings Commands
// ============================================================================

fn cmd_settings(cli: &Cli, cmd: &SettingsCommands, settings: PolicySettings) -> anyhow::Result<()> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => config::settings_path()?,
    };
    match cmd {
        SettingsCommands::Show => println!("{}", to_pretty_json(&settings)?),
        SettingsCommands::Save => {
            config::save_settings_to(&path, &settings)?;
            println!("Settings saved to {}", path.display());
        }
        SettingsCommands::Path => println!("{}", path.display()),
    }
    Ok(())
}
