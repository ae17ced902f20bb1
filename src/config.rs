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

//! Policy settings stored as JSON in ~/.config/dptf/settings.json

use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use dptf_core::constants::policy::DEFAULT_TSTATE_UTILIZATION_THRESHOLD;
use dptf_error::{DptfError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Overrides the settings directory
pub const CONFIG_DIR_ENV: &str = "DPTF_CONFIG_DIR";
pub const SETTINGS_FILE: &str = "settings.json";

fn default_threshold() -> f64 {
    DEFAULT_TSTATE_UTILIZATION_THRESHOLD
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_commit_each_step() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySettings {
    /// Utilization fraction at or above which T-states may be entered
    #[serde(default = "default_threshold")]
    pub tstate_utilization_threshold: f64,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Commit after every limit/unlimit step instead of once per run
    #[serde(default = "default_commit_each_step")]
    pub commit_each_step: bool,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            tstate_utilization_threshold: default_threshold(),
            log_level: default_log_level(),
            commit_each_step: default_commit_each_step(),
        }
    }
}

impl PolicySettings {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.tstate_utilization_threshold) {
            return Err(DptfError::InvalidConfig {
                field: "tstate_utilization_threshold".into(),
                reason: format!("{} is outside [0, 1]", self.tstate_utilization_threshold),
            });
        }
        if self.log_level.trim().is_empty() {
            return Err(DptfError::InvalidConfig {
                field: "log_level".into(),
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }
}

/// `$DPTF_CONFIG_DIR`, else the user config directory joined with `dptf`
pub fn settings_dir() -> Result<PathBuf> {
    if let Ok(dir) = env::var(CONFIG_DIR_ENV) {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    dirs::config_dir()
        .map(|dir| dir.join("dptf"))
        .ok_or_else(|| DptfError::config("Could not determine config directory"))
}

pub fn settings_path() -> Result<PathBuf> {
    Ok(settings_dir()?.join(SETTINGS_FILE))
}

/// Load settings from `path`. A missing file yields defaults.
pub fn load_settings_from(path: &Path) -> Result<PolicySettings> {
    if !path.exists() {
        debug!("No settings at {}, using defaults", path.display());
        return Ok(PolicySettings::default());
    }

    let content = fs::read_to_string(path).map_err(|source| DptfError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let settings: PolicySettings = serde_json::from_str(&content)?;
    settings.validate()?;
    Ok(settings)
}

/// Load from an explicit path when given, else from the settings directory
pub fn load_settings(explicit: Option<&Path>) -> Result<PolicySettings> {
    match explicit {
        Some(path) => load_settings_from(path),
        None => load_settings_from(&settings_path()?),
    }
}

/// Write settings as pretty JSON through a temp file and rename
pub fn save_settings_to(path: &Path, settings: &PolicySettings) -> Result<()> {
    settings.validate()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| DptfError::FileWrite {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let json = serde_json::to_string_pretty(settings)?;
    let temp_path = path.with_extension("json.tmp");
    let write = |target: &Path| -> std::io::Result<()> {
        let mut file = fs::File::create(target)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()
    };
    write(&temp_path).map_err(|source| DptfError::FileWrite {
        path: temp_path.clone(),
        source,
    })?;
    fs::rename(&temp_path, path).map_err(|source| DptfError::FileWrite {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

pub fn save_settings(settings: &PolicySettings) -> Result<()> {
    save_settings_to(&settings_path()?, settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = load_settings_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings, PolicySettings::default());
        assert_eq!(settings.log_level, "info");
        assert!(settings.commit_each_step);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, r#"{ "tstate_utilization_threshold": 0.4 }"#).unwrap();

        let settings = load_settings_from(&path).unwrap();
        assert_eq!(settings.tstate_utilization_threshold, 0.4);
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);

        fs::write(&path, r#"{ "tstate_utilization_threshold": 1.5 }"#).unwrap();
        assert!(matches!(
            load_settings_from(&path).unwrap_err(),
            DptfError::InvalidConfig { .. }
        ));

        fs::write(&path, "not json").unwrap();
        assert!(matches!(load_settings_from(&path).unwrap_err(), DptfError::JsonParse(_)));
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE);
        let settings = PolicySettings {
            tstate_utilization_threshold: 0.25,
            log_level: "debug".into(),
            commit_each_step: false,
        };

        save_settings_to(&path, &settings).unwrap();
        assert!(!path.with_extension("json.tmp").exists());
        assert_eq!(load_settings_from(&path).unwrap(), settings);
    }

    #[test]
    #[serial]
    fn test_config_dir_from_env() {
        let dir = TempDir::new().unwrap();
        env::set_var(CONFIG_DIR_ENV, dir.path());
        assert_eq!(settings_path().unwrap(), dir.path().join(SETTINGS_FILE));

        let settings = PolicySettings {
            log_level: "warn".into(),
            ..Default::default()
        };
        save_settings(&settings).unwrap();
        assert_eq!(load_settings(None).unwrap(), settings);
        env::remove_var(CONFIG_DIR_ENV);
    }

    #[test]
    #[serial]
    fn test_explicit_path_wins_over_env() {
        let env_dir = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        env::set_var(CONFIG_DIR_ENV, env_dir.path());

        let path = other.path().join("custom.json");
        fs::write(&path, r#"{ "log_level": "trace" }"#).unwrap();
        assert_eq!(load_settings(Some(&path)).unwrap().log_level, "trace");
        env::remove_var(CONFIG_DIR_ENV);
    }
}
