//! Configuration file support for hmpi
//!
//! Loads project-specific configuration from JSON files.
//!
//! Search order:
//! 1. Explicit path (--config CLI flag)
//! 2. `.hmpirc.json` in project root
//! 3. `hmpi.config.json` in project root
//!
//! All fields are optional. CLI flags take precedence over config file values.

use crate::alerts::{AlertConfig, DEFAULT_CD_THRESHOLD, DEFAULT_HPI_THRESHOLD};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Database file used when none is configured
pub const DEFAULT_DATABASE: &str = "water_quality.db";

/// hmpi configuration loaded from a JSON config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HmpiConfig {
    /// SQLite database path (default: water_quality.db)
    #[serde(default)]
    pub database: Option<PathBuf>,

    /// Alert defaults, used until an alert configuration is saved
    #[serde(default)]
    pub alerts: Option<AlertDefaultsConfig>,
}

/// Alert defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlertDefaultsConfig {
    /// HPI alert threshold (default: 100.0)
    pub hpi_threshold: Option<f64>,
    /// Cd alert threshold (default: 3.0)
    pub cd_threshold: Option<f64>,
    #[serde(default)]
    pub email_recipients: Vec<String>,
    #[serde(default)]
    pub sms_recipients: Vec<String>,
}

/// Resolved configuration with defaults filled in
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub database_path: PathBuf,
    pub alert_defaults: AlertConfig,
    /// Path the config was loaded from (None if defaults)
    pub config_path: Option<PathBuf>,
}

impl HmpiConfig {
    /// Validate the configuration for logical errors
    pub fn validate(&self) -> Result<()> {
        if let Some(ref db) = self.database {
            if db.as_os_str().is_empty() {
                anyhow::bail!("database must not be empty");
            }
        }

        if self.alerts.is_some() {
            self.alert_defaults()
                .validate()
                .context("invalid alerts section")?;
        }

        Ok(())
    }

    /// Resolve config into the form used at runtime
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        self.validate()?;

        Ok(ResolvedConfig {
            database_path: self
                .database
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE)),
            alert_defaults: self.alert_defaults(),
            config_path: None,
        })
    }

    fn alert_defaults(&self) -> AlertConfig {
        match &self.alerts {
            Some(a) => AlertConfig {
                hpi_threshold: a.hpi_threshold.unwrap_or(DEFAULT_HPI_THRESHOLD),
                cd_threshold: a.cd_threshold.unwrap_or(DEFAULT_CD_THRESHOLD),
                email_recipients: a.email_recipients.clone(),
                sms_recipients: a.sms_recipients.clone(),
                ..AlertConfig::default()
            },
            None => AlertConfig::default(),
        }
    }
}

impl ResolvedConfig {
    /// Build a ResolvedConfig with all defaults (no config file)
    pub fn defaults() -> Result<Self> {
        HmpiConfig::default().resolve()
    }
}

/// Discover and load a config file from the project root
///
/// Returns `None` if no config file is found (use defaults).
pub fn discover_config(project_root: &Path) -> Result<Option<(HmpiConfig, PathBuf)>> {
    for name in [".hmpirc.json", "hmpi.config.json"] {
        let path = project_root.join(name);
        if path.exists() {
            let config = load_config_file(&path)?;
            return Ok(Some((config, path)));
        }
    }
    Ok(None)
}

/// Load config from an explicit file path
pub fn load_config_file(path: &Path) -> Result<HmpiConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: HmpiConfig = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("invalid config in: {}", path.display()))?;

    Ok(config)
}

/// Load and resolve config for a project
///
/// If `config_path` is provided, loads from that file.
/// Otherwise, discovers config from the project root.
/// Returns default config if nothing is found.
/// A relative database path is taken relative to `project_root`.
pub fn load_and_resolve(project_root: &Path, config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let (config, source_path) = if let Some(path) = config_path {
        let config = load_config_file(path)?;
        (config, Some(path.to_path_buf()))
    } else {
        match discover_config(project_root)? {
            Some((config, path)) => (config, Some(path)),
            None => (HmpiConfig::default(), None),
        }
    };

    let mut resolved = config.resolve()?;
    if resolved.database_path.is_relative() {
        resolved.database_path = project_root.join(&resolved.database_path);
    }
    if let Some(ref path) = source_path {
        tracing::debug!(path = %path.display(), "loaded config");
    }
    resolved.config_path = source_path;
    Ok(resolved)
}
