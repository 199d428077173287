use anyhow::{bail, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::{allocate::AllocationPolicy, source::RosterSource, RosterErrors};

pub const DEFAULT_CONFIG_FILE: &str = "roster.json";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Path or URL of the roster export.
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default = "Config::default_export_dir")]
    pub export_dir: PathBuf,
    #[serde(default)]
    pub allocation: AllocationPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: None,
            export_dir: Self::default_export_dir(),
            allocation: AllocationPolicy::default(),
        }
    }
}

impl Config {
    fn default_export_dir() -> PathBuf {
        PathBuf::from(".")
    }

    /// Reads `path`, or `roster.json` in the working directory when no path is given.
    /// A missing default file yields the built-in defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        if !path.exists() {
            if explicit {
                bail!(RosterErrors::InvalidConfig(format!(
                    "config file not found at {}",
                    path.display()
                )));
            }
            debug!("no {} found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config = Self::from_json(&content)?;
        info!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|err| RosterErrors::InvalidConfig(err.to_string()))?;
        config.allocation.validate()?;
        Ok(config)
    }

    /// The configured source, overridden by `cli_source` when given.
    pub fn roster_source(&self, cli_source: Option<&str>) -> Result<RosterSource> {
        match cli_source.or(self.source.as_deref()) {
            Some(source) if !source.trim().is_empty() => Ok(source.parse()?),
            _ => bail!(RosterErrors::MissingSource),
        }
    }
}
