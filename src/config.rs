//! Funnel configuration: `funnel.toml` merged with CLI overrides.
//!
//! The on-disk/CLI shape is [`RawConfig`]; validation turns it into a
//! [`FunnelConfig`] or fails with a [`ConfigError`]. Exactly one of
//! `include`/`exclude` must be set - knowing one answers the other.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Configuration-related errors. Fatal at construction, never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("config file parsing error")]
    Toml(#[from] toml::de::Error),

    #[error("config validation error: {0}")]
    Validation(String),
}

/// Which partition gets materialized into the output directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionMode {
    /// Materialize the dependency set.
    Include,
    /// Materialize everything but the dependency set.
    Exclude,
}

impl PartitionMode {
    pub fn is_include(self) -> bool {
        matches!(self, Self::Include)
    }
}

/// Unvalidated configuration as read from `funnel.toml` or assembled
/// from CLI flags.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    /// Entry file, relative to the input root.
    pub entry: Option<String>,

    /// Module specifiers excluded from resolution.
    #[serde(default)]
    pub external: Vec<String>,

    pub include: Option<bool>,
    pub exclude: Option<bool>,

    /// Module file extension appended during resolution (default "js").
    pub extension: Option<String>,

    /// Pass-through labels for host tooling; no behavioral effect.
    pub name: Option<String>,
    pub annotation: Option<String>,
}

impl RawConfig {
    /// Parse a `funnel.toml` file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Io(path.into(), e))?;
        Ok(toml::from_str(&text)?)
    }
}

/// Validated funnel options.
#[derive(Debug, Clone)]
pub struct FunnelConfig {
    pub entry: String,
    pub external: Vec<String>,
    pub mode: PartitionMode,
    pub extension: String,
    pub name: Option<String>,
    pub annotation: Option<String>,
}

impl FunnelConfig {
    pub fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let mode = match (raw.include.unwrap_or(false), raw.exclude.unwrap_or(false)) {
            (true, false) => PartitionMode::Include,
            (false, true) => PartitionMode::Exclude,
            _ => {
                return Err(ConfigError::Validation(
                    "must specify exactly one of `include` or `exclude`".to_string(),
                ));
            }
        };

        let Some(entry) = raw.entry else {
            return Err(ConfigError::Validation("`entry` is required".to_string()));
        };
        if Path::new(&entry).is_absolute() {
            return Err(ConfigError::Validation(format!(
                "`entry` must be relative to the input root, got `{entry}`"
            )));
        }

        Ok(Self {
            entry,
            external: raw.external,
            mode,
            extension: raw.extension.unwrap_or_else(|| "js".to_string()),
            name: raw.name,
            annotation: raw.annotation,
        })
    }
}
