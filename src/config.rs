//! Runtime configuration, read from TOML
use crate::error::{Result, TradeError};
use crate::negotiation::CancelPolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_CANCEL_COOLDOWN_MINUTES: u32 = 30;
pub const DEFAULT_CONFLICT_RETRIES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory of the sled database holding trade records.
    pub db_path: PathBuf,
    pub negotiation: NegotiationConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NegotiationConfig {
    /// Minutes the counterparty must wait after creation before cancelling.
    pub cancel_cooldown_minutes: u32,
    pub cancel_policy: CancelPolicy,
    /// How many times a transition is re-evaluated after losing a version race.
    pub conflict_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("barter.db"),
            negotiation: NegotiationConfig::default(),
        }
    }
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            cancel_cooldown_minutes: DEFAULT_CANCEL_COOLDOWN_MINUTES,
            cancel_policy: CancelPolicy::default(),
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
        }
    }
}

impl Config {
    /// Loads the config at `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path).map_err(|err| {
            tracing::warn!("Failed to read config at {:?}: {}", path, err);
            TradeError::Config(format!("{}: {err}", path.display()))
        })?;

        Self::from_toml_str(&content).inspect_err(|err| {
            tracing::warn!("Failed to parse config at {:?}: {}", path, err);
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|err| TradeError::Config(err.to_string()))
    }
}
