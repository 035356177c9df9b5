//! Agent configuration.
//!
//! An agent needs a name, the transport address it listens on, the seed its
//! default identifier is derived from and its inbox capacity. Load from
//! environment variables or from a YAML document.

use std::path::Path;

use claimex_crypto::Ed25519KeyPair;
use serde::Deserialize;

/// Default inbox capacity.
pub const DEFAULT_INBOX_CAPACITY: usize = 64;

/// Configuration of one agent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AgentConfig {
    /// Agent name, e.g. `Faber College`.
    pub name: String,
    /// Transport address. Defaults to the name.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Seed phrase for the default identifier. Defaults to the name.
    #[serde(default)]
    pub seed: Option<String>,
    /// Inbox capacity.
    #[serde(default = "default_inbox_capacity")]
    pub inbox_capacity: usize,
}

fn default_inbox_capacity() -> usize {
    DEFAULT_INBOX_CAPACITY
}

impl AgentConfig {
    /// A configuration with defaults for everything but the name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: None,
            seed: None,
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `CLAIMEX_AGENT_NAME` (required)
    /// - `CLAIMEX_AGENT_ENDPOINT` (default: the name)
    /// - `CLAIMEX_AGENT_SEED` (default: the name)
    /// - `CLAIMEX_INBOX_CAPACITY` (default: 64)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let name = var("CLAIMEX_AGENT_NAME")
            .filter(|n| !n.trim().is_empty())
            .ok_or(ConfigError::MissingName)?;
        let inbox_capacity = match var("CLAIMEX_INBOX_CAPACITY") {
            Some(raw) => parse_capacity(&raw)?,
            None => DEFAULT_INBOX_CAPACITY,
        };
        Ok(Self {
            name,
            endpoint: var("CLAIMEX_AGENT_ENDPOINT"),
            seed: var("CLAIMEX_AGENT_SEED"),
            inbox_capacity,
        })
    }

    /// Parse a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingName);
        }
        if self.inbox_capacity == 0 {
            return Err(ConfigError::InvalidCapacity("0".to_string()));
        }
        Ok(())
    }

    /// Transport address.
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(&self.name)
    }

    /// Seed phrase for the default identifier.
    pub fn seed(&self) -> &str {
        self.seed.as_deref().unwrap_or(&self.name)
    }

    /// Key pair of the default identifier.
    pub fn default_keys(&self) -> Ed25519KeyPair {
        Ed25519KeyPair::from_seed_phrase(self.seed())
    }
}

fn parse_capacity(raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidCapacity(raw.to_string())),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No agent name.
    #[error("agent name is required (CLAIMEX_AGENT_NAME)")]
    MissingName,
    /// Inbox capacity is not a positive integer.
    #[error("invalid inbox capacity: {0}")]
    InvalidCapacity(String),
    /// YAML parse failure.
    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// Config file could not be read.
    #[error("config file: {0}")]
    Io(#[from] std::io::Error),
}
