//! Indexer configuration and state types.

use std::collections::HashSet;
use std::path::Path;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::error::IndexerError;
use crate::subregistry::{ControllerGeneration, SubregistryRegistry};
use crate::types::ChainId;

/// Configuration for an indexer instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Unique name for this indexer (used in logs).
    pub id: String,
    /// Capacity of each per-chain ingestion channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Registrar deployments to index.
    #[serde(default)]
    pub subregistries: Vec<SubregistryConfig>,
}

fn default_channel_capacity() -> usize {
    1024
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            id: "default".into(),
            channel_capacity: default_channel_capacity(),
            subregistries: vec![],
        }
    }
}

/// One registrar deployment and the contracts reporting on its behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubregistryConfig {
    /// Human label (e.g. `"ens"`, `"basenames"`).
    pub name: String,
    pub chain_id: ChainId,
    /// Base registrar address.
    pub registrar: Address,
    /// The parent name whose direct subnames the registrar manages
    /// (e.g. `"eth"`, `"base.eth"`).
    pub managed_name: String,
    #[serde(default)]
    pub controllers: Vec<ControllerConfig>,
    #[serde(default)]
    pub renewal_referrers: Vec<Address>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub address: Address,
    pub generation: ControllerGeneration,
}

impl IndexerConfig {
    /// Parse a JSON configuration and validate it.
    pub fn from_json(json: &str) -> Result<Self, IndexerError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| IndexerError::Other(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, IndexerError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| IndexerError::Other(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    /// Reject configurations that would make contract resolution ambiguous.
    pub fn validate(&self) -> Result<(), IndexerError> {
        if self.channel_capacity == 0 {
            return Err(IndexerError::Other("channel_capacity must be > 0".into()));
        }
        let mut seen = HashSet::new();
        for sub in &self.subregistries {
            if sub.managed_name.is_empty() {
                return Err(IndexerError::Other(format!(
                    "subregistry '{}' has an empty managed_name",
                    sub.name
                )));
            }
            let contracts = std::iter::once(sub.registrar)
                .chain(sub.controllers.iter().map(|c| c.address))
                .chain(sub.renewal_referrers.iter().copied());
            for address in contracts {
                if !seen.insert((sub.chain_id, address)) {
                    return Err(IndexerError::Other(format!(
                        "contract {address} on chain {} is bound twice",
                        sub.chain_id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Contract bindings for this configuration.
    pub fn registry(&self) -> SubregistryRegistry {
        SubregistryRegistry::from_configs(&self.subregistries)
    }
}

/// Runtime state of an ingestion worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexerState {
    /// Not yet started.
    Idle,
    /// Consuming events.
    Running,
    /// Input closed and drained.
    Stopped,
    /// Halted on a fatal error.
    Error,
}

impl std::fmt::Display for IndexerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Error => write!(f, "error"),
        }
    }
}
