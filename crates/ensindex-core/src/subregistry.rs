//! Subregistry registry: which registrar deployments we index and which
//! contracts report on their behalf.

use std::collections::HashMap;
use std::fmt;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::error::IndexerError;
use crate::indexer::SubregistryConfig;
use crate::store::UnitOfWork;
use crate::types::{address_hex, namehash, ChainId, Node};

/// Identifies one registrar deployment: `(chain id, base registrar address)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubregistryId {
    pub chain_id: ChainId,
    pub address: Address,
}

impl SubregistryId {
    pub fn new(chain_id: ChainId, address: Address) -> Self {
        Self { chain_id, address }
    }
}

impl fmt::Display for SubregistryId {
    /// Always lowercase: `1:0x57f1887a8bf19b14fc0df6fd9b2acc9af147ea85`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain_id, address_hex(&self.address))
    }
}

/// A registrar deployment and the parent node whose direct subnames it manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subregistry {
    pub id: SubregistryId,
    pub node: Node,
}

/// Which price/referral facts a registrar-controller generation emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerGeneration {
    /// `cost` only, no referrer.
    Legacy,
    /// `baseCost + premium` on registration, `cost` on renewal, no referrer.
    Wrapped,
    /// `baseCost + premium` / `cost`, plus a bytes32 `referrer`.
    Unwrapped,
    /// Owner/partner registrations that emit neither price nor referrer.
    Unpriced,
}

impl ControllerGeneration {
    /// Whether events from this generation carry a referrer at all.
    pub fn supports_referral(&self) -> bool {
        matches!(self, Self::Unwrapped)
    }
}

/// The role a contract plays for its subregistry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "generation", rename_all = "snake_case")]
pub enum ContractFamily {
    BaseRegistrar,
    RegistrarController(ControllerGeneration),
    RenewalReferrer,
}

impl fmt::Display for ContractFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BaseRegistrar => write!(f, "base-registrar"),
            Self::RegistrarController(g) => write!(f, "registrar-controller({g:?})"),
            Self::RenewalReferrer => write!(f, "renewal-referrer"),
        }
    }
}

/// A contract resolved to its subregistry and family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractBinding {
    pub subregistry: Subregistry,
    pub family: ContractFamily,
}

/// Lookup table `(chain id, contract address)` → [`ContractBinding`].
#[derive(Debug, Clone, Default)]
pub struct SubregistryRegistry {
    subregistries: Vec<Subregistry>,
    bindings: HashMap<(ChainId, Address), ContractBinding>,
}

impl SubregistryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from configuration, deriving each managed node by
    /// namehash.
    pub fn from_configs(configs: &[SubregistryConfig]) -> Self {
        let mut registry = Self::new();
        for cfg in configs {
            let subregistry = Subregistry {
                id: SubregistryId::new(cfg.chain_id, cfg.registrar),
                node: namehash(&cfg.managed_name),
            };
            registry.add_subregistry(subregistry);
            for controller in &cfg.controllers {
                registry.bind(
                    cfg.chain_id,
                    controller.address,
                    subregistry,
                    ContractFamily::RegistrarController(controller.generation),
                );
            }
            for referrer in &cfg.renewal_referrers {
                registry.bind(cfg.chain_id, *referrer, subregistry, ContractFamily::RenewalReferrer);
            }
        }
        registry
    }

    /// Register a subregistry; its base registrar is bound automatically.
    pub fn add_subregistry(&mut self, subregistry: Subregistry) {
        self.bind(
            subregistry.id.chain_id,
            subregistry.id.address,
            subregistry,
            ContractFamily::BaseRegistrar,
        );
        if !self.subregistries.contains(&subregistry) {
            self.subregistries.push(subregistry);
        }
    }

    /// Bind an auxiliary contract (controller, referrer) to a subregistry.
    pub fn bind(
        &mut self,
        chain_id: ChainId,
        address: Address,
        subregistry: Subregistry,
        family: ContractFamily,
    ) {
        self.bindings
            .insert((chain_id, address), ContractBinding { subregistry, family });
    }

    /// Resolve the contract that emitted an event.
    pub fn resolve(&self, chain_id: ChainId, address: &Address) -> Option<&ContractBinding> {
        self.bindings.get(&(chain_id, *address))
    }

    pub fn subregistries(&self) -> &[Subregistry] {
        &self.subregistries
    }

    /// Distinct chains with at least one subregistry, ascending.
    pub fn chains(&self) -> Vec<ChainId> {
        let mut chains: Vec<_> = self.subregistries.iter().map(|s| s.id.chain_id).collect();
        chains.sort_unstable();
        chains.dedup();
        chains
    }
}

/// Store `subregistry` the first time any event referencing it is applied.
///
/// Returns `true` if the row was created.
pub async fn record_observed(
    uow: &mut dyn UnitOfWork,
    subregistry: &Subregistry,
) -> Result<bool, IndexerError> {
    if uow.subregistry(&subregistry.id).await?.is_some() {
        return Ok(false);
    }
    uow.insert_subregistry(subregistry).await?;
    Ok(true)
}
