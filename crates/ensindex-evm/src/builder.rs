//! Fluent builder API for ENSIndex configurations and processors.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use alloy_primitives::address;
//! use ensindex_core::subregistry::ControllerGeneration;
//! use ensindex_evm::IndexerBuilder;
//! use ensindex_storage::InMemoryStorage;
//!
//! # fn example() -> Result<(), ensindex_core::IndexerError> {
//! let registrar = address!("57f1887a8BF19b14fC0dF6Fd9B2acc9Af147eA85");
//! let processor = IndexerBuilder::new()
//!     .id("ens-mainnet")
//!     .subregistry("ens", 1, registrar, "eth")
//!     .controller(
//!         registrar,
//!         address!("253553366Da8546fC250F225fe3d25d0C782303b"),
//!         ControllerGeneration::Wrapped,
//!     )
//!     .build(Arc::new(InMemoryStorage::new()))?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use alloy_primitives::Address;

use ensindex_core::error::IndexerError;
use ensindex_core::indexer::{ControllerConfig, IndexerConfig, SubregistryConfig};
use ensindex_core::store::RegistrarStore;
use ensindex_core::subregistry::ControllerGeneration;
use ensindex_core::types::ChainId;

use crate::adapters::default_adapters;
use crate::processor::Processor;

/// Fluent builder for `IndexerConfig`.
#[derive(Default)]
pub struct IndexerBuilder {
    config: IndexerConfig,
}

impl IndexerBuilder {
    pub fn new() -> Self {
        Self {
            config: IndexerConfig::default(),
        }
    }

    /// Start from an existing (e.g. file-loaded) configuration.
    pub fn from_config(config: IndexerConfig) -> Self {
        Self { config }
    }

    /// Set the indexer ID (used in logs).
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.config.id = id.into();
        self
    }

    /// Set the per-chain ingestion channel capacity.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Add a registrar deployment managing the direct subnames of
    /// `managed_name`.
    pub fn subregistry(
        mut self,
        name: impl Into<String>,
        chain_id: ChainId,
        registrar: Address,
        managed_name: impl Into<String>,
    ) -> Self {
        self.config.subregistries.push(SubregistryConfig {
            name: name.into(),
            chain_id,
            registrar,
            managed_name: managed_name.into(),
            controllers: vec![],
            renewal_referrers: vec![],
        });
        self
    }

    /// Bind a controller to the subregistry whose base registrar is
    /// `registrar`. Ignored if no such subregistry was added.
    pub fn controller(
        mut self,
        registrar: Address,
        address: Address,
        generation: ControllerGeneration,
    ) -> Self {
        if let Some(sub) = self.find(registrar) {
            sub.controllers.push(ControllerConfig {
                address,
                generation,
            });
        }
        self
    }

    /// Bind a renewal-referrer contract to the subregistry whose base
    /// registrar is `registrar`.
    pub fn renewal_referrer(mut self, registrar: Address, address: Address) -> Self {
        if let Some(sub) = self.find(registrar) {
            sub.renewal_referrers.push(address);
        }
        self
    }

    fn find(&mut self, registrar: Address) -> Option<&mut SubregistryConfig> {
        self.config
            .subregistries
            .iter_mut()
            .rev()
            .find(|s| s.registrar == registrar)
    }

    /// Build the `IndexerConfig`.
    pub fn build_config(self) -> IndexerConfig {
        self.config
    }

    /// Validate the configuration and build a processor over `store` with
    /// the default adapters.
    pub fn build(self, store: Arc<dyn RegistrarStore>) -> Result<Processor, IndexerError> {
        self.config.validate()?;
        Ok(Processor::new(store, self.config.registry(), default_adapters()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const REGISTRAR: Address = address!("57f1887a8BF19b14fC0dF6Fd9B2acc9Af147eA85");
    const LEGACY: Address = address!("283Af0B28c62C092C9727F1Ee09c02CA627EB7F5");

    #[test]
    fn builder_defaults() {
        let cfg = IndexerBuilder::new().build_config();
        assert_eq!(cfg.id, "default");
        assert_eq!(cfg.channel_capacity, 1024);
        assert!(cfg.subregistries.is_empty());
    }

    #[test]
    fn builder_custom() {
        let cfg = IndexerBuilder::new()
            .id("ens")
            .channel_capacity(16)
            .subregistry("ens", 1, REGISTRAR, "eth")
            .controller(REGISTRAR, LEGACY, ControllerGeneration::Legacy)
            .renewal_referrer(REGISTRAR, Address::repeat_byte(0x77))
            .controller(Address::repeat_byte(1), LEGACY, ControllerGeneration::Wrapped)
            .build_config();

        assert_eq!(cfg.id, "ens");
        assert_eq!(cfg.channel_capacity, 16);
        let sub = &cfg.subregistries[0];
        assert_eq!(sub.managed_name, "eth");
        assert_eq!(sub.controllers.len(), 1);
        assert_eq!(sub.controllers[0].generation, ControllerGeneration::Legacy);
        assert_eq!(sub.renewal_referrers, vec![Address::repeat_byte(0x77)]);
    }
}
