//! Decoded-event input, event-source adapters, and the adapter registry.
//!
//! Raw events arrive already ABI-decoded. An [`EventAdapter`] turns one of
//! them into a [`NormalizedEvent`] for the correlator or the controller
//! directory; the [`AdapterRegistry`] picks the adapter by the emitting
//! contract's family and the event name.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use crate::correlator::{ControllerEvent, RegistrarEvent, RenewalReferralEvent};
use crate::error::IndexerError;
use crate::subregistry::{ContractBinding, ContractFamily};
use crate::types::{BlockRef, ChainId, EventId, EventPosition, EventRef};

/// A decoded log, as delivered by the host's chain reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedEvent {
    pub chain_id: ChainId,
    pub contract_address: Address,
    /// The ABI event name (e.g. `"NameRegistered"`).
    pub event_name: String,
    pub block: BlockRef,
    pub transaction_hash: B256,
    /// Sender of the transaction, when the host has it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_from: Option<Address>,
    pub log_index: u32,
    /// Event-specific arguments, keyed by ABI parameter name.
    #[serde(default)]
    pub args: serde_json::Value,
}

impl DecodedEvent {
    pub fn id(&self) -> EventId {
        EventId::new(self.chain_id, self.block.number, self.log_index)
    }

    pub fn position(&self) -> EventPosition {
        EventPosition {
            block_number: self.block.number,
            log_index: self.log_index,
        }
    }

    /// The audit record for this event.
    pub fn event_ref(&self) -> EventRef {
        EventRef {
            id: self.id(),
            chain_id: self.chain_id,
            contract_address: self.contract_address,
            event_name: self.event_name.clone(),
            block: self.block,
            transaction_hash: self.transaction_hash,
            log_index: self.log_index,
        }
    }
}

/// What an adapter makes of one decoded event.
#[derive(Debug, Clone)]
pub enum NormalizedEvent {
    /// `NameRegistered` / `NameRenewed` on a base registrar (Path A).
    Registrar(RegistrarEvent),
    /// A controller's report on a registration or renewal (Path B).
    Controller(ControllerEvent),
    /// A referral attributed to a renewal (Path C).
    RenewalReferral(RenewalReferralEvent),
    ControllerAdded {
        chain_id: ChainId,
        controller: Address,
        registrar: Address,
    },
    ControllerRemoved {
        chain_id: ChainId,
        controller: Address,
    },
    /// Recorded as an event ref only (e.g. `Transfer`).
    Provenance,
}

/// Processing class within one transaction. Lower classes run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Registrar, directory, and provenance events: they open actions.
    Registrar,
    /// Renewal referrals: they read a correlation without consuming it.
    Referral,
    /// Controller events: they consume the correlation.
    Controller,
}

impl NormalizedEvent {
    pub fn phase(&self) -> Phase {
        match self {
            Self::RenewalReferral(_) => Phase::Referral,
            Self::Controller(_) => Phase::Controller,
            _ => Phase::Registrar,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Registrar(_) => "registrar",
            Self::Controller(_) => "controller",
            Self::RenewalReferral(_) => "renewal-referral",
            Self::ControllerAdded { .. } => "controller-added",
            Self::ControllerRemoved { .. } => "controller-removed",
            Self::Provenance => "provenance",
        }
    }
}

/// Normalizes the events of one contract family.
///
/// Implement this to support a new registrar or controller ABI.
pub trait EventAdapter: Send + Sync {
    /// The contract family this adapter decodes.
    fn family(&self) -> ContractFamily;

    /// Event names this adapter handles.
    fn event_names(&self) -> &'static [&'static str];

    /// Normalize `event`, emitted by the contract described by `binding`.
    fn normalize(
        &self,
        event: &DecodedEvent,
        binding: &ContractBinding,
    ) -> Result<NormalizedEvent, IndexerError>;
}

/// Registry of adapters keyed by `(family, event name)`.
pub struct AdapterRegistry {
    adapters: HashMap<(ContractFamily, String), Arc<dyn EventAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Register an adapter for every event name it declares.
    /// A later registration for the same key replaces the earlier one.
    pub fn register(&mut self, adapter: Arc<dyn EventAdapter>) {
        let family = adapter.family();
        for name in adapter.event_names() {
            self.adapters
                .insert((family, name.to_string()), Arc::clone(&adapter));
        }
    }

    pub fn lookup(&self, family: ContractFamily, event_name: &str) -> Option<&Arc<dyn EventAdapter>> {
        self.adapters.get(&(family, event_name.to_string()))
    }

    /// Normalize through the matching adapter. `Ok(None)` means no adapter
    /// handles this event for this family.
    pub fn normalize(
        &self,
        event: &DecodedEvent,
        binding: &ContractBinding,
    ) -> Result<Option<NormalizedEvent>, IndexerError> {
        match self.lookup(binding.family, &event.event_name) {
            Some(adapter) => adapter.normalize(event, binding).map(Some),
            None => Ok(None),
        }
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subregistry::{ControllerGeneration, Subregistry, SubregistryId};
    use crate::types::namehash;

    struct ProvenanceOnly;

    impl EventAdapter for ProvenanceOnly {
        fn family(&self) -> ContractFamily {
            ContractFamily::BaseRegistrar
        }
        fn event_names(&self) -> &'static [&'static str] {
            &["Transfer", "Approval"]
        }
        fn normalize(
            &self,
            _event: &DecodedEvent,
            _binding: &ContractBinding,
        ) -> Result<NormalizedEvent, IndexerError> {
            Ok(NormalizedEvent::Provenance)
        }
    }

    fn binding(family: ContractFamily) -> ContractBinding {
        ContractBinding {
            subregistry: Subregistry {
                id: SubregistryId::new(1, Address::ZERO),
                node: namehash("eth"),
            },
            family,
        }
    }

    fn event(name: &str) -> DecodedEvent {
        DecodedEvent {
            chain_id: 1,
            contract_address: Address::ZERO,
            event_name: name.into(),
            block: BlockRef { number: 7, timestamp: 100 },
            transaction_hash: B256::ZERO,
            transaction_from: None,
            log_index: 3,
            args: serde_json::Value::Null,
        }
    }

    #[test]
    fn dispatch_by_family_and_name() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(ProvenanceOnly));
        assert_eq!(registry.len(), 2);

        let base = binding(ContractFamily::BaseRegistrar);
        let hit = registry.normalize(&event("Transfer"), &base).unwrap();
        assert!(matches!(hit, Some(NormalizedEvent::Provenance)));
        assert!(registry.normalize(&event("NameMigrated"), &base).unwrap().is_none());

        // same name, other family: no adapter
        let controller =
            binding(ContractFamily::RegistrarController(ControllerGeneration::Legacy));
        assert!(registry.normalize(&event("Transfer"), &controller).unwrap().is_none());
    }

    #[test]
    fn event_id_is_deterministic() {
        let e = event("Transfer");
        assert_eq!(e.id().as_str(), "1-7-3");
        assert_eq!(e.event_ref().id, e.id());
    }

    #[test]
    fn decoded_event_json_is_camel_case() {
        let json = serde_json::json!({
            "chainId": 1,
            "contractAddress": "0x57f1887a8bf19b14fc0df6fd9b2acc9af147ea85",
            "eventName": "NameRenewed",
            "block": { "number": 10, "timestamp": 1000 },
            "transactionHash": "0x0101010101010101010101010101010101010101010101010101010101010101",
            "logIndex": 2,
            "args": { "expires": 4000 }
        });
        let e: DecodedEvent = serde_json::from_value(json).unwrap();
        assert_eq!(e.event_name, "NameRenewed");
        assert!(e.transaction_from.is_none());
        assert_eq!(e.args["expires"], 4000);
    }

    #[test]
    fn controller_events_run_last() {
        assert!(Phase::Registrar < Phase::Referral);
        assert!(Phase::Referral < Phase::Controller);
    }
}
