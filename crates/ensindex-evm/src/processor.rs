//! Per-transaction event processor.
//!
//! One transaction's events are applied in one unit of work:
//!
//! 1. resolve each event's contract to its subregistry and family, and
//!    normalize it through the adapter registry (unknown contracts and events
//!    are skipped); the subregistry row is created on first observation;
//! 2. skip the whole transaction if its events were already recorded
//!    (at-least-once delivery);
//! 3. apply registrar and directory events, then renewal referrals, then
//!    controller events, each class in log order;
//! 4. discard pending correlations the transaction left behind;
//! 5. commit.
//!
//! A fatal error drops the unit of work, so nothing of the transaction is
//! persisted.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::B256;
use tracing::{debug, info, warn};

use ensindex_core::action::ActionType;
use ensindex_core::controller;
use ensindex_core::correlator;
use ensindex_core::error::IndexerError;
use ensindex_core::handler::{AdapterRegistry, DecodedEvent, NormalizedEvent};
use ensindex_core::store::{RegistrarStore, UnitOfWork};
use ensindex_core::subregistry::{self, SubregistryRegistry};
use ensindex_core::types::{to_hex, ChainId};

/// Counters for one or more processed transactions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub transactions: usize,
    /// Transactions skipped because their events were already recorded.
    pub replayed: usize,
    pub events_applied: usize,
    /// Events from unbound contracts or without an adapter.
    pub events_ignored: usize,
    pub actions_opened: usize,
    pub actions_enriched: usize,
    /// Recoverable errors logged and skipped.
    pub coverage_gaps: usize,
    /// Pending correlations discarded at the end of a transaction.
    pub correlations_discarded: u64,
}

impl ProcessOutcome {
    pub fn absorb(&mut self, other: ProcessOutcome) {
        self.transactions += other.transactions;
        self.replayed += other.replayed;
        self.events_applied += other.events_applied;
        self.events_ignored += other.events_ignored;
        self.actions_opened += other.actions_opened;
        self.actions_enriched += other.actions_enriched;
        self.coverage_gaps += other.coverage_gaps;
        self.correlations_discarded += other.correlations_discarded;
    }
}

/// Applies decoded events to a [`RegistrarStore`].
pub struct Processor {
    store: Arc<dyn RegistrarStore>,
    registry: SubregistryRegistry,
    adapters: AdapterRegistry,
}

impl Processor {
    pub fn new(
        store: Arc<dyn RegistrarStore>,
        registry: SubregistryRegistry,
        adapters: AdapterRegistry,
    ) -> Self {
        Self {
            store,
            registry,
            adapters,
        }
    }

    pub fn store(&self) -> &Arc<dyn RegistrarStore> {
        &self.store
    }

    pub fn registry(&self) -> &SubregistryRegistry {
        &self.registry
    }

    /// Apply a batch of events one transaction at a time.
    ///
    /// Events are grouped by `(chain, transaction hash)`; groups run in the
    /// order their first event appears, so chains may be interleaved. Events
    /// must be in `(block, log index)` order per chain. Stops at the first
    /// fatal error; transactions before it stay committed.
    pub async fn process_batch(&self, events: &[DecodedEvent]) -> Result<ProcessOutcome, IndexerError> {
        let mut index: HashMap<(ChainId, B256), usize> = HashMap::new();
        let mut groups: Vec<Vec<&DecodedEvent>> = Vec::new();
        for event in events {
            let slot = *index
                .entry((event.chain_id, event.transaction_hash))
                .or_insert_with(|| {
                    groups.push(Vec::new());
                    groups.len() - 1
                });
            groups[slot].push(event);
        }

        let mut outcome = ProcessOutcome::default();
        for group in &groups {
            outcome.absorb(self.apply_transaction(group).await?);
        }
        Ok(outcome)
    }

    /// Apply the events of one transaction atomically.
    pub async fn process_transaction(
        &self,
        events: &[DecodedEvent],
    ) -> Result<ProcessOutcome, IndexerError> {
        let events: Vec<&DecodedEvent> = events.iter().collect();
        self.apply_transaction(&events).await
    }

    async fn apply_transaction(
        &self,
        events: &[&DecodedEvent],
    ) -> Result<ProcessOutcome, IndexerError> {
        let mut outcome = ProcessOutcome::default();
        let Some(&first) = events.first() else {
            return Ok(outcome);
        };
        let (chain_id, tx) = (first.chain_id, first.transaction_hash);
        if let Some(stray) = events.iter().find(|e| !same_transaction(first, e)) {
            return Err(IndexerError::Other(format!(
                "event {} does not belong to transaction {}",
                stray.id(),
                to_hex(tx)
            )));
        }
        outcome.transactions = 1;

        let mut normalized = Vec::with_capacity(events.len());
        for &event in events {
            let Some(binding) = self.registry.resolve(chain_id, &event.contract_address) else {
                debug!(chain_id, event = %event.id(), "unbound contract, skipped");
                outcome.events_ignored += 1;
                continue;
            };
            match self.adapters.normalize(event, binding)? {
                Some(n) => normalized.push((event, binding.subregistry, n)),
                None => {
                    debug!(
                        chain_id,
                        event = %event.id(),
                        name = %event.event_name,
                        family = %binding.family,
                        "no adapter, skipped"
                    );
                    outcome.events_ignored += 1;
                }
            }
        }
        if normalized.is_empty() {
            return Ok(outcome);
        }

        let mut uow = self.store.begin().await?;

        for (event, _, _) in &normalized {
            if uow.has_event(&event.id()).await? {
                debug!(chain_id, tx = %to_hex(tx), "transaction already applied, skipped");
                outcome.replayed = 1;
                return Ok(outcome);
            }
        }

        // stable: keeps log order inside each phase
        normalized.sort_by_key(|(_, _, n)| n.phase());

        for (event, subregistry, n) in &normalized {
            uow.insert_event(&event.event_ref()).await?;
            if subregistry::record_observed(uow.as_mut(), subregistry).await? {
                debug!(chain_id, subregistry = %subregistry.id, "subregistry observed");
            }
            self.apply(uow.as_mut(), chain_id, n, &mut outcome).await?;
            outcome.events_applied += 1;
        }

        outcome.correlations_discarded = self.sweep(uow.as_mut(), chain_id, &tx).await?;
        uow.commit().await?;

        debug!(
            chain_id,
            tx = %to_hex(tx),
            events = outcome.events_applied,
            "transaction committed"
        );
        Ok(outcome)
    }

    async fn apply(
        &self,
        uow: &mut dyn UnitOfWork,
        chain_id: ChainId,
        event: &NormalizedEvent,
        outcome: &mut ProcessOutcome,
    ) -> Result<(), IndexerError> {
        let result = match event {
            NormalizedEvent::Registrar(input) => {
                correlator::open_action(uow, input).await.map(|action| {
                    if action.action_type == ActionType::Registration {
                        info!(
                            chain_id,
                            node = %to_hex(action.node),
                            expires_at = input.expires_at,
                            "name registered"
                        );
                    }
                    outcome.actions_opened += 1;
                })
            }
            NormalizedEvent::Controller(input) => correlator::enrich_from_controller(uow, input)
                .await
                .map(|_| outcome.actions_enriched += 1),
            NormalizedEvent::RenewalReferral(input) => {
                correlator::attach_renewal_referral(uow, input).await.map(|_| ())
            }
            NormalizedEvent::ControllerAdded {
                chain_id,
                controller,
                registrar,
            } => controller::add(uow, *chain_id, *controller, *registrar)
                .await
                .map(|_| ()),
            NormalizedEvent::ControllerRemoved {
                chain_id,
                controller,
            } => controller::remove(uow, *chain_id, *controller).await.map(|_| ()),
            NormalizedEvent::Provenance => Ok(()),
        };

        match result {
            Err(e) if !e.is_fatal() => {
                warn!(chain_id, error = %e, kind = event.kind(), "coverage gap, continuing");
                outcome.coverage_gaps += 1;
                Ok(())
            }
            other => other,
        }
    }

    async fn sweep(
        &self,
        uow: &mut dyn UnitOfWork,
        chain_id: ChainId,
        tx: &B256,
    ) -> Result<u64, IndexerError> {
        let discarded = uow.discard_pending_for_transaction(tx).await?;
        if discarded > 0 {
            debug!(chain_id, tx = %to_hex(tx), discarded, "unconsumed correlations discarded");
        }
        Ok(discarded)
    }
}

fn same_transaction(a: &DecodedEvent, b: &DecodedEvent) -> bool {
    a.chain_id == b.chain_id && a.transaction_hash == b.transaction_hash
}
