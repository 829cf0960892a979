//! Storage traits.
//!
//! Every multi-step reconciliation (look up → decide → write, or resolve →
//! patch → delete) runs inside one [`UnitOfWork`]. A unit of work either
//! commits as a whole or, when dropped without [`UnitOfWork::commit`], leaves
//! no trace. Readers going through [`RegistrarStore`] only ever observe
//! committed state.
//!
//! Implementations live in `ensindex-storage` (`InMemoryStorage`,
//! `SqliteStorage`).

use alloy_primitives::{Address, B256};
use async_trait::async_trait;

use crate::action::{ActionId, LogicalEventKey, RegistrarAction};
use crate::controller::RegistrarController;
use crate::error::IndexerError;
use crate::lifecycle::RegistrationLifecycle;
use crate::subregistry::{Subregistry, SubregistryId};
use crate::types::{ChainId, EventId, EventRef, Node};

/// One atomic batch of reads and writes against the store.
#[async_trait]
pub trait UnitOfWork: Send {
    // ── Subregistries ────────────────────────────────────────────────────────

    async fn subregistry(&mut self, id: &SubregistryId) -> Result<Option<Subregistry>, IndexerError>;

    /// Insert a subregistry. Callers check for presence first; rows are
    /// immutable once written.
    async fn insert_subregistry(&mut self, subregistry: &Subregistry) -> Result<(), IndexerError>;

    // ── Registration lifecycles ──────────────────────────────────────────────

    async fn lifecycle(
        &mut self,
        subregistry_id: &SubregistryId,
        node: &Node,
    ) -> Result<Option<RegistrationLifecycle>, IndexerError>;

    async fn insert_lifecycle(&mut self, lifecycle: &RegistrationLifecycle) -> Result<(), IndexerError>;

    async fn update_lifecycle(&mut self, lifecycle: &RegistrationLifecycle) -> Result<(), IndexerError>;

    // ── Registrar actions ────────────────────────────────────────────────────

    async fn action(&mut self, id: &ActionId) -> Result<Option<RegistrarAction>, IndexerError>;

    async fn insert_action(&mut self, action: &RegistrarAction) -> Result<(), IndexerError>;

    async fn update_action(&mut self, action: &RegistrarAction) -> Result<(), IndexerError>;

    // ── Pending correlations ─────────────────────────────────────────────────

    async fn insert_pending(
        &mut self,
        key: &LogicalEventKey,
        action_id: &ActionId,
    ) -> Result<(), IndexerError>;

    async fn pending(&mut self, key: &LogicalEventKey) -> Result<Option<ActionId>, IndexerError>;

    async fn delete_pending(&mut self, key: &LogicalEventKey) -> Result<(), IndexerError>;

    /// Drop every pending correlation created by `transaction_hash`.
    /// Returns how many were removed.
    async fn discard_pending_for_transaction(
        &mut self,
        transaction_hash: &B256,
    ) -> Result<u64, IndexerError>;

    // ── Controller directory ─────────────────────────────────────────────────

    async fn controller(
        &mut self,
        chain_id: ChainId,
        controller: &Address,
    ) -> Result<Option<RegistrarController>, IndexerError>;

    /// Insert or replace the row keyed by `(chain_id, controller_address)`.
    async fn upsert_controller(&mut self, controller: &RegistrarController) -> Result<(), IndexerError>;

    // ── Event refs ───────────────────────────────────────────────────────────

    async fn has_event(&mut self, id: &EventId) -> Result<bool, IndexerError>;

    async fn insert_event(&mut self, event: &EventRef) -> Result<(), IndexerError>;

    /// Make every write in this unit of work visible, atomically.
    async fn commit(self: Box<Self>) -> Result<(), IndexerError>;
}

/// A store of reconciled registrar state.
///
/// The write side is reached only through [`RegistrarStore::begin`]; the
/// remaining methods are the read API for downstream consumers.
#[async_trait]
pub trait RegistrarStore: Send + Sync {
    /// Open a unit of work. Units of work are serialised by the store.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, IndexerError>;

    async fn subregistries(&self) -> Result<Vec<Subregistry>, IndexerError>;

    async fn lifecycle(
        &self,
        subregistry_id: &SubregistryId,
        node: &Node,
    ) -> Result<Option<RegistrationLifecycle>, IndexerError>;

    /// Current lifecycle of `node` in every subregistry that knows it.
    async fn lifecycles_by_node(&self, node: &Node) -> Result<Vec<RegistrationLifecycle>, IndexerError>;

    async fn action(&self, id: &ActionId) -> Result<Option<RegistrarAction>, IndexerError>;

    /// Actions for `node`, ordered by block number then log index.
    async fn actions_by_node(&self, node: &Node) -> Result<Vec<RegistrarAction>, IndexerError>;

    /// Actions for a subregistry, ordered by block number then log index.
    async fn actions_by_subregistry(
        &self,
        subregistry_id: &SubregistryId,
    ) -> Result<Vec<RegistrarAction>, IndexerError>;

    async fn controllers(&self, chain_id: ChainId) -> Result<Vec<RegistrarController>, IndexerError>;

    /// Event refs recorded for one transaction, in log order.
    async fn events_by_transaction(
        &self,
        chain_id: ChainId,
        transaction_hash: &B256,
    ) -> Result<Vec<EventRef>, IndexerError>;

    /// Outstanding pending correlations. Empty between transaction passes.
    async fn pending_correlations(&self) -> Result<Vec<(LogicalEventKey, ActionId)>, IndexerError>;
}
