//! In-memory storage backend.
//!
//! Keeps subregistries, lifecycles, actions, pending correlations, the
//! controller directory, and event refs in RAM. Useful for tests, replays, and
//! short-lived indexers that don't need persistence.
//!
//! A unit of work takes the state lock for its whole lifetime and writes in
//! place, logging each row's prior value. Commit forgets the log; drop without
//! commit restores every logged row, newest first.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use ensindex_core::action::{ActionId, LogicalEventKey, RegistrarAction};
use ensindex_core::controller::RegistrarController;
use ensindex_core::error::IndexerError;
use ensindex_core::lifecycle::RegistrationLifecycle;
use ensindex_core::store::{RegistrarStore, UnitOfWork};
use ensindex_core::subregistry::{Subregistry, SubregistryId};
use ensindex_core::types::{to_hex, ChainId, EventId, EventRef, Node};

#[derive(Debug, Default)]
struct State {
    subregistries: HashMap<SubregistryId, Subregistry>,
    lifecycles: HashMap<(SubregistryId, Node), RegistrationLifecycle>,
    actions: HashMap<ActionId, RegistrarAction>,
    pending: HashMap<LogicalEventKey, ActionId>,
    controllers: HashMap<(ChainId, Address), RegistrarController>,
    events: HashMap<EventId, EventRef>,
}

/// In-memory registrar store.
///
/// All data is lost when the process exits. Cloning shares the same state.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    state: Arc<Mutex<State>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of recorded event refs.
    pub async fn event_count(&self) -> usize {
        self.state.lock().await.events.len()
    }

    /// Total number of registrar actions.
    pub async fn action_count(&self) -> usize {
        self.state.lock().await.actions.len()
    }
}

fn sort_actions(mut actions: Vec<RegistrarAction>) -> Vec<RegistrarAction> {
    actions.sort_by_key(|a| a.position());
    actions
}

#[async_trait]
impl RegistrarStore for InMemoryStorage {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, IndexerError> {
        let state = Arc::clone(&self.state).lock_owned().await;
        Ok(Box::new(MemoryUnitOfWork {
            state,
            undo: Vec::new(),
        }))
    }

    async fn subregistries(&self) -> Result<Vec<Subregistry>, IndexerError> {
        let state = self.state.lock().await;
        let mut out: Vec<_> = state.subregistries.values().copied().collect();
        out.sort_by_key(|s| (s.id.chain_id, s.id.address));
        Ok(out)
    }

    async fn lifecycle(
        &self,
        subregistry_id: &SubregistryId,
        node: &Node,
    ) -> Result<Option<RegistrationLifecycle>, IndexerError> {
        let state = self.state.lock().await;
        Ok(state.lifecycles.get(&(*subregistry_id, *node)).copied())
    }

    async fn lifecycles_by_node(&self, node: &Node) -> Result<Vec<RegistrationLifecycle>, IndexerError> {
        let state = self.state.lock().await;
        let mut out: Vec<_> = state
            .lifecycles
            .values()
            .filter(|l| l.node == *node)
            .copied()
            .collect();
        out.sort_by_key(|l| (l.subregistry_id.chain_id, l.subregistry_id.address));
        Ok(out)
    }

    async fn action(&self, id: &ActionId) -> Result<Option<RegistrarAction>, IndexerError> {
        Ok(self.state.lock().await.actions.get(id).cloned())
    }

    async fn actions_by_node(&self, node: &Node) -> Result<Vec<RegistrarAction>, IndexerError> {
        let state = self.state.lock().await;
        Ok(sort_actions(
            state.actions.values().filter(|a| a.node == *node).cloned().collect(),
        ))
    }

    async fn actions_by_subregistry(
        &self,
        subregistry_id: &SubregistryId,
    ) -> Result<Vec<RegistrarAction>, IndexerError> {
        let state = self.state.lock().await;
        Ok(sort_actions(
            state
                .actions
                .values()
                .filter(|a| a.subregistry_id == *subregistry_id)
                .cloned()
                .collect(),
        ))
    }

    async fn controllers(&self, chain_id: ChainId) -> Result<Vec<RegistrarController>, IndexerError> {
        let state = self.state.lock().await;
        let mut out: Vec<_> = state
            .controllers
            .values()
            .filter(|c| c.chain_id == chain_id)
            .copied()
            .collect();
        out.sort_by_key(|c| c.controller_address);
        Ok(out)
    }

    async fn events_by_transaction(
        &self,
        chain_id: ChainId,
        transaction_hash: &B256,
    ) -> Result<Vec<EventRef>, IndexerError> {
        let state = self.state.lock().await;
        let mut out: Vec<_> = state
            .events
            .values()
            .filter(|e| e.chain_id == chain_id && e.transaction_hash == *transaction_hash)
            .cloned()
            .collect();
        out.sort_by_key(|e| e.position());
        Ok(out)
    }

    async fn pending_correlations(&self) -> Result<Vec<(LogicalEventKey, ActionId)>, IndexerError> {
        let state = self.state.lock().await;
        let mut out: Vec<_> = state
            .pending
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        out.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
        Ok(out)
    }
}

// ─── Unit of work ────────────────────────────────────────────────────────────

/// Prior value of one row touched by a unit of work. `None` means the row did
/// not exist.
enum Undo {
    Subregistry(SubregistryId),
    Lifecycle((SubregistryId, Node), Option<RegistrationLifecycle>),
    Action(ActionId, Option<RegistrarAction>),
    Pending(LogicalEventKey, Option<ActionId>),
    Controller((ChainId, Address), Option<RegistrarController>),
    Event(EventId),
}

fn restore<K: Eq + Hash, V>(map: &mut HashMap<K, V>, key: K, prior: Option<V>) {
    match prior {
        Some(value) => {
            map.insert(key, value);
        }
        None => {
            map.remove(&key);
        }
    }
}

/// Writes go straight to the locked state; each one logs the row's prior
/// value. Dropping without commit replays the log backwards.
struct MemoryUnitOfWork {
    state: OwnedMutexGuard<State>,
    undo: Vec<Undo>,
}

impl Drop for MemoryUnitOfWork {
    fn drop(&mut self) {
        if self.undo.is_empty() {
            return;
        }
        debug!(writes = self.undo.len(), "memory unit of work rolled back");
        let state = &mut *self.state;
        while let Some(entry) = self.undo.pop() {
            match entry {
                Undo::Subregistry(id) => {
                    state.subregistries.remove(&id);
                }
                Undo::Lifecycle(key, prior) => restore(&mut state.lifecycles, key, prior),
                Undo::Action(id, prior) => restore(&mut state.actions, id, prior),
                Undo::Pending(key, prior) => restore(&mut state.pending, key, prior),
                Undo::Controller(key, prior) => restore(&mut state.controllers, key, prior),
                Undo::Event(id) => {
                    state.events.remove(&id);
                }
            }
        }
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn subregistry(&mut self, id: &SubregistryId) -> Result<Option<Subregistry>, IndexerError> {
        Ok(self.state.subregistries.get(id).copied())
    }

    async fn insert_subregistry(&mut self, subregistry: &Subregistry) -> Result<(), IndexerError> {
        if self.state.subregistries.contains_key(&subregistry.id) {
            return Err(IndexerError::Storage(format!(
                "subregistry {} already exists",
                subregistry.id
            )));
        }
        self.state.subregistries.insert(subregistry.id, *subregistry);
        self.undo.push(Undo::Subregistry(subregistry.id));
        Ok(())
    }

    async fn lifecycle(
        &mut self,
        subregistry_id: &SubregistryId,
        node: &Node,
    ) -> Result<Option<RegistrationLifecycle>, IndexerError> {
        Ok(self.state.lifecycles.get(&(*subregistry_id, *node)).copied())
    }

    async fn insert_lifecycle(&mut self, lifecycle: &RegistrationLifecycle) -> Result<(), IndexerError> {
        let key = (lifecycle.subregistry_id, lifecycle.node);
        if self.state.lifecycles.contains_key(&key) {
            return Err(IndexerError::Storage(format!(
                "lifecycle for {} already exists",
                to_hex(lifecycle.node)
            )));
        }
        self.state.lifecycles.insert(key, *lifecycle);
        self.undo.push(Undo::Lifecycle(key, None));
        Ok(())
    }

    async fn update_lifecycle(&mut self, lifecycle: &RegistrationLifecycle) -> Result<(), IndexerError> {
        let key = (lifecycle.subregistry_id, lifecycle.node);
        match self.state.lifecycles.get_mut(&key) {
            Some(row) => {
                let prior = std::mem::replace(row, *lifecycle);
                self.undo.push(Undo::Lifecycle(key, Some(prior)));
                Ok(())
            }
            None => Err(IndexerError::Storage(format!(
                "no lifecycle row for {}",
                to_hex(lifecycle.node)
            ))),
        }
    }

    async fn action(&mut self, id: &ActionId) -> Result<Option<RegistrarAction>, IndexerError> {
        Ok(self.state.actions.get(id).cloned())
    }

    async fn insert_action(&mut self, action: &RegistrarAction) -> Result<(), IndexerError> {
        if self.state.actions.contains_key(&action.id) {
            return Err(IndexerError::Storage(format!("action {} already exists", action.id)));
        }
        self.state.actions.insert(action.id.clone(), action.clone());
        self.undo.push(Undo::Action(action.id.clone(), None));
        Ok(())
    }

    async fn update_action(&mut self, action: &RegistrarAction) -> Result<(), IndexerError> {
        match self.state.actions.get_mut(&action.id) {
            Some(row) => {
                let prior = std::mem::replace(row, action.clone());
                self.undo.push(Undo::Action(action.id.clone(), Some(prior)));
                Ok(())
            }
            None => Err(IndexerError::Storage(format!("no action row {}", action.id))),
        }
    }

    async fn insert_pending(
        &mut self,
        key: &LogicalEventKey,
        action_id: &ActionId,
    ) -> Result<(), IndexerError> {
        let prior = self.state.pending.insert(key.clone(), action_id.clone());
        self.undo.push(Undo::Pending(key.clone(), prior));
        Ok(())
    }

    async fn pending(&mut self, key: &LogicalEventKey) -> Result<Option<ActionId>, IndexerError> {
        Ok(self.state.pending.get(key).cloned())
    }

    async fn delete_pending(&mut self, key: &LogicalEventKey) -> Result<(), IndexerError> {
        if let Some(prior) = self.state.pending.remove(key) {
            self.undo.push(Undo::Pending(key.clone(), Some(prior)));
        }
        Ok(())
    }

    async fn discard_pending_for_transaction(
        &mut self,
        transaction_hash: &B256,
    ) -> Result<u64, IndexerError> {
        let tx = to_hex(transaction_hash);
        let keys: Vec<LogicalEventKey> = self
            .state
            .pending
            .keys()
            .filter(|key| key.transaction_hash_hex() == tx)
            .cloned()
            .collect();
        for key in &keys {
            self.delete_pending(key).await?;
        }
        Ok(keys.len() as u64)
    }

    async fn controller(
        &mut self,
        chain_id: ChainId,
        controller: &Address,
    ) -> Result<Option<RegistrarController>, IndexerError> {
        Ok(self.state.controllers.get(&(chain_id, *controller)).copied())
    }

    async fn upsert_controller(&mut self, controller: &RegistrarController) -> Result<(), IndexerError> {
        let key = (controller.chain_id, controller.controller_address);
        let prior = self.state.controllers.insert(key, *controller);
        self.undo.push(Undo::Controller(key, prior));
        Ok(())
    }

    async fn has_event(&mut self, id: &EventId) -> Result<bool, IndexerError> {
        Ok(self.state.events.contains_key(id))
    }

    async fn insert_event(&mut self, event: &EventRef) -> Result<(), IndexerError> {
        if self.state.events.contains_key(&event.id) {
            return Err(IndexerError::Storage(format!("event {} already recorded", event.id)));
        }
        self.state.events.insert(event.id.clone(), event.clone());
        self.undo.push(Undo::Event(event.id.clone()));
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), IndexerError> {
        debug!(writes = self.undo.len(), "memory unit of work committed");
        self.undo.clear();
        Ok(())
    }
}
