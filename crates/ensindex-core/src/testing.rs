//! HashMap-backed unit of work for this crate's unit tests.

use std::collections::HashMap;

use alloy_primitives::{Address, B256};
use async_trait::async_trait;

use crate::action::{ActionId, LogicalEventKey, RegistrarAction};
use crate::controller::RegistrarController;
use crate::error::IndexerError;
use crate::lifecycle::RegistrationLifecycle;
use crate::store::UnitOfWork;
use crate::subregistry::{Subregistry, SubregistryId};
use crate::types::{to_hex, ChainId, EventId, EventRef, Node};

#[derive(Default)]
pub(crate) struct ScratchUnitOfWork {
    pub subregistries: HashMap<SubregistryId, Subregistry>,
    pub lifecycles: HashMap<(SubregistryId, Node), RegistrationLifecycle>,
    pub actions: HashMap<ActionId, RegistrarAction>,
    pub pending: HashMap<LogicalEventKey, ActionId>,
    pub controllers: HashMap<(ChainId, Address), RegistrarController>,
    pub events: HashMap<EventId, EventRef>,
}

#[async_trait]
impl UnitOfWork for ScratchUnitOfWork {
    async fn subregistry(&mut self, id: &SubregistryId) -> Result<Option<Subregistry>, IndexerError> {
        Ok(self.subregistries.get(id).copied())
    }

    async fn insert_subregistry(&mut self, subregistry: &Subregistry) -> Result<(), IndexerError> {
        self.subregistries.insert(subregistry.id, *subregistry);
        Ok(())
    }

    async fn lifecycle(
        &mut self,
        subregistry_id: &SubregistryId,
        node: &Node,
    ) -> Result<Option<RegistrationLifecycle>, IndexerError> {
        Ok(self.lifecycles.get(&(*subregistry_id, *node)).copied())
    }

    async fn insert_lifecycle(&mut self, lifecycle: &RegistrationLifecycle) -> Result<(), IndexerError> {
        self.lifecycles
            .insert((lifecycle.subregistry_id, lifecycle.node), *lifecycle);
        Ok(())
    }

    async fn update_lifecycle(&mut self, lifecycle: &RegistrationLifecycle) -> Result<(), IndexerError> {
        self.insert_lifecycle(lifecycle).await
    }

    async fn action(&mut self, id: &ActionId) -> Result<Option<RegistrarAction>, IndexerError> {
        Ok(self.actions.get(id).cloned())
    }

    async fn insert_action(&mut self, action: &RegistrarAction) -> Result<(), IndexerError> {
        if self.actions.contains_key(&action.id) {
            return Err(IndexerError::Storage(format!("duplicate action {}", action.id)));
        }
        self.actions.insert(action.id.clone(), action.clone());
        Ok(())
    }

    async fn update_action(&mut self, action: &RegistrarAction) -> Result<(), IndexerError> {
        self.actions.insert(action.id.clone(), action.clone());
        Ok(())
    }

    async fn insert_pending(
        &mut self,
        key: &LogicalEventKey,
        action_id: &ActionId,
    ) -> Result<(), IndexerError> {
        self.pending.insert(key.clone(), action_id.clone());
        Ok(())
    }

    async fn pending(&mut self, key: &LogicalEventKey) -> Result<Option<ActionId>, IndexerError> {
        Ok(self.pending.get(key).cloned())
    }

    async fn delete_pending(&mut self, key: &LogicalEventKey) -> Result<(), IndexerError> {
        self.pending.remove(key);
        Ok(())
    }

    async fn discard_pending_for_transaction(
        &mut self,
        transaction_hash: &B256,
    ) -> Result<u64, IndexerError> {
        let tx = to_hex(transaction_hash);
        let before = self.pending.len();
        self.pending.retain(|k, _| k.transaction_hash_hex() != tx);
        Ok((before - self.pending.len()) as u64)
    }

    async fn controller(
        &mut self,
        chain_id: ChainId,
        controller: &Address,
    ) -> Result<Option<RegistrarController>, IndexerError> {
        Ok(self.controllers.get(&(chain_id, *controller)).copied())
    }

    async fn upsert_controller(&mut self, controller: &RegistrarController) -> Result<(), IndexerError> {
        self.controllers
            .insert((controller.chain_id, controller.controller_address), *controller);
        Ok(())
    }

    async fn has_event(&mut self, id: &EventId) -> Result<bool, IndexerError> {
        Ok(self.events.contains_key(id))
    }

    async fn insert_event(&mut self, event: &EventRef) -> Result<(), IndexerError> {
        self.events.insert(event.id.clone(), event.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), IndexerError> {
        Ok(())
    }
}
