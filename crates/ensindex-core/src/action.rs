//! Registrar actions: the reconciled record of one registration or renewal,
//! and the key that joins its contributing events.

use std::fmt;

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use crate::duration::IncrementalDuration;
use crate::pricing::Pricing;
use crate::referral::Referral;
use crate::subregistry::SubregistryId;
use crate::types::{to_hex, BlockRef, EventId, EventPosition, Node};

/// Identifier of a registrar action: the id of the registrar event that
/// created it.
pub type ActionId = EventId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Registration,
    Renewal,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::Renewal => "renewal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "registration" => Some(Self::Registration),
            "renewal" => Some(Self::Renewal),
            _ => None,
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One real-world registration or renewal.
///
/// Created from the registrar event, then enriched in place by controller and
/// referral events from the same transaction. Never re-created, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrarAction {
    pub id: ActionId,
    pub action_type: ActionType,
    pub node: Node,
    pub subregistry_id: SubregistryId,
    pub incremental_duration: IncrementalDuration,
    /// Who paid for / initiated the action.
    pub registrant: Address,
    pub pricing: Pricing,
    pub referral: Referral,
    pub block: BlockRef,
    pub transaction_hash: B256,
    /// Log index of the creating registrar event; orders actions within a block.
    pub log_index: u32,
    /// Append-only provenance. Never empty.
    pub event_ids: Vec<EventId>,
}

impl RegistrarAction {
    pub fn logical_key(&self) -> LogicalEventKey {
        LogicalEventKey::new(&self.subregistry_id, &self.node, &self.transaction_hash)
    }

    pub fn position(&self) -> EventPosition {
        EventPosition {
            block_number: self.block.number,
            log_index: self.log_index,
        }
    }

    /// Append a contributing event. Re-appending an id already present is a
    /// no-op.
    pub fn record_event(&mut self, id: EventId) {
        if !self.event_ids.contains(&id) {
            self.event_ids.push(id);
        }
    }
}

/// Join key for events describing the same action:
/// `lowercase(subregistryId) + ":" + node + ":" + transactionHash`.
///
/// Two raw events in the same transaction touching the same
/// `(subregistry, node)` describe the same logical action.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalEventKey(String);

impl LogicalEventKey {
    pub fn new(subregistry_id: &SubregistryId, node: &Node, transaction_hash: &B256) -> Self {
        Self(format!(
            "{}:{}:{}",
            subregistry_id,
            to_hex(node),
            to_hex(transaction_hash)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The transaction-hash component, used to sweep leftovers at the end of
    /// a transaction pass.
    pub fn transaction_hash_hex(&self) -> &str {
        self.0.rsplit(':').next().unwrap_or_default()
    }
}

impl From<String> for LogicalEventKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for LogicalEventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
