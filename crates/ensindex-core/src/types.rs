//! Shared types for the reconciliation pipeline.

use std::fmt;

use alloy_primitives::{keccak256, Address, B256, U256};
use serde::{Deserialize, Serialize};

/// EVM chain id (1 = Ethereum mainnet, 8453 = Base, 59144 = Linea).
pub type ChainId = u64;

/// Seconds since the Unix epoch. Signed so that duration arithmetic on
/// corrupted input stays visible instead of wrapping.
pub type UnixTimestamp = i64;

/// A 32-byte ENS node (namehash). Opaque to this crate.
pub type Node = B256;

/// keccak256 of a single label.
pub type LabelHash = B256;

/// The namehash of the empty name.
pub const ROOT_NODE: Node = B256::ZERO;

// ─── Node derivation ─────────────────────────────────────────────────────────

/// `keccak256(parent ‖ label_hash)`: the node of a direct subname of `parent`.
pub fn make_subdomain_node(label_hash: &LabelHash, parent: &Node) -> Node {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(parent.as_slice());
    buf[32..].copy_from_slice(label_hash.as_slice());
    keccak256(buf)
}

/// keccak256 of a label's UTF-8 bytes.
pub fn label_hash(label: &str) -> LabelHash {
    keccak256(label.as_bytes())
}

/// ENS namehash of a dotted name (`"base.eth"`). The empty name maps to
/// [`ROOT_NODE`].
pub fn namehash(name: &str) -> Node {
    if name.is_empty() {
        return ROOT_NODE;
    }
    name.rsplit('.')
        .fold(ROOT_NODE, |node, label| make_subdomain_node(&label_hash(label), &node))
}

/// BaseRegistrar token ids are `uint256(labelhash)`.
pub fn label_hash_from_token_id(token_id: U256) -> LabelHash {
    B256::from(token_id.to_be_bytes::<32>())
}

/// Lowercase `0x`-prefixed hex, the canonical textual form used in keys.
pub fn to_hex(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Lowercase hex form of an address (no EIP-55 checksum).
pub fn address_hex(address: &Address) -> String {
    to_hex(address.as_slice())
}

// ─── Block / event references ────────────────────────────────────────────────

/// The block an event was emitted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    pub number: u64,
    /// Unix timestamp of the block (seconds since epoch).
    pub timestamp: UnixTimestamp,
}

/// Position of a log within a chain: ordered by block number, then log index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventPosition {
    pub block_number: u64,
    pub log_index: u32,
}

impl fmt::Display for EventPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block {} log {}", self.block_number, self.log_index)
    }
}

/// Deterministic identifier of one raw event: `{chain}-{block}-{logIndex}`.
///
/// Redelivering the same log yields the same id, which is what makes replays
/// idempotent.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(chain_id: ChainId, block_number: u64, log_index: u32) -> Self {
        Self(format!("{chain_id}-{block_number}-{log_index}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for EventId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable audit record of one decoded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRef {
    pub id: EventId,
    pub chain_id: ChainId,
    pub contract_address: Address,
    pub event_name: String,
    pub block: BlockRef,
    pub transaction_hash: B256,
    pub log_index: u32,
}

impl EventRef {
    pub fn position(&self) -> EventPosition {
        EventPosition {
            block_number: self.block.number,
            log_index: self.log_index,
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::b256;

    #[test]
    fn namehash_of_eth() {
        assert_eq!(
            namehash("eth"),
            b256!("93cdeb708b7545dc668eb9280176169d1c33cfd8ed6f04690a0bcc88a93fc4ae")
        );
    }

    #[test]
    fn namehash_of_empty_is_root() {
        assert_eq!(namehash(""), ROOT_NODE);
    }

    #[test]
    fn subdomain_node_matches_namehash() {
        let eth = namehash("eth");
        assert_eq!(make_subdomain_node(&label_hash("base"), &eth), namehash("base.eth"));
    }

    #[test]
    fn token_id_roundtrips_to_label_hash() {
        let lh = label_hash("vitalik");
        let token_id = U256::from_be_bytes(lh.0);
        assert_eq!(label_hash_from_token_id(token_id), lh);
    }

    #[test]
    fn event_positions_order_by_block_then_log() {
        let a = EventPosition { block_number: 10, log_index: 7 };
        let b = EventPosition { block_number: 11, log_index: 0 };
        let c = EventPosition { block_number: 11, log_index: 3 };
        assert!(a < b && b < c);
    }

    #[test]
    fn event_id_format() {
        assert_eq!(EventId::new(8453, 100, 2).as_str(), "8453-100-2");
    }
}
