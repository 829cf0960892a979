//! Event builders and fixture loading shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use alloy_primitives::{address, Address, B256};
use serde_json::{json, Value};

use ensindex_core::handler::DecodedEvent;
use ensindex_core::indexer::IndexerConfig;
use ensindex_core::store::RegistrarStore;
use ensindex_core::subregistry::SubregistryId;
use ensindex_core::types::{make_subdomain_node, namehash, to_hex, BlockRef, Node};
use ensindex_evm::{IndexerBuilder, Processor};

pub const REGISTRAR: Address = address!("57f1887a8BF19b14fC0dF6Fd9B2acc9Af147eA85");
pub const LEGACY: Address = address!("283Af0B28c62C092C9727F1Ee09c02CA627EB7F5");
pub const WRAPPED: Address = address!("253553366Da8546fC250F225fe3d25d0C782303b");
pub const UNWRAPPED: Address = address!("59E16fcCd424Cc24e280Be16E11Bcd56fb0CE547");
pub const REFERRER: Address = address!("7777777777777777777777777777777777777777");
pub const BASE_REGISTRAR: Address = address!("03c4738Ee98aE44591e1A4A4F3CaB6641d95DD9a");
pub const BASE_CONTROLLER: Address = address!("4cCb0BB02FCABA27e82a56646E81d8c5bC4119a5");

pub fn fixture_path(name: &str) -> std::path::PathBuf {
    let mut p = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    p.push("tests");
    p.push("fixtures");
    p.push(name);
    p
}

pub fn load_fixture(name: &str) -> String {
    let path = fixture_path(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {path:?}: {e}"))
}

/// A processor built from `fixtures/config.json` over `store`.
pub fn processor_over(store: Arc<dyn RegistrarStore>) -> Arc<Processor> {
    let config = IndexerConfig::from_json(&load_fixture("config.json")).unwrap();
    Arc::new(IndexerBuilder::from_config(config).build(store).unwrap())
}

pub fn label(byte: u8) -> B256 {
    B256::repeat_byte(byte)
}

pub fn eth_node(label_hash: B256) -> Node {
    make_subdomain_node(&label_hash, &namehash("eth"))
}

pub fn eth() -> SubregistryId {
    SubregistryId::new(1, REGISTRAR)
}

pub fn tx(byte: u8) -> B256 {
    B256::repeat_byte(byte)
}

#[allow(clippy::too_many_arguments)]
pub fn event(
    chain_id: u64,
    contract: Address,
    name: &str,
    block: u64,
    timestamp: i64,
    transaction: B256,
    log_index: u32,
    args: Value,
) -> DecodedEvent {
    DecodedEvent {
        chain_id,
        contract_address: contract,
        event_name: name.into(),
        block: BlockRef {
            number: block,
            timestamp,
        },
        transaction_hash: transaction,
        transaction_from: None,
        log_index,
        args,
    }
}

pub fn registered(block: u64, ts: i64, t: B256, log: u32, label_hash: B256, expires: i64) -> DecodedEvent {
    event(
        1,
        REGISTRAR,
        "NameRegistered",
        block,
        ts,
        t,
        log,
        json!({ "id": to_hex(label_hash), "owner": Address::repeat_byte(0xbb).to_string(), "expires": expires }),
    )
}

pub fn renewed(block: u64, ts: i64, t: B256, log: u32, label_hash: B256, expires: i64) -> DecodedEvent {
    event(
        1,
        REGISTRAR,
        "NameRenewed",
        block,
        ts,
        t,
        log,
        json!({ "id": to_hex(label_hash), "expires": expires }),
    )
}
