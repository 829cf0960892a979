//! Typed access to a decoded event's `args`.
//!
//! Hosts deliver ABI-decoded arguments as JSON. Integers may arrive as JSON
//! numbers, decimal strings, or `0x` hex strings; hashes and addresses as
//! `0x` hex strings. Each accessor takes a list of accepted argument names
//! because contract generations disagree on spelling (`label` / `labelhash`).

use alloy_primitives::{Address, B256, U256};
use serde_json::Value;

use ensindex_core::error::IndexerError;
use ensindex_core::handler::DecodedEvent;
use ensindex_core::types::{label_hash_from_token_id, LabelHash, UnixTimestamp};

fn missing(event: &DecodedEvent, names: &[&str]) -> IndexerError {
    IndexerError::invalid_event(
        &event.event_name,
        format!("missing argument {}", names.join(" / ")),
    )
}

/// The first present argument among `names`.
pub fn field<'a>(event: &'a DecodedEvent, names: &[&str]) -> Result<(String, &'a Value), IndexerError> {
    let args = event
        .args
        .as_object()
        .ok_or_else(|| IndexerError::invalid_event(&event.event_name, "args is not an object"))?;
    names
        .iter()
        .find_map(|name| args.get(*name).map(|v| (name.to_string(), v)))
        .ok_or_else(|| missing(event, names))
}

pub fn u256(event: &DecodedEvent, names: &[&str]) -> Result<U256, IndexerError> {
    let (name, value) = field(event, names)?;
    let bad = |reason: String| IndexerError::invalid_event(&event.event_name, format!("{name}: {reason}"));
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| bad(format!("{n} is not an unsigned integer"))),
        Value::String(s) => s.parse::<U256>().map_err(|e| bad(format!("'{s}': {e}"))),
        other => Err(bad(format!("unexpected {other}"))),
    }
}

/// A unix timestamp argument (e.g. `expires`). Must fit a signed 64-bit
/// second count.
pub fn timestamp(event: &DecodedEvent, names: &[&str]) -> Result<UnixTimestamp, IndexerError> {
    let value = u256(event, names)?;
    u64::try_from(value)
        .ok()
        .and_then(|secs| i64::try_from(secs).ok())
        .ok_or_else(|| {
            IndexerError::invalid_event(&event.event_name, format!("timestamp {value} out of range"))
        })
}

fn parse_hex<T>(event: &DecodedEvent, names: &[&str]) -> Result<T, IndexerError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let (name, value) = field(event, names)?;
    let s = value.as_str().ok_or_else(|| {
        IndexerError::invalid_event(&event.event_name, format!("{name}: expected a hex string"))
    })?;
    s.parse::<T>()
        .map_err(|e| IndexerError::invalid_event(&event.event_name, format!("{name} '{s}': {e}")))
}

pub fn b256(event: &DecodedEvent, names: &[&str]) -> Result<B256, IndexerError> {
    parse_hex(event, names)
}

pub fn address(event: &DecodedEvent, names: &[&str]) -> Result<Address, IndexerError> {
    parse_hex(event, names)
}

/// Label hash carried as an ERC-721 token id (`uint256(labelhash)`).
pub fn token_label_hash(event: &DecodedEvent) -> Result<LabelHash, IndexerError> {
    Ok(label_hash_from_token_id(u256(event, &["id", "tokenId"])?))
}

/// Label hash carried directly as a bytes32.
pub fn label_hash(event: &DecodedEvent) -> Result<LabelHash, IndexerError> {
    b256(event, &["labelhash", "labelHash", "label"])
}

#[cfg(test)]
mod tests {
    use super::*;
    use ensindex_core::types::BlockRef;
    use serde_json::json;

    fn event(args: Value) -> DecodedEvent {
        DecodedEvent {
            chain_id: 1,
            contract_address: Address::ZERO,
            event_name: "NameRegistered".into(),
            block: BlockRef { number: 1, timestamp: 1 },
            transaction_hash: B256::ZERO,
            transaction_from: None,
            log_index: 0,
            args,
        }
    }

    #[test]
    fn integers_in_any_encoding() {
        let e = event(json!({ "a": 42, "b": "42", "c": "0x2a" }));
        for name in ["a", "b", "c"] {
            assert_eq!(u256(&e, &[name]).unwrap(), U256::from(42));
        }
    }

    #[test]
    fn first_matching_name_wins() {
        let hash = format!("0x{}", "11".repeat(32));
        let e = event(json!({ "label": "alice", "labelhash": hash }));
        assert_eq!(label_hash(&e).unwrap(), B256::repeat_byte(0x11));
    }

    #[test]
    fn timestamp_must_fit_i64() {
        let e = event(json!({ "expires": format!("0x{}", "ff".repeat(32)) }));
        assert!(matches!(
            timestamp(&e, &["expires"]),
            Err(IndexerError::InvalidEvent { .. })
        ));
        let e = event(json!({ "expires": 4000 }));
        assert_eq!(timestamp(&e, &["expires"]).unwrap(), 4000);
    }

    #[test]
    fn missing_and_malformed_are_invalid_event() {
        let e = event(json!({ "owner": 7 }));
        assert!(address(&e, &["owner"]).is_err());
        assert!(address(&e, &["registrant"]).is_err());
        assert!(u256(&event(json!([1, 2])), &["x"]).is_err());
    }

    #[test]
    fn token_id_is_label_hash() {
        let e = event(json!({ "id": "0x01" }));
        let mut expected = [0u8; 32];
        expected[31] = 1;
        assert_eq!(token_label_hash(&e).unwrap(), B256::from(expected));
    }
}
