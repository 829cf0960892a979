//! Referrer decoding.

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

/// An encoded referrer (bytes32) and the address it decodes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferrerInfo {
    pub encoded_referrer: B256,
    pub decoded_referrer: Address,
}

impl ReferrerInfo {
    pub fn from_encoded(encoded_referrer: B256) -> Self {
        Self {
            encoded_referrer,
            decoded_referrer: decode_referrer(&encoded_referrer),
        }
    }
}

/// Referral attached to an action.
///
/// `NotApplicable` means the emitting contract generation has no referral
/// concept at all. A supported-but-empty referrer is `Available` with a zero
/// encoded value, so the two cases stay distinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", content = "referrer", rename_all = "snake_case")]
pub enum Referral {
    Available(ReferrerInfo),
    #[default]
    NotApplicable,
}

impl Referral {
    pub fn from_encoded(encoded: B256) -> Self {
        Self::Available(ReferrerInfo::from_encoded(encoded))
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    pub fn info(&self) -> Option<&ReferrerInfo> {
        match self {
            Self::Available(r) => Some(r),
            Self::NotApplicable => None,
        }
    }

    /// Available information wins; `NotApplicable` never erases a referral
    /// that another event already attached.
    pub fn merge(self, incoming: Referral) -> Referral {
        match incoming {
            Self::Available(_) => incoming,
            Self::NotApplicable => self,
        }
    }
}

/// Decode a bytes32 referrer into an address.
///
/// The address is left-padded with 12 zero bytes. Any value with a non-zero
/// padding does not encode an address and decodes to the zero address.
pub fn decode_referrer(encoded: &B256) -> Address {
    let (padding, tail) = encoded.as_slice().split_at(12);
    if padding.iter().all(|b| *b == 0) {
        Address::from_slice(tail)
    } else {
        Address::ZERO
    }
}
