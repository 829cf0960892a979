//! Invariant checks run on every registrar action before it is written.

use std::collections::HashSet;

use crate::action::RegistrarAction;
use crate::duration::IncrementalDuration;
use crate::error::IndexerError;
use crate::pricing::Pricing;
use crate::referral::{decode_referrer, Referral};

/// Suspicious but recordable facts. These are logged, never corrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anomaly {
    /// Expiry earlier than the reference time: upstream data is inconsistent.
    NegativeDuration(IncrementalDuration),
}

/// Check the hard invariants of an action and report soft anomalies.
///
/// Hard invariants: `event_ids` non-empty, starting with the action id and
/// free of duplicates; available pricing satisfies `total = base + premium`;
/// an available referral's decoded address matches its encoding.
pub fn validate_action(action: &RegistrarAction) -> Result<Vec<Anomaly>, IndexerError> {
    let violation = |reason: String| IndexerError::InvariantViolation {
        id: action.id.to_string(),
        reason,
    };

    match action.event_ids.first() {
        None => return Err(violation("no contributing events".into())),
        Some(first) if *first != action.id => {
            return Err(violation(format!("first event {first} is not the creating event")))
        }
        Some(_) => {}
    }

    let mut seen = HashSet::with_capacity(action.event_ids.len());
    for id in &action.event_ids {
        if !seen.insert(id) {
            return Err(violation(format!("event {id} recorded twice")));
        }
    }

    if let Pricing::Available(price) = &action.pricing {
        if !price.is_consistent() {
            return Err(violation(format!(
                "total {} != base cost {} + premium {}",
                price.total(),
                price.base_cost(),
                price.premium()
            )));
        }
    }

    if let Referral::Available(info) = &action.referral {
        if decode_referrer(&info.encoded_referrer) != info.decoded_referrer {
            return Err(violation("decoded referrer does not match encoding".into()));
        }
    }

    let mut anomalies = Vec::new();
    if action.incremental_duration.is_negative() {
        anomalies.push(Anomaly::NegativeDuration(action.incremental_duration));
    }
    Ok(anomalies)
}
