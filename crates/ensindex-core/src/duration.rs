//! Incremental registration duration.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::UnixTimestamp;

/// Seconds of registration lifetime added by one action.
///
/// Signed and never clamped: a negative value means the input
/// timestamps are inconsistent and must stay visible to validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IncrementalDuration(i64);

impl IncrementalDuration {
    /// `to − from`, or `None` if the difference does not fit in an `i64`.
    pub fn between(from: UnixTimestamp, to: UnixTimestamp) -> Option<Self> {
        to.checked_sub(from).map(Self)
    }

    pub fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> i64 {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for IncrementalDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_duration() {
        // expires 2000, block 1000
        assert_eq!(IncrementalDuration::between(1000, 2000).unwrap().as_secs(), 1000);
    }

    #[test]
    fn negative_duration_is_not_clamped() {
        let d = IncrementalDuration::between(5000, 4000).unwrap();
        assert_eq!(d.as_secs(), -1000);
        assert!(d.is_negative());
    }

    #[test]
    fn out_of_range_difference_is_none() {
        assert_eq!(IncrementalDuration::between(-1, i64::MAX), None);
        assert_eq!(IncrementalDuration::between(i64::MAX, i64::MIN), None);
    }
}
