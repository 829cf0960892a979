//! Pricing composition for registrar actions.
//!
//! Controllers differ in what they emit: older generations report a single
//! `cost`, newer ones report `baseCost` and `premium` separately. Either way the
//! breakdown is assembled once, from the native fields, and `total` is always
//! `base_cost + premium`.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// A price in the chain's native unit (wei), split into its components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PriceParts")]
pub struct PriceBreakdown {
    base_cost: U256,
    premium: U256,
    total: U256,
}

#[derive(Deserialize)]
struct PriceParts {
    base_cost: U256,
    premium: U256,
    total: U256,
}

impl TryFrom<PriceParts> for PriceBreakdown {
    type Error = String;

    fn try_from(parts: PriceParts) -> Result<Self, Self::Error> {
        Self::from_parts(parts.base_cost, parts.premium, parts.total)
    }
}

impl PriceBreakdown {
    /// Compose a breakdown from a base cost and a premium.
    ///
    /// Returns `None` if the sum overflows 256 bits.
    pub fn new(base_cost: U256, premium: U256) -> Option<Self> {
        let total = base_cost.checked_add(premium)?;
        Some(Self {
            base_cost,
            premium,
            total,
        })
    }

    /// A single-figure `cost` with no premium component.
    pub fn from_cost(cost: U256) -> Self {
        Self {
            base_cost: cost,
            premium: U256::ZERO,
            total: cost,
        }
    }

    /// Rebuild a stored breakdown, rejecting rows where the total disagrees.
    pub fn from_parts(base_cost: U256, premium: U256, total: U256) -> Result<Self, String> {
        match Self::new(base_cost, premium) {
            Some(p) if p.total == total => Ok(p),
            _ => Err(format!(
                "total {total} != base cost {base_cost} + premium {premium}"
            )),
        }
    }

    pub fn base_cost(&self) -> U256 {
        self.base_cost
    }

    pub fn premium(&self) -> U256 {
        self.premium
    }

    pub fn total(&self) -> U256 {
        self.total
    }

    /// Re-checks the composition invariant.
    pub fn is_consistent(&self) -> bool {
        self.base_cost.checked_add(self.premium) == Some(self.total)
    }
}

/// Price attached to an action. `Unknown` is a normal state, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", content = "price", rename_all = "snake_case")]
pub enum Pricing {
    Available(PriceBreakdown),
    #[default]
    Unknown,
}

impl Pricing {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    pub fn breakdown(&self) -> Option<&PriceBreakdown> {
        match self {
            Self::Available(p) => Some(p),
            Self::Unknown => None,
        }
    }

    /// Merge a newly observed fact: available information wins, `Unknown`
    /// never erases what is already known.
    pub fn merge(self, incoming: Pricing) -> Pricing {
        match incoming {
            Self::Available(_) => incoming,
            Self::Unknown => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_is_base_plus_premium() {
        let p = PriceBreakdown::new(U256::from(100), U256::from(20)).unwrap();
        assert_eq!(p.total(), U256::from(120));
        assert!(p.is_consistent());
    }

    #[test]
    fn cost_only_has_zero_premium() {
        let p = PriceBreakdown::from_cost(U256::from(5_000));
        assert_eq!(p.base_cost(), U256::from(5_000));
        assert_eq!(p.premium(), U256::ZERO);
        assert_eq!(p.total(), U256::from(5_000));
    }

    #[test]
    fn overflow_is_rejected() {
        assert!(PriceBreakdown::new(U256::MAX, U256::from(1)).is_none());
    }

    #[test]
    fn from_parts_rejects_inconsistent_total() {
        assert!(PriceBreakdown::from_parts(U256::from(1), U256::from(2), U256::from(4)).is_err());
        assert!(PriceBreakdown::from_parts(U256::from(1), U256::from(2), U256::from(3)).is_ok());
    }

    #[test]
    fn deserialize_checks_total() {
        let bad = r#"{"base_cost":"0x1","premium":"0x2","total":"0x9"}"#;
        assert!(serde_json::from_str::<PriceBreakdown>(bad).is_err());
    }

    #[test]
    fn unknown_never_erases_available() {
        let known = Pricing::Available(PriceBreakdown::from_cost(U256::from(7)));
        assert_eq!(known.merge(Pricing::Unknown), known);
        assert_eq!(Pricing::Unknown.merge(known), known);
    }
}
