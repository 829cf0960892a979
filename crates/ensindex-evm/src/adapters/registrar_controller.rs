//! Registrar controllers, one adapter per generation.
//!
//! | generation | registration price | renewal price | referrer |
//! |---|---|---|---|
//! | legacy | `cost` | `cost` | - |
//! | wrapped | `baseCost + premium` | `cost` | - |
//! | unwrapped | `baseCost + premium` | `cost` | `referrer` (bytes32) |
//! | unpriced | - | - | - |
//!
//! A single `cost` is taken as the base cost with a zero premium.

use ensindex_core::action::ActionType;
use ensindex_core::correlator::ControllerEvent;
use ensindex_core::error::IndexerError;
use ensindex_core::handler::{DecodedEvent, EventAdapter, NormalizedEvent};
use ensindex_core::pricing::{PriceBreakdown, Pricing};
use ensindex_core::referral::Referral;
use ensindex_core::subregistry::{ContractBinding, ContractFamily, ControllerGeneration};

use crate::args;

pub struct RegistrarControllerAdapter {
    generation: ControllerGeneration,
}

impl RegistrarControllerAdapter {
    pub fn new(generation: ControllerGeneration) -> Self {
        Self { generation }
    }

    fn pricing(&self, event: &DecodedEvent, action_type: ActionType) -> Result<Pricing, IndexerError> {
        let breakdown = match (self.generation, action_type) {
            (ControllerGeneration::Unpriced, _) => return Ok(Pricing::Unknown),
            (ControllerGeneration::Legacy, _) | (_, ActionType::Renewal) => {
                PriceBreakdown::from_cost(args::u256(event, &["cost"])?)
            }
            (_, ActionType::Registration) => {
                let base_cost = args::u256(event, &["baseCost"])?;
                let premium = args::u256(event, &["premium"])?;
                PriceBreakdown::new(base_cost, premium).ok_or_else(|| {
                    IndexerError::invalid_event(&event.event_name, "baseCost + premium overflows")
                })?
            }
        };
        Ok(Pricing::Available(breakdown))
    }

    fn referral(&self, event: &DecodedEvent) -> Result<Referral, IndexerError> {
        if self.generation.supports_referral() {
            Ok(Referral::from_encoded(args::b256(event, &["referrer"])?))
        } else {
            Ok(Referral::NotApplicable)
        }
    }
}

impl EventAdapter for RegistrarControllerAdapter {
    fn family(&self) -> ContractFamily {
        ContractFamily::RegistrarController(self.generation)
    }

    fn event_names(&self) -> &'static [&'static str] {
        &["NameRegistered", "NameRenewed"]
    }

    fn normalize(
        &self,
        event: &DecodedEvent,
        binding: &ContractBinding,
    ) -> Result<NormalizedEvent, IndexerError> {
        let action_type = match event.event_name.as_str() {
            "NameRegistered" => ActionType::Registration,
            "NameRenewed" => ActionType::Renewal,
            other => return Err(IndexerError::invalid_event(other, "not a controller event")),
        };
        Ok(NormalizedEvent::Controller(ControllerEvent {
            subregistry: binding.subregistry,
            label_hash: args::label_hash(event)?,
            action_type,
            pricing: self.pricing(event, action_type)?,
            referral: self.referral(event)?,
            event: event.event_ref(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256, U256};
    use ensindex_core::referral::ReferrerInfo;
    use ensindex_core::subregistry::{Subregistry, SubregistryId};
    use ensindex_core::types::{label_hash, namehash, to_hex, BlockRef};
    use serde_json::json;

    fn normalize(
        generation: ControllerGeneration,
        name: &str,
        args: serde_json::Value,
    ) -> Result<ControllerEvent, IndexerError> {
        let binding = ContractBinding {
            subregistry: Subregistry {
                id: SubregistryId::new(1, Address::repeat_byte(0x57)),
                node: namehash("eth"),
            },
            family: ContractFamily::RegistrarController(generation),
        };
        let event = DecodedEvent {
            chain_id: 1,
            contract_address: Address::repeat_byte(0x25),
            event_name: name.into(),
            block: BlockRef { number: 10, timestamp: 1000 },
            transaction_hash: B256::repeat_byte(1),
            transaction_from: None,
            log_index: 1,
            args,
        };
        match RegistrarControllerAdapter::new(generation).normalize(&event, &binding)? {
            NormalizedEvent::Controller(c) => Ok(c),
            other => panic!("unexpected {}", other.kind()),
        }
    }

    fn alice() -> String {
        to_hex(label_hash("alice"))
    }

    #[test]
    fn legacy_cost_is_base_cost() {
        let c = normalize(
            ControllerGeneration::Legacy,
            "NameRegistered",
            json!({ "name": "alice", "label": alice(), "cost": "5000", "expires": 2000 }),
        )
        .unwrap();
        let price = c.pricing.breakdown().unwrap();
        assert_eq!(price.base_cost(), U256::from(5000));
        assert_eq!(price.premium(), U256::ZERO);
        assert_eq!(c.referral, Referral::NotApplicable);
        assert_eq!(c.label_hash, label_hash("alice"));
    }

    #[test]
    fn wrapped_registration_splits_premium() {
        let c = normalize(
            ControllerGeneration::Wrapped,
            "NameRegistered",
            json!({ "label": alice(), "baseCost": 100, "premium": 20 }),
        )
        .unwrap();
        assert_eq!(c.pricing.breakdown().unwrap().total(), U256::from(120));

        let renewal = normalize(
            ControllerGeneration::Wrapped,
            "NameRenewed",
            json!({ "label": alice(), "cost": 70 }),
        )
        .unwrap();
        assert_eq!(renewal.action_type, ActionType::Renewal);
        assert_eq!(renewal.pricing.breakdown().unwrap().total(), U256::from(70));
    }

    #[test]
    fn unwrapped_carries_referrer() {
        let referrer = B256::left_padding_from(&[0x42; 20]);
        let c = normalize(
            ControllerGeneration::Unwrapped,
            "NameRegistered",
            json!({
                "label": "alice",
                "labelhash": alice(),
                "baseCost": 100,
                "premium": 0,
                "referrer": to_hex(referrer),
            }),
        )
        .unwrap();
        assert_eq!(c.referral, Referral::Available(ReferrerInfo::from_encoded(referrer)));
        assert_eq!(
            c.referral.info().unwrap().decoded_referrer,
            Address::repeat_byte(0x42)
        );
    }

    #[test]
    fn unwrapped_without_referrer_is_invalid() {
        let err = normalize(
            ControllerGeneration::Unwrapped,
            "NameRenewed",
            json!({ "labelhash": alice(), "cost": 1 }),
        )
        .unwrap_err();
        assert!(matches!(err, IndexerError::InvalidEvent { .. }));
    }

    #[test]
    fn unpriced_reports_nothing() {
        let c = normalize(
            ControllerGeneration::Unpriced,
            "NameRegistered",
            json!({ "label": alice(), "expires": 2000 }),
        )
        .unwrap();
        assert_eq!(c.pricing, Pricing::Unknown);
        assert_eq!(c.referral, Referral::NotApplicable);
    }
}
