//! Base registrar (ERC-721 ownership contract).

use alloy_primitives::Address;

use ensindex_core::action::ActionType;
use ensindex_core::correlator::RegistrarEvent;
use ensindex_core::error::IndexerError;
use ensindex_core::handler::{DecodedEvent, EventAdapter, NormalizedEvent};
use ensindex_core::subregistry::{ContractBinding, ContractFamily};

use crate::args;

/// `NameRegistered(uint256 id, address owner, uint256 expires)`,
/// `NameRenewed(uint256 id, uint256 expires)`, the directory events, and
/// `Transfer` (provenance only).
pub struct BaseRegistrarAdapter;

impl EventAdapter for BaseRegistrarAdapter {
    fn family(&self) -> ContractFamily {
        ContractFamily::BaseRegistrar
    }

    fn event_names(&self) -> &'static [&'static str] {
        &[
            "NameRegistered",
            "NameRenewed",
            "Transfer",
            "ControllerAdded",
            "ControllerRemoved",
        ]
    }

    fn normalize(
        &self,
        event: &DecodedEvent,
        binding: &ContractBinding,
    ) -> Result<NormalizedEvent, IndexerError> {
        match event.event_name.as_str() {
            "NameRegistered" => {
                let owner = args::address(event, &["owner"])?;
                Ok(NormalizedEvent::Registrar(RegistrarEvent {
                    subregistry: binding.subregistry,
                    label_hash: args::token_label_hash(event)?,
                    action_type: ActionType::Registration,
                    expires_at: args::timestamp(event, &["expires"])?,
                    registrant: event.transaction_from.unwrap_or(owner),
                    event: event.event_ref(),
                }))
            }
            "NameRenewed" => Ok(NormalizedEvent::Registrar(RegistrarEvent {
                subregistry: binding.subregistry,
                label_hash: args::token_label_hash(event)?,
                action_type: ActionType::Renewal,
                expires_at: args::timestamp(event, &["expires"])?,
                registrant: event.transaction_from.unwrap_or(Address::ZERO),
                event: event.event_ref(),
            })),
            "ControllerAdded" => Ok(NormalizedEvent::ControllerAdded {
                chain_id: event.chain_id,
                controller: args::address(event, &["controller"])?,
                registrar: event.contract_address,
            }),
            "ControllerRemoved" => Ok(NormalizedEvent::ControllerRemoved {
                chain_id: event.chain_id,
                controller: args::address(event, &["controller"])?,
            }),
            "Transfer" => Ok(NormalizedEvent::Provenance),
            other => Err(IndexerError::invalid_event(other, "not a base registrar event")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, B256, U256};
    use ensindex_core::subregistry::{Subregistry, SubregistryId};
    use ensindex_core::types::{label_hash, namehash, BlockRef};
    use serde_json::json;

    const REGISTRAR: Address = address!("57f1887a8BF19b14fC0dF6Fd9B2acc9Af147eA85");
    const OWNER: Address = address!("1111111111111111111111111111111111111111");
    const SENDER: Address = address!("2222222222222222222222222222222222222222");

    fn binding() -> ContractBinding {
        ContractBinding {
            subregistry: Subregistry {
                id: SubregistryId::new(1, REGISTRAR),
                node: namehash("eth"),
            },
            family: ContractFamily::BaseRegistrar,
        }
    }

    fn event(name: &str, args: serde_json::Value, from: Option<Address>) -> DecodedEvent {
        DecodedEvent {
            chain_id: 1,
            contract_address: REGISTRAR,
            event_name: name.into(),
            block: BlockRef { number: 10, timestamp: 1000 },
            transaction_hash: B256::repeat_byte(1),
            transaction_from: from,
            log_index: 0,
            args,
        }
    }

    fn token_id(label: &str) -> String {
        U256::from_be_bytes(label_hash(label).0).to_string()
    }

    #[test]
    fn registration_prefers_transaction_sender() {
        let args = json!({ "id": token_id("alice"), "owner": OWNER.to_string(), "expires": 2000 });

        let NormalizedEvent::Registrar(with_sender) = BaseRegistrarAdapter
            .normalize(&event("NameRegistered", args.clone(), Some(SENDER)), &binding())
            .unwrap()
        else {
            panic!("expected a registrar event");
        };
        assert_eq!(with_sender.registrant, SENDER);
        assert_eq!(with_sender.label_hash, label_hash("alice"));
        assert_eq!(with_sender.expires_at, 2000);
        assert_eq!(with_sender.action_type, ActionType::Registration);

        let NormalizedEvent::Registrar(without) = BaseRegistrarAdapter
            .normalize(&event("NameRegistered", args, None), &binding())
            .unwrap()
        else {
            panic!("expected a registrar event");
        };
        assert_eq!(without.registrant, OWNER);
    }

    #[test]
    fn renewal_without_sender_has_zero_registrant() {
        let args = json!({ "id": token_id("alice"), "expires": 4000 });
        let NormalizedEvent::Registrar(renewal) = BaseRegistrarAdapter
            .normalize(&event("NameRenewed", args, None), &binding())
            .unwrap()
        else {
            panic!("expected a registrar event");
        };
        assert_eq!(renewal.action_type, ActionType::Renewal);
        assert_eq!(renewal.registrant, Address::ZERO);
    }

    #[test]
    fn controller_added_names_the_registrar() {
        let args = json!({ "controller": SENDER.to_string() });
        let normalized = BaseRegistrarAdapter
            .normalize(&event("ControllerAdded", args, None), &binding())
            .unwrap();
        assert!(matches!(
            normalized,
            NormalizedEvent::ControllerAdded { chain_id: 1, controller, registrar }
                if controller == SENDER && registrar == REGISTRAR
        ));
    }

    #[test]
    fn malformed_registration_is_rejected() {
        let args = json!({ "id": token_id("alice"), "owner": OWNER.to_string() });
        let err = BaseRegistrarAdapter
            .normalize(&event("NameRegistered", args, None), &binding())
            .unwrap_err();
        assert!(matches!(err, IndexerError::InvalidEvent { .. }));
    }
}
