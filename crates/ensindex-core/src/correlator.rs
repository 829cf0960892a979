//! Logical action correlator.
//!
//! Several raw events can describe one registration or renewal: the base
//! registrar's ownership change, a controller's price/referrer report, and a
//! renewal-referrer's attribution. They are joined on
//! [`LogicalEventKey`] `(subregistry, node, transaction)`:
//!
//! ```text
//! Path A  registrar event   → lifecycle transition, new action, pending[key] = action.id
//! Path B  controller event  → resolve pending[key], patch pricing + referral, delete pending[key],
//!                             flag lifecycle controller-managed
//! Path C  referral event    → resolve pending[key], patch referral only
//! ```
//!
//! All three must run inside the same unit of work as the other events of the
//! transaction; see `ensindex-evm`'s processor for the ordering.

use alloy_primitives::Address;
use tracing::{debug, warn};

use crate::action::{ActionType, LogicalEventKey, RegistrarAction};
use crate::duration::IncrementalDuration;
use crate::error::IndexerError;
use crate::lifecycle;
use crate::pricing::Pricing;
use crate::referral::{Referral, ReferrerInfo};
use crate::store::UnitOfWork;
use crate::subregistry::{self, Subregistry};
use crate::types::{make_subdomain_node, to_hex, EventRef, LabelHash, Node, UnixTimestamp};
use crate::validate::{validate_action, Anomaly};

// ─── Normalized inputs ────────────────────────────────────────────────────────

/// An ownership-changing registrar event (`NameRegistered` / `NameRenewed`).
#[derive(Debug, Clone)]
pub struct RegistrarEvent {
    pub subregistry: Subregistry,
    pub label_hash: LabelHash,
    pub action_type: ActionType,
    pub expires_at: UnixTimestamp,
    pub registrant: Address,
    pub event: EventRef,
}

/// A registrar-controller report on the same action.
#[derive(Debug, Clone)]
pub struct ControllerEvent {
    pub subregistry: Subregistry,
    pub label_hash: LabelHash,
    pub action_type: ActionType,
    pub pricing: Pricing,
    pub referral: Referral,
    pub event: EventRef,
}

/// A referral attached to a renewal after the fact.
#[derive(Debug, Clone)]
pub struct RenewalReferralEvent {
    pub subregistry: Subregistry,
    pub label_hash: LabelHash,
    pub referrer: ReferrerInfo,
    pub event: EventRef,
}

fn node_of(subregistry: &Subregistry, label_hash: &LabelHash) -> Node {
    make_subdomain_node(label_hash, &subregistry.node)
}

// ─── Path A ──────────────────────────────────────────────────────────────────

/// Apply a registrar event: transition the lifecycle, create the action, and
/// leave a pending correlation for controller events in the same transaction.
pub async fn open_action(
    uow: &mut dyn UnitOfWork,
    input: &RegistrarEvent,
) -> Result<RegistrarAction, IndexerError> {
    let subregistry_id = input.subregistry.id;
    let node = node_of(&input.subregistry, &input.label_hash);
    let block = input.event.block;

    subregistry::record_observed(uow, &input.subregistry).await?;

    let (from, to) = match input.action_type {
        ActionType::Registration => {
            match lifecycle::get_current(uow, &subregistry_id, &node).await? {
                None => {
                    lifecycle::record_first_registration(uow, &subregistry_id, &node, input.expires_at)
                        .await?;
                    debug!(node = %to_hex(node), subregistry = %subregistry_id, "first registration");
                }
                Some(_) => {
                    lifecycle::record_subsequent_registration(
                        uow,
                        &subregistry_id,
                        &node,
                        input.expires_at,
                    )
                    .await?;
                    debug!(node = %to_hex(node), subregistry = %subregistry_id, "re-registration");
                }
            }
            (block.timestamp, input.expires_at)
        }
        ActionType::Renewal => {
            let renewed =
                lifecycle::record_renewal(uow, &subregistry_id, &node, input.expires_at).await?;
            (renewed.previous_expires_at, input.expires_at)
        }
    };
    let incremental_duration = IncrementalDuration::between(from, to).ok_or_else(|| {
        IndexerError::invalid_event(
            &input.event.event_name,
            format!("duration from {from} to {to} is out of range"),
        )
    })?;

    let action = RegistrarAction {
        id: input.event.id.clone(),
        action_type: input.action_type,
        node,
        subregistry_id,
        incremental_duration,
        registrant: input.registrant,
        pricing: Pricing::Unknown,
        referral: Referral::NotApplicable,
        block,
        transaction_hash: input.event.transaction_hash,
        log_index: input.event.log_index,
        event_ids: vec![input.event.id.clone()],
    };
    report_anomalies(&action, validate_action(&action)?);

    let key = action.logical_key();
    uow.insert_action(&action).await?;
    uow.insert_pending(&key, &action.id).await?;

    debug!(
        action_id = %action.id,
        action_type = %action.action_type,
        key = %key,
        duration = action.incremental_duration.as_secs(),
        "registrar action opened"
    );
    Ok(action)
}

// ─── Path B ──────────────────────────────────────────────────────────────────

/// Merge a controller's pricing/referral into the action opened by the
/// registrar event of the same transaction.
///
/// The pending correlation is consumed. Fails with `CorrelationMissing` when no
/// registrar event opened an action for the key.
pub async fn enrich_from_controller(
    uow: &mut dyn UnitOfWork,
    input: &ControllerEvent,
) -> Result<RegistrarAction, IndexerError> {
    let node = node_of(&input.subregistry, &input.label_hash);
    let key = LogicalEventKey::new(&input.subregistry.id, &node, &input.event.transaction_hash);

    let mut action = resolve(uow, &key).await?;
    if action.action_type != input.action_type {
        return Err(IndexerError::ActionMismatch {
            id: action.id.to_string(),
            reason: format!(
                "controller reported a {} for a {}",
                input.action_type, action.action_type
            ),
        });
    }
    uow.delete_pending(&key).await?;

    action.pricing = action.pricing.merge(input.pricing);
    action.referral = action.referral.merge(input.referral);
    action.record_event(input.event.id.clone());
    report_anomalies(&action, validate_action(&action)?);
    uow.update_action(&action).await?;

    lifecycle::mark_controller_managed(uow, &input.subregistry.id, &node).await?;

    debug!(
        action_id = %action.id,
        key = %key,
        priced = action.pricing.is_available(),
        referred = action.referral.is_available(),
        "registrar action enriched by controller"
    );
    Ok(action)
}

// ─── Path C ──────────────────────────────────────────────────────────────────

/// Attach a referrer to a renewal. Pricing is left untouched and the pending
/// correlation stays in place for a controller event of the same transaction.
pub async fn attach_renewal_referral(
    uow: &mut dyn UnitOfWork,
    input: &RenewalReferralEvent,
) -> Result<RegistrarAction, IndexerError> {
    let node = node_of(&input.subregistry, &input.label_hash);
    let key = LogicalEventKey::new(&input.subregistry.id, &node, &input.event.transaction_hash);

    let mut action = resolve(uow, &key).await?;
    if action.action_type != ActionType::Renewal {
        return Err(IndexerError::ActionMismatch {
            id: action.id.to_string(),
            reason: format!("renewal referral for a {}", action.action_type),
        });
    }

    action.referral = Referral::Available(input.referrer);
    action.record_event(input.event.id.clone());
    report_anomalies(&action, validate_action(&action)?);
    uow.update_action(&action).await?;

    debug!(action_id = %action.id, key = %key, "renewal referral attached");
    Ok(action)
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

async fn resolve(
    uow: &mut dyn UnitOfWork,
    key: &LogicalEventKey,
) -> Result<RegistrarAction, IndexerError> {
    let action_id = uow
        .pending(key)
        .await?
        .ok_or_else(|| IndexerError::CorrelationMissing {
            key: key.to_string(),
        })?;
    uow.action(&action_id)
        .await?
        .ok_or_else(|| IndexerError::ActionMissing {
            id: action_id.to_string(),
            key: key.to_string(),
        })
}

fn report_anomalies(action: &RegistrarAction, anomalies: Vec<Anomaly>) {
    for anomaly in anomalies {
        match anomaly {
            Anomaly::NegativeDuration(d) => warn!(
                action_id = %action.id,
                node = %to_hex(action.node),
                duration = d.as_secs(),
                "negative incremental duration"
            ),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::PriceBreakdown;
    use crate::subregistry::SubregistryId;
    use crate::testing::ScratchUnitOfWork;
    use crate::types::{label_hash, namehash, BlockRef, EventId};
    use alloy_primitives::{address, B256, U256};

    const REGISTRAR: Address = address!("57f1887a8BF19b14fC0dF6Fd9B2acc9Af147eA85");
    const CONTROLLER: Address = address!("253553366Da8546fC250F225fe3d25d0C782303b");

    fn eth() -> Subregistry {
        Subregistry {
            id: SubregistryId::new(1, REGISTRAR),
            node: namehash("eth"),
        }
    }

    fn event_ref(name: &str, contract: Address, block: u64, ts: i64, log: u32, tx: u8) -> EventRef {
        EventRef {
            id: EventId::new(1, block, log),
            chain_id: 1,
            contract_address: contract,
            event_name: name.into(),
            block: BlockRef { number: block, timestamp: ts },
            transaction_hash: B256::repeat_byte(tx),
            log_index: log,
        }
    }

    fn registered(expires: i64, block: u64, ts: i64, log: u32, tx: u8) -> RegistrarEvent {
        RegistrarEvent {
            subregistry: eth(),
            label_hash: label_hash("alice"),
            action_type: ActionType::Registration,
            expires_at: expires,
            registrant: Address::repeat_byte(0xaa),
            event: event_ref("NameRegistered", REGISTRAR, block, ts, log, tx),
        }
    }

    fn renewed(expires: i64, block: u64, ts: i64, log: u32, tx: u8) -> RegistrarEvent {
        RegistrarEvent {
            action_type: ActionType::Renewal,
            event: event_ref("NameRenewed", REGISTRAR, block, ts, log, tx),
            ..registered(expires, block, ts, log, tx)
        }
    }

    fn priced(base: u64, premium: u64, block: u64, log: u32, tx: u8) -> ControllerEvent {
        ControllerEvent {
            subregistry: eth(),
            label_hash: label_hash("alice"),
            action_type: ActionType::Registration,
            pricing: Pricing::Available(
                PriceBreakdown::new(U256::from(base), U256::from(premium)).unwrap(),
            ),
            referral: Referral::NotApplicable,
            event: event_ref("NameRegistered", CONTROLLER, block, 0, log, tx),
        }
    }

    #[tokio::test]
    async fn registration_then_controller_then_renewal() {
        let mut uow = ScratchUnitOfWork::default();
        let node = make_subdomain_node(&label_hash("alice"), &namehash("eth"));

        let action = open_action(&mut uow, &registered(2000, 10, 1000, 0, 1)).await.unwrap();
        assert_eq!(action.action_type, ActionType::Registration);
        assert_eq!(action.incremental_duration.as_secs(), 1000);
        assert_eq!(action.pricing, Pricing::Unknown);
        assert_eq!(action.event_ids.len(), 1);
        assert_eq!(uow.lifecycles[&(eth().id, node)].expires_at, 2000);

        let enriched = enrich_from_controller(&mut uow, &priced(100, 20, 10, 1, 1)).await.unwrap();
        let price = enriched.pricing.breakdown().unwrap();
        assert_eq!(price.base_cost(), U256::from(100));
        assert_eq!(price.premium(), U256::from(20));
        assert_eq!(price.total(), U256::from(120));
        assert_eq!(enriched.event_ids, vec![EventId::new(1, 10, 0), EventId::new(1, 10, 1)]);
        assert!(uow.pending.is_empty(), "pending correlation is single-use");
        assert!(uow.lifecycles[&(eth().id, node)].controller_managed);

        let renewal = open_action(&mut uow, &renewed(4000, 20, 1500, 0, 2)).await.unwrap();
        assert_eq!(renewal.action_type, ActionType::Renewal);
        assert_eq!(renewal.incremental_duration.as_secs(), 2000);
        assert_eq!(uow.lifecycles[&(eth().id, node)].expires_at, 4000);
        assert_eq!(uow.actions.len(), 2);
    }

    #[tokio::test]
    async fn re_registration_updates_lifecycle_in_place() {
        let mut uow = ScratchUnitOfWork::default();
        open_action(&mut uow, &registered(2000, 10, 1000, 0, 1)).await.unwrap();
        enrich_from_controller(&mut uow, &priced(1, 0, 10, 1, 1)).await.unwrap();

        let again = open_action(&mut uow, &registered(9000, 50, 8000, 0, 5)).await.unwrap();
        assert_eq!(again.action_type, ActionType::Registration);
        assert_eq!(again.incremental_duration.as_secs(), 1000);
        assert_eq!(uow.lifecycles.len(), 1);
        let lc = uow.lifecycles.values().next().unwrap();
        assert_eq!(lc.expires_at, 9000);
        assert!(!lc.controller_managed, "new cycle starts unmanaged");
    }

    #[tokio::test]
    async fn renewal_before_registration_is_fatal() {
        let mut uow = ScratchUnitOfWork::default();
        let err = open_action(&mut uow, &renewed(4000, 20, 1500, 0, 2)).await.unwrap_err();
        assert!(matches!(err, IndexerError::LifecycleNotFound { .. }));
        assert!(uow.lifecycles.is_empty());
        assert!(uow.actions.is_empty());
    }

    #[tokio::test]
    async fn controller_without_registrar_event_is_fatal() {
        let mut uow = ScratchUnitOfWork::default();
        let err = enrich_from_controller(&mut uow, &priced(100, 20, 10, 1, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::CorrelationMissing { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn controller_in_other_transaction_does_not_join() {
        let mut uow = ScratchUnitOfWork::default();
        open_action(&mut uow, &registered(2000, 10, 1000, 0, 1)).await.unwrap();
        let err = enrich_from_controller(&mut uow, &priced(100, 20, 11, 0, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::CorrelationMissing { .. }));
    }

    #[tokio::test]
    async fn dangling_pending_entry_is_action_missing() {
        let mut uow = ScratchUnitOfWork::default();
        let action = open_action(&mut uow, &registered(2000, 10, 1000, 0, 1)).await.unwrap();
        uow.actions.clear();
        let err = enrich_from_controller(&mut uow, &priced(100, 20, 10, 1, 1))
            .await
            .unwrap_err();
        match err {
            IndexerError::ActionMissing { id, .. } => assert_eq!(id, action.id.to_string()),
            other => panic!("expected ActionMissing, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn controller_type_must_match_action() {
        let mut uow = ScratchUnitOfWork::default();
        open_action(&mut uow, &registered(2000, 10, 1000, 0, 1)).await.unwrap();
        let mut renewal_report = priced(100, 0, 10, 1, 1);
        renewal_report.action_type = ActionType::Renewal;
        let err = enrich_from_controller(&mut uow, &renewal_report).await.unwrap_err();
        assert!(matches!(err, IndexerError::ActionMismatch { .. }));
    }

    #[tokio::test]
    async fn referral_then_controller_keeps_referral() {
        let mut uow = ScratchUnitOfWork::default();
        open_action(&mut uow, &registered(2000, 10, 1000, 0, 1)).await.unwrap();
        enrich_from_controller(&mut uow, &priced(1, 0, 10, 1, 1)).await.unwrap();
        open_action(&mut uow, &renewed(4000, 20, 1500, 0, 2)).await.unwrap();

        let referrer = ReferrerInfo::from_encoded(B256::left_padding_from(&[0x42; 20]));
        let referred = attach_renewal_referral(
            &mut uow,
            &RenewalReferralEvent {
                subregistry: eth(),
                label_hash: label_hash("alice"),
                referrer,
                event: event_ref("RenewalReferred", Address::repeat_byte(0x77), 20, 1500, 2, 2),
            },
        )
        .await
        .unwrap();
        assert_eq!(referred.referral, Referral::Available(referrer));
        assert_eq!(referred.pricing, Pricing::Unknown);
        assert_eq!(uow.pending.len(), 1, "referral does not consume the correlation");

        let mut cost_only = priced(50, 0, 20, 1, 2);
        cost_only.action_type = ActionType::Renewal;
        let enriched = enrich_from_controller(&mut uow, &cost_only).await.unwrap();
        assert_eq!(enriched.referral, Referral::Available(referrer));
        assert_eq!(enriched.pricing.breakdown().unwrap().total(), U256::from(50));
        assert_eq!(enriched.event_ids.len(), 3);
    }

    #[tokio::test]
    async fn referral_on_registration_is_rejected() {
        let mut uow = ScratchUnitOfWork::default();
        open_action(&mut uow, &registered(2000, 10, 1000, 0, 1)).await.unwrap();
        let err = attach_renewal_referral(
            &mut uow,
            &RenewalReferralEvent {
                subregistry: eth(),
                label_hash: label_hash("alice"),
                referrer: ReferrerInfo::from_encoded(B256::ZERO),
                event: event_ref("RenewalReferred", Address::repeat_byte(0x77), 10, 1000, 1, 1),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, IndexerError::ActionMismatch { .. }));
    }

    #[tokio::test]
    async fn negative_duration_is_recorded_as_is() {
        let mut uow = ScratchUnitOfWork::default();
        let action = open_action(&mut uow, &registered(500, 10, 1000, 0, 1)).await.unwrap();
        assert_eq!(action.incremental_duration.as_secs(), -500);
    }

    #[tokio::test]
    async fn out_of_range_duration_is_an_invalid_event() {
        let mut uow = ScratchUnitOfWork::default();
        let err = open_action(&mut uow, &registered(i64::MAX, 10, -1, 0, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::InvalidEvent { .. }));
        assert!(uow.actions.is_empty());
    }
}
