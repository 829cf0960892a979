//! Renewal-with-referrer wrapper: `RenewalReferred(bytes32 labelHash, bytes32 referrer)`.
//!
//! The wrapper renews through a controller in the same transaction, so its
//! event only contributes the referrer; price comes from the controller.

use ensindex_core::correlator::RenewalReferralEvent;
use ensindex_core::error::IndexerError;
use ensindex_core::handler::{DecodedEvent, EventAdapter, NormalizedEvent};
use ensindex_core::referral::ReferrerInfo;
use ensindex_core::subregistry::{ContractBinding, ContractFamily};

use crate::args;

pub struct RenewalReferrerAdapter;

impl EventAdapter for RenewalReferrerAdapter {
    fn family(&self) -> ContractFamily {
        ContractFamily::RenewalReferrer
    }

    fn event_names(&self) -> &'static [&'static str] {
        &["RenewalReferred"]
    }

    fn normalize(
        &self,
        event: &DecodedEvent,
        binding: &ContractBinding,
    ) -> Result<NormalizedEvent, IndexerError> {
        Ok(NormalizedEvent::RenewalReferral(RenewalReferralEvent {
            subregistry: binding.subregistry,
            label_hash: args::label_hash(event)?,
            referrer: ReferrerInfo::from_encoded(args::b256(event, &["referrer"])?),
            event: event.event_ref(),
        }))
    }
}
