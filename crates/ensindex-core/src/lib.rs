//! ensindex-core: registration lifecycles and registrar-action reconciliation.
//!
//! # Architecture
//!
//! ```text
//! DecodedEvent → AdapterRegistry → NormalizedEvent
//!                                      ├── correlator  (Paths A/B/C → RegistrarAction)
//!                                      │     └── lifecycle (first / subsequent registration, renewal)
//!                                      └── controller  (registrar controller directory)
//!                                                │
//!                                   UnitOfWork ──┴── RegistrarStore (memory / SQLite)
//! ```

pub mod action;
pub mod controller;
pub mod correlator;
pub mod duration;
pub mod error;
pub mod handler;
pub mod indexer;
pub mod lifecycle;
pub mod pricing;
pub mod referral;
pub mod store;
pub mod subregistry;
pub mod types;
pub mod validate;

#[cfg(test)]
mod testing;

pub use action::{ActionId, ActionType, LogicalEventKey, RegistrarAction};
pub use controller::RegistrarController;
pub use correlator::{ControllerEvent, RegistrarEvent, RenewalReferralEvent};
pub use duration::IncrementalDuration;
pub use error::IndexerError;
pub use handler::{AdapterRegistry, DecodedEvent, EventAdapter, NormalizedEvent, Phase};
pub use indexer::{ControllerConfig, IndexerConfig, IndexerState, SubregistryConfig};
pub use lifecycle::RegistrationLifecycle;
pub use pricing::{PriceBreakdown, Pricing};
pub use referral::{Referral, ReferrerInfo};
pub use store::{RegistrarStore, UnitOfWork};
pub use subregistry::{
    ContractBinding, ContractFamily, ControllerGeneration, Subregistry, SubregistryId,
    SubregistryRegistry,
};
pub use types::{BlockRef, ChainId, EventId, EventPosition, EventRef, LabelHash, Node, UnixTimestamp};
