//! ensindex-evm: registrar event adapters, the per-transaction processor,
//! and per-chain ingestion.
//!
//! ```text
//! host ──DecodedEvent──▶ Ingestor ──(chain A worker)──┐
//!                                 ──(chain B worker)──┼──▶ Processor ──▶ RegistrarStore
//! host ──batch────────────────────────────────────────┘
//! ```

pub mod adapters;
pub mod args;
pub mod builder;
pub mod processor;
pub mod worker;

pub use adapters::default_adapters;
pub use builder::IndexerBuilder;
pub use processor::{ProcessOutcome, Processor};
pub use worker::{Ingestor, WorkerReport};
