//! ensindex-storage: registrar store backends for ENSIndex.
//!
//! Backends:
//! - [`memory`]: in-memory (dev/testing/replays, no persistence)
//! - [`sqlite`]: SQLite via `sqlx` (embedded, single-file persistence)
//!
//! Both implement [`ensindex_core::store::RegistrarStore`].

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::InMemoryStorage;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorage;
