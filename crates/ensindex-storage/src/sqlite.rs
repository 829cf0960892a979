//! SQLite storage backend for ENSIndex.
//!
//! Persists subregistries, lifecycles, registrar actions, pending
//! correlations, the controller directory, and event refs to a single SQLite
//! file. Uses `sqlx` with WAL mode for concurrent read performance.
//!
//! Each unit of work is one SQLite transaction. A write gate serialises units
//! of work so that concurrent chain workers never hit `SQLITE_BUSY`.
//!
//! # Usage
//! ```rust,no_run
//! use ensindex_storage::sqlite::SqliteStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStorage::open("./ensindex.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStorage::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Executor, Row, Sqlite, SqlitePool, Transaction};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use ensindex_core::action::{ActionId, ActionType, LogicalEventKey, RegistrarAction};
use ensindex_core::controller::RegistrarController;
use ensindex_core::duration::IncrementalDuration;
use ensindex_core::error::IndexerError;
use ensindex_core::lifecycle::RegistrationLifecycle;
use ensindex_core::pricing::{PriceBreakdown, Pricing};
use ensindex_core::referral::{Referral, ReferrerInfo};
use ensindex_core::store::{RegistrarStore, UnitOfWork};
use ensindex_core::subregistry::{Subregistry, SubregistryId};
use ensindex_core::types::{address_hex, to_hex, BlockRef, ChainId, EventId, EventRef, Node};

/// SQLite-backed registrar store.
pub struct SqliteStorage {
    pool: SqlitePool,
    write_gate: Arc<Mutex<()>>,
}

impl SqliteStorage {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./ensindex.db"`) or a full
    /// SQLite URL (`"sqlite:./ensindex.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, IndexerError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        let storage = Self::with_pool(pool);
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Every connection to `sqlite::memory:` is a separate database, so the
    /// pool is pinned to a single long-lived connection. Reads through the
    /// store wait while a unit of work is open.
    pub async fn in_memory() -> Result<Self, IndexerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        let storage = Self::with_pool(pool);
        storage.init_schema().await?;
        Ok(storage)
    }

    fn with_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Create tables and enable WAL mode.
    async fn init_schema(&self) -> Result<(), IndexerError> {
        // WAL mode: readers don't block the writer
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        let statements = [
            "CREATE TABLE IF NOT EXISTS subregistries (
                chain_id  INTEGER NOT NULL,
                registrar TEXT    NOT NULL,
                node      TEXT    NOT NULL,
                PRIMARY KEY (chain_id, registrar)
            );",
            "CREATE TABLE IF NOT EXISTS registration_lifecycles (
                chain_id           INTEGER NOT NULL,
                registrar          TEXT    NOT NULL,
                node               TEXT    NOT NULL,
                expires_at         INTEGER NOT NULL,
                controller_managed INTEGER NOT NULL,
                PRIMARY KEY (chain_id, registrar, node)
            );",
            "CREATE INDEX IF NOT EXISTS idx_lifecycles_node ON registration_lifecycles (node);",
            // amounts are decimal text: U256 does not fit an INTEGER column
            "CREATE TABLE IF NOT EXISTS registrar_actions (
                id                   TEXT    PRIMARY KEY,
                action_type          TEXT    NOT NULL,
                node                 TEXT    NOT NULL,
                chain_id             INTEGER NOT NULL,
                registrar            TEXT    NOT NULL,
                incremental_duration INTEGER NOT NULL,
                registrant           TEXT    NOT NULL,
                base_cost            TEXT,
                premium              TEXT,
                total                TEXT,
                encoded_referrer     TEXT,
                decoded_referrer     TEXT,
                block_number         INTEGER NOT NULL,
                block_timestamp      INTEGER NOT NULL,
                transaction_hash     TEXT    NOT NULL,
                log_index            INTEGER NOT NULL,
                event_ids            TEXT    NOT NULL
            );",
            "CREATE INDEX IF NOT EXISTS idx_actions_node ON registrar_actions (node, block_number, log_index);",
            "CREATE INDEX IF NOT EXISTS idx_actions_subregistry
                ON registrar_actions (chain_id, registrar, block_number, log_index);",
            "CREATE TABLE IF NOT EXISTS pending_correlations (
                logical_key      TEXT PRIMARY KEY,
                action_id        TEXT NOT NULL,
                transaction_hash TEXT NOT NULL
            );",
            "CREATE INDEX IF NOT EXISTS idx_pending_tx ON pending_correlations (transaction_hash);",
            "CREATE TABLE IF NOT EXISTS registrar_controllers (
                chain_id   INTEGER NOT NULL,
                controller TEXT    NOT NULL,
                registrar  TEXT    NOT NULL,
                is_active  INTEGER NOT NULL,
                PRIMARY KEY (chain_id, controller)
            );",
            "CREATE TABLE IF NOT EXISTS event_refs (
                id               TEXT    PRIMARY KEY,
                chain_id         INTEGER NOT NULL,
                contract_address TEXT    NOT NULL,
                event_name       TEXT    NOT NULL,
                block_number     INTEGER NOT NULL,
                block_timestamp  INTEGER NOT NULL,
                transaction_hash TEXT    NOT NULL,
                log_index        INTEGER NOT NULL
            );",
            "CREATE INDEX IF NOT EXISTS idx_event_refs_tx ON event_refs (chain_id, transaction_hash);",
        ];
        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| IndexerError::Storage(e.to_string()))?;
        }
        Ok(())
    }
}

// ─── Row decoding ────────────────────────────────────────────────────────────

macro_rules! select_actions {
    ($tail:literal) => {
        concat!(
            "SELECT id, action_type, node, chain_id, registrar, incremental_duration, registrant,
                    base_cost, premium, total, encoded_referrer, decoded_referrer,
                    block_number, block_timestamp, transaction_hash, log_index, event_ids
             FROM registrar_actions ",
            $tail
        )
    };
}

fn col<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, IndexerError>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| IndexerError::Storage(format!("column {name}: {e}")))
}

fn parse<T>(column: &str, value: &str) -> Result<T, IndexerError>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|e| IndexerError::Storage(format!("bad {column} '{value}': {e}")))
}

fn subregistry_id_from_row(row: &SqliteRow) -> Result<SubregistryId, IndexerError> {
    let registrar: String = col(row, "registrar")?;
    Ok(SubregistryId::new(
        col::<i64>(row, "chain_id")? as ChainId,
        parse("registrar", &registrar)?,
    ))
}

fn subregistry_from_row(row: &SqliteRow) -> Result<Subregistry, IndexerError> {
    let node: String = col(row, "node")?;
    Ok(Subregistry {
        id: subregistry_id_from_row(row)?,
        node: parse("node", &node)?,
    })
}

fn lifecycle_from_row(row: &SqliteRow) -> Result<RegistrationLifecycle, IndexerError> {
    let node: String = col(row, "node")?;
    Ok(RegistrationLifecycle {
        subregistry_id: subregistry_id_from_row(row)?,
        node: parse("node", &node)?,
        expires_at: col(row, "expires_at")?,
        controller_managed: col(row, "controller_managed")?,
    })
}

fn controller_from_row(row: &SqliteRow) -> Result<RegistrarController, IndexerError> {
    let controller: String = col(row, "controller")?;
    let registrar: String = col(row, "registrar")?;
    Ok(RegistrarController {
        chain_id: col::<i64>(row, "chain_id")? as ChainId,
        controller_address: parse("controller", &controller)?,
        registrar_address: parse("registrar", &registrar)?,
        is_active: col(row, "is_active")?,
    })
}

fn event_ref_from_row(row: &SqliteRow) -> Result<EventRef, IndexerError> {
    let contract: String = col(row, "contract_address")?;
    let tx: String = col(row, "transaction_hash")?;
    Ok(EventRef {
        id: EventId::from(col::<String>(row, "id")?),
        chain_id: col::<i64>(row, "chain_id")? as ChainId,
        contract_address: parse("contract_address", &contract)?,
        event_name: col(row, "event_name")?,
        block: BlockRef {
            number: col::<i64>(row, "block_number")? as u64,
            timestamp: col(row, "block_timestamp")?,
        },
        transaction_hash: parse("transaction_hash", &tx)?,
        log_index: col::<i64>(row, "log_index")? as u32,
    })
}

fn action_from_row(row: &SqliteRow) -> Result<RegistrarAction, IndexerError> {
    let action_type: String = col(row, "action_type")?;
    let node: String = col(row, "node")?;
    let registrant: String = col(row, "registrant")?;
    let tx: String = col(row, "transaction_hash")?;
    let event_ids: String = col(row, "event_ids")?;

    let base_cost: Option<String> = col(row, "base_cost")?;
    let premium: Option<String> = col(row, "premium")?;
    let total: Option<String> = col(row, "total")?;
    let pricing = match (base_cost, premium, total) {
        (Some(base), Some(premium), Some(total)) => Pricing::Available(
            PriceBreakdown::from_parts(
                parse::<U256>("base_cost", &base)?,
                parse::<U256>("premium", &premium)?,
                parse::<U256>("total", &total)?,
            )
            .map_err(IndexerError::Storage)?,
        ),
        _ => Pricing::Unknown,
    };

    let encoded: Option<String> = col(row, "encoded_referrer")?;
    let decoded: Option<String> = col(row, "decoded_referrer")?;
    let referral = match (encoded, decoded) {
        (Some(encoded), Some(decoded)) => Referral::Available(ReferrerInfo {
            encoded_referrer: parse("encoded_referrer", &encoded)?,
            decoded_referrer: parse("decoded_referrer", &decoded)?,
        }),
        _ => Referral::NotApplicable,
    };

    Ok(RegistrarAction {
        id: EventId::from(col::<String>(row, "id")?),
        action_type: ActionType::parse(&action_type).ok_or_else(|| {
            IndexerError::Storage(format!("bad action_type '{action_type}'"))
        })?,
        node: parse("node", &node)?,
        subregistry_id: subregistry_id_from_row(row)?,
        incremental_duration: IncrementalDuration::from_secs(col(row, "incremental_duration")?),
        registrant: parse("registrant", &registrant)?,
        pricing,
        referral,
        block: BlockRef {
            number: col::<i64>(row, "block_number")? as u64,
            timestamp: col(row, "block_timestamp")?,
        },
        transaction_hash: parse("transaction_hash", &tx)?,
        log_index: col::<i64>(row, "log_index")? as u32,
        event_ids: serde_json::from_str(&event_ids)
            .map_err(|e| IndexerError::Storage(format!("bad event_ids: {e}")))?,
    })
}

// ─── Shared queries ──────────────────────────────────────────────────────────
//
// Generic over the executor so the same SQL serves both the pool (committed
// reads) and an open transaction (reads inside a unit of work).

async fn select_subregistry<'e, E>(
    exec: E,
    id: &SubregistryId,
) -> Result<Option<Subregistry>, IndexerError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        "SELECT chain_id, registrar, node FROM subregistries WHERE chain_id = ? AND registrar = ?",
    )
    .bind(id.chain_id as i64)
    .bind(address_hex(&id.address))
    .fetch_optional(exec)
    .await
    .map_err(|e| IndexerError::Storage(e.to_string()))?;
    row.as_ref().map(subregistry_from_row).transpose()
}

async fn select_lifecycle<'e, E>(
    exec: E,
    subregistry_id: &SubregistryId,
    node: &Node,
) -> Result<Option<RegistrationLifecycle>, IndexerError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        "SELECT chain_id, registrar, node, expires_at, controller_managed
         FROM registration_lifecycles WHERE chain_id = ? AND registrar = ? AND node = ?",
    )
    .bind(subregistry_id.chain_id as i64)
    .bind(address_hex(&subregistry_id.address))
    .bind(to_hex(node))
    .fetch_optional(exec)
    .await
    .map_err(|e| IndexerError::Storage(e.to_string()))?;
    row.as_ref().map(lifecycle_from_row).transpose()
}

async fn select_action<'e, E>(exec: E, id: &ActionId) -> Result<Option<RegistrarAction>, IndexerError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(select_actions!("WHERE id = ?"))
        .bind(id.to_string())
        .fetch_optional(exec)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;
    row.as_ref().map(action_from_row).transpose()
}

async fn select_controller<'e, E>(
    exec: E,
    chain_id: ChainId,
    controller: &Address,
) -> Result<Option<RegistrarController>, IndexerError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        "SELECT chain_id, controller, registrar, is_active
         FROM registrar_controllers WHERE chain_id = ? AND controller = ?",
    )
    .bind(chain_id as i64)
    .bind(address_hex(controller))
    .fetch_optional(exec)
    .await
    .map_err(|e| IndexerError::Storage(e.to_string()))?;
    row.as_ref().map(controller_from_row).transpose()
}

fn pricing_columns(pricing: &Pricing) -> (Option<String>, Option<String>, Option<String>) {
    match pricing.breakdown() {
        Some(p) => (
            Some(p.base_cost().to_string()),
            Some(p.premium().to_string()),
            Some(p.total().to_string()),
        ),
        None => (None, None, None),
    }
}

fn referral_columns(referral: &Referral) -> (Option<String>, Option<String>) {
    match referral.info() {
        Some(r) => (
            Some(to_hex(r.encoded_referrer)),
            Some(address_hex(&r.decoded_referrer)),
        ),
        None => (None, None),
    }
}

fn event_ids_json(action: &RegistrarAction) -> Result<String, IndexerError> {
    serde_json::to_string(&action.event_ids).map_err(|e| IndexerError::Storage(e.to_string()))
}

// ─── RegistrarStore impl ─────────────────────────────────────────────────────

#[async_trait]
impl RegistrarStore for SqliteStorage {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, IndexerError> {
        let gate = Arc::clone(&self.write_gate).lock_owned().await;
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;
        Ok(Box::new(SqliteUnitOfWork { tx, _gate: gate }))
    }

    async fn subregistries(&self) -> Result<Vec<Subregistry>, IndexerError> {
        let rows = sqlx::query(
            "SELECT chain_id, registrar, node FROM subregistries ORDER BY chain_id, registrar",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;
        rows.iter().map(subregistry_from_row).collect()
    }

    async fn lifecycle(
        &self,
        subregistry_id: &SubregistryId,
        node: &Node,
    ) -> Result<Option<RegistrationLifecycle>, IndexerError> {
        select_lifecycle(&self.pool, subregistry_id, node).await
    }

    async fn lifecycles_by_node(&self, node: &Node) -> Result<Vec<RegistrationLifecycle>, IndexerError> {
        let rows = sqlx::query(
            "SELECT chain_id, registrar, node, expires_at, controller_managed
             FROM registration_lifecycles WHERE node = ? ORDER BY chain_id, registrar",
        )
        .bind(to_hex(node))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;
        rows.iter().map(lifecycle_from_row).collect()
    }

    async fn action(&self, id: &ActionId) -> Result<Option<RegistrarAction>, IndexerError> {
        select_action(&self.pool, id).await
    }

    async fn actions_by_node(&self, node: &Node) -> Result<Vec<RegistrarAction>, IndexerError> {
        let rows = sqlx::query(select_actions!(
            "WHERE node = ? ORDER BY block_number, log_index"
        ))
        .bind(to_hex(node))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;
        rows.iter().map(action_from_row).collect()
    }

    async fn actions_by_subregistry(
        &self,
        subregistry_id: &SubregistryId,
    ) -> Result<Vec<RegistrarAction>, IndexerError> {
        let rows = sqlx::query(select_actions!(
            "WHERE chain_id = ? AND registrar = ? ORDER BY block_number, log_index"
        ))
        .bind(subregistry_id.chain_id as i64)
        .bind(address_hex(&subregistry_id.address))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;
        rows.iter().map(action_from_row).collect()
    }

    async fn controllers(&self, chain_id: ChainId) -> Result<Vec<RegistrarController>, IndexerError> {
        let rows = sqlx::query(
            "SELECT chain_id, controller, registrar, is_active
             FROM registrar_controllers WHERE chain_id = ? ORDER BY controller",
        )
        .bind(chain_id as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;
        rows.iter().map(controller_from_row).collect()
    }

    async fn events_by_transaction(
        &self,
        chain_id: ChainId,
        transaction_hash: &B256,
    ) -> Result<Vec<EventRef>, IndexerError> {
        let rows = sqlx::query(
            "SELECT id, chain_id, contract_address, event_name, block_number, block_timestamp,
                    transaction_hash, log_index
             FROM event_refs WHERE chain_id = ? AND transaction_hash = ?
             ORDER BY block_number, log_index",
        )
        .bind(chain_id as i64)
        .bind(to_hex(transaction_hash))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;
        rows.iter().map(event_ref_from_row).collect()
    }

    async fn pending_correlations(&self) -> Result<Vec<(LogicalEventKey, ActionId)>, IndexerError> {
        let rows = sqlx::query(
            "SELECT logical_key, action_id FROM pending_correlations ORDER BY logical_key",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;
        rows.iter()
            .map(|row| {
                Ok((
                    LogicalEventKey::from(col::<String>(row, "logical_key")?),
                    EventId::from(col::<String>(row, "action_id")?),
                ))
            })
            .collect()
    }
}

// ─── Unit of work ────────────────────────────────────────────────────────────

struct SqliteUnitOfWork {
    // dropped before the gate: rollback is queued while writes are still excluded
    tx: Transaction<'static, Sqlite>,
    _gate: OwnedMutexGuard<()>,
}

#[async_trait]
impl UnitOfWork for SqliteUnitOfWork {
    async fn subregistry(&mut self, id: &SubregistryId) -> Result<Option<Subregistry>, IndexerError> {
        select_subregistry(&mut *self.tx, id).await
    }

    async fn insert_subregistry(&mut self, subregistry: &Subregistry) -> Result<(), IndexerError> {
        sqlx::query("INSERT INTO subregistries (chain_id, registrar, node) VALUES (?, ?, ?)")
            .bind(subregistry.id.chain_id as i64)
            .bind(address_hex(&subregistry.id.address))
            .bind(to_hex(subregistry.node))
            .execute(&mut *self.tx)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn lifecycle(
        &mut self,
        subregistry_id: &SubregistryId,
        node: &Node,
    ) -> Result<Option<RegistrationLifecycle>, IndexerError> {
        select_lifecycle(&mut *self.tx, subregistry_id, node).await
    }

    async fn insert_lifecycle(&mut self, lifecycle: &RegistrationLifecycle) -> Result<(), IndexerError> {
        sqlx::query(
            "INSERT INTO registration_lifecycles
             (chain_id, registrar, node, expires_at, controller_managed)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(lifecycle.subregistry_id.chain_id as i64)
        .bind(address_hex(&lifecycle.subregistry_id.address))
        .bind(to_hex(lifecycle.node))
        .bind(lifecycle.expires_at)
        .bind(lifecycle.controller_managed)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn update_lifecycle(&mut self, lifecycle: &RegistrationLifecycle) -> Result<(), IndexerError> {
        let result = sqlx::query(
            "UPDATE registration_lifecycles SET expires_at = ?, controller_managed = ?
             WHERE chain_id = ? AND registrar = ? AND node = ?",
        )
        .bind(lifecycle.expires_at)
        .bind(lifecycle.controller_managed)
        .bind(lifecycle.subregistry_id.chain_id as i64)
        .bind(address_hex(&lifecycle.subregistry_id.address))
        .bind(to_hex(lifecycle.node))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(IndexerError::Storage(format!(
                "no lifecycle row for {}",
                to_hex(lifecycle.node)
            )));
        }
        Ok(())
    }

    async fn action(&mut self, id: &ActionId) -> Result<Option<RegistrarAction>, IndexerError> {
        select_action(&mut *self.tx, id).await
    }

    async fn insert_action(&mut self, action: &RegistrarAction) -> Result<(), IndexerError> {
        let (base_cost, premium, total) = pricing_columns(&action.pricing);
        let (encoded, decoded) = referral_columns(&action.referral);
        sqlx::query(
            "INSERT INTO registrar_actions
             (id, action_type, node, chain_id, registrar, incremental_duration, registrant,
              base_cost, premium, total, encoded_referrer, decoded_referrer,
              block_number, block_timestamp, transaction_hash, log_index, event_ids)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(action.id.to_string())
        .bind(action.action_type.as_str())
        .bind(to_hex(action.node))
        .bind(action.subregistry_id.chain_id as i64)
        .bind(address_hex(&action.subregistry_id.address))
        .bind(action.incremental_duration.as_secs())
        .bind(address_hex(&action.registrant))
        .bind(base_cost)
        .bind(premium)
        .bind(total)
        .bind(encoded)
        .bind(decoded)
        .bind(action.block.number as i64)
        .bind(action.block.timestamp)
        .bind(to_hex(action.transaction_hash))
        .bind(action.log_index as i64)
        .bind(event_ids_json(action)?)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        debug!(action_id = %action.id, "action stored");
        Ok(())
    }

    async fn update_action(&mut self, action: &RegistrarAction) -> Result<(), IndexerError> {
        let (base_cost, premium, total) = pricing_columns(&action.pricing);
        let (encoded, decoded) = referral_columns(&action.referral);
        let result = sqlx::query(
            "UPDATE registrar_actions SET
                incremental_duration = ?, registrant = ?,
                base_cost = ?, premium = ?, total = ?,
                encoded_referrer = ?, decoded_referrer = ?, event_ids = ?
             WHERE id = ?",
        )
        .bind(action.incremental_duration.as_secs())
        .bind(address_hex(&action.registrant))
        .bind(base_cost)
        .bind(premium)
        .bind(total)
        .bind(encoded)
        .bind(decoded)
        .bind(event_ids_json(action)?)
        .bind(action.id.to_string())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(IndexerError::Storage(format!("no action row {}", action.id)));
        }
        Ok(())
    }

    async fn insert_pending(
        &mut self,
        key: &LogicalEventKey,
        action_id: &ActionId,
    ) -> Result<(), IndexerError> {
        sqlx::query(
            "INSERT OR REPLACE INTO pending_correlations (logical_key, action_id, transaction_hash)
             VALUES (?, ?, ?)",
        )
        .bind(key.to_string())
        .bind(action_id.to_string())
        .bind(key.transaction_hash_hex().to_string())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn pending(&mut self, key: &LogicalEventKey) -> Result<Option<ActionId>, IndexerError> {
        let row = sqlx::query("SELECT action_id FROM pending_correlations WHERE logical_key = ?")
            .bind(key.to_string())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;
        row.as_ref()
            .map(|r| col::<String>(r, "action_id").map(EventId::from))
            .transpose()
    }

    async fn delete_pending(&mut self, key: &LogicalEventKey) -> Result<(), IndexerError> {
        sqlx::query("DELETE FROM pending_correlations WHERE logical_key = ?")
            .bind(key.to_string())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn discard_pending_for_transaction(
        &mut self,
        transaction_hash: &B256,
    ) -> Result<u64, IndexerError> {
        let result = sqlx::query("DELETE FROM pending_correlations WHERE transaction_hash = ?")
            .bind(to_hex(transaction_hash))
            .execute(&mut *self.tx)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;
        Ok(result.rows_affected())
    }

    async fn controller(
        &mut self,
        chain_id: ChainId,
        controller: &Address,
    ) -> Result<Option<RegistrarController>, IndexerError> {
        select_controller(&mut *self.tx, chain_id, controller).await
    }

    async fn upsert_controller(&mut self, controller: &RegistrarController) -> Result<(), IndexerError> {
        sqlx::query(
            "INSERT INTO registrar_controllers (chain_id, controller, registrar, is_active)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (chain_id, controller)
             DO UPDATE SET registrar = excluded.registrar, is_active = excluded.is_active",
        )
        .bind(controller.chain_id as i64)
        .bind(address_hex(&controller.controller_address))
        .bind(address_hex(&controller.registrar_address))
        .bind(controller.is_active)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn has_event(&mut self, id: &EventId) -> Result<bool, IndexerError> {
        let row = sqlx::query("SELECT 1 FROM event_refs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;
        Ok(row.is_some())
    }

    async fn insert_event(&mut self, event: &EventRef) -> Result<(), IndexerError> {
        sqlx::query(
            "INSERT INTO event_refs
             (id, chain_id, contract_address, event_name, block_number, block_timestamp,
              transaction_hash, log_index)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(event.id.to_string())
        .bind(event.chain_id as i64)
        .bind(address_hex(&event.contract_address))
        .bind(&event.event_name)
        .bind(event.block.number as i64)
        .bind(event.block.timestamp)
        .bind(to_hex(event.transaction_hash))
        .bind(event.log_index as i64)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), IndexerError> {
        let SqliteUnitOfWork { tx, _gate } = *self;
        tx.commit()
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;
        debug!("sqlite unit of work committed");
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
