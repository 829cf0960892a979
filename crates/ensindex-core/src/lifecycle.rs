//! Registration lifecycles: the current expiry per `(subregistry, node)`.
//!
//! ```text
//! Unregistered ──first registration──▶ Registered
//! Registered   ──renewal────────────▶ Registered   (expiry extended)
//! Registered   ──registration───────▶ Registered   (expiry reset, controller flag cleared)
//! ```
//!
//! There is no stored "expired" state; readers compare `expires_at` with the
//! time they care about. Rows are never deleted so that "is this the first
//! registration ever" always has an answer.

use serde::{Deserialize, Serialize};

use crate::error::IndexerError;
use crate::store::UnitOfWork;
use crate::subregistry::SubregistryId;
use crate::types::{to_hex, Node, UnixTimestamp};

/// Current registration state of one node in one subregistry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationLifecycle {
    pub subregistry_id: SubregistryId,
    pub node: Node,
    pub expires_at: UnixTimestamp,
    /// Set when a known registrar controller reported on the current
    /// registration cycle; cleared when a new cycle begins.
    pub controller_managed: bool,
}

impl RegistrationLifecycle {
    /// `true` once `at` is past the expiry (grace periods are the reader's
    /// concern).
    pub fn is_expired_at(&self, at: UnixTimestamp) -> bool {
        at >= self.expires_at
    }
}

/// The outcome of a renewal: the prior expiry is needed for duration
/// accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Renewed {
    pub previous_expires_at: UnixTimestamp,
    pub lifecycle: RegistrationLifecycle,
}

fn not_found(subregistry_id: &SubregistryId, node: &Node) -> IndexerError {
    IndexerError::LifecycleNotFound {
        subregistry: subregistry_id.to_string(),
        node: to_hex(node),
    }
}

/// Current lifecycle for the pair, if the node was ever registered.
pub async fn get_current(
    uow: &mut dyn UnitOfWork,
    subregistry_id: &SubregistryId,
    node: &Node,
) -> Result<Option<RegistrationLifecycle>, IndexerError> {
    uow.lifecycle(subregistry_id, node).await
}

/// Create the lifecycle for a node's first-ever registration.
///
/// Fails with `LifecycleAlreadyExists` if the pair was registered before.
pub async fn record_first_registration(
    uow: &mut dyn UnitOfWork,
    subregistry_id: &SubregistryId,
    node: &Node,
    expires_at: UnixTimestamp,
) -> Result<RegistrationLifecycle, IndexerError> {
    if uow.lifecycle(subregistry_id, node).await?.is_some() {
        return Err(IndexerError::LifecycleAlreadyExists {
            subregistry: subregistry_id.to_string(),
            node: to_hex(node),
        });
    }
    let lifecycle = RegistrationLifecycle {
        subregistry_id: *subregistry_id,
        node: *node,
        expires_at,
        controller_managed: false,
    };
    uow.insert_lifecycle(&lifecycle).await?;
    Ok(lifecycle)
}

/// Start a new registration cycle for a previously registered node.
///
/// Overwrites the expiry (up or down) and clears the controller-managed flag:
/// the new cycle's controller is unknown until a controller event says so.
pub async fn record_subsequent_registration(
    uow: &mut dyn UnitOfWork,
    subregistry_id: &SubregistryId,
    node: &Node,
    expires_at: UnixTimestamp,
) -> Result<RegistrationLifecycle, IndexerError> {
    let mut lifecycle = uow
        .lifecycle(subregistry_id, node)
        .await?
        .ok_or_else(|| not_found(subregistry_id, node))?;
    lifecycle.expires_at = expires_at;
    lifecycle.controller_managed = false;
    uow.update_lifecycle(&lifecycle).await?;
    Ok(lifecycle)
}

/// Extend the current registration.
///
/// A renewal with no known registration is fatal: it means the indexer missed
/// the registration and every later duration would be wrong.
pub async fn record_renewal(
    uow: &mut dyn UnitOfWork,
    subregistry_id: &SubregistryId,
    node: &Node,
    expires_at: UnixTimestamp,
) -> Result<Renewed, IndexerError> {
    let mut lifecycle = uow
        .lifecycle(subregistry_id, node)
        .await?
        .ok_or_else(|| not_found(subregistry_id, node))?;
    let previous_expires_at = lifecycle.expires_at;
    lifecycle.expires_at = expires_at;
    uow.update_lifecycle(&lifecycle).await?;
    Ok(Renewed {
        previous_expires_at,
        lifecycle,
    })
}

/// Flag the node's current registration as managed by a known controller.
pub async fn mark_controller_managed(
    uow: &mut dyn UnitOfWork,
    subregistry_id: &SubregistryId,
    node: &Node,
) -> Result<RegistrationLifecycle, IndexerError> {
    let mut lifecycle = uow
        .lifecycle(subregistry_id, node)
        .await?
        .ok_or_else(|| not_found(subregistry_id, node))?;
    if !lifecycle.controller_managed {
        lifecycle.controller_managed = true;
        uow.update_lifecycle(&lifecycle).await?;
    }
    Ok(lifecycle)
}
