//! Registrar controller directory.
//!
//! Tracks which controller contracts a base registrar has authorised. The
//! `is_active` flag is a coverage signal ("did we index every controller that
//! touched this registrar"), not a gate on correlation.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::IndexerError;
use crate::store::UnitOfWork;
use crate::types::{address_hex, ChainId};

/// Authorisation state of one controller against a base registrar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrarController {
    pub chain_id: ChainId,
    pub controller_address: Address,
    pub registrar_address: Address,
    pub is_active: bool,
}

/// Handle `ControllerAdded`: insert or re-activate the row.
///
/// Idempotent under duplicate delivery.
pub async fn add(
    uow: &mut dyn UnitOfWork,
    chain_id: ChainId,
    controller_address: Address,
    registrar_address: Address,
) -> Result<RegistrarController, IndexerError> {
    let row = RegistrarController {
        chain_id,
        controller_address,
        registrar_address,
        is_active: true,
    };
    uow.upsert_controller(&row).await?;
    debug!(chain_id, controller = %address_hex(&controller_address), "controller active");
    Ok(row)
}

/// Handle `ControllerRemoved`: deactivate the row.
///
/// Returns `ControllerNotFound` (recoverable) if the controller was never
/// seen; the caller decides whether to log and continue.
pub async fn remove(
    uow: &mut dyn UnitOfWork,
    chain_id: ChainId,
    controller_address: Address,
) -> Result<RegistrarController, IndexerError> {
    let mut row = uow
        .controller(chain_id, &controller_address)
        .await?
        .ok_or_else(|| IndexerError::ControllerNotFound {
            chain_id,
            controller: address_hex(&controller_address),
        })?;
    row.is_active = false;
    uow.upsert_controller(&row).await?;
    debug!(chain_id, controller = %address_hex(&controller_address), "controller inactive");
    Ok(row)
}
