//! Event-source adapters for the shipped contract families.
//!
//! | family | events |
//! |---|---|
//! | base registrar | `NameRegistered`, `NameRenewed`, `Transfer`, `ControllerAdded`, `ControllerRemoved` |
//! | registrar controller (per generation) | `NameRegistered`, `NameRenewed` |
//! | renewal referrer | `RenewalReferred` |

pub mod base_registrar;
pub mod registrar_controller;
pub mod renewal_referrer;

use std::sync::Arc;

use ensindex_core::handler::AdapterRegistry;
use ensindex_core::subregistry::ControllerGeneration;

pub use base_registrar::BaseRegistrarAdapter;
pub use registrar_controller::RegistrarControllerAdapter;
pub use renewal_referrer::RenewalReferrerAdapter;

/// Adapters for every contract family and controller generation.
pub fn default_adapters() -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    registry.register(Arc::new(BaseRegistrarAdapter));
    for generation in [
        ControllerGeneration::Legacy,
        ControllerGeneration::Wrapped,
        ControllerGeneration::Unwrapped,
        ControllerGeneration::Unpriced,
    ] {
        registry.register(Arc::new(RegistrarControllerAdapter::new(generation)));
    }
    registry.register(Arc::new(RenewalReferrerAdapter));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use ensindex_core::subregistry::ContractFamily;

    #[test]
    fn defaults_cover_every_family() {
        let registry = default_adapters();
        assert!(registry.lookup(ContractFamily::BaseRegistrar, "ControllerRemoved").is_some());
        assert!(registry.lookup(ContractFamily::RenewalReferrer, "RenewalReferred").is_some());
        assert!(registry
            .lookup(
                ContractFamily::RegistrarController(ControllerGeneration::Unpriced),
                "NameRenewed"
            )
            .is_some());
        // 5 + 4 * 2 + 1
        assert_eq!(registry.len(), 14);
    }
}
