//! # Read-side Reflection
//!
//! Derived views over the registry and directory; nothing here is stored
//! separately. Enumeration scans the directory in position order, which
//! means insertion order until the first removal - removal is
//! swap-compacting, so order is NOT stable across removals and no consumer
//! may rely on it.

use crate::errors::DiamondError;
use crate::registry;
use crate::storage::AppStorage;
use serde::{Deserialize, Serialize};
use tessera_types::values::{Address, Selector};

/// Reporting limit for selectors per module (one byte in the external
/// representation).
pub const MAX_SELECTORS_PER_FACET: usize = 255;

/// One module and the selectors bound to it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetInfo {
    /// Module address.
    pub target: Address,
    /// Selectors currently bound to the module.
    pub selectors: Vec<Selector>,
}

/// Enumerates all distinct modules with their selector sets, in first-seen
/// directory order.
pub fn facets(storage: &AppStorage) -> Result<Vec<FacetInfo>, DiamondError> {
    let mut out: Vec<FacetInfo> = Vec::new();
    for index in 0..storage.selector_count() {
        let selector = registry::selector_at(&storage.directory, index);
        let Some((module, _)) = registry::binding_of(storage, selector) else {
            continue;
        };
        match out.iter_mut().find(|f| f.target == module) {
            Some(info) => {
                if info.selectors.len() == MAX_SELECTORS_PER_FACET {
                    return Err(DiamondError::FacetSelectorOverflow {
                        target: module,
                        count: info.selectors.len() + 1,
                        max: MAX_SELECTORS_PER_FACET,
                    });
                }
                info.selectors.push(selector);
            }
            None => out.push(FacetInfo {
                target: module,
                selectors: vec![selector],
            }),
        }
    }
    Ok(out)
}

/// Enumerates the selectors bound to one module.
pub fn facet_function_selectors(
    storage: &AppStorage,
    module: Address,
) -> Result<Vec<Selector>, DiamondError> {
    let mut out = Vec::new();
    for index in 0..storage.selector_count() {
        let selector = registry::selector_at(&storage.directory, index);
        if registry::binding_of(storage, selector).map(|(m, _)| m) == Some(module) {
            if out.len() == MAX_SELECTORS_PER_FACET {
                return Err(DiamondError::FacetSelectorOverflow {
                    target: module,
                    count: out.len() + 1,
                    max: MAX_SELECTORS_PER_FACET,
                });
            }
            out.push(selector);
        }
    }
    Ok(out)
}

/// Enumerates all distinct module addresses, in first-seen directory order.
#[must_use]
pub fn facet_addresses(storage: &AppStorage) -> Vec<Address> {
    let mut out: Vec<Address> = Vec::new();
    for index in 0..storage.selector_count() {
        let selector = registry::selector_at(&storage.directory, index);
        if let Some((module, _)) = registry::binding_of(storage, selector) {
            if !out.contains(&module) {
                out.push(module);
            }
        }
    }
    out
}

/// Resolves one selector to its bound module; the zero address when
/// unbound.
#[must_use]
pub fn facet_address(storage: &AppStorage, selector: Selector) -> Address {
    registry::binding_of(storage, selector)
        .map(|(module, _)| module)
        .unwrap_or(Address::ZERO)
}

// =============================================================================
// TESTS
// =============================================================================
