//! # tessera-core - Module Dispatch Core
//!
//! One logical contract, composed at runtime from independently deployed
//! modules. Each module contributes a disjoint set of 4-byte selectors that
//! route to its code while everything reads and writes one shared, versioned
//! storage value - the "diamond" pattern, realized as a trait-object plugin
//! table over explicit shared state.
//!
//! ## Components
//!
//! | Component | Location | Purpose |
//! |-----------|----------|---------|
//! | Registry codec | `registry.rs` | Packed binding words + 8-per-slot selector directory |
//! | Cut protocol | `cut.rs` | ADD / REPLACE / REMOVE batches + one-shot initializer |
//! | Router | `dispatch.rs` | Fallback dispatch with delegated execution |
//! | Loupe | `loupe.rs` | Read-side reflection over the registry |
//! | Shared storage | `storage.rs` | The singleton `AppStorage` region |
//! | Service | `service.rs` | Async serialized boundary + statistics |
//!
//! ## Invariants
//!
//! - A binding exists for selector S iff S is currently routable; a zero
//!   module address means unbound.
//! - `selector_at(i)` for `i < selector_count` is exactly the selector
//!   whose binding word stores position `i` (dense, swap-compacting
//!   directory; enumeration order is not stable across removals).
//! - Selectors bound to the dispatcher's own identity are immutable.
//! - Every top-level invocation commits fully or rolls back fully; there
//!   is no observable partial-failure state.
//! - One re-entrancy latch per top-level invocation guards the mutating
//!   entry points.

// Crate-level lints
#![warn(missing_docs)]
#![warn(clippy::all)]

// =============================================================================
// MODULES
// =============================================================================

pub mod cut;
pub mod dispatch;
pub mod errors;
pub mod events;
pub mod loupe;
pub mod module;
pub mod registry;
pub mod service;
pub mod storage;

// =============================================================================
// PRELUDE
// =============================================================================

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::dispatch::{CallContext, Dispatcher, NativeOp, Runtime};
    pub use crate::errors::DiamondError;
    pub use crate::events::{DiamondCutPayload, DiamondEvent};
    pub use crate::loupe::FacetInfo;
    pub use crate::module::{CodeRegistry, ModuleCode};
    pub use crate::service::{create_test_service, DiamondApi, DiamondService, ServiceConfig};
    pub use crate::storage::{AppStorage, Asset, Listing, Proposal, ProposalAction, Stake};

    pub use tessera_types::module::{CutAction, FacetCut, ModuleError};
    pub use tessera_types::values::{Address, Bytes, Hash, Selector, U256};
}

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_exports() {
        let dispatcher = Dispatcher::new(Address::new([0xd1; 20]), Address::new([0xde; 20]));
        assert!(dispatcher.storage().initialized);
    }
}
