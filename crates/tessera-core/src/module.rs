//! # Module Interface & Code Registry
//!
//! [`ModuleCode`] is the contract every facet implements: a one-shot
//! self-description (`manifest`) consumed at install time, and a `call`
//! entry point the router invokes with the dispatcher's own storage -
//! delegated execution, realized as a trait object operating on shared
//! state.
//!
//! [`CodeRegistry`] stands in for the host environment's code space: it
//! maps a module address to its deployed code. "Has executable code" checks
//! throughout the core are registry lookups.

use crate::dispatch::{CallContext, Runtime};
use std::collections::HashMap;
use std::sync::Arc;
use tessera_types::module::{FacetCut, ModuleError};
use tessera_types::values::{Address, Selector};

// =============================================================================
// MODULE CODE
// =============================================================================

/// Independently deployed module code.
///
/// Handlers receive the dispatch [`Runtime`], giving them mutable access to
/// the shared storage region plus the ability to forward nested calls
/// through the router. Effects commit or roll back with the enclosing
/// top-level invocation.
pub trait ModuleCode: Send + Sync {
    /// Self-description: one ADD cut naming this module's own address and
    /// the selectors it wishes to contribute. Queried once at install time.
    fn manifest(&self) -> Result<FacetCut, ModuleError>;

    /// Executes `selector` against the dispatcher's storage.
    ///
    /// `ctx.caller` is the original caller as the dispatcher saw it;
    /// returned bytes are relayed to that caller verbatim.
    fn call(
        &self,
        rt: &mut Runtime<'_>,
        ctx: &CallContext,
        selector: Selector,
        input: &[u8],
    ) -> Result<Vec<u8>, ModuleError>;
}

// =============================================================================
// CODE REGISTRY
// =============================================================================

/// Address → deployed module code.
#[derive(Clone, Default)]
pub struct CodeRegistry {
    code: HashMap<Address, Arc<dyn ModuleCode>>,
}

impl CodeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deploys module code at `address`, replacing any previous code there.
    pub fn register(&mut self, address: Address, code: Arc<dyn ModuleCode>) {
        self.code.insert(address, code);
    }

    /// Returns the code at `address`, if any.
    #[must_use]
    pub fn get(&self, address: Address) -> Option<Arc<dyn ModuleCode>> {
        self.code.get(&address).cloned()
    }

    /// True when `address` has executable code.
    #[must_use]
    pub fn has_code(&self, address: Address) -> bool {
        self.code.contains_key(&address)
    }
}

impl std::fmt::Debug for CodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeRegistry")
            .field("modules", &self.code.len())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
