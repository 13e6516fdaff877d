//! # Error Types
//!
//! All error types for the dispatch core. Every error is fatal to the
//! current invocation: the dispatcher rolls back the staged storage and
//! surfaces the error to the original caller unchanged.

use tessera_types::module::ModuleError;
use tessera_types::values::{Address, Selector};
use thiserror::Error;

// =============================================================================
// DIAMOND ERRORS
// =============================================================================

/// Errors raised by the registry, cut protocol, and fallback router.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DiamondError {
    /// A cut carried an empty selector list.
    #[error("no selectors specified in cut")]
    SelectorNotSpecified,

    /// Initializer target and initializer data must be present together.
    #[error("invalid initialization parameters: target and calldata must both be set or both be empty")]
    InvalidInitializationParameters,

    /// ADD attempted for a selector that is already bound.
    #[error("selector already added: {0}")]
    SelectorAlreadyAdded(Selector),

    /// REPLACE/REMOVE attempted for a selector with no binding.
    #[error("selector not found: {0}")]
    SelectorNotFound(Selector),

    /// Attempt to mutate a selector owned by the dispatcher's native code.
    #[error("selector is immutable: {0}")]
    SelectorIsImmutable(Selector),

    /// REPLACE where the new module equals the currently bound one.
    #[error("replace target is identical for selector: {0}")]
    ReplaceTargetIsIdentical(Selector),

    /// REMOVE cut carried a non-zero target address.
    #[error("remove target must be the zero address, got {0:?}")]
    RemoveTargetNotZeroAddress(Address),

    /// Cut target has no registered code.
    #[error("target has no code: {0:?}")]
    TargetHasNoCode(Address),

    /// Dispatch resolved to a target with no registered code.
    #[error("implementation is not a contract: {0:?}")]
    ImplementationIsNotContract(Address),

    /// Directory is full (positions are 16-bit ordinals).
    #[error("selector capacity exceeded: max {max} live selectors")]
    SelectorCapacityExceeded {
        /// Maximum number of live selectors.
        max: u16,
    },

    /// A single module holds more selectors than the reflection
    /// representation can report.
    #[error("facet {target:?} has {count} selectors, exceeding the reporting limit of {max}")]
    FacetSelectorOverflow {
        /// Module whose selector set overflowed.
        target: Address,
        /// Number of selectors bound to it.
        count: usize,
        /// Reporting limit (one byte).
        max: usize,
    },

    /// A guarded operation was entered while another guarded operation of
    /// the same top-level invocation was in progress.
    #[error("reentrant call")]
    ReentrantCall,

    /// Nested forwarding exceeded the depth limit.
    #[error("call depth exceeded: {depth} > {max}")]
    CallDepthExceeded {
        /// Depth that was requested.
        depth: u16,
        /// Maximum allowed depth.
        max: u16,
    },

    /// Capability-gated operation invoked by an unauthorized caller.
    #[error("unauthorized caller: {0:?}")]
    Unauthorized(Address),

    /// The candidate module's self-description call failed.
    #[error("moduleFacets() call failed for {target:?}: {reason}")]
    ModuleFacetsCallFailed {
        /// Module that was queried.
        target: Address,
        /// Failure reported by the module.
        reason: String,
    },

    /// The candidate module reported a manifest that does not describe
    /// itself (wrong target or wrong action).
    #[error("invalid module manifest from {target:?}: {reason}")]
    InvalidModuleManifest {
        /// Module that was queried.
        target: Address,
        /// What was wrong with the manifest.
        reason: String,
    },

    /// A facet's business logic failed; carried verbatim to the caller.
    #[error("module error: {0}")]
    Module(#[source] ModuleError),
}

impl From<ModuleError> for DiamondError {
    fn from(err: ModuleError) -> Self {
        match err {
            // A guard trip inside a facet is the same re-entrancy failure
            // as one inside a native operation.
            ModuleError::Reentrancy => Self::ReentrantCall,
            other => Self::Module(other),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
