//! # Module Manifest Types
//!
//! The cut instruction vocabulary shared by the dispatcher core and every
//! facet: [`FacetCut`], [`CutAction`], and the module-level error type.
//!
//! The `ModuleCode` trait itself lives in `tessera-core` (it operates on the
//! core's `AppStorage`); the types here are the wire-level vocabulary a
//! module uses to describe itself.

use crate::values::{Address, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// CUT INSTRUCTIONS
// =============================================================================

/// What a cut does with its selectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CutAction {
    /// Bind new selectors to the target module.
    Add,
    /// Rebind already-bound selectors to the target module.
    Replace,
    /// Unbind selectors (target must be the zero address).
    Remove,
}

/// A transient instruction consumed by one cut-protocol invocation.
///
/// Not persisted; the cut protocol validates and applies it, then the event
/// log carries a copy for observers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetCut {
    /// Module the selectors are (un)bound to. Zero for [`CutAction::Remove`].
    pub target: Address,
    /// Add, replace, or remove.
    pub action: CutAction,
    /// The selectors this cut covers. Must be non-empty.
    pub selectors: Vec<Selector>,
}

impl FacetCut {
    /// Convenience constructor for an ADD cut (the shape a module manifest
    /// returns).
    #[must_use]
    pub fn add(target: Address, selectors: Vec<Selector>) -> Self {
        Self {
            target,
            action: CutAction::Add,
            selectors,
        }
    }

    /// Convenience constructor for a REPLACE cut.
    #[must_use]
    pub fn replace(target: Address, selectors: Vec<Selector>) -> Self {
        Self {
            target,
            action: CutAction::Replace,
            selectors,
        }
    }

    /// Convenience constructor for a REMOVE cut (zero target).
    #[must_use]
    pub fn remove(selectors: Vec<Selector>) -> Self {
        Self {
            target: Address::ZERO,
            action: CutAction::Remove,
            selectors,
        }
    }
}

// =============================================================================
// MODULE ERRORS
// =============================================================================

/// Errors raised inside a facet's own business logic.
///
/// All of these abort the current invocation; the dispatcher rolls back
/// every storage write of the failed invocation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModuleError {
    /// Argument bytes could not be decoded for the requested operation.
    #[error("invalid calldata: {0}")]
    InvalidCalldata(String),

    /// The module does not implement the requested selector.
    #[error("unknown selector: {0}")]
    UnknownSelector(Selector),

    /// Caller lacks the required capability.
    #[error("unauthorized caller: {0:?}")]
    Unauthorized(Address),

    /// Business-rule revert with a human-readable reason.
    #[error("revert: {0}")]
    Revert(String),

    /// Guarded operation entered while the invocation's guard latch was
    /// already held.
    #[error("reentrant call")]
    Reentrancy,

    /// Arithmetic over/underflow in a balance or amount computation.
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),

    /// Nested dispatch through the router failed.
    #[error("forwarded call failed: {0}")]
    ForwardFailed(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_cut_has_zero_target() {
        let cut = FacetCut::remove(vec![Selector::new([1, 2, 3, 4])]);
        assert_eq!(cut.target, Address::ZERO);
        assert_eq!(cut.action, CutAction::Remove);
    }

    #[test]
    fn test_cut_serde_round_trip() {
        let cut = FacetCut::add(
            Address::new([5u8; 20]),
            vec![Selector::new([1, 2, 3, 4]), Selector::new([5, 6, 7, 8])],
        );
        let bytes = bincode::serialize(&cut).unwrap();
        let back: FacetCut = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, cut);
    }

    #[test]
    fn test_module_error_display() {
        let err = ModuleError::Unauthorized(Address::ZERO);
        assert!(err.to_string().contains("unauthorized"));

        let err = ModuleError::UnknownSelector(Selector::new([0xaa, 0xbb, 0xcc, 0xdd]));
        assert_eq!(err.to_string(), "unknown selector: 0xaabbccdd");
    }
}
