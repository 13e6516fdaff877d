//! # Event Schema
//!
//! Payloads appended to the shared storage's event log. The log is the sole
//! externally observable trace of registry mutation besides the read-side
//! reflection operations, and it participates in the same all-or-nothing
//! transaction as every other storage write: events from a failed
//! invocation are rolled back with it.

use serde::{Deserialize, Serialize};
use tessera_types::module::FacetCut;
use tessera_types::values::{Address, Bytes};

// =============================================================================
// CORE EVENTS
// =============================================================================

/// Change notification for one completed cut batch.
///
/// Carries the full applied cut list plus the optional initializer, exactly
/// as given to the cut protocol.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiamondCutPayload {
    /// The cuts that were applied, in order.
    pub cuts: Vec<FacetCut>,
    /// One-shot initializer target, if any.
    pub init_target: Option<Address>,
    /// One-shot initializer calldata (empty iff no target).
    pub init_data: Bytes,
}

/// One entry in the shared storage's event log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiamondEvent {
    /// A cut batch completed (emitted before the optional initializer runs,
    /// rolled back with the batch if the initializer fails).
    Cut(DiamondCutPayload),

    /// A module was installed through the self-description protocol.
    ModuleInstalled {
        /// The installed module.
        target: Address,
        /// How many selectors it contributed.
        selectors: usize,
    },

    /// The fallback routing target changed.
    FallbackChanged {
        /// Previous fallback address.
        previous: Address,
        /// New fallback address.
        current: Address,
    },

    /// A business facet emitted a domain event.
    Module {
        /// Event topic, e.g. `"AssetCreated"`.
        topic: String,
        /// bincode-encoded event payload.
        data: Bytes,
    },
}

impl DiamondEvent {
    /// Builds a facet-domain event from a topic and serializable payload.
    #[must_use]
    pub fn module<T: Serialize>(topic: &str, payload: &T) -> Self {
        Self::Module {
            topic: topic.to_string(),
            data: Bytes::from_vec(tessera_types::codec::encode_return(payload)),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
