//! # tessera-types
//!
//! Shared type definitions for the Tessera asset-tokenization platform.
//!
//! ## Purpose
//!
//! Single source of truth for the value objects that travel between the
//! dispatcher core and the facet crates:
//!
//! - [`values`] - `Address`, `Hash`, `Selector`, `Bytes`, `U256`
//! - [`hashing`] - Keccak-256 helpers and selector derivation
//! - [`codec`] - bincode call-argument and return-value codec
//! - [`module`] - the `FacetCut` manifest vocabulary and `ModuleError`
//!
//! Every facet reads and writes the dispatcher's shared storage through the
//! interface defined here; nothing in this crate owns state of its own.

// Crate-level lints
#![warn(missing_docs)]
#![warn(clippy::all)]

// =============================================================================
// MODULES
// =============================================================================

pub mod codec;
pub mod hashing;
pub mod module;
pub mod values;

// =============================================================================
// PRELUDE
// =============================================================================

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::codec::{decode_call, decode_return, encode_call, encode_return};
    pub use crate::hashing::keccak256;
    pub use crate::module::{CutAction, FacetCut, ModuleError};
    pub use crate::values::{Address, Bytes, Hash, Selector, U256};
}

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
