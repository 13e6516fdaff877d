//! # Call Codec
//!
//! Bincode-based encoding of call arguments and return values.
//!
//! Every dispatched operation travels as `(selector, argument bytes)`; the
//! argument bytes are the bincode encoding of that operation's payload
//! struct, and composite return values are encoded the same way. Facets
//! define one serde payload struct per operation and decode with
//! [`decode_call`], which maps malformed input to
//! [`ModuleError::InvalidCalldata`].

use crate::module::ModuleError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes an operation's argument payload.
///
/// # Panics
///
/// Panics only if bincode cannot serialize the payload, which cannot happen
/// for the plain-data payload structs used on this wire.
#[must_use]
pub fn encode_call<T: Serialize>(payload: &T) -> Vec<u8> {
    bincode::serialize(payload).expect("payload serialization is infallible")
}

/// Decodes an operation's argument payload.
pub fn decode_call<T: DeserializeOwned>(input: &[u8]) -> Result<T, ModuleError> {
    bincode::deserialize(input).map_err(|e| ModuleError::InvalidCalldata(e.to_string()))
}

/// Encodes a return value.
#[must_use]
pub fn encode_return<T: Serialize>(value: &T) -> Vec<u8> {
    bincode::serialize(value).expect("return serialization is infallible")
}

/// Decodes a return value (used by callers and tests).
pub fn decode_return<T: DeserializeOwned>(output: &[u8]) -> Result<T, ModuleError> {
    bincode::deserialize(output).map_err(|e| ModuleError::InvalidCalldata(e.to_string()))
}

// =============================================================================
// TESTS
// =============================================================================
