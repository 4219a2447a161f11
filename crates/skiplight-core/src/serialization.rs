//! Canonical binary serialization
//!
//! Block payloads, state bodies, Darcs and the chain configuration are stored
//! on the ledger as bincode. Encoding is deterministic for the types used
//! here (no maps with unordered iteration).

use crate::Result;
use serde::{de::DeserializeOwned, Serialize};

/// Serialize any serde-compatible type to canonical bytes
pub fn to_vec<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

/// Deserialize canonical bytes
pub fn from_slice<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}
