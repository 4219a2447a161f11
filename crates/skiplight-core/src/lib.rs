//! Skiplight Core - shared foundation of the ledger light client
//!
//! Everything the higher crates agree on lives here: the error taxonomy,
//! the hash function and its framing helpers, the 32-byte identifiers,
//! Ed25519 helpers, canonical serialization and the client configuration.
//!
//! Nothing in this crate performs I/O apart from reading a configuration
//! file on request.

#![forbid(unsafe_code)]

/// Unified error handling
pub mod errors;

/// SHA-256 hashing with protocol framing helpers
pub mod hash;

/// Instance, block and Darc identifiers
pub mod identifiers;

/// Ed25519 signing and verification
pub mod crypto;

/// Canonical bincode serialization
pub mod serialization;

/// Client configuration and validation
pub mod config;

pub use config::{ClientConfig, ConfigValidator, ValidationError};
pub use crypto::{
    ed25519_sign, ed25519_verify, generate_signing_key, signing_key_from_seed,
    verifying_key_from_slice, Ed25519SigningKey, Ed25519VerifyingKey,
};
pub use errors::{LedgerError, Result};
pub use identifiers::{BlockId, DarcId, InstanceId};
