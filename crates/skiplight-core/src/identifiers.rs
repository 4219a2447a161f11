//! 32-byte identifiers used across the ledger protocol
//!
//! All three identifier kinds are SHA-256 sized and opaque; they are kept as
//! distinct types so a block id can never be handed to a call that expects an
//! instance key.

use crate::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! digest_identifier {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            /// Wrap raw digest bytes
            pub const fn new(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Parse from a byte slice that must be exactly 32 bytes long
            pub fn from_slice(bytes: &[u8]) -> Result<Self> {
                let array: [u8; 32] = bytes.try_into().map_err(|_| {
                    LedgerError::argument(format!(
                        "{} must be 32 bytes, got {}",
                        $label,
                        bytes.len()
                    ))
                })?;
                Ok(Self(array))
            }

            /// Borrow the raw bytes
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Lowercase hex rendering
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parse from a hex string
            pub fn from_hex(encoded: &str) -> Result<Self> {
                let bytes = hex::decode(encoded).map_err(|e| {
                    LedgerError::argument(format!("{} is not valid hex: {e}", $label))
                })?;
                Self::from_slice(&bytes)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), &self.to_hex()[..16])
            }
        }

        impl FromStr for $name {
            type Err = LedgerError;

            fn from_str(s: &str) -> Result<Self> {
                Self::from_hex(s)
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }
    };
}

digest_identifier!(
    /// Key of one versioned object in global state
    ///
    /// Immutable once assigned. Instances created by a Spawn instruction get
    /// the id derived from that instruction.
    InstanceId,
    "instance id"
);

digest_identifier!(
    /// Hash of a skip block; the genesis block hash names the chain
    BlockId,
    "block id"
);

digest_identifier!(
    /// Identifier of an access-control object (a Darc id or base id)
    DarcId,
    "darc id"
);

impl InstanceId {
    /// Well-known key of the chain configuration instance
    pub const CONFIG: InstanceId = InstanceId([0u8; 32]);

    /// Whether this is the configuration instance key
    pub fn is_config(&self) -> bool {
        *self == Self::CONFIG
    }
}

impl From<DarcId> for InstanceId {
    /// A Darc is stored in global state under its base id
    fn from(id: DarcId) -> Self {
        Self(id.0)
    }
}

impl From<InstanceId> for DarcId {
    fn from(id: InstanceId) -> Self {
        Self(id.0)
    }
}
