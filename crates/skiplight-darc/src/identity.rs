//! Identities that can be named in access-control rules
//!
//! An identity is either a direct Ed25519 key, which can check a signature on
//! its own, or a reference to another Darc, which cannot: deciding whether a
//! delegated identity approved something means fetching the referenced Darc
//! and walking its rules (see [`crate::resolver`]).

use serde::{Deserialize, Serialize};
use skiplight_core::{
    ed25519_verify, verifying_key_from_slice, DarcId, Ed25519VerifyingKey, LedgerError, Result,
};
use std::fmt;
use std::str::FromStr;

/// Canonical-string prefix of direct-key identities
pub const ED25519_PREFIX: &str = "ed25519";
/// Canonical-string prefix of delegated identities
pub const DARC_PREFIX: &str = "darc";

const ED25519_TAG: u8 = 1;
const DARC_TAG: u8 = 2;

/// Capabilities every identity kind provides
pub trait IdentityCapability {
    /// Text form used inside rule expressions, e.g. `ed25519:<hex>`
    fn to_canonical_string(&self) -> String;

    /// Binary form hashed into instructions: a tag byte then 32 bytes
    fn to_bytes(&self) -> Vec<u8>;

    /// Check a signature locally
    fn verify(&self, message: &[u8], signature: &[u8]) -> bool;
}

/// Direct public-key identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ed25519Identity {
    public_key: Ed25519VerifyingKey,
}

impl Ed25519Identity {
    /// Wrap a verifying key
    pub fn new(public_key: Ed25519VerifyingKey) -> Self {
        Self { public_key }
    }

    /// The wrapped verifying key
    pub fn public_key(&self) -> &Ed25519VerifyingKey {
        &self.public_key
    }
}

impl IdentityCapability for Ed25519Identity {
    fn to_canonical_string(&self) -> String {
        format!("{ED25519_PREFIX}:{}", hex::encode(self.public_key.as_bytes()))
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(33);
        bytes.push(ED25519_TAG);
        bytes.extend_from_slice(self.public_key.as_bytes());
        bytes
    }

    fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        ed25519_verify(&self.public_key, message, signature).is_ok()
    }
}

/// Delegated identity referring to another Darc by base id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DarcIdentity {
    base_id: DarcId,
}

impl DarcIdentity {
    /// Refer to the Darc with this base id
    pub fn new(base_id: DarcId) -> Self {
        Self { base_id }
    }

    /// Base id of the referenced Darc
    pub fn base_id(&self) -> &DarcId {
        &self.base_id
    }
}

impl IdentityCapability for DarcIdentity {
    fn to_canonical_string(&self) -> String {
        format!("{DARC_PREFIX}:{}", self.base_id.to_hex())
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(33);
        bytes.push(DARC_TAG);
        bytes.extend_from_slice(self.base_id.as_bytes());
        bytes
    }

    /// Always false: a delegated identity only verifies through its Darc's rules
    fn verify(&self, _message: &[u8], _signature: &[u8]) -> bool {
        false
    }
}

/// Any identity a rule can name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Identity {
    /// Direct Ed25519 key
    Ed25519(Ed25519Identity),
    /// Reference to another Darc
    Darc(DarcIdentity),
}

impl Identity {
    /// Direct identity for a verifying key
    pub fn ed25519(public_key: Ed25519VerifyingKey) -> Self {
        Self::Ed25519(Ed25519Identity::new(public_key))
    }

    /// Delegated identity for a Darc base id
    pub fn darc(base_id: DarcId) -> Self {
        Self::Darc(DarcIdentity::new(base_id))
    }

    /// Whether resolving this identity requires following a Darc
    pub fn is_delegated(&self) -> bool {
        matches!(self, Self::Darc(_))
    }

    /// Parse the canonical binary form
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match bytes.split_first() {
            Some((&ED25519_TAG, key)) => Ok(Self::ed25519(verifying_key_from_slice(key)?)),
            Some((&DARC_TAG, id)) => Ok(Self::darc(DarcId::from_slice(id)?)),
            Some((tag, _)) => Err(LedgerError::argument(format!(
                "unknown identity tag {tag}"
            ))),
            None => Err(LedgerError::argument("empty identity encoding")),
        }
    }
}

impl IdentityCapability for Identity {
    fn to_canonical_string(&self) -> String {
        match self {
            Self::Ed25519(id) => id.to_canonical_string(),
            Self::Darc(id) => id.to_canonical_string(),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Ed25519(id) => id.to_bytes(),
            Self::Darc(id) => id.to_bytes(),
        }
    }

    fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        match self {
            Self::Ed25519(id) => id.verify(message, signature),
            Self::Darc(id) => id.verify(message, signature),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical_string())
    }
}

impl FromStr for Identity {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        let (prefix, body) = s
            .split_once(':')
            .ok_or_else(|| LedgerError::argument(format!("identity '{s}' has no kind prefix")))?;
        match prefix {
            ED25519_PREFIX => {
                let bytes = hex::decode(body)
                    .map_err(|e| LedgerError::argument(format!("identity '{s}': {e}")))?;
                Ok(Self::ed25519(verifying_key_from_slice(&bytes)?))
            }
            DARC_PREFIX => Ok(Self::darc(DarcId::from_hex(body)?)),
            other => Err(LedgerError::argument(format!(
                "unknown identity kind '{other}'"
            ))),
        }
    }
}
