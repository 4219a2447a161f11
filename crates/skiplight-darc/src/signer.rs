//! Signers: an identity plus the secret that backs it

use crate::identity::{Ed25519Identity, Identity};
use rand_core::{CryptoRng, RngCore};
use skiplight_core::{
    ed25519_sign, generate_signing_key, signing_key_from_seed, Ed25519SigningKey, Result,
};

/// Anything that can produce signatures for an identity
pub trait Signer: Send + Sync {
    /// Identity the signatures verify under
    fn identity(&self) -> Identity;

    /// Sign a message
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>>;
}

/// Ed25519 key holder
///
/// The signing key is secret material: it is never logged and the `Debug`
/// output redacts it.
#[derive(Clone)]
pub struct Ed25519Signer {
    identity: Ed25519Identity,
    secret: Ed25519SigningKey,
}

impl Ed25519Signer {
    /// Wrap an existing signing key
    pub fn new(secret: Ed25519SigningKey) -> Self {
        Self {
            identity: Ed25519Identity::new(secret.verifying_key()),
            secret,
        }
    }

    /// Deterministic signer from 32 seed bytes
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self::new(signing_key_from_seed(seed))
    }

    /// Fresh signer from a randomness source
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self::new(generate_signing_key(rng))
    }

    /// The direct identity of this signer
    pub fn ed25519_identity(&self) -> &Ed25519Identity {
        &self.identity
    }
}

impl Signer for Ed25519Signer {
    fn identity(&self) -> Identity {
        Identity::Ed25519(self.identity)
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        Ok(ed25519_sign(&self.secret, message))
    }
}

impl std::fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("identity", &Identity::Ed25519(self.identity).to_string())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}
