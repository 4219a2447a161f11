//! Ed25519 signing and verification helpers
//!
//! Server service keys, forward-link attestations and transaction signer keys
//! are all Ed25519. Group arithmetic stays inside `ed25519-dalek`; this module
//! only adapts its types to the ledger's error taxonomy and wire encoding
//! (signatures travel as raw 64-byte vectors).

use crate::{LedgerError, Result};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::{CryptoRng, RngCore};

/// Ed25519 signing key
pub type Ed25519SigningKey = SigningKey;

/// Ed25519 verifying key (public key)
pub type Ed25519VerifyingKey = VerifyingKey;

/// Length of an encoded Ed25519 signature
pub const SIGNATURE_LEN: usize = 64;

/// Length of an encoded Ed25519 public key
pub const PUBLIC_KEY_LEN: usize = 32;

/// Generate a new signing key from the provided randomness source
pub fn generate_signing_key<R: RngCore + CryptoRng>(rng: &mut R) -> Ed25519SigningKey {
    SigningKey::generate(rng)
}

/// Build a signing key from 32 seed bytes
pub fn signing_key_from_seed(seed: &[u8; 32]) -> Ed25519SigningKey {
    SigningKey::from_bytes(seed)
}

/// Sign data, returning the raw 64-byte signature
pub fn ed25519_sign(signing_key: &Ed25519SigningKey, data: &[u8]) -> Vec<u8> {
    signing_key.sign(data).to_bytes().to_vec()
}

/// Verify a raw signature
///
/// Malformed signature bytes and failed verification both surface as a
/// protocol violation: the caller was handed evidence that does not check out.
pub fn ed25519_verify(
    verifying_key: &Ed25519VerifyingKey,
    data: &[u8],
    signature: &[u8],
) -> Result<()> {
    let signature = signature_from_slice(signature)?;
    verifying_key
        .verify(data, &signature)
        .map_err(|e| LedgerError::protocol(format!("signature verification failed: {e}")))
}

/// Parse a verifying key from raw bytes
pub fn verifying_key_from_slice(bytes: &[u8]) -> Result<Ed25519VerifyingKey> {
    let array: [u8; PUBLIC_KEY_LEN] = bytes.try_into().map_err(|_| {
        LedgerError::argument(format!(
            "public key must be {PUBLIC_KEY_LEN} bytes, got {}",
            bytes.len()
        ))
    })?;
    VerifyingKey::from_bytes(&array)
        .map_err(|e| LedgerError::argument(format!("invalid public key: {e}")))
}

fn signature_from_slice(bytes: &[u8]) -> Result<Signature> {
    let array: [u8; SIGNATURE_LEN] = bytes.try_into().map_err(|_| {
        LedgerError::protocol(format!(
            "signature must be {SIGNATURE_LEN} bytes, got {}",
            bytes.len()
        ))
    })?;
    Ok(Signature::from_bytes(&array))
}
