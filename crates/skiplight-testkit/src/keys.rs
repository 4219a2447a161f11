//! Key test helpers
//!
//! Deterministic signing keys for clients and servers, so fixtures and
//! expected hashes are stable across runs.

use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;
use skiplight_core::{generate_signing_key, hash, Ed25519SigningKey, Result};
use skiplight_darc::{Ed25519Signer, Identity, Signer};
use skiplight_proof::{Roster, ServerIdentity};

/// Client key with its signer and identity
#[derive(Debug, Clone)]
pub struct KeyTestFixture {
    signer: Ed25519Signer,
    label: String,
}

impl KeyTestFixture {
    /// Fixture from 32 seed bytes
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signer: Ed25519Signer::from_seed(seed),
            label: hex_prefix(seed),
        }
    }

    /// Fixture seeded by hashing a label
    pub fn from_label(label: &str) -> Self {
        Self {
            signer: Ed25519Signer::from_seed(&hash::hash(label.as_bytes())),
            label: label.to_string(),
        }
    }

    /// Fixture drawn from a seeded ChaCha stream
    pub fn from_rng_seed(seed: u64) -> Self {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        Self {
            signer: Ed25519Signer::new(generate_signing_key(&mut rng)),
            label: format!("rng-{seed}"),
        }
    }

    /// Signer backed by this key
    pub fn signer(&self) -> &Ed25519Signer {
        &self.signer
    }

    /// Signer as a trait object, for signer groups
    pub fn as_signer(&self) -> &dyn Signer {
        &self.signer
    }

    /// Direct identity of this key
    pub fn identity(&self) -> Identity {
        self.signer.identity()
    }

    /// Label the fixture was created from
    pub fn label(&self) -> &str {
        &self.label
    }
}

fn hex_prefix(seed: &[u8; 32]) -> String {
    seed[..4].iter().map(|b| format!("{b:02x}")).collect()
}

/// `count` server signing keys derived from `label`
pub fn server_keys(label: &str, count: usize) -> Vec<Ed25519SigningKey> {
    (0..count)
        .map(|i| {
            let seed = hash::hash(format!("{label}/server/{i}").as_bytes());
            skiplight_core::signing_key_from_seed(&seed)
        })
        .collect()
}

/// Roster whose service keys are `keys`, in order
pub fn roster_from_keys(keys: &[Ed25519SigningKey]) -> Result<Roster> {
    Roster::new(
        keys.iter()
            .enumerate()
            .map(|(i, key)| ServerIdentity::new(format!("tcp://server{i}:7770"), key.verifying_key()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use skiplight_darc::IdentityCapability;

    #[test]
    fn test_fixtures_are_deterministic() {
        assert_eq!(
            KeyTestFixture::from_label("alice").identity(),
            KeyTestFixture::from_label("alice").identity()
        );
        assert_ne!(
            KeyTestFixture::from_label("alice").identity(),
            KeyTestFixture::from_label("bob").identity()
        );
        assert_eq!(
            KeyTestFixture::from_rng_seed(7).identity(),
            KeyTestFixture::from_rng_seed(7).identity()
        );
    }

    #[test]
    fn test_fixture_signs_for_its_identity() {
        let alice = KeyTestFixture::from_seed(&[3u8; 32]);
        let sig = alice.as_signer().sign(b"msg").unwrap();
        assert!(alice.identity().verify(b"msg", &sig));
        assert_eq!(alice.label(), "03030303");
    }

    #[test]
    fn test_server_roster() {
        let keys = server_keys("net", 4);
        let roster = roster_from_keys(&keys).unwrap();
        assert_eq!(roster.len(), 4);
        assert_eq!(roster.service_key(2), Some(&keys[2].verifying_key()));
    }
}
