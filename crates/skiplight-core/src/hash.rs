//! Pure synchronous hashing for ledger commitments
//!
//! Every digest the ledger protocol defines (block hashes, forward-link
//! hashes, trie nodes, instruction and transaction hashes, derived instance
//! ids, Darc ids) is SHA-256. This module is the single place the algorithm
//! is named, so call sites never touch `sha2` directly.
//!
//! The incremental [`Hasher`] carries the framing helpers the protocol uses:
//! little-endian integers and length-prefixed byte strings.
//!
//! ```ignore
//! use skiplight_core::hash::{hash, hasher};
//!
//! let digest = hash(b"hello world");
//!
//! let mut h = hasher();
//! h.update(b"hello");
//! h.update_u64_le(42);
//! let digest = h.finalize();
//! ```

use sha2::{Digest, Sha256};

/// Size in bytes of every digest produced here
pub const DIGEST_LEN: usize = 32;

/// Hash arbitrary bytes to a 32-byte digest
#[inline]
pub fn hash(data: &[u8]) -> [u8; 32] {
    let mut h = hasher();
    h.update(data);
    h.finalize()
}

/// Create an incremental hasher
#[inline]
pub fn hasher() -> Hasher {
    Hasher(Sha256::new())
}

/// Incremental SHA-256 hasher with protocol framing helpers
#[derive(Clone, Default)]
pub struct Hasher(Sha256);

impl Hasher {
    /// Feed raw bytes
    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    /// Feed a `u32` in little-endian order
    pub fn update_u32_le(&mut self, value: u32) {
        self.0.update(value.to_le_bytes());
    }

    /// Feed a `u64` in little-endian order
    pub fn update_u64_le(&mut self, value: u64) {
        self.0.update(value.to_le_bytes());
    }

    /// Feed `u64le(len(data)) || data`
    pub fn update_len_prefixed(&mut self, data: &[u8]) {
        self.update_u64_le(data.len() as u64);
        self.0.update(data);
    }

    /// Finalize and return the 32-byte digest
    pub fn finalize(self) -> [u8; 32] {
        let result = self.0.finalize();
        let mut output = [0u8; 32];
        output.copy_from_slice(&result);
        output
    }
}

impl std::fmt::Debug for Hasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Hasher(sha256)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_determinism() {
        assert_eq!(hash(b"hello world"), hash(b"hello world"));
    }

    #[test]
    fn test_incremental_hasher_equivalence() {
        let mut h = hasher();
        h.update(b"hello");
        h.update(b" ");
        h.update(b"world");
        assert_eq!(hash(b"hello world"), h.finalize());
    }

    #[test]
    fn test_integer_framing_is_little_endian() {
        let mut framed = hasher();
        framed.update_u64_le(1);
        assert_eq!(framed.finalize(), hash(&[1, 0, 0, 0, 0, 0, 0, 0]));

        let mut framed = hasher();
        framed.update_u32_le(0x0102_0304);
        assert_eq!(framed.finalize(), hash(&[4, 3, 2, 1]));
    }

    #[test]
    fn test_len_prefix_disambiguates_splits() {
        let mut a = hasher();
        a.update_len_prefixed(b"ab");
        a.update_len_prefixed(b"c");

        let mut b = hasher();
        b.update_len_prefixed(b"a");
        b.update_len_prefixed(b"bc");

        assert_ne!(a.finalize(), b.finalize());
    }

    #[test]
    fn test_sha256_known_vector() {
        // SHA256("") = e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855
        let expected = [
            0xe3, 0xb0, 0xc4, 0x42, 0x98, 0xfc, 0x1c, 0x14, 0x9a, 0xfb, 0xf4, 0xc8, 0x99, 0x6f,
            0xb9, 0x24, 0x27, 0xae, 0x41, 0xe4, 0x64, 0x9b, 0x93, 0x4c, 0xa4, 0x95, 0x99, 0x1b,
            0x78, 0x52, 0xb8, 0x55,
        ];
        assert_eq!(hash(b""), expected, "SHA-256 of empty string mismatch");
    }
}
