//! Binary-trie inclusion proofs
//!
//! Global state is a binary trie keyed by the bits of `sha256(key)`, most
//! significant bit first. A proof is the root-to-terminal path: the interior
//! nodes walked, then either the leaf found at the end of the path or the
//! empty node marking where the key would live.
//!
//! Node hashes:
//! - interior: `sha256(left || right)`
//! - empty: `sha256(0x01 || nonce || packed(prefix) || u64le(len(prefix)))`
//! - leaf: `sha256(0x03 || nonce || packed(prefix) || u64le(len(prefix)) || lp(key) || lp(value))`

use serde::{Deserialize, Serialize};
use skiplight_core::{hash, LedgerError, Result};
use tracing::debug;

/// Domain tag of empty nodes
pub const EMPTY_TAG: u8 = 1;
/// Domain tag of leaf nodes
pub const LEAF_TAG: u8 = 3;

/// Number of path bits a key has
pub const KEY_BITS: usize = 256;

/// Path bits of a key, most significant bit first
pub fn key_bits(key: &[u8]) -> Vec<bool> {
    let digest = hash::hash(key);
    digest
        .iter()
        .flat_map(|byte| (0..8).rev().map(move |shift| (byte >> shift) & 1 == 1))
        .collect()
}

/// Pack bits into bytes, most significant bit first, zero-padded
pub fn pack_bits(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |byte, (i, bit)| if *bit { byte | (0x80 >> i) } else { byte })
        })
        .collect()
}

/// Branch with two children
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteriorNode {
    /// Hash of the `0` child
    pub left: [u8; 32],
    /// Hash of the `1` child
    pub right: [u8; 32],
}

impl InteriorNode {
    /// `sha256(left || right)`
    pub fn hash(&self) -> [u8; 32] {
        let mut h = hash::hasher();
        h.update(&self.left);
        h.update(&self.right);
        h.finalize()
    }

    fn child(&self, bit: bool) -> [u8; 32] {
        if bit {
            self.right
        } else {
            self.left
        }
    }
}

/// Vacant position in the trie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyNode {
    /// Path bits leading to this node
    pub prefix: Vec<bool>,
}

impl EmptyNode {
    /// Node hash under the trie nonce
    pub fn hash(&self, nonce: &[u8]) -> [u8; 32] {
        let mut h = hash::hasher();
        h.update(&[EMPTY_TAG]);
        h.update(nonce);
        h.update(&pack_bits(&self.prefix));
        h.update_u64_le(self.prefix.len() as u64);
        h.finalize()
    }
}

/// Stored key/value pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafNode {
    /// Path bits leading to this node
    pub prefix: Vec<bool>,
    /// Full key
    pub key: Vec<u8>,
    /// Stored value
    pub value: Vec<u8>,
}

impl LeafNode {
    /// Node hash under the trie nonce
    pub fn hash(&self, nonce: &[u8]) -> [u8; 32] {
        let mut h = hash::hasher();
        h.update(&[LEAF_TAG]);
        h.update(nonce);
        h.update(&pack_bits(&self.prefix));
        h.update_u64_le(self.prefix.len() as u64);
        h.update_len_prefixed(&self.key);
        h.update_len_prefixed(&self.value);
        h.finalize()
    }
}

/// Root-to-terminal path for one key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    /// Interior nodes from the root down
    pub interiors: Vec<InteriorNode>,
    /// Terminal leaf, when the path ends at one
    pub leaf: Option<LeafNode>,
    /// Terminal empty node, when the path ends at one
    pub empty: Option<EmptyNode>,
    /// Per-trie nonce mixed into terminal hashes
    pub nonce: Vec<u8>,
}

impl InclusionProof {
    /// Hash of the root interior node
    pub fn root_hash(&self) -> Result<[u8; 32]> {
        self.interiors
            .first()
            .map(InteriorNode::hash)
            .ok_or_else(|| LedgerError::protocol("inclusion proof has no interior nodes"))
    }

    /// Key stored in the terminal leaf
    pub fn key(&self) -> Option<&[u8]> {
        self.leaf.as_ref().map(|leaf| leaf.key.as_slice())
    }

    /// Value stored in the terminal leaf
    pub fn value(&self) -> Option<&[u8]> {
        self.leaf.as_ref().map(|leaf| leaf.value.as_slice())
    }

    /// Whether the proof shows `key` present
    ///
    /// Walks the interior chain along `key`'s bits, checking that each node
    /// hashes to what its parent committed to, until the committed hash is
    /// the terminal's. A path to someone else's leaf or to an empty node
    /// proves absence.
    pub fn exists(&self, key: &[u8]) -> Result<bool> {
        let mut expected = self.root_hash()?;
        let bits = key_bits(key);
        let leaf_hash = self.leaf.as_ref().map(|leaf| leaf.hash(&self.nonce));
        let empty_hash = self.empty.as_ref().map(|empty| empty.hash(&self.nonce));

        let mut depth = 0;
        for interior in &self.interiors {
            if Some(expected) == leaf_hash || Some(expected) == empty_hash {
                break;
            }
            if interior.hash() != expected {
                return Err(LedgerError::protocol(format!(
                    "interior node at depth {depth} does not match its parent"
                )));
            }
            let bit = bits.get(depth).copied().ok_or_else(|| {
                LedgerError::protocol(format!("path longer than {KEY_BITS} bits"))
            })?;
            expected = interior.child(bit);
            depth += 1;
        }
        let walked = &bits[..depth];

        if let (Some(leaf), Some(hash)) = (&self.leaf, leaf_hash) {
            if hash == expected {
                if leaf.prefix != walked {
                    return Err(LedgerError::protocol("leaf prefix does not match path"));
                }
                let found = leaf.key == key;
                debug!(depth, found, "inclusion proof ends at leaf");
                return Ok(found);
            }
        }
        if let (Some(empty), Some(hash)) = (&self.empty, empty_hash) {
            if hash == expected {
                if empty.prefix != walked {
                    return Err(LedgerError::protocol(
                        "empty node prefix does not match path",
                    ));
                }
                debug!(depth, "inclusion proof ends at empty node");
                return Ok(false);
            }
        }
        Err(LedgerError::protocol(
            "inclusion proof has no terminating node",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const NONCE: &[u8] = b"test-nonce";

    // Root with one leaf holding `key` on its side and an empty sibling.
    fn single_leaf_proof(key: &[u8], value: &[u8]) -> InclusionProof {
        let bits = key_bits(key);
        let leaf = LeafNode {
            prefix: vec![bits[0]],
            key: key.to_vec(),
            value: value.to_vec(),
        };
        let sibling = EmptyNode {
            prefix: vec![!bits[0]],
        };
        let (left, right) = if bits[0] {
            (sibling.hash(NONCE), leaf.hash(NONCE))
        } else {
            (leaf.hash(NONCE), sibling.hash(NONCE))
        };
        InclusionProof {
            interiors: vec![InteriorNode { left, right }],
            leaf: Some(leaf),
            empty: None,
            nonce: NONCE.to_vec(),
        }
    }

    #[test]
    fn test_bits_are_msb_first() {
        assert_eq!(pack_bits(&[true]), vec![0x80]);
        assert_eq!(pack_bits(&[false, true, true]), vec![0x60]);
        let bits = key_bits(b"");
        assert_eq!(bits.len(), KEY_BITS);
        // sha256("") starts with 0xe3 = 1110_0011
        assert_eq!(&bits[..8], &[true, true, true, false, false, false, true, true]);
        assert_eq!(pack_bits(&bits), hash::hash(b"").to_vec());
    }

    #[test]
    fn test_present_key() {
        let proof = single_leaf_proof(b"alpha", b"1");
        assert!(proof.exists(b"alpha").unwrap());
        assert_eq!(proof.value(), Some(&b"1"[..]));
    }

    #[test]
    fn test_other_key_on_same_path_is_absent() {
        let proof = single_leaf_proof(b"alpha", b"1");
        let alpha_bit = key_bits(b"alpha")[0];
        let other = (0u32..)
            .map(|i| format!("k{i}").into_bytes())
            .find(|k| key_bits(k)[0] == alpha_bit)
            .unwrap();
        assert!(!proof.exists(&other).unwrap());
    }

    #[test]
    fn test_corrupted_interior_rejected() {
        let mut proof = single_leaf_proof(b"alpha", b"1");
        if key_bits(b"alpha")[0] {
            proof.interiors[0].right[0] ^= 0x01;
        } else {
            proof.interiors[0].left[0] ^= 0x01;
        }
        assert_matches!(
            proof.exists(b"alpha"),
            Err(LedgerError::ProtocolViolation { .. })
        );
    }

    #[test]
    fn test_corrupted_leaf_prefix_rejected() {
        let mut proof = single_leaf_proof(b"alpha", b"1");
        let leaf = proof.leaf.as_mut().unwrap();
        leaf.prefix.push(true);
        assert_matches!(
            proof.exists(b"alpha"),
            Err(LedgerError::ProtocolViolation { .. })
        );
    }

    #[test]
    fn test_empty_terminal_proves_absence() {
        let bits = key_bits(b"beta");
        let empty = EmptyNode {
            prefix: vec![bits[0]],
        };
        let other = EmptyNode {
            prefix: vec![!bits[0]],
        };
        let (left, right) = if bits[0] {
            (other.hash(NONCE), empty.hash(NONCE))
        } else {
            (empty.hash(NONCE), other.hash(NONCE))
        };
        let proof = InclusionProof {
            interiors: vec![InteriorNode { left, right }],
            leaf: None,
            empty: Some(empty),
            nonce: NONCE.to_vec(),
        };
        assert!(!proof.exists(b"beta").unwrap());
    }

    #[test]
    fn test_no_interiors_rejected() {
        let proof = InclusionProof {
            interiors: Vec::new(),
            leaf: None,
            empty: None,
            nonce: Vec::new(),
        };
        assert_matches!(proof.exists(b"x"), Err(LedgerError::ProtocolViolation { .. }));
    }
}
