//! In-memory binary trie producing inclusion proofs
//!
//! Keys sit at the shortest prefix of their hashed bits that no other key
//! shares; the root is always an interior node, even with zero or one key.

use skiplight_proof::trie::KEY_BITS;
use skiplight_proof::{key_bits, EmptyNode, InclusionProof, InteriorNode, LeafNode};
use std::collections::BTreeMap;

struct Entry<'a> {
    bits: Vec<bool>,
    key: &'a [u8],
    value: &'a [u8],
}

/// Key/value store with trie commitments
#[derive(Debug, Clone, Default)]
pub struct MemoryTrie {
    nonce: Vec<u8>,
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryTrie {
    /// Empty trie with the given nonce
    pub fn new(nonce: impl Into<Vec<u8>>) -> Self {
        Self {
            nonce: nonce.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Insert or replace a value
    pub fn insert(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Remove a key, returning its value
    pub fn remove(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.remove(key)
    }

    /// Stored value
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Root commitment
    pub fn root_hash(&self) -> [u8; 32] {
        let entries = self.indexed();
        let all: Vec<&Entry<'_>> = entries.iter().collect();
        self.interior(&[], &all).hash()
    }

    /// Inclusion proof for `key`, present or not
    pub fn prove(&self, key: &[u8]) -> InclusionProof {
        let entries = self.indexed();
        let bits = key_bits(key);
        let mut current: Vec<&Entry<'_>> = entries.iter().collect();
        let mut prefix = Vec::new();
        let mut proof = InclusionProof {
            interiors: Vec::new(),
            leaf: None,
            empty: None,
            nonce: self.nonce.clone(),
        };

        while prefix.len() < KEY_BITS {
            proof.interiors.push(self.interior(&prefix, &current));
            let depth = prefix.len();
            let bit = bits[depth];
            current.retain(|entry| entry.bits[depth] == bit);
            prefix.push(bit);
            match current.as_slice() {
                [] => {
                    proof.empty = Some(EmptyNode { prefix });
                    break;
                }
                [entry] => {
                    proof.leaf = Some(LeafNode {
                        prefix,
                        key: entry.key.to_vec(),
                        value: entry.value.to_vec(),
                    });
                    break;
                }
                _ => {}
            }
        }
        proof
    }

    fn indexed(&self) -> Vec<Entry<'_>> {
        self.entries
            .iter()
            .map(|(key, value)| Entry {
                bits: key_bits(key),
                key,
                value,
            })
            .collect()
    }

    fn interior(&self, prefix: &[bool], entries: &[&Entry<'_>]) -> InteriorNode {
        let depth = prefix.len();
        let (ones, zeros): (Vec<&Entry<'_>>, Vec<&Entry<'_>>) =
            entries.iter().copied().partition(|entry| entry.bits[depth]);
        let mut child = prefix.to_vec();
        child.push(false);
        let left = self.subtree_hash(&child, &zeros);
        child[depth] = true;
        let right = self.subtree_hash(&child, &ones);
        InteriorNode { left, right }
    }

    fn subtree_hash(&self, prefix: &[bool], entries: &[&Entry<'_>]) -> [u8; 32] {
        match entries {
            [] => EmptyNode {
                prefix: prefix.to_vec(),
            }
            .hash(&self.nonce),
            [entry] => LeafNode {
                prefix: prefix.to_vec(),
                key: entry.key.to_vec(),
                value: entry.value.to_vec(),
            }
            .hash(&self.nonce),
            _ => self.interior(prefix, entries).hash(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_trie_proves_absence() {
        let trie = MemoryTrie::new(b"n".to_vec());
        let proof = trie.prove(b"missing");
        assert_eq!(proof.interiors.len(), 1);
        assert_eq!(proof.root_hash().unwrap(), trie.root_hash());
        assert!(!proof.exists(b"missing").unwrap());
    }

    #[test]
    fn test_present_and_absent_keys() {
        let mut trie = MemoryTrie::new(b"n".to_vec());
        for i in 0..32u8 {
            trie.insert(vec![i], vec![i, i]);
        }
        for i in 0..32u8 {
            let proof = trie.prove(&[i]);
            assert_eq!(proof.root_hash().unwrap(), trie.root_hash());
            assert!(proof.exists(&[i]).unwrap());
            assert_eq!(proof.value(), Some(&[i, i][..]));
        }
        for i in 100..120u8 {
            assert!(!trie.prove(&[i]).exists(&[i]).unwrap());
        }
    }

    #[test]
    fn test_root_tracks_content() {
        let mut trie = MemoryTrie::new(b"n".to_vec());
        let empty_root = trie.root_hash();
        trie.insert(b"k".to_vec(), b"v".to_vec());
        let root = trie.root_hash();
        assert_ne!(root, empty_root);
        trie.insert(b"k".to_vec(), b"w".to_vec());
        assert_ne!(trie.root_hash(), root);
        trie.remove(b"k");
        assert_eq!(trie.root_hash(), empty_root);
    }
}
