//! Proofs: trie inclusion plus the chain of trust leading to it
//!
//! A proof bundles three pieces of evidence served by an untrusted node:
//! the inclusion path for a key, the latest block whose header commits to
//! the trie root, and forward links from the genesis block to that latest
//! block. Verification recomputes everything locally against the genesis id
//! the caller trusts; no node is believed on its word.

use crate::block::SkipBlock;
use crate::forward_link::ForwardLink;
use crate::instance::{Instance, StateBody};
use crate::roster::Roster;
use crate::trie::InclusionProof;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use skiplight_core::{BlockId, LedgerError, Result};
use tracing::debug;

/// Inclusion proof anchored in the skip chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proof {
    inclusion: InclusionProof,
    latest: SkipBlock,
    links: Vec<ForwardLink>,
    #[serde(skip)]
    state: OnceCell<StateBody>,
}

impl PartialEq for Proof {
    fn eq(&self, other: &Self) -> bool {
        self.inclusion == other.inclusion
            && self.latest == other.latest
            && self.links == other.links
    }
}

impl Eq for Proof {}

impl Proof {
    /// Assemble a proof from its parts
    pub fn new(inclusion: InclusionProof, latest: SkipBlock, links: Vec<ForwardLink>) -> Self {
        Self {
            inclusion,
            latest,
            links,
            state: OnceCell::new(),
        }
    }

    /// Verify the chain of trust from `genesis` to the latest block
    ///
    /// The trusted roster starts as the genesis self-link's new roster, or
    /// the latest block's roster when the self-link carries none. Callers
    /// that already hold the genesis roster should prefer
    /// [`Proof::verify_with_roster`].
    pub fn verify(&self, genesis: &BlockId) -> Result<()> {
        self.verify_chain(genesis, None)
    }

    /// Verify the chain of trust, trusting `roster` for the first link
    pub fn verify_with_roster(&self, genesis: &BlockId, roster: &Roster) -> Result<()> {
        self.verify_chain(genesis, Some(roster))
    }

    fn verify_chain(&self, genesis: &BlockId, seed: Option<&Roster>) -> Result<()> {
        self.latest.verify_hash()?;

        let header = self.latest.header()?;
        let root = self.inclusion.root_hash()?;
        if header.trie_root != root {
            return Err(LedgerError::protocol(
                "trie root in latest block does not match inclusion proof",
            ));
        }

        if self.latest.chain_id() != *genesis {
            return Err(LedgerError::protocol(format!(
                "latest block belongs to chain {} instead of {genesis}",
                self.latest.chain_id()
            )));
        }

        let (first, rest) = self
            .links
            .split_first()
            .ok_or_else(|| LedgerError::protocol("proof has no forward links"))?;
        // The self-link is unsigned, so both ends must be the genesis.
        if first.from != *genesis || first.to != *genesis {
            return Err(LedgerError::protocol(format!(
                "first forward link {} -> {} is not the genesis self-link of {genesis}",
                first.from, first.to
            )));
        }

        let mut roster = match (seed, &first.new_roster) {
            (Some(trusted), _) => trusted.clone(),
            (None, Some(announced)) => announced.clone(),
            (None, None) => self.latest.roster.clone(),
        };
        let mut prev = first.to;

        for (offset, link) in rest.iter().enumerate() {
            let index = offset + 1;
            link.verify(&roster).map_err(|e| {
                LedgerError::protocol(format!("forward link {index}: {e}"))
            })?;
            if link.from != prev {
                return Err(LedgerError::protocol(format!(
                    "forward link {index} starts at {} but previous link ends at {prev}",
                    link.from
                )));
            }
            prev = link.to;
            if let Some(next_roster) = &link.new_roster {
                debug!(link = index, servers = next_roster.len(), "roster rotated");
                roster = next_roster.clone();
            }
        }

        if prev != self.latest.hash {
            return Err(LedgerError::protocol(format!(
                "forward links end at {prev}, latest block is {}",
                self.latest.hash
            )));
        }

        debug!(
            genesis = %genesis,
            latest = self.latest.index,
            links = self.links.len(),
            "proof chain verified"
        );
        Ok(())
    }

    /// Whether the inclusion path shows `key` present
    pub fn exists(&self, key: &[u8]) -> Result<bool> {
        self.inclusion.exists(key)
    }

    /// Verify the proof and decode the proven instance
    ///
    /// Absence of a leaf is `NotFound`; a leaf of another contract is
    /// `ContractMismatch`.
    pub fn get_verified_instance(
        &self,
        genesis: &BlockId,
        expected_contract: &str,
    ) -> Result<Instance> {
        self.verify(genesis)?;
        self.proven_instance(expected_contract)
    }

    /// Decode the proven instance of an already verified proof
    pub fn proven_instance(&self, expected_contract: &str) -> Result<Instance> {
        let key = self
            .key()
            .ok_or_else(|| LedgerError::not_found("proof carries no leaf"))?;
        if !self.exists(key)? {
            return Err(LedgerError::protocol("leaf key is not on its own path"));
        }
        let body = self.state_body()?;
        if body.contract_kind != expected_contract {
            return Err(LedgerError::contract_mismatch(
                expected_contract,
                body.contract_kind.as_str(),
            ));
        }
        Instance::from_proof(self)
    }

    /// Key of the terminal leaf
    pub fn key(&self) -> Option<&[u8]> {
        self.inclusion.key()
    }

    /// Raw value of the terminal leaf
    pub fn value(&self) -> Option<&[u8]> {
        self.inclusion.value()
    }

    /// Decoded leaf value, computed once
    pub fn state_body(&self) -> Result<&StateBody> {
        self.state.get_or_try_init(|| {
            let value = self
                .value()
                .ok_or_else(|| LedgerError::not_found("proof carries no leaf"))?;
            StateBody::from_bytes(value)
        })
    }

    /// Root hash of the inclusion path
    pub fn trie_root(&self) -> Result<[u8; 32]> {
        self.inclusion.root_hash()
    }

    /// Inclusion path
    pub fn inclusion(&self) -> &InclusionProof {
        &self.inclusion
    }

    /// Latest block
    pub fn latest(&self) -> &SkipBlock {
        &self.latest
    }

    /// Forward links from genesis
    pub fn links(&self) -> &[ForwardLink] {
        &self.links
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::DataHeader;
    use crate::roster::ServerIdentity;
    use crate::trie::{key_bits, EmptyNode, InteriorNode, LeafNode};
    use assert_matches::assert_matches;
    use skiplight_core::{signing_key_from_seed, DarcId, Ed25519SigningKey, InstanceId};

    const NONCE: &[u8] = b"nonce";

    struct Fixture {
        keys: Vec<Ed25519SigningKey>,
        genesis: SkipBlock,
        latest: SkipBlock,
        inclusion: InclusionProof,
    }

    impl Fixture {
        fn new(contract: &str) -> Self {
            let keys: Vec<_> = (1..=4u8).map(|i| signing_key_from_seed(&[i; 32])).collect();
            let roster = Roster::new(
                keys.iter()
                    .enumerate()
                    .map(|(i, k)| ServerIdentity::new(format!("node{i}"), k.verifying_key()))
                    .collect(),
            )
            .unwrap();

            let key = InstanceId::new([9u8; 32]);
            let body = StateBody {
                contract_kind: contract.to_string(),
                value: b"42".to_vec(),
                version: 0,
                darc_id: DarcId::new([3u8; 32]),
            };
            let bits = key_bits(key.as_bytes());
            let leaf = LeafNode {
                prefix: vec![bits[0]],
                key: key.as_bytes().to_vec(),
                value: body.to_bytes().unwrap(),
            };
            let sibling = EmptyNode {
                prefix: vec![!bits[0]],
            };
            let (left, right) = if bits[0] {
                (sibling.hash(NONCE), leaf.hash(NONCE))
            } else {
                (leaf.hash(NONCE), sibling.hash(NONCE))
            };
            let inclusion = InclusionProof {
                interiors: vec![InteriorNode { left, right }],
                leaf: Some(leaf),
                empty: None,
                nonce: NONCE.to_vec(),
            };

            let genesis_header = DataHeader {
                trie_root: [0u8; 32],
                client_tx_hash: [0u8; 32],
                timestamp: 1,
            };
            let genesis = SkipBlock::new(0, Vec::new(), None, roster.clone(), &genesis_header)
                .unwrap();
            let header = DataHeader {
                trie_root: inclusion.root_hash().unwrap(),
                client_tx_hash: [1u8; 32],
                timestamp: 2,
            };
            let latest = SkipBlock::new(
                1,
                vec![genesis.hash],
                Some(genesis.hash),
                roster,
                &header,
            )
            .unwrap();
            Self {
                keys,
                genesis,
                latest,
                inclusion,
            }
        }

        fn links(&self) -> Vec<ForwardLink> {
            let roster = &self.genesis.roster;
            vec![
                ForwardLink::new(self.genesis.hash, self.genesis.hash, None),
                ForwardLink::new(self.genesis.hash, self.latest.hash, None)
                    .sign(roster, self.keys.iter().enumerate())
                    .unwrap(),
            ]
        }

        fn proof(&self) -> Proof {
            Proof::new(self.inclusion.clone(), self.latest.clone(), self.links())
        }
    }

    #[test]
    fn test_valid_proof_verifies() {
        let fx = Fixture::new("value");
        let proof = fx.proof();
        proof.verify(&fx.genesis.hash).unwrap();
        proof
            .verify_with_roster(&fx.genesis.hash, &fx.genesis.roster)
            .unwrap();
        let instance = proof.get_verified_instance(&fx.genesis.hash, "value").unwrap();
        assert_eq!(instance.id, InstanceId::new([9u8; 32]));
        assert_eq!(instance.data, b"42".to_vec());
    }

    #[test]
    fn test_wrong_genesis_rejected() {
        let fx = Fixture::new("value");
        assert_matches!(
            fx.proof().verify(&BlockId::new([5u8; 32])),
            Err(LedgerError::ProtocolViolation { .. })
        );
    }

    #[test]
    fn test_missing_links_rejected() {
        let fx = Fixture::new("value");
        let proof = Proof::new(fx.inclusion.clone(), fx.latest.clone(), Vec::new());
        assert_matches!(
            proof.verify(&fx.genesis.hash),
            Err(LedgerError::ProtocolViolation { .. })
        );
    }

    #[test]
    fn test_links_not_reaching_latest_rejected() {
        let fx = Fixture::new("value");
        let links = fx.links()[..1].to_vec();
        let proof = Proof::new(fx.inclusion.clone(), fx.latest.clone(), links);
        assert_matches!(
            proof.verify(&fx.genesis.hash),
            Err(LedgerError::ProtocolViolation { .. })
        );
    }

    #[test]
    fn test_unsigned_first_link_to_latest_rejected() {
        let fx = Fixture::new("value");
        let links = vec![ForwardLink::new(fx.genesis.hash, fx.latest.hash, None)];
        let proof = Proof::new(fx.inclusion.clone(), fx.latest.clone(), links);
        assert_matches!(
            proof.verify(&fx.genesis.hash),
            Err(LedgerError::ProtocolViolation { .. })
        );
    }

    #[test]
    fn test_trie_root_mismatch_rejected() {
        let fx = Fixture::new("value");
        let mut inclusion = fx.inclusion.clone();
        inclusion.interiors[0].left[0] ^= 0x01;
        let proof = Proof::new(inclusion, fx.latest.clone(), fx.links());
        assert_matches!(
            proof.verify(&fx.genesis.hash),
            Err(LedgerError::ProtocolViolation { .. })
        );
    }

    #[test]
    fn test_contract_mismatch() {
        let fx = Fixture::new("darc");
        assert_matches!(
            fx.proof().get_verified_instance(&fx.genesis.hash, "value"),
            Err(LedgerError::ContractMismatch { .. })
        );
    }

    #[test]
    fn test_state_body_memoized_and_skipped_in_equality() {
        let fx = Fixture::new("value");
        let proof = fx.proof();
        let first = proof.state_body().unwrap() as *const StateBody;
        let second = proof.state_body().unwrap() as *const StateBody;
        assert_eq!(first, second);
        assert_eq!(proof, fx.proof());
    }
}
