//! Signed skip chains for tests
//!
//! Each appended block is linked from its predecessor by a forward link
//! collectively signed by the full roster trusted at the predecessor. A
//! pending roster rotation is announced on the next link and takes effect
//! for every link after it.

use crate::keys::roster_from_keys;
use skiplight_core::{BlockId, Ed25519SigningKey, LedgerError, Result};
use skiplight_proof::{DataHeader, ForwardLink, InclusionProof, Proof, Roster, SkipBlock};

/// Chain of blocks with forward links, plus the server keys signing them
#[derive(Debug, Clone)]
pub struct SignedChain {
    keys: Vec<Ed25519SigningKey>,
    roster: Roster,
    blocks: Vec<SkipBlock>,
    links: Vec<ForwardLink>,
    pending: Option<(Roster, Vec<Ed25519SigningKey>)>,
}

impl SignedChain {
    /// Chain with a genesis block run by `keys`
    pub fn genesis(keys: Vec<Ed25519SigningKey>, header: &DataHeader) -> Result<Self> {
        let roster = roster_from_keys(&keys)?;
        Self::with_roster(roster, keys, header)
    }

    /// Chain with a genesis block run by an explicit roster
    ///
    /// `keys[i]` must be the signing key of roster member `i`.
    pub fn with_roster(
        roster: Roster,
        keys: Vec<Ed25519SigningKey>,
        header: &DataHeader,
    ) -> Result<Self> {
        check_keys(&roster, &keys)?;
        let genesis = SkipBlock::new(0, Vec::new(), None, roster.clone(), header)?;
        let self_link = ForwardLink::new(genesis.hash, genesis.hash, None)
            .sign(&roster, keys.iter().enumerate())?;
        Ok(Self {
            keys,
            roster,
            blocks: vec![genesis],
            links: vec![self_link],
            pending: None,
        })
    }

    /// Hand the chain to a new set of servers from the next block on
    pub fn rotate_roster(&mut self, keys: Vec<Ed25519SigningKey>) -> Result<()> {
        let roster = roster_from_keys(&keys)?;
        self.pending = Some((roster, keys));
        Ok(())
    }

    /// Append a block committing to `header`
    pub fn append(&mut self, header: &DataHeader) -> Result<&SkipBlock> {
        let (previous_index, previous_hash) = (self.latest().index, self.latest().hash);
        let genesis = self.chain_id();
        let (roster, rotation) = match self.pending.take() {
            Some((roster, keys)) => (roster.clone(), Some((roster, keys))),
            None => (self.roster.clone(), None),
        };
        let block = SkipBlock::new(
            previous_index + 1,
            vec![previous_hash],
            Some(genesis),
            roster,
            header,
        )?;
        let announced = rotation.as_ref().map(|(roster, _)| roster.clone());
        let link = ForwardLink::new(previous_hash, block.hash, announced)
            .sign(&self.roster, self.keys.iter().enumerate())?;

        if let Some((roster, keys)) = rotation {
            self.roster = roster;
            self.keys = keys;
        }
        self.links.push(link);
        self.blocks.push(block);
        Ok(self.latest())
    }

    /// Proof for `inclusion` against the latest block
    pub fn proof(&self, inclusion: InclusionProof) -> Proof {
        Proof::new(inclusion, self.latest().clone(), self.links.clone())
    }

    /// First block
    pub fn genesis_block(&self) -> &SkipBlock {
        &self.blocks[0]
    }

    /// Chain id
    pub fn chain_id(&self) -> BlockId {
        self.genesis_block().hash
    }

    /// Last block
    pub fn latest(&self) -> &SkipBlock {
        &self.blocks[self.blocks.len() - 1]
    }

    /// Every block, genesis first
    pub fn blocks(&self) -> &[SkipBlock] {
        &self.blocks
    }

    /// Genesis self-link followed by one link per appended block
    pub fn links(&self) -> &[ForwardLink] {
        &self.links
    }

    /// Block by id
    pub fn block(&self, id: &BlockId) -> Option<&SkipBlock> {
        self.blocks.iter().find(|block| block.hash == *id)
    }

    /// Roster trusted for the next link
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Keys of the roster trusted for the next link
    pub fn keys(&self) -> &[Ed25519SigningKey] {
        &self.keys
    }
}

fn check_keys(roster: &Roster, keys: &[Ed25519SigningKey]) -> Result<()> {
    let matches = roster.len() == keys.len()
        && keys
            .iter()
            .enumerate()
            .all(|(i, key)| roster.service_key(i) == Some(&key.verifying_key()));
    if !matches {
        return Err(LedgerError::argument(
            "signing keys do not match the roster's service keys",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::server_keys;

    fn header(n: u8) -> DataHeader {
        DataHeader {
            trie_root: [n; 32],
            client_tx_hash: [0u8; 32],
            timestamp: u64::from(n),
        }
    }

    #[test]
    fn test_links_connect_blocks() {
        let mut chain = SignedChain::genesis(server_keys("chain", 4), &header(0)).unwrap();
        chain.append(&header(1)).unwrap();
        chain.append(&header(2)).unwrap();
        assert_eq!(chain.blocks().len(), 3);
        assert_eq!(chain.links().len(), 3);
        for (link, pair) in chain.links()[1..].iter().zip(chain.blocks().windows(2)) {
            assert_eq!(link.from, pair[0].hash);
            assert_eq!(link.to, pair[1].hash);
        }
        assert_eq!(chain.latest().genesis, Some(chain.chain_id()));
    }

    #[test]
    fn test_rotation_announced_on_next_link() {
        let mut chain = SignedChain::genesis(server_keys("old", 4), &header(0)).unwrap();
        let old_roster = chain.roster().clone();
        chain.rotate_roster(server_keys("new", 3)).unwrap();
        chain.append(&header(1)).unwrap();
        let link = &chain.links()[1];
        assert!(link.new_roster.is_some());
        link.verify(&old_roster).unwrap();
        assert_eq!(chain.roster().len(), 3);
        assert_eq!(chain.latest().roster, *chain.roster());
    }

    #[test]
    fn test_mismatched_keys_rejected() {
        let roster = roster_from_keys(&server_keys("a", 3)).unwrap();
        assert!(SignedChain::with_roster(roster, server_keys("b", 3), &header(0)).is_err());
    }
}
