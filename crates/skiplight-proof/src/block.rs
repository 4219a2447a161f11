//! Skip blocks and their payload header

use crate::roster::Roster;
use serde::{Deserialize, Serialize};
use skiplight_core::{hash, serialization, BlockId, LedgerError, Result};

/// Decoded block payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataHeader {
    /// Root hash of the global-state trie after this block
    pub trie_root: [u8; 32],
    /// Hash of the transactions applied in this block
    pub client_tx_hash: [u8; 32],
    /// Block time in milliseconds since the Unix epoch
    pub timestamp: u64,
}

impl DataHeader {
    /// Canonical encoding carried in [`SkipBlock::data`]
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serialization::to_vec(self)
    }

    /// Decode a block payload
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serialization::from_slice(bytes)
            .map_err(|e| LedgerError::protocol(format!("undecodable block header: {e}")))
    }
}

/// One block of the skip chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipBlock {
    /// Position in the chain, 0 for genesis
    pub index: u64,
    /// Number of backlink levels
    pub height: u32,
    /// Ids of earlier blocks this one links back to
    pub backlinks: Vec<BlockId>,
    /// Genesis id; `None` on the genesis block itself
    pub genesis: Option<BlockId>,
    /// Servers responsible for this block
    pub roster: Roster,
    /// Encoded [`DataHeader`]
    pub data: Vec<u8>,
    /// Stored hash; must equal [`SkipBlock::compute_hash`]
    pub hash: BlockId,
}

impl SkipBlock {
    /// Build a block and seal its hash
    pub fn new(
        index: u64,
        backlinks: Vec<BlockId>,
        genesis: Option<BlockId>,
        roster: Roster,
        header: &DataHeader,
    ) -> Result<Self> {
        let mut block = Self {
            index,
            height: 1,
            backlinks,
            genesis,
            roster,
            data: header.to_bytes()?,
            hash: BlockId::default(),
        };
        block.hash = block.compute_hash();
        Ok(block)
    }

    /// Hash over every field except the stored hash
    pub fn compute_hash(&self) -> BlockId {
        let mut h = hash::hasher();
        h.update_u64_le(self.index);
        h.update_u32_le(self.height);
        for backlink in &self.backlinks {
            h.update(backlink.as_bytes());
        }
        if let Some(genesis) = &self.genesis {
            h.update(genesis.as_bytes());
        }
        h.update_len_prefixed(&self.data);
        h.update(&self.roster.id());
        BlockId::new(h.finalize())
    }

    /// Check the stored hash against the recomputed one
    pub fn verify_hash(&self) -> Result<()> {
        let computed = self.compute_hash();
        if computed != self.hash {
            return Err(LedgerError::protocol(format!(
                "block {} stores hash {} but hashes to {computed}",
                self.index, self.hash
            )));
        }
        Ok(())
    }

    /// Decode the payload header
    pub fn header(&self) -> Result<DataHeader> {
        DataHeader::from_bytes(&self.data)
    }

    /// Id of the chain this block belongs to
    pub fn chain_id(&self) -> BlockId {
        self.genesis.unwrap_or(self.hash)
    }

    /// Whether this is the first block of its chain
    pub fn is_genesis(&self) -> bool {
        self.genesis.is_none()
    }
}
