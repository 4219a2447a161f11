//! Chain configuration stored in the configuration instance

use serde::{Deserialize, Serialize};
use skiplight_core::{serialization, LedgerError, Result};
use skiplight_proof::Roster;
use std::time::Duration;

/// Contract kind of the configuration instance
pub const CONFIG_CONTRACT: &str = "config";

/// Chain-wide parameters decoded from the configuration instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Servers currently running the chain
    pub roster: Roster,
    /// Target time between blocks
    pub block_interval_ms: u64,
    /// Largest block payload
    pub max_block_size: u64,
}

impl ChainConfig {
    /// Canonical encoding stored in the configuration instance
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serialization::to_vec(self)
    }

    /// Decode and sanity-check the configuration instance value
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let config: Self = serialization::from_slice(bytes)?;
        if config.block_interval_ms == 0 {
            return Err(LedgerError::protocol("chain config has zero block interval"));
        }
        Ok(config)
    }

    /// Target time between blocks
    pub fn block_interval(&self) -> Duration {
        Duration::from_millis(self.block_interval_ms)
    }

    /// Local deadline for a submission waiting `wait_blocks` blocks
    pub fn inclusion_deadline(&self, wait_blocks: u32, grace: Duration) -> Duration {
        self.block_interval() * (wait_blocks.saturating_add(1)) + grace
    }
}
