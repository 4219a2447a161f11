//! Ready-made chains and sessions
//!
//! [`LedgerFixture`] creates a chain on a fresh [`MockLedger`] and opens a
//! [`Ledger`] session on it, with an owner key that may spawn, update and
//! delete values, spawn Darcs and evolve the genesis Darc.

use crate::keys::{roster_from_keys, server_keys, KeyTestFixture};
use crate::mock_ledger::{MockLedger, UPDATE_COMMAND, VALUE_CONTRACT};
use skiplight_client::{CreateGenesisBlock, Ledger};
use skiplight_core::{ClientConfig, Result};
use skiplight_darc::{Darc, Expression, Identity, Rules, DARC_CONTRACT};
use skiplight_proof::Roster;

/// Block interval used by fixture chains
pub const FIXTURE_BLOCK_INTERVAL_MS: u64 = 100;

/// Servers in a fixture roster
pub const FIXTURE_SERVERS: usize = 4;

/// Genesis Darc granting `owner` every action the mock ledger understands
pub fn owner_darc(owner: &Identity) -> Result<Darc> {
    let mut rules = Rules::init(&[*owner], &[*owner])?;
    for action in [
        format!("spawn:{VALUE_CONTRACT}"),
        format!("invoke:{VALUE_CONTRACT}.{UPDATE_COMMAND}"),
        format!("delete:{VALUE_CONTRACT}"),
        format!("spawn:{DARC_CONTRACT}"),
    ] {
        rules.set_rule(&action, Expression::single(owner));
    }
    Ok(Darc::new(rules, b"genesis darc".to_vec()))
}

/// Genesis request for `roster` governed by `genesis_darc`
pub fn genesis_request(roster: Roster, genesis_darc: Darc) -> CreateGenesisBlock {
    CreateGenesisBlock {
        roster,
        genesis_darc,
        block_interval_ms: FIXTURE_BLOCK_INTERVAL_MS,
        max_block_size: 4 * 1024 * 1024,
    }
}

/// Mock chain plus a bootstrapped session and its owner
#[derive(Debug)]
pub struct LedgerFixture {
    /// Node handle, for switching failure modes and inspecting state
    pub mock: MockLedger,
    /// Session bound to the fixture chain
    pub ledger: Ledger<MockLedger>,
    /// Key named in every rule of the genesis Darc
    pub owner: KeyTestFixture,
}

impl LedgerFixture {
    /// Fixture with default client settings
    pub async fn new(label: &str) -> Result<Self> {
        Self::with_config(label, ClientConfig::default()).await
    }

    /// Fixture with explicit client settings
    pub async fn with_config(label: &str, config: ClientConfig) -> Result<Self> {
        let owner = KeyTestFixture::from_label(&format!("{label}/owner"));
        let keys = server_keys(label, FIXTURE_SERVERS);
        let roster = roster_from_keys(&keys)?;
        let mock = MockLedger::new(keys);
        let request = genesis_request(roster, owner_darc(&owner.identity())?);
        let ledger = Ledger::create_genesis(mock.clone(), request, config).await?;
        Ok(Self {
            mock,
            ledger,
            owner,
        })
    }
}
