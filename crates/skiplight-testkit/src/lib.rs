//! Skiplight Testing Infrastructure
//!
//! Deterministic keys, an in-memory trie and signed chain, and a mock ledger
//! node that speaks the client's [`Connection`](skiplight_client::Connection)
//! protocol. Integration tests for the whole client live in this crate's
//! `tests/` directory.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod chain;
pub mod fixtures;
pub mod keys;
pub mod logging;
pub mod mock_ledger;
pub mod trie;

pub use chain::SignedChain;
pub use fixtures::{
    genesis_request, owner_darc, LedgerFixture, FIXTURE_BLOCK_INTERVAL_MS, FIXTURE_SERVERS,
};
pub use keys::{roster_from_keys, server_keys, KeyTestFixture};
pub use logging::init_test_tracing;
pub use mock_ledger::{
    MockLedger, NODE_DELEGATION_DEPTH, UPDATE_COMMAND, VALUE_ARGUMENT, VALUE_CONTRACT,
};
pub use trie::MemoryTrie;
