//! Skiplight Client - session orchestration against a ledger node
//!
//! [`Ledger`] is the entry point: it bootstraps trust from a chain id,
//! caches the chain configuration and genesis Darc, assigns replay counters,
//! signs and submits transactions, and fetches proofs. Transport is
//! abstracted by [`Connection`].

#![forbid(unsafe_code)]

/// Wire messages
pub mod messages;

/// Transport seam
pub mod connection;

/// Chain configuration instance
pub mod chain_config;

/// Session object
pub mod ledger;

pub use chain_config::{ChainConfig, CONFIG_CONTRACT};
pub use connection::{send_checked, Connection};
pub use ledger::{Ledger, DARC_ARGUMENT, EVOLVE_COMMAND};
pub use messages::{
    AddTxRequest, AddTxResponse, CreateGenesisBlock, CreateGenesisBlockResponse, GetBlock,
    GetBlockResponse, GetProof, GetProofResponse, GetSignerCounters, GetSignerCountersResponse,
    LedgerRequest, LedgerResponse, RejectReason, ResponseKind, TxOutcome,
};
