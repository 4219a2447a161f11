//! Request and response messages exchanged with a ledger node

use serde::{Deserialize, Serialize};
use skiplight_core::{BlockId, InstanceId, LedgerError, Result};
use skiplight_darc::{Darc, Identity};
use skiplight_proof::{Proof, Roster, SkipBlock};
use skiplight_tx::ClientTransaction;
use std::fmt;

/// Create a new chain with its genesis Darc and configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGenesisBlock {
    /// Servers of the new chain
    pub roster: Roster,
    /// Darc governing the configuration instance
    pub genesis_darc: Darc,
    /// Target time between blocks
    pub block_interval_ms: u64,
    /// Largest block payload the chain accepts
    pub max_block_size: u64,
}

/// Submit a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddTxRequest {
    /// Signed transaction
    pub transaction: ClientTransaction,
    /// Chain to apply it to
    pub chain_id: BlockId,
    /// Blocks to wait for inclusion; 0 returns once queued
    pub wait_blocks: u32,
}

/// Ask for a proof of one key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetProof {
    /// Chain to query
    pub chain_id: BlockId,
    /// Instance key
    pub key: InstanceId,
}

/// Ask for the last accepted counters of some identities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetSignerCounters {
    /// Identities, in the order counters are wanted
    pub identities: Vec<Identity>,
    /// Chain to query
    pub chain_id: BlockId,
}

/// Ask for a block by id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetBlock {
    /// Block id
    pub id: BlockId,
}

/// Every request a ledger node answers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerRequest {
    /// Chain creation
    CreateGenesisBlock(CreateGenesisBlock),
    /// Transaction submission
    AddTx(AddTxRequest),
    /// Proof query
    GetProof(GetProof),
    /// Counter query
    GetSignerCounters(GetSignerCounters),
    /// Block query
    GetBlock(GetBlock),
}

impl LedgerRequest {
    /// Response kind this request must be answered with
    pub fn expected_kind(&self) -> ResponseKind {
        match self {
            Self::CreateGenesisBlock(_) => ResponseKind::CreateGenesisBlock,
            Self::AddTx(_) => ResponseKind::AddTx,
            Self::GetProof(_) => ResponseKind::GetProof,
            Self::GetSignerCounters(_) => ResponseKind::GetSignerCounters,
            Self::GetBlock(_) => ResponseKind::GetBlock,
        }
    }
}

/// Why a node refused a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// A signer counter was stale or reused
    Replay,
    /// Anything else: bad signature, unauthorized, contract failure
    Invalid,
}

/// Verdict on a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxOutcome {
    /// Included in a block
    Accepted,
    /// Refused by the ledger
    Rejected {
        /// Category
        reason: RejectReason,
        /// Node's explanation
        message: String,
    },
    /// No verdict within the requested blocks
    TimedOut,
}

/// Answer to [`CreateGenesisBlock`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGenesisBlockResponse {
    /// The new chain's first block; its hash is the chain id
    pub genesis: SkipBlock,
}

/// Answer to [`AddTxRequest`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddTxResponse {
    /// Verdict
    pub outcome: TxOutcome,
}

/// Answer to [`GetProof`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetProofResponse {
    /// Unverified proof
    pub proof: Proof,
}

/// Answer to [`GetSignerCounters`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetSignerCountersResponse {
    /// Last accepted counter per requested identity
    pub counters: Vec<u64>,
}

/// Answer to [`GetBlock`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetBlockResponse {
    /// Requested block
    pub block: SkipBlock,
}

/// Every response a ledger node sends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerResponse {
    /// Chain created
    CreateGenesisBlock(CreateGenesisBlockResponse),
    /// Transaction verdict
    AddTx(AddTxResponse),
    /// Proof
    GetProof(GetProofResponse),
    /// Counters
    GetSignerCounters(GetSignerCountersResponse),
    /// Block
    GetBlock(GetBlockResponse),
}

/// Discriminant of [`LedgerResponse`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseKind {
    /// [`CreateGenesisBlockResponse`]
    CreateGenesisBlock,
    /// [`AddTxResponse`]
    AddTx,
    /// [`GetProofResponse`]
    GetProof,
    /// [`GetSignerCountersResponse`]
    GetSignerCounters,
    /// [`GetBlockResponse`]
    GetBlock,
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CreateGenesisBlock => "CreateGenesisBlockResponse",
            Self::AddTx => "AddTxResponse",
            Self::GetProof => "GetProofResponse",
            Self::GetSignerCounters => "GetSignerCountersResponse",
            Self::GetBlock => "GetBlockResponse",
        };
        f.write_str(name)
    }
}

fn wrong_kind(expected: ResponseKind, actual: ResponseKind) -> LedgerError {
    LedgerError::protocol(format!("expected {expected}, received {actual}"))
}

impl LedgerResponse {
    /// Which response this is
    pub fn kind(&self) -> ResponseKind {
        match self {
            Self::CreateGenesisBlock(_) => ResponseKind::CreateGenesisBlock,
            Self::AddTx(_) => ResponseKind::AddTx,
            Self::GetProof(_) => ResponseKind::GetProof,
            Self::GetSignerCounters(_) => ResponseKind::GetSignerCounters,
            Self::GetBlock(_) => ResponseKind::GetBlock,
        }
    }

    /// Unwrap a genesis response
    pub fn into_create_genesis(self) -> Result<CreateGenesisBlockResponse> {
        match self {
            Self::CreateGenesisBlock(response) => Ok(response),
            other => Err(wrong_kind(ResponseKind::CreateGenesisBlock, other.kind())),
        }
    }

    /// Unwrap a transaction verdict
    pub fn into_add_tx(self) -> Result<AddTxResponse> {
        match self {
            Self::AddTx(response) => Ok(response),
            other => Err(wrong_kind(ResponseKind::AddTx, other.kind())),
        }
    }

    /// Unwrap a proof
    pub fn into_get_proof(self) -> Result<GetProofResponse> {
        match self {
            Self::GetProof(response) => Ok(response),
            other => Err(wrong_kind(ResponseKind::GetProof, other.kind())),
        }
    }

    /// Unwrap counters
    pub fn into_signer_counters(self) -> Result<GetSignerCountersResponse> {
        match self {
            Self::GetSignerCounters(response) => Ok(response),
            other => Err(wrong_kind(ResponseKind::GetSignerCounters, other.kind())),
        }
    }

    /// Unwrap a block
    pub fn into_get_block(self) -> Result<GetBlockResponse> {
        match self {
            Self::GetBlock(response) => Ok(response),
            other => Err(wrong_kind(ResponseKind::GetBlock, other.kind())),
        }
    }
}
