//! Unified error system for the ledger client
//!
//! A single error enum covers every failure the client can surface. The
//! variants mirror how a caller is expected to react: protocol violations are
//! fatal to trust in the evidence at hand, network failures and inclusion
//! timeouts may be retried at a higher layer, everything else is a caller or
//! state problem that needs a fresh decision.

use serde::{Deserialize, Serialize};

/// Unified error type for all ledger client operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum LedgerError {
    /// Proof, hash chain, signature or trie inconsistency
    #[error("Protocol violation: {message}")]
    ProtocolViolation {
        /// Which check failed
        message: String,
    },

    /// Decoded contract kind differs from the one the caller expected
    #[error("Contract mismatch: expected {expected}, got {actual}")]
    ContractMismatch {
        /// Contract kind the caller asked for
        expected: String,
        /// Contract kind found in the proven state
        actual: String,
    },

    /// Ledger refused a stale or reused signer counter
    #[error("Replay rejected: {message}")]
    ReplayRejected {
        /// Reason reported by the ledger
        message: String,
    },

    /// Ledger refused the transaction for any other reason
    #[error("Transaction rejected: {message}")]
    TransactionRejected {
        /// Reason reported by the ledger
        message: String,
    },

    /// No inclusion verdict within the wait budget
    #[error("Transaction not included within {wait_blocks} blocks")]
    InclusionTimeout {
        /// Number of blocks the caller was willing to wait
        wait_blocks: u32,
    },

    /// No reachable endpoint or transport failure
    #[error("Network error: {message}")]
    Network {
        /// Transport failure description
        message: String,
    },

    /// Caller supplied inconsistent or malformed input
    #[error("Invalid argument: {message}")]
    Argument {
        /// What was wrong with the input
        message: String,
    },

    /// Delegation walk exceeded its depth bound or found a cycle
    #[error("Delegation error: {message}")]
    Delegation {
        /// Which bound was hit
        message: String,
    },

    /// Cached state no longer matches the ledger's copy
    #[error("Stale state: {message}")]
    StaleState {
        /// Which version drifted
        message: String,
    },

    /// Requested object is absent from global state
    #[error("Not found: {message}")]
    NotFound {
        /// What was looked up
        message: String,
    },

    /// Encoding or decoding failed
    #[error("Serialization error: {message}")]
    Serialization {
        /// Codec failure description
        message: String,
    },

    /// Client configuration is unusable
    #[error("Configuration error: {message}")]
    Config {
        /// Validation failures
        message: String,
    },
}

impl LedgerError {
    /// Create a protocol violation error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            message: message.into(),
        }
    }

    /// Create a contract mismatch error
    pub fn contract_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::ContractMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a replay rejection error
    pub fn replay(message: impl Into<String>) -> Self {
        Self::ReplayRejected {
            message: message.into(),
        }
    }

    /// Create a generic transaction rejection error
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::TransactionRejected {
            message: message.into(),
        }
    }

    /// Create an inclusion timeout error
    pub fn inclusion_timeout(wait_blocks: u32) -> Self {
        Self::InclusionTimeout { wait_blocks }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create an argument error
    pub fn argument(message: impl Into<String>) -> Self {
        Self::Argument {
            message: message.into(),
        }
    }

    /// Create a delegation error
    pub fn delegation(message: impl Into<String>) -> Self {
        Self::Delegation {
            message: message.into(),
        }
    }

    /// Create a stale state error
    pub fn stale(message: impl Into<String>) -> Self {
        Self::StaleState {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether a higher layer may retry the operation that produced this error.
    ///
    /// Only transport failures and inclusion timeouts qualify. Retrying a
    /// timed-out submission means building and signing a new transaction with
    /// fresh counters, never resending the old one.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::InclusionTimeout { .. })
    }
}

/// Standard Result type for ledger client operations
pub type Result<T> = std::result::Result<T, LedgerError>;

impl From<bincode::Error> for LedgerError {
    fn from(err: bincode::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(err.to_string()),
            _ => Self::config(err.to_string()),
        }
    }
}
