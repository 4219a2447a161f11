//! Skiplight Tx - building and signing client transactions
//!
//! Instructions are hashed in a fixed canonical layout, bundled into a
//! transaction whose combined hash every signer signs, and stamped with
//! replay counters fetched once per transaction.

#![forbid(unsafe_code)]

/// Instructions and canonical hashing
pub mod instruction;

/// Transactions and signing
pub mod transaction;

/// Replay-counter coordination
pub mod counters;

pub use counters::{unique_identities, CounterCoordinator, CounterSource};
pub use instruction::{Argument, Instruction, InstructionKind};
pub use transaction::{ClientTransaction, SignerGroup};
