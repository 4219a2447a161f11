//! Skiplight Proof - verifying what an untrusted node serves
//!
//! Everything here is pure and synchronous: block hashing, roster quorum
//! checks, collective-signature verification over forward links, and the
//! binary-trie walk that decides whether a key is present in global state.

#![forbid(unsafe_code)]

/// Server rosters
pub mod roster;

/// Skip blocks
pub mod block;

/// Forward links and collective signatures
pub mod forward_link;

/// Trie inclusion paths
pub mod trie;

/// Proven instances
pub mod instance;

/// Chain-anchored proofs
pub mod proof;

pub use block::{DataHeader, SkipBlock};
pub use forward_link::{CollectiveSignature, ForwardLink};
pub use instance::{Instance, StateBody};
pub use proof::Proof;
pub use roster::{Roster, ServerIdentity};
pub use trie::{key_bits, pack_bits, EmptyNode, InclusionProof, InteriorNode, LeafNode};
