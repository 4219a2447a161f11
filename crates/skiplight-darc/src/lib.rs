//! Skiplight Darc - identities and access control
//!
//! Identities name who may act: either a direct Ed25519 key or a reference
//! to another Darc. A Darc is a versioned list of rules mapping an action to
//! a flat boolean expression over identities. Delegated references are
//! followed by [`DelegationResolver`] through a [`DarcProvider`], with a
//! bounded number of hops and cycle detection.

#![forbid(unsafe_code)]

/// Direct and delegated identities
pub mod identity;

/// Signing identities
pub mod signer;

/// Rule expressions
pub mod expression;

/// Darcs and their rules
pub mod darc;

/// Delegation traversal
pub mod resolver;

/// Evolution approval checks
pub mod evolution;

pub use darc::{Darc, Rule, Rules, DARC_CONTRACT, EVOLVE_ACTION, SIGN_ACTION};
pub use evolution::{verify_evolution, EvolutionApproval};
pub use expression::{Expression, Operator, ParsedExpression};
pub use identity::{DarcIdentity, Ed25519Identity, Identity, IdentityCapability};
pub use resolver::{DarcProvider, DelegationResolver};
pub use signer::{Ed25519Signer, Signer};
