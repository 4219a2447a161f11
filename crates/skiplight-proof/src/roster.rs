//! Server rosters
//!
//! A roster is the ordered set of servers whose collective signature attests
//! a forward link. Position in the roster is significant: it is the bit index
//! used in a collective signature's participation mask.

use serde::{Deserialize, Serialize};
use skiplight_core::{hash, Ed25519VerifyingKey, LedgerError, Result};

/// One server: where it lives and the key it attests with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerIdentity {
    /// Network address, opaque to the client
    pub address: String,
    /// Key used for forward-link signatures
    pub service_key: Ed25519VerifyingKey,
}

impl ServerIdentity {
    /// Server at `address` attesting with `service_key`
    pub fn new(address: impl Into<String>, service_key: Ed25519VerifyingKey) -> Self {
        Self {
            address: address.into(),
            service_key,
        }
    }
}

/// Ordered, non-empty list of servers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    servers: Vec<ServerIdentity>,
}

impl Roster {
    /// Roster from servers in signing order
    pub fn new(servers: Vec<ServerIdentity>) -> Result<Self> {
        if servers.is_empty() {
            return Err(LedgerError::argument("roster needs at least one server"));
        }
        Ok(Self { servers })
    }

    /// Content hash binding addresses and keys in order
    pub fn id(&self) -> [u8; 32] {
        let mut h = hash::hasher();
        for server in &self.servers {
            h.update_len_prefixed(server.address.as_bytes());
            h.update(server.service_key.as_bytes());
        }
        h.finalize()
    }

    /// Servers in signing order
    pub fn servers(&self) -> &[ServerIdentity] {
        &self.servers
    }

    /// Service key of the server at `index`
    pub fn service_key(&self, index: usize) -> Option<&Ed25519VerifyingKey> {
        self.servers.get(index).map(|server| &server.service_key)
    }

    /// Number of servers
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Always false for a constructed roster
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Minimum number of participants for a valid collective signature
    pub fn quorum(&self) -> usize {
        let n = self.servers.len();
        n - n.saturating_sub(1) / 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skiplight_core::signing_key_from_seed;

    fn roster(n: u8) -> Roster {
        Roster::new(
            (0..n)
                .map(|i| {
                    ServerIdentity::new(
                        format!("tcp://node{i}:7770"),
                        signing_key_from_seed(&[i + 1; 32]).verifying_key(),
                    )
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_quorum_threshold() {
        assert_eq!(roster(1).quorum(), 1);
        assert_eq!(roster(3).quorum(), 3);
        assert_eq!(roster(4).quorum(), 3);
        assert_eq!(roster(7).quorum(), 5);
    }

    #[test]
    fn test_id_depends_on_order() {
        let a = roster(3);
        let mut reversed = a.servers().to_vec();
        reversed.reverse();
        let b = Roster::new(reversed).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), roster(3).id());
    }

    #[test]
    fn test_empty_roster_rejected() {
        assert!(Roster::new(Vec::new()).is_err());
    }
}
