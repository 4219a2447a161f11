//! Instances: decoded objects of global state

use crate::proof::Proof;
use serde::{Deserialize, Serialize};
use skiplight_core::{serialization, DarcId, InstanceId, LedgerError, Result};

/// Leaf value stored under an instance id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateBody {
    /// Contract that owns the instance
    pub contract_kind: String,
    /// Contract-specific payload
    pub value: Vec<u8>,
    /// Number of updates applied since the instance was spawned
    pub version: u64,
    /// Base id of the Darc governing the instance
    pub darc_id: DarcId,
}

impl StateBody {
    /// Canonical encoding stored in the trie
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serialization::to_vec(self)
    }

    /// Decode a trie leaf value
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serialization::from_slice(bytes)
    }
}

/// Value bound to an instance id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Trie key
    pub id: InstanceId,
    /// Contract that owns the instance
    pub contract_kind: String,
    /// Governing Darc
    pub darc_id: DarcId,
    /// Contract payload
    pub data: Vec<u8>,
    /// Update count
    pub version: u64,
}

impl Instance {
    /// Instance from explicit fields
    pub fn new(
        id: InstanceId,
        contract_kind: impl Into<String>,
        darc_id: DarcId,
        data: Vec<u8>,
    ) -> Self {
        Self {
            id,
            contract_kind: contract_kind.into(),
            darc_id,
            data,
            version: 0,
        }
    }

    /// Instance carried by a proof's terminal leaf
    ///
    /// Does not verify the proof.
    pub fn from_proof(proof: &Proof) -> Result<Self> {
        let key = proof
            .key()
            .ok_or_else(|| LedgerError::not_found("proof carries no leaf"))?;
        let body = proof.state_body()?;
        Ok(Self {
            id: InstanceId::from_slice(key)?,
            contract_kind: body.contract_kind.clone(),
            darc_id: body.darc_id,
            data: body.value.clone(),
            version: body.version,
        })
    }
}
