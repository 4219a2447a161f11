//! Instructions and their canonical hash
//!
//! The hash is what signers commit to and what instance ids are derived
//! from, so its layout is fixed byte for byte:
//!
//! ```text
//! instance_id || type_tag || contract_kind || [command, invoke only]
//!   || for each argument: u64le(len(name)) || name || u64le(len(value)) || value
//!   || for each counter: u64le(counter)
//!   || for each identity: u64le(len(bytes)) || bytes
//! ```
//!
//! Order matters everywhere; nothing is sorted.

use serde::{Deserialize, Serialize};
use skiplight_core::{hash, InstanceId, LedgerError, Result};
use skiplight_darc::{Identity, IdentityCapability};

/// Named argument passed to a contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    /// Argument name
    pub name: String,
    /// Raw argument value
    pub value: Vec<u8>,
}

impl Argument {
    /// Argument `name = value`
    pub fn new(name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// What an instruction does to its target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstructionKind {
    /// Create a new instance of `contract_kind`
    Spawn {
        /// Contract to instantiate
        contract_kind: String,
    },
    /// Run `command` on an existing instance
    Invoke {
        /// Contract of the target instance
        contract_kind: String,
        /// Contract command
        command: String,
    },
    /// Remove an instance
    Delete {
        /// Contract of the target instance
        contract_kind: String,
    },
}

impl InstructionKind {
    /// Tag byte in the canonical hash
    pub fn type_tag(&self) -> u8 {
        match self {
            Self::Spawn { .. } => 0,
            Self::Invoke { .. } => 1,
            Self::Delete { .. } => 2,
        }
    }

    /// Contract the instruction addresses
    pub fn contract_kind(&self) -> &str {
        match self {
            Self::Spawn { contract_kind }
            | Self::Invoke { contract_kind, .. }
            | Self::Delete { contract_kind } => contract_kind,
        }
    }

    /// Darc action authorizing this instruction, e.g. `invoke:value.update`
    pub fn action(&self) -> String {
        match self {
            Self::Spawn { contract_kind } => format!("spawn:{contract_kind}"),
            Self::Invoke {
                contract_kind,
                command,
            } => format!("invoke:{contract_kind}.{command}"),
            Self::Delete { contract_kind } => format!("delete:{contract_kind}"),
        }
    }
}

/// One step of a client transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// Target instance; for spawn, the instance whose Darc authorizes it
    pub instance_id: InstanceId,
    /// Operation and contract
    pub kind: InstructionKind,
    /// Ordered arguments
    pub args: Vec<Argument>,
    /// Identities that will sign, in order
    pub signer_identities: Vec<Identity>,
    /// Replay counter of each identity, same order
    pub signer_counters: Vec<u64>,
    /// Signature of each identity over the transaction hash
    pub signatures: Vec<Vec<u8>>,
}

impl Instruction {
    fn with_kind(instance_id: InstanceId, kind: InstructionKind, args: Vec<Argument>) -> Self {
        Self {
            instance_id,
            kind,
            args,
            signer_identities: Vec::new(),
            signer_counters: Vec::new(),
            signatures: Vec::new(),
        }
    }

    /// Spawn a `contract_kind` instance authorized by `instance_id`'s Darc
    pub fn spawn(
        instance_id: InstanceId,
        contract_kind: impl Into<String>,
        args: Vec<Argument>,
    ) -> Self {
        Self::with_kind(
            instance_id,
            InstructionKind::Spawn {
                contract_kind: contract_kind.into(),
            },
            args,
        )
    }

    /// Invoke `command` on `instance_id`
    pub fn invoke(
        instance_id: InstanceId,
        contract_kind: impl Into<String>,
        command: impl Into<String>,
        args: Vec<Argument>,
    ) -> Self {
        Self::with_kind(
            instance_id,
            InstructionKind::Invoke {
                contract_kind: contract_kind.into(),
                command: command.into(),
            },
            args,
        )
    }

    /// Delete `instance_id`
    pub fn delete(instance_id: InstanceId, contract_kind: impl Into<String>) -> Self {
        Self::with_kind(
            instance_id,
            InstructionKind::Delete {
                contract_kind: contract_kind.into(),
            },
            Vec::new(),
        )
    }

    /// Value of the first argument called `name`
    pub fn argument(&self, name: &str) -> Option<&[u8]> {
        self.args
            .iter()
            .find(|arg| arg.name == name)
            .map(|arg| arg.value.as_slice())
    }

    /// Set signer identities and their counters
    pub fn set_signers(&mut self, identities: Vec<Identity>, counters: Vec<u64>) -> Result<()> {
        if identities.len() != counters.len() {
            return Err(LedgerError::argument(format!(
                "{} signer identities but {} counters",
                identities.len(),
                counters.len()
            )));
        }
        self.signer_identities = identities;
        self.signer_counters = counters;
        self.signatures.clear();
        Ok(())
    }

    /// Canonical hash; excludes signatures
    pub fn hash(&self) -> [u8; 32] {
        let mut h = hash::hasher();
        h.update(self.instance_id.as_bytes());
        h.update(&[self.kind.type_tag()]);
        h.update(self.kind.contract_kind().as_bytes());
        if let InstructionKind::Invoke { command, .. } = &self.kind {
            h.update(command.as_bytes());
        }
        for arg in &self.args {
            h.update_len_prefixed(arg.name.as_bytes());
            h.update_len_prefixed(&arg.value);
        }
        for counter in &self.signer_counters {
            h.update_u64_le(*counter);
        }
        for identity in &self.signer_identities {
            h.update_len_prefixed(&identity.to_bytes());
        }
        h.finalize()
    }

    /// Id of an instance created by this instruction
    ///
    /// Commits to the hash and the signatures, so it is only meaningful once
    /// the instruction is signed. Different discriminants give independent
    /// ids for instructions that create more than one instance.
    pub fn derive_id(&self, discriminant: &str) -> InstanceId {
        let mut h = hash::hasher();
        h.update(&self.hash());
        h.update_u32_le(self.signatures.len() as u32);
        for signature in &self.signatures {
            h.update_u32_le(signature.len() as u32);
            h.update(signature);
        }
        h.update(discriminant.as_bytes());
        InstanceId::new(h.finalize())
    }
}
