//! Client transactions: ordered instructions under one combined hash

use crate::instruction::Instruction;
use serde::{Deserialize, Serialize};
use skiplight_core::{hash, LedgerError, Result};
use skiplight_darc::{Identity, IdentityCapability, Signer};
use tracing::debug;

/// Signers of one instruction, in the instruction's identity order
pub type SignerGroup<'a> = Vec<&'a dyn Signer>;

/// Ordered, non-empty list of instructions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientTransaction {
    instructions: Vec<Instruction>,
}

impl ClientTransaction {
    /// Transaction over `instructions`
    pub fn new(instructions: Vec<Instruction>) -> Result<Self> {
        if instructions.is_empty() {
            return Err(LedgerError::argument(
                "transaction needs at least one instruction",
            ));
        }
        Ok(Self { instructions })
    }

    /// Instructions in order
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Mutable instructions, for assigning counters and signatures
    pub fn instructions_mut(&mut self) -> &mut [Instruction] {
        &mut self.instructions
    }

    /// Number of instructions
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Always false for a constructed transaction
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// `sha256(hash(i0) || hash(i1) || ...)`, what every signer signs
    pub fn hash(&self) -> [u8; 32] {
        let mut h = hash::hasher();
        for instruction in &self.instructions {
            h.update(&instruction.hash());
        }
        h.finalize()
    }

    /// Identities each instruction expects to be signed by
    pub fn signer_groups(&self) -> Vec<Vec<Identity>> {
        self.instructions
            .iter()
            .map(|instruction| instruction.signer_identities.clone())
            .collect()
    }

    /// Sign every instruction over the combined hash
    ///
    /// `groups[i]` must list exactly the identities already set on
    /// instruction `i`, in the same order.
    pub fn sign_with(&mut self, groups: &[SignerGroup<'_>]) -> Result<()> {
        if groups.len() != self.instructions.len() {
            return Err(LedgerError::argument(format!(
                "{} signer groups for {} instructions",
                groups.len(),
                self.instructions.len()
            )));
        }
        for (index, (instruction, group)) in self.instructions.iter().zip(groups).enumerate() {
            let identities: Vec<Identity> = group.iter().map(|signer| signer.identity()).collect();
            if identities != instruction.signer_identities {
                return Err(LedgerError::argument(format!(
                    "signers of instruction {index} do not match its identities"
                )));
            }
        }

        let digest = self.hash();
        for (instruction, group) in self.instructions.iter_mut().zip(groups) {
            instruction.signatures = group
                .iter()
                .map(|signer| signer.sign(&digest))
                .collect::<Result<_>>()?;
        }
        debug!(instructions = self.instructions.len(), "transaction signed");
        Ok(())
    }

    /// Check every direct-key signature against the combined hash
    ///
    /// Delegated identities cannot sign and are rejected here.
    pub fn verify_signatures(&self) -> Result<()> {
        let digest = self.hash();
        for (index, instruction) in self.instructions.iter().enumerate() {
            if instruction.signatures.len() != instruction.signer_identities.len() {
                return Err(LedgerError::protocol(format!(
                    "instruction {index} has {} signatures for {} identities",
                    instruction.signatures.len(),
                    instruction.signer_identities.len()
                )));
            }
            for (identity, signature) in instruction
                .signer_identities
                .iter()
                .zip(&instruction.signatures)
            {
                if !identity.verify(&digest, signature) {
                    return Err(LedgerError::protocol(format!(
                        "instruction {index}: bad signature from {identity}"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Argument;
    use assert_matches::assert_matches;
    use skiplight_core::InstanceId;
    use skiplight_darc::Ed25519Signer;

    fn signed_pair() -> (ClientTransaction, Ed25519Signer, Ed25519Signer) {
        let a = Ed25519Signer::from_seed(&[1u8; 32]);
        let b = Ed25519Signer::from_seed(&[2u8; 32]);
        let mut first = Instruction::spawn(InstanceId::new([1u8; 32]), "value", Vec::new());
        first.set_signers(vec![a.identity()], vec![1]).unwrap();
        let mut second = Instruction::invoke(
            InstanceId::new([2u8; 32]),
            "value",
            "update",
            vec![Argument::new("value", b"9".to_vec())],
        );
        second.set_signers(vec![b.identity()], vec![4]).unwrap();
        let tx = ClientTransaction::new(vec![first, second]).unwrap();
        (tx, a, b)
    }

    #[test]
    fn test_sign_and_verify() {
        let (mut tx, a, b) = signed_pair();
        tx.sign_with(&[vec![&a as &dyn Signer], vec![&b as &dyn Signer]])
            .unwrap();
        tx.verify_signatures().unwrap();
        assert_eq!(tx.instructions()[0].signatures.len(), 1);
    }

    #[test]
    fn test_group_count_must_match() {
        let (mut tx, a, _) = signed_pair();
        assert_matches!(
            tx.sign_with(&[vec![&a as &dyn Signer]]),
            Err(LedgerError::Argument { .. })
        );
    }

    #[test]
    fn test_group_identities_must_match() {
        let (mut tx, a, b) = signed_pair();
        assert_matches!(
            tx.sign_with(&[vec![&b as &dyn Signer], vec![&a as &dyn Signer]]),
            Err(LedgerError::Argument { .. })
        );
    }

    #[test]
    fn test_tampering_after_signing_detected() {
        let (mut tx, a, b) = signed_pair();
        tx.sign_with(&[vec![&a as &dyn Signer], vec![&b as &dyn Signer]])
            .unwrap();
        tx.instructions_mut()[1].args[0].value = b"10".to_vec();
        assert_matches!(
            tx.verify_signatures(),
            Err(LedgerError::ProtocolViolation { .. })
        );
    }

    #[test]
    fn test_instruction_order_changes_hash() {
        let (tx, _, _) = signed_pair();
        let mut reversed = tx.instructions().to_vec();
        reversed.reverse();
        assert_ne!(tx.hash(), ClientTransaction::new(reversed).unwrap().hash());
    }

    #[test]
    fn test_empty_transaction_rejected() {
        assert!(ClientTransaction::new(Vec::new()).is_err());
    }
}
