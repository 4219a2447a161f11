//! Forward links and collective signatures
//!
//! A forward link is a roster's attestation that block `to` follows block
//! `from`. The attestation is a collective signature: a participation mask
//! over roster positions plus one Ed25519 signature per participant, all over
//! the link hash. A link that carries a new roster hands trust over to it for
//! every later link.

use crate::roster::Roster;
use serde::{Deserialize, Serialize};
use skiplight_core::{
    ed25519_sign, ed25519_verify, hash, BlockId, Ed25519SigningKey, LedgerError, Result,
};

/// Participation mask plus per-participant signatures
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectiveSignature {
    /// Bit `i` (byte `i / 8`, bit `i % 8`) set when roster member `i` signed
    pub mask: Vec<u8>,
    /// One signature per set mask bit, in roster order
    pub signatures: Vec<Vec<u8>>,
}

impl CollectiveSignature {
    /// Sign `message` with the given `(roster index, key)` pairs
    pub fn sign<'k, I>(message: &[u8], roster_len: usize, signers: I) -> Result<Self>
    where
        I: IntoIterator<Item = (usize, &'k Ed25519SigningKey)>,
    {
        let mut by_index: Vec<(usize, &Ed25519SigningKey)> = signers.into_iter().collect();
        by_index.sort_by_key(|(index, _)| *index);
        by_index.dedup_by_key(|(index, _)| *index);

        let mut mask = vec![0u8; roster_len.div_ceil(8)];
        let mut signatures = Vec::with_capacity(by_index.len());
        for (index, key) in by_index {
            if index >= roster_len {
                return Err(LedgerError::argument(format!(
                    "signer index {index} outside roster of {roster_len}"
                )));
            }
            mask[index / 8] |= 1 << (index % 8);
            signatures.push(ed25519_sign(key, message));
        }
        Ok(Self { mask, signatures })
    }

    /// Roster positions marked as participants
    pub fn participants(&self, roster_len: usize) -> Vec<usize> {
        (0..roster_len)
            .filter(|i| {
                self.mask
                    .get(i / 8)
                    .is_some_and(|byte| byte & (1 << (i % 8)) != 0)
            })
            .collect()
    }

    /// Check the signature against `roster` for `message`
    pub fn verify(&self, message: &[u8], roster: &Roster) -> Result<()> {
        let n = roster.len();
        if n == 0 {
            return Err(LedgerError::protocol("collective signature over empty roster"));
        }
        if self.mask.len() != n.div_ceil(8) {
            return Err(LedgerError::protocol(format!(
                "participation mask has {} bytes, roster of {n} needs {}",
                self.mask.len(),
                n.div_ceil(8)
            )));
        }
        let stray_bits = (n..self.mask.len() * 8)
            .any(|i| self.mask[i / 8] & (1 << (i % 8)) != 0);
        if stray_bits {
            return Err(LedgerError::protocol(
                "participation mask marks servers outside the roster",
            ));
        }

        let participants = self.participants(n);
        if participants.len() != self.signatures.len() {
            return Err(LedgerError::protocol(format!(
                "{} participants but {} signatures",
                participants.len(),
                self.signatures.len()
            )));
        }
        if participants.len() < roster.quorum() {
            return Err(LedgerError::protocol(format!(
                "{} of {n} servers signed, quorum is {}",
                participants.len(),
                roster.quorum()
            )));
        }

        for (index, signature) in participants.iter().zip(&self.signatures) {
            let key = roster
                .service_key(*index)
                .ok_or_else(|| LedgerError::protocol(format!("no server at index {index}")))?;
            ed25519_verify(key, message, signature).map_err(|_| {
                LedgerError::protocol(format!("bad signature from roster member {index}"))
            })?;
        }
        Ok(())
    }
}

/// Attested step from one block to a later one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardLink {
    /// Block the link starts at
    pub from: BlockId,
    /// Block the link points to
    pub to: BlockId,
    /// Roster that takes over for later links
    pub new_roster: Option<Roster>,
    /// Attestation by the roster trusted at `from`
    pub signature: CollectiveSignature,
}

impl ForwardLink {
    /// Unsigned link
    pub fn new(from: BlockId, to: BlockId, new_roster: Option<Roster>) -> Self {
        Self {
            from,
            to,
            new_roster,
            signature: CollectiveSignature::default(),
        }
    }

    /// Message the roster signs
    pub fn hash(&self) -> [u8; 32] {
        let mut h = hash::hasher();
        h.update(self.from.as_bytes());
        h.update(self.to.as_bytes());
        if let Some(roster) = &self.new_roster {
            h.update(&roster.id());
        }
        h.finalize()
    }

    /// Attach a collective signature by the given roster members
    pub fn sign<'k, I>(mut self, roster: &Roster, signers: I) -> Result<Self>
    where
        I: IntoIterator<Item = (usize, &'k Ed25519SigningKey)>,
    {
        self.signature = CollectiveSignature::sign(&self.hash(), roster.len(), signers)?;
        Ok(self)
    }

    /// Check the attestation against the trusted roster
    pub fn verify(&self, roster: &Roster) -> Result<()> {
        self.signature.verify(&self.hash(), roster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::ServerIdentity;
    use assert_matches::assert_matches;
    use skiplight_core::signing_key_from_seed;

    fn server_keys(range: std::ops::Range<u8>) -> Vec<Ed25519SigningKey> {
        range.map(|i| signing_key_from_seed(&[i; 32])).collect()
    }

    fn roster_of(keys: &[Ed25519SigningKey]) -> Roster {
        Roster::new(
            keys.iter()
                .enumerate()
                .map(|(i, k)| ServerIdentity::new(format!("node{i}"), k.verifying_key()))
                .collect(),
        )
        .unwrap()
    }

    fn link() -> ForwardLink {
        ForwardLink::new(BlockId::new([1u8; 32]), BlockId::new([2u8; 32]), None)
    }

    #[test]
    fn test_full_roster_signature_verifies() {
        let keys = server_keys(1..5);
        let roster = roster_of(&keys);
        let signed = link().sign(&roster, keys.iter().enumerate()).unwrap();
        signed.verify(&roster).unwrap();
        assert_eq!(signed.signature.mask, vec![0b0000_1111]);
    }

    #[test]
    fn test_quorum_is_enough_and_required() {
        let keys = server_keys(1..5);
        let roster = roster_of(&keys);
        let quorum = link()
            .sign(&roster, keys.iter().enumerate().skip(1))
            .unwrap();
        quorum.verify(&roster).unwrap();

        let short = link()
            .sign(&roster, keys.iter().enumerate().skip(2))
            .unwrap();
        assert_matches!(short.verify(&roster), Err(LedgerError::ProtocolViolation { .. }));
    }

    #[test]
    fn test_signature_byte_flip_rejected() {
        let keys = server_keys(1..4);
        let roster = roster_of(&keys);
        let mut signed = link().sign(&roster, keys.iter().enumerate()).unwrap();
        signed.signature.signatures[1][0] ^= 0x01;
        assert_matches!(signed.verify(&roster), Err(LedgerError::ProtocolViolation { .. }));
    }

    #[test]
    fn test_wrong_roster_rejected() {
        let keys = server_keys(1..4);
        let other = server_keys(10..13);
        let signed = link()
            .sign(&roster_of(&keys), keys.iter().enumerate())
            .unwrap();
        assert!(signed.verify(&roster_of(&other)).is_err());
    }

    #[test]
    fn test_new_roster_changes_link_hash() {
        let keys = server_keys(1..4);
        let plain = link();
        let rotating = ForwardLink::new(plain.from, plain.to, Some(roster_of(&keys)));
        assert_ne!(plain.hash(), rotating.hash());
    }
}
