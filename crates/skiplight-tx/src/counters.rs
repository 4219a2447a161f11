//! Replay-counter assignment
//!
//! The ledger keeps, per identity, the last counter it accepted; the next
//! valid one is that value plus one. A transaction in which the same identity
//! signs several instructions must use consecutive counters in instruction
//! order, so all of them are fetched in one round trip and handed out
//! locally.
//!
//! Two concurrent assignments for the same identity will read the same
//! starting counter and one of the transactions will be rejected as a
//! replay. Callers serialize per identity.

use crate::transaction::ClientTransaction;
use async_trait::async_trait;
use skiplight_core::{LedgerError, Result};
use skiplight_darc::Identity;
use std::collections::HashMap;
use tracing::debug;

/// Where current signer counters come from
#[async_trait]
pub trait CounterSource: Send + Sync {
    /// Last counter the ledger accepted for each identity, in order
    async fn signer_counters(&self, identities: &[Identity]) -> Result<Vec<u64>>;
}

/// Unique identities across all groups, in first-seen order
pub fn unique_identities(groups: &[Vec<Identity>]) -> Vec<Identity> {
    let mut unique: Vec<Identity> = Vec::new();
    for identity in groups.iter().flatten() {
        if !unique.contains(identity) {
            unique.push(*identity);
        }
    }
    unique
}

/// Assigns counters to a transaction from one counter fetch
pub struct CounterCoordinator<'a, C: CounterSource + ?Sized> {
    source: &'a C,
}

impl<'a, C: CounterSource + ?Sized> CounterCoordinator<'a, C> {
    /// Coordinator reading from `source`
    pub fn new(source: &'a C) -> Self {
        Self { source }
    }

    /// Counters for each group, without touching a transaction
    pub async fn allocate(&self, groups: &[Vec<Identity>]) -> Result<Vec<Vec<u64>>> {
        let unique = unique_identities(groups);
        let last = if unique.is_empty() {
            Vec::new()
        } else {
            self.source.signer_counters(&unique).await?
        };
        if last.len() != unique.len() {
            return Err(LedgerError::protocol(format!(
                "asked for {} signer counters, received {}",
                unique.len(),
                last.len()
            )));
        }

        let mut next: HashMap<Identity, u64> = unique.iter().copied().zip(last).collect();
        let mut allocated = Vec::with_capacity(groups.len());
        for group in groups {
            let mut counters = Vec::with_capacity(group.len());
            for identity in group {
                let counter = next
                    .get_mut(identity)
                    .ok_or_else(|| LedgerError::protocol(format!("no counter for {identity}")))?;
                *counter = counter.checked_add(1).ok_or_else(|| {
                    LedgerError::protocol(format!("signer counter for {identity} is exhausted"))
                })?;
                counters.push(*counter);
            }
            allocated.push(counters);
        }

        debug!(
            identities = unique.len(),
            instructions = groups.len(),
            "signer counters allocated"
        );
        Ok(allocated)
    }

    /// Set identities and counters on every instruction of `tx`
    ///
    /// `groups[i]` lists the signers of instruction `i`.
    pub async fn assign(&self, tx: &mut ClientTransaction, groups: &[Vec<Identity>]) -> Result<()> {
        if groups.len() != tx.len() {
            return Err(LedgerError::argument(format!(
                "{} signer groups for {} instructions",
                groups.len(),
                tx.len()
            )));
        }
        let allocated = self.allocate(groups).await?;
        for ((instruction, identities), counters) in
            tx.instructions_mut().iter_mut().zip(groups).zip(allocated)
        {
            instruction.set_signers(identities.clone(), counters)?;
        }
        Ok(())
    }
}
