//! Delegation resolution
//!
//! A rule may name another Darc instead of a key. Answering "who may perform
//! this action" then means fetching that Darc and following its `_sign`
//! rule, which may delegate again. The walk is bounded by a maximum number of
//! hops and refuses to revisit a Darc already on the current path.

use crate::darc::{Darc, SIGN_ACTION};
use crate::expression::ParsedExpression;
use crate::identity::Identity;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use skiplight_core::{DarcId, LedgerError, Result};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// Source of the latest version of a Darc by base id
#[async_trait]
pub trait DarcProvider: Send + Sync {
    /// Fetch the latest known version of the Darc with this base id
    async fn fetch_darc(&self, base_id: &DarcId) -> Result<Darc>;
}

/// Bounded, cycle-checked walker over delegated rules
pub struct DelegationResolver<'a, P: DarcProvider + ?Sized> {
    provider: &'a P,
    max_depth: usize,
}

impl<'a, P: DarcProvider + ?Sized> DelegationResolver<'a, P> {
    /// Resolver following at most `max_depth` delegation hops
    pub fn new(provider: &'a P, max_depth: usize) -> Self {
        Self {
            provider,
            max_depth,
        }
    }

    /// Maximum number of delegation hops
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Flattened direct identities that appear under `action` in `darc`
    ///
    /// Delegated tokens are replaced by the identities of the referenced
    /// Darc's `_sign` rule. A missing rule yields an empty list. Each
    /// identity appears once, in first-seen order.
    pub async fn resolve_identities(&self, darc: &Darc, action: &str) -> Result<Vec<Identity>> {
        let mut resolved = Vec::new();
        let mut seen = HashSet::new();
        let mut queue: VecDeque<(Darc, String, Vec<DarcId>)> = VecDeque::new();
        queue.push_back((darc.clone(), action.to_string(), vec![darc.base_id()]));

        while let Some((current, current_action, path)) = queue.pop_front() {
            let Some(expression) = current.rules().get(&current_action) else {
                debug!(darc = %current.base_id(), action = %current_action, "no rule for action");
                continue;
            };
            let parsed = expression.parse()?;
            for identity in parsed.identities() {
                match identity {
                    Identity::Ed25519(_) => {
                        if seen.insert(*identity) {
                            resolved.push(*identity);
                        }
                    }
                    Identity::Darc(delegated) => {
                        let next = self.follow(delegated.base_id(), &path).await?;
                        let mut next_path = path.clone();
                        next_path.push(next.base_id());
                        queue.push_back((next, SIGN_ACTION.to_string(), next_path));
                    }
                }
            }
        }

        debug!(
            darc = %darc.base_id(),
            action,
            count = resolved.len(),
            "resolved rule identities"
        );
        Ok(resolved)
    }

    /// Whether `signers` satisfy `action` under `darc`
    ///
    /// The expression is evaluated left to right. A direct token holds when
    /// the identity is among the signers; a delegated token holds when the
    /// referenced Darc's `_sign` rule is satisfied by the same signers.
    /// A missing rule authorizes nobody.
    pub async fn is_authorized(
        &self,
        darc: &Darc,
        action: &str,
        signers: &[Identity],
    ) -> Result<bool> {
        let authorized = self
            .evaluate(darc, action, signers, vec![darc.base_id()])
            .await?;
        debug!(darc = %darc.base_id(), action, authorized, "evaluated rule");
        Ok(authorized)
    }

    fn evaluate<'f>(
        &'f self,
        darc: &'f Darc,
        action: &'f str,
        signers: &'f [Identity],
        path: Vec<DarcId>,
    ) -> BoxFuture<'f, Result<bool>> {
        async move {
            let Some(expression) = darc.rules().get(action) else {
                return Ok(false);
            };
            let ParsedExpression { first, rest } = expression.parse()?;

            let mut acc = self.token_holds(&first, signers, &path).await?;
            for (op, identity) in &rest {
                if op.short_circuits(acc) {
                    continue;
                }
                let holds = self.token_holds(identity, signers, &path).await?;
                acc = op.apply(acc, holds);
            }
            Ok(acc)
        }
        .boxed()
    }

    async fn token_holds(
        &self,
        identity: &Identity,
        signers: &[Identity],
        path: &[DarcId],
    ) -> Result<bool> {
        match identity {
            Identity::Ed25519(_) => Ok(signers.contains(identity)),
            Identity::Darc(delegated) => {
                let next = self.follow(delegated.base_id(), path).await?;
                let mut next_path = path.to_vec();
                next_path.push(next.base_id());
                self.evaluate(&next, SIGN_ACTION, signers, next_path).await
            }
        }
    }

    /// Fetch the next Darc on a delegation path, enforcing depth and cycles
    async fn follow(&self, base_id: &DarcId, path: &[DarcId]) -> Result<Darc> {
        if path.contains(base_id) {
            return Err(LedgerError::delegation(format!(
                "delegation cycle through darc {base_id}"
            )));
        }
        if path.len() > self.max_depth {
            return Err(LedgerError::delegation(format!(
                "delegation deeper than {} hops at darc {base_id}",
                self.max_depth
            )));
        }
        let darc = self.provider.fetch_darc(base_id).await?;
        if darc.base_id() != *base_id {
            return Err(LedgerError::protocol(format!(
                "provider returned darc {} for base id {base_id}",
                darc.base_id()
            )));
        }
        Ok(darc)
    }
}
