//! Checking that a new Darc version was approved by the previous one

use crate::darc::{Darc, EVOLVE_ACTION};
use crate::identity::{Identity, IdentityCapability};
use crate::resolver::{DarcProvider, DelegationResolver};
use crate::signer::Signer;
use serde::{Deserialize, Serialize};
use skiplight_core::{LedgerError, Result};
use tracing::{debug, warn};

/// One identity's signature over the id of the proposed version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvolutionApproval {
    /// Approving identity; must be a direct key
    pub identity: Identity,
    /// Signature over `next.id()`
    pub signature: Vec<u8>,
}

impl EvolutionApproval {
    /// Sign the proposed version's id
    pub fn sign(next: &Darc, signer: &dyn Signer) -> Result<Self> {
        Ok(Self {
            identity: signer.identity(),
            signature: signer.sign(next.id().as_bytes())?,
        })
    }
}

/// Verify that `next` is a valid evolution of `prev`
///
/// Structural problems (base id, version step, back link) are argument
/// errors. A bad approval signature is a protocol violation. Approvers that
/// do not satisfy the previous version's evolve rule are a delegation error.
pub async fn verify_evolution<P: DarcProvider + ?Sized>(
    prev: &Darc,
    next: &Darc,
    approvals: &[EvolutionApproval],
    resolver: &DelegationResolver<'_, P>,
) -> Result<()> {
    prev.check_successor(next)?;

    let message = next.id();
    let mut approvers = Vec::with_capacity(approvals.len());
    for approval in approvals {
        if !approval.identity.verify(message.as_bytes(), &approval.signature) {
            return Err(LedgerError::protocol(format!(
                "invalid evolution approval from {}",
                approval.identity
            )));
        }
        approvers.push(approval.identity);
    }

    if !resolver
        .is_authorized(prev, EVOLVE_ACTION, &approvers)
        .await?
    {
        warn!(
            darc = %prev.base_id(),
            version = next.version(),
            approvers = approvers.len(),
            "evolution not authorized"
        );
        return Err(LedgerError::delegation(format!(
            "approvers do not satisfy '{EVOLVE_ACTION}' of darc {} version {}",
            prev.base_id(),
            prev.version()
        )));
    }

    debug!(darc = %prev.base_id(), version = next.version(), "evolution verified");
    Ok(())
}
