//! Transport seam between the client and a ledger node
//!
//! Node discovery, framing and retries across nodes live behind this trait.
//! Implementations report transport failures as [`LedgerError::Network`].

use crate::messages::{LedgerRequest, LedgerResponse, ResponseKind};
use async_trait::async_trait;
use skiplight_core::{LedgerError, Result};
use std::sync::Arc;
use tracing::trace;

/// Request/response channel to a ledger node
#[async_trait]
pub trait Connection: Send + Sync {
    /// Send one request and wait for its response
    async fn send(&self, request: LedgerRequest, expected: ResponseKind) -> Result<LedgerResponse>;
}

#[async_trait]
impl<C: Connection + ?Sized> Connection for Arc<C> {
    async fn send(&self, request: LedgerRequest, expected: ResponseKind) -> Result<LedgerResponse> {
        (**self).send(request, expected).await
    }
}

/// Send `request` and reject any response of the wrong kind
pub async fn send_checked<C: Connection + ?Sized>(
    connection: &C,
    request: LedgerRequest,
) -> Result<LedgerResponse> {
    let expected = request.expected_kind();
    trace!(%expected, "sending ledger request");
    let response = connection.send(request, expected).await?;
    if response.kind() != expected {
        return Err(LedgerError::protocol(format!(
            "expected {expected}, received {}",
            response.kind()
        )));
    }
    Ok(response)
}
