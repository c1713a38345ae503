//! Remote call seam for A2A endpoints
//!
//! What this module provides
//! - A Tower service boundary between the adapter and the wire, so tests can
//!   substitute scripted transports for real HTTP endpoints
//!
//! Exports
//! - Services
//!   - `A2aSvc: BoxCloneService<MessageSendRequest, ReplyPayload, BoxError>`
//!   - `HttpTransport` — reqwest-backed implementation with a bounded timeout
//! - Utils
//!   - `HttpTransport::discover` — one-time agent-card fetch
//!
//! Implementation strategy
//! - One transport per endpoint; the adapter owns it for the process lifetime
//! - The JSON-RPC `result` member is classified into `ReplyPayload` here so
//!   the adapter only ever sees the tagged variant
//! - No retries at this level; a transport failure surfaces to the driver
//!
//! Testing strategy
//! - Production paths are exercised through injected `tower::service_fn`
//!   transports in `agent`, `group`, and the integration tests

use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;
use tower::{util::BoxCloneService, BoxError, Service};
use tracing::debug;

use crate::error::Result;
use crate::protocol::{AgentCard, MessageSendRequest, ReplyPayload};

/// Boxed transport service type used by adapters.
pub type A2aSvc = BoxCloneService<MessageSendRequest, ReplyPayload, BoxError>;

/// Well-known path of the capability descriptor.
pub const AGENT_CARD_PATH: &str = "/.well-known/agent.json";

/// HTTP transport for one agent endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    /// Build a transport with a bounded per-request timeout. A timeout is a
    /// remote-call failure, never a termination signal.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Fetch the agent's capability descriptor. Called exactly once, at
    /// adapter creation.
    pub async fn discover(&self) -> Result<AgentCard> {
        let url = format!("{}{}", self.endpoint.trim_end_matches('/'), AGENT_CARD_PATH);
        debug!(url = %url, "fetching agent card");
        let card = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<AgentCard>()
            .await?;
        Ok(card)
    }

    pub fn into_svc(self) -> A2aSvc {
        BoxCloneService::new(self)
    }
}

impl Service<MessageSendRequest> for HttpTransport {
    type Response = ReplyPayload;
    type Error = BoxError;
    type Future = BoxFuture<'static, std::result::Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: MessageSendRequest) -> Self::Future {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        Box::pin(async move {
            let body: Value = client
                .post(&endpoint)
                .json(&req)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            // JSON-RPC replies nest the payload under `result`; tolerate
            // servers that return the payload bare.
            let result = body.get("result").cloned().unwrap_or(body);
            Ok(ReplyPayload::classify(result))
        })
    }
}
