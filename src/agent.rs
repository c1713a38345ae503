//! Remote Agent Adapter: uniform client-side proxy to one hosted agent
//!
//! The adapter owns a persistent logical conversation id (created once,
//! reused for every call so the remote side can keep its own context),
//! renders the shared history into a single text prompt, issues exactly one
//! remote call per invocation, and normalizes whatever reply shape comes back
//! into one assistant turn. Retry/backoff is deliberately not handled here.

use std::time::Duration;

use tower::{util::BoxCloneService, Service, ServiceExt};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{A2aError, Result};
use crate::history::{ConversationTurn, SharedHistory};
use crate::protocol::{self, AgentCard, MessageSendRequest};
use crate::transport::{A2aSvc, HttpTransport};

/// Client-side proxy to one remote A2A agent.
pub struct RemoteAgent {
    name: String,
    description: String,
    card: Option<AgentCard>,
    context_id: String,
    last_turn_only: bool,
    transport: A2aSvc,
}

// Manual impl: the boxed transport has no Debug.
impl std::fmt::Debug for RemoteAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteAgent")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("context_id", &self.context_id)
            .field("last_turn_only", &self.last_turn_only)
            .finish_non_exhaustive()
    }
}

impl RemoteAgent {
    /// Connect to an agent endpoint: performs the one-time capability
    /// discovery call and allocates a fresh logical conversation id.
    ///
    /// Fails with [`A2aError::Discovery`] if the endpoint is unreachable or
    /// returns a malformed capability descriptor. This is a fatal startup
    /// condition for the run.
    pub async fn connect(
        endpoint: &str,
        name: impl Into<String>,
        description: Option<String>,
    ) -> Result<Self> {
        Self::connect_with_timeout(endpoint, name, description, Duration::from_secs(30)).await
    }

    pub async fn connect_with_timeout(
        endpoint: &str,
        name: impl Into<String>,
        description: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let name = name.into();
        let transport = HttpTransport::new(endpoint, timeout).map_err(|e| A2aError::Discovery {
            agent: name.clone(),
            message: e.to_string(),
        })?;
        let card = transport.discover().await.map_err(|e| A2aError::Discovery {
            agent: name.clone(),
            message: e.to_string(),
        })?;
        let description = description
            .or_else(|| card.description.clone())
            .unwrap_or_else(|| format!("A2A {} agent", name));
        info!(agent = %name, "discovered remote agent");
        Ok(Self::assemble(name, description, Some(card), transport.into_svc()))
    }

    /// Build an adapter over an injected transport. Used by tests and by
    /// callers that manage discovery themselves.
    pub fn with_transport<S>(
        name: impl Into<String>,
        description: impl Into<String>,
        transport: S,
    ) -> Self
    where
        S: Service<MessageSendRequest, Response = crate::protocol::ReplyPayload, Error = tower::BoxError>
            + Clone
            + Send
            + 'static,
        S::Future: Send + 'static,
    {
        Self::assemble(
            name.into(),
            description.into(),
            None,
            BoxCloneService::new(transport),
        )
    }

    fn assemble(name: String, description: String, card: Option<AgentCard>, transport: A2aSvc) -> Self {
        Self {
            name,
            description,
            card,
            context_id: format!("chat-session-{}", Uuid::new_v4().simple()),
            last_turn_only: false,
            transport,
        }
    }

    /// Send only the final turn's text instead of the full rendered history.
    pub fn last_turn_only(mut self, enabled: bool) -> Self {
        self.last_turn_only = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn card(&self) -> Option<&AgentCard> {
        self.card.as_ref()
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    /// Invoke the remote agent against the shared history: one prompt, one
    /// call, one assistant turn back.
    ///
    /// Transport failures propagate as [`A2aError::RemoteCall`] naming this
    /// agent and the turn index at which the call was issued; unparseable
    /// replies never fail (they degrade to a stringified fallback).
    pub async fn invoke(&mut self, history: &SharedHistory) -> Result<ConversationTurn> {
        let prompt = if self.last_turn_only {
            history.render_last_turn()
        } else {
            history.render_prompt()
        };
        let turn_index = history.len();
        debug!(agent = %self.name, turn_index, prompt_chars = prompt.len(), "invoking remote agent");

        let request = MessageSendRequest::user_text(prompt, &self.context_id);
        let result = match ServiceExt::ready(&mut self.transport).await {
            Ok(svc) => svc.call(request).await,
            Err(e) => Err(e),
        };
        let reply = result.map_err(|e| self.remote_call_error(turn_index, e))?;

        let text = protocol::extract_text(&reply);
        debug!(agent = %self.name, reply_chars = text.len(), "remote agent replied");
        Ok(ConversationTurn::assistant(text, self.name.clone()))
    }

    fn remote_call_error(&self, turn_index: usize, source: tower::BoxError) -> A2aError {
        A2aError::RemoteCall {
            agent: self.name.clone(),
            turn_index,
            message: source.to_string(),
        }
    }
}
