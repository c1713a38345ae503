//! Group Coordination Engine: ordered, sequential multi-agent rounds
//!
//! `GroupChat` owns the participant roster, the shared conversation, the
//! termination strategy, and a global invocation budget. One `run_round`
//! invokes every participant exactly once in registration order; each reply
//! is appended to the history *before* the next participant is invoked, so
//! later speakers see earlier replies from the same round. The serialization
//! is intentional — there is no fan-out.
//!
//! Testing strategy: scripted transports injected via
//! `RemoteAgent::with_transport` drive the engine without any network; tests
//! assert ordering, sequential visibility, round abandonment, cancellation,
//! and the invocation ceiling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::agent::RemoteAgent;
use crate::config::GroupChatConfig;
use crate::error::Result;
use crate::history::{ConversationTurn, SharedHistory};
use crate::termination::TerminationStrategy;

/// Why a round (or the run containing it) stopped early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaltReason {
    /// The termination strategy ruled the task complete.
    Terminated(String),
    /// The global invocation ceiling was exhausted.
    IterationCeiling,
    /// Cooperative cancellation was requested.
    Cancelled,
    /// The workflow state machine reached its terminal state.
    WorkflowComplete(String),
}

impl std::fmt::Display for HaltReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HaltReason::Terminated(reason) => write!(f, "terminated: {}", reason),
            HaltReason::IterationCeiling => write!(f, "iteration ceiling reached"),
            HaltReason::Cancelled => write!(f, "cancelled"),
            HaltReason::WorkflowComplete(reason) => write!(f, "workflow complete: {}", reason),
        }
    }
}

/// The turns one round produced, plus the halt that ended it early (if any).
#[derive(Debug, Clone)]
pub struct RoundOutcome {
    pub turns: Vec<ConversationTurn>,
    pub halt: Option<HaltReason>,
}

/// Cooperative cancellation token. Checked between participant invocations
/// only; an in-flight remote call is never aborted.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Ordered participants sharing one conversation.
pub struct GroupChat {
    agents: Vec<RemoteAgent>,
    history: SharedHistory,
    strategy: Box<dyn TerminationStrategy>,
    invocations: usize,
    max_invocations: usize,
    cancel: CancelHandle,
}

/// Builder in the usual staged style: participants in speaking order, then a
/// strategy, then tuning.
pub struct GroupChatBuilder {
    agents: Vec<RemoteAgent>,
    strategy: Option<Box<dyn TerminationStrategy>>,
    max_invocations: usize,
    cancel: CancelHandle,
}

impl GroupChatBuilder {
    /// Append a participant; registration order is speaking order.
    pub fn agent(mut self, agent: RemoteAgent) -> Self {
        self.agents.push(agent);
        self
    }

    pub fn strategy(mut self, strategy: impl TerminationStrategy + 'static) -> Self {
        self.strategy = Some(Box::new(strategy));
        self
    }

    /// Global cap on participant invocations across the whole run.
    pub fn max_invocations(mut self, ceiling: usize) -> Self {
        self.max_invocations = ceiling;
        self
    }

    pub fn cancel_handle(mut self, handle: CancelHandle) -> Self {
        self.cancel = handle;
        self
    }

    pub fn build(self) -> GroupChat {
        GroupChat {
            agents: self.agents,
            history: SharedHistory::new(),
            strategy: self
                .strategy
                .unwrap_or_else(|| Box::new(crate::termination::KeywordTermination::default())),
            invocations: 0,
            max_invocations: self.max_invocations,
            cancel: self.cancel,
        }
    }
}

impl GroupChat {
    pub fn builder() -> GroupChatBuilder {
        GroupChatBuilder {
            agents: Vec::new(),
            strategy: None,
            max_invocations: GroupChatConfig::default().maximum_iterations,
            cancel: CancelHandle::new(),
        }
    }

    /// Inject a synthetic user turn (the seed task or a workflow instruction).
    pub fn add_user_message(&mut self, text: impl Into<String>) -> &ConversationTurn {
        self.history.push(ConversationTurn::user(text))
    }

    pub fn history(&self) -> &SharedHistory {
        &self.history
    }

    pub fn invocations(&self) -> usize {
        self.invocations
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn participant_names(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.name()).collect()
    }

    /// Drop the conversation and the invocation count; both are scoped to a
    /// single run. Participants and their context ids persist for the
    /// lifetime of the process.
    pub fn reset(&mut self) {
        self.history.clear();
        self.invocations = 0;
    }

    /// Run one round: every participant speaks once, in order, each seeing
    /// all replies appended so far.
    ///
    /// The ceiling and the cancellation token are checked before each
    /// invocation; the termination strategy is consulted after each reply and
    /// a stop verdict abandons the remainder of the round. A remote-call
    /// failure propagates immediately — partial turns from this round are
    /// already in the shared history.
    pub async fn run_round(&mut self) -> Result<RoundOutcome> {
        let mut turns = Vec::with_capacity(self.agents.len());

        for idx in 0..self.agents.len() {
            if self.cancel.is_cancelled() {
                info!("🛑 cancellation requested, abandoning round");
                return Ok(RoundOutcome {
                    turns,
                    halt: Some(HaltReason::Cancelled),
                });
            }
            if self.invocations >= self.max_invocations {
                info!(ceiling = self.max_invocations, "⏱️ invocation ceiling reached");
                return Ok(RoundOutcome {
                    turns,
                    halt: Some(HaltReason::IterationCeiling),
                });
            }

            self.invocations += 1;
            let agent_name = self.agents[idx].name().to_string();
            debug!(agent = %agent_name, invocation = self.invocations, "🎤 invoking participant");

            let reply = self.agents[idx].invoke(&self.history).await?;
            let stored = self.history.push(reply).clone();
            turns.push(stored);

            let verdict = self.strategy.should_terminate(&self.history).await;
            if verdict.should_stop {
                info!(agent = %agent_name, reason = %verdict.reason, "✅ termination strategy halted the round");
                return Ok(RoundOutcome {
                    turns,
                    halt: Some(HaltReason::Terminated(verdict.reason)),
                });
            }
        }

        Ok(RoundOutcome { turns, halt: None })
    }
}
