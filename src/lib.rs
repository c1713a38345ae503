//! # A2A Group Chat Orchestration
//!
//! A Tower-based orchestration core for multi-agent group chats over the A2A
//! (Agent-to-Agent) protocol. Remote agents speak JSON-RPC over HTTP; this
//! crate wraps each one behind a uniform adapter, coordinates them through
//! sequential rounds over one shared conversation, and drives a keyword
//! workflow state machine from their replies.
//!
//! ## Core Concepts
//!
//! - **RemoteAgent**: an adapter over one A2A endpoint — discovery, context
//!   pinning, prompt rendering, and reply normalization behind a Tower
//!   service seam
//! - **GroupChat**: ordered participants sharing one append-only history;
//!   each round every participant speaks once and sees all earlier replies
//! - **TerminationStrategy**: keyword heuristic plus an optional model judge,
//!   consulted after every reply; infallible by contract
//! - **WorkflowMachine**: a four-stage keyword state machine that turns
//!   observed replies into injected follow-up instructions
//! - **WorkflowRunner**: the composition root that runs rounds, feeds the
//!   machine, queues instructions, and publishes observer events
//!
//! ## Getting Started
//!
//! ```rust,no_run
//! use tower_a2a::{
//!     connect_all, GroupChatConfig, KeywordTermination, WorkflowRunner,
//! };
//!
//! # async fn example() -> tower_a2a::Result<()> {
//! let config = GroupChatConfig::default();
//! let agents = connect_all(
//!     &[
//!         ("todo-extractor", "http://localhost:10020"),
//!         ("task-formatter", "http://localhost:10021"),
//!         ("work-item-creator", "http://localhost:10022"),
//!     ],
//!     &config,
//! )
//! .await?;
//!
//! let mut builder = WorkflowRunner::builder()
//!     .strategy(KeywordTermination::default())
//!     .config(&config);
//! for agent in agents {
//!     builder = builder.agent(agent);
//! }
//! let mut runner = builder.build();
//!
//! let report = runner
//!     .run("Extract the todos from today's meeting notes and create work items.")
//!     .await?;
//! println!("finished in state {} ({})", report.final_state, report.halt);
//! # Ok(())
//! # }
//! ```
//!
//! Transports are injectable: tests (and embedders with their own wire
//! layer) hand `RemoteAgent::with_transport` any clonable Tower service from
//! [`protocol::MessageSendRequest`] to [`protocol::ReplyPayload`].

pub mod agent;
pub mod config;
pub mod error;
pub mod events;
pub mod group;
pub mod history;
pub mod protocol;
pub mod runner;
pub mod termination;
pub mod transport;
pub mod workflow;

pub use agent::RemoteAgent;
pub use config::GroupChatConfig;
pub use error::{A2aError, Result};
pub use events::{ChatEvent, ObserverSink};
pub use group::{CancelHandle, GroupChat, GroupChatBuilder, HaltReason, RoundOutcome};
pub use history::{ConversationTurn, Role, SharedHistory};
pub use protocol::{AgentCard, MessageSendRequest, ReplyPayload};
pub use runner::{connect_all, WorkflowReport, WorkflowRunner, WorkflowRunnerBuilder};
pub use termination::{
    JudgeQuery, JudgeSvc, JudgeTurn, JudgedTermination, KeywordTermination, OpenAiJudge,
    TerminationStrategy, TerminationVerdict,
};
pub use transport::{A2aSvc, HttpTransport, AGENT_CARD_PATH};
pub use workflow::{StepDecision, WorkflowMachine, WorkflowState};
