//! Orchestration Driver: ties engine, workflow machine, and observers together
//!
//! `WorkflowRunner` is the composition root. It seeds the conversation with
//! the initial instruction, runs engine rounds, feeds every produced reply to
//! the workflow machine, queues stage instructions FIFO for injection between
//! rounds, and publishes observer events as replies land. A `Complete`
//! workflow decision stops the run unconditionally, independent of the
//! termination strategy.
//!
//! Testing strategy: scripted transports stand in for remote agents; the
//! integration suite in `tests/` drives full multi-round scenarios through
//! this type.

use std::collections::VecDeque;

use tracing::{info, warn};

use crate::agent::RemoteAgent;
use crate::config::GroupChatConfig;
use crate::error::Result;
use crate::events::{ChatEvent, ObserverSink};
use crate::group::{GroupChat, GroupChatBuilder, HaltReason};
use crate::history::SharedHistory;
use crate::termination::TerminationStrategy;
use crate::workflow::{StepDecision, WorkflowMachine, WorkflowState};

/// What a completed run produced.
#[derive(Debug, Clone)]
pub struct WorkflowReport {
    /// Full conversation, captured before the engine is reset.
    pub transcript: SharedHistory,
    pub final_state: WorkflowState,
    pub halt: HaltReason,
}

/// Connect a set of named endpoints up front, with the configured
/// per-request timeout. Any discovery failure aborts the whole startup
/// before a single round runs.
pub async fn connect_all(
    endpoints: &[(&str, &str)],
    config: &GroupChatConfig,
) -> Result<Vec<RemoteAgent>> {
    let mut agents = Vec::with_capacity(endpoints.len());
    for (name, endpoint) in endpoints {
        agents.push(
            RemoteAgent::connect_with_timeout(endpoint, *name, None, config.request_timeout)
                .await?,
        );
    }
    Ok(agents)
}

pub struct WorkflowRunner {
    group: GroupChat,
    machine: WorkflowMachine,
    pending: VecDeque<String>,
    sink: Option<ObserverSink>,
}

pub struct WorkflowRunnerBuilder {
    group: GroupChatBuilder,
    sink: Option<ObserverSink>,
}

impl WorkflowRunnerBuilder {
    /// Add a connected participant; registration order is speaking order.
    pub fn agent(mut self, agent: RemoteAgent) -> Self {
        self.group = self.group.agent(agent);
        self
    }

    pub fn strategy(mut self, strategy: impl TerminationStrategy + 'static) -> Self {
        self.group = self.group.strategy(strategy);
        self
    }

    pub fn config(mut self, config: &GroupChatConfig) -> Self {
        self.group = self.group.max_invocations(config.maximum_iterations);
        self
    }

    pub fn observer(mut self, sink: ObserverSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> WorkflowRunner {
        WorkflowRunner {
            group: self.group.build(),
            machine: WorkflowMachine::new(),
            pending: VecDeque::new(),
            sink: self.sink,
        }
    }
}

impl WorkflowRunner {
    pub fn builder() -> WorkflowRunnerBuilder {
        WorkflowRunnerBuilder {
            group: GroupChat::builder(),
            sink: None,
        }
    }

    /// Handle for cooperative cancellation of an in-progress run.
    pub fn cancel_handle(&self) -> crate::group::CancelHandle {
        self.group.cancel_handle()
    }

    /// Partial conversation, useful for diagnosis when `run` returned an
    /// error and no report was produced.
    pub fn transcript(&self) -> &SharedHistory {
        self.group.history()
    }

    /// Last known workflow stage, for the same diagnosis path.
    pub fn workflow_state(&self) -> WorkflowState {
        self.machine.state()
    }

    fn emit(&self, event: ChatEvent) {
        if let Some(sink) = &self.sink {
            sink.emit(event);
        }
    }

    /// Drive the workflow to completion from one initial instruction.
    ///
    /// Round loop: run a round, observe every reply, inject the next queued
    /// instruction, repeat. Stops when the workflow completes, the strategy
    /// halts a round, cancellation fires, or the invocation ceiling is hit.
    /// On success the engine is reset after the transcript is captured; on a
    /// remote-call error the partial history stays available via
    /// [`WorkflowRunner::transcript`].
    pub async fn run(&mut self, task: impl Into<String>) -> Result<WorkflowReport> {
        let task = task.into();
        self.machine = WorkflowMachine::new();
        self.pending.clear();

        info!(task = %task, "🚀 starting workflow run");
        self.group.add_user_message(&task);
        self.emit(ChatEvent::Started { task });

        let halt = loop {
            let outcome = self.group.run_round().await?;

            let mut workflow_halt = None;
            for turn in &outcome.turns {
                let decision = self.machine.observe(&turn.text);
                match decision {
                    StepDecision::Advance { instruction } => {
                        self.pending.push_back(instruction.clone());
                        self.emit(ChatEvent::Instruction {
                            state: self.machine.state(),
                            instruction,
                        });
                    }
                    StepDecision::Complete { reason } => {
                        workflow_halt = Some(HaltReason::WorkflowComplete(reason));
                    }
                    StepDecision::Continue => {}
                }
                self.emit(ChatEvent::Reply {
                    turn: turn.clone(),
                    state: self.machine.state(),
                    pending_instructions: self.pending.len(),
                });
                if workflow_halt.is_some() {
                    break;
                }
            }

            // Workflow completion overrides whatever the round reported.
            if let Some(halt) = workflow_halt {
                break halt;
            }
            if let Some(halt) = outcome.halt {
                break halt;
            }

            if let Some(instruction) = self.pending.pop_front() {
                info!(instruction = %instruction, "📋 injecting next workflow instruction");
                self.group.add_user_message(instruction);
            } else {
                // No transition fired this round; re-run the current step.
                // The invocation ceiling bounds how long this can go on.
                warn!(state = %self.machine.state(), "no workflow transition observed, re-running step");
            }
        };

        info!(halt = %halt, state = %self.machine.state(), "🏁 workflow run finished");
        self.emit(ChatEvent::Halted {
            reason: halt.to_string(),
        });

        let transcript = self.group.history().clone();
        let final_state = self.machine.state();
        self.group.reset();

        Ok(WorkflowReport {
            transcript,
            final_state,
            halt,
        })
    }
}
