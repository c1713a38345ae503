//! Workflow state machine: maps observed reply text to the next instruction
//!
//! A four-state linear machine over the macro-level task: extract action
//! items, format them into structured work items, create them in the tracking
//! system. Stage detection is keyword matching against free-text replies;
//! inherently fragile, so it lives behind this interface where a structured-
//! output variant could replace it without touching the engine or the
//! termination strategy.
//!
//! The transition table is evaluated against the current state only. A reply
//! matching no row for the current state is a no-op: "continue current step,
//! no new instruction" — distinct from completion. Transitions never regress.

use tracing::{debug, info};

/// Macro-level workflow stage across the whole multi-agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WorkflowState {
    Initial,
    TodosExtracted,
    Formatted,
    Completed,
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkflowState::Initial => "INITIAL",
            WorkflowState::TodosExtracted => "TODOS_EXTRACTED",
            WorkflowState::Formatted => "FORMATTED",
            WorkflowState::Completed => "COMPLETED",
        };
        f.write_str(s)
    }
}

/// Decision produced for each observed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepDecision {
    /// A stage transition fired; inject this instruction as a user turn
    Advance { instruction: String },
    /// No row matched; keep working the current step
    Continue,
    /// The workflow is finished (normally or via the short-circuit)
    Complete { reason: String },
}

/// Instruction injected when extraction output is observed.
pub const FORMAT_INSTRUCTION: &str = "format the extracted items into structured work items";
/// Instruction injected when formatted output is observed.
pub const CREATE_INSTRUCTION: &str = "create the formatted work items in the tracking system";

const EXTRACTED_TRIGGERS: &[&str] = &["todo", "action item", "task", "found", "extracted"];
const FORMATTED_TRIGGERS: &[&str] = &[
    "assigned to",
    "description",
    "acceptance criteria",
    "detailed",
    "expand",
    "formatted",
    "structured",
    "work item",
];
const CREATED_TRIGGERS: &[&str] = &["created", "success", "work items created", "installed", "completed"];

const NOTHING_TO_PROCESS: &[&str] = &["no todos", "no action items"];

/// Keyword-driven workflow machine, consulted once per produced reply.
#[derive(Debug, Clone)]
pub struct WorkflowMachine {
    state: WorkflowState,
}

impl Default for WorkflowMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowMachine {
    pub fn new() -> Self {
        Self {
            state: WorkflowState::Initial,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// Observe one reply and decide the next action. Evaluated against the
    /// lowercased text and the current state only.
    pub fn observe(&mut self, reply: &str) -> StepDecision {
        let text = reply.to_lowercase();

        // Short-circuit from any state: nothing to process.
        if NOTHING_TO_PROCESS.iter().any(|m| text.contains(m)) {
            info!(state = %self.state, "workflow short-circuit: nothing to process");
            self.state = WorkflowState::Completed;
            return StepDecision::Complete {
                reason: "nothing to process".to_string(),
            };
        }

        match self.state {
            WorkflowState::Initial if contains_any(&text, EXTRACTED_TRIGGERS) => {
                self.advance(WorkflowState::TodosExtracted);
                StepDecision::Advance {
                    instruction: FORMAT_INSTRUCTION.to_string(),
                }
            }
            WorkflowState::TodosExtracted if contains_any(&text, FORMATTED_TRIGGERS) => {
                self.advance(WorkflowState::Formatted);
                StepDecision::Advance {
                    instruction: CREATE_INSTRUCTION.to_string(),
                }
            }
            WorkflowState::Formatted if contains_any(&text, CREATED_TRIGGERS) => {
                self.advance(WorkflowState::Completed);
                StepDecision::Complete {
                    reason: "work items created".to_string(),
                }
            }
            _ => {
                debug!(state = %self.state, "no trigger matched, continuing current step");
                StepDecision::Continue
            }
        }
    }

    fn advance(&mut self, next: WorkflowState) {
        info!(from = %self.state, to = %next, "workflow stage transition");
        self.state = next;
    }
}

fn contains_any(text: &str, triggers: &[&str]) -> bool {
    triggers.iter().any(|t| text.contains(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_reply_advances_and_enqueues_format_instruction() {
        let mut machine = WorkflowMachine::new();
        let decision = machine.observe("Found 3 todos: review docs, fix login, update CI");

        assert_eq!(machine.state(), WorkflowState::TodosExtracted);
        match decision {
            StepDecision::Advance { instruction } => {
                assert!(instruction.contains("format"));
                assert!(instruction.contains("structured work items"));
            }
            other => panic!("expected Advance, got {other:?}"),
        }
    }

    #[test]
    fn no_todos_short_circuits_from_initial() {
        let mut machine = WorkflowMachine::new();
        let decision = machine.observe("No todos or action items found in the document.");

        assert_eq!(
            decision,
            StepDecision::Complete {
                reason: "nothing to process".to_string()
            }
        );
        assert_eq!(machine.state(), WorkflowState::Completed);
    }

    #[test]
    fn no_action_items_short_circuits_from_later_state() {
        let mut machine = WorkflowMachine::new();
        machine.observe("found 2 todos");
        let decision = machine.observe("On reflection there are no action items to format.");
        assert!(matches!(decision, StepDecision::Complete { ref reason } if reason == "nothing to process"));
    }

    #[test]
    fn formatted_reply_advances_to_formatted() {
        let mut machine = WorkflowMachine::new();
        machine.observe("extracted 2 todos");
        let decision = machine.observe(
            "Here are the structured work items with description and acceptance criteria.",
        );

        assert_eq!(machine.state(), WorkflowState::Formatted);
        match decision {
            StepDecision::Advance { instruction } => {
                assert!(instruction.contains("tracking system"));
            }
            other => panic!("expected Advance, got {other:?}"),
        }
    }

    #[test]
    fn created_reply_completes_from_formatted() {
        let mut machine = WorkflowMachine::new();
        machine.observe("found 2 todos");
        machine.observe("formatted into work items");
        let decision = machine.observe("Work items created successfully: WI-101, WI-102");

        assert_eq!(machine.state(), WorkflowState::Completed);
        assert!(matches!(decision, StepDecision::Complete { ref reason } if reason == "work items created"));
    }

    #[test]
    fn unmatched_reply_is_a_noop_continue() {
        let mut machine = WorkflowMachine::new();
        let decision = machine.observe("Let me look into that.");
        assert_eq!(decision, StepDecision::Continue);
        assert_eq!(machine.state(), WorkflowState::Initial);
    }

    #[test]
    fn stale_triggers_for_other_states_do_not_fire() {
        let mut machine = WorkflowMachine::new();
        machine.observe("found 2 todos");
        assert_eq!(machine.state(), WorkflowState::TodosExtracted);

        // "created" is a FORMATTED-row trigger; from TODOS_EXTRACTED it is
        // only the "description"/"work item" row that can fire — a reply with
        // neither is a no-op.
        let decision = machine.observe("ok, proceeding");
        assert_eq!(decision, StepDecision::Continue);
        assert_eq!(machine.state(), WorkflowState::TodosExtracted);
    }

    #[test]
    fn state_sequence_is_non_decreasing() {
        let mut machine = WorkflowMachine::new();
        let mut observed = vec![machine.state()];
        for reply in [
            "Found 3 todos",
            "nothing matching here",
            "formatted into structured work items",
            "still working",
            "work items created successfully",
        ] {
            machine.observe(reply);
            observed.push(machine.state());
        }
        assert!(observed.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*observed.last().unwrap(), WorkflowState::Completed);
    }

    #[test]
    fn completed_is_terminal() {
        let mut machine = WorkflowMachine::new();
        machine.observe("no todos found");
        let decision = machine.observe("found more todos after all");
        // The table has no row for COMPLETED; replies are no-ops.
        assert_eq!(machine.state(), WorkflowState::Completed);
        assert!(matches!(decision, StepDecision::Continue));
    }
}
