//! Observer events: non-blocking notifications emitted as a run progresses
//!
//! The driver publishes `ChatEvent`s to an optional sink as each reply lands.
//! Emission never blocks orchestration and never fails it: a closed or
//! dropped receiver turns further sends into no-ops.

use tokio::sync::mpsc;
use tracing::trace;

use crate::history::ConversationTurn;
use crate::workflow::WorkflowState;

/// One observable step of a run.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// The seed message entered the conversation.
    Started { task: String },
    /// An agent produced a reply.
    Reply {
        turn: ConversationTurn,
        state: WorkflowState,
        pending_instructions: usize,
    },
    /// The workflow advanced and an instruction was queued for the next round.
    Instruction {
        state: WorkflowState,
        instruction: String,
    },
    /// The run halted.
    Halted { reason: String },
}

/// Fire-and-forget event sink. Cloneable so the driver and engine can share
/// one channel; all sends are non-blocking.
#[derive(Debug, Clone)]
pub struct ObserverSink {
    tx: mpsc::UnboundedSender<ChatEvent>,
}

impl ObserverSink {
    /// Create a sink and the receiver observers drain.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ChatEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Publish an event. A closed receiver is tolerated silently.
    pub fn emit(&self, event: ChatEvent) {
        if self.tx.send(event).is_err() {
            trace!("observer receiver dropped, event discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_arrive_in_emission_order() {
        let (sink, mut rx) = ObserverSink::channel();
        sink.emit(ChatEvent::Started {
            task: "extract todos".into(),
        });
        sink.emit(ChatEvent::Halted {
            reason: "workflow complete".into(),
        });

        assert!(matches!(rx.recv().await, Some(ChatEvent::Started { .. })));
        match rx.recv().await {
            Some(ChatEvent::Halted { reason }) => assert_eq!(reason, "workflow complete"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn dropped_receiver_does_not_fail_emission() {
        let (sink, rx) = ObserverSink::channel();
        drop(rx);
        sink.emit(ChatEvent::Halted {
            reason: "cancelled".into(),
        });
    }
}
