//! Lifecycle event system for streaming consumers.
//!
//! Every run emits an ordered event sequence: `PlanReady`, `ToolResult` per
//! attempted step, `Evaluation`, `RetryBegin`/`RetryDone` per repair pass,
//! the reflection triplet when enabled, and a terminal `Done` or
//! `RunFailed`.

use crate::log::RunId;
use crate::plan::Plan;
use crate::record::{ExecutionRecord, ExecutionStats};
use crate::verdict::{EvaluationVerdict, ReflectionVerdict, RetryState};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

/// Lifecycle event emitted by the run coordinator and scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RunEvent {
    /// The oracle produced a validated plan.
    PlanReady {
        /// ID of the run.
        run_id: RunId,
        /// The accepted plan.
        plan: Box<Plan>,
    },
    /// A step attempt finished and its record was appended.
    ToolResult {
        /// ID of the run.
        run_id: RunId,
        /// The appended record.
        record: Box<ExecutionRecord>,
    },
    /// An evaluation verdict was accepted.
    Evaluation {
        /// ID of the run.
        run_id: RunId,
        /// The verdict.
        verdict: Box<EvaluationVerdict>,
    },
    /// A repair pass is starting.
    RetryBegin {
        /// ID of the run.
        run_id: RunId,
        /// Retry progress, including the computed retry chain.
        state: RetryState,
    },
    /// A repair pass finished and global stats were rebuilt.
    RetryDone {
        /// ID of the run.
        run_id: RunId,
        /// Retry progress for the pass that just ended.
        state: RetryState,
        /// Global stats after the pass.
        stats: ExecutionStats,
    },
    /// The reflection pass produced a verdict.
    Reflection {
        /// ID of the run.
        run_id: RunId,
        /// The reflection verdict.
        verdict: Box<ReflectionVerdict>,
    },
    /// A supplemental plan was built from reflection supplements.
    ReflectionPlan {
        /// ID of the run.
        run_id: RunId,
        /// The supplemental plan.
        plan: Box<Plan>,
    },
    /// The supplemental plan was executed.
    ReflectionExec {
        /// ID of the run.
        run_id: RunId,
        /// Stats over the supplemental pass only.
        stats: ExecutionStats,
    },
    /// Normal completion, regardless of the final verdict.
    Done {
        /// ID of the run.
        run_id: RunId,
        /// Final global stats.
        stats: ExecutionStats,
        /// Final accepted verdict.
        verdict: Box<EvaluationVerdict>,
    },
    /// Unrecoverable planning failure; no steps were ever executed.
    RunFailed {
        /// ID of the run.
        run_id: RunId,
        /// What went wrong.
        reason: String,
    },
}

/// Run event channel, a clone-able sender handed to every component.
#[derive(Clone)]
pub struct RunChannel {
    /// Sender used to deliver events to the consumer.
    sender: mpsc::UnboundedSender<RunEvent>,
}

impl RunChannel {
    /// Creates a channel pair; the receiver side is handed to the
    /// streaming consumer.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RunEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Creates a channel from an existing sender (for testing).
    pub fn from_sender(sender: mpsc::UnboundedSender<RunEvent>) -> Self {
        Self { sender }
    }

    /// Sends an event. A closed receiver is logged and otherwise ignored;
    /// execution never depends on a consumer being attached.
    pub fn send(&self, event: RunEvent) {
        if let Err(error) = self.sender.send(event) {
            warn!("Failed to send run event: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_arrive_in_order() {
        let (channel, mut receiver) = RunChannel::new();
        let run_id = RunId::default();

        channel.send(RunEvent::RunFailed {
            run_id,
            reason: "first".to_owned(),
        });
        channel.send(RunEvent::RunFailed {
            run_id,
            reason: "second".to_owned(),
        });

        let first = receiver.try_recv().unwrap();
        assert!(matches!(first, RunEvent::RunFailed { reason, .. } if reason == "first"));
        let second = receiver.try_recv().unwrap();
        assert!(matches!(second, RunEvent::RunFailed { reason, .. } if reason == "second"));
    }

    #[test]
    fn test_send_after_receiver_dropped_is_silent() {
        let (channel, receiver) = RunChannel::new();
        drop(receiver);
        channel.send(RunEvent::RunFailed {
            run_id: RunId::default(),
            reason: "nobody listening".to_owned(),
        });
    }
}
