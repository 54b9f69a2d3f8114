//! Progress-event protocol.
//!
//! Typed lifecycle events published by the executor over an asynchronous
//! channel. Delivery is best-effort from the executor's perspective: a slow
//! or absent observer never stalls a step. Observers that persist
//! checkpoints or render progress subscribe to this stream.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Lifecycle events emitted while a pipeline executes.
///
/// Uses tagged serialization so external observers can dispatch on `type`:
///
/// ```json
/// {
///   "type": "step",
///   "payload": {
///     "execution_id": "uuid-here",
///     "step": "step-200",
///     "index": 200,
///     "progress": 20,
///     "message": "Step 201/1000: step-200"
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ProgressEvent {
    /// Execution has started.
    Start {
        execution_id: Uuid,
        pipeline: String,
        total_steps: u64,
        message: String,
    },

    /// A step committed, or a checkpoint was taken.
    ///
    /// Step events are throttled upstream; checkpoint notices use the step
    /// name `checkpoint-<index>` and bypass the throttle.
    Step {
        execution_id: Uuid,
        step: String,
        index: u64,
        /// Completion percentage, `floor(index * 100 / total_steps)`.
        progress: u8,
        message: String,
    },

    /// Execution failed; the message carries the error rendering.
    Error {
        execution_id: Uuid,
        step: Option<String>,
        message: String,
    },

    /// Execution finished successfully.
    ///
    /// Metadata carries the final counters: `total_steps`, `total_samples`,
    /// `rejected_samples`, and `duration`.
    Complete {
        execution_id: Uuid,
        message: String,
        metadata: BTreeMap<String, String>,
    },
}

impl ProgressEvent {
    /// The execution this event belongs to.
    pub fn execution_id(&self) -> Uuid {
        match self {
            ProgressEvent::Start { execution_id, .. }
            | ProgressEvent::Step { execution_id, .. }
            | ProgressEvent::Error { execution_id, .. }
            | ProgressEvent::Complete { execution_id, .. } => *execution_id,
        }
    }
}

/// Completion percentage for a step index within a budget.
pub fn progress_percent(step_index: u64, total_steps: u64) -> u8 {
    if total_steps == 0 {
        return 100;
    }
    ((step_index * 100) / total_steps).min(100) as u8
}
