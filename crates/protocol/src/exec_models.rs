//! Execution report models.
//!
//! Per-step outcomes and checkpoints produced while a pipeline runs. These
//! are plain data: the executor appends to them, observers may mirror them
//! to durable storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::value::Value;

/// Outcome of a single committed or failed microstep.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StepResult {
    /// Microstep name (declared, or synthesized as `step-<index>`).
    pub name: String,

    /// Whether the step committed a winner.
    pub success: bool,

    /// The winning action string. Empty when the step failed.
    #[serde(default)]
    pub action: String,

    /// Raw content of the winning sample.
    #[serde(default)]
    pub output: String,

    /// Failure description when the step did not commit.
    #[serde(default)]
    pub error: Option<String>,

    /// Wall-clock time the step took, including all voting rounds.
    pub duration: Duration,
}

/// A recoverable snapshot taken between steps.
///
/// Checkpoints are held in memory and appended in strictly increasing
/// `step_index` order; persisting them is an observer concern.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Checkpoint {
    /// Index of the step about to execute when the snapshot was taken.
    pub step_index: u64,

    /// Deep copy of the execution state at that point.
    pub state: Value,

    /// Wall-clock instant the snapshot was taken.
    pub timestamp: DateTime<Utc>,
}
