//! Top-level error taxonomy for pipeline execution.

use thiserror::Error;

use crate::config::ConfigError;
use crate::workspace::ResolveError;

/// Failures that end a pipeline run.
///
/// Provider failures are deliberately absent: they are recovered locally by
/// red-flagging the affected sample and never escalate to this level.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed or out-of-range configuration, detected before sampling.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A reference in the description did not resolve.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// A step exhausted its voting rounds without reaching the margin.
    #[error(
        "failed to reach consensus after {total_samples} samples ({rejected_samples} rejected)"
    )]
    Consensus {
        total_samples: u64,
        rejected_samples: u64,
    },

    /// The ambient cancellation signal fired.
    #[error("execution cancelled")]
    Cancelled,

    /// Non-provider runtime failure.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl EngineError {
    /// True for [`EngineError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::Cancelled)
    }
}
