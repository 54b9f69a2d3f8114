//! Error types for configuration loading and resolution.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading description documents or resolving the
/// effective MDAP configuration. All of these are detected before any
/// sampling occurs.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read a description file from disk.
    #[error("Failed to read file at {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse a YAML pipeline description.
    #[error("Failed to parse YAML file at {path}: {source}")]
    YamlParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    /// Failed to parse an agent definition's front matter.
    #[error("Failed to parse Markdown front matter in {path}: {reason}")]
    MarkdownParse { path: PathBuf, reason: String },

    /// Failed to walk a description directory.
    #[error("Failed to traverse directory {path}: {source}")]
    DirectoryWalk {
        path: PathBuf,
        source: walkdir::Error,
    },

    /// Voting strategy string is not one of the known rules.
    #[error("Unknown voting strategy {0:?} (expected \"first-to-ahead-by-k\" or \"majority\")")]
    UnknownVotingStrategy(String),

    /// A numeric field is outside its allowed range.
    #[error("Invalid {field}: {reason}")]
    OutOfRange { field: &'static str, reason: String },

    /// A declared regex does not compile.
    #[error("Invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    /// The `auto(min, max)` dynamic-bound syntax for `k` is declared but not
    /// supported by this runtime.
    #[error("Dynamic vote margin {0:?} is not supported; declare a fixed k")]
    DynamicBounds(String),

    /// `total_steps: infer` was declared but no estimator is configured.
    #[error("total_steps is \"infer\" but no step estimator is configured")]
    MissingEstimator,
}

/// Type alias for Result with ConfigError.
pub type ConfigResult<T> = Result<T, ConfigError>;
