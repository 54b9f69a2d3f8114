//! # mdap-protocol
//!
//! Core protocol definitions and data models for mdap-kit.
//!
//! This crate defines all shared data structures used for:
//! - Pipeline and agent description documents (YAML, Markdown front matter)
//! - The declared MDAP configuration surface
//! - Execution reports: step results and checkpoints
//! - Progress events published by the executor
//!
//! ## Modules
//!
//! - [`value`]: the parsed value union and its canonical rendering
//! - [`agent_models`]: agent description structures
//! - [`pipeline_models`]: pipeline and microstep descriptions
//! - [`config_models`]: declared MDAP configuration overrides
//! - [`exec_models`]: step results and checkpoints
//! - [`events`]: typed progress-event protocol
//!
//! ## Design Principles
//!
//! - Minimal dependencies: only serde, uuid, and chrono
//! - Independent compilation: no dependencies on other mdap-kit crates
//! - Descriptions are immutable inputs; the executor never writes them back

pub mod agent_models;
pub mod config_models;
pub mod events;
pub mod exec_models;
pub mod pipeline_models;
pub mod value;

// Re-export all public types for convenience
pub use agent_models::*;
pub use config_models::*;
pub use events::*;
pub use exec_models::*;
pub use pipeline_models::*;
pub use value::Value;
