//! # mdap-core
//!
//! Execution core for massively decomposed agentic processes (MDAP).
//!
//! A task is broken into the smallest meaningful unit of work, several
//! independent samples of each unit run in parallel, structurally suspect
//! samples are rejected before they can vote, and a voting rule selects the
//! consensus action that carries the state forward.
//!
//! This crate provides:
//! - Configuration resolution from declared overrides to an immutable
//!   effective config
//! - Workspace registry for agent and strategy lookups, with a file loader
//! - Provider abstraction and model routing
//! - The pipeline engine: step loop, prompt building, parallel sampling,
//!   red-flag filtering, response parsing, voting, and checkpointing
//!
//! ## Modules
//!
//! - [`config`]: effective configuration and the resolver
//! - [`workspace`]: entity registry and document loader
//! - [`providers`]: completion provider trait, registry, and adapters
//! - [`engine`]: the MDAP executor
//! - [`error`]: the top-level error taxonomy

pub mod config;
pub mod engine;
pub mod error;
pub mod providers;
pub mod workspace;

pub use engine::{ExecutionResult, MdapEngine, StepEstimator};
pub use error::EngineError;
