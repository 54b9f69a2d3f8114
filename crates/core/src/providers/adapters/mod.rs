//! Provider adapters.
//!
//! Concrete network-backed providers live outside this crate; the scripted
//! adapter here exists for deterministic tests and local dry runs.

mod scripted;

pub use scripted::{ScriptedOutcome, ScriptedProvider};
