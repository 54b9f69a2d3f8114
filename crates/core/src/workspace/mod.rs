//! Entity registry consulted during execution.
//!
//! The executor resolves agent and file references through the [`Workspace`]
//! trait. The registry is read-only for the duration of a run; concurrent
//! readers are expected, writers are not.

use mdap_protocol::agent_models::AgentSpec;
use std::collections::HashMap;
use thiserror::Error;

use crate::config::WorkspaceDocs;

/// A reference in a description did not resolve to a known entity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// `use: <name>` named an agent the workspace does not hold.
    #[error("Unknown agent {0:?}")]
    UnknownAgent(String),

    /// A `file(<name>)` strategy reference named an unknown blob.
    #[error("Unknown file {0:?}")]
    UnknownFile(String),

    /// A microstep has neither its own agent nor a pipeline default.
    #[error("Microstep {step:?} has no agent and the pipeline declares no default")]
    MissingAgent { step: String },

    /// No registered provider serves the agent's model.
    #[error("No provider registered for model {model:?}")]
    NoProvider { model: String },
}

/// Read-only lookup surface for named entities.
pub trait Workspace: Send + Sync {
    /// Look up an agent definition by name.
    fn agent(&self, name: &str) -> Option<AgentSpec>;

    /// Look up the contents of a named text blob.
    fn file_contents(&self, name: &str) -> Option<String>;
}

/// Simple in-memory workspace.
#[derive(Debug, Default)]
pub struct InMemoryWorkspace {
    agents: HashMap<String, AgentSpec>,
    files: HashMap<String, String>,
}

impl InMemoryWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent definition, replacing any previous one of the same
    /// name.
    pub fn add_agent(&mut self, agent: AgentSpec) {
        self.agents.insert(agent.name.clone(), agent);
    }

    /// Register a named text blob.
    pub fn add_file(&mut self, name: impl Into<String>, contents: impl Into<String>) {
        self.files.insert(name.into(), contents.into());
    }

    /// Number of registered agents.
    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }
}

impl Workspace for InMemoryWorkspace {
    fn agent(&self, name: &str) -> Option<AgentSpec> {
        self.agents.get(name).cloned()
    }

    fn file_contents(&self, name: &str) -> Option<String> {
        self.files.get(name).cloned()
    }
}

impl From<WorkspaceDocs> for InMemoryWorkspace {
    fn from(docs: WorkspaceDocs) -> Self {
        let mut workspace = InMemoryWorkspace::new();
        for agent in docs.agents {
            workspace.add_agent(agent);
        }
        for (name, contents) in docs.strategies {
            workspace.add_file(name, contents);
        }
        workspace
    }
}
