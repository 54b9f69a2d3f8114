//! Agent description models.
//!
//! Agents are defined as Markdown files with YAML front matter: the front
//! matter carries the metadata, the file body carries the instruction text
//! used as the system prompt.

use serde::{Deserialize, Serialize};

/// An agent's model binding and instruction.
///
/// # Example
///
/// ```markdown
/// ---
/// name: hanoi-solver
/// description: Emits one legal Tower of Hanoi move per invocation
/// model: gpt-4.1-mini
/// ---
///
/// You are a Tower of Hanoi solver. Respond with exactly one move.
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AgentSpec {
    /// Unique identifier used by `use:` references in microsteps.
    pub name: String,

    /// Human-readable description of the agent's purpose.
    #[serde(default)]
    pub description: String,

    /// Model identifier routed to a provider at execution time.
    pub model: String,

    /// The body of the definition file, not part of the front matter.
    ///
    /// Supplies the system prompt; the executor appends its own reliability
    /// preamble when sampling.
    #[serde(skip)]
    pub instruction: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_is_not_serialized() {
        let agent = AgentSpec {
            name: "solver".to_string(),
            description: "test".to_string(),
            model: "test-model".to_string(),
            instruction: "Be terse.".to_string(),
        };

        let json = serde_json::to_string(&agent).unwrap();
        let back: AgentSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, agent.name);
        assert_eq!(back.model, agent.model);
        assert_eq!(back.instruction, "");
    }

    #[test]
    fn test_description_defaults_to_empty() {
        let agent: AgentSpec =
            serde_yaml::from_str("name: solver\nmodel: test-model").unwrap();
        assert_eq!(agent.description, "");
    }
}
