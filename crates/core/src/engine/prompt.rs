//! Microstep prompt assembly.
//!
//! Pure functions of their inputs: identical strategy, state, last action,
//! and step always produce byte-identical prompts. Keeping assembly
//! deterministic keeps provider-side caching effective and makes failed
//! samples reproducible.

use mdap_protocol::pipeline_models::Microstep;
use mdap_protocol::value::Value;

/// Instruction suffix applied to every agent's system prompt.
///
/// Samples that ignore it are exactly the ones the red-flag filter exists to
/// reject.
const RELIABILITY_PREAMBLE: &str = "\
CRITICAL INSTRUCTIONS:
1. Output EXACTLY the required format - no explanations, no extra text
2. Your response must be parseable - format errors will be rejected
3. Think carefully before answering - wrong format indicates confusion
4. Keep your response concise - overly long responses will be rejected";

/// System prompt: the agent's configured instruction plus the reliability
/// preamble.
pub(crate) fn build_system_prompt(instruction: &str) -> String {
    if instruction.is_empty() {
        RELIABILITY_PREAMBLE.to_string()
    } else {
        format!("{}\n\n{}", instruction, RELIABILITY_PREAMBLE)
    }
}

/// User prompt for one microstep.
///
/// Sections are joined by blank lines in a fixed order; empty sections are
/// omitted entirely rather than rendered blank.
pub(crate) fn build_user_prompt(
    strategy: &str,
    state: &Value,
    last_action: &str,
    step: &Microstep,
) -> String {
    let mut parts = Vec::new();

    if !strategy.is_empty() {
        parts.push(format!("## Strategy\n{}", strategy));
    }

    parts.push(format!("## Current State\n{}", state));

    if !last_action.is_empty() {
        parts.push(format!("## Previous Action\n{}", last_action));
    }

    if let Some(prompt) = &step.prompt {
        parts.push(format!("## Task\n{}", prompt));
    }

    let action_key = step
        .output_schema
        .as_ref()
        .and_then(|schema| schema.action_key())
        .unwrap_or("action");
    let state_key = step
        .output_schema
        .as_ref()
        .map(|schema| schema.state_key())
        .unwrap_or("next_state");

    parts.push(format!(
        "## Required Output Format\nRespond with exactly:\n{} = <the action you take>\n{} = <the resulting state>\n\nNo explanations, no extra text.",
        action_key, state_key
    ));

    parts.join("\n\n")
}
