//! Pipeline description models.
//!
//! This module defines the immutable input consumed by the executor: an MDAP
//! pipeline with its strategy, step budget, initial state, declared
//! configuration, and ordered microstep list. Descriptions are produced by
//! the surface-language parser or loaded from YAML documents; the executor
//! never mutates them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config_models::MdapOverrides;
use crate::value::Value;

/// Source of the strategy preamble injected into every microstep prompt.
///
/// Uses `#[serde(untagged)]` so a YAML document can either inline the text or
/// point at a named file entity:
///
/// ```yaml
/// strategy: "Move one disk per step, never a larger onto a smaller."
/// # or
/// strategy:
///   file: hanoi-strategy
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum StrategySource {
    /// Reference to a named text blob resolved through the workspace.
    File {
        /// Name of the file entity holding the strategy text.
        file: String,
    },

    /// Strategy text provided inline.
    Inline(String),
}

/// Declared number of step iterations.
///
/// Either an explicit count or the literal `infer`, which delegates the
/// estimate to an external collaborator.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(untagged)]
pub enum TotalSteps {
    /// Explicit iteration count.
    Count(u64),
    /// Delegate the count to an external estimator.
    Infer(InferMarker),
}

/// Marker type that deserializes from the literal string "infer".
///
/// This ensures only the exact keyword is accepted where a step count is
/// expected; any other string is a type error at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferMarker;

impl<'de> Deserialize<'de> for InferMarker {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s == "infer" {
            Ok(InferMarker)
        } else {
            Err(serde::de::Error::custom(format!("expected infer, got {}", s)))
        }
    }
}

impl Serialize for InferMarker {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str("infer")
    }
}

/// Structural rejection rules a microstep declares for its samples.
///
/// The three rule families form a conjunction of filters evaluated in
/// declaration order: any regex match, any forbidden substring, or any field
/// outside its allowed set rejects the sample before it can vote.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RedFlagRules {
    /// Regex patterns that must NOT match the sample content.
    #[serde(default)]
    pub regex: Vec<String>,

    /// Substrings that must NOT appear in the sample content.
    #[serde(default)]
    pub contains: Vec<String>,

    /// Per-field allowed-value sets: a parsed field whose value is not in
    /// its set rejects the sample.
    #[serde(default)]
    pub not_in: BTreeMap<String, Vec<String>>,
}

impl RedFlagRules {
    /// True when no rule of any family is declared.
    pub fn is_empty(&self) -> bool {
        self.regex.is_empty() && self.contains.is_empty() && self.not_in.is_empty()
    }
}

/// Declared output schema of a microstep.
///
/// The schema is an ordered set of field descriptions, e.g.
///
/// ```yaml
/// output_schema:
///   move: "disk N from A to B"
///   next_state: "state representation"
/// ```
///
/// Declaration order is preserved so the action key can be identified as the
/// first non-state field. The schema is advisory at the parsing layer;
/// enforcement happens in the red-flag filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputSchema(pub Vec<(String, String)>);

impl OutputSchema {
    /// Key that carries the next-state line: the field named `next_state`,
    /// or the first field whose name ends in `state`.
    pub fn state_key(&self) -> &str {
        self.0
            .iter()
            .find(|(key, _)| key == "next_state" || key.ends_with("state"))
            .map(|(key, _)| key.as_str())
            .unwrap_or("next_state")
    }

    /// Key that carries the action line: the first field that is not the
    /// state key.
    pub fn action_key(&self) -> Option<&str> {
        let state_key = self.state_key().to_string();
        self.0
            .iter()
            .find(|(key, _)| *key != state_key)
            .map(|(key, _)| key.as_str())
    }
}

impl Serialize for OutputSchema {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, description) in &self.0 {
            map.serialize_entry(key, description)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for OutputSchema {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct SchemaVisitor;

        impl<'de> serde::de::Visitor<'de> for SchemaVisitor {
            type Value = OutputSchema;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a map of field names to descriptions")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::MapAccess<'de>,
            {
                let mut fields = Vec::new();
                while let Some((key, value)) = map.next_entry::<String, String>()? {
                    fields.push((key, value));
                }
                Ok(OutputSchema(fields))
            }
        }

        deserializer.deserialize_map(SchemaVisitor)
    }
}

/// The smallest unit of decomposed work: one atomic action per commit.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Microstep {
    /// Unique name; step results are keyed by it.
    pub name: String,

    /// Agent to sample, by name. Falls back to the pipeline default agent
    /// when absent.
    #[serde(rename = "use", default)]
    pub agent: Option<String>,

    /// Step-local task text appended to the prompt.
    #[serde(default)]
    pub prompt: Option<String>,

    /// Step-local context mapping, opaque to the executor.
    #[serde(default)]
    pub context: Value,

    /// Declared output fields; advisory for parsing, binding for rejection.
    #[serde(default)]
    pub output_schema: Option<OutputSchema>,

    /// Structural rejection rules for this step's samples.
    #[serde(default)]
    pub red_flags: RedFlagRules,
}

impl Microstep {
    /// Create a bare microstep with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            agent: None,
            prompt: None,
            context: Value::Null,
            output_schema: None,
            red_flags: RedFlagRules::default(),
        }
    }
}

/// A full MDAP pipeline description.
///
/// # Example
///
/// ```yaml
/// name: solve-hanoi
/// strategy:
///   file: hanoi-strategy
/// agent: hanoi-solver
/// total_steps: 7
/// input:
///   pegs:
///     A: [1, 2, 3]
///     B: []
///     C: []
/// mdap_config:
///   k: 3
///   parallel_samples: 3
/// microsteps:
///   - name: move
///     use: hanoi-solver
///     prompt: "Determine and execute the next move."
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MdapPipeline {
    /// Unique name identifying this pipeline.
    pub name: String,

    /// Strategy preamble injected into every prompt.
    #[serde(default)]
    pub strategy: Option<StrategySource>,

    /// Default agent for microsteps that do not name one, and for
    /// dynamically synthesized steps.
    #[serde(default)]
    pub agent: Option<String>,

    /// Declared step budget. When absent, the microstep list length is used.
    #[serde(default)]
    pub total_steps: Option<TotalSteps>,

    /// Initial execution state.
    #[serde(default)]
    pub input: Value,

    /// Declared MDAP configuration overrides.
    #[serde(rename = "mdap_config", default)]
    pub config: MdapOverrides,

    /// Declared success predicate over the final state. Carried for
    /// external evaluation; the executor does not interpret it.
    #[serde(default)]
    pub success_condition: Option<String>,

    /// Ordered microstep list. May be empty, in which case steps are
    /// synthesized dynamically up to the step budget.
    #[serde(default)]
    pub microsteps: Vec<Microstep>,
}
