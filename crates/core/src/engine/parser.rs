//! Response parsing: extracting the action and next state from raw content.
//!
//! Parsing is deliberately tolerant — leading/trailing whitespace, key
//! casing, and line order are all accepted. A declared output schema only
//! renames the keys being looked for; enforcement of the schema is the
//! red-flag filter's job.

use mdap_protocol::pipeline_models::OutputSchema;
use mdap_protocol::value::Value;
use std::collections::BTreeMap;

/// Fields extracted from one sample's content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResponse {
    /// The action string used as the vote key. Empty on parse failure.
    pub action: String,

    /// The next-state value. [`Value::Null`] when the sample carried no
    /// state line.
    pub next_state: Value,

    /// Every `key = value` line, lowercased keys, for field-level red-flag
    /// checks.
    pub fields: BTreeMap<String, String>,
}

/// Parse a sample's content line by line.
///
/// Lines of the form `<key> = <value>` are collected; the action comes from
/// a line whose key begins with `move` or `action` (or the schema's action
/// key), the next state from a key beginning with `next_state` (or the
/// schema's state key). Later lines overwrite earlier ones.
pub fn parse_response(content: &str, schema: Option<&OutputSchema>) -> ParsedResponse {
    let schema_action_key = schema
        .and_then(|s| s.action_key())
        .map(|k| k.to_lowercase());
    let schema_state_key = schema.map(|s| s.state_key().to_lowercase());

    let mut parsed = ParsedResponse::default();

    for line in content.lines() {
        let line = line.trim();
        let Some((lhs, rhs)) = line.split_once('=') else {
            continue;
        };

        let key = lhs.trim().to_lowercase();
        let value = rhs.trim();
        if key.is_empty() {
            continue;
        }

        parsed.fields.insert(key.clone(), value.to_string());

        let is_action_key = key.starts_with("move")
            || key.starts_with("action")
            || schema_action_key
                .as_deref()
                .is_some_and(|k| key.starts_with(k));
        let is_state_key = key.starts_with("next_state")
            || schema_state_key
                .as_deref()
                .is_some_and(|k| key.starts_with(k));

        // State check first: a schema may name its state key `*state`, which
        // must not be mistaken for an action.
        if is_state_key {
            parsed.next_state = Value::Str(value.to_string());
        } else if is_action_key {
            parsed.action = value.to_string();
        }
    }

    parsed
}
