//! Red-flag filter: structural rejection of samples before they can vote.

use mdap_protocol::pipeline_models::RedFlagRules;
use regex::Regex;

use crate::config::{ConfigError, MdapConfig};
use crate::engine::sampler::Sample;

/// Step-declared rejection rules, compiled once per step.
pub(crate) struct StepRules {
    regexes: Vec<(String, Regex)>,
    contains: Vec<String>,
    not_in: Vec<(String, Vec<String>)>,
}

impl StepRules {
    /// Compile the declared rules. Invalid regexes surface once here, as a
    /// configuration error, instead of once per sample.
    pub fn compile(rules: &RedFlagRules) -> Result<Self, ConfigError> {
        let mut regexes = Vec::with_capacity(rules.regex.len());
        for pattern in &rules.regex {
            let compiled = Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;
            regexes.push((pattern.clone(), compiled));
        }

        Ok(Self {
            regexes,
            contains: rules.contains.clone(),
            not_in: rules
                .not_in
                .iter()
                .map(|(field, allowed)| (field.clone(), allowed.clone()))
                .collect(),
        })
    }

    pub fn empty() -> Self {
        Self {
            regexes: Vec::new(),
            contains: Vec::new(),
            not_in: Vec::new(),
        }
    }
}

/// Check one parsed sample against every rejection rule.
///
/// Rules are evaluated in a fixed order and the first hit wins; the reason
/// is recorded on the sample. Returns true when the sample is rejected.
pub(crate) fn evaluate(
    sample: &mut Sample,
    config: &MdapConfig,
    rules: &StepRules,
    schema_declared: bool,
) -> bool {
    // Provider failures arrive pre-flagged with their reason set.
    if sample.red_flagged {
        return true;
    }

    if sample.token_count > config.max_output_tokens {
        return flag(
            sample,
            format!(
                "response too long: {} tokens > {}",
                sample.token_count, config.max_output_tokens
            ),
        );
    }

    if config.require_format {
        if let Some(pattern) = &config.output_pattern {
            if !pattern.is_match(&sample.content) {
                return flag(sample, "response does not match required format".to_string());
            }
        }
    }

    // An empty action is only tolerable when the step declared no schema
    // and the content itself can stand in as the vote key.
    if sample.action.is_empty() && (schema_declared || sample.content.trim().is_empty()) {
        return flag(sample, "could not extract action from response".to_string());
    }

    for (pattern, regex) in &rules.regexes {
        if regex.is_match(&sample.content) {
            return flag(sample, format!("matched red-flag pattern {:?}", pattern));
        }
    }

    for forbidden in &rules.contains {
        if sample.content.contains(forbidden) {
            return flag(sample, format!("contains forbidden text {:?}", forbidden));
        }
    }

    for (field, allowed) in &rules.not_in {
        if let Some(value) = sample.fields.get(field) {
            if !allowed.contains(value) {
                return flag(
                    sample,
                    format!("field {:?} value {:?} not in allowed set", field, value),
                );
            }
        }
    }

    false
}

fn flag(sample: &mut Sample, reason: String) -> bool {
    sample.red_flagged = true;
    sample.red_flag_reason = reason;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdap_protocol::value::Value;
    use std::collections::BTreeMap;

    fn sample(content: &str, token_count: u32, action: &str) -> Sample {
        Sample {
            content: content.to_string(),
            token_count,
            action: action.to_string(),
            next_state: Value::Null,
            fields: BTreeMap::new(),
            red_flagged: false,
            red_flag_reason: String::new(),
        }
    }

    #[test]
    fn test_token_overrun_is_flagged() {
        let config = MdapConfig {
            max_output_tokens: 100,
            ..Default::default()
        };
        let mut s = sample("move = a", 150, "a");

        assert!(evaluate(&mut s, &config, &StepRules::empty(), false));
        assert!(s.red_flag_reason.contains("too long"));
    }

    #[test]
    fn test_output_pattern_enforced_only_when_required() {
        let mut config = MdapConfig {
            output_pattern: Some(Regex::new(r"^move = ").unwrap()),
            ..Default::default()
        };
        let mut s = sample("sure! the move is...", 10, "the move");

        assert!(evaluate(&mut s, &config, &StepRules::empty(), false));
        assert!(s.red_flag_reason.contains("format"));

        config.require_format = false;
        let mut s = sample("sure! the move is...", 10, "the move");
        assert!(!evaluate(&mut s, &config, &StepRules::empty(), false));
    }

    #[test]
    fn test_empty_action_with_schema_is_flagged() {
        let config = MdapConfig::default();

        let mut with_schema = sample("prose only", 10, "");
        assert!(evaluate(&mut with_schema, &config, &StepRules::empty(), true));
        assert!(with_schema.red_flag_reason.contains("extract action"));

        // Without a schema the full content may stand in as the vote key.
        let mut without_schema = sample("prose only", 10, "");
        assert!(!evaluate(&mut without_schema, &config, &StepRules::empty(), false));

        // Unless there is no content to stand in.
        let mut blank = sample("   ", 10, "");
        assert!(evaluate(&mut blank, &config, &StepRules::empty(), false));
    }

    #[test]
    fn test_step_regex_rule() {
        let config = MdapConfig::default();
        let rules = StepRules::compile(&RedFlagRules {
            regex: vec!["(?i)i cannot".to_string()],
            ..Default::default()
        })
        .unwrap();

        let mut s = sample("I CANNOT solve this\nmove = none", 10, "none");
        assert!(evaluate(&mut s, &config, &rules, false));
        assert!(s.red_flag_reason.contains("pattern"));
    }

    #[test]
    fn test_step_contains_rule() {
        let config = MdapConfig::default();
        let rules = StepRules::compile(&RedFlagRules {
            contains: vec!["as an AI".to_string()],
            ..Default::default()
        })
        .unwrap();

        let mut s = sample("as an AI, move = a", 10, "a");
        assert!(evaluate(&mut s, &config, &rules, false));
    }

    #[test]
    fn test_not_in_rule_checks_parsed_fields() {
        let config = MdapConfig::default();
        let mut not_in = BTreeMap::new();
        not_in.insert(
            "move".to_string(),
            vec!["disk 1 from A to B".to_string(), "disk 1 from A to C".to_string()],
        );
        let rules = StepRules::compile(&RedFlagRules {
            not_in,
            ..Default::default()
        })
        .unwrap();

        let mut bad = sample("move = disk 9 from A to Z", 10, "disk 9 from A to Z");
        bad.fields
            .insert("move".to_string(), "disk 9 from A to Z".to_string());
        assert!(evaluate(&mut bad, &config, &rules, false));
        assert!(bad.red_flag_reason.contains("allowed set"));

        let mut good = sample("move = disk 1 from A to C", 10, "disk 1 from A to C");
        good.fields
            .insert("move".to_string(), "disk 1 from A to C".to_string());
        assert!(!evaluate(&mut good, &config, &rules, false));
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let config = MdapConfig {
            max_output_tokens: 5,
            ..Default::default()
        };
        let rules = StepRules::compile(&RedFlagRules {
            contains: vec!["move".to_string()],
            ..Default::default()
        })
        .unwrap();

        // Both the length rule and the contains rule apply; length comes
        // first in the evaluation order.
        let mut s = sample("move = a", 50, "a");
        assert!(evaluate(&mut s, &config, &rules, false));
        assert!(s.red_flag_reason.contains("too long"));
    }

    #[test]
    fn test_invalid_step_regex_is_a_config_error() {
        let result = StepRules::compile(&RedFlagRules {
            regex: vec!["(unclosed".to_string()],
            ..Default::default()
        });
        assert!(matches!(result, Err(ConfigError::InvalidPattern { .. })));
    }

    #[test]
    fn test_clean_sample_passes() {
        let config = MdapConfig::default();
        let mut s = sample("move = disk 1 from A to C", 20, "disk 1 from A to C");
        assert!(!evaluate(&mut s, &config, &StepRules::empty(), false));
        assert!(!s.red_flagged);
        assert!(s.red_flag_reason.is_empty());
    }
}
