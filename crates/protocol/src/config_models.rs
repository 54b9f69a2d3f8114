//! Declared MDAP configuration surface.
//!
//! Every field is optional at this layer; defaults, bounds checking, and the
//! conversion to an immutable effective config happen in the core crate's
//! resolver. Keeping the declared surface loose means a description document
//! round-trips without losing which fields the author actually set.

use serde::{Deserialize, Serialize};

/// Declared value of the voting margin `k`.
///
/// `#[serde(untagged)]`: a plain integer is the common case; the
/// `auto(min, max)` surface syntax arrives as a string and is preserved
/// verbatim for the resolver to judge.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum KSetting {
    /// Fixed vote margin.
    Fixed(u32),
    /// Dynamic-bound declaration such as `auto(1, 5)`, kept unparsed.
    Dynamic(String),
}

/// MDAP configuration overrides as declared on a pipeline.
///
/// ```yaml
/// mdap_config:
///   voting_strategy: "first-to-ahead-by-k"
///   k: 3
///   parallel_samples: 3
///   temperature_first: 0.0
///   temperature_subsequent: 0.1
///   max_output_tokens: 750
///   require_format: true
///   checkpoint_interval: 1000
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct MdapOverrides {
    /// Voting rule: `first-to-ahead-by-k` (default) or `majority`.
    #[serde(default)]
    pub voting_strategy: Option<String>,

    /// Vote margin required for consensus.
    #[serde(default)]
    pub k: Option<KSetting>,

    /// Samples issued per voting round. Defaults to `k`.
    #[serde(default)]
    pub parallel_samples: Option<u32>,

    /// Temperature of round 0, sample 0.
    #[serde(default)]
    pub temperature_first: Option<f64>,

    /// Temperature of every other sample.
    #[serde(default)]
    pub temperature_subsequent: Option<f64>,

    /// Completion token cap; doubles as the red-flag length threshold.
    #[serde(default)]
    pub max_output_tokens: Option<u32>,

    /// Whether `output_pattern` is enforced.
    #[serde(default)]
    pub require_format: Option<bool>,

    /// Regex the full sample content must match.
    #[serde(default)]
    pub output_pattern: Option<String>,

    /// Steps between checkpoints; 0 disables checkpointing.
    #[serde(default)]
    pub checkpoint_interval: Option<u64>,

    /// Maximum voting rounds per step before the step fails.
    #[serde(default)]
    pub max_retries: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_default_is_all_unset() {
        let overrides = MdapOverrides::default();
        assert!(overrides.voting_strategy.is_none());
        assert!(overrides.k.is_none());
        assert!(overrides.parallel_samples.is_none());
        assert!(overrides.output_pattern.is_none());
    }

    #[test]
    fn test_k_setting_fixed_and_dynamic() {
        let fixed: KSetting = serde_yaml::from_str("5").unwrap();
        assert_eq!(fixed, KSetting::Fixed(5));

        let dynamic: KSetting = serde_yaml::from_str("\"auto(1, 5)\"").unwrap();
        assert_eq!(dynamic, KSetting::Dynamic("auto(1, 5)".to_string()));
    }

    #[test]
    fn test_partial_overrides_from_yaml() {
        let overrides: MdapOverrides =
            serde_yaml::from_str("k: 3\nmax_output_tokens: 500").unwrap();
        assert_eq!(overrides.k, Some(KSetting::Fixed(3)));
        assert_eq!(overrides.max_output_tokens, Some(500));
        assert!(overrides.voting_strategy.is_none());
        assert!(overrides.require_format.is_none());
    }
}
