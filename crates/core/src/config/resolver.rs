//! Resolution from declared overrides to the effective configuration.

use mdap_protocol::config_models::{KSetting, MdapOverrides};
use regex::Regex;

use crate::config::error::ConfigError;

/// Voting rule applied per microstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VotingStrategy {
    /// Commit as soon as one action leads the runner-up by `k` votes.
    FirstToAheadByK,
    /// Commit the plurality leader once enough samples have been tallied.
    Majority,
}

impl VotingStrategy {
    fn parse(s: &str) -> Result<Self, ConfigError> {
        match s {
            "first-to-ahead-by-k" => Ok(VotingStrategy::FirstToAheadByK),
            "majority" => Ok(VotingStrategy::Majority),
            other => Err(ConfigError::UnknownVotingStrategy(other.to_string())),
        }
    }
}

/// The effective MDAP configuration.
///
/// Built once per execution from the pipeline's declared overrides and
/// immutable thereafter; every unset field has been filled with its default
/// and every set field has passed its bounds check.
#[derive(Debug, Clone)]
pub struct MdapConfig {
    /// Voting rule.
    pub voting_strategy: VotingStrategy,
    /// Vote margin required for consensus.
    pub k: u32,
    /// Samples issued per voting round.
    pub parallel_samples: u32,
    /// Temperature of round 0, sample 0.
    pub temperature_first: f64,
    /// Temperature of every other sample.
    pub temperature_subsequent: f64,
    /// Completion token cap; doubles as the red-flag length threshold.
    pub max_output_tokens: u32,
    /// Whether `output_pattern` is enforced.
    pub require_format: bool,
    /// Compiled pattern the full sample content must match.
    pub output_pattern: Option<Regex>,
    /// Steps between checkpoints; 0 disables checkpointing.
    pub checkpoint_interval: u64,
    /// Maximum voting rounds per step before the step fails.
    pub max_retries: u32,
}

impl Default for MdapConfig {
    fn default() -> Self {
        Self {
            voting_strategy: VotingStrategy::FirstToAheadByK,
            k: 3,
            parallel_samples: 3,
            temperature_first: 0.0,
            temperature_subsequent: 0.1,
            max_output_tokens: 750,
            require_format: true,
            output_pattern: None,
            checkpoint_interval: 1000,
            max_retries: 100,
        }
    }
}

impl MdapConfig {
    /// Resolve declared overrides into an effective configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a field is out of range (`k < 1`,
    /// temperatures outside `[0, 2]`, `parallel_samples < 1`,
    /// `max_retries < 1`), the voting strategy is unknown, the output
    /// pattern does not compile, or `k` uses the unsupported
    /// `auto(min, max)` form.
    pub fn resolve(overrides: &MdapOverrides) -> Result<Self, ConfigError> {
        let mut config = MdapConfig::default();

        if let Some(strategy) = &overrides.voting_strategy {
            config.voting_strategy = VotingStrategy::parse(strategy)?;
        }

        if let Some(k) = &overrides.k {
            let k = match k {
                KSetting::Fixed(n) => *n,
                KSetting::Dynamic(decl) => {
                    return Err(ConfigError::DynamicBounds(decl.clone()))
                }
            };
            if k < 1 {
                return Err(ConfigError::OutOfRange {
                    field: "k",
                    reason: "must be at least 1".to_string(),
                });
            }
            config.k = k;
            // Round size follows the margin unless explicitly overridden.
            config.parallel_samples = k;
        }

        if let Some(parallel) = overrides.parallel_samples {
            if parallel < 1 {
                return Err(ConfigError::OutOfRange {
                    field: "parallel_samples",
                    reason: "must be at least 1".to_string(),
                });
            }
            config.parallel_samples = parallel;
        }

        if let Some(temp) = overrides.temperature_first {
            config.temperature_first = validate_temperature("temperature_first", temp)?;
        }

        if let Some(temp) = overrides.temperature_subsequent {
            config.temperature_subsequent =
                validate_temperature("temperature_subsequent", temp)?;
        }

        if let Some(max_tokens) = overrides.max_output_tokens {
            if max_tokens < 1 {
                return Err(ConfigError::OutOfRange {
                    field: "max_output_tokens",
                    reason: "must be at least 1".to_string(),
                });
            }
            config.max_output_tokens = max_tokens;
        }

        if let Some(require_format) = overrides.require_format {
            config.require_format = require_format;
        }

        if let Some(pattern) = &overrides.output_pattern {
            let compiled = Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;
            config.output_pattern = Some(compiled);
        }

        if let Some(interval) = overrides.checkpoint_interval {
            config.checkpoint_interval = interval;
        }

        if let Some(max_retries) = overrides.max_retries {
            if max_retries < 1 {
                return Err(ConfigError::OutOfRange {
                    field: "max_retries",
                    reason: "must be at least 1".to_string(),
                });
            }
            config.max_retries = max_retries;
        }

        Ok(config)
    }
}

fn validate_temperature(field: &'static str, value: f64) -> Result<f64, ConfigError> {
    if !(0.0..=2.0).contains(&value) {
        return Err(ConfigError::OutOfRange {
            field,
            reason: format!("{} is outside [0, 2]", value),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MdapConfig::resolve(&MdapOverrides::default()).unwrap();
        assert_eq!(config.voting_strategy, VotingStrategy::FirstToAheadByK);
        assert_eq!(config.k, 3);
        assert_eq!(config.parallel_samples, 3);
        assert_eq!(config.temperature_first, 0.0);
        assert_eq!(config.temperature_subsequent, 0.1);
        assert_eq!(config.max_output_tokens, 750);
        assert!(config.require_format);
        assert!(config.output_pattern.is_none());
        assert_eq!(config.checkpoint_interval, 1000);
        assert_eq!(config.max_retries, 100);
    }

    #[test]
    fn test_parallel_samples_follows_k() {
        let overrides = MdapOverrides {
            k: Some(KSetting::Fixed(5)),
            ..Default::default()
        };
        let config = MdapConfig::resolve(&overrides).unwrap();
        assert_eq!(config.k, 5);
        assert_eq!(config.parallel_samples, 5);
    }

    #[test]
    fn test_explicit_parallel_samples_wins_over_k() {
        let overrides = MdapOverrides {
            k: Some(KSetting::Fixed(2)),
            parallel_samples: Some(7),
            ..Default::default()
        };
        let config = MdapConfig::resolve(&overrides).unwrap();
        assert_eq!(config.k, 2);
        assert_eq!(config.parallel_samples, 7);
    }

    #[test]
    fn test_zero_k_rejected() {
        let overrides = MdapOverrides {
            k: Some(KSetting::Fixed(0)),
            ..Default::default()
        };
        let err = MdapConfig::resolve(&overrides).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { field: "k", .. }));
    }

    #[test]
    fn test_dynamic_k_rejected() {
        let overrides = MdapOverrides {
            k: Some(KSetting::Dynamic("auto(1, 5)".to_string())),
            ..Default::default()
        };
        let err = MdapConfig::resolve(&overrides).unwrap_err();
        assert!(matches!(err, ConfigError::DynamicBounds(_)));
    }

    #[test]
    fn test_unknown_voting_strategy_rejected() {
        let overrides = MdapOverrides {
            voting_strategy: Some("best-of-three".to_string()),
            ..Default::default()
        };
        let err = MdapConfig::resolve(&overrides).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownVotingStrategy(_)));
    }

    #[test]
    fn test_majority_strategy_accepted() {
        let overrides = MdapOverrides {
            voting_strategy: Some("majority".to_string()),
            ..Default::default()
        };
        let config = MdapConfig::resolve(&overrides).unwrap();
        assert_eq!(config.voting_strategy, VotingStrategy::Majority);
    }

    #[test]
    fn test_temperature_bounds() {
        for bad in [-0.1, 2.1, f64::NAN] {
            let overrides = MdapOverrides {
                temperature_first: Some(bad),
                ..Default::default()
            };
            assert!(MdapConfig::resolve(&overrides).is_err(), "accepted {}", bad);
        }

        let overrides = MdapOverrides {
            temperature_first: Some(2.0),
            temperature_subsequent: Some(0.0),
            ..Default::default()
        };
        let config = MdapConfig::resolve(&overrides).unwrap();
        assert_eq!(config.temperature_first, 2.0);
        assert_eq!(config.temperature_subsequent, 0.0);
    }

    #[test]
    fn test_invalid_output_pattern_rejected() {
        let overrides = MdapOverrides {
            output_pattern: Some("move = [".to_string()),
            ..Default::default()
        };
        let err = MdapConfig::resolve(&overrides).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }

    #[test]
    fn test_checkpoint_interval_zero_allowed() {
        let overrides = MdapOverrides {
            checkpoint_interval: Some(0),
            ..Default::default()
        };
        let config = MdapConfig::resolve(&overrides).unwrap();
        assert_eq!(config.checkpoint_interval, 0);
    }

    #[test]
    fn test_zero_max_retries_rejected() {
        let overrides = MdapOverrides {
            max_retries: Some(0),
            ..Default::default()
        };
        assert!(MdapConfig::resolve(&overrides).is_err());
    }
}
