//! Parallel sampler: fans out one provider call per sample.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use mdap_protocol::value::Value;

use crate::config::MdapConfig;
use crate::providers::{CompletionRequest, CompletionResponse, Provider};

/// Prompt material shared by every sample of a step.
#[derive(Debug)]
pub(crate) struct SampleContext {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
}

/// One raw response from a model for a microstep.
///
/// Samples are ephemeral: they exist for the duration of one step's voting
/// and are dropped once the step commits or fails.
#[derive(Debug, Clone)]
pub(crate) struct Sample {
    /// Raw response content.
    pub content: String,
    /// Completion tokens reported by the provider.
    pub token_count: u32,
    /// Extracted action, filled by the parser.
    pub action: String,
    /// Extracted next state, filled by the parser.
    pub next_state: Value,
    /// All `key = value` lines, filled by the parser.
    pub fields: BTreeMap<String, String>,
    /// Whether this sample was rejected.
    pub red_flagged: bool,
    /// Why it was rejected.
    pub red_flag_reason: String,
}

impl Sample {
    fn from_response(response: CompletionResponse) -> Self {
        Self {
            content: response.content,
            token_count: response.usage.output_tokens,
            action: String::new(),
            next_state: Value::Null,
            fields: BTreeMap::new(),
            red_flagged: false,
            red_flag_reason: String::new(),
        }
    }

    fn failed(reason: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            token_count: 0,
            action: String::new(),
            next_state: Value::Null,
            fields: BTreeMap::new(),
            red_flagged: true,
            red_flag_reason: reason.into(),
        }
    }
}

/// Issue one round of concurrent sample requests.
///
/// Sample 0 of round 0 runs at `temperature_first`; every other sample at
/// `temperature_subsequent`. A provider failure becomes a red-flagged sample
/// rather than an error, so one bad call never poisons the round. The
/// returned handles preserve sample index order; the caller decides how far
/// to drain them.
pub(crate) fn spawn_round(
    provider: &Arc<dyn Provider>,
    context: &Arc<SampleContext>,
    config: &MdapConfig,
    round: u32,
    cancel: &CancellationToken,
) -> Vec<JoinHandle<Sample>> {
    (0..config.parallel_samples as usize)
        .map(|index| {
            let provider = Arc::clone(provider);
            let context = Arc::clone(context);
            let cancel = cancel.clone();
            let temperature = if round == 0 && index == 0 {
                config.temperature_first
            } else {
                config.temperature_subsequent
            };
            let max_tokens = config.max_output_tokens;

            tokio::spawn(async move {
                let request = CompletionRequest {
                    model: context.model.clone(),
                    system_prompt: context.system_prompt.clone(),
                    user_prompt: context.user_prompt.clone(),
                    temperature,
                    max_tokens,
                };

                tokio::select! {
                    _ = cancel.cancelled() => Sample::failed("cancelled before completion"),
                    result = provider.complete(request) => match result {
                        Ok(response) => Sample::from_response(response),
                        Err(error) => Sample::failed(format!("LLM error: {}", error)),
                    },
                }
            })
        })
        .collect()
}
