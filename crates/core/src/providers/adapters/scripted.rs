//! Scripted provider for deterministic testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::providers::base::{
    CompletionRequest, CompletionResponse, Provider, ProviderError, Usage,
};

/// One scripted call outcome.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    /// Return a completion with the given content and token count.
    Reply {
        content: String,
        output_tokens: u32,
    },
    /// Fail the call with a provider error.
    Fail(ProviderError),
}

impl ScriptedOutcome {
    /// Successful reply outcome.
    pub fn reply(content: impl Into<String>, output_tokens: u32) -> Self {
        ScriptedOutcome::Reply {
            content: content.into(),
            output_tokens,
        }
    }
}

/// A provider that replays a scripted sequence of outcomes.
///
/// Calls consume the script front to back; once the script runs dry the
/// final outcome is replayed indefinitely. Alternatively, a script can be
/// keyed by call index (see [`ScriptedProvider::with_indexed_outcomes`]) to
/// pin one outcome per sample position within a round. Every request is
/// recorded so tests can assert on temperatures and prompts.
#[derive(Debug)]
pub struct ScriptedProvider {
    name: String,
    script: Mutex<VecDeque<ScriptedOutcome>>,
    by_index: Mutex<Vec<ScriptedOutcome>>,
    cursor: AtomicUsize,
    fallback: Mutex<Option<ScriptedOutcome>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::named("scripted")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(VecDeque::new()),
            by_index: Mutex::new(Vec::new()),
            cursor: AtomicUsize::new(0),
            fallback: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer the n-th call with the n-th outcome, replaying the final
    /// entry once calls run past the end. Takes precedence over the queue.
    ///
    /// Entries are keyed by call arrival order. The sampler spawns a
    /// round's requests in sample-index order and the single-threaded test
    /// runtime polls them in spawn order, so under `#[tokio::test]` entry n
    /// reaches sample n deterministically.
    pub fn with_indexed_outcomes(self, outcomes: Vec<ScriptedOutcome>) -> Self {
        *self.by_index.lock().unwrap() = outcomes;
        self
    }

    /// Answer every call with the same content.
    pub fn always(self, content: impl Into<String>, output_tokens: u32) -> Self {
        *self.fallback.lock().unwrap() = Some(ScriptedOutcome::Reply {
            content: content.into(),
            output_tokens,
        });
        self
    }

    /// Fail every call with the same error.
    pub fn always_failing(self, error: ProviderError) -> Self {
        *self.fallback.lock().unwrap() = Some(ScriptedOutcome::Fail(error));
        self
    }

    /// Queue a successful reply.
    pub fn push_reply(&self, content: impl Into<String>, output_tokens: u32) {
        self.push(ScriptedOutcome::Reply {
            content: content.into(),
            output_tokens,
        });
    }

    /// Queue the same reply several times, e.g. once per parallel sample.
    pub fn push_replies(&self, content: impl Into<String>, output_tokens: u32, copies: usize) {
        let content = content.into();
        for _ in 0..copies {
            self.push_reply(content.clone(), output_tokens);
        }
    }

    /// Queue a provider failure.
    pub fn push_failure(&self, error: ProviderError) {
        self.push(ScriptedOutcome::Fail(error));
    }

    fn push(&self, outcome: ScriptedOutcome) {
        self.script.lock().unwrap().push_back(outcome);
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn next_outcome(&self) -> Option<ScriptedOutcome> {
        {
            let by_index = self.by_index.lock().unwrap();
            if !by_index.is_empty() {
                let call = self.cursor.fetch_add(1, Ordering::SeqCst);
                return by_index.get(call).or_else(|| by_index.last()).cloned();
            }
        }

        let mut script = self.script.lock().unwrap();
        match script.pop_front() {
            Some(outcome) => {
                *self.fallback.lock().unwrap() = Some(outcome.clone());
                Some(outcome)
            }
            None => self.fallback.lock().unwrap().clone(),
        }
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);

        match self.next_outcome() {
            Some(ScriptedOutcome::Reply {
                content,
                output_tokens,
            }) => Ok(CompletionResponse {
                content,
                usage: Usage { output_tokens },
            }),
            Some(ScriptedOutcome::Fail(error)) => Err(error),
            None => Err(ProviderError::Unavailable(
                "scripted provider has no outcomes".to_string(),
            )),
        }
    }
}
