//! Voting arbiter: consensus selection across parallel samples.
//!
//! The tally is cumulative across rounds within one step and resets at step
//! boundaries. Samples are processed strictly in index order so the stop
//! point is deterministic given a fixed stream of sample contents; do not
//! reorder sample processing.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use mdap_protocol::pipeline_models::Microstep;
use mdap_protocol::value::Value;

use crate::config::{MdapConfig, VotingStrategy};
use crate::engine::parser::parse_response;
use crate::engine::red_flag::{self, StepRules};
use crate::engine::sampler::{spawn_round, Sample, SampleContext};
use crate::error::EngineError;
use crate::providers::Provider;

/// Counters accumulated across a whole execution.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct VoteCounters {
    pub total_samples: u64,
    pub rejected_samples: u64,
    pub voting_rounds: u64,
}

/// The winning sample of one step.
#[derive(Debug, Clone)]
pub(crate) struct StepVerdict {
    pub action: String,
    pub content: String,
    pub next_state: Value,
}

struct TallyEntry {
    action: String,
    count: u32,
    representative: Sample,
}

/// Cumulative vote tally for one step.
///
/// Entries keep insertion order: ties on count resolve in favor of the
/// earlier-inserted action, and the representative sample of an action is
/// the first one seen carrying it.
pub(crate) struct VoteTally {
    entries: Vec<TallyEntry>,
}

impl VoteTally {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Record one vote for `action`.
    pub fn record(&mut self, action: String, sample: Sample) {
        match self.entries.iter_mut().find(|e| e.action == action) {
            Some(entry) => entry.count += 1,
            None => self.entries.push(TallyEntry {
                action,
                count: 1,
                representative: sample,
            }),
        }
    }

    /// Total votes cast so far.
    pub fn total(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.count)).sum()
    }

    /// Whether more than one distinct action has received votes.
    pub fn contested(&self) -> bool {
        self.entries.len() > 1
    }

    /// Lead of the front-runner over the runner-up (front-runner's count
    /// when it has no competitor).
    pub fn margin(&self) -> u32 {
        let mut top = 0u32;
        let mut second = 0u32;
        for entry in &self.entries {
            if entry.count > top {
                second = top;
                top = entry.count;
            } else if entry.count > second {
                second = entry.count;
            }
        }
        top - second
    }

    /// The current plurality leader, ties broken by insertion order.
    fn leader(&self) -> Option<&TallyEntry> {
        self.entries.iter().fold(None, |best: Option<&TallyEntry>, entry| {
            match best {
                Some(current) if current.count >= entry.count => Some(current),
                _ => Some(entry),
            }
        })
    }

    /// Verdict built from the current leader.
    pub fn winner(&self) -> Option<StepVerdict> {
        self.leader().map(|entry| StepVerdict {
            action: entry.action.clone(),
            content: entry.representative.content.clone(),
            next_state: entry.representative.next_state.clone(),
        })
    }
}

/// Run the voting procedure for one microstep.
///
/// Issues up to `max_retries` rounds of parallel samples, filtering and
/// tallying each in index order. Under first-to-ahead-by-k a contested
/// tally short-circuits the round the moment the leader's margin over the
/// runner-up reaches `k`, aborting the remaining in-flight samples without
/// counting them; an uncontested action cannot demonstrate a lead mid-round
/// and commits at the round boundary once it holds `k` votes.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn run_voting(
    provider: Arc<dyn Provider>,
    context: Arc<SampleContext>,
    step: &Microstep,
    config: &MdapConfig,
    rules: &StepRules,
    cancel: &CancellationToken,
    counters: &mut VoteCounters,
) -> Result<StepVerdict, EngineError> {
    let mut tally = VoteTally::new();
    let mut step_samples = 0u64;
    let mut step_rejected = 0u64;
    let schema_declared = step.output_schema.is_some();

    for round in 0..config.max_retries {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        counters.voting_rounds += 1;
        let mut handles = spawn_round(&provider, &context, config, round, cancel).into_iter();

        while let Some(handle) = handles.next() {
            let mut sample = match handle.await {
                Ok(sample) => sample,
                Err(join_error) => {
                    handles.for_each(|h| h.abort());
                    return Err(EngineError::Fatal(format!(
                        "sample task failed: {}",
                        join_error
                    )));
                }
            };

            if cancel.is_cancelled() {
                handles.for_each(|h| h.abort());
                return Err(EngineError::Cancelled);
            }

            counters.total_samples += 1;
            step_samples += 1;

            if !sample.red_flagged {
                let parsed = parse_response(&sample.content, step.output_schema.as_ref());
                sample.action = parsed.action;
                sample.next_state = parsed.next_state;
                sample.fields = parsed.fields;
            }

            if red_flag::evaluate(&mut sample, config, rules, schema_declared) {
                counters.rejected_samples += 1;
                step_rejected += 1;
                debug!(
                    step = %step.name,
                    round,
                    reason = %sample.red_flag_reason,
                    "sample rejected"
                );
                continue;
            }

            let action = if sample.action.is_empty() {
                sample.content.clone()
            } else {
                sample.action.clone()
            };
            tally.record(action, sample);

            if config.voting_strategy == VotingStrategy::FirstToAheadByK
                && tally.contested()
                && tally.margin() >= config.k
            {
                handles.for_each(|h| h.abort());
                let verdict = tally.winner().ok_or_else(|| {
                    EngineError::Fatal("winner vanished from tally".to_string())
                })?;
                debug!(
                    step = %step.name,
                    round,
                    action = %verdict.action,
                    samples = step_samples,
                    "margin reached"
                );
                return Ok(verdict);
            }
        }

        if config.voting_strategy == VotingStrategy::FirstToAheadByK
            && tally.margin() >= config.k
        {
            let verdict = tally
                .winner()
                .ok_or_else(|| EngineError::Fatal("winner vanished from tally".to_string()))?;
            debug!(
                step = %step.name,
                round,
                action = %verdict.action,
                samples = step_samples,
                "uncontested margin at round end"
            );
            return Ok(verdict);
        }

        if config.voting_strategy == VotingStrategy::Majority
            && tally.total() >= u64::from(3 * config.k)
        {
            let verdict = tally
                .winner()
                .ok_or_else(|| EngineError::Fatal("winner vanished from tally".to_string()))?;
            debug!(
                step = %step.name,
                round,
                action = %verdict.action,
                samples = step_samples,
                "majority reached"
            );
            return Ok(verdict);
        }
    }

    Err(EngineError::Consensus {
        total_samples: step_samples,
        rejected_samples: step_rejected,
    })
}
