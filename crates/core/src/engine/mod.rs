//! The MDAP execution engine.
//!
//! The engine takes a fully-parsed pipeline description and an initial
//! state, and drives the step loop: build the microstep prompt, fan out
//! parallel samples, reject structurally suspect ones, vote, and thread the
//! winner's next state into the following step. Steps are strictly
//! sequential; the state dependency between them is a hard serialization
//! point.

mod parser;
mod prompt;
mod red_flag;
mod sampler;
mod voting;

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use mdap_protocol::events::{progress_percent, ProgressEvent};
use mdap_protocol::exec_models::{Checkpoint, StepResult};
use mdap_protocol::pipeline_models::{MdapPipeline, Microstep, StrategySource, TotalSteps};
use mdap_protocol::value::Value;

use crate::config::{ConfigError, MdapConfig};
use crate::engine::red_flag::StepRules;
use crate::engine::sampler::SampleContext;
use crate::engine::voting::{run_voting, StepVerdict, VoteCounters};
use crate::error::EngineError;
use crate::providers::ProviderRegistry;
use crate::workspace::{ResolveError, Workspace};

/// External estimator consulted for `total_steps: infer`.
///
/// The codebase-analysis estimator lives outside this crate; executions that
/// declare `infer` without one configured fail before any sampling.
pub trait StepEstimator: Send + Sync {
    /// Estimate the step budget for a pipeline.
    fn estimate(&self, pipeline: &MdapPipeline) -> Result<u64, EngineError>;
}

/// Outcome of one pipeline execution.
///
/// Always produced, success or not: on failure the committed state, step
/// results, checkpoints, and counters up to the failure point are preserved
/// for post-mortem.
#[derive(Debug)]
pub struct ExecutionResult {
    /// Unique id of this execution.
    pub id: Uuid,

    /// Whether every step committed.
    pub success: bool,

    /// The failure that ended the run, when `success` is false.
    pub error: Option<EngineError>,

    /// Final (or last committed) execution state.
    pub final_state: Value,

    /// Per-step outcomes, keyed by microstep name.
    pub step_results: BTreeMap<String, StepResult>,

    /// Checkpoints taken, in strictly increasing step order.
    pub checkpoints: Vec<Checkpoint>,

    /// Steps that ran to a verdict, committed or failed. A step cancelled
    /// before reaching one does not count.
    pub total_microsteps: u64,

    /// Samples processed across all steps and rounds.
    pub total_samples: u64,

    /// Samples rejected by the red-flag filter.
    pub rejected_samples: u64,

    /// Voting rounds across all steps.
    pub voting_rounds: u64,

    /// When the execution started.
    pub started_at: DateTime<Utc>,

    /// Wall-clock duration of the execution.
    pub duration: Duration,
}

impl ExecutionResult {
    fn new(initial_state: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            success: false,
            error: None,
            final_state: initial_state,
            step_results: BTreeMap::new(),
            checkpoints: Vec::new(),
            total_microsteps: 0,
            total_samples: 0,
            rejected_samples: 0,
            voting_rounds: 0,
            started_at: Utc::now(),
            duration: Duration::ZERO,
        }
    }
}

/// The MDAP executor.
pub struct MdapEngine {
    workspace: Arc<dyn Workspace>,
    providers: Arc<ProviderRegistry>,
    estimator: Option<Arc<dyn StepEstimator>>,
}

impl MdapEngine {
    /// Create an engine over a workspace and a provider registry.
    pub fn new(workspace: Arc<dyn Workspace>, providers: ProviderRegistry) -> Self {
        Self {
            workspace,
            providers: Arc::new(providers),
            estimator: None,
        }
    }

    /// Attach a step estimator for pipelines declaring `total_steps: infer`.
    #[must_use]
    pub fn with_estimator(mut self, estimator: Arc<dyn StepEstimator>) -> Self {
        self.estimator = Some(estimator);
        self
    }

    /// Execute a pipeline to completion, failure, or cancellation.
    ///
    /// Progress events are published on `events_tx` with best-effort
    /// delivery; a slow observer loses events rather than stalling a step.
    /// Cancellation is observed between steps and propagated into every
    /// in-flight provider call.
    #[instrument(skip_all, fields(pipeline = %pipeline.name))]
    pub async fn run(
        &self,
        pipeline: &MdapPipeline,
        events_tx: mpsc::Sender<ProgressEvent>,
        cancel: CancellationToken,
    ) -> ExecutionResult {
        let started = Instant::now();
        let mut result = ExecutionResult::new(pipeline.input.clone());

        match self
            .execute(pipeline, &mut result, &events_tx, &cancel)
            .await
        {
            Ok(()) => {
                result.success = true;
                result.duration = started.elapsed();
                info!(
                    execution_id = %result.id,
                    steps = result.total_microsteps,
                    samples = result.total_samples,
                    rejected = result.rejected_samples,
                    "pipeline completed"
                );

                let mut metadata = BTreeMap::new();
                metadata.insert("total_steps".to_string(), result.total_microsteps.to_string());
                metadata.insert("total_samples".to_string(), result.total_samples.to_string());
                metadata.insert(
                    "rejected_samples".to_string(),
                    result.rejected_samples.to_string(),
                );
                metadata.insert("duration".to_string(), format!("{:?}", result.duration));

                emit(
                    &events_tx,
                    ProgressEvent::Complete {
                        execution_id: result.id,
                        message: format!(
                            "Pipeline {} completed: {} steps, {} samples, {} rejected",
                            pipeline.name,
                            result.total_microsteps,
                            result.total_samples,
                            result.rejected_samples
                        ),
                        metadata,
                    },
                );
            }
            Err(error) => {
                result.duration = started.elapsed();
                warn!(execution_id = %result.id, %error, "pipeline failed");

                let failing_step = result
                    .step_results
                    .values()
                    .find(|step| !step.success)
                    .map(|step| step.name.clone());
                emit(
                    &events_tx,
                    ProgressEvent::Error {
                        execution_id: result.id,
                        step: failing_step,
                        message: error.to_string(),
                    },
                );

                result.error = Some(error);
            }
        }

        result
    }

    async fn execute(
        &self,
        pipeline: &MdapPipeline,
        result: &mut ExecutionResult,
        events_tx: &mpsc::Sender<ProgressEvent>,
        cancel: &CancellationToken,
    ) -> Result<(), EngineError> {
        let config = MdapConfig::resolve(&pipeline.config)?;
        let strategy = self.resolve_strategy(pipeline)?;
        let total_steps = self.resolve_total_steps(pipeline)?;

        info!(
            total_steps,
            k = config.k,
            parallel_samples = config.parallel_samples,
            "starting MDAP pipeline"
        );
        emit(
            events_tx,
            ProgressEvent::Start {
                execution_id: result.id,
                pipeline: pipeline.name.clone(),
                total_steps,
                message: format!(
                    "Executing MDAP pipeline {} with {} steps",
                    pipeline.name, total_steps
                ),
            },
        );

        let mut counters = VoteCounters::default();
        let mut last_action = String::new();

        for step_index in 0..total_steps {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            if config.checkpoint_interval > 0
                && step_index > 0
                && step_index % config.checkpoint_interval == 0
            {
                self.take_checkpoint(result, step_index, total_steps, events_tx);
            }

            let step = select_microstep(pipeline, step_index);
            let step_started = Instant::now();

            let outcome = self
                .run_step(
                    pipeline,
                    &step,
                    &config,
                    &strategy,
                    &result.final_state,
                    &last_action,
                    cancel,
                    &mut counters,
                )
                .await;

            result.total_samples = counters.total_samples;
            result.rejected_samples = counters.rejected_samples;
            result.voting_rounds = counters.voting_rounds;

            match outcome {
                Ok(verdict) => {
                    result.total_microsteps += 1;
                    result.step_results.insert(
                        step.name.clone(),
                        StepResult {
                            name: step.name.clone(),
                            success: true,
                            action: verdict.action.clone(),
                            output: verdict.content,
                            error: None,
                            duration: step_started.elapsed(),
                        },
                    );

                    // State transitions are total: a winner without a state
                    // line threads the prior state forward unchanged.
                    if !verdict.next_state.is_null() {
                        result.final_state = verdict.next_state;
                    }
                    last_action = verdict.action;

                    let terminal = step_index + 1 == total_steps;
                    if step_index < 10 || step_index % 100 == 0 || terminal {
                        emit(
                            events_tx,
                            ProgressEvent::Step {
                                execution_id: result.id,
                                step: step.name.clone(),
                                index: step_index,
                                progress: progress_percent(step_index, total_steps),
                                message: format!(
                                    "Step {}/{}: {}",
                                    step_index + 1,
                                    total_steps,
                                    step.name
                                ),
                            },
                        );
                    }
                }
                Err(error) => {
                    if !error.is_cancelled() {
                        result.total_microsteps += 1;
                    }
                    result.step_results.insert(
                        step.name.clone(),
                        StepResult {
                            name: step.name.clone(),
                            success: false,
                            action: String::new(),
                            output: String::new(),
                            error: Some(error.to_string()),
                            duration: step_started.elapsed(),
                        },
                    );
                    return Err(error);
                }
            }
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_step(
        &self,
        pipeline: &MdapPipeline,
        step: &Microstep,
        config: &MdapConfig,
        strategy: &str,
        state: &Value,
        last_action: &str,
        cancel: &CancellationToken,
        counters: &mut VoteCounters,
    ) -> Result<StepVerdict, EngineError> {
        let agent_name = step
            .agent
            .as_deref()
            .or(pipeline.agent.as_deref())
            .ok_or_else(|| ResolveError::MissingAgent {
                step: step.name.clone(),
            })?;
        let agent = self
            .workspace
            .agent(agent_name)
            .ok_or_else(|| ResolveError::UnknownAgent(agent_name.to_string()))?;
        let provider = self.providers.for_model(&agent.model)?;
        let rules = StepRules::compile(&step.red_flags)?;

        let context = Arc::new(SampleContext {
            model: agent.model.clone(),
            system_prompt: prompt::build_system_prompt(&agent.instruction),
            user_prompt: prompt::build_user_prompt(strategy, state, last_action, step),
        });

        run_voting(provider, context, step, config, &rules, cancel, counters).await
    }

    fn resolve_strategy(&self, pipeline: &MdapPipeline) -> Result<String, EngineError> {
        match &pipeline.strategy {
            None => Ok(String::new()),
            Some(StrategySource::Inline(text)) => Ok(text.clone()),
            Some(StrategySource::File { file }) => self
                .workspace
                .file_contents(file)
                .ok_or_else(|| ResolveError::UnknownFile(file.clone()).into()),
        }
    }

    fn resolve_total_steps(&self, pipeline: &MdapPipeline) -> Result<u64, EngineError> {
        match pipeline.total_steps {
            Some(TotalSteps::Count(count)) => Ok(count),
            Some(TotalSteps::Infer(_)) => match &self.estimator {
                Some(estimator) => estimator.estimate(pipeline),
                None => Err(ConfigError::MissingEstimator.into()),
            },
            None => Ok(pipeline.microsteps.len() as u64),
        }
    }

    fn take_checkpoint(
        &self,
        result: &mut ExecutionResult,
        step_index: u64,
        total_steps: u64,
        events_tx: &mpsc::Sender<ProgressEvent>,
    ) {
        result.checkpoints.push(Checkpoint {
            step_index,
            state: result.final_state.clone(),
            timestamp: Utc::now(),
        });
        debug!(step_index, "checkpoint taken");

        // Checkpoint notices bypass the step-event throttle.
        emit(
            events_tx,
            ProgressEvent::Step {
                execution_id: result.id,
                step: format!("checkpoint-{}", step_index),
                index: step_index,
                progress: progress_percent(step_index, total_steps),
                message: format!("Checkpoint at step {}", step_index),
            },
        );
    }
}

/// Select the declared microstep at `step_index`, or synthesize a generic
/// one carrying only the pipeline's default agent.
fn select_microstep(pipeline: &MdapPipeline, step_index: u64) -> Microstep {
    pipeline
        .microsteps
        .get(step_index as usize)
        .cloned()
        .unwrap_or_else(|| {
            let mut step = Microstep::named(format!("step-{}", step_index));
            step.agent = pipeline.agent.clone();
            step
        })
}

/// Best-effort event delivery: a full channel drops the event, a closed
/// channel means nobody is listening. Neither may stall the step loop.
fn emit(events_tx: &mpsc::Sender<ProgressEvent>, event: ProgressEvent) {
    use tokio::sync::mpsc::error::TrySendError;

    match events_tx.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => warn!("progress observer lagging; event dropped"),
        Err(TrySendError::Closed(_)) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline_with_steps(names: &[&str]) -> MdapPipeline {
        MdapPipeline {
            name: "test".to_string(),
            strategy: None,
            agent: Some("default-agent".to_string()),
            total_steps: None,
            input: Value::Null,
            config: Default::default(),
            success_condition: None,
            microsteps: names.iter().map(|n| Microstep::named(*n)).collect(),
        }
    }

    #[test]
    fn test_select_declared_microstep() {
        let pipeline = pipeline_with_steps(&["first", "second"]);
        assert_eq!(select_microstep(&pipeline, 1).name, "second");
    }

    #[test]
    fn test_synthesized_microstep_inherits_default_agent() {
        let pipeline = pipeline_with_steps(&[]);
        let step = select_microstep(&pipeline, 42);
        assert_eq!(step.name, "step-42");
        assert_eq!(step.agent.as_deref(), Some("default-agent"));
        assert!(step.prompt.is_none());
    }

    #[test]
    fn test_emit_survives_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        emit(
            &tx,
            ProgressEvent::Error {
                execution_id: Uuid::nil(),
                step: None,
                message: "nobody listening".to_string(),
            },
        );
    }
}
