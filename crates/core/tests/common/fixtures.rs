//! Test fixtures: sample workspaces, pipelines, and scripted providers.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use mdap_core::providers::adapters::ScriptedProvider;
use mdap_core::providers::{
    CompletionRequest, CompletionResponse, Provider, ProviderError, ProviderRegistry,
};
use mdap_core::workspace::InMemoryWorkspace;
use mdap_protocol::agent_models::AgentSpec;
use mdap_protocol::events::ProgressEvent;
use mdap_protocol::pipeline_models::{MdapPipeline, Microstep};
use mdap_protocol::value::Value;

/// Create a test agent bound to `test-model`.
pub fn test_agent(name: &str) -> AgentSpec {
    AgentSpec {
        name: name.to_string(),
        description: format!("Test agent {}", name),
        model: "test-model".to_string(),
        instruction: "You are a test solver.".to_string(),
    }
}

/// Workspace holding a single test agent.
pub fn workspace_with_agent(name: &str) -> Arc<InMemoryWorkspace> {
    let mut workspace = InMemoryWorkspace::new();
    workspace.add_agent(test_agent(name));
    Arc::new(workspace)
}

/// Registry whose only provider is the given scripted one.
pub fn registry_with(provider: Arc<dyn Provider>) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    registry.register(provider);
    registry
}

/// A pipeline with one declared microstep and a default agent, so the step
/// budget may exceed the microstep list.
pub fn solver_pipeline(name: &str, agent: &str, total_steps: u64) -> MdapPipeline {
    let mut step = Microstep::named("move");
    step.agent = Some(agent.to_string());
    step.prompt = Some("Determine and execute the next move.".to_string());

    MdapPipeline {
        name: name.to_string(),
        strategy: Some(mdap_protocol::pipeline_models::StrategySource::Inline(
            "Solve one step at a time.".to_string(),
        )),
        agent: Some(agent.to_string()),
        total_steps: Some(mdap_protocol::pipeline_models::TotalSteps::Count(total_steps)),
        input: Value::Null,
        config: Default::default(),
        success_condition: None,
        microsteps: vec![step],
    }
}

/// A pipeline with no declared microsteps at all.
pub fn dynamic_pipeline(name: &str, agent: &str, total_steps: u64) -> MdapPipeline {
    let mut pipeline = solver_pipeline(name, agent, total_steps);
    pipeline.microsteps.clear();
    pipeline
}

/// A provider wrapper that fires a cancellation token at the start of its
/// n-th call, then delegates to the wrapped provider. Used to cancel an
/// execution at a deterministic step boundary.
#[derive(Debug)]
pub struct CancelAfter {
    inner: Arc<ScriptedProvider>,
    token: CancellationToken,
    trigger_call: u32,
    calls: AtomicU32,
}

impl CancelAfter {
    pub fn new(inner: Arc<ScriptedProvider>, token: CancellationToken, trigger_call: u32) -> Self {
        Self {
            inner,
            token,
            trigger_call,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Provider for CancelAfter {
    fn name(&self) -> &str {
        "cancel-after"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.trigger_call {
            self.token.cancel();
        }
        self.inner.complete(request).await
    }
}

/// Drain every buffered event from a receiver without blocking.
pub fn drain_events(rx: &mut mpsc::Receiver<ProgressEvent>) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
