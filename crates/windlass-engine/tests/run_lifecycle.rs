//! End-to-end runs through the coordinator with scripted oracles and tools.

use std::sync::Arc;

use windlass_core::{Error, RunChannel, RunConfig, RunEvent};
use windlass_engine::{LeaseRegistry, MemoryExecutionLog, RunCoordinator};
use windlass_oracle::MockOracle;
use windlass_tooling::{MockTool, ScriptedOutcome, ToolRegistry};

const TWO_STEP_PLAN: &str = r#"<invoke tool="submit_plan">
<param name="overview" type="string">Search, then summarize what was found.</param>
<param name="steps" type="array">
<item type="object">
<param name="index" type="number">0</param>
<param name="tool_name" type="string">search</param>
</item>
<item type="object">
<param name="index" type="number">1</param>
<param name="tool_name" type="string">summarize</param>
<param name="depends_on" type="array">
<item type="number">0</item>
</param>
</item>
</param>
</invoke>"#;

const COMPLETE_REFLECTION: &str = r#"<invoke tool="submit_reflection">
<param name="is_complete" type="boolean">true</param>
</invoke>"#;

const FAILED_EVALUATION: &str = r#"<invoke tool="submit_evaluation">
<param name="success" type="boolean">false</param>
<param name="incomplete" type="boolean">false</param>
<param name="failed_steps" type="array">
<item type="object">
<param name="index" type="number">0</param>
<param name="tool_name" type="string">search</param>
<param name="reason" type="string">the search tool errored</param>
</item>
</param>
<param name="summary" type="string">Search failed; the summary ran on nothing.</param>
</invoke>"#;

const SUCCESS_EVALUATION: &str = r#"<invoke tool="submit_evaluation">
<param name="success" type="boolean">true</param>
<param name="incomplete" type="boolean">false</param>
<param name="summary" type="string">Both steps completed after the repair pass.</param>
</invoke>"#;

/// Enables log output for failing tests when `RUST_LOG` is set.
fn init_tracing() {
    drop(
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init(),
    );
}

fn registry_with(tools: Vec<MockTool>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry = registry.with_tool(Arc::new(tool));
    }
    registry
}

fn config_without_refinement() -> RunConfig {
    RunConfig {
        refine_arguments: false,
        ..RunConfig::default()
    }
}

fn coordinator(
    oracle: MockOracle,
    registry: ToolRegistry,
    config: RunConfig,
) -> (RunCoordinator, tokio::sync::mpsc::UnboundedReceiver<RunEvent>) {
    let (channel, receiver) = RunChannel::new();
    let log = Arc::new(MemoryExecutionLog::new());
    let coordinator = RunCoordinator::new(Arc::new(oracle), registry, log, config, channel);
    (coordinator, receiver)
}

fn drain(receiver: &mut tokio::sync::mpsc::UnboundedReceiver<RunEvent>) -> Vec<RunEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_clean_run_event_sequence() {
    init_tracing();
    let oracle = MockOracle::new()
        .with_response(TWO_STEP_PLAN)
        .with_response(COMPLETE_REFLECTION);
    let registry = registry_with(vec![MockTool::new("search"), MockTool::new("summarize")]);
    let (coordinator, mut receiver) = coordinator(oracle, registry, config_without_refinement());

    let summary = coordinator.run("conv-1", "find and summarize").await.unwrap();

    assert!(summary.verdict.success);
    assert!(!summary.verdict.incomplete);
    assert_eq!(summary.stats.attempted, 2);
    assert_eq!(summary.stats.succeeded, 2);
    assert!(summary.reflection.unwrap().is_complete);

    let events = drain(&mut receiver);
    assert!(matches!(events.first(), Some(RunEvent::PlanReady { .. })));
    let tool_results = events
        .iter()
        .filter(|event| matches!(event, RunEvent::ToolResult { .. }))
        .count();
    assert_eq!(tool_results, 2);
    assert!(events
        .iter()
        .any(|event| matches!(event, RunEvent::Evaluation { .. })));
    assert!(events
        .iter()
        .any(|event| matches!(event, RunEvent::Reflection { .. })));
    assert!(matches!(events.last(), Some(RunEvent::Done { .. })));
    assert!(!events
        .iter()
        .any(|event| matches!(event, RunEvent::RetryBegin { .. })));
}

#[tokio::test]
async fn test_repair_pass_recovers_a_failed_run() {
    init_tracing();
    // The search tool fails once, succeeds on the retry.
    let search = MockTool::new("search").failing_times(1);
    let summarize = MockTool::new("summarize");
    let summarize_observer = summarize.clone();

    let oracle = MockOracle::new()
        .with_response(TWO_STEP_PLAN)
        .with_response(FAILED_EVALUATION)
        .with_response(SUCCESS_EVALUATION)
        .with_response(COMPLETE_REFLECTION);
    let registry = registry_with(vec![search, summarize]);
    let (coordinator, mut receiver) = coordinator(oracle, registry, config_without_refinement());

    let summary = coordinator.run("conv-1", "find and summarize").await.unwrap();

    assert!(summary.verdict.success);
    // The summarize step sat downstream of the failure, so the repair pass
    // re-executed it too.
    assert_eq!(summarize_observer.call_count(), 2);
    assert_eq!(summary.stats.attempted, 2);
    assert_eq!(summary.stats.succeeded, 2);

    let events = drain(&mut receiver);
    assert_eq!(
        events
            .iter()
            .filter(|event| matches!(event, RunEvent::RetryBegin { .. }))
            .count(),
        1
    );
    assert_eq!(
        events
            .iter()
            .filter(|event| matches!(event, RunEvent::RetryDone { .. }))
            .count(),
        1
    );
    assert!(matches!(events.last(), Some(RunEvent::Done { .. })));
}

#[tokio::test]
async fn test_exhausted_budget_reports_failure_honestly() {
    init_tracing();
    let search =
        MockTool::new("search").with_outcome(ScriptedOutcome::Fail("index offline".to_owned()));
    let oracle = MockOracle::new()
        .with_response(TWO_STEP_PLAN)
        .with_default_response(FAILED_EVALUATION);
    let registry = registry_with(vec![search, MockTool::new("summarize")]);
    let config = RunConfig {
        max_repair_attempts: 2,
        reflection_enabled: false,
        ..config_without_refinement()
    };
    let (coordinator, mut receiver) = coordinator(oracle, registry, config);

    let summary = coordinator.run("conv-1", "find and summarize").await.unwrap();

    assert!(!summary.verdict.success);
    assert!(!summary.verdict.failed_steps.is_empty());
    assert!(summary.reflection.is_none());

    let events = drain(&mut receiver);
    assert_eq!(
        events
            .iter()
            .filter(|event| matches!(event, RunEvent::RetryBegin { .. }))
            .count(),
        2
    );
    // Exhaustion still ends in Done: the run completed, the verdict says
    // how well.
    assert!(matches!(events.last(), Some(RunEvent::Done { .. })));
}

#[tokio::test]
async fn test_planning_failure_emits_run_failed() {
    init_tracing();
    let oracle = MockOracle::new().with_default_response("I refuse to use the wire format.");
    let registry = registry_with(vec![MockTool::new("search")]);
    let (coordinator, mut receiver) = coordinator(oracle, registry, config_without_refinement());

    let error = coordinator.run("conv-1", "do something").await.unwrap_err();
    assert!(matches!(error, Error::OracleExhausted(_)));

    let events = drain(&mut receiver);
    assert_eq!(events.len(), 1);
    assert!(matches!(events.first(), Some(RunEvent::RunFailed { .. })));
}

#[tokio::test]
async fn test_lease_excludes_concurrent_runs_per_key() {
    init_tracing();
    let leases = LeaseRegistry::new();
    let slow = MockTool::new("search").with_outcome(ScriptedOutcome::Stall(300));
    let oracle = MockOracle::new()
        .with_response(TWO_STEP_PLAN)
        .with_response(COMPLETE_REFLECTION);
    let registry = registry_with(vec![slow, MockTool::new("summarize")]);
    let (channel, receiver) = RunChannel::new();
    drop(receiver);
    let log = Arc::new(MemoryExecutionLog::new());
    let first = Arc::new(
        RunCoordinator::new(
            Arc::new(oracle),
            registry.clone(),
            log,
            config_without_refinement(),
            channel,
        )
        .with_lease_registry(leases.clone()),
    );

    let running = Arc::clone(&first);
    let handle = tokio::spawn(async move { running.run("conv-1", "slow run").await });

    // Give the first run time to take the lease.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let (blocked, blocked_receiver) = {
        let (channel, receiver) = RunChannel::new();
        let log = Arc::new(MemoryExecutionLog::new());
        let coordinator = RunCoordinator::new(
            Arc::new(MockOracle::new()),
            registry,
            log,
            config_without_refinement(),
            channel,
        )
        .with_lease_registry(leases.clone());
        (coordinator, receiver)
    };
    drop(blocked_receiver);

    let error = blocked.run("conv-1", "competing run").await.unwrap_err();
    assert!(matches!(error, Error::LeaseHeld(_)));

    // A different key is free while conv-1 is held.
    assert!(leases.holder("conv-1").is_some());
    assert!(leases.holder("conv-2").is_none());

    let summary = handle.await.unwrap().unwrap();
    assert!(summary.verdict.success);
    // Completion released the lease.
    assert!(leases.holder("conv-1").is_none());
}

#[tokio::test]
async fn test_cancellation_surfaces_and_releases_the_lease() {
    init_tracing();
    let leases = LeaseRegistry::new();
    let oracle = MockOracle::new().with_response(TWO_STEP_PLAN);
    let registry = registry_with(vec![MockTool::new("search"), MockTool::new("summarize")]);
    let (channel, receiver) = RunChannel::new();
    drop(receiver);
    let log = Arc::new(MemoryExecutionLog::new());
    let coordinator = RunCoordinator::new(
        Arc::new(oracle),
        registry,
        log,
        config_without_refinement(),
        channel,
    )
    .with_lease_registry(leases.clone());

    // Cancel before the run starts: the plan is produced, but the first
    // wavefront never dispatches.
    coordinator.cancel_token().cancel();

    let error = coordinator.run("conv-1", "doomed run").await.unwrap_err();
    assert!(matches!(error, Error::Cancelled));
    assert!(leases.holder("conv-1").is_none());
}

#[tokio::test]
async fn test_argument_refinement_asks_the_oracle_per_step() {
    init_tracing();
    const SINGLE_STEP_PLAN: &str = r#"<invoke tool="submit_plan">
<param name="overview" type="string">Echo one message.</param>
<param name="steps" type="array">
<item type="object">
<param name="index" type="number">0</param>
<param name="tool_name" type="string">echo</param>
</item>
</param>
</invoke>"#;

    const REFINED_ARGUMENTS: &str = r#"<invoke tool="submit_arguments">
<param name="step_index" type="number">0</param>
<param name="arguments" type="object">
<param name="text" type="string">hello from the oracle</param>
</param>
</invoke>"#;

    let echo = MockTool::new("echo").with_schema(windlass_tooling::ToolSchema::new(vec![
        windlass_tooling::ParamSpec::required("text", windlass_tooling::ParamKind::String),
    ]));
    let observer = echo.clone();

    let oracle = MockOracle::new()
        .with_response(SINGLE_STEP_PLAN)
        .with_response(REFINED_ARGUMENTS)
        .with_response(COMPLETE_REFLECTION);
    let registry = registry_with(vec![echo]);
    let (coordinator, mut receiver) = coordinator(oracle, registry, RunConfig::default());

    let summary = coordinator.run("conv-1", "say hello").await.unwrap();

    assert!(summary.verdict.success);
    assert_eq!(observer.call_count(), 1);
    let history = observer.call_history();
    assert_eq!(history[0]["text"], "hello from the oracle");

    let events = drain(&mut receiver);
    assert!(matches!(events.last(), Some(RunEvent::Done { .. })));
}
