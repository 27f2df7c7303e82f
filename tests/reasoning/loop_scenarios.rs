use std::sync::Arc;
use std::time::Duration;

use cognitive_pipeline::config::ReasoningConfig;
use cognitive_pipeline::context::{CognitiveMode, ContextOverrides, RunContext};
use cognitive_pipeline::generation::GenerationRole;
use cognitive_pipeline::observability::{ObserverEvent, ObserverMetric};
use cognitive_pipeline::reasoning::{
    CapabilityDescriptor, CapabilityRegistry, ErrorCategory, ReasoningLoop, ScratchpadEntry,
    StopReason, TrustLevel,
};
use serde_json::json;

use crate::pipeline_harness::{RecordingObserver, StubCapability, StubGeneration, memory_audit};

const LOOKUP_PLAN: &str =
    "Thought: I should read the file.\nAction: lookup_file\nAction Input: {\"path\":\"a.txt\"}";

fn registry_with(capability: Arc<StubCapability>) -> Arc<CapabilityRegistry> {
    let mut registry = CapabilityRegistry::new();
    registry.register(capability);
    Arc::new(registry)
}

fn ctx() -> RunContext {
    RunContext::new(
        CognitiveMode::Agent,
        json!("what is in a.txt?"),
        ContextOverrides::default().with_session("conv-7"),
    )
}

#[tokio::test]
async fn missing_file_is_observed_without_retry() {
    let generation = StubGeneration::new();
    generation
        .queue(GenerationRole::Planner, LOOKUP_PLAN)
        .queue(GenerationRole::Planner, "Final Answer: I could not read a.txt.");
    let capability = Arc::new(
        StubCapability::new("lookup_file", json!("contents")).failing_with(&["ENOENT: not found"]),
    );
    let reasoning = ReasoningLoop::new(
        generation.clone(),
        registry_with(capability.clone()),
        ReasoningConfig::default(),
    );

    let outcome = reasoning.run("what is in a.txt?", &ctx()).await.unwrap();

    assert_eq!(capability.call_count(), 1);
    assert_eq!(outcome.invocations.len(), 1);
    let record = &outcome.invocations[0];
    assert_eq!(record.category, Some(ErrorCategory::FileNotFound));
    assert_eq!(record.conversation_id, "conv-7");
    assert!(!record.is_retry());

    match &outcome.scratchpad.entries()[0] {
        ScratchpadEntry::Step { observation, .. } => {
            assert_eq!(observation, "Error (file-not-found): ENOENT: not found");
        }
        other => panic!("expected a step, got {other:?}"),
    }
    assert_eq!(outcome.stop_reason, StopReason::FinalAnswer);
    assert!(outcome.answer.starts_with("I could not read a.txt."));
    assert_eq!(outcome.terminal_failures.len(), 1);
    assert!(outcome.answer.contains(&outcome.terminal_failures[0]));
}

#[tokio::test(start_paused = true)]
async fn timeout_is_retried_after_backoff_with_same_args() {
    let generation = StubGeneration::new();
    generation
        .queue(GenerationRole::Planner, LOOKUP_PLAN)
        .queue(GenerationRole::Planner, "Final Answer: a.txt says hello.");
    let capability = Arc::new(
        StubCapability::new("lookup_file", json!("hello")).failing_with(&["request timed out"]),
    );
    let observer = RecordingObserver::new();
    let reasoning = ReasoningLoop::new(
        generation.clone(),
        registry_with(capability.clone()),
        ReasoningConfig::default(),
    )
    .with_observer(observer.clone());

    let outcome = reasoning.run("what is in a.txt?", &ctx()).await.unwrap();

    assert_eq!(capability.call_count(), 2);
    assert!(capability.call_gaps()[0] >= Duration::from_millis(1000));
    let args = capability.call_args();
    assert_eq!(args[0], args[1]);
    assert_eq!(args[0], json!({"path": "a.txt"}));

    assert_eq!(outcome.invocations[0].category, Some(ErrorCategory::Timeout));
    assert!(outcome.invocations[1].success);
    assert_eq!(outcome.invocations[1].attempt, 2);
    assert!(outcome.terminal_failures.is_empty());
    assert_eq!(outcome.answer, "a.txt says hello.");

    let retries = observer
        .metrics()
        .into_iter()
        .filter(|m| matches!(m, ObserverMetric::RetryAttempt { .. }))
        .count();
    assert_eq!(retries, 1);
}

#[tokio::test]
async fn final_answer_skips_capabilities_and_synthesis() {
    let generation = StubGeneration::new();
    generation.queue(GenerationRole::Planner, "Final Answer: The capital is Paris.");
    let capability = Arc::new(StubCapability::new("lookup_file", json!(null)));
    let reasoning = ReasoningLoop::new(
        generation.clone(),
        registry_with(capability.clone()),
        ReasoningConfig::default(),
    );

    let outcome = reasoning
        .run("What is the capital of France?", &ctx())
        .await
        .unwrap();

    assert_eq!(outcome.answer, "The capital is Paris.");
    assert_eq!(outcome.iterations, 1);
    assert_eq!(capability.call_count(), 0);
    assert_eq!(generation.calls(GenerationRole::Synthesizer), 0);
}

#[tokio::test(start_paused = true)]
async fn persistent_network_failure_stops_at_retry_budget() {
    let generation = StubGeneration::new();
    generation
        .queue(
            GenerationRole::Planner,
            "Action: fetch_page\nAction Input: {\"url\":\"https://example.com\"}",
        )
        .queue(GenerationRole::Planner, "Final Answer: The page is unreachable.");
    let capability = Arc::new(
        StubCapability::new("fetch_page", json!("<html>")).failing_with(&[
            "network unreachable",
            "network unreachable",
            "network unreachable",
            "network unreachable",
        ]),
    );
    let reasoning = ReasoningLoop::new(
        generation,
        registry_with(capability.clone()),
        ReasoningConfig::default(),
    );

    let outcome = reasoning.run("open the page", &ctx()).await.unwrap();

    assert_eq!(capability.call_count(), 3);
    let gaps = capability.call_gaps();
    assert!(gaps[0] >= Duration::from_secs(1));
    assert!(gaps[1] >= Duration::from_secs(2));
    assert_eq!(outcome.terminal_failures.len(), 1);
    assert!(outcome.terminal_failures[0].contains("gave up after 3 attempts"));
    assert!(outcome.answer.contains("gave up after 3 attempts"));
}

#[tokio::test]
async fn trust_gate_denies_without_retry() {
    let generation = StubGeneration::new();
    generation
        .queue(GenerationRole::Planner, "Action: delete_repo\nAction Input: {}")
        .queue(GenerationRole::Planner, "Final Answer: I am not allowed to do that.");
    let capability = Arc::new(
        StubCapability::new("delete_repo", json!("deleted")).with_descriptor(
            CapabilityDescriptor::new("delete_repo", "delete a repository")
                .with_min_trust(TrustLevel::Autonomous),
        ),
    );
    let reasoning = ReasoningLoop::new(
        generation,
        registry_with(capability.clone()),
        ReasoningConfig {
            trust_level: TrustLevel::Supervised,
            ..ReasoningConfig::default()
        },
    );

    let outcome = reasoning.run("delete the repo", &ctx()).await.unwrap();

    assert_eq!(capability.call_count(), 0);
    assert_eq!(outcome.invocations.len(), 1);
    assert_eq!(
        outcome.invocations[0].category,
        Some(ErrorCategory::PermissionDenied)
    );
}

#[tokio::test]
async fn iteration_cap_falls_back_to_synthesis() {
    let generation = StubGeneration::new();
    generation
        .fallback(
            GenerationRole::Planner,
            "Thought: keep looking\nAction: lookup_file\nAction Input: {\"path\":\"b.txt\"}",
        )
        .fallback(GenerationRole::Synthesizer, "b.txt holds the notes.");
    let capability = Arc::new(StubCapability::new("lookup_file", json!("notes")));
    let reasoning = ReasoningLoop::new(
        generation.clone(),
        registry_with(capability.clone()),
        ReasoningConfig {
            max_iterations: 3,
            ..ReasoningConfig::default()
        },
    );

    let outcome = reasoning.run("read b.txt", &ctx()).await.unwrap();

    assert_eq!(outcome.iterations, 3);
    assert_eq!(outcome.stop_reason, StopReason::MaxIterations);
    assert_eq!(capability.call_count(), 3);
    assert_eq!(outcome.scratchpad.len(), 3);
    assert_eq!(outcome.answer, "b.txt holds the notes.");
    assert_eq!(generation.calls(GenerationRole::Synthesizer), 1);
}

#[tokio::test]
async fn scratchpad_only_grows_and_is_captured() {
    let generation = StubGeneration::new();
    generation
        .queue(GenerationRole::Planner, "I am not sure what to do yet.")
        .queue(GenerationRole::Planner, LOOKUP_PLAN)
        .queue(GenerationRole::Planner, "Final Answer: done");
    let capability = Arc::new(StubCapability::new("lookup_file", json!("contents")));
    let (sink, audit) = memory_audit();
    let reasoning = ReasoningLoop::new(
        generation.clone(),
        registry_with(capability),
        ReasoningConfig::default(),
    )
    .with_audit(audit);

    let outcome = reasoning.run("what is in a.txt?", &ctx()).await.unwrap();

    let entries = outcome.scratchpad.entries();
    assert_eq!(entries.len(), 3);
    assert!(matches!(entries[0], ScratchpadEntry::Note { .. }));
    assert!(matches!(entries[1], ScratchpadEntry::Step { .. }));
    assert!(matches!(entries[2], ScratchpadEntry::FinalAnswer { .. }));

    // Later planner prompts see every earlier entry.
    let prompts: Vec<_> = generation
        .seen()
        .into_iter()
        .filter(|r| r.role == GenerationRole::Planner)
        .filter_map(|r| r.last_user_content().map(str::to_string))
        .collect();
    assert_eq!(prompts.len(), 3);
    assert!(prompts[2].contains("I am not sure what to do yet."));
    assert!(prompts[2].contains("lookup_file"));

    let captured = sink.events();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].metadata["kind"], "scratchpad");
    assert_eq!(captured[0].metadata["conversation_id"], "conv-7");
    assert_eq!(sink.entries_named("capability.invoke").len(), 1);
}

#[tokio::test]
async fn invalid_action_input_is_never_invoked() {
    let generation = StubGeneration::new();
    generation
        .queue(
            GenerationRole::Planner,
            "Action: lookup_file\nAction Input: path is a.txt",
        )
        .queue(GenerationRole::Planner, "Final Answer: gave up");
    let capability = Arc::new(StubCapability::new("lookup_file", json!("contents")));
    let observer = RecordingObserver::new();
    let reasoning = ReasoningLoop::new(
        generation,
        registry_with(capability.clone()),
        ReasoningConfig::default(),
    )
    .with_observer(observer.clone());

    let outcome = reasoning.run("q", &ctx()).await.unwrap();

    assert_eq!(capability.call_count(), 0);
    assert!(outcome.invocations.is_empty());
    assert!(
        !observer
            .events()
            .iter()
            .any(|e| matches!(e, ObserverEvent::CapabilityCall { .. }))
    );
    match &outcome.scratchpad.entries()[0] {
        ScratchpadEntry::Step { observation, .. } => {
            assert!(observation.starts_with("Error (invalid-args)"));
        }
        other => panic!("expected a step, got {other:?}"),
    }
}
