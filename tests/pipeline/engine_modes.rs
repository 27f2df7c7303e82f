use std::fs;
use std::sync::Arc;

use cognitive_pipeline::config::{ConfigHandle, PipelineConfig};
use cognitive_pipeline::context::{CognitiveMode, ContextOverrides, USE_TOOLS_FLAG};
use cognitive_pipeline::generation::GenerationRole;
use cognitive_pipeline::observability::ObserverEvent;
use cognitive_pipeline::reasoning::CapabilityRegistry;
use cognitive_pipeline::{CognitiveEngine, ConfigError, PipelineError};
use serde_json::json;

use crate::pipeline_harness::{
    RecordingObserver, Step, StepUnit, StubCapability, StubGeneration, memory_audit,
};

const CONFIG: &str = r#"
[runtime]
timeout_ms = 30000

[modes.dual]
units = [{ name = "context" }, { name = "direct" }]
validation = { level = "none" }

[modes.agent]
execution = "graph"
graph = "graphs/agent.json"
validation = { level = "quick" }

[modes.emulation]
units = [{ name = "direct" }, { name = "safety_gate", config = { level = "quick" } }]
validation = { level = "none" }
"#;

const AGENT_GRAPH: &str = r#"{
    "name": "agent",
    "nodes": [
        {"id": "route", "type": "router", "context_inputs": {"0": "user_message"}},
        {"id": "think", "type": "reasoning"},
        {"id": "answer", "type": "direct"},
        {"id": "merge", "type": "select"},
        {"id": "gate", "type": "safety_gate"}
    ],
    "edges": [
        {"from": "route", "to": "think", "slot": 0, "port": 0},
        {"from": "route", "to": "answer", "slot": 0, "port": 1},
        {"from": "think", "to": "merge", "slot": 0},
        {"from": "answer", "to": "merge", "slot": 1},
        {"from": "merge", "to": "gate", "slot": 0}
    ]
}"#;

struct Harness {
    _dir: tempfile::TempDir,
    engine: CognitiveEngine,
    generation: Arc<StubGeneration>,
    observer: Arc<RecordingObserver>,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, CONFIG).unwrap();
    fs::create_dir_all(dir.path().join("graphs")).unwrap();
    fs::write(dir.path().join("graphs/agent.json"), AGENT_GRAPH).unwrap();

    let generation = StubGeneration::new();
    let observer = RecordingObserver::new();
    let mut capabilities = CapabilityRegistry::new();
    capabilities.register(Arc::new(StubCapability::new(
        "capital_of",
        json!("Paris"),
    )));

    let config = ConfigHandle::new(PipelineConfig::load_from_path(&config_path).unwrap());
    let engine = CognitiveEngine::builder(config, generation.clone(), Arc::new(capabilities))
        .with_unit(StepUnit::new("context", Step::Append(" [ctx]")))
        .with_unit(StepUnit::new("direct", Step::Append(" -> direct reply")))
        .with_observer(observer.clone())
        .build();

    Harness {
        _dir: dir,
        engine,
        generation,
        observer,
    }
}

#[tokio::test]
async fn dual_mode_runs_linear_units() {
    let h = harness();
    let run = h
        .engine
        .run(json!("hello"), CognitiveMode::Dual, ContextOverrides::default())
        .await
        .unwrap();

    assert_eq!(run.output, json!("hello [ctx] -> direct reply"));
    assert_eq!(run.unit_results.len(), 2);
    assert!(run.validation.is_none());
    assert!(!run.run_id.is_empty());
}

#[tokio::test]
async fn agent_graph_loaded_relative_to_config_takes_tool_branch() {
    let h = harness();
    h.generation
        .queue(
            GenerationRole::Planner,
            "Action: capital_of\nAction Input: {\"country\": \"France\"}",
        )
        .queue(GenerationRole::Planner, "Final Answer: Paris is the capital.");

    let run = h
        .engine
        .run(
            json!({"message": "What is the capital of France?"}),
            CognitiveMode::Agent,
            ContextOverrides::default().with_flag(USE_TOOLS_FLAG, true),
        )
        .await
        .unwrap();

    assert_eq!(run.output["response"], "Paris is the capital.");
    assert_eq!(run.output["reasoning"]["invocations"], 1);
    assert_eq!(run.output["reasoning"]["stop_reason"], "final_answer");
    let names: Vec<_> = run.unit_results.iter().map(|r| r.unit.as_str()).collect();
    assert_eq!(names, ["route", "think", "answer", "merge", "gate"]);
    assert!(run.unit_results[2].inactive);

    let validation = run.validation.unwrap();
    assert!(validation.passed);
    assert_eq!(
        validation.validation.level,
        cognitive_pipeline::safety::ValidationLevel::Quick
    );
}

#[tokio::test]
async fn agent_graph_without_tools_never_plans() {
    let h = harness();
    let run = h
        .engine
        .run(
            json!("tell me a joke"),
            CognitiveMode::Agent,
            ContextOverrides::default().with_flag(USE_TOOLS_FLAG, false),
        )
        .await
        .unwrap();

    assert_eq!(run.output["response"], "tell me a joke -> direct reply");
    assert_eq!(h.generation.calls(GenerationRole::Planner), 0);
    assert!(run.unit_results[1].inactive);
}

#[tokio::test]
async fn unit_level_override_runs_quick_gate_in_emulation() {
    let h = harness();
    let run = h
        .engine
        .run(json!("hi"), CognitiveMode::Emulation, ContextOverrides::default())
        .await
        .unwrap();

    assert_eq!(run.output["response"], "hi -> direct reply");
    assert!(run.validation.unwrap().passed);
    let gate_events = h
        .observer
        .events()
        .into_iter()
        .filter(|e| matches!(e, ObserverEvent::GateDecision { .. }))
        .count();
    assert_eq!(gate_events, 1);
    assert!(
        h.observer
            .events()
            .iter()
            .any(|e| matches!(e, ObserverEvent::RunEnd { .. }))
    );
}

#[tokio::test]
async fn unknown_unit_in_mode_is_a_configuration_failure() {
    let mut config = PipelineConfig::default();
    if let Some(dual) = config.modes.get_mut(CognitiveMode::Dual) {
        dual.units = vec![cognitive_pipeline::config::UnitConfig::enabled("ghost")];
    }
    let (_sink, audit) = memory_audit();
    let engine = CognitiveEngine::builder(
        ConfigHandle::new(config),
        StubGeneration::new(),
        Arc::new(CapabilityRegistry::new()),
    )
    .with_audit(audit)
    .build();

    let err = engine
        .run(json!("hi"), CognitiveMode::Dual, ContextOverrides::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Configuration(ConfigError::UnknownUnit { ref unit, .. }) if unit == "ghost"
    ));
}

#[tokio::test]
async fn missing_graph_file_is_a_load_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, CONFIG).unwrap();
    let engine = CognitiveEngine::builder(
        ConfigHandle::new(PipelineConfig::load_from_path(&config_path).unwrap()),
        StubGeneration::new(),
        Arc::new(CapabilityRegistry::new()),
    )
    .build();

    let err = engine
        .run(json!("hi"), CognitiveMode::Agent, ContextOverrides::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Configuration(ConfigError::Load(_))
    ));
}

#[tokio::test]
async fn several_observers_all_receive_events() {
    let first = RecordingObserver::new();
    let second = RecordingObserver::new();
    let engine = CognitiveEngine::builder(
        ConfigHandle::new(PipelineConfig::default()),
        StubGeneration::new(),
        Arc::new(CapabilityRegistry::new()),
    )
    .with_observer(first.clone())
    .with_observer(second.clone())
    .build();

    engine
        .run(json!("hi"), CognitiveMode::Emulation, ContextOverrides::default())
        .await
        .unwrap();

    assert!(!first.events().is_empty());
    assert_eq!(first.events().len(), second.events().len());
}
