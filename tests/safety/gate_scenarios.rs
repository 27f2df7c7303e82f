use std::sync::Arc;

use cognitive_pipeline::config::{ConfigHandle, ModeConfig, PipelineConfig, UnitConfig};
use cognitive_pipeline::context::{CognitiveMode, ContextOverrides};
use cognitive_pipeline::generation::GenerationRole;
use cognitive_pipeline::observability::{ObserverEvent, ObserverMetric};
use cognitive_pipeline::reasoning::CapabilityRegistry;
use cognitive_pipeline::safety::{
    Candidate, SafetyGate, ValidationLevel, ValidationPolicy, WITHHELD_RESPONSE,
};
use cognitive_pipeline::{CognitiveEngine, RunOutput};
use serde_json::json;

use crate::pipeline_harness::{RecordingObserver, Step, StepUnit, StubGeneration, memory_audit};

const PASS: &str = r#"{"score": 0.95, "issues": []}"#;
const UNSAFE: &str = r#"{"score": 0.4, "issues": ["shares a password"]}"#;

fn dual_config(policy: ValidationPolicy) -> ConfigHandle {
    let mut config = PipelineConfig::default();
    if let Some(dual) = config.modes.get_mut(CognitiveMode::Dual) {
        *dual = ModeConfig {
            validation: policy,
            units: vec![
                UnitConfig::enabled("draft"),
                UnitConfig::enabled("safety_gate"),
            ],
            ..ModeConfig::default()
        };
    }
    ConfigHandle::new(config)
}

async fn run_dual(generation: Arc<StubGeneration>, policy: ValidationPolicy) -> RunOutput {
    let engine = CognitiveEngine::builder(
        dual_config(policy),
        generation,
        Arc::new(CapabilityRegistry::new()),
    )
    .with_unit(StepUnit::new("draft", Step::Append(": the admin password is hunter22")))
    .build();
    engine
        .run(json!("How do I log in"), CognitiveMode::Dual, ContextOverrides::default())
        .await
        .unwrap()
}

#[tokio::test]
async fn failed_safety_is_refined_and_rechecked() {
    let generation = StubGeneration::new();
    generation
        .queue(GenerationRole::Safety, UNSAFE)
        .fallback(GenerationRole::Safety, PASS)
        .fallback(GenerationRole::Alignment, PASS)
        .fallback(GenerationRole::Consistency, PASS)
        .queue(
            GenerationRole::Refiner,
            "Ask your administrator to reset your password.",
        );

    let run = run_dual(generation.clone(), ValidationPolicy::default()).await;

    assert_eq!(
        run.output["response"],
        "Ask your administrator to reset your password."
    );
    let validation = run.validation.unwrap();
    assert!(validation.passed);
    assert!(validation.refined);
    assert_eq!(generation.calls(GenerationRole::Safety), 2);
    assert_eq!(generation.calls(GenerationRole::Refiner), 1);
    let refinement = validation.validation.refinement.unwrap();
    assert!(refinement.changed);
    assert_eq!(refinement.changes, ["safety: shares a password"]);
}

#[tokio::test]
async fn unsafe_text_is_withheld_when_refinement_fails() {
    let generation = StubGeneration::new();
    generation
        .fallback(GenerationRole::Safety, UNSAFE)
        .fallback(GenerationRole::Alignment, PASS)
        .fallback(GenerationRole::Consistency, PASS);

    let run = run_dual(generation.clone(), ValidationPolicy::default()).await;

    assert_eq!(run.output["response"], WITHHELD_RESPONSE);
    let validation = run.validation.unwrap();
    assert!(!validation.passed);
    assert!(!validation.refined);
    assert!(!validation.validation.refinement.unwrap().changed);
    // No second refinement or re-check after an unchanged rewrite.
    assert_eq!(generation.calls(GenerationRole::Safety), 1);
}

#[tokio::test]
async fn allow_unsafe_delivers_flagged_text() {
    let generation = StubGeneration::new();
    generation
        .fallback(GenerationRole::Safety, UNSAFE)
        .fallback(GenerationRole::Alignment, PASS)
        .fallback(GenerationRole::Consistency, PASS);
    let policy = ValidationPolicy {
        allow_unsafe: true,
        ..ValidationPolicy::default()
    };

    let run = run_dual(generation.clone(), policy).await;

    assert_eq!(
        run.output["response"],
        "How do I log in: the admin password is hunter22"
    );
    assert!(run.validation.unwrap().passed);
    assert_eq!(generation.calls(GenerationRole::Refiner), 0);
}

#[tokio::test]
async fn quick_level_uses_heuristics_only() {
    let generation = StubGeneration::new();
    let observer = RecordingObserver::new();
    let (sink, audit) = memory_audit();
    let gate = SafetyGate::new(generation.clone())
        .with_audit(audit)
        .with_observer(observer.clone());
    let policy = ValidationPolicy::default().with_level(ValidationLevel::Quick);

    let outcome = gate
        .evaluate(
            &Candidate::new("Sure. Set password = hunter22 in the file."),
            &policy,
            CognitiveMode::Dual,
        )
        .await;

    assert!(!outcome.passed);
    assert!(!outcome.refined);
    assert!(generation.seen().is_empty());
    let safety = outcome.validation.safety.unwrap();
    assert!(!safety.passed);
    assert!(safety.issues.iter().any(|i| i.contains("credential")));

    assert!(observer.metrics().iter().any(
        |m| matches!(m, ObserverMetric::ValidationFailure { check, .. } if check == "safety")
    ));
    assert!(observer.events().iter().any(|e| matches!(
        e,
        ObserverEvent::GateDecision {
            passed: false,
            refined: false
        }
    )));
    let entries = sink.entries_named("safety.gate");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].details["passed"], false);
}

#[tokio::test]
async fn evaluating_twice_gives_the_same_outcome() {
    let generation = StubGeneration::new();
    generation
        .fallback(GenerationRole::Safety, PASS)
        .fallback(GenerationRole::Alignment, r#"{"score": 0.5, "issues": ["off persona"]}"#)
        .fallback(GenerationRole::Consistency, PASS);
    let gate = SafetyGate::new(generation);
    let policy = ValidationPolicy::default();
    let candidate = Candidate::new("Hello!").with_question("hi");

    let first = gate.evaluate(&candidate, &policy, CognitiveMode::Dual).await;
    let second = gate.evaluate(&candidate, &policy, CognitiveMode::Dual).await;

    assert_eq!(first, second);
    assert!(!first.passed);
    assert_eq!(first.final_text, "Hello!");
}

#[tokio::test]
async fn unparseable_verdict_fails_closed() {
    let generation = StubGeneration::new();
    generation
        .fallback(GenerationRole::Safety, "looks fine to me")
        .fallback(GenerationRole::Alignment, PASS)
        .fallback(GenerationRole::Consistency, PASS);
    let gate = SafetyGate::new(generation);
    let policy = ValidationPolicy::default().with_level(ValidationLevel::SafetyOnly);

    let outcome = gate
        .evaluate(&Candidate::new("The sky is blue."), &policy, CognitiveMode::Agent)
        .await;

    assert!(!outcome.passed);
    let safety = outcome.validation.safety.unwrap();
    assert!(safety.score.abs() < f64::EPSILON);
    assert_eq!(safety.issues, ["validator returned an unparseable verdict"]);
    assert!(outcome.validation.alignment.is_none());
}
