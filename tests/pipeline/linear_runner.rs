use std::sync::Arc;
use std::time::Duration;

use cognitive_pipeline::PipelineError;
use cognitive_pipeline::config::FailureMode;
use cognitive_pipeline::context::{CognitiveMode, ContextOverrides, RunContext};
use cognitive_pipeline::pipeline::PipelineRunner;
use cognitive_pipeline::unit::{ConfiguredUnit, ExecutionUnit};
use serde_json::{Value, json};

use crate::pipeline_harness::{RecordingObserver, Step, StepUnit, memory_audit};

fn chain(units: &[Arc<StepUnit>]) -> Vec<ConfiguredUnit> {
    units
        .iter()
        .map(|unit| ConfiguredUnit::new(Arc::clone(unit) as Arc<dyn ExecutionUnit>, Value::Null))
        .collect()
}

#[tokio::test]
async fn one_result_per_invoked_unit_in_order() {
    let units = [
        StepUnit::new("context", Step::Append("+ctx")),
        StepUnit::new("draft", Step::Append("+draft")),
        StepUnit::new("polish", Step::Append("+polish")),
    ];
    let outcome = PipelineRunner::new(chain(&units))
        .run(json!("q"), CognitiveMode::Dual, ContextOverrides::default())
        .await
        .unwrap();

    assert_eq!(outcome.output, json!("q+ctx+draft+polish"));
    let names: Vec<_> = outcome.unit_results.iter().map(|r| r.unit.as_str()).collect();
    assert_eq!(names, ["context", "draft", "polish"]);
    assert!(outcome.unit_results.iter().all(|r| r.success));
}

#[tokio::test]
async fn fail_fast_stops_at_first_failure() {
    let after = StepUnit::new("after", Step::Append("+after"));
    let units = [
        StepUnit::new("before", Step::Append("+before")),
        StepUnit::new("broken", Step::Fail("provider unavailable")),
        Arc::clone(&after),
    ];
    let err = PipelineRunner::new(chain(&units))
        .run(json!("q"), CognitiveMode::Agent, ContextOverrides::default())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Execution { ref unit, .. } if unit == "broken"));
    assert!(after.seen().is_empty());
}

#[tokio::test]
async fn continue_mode_substitutes_null_payload() {
    let after = StepUnit::new("after", Step::Append("+after"));
    let units = [
        StepUnit::new("gatekeeper", Step::Reject("message is empty")),
        Arc::clone(&after),
    ];
    let outcome = PipelineRunner::new(chain(&units))
        .with_failure_mode(FailureMode::Continue)
        .run(json!("q"), CognitiveMode::Dual, ContextOverrides::default())
        .await
        .unwrap();

    assert_eq!(after.seen(), [Value::Null]);
    assert_eq!(outcome.output, json!("+after"));
    let first = &outcome.unit_results[0];
    assert!(!first.success);
    assert!(first.output.is_none());
    assert!(first.error.as_deref().unwrap().contains("message is empty"));
}

#[tokio::test]
async fn inactive_unit_keeps_previous_payload() {
    let last = StepUnit::new("last", Step::Append("!"));
    let units = [
        StepUnit::new("first", Step::Append("+a")),
        StepUnit::new("tools", Step::Inactive),
        Arc::clone(&last),
    ];
    let outcome = PipelineRunner::new(chain(&units))
        .run(json!("q"), CognitiveMode::Dual, ContextOverrides::default())
        .await
        .unwrap();

    assert_eq!(last.seen(), [json!("q+a")]);
    assert!(outcome.unit_results[1].inactive);
    assert!(outcome.unit_results[1].success);
    assert_eq!(outcome.output, json!("q+a!"));
}

#[tokio::test]
async fn continuation_unit_reads_run_history() {
    let units = [
        StepUnit::new("draft", Step::Append("+draft")),
        StepUnit::new("continue", Step::Continuation),
    ];
    let outcome = PipelineRunner::new(chain(&units))
        .run(json!("q"), CognitiveMode::Emulation, ContextOverrides::default())
        .await
        .unwrap();
    assert_eq!(outcome.output, json!("q+draft"));
}

#[tokio::test]
async fn audit_trail_has_start_unit_and_completion() {
    let (sink, audit) = memory_audit();
    let observer = RecordingObserver::new();
    let units = [
        StepUnit::new("a", Step::Append("1")),
        StepUnit::new("b", Step::Append("2")),
    ];
    PipelineRunner::new(chain(&units))
        .with_audit(audit)
        .with_observer(observer.clone())
        .run(json!(""), CognitiveMode::Dual, ContextOverrides::default())
        .await
        .unwrap();

    let start = sink.entries_named("pipeline.start");
    assert_eq!(start.len(), 1);
    assert_eq!(start[0].details["unit_count"], 2);
    assert_eq!(start[0].details["units"], json!(["a", "b"]));
    assert_eq!(sink.entries_named("pipeline.unit").len(), 2);

    let complete = sink.entries_named("pipeline.complete");
    assert_eq!(complete[0].details["succeeded"], 2);
    assert_eq!(complete[0].details["failed"], 0);
    assert!(complete[0].details["total_ms"].is_u64());
    assert_eq!(observer.events().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn timeout_abandons_in_flight_unit() {
    let (sink, audit) = memory_audit();
    let units = [
        StepUnit::new("fast", Step::Append("+fast")),
        StepUnit::new("slow", Step::Sleep(Duration::from_secs(61))),
        StepUnit::new("never", Step::Append("+never")),
    ];
    let runner = PipelineRunner::new(chain(&units)).with_audit(audit);
    let mut ctx = RunContext::new(CognitiveMode::Agent, json!("q"), ContextOverrides::default());

    let err = runner
        .execute_with_timeout(&mut ctx, json!("q"), Duration::from_millis(60_000))
        .await
        .unwrap_err();

    match err {
        PipelineError::Timeout {
            limit_ms,
            in_flight,
        } => {
            assert_eq!(limit_ms, 60_000);
            assert_eq!(in_flight.as_deref(), Some("slow"));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    let recorded: Vec<_> = ctx.results().iter().map(|r| r.unit.as_str()).collect();
    assert_eq!(recorded, ["fast"]);
    assert_eq!(
        sink.entries_named("pipeline.complete")[0].details["status"],
        "timed_out"
    );
}

#[tokio::test(start_paused = true)]
async fn default_ceiling_is_sixty_seconds() {
    let units = [StepUnit::new("slow", Step::Sleep(Duration::from_secs(90)))];
    let err = PipelineRunner::new(chain(&units))
        .run(json!("q"), CognitiveMode::Agent, ContextOverrides::default())
        .await
        .unwrap_err();
    assert!(err.is_timeout());
    assert!(err.to_string().contains("60000ms"));
}
