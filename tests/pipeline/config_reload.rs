use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use cognitive_pipeline::config::{ConfigHandle, ExecutionStrategy, PipelineConfig};
use cognitive_pipeline::context::{CognitiveMode, ContextOverrides};
use cognitive_pipeline::reasoning::CapabilityRegistry;
use cognitive_pipeline::safety::ValidationLevel;
use cognitive_pipeline::{CognitiveEngine, ConfigError};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::pipeline_harness::{Step, StepUnit, StubGeneration};

const INITIAL: &str = r#"
[runtime]
timeout_ms = 5000

[modes.dual]
units = [{ name = "draft" }]
validation = { level = "none" }

[modes.agent]
[modes.emulation]
"#;

const EDITED: &str = r#"
[runtime]
timeout_ms = 9000

[modes.dual]
units = [{ name = "draft" }, { name = "polish" }]
validation = { level = "quick" }

[modes.agent]
execution = "graph"
graph = "agent.json"

[modes.emulation]
"#;

fn write_config(path: &Path, contents: &str, age: Duration) {
    fs::write(path, contents).unwrap();
    let file = OpenOptions::new().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - age).unwrap();
}

fn handle_for(dir: &tempfile::TempDir) -> ConfigHandle {
    let path = dir.path().join("config.toml");
    write_config(&path, INITIAL, Duration::from_secs(60));
    ConfigHandle::new(PipelineConfig::load_from_path(&path).unwrap())
}

#[test]
fn unchanged_file_is_not_reloaded() {
    let dir = tempfile::tempdir().unwrap();
    let handle = handle_for(&dir);
    assert!(!handle.reload_if_modified().unwrap());
    assert_eq!(handle.load().runtime.timeout_ms, 5000);
}

#[test]
fn edited_file_swaps_the_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let handle = handle_for(&dir);
    let before = handle.load_full();

    write_config(handle.path(), EDITED, Duration::ZERO);
    assert!(handle.reload_if_modified().unwrap());

    let after = handle.load_full();
    assert_eq!(after.runtime.timeout_ms, 9000);
    let agent = after.mode(CognitiveMode::Agent).unwrap();
    assert_eq!(agent.execution, ExecutionStrategy::Graph);
    assert_eq!(
        after.mode(CognitiveMode::Dual).unwrap().validation.level,
        ValidationLevel::Quick
    );
    // Readers holding the old snapshot keep a consistent view.
    assert_eq!(before.runtime.timeout_ms, 5000);
    assert!(!handle.reload_if_modified().unwrap());
}

#[test]
fn invalid_edit_keeps_previous_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let handle = handle_for(&dir);

    write_config(
        handle.path(),
        concat!(
            "[modes.dual]\nunits = [{ name = \"a\" }, { name = \"a\" }]\n",
            "[modes.agent]\n[modes.emulation]\n",
        ),
        Duration::ZERO,
    );
    let err = handle.reload_if_modified().unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateUnit { .. }));
    assert_eq!(handle.load().runtime.timeout_ms, 5000);
    // The broken file is not parsed again until it changes.
    assert!(!handle.reload_if_modified().unwrap());
}

#[test]
fn missing_mode_section_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[modes.dual]\n[modes.emulation]\n").unwrap();
    let err = PipelineConfig::load_from_path(&path).unwrap_err();
    assert!(matches!(err, ConfigError::MissingMode(ref mode) if mode == "agent"));
}

#[tokio::test]
async fn engine_picks_up_reloaded_unit_list() {
    let dir = tempfile::tempdir().unwrap();
    let handle = handle_for(&dir);
    let engine = CognitiveEngine::builder(
        handle.clone(),
        StubGeneration::new(),
        Arc::new(CapabilityRegistry::new()),
    )
    .with_unit(StepUnit::new("draft", Step::Append("+draft")))
    .with_unit(StepUnit::new("polish", Step::Append("+polish")))
    .build();

    let first = engine
        .run(json!("hi"), CognitiveMode::Dual, ContextOverrides::default())
        .await
        .unwrap();
    assert_eq!(first.output, json!("hi+draft"));

    write_config(handle.path(), EDITED, Duration::ZERO);
    assert!(handle.reload_if_modified().unwrap());

    let second = engine
        .run(json!("hi"), CognitiveMode::Dual, ContextOverrides::default())
        .await
        .unwrap();
    assert_eq!(second.output, json!("hi+draft+polish"));
}

#[tokio::test]
async fn watcher_stops_on_cancel() {
    let dir = tempfile::tempdir().unwrap();
    let handle = handle_for(&dir);
    let cancel = CancellationToken::new();
    let task = handle.spawn_watcher(Duration::from_millis(10), cancel.clone());

    write_config(handle.path(), EDITED, Duration::ZERO);
    let mut reloaded = false;
    for _ in 0..100 {
        if handle.load().runtime.timeout_ms == 9000 {
            reloaded = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(reloaded);

    cancel.cancel();
    task.await.unwrap();
}
