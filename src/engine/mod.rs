//! Host-facing entry point: picks the linear runner or the graph runtime for
//! a mode and returns the run's output with its per-unit trail.

mod builder;

pub use builder::EngineBuilder;

use crate::audit::SharedAudit;
use crate::config::{ConfigHandle, ExecutionStrategy, ModeConfig, PipelineConfig};
use crate::context::{CognitiveMode, ContextOverrides, RunContext, UnitResult};
use crate::error::{ConfigError, Result};
use crate::generation::GenerationService;
use crate::graph::{GraphDefinition, GraphRuntime, NodeRegistry};
use crate::observability::Observer;
use crate::pipeline::PipelineRunner;
use crate::reasoning::CapabilityExecutor;
use crate::safety::GateOutcome;
use crate::unit::UnitRegistry;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub run_id: String,
    pub output: Value,
    pub unit_results: Vec<UnitResult>,
    pub total_time: Duration,
    /// Gate verdict, when a safety gate ran in this pipeline.
    pub validation: Option<GateOutcome>,
}

pub struct CognitiveEngine {
    config: ConfigHandle,
    units: UnitRegistry,
    nodes: NodeRegistry,
    graphs: HashMap<String, GraphDefinition>,
    audit: SharedAudit,
    observer: Arc<dyn Observer>,
}

impl CognitiveEngine {
    pub fn builder(
        config: ConfigHandle,
        generation: Arc<dyn GenerationService>,
        capabilities: Arc<dyn CapabilityExecutor>,
    ) -> EngineBuilder {
        EngineBuilder::new(config, generation, capabilities)
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    pub fn units(&self) -> &UnitRegistry {
        &self.units
    }

    pub fn nodes(&self) -> &NodeRegistry {
        &self.nodes
    }

    pub fn audit(&self) -> &SharedAudit {
        &self.audit
    }

    /// Poll the config file for changes until `cancel` fires.
    pub fn spawn_config_watcher(
        &self,
        period: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        self.config.spawn_watcher(period, cancel)
    }

    /// Run under the configured timeout.
    pub async fn run(
        &self,
        input: Value,
        mode: CognitiveMode,
        overrides: ContextOverrides,
    ) -> Result<RunOutput> {
        let limit = self.config.load().runtime.timeout();
        self.run_with_timeout(input, mode, overrides, limit).await
    }

    pub async fn run_with_timeout(
        &self,
        input: Value,
        mode: CognitiveMode,
        overrides: ContextOverrides,
        limit: Duration,
    ) -> Result<RunOutput> {
        let config = self.config.load_full();
        let mode_config = config.mode(mode)?;
        let started = Instant::now();
        let mut ctx = RunContext::new(mode, input.clone(), overrides);

        let output = match mode_config.execution {
            ExecutionStrategy::Linear => {
                let units = self.units.assemble(mode, mode_config)?;
                PipelineRunner::new(units)
                    .with_runtime(&config.runtime)
                    .with_audit(self.audit.clone())
                    .with_observer(Arc::clone(&self.observer))
                    .execute_with_timeout(&mut ctx, input, limit)
                    .await?
            }
            ExecutionStrategy::Graph => {
                let definition = self.graph_for(mode, mode_config, &config).await?;
                GraphRuntime::new(definition, &self.nodes)?
                    .with_failure_mode(config.runtime.failure_mode)
                    .with_audit(self.audit.clone())
                    .with_observer(Arc::clone(&self.observer))
                    .execute_with_timeout(&mut ctx, limit)
                    .await?
            }
        };

        let total_time = started.elapsed();
        let validation = output
            .get("validation")
            .and_then(|value| serde_json::from_value::<GateOutcome>(value.clone()).ok());

        Ok(RunOutput {
            run_id: ctx.run_id().to_string(),
            output,
            unit_results: ctx.into_results(),
            total_time,
            validation,
        })
    }

    /// Registered graph by name, else a JSON file path resolved against the
    /// config file's directory.
    async fn graph_for(
        &self,
        mode: CognitiveMode,
        mode_config: &ModeConfig,
        config: &PipelineConfig,
    ) -> std::result::Result<GraphDefinition, ConfigError> {
        let Some(reference) = mode_config.graph.as_deref() else {
            return Err(ConfigError::Invalid(format!(
                "mode {mode} uses graph execution but names no graph"
            )));
        };
        if let Some(graph) = self.graphs.get(reference) {
            return Ok(graph.clone());
        }

        let mut path = PathBuf::from(shellexpand::tilde(reference).into_owned());
        if path.is_relative()
            && let Some(dir) = config.config_path.parent()
        {
            path = dir.join(path);
        }
        GraphDefinition::read(&path).await
    }
}
