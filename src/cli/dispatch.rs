use super::commands::{Cli, Commands};
use anyhow::{Context, Result};
use cognitive_pipeline::config::{ExecutionStrategy, PipelineConfig};
use cognitive_pipeline::context::CognitiveMode;
use cognitive_pipeline::graph::GraphDefinition;
use std::path::Path;

pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Check { config } => check(config.as_deref()),
        Commands::Graph { file } => graph(&file),
    }
}

fn check(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(path) => PipelineConfig::load_from_path(path),
        None => PipelineConfig::load_or_init(),
    }
    .context("config check failed")?;

    println!("config: {}", config.config_path.display());
    println!(
        "runtime: timeout {}ms, failure mode {}",
        config.runtime.timeout_ms, config.runtime.failure_mode
    );

    for mode in CognitiveMode::ALL {
        let mode_config = config.mode(mode)?;
        println!(
            "\n[{mode}] execution={} validation={}",
            mode_config.execution, mode_config.validation.level
        );
        match mode_config.execution {
            ExecutionStrategy::Linear => {
                let enabled: Vec<&str> = mode_config
                    .enabled_units()
                    .map(|unit| unit.name.as_str())
                    .collect();
                if enabled.is_empty() {
                    println!("  (no enabled units)");
                }
                for (position, name) in enabled.iter().enumerate() {
                    println!("  {}. {name}", position + 1);
                }
            }
            ExecutionStrategy::Graph => {
                println!("  graph: {}", mode_config.graph.as_deref().unwrap_or("(none)"));
            }
        }
    }
    Ok(())
}

fn graph(file: &Path) -> Result<()> {
    let definition = GraphDefinition::load(file)?;
    let order = definition
        .execution_order()
        .with_context(|| format!("graph {} is invalid", file.display()))?;

    println!(
        "graph {}: {} nodes, {} edges",
        definition.name,
        definition.nodes.len(),
        definition.edges.len()
    );
    for (position, id) in order.iter().enumerate() {
        println!("  {}. {id}", position + 1);
    }
    Ok(())
}
