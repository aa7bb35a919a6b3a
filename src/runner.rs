//! Phase orchestration: tracing runs (discover clients → trace →
//! compress → persist) and regression checks (load → rebuild → replay →
//! report).

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::info;

use apiwatch_core::bridge::{discover_clients, BridgeConfig, HostBridge};
use apiwatch_core::compress::{compress, CompressionPolicy};
use apiwatch_core::model::ModelTree;
use apiwatch_core::path::PathComponent;
use apiwatch_core::persist::{ModelFile, ModelStats};
use apiwatch_core::replay::Replayer;
use apiwatch_core::report::CheckReport;
use apiwatch_core::tracer::TraceSession;
use apiwatch_script::Interpreter;

use crate::args::{CheckArgs, ModelGenArgs, StatsArgs};

#[derive(Debug)]
pub struct ModelGenSummary {
    pub output: PathBuf,
    pub paths: usize,
    pub rho_relations: usize,
    pub collapsed_calls: usize,
    pub clients_executed: usize,
    pub clients_failed: usize,
}

pub fn run_model_gen(args: &ModelGenArgs) -> Result<ModelGenSummary> {
    let clients = discover_clients(&args.client)?;
    if clients.is_empty() {
        bail!("no client files found at {}", args.client.display());
    }
    let resolve_root = clients[0]
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));

    let mut config = BridgeConfig::new(&args.library)
        .with_test_mode(args.test_mode)
        .with_resolve_root(resolve_root);
    if let Some(lib_path) = &args.lib_path {
        config = config.with_lib_path(lib_path);
    }
    let bridge = HostBridge::new(config);
    let mut interp = Interpreter::new();

    // A subject library that cannot be resolved at all is a
    // configuration error, not a client error.
    bridge
        .load_library_raw(&mut interp)
        .with_context(|| format!("subject library '{}' is not loadable", args.library))?;

    let session = match args.seed {
        Some(seed) => TraceSession::with_seed(seed),
        None => TraceSession::new(),
    };
    let run = bridge.execute_clients(&mut interp, &session, &clients)?;

    let (mut tree, rho) = session.finish();
    let collapsed = if args.no_compress {
        0
    } else {
        let policy = if args.strict_compress {
            CompressionPolicy::Strict
        } else {
            CompressionPolicy::Standard
        };
        compress(&mut tree, &rho, policy)
    };

    let model = ModelFile::from_tree(&tree, rho);
    let output = args.output_path();
    model.save(&output)?;

    let summary = ModelGenSummary {
        output,
        paths: model.paths.len(),
        rho_relations: model.rho_relations.len(),
        collapsed_calls: collapsed,
        clients_executed: run.executed,
        clients_failed: run.failed,
    };
    info!(
        paths = summary.paths,
        rho = summary.rho_relations,
        collapsed = summary.collapsed_calls,
        failed_clients = summary.clients_failed,
        output = %summary.output.display(),
        "model generation finished"
    );
    Ok(summary)
}

pub fn run_check(args: &CheckArgs) -> Result<CheckReport> {
    let model_file = ModelFile::load(&args.model)?;
    let library = match &args.library {
        Some(name) => name.clone(),
        None => library_name_of(&model_file)
            .context("model has no require root; pass --library explicitly")?,
    };

    let model = ModelTree::from_model(&model_file)?;

    let mut config = BridgeConfig::new(&library);
    if let Some(lib_path) = &args.lib_path {
        config = config.with_lib_path(lib_path);
    }
    if let Some(root) = &args.resolve_root {
        config = config.with_resolve_root(root);
    }
    let mut bridge = HostBridge::new(config);
    let mut interp = Interpreter::new();

    let report = Replayer::new(&mut interp, &mut bridge, model, &library).run();

    if let Some(output) = &args.output {
        let json = serde_json::to_string_pretty(&report).context("serializing report")?;
        fs::write(output, json)
            .with_context(|| format!("writing report to {}", output.display()))?;
    }
    info!(
        library = %library,
        checked = report.checked_paths,
        breaking = report.breakages.len(),
        "regression check finished"
    );
    Ok(report)
}

pub fn run_stats(args: &StatsArgs) -> Result<ModelStats> {
    let model = ModelFile::load(&args.model)?;
    Ok(ModelStats::from_model(&model))
}

/// The module name at the model's require root.
fn library_name_of(model: &ModelFile) -> Option<String> {
    model.paths.iter().find_map(|entry| {
        match entry.path.components().first() {
            Some(PathComponent::Require { module_name }) => Some(module_name.clone()),
            _ => None,
        }
    })
}
