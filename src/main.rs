//! Demo: pipeline de tres steps sobre el stack local por defecto, ejecutado
//! tres veces (fresco, cacheado, con override) y releído desde el ledger.

use serde_json::{json, Value};
use stackflow_rust::stack_core::{FnStep, MetadataGraphReader, Payload, RunConfig, RunHandle, StackError, StackflowConfig, StepGraph,
                                 StepRunResult, StepSpec};
use stackflow_rust::{bootstrap, ensure_default_stack};
use tracing::{error, info};

fn pipeline() -> Result<StepGraph, StackError> {
    let ingest = FnStep::new(StepSpec::new("ingest").params(json!({"rows": 5})).output("raw", "json"), |ctx| {
        let rows = ctx.param("rows").and_then(Value::as_u64).unwrap_or(0);
        let values: Vec<u64> = (1..=rows).map(|i| i * i).collect();
        StepRunResult::success([("raw", Payload::new("json", json!(values)))])
    });
    let clean = FnStep::new(StepSpec::new("clean").input_from("raw", "json", "ingest", "raw")
                                                  .params(json!({"max": 10}))
                                                  .output("rows", "json"),
                            |ctx| {
                                let max = ctx.param("max").and_then(Value::as_u64).unwrap_or(u64::MAX);
                                let kept: Vec<u64> = ctx.input_value("raw")
                                                        .as_array()
                                                        .map(|a| a.iter().filter_map(Value::as_u64).filter(|v| *v <= max).collect())
                                                        .unwrap_or_default();
                                StepRunResult::success([("rows", Payload::new("json", json!(kept)))])
                            });
    let stats = FnStep::new(StepSpec::new("stats").input_from("rows", "json", "clean", "rows")
                                                  .output("count", "integer")
                                                  .output("summary", "markdown"),
                            |ctx| {
                                let count = ctx.input_value("rows").as_array().map_or(0, Vec::len);
                                StepRunResult::success([("count", Payload::new("integer", json!(count))),
                                                        ("summary", Payload::new("markdown", json!(format!("**{count}** rows kept"))))])
                            });
    StepGraph::new("squares").with_step(ingest)?.with_step(clean)?.with_step(stats)
}

fn describe(handle: &RunHandle) {
    println!("run '{}' -> {:?} (cached: {:?}, fresh: {:?})",
             handle.run_name,
             handle.status,
             handle.cached_steps(),
             handle.fresh_steps());
}

fn run() -> Result<(), StackError> {
    let ctx = bootstrap(StackflowConfig::from_env())?;
    let stack = ensure_default_stack(&ctx)?;
    let graph = pipeline()?;

    let first = ctx.deploy_active(None, &graph, RunConfig::default())?;
    describe(&first);
    let second = ctx.deploy_active(None, &graph, RunConfig::default())?;
    describe(&second);
    let third = ctx.deploy_active(None, &graph, RunConfig::default().with_override("clean", json!({"max": 20})))?;
    describe(&third);

    let reader: MetadataGraphReader<'_> = ctx.reader(&stack)?;
    let pipeline = reader.get_pipeline(graph.name())?;
    for run in reader.get_runs_for_pipeline(&pipeline) {
        println!("{} [{:?}]", run.name, reader.run_status(&run));
        for step in reader.get_steps_for_run(&run) {
            let parents: Vec<String> = reader.parent_steps(&step)
                                             .into_iter()
                                             .map(|p| format!("{}@{}", p.name, p.execution_id))
                                             .collect();
            println!("  {} {:?} params={} parents={parents:?}", step.name, step.status, step.params);
        }
    }

    let last = reader.get_run(&third.run_name)?;
    let stats = reader.get_step(&last, "stats")?;
    if let Some(summary) = reader.get_step_artifacts(&stats)?.outputs.get("summary") {
        let payload = ctx.read_artifact(&stack, summary)?;
        info!("summary of '{}': {}", last.name, payload.value);
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                             .init();
    if let Err(e) = run() {
        error!("demo failed: {e}");
        std::process::exit(1);
    }
}
