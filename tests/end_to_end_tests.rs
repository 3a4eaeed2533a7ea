use std::sync::Arc;
use std::thread;

use serde_json::json;
use stackflow_rust::stack_core::{ExecutionStatus, FnStep, Payload, RunConfig, RunStatus, StackError, StackStore, StackflowConfig,
                                 StepGraph, StepOutcome, StepRunResult, StepSpec};
use stackflow_rust::{bootstrap, ensure_default_stack, DEFAULT_STACK};

fn config() -> StackflowConfig {
    StackflowConfig { home_dir: None,
                      liveness_interval_ms: 5,
                      ..StackflowConfig::default() }
}

fn step(name: &str, upstream: Option<&str>) -> FnStep {
    let mut spec = StepSpec::new(name).params(json!({"factor": 2})).output("out", "number");
    if let Some(up) = upstream {
        spec = spec.input_from("in", "number", up, "out");
    }
    FnStep::new(spec, |ctx| {
        let base = ctx.input("in").and_then(|p| p.value.as_f64()).unwrap_or(1.0);
        let factor = ctx.param("factor").and_then(|v| v.as_f64()).unwrap_or(1.0);
        StepRunResult::success([("out", Payload::new("number", json!(base * factor)))])
    })
}

/// A -> B -> C, A -> D
fn diamond_free_graph() -> StepGraph {
    StepGraph::new("fanout").with_step(step("A", None))
                            .unwrap()
                            .with_step(step("B", Some("A")))
                            .unwrap()
                            .with_step(step("C", Some("B")))
                            .unwrap()
                            .with_step(step("D", Some("A")))
                            .unwrap()
}

#[test]
fn default_stack_is_created_once_and_activated() {
    let ctx = bootstrap(config()).unwrap();
    let first = ensure_default_stack(&ctx).unwrap();
    let again = ensure_default_stack(&ctx).unwrap();
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(ctx.stacks().active_stack("default").unwrap().name(), DEFAULT_STACK);
    assert_eq!(ctx.stacks().list_components(None).len(), 3);
}

#[test]
fn rerun_is_cached_and_overrides_propagate_downstream_only() {
    let ctx = bootstrap(config()).unwrap();
    let stack = ensure_default_stack(&ctx).unwrap();
    let graph = diamond_free_graph();

    let run1 = ctx.deploy_active(None, &graph, RunConfig::named("r1")).unwrap();
    assert_eq!(run1.fresh_steps(), vec!["A", "B", "C", "D"]);
    assert!(run1.cached_steps().is_empty());

    let run2 = ctx.deploy_active(None, &graph, RunConfig::named("r2")).unwrap();
    assert_eq!(run2.fresh_steps().len(), 0);

    let run3 = ctx.deploy_active(None, &graph, RunConfig::named("r3").with_override("B", json!({"factor": 3}))).unwrap();
    let mut cached = run3.cached_steps();
    cached.sort();
    let mut fresh = run3.fresh_steps();
    fresh.sort();
    assert_eq!(cached, vec!["A", "D"]);
    assert_eq!(fresh, vec!["B", "C"]);

    let reader = ctx.reader(&stack).unwrap();
    let r3 = reader.get_run("r3").unwrap();
    let c = reader.get_step(&r3, "C").unwrap();
    let out = reader.get_step_artifacts(&c).unwrap().outputs.remove("out").unwrap();
    assert_eq!(ctx.read_artifact(&stack, &out).unwrap().value, json!(12.0));

    // B fresco en r3 consume el A cacheado, cuyo productor real es A de r1.
    let b = reader.get_step(&r3, "B").unwrap();
    let parents = reader.parent_steps(&b);
    assert_eq!(parents.len(), 1);
    assert_eq!(Some(parents[0].execution_id), run1.execution_id("A"));
}

#[test]
fn cache_switch_in_config_forces_fresh_runs() {
    let ctx = bootstrap(StackflowConfig { enable_cache: false,
                                          ..config() }).unwrap();
    ensure_default_stack(&ctx).unwrap();
    let graph = diamond_free_graph();
    ctx.deploy_active(None, &graph, RunConfig::named("a")).unwrap();
    let again = ctx.deploy_active(None, &graph, RunConfig::named("b")).unwrap();
    assert!(again.cached_steps().is_empty());
    assert_eq!(again.fresh_steps().len(), 4);
}

#[test]
fn run_names_are_unique_per_metadata_store() {
    let ctx = bootstrap(config()).unwrap();
    ensure_default_stack(&ctx).unwrap();
    let graph = diamond_free_graph();
    ctx.deploy_active(None, &graph, RunConfig::named("same")).unwrap();
    assert_eq!(ctx.deploy_active(None, &graph, RunConfig::named("same")).unwrap_err(),
               StackError::already_exists("run", "same"));
}

#[test]
fn failing_step_skips_its_dependents() {
    let ctx = bootstrap(config()).unwrap();
    let stack = ensure_default_stack(&ctx).unwrap();
    let boom = FnStep::new(StepSpec::new("B").input_from("in", "number", "A", "out").output("out", "number"),
                           |_| StepRunResult::failure("division by zero"));
    let graph = StepGraph::new("broken").with_step(step("A", None))
                                        .unwrap()
                                        .with_step(boom)
                                        .unwrap()
                                        .with_step(step("C", Some("B")))
                                        .unwrap();
    let handle = ctx.deploy_active(None, &graph, RunConfig::named("broken-1")).unwrap();
    assert_eq!(handle.status, RunStatus::Failed);
    assert!(matches!(handle.step("B").unwrap().outcome, StepOutcome::Failed { .. }));
    assert_eq!(handle.step("C").unwrap().outcome, StepOutcome::Skipped);

    let reader = ctx.reader(&stack).unwrap();
    let run = reader.get_run("broken-1").unwrap();
    assert_eq!(reader.run_status(&run), RunStatus::Failed);
    let b = reader.get_step(&run, "B").unwrap();
    assert_eq!(b.status, ExecutionStatus::Failed);
    assert_eq!(b.failure.as_deref(), Some("division by zero"));
}

#[test]
fn concurrent_runs_on_one_stack_keep_separate_lineage() {
    let ctx = Arc::new(bootstrap(config()).unwrap());
    ensure_default_stack(&ctx).unwrap();
    let workers: Vec<_> = (0..4).map(|i| {
                                    let ctx = ctx.clone();
                                    thread::spawn(move || {
                                        let graph = diamond_free_graph();
                                        let run = RunConfig::named(format!("par-{i}")).with_override("A", json!({"factor": i + 10}));
                                        ctx.deploy_active(None, &graph, run).unwrap()
                                    })
                                })
                                .collect();
    let handles: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();
    assert!(handles.iter().all(|h| h.status == RunStatus::Completed));

    let stack = ctx.stacks().get_stack(DEFAULT_STACK).unwrap();
    let reader = ctx.reader(&stack).unwrap();
    let pipeline = reader.get_pipeline("fanout").unwrap();
    assert_eq!(reader.get_runs_for_pipeline(&pipeline).len(), 4);
    for handle in &handles {
        let run = reader.get_run(&handle.run_name).unwrap();
        let d = reader.get_step(&run, "D").unwrap();
        let parent = &reader.parent_steps(&d)[0];
        assert_eq!(parent.run_id, run.id);
    }
}

#[test]
fn persistent_home_keeps_stacks_between_bootstraps() {
    let home = tempfile::tempdir().unwrap();
    let config = StackflowConfig { home_dir: Some(home.path().to_path_buf()),
                                   ..config() };
    {
        let ctx = bootstrap(config.clone()).unwrap();
        ensure_default_stack(&ctx).unwrap();
    }
    let ctx = bootstrap(config).unwrap();
    assert_eq!(ctx.stacks().list_stacks(), vec![DEFAULT_STACK.to_string()]);
    assert_eq!(ctx.stacks().active_stack("default").unwrap().name(), DEFAULT_STACK);
}
