use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::json;
use stack_adapters::{install_builtin, JsonProducer, NumberProducer, TextProducer};
use stack_core::{ComponentKind, Configuration, FnStep, PayloadType, Producer, RunConfig, RunStatus, StackDefinition, StackError,
                 StackflowConfig, StackflowContext, StepGraph, StepRunResult, StepSpec};

fn context() -> StackflowContext {
    let ctx = StackflowContext::new(StackflowConfig { liveness_interval_ms: 5,
                                                      ..StackflowConfig::default() });
    install_builtin(ctx.flavors()).unwrap();
    ctx
}

fn register(ctx: &StackflowContext, kind: ComponentKind, flavor: &str, name: &str, config: Configuration) {
    ctx.stacks().register_component(kind, flavor, name, config).unwrap();
}

fn local_definition(ctx: &StackflowContext, metadata_flavor: &str) -> StackDefinition {
    register(ctx, ComponentKind::Orchestrator, "local", "local", Configuration::new());
    register(ctx, ComponentKind::ArtifactStore, "memory", "blobs", Configuration::new());
    register(ctx, ComponentKind::MetadataStore, metadata_flavor, "ledger", Configuration::new());
    let mut definition: StackDefinition = IndexMap::new();
    definition.insert(ComponentKind::Orchestrator, "local".into());
    definition.insert(ComponentKind::ArtifactStore, "blobs".into());
    definition.insert(ComponentKind::MetadataStore, "ledger".into());
    definition
}

#[test]
fn container_flavors_activate_lazily() {
    let ctx = context();
    assert!(ctx.flavors().flavors_for(ComponentKind::StepOperator).iter().all(|f| f != "docker"));
    register(&ctx, ComponentKind::StepOperator, "docker", "docker", Configuration::new());
    assert!(ctx.flavors().flavors_for(ComponentKind::StepOperator).contains(&"docker".to_string()));
    assert!(ctx.flavors().flavors_for(ComponentKind::ContainerRegistry).contains(&"oci".to_string()));
}

#[test]
fn unknown_flavor_lists_the_known_ones() {
    let ctx = context();
    let err = ctx.stacks()
                 .register_component(ComponentKind::Orchestrator, "kubernetes", "k8s", Configuration::new())
                 .unwrap_err();
    assert_eq!(err, StackError::not_found("orchestrator flavor", "kubernetes", vec!["local".to_string()]));
}

#[test]
fn record_only_flavor_refuses_mandatory_kinds() {
    let ctx = context();
    ctx.flavors().register(ComponentKind::Orchestrator, "default", Arc::new(stack_adapters::RecordOnlyComponent::factory));
    let err = ctx.stacks()
                 .register_component(ComponentKind::Orchestrator, "default", "noop", Configuration::new())
                 .unwrap_err();
    assert!(matches!(err, StackError::StackValidation { component, .. } if component == "noop"));
}

#[test]
fn docker_operator_needs_a_container_registry() {
    let ctx = context();
    let mut definition = local_definition(&ctx, "memory");
    let mut op_config = Configuration::new();
    op_config.insert("registry_flavor".into(), json!("oci"));
    register(&ctx, ComponentKind::StepOperator, "docker", "docker", op_config);
    definition.insert(ComponentKind::StepOperator, "docker".into());

    let err = ctx.stacks().register_stack("remote", &definition).unwrap_err();
    assert_eq!(err,
               StackError::StackValidation { component: "docker".into(),
                                             reason: "requires components of kind container_registry in the stack".into() });

    register(&ctx, ComponentKind::ContainerRegistry, "default", "plain", Configuration::new());
    definition.insert(ComponentKind::ContainerRegistry, "plain".into());
    match ctx.stacks().register_stack("remote", &definition).unwrap_err() {
        StackError::StackValidation { reason, .. } => {
            assert_eq!(reason, "container registry must be of flavor 'oci', found 'default'")
        }
        other => panic!("unexpected {other:?}"),
    }

    register(&ctx, ComponentKind::ContainerRegistry, "oci", "registry", Configuration::new());
    definition.insert(ComponentKind::ContainerRegistry, "registry".into());
    let stack = ctx.stacks().register_stack("remote", &definition).unwrap();
    assert_eq!(stack.component(ComponentKind::ContainerRegistry).unwrap().record().flavor, "oci");
}

#[test]
fn in_process_metadata_service_is_provisioned_and_polled() {
    let ctx = context();
    let definition = local_definition(&ctx, "in_process");
    let stack = ctx.stacks().register_stack("svc", &definition).unwrap();

    let service = stack.component(ComponentKind::MetadataStore).unwrap().as_service().unwrap();
    assert!(!service.is_running());
    assert_eq!(ctx.provision_services(&stack).unwrap(), 1);
    assert!(service.is_running());

    service.deprovision().unwrap();
    assert!(!service.is_running());
}

#[test]
fn slow_service_times_out_after_bounded_attempts() {
    let ctx = StackflowContext::new(StackflowConfig { liveness_max_attempts: 2,
                                                      liveness_interval_ms: 1,
                                                      ..StackflowConfig::default() });
    install_builtin(ctx.flavors()).unwrap();
    let mut definition = local_definition_without_ledger(&ctx);
    let mut config = Configuration::new();
    config.insert("startup_ms".into(), json!(2_000));
    register(&ctx, ComponentKind::MetadataStore, "in_process", "slow", config);
    definition.insert(ComponentKind::MetadataStore, "slow".into());
    let stack = ctx.stacks().register_stack("slow", &definition).unwrap();

    assert_eq!(ctx.provision_services(&stack).unwrap_err(),
               StackError::ServiceTimeout { service: "slow".into(),
                                            attempts: 2 });
}

fn local_definition_without_ledger(ctx: &StackflowContext) -> StackDefinition {
    register(ctx, ComponentKind::Orchestrator, "local", "local", Configuration::new());
    register(ctx, ComponentKind::ArtifactStore, "memory", "blobs", Configuration::new());
    let mut definition: StackDefinition = IndexMap::new();
    definition.insert(ComponentKind::Orchestrator, "local".into());
    definition.insert(ComponentKind::ArtifactStore, "blobs".into());
    definition
}

#[test]
fn builtin_taxonomy_routes_subtypes_to_their_producer() {
    let ctx = context();
    let caps = ctx.capabilities();
    assert_eq!(caps.resolve(&PayloadType::from("integer")).unwrap().descriptor().id,
               NumberProducer.descriptor().id);
    assert_eq!(caps.resolve(&PayloadType::from("markdown")).unwrap().descriptor().id, TextProducer::ID);

    caps.declare_type("tagged", [PayloadType::from("number"), PayloadType::from("text")]);
    match caps.resolve(&PayloadType::from("tagged")).unwrap_err() {
        StackError::AmbiguousCapability { candidates, .. } => {
            assert_eq!(candidates, vec!["number".to_string(), "text".to_string()])
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn pipeline_on_builtin_stack_reads_back_through_producers() {
    let ctx = context();
    let definition = local_definition(&ctx, "memory");
    ctx.stacks().register_stack("local", &definition).unwrap();
    ctx.stacks().set_active_stack("local", "default").unwrap();

    let report = FnStep::new(StepSpec::new("report").params(json!({"title": "daily"}))
                                                    .output("summary", "markdown")
                                                    .output("rows", "integer")
                                                    .output("raw", "json"),
                             |ctx| {
                                 let title = ctx.param("title").and_then(|v| v.as_str()).unwrap_or("?");
                                 StepRunResult::success([("summary", stack_core::Payload::new("markdown", json!(format!("# {title}")))),
                                                         ("rows", stack_core::Payload::new("integer", json!(3))),
                                                         ("raw", stack_core::Payload::new("json", json!({"rows": [1, 2, 3]})))])
                             });
    let graph = StepGraph::new("daily").with_step(report).unwrap();
    let handle = ctx.deploy_active(None, &graph, RunConfig::named("daily-1")).unwrap();
    assert_eq!(handle.status, RunStatus::Completed);

    let stack = ctx.stacks().active_stack("default").unwrap();
    let reader = ctx.reader(&stack).unwrap();
    let run = reader.get_run("daily-1").unwrap();
    let step = reader.get_step(&run, "report").unwrap();
    let outputs = reader.get_step_artifacts(&step).unwrap().outputs;

    assert_eq!(outputs["summary"].producer, TextProducer::ID);
    assert_eq!(outputs["raw"].producer, JsonProducer::ID);
    assert_eq!(ctx.read_artifact(&stack, &outputs["summary"]).unwrap().value, json!("# daily"));
    assert_eq!(ctx.read_artifact(&stack, &outputs["rows"]).unwrap().value, json!(3));
    assert_eq!(ctx.read_artifact(&stack, &outputs["raw"]).unwrap().value, json!({"rows": [1, 2, 3]}));
}
