mod common;

use std::sync::Arc;

use common::flavors_with_test;
use indexmap::IndexMap;
use serde_json::json;
use stack_core::{ComponentKind, InMemoryStackStore, StackDefinition, StackError, StackStore};

fn store_with_components() -> InMemoryStackStore {
    let store = InMemoryStackStore::new(flavors_with_test());
    store.register_component(ComponentKind::Orchestrator, "test", "orch", Default::default()).unwrap();
    store.register_component(ComponentKind::ArtifactStore, "test", "arts", Default::default()).unwrap();
    store.register_component(ComponentKind::MetadataStore, "test", "meta", Default::default()).unwrap();
    store
}

fn definition() -> StackDefinition {
    let mut def = IndexMap::new();
    def.insert(ComponentKind::Orchestrator, "orch".to_string());
    def.insert(ComponentKind::ArtifactStore, "arts".to_string());
    def.insert(ComponentKind::MetadataStore, "meta".to_string());
    def
}

#[test]
fn registering_same_stack_name_twice_keeps_the_first() {
    let store = store_with_components();
    let first = store.register_stack("prod", &definition()).unwrap();
    let err = store.register_stack("prod", &definition()).unwrap_err();
    assert_eq!(err, StackError::already_exists("stack", "prod"));
    let again = store.get_stack("prod").unwrap();
    assert!(Arc::ptr_eq(&first, &again));
}

#[test]
fn invalid_stack_is_never_observable() {
    let store = store_with_components();
    let mut partial = definition();
    partial.shift_remove(&ComponentKind::MetadataStore);
    let err = store.register_stack("partial", &partial).unwrap_err();
    assert_eq!(err, StackError::MissingComponent { kinds: vec![ComponentKind::MetadataStore] });
    assert!(matches!(store.get_stack("partial"), Err(StackError::NotFound { .. })));
    assert!(store.list_stacks().is_empty());
}

#[test]
fn validator_failure_aborts_registration() {
    let store = store_with_components();
    let mut config = stack_core::Configuration::new();
    config.insert("requires".into(), json!("container_registry"));
    store.register_component(ComponentKind::StepOperator, "test", "docker-op", config).unwrap();
    let mut def = definition();
    def.insert(ComponentKind::StepOperator, "docker-op".into());
    let err = store.register_stack("ops", &def).unwrap_err();
    assert!(matches!(err, StackError::StackValidation { ref component, .. } if component == "docker-op"));
    assert!(store.get_stack("ops").is_err());
}

#[test]
fn replace_stack_is_explicit() {
    let store = store_with_components();
    store.register_stack("prod", &definition()).unwrap();
    store.register_component(ComponentKind::Orchestrator, "test", "orch-2", Default::default()).unwrap();
    let mut def = definition();
    def.insert(ComponentKind::Orchestrator, "orch-2".into());
    let replaced = store.replace_stack("prod", &def).unwrap();
    assert_eq!(replaced.records()[&ComponentKind::Orchestrator].name, "orch-2");
    assert_eq!(store.stack_definition("prod").unwrap(), def);
}

#[test]
fn component_in_use_cannot_be_deregistered() {
    let store = store_with_components();
    store.register_stack("prod", &definition()).unwrap();
    let err = store.deregister_component(ComponentKind::Orchestrator, "orch").unwrap_err();
    assert_eq!(err,
               StackError::InUse { what: "orchestrator component".into(),
                                   name: "orch".into(),
                                   holder: "stack 'prod'".into() });
    store.deregister_stack("prod").unwrap();
    store.deregister_component(ComponentKind::Orchestrator, "orch").unwrap();
    assert!(store.get_component(ComponentKind::Orchestrator, "orch").is_err());
}

#[test]
fn active_stack_cannot_be_deregistered() {
    let store = store_with_components();
    store.register_stack("prod", &definition()).unwrap();
    store.set_active_stack("prod", "team-a").unwrap();
    assert_eq!(store.active_stack("team-a").unwrap().name(), "prod");
    let err = store.deregister_stack("prod").unwrap_err();
    assert!(matches!(err, StackError::InUse { ref holder, .. } if holder == "scope 'team-a'"));
    assert!(matches!(store.active_stack("team-b"), Err(StackError::NotFound { .. })));
    assert!(matches!(store.set_active_stack("ghost", "team-a"), Err(StackError::NotFound { .. })));
}

#[test]
fn component_names_are_unique_per_kind_and_unknown_flavors_list_known_ones() {
    let store = store_with_components();
    let err = store.register_component(ComponentKind::Orchestrator, "test", "orch", Default::default()).unwrap_err();
    assert_eq!(err, StackError::already_exists("orchestrator component", "orch"));
    // Mismo nombre en otro kind: válido.
    store.register_component(ComponentKind::StepOperator, "test", "orch", Default::default()).unwrap();

    let err = store.register_component(ComponentKind::Orchestrator, "kubeflow", "kf", Default::default()).unwrap_err();
    assert_eq!(err, StackError::not_found("orchestrator flavor", "kubeflow", vec!["test".into()]));
}

#[test]
fn components_are_instantiated_once_and_shared_between_stacks() {
    let store = store_with_components();
    let a = store.register_stack("a", &definition()).unwrap();
    let b = store.register_stack("b", &definition()).unwrap();
    let orch_a = a.component(ComponentKind::Orchestrator).unwrap();
    let orch_b = b.component(ComponentKind::Orchestrator).unwrap();
    assert!(Arc::ptr_eq(orch_a, orch_b));
}

#[test]
fn snapshot_restores_ids_stacks_and_scopes() {
    let flavors = flavors_with_test();
    let store = InMemoryStackStore::new(flavors.clone());
    for (kind, name) in [(ComponentKind::Orchestrator, "orch"),
                         (ComponentKind::ArtifactStore, "arts"),
                         (ComponentKind::MetadataStore, "meta")]
    {
        store.register_component(kind, "test", name, Default::default()).unwrap();
    }
    store.register_stack("prod", &definition()).unwrap();
    store.set_active_stack("prod", "default").unwrap();

    let snapshot = store.snapshot();
    let restored = InMemoryStackStore::restore(flavors, &snapshot).unwrap();
    assert_eq!(restored.snapshot(), snapshot);
    assert_eq!(restored.active_stack("default").unwrap().name(), "prod");
}
