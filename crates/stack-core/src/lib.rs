//! Núcleo de stackflow: stacks validados de componentes, step-graphs con
//! cache por fingerprint y un ledger de metadata append-only que se relee
//! como grafo Pipeline -> Run -> Step -> Artifact.

pub mod cache;
pub mod component;
pub mod config;
pub mod constants;
pub mod context;
pub mod engine;
pub mod errors;
pub mod graph;
pub mod hashing;
pub mod ledger;
pub mod model;
pub mod reader;
pub mod registry;
pub mod service;
pub mod stack;
pub mod step;

pub use cache::{CacheDecision, CacheDecisionEngine, CacheQuery, FreshReason};
pub use component::{ArtifactStore, InMemoryArtifactStore, Orchestrator, StackComponent};
pub use config::StackflowConfig;
pub use context::StackflowContext;
pub use engine::{deploy, RunConfig, RunHandle, StepOutcome, StepReport};
pub use errors::{classify_error, ErrorClass, StackError};
pub use graph::{ExecutionGraphBuilder, ExecutionPlan, PlannedStep};
pub use ledger::{InMemoryMetadataStore, LedgerEntry, LedgerRecordKind, MetadataStore};
pub use model::{ArtifactRecord, ComponentKind, ComponentRecord, Configuration, ContextKind, ContextRecord, EventDirection,
                EventRecord, ExecutionRecord, ExecutionStatus, Payload, PayloadType};
pub use reader::{ArtifactView, MetadataGraphReader, PipelineView, RunStatus, RunView, StepArtifacts, StepView};
pub use registry::{ComponentFactory, FlavorRegistry, PluginBundle, Producer, ProducerDescriptor, TypeCapabilityRegistry,
                   TypeTaxonomy};
pub use service::{LivenessPolicy, ServiceLifecycle};
pub use stack::{export_stack, import_stack, InMemoryStackStore, NameResolver, Stack, StackDefinition, StackExport, StackStore,
                StackValidator, SuffixResolver};
pub use step::{FnStep, InputSource, InputSpec, OutputSpec, StepContext, StepDefinition, StepGraph, StepRunResult, StepSpec};
