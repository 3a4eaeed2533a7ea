use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{StepContext, StepRunResult};
use crate::model::PayloadType;

pub const DEFAULT_ARTIFACT_TYPE: &str = "DataArtifact";

/// Origen de un input: el output de otro step o un valor externo literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
    Step { step: String, output: String },
    External(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSpec {
    pub name: String,
    pub payload_type: PayloadType,
    pub source: InputSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub name: String,
    pub payload_type: PayloadType,
    /// Producer fijado explícitamente; `None` resuelve por tipo.
    pub producer: Option<String>,
    pub artifact_type: String,
}

/// Declaración estática de un step: nombre, interfaz tipada y parámetros por
/// defecto.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSpec {
    pub name: String,
    pub inputs: Vec<InputSpec>,
    pub outputs: Vec<OutputSpec>,
    pub params: Value,
    /// Opt-out de cache a nivel de step; se combina con el flag del run.
    pub enable_cache: bool,
}

impl StepSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(),
               inputs: Vec::new(),
               outputs: Vec::new(),
               params: Value::Object(Default::default()),
               enable_cache: true }
    }

    /// Input ligado al output `output` del step `step`.
    pub fn input_from(mut self, name: &str, payload_type: &str, step: &str, output: &str) -> Self {
        self.inputs.push(InputSpec { name: name.to_string(),
                                     payload_type: payload_type.into(),
                                     source: InputSource::Step { step: step.to_string(),
                                                                 output: output.to_string() } });
        self
    }

    pub fn external_input(mut self, name: &str, payload_type: &str, value: Value) -> Self {
        self.inputs.push(InputSpec { name: name.to_string(),
                                     payload_type: payload_type.into(),
                                     source: InputSource::External(value) });
        self
    }

    pub fn output(mut self, name: &str, payload_type: &str) -> Self {
        self.outputs.push(OutputSpec { name: name.to_string(),
                                       payload_type: payload_type.into(),
                                       producer: None,
                                       artifact_type: DEFAULT_ARTIFACT_TYPE.to_string() });
        self
    }

    /// Output con producer fijado por id.
    pub fn output_with_producer(mut self, name: &str, payload_type: &str, producer: &str) -> Self {
        self.outputs.push(OutputSpec { name: name.to_string(),
                                       payload_type: payload_type.into(),
                                       producer: Some(producer.to_string()),
                                       artifact_type: DEFAULT_ARTIFACT_TYPE.to_string() });
        self
    }

    pub fn params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    pub fn cache(mut self, enabled: bool) -> Self {
        self.enable_cache = enabled;
        self
    }

    pub fn output_spec(&self, name: &str) -> Option<&OutputSpec> {
        self.outputs.iter().find(|o| o.name == name)
    }
}

/// Un step ejecutable. `run` debe depender sólo de inputs + params.
pub trait StepDefinition: Send + Sync {
    fn spec(&self) -> &StepSpec;

    fn run(&self, ctx: &StepContext) -> StepRunResult;

    fn name(&self) -> &str {
        &self.spec().name
    }
}

type StepFn = Arc<dyn Fn(&StepContext) -> StepRunResult + Send + Sync>;

/// Adaptador de closure a `StepDefinition`.
#[derive(Clone)]
pub struct FnStep {
    spec: StepSpec,
    body: StepFn,
}

impl FnStep {
    pub fn new<F>(spec: StepSpec, body: F) -> Self
        where F: Fn(&StepContext) -> StepRunResult + Send + Sync + 'static
    {
        Self { spec,
               body: Arc::new(body) }
    }
}

impl StepDefinition for FnStep {
    fn spec(&self) -> &StepSpec {
        &self.spec
    }

    fn run(&self, ctx: &StepContext) -> StepRunResult {
        (self.body)(ctx)
    }
}

impl fmt::Debug for FnStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStep").field("spec", &self.spec).finish()
    }
}
