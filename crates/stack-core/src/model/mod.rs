//! Modelos neutrales del core: componentes, payloads y los registros
//! inmutables que componen el ledger de metadata.

pub mod artifact;
pub mod component;
pub mod context;
pub mod event;
pub mod execution;
pub mod fingerprint;
pub mod payload;

pub use artifact::ArtifactRecord;
pub use component::{ComponentKind, ComponentRecord, Configuration};
pub use context::{ContextKind, ContextRecord};
pub use event::{EventDirection, EventRecord};
pub use execution::{ExecutionRecord, ExecutionStatus};
pub use fingerprint::StepFingerprintInput;
pub use payload::{Payload, PayloadType};
