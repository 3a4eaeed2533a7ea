//! Stacks: ensamblado validado de componentes, su store y el formato de
//! exportación.

pub mod export;
pub mod stack;
pub mod store;
pub mod validator;

pub use export::{export_stack, import_stack, ComponentDescriptor, ImportOutcome, NameResolver, StackExport, SuffixResolver};
pub use stack::Stack;
pub use store::{InMemoryStackStore, StackDefinition, StackStore, StoreSnapshot};
pub use validator::{StackCheck, StackValidator};
