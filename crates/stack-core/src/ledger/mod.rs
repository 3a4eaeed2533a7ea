//! Ledger de metadata append-only y su trait `MetadataStore`.

mod store;
mod types;

pub use store::{InMemoryMetadataStore, MetadataStore};
pub use types::{LedgerEntry, LedgerRecordKind};
