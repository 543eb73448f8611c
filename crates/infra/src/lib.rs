//! Infrastructure layer: record stores backing the form engine.

pub mod record_store;

pub use record_store::{InMemoryRecordStore, RecordStore, StoreError};
