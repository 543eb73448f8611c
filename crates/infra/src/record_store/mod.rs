//! Persistent-record store boundary.
//!
//! This module defines the narrow capability interface the form engine uses
//! to load, save and destroy records inside one transaction, plus an
//! in-memory implementation for tests and demos.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryRecordStore;
pub use r#trait::{RecordStore, StoreError, TransactionBody};
