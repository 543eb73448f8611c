use thiserror::Error;

use formtree_core::{FieldValues, FormError, Record, RecordId};
use std::sync::Arc;

/// Backing store operation error.
///
/// These are **infrastructure errors** (missing rows, unusable storage) as
/// opposed to form errors (validation). A save that the store merely refuses
/// (e.g. a violated constraint) is not an error: it returns `Ok(false)`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{record_type} with id {id} not found")]
    NotFound { record_type: String, id: RecordId },

    #[error("{record_type} record has been destroyed")]
    Destroyed { record_type: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for FormError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound { record_type, id } => FormError::not_found(record_type, id),
            other => FormError::persistence(other.to_string()),
        }
    }
}

/// Unit of work executed inside [`RecordStore::transaction`].
///
/// Returning `Ok(false)` or `Err(_)` rolls every write back.
pub type TransactionBody<'a> = dyn FnMut() -> Result<bool, StoreError> + 'a;

/// Capability surface the form engine needs from a persistent-record store.
///
/// The engine never assumes more than this:
/// - lookup by id and in-memory construction of new records;
/// - in-memory attribute assignment (no IO);
/// - `save` / `destroy` of single records;
/// - a transaction that rolls back all writes when its body fails.
///
/// ## Implementation Requirements
///
/// - `save` inserts records without an id (assigning one via
///   [`Record::mark_persisted`]) and updates the others.
/// - `save` and `destroy` report refusals as `Ok(false)`, not as errors.
/// - Writes performed inside a failed transaction body must not be
///   observable afterwards.
pub trait RecordStore: Send + Sync {
    /// Load a persisted record.
    fn find(&self, record_type: &str, id: RecordId) -> Result<Record, StoreError>;

    /// Build a new, unsaved record (no IO).
    fn new_record(&self, record_type: &str, attributes: FieldValues) -> Record {
        let mut record = Record::new(record_type);
        record.assign(attributes);
        record
    }

    /// Assign attributes on the in-memory record (no IO).
    fn update_attributes(&self, record: &mut Record, attributes: FieldValues) {
        record.assign(attributes);
    }

    /// Insert or update one record.
    fn save(&self, record: &mut Record) -> Result<bool, StoreError>;

    /// Delete one record.
    fn destroy(&self, record: &mut Record) -> Result<bool, StoreError>;

    /// Run `body` atomically.
    fn transaction(&self, body: &mut TransactionBody<'_>) -> Result<bool, StoreError>;

    fn id_of(&self, record: &Record) -> Option<RecordId> {
        record.id()
    }

    fn is_persisted(&self, record: &Record) -> bool {
        record.is_persisted()
    }
}

impl<S> RecordStore for Arc<S>
where
    S: RecordStore + ?Sized,
{
    fn find(&self, record_type: &str, id: RecordId) -> Result<Record, StoreError> {
        (**self).find(record_type, id)
    }

    fn new_record(&self, record_type: &str, attributes: FieldValues) -> Record {
        (**self).new_record(record_type, attributes)
    }

    fn update_attributes(&self, record: &mut Record, attributes: FieldValues) {
        (**self).update_attributes(record, attributes)
    }

    fn save(&self, record: &mut Record) -> Result<bool, StoreError> {
        (**self).save(record)
    }

    fn destroy(&self, record: &mut Record) -> Result<bool, StoreError> {
        (**self).destroy(record)
    }

    fn transaction(&self, body: &mut TransactionBody<'_>) -> Result<bool, StoreError> {
        (**self).transaction(body)
    }

    fn id_of(&self, record: &Record) -> Option<RecordId> {
        (**self).id_of(record)
    }

    fn is_persisted(&self, record: &Record) -> bool {
        (**self).is_persisted(record)
    }
}
