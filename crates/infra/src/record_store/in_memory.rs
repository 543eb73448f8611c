use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use formtree_core::{FieldValues, Record, RecordId, TransactionId, Value};

use super::r#trait::{RecordStore, StoreError, TransactionBody};

#[derive(Debug, Clone, Default)]
struct Tables {
    rows: HashMap<String, BTreeMap<RecordId, FieldValues>>,
    next_id: HashMap<String, u64>,
}

impl Tables {
    fn allocate(&mut self, record_type: &str) -> RecordId {
        let next = self.next_id.entry(record_type.to_string()).or_insert(0);
        *next += 1;
        RecordId::new(*next)
    }
}

#[derive(Debug)]
struct TxFrame {
    id: TransactionId,
    depth: usize,
    snapshot: Tables,
    rollback_only: bool,
}

type Check = Box<dyn Fn(&Record) -> bool + Send + Sync>;

/// A named rule a record must satisfy to be saved.
struct Constraint {
    record_type: String,
    name: String,
    check: Check,
}

impl core::fmt::Debug for Constraint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Constraint")
            .field("record_type", &self.record_type)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// In-memory record store with snapshot-based transactions.
///
/// Intended for tests/dev. Rows are kept per record type with ids assigned
/// from a per-type counter starting at 1. A transaction snapshots every table
/// when the outermost body starts and restores the snapshot if any body
/// (outer or nested) fails.
///
/// Transactions are not isolated from each other: concurrent callers on
/// different threads join the same open transaction. Callers that need
/// isolation must serialize their submissions.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    tables: RwLock<Tables>,
    tx: Mutex<Option<TxFrame>>,
    constraints: RwLock<Vec<Constraint>>,
}

/// Closes a transaction frame as failed when its body unwinds.
struct OpenFrame<'a> {
    store: &'a InMemoryRecordStore,
    open: bool,
}

impl OpenFrame<'_> {
    fn disarm(&mut self) {
        self.open = false;
    }
}

impl Drop for OpenFrame<'_> {
    fn drop(&mut self) {
        if self.open && self.store.finish(true).is_err() {
            warn!("transaction frame left open after a panic");
        }
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse saves of `record_type` records for which `check` is false.
    pub fn add_constraint<F>(&self, record_type: impl Into<String>, name: impl Into<String>, check: F)
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        if let Ok(mut constraints) = self.constraints.write() {
            constraints.push(Constraint {
                record_type: record_type.into(),
                name: name.into(),
                check: Box::new(check),
            });
        }
    }

    /// Insert a record built from `attributes` and return it as loaded.
    pub fn create(&self, record_type: &str, attributes: FieldValues) -> Result<Record, StoreError> {
        let mut record = self.new_record(record_type, attributes);
        if !self.save(&mut record)? {
            return Err(StoreError::Unavailable(format!(
                "{record_type} record rejected by a constraint"
            )));
        }
        Ok(record)
    }

    pub fn count(&self, record_type: &str) -> usize {
        self.tables
            .read()
            .map(|t| t.rows.get(record_type).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    /// Every stored record of a type, in id order.
    pub fn all(&self, record_type: &str) -> Vec<Record> {
        let Ok(tables) = self.tables.read() else {
            return vec![];
        };
        tables
            .rows
            .get(record_type)
            .map(|table| {
                table
                    .iter()
                    .map(|(id, attrs)| Record::loaded(record_type, *id, attrs.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Stored records whose `column` equals `value` (e.g. children by foreign key).
    pub fn where_eq(&self, record_type: &str, column: &str, value: &Value) -> Vec<Record> {
        self.all(record_type)
            .into_iter()
            .filter(|r| r.get(column) == Some(value))
            .collect()
    }

    pub fn in_transaction(&self) -> bool {
        self.tx.lock().map(|tx| tx.is_some()).unwrap_or(false)
    }

    /// JSON dump of every table, for inspection.
    pub fn dump(&self) -> JsonValue {
        let Ok(tables) = self.tables.read() else {
            return JsonValue::Null;
        };
        let sorted: BTreeMap<&String, &BTreeMap<RecordId, FieldValues>> = tables.rows.iter().collect();
        let mut out = serde_json::Map::new();
        for (record_type, table) in sorted {
            let rows = table
                .iter()
                .map(|(id, attrs)| {
                    let mut row = serde_json::Map::new();
                    row.insert("id".to_string(), JsonValue::from(id.get()));
                    for (name, value) in attrs {
                        row.insert(name.clone(), value.to_json());
                    }
                    JsonValue::Object(row)
                })
                .collect();
            out.insert(record_type.clone(), JsonValue::Array(rows));
        }
        JsonValue::Object(out)
    }

    fn read_tables(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables.read().map_err(poisoned)
    }

    fn write_tables(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables.write().map_err(poisoned)
    }

    fn violated_constraint(&self, record: &Record) -> Result<Option<String>, StoreError> {
        let constraints = self.constraints.read().map_err(poisoned)?;
        Ok(constraints
            .iter()
            .filter(|c| c.record_type == record.record_type())
            .find(|c| !(c.check)(record))
            .map(|c| c.name.clone()))
    }

    /// Open a transaction frame, or join the one already open.
    fn begin(&self) -> Result<(TransactionId, bool), StoreError> {
        let mut tx = self.tx.lock().map_err(poisoned)?;
        if let Some(frame) = tx.as_mut() {
            frame.depth += 1;
            return Ok((frame.id, false));
        }

        let snapshot = self.read_tables()?.clone();
        let id = TransactionId::new();
        *tx = Some(TxFrame {
            id,
            depth: 1,
            snapshot,
            rollback_only: false,
        });
        debug!(tx = %id, "transaction opened");
        Ok((id, true))
    }

    /// Leave a frame; returns whether the outermost frame committed.
    fn finish(&self, failed: bool) -> Result<bool, StoreError> {
        let mut tx = self.tx.lock().map_err(poisoned)?;
        let Some(frame) = tx.as_mut() else {
            return Ok(!failed);
        };
        frame.depth -= 1;
        frame.rollback_only |= failed;
        if frame.depth > 0 {
            return Ok(!failed);
        }

        let Some(frame) = tx.take() else {
            return Ok(!failed);
        };
        if frame.rollback_only {
            *self.write_tables()? = frame.snapshot;
            debug!(tx = %frame.id, "transaction rolled back");
            Ok(false)
        } else {
            debug!(tx = %frame.id, "transaction committed");
            Ok(true)
        }
    }
}

impl RecordStore for InMemoryRecordStore {
    fn find(&self, record_type: &str, id: RecordId) -> Result<Record, StoreError> {
        let tables = self.read_tables()?;
        tables
            .rows
            .get(record_type)
            .and_then(|table| table.get(&id))
            .map(|attrs| Record::loaded(record_type, id, attrs.clone()))
            .ok_or_else(|| StoreError::NotFound {
                record_type: record_type.to_string(),
                id,
            })
    }

    fn save(&self, record: &mut Record) -> Result<bool, StoreError> {
        if record.is_destroyed() {
            return Err(StoreError::Destroyed {
                record_type: record.record_type().to_string(),
            });
        }
        if let Some(name) = self.violated_constraint(record)? {
            debug!(record_type = record.record_type(), constraint = %name, "save refused");
            return Ok(false);
        }

        let mut tables = self.write_tables()?;
        let record_type = record.record_type().to_string();
        match record.id() {
            None => {
                let id = tables.allocate(&record_type);
                tables
                    .rows
                    .entry(record_type.clone())
                    .or_default()
                    .insert(id, record.attributes().clone());
                record.mark_persisted(id);
                debug!(record_type = %record_type, id = %id, "record inserted");
            }
            Some(id) => {
                let table = tables.rows.entry(record_type.clone()).or_default();
                let Some(row) = table.get_mut(&id) else {
                    return Err(StoreError::NotFound { record_type, id });
                };
                *row = record.attributes().clone();
                record.mark_persisted(id);
                debug!(record_type = %record_type, id = %id, "record updated");
            }
        }
        Ok(true)
    }

    fn destroy(&self, record: &mut Record) -> Result<bool, StoreError> {
        let Some(id) = record.id() else {
            record.mark_destroyed();
            return Ok(true);
        };

        let mut tables = self.write_tables()?;
        let removed = tables
            .rows
            .get_mut(record.record_type())
            .and_then(|table| table.remove(&id))
            .is_some();
        if removed {
            record.mark_destroyed();
            debug!(record_type = record.record_type(), id = %id, "record destroyed");
        }
        Ok(removed)
    }

    fn transaction(&self, body: &mut TransactionBody<'_>) -> Result<bool, StoreError> {
        let (_, outermost) = self.begin()?;
        let mut frame = OpenFrame { store: self, open: true };
        let outcome = body();
        frame.disarm();
        let failed = !matches!(outcome, Ok(true));
        let committed = self.finish(failed)?;
        match outcome {
            Ok(ok) if outermost => Ok(ok && committed),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(name: &str) -> FieldValues {
        FieldValues::from([("name".to_string(), Value::text(name))])
    }

    #[test]
    fn save_assigns_sequential_ids_per_type() {
        let store = InMemoryRecordStore::new();
        let a = store.create("Genre", attrs("Blues")).unwrap();
        let b = store.create("Genre", attrs("Jazz")).unwrap();
        let c = store.create("Artist", attrs("Ayreon")).unwrap();

        assert_eq!(a.id(), Some(RecordId::new(1)));
        assert_eq!(b.id(), Some(RecordId::new(2)));
        assert_eq!(c.id(), Some(RecordId::new(1)));
        assert_eq!(store.count("Genre"), 2);
    }

    #[test]
    fn find_returns_loaded_record_or_not_found() {
        let store = InMemoryRecordStore::new();
        let genre = store.create("Genre", attrs("Metal")).unwrap();

        let found = store.find("Genre", genre.id().unwrap()).unwrap();
        assert!(found.is_persisted());
        assert_eq!(found.attribute("name"), Value::text("Metal"));

        let err = store.find("Genre", RecordId::new(99)).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn update_of_missing_row_is_not_found() {
        let store = InMemoryRecordStore::new();
        let mut ghost = Record::loaded("Genre", RecordId::new(7), attrs("Ghost"));
        assert!(matches!(store.save(&mut ghost), Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn destroy_removes_row_and_marks_record() {
        let store = InMemoryRecordStore::new();
        let mut genre = store.create("Genre", attrs("Other")).unwrap();
        assert!(store.destroy(&mut genre).unwrap());
        assert!(genre.is_destroyed());
        assert_eq!(store.count("Genre"), 0);
        assert!(matches!(store.save(&mut genre), Err(StoreError::Destroyed { .. })));
    }

    #[test]
    fn failed_transaction_rolls_back_every_write() {
        let store = InMemoryRecordStore::new();
        store.create("Genre", attrs("Blues")).unwrap();

        let committed = store
            .transaction(&mut || {
                let mut r = store.new_record("Genre", attrs("Jazz"));
                store.save(&mut r)?;
                Ok(false)
            })
            .unwrap();

        assert!(!committed);
        assert_eq!(store.count("Genre"), 1);
        assert!(!store.in_transaction());
    }

    #[test]
    fn error_inside_transaction_rolls_back_and_propagates() {
        let store = InMemoryRecordStore::new();
        let result = store.transaction(&mut || {
            let mut r = store.new_record("Genre", attrs("Jazz"));
            store.save(&mut r)?;
            store.find("Genre", RecordId::new(42))?;
            Ok(true)
        });

        assert!(matches!(result, Err(StoreError::NotFound { .. })));
        assert_eq!(store.count("Genre"), 0);
    }

    #[test]
    fn nested_failure_rolls_back_outer_transaction() {
        let store = InMemoryRecordStore::new();
        let committed = store
            .transaction(&mut || {
                let mut r = store.new_record("Genre", attrs("Jazz"));
                store.save(&mut r)?;
                let inner = store.transaction(&mut || Ok(false))?;
                assert!(!inner);
                Ok(true)
            })
            .unwrap();

        assert!(!committed);
        assert_eq!(store.count("Genre"), 0);
    }

    #[test]
    fn panicking_body_closes_its_frame_and_rolls_back() {
        let store = InMemoryRecordStore::new();
        store.add_constraint("Genre", "explodes", |r| {
            assert_ne!(r.attribute("name"), Value::text("Boom"));
            true
        });

        let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            store.transaction(&mut || {
                let mut ok = store.new_record("Genre", attrs("Jazz"));
                store.save(&mut ok)?;
                let mut boom = store.new_record("Genre", attrs("Boom"));
                store.save(&mut boom)
            })
        }));
        assert!(unwound.is_err());
        assert!(!store.in_transaction());
        assert_eq!(store.count("Genre"), 0);

        // A later failure must still roll back as an outermost transaction.
        let committed = store
            .transaction(&mut || {
                let mut r = store.new_record("Genre", attrs("Blues"));
                store.save(&mut r)?;
                Ok(false)
            })
            .unwrap();
        assert!(!committed);
        assert_eq!(store.count("Genre"), 0);
    }

    #[test]
    fn constraints_refuse_saves_without_erroring() {
        let store = InMemoryRecordStore::new();
        store.add_constraint("Genre", "name present", |r| !r.attribute("name").is_blank());

        let mut blank = store.new_record("Genre", attrs(""));
        assert!(!store.save(&mut blank).unwrap());
        assert!(blank.is_new());
        assert!(store.create("Genre", attrs("")).is_err());
    }

    #[test]
    fn where_eq_filters_by_column() {
        let store = InMemoryRecordStore::new();
        for (name, artist) in [("A", 1), ("B", 2), ("C", 1)] {
            let mut fields = attrs(name);
            fields.insert("artist_id".into(), Value::Int(artist));
            store.create("Album", fields).unwrap();
        }
        let albums = store.where_eq("Album", "artist_id", &Value::Int(1));
        assert_eq!(albums.len(), 2);
    }

    #[test]
    fn dump_lists_rows_by_type() {
        let store = InMemoryRecordStore::new();
        store.create("Genre", attrs("Blues")).unwrap();
        let dump = store.dump();
        assert_eq!(dump["Genre"][0]["id"], 1);
        assert_eq!(dump["Genre"][0]["name"], "Blues");
    }
}
