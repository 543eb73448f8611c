//! In-memory view of a persistent record.
//!
//! A [`Record`] is what a form node wraps: the record type, the store-assigned
//! id, the lifecycle state and the attribute values. Related records that the
//! caller already loaded travel with it as associations so a form can be
//! primed without touching the store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::RecordId;
use crate::value::{FieldValues, Value};

/// Non-owning pointer to a persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordRef {
    pub record_type: String,
    pub id: RecordId,
}

impl RecordRef {
    pub fn new(record_type: impl Into<String>, id: RecordId) -> Self {
        Self {
            record_type: record_type.into(),
            id,
        }
    }
}

/// Record lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordState {
    /// Built in memory, never saved.
    #[default]
    New,
    /// Saved at least once; carries an id.
    Persisted,
    /// Removed from the store.
    Destroyed,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    record_type: String,
    id: Option<RecordId>,
    state: RecordState,
    attributes: FieldValues,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    has_one: BTreeMap<String, Record>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    has_many: BTreeMap<String, Vec<Record>>,
}

impl Record {
    /// A new, unsaved record of `record_type`.
    pub fn new(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            ..Self::default()
        }
    }

    /// A record as loaded from a store.
    pub fn loaded(record_type: impl Into<String>, id: RecordId, attributes: FieldValues) -> Self {
        Self {
            record_type: record_type.into(),
            id: Some(id),
            state: RecordState::Persisted,
            attributes,
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_one(mut self, relation: impl Into<String>, record: Record) -> Self {
        self.has_one.insert(relation.into(), record);
        self
    }

    pub fn with_many(mut self, relation: impl Into<String>, records: Vec<Record>) -> Self {
        self.has_many.insert(relation.into(), records);
        self
    }

    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    pub fn id(&self) -> Option<RecordId> {
        self.id
    }

    pub fn state(&self) -> RecordState {
        self.state
    }

    pub fn is_new(&self) -> bool {
        self.state == RecordState::New
    }

    pub fn is_persisted(&self) -> bool {
        self.state == RecordState::Persisted
    }

    pub fn is_destroyed(&self) -> bool {
        self.state == RecordState::Destroyed
    }

    pub fn to_ref(&self) -> Option<RecordRef> {
        self.id.map(|id| RecordRef::new(self.record_type.clone(), id))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Attribute value, `Null` when unset.
    pub fn attribute(&self, name: &str) -> Value {
        self.attributes.get(name).cloned().unwrap_or_default()
    }

    pub fn attributes(&self) -> &FieldValues {
        &self.attributes
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.attributes.insert(name.into(), value);
    }

    pub fn assign(&mut self, attributes: FieldValues) {
        self.attributes.extend(attributes);
    }

    pub fn one(&self, relation: &str) -> Option<&Record> {
        self.has_one.get(relation)
    }

    pub fn many(&self, relation: &str) -> &[Record] {
        self.has_many.get(relation).map(Vec::as_slice).unwrap_or_default()
    }

    /// Mutable access to a loaded collection, created empty on first use.
    pub fn many_mut(&mut self, relation: &str) -> &mut Vec<Record> {
        self.has_many.entry(relation.to_string()).or_default()
    }

    pub fn set_one(&mut self, relation: impl Into<String>, record: Record) {
        self.has_one.insert(relation.into(), record);
    }

    /// Detach a loaded single association so a child form can own it.
    pub fn take_one(&mut self, relation: &str) -> Option<Record> {
        self.has_one.remove(relation)
    }

    /// Detach a loaded collection so child forms can own its records.
    pub fn take_many(&mut self, relation: &str) -> Vec<Record> {
        self.has_many.remove(relation).unwrap_or_default()
    }

    /// Store-side transition after an insert.
    pub fn mark_persisted(&mut self, id: RecordId) {
        self.id = Some(id);
        self.state = RecordState::Persisted;
    }

    /// Store-side transition after a delete.
    pub fn mark_destroyed(&mut self) {
        self.state = RecordState::Destroyed;
    }
}
