//! Applying submitted parameter trees to a form.
//!
//! Binding walks the submission one node at a time. Every key is classified
//! through the schema's binding-key table; plain fields are assigned first and
//! `<name>_attributes` relations second, so nested nodes are bound against a
//! parent whose own fields are already in place. Binding never persists.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use formtree_core::params::{self, ID_KEY};
use formtree_core::{FieldValues, FormError, FormResult, ParamMap, Value};
use formtree_infra::RecordStore;

use crate::config::{ListPositions, UnpermittedPolicy};
use crate::node::{Form, NodeId, ParentLink, resolve_reference};
use crate::schema::{BindingKey, FormSchema, PropertyDescriptor, PropertyKind};

const NOT_FOUND: &str = "could not be found";

impl Form {
    /// Bind a submission onto the whole tree and report its validity.
    ///
    /// A reference to a missing record becomes a field error. Malformed
    /// values for record references or nested relations are returned as
    /// [`FormError::TypeMismatch`].
    pub fn bind(&mut self, store: &dyn RecordStore, params: &ParamMap) -> FormResult<bool> {
        let root = self.root;
        self.bind_node(store, root, params, None)?;
        Ok(self.is_valid())
    }

    pub(crate) fn bind_node(
        &mut self,
        store: &dyn RecordStore,
        id: NodeId,
        params: &ParamMap,
        parent: Option<ParentLink>,
    ) -> FormResult<()> {
        let schema = Arc::clone(&self.node(id).schema);
        self.node_mut(id).parent = parent;

        let mut fields = Vec::new();
        let mut nested = Vec::new();
        let mut unpermitted = Vec::new();
        for (key, raw) in params {
            match schema.binding_key(key) {
                Some(binding) if binding.is_nested() => nested.push((key.as_str(), binding, raw)),
                Some(binding) => fields.push((key.as_str(), binding, raw)),
                None => unpermitted.push(key.clone()),
            }
        }
        self.report_unpermitted(id, &schema, unpermitted)?;

        for (key, binding, raw) in fields.into_iter().chain(nested) {
            match self.set_on(store, id, key, raw) {
                Err(FormError::NotFound { record_type, id: missing }) => {
                    let field = field_name(&schema, binding).unwrap_or(key);
                    debug!(form = schema.name(), field, %record_type, id = %missing, "referenced record not found");
                    self.node_mut(id).binding_errors.add(field, NOT_FOUND);
                }
                other => other?,
            }
        }
        Ok(())
    }

    fn report_unpermitted(&self, id: NodeId, schema: &FormSchema, keys: Vec<String>) -> FormResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let path = self.path_of(id);
        let keys: Vec<String> = keys
            .into_iter()
            .map(|key| if path.is_empty() { key } else { format!("{path}.{key}") })
            .collect();

        match self.config.unpermitted {
            UnpermittedPolicy::Ignore => Ok(()),
            UnpermittedPolicy::Log => {
                warn!(form = schema.name(), keys = ?keys, "unpermitted parameters");
                Ok(())
            }
            UnpermittedPolicy::Raise => Err(FormError::UnpermittedParameters(keys)),
        }
    }

    /// Bind a `<name>_attributes` value; `false` when a referenced record is
    /// missing.
    pub(crate) fn bind_relation(
        &mut self,
        store: &dyn RecordStore,
        id: NodeId,
        prop: &PropertyDescriptor,
        raw: &JsonValue,
    ) -> FormResult<bool> {
        match &prop.kind {
            PropertyKind::BelongsToForm { schema } => {
                let JsonValue::Object(map) = raw else {
                    return Err(FormError::type_mismatch(
                        params::attributes_key(prop.name()),
                        "expected a nested object",
                    ));
                };
                let child = match self.child(id, prop.name()) {
                    Some(child) => child,
                    None => self.new_child(store, id, prop.name(), schema)?,
                };
                self.bind_node(store, child, map, Some(link(id, prop.name())))?;
                Ok(true)
            }
            PropertyKind::HasManyForms { schema } => self.bind_form_list(store, id, prop, schema, raw),
            PropertyKind::HasManyRecords { record_type } => {
                self.bind_record_list(store, id, prop, record_type, raw)
            }
            _ => Err(FormError::UnknownProperty(params::attributes_key(prop.name()))),
        }
    }

    fn bind_form_list(
        &mut self,
        store: &dyn RecordStore,
        id: NodeId,
        prop: &PropertyDescriptor,
        schema: &Arc<FormSchema>,
        raw: &JsonValue,
    ) -> FormResult<bool> {
        let key = params::attributes_key(prop.name());
        let Some(entries) = ordered_entries(raw, self.config.list_positions) else {
            return Err(FormError::type_mismatch(key, "expected an index-keyed object"));
        };

        let existing = self.children(id, prop.name()).to_vec();
        for (position, (ordinal, entry)) in entries.into_iter().enumerate() {
            let JsonValue::Object(map) = entry else {
                return Err(FormError::type_mismatch(
                    format!("{key}[{ordinal}]"),
                    "expected a nested object",
                ));
            };
            let child = match self.slot(&ordinal, position, existing.len()) {
                Some(idx) => existing[idx],
                None => self.new_child(store, id, prop.name(), schema)?,
            };
            self.bind_node(store, child, map, Some(link(id, prop.name())))?;
        }
        Ok(true)
    }

    fn bind_record_list(
        &mut self,
        store: &dyn RecordStore,
        id: NodeId,
        prop: &PropertyDescriptor,
        record_type: &str,
        raw: &JsonValue,
    ) -> FormResult<bool> {
        let Some(entries) = ordered_entries(raw, self.config.list_positions) else {
            return Err(FormError::type_mismatch(
                params::attributes_key(prop.name()),
                "expected an index-keyed object",
            ));
        };

        // Slots cleared by blank entries are dropped once every entry has
        // been applied, so later ordinals still address the original positions.
        let node = self.node_mut(id);
        node.binding_errors.remove(prop.name());
        let mut slots: Vec<Option<Value>> = node
            .value(prop.name())
            .as_list()
            .map(|items| items.iter().cloned().map(Some).collect())
            .unwrap_or_default();
        let existing = slots.len();

        let mut resolved = true;
        for (position, (ordinal, entry)) in entries.into_iter().enumerate() {
            let entry = match entry {
                JsonValue::Object(map) => match map.get(ID_KEY) {
                    Some(raw_id) => raw_id,
                    None => continue,
                },
                other => other,
            };
            let value = match resolve_reference(store, prop.name(), record_type, entry) {
                Ok(value) => value,
                Err(FormError::NotFound { .. }) => {
                    resolved = false;
                    continue;
                }
                Err(err) => return Err(err),
            };
            match (self.slot(&ordinal, position, existing), value) {
                (Some(idx), Value::Null) => slots[idx] = None,
                (None, Value::Null) => {}
                (Some(idx), value) => slots[idx] = Some(value),
                (None, value) => slots.push(Some(value)),
            }
        }

        let list = slots.into_iter().flatten().collect();
        let node = self.node_mut(id);
        node.values.insert(prop.name().to_string(), Value::List(list));
        if !resolved {
            node.binding_errors.add(prop.name(), NOT_FOUND);
        }
        Ok(resolved)
    }

    /// Existing position addressed by a list entry, if any.
    fn slot(&self, ordinal: &str, position: usize, existing: usize) -> Option<usize> {
        let idx = match self.config.list_positions {
            ListPositions::ParseIndex => params::ordinal_index(ordinal)?,
            ListPositions::IterationOrder => position,
        };
        (idx < existing).then_some(idx)
    }

    /// Build a node around a new record and hang it under `relation`.
    fn new_child(
        &mut self,
        store: &dyn RecordStore,
        id: NodeId,
        relation: &str,
        schema: &Arc<FormSchema>,
    ) -> FormResult<NodeId> {
        let record = store.new_record(schema.model(), FieldValues::new());
        let child = self.build_node(schema, record, Some(link(id, relation)))?;
        self.attach(id, relation, child);
        debug!(form = schema.name(), relation, node = %child, "nested node created");
        Ok(child)
    }
}

fn link(node: NodeId, relation: &str) -> ParentLink {
    ParentLink {
        node,
        relation: relation.to_string(),
    }
}

/// Property a binding key assigns, for error reporting.
fn field_name(schema: &FormSchema, binding: BindingKey) -> Option<&str> {
    match binding {
        BindingKey::Field(idx) | BindingKey::Nested(idx) | BindingKey::RecordIds(idx) => {
            Some(schema.property_at(idx).name())
        }
        BindingKey::Destroy | BindingKey::Identity => None,
    }
}

/// List entries in the order positions are assigned: numeric ordinals
/// ascending (other keys after them in submission order) when ordinals are
/// parsed, plain submission order otherwise.
fn ordered_entries(raw: &JsonValue, positions: ListPositions) -> Option<Vec<(String, &JsonValue)>> {
    match (raw, positions) {
        (JsonValue::Object(map), ListPositions::ParseIndex) => Some(
            params::in_ordinal_order(map)
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        ),
        (other, _) => params::list_entries(other),
    }
}
