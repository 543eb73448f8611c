//! Persisting a form tree.
//!
//! Saving runs in two phases:
//!
//! 1. **Materialize**: children before parents, copy field values onto each
//!    node's record through [`RecordStore::update_attributes`]. No IO.
//! 2. **Commit**: one store transaction over the whole tree. Nodes marked for
//!    destruction are destroyed, rejected nodes are detached (link column
//!    cleared), everything else is saved. Children linked through a column on
//!    the parent are saved before it; children holding the parent's id are
//!    saved after it.
//!
//! A failed commit rolls the store back and restores every in-memory record
//! to its state before the commit.

use std::sync::Arc;

use tracing::{debug, warn};

use formtree_core::{FieldValues, FormError, FormResult, Record, RecordId, Value};
use formtree_infra::{RecordStore, StoreError};

use crate::node::{Form, NodeId};
use crate::schema::{ForeignKey, PropertyDescriptor, PropertyKind};

impl Form {
    /// Validate, materialize and commit the tree.
    ///
    /// `Ok(false)` when the tree is invalid or the store refused a write.
    pub fn save(&mut self, store: &dyn RecordStore) -> FormResult<bool> {
        if !self.is_valid() {
            debug!(form = self.root_node().type_name(), "save skipped: form is invalid");
            return Ok(false);
        }
        let root = self.root;
        self.materialize(store, root);
        self.commit(store)
    }

    /// Like [`Form::save`], reporting failures as errors.
    pub fn save_or_err(&mut self, store: &dyn RecordStore) -> FormResult<()> {
        if !self.is_valid() {
            return Err(FormError::validation(self.error_messages().join(", ")));
        }
        let root = self.root;
        self.materialize(store, root);
        if self.commit(store)? {
            Ok(())
        } else {
            Err(FormError::persistence(format!(
                "{} could not be saved; transaction rolled back",
                self.root_node().type_name()
            )))
        }
    }

    fn skipped(&self, prop: &PropertyDescriptor, id: NodeId) -> bool {
        let node = self.node(id);
        node.marked_for_destroy || prop.rejects(&node.values)
    }

    pub(crate) fn materialize(&mut self, store: &dyn RecordStore, id: NodeId) {
        let schema = Arc::clone(&self.node(id).schema);
        for prop in schema.relations() {
            for child in self.children(id, prop.name()).to_vec() {
                if !self.skipped(prop, child) {
                    self.materialize(store, child);
                }
            }
        }

        let node = self.node_mut(id);
        let mut attributes = FieldValues::new();
        for prop in schema.fields() {
            let value = node.value(prop.name());
            match &prop.kind {
                PropertyKind::BelongsToRecord { .. } => {
                    let fk = value.as_ref_record().map_or(Value::Null, |r| id_value(r.id));
                    attributes.insert(prop.id_column(), fk);
                }
                _ => {
                    attributes.insert(prop.name().to_string(), value);
                }
            }
        }
        store.update_attributes(&mut node.record, attributes);
    }

    fn commit(&mut self, store: &dyn RecordStore) -> FormResult<bool> {
        let snapshot: Vec<(NodeId, Record)> = self
            .walk(true)
            .into_iter()
            .map(|visit| (visit.node, self.node(visit.node).record.clone()))
            .collect();

        let root = self.root;
        let mut pruned = Vec::new();
        let outcome = {
            let mut body = || {
                pruned.clear();
                self.commit_node(store, root, None, &mut pruned)
            };
            store.transaction(&mut body)
        };

        match outcome {
            Ok(true) => {
                for id in pruned {
                    self.detach(id);
                }
                debug!(form = self.root_node().type_name(), id = ?self.id(), "form committed");
                Ok(true)
            }
            Ok(false) => {
                self.restore(snapshot);
                debug!(form = self.root_node().type_name(), "commit refused; rolled back");
                Ok(false)
            }
            Err(err) => {
                self.restore(snapshot);
                warn!(form = self.root_node().type_name(), error = %err, "commit failed; rolled back");
                Err(FormError::persistence(err.to_string()))
            }
        }
    }

    fn restore(&mut self, snapshot: Vec<(NodeId, Record)>) {
        for (id, record) in snapshot {
            self.node_mut(id).record = record;
        }
    }

    /// Save one node and its subtree. `link` carries the column and parent
    /// id for children that hold their parent's id.
    fn commit_node(
        &mut self,
        store: &dyn RecordStore,
        id: NodeId,
        link: Option<(&str, RecordId)>,
        pruned: &mut Vec<NodeId>,
    ) -> Result<bool, StoreError> {
        let schema = Arc::clone(&self.node(id).schema);

        for prop in schema.relations() {
            if matches!(prop.foreign_key(), ForeignKey::OnChild(_)) {
                continue;
            }
            for child in self.children(id, prop.name()).to_vec() {
                if self.node(child).marked_for_destroy {
                    if !self.destroy_node(store, child)? {
                        return Ok(false);
                    }
                    self.clear_parent_column(id, prop);
                    pruned.push(child);
                } else if prop.rejects(&self.node(child).values) {
                    self.clear_parent_column(id, prop);
                    pruned.push(child);
                } else {
                    if !self.commit_node(store, child, None, pruned)? {
                        return Ok(false);
                    }
                    if let ForeignKey::OnParent(column) = prop.foreign_key() {
                        let child_id = self.node(child).id().map_or(Value::Null, id_value);
                        self.node_mut(id).record.set(column.clone(), child_id);
                    }
                }
            }
        }

        if let Some((column, parent_id)) = link {
            self.node_mut(id).record.set(column, id_value(parent_id));
        }
        if !store.save(&mut self.node_mut(id).record)? {
            debug!(form = schema.name(), "record save refused");
            return Ok(false);
        }
        let Some(own_id) = self.node(id).id() else {
            return Ok(false);
        };

        for prop in schema.relations() {
            let ForeignKey::OnChild(column) = prop.foreign_key() else {
                continue;
            };
            for child in self.children(id, prop.name()).to_vec() {
                if self.node(child).marked_for_destroy {
                    if !self.destroy_node(store, child)? {
                        return Ok(false);
                    }
                    pruned.push(child);
                } else if prop.rejects(&self.node(child).values) {
                    let node = self.node_mut(child);
                    if node.record.is_persisted() {
                        node.record.set(column.clone(), Value::Null);
                        if !store.save(&mut node.record)? {
                            return Ok(false);
                        }
                    }
                    pruned.push(child);
                } else if !self.commit_node(store, child, Some((column.as_str(), own_id)), pruned)? {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Destroy a node's record after the dependents that hold its id.
    fn destroy_node(&mut self, store: &dyn RecordStore, id: NodeId) -> Result<bool, StoreError> {
        let schema = Arc::clone(&self.node(id).schema);
        for prop in schema.relations() {
            if !matches!(prop.foreign_key(), ForeignKey::OnChild(_)) {
                continue;
            }
            for child in self.children(id, prop.name()).to_vec() {
                if !self.destroy_node(store, child)? {
                    return Ok(false);
                }
            }
        }
        debug!(form = schema.name(), id = ?self.node(id).id(), "destroying record");
        store.destroy(&mut self.node_mut(id).record)
    }

    fn clear_parent_column(&mut self, id: NodeId, prop: &PropertyDescriptor) {
        if let ForeignKey::OnParent(column) = prop.foreign_key() {
            self.node_mut(id).record.set(column.clone(), Value::Null);
        }
    }
}

fn id_value(id: RecordId) -> Value {
    Value::Int(i64::from(id))
}
