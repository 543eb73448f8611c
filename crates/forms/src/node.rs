//! Form trees.
//!
//! A [`Form`] owns every node of one bound form in an arena. Nodes refer to
//! their children and their parent by [`NodeId`]; the parent link is
//! non-owning and is cleared when a node is detached from the tree.
//!
//! ## Construction
//!
//! Building a form reads the record in memory only: the defaults hook runs on
//! the node's copy of the record, declared fields are primed from its
//! attributes, and associations loaded on the record become child nodes.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::debug;

use formtree_core::params::{self, ID_KEY};
use formtree_core::{FieldValues, FormError, FormResult, Record, RecordId, RecordRef, Value};
use formtree_infra::RecordStore;

use crate::config::EngineConfig;
use crate::errors::Errors;
use crate::schema::{BindingKey, FormSchema, PropertyDescriptor, PropertyKind};

/// Index of a node inside its [`Form`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl core::fmt::Display for NodeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Back-reference from a nested node to the node holding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentLink {
    pub node: NodeId,
    pub relation: String,
}

/// Children of one nested-form relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Children {
    One(Option<NodeId>),
    Many(Vec<NodeId>),
}

impl Children {
    pub fn ids(&self) -> &[NodeId] {
        match self {
            Self::One(Some(id)) => std::slice::from_ref(id),
            Self::One(None) => &[],
            Self::Many(ids) => ids,
        }
    }
}

/// One node visited by [`Form::walk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visit<'a> {
    pub node: NodeId,
    /// Relation the node hangs under (`None` for the root).
    pub relation: Option<&'a str>,
    pub parent: Option<NodeId>,
}

#[derive(Debug)]
pub struct FormNode {
    pub(crate) schema: Arc<FormSchema>,
    pub(crate) record: Record,
    pub(crate) values: FieldValues,
    pub(crate) children: BTreeMap<String, Children>,
    pub(crate) parent: Option<ParentLink>,
    pub(crate) marked_for_destroy: bool,
    pub(crate) detached: bool,
    pub(crate) errors: Errors,
    pub(crate) binding_errors: Errors,
}

impl FormNode {
    pub fn schema(&self) -> &Arc<FormSchema> {
        &self.schema
    }

    pub fn type_name(&self) -> &str {
        self.schema.name()
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    /// Always read through the record.
    pub fn id(&self) -> Option<RecordId> {
        self.record.id()
    }

    pub fn is_persisted(&self) -> bool {
        self.record.is_persisted()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Field value, `Null` when unset.
    pub fn value(&self, name: &str) -> Value {
        self.values.get(name).cloned().unwrap_or_default()
    }

    pub fn values(&self) -> &FieldValues {
        &self.values
    }

    pub fn errors(&self) -> &Errors {
        &self.errors
    }

    pub fn parent(&self) -> Option<&ParentLink> {
        self.parent.as_ref()
    }

    pub fn is_marked_for_destroy(&self) -> bool {
        self.marked_for_destroy
    }

    /// Removed from the tree (destroyed or rejected during a commit).
    pub fn is_detached(&self) -> bool {
        self.detached
    }

    pub fn children_of(&self, relation: &str) -> &[NodeId] {
        self.children.get(relation).map(Children::ids).unwrap_or_default()
    }
}

/// A bound form: the root node and every nested node below it.
#[derive(Debug)]
pub struct Form {
    pub(crate) nodes: Vec<FormNode>,
    pub(crate) root: NodeId,
    pub(crate) config: EngineConfig,
}

impl Form {
    /// Wrap `record` in a form of type `schema`.
    pub fn new(schema: Arc<FormSchema>, record: Record) -> FormResult<Self> {
        Self::with_config(schema, record, EngineConfig::default())
    }

    pub fn with_config(schema: Arc<FormSchema>, record: Record, config: EngineConfig) -> FormResult<Self> {
        let mut form = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            config,
        };
        form.root = form.build_node(&schema, record, None)?;
        Ok(form)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn root_node(&self) -> &FormNode {
        self.node(self.root)
    }

    /// # Panics
    ///
    /// Panics if `id` was issued by another form.
    pub fn node(&self, id: NodeId) -> &FormNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut FormNode {
        &mut self.nodes[id.0]
    }

    pub fn id(&self) -> Option<RecordId> {
        self.root_node().id()
    }

    pub fn is_persisted(&self) -> bool {
        self.root_node().is_persisted()
    }

    /// Root field value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.root_node().get(name)
    }

    /// Root validation messages for `field`, as of the last validation.
    pub fn errors_for(&self, field: &str) -> &[String] {
        self.root_node().errors.get(field)
    }

    pub fn errors(&self) -> &Errors {
        &self.root_node().errors
    }

    pub fn children(&self, id: NodeId, relation: &str) -> &[NodeId] {
        self.node(id).children_of(relation)
    }

    /// The single child of a one-to-one relation.
    pub fn child(&self, id: NodeId, relation: &str) -> Option<NodeId> {
        match self.node(id).children.get(relation) {
            Some(Children::One(child)) => *child,
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent.as_ref().map(|link| link.node)
    }

    /// Nodes of the tree in depth-first order, relations in declaration
    /// order.
    pub fn walk(&self, including_root: bool) -> Vec<Visit<'_>> {
        let mut out = Vec::new();
        if including_root {
            out.push(Visit {
                node: self.root,
                relation: None,
                parent: None,
            });
        }
        self.collect_descendants(self.root, &mut out);
        out
    }

    fn collect_descendants<'a>(&'a self, id: NodeId, out: &mut Vec<Visit<'a>>) {
        let node = self.node(id);
        for prop in node.schema.relations() {
            for child in node.children_of(prop.name()) {
                out.push(Visit {
                    node: *child,
                    relation: Some(prop.name()),
                    parent: Some(id),
                });
                self.collect_descendants(*child, out);
            }
        }
    }

    pub(crate) fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut visits = Vec::new();
        self.collect_descendants(id, &mut visits);
        std::iter::once(id).chain(visits.into_iter().map(|v| v.node)).collect()
    }

    /// Dotted path of a node from the root (`albums[0].tracks[1]`).
    pub fn path_of(&self, id: NodeId) -> String {
        let mut segments = Vec::new();
        let mut current = id;
        while let Some(link) = &self.node(current).parent {
            let segment = match self.node(link.node).children.get(&link.relation) {
                Some(Children::Many(ids)) => match ids.iter().position(|c| *c == current) {
                    Some(idx) => format!("{}[{idx}]", link.relation),
                    None => link.relation.clone(),
                },
                _ => link.relation.clone(),
            };
            segments.push(segment);
            current = link.node;
        }
        segments.reverse();
        segments.join(".")
    }

    /// Every validation message of the tree, prefixed with its node path.
    pub fn error_messages(&self) -> Vec<String> {
        let mut out = Vec::new();
        for visit in self.walk(true) {
            let prefix = self.path_of(visit.node);
            for message in self.node(visit.node).errors.full_messages() {
                if prefix.is_empty() {
                    out.push(message);
                } else {
                    out.push(format!("{prefix}.{message}"));
                }
            }
        }
        out
    }

    /// Assign one submitted key on the root node.
    pub fn set(&mut self, store: &dyn RecordStore, name: &str, raw: &JsonValue) -> FormResult<()> {
        let root = self.root;
        self.set_on(store, root, name, raw)
    }

    /// Assign one submitted key on `id`.
    ///
    /// Scalars are coerced to their declared kind. Record references are
    /// resolved through the store. `<name>_attributes` keys bind the nested
    /// relation.
    pub fn set_on(&mut self, store: &dyn RecordStore, id: NodeId, name: &str, raw: &JsonValue) -> FormResult<()> {
        let schema = Arc::clone(&self.node(id).schema);
        match schema.binding_key(name) {
            None => Err(FormError::UnknownProperty(format!("{}.{name}", schema.name()))),
            Some(BindingKey::Identity) => {
                debug!(form = schema.name(), "ignoring submitted id");
                Ok(())
            }
            Some(BindingKey::Destroy) => {
                self.node_mut(id).marked_for_destroy = params::is_truthy(raw);
                Ok(())
            }
            Some(BindingKey::Field(idx)) => self.assign_field(store, id, schema.property_at(idx), raw),
            Some(BindingKey::RecordIds(idx)) => {
                self.assign_record_ids(store, id, schema.property_at(idx), raw)
            }
            Some(BindingKey::Nested(idx)) => self
                .bind_relation(store, id, schema.property_at(idx), raw)
                .map(|_| ()),
        }
    }

    fn assign_field(
        &mut self,
        store: &dyn RecordStore,
        id: NodeId,
        prop: &PropertyDescriptor,
        raw: &JsonValue,
    ) -> FormResult<()> {
        self.node_mut(id).binding_errors.remove(prop.name());
        let value = match &prop.kind {
            PropertyKind::Scalar(kind) => kind.coerce(raw),
            PropertyKind::BelongsToRecord { record_type } => {
                resolve_reference(store, prop.name(), record_type, raw)?
            }
            _ => return Err(FormError::UnknownProperty(prop.name().to_string())),
        };
        self.node_mut(id).values.insert(prop.name().to_string(), value);
        Ok(())
    }

    fn assign_record_ids(
        &mut self,
        store: &dyn RecordStore,
        id: NodeId,
        prop: &PropertyDescriptor,
        raw: &JsonValue,
    ) -> FormResult<()> {
        let Some(record_type) = prop.record_type() else {
            return Err(FormError::UnknownProperty(prop.name().to_string()));
        };
        let Some(entries) = params::list_entries(raw) else {
            return Err(FormError::type_mismatch(prop.name(), "expected a list of ids"));
        };

        self.node_mut(id).binding_errors.remove(prop.name());
        let mut refs = Vec::with_capacity(entries.len());
        let mut missing = false;
        for (_, entry) in entries {
            match resolve_reference(store, prop.name(), record_type, entry) {
                Ok(Value::Null) => {}
                Ok(value) => refs.push(value),
                Err(FormError::NotFound { .. }) => missing = true,
                Err(err) => return Err(err),
            }
        }

        let node = self.node_mut(id);
        if missing {
            node.binding_errors.add(prop.name(), "could not be found");
        } else {
            node.values.insert(prop.name().to_string(), Value::List(refs));
        }
        Ok(())
    }

    /// Assign an already loaded record to a record relation.
    ///
    /// Single references are replaced; record lists get the record appended.
    pub fn assign_record(&mut self, id: NodeId, name: &str, record: &Record) -> FormResult<()> {
        let schema = Arc::clone(&self.node(id).schema);
        let Some(prop) = schema.property(name) else {
            return Err(FormError::UnknownProperty(format!("{}.{name}", schema.name())));
        };
        let Some(record_type) = prop.record_type() else {
            return Err(FormError::type_mismatch(name, "not a record relation"));
        };
        if record.record_type() != record_type {
            return Err(FormError::type_mismatch(
                name,
                format!("expected a {record_type} record, got {}", record.record_type()),
            ));
        }
        let Some(reference) = record.to_ref() else {
            return Err(FormError::type_mismatch(name, "record has not been saved"));
        };

        let node = self.node_mut(id);
        node.binding_errors.remove(name);
        match &prop.kind {
            PropertyKind::HasManyRecords { .. } => {
                let mut list = node.value(name).as_list().map(<[Value]>::to_vec).unwrap_or_default();
                list.push(Value::Ref(reference));
                node.values.insert(name.to_string(), Value::List(list));
            }
            _ => {
                node.values.insert(name.to_string(), Value::Ref(reference));
            }
        }
        Ok(())
    }

    /// Append a nested node wrapping `record` to a form relation.
    ///
    /// A one-to-one relation replaces (and detaches) its current child.
    pub fn push_child(&mut self, id: NodeId, relation: &str, record: Record) -> FormResult<NodeId> {
        let schema = Arc::clone(&self.node(id).schema);
        let Some(nested) = schema.property(relation).and_then(PropertyDescriptor::nested_schema) else {
            return Err(FormError::UnknownProperty(format!("{}.{relation}", schema.name())));
        };
        let link = ParentLink {
            node: id,
            relation: relation.to_string(),
        };
        let child = self.build_node(nested, record, Some(link))?;
        self.attach(id, relation, child);
        Ok(child)
    }

    /// Link `child` under `relation` of `id`.
    pub(crate) fn attach(&mut self, id: NodeId, relation: &str, child: NodeId) {
        let previous = match self.node_mut(id).children.get_mut(relation) {
            Some(Children::Many(ids)) => {
                ids.push(child);
                None
            }
            Some(Children::One(slot)) => slot.replace(child),
            None => {
                self.node_mut(id)
                    .children
                    .insert(relation.to_string(), Children::Many(vec![child]));
                None
            }
        };
        if let Some(previous) = previous.filter(|p| *p != child) {
            self.node_mut(previous).parent = None;
            for node in self.subtree(previous) {
                self.node_mut(node).detached = true;
            }
        }
    }

    /// Unlink a node from its parent and mark its subtree detached.
    pub(crate) fn detach(&mut self, id: NodeId) {
        if let Some(link) = self.node_mut(id).parent.take() {
            match self.node_mut(link.node).children.get_mut(&link.relation) {
                Some(Children::One(slot)) if *slot == Some(id) => *slot = None,
                Some(Children::Many(ids)) => ids.retain(|c| *c != id),
                _ => {}
            }
        }
        for node in self.subtree(id) {
            self.node_mut(node).detached = true;
        }
    }

    /// Push a node for `record` and the nodes of its loaded associations.
    pub(crate) fn build_node(
        &mut self,
        schema: &Arc<FormSchema>,
        mut record: Record,
        parent: Option<ParentLink>,
    ) -> FormResult<NodeId> {
        if record.record_type() != schema.model() {
            return Err(FormError::construction(
                schema.name(),
                format!("expected a {} record, got {}", schema.model(), record.record_type()),
            ));
        }
        if record.is_persisted() && record.id().is_none() {
            return Err(FormError::construction(schema.name(), "persisted record without an id"));
        }
        if record.is_destroyed() {
            return Err(FormError::construction(schema.name(), "record has been destroyed"));
        }

        schema.apply_defaults(&mut record);
        let values = prime(schema, &mut record);

        let mut pending = Vec::new();
        let mut children = BTreeMap::new();
        for prop in schema.relations() {
            match prop.kind {
                PropertyKind::BelongsToForm { .. } => {
                    children.insert(prop.name().to_string(), Children::One(None));
                    if let Some(loaded) = record.take_one(prop.name()) {
                        pending.push((prop, loaded));
                    }
                }
                _ => {
                    children.insert(prop.name().to_string(), Children::Many(Vec::new()));
                    for loaded in record.take_many(prop.name()) {
                        pending.push((prop, loaded));
                    }
                }
            }
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(FormNode {
            schema: Arc::clone(schema),
            record,
            values,
            children,
            parent,
            marked_for_destroy: false,
            detached: false,
            errors: Errors::new(),
            binding_errors: Errors::new(),
        });

        for (prop, loaded) in pending {
            let Some(nested) = prop.nested_schema() else {
                continue;
            };
            let link = ParentLink {
                node: id,
                relation: prop.name().to_string(),
            };
            let child = self.build_node(nested, loaded, Some(link))?;
            self.attach(id, prop.name(), child);
        }
        Ok(id)
    }
}

/// Field values of a freshly wrapped record.
fn prime(schema: &FormSchema, record: &mut Record) -> FieldValues {
    let mut values = FieldValues::new();
    for prop in schema.fields() {
        let value = match &prop.kind {
            PropertyKind::Scalar(_) => record.attribute(prop.name()),
            PropertyKind::BelongsToRecord { record_type } => {
                let by_column = record
                    .get(&prop.id_column())
                    .and_then(Value::as_int)
                    .and_then(|raw| u64::try_from(raw).ok())
                    .filter(|raw| *raw > 0)
                    .map(|raw| RecordRef::new(record_type.clone(), RecordId::new(raw)));
                let by_attribute = record.get(prop.name()).and_then(Value::as_ref_record).cloned();
                let by_association = record.one(prop.name()).and_then(Record::to_ref);
                by_column
                    .or(by_attribute)
                    .or(by_association)
                    .map_or(Value::Null, Value::Ref)
            }
            PropertyKind::HasManyRecords { .. } => match record.get(prop.name()) {
                Some(Value::List(items)) => Value::List(items.clone()),
                _ => Value::List(
                    record
                        .take_many(prop.name())
                        .iter()
                        .filter_map(Record::to_ref)
                        .map(Value::Ref)
                        .collect(),
                ),
            },
            PropertyKind::BelongsToForm { .. } | PropertyKind::HasManyForms { .. } => continue,
        };
        values.insert(prop.name().to_string(), value);
    }
    values
}

/// Resolve a submitted record reference.
///
/// Blank values clear the reference, positive ids are looked up, anything
/// else is a type mismatch.
pub(crate) fn resolve_reference(
    store: &dyn RecordStore,
    property: &str,
    record_type: &str,
    raw: &JsonValue,
) -> FormResult<Value> {
    match raw {
        JsonValue::Null => return Ok(Value::Null),
        JsonValue::String(s) if s.trim().is_empty() => return Ok(Value::Null),
        JsonValue::Object(map) => {
            return match map.get(ID_KEY) {
                Some(id) => resolve_reference(store, property, record_type, id),
                None => Err(FormError::type_mismatch(property, "expected an object with an id")),
            };
        }
        _ => {}
    }

    let Some(id) = RecordId::from_param(raw) else {
        return Err(FormError::type_mismatch(
            property,
            format!("can't find a {record_type} record from {raw}"),
        ));
    };
    let record = store.find(record_type, id)?;
    let id = record.id().unwrap_or(id);
    Ok(Value::Ref(RecordRef::new(record_type, id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PropertyOptions;
    use formtree_infra::InMemoryRecordStore;
    use serde_json::json;

    fn address_form() -> Arc<FormSchema> {
        FormSchema::builder("AddressForm", "Address")
            .properties(&["street", "number"], PropertyOptions::text())
            .unwrap()
            .build()
    }

    fn organisation_form() -> Arc<FormSchema> {
        let address = address_form();
        FormSchema::builder("OrganisationForm", "Organisation")
            .property("name", PropertyOptions::text())
            .unwrap()
            .property("founded", PropertyOptions::integer())
            .unwrap()
            .property("country", PropertyOptions::record("Country"))
            .unwrap()
            .property("address", PropertyOptions::form(&address))
            .unwrap()
            .property("branches", PropertyOptions::forms(&address))
            .unwrap()
            .build()
    }

    #[test]
    fn construction_rejects_foreign_record_types() {
        let err = Form::new(organisation_form(), Record::new("Person")).unwrap_err();
        assert!(matches!(err, FormError::Construction { .. }));
    }

    #[test]
    fn fields_are_primed_from_the_record() {
        let record = Record::loaded("Organisation", RecordId::new(3), FieldValues::new())
            .with_attr("name", "LICO")
            .with_attr("founded", 2014_i64)
            .with_attr("country_id", 7_i64)
            .with_one("address", Record::new("Address").with_attr("street", "Main"))
            .with_many("branches", vec![Record::new("Address"), Record::new("Address")]);

        let form = Form::new(organisation_form(), record).unwrap();
        assert_eq!(form.id(), Some(RecordId::new(3)));
        assert_eq!(form.get("name"), Some(&Value::text("LICO")));
        assert_eq!(form.get("founded"), Some(&Value::Int(2014)));
        assert_eq!(
            form.get("country"),
            Some(&Value::Ref(RecordRef::new("Country", RecordId::new(7))))
        );

        let address = form.child(form.root(), "address").unwrap();
        assert_eq!(form.node(address).value("street"), Value::text("Main"));
        assert_eq!(form.node(address).value("number"), Value::Null);
        assert_eq!(form.parent(address), Some(form.root()));
        assert_eq!(form.children(form.root(), "branches").len(), 2);
        assert!(form.root_node().record().one("address").is_none());
    }

    #[test]
    fn defaults_hook_runs_before_priming() {
        let schema = FormSchema::builder("AddressForm", "Address")
            .property("street", PropertyOptions::text())
            .unwrap()
            .defaults(|record| {
                if record.get("street").is_none() {
                    record.set("street", Value::text("Unknown"));
                }
            })
            .build();
        let form = Form::new(schema, Record::new("Address")).unwrap();
        assert_eq!(form.get("street"), Some(&Value::text("Unknown")));
    }

    #[test]
    fn set_coerces_and_resolves_references() {
        let store = InMemoryRecordStore::new();
        let country = store.create("Country", FieldValues::new()).unwrap();
        let mut form = Form::new(organisation_form(), Record::new("Organisation")).unwrap();

        form.set(&store, "founded", &json!("1999")).unwrap();
        assert_eq!(form.get("founded"), Some(&Value::Int(1999)));

        form.set(&store, "country", &json!(country.id().unwrap().get())).unwrap();
        assert_eq!(form.get("country").and_then(Value::as_ref_record), country.to_ref().as_ref());

        form.set(&store, "country_id", &json!("")).unwrap();
        assert_eq!(form.get("country"), Some(&Value::Null));

        let err = form.set(&store, "country", &json!("abc")).unwrap_err();
        assert!(matches!(err, FormError::TypeMismatch { .. }));

        let err = form.set(&store, "country", &json!(99)).unwrap_err();
        assert!(matches!(err, FormError::NotFound { .. }));

        let err = form.set(&store, "bogus", &json!(1)).unwrap_err();
        assert!(matches!(err, FormError::UnknownProperty(_)));
    }

    #[test]
    fn assign_record_requires_a_saved_record_of_the_target_type() {
        let mut form = Form::new(organisation_form(), Record::new("Organisation")).unwrap();
        let root = form.root();

        let err = form.assign_record(root, "country", &Record::new("Country")).unwrap_err();
        assert!(matches!(err, FormError::TypeMismatch { .. }));

        let err = form
            .assign_record(root, "country", &Record::loaded("Genre", RecordId::new(1), FieldValues::new()))
            .unwrap_err();
        assert!(matches!(err, FormError::TypeMismatch { .. }));

        let country = Record::loaded("Country", RecordId::new(2), FieldValues::new());
        form.assign_record(root, "country", &country).unwrap();
        assert_eq!(form.get("country").and_then(Value::as_ref_record), country.to_ref().as_ref());
    }

    #[test]
    fn push_child_replaces_single_children() {
        let mut form = Form::new(organisation_form(), Record::new("Organisation")).unwrap();
        let root = form.root();
        let first = form.push_child(root, "address", Record::new("Address")).unwrap();
        let second = form.push_child(root, "address", Record::new("Address")).unwrap();

        assert_eq!(form.child(root, "address"), Some(second));
        assert!(form.node(first).is_detached());
        assert_eq!(form.node(first).parent(), None);

        form.push_child(root, "branches", Record::new("Address")).unwrap();
        form.push_child(root, "branches", Record::new("Address")).unwrap();
        assert_eq!(form.children(root, "branches").len(), 2);
    }

    #[test]
    fn walk_reports_relations_and_paths() {
        let record = Record::new("Organisation")
            .with_one("address", Record::new("Address"))
            .with_many("branches", vec![Record::new("Address"), Record::new("Address")]);
        let form = Form::new(organisation_form(), record).unwrap();

        let visits = form.walk(false);
        let relations: Vec<Option<&str>> = visits.iter().map(|v| v.relation).collect();
        assert_eq!(relations, vec![Some("address"), Some("branches"), Some("branches")]);
        assert_eq!(form.walk(true).len(), 4);

        let second_branch = form.children(form.root(), "branches")[1];
        assert_eq!(form.path_of(second_branch), "branches[1]");
        assert_eq!(form.path_of(form.root()), "");
    }
}
