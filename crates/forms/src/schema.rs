//! Declarative form schemas.
//!
//! A [`FormSchema`] is built once per form type and shared behind an `Arc`.
//! It lists the declared properties in order, classifies every wire key the
//! binder may meet ([`BindingKey`]) and carries the optional defaults hook.

use std::collections::HashMap;
use std::sync::Arc;

use formtree_core::params::{self, DESTROY_KEY, ID_KEY};
use formtree_core::{FieldValues, FormError, FormResult, Record, ScalarKind, value};

use crate::rules::Rule;

/// Predicate over a nested node's field values; `true` rejects the node.
pub type RejectIf = Arc<dyn Fn(&FieldValues) -> bool + Send + Sync>;

/// Hook run on a node's record before its fields are primed.
pub type DefaultsHook = Arc<dyn Fn(&mut Record) + Send + Sync>;

/// Declared type of a property.
#[derive(Clone)]
pub enum PropertyType {
    Scalar(ScalarKind),
    /// A persistent record type, referenced by id.
    Record(String),
    /// A nested form.
    Form(Arc<FormSchema>),
    /// A collection of records or nested forms.
    ListOf(Box<PropertyType>),
}

impl PropertyType {
    pub fn list_of(inner: PropertyType) -> Self {
        Self::ListOf(Box::new(inner))
    }
}

impl core::fmt::Debug for PropertyType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Scalar(kind) => write!(f, "Scalar({kind:?})"),
            Self::Record(t) => write!(f, "Record({t})"),
            Self::Form(schema) => write!(f, "Form({})", schema.name()),
            Self::ListOf(inner) => write!(f, "ListOf({inner:?})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Primitive,
    SingleRelation,
    ListRelation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    BelongsToRecord,
    BelongsToForm,
    HasManyRecords,
    HasManyForms,
}

/// What a relation property points at.
#[derive(Debug, Clone, Copy)]
pub enum RelationTarget<'a> {
    Record(&'a str),
    Form(&'a Arc<FormSchema>),
}

/// Where the column linking a nested form to its parent lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForeignKey {
    /// No link column; the child is saved before the parent.
    None,
    /// Column on the parent's record holding the child's id. The child is
    /// saved first.
    OnParent(String),
    /// Column on the child's record holding the parent's id. The parent is
    /// saved first.
    OnChild(String),
}

#[derive(Clone)]
pub(crate) enum PropertyKind {
    Scalar(ScalarKind),
    BelongsToRecord { record_type: String },
    BelongsToForm { schema: Arc<FormSchema> },
    HasManyRecords { record_type: String },
    HasManyForms { schema: Arc<FormSchema> },
}

/// Options of one property declaration.
#[derive(Clone, Default)]
pub struct PropertyOptions {
    ty: Option<PropertyType>,
    rules: Vec<Rule>,
    reject_if: Option<RejectIf>,
    allow_destroy: bool,
    foreign_key: Option<ForeignKey>,
    ids_key: Option<String>,
}

impl PropertyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of_type(ty: PropertyType) -> Self {
        Self {
            ty: Some(ty),
            ..Self::default()
        }
    }

    pub fn scalar(kind: ScalarKind) -> Self {
        Self::of_type(PropertyType::Scalar(kind))
    }

    pub fn text() -> Self {
        Self::scalar(ScalarKind::Text)
    }

    pub fn integer() -> Self {
        Self::scalar(ScalarKind::Integer)
    }

    pub fn float() -> Self {
        Self::scalar(ScalarKind::Float)
    }

    pub fn boolean() -> Self {
        Self::scalar(ScalarKind::Boolean)
    }

    pub fn date() -> Self {
        Self::scalar(ScalarKind::Date)
    }

    pub fn datetime() -> Self {
        Self::scalar(ScalarKind::DateTime)
    }

    /// A single record referenced by id.
    pub fn record(record_type: impl Into<String>) -> Self {
        Self::of_type(PropertyType::Record(record_type.into()))
    }

    /// A list of records referenced by id.
    pub fn records(record_type: impl Into<String>) -> Self {
        Self::of_type(PropertyType::list_of(PropertyType::Record(record_type.into())))
    }

    /// A single nested form.
    pub fn form(schema: &Arc<FormSchema>) -> Self {
        Self::of_type(PropertyType::Form(Arc::clone(schema)))
    }

    /// A list of nested forms.
    pub fn forms(schema: &Arc<FormSchema>) -> Self {
        Self::of_type(PropertyType::list_of(PropertyType::Form(Arc::clone(schema))))
    }

    pub fn validates(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn reject_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&FieldValues) -> bool + Send + Sync + 'static,
    {
        self.reject_if = Some(Arc::new(predicate));
        self
    }

    /// Reject nested submissions whose every field is blank.
    pub fn reject_if_all_blank(self) -> Self {
        self.reject_if(value::all_blank)
    }

    pub fn allow_destroy(mut self) -> Self {
        self.allow_destroy = true;
        self
    }

    pub fn foreign_key_on_parent(mut self, column: impl Into<String>) -> Self {
        self.foreign_key = Some(ForeignKey::OnParent(column.into()));
        self
    }

    pub fn foreign_key_on_child(mut self, column: impl Into<String>) -> Self {
        self.foreign_key = Some(ForeignKey::OnChild(column.into()));
        self
    }

    pub fn without_foreign_key(mut self) -> Self {
        self.foreign_key = Some(ForeignKey::None);
        self
    }

    /// Extra key replacing a record list from an array of ids (`track_ids`).
    pub fn ids_key(mut self, key: impl Into<String>) -> Self {
        self.ids_key = Some(key.into());
        self
    }
}

/// Static metadata of one declared property.
#[derive(Clone)]
pub struct PropertyDescriptor {
    name: String,
    pub(crate) kind: PropertyKind,
    rules: Vec<Rule>,
    reject_if: Option<RejectIf>,
    allow_destroy: bool,
    foreign_key: ForeignKey,
    ids_key: Option<String>,
}

impl PropertyDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_kind(&self) -> ValueKind {
        match self.kind {
            PropertyKind::Scalar(_) => ValueKind::Primitive,
            PropertyKind::BelongsToRecord { .. } | PropertyKind::BelongsToForm { .. } => {
                ValueKind::SingleRelation
            }
            PropertyKind::HasManyRecords { .. } | PropertyKind::HasManyForms { .. } => {
                ValueKind::ListRelation
            }
        }
    }

    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self.kind {
            PropertyKind::Scalar(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn relation_kind(&self) -> Option<RelationKind> {
        match self.kind {
            PropertyKind::Scalar(_) => None,
            PropertyKind::BelongsToRecord { .. } => Some(RelationKind::BelongsToRecord),
            PropertyKind::BelongsToForm { .. } => Some(RelationKind::BelongsToForm),
            PropertyKind::HasManyRecords { .. } => Some(RelationKind::HasManyRecords),
            PropertyKind::HasManyForms { .. } => Some(RelationKind::HasManyForms),
        }
    }

    pub fn relation_target(&self) -> Option<RelationTarget<'_>> {
        match &self.kind {
            PropertyKind::Scalar(_) => None,
            PropertyKind::BelongsToRecord { record_type }
            | PropertyKind::HasManyRecords { record_type } => {
                Some(RelationTarget::Record(record_type))
            }
            PropertyKind::BelongsToForm { schema } | PropertyKind::HasManyForms { schema } => {
                Some(RelationTarget::Form(schema))
            }
        }
    }

    /// Schema of the nested form, for form relations.
    pub fn nested_schema(&self) -> Option<&Arc<FormSchema>> {
        match &self.kind {
            PropertyKind::BelongsToForm { schema } | PropertyKind::HasManyForms { schema } => {
                Some(schema)
            }
            _ => None,
        }
    }

    /// Target record type, for record relations.
    pub fn record_type(&self) -> Option<&str> {
        match &self.kind {
            PropertyKind::BelongsToRecord { record_type }
            | PropertyKind::HasManyRecords { record_type } => Some(record_type),
            _ => None,
        }
    }

    pub fn is_form_relation(&self) -> bool {
        self.nested_schema().is_some()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn allows_destroy(&self) -> bool {
        self.allow_destroy
    }

    pub fn foreign_key(&self) -> &ForeignKey {
        &self.foreign_key
    }

    pub fn ids_key(&self) -> Option<&str> {
        self.ids_key.as_deref()
    }

    /// Whether a nested node with these values is treated as absent.
    pub fn rejects(&self, values: &FieldValues) -> bool {
        self.reject_if.as_ref().is_some_and(|predicate| predicate(values))
    }

    /// Record column that receives the id of a referenced record.
    pub(crate) fn id_column(&self) -> String {
        match &self.foreign_key {
            ForeignKey::OnParent(column) => column.clone(),
            _ => format!("{}_id", self.name),
        }
    }
}

impl core::fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("value_kind", &self.value_kind())
            .field("relation_kind", &self.relation_kind())
            .field("rules", &self.rules)
            .field("reject_if", &self.reject_if.is_some())
            .field("allow_destroy", &self.allow_destroy)
            .field("foreign_key", &self.foreign_key)
            .finish()
    }
}

/// Classification of a submitted key, computed once at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKey {
    /// Scalar field or single record reference (by name or id column).
    Field(usize),
    /// `<name>_attributes` of a relation.
    Nested(usize),
    /// Id-list key of a record list.
    RecordIds(usize),
    Destroy,
    Identity,
}

impl BindingKey {
    /// Relation keys are assigned in the second binding pass.
    pub fn is_nested(self) -> bool {
        matches!(self, Self::Nested(_))
    }
}

pub struct FormSchema {
    name: String,
    model: String,
    properties: Vec<PropertyDescriptor>,
    by_name: HashMap<String, usize>,
    keys: HashMap<String, BindingKey>,
    defaults: Option<DefaultsHook>,
}

impl FormSchema {
    pub fn builder(name: impl Into<String>, model: impl Into<String>) -> FormSchemaBuilder {
        let mut keys = HashMap::new();
        keys.insert(DESTROY_KEY.to_string(), BindingKey::Destroy);
        keys.insert(ID_KEY.to_string(), BindingKey::Identity);
        FormSchemaBuilder {
            schema: FormSchema {
                name: name.into(),
                model: model.into(),
                properties: Vec::new(),
                by_name: HashMap::new(),
                keys,
                defaults: None,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record type this form wraps.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.by_name.get(name).map(|idx| &self.properties[*idx])
    }

    pub(crate) fn property_at(&self, idx: usize) -> &PropertyDescriptor {
        &self.properties[idx]
    }

    pub fn binding_key(&self, key: &str) -> Option<BindingKey> {
        self.keys.get(key).copied()
    }

    /// Properties that are not nested forms, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.iter().filter(|p| !p.is_form_relation())
    }

    /// Nested-form relations, in declaration order.
    pub fn relations(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.iter().filter(|p| p.is_form_relation())
    }

    pub(crate) fn apply_defaults(&self, record: &mut Record) {
        if let Some(hook) = &self.defaults {
            hook(record);
        }
    }
}

impl core::fmt::Debug for FormSchema {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FormSchema")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("properties", &self.properties)
            .field("defaults", &self.defaults.is_some())
            .finish()
    }
}

pub struct FormSchemaBuilder {
    schema: FormSchema,
}

impl FormSchemaBuilder {
    /// Declare one property.
    pub fn property(mut self, name: impl Into<String>, options: PropertyOptions) -> FormResult<Self> {
        let name = name.into();
        let form = self.schema.name.clone();
        if name == ID_KEY {
            return Err(FormError::unsupported_type(name, "ids are read through the record"));
        }
        if self.schema.by_name.contains_key(&name) || name == DESTROY_KEY {
            return Err(FormError::duplicate_property(form, name));
        }

        let PropertyOptions {
            ty,
            rules,
            reject_if,
            allow_destroy,
            foreign_key,
            ids_key,
        } = options;
        let kind = resolve_kind(&name, ty.unwrap_or(PropertyType::Scalar(ScalarKind::Text)))?;

        let is_form = matches!(
            kind,
            PropertyKind::BelongsToForm { .. } | PropertyKind::HasManyForms { .. }
        );
        if !is_form && (reject_if.is_some() || allow_destroy) {
            return Err(FormError::unsupported_type(
                name,
                "reject_if and allow_destroy apply to nested forms only",
            ));
        }
        if is_form && !rules.is_empty() {
            return Err(FormError::unsupported_type(
                name,
                "nested forms carry their own validations",
            ));
        }
        if ids_key.is_some() && !matches!(kind, PropertyKind::HasManyRecords { .. }) {
            return Err(FormError::unsupported_type(name, "ids_key applies to record lists only"));
        }

        let foreign_key = match (&kind, foreign_key) {
            (PropertyKind::HasManyForms { .. }, Some(ForeignKey::OnParent(_))) => {
                return Err(FormError::unsupported_type(
                    name,
                    "a nested list cannot keep its link column on the parent",
                ));
            }
            (_, Some(fk)) => fk,
            (PropertyKind::HasManyForms { .. }, None) => {
                ForeignKey::OnChild(format!("{}_id", snake_case(&self.schema.model)))
            }
            (PropertyKind::BelongsToForm { .. }, None) => ForeignKey::OnParent(format!("{name}_id")),
            (_, None) => ForeignKey::None,
        };

        let descriptor = PropertyDescriptor {
            name: name.clone(),
            kind,
            rules,
            reject_if,
            allow_destroy,
            foreign_key,
            ids_key,
        };
        let idx = self.schema.properties.len();

        let mut keys = vec![];
        match descriptor.kind {
            PropertyKind::Scalar(_) => keys.push((name.clone(), BindingKey::Field(idx))),
            PropertyKind::BelongsToRecord { .. } => {
                keys.push((name.clone(), BindingKey::Field(idx)));
                keys.push((descriptor.id_column(), BindingKey::Field(idx)));
            }
            PropertyKind::HasManyRecords { .. } => {
                keys.push((params::attributes_key(&name), BindingKey::Nested(idx)));
                if let Some(ids) = &descriptor.ids_key {
                    keys.push((ids.clone(), BindingKey::RecordIds(idx)));
                }
            }
            PropertyKind::BelongsToForm { .. } | PropertyKind::HasManyForms { .. } => {
                keys.push((params::attributes_key(&name), BindingKey::Nested(idx)));
            }
        }
        for (key, _) in &keys {
            if self.schema.keys.contains_key(key) {
                return Err(FormError::duplicate_property(form, key.clone()));
            }
        }

        self.schema.keys.extend(keys);
        self.schema.by_name.insert(name, idx);
        self.schema.properties.push(descriptor);
        Ok(self)
    }

    /// Declare several properties sharing the same options.
    pub fn properties(mut self, names: &[&str], options: PropertyOptions) -> FormResult<Self> {
        for name in names {
            self = self.property(*name, options.clone())?;
        }
        Ok(self)
    }

    /// Install the defaults hook, run on a node's record before priming.
    pub fn defaults<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Record) + Send + Sync + 'static,
    {
        self.schema.defaults = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> Arc<FormSchema> {
        Arc::new(self.schema)
    }
}

fn resolve_kind(name: &str, ty: PropertyType) -> FormResult<PropertyKind> {
    match ty {
        PropertyType::Scalar(kind) => Ok(PropertyKind::Scalar(kind)),
        PropertyType::Record(record_type) => Ok(PropertyKind::BelongsToRecord { record_type }),
        PropertyType::Form(schema) => Ok(PropertyKind::BelongsToForm { schema }),
        PropertyType::ListOf(inner) => match *inner {
            PropertyType::Record(record_type) => Ok(PropertyKind::HasManyRecords { record_type }),
            PropertyType::Form(schema) => Ok(PropertyKind::HasManyForms { schema }),
            other => Err(FormError::unsupported_type(
                name,
                format!("lists must hold records or forms, not {other:?}"),
            )),
        },
    }
}

/// `RecordLabel` -> `record_label`.
pub(crate) fn snake_case(model: &str) -> String {
    let mut out = String::with_capacity(model.len() + 4);
    for (i, ch) in model.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track_form() -> Arc<FormSchema> {
        FormSchema::builder("TrackForm", "Track")
            .property("name", PropertyOptions::text())
            .unwrap()
            .build()
    }

    #[test]
    fn relation_kinds_follow_declared_types() {
        let tracks = track_form();
        let schema = FormSchema::builder("AlbumForm", "Album")
            .property("name", PropertyOptions::text().validates(Rule::presence()))
            .unwrap()
            .property("genre", PropertyOptions::record("Genre"))
            .unwrap()
            .property("tracks", PropertyOptions::forms(&tracks))
            .unwrap()
            .property("credits", PropertyOptions::records("Person"))
            .unwrap()
            .property("cover", PropertyOptions::form(&tracks))
            .unwrap()
            .build();

        let kind = |n: &str| schema.property(n).and_then(PropertyDescriptor::relation_kind);
        assert_eq!(kind("name"), None);
        assert_eq!(kind("genre"), Some(RelationKind::BelongsToRecord));
        assert_eq!(kind("tracks"), Some(RelationKind::HasManyForms));
        assert_eq!(kind("credits"), Some(RelationKind::HasManyRecords));
        assert_eq!(kind("cover"), Some(RelationKind::BelongsToForm));
        assert_eq!(
            schema.property("name").map(PropertyDescriptor::value_kind),
            Some(ValueKind::Primitive)
        );
    }

    #[test]
    fn binding_keys_are_classified_once() {
        let tracks = track_form();
        let schema = FormSchema::builder("AlbumForm", "Album")
            .property("name", PropertyOptions::text())
            .unwrap()
            .property("genre", PropertyOptions::record("Genre"))
            .unwrap()
            .property("tracks", PropertyOptions::forms(&tracks))
            .unwrap()
            .build();

        assert_eq!(schema.binding_key("name"), Some(BindingKey::Field(0)));
        assert_eq!(schema.binding_key("genre"), Some(BindingKey::Field(1)));
        assert_eq!(schema.binding_key("genre_id"), Some(BindingKey::Field(1)));
        assert_eq!(schema.binding_key("tracks_attributes"), Some(BindingKey::Nested(2)));
        assert_eq!(schema.binding_key("tracks"), None);
        assert_eq!(schema.binding_key("_destroy"), Some(BindingKey::Destroy));
        assert_eq!(schema.binding_key("id"), Some(BindingKey::Identity));
    }

    #[test]
    fn duplicate_declarations_fail() {
        let err = FormSchema::builder("ArtistForm", "Artist")
            .property("name", PropertyOptions::text())
            .unwrap()
            .property("name", PropertyOptions::integer())
            .err()
            .unwrap();
        assert_eq!(err, FormError::duplicate_property("ArtistForm", "name"));

        let err = FormSchema::builder("ArtistForm", "Artist")
            .property("_destroy", PropertyOptions::boolean())
            .err()
            .unwrap();
        assert!(matches!(err, FormError::DuplicateProperty { .. }));
    }

    #[test]
    fn foreign_key_alias_collisions_fail() {
        let err = FormSchema::builder("AlbumForm", "Album")
            .property("genre_id", PropertyOptions::integer())
            .unwrap()
            .property("genre", PropertyOptions::record("Genre"))
            .err()
            .unwrap();
        assert_eq!(err, FormError::duplicate_property("AlbumForm", "genre_id"));
    }

    #[test]
    fn lists_of_scalars_are_unsupported() {
        let err = FormSchema::builder("ArtistForm", "Artist")
            .property(
                "aliases",
                PropertyOptions::of_type(PropertyType::list_of(PropertyType::Scalar(ScalarKind::Text))),
            )
            .err()
            .unwrap();
        assert!(matches!(err, FormError::UnsupportedType { .. }));
    }

    #[test]
    fn default_foreign_keys_depend_on_relation_kind() {
        let tracks = track_form();
        let schema = FormSchema::builder("RecordLabelForm", "RecordLabel")
            .property("tracks", PropertyOptions::forms(&tracks))
            .unwrap()
            .property("hit", PropertyOptions::form(&tracks))
            .unwrap()
            .property("address", PropertyOptions::form(&tracks).foreign_key_on_child("label_id"))
            .unwrap()
            .build();

        let fk = |n: &str| schema.property(n).map(|p| p.foreign_key().clone());
        assert_eq!(fk("tracks"), Some(ForeignKey::OnChild("record_label_id".into())));
        assert_eq!(fk("hit"), Some(ForeignKey::OnParent("hit_id".into())));
        assert_eq!(fk("address"), Some(ForeignKey::OnChild("label_id".into())));
    }

    #[test]
    fn reject_if_is_limited_to_nested_forms() {
        let err = FormSchema::builder("AlbumForm", "Album")
            .property("name", PropertyOptions::text().reject_if_all_blank())
            .err()
            .unwrap();
        assert!(matches!(err, FormError::UnsupportedType { .. }));
    }

    #[test]
    fn batch_declaration_shares_options() {
        let schema = FormSchema::builder("AddressForm", "Address")
            .properties(&["street", "number"], PropertyOptions::text().validates(Rule::presence()))
            .unwrap()
            .build();
        assert_eq!(schema.properties().len(), 2);
        assert_eq!(schema.property("number").map(|p| p.rules().len()), Some(1));
    }

    #[test]
    fn reject_all_blank_ignores_nothing_but_blank_values() {
        let tracks = track_form();
        let schema = FormSchema::builder("ArtistForm", "Artist")
            .property("tracks", PropertyOptions::forms(&tracks).reject_if_all_blank())
            .unwrap()
            .build();
        let prop = schema.property("tracks").unwrap();

        let mut values = FieldValues::new();
        values.insert("name".into(), formtree_core::Value::text(" "));
        assert!(prop.rejects(&values));
        values.insert("name".into(), formtree_core::Value::text("Intro"));
        assert!(!prop.rejects(&values));
    }

    #[test]
    fn snake_case_splits_on_capitals() {
        assert_eq!(snake_case("Artist"), "artist");
        assert_eq!(snake_case("RecordLabel"), "record_label");
    }
}
