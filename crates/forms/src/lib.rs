//! `formtree-forms` — binds submitted parameter trees to nested forms,
//! validates them and persists them through a [`formtree_infra::RecordStore`].
//!
//! ```text
//! Form::new(schema, record) -> bind(store, params) -> is_valid() -> save(store)
//! ```
//!
//! - [`schema`]: declarative form types (properties, relations, rules)
//! - [`node`]: the form tree and its field accessors
//! - [`binder`]: recursive parameter assignment
//! - [`validator`]: bottom-up validity with reject-if-blank exclusion
//! - [`persister`]: materialize + transactional commit

pub mod binder;
pub mod config;
pub mod errors;
pub mod node;
pub mod persister;
pub mod rules;
pub mod schema;
pub mod validator;


pub use config::{EngineConfig, ListPositions, UnpermittedPolicy};
pub use errors::Errors;
pub use node::{Children, Form, FormNode, NodeId, ParentLink, Visit};
pub use rules::{Numericality, Rule};
pub use schema::{
    BindingKey, ForeignKey, FormSchema, FormSchemaBuilder, PropertyDescriptor, PropertyOptions,
    PropertyType, RelationKind, RelationTarget, ValueKind,
};
