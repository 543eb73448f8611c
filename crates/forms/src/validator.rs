//! Validity of a form tree.

use std::sync::Arc;

use crate::errors::Errors;
use crate::node::{Form, NodeId};

const CANNOT_BE_DESTROYED: &str = "cannot be destroyed";

impl Form {
    /// Recompute the errors of every node and report whether the tree is
    /// valid.
    ///
    /// Nested nodes rejected by their relation's `reject_if` are left out, as
    /// are nodes marked for destruction (only the relation's destroy
    /// permission is checked for those).
    pub fn is_valid(&mut self) -> bool {
        let root = self.root;
        self.validate_node(root)
    }

    fn validate_node(&mut self, id: NodeId) -> bool {
        let schema = Arc::clone(&self.node(id).schema);
        let node = self.node(id);
        let mut errors = node.binding_errors.clone();

        for prop in schema.fields() {
            if errors.contains(prop.name()) {
                continue;
            }
            let value = node.value(prop.name());
            if let Some(kind) = prop.scalar_kind().filter(|kind| !kind.accepts(&value)) {
                errors.add(prop.name(), kind.mismatch_message());
                continue;
            }
            for rule in prop.rules() {
                for message in rule.check(&value) {
                    errors.add(prop.name(), message);
                }
            }
        }

        let mut children_valid = true;
        for prop in schema.relations() {
            for child in self.children(id, prop.name()).to_vec() {
                let node = self.node(child);
                if node.marked_for_destroy {
                    if !prop.allows_destroy() {
                        errors.add(prop.name(), CANNOT_BE_DESTROYED);
                    }
                    self.clear_errors(child);
                    continue;
                }
                if prop.rejects(&node.values) {
                    self.clear_errors(child);
                    continue;
                }
                children_valid &= self.validate_node(child);
            }
        }

        let valid = errors.is_empty() && children_valid;
        self.node_mut(id).errors = errors;
        valid
    }

    fn clear_errors(&mut self, id: NodeId) {
        for node in self.subtree(id) {
            self.node_mut(node).errors = Errors::new();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use formtree_core::{Record, Value};
    use formtree_infra::InMemoryRecordStore;
    use serde_json::json;

    use crate::node::Form;
    use crate::rules::Rule;
    use crate::schema::{FormSchema, PropertyOptions};

    fn comment_form() -> Arc<FormSchema> {
        FormSchema::builder("CommentForm", "Comment")
            .property("body", PropertyOptions::text().validates(Rule::presence()))
            .unwrap()
            .property("score", PropertyOptions::integer().validates(Rule::range(0.0, 10.0)))
            .unwrap()
            .build()
    }

    #[test]
    fn rules_run_in_declaration_order() {
        let mut form = Form::new(comment_form(), Record::new("Comment")).unwrap();
        assert!(!form.is_valid());
        assert_eq!(form.errors_for("body"), ["can't be blank"]);
        assert!(form.errors_for("score").is_empty());
    }

    #[test]
    fn coercion_failures_replace_rule_messages() {
        let store = InMemoryRecordStore::new();
        let mut form = Form::new(comment_form(), Record::new("Comment")).unwrap();
        form.set(&store, "body", &json!("ok")).unwrap();
        form.set(&store, "score", &json!("eleven")).unwrap();

        assert_eq!(form.get("score"), Some(&Value::text("eleven")));
        assert!(!form.is_valid());
        assert_eq!(form.errors_for("score"), ["is not a number"]);
    }

    #[test]
    fn fixing_a_field_clears_its_errors() {
        let store = InMemoryRecordStore::new();
        let mut form = Form::new(comment_form(), Record::new("Comment")).unwrap();
        assert!(!form.is_valid());
        form.set(&store, "body", &json!("fine")).unwrap();
        assert!(form.is_valid());
        assert!(form.errors().is_empty());
    }
}
