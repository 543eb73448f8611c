//! Replaying submissions against one form, the way a create-then-edit flow
//! would.

use std::sync::Arc;

use anyhow::{Context, bail};
use serde_json::{Value as JsonValue, json};
use tracing::{info, warn};

use formtree_core::{ParamMap, Record, RecordId};
use formtree_forms::{EngineConfig, Form, FormSchema};
use formtree_infra::InMemoryRecordStore;

/// Result of one bind + save round.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub valid: bool,
    pub saved: bool,
    pub id: Option<RecordId>,
    pub errors: Vec<String>,
}

impl Outcome {
    pub fn to_json(&self) -> JsonValue {
        json!({
            "valid": self.valid,
            "saved": self.saved,
            "id": self.id.map(RecordId::get),
            "errors": self.errors,
        })
    }
}

/// Submissions in a document: one object, or an array of objects applied in
/// order.
pub fn submissions(document: JsonValue) -> anyhow::Result<Vec<ParamMap>> {
    match document {
        JsonValue::Object(map) => Ok(vec![map]),
        JsonValue::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| match item {
                JsonValue::Object(map) => Ok(map),
                other => bail!("submission {idx} is not an object: {other}"),
            })
            .collect(),
        other => bail!("expected an object or an array of objects, got {other}"),
    }
}

/// Bind and save every submission on one form built around a new record.
pub fn replay(
    store: &InMemoryRecordStore,
    schema: Arc<FormSchema>,
    config: EngineConfig,
    submissions: &[ParamMap],
) -> anyhow::Result<Vec<Outcome>> {
    let model = schema.model().to_string();
    let mut form = Form::with_config(schema, Record::new(model.as_str()), config)
        .with_context(|| format!("building a {model} form"))?;

    let mut outcomes = Vec::with_capacity(submissions.len());
    for (idx, params) in submissions.iter().enumerate() {
        let valid = form
            .bind(store, params)
            .with_context(|| format!("binding submission {idx}"))?;
        let saved = valid && form.save(store).with_context(|| format!("saving submission {idx}"))?;

        if saved {
            info!(submission = idx, model = %model, id = ?form.id(), "submission committed");
        } else {
            warn!(submission = idx, model = %model, errors = ?form.error_messages(), "submission not saved");
        }
        outcomes.push(Outcome {
            valid,
            saved,
            id: form.id(),
            errors: form.error_messages(),
        });
    }
    Ok(outcomes)
}
