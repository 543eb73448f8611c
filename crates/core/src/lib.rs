//! `formtree-core` — primitives shared by the form engine and its stores.
//!
//! This crate contains **no IO**: values, records, identifiers, submitted
//! parameter helpers and the engine error model.

pub mod error;
pub mod id;
pub mod params;
pub mod record;
pub mod value;

pub use error::{FormError, FormResult};
pub use id::{RecordId, TransactionId};
pub use params::{ParamMap, attributes_key};
pub use record::{Record, RecordRef, RecordState};
pub use value::{FieldValues, ScalarKind, Value};
