//! Form engine error model.

use thiserror::Error;

use crate::id::RecordId;

/// Result type used across the form engine.
pub type FormResult<T> = Result<T, FormError>;

/// Engine-level error.
///
/// Two classes live here:
/// - **recoverable** failures caused by end-user input (`NotFound`,
///   `Validation`, `Persistence`, `UnpermittedParameters`), which callers report
///   back to the user;
/// - **fatal** contract violations by the calling code (`TypeMismatch`,
///   `Construction`, schema registration errors), which must not be retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormError {
    /// A property name was declared twice on the same form type.
    #[error("property `{property}` is already declared on {form}")]
    DuplicateProperty { form: String, property: String },

    /// A property type cannot be expressed (e.g. a list of scalars).
    #[error("unsupported type for property `{property}`: {reason}")]
    UnsupportedType { property: String, reason: String },

    /// A form was built from a record it cannot wrap.
    #[error("cannot build {form}: {reason}")]
    Construction { form: String, reason: String },

    /// A referenced record id does not exist in the store.
    #[error("{record_type} with id {id} not found")]
    NotFound { record_type: String, id: RecordId },

    /// A relation setter received a value of the wrong shape.
    #[error("type mismatch on `{property}`: {reason}")]
    TypeMismatch { property: String, reason: String },

    /// An identifier could not be parsed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// Accessor called with a property the form type does not declare.
    #[error("unknown property `{0}`")]
    UnknownProperty(String),

    /// Submitted keys without a matching property (raise policy only).
    #[error("unpermitted parameters: {}", .0.join(", "))]
    UnpermittedParameters(Vec<String>),

    /// The form tree is invalid.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The commit transaction failed and was rolled back.
    #[error("persistence failed: {0}")]
    Persistence(String),
}

impl FormError {
    pub fn duplicate_property(form: impl Into<String>, property: impl Into<String>) -> Self {
        Self::DuplicateProperty {
            form: form.into(),
            property: property.into(),
        }
    }

    pub fn unsupported_type(property: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedType {
            property: property.into(),
            reason: reason.into(),
        }
    }

    pub fn construction(form: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Construction {
            form: form.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(record_type: impl Into<String>, id: RecordId) -> Self {
        Self::NotFound {
            record_type: record_type.into(),
            id,
        }
    }

    pub fn type_mismatch(property: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TypeMismatch {
            property: property.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Programmer/integration errors that should escape to the caller
    /// instead of being rendered as form errors.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DuplicateProperty { .. }
                | Self::UnsupportedType { .. }
                | Self::Construction { .. }
                | Self::TypeMismatch { .. }
                | Self::UnknownProperty(_)
        )
    }
}
