use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    /// A raw value could not be coerced, was missing while required, or
    /// failed a bound or validator. Fatal to the whole instance; partially
    /// valid instances never exist.
    #[error("field `{field}` on record {record_id} (mod {mod_id}): {message}")]
    Validation {
        field: String,
        record_id: i64,
        mod_id: i64,
        message: String,
    },

    /// A schema was declared inconsistently. Raised while building the
    /// schema set, before any query traffic, never deferred.
    #[error("schema configuration error: {0}")]
    Configuration(String),
}

impl ModelError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        ModelError::Configuration(message.into())
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;
