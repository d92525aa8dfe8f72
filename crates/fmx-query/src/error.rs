use thiserror::Error;

use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum QueryError {
    /// A keyword constraint named a field no schema on its path declares.
    #[error("cannot resolve field path `{0}`")]
    UnknownField(String),

    /// A uniqueness lookup matched no records.
    #[error("no `{schema}` record matches the query")]
    NotFound { schema: String },

    /// A uniqueness lookup matched more than one record; never silently
    /// resolved by picking the first.
    #[error("{count} `{schema}` records match a query expected to match one")]
    Ambiguous { schema: String, count: usize },

    /// The schema the manager was built for has no connection (managed
    /// queries require a concrete schema).
    #[error("schema `{0}` has no connection parameters")]
    NoConnection(String),

    /// Passed through from the transport collaborator unmodified.
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Wire(#[from] fmx_wire::WireError),

    #[error(transparent)]
    Model(#[from] fmx_model::ModelError),
}

pub type Result<T> = std::result::Result<T, QueryError>;
