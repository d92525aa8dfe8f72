use thiserror::Error;

/// FileMaker's own "unable to parse the response" error code, used when a
/// payload carries no readable error element at all.
pub const UNPARSABLE_RESPONSE: i64 = 954;

#[derive(Debug, Error)]
pub enum WireError {
    /// The payload was not well-formed XML.
    #[error("malformed XML payload: {0}")]
    Parse(#[from] quick_xml::Error),

    /// The payload was well-formed XML but did not follow the fmresultset
    /// grammar (missing resultset/metadata, bad record identity, ...).
    #[error("unexpected result-set structure: {0}")]
    Structure(String),

    /// The server reported a nonzero error code other than 401.
    #[error("FileMaker server returned error code {code}")]
    Server { code: i64 },
}

impl WireError {
    pub(crate) fn structure(message: impl Into<String>) -> Self {
        WireError::Structure(message.into())
    }
}

pub type Result<T> = std::result::Result<T, WireError>;
