//! The transport seam. This layer builds query parameters and parses the
//! returned bytes; moving them over HTTP (URL construction, auth,
//! timeouts, retries) belongs entirely to the collaborator behind this
//! trait.

use std::fmt;

use fmx_model::Connection;

/// An opaque transport failure, passed through to callers unmodified so
/// transient network errors stay distinguishable from wire or validation
/// failures. The message must not contain credentials.
#[derive(Debug)]
pub struct TransportError(String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport error: {}", self.0)
    }
}

impl std::error::Error for TransportError {}

/// Fetches raw result-set bytes for an ordered parameter list. The only
/// blocking operation in a query; everything around it is pure CPU work.
pub trait Transport {
    fn fetch(
        &self,
        connection: &Connection,
        params: &[(String, String)],
    ) -> Result<Vec<u8>, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn fetch(
        &self,
        connection: &Connection,
        params: &[(String, String)],
    ) -> Result<Vec<u8>, TransportError> {
        (**self).fetch(connection, params)
    }
}
