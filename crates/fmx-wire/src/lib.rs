#![deny(unsafe_code)]

//! Wire layer for the FileMaker XML web publishing interface.
//!
//! Turns raw `fmresultset` payloads into ordered sequences of untyped
//! [`RawRecord`]s. Coercion, validation and defaulting live in `fmx-model`;
//! HTTP transport is a collaborator's concern entirely.

pub mod error;
pub mod parser;
pub mod record;

pub use error::{Result, UNPARSABLE_RESPONSE, WireError};
pub use parser::{FieldMeta, ResultSet, parse_result_set};
pub use record::{RawRecord, local_field_name};
