#![deny(unsafe_code)]

//! Schema layer for FileMaker result sets: typed field descriptors with a
//! total coercion/validation contract, immutable model schemas built in two
//! passes, and a record resolver producing validated instance trees.
//!
//! Schemas are declared once, before any query traffic, and are immutable
//! and safe for unsynchronized concurrent reads afterward.

pub mod error;
pub mod field;
pub mod resolve;
pub mod schema;
pub mod value;

pub use error::{ModelError, Result};
pub use field::{
    BoolTokens, DEFAULT_DATE_FORMAT, DEFAULT_TIMESTAMP_FORMAT, FieldDescriptor, FieldKind,
    OutputTransform, SourcePath, Validator,
};
pub use resolve::{ConsumerExport, Instance, resolve, resolve_all};
pub use schema::{
    Connection, Credentials, ManagerDefaults, Meta, ReverseLink, Schema, SchemaBuilder, SchemaSet,
    Secret, ToManyPolicy,
};
pub use value::Value;
