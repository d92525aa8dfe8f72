//! Find-query construction and record managers for FileMaker web
//! publishing layouts.
//!
//! [`FindSpec`] turns ordered constraints into the server's request
//! parameters. [`RawManager`] runs them over a [`Transport`] and returns
//! parsed wire result sets; [`Manager`] additionally resolves keyword
//! field paths through a model schema and returns validated instances.

#![deny(unsafe_code)]

pub mod error;
pub mod find;
pub mod manager;
pub mod transport;

pub use error::{QueryError, Result};
pub use find::{
    Command, Constraint, FindSpec, LogicalOp, Op, Script, ScriptTiming, SortField, SortOrder,
};
pub use manager::{Manager, RawManager};
pub use transport::{Transport, TransportError};
