//! Record managers. `RawManager` issues find commands against one
//! connection and returns parsed wire result sets. `Manager` layers a
//! model schema on top: keyword constraints resolve through the schema's
//! declared fields (including relational traversal), results come back
//! fully validated, and uniqueness lookups fail loudly instead of picking
//! an arbitrary record.

use std::sync::Arc;

use fmx_model::{Connection, Instance, Schema, SchemaSet, SourcePath, resolve_all};
use fmx_wire::{ResultSet, parse_result_set};
use tracing::debug;

use crate::error::{QueryError, Result};
use crate::find::{Command, FindSpec, Op, Script, ScriptTiming, SortOrder};
use crate::transport::Transport;

/// Path separator in keyword constraints, `site__domain__contains`.
const LOOKUP_SEP: &str = "__";

/// Separator between a table qualifier and a field name on the wire.
const WIRE_SEP: &str = "::";

/// Schema-free manager over one connection. Constraint fields are raw wire
/// names; no validation or resolution happens on the way back.
#[derive(Debug, Clone)]
pub struct RawManager<T: Transport> {
    connection: Connection,
    transport: T,
    spec: FindSpec,
}

impl<T: Transport> RawManager<T> {
    pub fn new(connection: Connection, transport: T) -> Self {
        Self {
            connection,
            transport,
            spec: FindSpec::default(),
        }
    }

    /// Add a constraint on a wire field name.
    pub fn filter(mut self, field: impl Into<String>, op: Op, value: impl Into<String>) -> Self {
        self.spec.push(field, op, value);
        self
    }

    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.spec.push_sort(field, order);
        self
    }

    pub fn max(mut self, max: u32) -> Self {
        self.spec.max = Some(max);
        self
    }

    pub fn skip(mut self, skip: u32) -> Self {
        self.spec.skip = Some(skip);
        self
    }

    /// Run a named server-side script with the command.
    pub fn script(mut self, name: impl Into<String>, timing: ScriptTiming) -> Self {
        self.spec.script = Some(Script {
            name: name.into(),
            timing,
        });
        self
    }

    /// Target one record by its record id.
    pub fn record_id(mut self, record_id: i64) -> Self {
        self.spec.record_id = Some(record_id);
        self
    }

    /// Assert the expected modification id.
    pub fn mod_id(mut self, mod_id: i64) -> Self {
        self.spec.mod_id = Some(mod_id);
        self
    }

    /// Issue `-find` with the accumulated constraints.
    pub fn find(&self) -> Result<ResultSet> {
        self.fetch(Command::Find)
    }

    /// Issue `-findall`, ignoring any accumulated constraints.
    pub fn find_all(&self) -> Result<ResultSet> {
        self.fetch(Command::FindAll)
    }

    fn fetch(&self, command: Command) -> Result<ResultSet> {
        let params = self.spec.to_params(&self.connection, command);
        debug!(
            database = %self.connection.database,
            layout = %self.connection.layout,
            command = command.token(),
            params = params.len(),
            "issuing find command"
        );
        let bytes = self.transport.fetch(&self.connection, &params)?;
        Ok(parse_result_set(&bytes)?)
    }
}

/// Managed queries against one concrete model schema.
///
/// Builder methods consume and return the manager, so query construction
/// chains; `find` and `get` are the terminal operations.
#[derive(Debug, Clone)]
pub struct Manager<T: Transport> {
    set: Arc<SchemaSet>,
    schema: Arc<Schema>,
    transport: T,
    spec: FindSpec,
}

impl<T: Transport> Manager<T> {
    /// A manager for `schema`, which must be a concrete schema carrying
    /// connection parameters. The default record group size comes from the
    /// schema's manager configuration.
    pub fn new(set: Arc<SchemaSet>, schema: Arc<Schema>, transport: T) -> Result<Self> {
        if schema.connection().is_none() {
            return Err(QueryError::NoConnection(schema.name().to_string()));
        }
        let mut spec = FindSpec::default();
        spec.max = Some(schema.meta().manager.max);
        Ok(Self {
            set,
            schema,
            transport,
            spec,
        })
    }

    /// Constrain on a keyword path: local field names joined with `__`,
    /// traversing relational fields, with an optional trailing operator
    /// keyword (`title__contains`, `sites__domain__endswith`). Without an
    /// operator suffix the constraint is an exact match.
    pub fn filter(mut self, key: &str, value: impl Into<String>) -> Result<Self> {
        let (path, op) = split_operator(key);
        let wire = self.resolve_path(key, &path)?;
        self.spec.push(wire, op, value);
        Ok(self)
    }

    /// Sort by keyword paths, in priority order; a `-` prefix sorts that
    /// field descending. Replaces any previously configured sort.
    pub fn order_by<I>(mut self, keys: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut sorts = Vec::new();
        for key in keys {
            let (field, order) = self.resolve_ordering(key.as_ref())?;
            sorts.push((field, order));
        }
        self.spec.sorts.clear();
        for (field, order) in sorts {
            self.spec.push_sort(field, order);
        }
        Ok(self)
    }

    pub fn max(mut self, max: u32) -> Self {
        self.spec.max = Some(max);
        self
    }

    pub fn skip(mut self, skip: u32) -> Self {
        self.spec.skip = Some(skip);
        self
    }

    /// Run the query and resolve every returned record against the schema.
    /// Any record failing validation fails the whole call.
    pub fn find(&self) -> Result<Vec<Instance>> {
        let result = self.fetch()?;
        Ok(resolve_all(&self.set, &self.schema, &result.records)?)
    }

    /// Run the query expecting exactly one match. Zero matches is
    /// `NotFound`, more than one is `Ambiguous`.
    pub fn get(&self) -> Result<Instance> {
        let mut instances = self.find()?;
        match instances.len() {
            0 => Err(QueryError::NotFound {
                schema: self.schema.name().to_string(),
            }),
            1 => Ok(instances.remove(0)),
            count => Err(QueryError::Ambiguous {
                schema: self.schema.name().to_string(),
                count,
            }),
        }
    }

    /// Run the query and return the wire result set without resolving.
    pub fn raw(&self) -> Result<ResultSet> {
        self.fetch()
    }

    fn fetch(&self) -> Result<ResultSet> {
        let connection = self
            .schema
            .connection()
            .ok_or_else(|| QueryError::NoConnection(self.schema.name().to_string()))?;
        let mut spec = self.spec.clone();
        if spec.sorts.is_empty()
            && let Some(ordering) = &self.schema.meta().ordering
        {
            let (field, order) = self.resolve_ordering(ordering)?;
            spec.push_sort(field, order);
        }
        let command = if spec.constraints.is_empty() {
            Command::FindAll
        } else {
            Command::Find
        };
        let params = spec.to_params(connection, command);
        debug!(
            schema = self.schema.name(),
            command = command.token(),
            constraints = spec.constraints.len(),
            "issuing managed find"
        );
        let bytes = self.transport.fetch(connection, &params)?;
        Ok(parse_result_set(&bytes)?)
    }

    fn resolve_ordering(&self, key: &str) -> Result<(String, SortOrder)> {
        let (path, order) = match key.strip_prefix('-') {
            Some(rest) => (rest, SortOrder::Descend),
            None => (key, SortOrder::Ascend),
        };
        let segments: Vec<&str> = path.split(LOOKUP_SEP).collect();
        let field = self.resolve_path(key, &segments)?;
        Ok((field, order))
    }

    /// Walk `segments` through the schema graph and produce the qualified
    /// wire field name. Every segment but the last must name a relational
    /// field; the last must name a scalar.
    fn resolve_path(&self, key: &str, segments: &[&str]) -> Result<String> {
        let unknown = || QueryError::UnknownField(key.to_string());

        let mut schema = Arc::clone(&self.schema);
        let mut parts: Vec<String> = Vec::new();
        let (last, traversal) = segments.split_last().ok_or_else(unknown)?;

        for segment in traversal {
            let field = schema.field(segment).ok_or_else(unknown)?;
            let target = field.kind.target().ok_or_else(unknown)?;
            // A same-record relation shares the parent's flat layout, so it
            // contributes no qualifier on the wire.
            if let SourcePath::Name(source) = &field.source {
                parts.push(source.clone());
            }
            schema = Arc::clone(self.set.get(target).ok_or_else(unknown)?);
        }

        let field = schema.field(last).ok_or_else(unknown)?;
        if field.kind.is_relational() {
            return Err(unknown());
        }
        match &field.source {
            SourcePath::Name(source) => parts.push(source.clone()),
            SourcePath::SameRecord => return Err(unknown()),
        }
        Ok(parts.join(WIRE_SEP))
    }
}

/// Split a trailing operator keyword off a constraint path. A lone segment
/// is always a field name, even when it collides with a keyword.
fn split_operator(key: &str) -> (Vec<&str>, Op) {
    let mut segments: Vec<&str> = key.split(LOOKUP_SEP).collect();
    if segments.len() > 1
        && let Some(op) = segments.last().copied().and_then(Op::from_keyword)
    {
        segments.pop();
        return (segments, op);
    }
    (segments, Op::Eq)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_suffix_splits_off() {
        let (path, op) = split_operator("site__domain__contains");
        assert_eq!(path, vec!["site", "domain"]);
        assert_eq!(op, Op::Contains);
    }

    #[test]
    fn bare_path_defaults_to_exact() {
        let (path, op) = split_operator("title");
        assert_eq!(path, vec!["title"]);
        assert_eq!(op, Op::Eq);
    }

    #[test]
    fn lone_keyword_is_a_field_name() {
        let (path, op) = split_operator("contains");
        assert_eq!(path, vec!["contains"]);
        assert_eq!(op, Op::Eq);
    }
}
