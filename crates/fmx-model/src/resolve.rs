//! The record resolver: walks a schema's field registry against a raw
//! record, producing a fully validated [`Instance`] tree or failing the
//! whole construction. Partially valid instances never exist.

use fmx_wire::RawRecord;
use serde::Serialize;
use serde_json::Map;
use tracing::debug;

use crate::error::{ModelError, Result};
use crate::field::{FieldDescriptor, FieldKind, SourcePath};
use crate::schema::{Schema, SchemaSet, ToManyPolicy};
use crate::value::Value;

/// A resolved record: every declared field holds a successfully coerced
/// value, bound to the originating schema and record identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    schema: String,
    pub record_id: i64,
    pub mod_id: i64,
    values: Vec<(String, Value)>,
}

impl Instance {
    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Values in schema declaration order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Structural export: a nested plain-data tree keyed by local field
    /// names, leaves passed through each field's output transform.
    pub fn to_tree(&self, set: &SchemaSet) -> Result<serde_json::Value> {
        let schema = set.require(&self.schema)?;
        let mut tree = Map::with_capacity(self.values.len());
        for (name, value) in &self.values {
            let field = schema
                .field(name)
                .ok_or_else(|| ModelError::configuration(format!(
                    "schema `{}` no longer declares field `{name}`",
                    self.schema
                )))?;
            tree.insert(name.clone(), export_leaf(field, value, set)?);
        }
        Ok(serde_json::Value::Object(tree))
    }

    /// Consumer export: the structural tree renamed per the schema's
    /// field-name map, with the primary key emitted under the configured
    /// consumer name. Nested instances rename per their own schemas.
    pub fn to_consumer(&self, set: &SchemaSet) -> Result<ConsumerExport> {
        let schema = set.require(&self.schema)?;
        let tree = consumer_tree(self, schema, set)?;
        let pk = match schema.pk_name() {
            Some(pk_name) => match (schema.field(pk_name), self.get(pk_name)) {
                (Some(field), Some(value)) => Some(export_leaf(field, value, set)?),
                _ => None,
            },
            None => None,
        };
        Ok(ConsumerExport {
            target_type: schema.meta().target_type.clone(),
            pk_field: schema.meta().consumer_pk_name.clone(),
            pk,
            to_many_policy: schema.meta().to_many_policy,
            tree,
        })
    }
}

/// The renamed tree handed to the consuming application, plus the knobs it
/// needs to populate or overwrite its own object graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsumerExport {
    pub target_type: Option<String>,
    /// Consumer-side attribute holding the primary key.
    pub pk_field: String,
    pub pk: Option<serde_json::Value>,
    /// Clear-then-add (default) or append, for to-many relations.
    pub to_many_policy: ToManyPolicy,
    pub tree: serde_json::Value,
}

/// Resolve one raw record against a schema. Any failure anywhere in the
/// tree aborts the entire instance; the error names the failing field and
/// the identity of the record it sits on.
pub fn resolve(set: &SchemaSet, schema: &Schema, raw: &RawRecord) -> Result<Instance> {
    let mut values = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        let value = resolve_field(set, field, raw)?;
        values.push((field.name.clone(), value));
    }
    debug!(
        schema = schema.name(),
        record_id = raw.record_id,
        "record resolved"
    );
    Ok(Instance {
        schema: schema.name().to_string(),
        record_id: raw.record_id,
        mod_id: raw.mod_id,
        values,
    })
}

/// Resolve every record of a result set in source order.
pub fn resolve_all(set: &SchemaSet, schema: &Schema, raws: &[RawRecord]) -> Result<Vec<Instance>> {
    raws.iter().map(|raw| resolve(set, schema, raw)).collect()
}

fn resolve_field(set: &SchemaSet, field: &FieldDescriptor, raw: &RawRecord) -> Result<Value> {
    match &field.kind {
        FieldKind::ToOne { target } => {
            let target = set.require(target)?;
            match &field.source {
                // Same-record models read their fields off the parent's
                // flat layout rather than a nested related set.
                SourcePath::SameRecord => Ok(Value::Record(resolve(set, target, raw)?)),
                SourcePath::Name(table) => match raw.related(table).and_then(|r| r.first()) {
                    Some(sub) => Ok(Value::Record(resolve(set, target, sub)?)),
                    None => null_field(field, raw),
                },
            }
        }
        FieldKind::ToMany { target } => {
            let target = set.require(target)?;
            let SourcePath::Name(table) = &field.source else {
                // Rejected at schema build; kept as a hard error in case a
                // descriptor is constructed outside a set.
                return Err(validation(field, raw, "to-many fields require a related-set source"));
            };
            match raw.related(table) {
                Some(subs) => {
                    let mut items = Vec::with_capacity(subs.len());
                    for sub in subs {
                        items.push(Value::Record(resolve(set, target, sub)?));
                    }
                    Ok(Value::List(items))
                }
                None => null_field(field, raw),
            }
        }
        _ => {
            let SourcePath::Name(name) = &field.source else {
                return Err(validation(field, raw, "scalar fields require a named source"));
            };
            field
                .resolve_scalar(raw.field(name))
                .map_err(|message| validation(field, raw, message))
        }
    }
}

fn null_field(field: &FieldDescriptor, raw: &RawRecord) -> Result<Value> {
    field
        .resolve_null()
        .map_err(|message| validation(field, raw, message))
}

fn validation(field: &FieldDescriptor, raw: &RawRecord, message: impl Into<String>) -> ModelError {
    ModelError::Validation {
        field: field.name.clone(),
        record_id: raw.record_id,
        mod_id: raw.mod_id,
        message: message.into(),
    }
}

fn export_leaf(
    field: &FieldDescriptor,
    value: &Value,
    set: &SchemaSet,
) -> Result<serde_json::Value> {
    match &field.transform {
        Some(transform) => Ok(transform.apply(value)),
        None => value.to_json(set),
    }
}

/// Consumer tree for one instance: local names renamed per the schema's
/// field-name map, pk renamed to the consumer pk name, relational values
/// recursing with their own schemas' maps.
fn consumer_tree(
    instance: &Instance,
    schema: &Schema,
    set: &SchemaSet,
) -> Result<serde_json::Value> {
    let map = &schema.meta().field_name_map;
    let mut tree = Map::with_capacity(instance.values.len());
    for (name, value) in &instance.values {
        let field = schema
            .field(name)
            .ok_or_else(|| ModelError::configuration(format!(
                "schema `{}` no longer declares field `{name}`",
                schema.name()
            )))?;
        let consumer_name = map
            .get(name)
            .cloned()
            .or_else(|| {
                (schema.pk_name() == Some(name.as_str()))
                    .then(|| schema.meta().consumer_pk_name.clone())
            })
            .unwrap_or_else(|| name.clone());
        let rendered = match value {
            Value::Record(sub) => {
                let sub_schema = set.require(sub.schema())?;
                consumer_tree(sub, sub_schema, set)?
            }
            Value::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Record(sub) => {
                            let sub_schema = set.require(sub.schema())?;
                            out.push(consumer_tree(sub, sub_schema, set)?);
                        }
                        other => out.push(export_leaf(field, other, set)?),
                    }
                }
                serde_json::Value::Array(out)
            }
            other => export_leaf(field, other, set)?,
        };
        tree.insert(consumer_name, rendered);
    }
    Ok(serde_json::Value::Object(tree))
}
