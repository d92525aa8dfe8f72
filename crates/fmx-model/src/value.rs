//! Typed values produced by field coercion.

use std::cmp::Ordering;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde_json::json;

use crate::resolve::Instance;
use crate::schema::SchemaSet;

/// A coerced field value. Relational fields resolve to `Record` / `List`
/// variants holding fully validated instances.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Integer(i64),
    Decimal(Decimal),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Record(Instance),
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Text(_) => "text",
            Value::Integer(_) => "integer",
            Value::Decimal(_) => "decimal",
            Value::Float(_) => "float",
            Value::Bool(_) => "boolean",
            Value::Date(_) => "date",
            Value::Timestamp(_) => "timestamp",
            Value::Record(_) => "record",
            Value::List(_) => "list",
        }
    }

    /// Plain-data rendering for the structural export. Decimals render as
    /// strings to avoid binary-float precision loss; dates use ISO 8601.
    pub fn to_json(&self, set: &SchemaSet) -> crate::error::Result<serde_json::Value> {
        Ok(match self {
            Value::Null => serde_json::Value::Null,
            Value::Text(s) => json!(s),
            Value::Integer(i) => json!(i),
            Value::Decimal(d) => json!(d.to_string()),
            Value::Float(f) => json!(f),
            Value::Bool(b) => json!(b),
            Value::Date(d) => json!(d.format("%Y-%m-%d").to_string()),
            Value::Timestamp(t) => json!(t.format("%Y-%m-%dT%H:%M:%S").to_string()),
            Value::Record(instance) => instance.to_tree(set)?,
            Value::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(item.to_json(set)?);
                }
                serde_json::Value::Array(out)
            }
        })
    }

    /// Ordering between two values of the same ordered kind. `None` when
    /// the kinds differ or the kind carries no ordering.
    pub fn partial_cmp_same_kind(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Decimal(a), Value::Decimal(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_kind_ordering() {
        assert_eq!(
            Value::Integer(1).partial_cmp_same_kind(&Value::Integer(2)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Text("b".into()).partial_cmp_same_kind(&Value::Text("a".into())),
            Some(Ordering::Greater)
        );
        assert_eq!(
            Value::Integer(1).partial_cmp_same_kind(&Value::Text("1".into())),
            None
        );
        assert_eq!(Value::Bool(true).partial_cmp_same_kind(&Value::Bool(false)), None);
    }
}
