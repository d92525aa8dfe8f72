//! Raw, untyped records as they come off the wire.
//!
//! A [`RawRecord`] is an ordered field-name → raw-string mapping plus the
//! record's related sets, which nest further raw records arbitrarily deep.
//! Nothing here is validated or coerced; that is the schema layer's job.

/// Reduce a possibly qualified field name (`Table::Name`) to its local
/// component after the final `::`. Unqualified names pass through unchanged.
pub fn local_field_name(name: &str) -> &str {
    name.rsplit("::").next().unwrap_or(name)
}

/// One record from a result set, before any schema is applied.
///
/// Field and related-set order is source order. Absent fields are simply
/// absent keys; defaulting belongs to field descriptors, not the parser.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    /// FileMaker record id, for optimistic-concurrency use by callers.
    pub record_id: i64,
    /// FileMaker modification id.
    pub mod_id: i64,
    fields: Vec<(String, String)>,
    related: Vec<(String, Vec<RawRecord>)>,
}

impl RawRecord {
    pub fn new(record_id: i64, mod_id: i64) -> Self {
        Self {
            record_id,
            mod_id,
            fields: Vec::new(),
            related: Vec::new(),
        }
    }

    /// Store a field value under its local (unqualified) name. Re-inserting
    /// a name overwrites the earlier value in place, keeping source order.
    pub fn insert_field(&mut self, name: &str, value: impl Into<String>) {
        let local = local_field_name(name);
        if let Some(slot) = self.fields.iter_mut().find(|(n, _)| n == local) {
            slot.1 = value.into();
        } else {
            self.fields.push((local.to_string(), value.into()));
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn push_related(&mut self, table: &str, record: RawRecord) {
        if let Some(slot) = self.related.iter_mut().find(|(t, _)| t == table) {
            slot.1.push(record);
        } else {
            self.related.push((table.to_string(), vec![record]));
        }
    }

    /// Declare a related set, possibly empty. Parsing a `<relatedset>` with
    /// no records still registers the table name.
    pub fn declare_related(&mut self, table: &str) {
        if !self.related.iter().any(|(t, _)| t == table) {
            self.related.push((table.to_string(), Vec::new()));
        }
    }

    pub fn related(&self, table: &str) -> Option<&[RawRecord]> {
        self.related
            .iter()
            .find(|(t, _)| t == table)
            .map(|(_, records)| records.as_slice())
    }

    pub fn related_sets(&self) -> impl Iterator<Item = (&str, &[RawRecord])> {
        self.related
            .iter()
            .map(|(t, records)| (t.as_str(), records.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.related.is_empty()
    }
}
