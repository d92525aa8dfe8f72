//! Event parser for the `fmresultset` XML grammar.
//!
//! The grammar, as served by the web publishing engine:
//!
//! ```text
//! <fmresultset>
//!   <error code="0"/>
//!   <product .../>
//!   <datasource database=".." layout=".." .../>
//!   <metadata> <field-definition name=".." .../>* </metadata>
//!   <resultset count="..">
//!     <record record-id=".." mod-id="..">
//!       <field name=".."><data>..</data></field>*
//!       <relatedset table=".." count=".."> <record>..</record>* </relatedset>*
//!     </record>*
//!   </resultset>
//! </fmresultset>
//! ```
//!
//! Related sets nest recursively; this parser descends them to any depth.

use std::collections::BTreeMap;

use quick_xml::Reader;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesRef, BytesStart, Event};
use tracing::debug;

use crate::error::{Result, UNPARSABLE_RESPONSE, WireError};
use crate::record::RawRecord;

/// Server code for "no records match the request". The web publishing
/// engine reports this instead of an empty resultset element.
const NO_MATCHING_RECORDS: i64 = 401;

/// One `<field-definition>` entry from the metadata block.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMeta {
    pub name: String,
    /// Remaining attributes (result, type, not-empty-ok, ...), as strings.
    pub attrs: BTreeMap<String, String>,
}

/// A fully parsed result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub records: Vec<RawRecord>,
    /// Field names in metadata declaration order.
    pub field_names: Vec<String>,
    pub field_meta: Vec<FieldMeta>,
    pub datasource: BTreeMap<String, String>,
    pub product: BTreeMap<String, String>,
    /// The server error code carried by the payload (0 or 401 here; any
    /// other code fails the parse).
    pub error_code: i64,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parse a raw `fmresultset` payload into an ordered record sequence.
///
/// Error code 401 yields an empty [`ResultSet`]; any other nonzero code is
/// [`WireError::Server`]. Malformed XML is [`WireError::Parse`]; a payload
/// whose error element parses but whose metadata or resultset is missing is
/// [`WireError::Structure`]. Nothing partial is ever returned.
pub fn parse_result_set(bytes: &[u8]) -> Result<ResultSet> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();

    let mut out = ResultSet::default();
    let mut error_code: Option<i64> = None;
    let mut seen_metadata = false;
    let mut seen_resultset = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match local(&e).as_str() {
                "error" => error_code = Some(read_error_code(&e)?),
                "product" => out.product = attr_map(&e)?,
                "datasource" => out.datasource = attr_map(&e)?,
                "metadata" => {
                    seen_metadata = true;
                    parse_metadata(&mut reader, &mut out)?;
                }
                "resultset" => {
                    seen_resultset = true;
                    parse_records(&mut reader, &mut out)?;
                }
                _ => {}
            },
            Event::Empty(e) => match local(&e).as_str() {
                "error" => error_code = Some(read_error_code(&e)?),
                "product" => out.product = attr_map(&e)?,
                "datasource" => out.datasource = attr_map(&e)?,
                "metadata" => seen_metadata = true,
                "resultset" => seen_resultset = true,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    match error_code {
        // A payload with no readable error element is indistinguishable
        // from garbage; report it under FileMaker's own code for that.
        None => Err(WireError::Server {
            code: UNPARSABLE_RESPONSE,
        }),
        Some(NO_MATCHING_RECORDS) => {
            out.records.clear();
            out.error_code = NO_MATCHING_RECORDS;
            Ok(out)
        }
        Some(0) => {
            if !seen_metadata {
                return Err(WireError::structure("missing metadata element"));
            }
            if !seen_resultset {
                return Err(WireError::structure("missing resultset element"));
            }
            out.error_code = 0;
            debug!(
                records = out.records.len(),
                fields = out.field_names.len(),
                "parsed result set"
            );
            Ok(out)
        }
        Some(code) => Err(WireError::Server { code }),
    }
}

fn parse_metadata(reader: &mut Reader<&[u8]>, out: &mut ResultSet) -> Result<()> {
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if local(&e) == "field-definition" => {
                let mut attrs = attr_map(&e)?;
                let name = attrs
                    .remove("name")
                    .ok_or_else(|| WireError::structure("field-definition without a name"))?;
                out.field_names.push(name.clone());
                out.field_meta.push(FieldMeta { name, attrs });
            }
            Event::End(e) if local_end(e.local_name().as_ref()) == "metadata" => return Ok(()),
            Event::Eof => return Err(WireError::structure("unterminated metadata element")),
            _ => {}
        }
        buf.clear();
    }
}

fn parse_records(reader: &mut Reader<&[u8]>, out: &mut ResultSet) -> Result<()> {
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if local(&e) == "record" => {
                let record = parse_record(reader, &e)?;
                out.records.push(record);
            }
            Event::Empty(e) if local(&e) == "record" => {
                out.records.push(record_shell(&e)?);
            }
            Event::End(e) if local_end(e.local_name().as_ref()) == "resultset" => return Ok(()),
            Event::Eof => return Err(WireError::structure("unterminated resultset element")),
            _ => {}
        }
        buf.clear();
    }
}

/// Parse a `<record>` body: fields, then related sets, recursing into
/// related-set records with the same routine.
fn parse_record(reader: &mut Reader<&[u8]>, start: &BytesStart<'_>) -> Result<RawRecord> {
    let mut record = record_shell(start)?;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if local(&e) == "field" => {
                let name = require_attr(&e, "name")?;
                if let Some(value) = read_field_data(reader)? {
                    record.insert_field(&name, value);
                }
            }
            // A self-closing field carries no data element at all; the key
            // stays absent and defaulting is left to the schema layer.
            Event::Empty(e) if local(&e) == "field" => {}
            Event::Start(e) if local(&e) == "relatedset" => {
                let table = require_attr(&e, "table")?;
                record.declare_related(&table);
                parse_related_set(reader, &mut record, &table)?;
            }
            Event::Empty(e) if local(&e) == "relatedset" => {
                record.declare_related(&require_attr(&e, "table")?);
            }
            Event::End(e) if local_end(e.local_name().as_ref()) == "record" => return Ok(record),
            Event::Eof => return Err(WireError::structure("unterminated record element")),
            _ => {}
        }
        buf.clear();
    }
}

fn parse_related_set(
    reader: &mut Reader<&[u8]>,
    parent: &mut RawRecord,
    table: &str,
) -> Result<()> {
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if local(&e) == "record" => {
                let record = parse_record(reader, &e)?;
                parent.push_related(table, record);
            }
            Event::Empty(e) if local(&e) == "record" => {
                parent.push_related(table, record_shell(&e)?);
            }
            Event::End(e) if local_end(e.local_name().as_ref()) == "relatedset" => return Ok(()),
            Event::Eof => return Err(WireError::structure("unterminated relatedset element")),
            _ => {}
        }
        buf.clear();
    }
}

/// Read the `<data>` children of a `<field>`, returning the first data
/// value (repeating fields carry several; the first is authoritative) or
/// `None` when the field closes without any.
fn read_field_data(reader: &mut Reader<&[u8]>) -> Result<Option<String>> {
    let mut buf = Vec::new();
    let mut first: Option<String> = None;
    let mut in_data = false;
    let mut current = String::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if local(&e) == "data" => {
                in_data = true;
                current.clear();
            }
            Event::Empty(e) if local(&e) == "data" => {
                first.get_or_insert_with(String::new);
            }
            Event::Text(t) if in_data => {
                let text = t.xml_content().map_err(quick_xml::Error::from)?;
                current.push_str(&text);
            }
            // The reader reports entity references as separate events.
            Event::GeneralRef(r) if in_data => {
                current.push_str(&resolve_entity(&r)?);
            }
            Event::CData(t) if in_data => {
                current.push_str(&String::from_utf8_lossy(t.as_ref()));
            }
            Event::End(e) if local_end(e.local_name().as_ref()) == "data" => {
                in_data = false;
                if first.is_none() {
                    first = Some(current.trim().to_string());
                }
            }
            Event::End(e) if local_end(e.local_name().as_ref()) == "field" => return Ok(first),
            Event::Eof => return Err(WireError::structure("unterminated field element")),
            _ => {}
        }
        buf.clear();
    }
}

/// Resolve an entity reference to its text: numeric character references
/// and the five predefined XML entities. Anything else (an undeclared DTD
/// entity) fails the parse rather than dropping silently.
fn resolve_entity(r: &BytesRef<'_>) -> Result<String> {
    if let Some(ch) = r.resolve_char_ref()? {
        return Ok(ch.to_string());
    }
    let name = r.decode().map_err(quick_xml::Error::from)?;
    resolve_predefined_entity(&name)
        .map(str::to_string)
        .ok_or_else(|| WireError::structure(format!("unresolvable entity reference `&{name};`")))
}

/// Build a record carrying only its identity attributes.
fn record_shell(e: &BytesStart<'_>) -> Result<RawRecord> {
    let record_id = require_id(e, "record-id")?;
    let mod_id = require_id(e, "mod-id")?;
    Ok(RawRecord::new(record_id, mod_id))
}

fn require_id(e: &BytesStart<'_>, key: &str) -> Result<i64> {
    let raw = require_attr(e, key)?;
    raw.parse::<i64>()
        .map_err(|_| WireError::structure(format!("record carries non-numeric {key} {raw:?}")))
}

fn require_attr(e: &BytesStart<'_>, key: &str) -> Result<String> {
    find_attr(e, key)?
        .ok_or_else(|| WireError::structure(format!("{} element without {key}", local(e))))
}

fn read_error_code(e: &BytesStart<'_>) -> Result<i64> {
    let raw = require_attr(e, "code")?;
    raw.parse::<i64>().map_err(|_| WireError::Server {
        code: UNPARSABLE_RESPONSE,
    })
}

fn find_attr(e: &BytesStart<'_>, key: &str) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if local_end(attr.key.local_name().as_ref()) == key {
            let value = attr.unescape_value().map_err(quick_xml::Error::from)?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn attr_map(e: &BytesStart<'_>) -> Result<BTreeMap<String, String>> {
    let mut map = BTreeMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = local_end(attr.key.local_name().as_ref()).to_string();
        let value = attr.unescape_value().map_err(quick_xml::Error::from)?;
        map.insert(key, value.into_owned());
    }
    Ok(map)
}

fn local(e: &BytesStart<'_>) -> String {
    local_end(e.local_name().as_ref()).to_string()
}

fn local_end(name: &[u8]) -> &str {
    std::str::from_utf8(name).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_resultset_yields_zero_records() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
            <fmresultset xmlns="http://www.filemaker.com/xml/fmresultset" version="1.0">
              <error code="0"/>
              <product build="03/05/2015" name="FileMaker Web Publishing Engine" version="13"/>
              <datasource database="db" layout="lay" table="t" total-count="0"/>
              <metadata/>
              <resultset count="0" fetch-size="0"/>
            </fmresultset>"#;
        let set = parse_result_set(xml).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.error_code, 0);
    }

    #[test]
    fn code_401_is_an_empty_set_not_an_error() {
        let xml = br#"<fmresultset><error code="401"/></fmresultset>"#;
        let set = parse_result_set(xml).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.error_code, 401);
    }

    #[test]
    fn nonzero_codes_fail_the_fetch() {
        let xml = br#"<fmresultset><error code="802"/></fmresultset>"#;
        match parse_result_set(xml) {
            Err(WireError::Server { code }) => assert_eq!(code, 802),
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[test]
    fn missing_error_element_maps_to_954() {
        let xml = br#"<fmresultset><resultset count="0"/></fmresultset>"#;
        match parse_result_set(xml) {
            Err(WireError::Server { code }) => assert_eq!(code, UNPARSABLE_RESPONSE),
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[test]
    fn entity_references_resolve_inside_data() {
        let xml = br#"<fmresultset>
              <error code="0"/>
              <metadata><field-definition name="Title"/></metadata>
              <resultset count="1">
                <record record-id="1" mod-id="0">
                  <field name="Title"><data>Salt &amp; pepper &#x2013; &#8364;2</data></field>
                </record>
              </resultset>
            </fmresultset>"#;
        let set = parse_result_set(xml).unwrap();
        assert_eq!(set.records[0].field("Title"), Some("Salt & pepper \u{2013} \u{20ac}2"));
    }

    #[test]
    fn undeclared_entities_fail_the_parse() {
        let xml = br#"<fmresultset>
              <error code="0"/>
              <metadata><field-definition name="Title"/></metadata>
              <resultset count="1">
                <record record-id="1" mod-id="0">
                  <field name="Title"><data>a&nbsp;b</data></field>
                </record>
              </resultset>
            </fmresultset>"#;
        match parse_result_set(xml) {
            Err(WireError::Structure(msg)) => assert!(msg.contains("nbsp")),
            other => panic!("expected structure error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_xml_is_a_parse_error() {
        let xml = br#"<fmresultset><error code="0"><resultset"#;
        assert!(matches!(parse_result_set(xml), Err(WireError::Parse(_))));
    }

    #[test]
    fn missing_resultset_is_a_structure_error() {
        let xml = br#"<fmresultset><error code="0"/><metadata/></fmresultset>"#;
        match parse_result_set(xml) {
            Err(WireError::Structure(msg)) => assert!(msg.contains("resultset")),
            other => panic!("expected structure error, got {other:?}"),
        }
    }
}
