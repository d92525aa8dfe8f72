#![allow(missing_docs)]

use fmx_wire::{RawRecord, WireError, local_field_name, parse_result_set};
use proptest::prelude::{proptest, prop_assert, prop_assert_eq};

fn article_payload() -> &'static [u8] {
    br#"<?xml version="1.0" encoding="UTF-8"?>
    <fmresultset xmlns="http://www.filemaker.com/xml/fmresultset" version="1.0">
      <error code="0"/>
      <product build="03/05/2015" name="FileMaker Web Publishing Engine" version="13.0.5.518"/>
      <datasource database="cms" date-format="MM/dd/yyyy" layout="articles"
                  table="Articles" time-format="HH:mm:ss" total-count="2"/>
      <metadata>
        <field-definition name="zpk" result="number" type="normal" not-empty="yes"/>
        <field-definition name="Title" result="text" type="normal" not-empty="no"/>
        <field-definition name="Authors::Name" result="text" type="normal" not-empty="no"/>
      </metadata>
      <resultset count="2" fetch-size="2">
        <record record-id="101" mod-id="3">
          <field name="zpk"><data>1</data></field>
          <field name="Title"><data>Hello</data></field>
          <field name="Authors::Name"><data>Ann</data></field>
          <relatedset count="2" table="SITES">
            <record record-id="201" mod-id="0">
              <field name="SITES::Domain"><data>a.com</data></field>
              <field name="SITES::Name"><data>A</data></field>
              <relatedset count="1" table="PAGES">
                <record record-id="301" mod-id="0">
                  <field name="PAGES::Path"><data>/index</data></field>
                </record>
              </relatedset>
            </record>
            <record record-id="202" mod-id="1">
              <field name="SITES::Domain"><data>b.com</data></field>
              <field name="SITES::Name"><data>B</data></field>
            </record>
          </relatedset>
        </record>
        <record record-id="102" mod-id="0">
          <field name="zpk"><data>2</data></field>
          <field name="Title"><data>Second &amp; last</data></field>
          <field name="Authors::Name"/>
          <relatedset count="0" table="SITES"/>
        </record>
      </resultset>
    </fmresultset>"#
}

#[test]
fn parses_records_with_nested_related_sets() {
    let set = parse_result_set(article_payload()).unwrap();

    assert_eq!(set.error_code, 0);
    assert_eq!(set.len(), 2);
    assert_eq!(set.field_names, vec!["zpk", "Title", "Authors::Name"]);
    assert_eq!(set.datasource.get("database").map(String::as_str), Some("cms"));
    assert_eq!(set.datasource.get("layout").map(String::as_str), Some("articles"));

    let first = &set.records[0];
    assert_eq!(first.record_id, 101);
    assert_eq!(first.mod_id, 3);
    assert_eq!(first.field("zpk"), Some("1"));
    assert_eq!(first.field("Title"), Some("Hello"));
    // Qualified names land under their trailing component.
    assert_eq!(first.field("Name"), Some("Ann"));

    let sites = first.related("SITES").unwrap();
    assert_eq!(sites.len(), 2);
    assert_eq!(sites[0].field("Domain"), Some("a.com"));
    assert_eq!(sites[0].field("Name"), Some("A"));
    assert_eq!(sites[1].field("Domain"), Some("b.com"));

    // Related sets recurse arbitrarily deep.
    let pages = sites[0].related("PAGES").unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].field("Path"), Some("/index"));
}

#[test]
fn absent_data_means_absent_key() {
    let set = parse_result_set(article_payload()).unwrap();
    let second = &set.records[1];

    assert_eq!(second.field("Title"), Some("Second & last"));
    // <field name="Authors::Name"/> carried no data element.
    assert_eq!(second.field("Name"), None);
    // An empty relatedset still registers the table, with zero records.
    assert_eq!(second.related("SITES"), Some(&[] as &[RawRecord]));
}

#[test]
fn parse_is_deterministic() {
    let a = parse_result_set(article_payload()).unwrap();
    let b = parse_result_set(article_payload()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn truncated_payload_never_yields_partial_records() {
    let full = article_payload();
    // Cut the payload mid-resultset; the parse must fail outright.
    let cut = &full[..full.len() / 2];
    assert!(matches!(
        parse_result_set(cut),
        Err(WireError::Parse(_) | WireError::Structure(_))
    ));
}

proptest! {
    #[test]
    fn local_name_is_suffix_after_final_separator(prefix in "[A-Za-z0-9_]{0,8}", name in "[A-Za-z0-9_]{1,8}") {
        let qualified = format!("{prefix}::{name}");
        prop_assert_eq!(local_field_name(&qualified), name.as_str());
        // Unqualified names pass through untouched.
        prop_assert_eq!(local_field_name(&name), name.as_str());
        prop_assert!(!local_field_name(&qualified).contains("::"));
    }
}
