//! Behavior of user-defined schemas, independent of the catalog.

use std::sync::Arc;

use helios_ccda::cleanup::{self, ensure_mutually_exclusive};
use helios_ccda::coerce::Coercion;
use helios_ccda::field::{FieldResolver, FieldSpec};
use helios_ccda::walk::export_tree;
use helios_ccda::{
    CcdaError, Component, Issue, Locator, ParseOptions, Pass, Schema, parse_with_schema,
};
use helios_ccda_xpath::{Item, Namespaces};
use roxmltree::Document;
use serde_json::json;

const WIDGET: &str = r#"<widget xmlns="urn:hl7-org:v3">
  <item>first</item>
  <item>second</item>
  <item>third</item>
  <a>alpha</a>
  <b>beta</b>
  <size value="12"/>
  <bad value="twelve"/>
</widget>"#;

// ============================================================================
// Helper Functions
// ============================================================================

fn parse(schema: &Arc<Schema>, xml: &str) -> helios_ccda::ParsedDocument {
    parse_with_schema(xml, schema, &Locator::DocumentElement, &ParseOptions::new()).unwrap()
}

fn widget(name: &str, fields: Vec<FieldSpec>) -> Arc<Schema> {
    Schema::define(name).fields(fields).build().unwrap()
}

// ============================================================================
// Cardinality
// ============================================================================

#[test]
fn test_multiple_matches_keep_document_order() {
    let schema = widget(
        "Widget",
        vec![FieldSpec::new("items", "1..*", "h:item").coerce(Coercion::Text)],
    );
    let doc = parse(&schema, WIDGET);
    assert_eq!(doc.data, json!({"items": ["first", "second", "third"]}));
}

#[test]
fn test_single_cardinality_takes_first_match() {
    let schema = widget(
        "Widget",
        vec![FieldSpec::new("item", "1..1", "h:item").coerce(Coercion::Text)],
    );
    assert_eq!(parse(&schema, WIDGET).data, json!({"item": "first"}));
}

#[test]
fn test_missing_required_field_is_reported() {
    let schema = widget(
        "Widget",
        vec![
            FieldSpec::new("color", "1..1", "h:color/@code"),
            FieldSpec::new("a", "0..1", "h:a").coerce(Coercion::Text),
        ],
    );
    let doc = parse(&schema, WIDGET);

    assert_eq!(doc.data, json!({"a": "alpha"}));
    assert_eq!(
        doc.issues,
        vec![Issue::Cardinality {
            schema: "Widget".to_string(),
            field: "color".to_string(),
            cardinality: "1..1".to_string(),
            path: "h:color/@code".to_string(),
        }]
    );
}

#[test]
fn test_unparseable_value_is_reported() {
    let schema = widget(
        "Widget",
        vec![
            FieldSpec::new("size", "0..1", "h:size/@value").coerce(Coercion::Float),
            FieldSpec::new("bad", "0..1", "h:bad/@value").coerce(Coercion::Float),
        ],
    );
    let doc = parse(&schema, WIDGET);

    assert_eq!(doc.data, json!({"size": 12}));
    assert!(doc.issues.iter().any(|i| matches!(
        i,
        Issue::Unparseable { field, raw, .. } if field == "bad" && raw == "twelve"
    )));
}

// ============================================================================
// Mutual Exclusivity
// ============================================================================

#[test]
fn test_mutually_exclusive_fields_keep_one() {
    let schema = Schema::define("Widget")
        .fields(vec![
            FieldSpec::new("a", "0..1", "h:a").coerce(Coercion::Text),
            FieldSpec::new("b", "0..1", "h:b").coerce(Coercion::Text),
        ])
        .cleanup_step(Pass::Structural, ensure_mutually_exclusive(["a", "b"]))
        .build()
        .unwrap();
    let doc = parse(&schema, WIDGET);

    assert_eq!(doc.data, json!({"a": "alpha"}));
    assert_eq!(doc.issues.len(), 1);
    assert!(matches!(
        &doc.issues[0],
        Issue::MutuallyExclusive { kept, dropped, .. } if kept == "a" && dropped == "b"
    ));
}

// ============================================================================
// Inheritance
// ============================================================================

#[test]
fn test_plain_derivation_extracts_the_same() {
    let parent = widget(
        "Widget",
        vec![
            FieldSpec::new("items", "0..*", "h:item").coerce(Coercion::Text),
            FieldSpec::new("size", "0..1", "h:size/@value").coerce(Coercion::Float),
        ],
    );
    let child = parent.derive("Gadget").build().unwrap();

    assert!(child.is_a("Widget"));
    assert_eq!(parse(&parent, WIDGET).data, parse(&child, WIDGET).data);
}

#[test]
fn test_derived_schema_adds_cleanup_steps() {
    let parent = Schema::define("Widget")
        .fields(vec![
            FieldSpec::new("a", "0..1", "h:a").coerce(Coercion::Text),
            FieldSpec::new("b", "0..1", "h:b").coerce(Coercion::Text),
        ])
        .build()
        .unwrap();
    let child = parent
        .derive("Gadget")
        .cleanup_step(Pass::Paredown, cleanup::drop_field("b"))
        .build()
        .unwrap();

    assert_eq!(parse(&parent, WIDGET).data, json!({"a": "alpha", "b": "beta"}));
    assert_eq!(parse(&child, WIDGET).data, json!({"a": "alpha"}));
}

// ============================================================================
// Cleanup Passes
// ============================================================================

#[test]
fn test_paredown_is_idempotent() {
    let schema = widget(
        "Widget",
        vec![
            FieldSpec::new("items", "0..*", "h:item").coerce(Coercion::Text),
            FieldSpec::new("missing", "0..1", "h:missing"),
            FieldSpec::new("size", "0..1", "h:size/@value").coerce(Coercion::Float),
        ],
    );
    let document = Document::parse(WIDGET).unwrap();
    let namespaces = Namespaces::ccda();
    let mut tree = FieldResolver::build(
        schema,
        Item::Node(document.root_element()),
        "0",
        &namespaces,
    );

    cleanup::run(&mut tree, &document, &[]);
    let once = export_tree(&tree);
    cleanup::run(&mut tree, &document, &[]);
    let twice = export_tree(&tree);

    assert_eq!(once, twice);
    assert!(once.get("missing").is_none());
}

#[test]
fn test_hidden_fields_are_not_exported() {
    let schema = widget(
        "Widget",
        vec![
            FieldSpec::new("a", "0..1", "h:a").coerce(Coercion::Text),
            FieldSpec::new("b", "0..1", "h:b").coerce(Coercion::Text),
        ],
    );
    let options = ParseOptions::new().hide_fields(["b"]);
    let doc = parse_with_schema(WIDGET, &schema, &Locator::DocumentElement, &options).unwrap();
    assert_eq!(doc.data, json!({"a": "alpha"}));
}

// ============================================================================
// Fatal Errors
// ============================================================================

#[test]
fn test_unknown_component_is_fatal() {
    let err = "allergies".parse::<Component>().unwrap_err();
    assert!(matches!(err, CcdaError::UnknownComponent { .. }));
}

#[test]
fn test_malformed_xml_is_fatal() {
    let schema = widget("Widget", vec![]);
    let err = parse_with_schema(
        "<widget><unclosed></widget>",
        &schema,
        &Locator::DocumentElement,
        &ParseOptions::new(),
    )
    .unwrap_err();
    assert!(matches!(err, CcdaError::Xml(_)));
}
