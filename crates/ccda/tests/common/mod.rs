//! Shared fixture loading for the integration tests.

#![allow(dead_code)]

use helios_ccda::{Component, ParseOptions, ParsedDocument, parse_document};
use serde_json::Value;

/// Reads `tests/data/{name}`.
pub fn fixture(name: &str) -> String {
    let path = format!("{}/tests/data/{}", env!("CARGO_MANIFEST_DIR"), name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {}: {}", path, e))
}

/// Parses a fixture as `component` with default options.
pub fn parse_fixture(name: &str, component: Component) -> ParsedDocument {
    parse_fixture_with(name, ParseOptions::new().component(component))
}

pub fn parse_fixture_with(name: &str, options: ParseOptions) -> ParsedDocument {
    parse_document(&fixture(name), &options).expect("fixture parses")
}

/// Every object in `value`, depth first.
pub fn objects(value: &Value) -> Vec<&serde_json::Map<String, Value>> {
    let mut out = Vec::new();
    collect(value, &mut out);
    out
}

fn collect<'a>(value: &'a Value, out: &mut Vec<&'a serde_json::Map<String, Value>>) {
    match value {
        Value::Object(map) => {
            out.push(map);
            map.values().for_each(|v| collect(v, out));
        }
        Value::Array(items) => items.iter().for_each(|v| collect(v, out)),
        _ => {}
    }
}
