//! Payload values held by instances.
//!
//! A payload is a tagged tree: nested schema instances are referenced by id
//! and everything else is plain data. Export to JSON lives in [`crate::walk`]
//! because unwrapping an instance needs the owning tree.

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde_json::json;

use crate::instance::InstanceId;

/// A terminal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    /// Raw input a coercion could not interpret. Exports as `null`.
    Unparseable(String),
}

impl Scalar {
    pub fn text(s: impl Into<String>) -> Self {
        Scalar::Text(s.into())
    }

    /// True for values that export as JSON `null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null | Scalar::Unparseable(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Scalar::Null | Scalar::Unparseable(_) => serde_json::Value::Null,
            Scalar::Bool(b) => json!(b),
            Scalar::Number(n) => number_to_json(*n),
            Scalar::Text(s) => json!(s),
            Scalar::Timestamp(ts) => json!(ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }
}

// Integral quantities export as JSON integers (`177`, not `177.0`).
fn number_to_json(n: f64) -> serde_json::Value {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    if n.fract() == 0.0 && n.abs() <= MAX_EXACT {
        json!(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

/// A node of an instance payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Instance(InstanceId),
    Sequence(Vec<Value>),
    Mapping(Fields),
    Scalar(Scalar),
}

impl Value {
    pub fn null() -> Self {
        Value::Scalar(Scalar::Null)
    }

    pub fn text(s: impl Into<String>) -> Self {
        Value::Scalar(Scalar::Text(s.into()))
    }

    pub fn as_instance(&self) -> Option<InstanceId> {
        match self {
            Value::Instance(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Scalar(s) => s.as_text(),
            _ => None,
        }
    }

    pub fn as_fields(&self) -> Option<&Fields> {
        match self {
            Value::Mapping(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_fields_mut(&mut self) -> Option<&mut Fields> {
        match self {
            Value::Mapping(fields) => Some(fields),
            _ => None,
        }
    }

    /// Null, an empty sequence or an empty mapping. Instances are never
    /// empty by this test; their payload has to be inspected through the tree.
    pub fn is_empty_data(&self) -> bool {
        match self {
            Value::Scalar(s) => s.is_null(),
            Value::Sequence(items) => items.is_empty(),
            Value::Mapping(fields) => fields.is_empty(),
            Value::Instance(_) => false,
        }
    }

    /// Instances directly reachable from this value without crossing another
    /// instance, in payload order.
    pub fn instance_ids(&self) -> Vec<InstanceId> {
        let mut out = Vec::new();
        self.collect_instances(&mut out);
        out
    }

    fn collect_instances(&self, out: &mut Vec<InstanceId>) {
        match self {
            Value::Instance(id) => out.push(*id),
            Value::Sequence(items) => items.iter().for_each(|v| v.collect_instances(out)),
            Value::Mapping(fields) => fields.values().for_each(|v| v.collect_instances(out)),
            Value::Scalar(_) => {}
        }
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Scalar(s)
    }
}

/// String-keyed fields kept in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Fields {
    entries: IndexMap<String, Value>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries.get_mut(key)
    }

    /// Inserts or replaces a field. A replaced field keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.entries.insert(key.into(), value)
    }

    /// Removes a field, keeping the remaining fields in order.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.shift_remove(key)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str, &Value) -> bool) {
        self.entries.retain(|k, v| keep(k, v));
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.entries.values_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Equality is order-sensitive, matching the exported JSON.
impl PartialEq for Fields {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len() && self.entries.iter().eq(other.entries.iter())
    }
}

impl IntoIterator for Fields {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<(String, Value)> for Fields {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_insert_keeps_position_on_replace() {
        let mut fields = Fields::new();
        fields.insert("a", Value::text("1"));
        fields.insert("b", Value::text("2"));
        let old = fields.insert("a", Value::text("3"));

        assert_eq!(old, Some(Value::text("1")));
        assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(fields.get("a"), Some(&Value::text("3")));
    }

    #[test]
    fn test_remove() {
        let mut fields: Fields = vec![
            ("a".to_string(), Value::null()),
            ("b".to_string(), Value::text("x")),
        ]
        .into_iter()
        .collect();
        assert_eq!(fields.remove("a"), Some(Value::null()));
        assert_eq!(fields.remove("a"), None);
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn test_remove_keeps_remaining_order() {
        let mut fields = Fields::new();
        for key in ["a", "b", "c", "d"] {
            fields.insert(key, Value::null());
        }
        fields.remove("b");
        assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["a", "c", "d"]);
    }

    #[test]
    fn test_equality_is_order_sensitive() {
        let mut ab = Fields::new();
        ab.insert("a", Value::null());
        ab.insert("b", Value::null());
        let mut ba = Fields::new();
        ba.insert("b", Value::null());
        ba.insert("a", Value::null());
        assert_ne!(ab, ba);
    }

    #[test]
    fn test_integral_numbers_export_as_integers() {
        assert_eq!(Scalar::Number(177.0).to_json(), json!(177));
        assert_eq!(Scalar::Number(36.6).to_json(), json!(36.6));
        assert_eq!(Scalar::Number(f64::NAN).to_json(), serde_json::Value::Null);
    }

    #[test]
    fn test_timestamp_export_format() {
        let ts = Utc.with_ymd_and_hms(1999, 11, 1, 0, 0, 0).unwrap();
        assert_eq!(
            Scalar::Timestamp(ts).to_json(),
            json!("1999-11-01T00:00:00.000Z")
        );
    }

    #[test]
    fn test_unparseable_exports_as_null() {
        let value = Scalar::Unparseable("abc".to_string());
        assert!(value.is_null());
        assert_eq!(value.to_json(), serde_json::Value::Null);
    }

    #[test]
    fn test_instance_ids_do_not_cross_instances() {
        let mut inner = Fields::new();
        inner.insert("x", Value::Instance(InstanceId::new(2)));
        let value = Value::Sequence(vec![
            Value::Instance(InstanceId::new(1)),
            Value::Mapping(inner),
            Value::text("t"),
        ]);
        assert_eq!(
            value.instance_ids(),
            vec![InstanceId::new(1), InstanceId::new(2)]
        );
    }
}
