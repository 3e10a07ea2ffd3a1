//! Field specifications and the field parser.
//!
//! A [`FieldSpec`] is what schema authors write: a name, a cardinality
//! contract, a location expression relative to the owning fragment, and what
//! to do with each match. [`SchemaBuilder::build`](crate::schema::SchemaBuilder::build)
//! compiles it into a [`Field`].
//!
//! [`FieldResolver`] walks a document with a root schema and builds the
//! [`InstanceTree`]. Problems are recorded as issues on the instance being
//! resolved; resolution itself never fails.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use helios_ccda_xpath::{Item, Namespaces, Query, XValue};

use crate::coerce::Coercion;
use crate::error::{Issue, SchemaError};
use crate::instance::{InstanceId, InstanceTree, MatchedNode};
use crate::schema::Schema;
use crate::value::{Fields, Scalar, Value};

/// Minimum and maximum expected match count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// `1..1`
    ExactlyOne,
    /// `0..1`
    ZeroOrOne,
    /// `1..*`
    OneOrMore,
    /// `0..*`
    ZeroOrMore,
}

impl Cardinality {
    pub fn is_required(&self) -> bool {
        matches!(self, Cardinality::ExactlyOne | Cardinality::OneOrMore)
    }

    pub fn is_multiple(&self) -> bool {
        matches!(self, Cardinality::OneOrMore | Cardinality::ZeroOrMore)
    }
}

impl FromStr for Cardinality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1..1" => Ok(Cardinality::ExactlyOne),
            "0..1" => Ok(Cardinality::ZeroOrOne),
            "1..*" => Ok(Cardinality::OneOrMore),
            "0..*" => Ok(Cardinality::ZeroOrMore),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Cardinality::ExactlyOne => "1..1",
            Cardinality::ZeroOrOne => "0..1",
            Cardinality::OneOrMore => "1..*",
            Cardinality::ZeroOrMore => "0..*",
        };
        f.write_str(s)
    }
}

/// What a field produces from each matched node.
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// The raw string-value of the node.
    Text,
    Coerce(Coercion),
    /// Whether the given expression, evaluated from the node, selects anything.
    Exists(String),
    /// A child instance of the given schema.
    Nested(Arc<Schema>),
}

/// An uncompiled field definition.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: String,
    cardinality: String,
    path: String,
    kind: FieldKind,
}

impl FieldSpec {
    /// A field storing the raw text of each match.
    pub fn new(name: impl Into<String>, cardinality: &str, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cardinality: cardinality.to_string(),
            path: path.into(),
            kind: FieldKind::Text,
        }
    }

    pub fn nested(mut self, schema: &Arc<Schema>) -> Self {
        self.kind = FieldKind::Nested(Arc::clone(schema));
        self
    }

    pub fn coerce(mut self, coercion: Coercion) -> Self {
        self.kind = FieldKind::Coerce(coercion);
        self
    }

    pub fn exists(mut self, path: impl Into<String>) -> Self {
        self.kind = FieldKind::Exists(path.into());
        self
    }

    pub(crate) fn compile(self, schema: &str) -> Result<Field, SchemaError> {
        let cardinality = self.cardinality.parse::<Cardinality>().map_err(|cardinality| {
            SchemaError::InvalidCardinality {
                schema: schema.to_string(),
                field: self.name.clone(),
                cardinality,
            }
        })?;

        let compile = |source: &str| {
            Query::parse(source).map_err(|source| SchemaError::InvalidExpression {
                schema: schema.to_string(),
                field: self.name.clone(),
                source,
            })
        };

        let query = compile(&self.path)?;
        let value = match self.kind {
            FieldKind::Text => FieldValue::Text,
            FieldKind::Coerce(c) => FieldValue::Coerce(c),
            FieldKind::Exists(ref path) => FieldValue::Exists(compile(path)?),
            FieldKind::Nested(schema) => FieldValue::Nested(schema),
        };

        Ok(Field {
            name: self.name,
            cardinality,
            query,
            value,
        })
    }
}

/// A compiled field.
#[derive(Debug)]
pub struct Field {
    name: String,
    cardinality: Cardinality,
    query: Query,
    value: FieldValue,
}

/// Compiled counterpart of [`FieldKind`].
#[derive(Debug)]
pub enum FieldValue {
    Text,
    Coerce(Coercion),
    Exists(Query),
    Nested(Arc<Schema>),
}

impl Field {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn value(&self) -> &FieldValue {
        &self.value
    }
}

/// Builds an instance tree from a document.
pub struct FieldResolver<'a> {
    namespaces: &'a Namespaces,
    tree: InstanceTree,
}

impl<'a> FieldResolver<'a> {
    /// Instantiates `schema` at `root` and resolves every field recursively.
    pub fn build(
        schema: Arc<Schema>,
        root: Item<'_, '_>,
        patient_id: &str,
        namespaces: &'a Namespaces,
    ) -> InstanceTree {
        let tree = InstanceTree::new(schema, Some(MatchedNode::from_item(&root)), patient_id);
        let mut resolver = FieldResolver { namespaces, tree };
        resolver.resolve(InstanceId::ROOT, root);
        tracing::debug!(
            schema = %resolver.tree.get(InstanceId::ROOT).schema().name(),
            instances = resolver.tree.len(),
            "instance tree built"
        );
        resolver.tree
    }

    fn instantiate(
        &mut self,
        schema: &Arc<Schema>,
        item: Item<'_, '_>,
        parent: InstanceId,
    ) -> InstanceId {
        let id = self.tree.add(
            Arc::clone(schema),
            Some(MatchedNode::from_item(&item)),
            parent,
        );
        self.resolve(id, item);
        id
    }

    fn resolve(&mut self, id: InstanceId, item: Item<'_, '_>) {
        let schema = Arc::clone(self.tree.get(id).schema());

        // a schema without fields stands for the text of its node
        if schema.fields().is_empty() {
            self.tree
                .get_mut(id)
                .set_payload(Value::text(item.string_value()));
            return;
        }

        let mut fields = Fields::new();
        for field in schema.fields() {
            if let Some(value) = self.resolve_field(id, &schema, field, item) {
                fields.insert(field.name(), value);
            }
        }
        self.tree.get_mut(id).set_payload(Value::Mapping(fields));
    }

    fn resolve_field(
        &mut self,
        id: InstanceId,
        schema: &Schema,
        field: &Field,
        item: Item<'_, '_>,
    ) -> Option<Value> {
        let matches = match field.query().evaluate_item(item, self.namespaces) {
            Ok(XValue::Nodes(items)) => items,
            Ok(_) => {
                self.query_failed(id, schema, field, "expression does not select nodes");
                return None;
            }
            Err(err) => {
                self.query_failed(id, schema, field, &err.to_string());
                return None;
            }
        };

        if matches.is_empty() {
            if field.cardinality().is_required() {
                self.tree.get_mut(id).record(Issue::Cardinality {
                    schema: schema.name().to_string(),
                    field: field.name().to_string(),
                    cardinality: field.cardinality().to_string(),
                    path: field.query().source().to_string(),
                });
            }
            return None;
        }

        if field.cardinality().is_multiple() {
            let mut values = Vec::with_capacity(matches.len());
            for m in matches {
                values.push(self.value_of(id, schema, field, m));
            }
            Some(Value::Sequence(values))
        } else {
            Some(self.value_of(id, schema, field, matches[0]))
        }
    }

    fn value_of(
        &mut self,
        id: InstanceId,
        schema: &Schema,
        field: &Field,
        item: Item<'_, '_>,
    ) -> Value {
        match field.value() {
            FieldValue::Nested(child) => Value::Instance(self.instantiate(child, item, id)),
            FieldValue::Text => Value::text(item.string_value()),
            FieldValue::Coerce(coercion) => {
                let scalar = coercion.apply(&item.string_value());
                if let Scalar::Unparseable(raw) = &scalar {
                    self.tree.get_mut(id).record(Issue::Unparseable {
                        schema: schema.name().to_string(),
                        field: field.name().to_string(),
                        raw: raw.clone(),
                    });
                }
                Value::Scalar(scalar)
            }
            FieldValue::Exists(query) => match query.evaluate_item(item, self.namespaces) {
                Ok(result) => Value::Scalar(Scalar::Bool(result.to_bool())),
                Err(err) => {
                    self.query_failed(id, schema, field, &err.to_string());
                    Value::Scalar(Scalar::Bool(false))
                }
            },
        }
    }

    fn query_failed(&mut self, id: InstanceId, schema: &Schema, field: &Field, message: &str) {
        self.tree.get_mut(id).record(Issue::QueryFailed {
            schema: schema.name().to_string(),
            field: field.name().to_string(),
            message: message.to_string(),
        });
    }
}
