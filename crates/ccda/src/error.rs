//! Error types for the C-CDA engine.
//!
//! Errors fall into two groups. Fatal errors ([`CcdaError`], [`SchemaError`])
//! stop processing before any output is produced: malformed XML, an unknown
//! component name, or a schema definition that does not compile. Document
//! problems found while building or cleaning the instance tree are
//! [`Issue`]s: they are accumulated, attached to the instance that found them,
//! and returned next to the best-effort result.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use std::fmt;

use helios_ccda_xpath::QueryError;
use serde::Serialize;
use thiserror::Error;

/// Fatal errors returned by the caller-facing entry points.
#[derive(Error, Debug)]
pub enum CcdaError {
    /// The input is not well-formed XML.
    #[error("invalid XML document: {0}")]
    Xml(#[from] roxmltree::Error),

    /// The caller asked for a component the catalog does not define.
    #[error("unrecognized component: {name}")]
    UnknownComponent { name: String },

    #[error("unrecognized formatter: {name}")]
    UnknownFormatter { name: String },

    /// A schema in the catalog failed to compile.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Authoring errors raised while building a schema.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("schema '{schema}': field '{field}' has invalid cardinality '{cardinality}'")]
    InvalidCardinality {
        schema: String,
        field: String,
        cardinality: String,
    },

    #[error("schema '{schema}': field '{field}' has an invalid expression: {source}")]
    InvalidExpression {
        schema: String,
        field: String,
        #[source]
        source: QueryError,
    },

    #[error("schema '{schema}': match predicate does not compile: {source}")]
    InvalidPredicate {
        schema: String,
        #[source]
        source: QueryError,
    },

    /// `shall` conditions could not be rendered into the schema name.
    #[error("schema '{schema}': conditions do not serialize: {message}")]
    Conditions { schema: String, message: String },

    /// The schema declares no template roots, so it has no match predicate.
    #[error("schema '{schema}' has no template root")]
    NoTemplateRoot { schema: String },
}

/// A non-fatal problem found in a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Issue {
    /// A required field matched no nodes and was omitted.
    Cardinality {
        schema: String,
        field: String,
        cardinality: String,
        path: String,
    },

    /// More than one member of a mutually exclusive field group was
    /// populated. `dropped` lost the value that `kept` retained.
    MutuallyExclusive {
        schema: String,
        fields: Vec<String>,
        kept: String,
        dropped: String,
    },

    /// A field expression failed at evaluation time.
    QueryFailed {
        schema: String,
        field: String,
        message: String,
    },

    /// A coercion could not interpret the raw value.
    Unparseable {
        schema: String,
        field: String,
        raw: String,
    },
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issue::Cardinality {
                schema,
                field,
                cardinality,
                path,
            } => write!(
                f,
                "{}.{}: expected {} match(es) for '{}', found none",
                schema, field, cardinality, path
            ),
            Issue::MutuallyExclusive {
                schema,
                fields,
                kept,
                dropped,
            } => write!(
                f,
                "{}: fields [{}] are mutually exclusive; kept '{}', dropped '{}'",
                schema,
                fields.join(", "),
                kept,
                dropped
            ),
            Issue::QueryFailed {
                schema,
                field,
                message,
            } => write!(f, "{}.{}: query failed: {}", schema, field, message),
            Issue::Unparseable { schema, field, raw } => {
                write!(f, "{}.{}: cannot interpret '{}'", schema, field, raw)
            }
        }
    }
}

/// Result alias for fatal engine errors.
pub type Result<T> = std::result::Result<T, CcdaError>;
