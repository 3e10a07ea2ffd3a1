//! Caller-facing entry points.

use std::sync::Arc;

use helios_ccda_xpath::{Item, Query, XValue};
use roxmltree::Document;
use serde::Serialize;
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::cleanup;
use crate::error::{Issue, Result};
use crate::field::FieldResolver;
use crate::namespaces;
use crate::options::ParseOptions;
use crate::schema::Schema;
use crate::walk;

/// A finalized tree and the non-fatal issues found while producing it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedDocument {
    pub data: serde_json::Value,
    pub issues: Vec<Issue>,
}

/// Where the root schema is instantiated.
#[derive(Debug, Clone)]
pub enum Locator {
    /// The document element.
    DocumentElement,
    /// The first node selected by an expression evaluated from the document.
    Query(Query),
    /// The first node satisfying the root schema's own match predicate.
    Predicate,
}

/// Parses `xml` into the JSON shape of the requested component.
///
/// Fails only on malformed XML or a catalog that does not compile; document
/// problems are returned in [`ParsedDocument::issues`].
pub fn parse_document(xml: &str, options: &ParseOptions) -> Result<ParsedDocument> {
    let catalog = Catalog::standard()?;
    let (schema, locator) = catalog.root(options.component);
    parse_with_schema(xml, schema, &locator, options)
}

/// Parses `xml` with an arbitrary root schema.
pub fn parse_with_schema(
    xml: &str,
    schema: &Arc<Schema>,
    locator: &Locator,
    options: &ParseOptions,
) -> Result<ParsedDocument> {
    let document = Document::parse(xml)?;
    debug!(schema = %schema.name(), bytes = xml.len(), "document parsed");

    let query = match locator {
        Locator::DocumentElement => None,
        Locator::Query(query) => Some(query),
        Locator::Predicate => Some(schema.predicate()?),
    };

    let root = match query {
        None => Ok(Some(Item::Node(document.root_element()))),
        Some(query) => query
            .evaluate(document.root(), namespaces())
            .map(|value| match value {
                XValue::Nodes(items) => items.into_iter().next(),
                _ => None,
            }),
    };

    let root = match root {
        Ok(Some(root)) => root,
        Ok(None) => {
            let issue = Issue::Cardinality {
                schema: schema.name().to_string(),
                field: "root".to_string(),
                cardinality: "1..1".to_string(),
                path: query.map(|q| q.source().to_string()).unwrap_or_default(),
            };
            tracing::warn!(schema = %schema.name(), "{}", issue);
            return Ok(ParsedDocument {
                data: serde_json::json!({}),
                issues: vec![issue],
            });
        }
        Err(err) => {
            let issue = Issue::QueryFailed {
                schema: schema.name().to_string(),
                field: "root".to_string(),
                message: err.to_string(),
            };
            tracing::warn!(schema = %schema.name(), "{}", issue);
            return Ok(ParsedDocument {
                data: serde_json::json!({}),
                issues: vec![issue],
            });
        }
    };

    let mut tree = FieldResolver::build(Arc::clone(schema), root, &options.patient_id, namespaces());
    cleanup::run(&mut tree, &document, &options.hide_fields);

    let parsed = ParsedDocument {
        data: walk::export_tree(&tree),
        issues: tree.issues(),
    };
    info!(
        component = %options.component,
        instances = tree.len(),
        issues = parsed.issues.len(),
        "document converted"
    );
    Ok(parsed)
}
