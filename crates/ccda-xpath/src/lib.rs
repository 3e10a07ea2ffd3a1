//! # helios-ccda-xpath
//!
//! A small, namespace-aware XPath 1.0 subset used to locate template
//! fragments inside C-CDA documents parsed with [`roxmltree`].
//!
//! The supported language covers what C-CDA template queries need:
//!
//! | Feature | Examples |
//! |---------|----------|
//! | Abbreviated steps | `.`, `..`, `@root`, `//` |
//! | Axes | `child`, `descendant`, `descendant-or-self`, `parent`, `self`, `attribute` |
//! | Node tests | `h:code`, `*`, `h:*`, `text()`, `node()` |
//! | Predicates | `[@moodCode='EVN' or @moodCode='INT']`, `[2]` |
//! | Operators | union, `or`, `and`, `=`, `!=`, `<`, `<=`, `>`, `>=` |
//! | Functions | `not`, `true`, `false`, `count`, `string`, `contains`, `starts-with`, `normalize-space`, `position`, `last`, `local-name` |
//!
//! ```
//! use helios_ccda_xpath::{Namespaces, Query};
//!
//! let xml = r#"<ClinicalDocument xmlns="urn:hl7-org:v3">
//!   <component><observation><templateId root="2.16.840.1.113883.10.20.22.4.27"/></observation></component>
//! </ClinicalDocument>"#;
//! let doc = roxmltree::Document::parse(xml).unwrap();
//!
//! let query = Query::parse(".//h:templateId[@root='2.16.840.1.113883.10.20.22.4.27']/..").unwrap();
//! let found = query.select(doc.root(), &Namespaces::ccda()).unwrap();
//! assert_eq!(found.len(), 1);
//! assert_eq!(found[0].local_name(), "observation");
//! ```

pub mod ast;
pub mod error;
pub mod eval;
pub mod namespaces;
pub mod parser;

use std::fmt;
use std::str::FromStr;

use roxmltree::Node;

pub use error::{QueryError, Result};
pub use eval::{Evaluator, Item, XValue};
pub use namespaces::{HL7_V3, Namespaces, SDTC, XSI};

/// A compiled expression together with its source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    source: String,
    expr: ast::Expr,
}

impl Query {
    pub fn parse(source: &str) -> Result<Self> {
        let expr = parser::parse(source)?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &ast::Expr {
        &self.expr
    }

    /// Evaluates the query with `node` as the context node.
    pub fn evaluate<'a, 'input>(
        &self,
        node: Node<'a, 'input>,
        namespaces: &Namespaces,
    ) -> Result<XValue<'a, 'input>> {
        self.evaluate_item(Item::Node(node), namespaces)
    }

    pub fn evaluate_item<'a, 'input>(
        &self,
        item: Item<'a, 'input>,
        namespaces: &Namespaces,
    ) -> Result<XValue<'a, 'input>> {
        Evaluator::new(namespaces).evaluate(&self.expr, item)
    }

    /// Evaluates the query and requires a node-set result, returned in
    /// document order.
    pub fn select<'a, 'input>(
        &self,
        node: Node<'a, 'input>,
        namespaces: &Namespaces,
    ) -> Result<Vec<Item<'a, 'input>>> {
        match self.evaluate(node, namespaces)? {
            XValue::Nodes(items) => Ok(items),
            _ => Err(QueryError::Type {
                message: format!("'{}' does not select nodes", self.source),
            }),
        }
    }

    /// The boolean value of the query, e.g. whether a path matches anything.
    pub fn exists(&self, node: Node<'_, '_>, namespaces: &Namespaces) -> Result<bool> {
        Ok(self.evaluate(node, namespaces)?.to_bool())
    }
}

impl FromStr for Query {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        Query::parse(s)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
