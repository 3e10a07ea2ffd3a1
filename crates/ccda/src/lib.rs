//! Helios C-CDA Parser
//!
//! This crate converts HL7 C-CDA clinical documents into plain JSON. The
//! shape of the output is declared, not coded: every C-CDA template is a
//! [`Schema`](schema::Schema) naming the fragments it matches and the fields it
//! extracts, and a small set of cleanup steps normalizes what was extracted.
//!
//! # Architecture
//!
//! - [`schema`] - Schema definitions, inheritance and match predicates
//! - [`field`] - Field specifications and the resolver that builds the instance tree
//! - [`instance`] - The arena of runtime instances
//! - [`value`] - Payload values
//! - [`coerce`] - Conversions from node text to typed values
//! - [`cleanup`] - The two cleanup passes and the built-in steps
//! - [`walk`] - Tree traversal and JSON export
//! - [`links`] - Identifiers and cross-references
//! - [`catalog`] - The standard C-CDA document and section schemas
//! - [`parse`] - Entry points
//!
//! # Quick Start
//!
//! ```
//! use helios_ccda::{Component, ParseOptions, parse_document};
//!
//! let xml = r#"<ClinicalDocument xmlns="urn:hl7-org:v3">
//!   <component><structuredBody><component>
//!     <section>
//!       <templateId root="2.16.840.1.113883.10.20.22.2.4.1"/>
//!     </section>
//!   </component></structuredBody></component>
//! </ClinicalDocument>"#;
//!
//! let options = ParseOptions::new()
//!     .component(Component::Vitals)
//!     .patient_id("42");
//! let parsed = parse_document(xml, &options).unwrap();
//!
//! assert!(parsed.data["_id"]
//!     .as_str()
//!     .unwrap()
//!     .starts_with("patients/42/sections/vitals/"));
//! ```
//!
//! # Issues
//!
//! Only malformed XML and catalog authoring errors are fatal. Everything else
//! found in a document, such as a missing required field or a value that
//! cannot be interpreted, is returned as an [`Issue`] next to the best-effort
//! result.

pub mod catalog;
pub mod cleanup;
pub mod coerce;
pub mod error;
pub mod field;
pub mod format;
pub mod instance;
pub mod links;
pub mod options;
pub mod parse;
pub mod schema;
pub mod value;
pub mod walk;

use helios_ccda_xpath::Namespaces;
use once_cell::sync::Lazy;

pub use catalog::Catalog;
pub use error::{CcdaError, Issue, Result, SchemaError};
pub use format::Formatter;
pub use options::{Component, ParseOptions};
pub use parse::{Locator, ParsedDocument, parse_document, parse_with_schema};
pub use schema::{Pass, Schema};

static NAMESPACES: Lazy<Namespaces> = Lazy::new(Namespaces::ccda);

/// Prefix bindings used by every schema expression: `h` for HL7 v3, `xsi`
/// and `sdtc`.
pub(crate) fn namespaces() -> &'static Namespaces {
    &NAMESPACES
}
