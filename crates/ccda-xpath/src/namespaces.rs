//! Prefix bindings used to resolve qualified name tests.

use std::collections::HashMap;

use crate::error::{QueryError, Result};

/// The HL7 v3 namespace every C-CDA element lives in.
pub const HL7_V3: &str = "urn:hl7-org:v3";
/// XML Schema instance namespace (`xsi:type`).
pub const XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
/// The SDTC extension namespace.
pub const SDTC: &str = "urn:hl7-org:sdtc";

/// A table of prefix to namespace URI bindings.
///
/// Unprefixed name tests always match the null namespace, as in XPath 1.0;
/// the table is only consulted for prefixed tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespaces {
    bindings: HashMap<String, String>,
}

impl Namespaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// The bindings C-CDA templates are written against: `h`, `xsi` and `sdtc`.
    pub fn ccda() -> Self {
        Self::new()
            .with("h", HL7_V3)
            .with("xsi", XSI)
            .with("sdtc", SDTC)
    }

    /// Adds a binding, returning the updated table.
    pub fn with(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.bind(prefix, uri);
        self
    }

    pub fn bind(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.bindings.insert(prefix.into(), uri.into());
    }

    /// Looks up the URI bound to `prefix`.
    pub fn resolve(&self, prefix: &str) -> Result<&str> {
        self.bindings
            .get(prefix)
            .map(String::as_str)
            .ok_or_else(|| QueryError::UnknownPrefix {
                prefix: prefix.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ccda_bindings() {
        let ns = Namespaces::ccda();
        assert_eq!(ns.resolve("h").unwrap(), HL7_V3);
        assert_eq!(ns.resolve("xsi").unwrap(), XSI);
        assert_eq!(ns.resolve("sdtc").unwrap(), SDTC);
    }

    #[test]
    fn test_unknown_prefix() {
        let err = Namespaces::new().resolve("h").unwrap_err();
        assert_eq!(
            err,
            QueryError::UnknownPrefix {
                prefix: "h".to_string()
            }
        );
    }
}
