//! Output formatters.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::error::{CcdaError, Result};

/// How a finalized tree is written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Formatter {
    /// Tab-indented JSON.
    #[default]
    Stringify,
    /// Single-line JSON.
    Compact,
}

impl Formatter {
    pub fn format(&self, value: &serde_json::Value) -> Result<String> {
        match self {
            Formatter::Stringify => {
                let mut out = Vec::new();
                let mut ser = serde_json::Serializer::with_formatter(
                    &mut out,
                    PrettyFormatter::with_indent(b"\t"),
                );
                value.serialize(&mut ser)?;
                Ok(String::from_utf8_lossy(&out).into_owned())
            }
            Formatter::Compact => Ok(serde_json::to_string(value)?),
        }
    }
}

impl fmt::Display for Formatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formatter::Stringify => write!(f, "stringify"),
            Formatter::Compact => write!(f, "compact"),
        }
    }
}

impl FromStr for Formatter {
    type Err = CcdaError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "stringify" => Ok(Formatter::Stringify),
            "compact" => Ok(Formatter::Compact),
            other => Err(CcdaError::UnknownFormatter {
                name: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stringify_uses_tabs() {
        let out = Formatter::Stringify.format(&json!({"a": [1]})).unwrap();
        assert_eq!(out, "{\n\t\"a\": [\n\t\t1\n\t]\n}");
    }

    #[test]
    fn test_compact() {
        let out = Formatter::Compact.format(&json!({"a": 1, "b": "x"})).unwrap();
        assert_eq!(out, r#"{"a":1,"b":"x"}"#);
    }

    #[test]
    fn test_formatter_names() {
        assert_eq!("compact".parse::<Formatter>().unwrap(), Formatter::Compact);
        assert_eq!(Formatter::default().to_string(), "stringify");
        assert!(matches!(
            "yaml".parse::<Formatter>(),
            Err(CcdaError::UnknownFormatter { name }) if name == "yaml"
        ));
    }
}
