//! Per-parse options.

use std::fmt;
use std::str::FromStr;

use crate::error::CcdaError;

/// The part of a document to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Component {
    /// The whole document.
    #[default]
    Ccd,
    Demographics,
    Vitals,
    Results,
    Medications,
    Immunizations,
    Problems,
    SocialHistory,
}

impl Component {
    pub const ALL: [Component; 8] = [
        Component::Ccd,
        Component::Demographics,
        Component::Vitals,
        Component::Results,
        Component::Medications,
        Component::Immunizations,
        Component::Problems,
        Component::SocialHistory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Ccd => "ccd",
            Component::Demographics => "demographics",
            Component::Vitals => "vitals",
            Component::Results => "results",
            Component::Medications => "medications",
            Component::Immunizations => "immunizations",
            Component::Problems => "problems",
            Component::SocialHistory => "socialHistory",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Component {
    type Err = CcdaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Component::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| CcdaError::UnknownComponent {
                name: s.to_string(),
            })
    }
}

/// Options threaded through one parse. Nothing here touches shared schema
/// state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    pub component: Component,
    /// Used in every identifier and `patient` link.
    pub patient_id: String,
    /// Field names removed from every payload during paredown.
    pub hide_fields: Vec<String>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            component: Component::Ccd,
            patient_id: "0".to_string(),
            hide_fields: Vec::new(),
        }
    }
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn component(mut self, component: Component) -> Self {
        self.component = component;
        self
    }

    pub fn patient_id(mut self, patient_id: impl Into<String>) -> Self {
        self.patient_id = patient_id.into();
        self
    }

    pub fn hide_fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hide_fields = names.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_names_round_trip() {
        for component in Component::ALL {
            assert_eq!(component.as_str().parse::<Component>().unwrap(), component);
        }
        assert_eq!("socialHistory".parse::<Component>().unwrap(), Component::SocialHistory);
    }

    #[test]
    fn test_unknown_component() {
        let err = "allergies".parse::<Component>().unwrap_err();
        assert!(matches!(err, CcdaError::UnknownComponent { name } if name == "allergies"));
    }

    #[test]
    fn test_default_options() {
        let options = ParseOptions::default();
        assert_eq!(options.component, Component::Ccd);
        assert_eq!(options.patient_id, "0");
        assert!(options.hide_fields.is_empty());
    }

    #[test]
    fn test_builder() {
        let options = ParseOptions::new()
            .component(Component::Vitals)
            .patient_id("123")
            .hide_fields(["_links"]);
        assert_eq!(options.component, Component::Vitals);
        assert_eq!(options.patient_id, "123");
        assert_eq!(options.hide_fields, vec!["_links".to_string()]);
    }
}
