//! Results section.

use std::sync::Arc;

use super::shared::Shared;
use crate::error::SchemaError;
use crate::field::FieldSpec;
use crate::schema::{Schema, UriTemplate};

pub struct Results {
    pub observation: Arc<Schema>,
    pub organizer: Arc<Schema>,
    pub section: Arc<Schema>,
}

impl Results {
    pub fn build(shared: &Shared) -> Result<Self, SchemaError> {
        let observation = Schema::define("ResultObservation")
            .template_root(["2.16.840.1.113883.10.20.22.4.2"])
            .fields(vec![
                FieldSpec::new("sourceIds", "1..*", "h:id").nested(&shared.identifier),
                FieldSpec::new("resultName", "1..1", "h:code").nested(&shared.concept_descriptor),
                FieldSpec::new("measuredAt", "1..1", "h:effectiveTime").nested(&shared.effective_time),
                FieldSpec::new("physicalQuantity", "1..1", "h:value[@xsi:type='PQ']")
                    .nested(&shared.physical_quantity),
                FieldSpec::new("freeTextValue", "0..1", "h:text").nested(&shared.text_with_reference),
                FieldSpec::new(
                    "interpretations",
                    "0..*",
                    "h:interpretationCode[@codeSystem='2.16.840.1.113883.5.83']",
                )
                .nested(&shared.simplified_code),
            ])
            .uri_builder(UriTemplate::new("entries", "results"))
            .build()?;

        let organizer = Schema::define("ResultsOrganizer")
            .template_root(["2.16.840.1.113883.10.20.22.4.1"])
            .fields(vec![
                FieldSpec::new("sourceIds", "1..*", "h:id").nested(&shared.identifier),
                FieldSpec::new("panelName", "0..1", "h:code").nested(&shared.concept_descriptor),
                FieldSpec::new("results", "1..*", observation.xpath()?).nested(&observation),
            ])
            .uri_builder(UriTemplate::new("organizers", "results"))
            .build()?;

        // 2.3.1 is the "entries required" flavour of the section.
        let section = Schema::define("ResultsSection")
            .template_root([
                "2.16.840.1.113883.10.20.22.2.3",
                "2.16.840.1.113883.10.20.22.2.3.1",
            ])
            .fields(vec![FieldSpec::new("panels", "0..*", organizer.xpath()?).nested(&organizer)])
            .uri_builder(UriTemplate::new("sections", "results"))
            .build()?;

        Ok(Self {
            observation,
            organizer,
            section,
        })
    }
}
