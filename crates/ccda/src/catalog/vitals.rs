//! Vital signs section.

use std::sync::Arc;

use super::shared::Shared;
use crate::error::SchemaError;
use crate::field::FieldSpec;
use crate::schema::{Schema, UriTemplate};

pub struct Vitals {
    pub observation: Arc<Schema>,
    pub organizer: Arc<Schema>,
    pub section: Arc<Schema>,
}

impl Vitals {
    pub fn build(shared: &Shared) -> Result<Self, SchemaError> {
        let observation = Schema::define("VitalSignObservation")
            .template_root(["2.16.840.1.113883.10.20.22.4.27"])
            .fields(vec![
                FieldSpec::new("sourceIds", "1..*", "h:id").nested(&shared.identifier),
                FieldSpec::new("vitalName", "1..1", "h:code").nested(&shared.concept_descriptor),
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
            .uri_builder(UriTemplate::new("entries", "vitals"))
            .build()?;

        let organizer = Schema::define("VitalSignsOrganizer")
            .template_root(["2.16.840.1.113883.10.20.22.4.26"])
            .fields(vec![
                FieldSpec::new("panelName", "0..1", "h:code").nested(&shared.concept_descriptor),
                FieldSpec::new("sourceIds", "1..*", "h:id").nested(&shared.identifier),
                FieldSpec::new("vitals", "1..*", observation.xpath()?).nested(&observation),
            ])
            .uri_builder(UriTemplate::new("organizers", "vitals"))
            .build()?;

        let section = Schema::define("VitalSignsSection")
            .template_root(["2.16.840.1.113883.10.20.22.2.4.1"])
            .fields(vec![FieldSpec::new("panels", "0..*", organizer.xpath()?).nested(&organizer)])
            .uri_builder(UriTemplate::new("sections", "vitals"))
            .build()?;

        Ok(Self {
            observation,
            organizer,
            section,
        })
    }
}
