//! Immunizations section.

use std::sync::Arc;

use super::shared::Shared;
use crate::cleanup;
use crate::coerce::Coercion;
use crate::error::SchemaError;
use crate::field::FieldSpec;
use crate::schema::{Pass, Schema, UriTemplate};

pub struct Immunizations {
    pub information: Arc<Schema>,
    pub refusal_reason: Arc<Schema>,
    /// Given immunizations (`EVN`).
    pub activity: Arc<Schema>,
    pub planned: Arc<Schema>,
    pub refused: Arc<Schema>,
    pub section: Arc<Schema>,
}

impl Immunizations {
    pub fn build(shared: &Shared) -> Result<Self, SchemaError> {
        let refusal_reason = Schema::define("ImmunizationRefusalReason")
            .template_root(["2.16.840.1.113883.10.20.22.4.53"])
            .build()?;

        let information = Schema::define("ImmunizationInformation")
            .template_root(["2.16.840.1.113883.10.20.22.4.54"])
            .fields(vec![
                FieldSpec::new("productName", "0..1", ".//h:manufacturedMaterial/h:code")
                    .nested(&shared.concept_descriptor),
                FieldSpec::new(
                    "freeTextProductName",
                    "0..1",
                    ".//h:manufacturedMaterial/h:code/h:originalText",
                )
                .nested(&shared.text_with_reference),
                FieldSpec::new("lotNumber", "0..1", "h:manufacturedMaterial/h:lotNumberText/text()"),
            ])
            .build()?;

        let activity = Schema::define("ImmunizationActivity")
            .template_root(["2.16.840.1.113883.10.20.22.4.52"])
            .with_mood(["EVN"])
            .fields(vec![
                FieldSpec::new("sourceIds", "1..*", "h:id").nested(&shared.identifier),
                FieldSpec::new("deliveryMethod", "0..1", "h:code").nested(&shared.concept_descriptor),
                FieldSpec::new("route", "0..1", "h:routeCode").nested(&shared.simplified_code),
                FieldSpec::new("site", "0..1", "h:approachSiteCode").nested(&shared.concept_descriptor),
                FieldSpec::new("administrationUnit", "0..1", "h:administrationUnitCode")
                    .nested(&shared.concept_descriptor),
                FieldSpec::new("date", "1..1", "h:effectiveTime").nested(&shared.effective_time),
                FieldSpec::new("seriesNumber", "0..1", "h:repeatNumber/@value")
                    .coerce(Coercion::Float),
                FieldSpec::new("immunizationName", "1..1", "h:consumable/h:manufacturedProduct")
                    .nested(&information),
                FieldSpec::new("freeText", "0..1", "h:text").nested(&shared.text_with_reference),
                FieldSpec::new("skippedFor", "0..1", refusal_reason.xpath_then("h:code")?)
                    .nested(&shared.simplified_code),
            ])
            .uri_builder(UriTemplate::new("entries", "immunizationsGiven"))
            .cleanup_step(Pass::Structural, cleanup::extract_all_fields(["immunizationName"]))
            .build()?;

        let planned = activity
            .derive("PlannedImmunization")
            .with_mood(["INT"])
            .uri_builder(UriTemplate::new("entries", "immunizationsPlanned"))
            .build()?;

        let refused = activity
            .derive("RefusedImmunization")
            .with_negation_status(true)
            .uri_builder(UriTemplate::new("entries", "immunizationsSkipped"))
            .build()?;

        let section = Schema::define("ImmunizationsSection")
            .template_root([
                "2.16.840.1.113883.10.20.22.2.2",
                "2.16.840.1.113883.10.20.22.2.2.1",
            ])
            .fields(vec![
                FieldSpec::new("immunizationsGiven", "0..*", activity.xpath()?).nested(&activity),
                FieldSpec::new("immunizationsPlanned", "0..*", planned.xpath()?).nested(&planned),
                FieldSpec::new("immunizationsSkipped", "0..*", refused.xpath()?).nested(&refused),
            ])
            .uri_builder(UriTemplate::new("sections", "immunizations"))
            .cleanup_step(
                Pass::Structural,
                cleanup::ensure_mutually_exclusive([
                    "immunizationsSkipped",
                    "immunizationsGiven",
                    "immunizationsPlanned",
                ]),
            )
            .build()?;

        Ok(Self {
            information,
            refusal_reason,
            activity,
            planned,
            refused,
            section,
        })
    }
}
