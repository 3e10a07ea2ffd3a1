//! Medications section.
//!
//! A medication activity is either prescribed (`INT`) or reported as taken
//! (`EVN`). Its `effectiveTime` list mixes a plain interval with a dosing
//! frequency; cleanup splits the two into `dateRange` and `dosePeriod`.

use std::sync::Arc;

use super::shared::Shared;
use crate::cleanup;
use crate::error::SchemaError;
use crate::field::FieldSpec;
use crate::schema::{Conditions, Pass, Schema, UriTemplate};

/// Medication Clinical Drug value set.
const MEDICATION_CLINICAL_DRUG: &str = "2.16.840.1.113883.3.88.12.80.17";

pub struct Medications {
    pub information: Arc<Schema>,
    pub activity: Arc<Schema>,
    pub prescription: Arc<Schema>,
    pub reported: Arc<Schema>,
    pub section: Arc<Schema>,
}

impl Medications {
    pub fn build(shared: &Shared) -> Result<Self, SchemaError> {
        let information = Schema::define("MedicationInformation")
            .template_root(["2.16.840.1.113883.10.20.22.4.23"])
            .fields(vec![
                FieldSpec::new("productName", "0..1", "h:manufacturedMaterial/h:code").nested(
                    &shared
                        .concept_descriptor
                        .shall(Conditions::value_set(MEDICATION_CLINICAL_DRUG))?,
                ),
                FieldSpec::new(
                    "freeTextProductName",
                    "0..1",
                    "h:manufacturedMaterial/h:code/h:originalText",
                )
                .nested(&shared.text_with_reference),
            ])
            .build()?;

        let activity = Schema::define("MedicationActivity")
            .template_root(["2.16.840.1.113883.10.20.22.4.16"])
            .fields(vec![
                FieldSpec::new("sourceIds", "1..*", "h:id").nested(&shared.identifier),
                FieldSpec::new("deliveryMethod", "0..1", "h:code").nested(&shared.concept_descriptor),
                FieldSpec::new("route", "0..1", "h:routeCode").nested(&shared.simplified_code),
                FieldSpec::new("site", "0..1", "h:approachSiteCode").nested(&shared.concept_descriptor),
                FieldSpec::new("administrationUnit", "0..1", "h:administrationUnitCode")
                    .nested(&shared.concept_descriptor),
                FieldSpec::new("times", "1..*", "h:effectiveTime").nested(&shared.effective_time),
                FieldSpec::new("medicationName", "1..1", "h:consumable/h:manufacturedProduct")
                    .nested(&information),
                FieldSpec::new("freeTextSig", "0..1", "h:text").nested(&shared.text_with_reference),
                FieldSpec::new("dose", "0..1", "h:doseQuantity").nested(&shared.physical_quantity),
                FieldSpec::new("rate", "0..1", "h:rateQuantity").nested(&shared.physical_quantity),
            ])
            .cleanup_step(Pass::Structural, cleanup::extract_all_fields(["medicationName"]))
            .cleanup_step(Pass::Structural, cleanup::split_effective_times())
            .build()?;

        let prescription = activity
            .derive("Prescription")
            .with_mood(["INT"])
            .uri_builder(UriTemplate::new("entries", "medicationsPrescribed"))
            .build()?;

        let reported = activity
            .derive("MedicationReported")
            .with_mood(["EVN"])
            .uri_builder(UriTemplate::new("entries", "medicationsReported"))
            .build()?;

        let section = Schema::define("MedicationsSection")
            .template_root([
                "2.16.840.1.113883.10.20.22.2.1",
                "2.16.840.1.113883.10.20.22.2.1.1",
            ])
            .fields(vec![
                FieldSpec::new("medicationsPrescribed", "0..*", prescription.xpath()?)
                    .nested(&prescription),
                FieldSpec::new("medicationsReported", "0..*", reported.xpath()?).nested(&reported),
            ])
            .uri_builder(UriTemplate::new("sections", "medications"))
            .cleanup_step(
                Pass::Structural,
                cleanup::ensure_mutually_exclusive(["medicationsPrescribed", "medicationsReported"]),
            )
            .build()?;

        Ok(Self {
            information,
            activity,
            prescription,
            reported,
            section,
        })
    }
}
