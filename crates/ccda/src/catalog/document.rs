//! The whole C-CDA document.

use std::sync::Arc;

use super::demographics::{Demographics, PATIENT_ROLE};
use super::immunizations::Immunizations;
use super::medications::Medications;
use super::problems::Problems;
use super::results::Results;
use super::shared::Shared;
use super::social_history::SocialHistory;
use super::vitals::Vitals;
use crate::error::SchemaError;
use crate::field::FieldSpec;
use crate::schema::{Schema, UriTemplate};

pub struct Documents {
    pub ccda: Arc<Schema>,
}

/// Sections the document schema pulls in.
pub struct Sections<'a> {
    pub demographics: &'a Demographics,
    pub vitals: &'a Vitals,
    pub results: &'a Results,
    pub medications: &'a Medications,
    pub immunizations: &'a Immunizations,
    pub social_history: &'a SocialHistory,
    pub problems: &'a Problems,
}

impl Documents {
    pub fn build(shared: &Shared, sections: Sections<'_>) -> Result<Self, SchemaError> {
        let section = |name: &str, schema: &Arc<Schema>| -> Result<FieldSpec, SchemaError> {
            Ok(FieldSpec::new(name, "0..1", schema.xpath()?).nested(schema))
        };

        let ccda = Schema::define("CCDA")
            .fields(vec![
                FieldSpec::new("sourceIds", "1..*", "h:id").nested(&shared.identifier),
                FieldSpec::new("demographics", "1..1", PATIENT_ROLE)
                    .nested(&sections.demographics.patient),
                section("vitals", &sections.vitals.section)?,
                section("results", &sections.results.section)?,
                section("medications", &sections.medications.section)?,
                section("immunizations", &sections.immunizations.section)?,
                section("socialHistory", &sections.social_history.section)?,
                section("problems", &sections.problems.section)?,
            ])
            .uri_builder(UriTemplate::new("documents", "ccda"))
            .build()?;

        Ok(Self { ccda })
    }
}
