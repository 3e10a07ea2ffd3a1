//! Problems section.
//!
//! Problems are grouped under concern acts ([`Problems::organizer`]). A
//! negated observation records that a problem was ruled out.

use std::sync::Arc;

use super::shared::Shared;
use crate::error::SchemaError;
use crate::field::FieldSpec;
use crate::schema::{Schema, UriTemplate};

/// Problem Act statusCode value set.
const CONCERN_STATUS: &str = "2.16.840.1.113883.11.20.9.19";

pub struct Problems {
    pub age_observation: Arc<Schema>,
    pub problem_status: Arc<Schema>,
    pub health_status: Arc<Schema>,
    pub observation: Arc<Schema>,
    pub non_problem: Arc<Schema>,
    pub organizer: Arc<Schema>,
    pub section: Arc<Schema>,
}

impl Problems {
    pub fn build(shared: &Shared) -> Result<Self, SchemaError> {
        let age_observation = Schema::define("AgeObservation")
            .template_root(["2.16.840.1.113883.10.20.22.4.31"])
            .build()?;
        let problem_status = Schema::define("ProblemStatus")
            .template_root(["2.16.840.1.113883.10.20.22.4.6"])
            .build()?;
        let health_status = Schema::define("HealthStatus")
            .template_root(["2.16.840.1.113883.10.20.22.4.5"])
            .build()?;

        let observation = Schema::define("ProblemObservation")
            .template_root(["2.16.840.1.113883.10.20.22.4.4"])
            .fields(vec![
                FieldSpec::new("sourceIds", "1..*", "h:id").nested(&shared.identifier),
                FieldSpec::new("problemType", "1..1", "h:code").nested(&shared.concept_descriptor),
                FieldSpec::new("problemName", "1..1", "h:value").nested(&shared.concept_descriptor),
                FieldSpec::new("freeTextProblemName", "0..1", "h:text")
                    .nested(&shared.text_with_reference),
                FieldSpec::new("dateRange", "1..1", "h:effectiveTime").nested(&shared.effective_time),
                FieldSpec::new("resolved", "1..1", "h:effectiveTime").exists("h:high"),
                FieldSpec::new("ageAtOnset", "0..1", age_observation.xpath_then("h:value")?)
                    .nested(&shared.physical_quantity),
                FieldSpec::new("problemStatus", "0..1", problem_status.xpath_then("h:value")?)
                    .nested(&shared.concept_descriptor),
                FieldSpec::new("healthStatus", "0..1", health_status.xpath_then("h:value")?)
                    .nested(&shared.concept_descriptor),
            ])
            .uri_builder(UriTemplate::new("entries", "problems"))
            .build()?;

        let non_problem = observation
            .derive("NonProblemObservation")
            .with_negation_status(true)
            .uri_builder(UriTemplate::new("entries", "nonProblems"))
            .build()?;

        let organizer = Schema::define("ProblemOrganizer")
            .template_root(["2.16.840.1.113883.10.20.22.4.3"])
            .fields(vec![
                FieldSpec::new("sourceIds", "1..*", "h:id").nested(&shared.identifier),
                FieldSpec::new("dateRange", "1..1", "h:effectiveTime").nested(&shared.effective_time),
                FieldSpec::new("concernStatus", "1..1", "h:statusCode/@code")
                    .nested(&shared.simple_code(CONCERN_STATUS)?),
                FieldSpec::new("problems", "1..*", observation.xpath()?).nested(&observation),
                FieldSpec::new("nonProblems", "0..*", non_problem.xpath()?).nested(&non_problem),
            ])
            .uri_builder(UriTemplate::new("entries", "problemConcerns"))
            .build()?;

        // coded entries required
        let section = Schema::define("ProblemsSection")
            .template_root(["2.16.840.1.113883.10.20.22.2.5.1"])
            .fields(vec![
                FieldSpec::new("problemConcerns", "0..*", organizer.xpath()?).nested(&organizer),
            ])
            .uri_builder(UriTemplate::new("sections", "problems"))
            .build()?;

        Ok(Self {
            age_observation,
            problem_status,
            health_status,
            observation,
            non_problem,
            organizer,
            section,
        })
    }
}
