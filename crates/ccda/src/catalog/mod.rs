//! The standard C-CDA schema catalog.
//!
//! Schemas are built bottom-up: shared datatypes first, then entries,
//! organizers and sections, and finally the document that references every
//! section. The catalog is built once per process and then only read.

pub mod demographics;
pub mod document;
pub mod immunizations;
pub mod medications;
pub mod problems;
pub mod results;
pub mod shared;
pub mod social_history;
pub mod vitals;

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::error::SchemaError;
use crate::options::Component;
use crate::parse::Locator;
use crate::schema::Schema;

pub use demographics::Demographics;
pub use document::{Documents, Sections};
pub use immunizations::Immunizations;
pub use medications::Medications;
pub use problems::Problems;
pub use results::Results;
pub use shared::Shared;
pub use social_history::SocialHistory;
pub use vitals::Vitals;

static STANDARD: OnceCell<Catalog> = OnceCell::new();

pub struct Catalog {
    pub shared: Shared,
    pub demographics: Demographics,
    pub vitals: Vitals,
    pub results: Results,
    pub medications: Medications,
    pub immunizations: Immunizations,
    pub problems: Problems,
    pub social_history: SocialHistory,
    pub documents: Documents,
}

impl Catalog {
    /// Builds a fresh catalog.
    pub fn build() -> Result<Self, SchemaError> {
        let shared = Shared::build()?;
        let demographics = Demographics::build(&shared)?;
        let vitals = Vitals::build(&shared)?;
        let results = Results::build(&shared)?;
        let medications = Medications::build(&shared)?;
        let immunizations = Immunizations::build(&shared)?;
        let problems = Problems::build(&shared)?;
        let social_history = SocialHistory::build(&shared)?;
        let documents = Documents::build(
            &shared,
            Sections {
                demographics: &demographics,
                vitals: &vitals,
                results: &results,
                medications: &medications,
                immunizations: &immunizations,
                social_history: &social_history,
                problems: &problems,
            },
        )?;

        tracing::debug!("schema catalog built");

        Ok(Self {
            shared,
            demographics,
            vitals,
            results,
            medications,
            immunizations,
            problems,
            social_history,
            documents,
        })
    }

    /// The process-wide catalog, built on first use.
    pub fn standard() -> Result<&'static Catalog, SchemaError> {
        STANDARD.get_or_try_init(Catalog::build)
    }

    /// The root schema of `component` and where it is anchored in a document.
    pub fn root(&self, component: Component) -> (&Arc<Schema>, Locator) {
        match component {
            Component::Ccd => (&self.documents.ccda, Locator::DocumentElement),
            Component::Demographics => (
                &self.demographics.patient,
                Locator::Query(self.demographics.patient_role.clone()),
            ),
            Component::Vitals => (&self.vitals.section, Locator::Predicate),
            Component::Results => (&self.results.section, Locator::Predicate),
            Component::Medications => (&self.medications.section, Locator::Predicate),
            Component::Immunizations => (&self.immunizations.section, Locator::Predicate),
            Component::Problems => (&self.problems.section, Locator::Predicate),
            Component::SocialHistory => (&self.social_history.section, Locator::Predicate),
        }
    }

    /// Every identity-bearing or template-rooted schema in the catalog.
    pub fn templates(&self) -> Vec<&Arc<Schema>> {
        vec![
            &self.vitals.observation,
            &self.vitals.organizer,
            &self.vitals.section,
            &self.results.observation,
            &self.results.organizer,
            &self.results.section,
            &self.medications.information,
            &self.medications.activity,
            &self.medications.prescription,
            &self.medications.reported,
            &self.medications.section,
            &self.immunizations.information,
            &self.immunizations.refusal_reason,
            &self.immunizations.activity,
            &self.immunizations.planned,
            &self.immunizations.refused,
            &self.immunizations.section,
            &self.problems.age_observation,
            &self.problems.problem_status,
            &self.problems.health_status,
            &self.problems.observation,
            &self.problems.non_problem,
            &self.problems.organizer,
            &self.problems.section,
            &self.social_history.smoking_status,
            &self.social_history.section,
        ]
    }
}
