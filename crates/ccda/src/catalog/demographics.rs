//! Patient demographics from `recordTarget/patientRole`.

use std::sync::Arc;

use helios_ccda_xpath::Query;

use super::shared::Shared;
use crate::coerce::{ADDRESS_USE, Coercion};
use crate::error::SchemaError;
use crate::field::FieldSpec;
use crate::schema::Schema;

/// Where the patient lives in a document.
pub const PATIENT_ROLE: &str = "//h:recordTarget/h:patientRole";

pub struct Demographics {
    pub patient: Arc<Schema>,
    pub person_name: Arc<Schema>,
    pub address: Arc<Schema>,
    pub telecom: Arc<Schema>,
    /// Compiled [`PATIENT_ROLE`].
    pub patient_role: Query,
}

impl Demographics {
    pub fn build(shared: &Shared) -> Result<Self, SchemaError> {
        let person_name = Schema::define("PersonName")
            .fields(vec![
                FieldSpec::new("prefix", "0..1", "h:prefix").coerce(Coercion::Text),
                FieldSpec::new("givens", "0..*", "h:given").coerce(Coercion::Text),
                FieldSpec::new("family", "0..1", "h:family").coerce(Coercion::Text),
                FieldSpec::new("suffix", "0..1", "h:suffix").coerce(Coercion::Text),
            ])
            .build()?;

        let address = Schema::define("Address")
            .fields(vec![
                FieldSpec::new("use", "0..1", "@use").coerce(Coercion::Lookup(ADDRESS_USE)),
                FieldSpec::new("streetLines", "0..*", "h:streetAddressLine").coerce(Coercion::Text),
                FieldSpec::new("city", "0..1", "h:city").coerce(Coercion::Text),
                FieldSpec::new("state", "0..1", "h:state").coerce(Coercion::Text),
                FieldSpec::new("zip", "0..1", "h:postalCode").coerce(Coercion::Text),
                FieldSpec::new("country", "0..1", "h:country").coerce(Coercion::Text),
            ])
            .build()?;

        let telecom = Schema::define("Telecom")
            .fields(vec![
                FieldSpec::new("value", "0..1", "@value"),
                FieldSpec::new("use", "0..1", "@use").coerce(Coercion::Lookup(ADDRESS_USE)),
            ])
            .build()?;

        let patient = Schema::define("Patient")
            .fields(vec![
                FieldSpec::new("sourceIds", "1..*", "h:id").nested(&shared.identifier),
                FieldSpec::new("name", "1..1", "h:patient/h:name").nested(&person_name),
                FieldSpec::new("birthTime", "1..1", "h:patient/h:birthTime/@value")
                    .coerce(Coercion::Timestamp),
                FieldSpec::new("gender", "1..1", "h:patient/h:administrativeGenderCode")
                    .nested(&shared.simplified_code),
                FieldSpec::new("maritalStatus", "0..1", "h:patient/h:maritalStatusCode")
                    .nested(&shared.simplified_code),
                FieldSpec::new("race", "0..1", "h:patient/h:raceCode")
                    .nested(&shared.simplified_code),
                FieldSpec::new("ethnicity", "0..1", "h:patient/h:ethnicGroupCode")
                    .nested(&shared.simplified_code),
                FieldSpec::new("addresses", "0..*", "h:addr").nested(&address),
                FieldSpec::new("telecoms", "0..*", "h:telecom").nested(&telecom),
            ])
            .build()?;

        let patient_role =
            Query::parse(PATIENT_ROLE).map_err(|source| SchemaError::InvalidExpression {
                schema: patient.name().to_string(),
                field: "patientRole".to_string(),
                source,
            })?;

        Ok(Self {
            patient,
            person_name,
            address,
            telecom,
            patient_role,
        })
    }
}
