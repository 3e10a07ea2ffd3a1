//! Social history section. Only smoking status is extracted.

use std::sync::Arc;

use super::shared::Shared;
use crate::error::SchemaError;
use crate::field::FieldSpec;
use crate::schema::{Conditions, Schema, UriTemplate};

/// Smoking Status value set.
const SMOKING_STATUS: &str = "2.16.840.1.113883.11.20.9.38";

pub struct SocialHistory {
    pub smoking_status: Arc<Schema>,
    pub section: Arc<Schema>,
}

impl SocialHistory {
    pub fn build(shared: &Shared) -> Result<Self, SchemaError> {
        let smoking_status = Schema::define("SmokingStatusObservation")
            .template_root([
                "2.16.840.1.113883.10.20.22.4.78",
                // published with a typo in the 1.1 DSTU and still seen in the wild
                "2.16.840.1.113883.10.22.4.78",
            ])
            .fields(vec![
                FieldSpec::new("sourceIds", "1..*", "h:id").nested(&shared.identifier),
                FieldSpec::new("smokingStatus", "0..1", "h:value").nested(
                    &shared
                        .concept_descriptor
                        .shall(Conditions::value_set(SMOKING_STATUS))?,
                ),
                FieldSpec::new("dateRange", "1..1", "h:effectiveTime").nested(&shared.effective_time),
            ])
            .uri_builder(UriTemplate::new("entries", "smokingStatus"))
            .build()?;

        let section = Schema::define("SocialHistorySection")
            .template_root(["2.16.840.1.113883.10.20.22.2.17"])
            .fields(vec![
                FieldSpec::new("smokingStatuses", "0..*", smoking_status.xpath()?)
                    .nested(&smoking_status),
            ])
            .uri_builder(UriTemplate::new("sections", "socialHistory"))
            .build()?;

        Ok(Self {
            smoking_status,
            section,
        })
    }
}
