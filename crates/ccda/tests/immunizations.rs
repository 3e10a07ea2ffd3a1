//! Immunizations section extraction.

mod common;

use common::parse_fixture;
use helios_ccda::{Component, Issue};

// ============================================================================
// Classification
// ============================================================================

#[test]
fn test_immunizations_classified_by_mood_and_negation() {
    let doc = parse_fixture("immunizations.xml", Component::Immunizations);

    assert_eq!(doc.data["immunizationsGiven"].as_array().unwrap().len(), 2);
    assert_eq!(doc.data["immunizationsPlanned"].as_array().unwrap().len(), 1);
    assert_eq!(doc.data["immunizationsSkipped"].as_array().unwrap().len(), 1);
    assert!(
        !doc.issues
            .iter()
            .any(|i| matches!(i, Issue::MutuallyExclusive { .. })),
        "unexpected issues: {:?}",
        doc.issues
    );
}

// ============================================================================
// Fields
// ============================================================================

#[test]
fn test_given_immunization_fields() {
    let doc = parse_fixture("immunizations.xml", Component::Immunizations);
    let given = &doc.data["immunizationsGiven"][0];

    assert_eq!(given["route"], "Intramuscular injection");
    assert_eq!(given["productName"]["code"], "88");
    assert_eq!(given["productName"]["label"], "Influenza virus vaccine");
    assert_eq!(given["freeTextProductName"], "Influenza virus vaccine");
    assert_eq!(given["lotNumber"], "1");
    assert_eq!(given["freeText"], "Influenza virus vaccine, IM");
    assert_eq!(given["date"]["point"], "1999-11-01T00:00:00.000Z");
    assert_eq!(given["date"]["pointResolution"], "month");
    assert!(given.get("immunizationName").is_none());
    assert!(given.get("skippedFor").is_none());

    // no negationInd at all still counts as given
    let second = &doc.data["immunizationsGiven"][1];
    assert_eq!(second["date"]["point"], "1998-12-15T00:00:00.000Z");
    assert!(second.get("lotNumber").is_none());
}

#[test]
fn test_planned_immunization_series() {
    let doc = parse_fixture("immunizations.xml", Component::Immunizations);
    let planned = &doc.data["immunizationsPlanned"][0];

    assert_eq!(planned["seriesNumber"], 2);
    assert_eq!(planned["productName"]["code"], "33");
    assert!(
        planned["_id"]
            .as_str()
            .unwrap()
            .starts_with("patients/0/entries/immunizationsPlanned/")
    );
}

#[test]
fn test_refused_immunization_reason() {
    let doc = parse_fixture("immunizations.xml", Component::Immunizations);
    let skipped = &doc.data["immunizationsSkipped"][0];

    assert_eq!(skipped["skippedFor"], "Patient Objection");
    assert_eq!(skipped["date"]["pointResolution"], "year");
    assert!(
        skipped["_id"]
            .as_str()
            .unwrap()
            .starts_with("patients/0/entries/immunizationsSkipped/")
    );
}
