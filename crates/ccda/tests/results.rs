//! Results section extraction.

mod common;

use common::parse_fixture;
use helios_ccda::Component;
use serde_json::json;

// ============================================================================
// Panels
// ============================================================================

#[test]
fn test_results_panel() {
    let doc = parse_fixture("results.xml", Component::Results);
    assert!(doc.issues.is_empty(), "unexpected issues: {:?}", doc.issues);

    let panels = doc.data["panels"].as_array().unwrap();
    assert_eq!(panels.len(), 1);
    assert_eq!(panels[0]["panelName"]["code"], "43789009");
    assert_eq!(panels[0]["panelName"]["label"], "CBC WO DIFFERENTIAL");
    assert_eq!(panels[0]["panelName"]["codeSystemName"], "SNOMED CT");
    assert_eq!(panels[0]["results"].as_array().unwrap().len(), 3);
}

#[test]
fn test_results_keep_document_order() {
    let doc = parse_fixture("results.xml", Component::Results);
    let names: Vec<&str> = doc.data["panels"][0]["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["resultName"]["label"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["HGB", "WBC", "PLT"]);
}

// ============================================================================
// Observations
// ============================================================================

#[test]
fn test_result_observation_values() {
    let doc = parse_fixture("results.xml", Component::Results);
    let results = &doc.data["panels"][0]["results"];

    assert_eq!(results[0]["physicalQuantity"], json!({"value": 13.2, "unit": "g/dl"}));

    let platelets = &results[2];
    assert_eq!(platelets["resultName"]["code"], "26515-7");
    assert_eq!(platelets["resultName"]["label"], "PLT");
    assert_eq!(platelets["physicalQuantity"]["value"], 123);
    assert_eq!(platelets["freeTextValue"], "123 (L)");
    assert_eq!(platelets["interpretations"], json!(["Low"]));
    assert_eq!(platelets["measuredAt"]["point"], "2000-03-23T14:30:00.000Z");
    assert_eq!(platelets["measuredAt"]["pointResolution"], "minute");
}

#[test]
fn test_result_identifiers_follow_source_ids() {
    let doc = parse_fixture("results.xml", Component::Results);
    let results = &doc.data["panels"][0]["results"];

    // same root, different extensions
    assert_ne!(results[1]["_id"], results[2]["_id"]);
    assert!(
        results[0]["_id"]
            .as_str()
            .unwrap()
            .starts_with("patients/0/entries/results/")
    );
    assert_eq!(results[0]["_links"]["organizers"], doc.data["panels"][0]["_id"]);
}
