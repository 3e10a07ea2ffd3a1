//! Identifiers and cross-references for identity-bearing instances.
//!
//! An identifier has the form `patients/{patientId}/{category}/{type}/{key}`.
//! The key is a name-based UUID over the instance's source identifiers, so it
//! is stable across runs and can be computed for any instance at any point of
//! the cleanup.

use uuid::Uuid;

use crate::instance::{InstanceId, InstanceTree};
use crate::value::{Fields, Value};

pub fn patient_uri(patient_id: &str) -> String {
    format!("patients/{}", patient_id)
}

/// The identifier of `id`, or `None` when its schema declares no URI taxonomy.
pub fn identifier(tree: &InstanceTree, id: InstanceId) -> Option<String> {
    let template = tree.get(id).schema().uri_template()?;
    let key = Uuid::new_v5(&Uuid::NAMESPACE_OID, identity_key(tree, id).as_bytes());
    Some(format!(
        "{}/{}/{}/{}",
        patient_uri(tree.patient_id()),
        template.category,
        template.kind,
        key
    ))
}

/// References from `id` to the patient and to each identity-bearing ancestor.
/// When two ancestors share a category the nearest one wins.
pub fn links(tree: &InstanceTree, id: InstanceId) -> Fields {
    let mut links = Fields::new();
    links.insert("patient", Value::text(patient_uri(tree.patient_id())));

    for ancestor in tree.ancestors(id) {
        let Some(template) = tree.get(ancestor).schema().uri_template() else {
            continue;
        };
        if links.contains_key(&template.category) {
            continue;
        }
        if let Some(uri) = identifier(tree, ancestor) {
            links.insert(template.category.clone(), Value::text(uri));
        }
    }
    links
}

// `root|extension` pairs joined by `;`, else the matched node's position.
fn identity_key(tree: &InstanceTree, id: InstanceId) -> String {
    let instance = tree.get(id);
    let source_ids = instance
        .field_or_hidden("sourceIds")
        .map(|ids| source_id_pairs(tree, ids))
        .unwrap_or_default();
    if !source_ids.is_empty() {
        return source_ids.join(";");
    }

    match instance.node() {
        Some(node) => format!("node:{}", node.position()),
        None => format!("instance:{}", id.index()),
    }
}

fn source_id_pairs(tree: &InstanceTree, ids: &Value) -> Vec<String> {
    let items: Vec<&Value> = match ids {
        Value::Sequence(items) => items.iter().collect(),
        other => vec![other],
    };

    items
        .into_iter()
        .filter_map(|item| {
            let fields = match item {
                Value::Instance(id) => tree.get(*id).fields()?,
                Value::Mapping(fields) => fields,
                _ => return None,
            };
            let root = fields.get("root").and_then(Value::as_text).unwrap_or("");
            let extension = fields.get("extension").and_then(Value::as_text).unwrap_or("");
            if root.is_empty() && extension.is_empty() {
                return None;
            }
            Some(format!("{}|{}", root, extension))
        })
        .collect()
}
