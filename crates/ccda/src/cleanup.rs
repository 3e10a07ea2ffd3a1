//! Cleanup steps and the two-pass cleanup driver.
//!
//! A step is a closure run once per instance, after the instance's children
//! have been cleaned. It may rewrite the current instance's payload and read
//! anything else in the tree.
//!
//! Pass `1` turns the raw extraction into its final shape; pass `paredown`
//! trims bookkeeping and empty values. See [`Pass`].

use std::collections::HashMap;
use std::sync::Arc;

use roxmltree::Document;
use tracing::debug;

use crate::error::Issue;
use crate::instance::{Instance, InstanceId, InstanceTree, MatchedNode};
use crate::links;
use crate::schema::Pass;
use crate::value::{Fields, Value};
use crate::walk::{self, TreeVisitor};

/// A cleanup step.
pub type CleanupStep = Arc<dyn Fn(&mut StepContext<'_, '_>) + Send + Sync>;

/// Wraps a closure as a [`CleanupStep`].
pub fn step<F>(f: F) -> CleanupStep
where
    F: Fn(&mut StepContext<'_, '_>) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// The instance a step is running on, plus read access to everything else.
pub struct StepContext<'c, 'input> {
    tree: &'c mut InstanceTree,
    id: InstanceId,
    document: &'c Document<'input>,
}

impl<'c, 'input> StepContext<'c, 'input> {
    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn tree(&self) -> &InstanceTree {
        self.tree
    }

    pub(crate) fn tree_mut(&mut self) -> &mut InstanceTree {
        self.tree
    }

    pub fn instance(&self) -> &Instance {
        self.tree.get(self.id)
    }

    pub fn instance_mut(&mut self) -> &mut Instance {
        self.tree.get_mut(self.id)
    }

    pub fn fields(&self) -> Option<&Fields> {
        self.instance().fields()
    }

    pub fn fields_mut(&mut self) -> Option<&mut Fields> {
        self.instance_mut().fields_mut()
    }

    pub fn document(&self) -> &Document<'input> {
        self.document
    }

    pub fn schema_name(&self) -> String {
        self.instance().schema().name().to_string()
    }

    pub fn record(&mut self, issue: Issue) {
        self.instance_mut().record(issue);
    }
}

struct PassVisitor<'c, 'input> {
    pass: Pass,
    document: &'c Document<'input>,
    hide_fields: &'c [String],
    visited: usize,
}

impl TreeVisitor for PassVisitor<'_, '_> {
    fn post(&mut self, tree: &mut InstanceTree, id: InstanceId) {
        self.visited += 1;
        let schema = Arc::clone(tree.get(id).schema());
        let mut ctx = StepContext {
            tree,
            id,
            document: self.document,
        };
        for step in schema.steps(self.pass) {
            step(&mut ctx);
        }
        if self.pass == Pass::Paredown && !self.hide_fields.is_empty() {
            hide_everywhere(ctx.instance_mut(), self.hide_fields);
        }
    }
}

/// Runs pass `1` then pass `paredown` over the whole tree. `hide_fields` are
/// removed from every payload after that instance's own paredown steps.
pub fn run(tree: &mut InstanceTree, document: &Document<'_>, hide_fields: &[String]) {
    for pass in Pass::ALL {
        let mut visitor = PassVisitor {
            pass,
            document,
            hide_fields,
            visited: 0,
        };
        walk::walk(tree, InstanceId::ROOT, &mut visitor);
        debug!(pass = %pass, instances = visitor.visited, "cleanup pass complete");
    }
}

fn hide_everywhere(instance: &mut Instance, names: &[String]) {
    let Some(fields) = instance.fields_mut() else {
        return;
    };
    let mut taken = Vec::new();
    for name in names {
        if let Some(value) = fields.remove(name) {
            taken.push((name.clone(), value));
        }
    }
    for value in fields.values_mut() {
        strip_nested(value, names);
    }
    for (name, value) in taken {
        instance.hidden_mut().insert(name, value);
    }
}

// Plain mappings only; nested instances are handled when they are visited.
fn strip_nested(value: &mut Value, names: &[String]) {
    match value {
        Value::Mapping(fields) => {
            fields.retain(|key, _| !names.iter().any(|n| n == key));
            for v in fields.values_mut() {
                strip_nested(v, names);
            }
        }
        Value::Sequence(items) => {
            for v in items {
                strip_nested(v, names);
            }
        }
        Value::Instance(_) | Value::Scalar(_) => {}
    }
}

/// Moves the named fields from the payload into the hidden map.
pub fn hide_fields<I, S>(names: I) -> CleanupStep
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let names: Vec<String> = names.into_iter().map(Into::into).collect();
    step(move |ctx| {
        let instance = ctx.instance_mut();
        let Some(fields) = instance.fields_mut() else {
            return;
        };
        let taken: Vec<(String, Value)> = names
            .iter()
            .filter_map(|n| fields.remove(n).map(|v| (n.clone(), v)))
            .collect();
        for (name, value) in taken {
            instance.hidden_mut().insert(name, value);
        }
    })
}

/// Deletes fields that carry no data.
pub fn clear_nulls() -> CleanupStep {
    step(|ctx| {
        let id = ctx.id();
        let mut fields = match ctx.fields() {
            Some(fields) => fields.clone(),
            None => return,
        };
        let tree = ctx.tree();
        for value in fields.values_mut() {
            if let Value::Sequence(items) = value {
                items.retain(|item| !is_empty(tree, item));
            }
        }
        fields.retain(|_, value| !is_empty(tree, value));
        tree_set_fields(ctx.tree_mut(), id, fields);
    })
}

fn is_empty(tree: &InstanceTree, value: &Value) -> bool {
    match value {
        Value::Instance(id) => tree.get(*id).payload().is_empty_data(),
        other => other.is_empty_data(),
    }
}

fn tree_set_fields(tree: &mut InstanceTree, id: InstanceId, fields: Fields) {
    tree.get_mut(id).set_payload(Value::Mapping(fields));
}

/// Writes `_id` for an identity-bearing instance.
pub fn assign_id() -> CleanupStep {
    step(|ctx| {
        let Some(uri) = links::identifier(ctx.tree(), ctx.id()) else {
            return;
        };
        if let Some(fields) = ctx.fields_mut() {
            fields.insert("_id", Value::text(uri));
        }
    })
}

/// Writes `_links`: the patient plus the identifier of each
/// identity-bearing ancestor, keyed by its category.
pub fn assign_links() -> CleanupStep {
    step(|ctx| {
        let links = links::links(ctx.tree(), ctx.id());
        if let Some(fields) = ctx.fields_mut() {
            fields.insert("_links", Value::Mapping(links));
        }
    })
}

/// Lifts every field of the named nested instances into the current payload.
/// The emptied wrappers are kept in the hidden map.
pub fn extract_all_fields<I, S>(names: I) -> CleanupStep
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let names: Vec<String> = names.into_iter().map(Into::into).collect();
    step(move |ctx| {
        for name in &names {
            let Some(child) = ctx.fields().and_then(|f| f.get(name)).and_then(Value::as_instance)
            else {
                continue;
            };
            let lifted = match ctx.tree_mut().get_mut(child).fields_mut() {
                Some(fields) => std::mem::take(fields),
                None => continue,
            };

            let instance = ctx.instance_mut();
            if let Some(fields) = instance.fields_mut() {
                if let Some(wrapper) = fields.remove(name) {
                    instance.hidden_mut().insert(name.clone(), wrapper);
                }
            }
            if let Some(fields) = instance.fields_mut() {
                for (key, value) in lifted {
                    fields.insert(key, value);
                }
            }
        }
    })
}

enum Drop {
    Field(String),
    Item(String, usize),
}

/// Keeps at most one populated member of a group of sibling fields.
///
/// Nested instances are compared by the document node they matched: a node
/// already seen in an earlier field is removed from later ones. Plain values
/// are compared per field, and every field after the first populated one is
/// removed.
pub fn ensure_mutually_exclusive<I, S>(names: I) -> CleanupStep
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let names: Vec<String> = names.into_iter().map(Into::into).collect();
    step(move |ctx| {
        let Some(fields) = ctx.fields() else {
            return;
        };
        let tree = ctx.tree();

        let populated: Vec<&String> = names
            .iter()
            .filter(|n| fields.get(n).is_some_and(|v| !is_empty(tree, v)))
            .collect();
        if populated.len() < 2 {
            return;
        }

        let all_instances = populated
            .iter()
            .all(|n| fields.get(n).is_some_and(holds_only_instances));

        let mut drops: Vec<(Drop, String)> = Vec::new();
        if all_instances {
            let mut seen: HashMap<MatchedNode, &String> = HashMap::new();
            for name in &populated {
                let Some(value) = fields.get(name) else {
                    continue;
                };
                for (index, id) in indexed_instances(value) {
                    let Some(node) = tree.get(id).node() else {
                        continue;
                    };
                    match seen.get(&node) {
                        Some(owner) => {
                            let drop = match index {
                                Some(i) => Drop::Item((*name).clone(), i),
                                None => Drop::Field((*name).clone()),
                            };
                            drops.push((drop, (*owner).clone()));
                        }
                        None => {
                            seen.insert(node, *name);
                        }
                    }
                }
            }
        } else {
            let kept = populated[0];
            for name in &populated[1..] {
                drops.push((Drop::Field((*name).clone()), kept.clone()));
            }
        }

        if drops.is_empty() {
            return;
        }

        let schema = ctx.schema_name();
        let mut removed_items: HashMap<String, Vec<usize>> = HashMap::new();
        for (drop, kept) in drops {
            let dropped = match drop {
                Drop::Field(name) => {
                    if let Some(fields) = ctx.fields_mut() {
                        fields.remove(&name);
                    }
                    name
                }
                Drop::Item(name, index) => {
                    removed_items.entry(name.clone()).or_default().push(index);
                    name
                }
            };
            ctx.record(Issue::MutuallyExclusive {
                schema: schema.clone(),
                fields: names.clone(),
                kept,
                dropped,
            });
        }

        let Some(fields) = ctx.fields_mut() else {
            return;
        };
        for (name, mut indices) in removed_items {
            indices.sort_unstable();
            let emptied = match fields.get_mut(&name) {
                Some(Value::Sequence(items)) => {
                    for index in indices.into_iter().rev() {
                        if index < items.len() {
                            items.remove(index);
                        }
                    }
                    items.is_empty()
                }
                _ => false,
            };
            if emptied {
                fields.remove(&name);
            }
        }
    })
}

fn holds_only_instances(value: &Value) -> bool {
    match value {
        Value::Instance(_) => true,
        Value::Sequence(items) => items.iter().all(|v| matches!(v, Value::Instance(_))),
        _ => false,
    }
}

fn indexed_instances(value: &Value) -> Vec<(Option<usize>, InstanceId)> {
    match value {
        Value::Instance(id) => vec![(None, *id)],
        Value::Sequence(items) => items
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_instance().map(|id| (Some(i), id)))
            .collect(),
        _ => Vec::new(),
    }
}

/// Replaces a narrative text payload with the text it stands for.
///
/// A `reference` of the form `#ID` is followed to the element in the document
/// carrying that `ID`; otherwise the literal `text` is used. Whitespace runs
/// collapse to one space and empty text becomes null.
pub fn resolve_text_reference() -> CleanupStep {
    step(|ctx| {
        let Some(fields) = ctx.fields() else {
            return;
        };
        let reference = fields
            .get("reference")
            .and_then(Value::as_text)
            .and_then(|r| r.strip_prefix('#'))
            .map(str::to_string);
        let literal = fields.get("text").and_then(Value::as_text).map(str::to_string);

        let referenced = reference.and_then(|id| {
            ctx.document()
                .descendants()
                .find(|n| n.is_element() && n.attribute("ID") == Some(id.as_str()))
                .map(|n| {
                    n.descendants()
                        .filter(|d| d.is_text())
                        .filter_map(|d| d.text())
                        .collect::<String>()
                })
        });

        let text = referenced.or(literal).map(|t| normalize_whitespace(&t));
        let payload = match text {
            Some(t) if !t.is_empty() => Value::text(t),
            _ => Value::null(),
        };
        ctx.instance_mut().set_payload(payload);
    })
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapses a concept descriptor to its label, or its code when unlabeled.
pub fn simplify_code() -> CleanupStep {
    step(|ctx| {
        let Some(fields) = ctx.fields() else {
            return;
        };
        let simplified = ["label", "code"]
            .iter()
            .filter_map(|k| fields.get(k))
            .find(|v| !v.is_empty_data())
            .cloned()
            .unwrap_or_else(Value::null);
        ctx.instance_mut().set_payload(simplified);
    })
}

const PERIODIC_TIME_TYPES: [&str; 2] = ["PIVL_TS", "EIVL_TS"];

/// Splits `times` into a `dateRange` (the first non-periodic time) and a
/// `dosePeriod` (the period of the first periodic time).
pub fn split_effective_times() -> CleanupStep {
    step(|ctx| {
        let Some(times) = ctx.fields_mut().and_then(|f| f.remove("times")) else {
            return;
        };
        let items: Vec<InstanceId> = match &times {
            Value::Sequence(items) => items.iter().filter_map(Value::as_instance).collect(),
            Value::Instance(id) => vec![*id],
            _ => Vec::new(),
        };

        let tree = ctx.tree();
        let is_periodic = |id: &InstanceId| {
            tree.get(*id)
                .field_or_hidden("xsitype")
                .and_then(Value::as_text)
                .is_some_and(|t| PERIODIC_TIME_TYPES.contains(&t))
        };
        let range = items.iter().find(|id| !is_periodic(id)).copied();
        let periodic = items.iter().find(|id| is_periodic(id)).copied();

        let period = periodic.and_then(|id| {
            ctx.tree_mut()
                .get_mut(id)
                .fields_mut()
                .and_then(|f| f.remove("period"))
        });

        let instance = ctx.instance_mut();
        if let Some(fields) = instance.fields_mut() {
            if let Some(range) = range {
                fields.insert("dateRange", Value::Instance(range));
            }
            if let Some(period) = period {
                fields.insert("dosePeriod", period);
            }
        }
        instance.hidden_mut().insert("times", times);
    })
}

/// Deletes a field outright.
pub fn drop_field(name: impl Into<String>) -> CleanupStep {
    let name = name.into();
    step(move |ctx| {
        if let Some(fields) = ctx.fields_mut() {
            fields.remove(&name);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldResolver, FieldSpec};
    use crate::namespaces;
    use crate::schema::{Schema, UriTemplate};
    use helios_ccda_xpath::Item;
    use serde_json::json;

    fn parse(schema: Arc<Schema>, xml: &str, hide: &[&str]) -> (serde_json::Value, Vec<Issue>) {
        let doc = Document::parse(xml).unwrap();
        let mut tree = FieldResolver::build(schema, Item::Node(doc.root_element()), "7", namespaces());
        let hide: Vec<String> = hide.iter().map(|s| s.to_string()).collect();
        run(&mut tree, &doc, &hide);
        (walk::export_tree(&tree), tree.issues())
    }

    #[test]
    fn test_clear_nulls_removes_empty_values() {
        let inner = Schema::define("Inner")
            .fields(vec![FieldSpec::new("missing", "0..1", "@nope")])
            .build()
            .unwrap();
        let schema = Schema::define("Outer")
            .fields(vec![
                FieldSpec::new("a", "0..1", "@a"),
                FieldSpec::new("inner", "0..1", "h:x").nested(&inner),
                FieldSpec::new("list", "0..*", "h:y"),
            ])
            .build()
            .unwrap();
        let (data, _) = parse(schema, r#"<r xmlns="urn:hl7-org:v3" a="1"><x/></r>"#, &[]);
        assert_eq!(data, json!({"a": "1"}));
    }

    #[test]
    fn test_paredown_hides_source_ids() {
        let id = Schema::define("Identifier")
            .fields(vec![FieldSpec::new("root", "0..1", "@root")])
            .build()
            .unwrap();
        let schema = Schema::define("Entry")
            .fields(vec![
                FieldSpec::new("sourceIds", "1..*", "h:id").nested(&id),
                FieldSpec::new("code", "0..1", "h:code/@code"),
            ])
            .build()
            .unwrap();
        let (data, _) = parse(
            schema,
            r#"<r xmlns="urn:hl7-org:v3"><id root="1.2"/><code code="x"/></r>"#,
            &[],
        );
        assert_eq!(data, json!({"code": "x"}));
    }

    #[test]
    fn test_caller_hidden_fields_reach_nested_mappings() {
        let entry = Schema::define("Entry")
            .template_root(["e"])
            .fields(vec![FieldSpec::new("code", "0..1", "h:code/@code")])
            .uri_builder(UriTemplate::new("entries", "things"))
            .build()
            .unwrap();
        let schema = Schema::define("Section")
            .fields(vec![FieldSpec::new("entries", "0..*", entry.xpath().unwrap()).nested(&entry)])
            .build()
            .unwrap();
        let xml = r#"<r xmlns="urn:hl7-org:v3"><e><templateId root="e"/><code code="x"/></e></r>"#;

        let (data, _) = parse(schema, xml, &["_id", "patient"]);
        let entry = &data["entries"][0];
        assert_eq!(entry["code"], json!("x"));
        assert!(entry.get("_id").is_none());
        assert!(entry["_links"].get("patient").is_none());
    }

    #[test]
    fn test_extract_all_fields_lifts_child_fields() {
        let info = Schema::define("Info")
            .fields(vec![FieldSpec::new("name", "0..1", "@name")])
            .build()
            .unwrap();
        let schema = Schema::define("Activity")
            .fields(vec![
                FieldSpec::new("info", "1..1", "h:info").nested(&info),
                FieldSpec::new("code", "0..1", "@code"),
            ])
            .cleanup_step(Pass::Structural, extract_all_fields(["info"]))
            .build()
            .unwrap();
        let (data, _) = parse(
            schema,
            r#"<r xmlns="urn:hl7-org:v3" code="c"><info name="n"/></r>"#,
            &[],
        );
        assert_eq!(data, json!({"code": "c", "name": "n"}));
    }

    #[test]
    fn test_mutually_exclusive_plain_fields_keep_first_declared() {
        let schema = Schema::define("Group")
            .fields(vec![
                FieldSpec::new("a", "0..1", "@a"),
                FieldSpec::new("b", "0..1", "@b"),
                FieldSpec::new("c", "0..1", "@c"),
            ])
            .cleanup_step(Pass::Structural, ensure_mutually_exclusive(["a", "b", "c"]))
            .build()
            .unwrap();
        let (data, issues) = parse(schema, r#"<r b="2" c="3"/>"#, &[]);

        assert_eq!(data, json!({"b": "2"}));
        assert_eq!(
            issues,
            vec![Issue::MutuallyExclusive {
                schema: "Group".to_string(),
                fields: vec!["a".to_string(), "b".to_string(), "c".to_string()],
                kept: "b".to_string(),
                dropped: "c".to_string(),
            }]
        );
    }

    #[test]
    fn test_mutually_exclusive_instances_dedupe_by_node() {
        let entry = Schema::define("Entry")
            .fields(vec![FieldSpec::new("code", "0..1", "@code")])
            .build()
            .unwrap();
        let schema = Schema::define("Section")
            .fields(vec![
                FieldSpec::new("first", "0..*", "h:e[@code='1']").nested(&entry),
                FieldSpec::new("all", "0..*", "h:e").nested(&entry),
            ])
            .cleanup_step(Pass::Structural, ensure_mutually_exclusive(["first", "all"]))
            .build()
            .unwrap();
        let xml = r#"<r xmlns="urn:hl7-org:v3"><e code="1"/><e code="2"/></r>"#;
        let (data, issues) = parse(schema, xml, &[]);

        assert_eq!(
            data,
            json!({"first": [{"code": "1"}], "all": [{"code": "2"}]})
        );
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn test_text_reference_follows_id() {
        let text = Schema::define("TextWithReference")
            .fields(vec![
                FieldSpec::new("reference", "0..1", "h:reference/@value"),
                FieldSpec::new("text", "0..1", "."),
            ])
            .cleanup_step(Pass::Structural, resolve_text_reference())
            .build()
            .unwrap();
        let schema = Schema::define("Entry")
            .fields(vec![
                FieldSpec::new("byRef", "0..1", "h:entry/h:text").nested(&text),
                FieldSpec::new("literal", "0..1", "h:note").nested(&text),
            ])
            .build()
            .unwrap();
        let xml = r##"<r xmlns="urn:hl7-org:v3">
  <section><content ID="sig1">Take   one
    tablet</content></section>
  <entry><text><reference value="#sig1"/></text></entry>
  <note>  plain  text </note>
</r>"##;
        let (data, _) = parse(schema, xml, &[]);
        assert_eq!(
            data,
            json!({"byRef": "Take one tablet", "literal": "plain text"})
        );
    }

    #[test]
    fn test_simplify_code_prefers_label() {
        let code = Schema::define("SimplifiedCode")
            .fields(vec![
                FieldSpec::new("code", "0..1", "@code"),
                FieldSpec::new("label", "0..1", "@displayName"),
            ])
            .cleanup_step(Pass::Structural, simplify_code())
            .build()
            .unwrap();
        let schema = Schema::define("Entry")
            .fields(vec![FieldSpec::new("codes", "0..*", "h:c").nested(&code)])
            .build()
            .unwrap();
        let xml = r#"<r xmlns="urn:hl7-org:v3"><c code="N" displayName="Normal"/><c code="H"/><c/></r>"#;
        let (data, _) = parse(schema, xml, &[]);
        assert_eq!(data, json!({"codes": ["Normal", "H"]}));
    }

    #[test]
    fn test_drop_field_in_paredown() {
        let schema = Schema::define("Entry")
            .fields(vec![
                FieldSpec::new("keep", "0..1", "@a"),
                FieldSpec::new("drop", "0..1", "@b"),
            ])
            .cleanup_step(Pass::Paredown, drop_field("drop"))
            .build()
            .unwrap();
        let (data, _) = parse(schema, r#"<r a="1" b="2"/>"#, &[]);
        assert_eq!(data, json!({"keep": "1"}));
    }
}
