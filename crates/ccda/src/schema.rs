//! Schema definition.
//!
//! A [`Schema`] describes one C-CDA template: the predicate that finds its
//! fragments in a document, the fields extracted from each fragment, the
//! cleanup steps that normalize the result, and optionally the URI taxonomy
//! that makes its instances identity-bearing.
//!
//! Schemas form a single inheritance chain rooted at the base component
//! ([`Schema::base`]). Deriving copies the parent's predicate parts, fields and
//! URI taxonomy; each may then be overridden independently. Inheritance is
//! resolved once in [`SchemaBuilder::build`], so a built schema carries its
//! complete field list and cleanup steps.
//!
//! ```
//! use helios_ccda::schema::{Schema, UriTemplate};
//! use helios_ccda::field::FieldSpec;
//!
//! let observation = Schema::define("VitalSignObservation")
//!     .template_root(["2.16.840.1.113883.10.20.22.4.27"])
//!     .fields(vec![FieldSpec::new("unit", "0..1", "h:value/@unit")])
//!     .uri_builder(UriTemplate::new("entries", "vitals"))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(
//!     observation.xpath().unwrap(),
//!     "(.//h:templateId[@root='2.16.840.1.113883.10.20.22.4.27']/..)[@negationInd='false'] \
//!      | (.//h:templateId[@root='2.16.840.1.113883.10.20.22.4.27']/..)[not(@negationInd)]"
//! );
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use helios_ccda_xpath::Query;
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::cleanup::{self, CleanupStep};
use crate::error::SchemaError;
use crate::field::{Field, FieldSpec};

static BASE: Lazy<Arc<Schema>> = Lazy::new(|| {
    Arc::new(Schema {
        name: "Component".to_string(),
        parent: None,
        template_roots: Vec::new(),
        moods: Vec::new(),
        negation: Some(false),
        containing_child: None,
        fields: Arc::from(Vec::new()),
        structural: Vec::new(),
        paredown: vec![cleanup::hide_fields(["sourceIds"]), cleanup::clear_nulls()],
        uri: None,
        conditions: None,
        predicate: None,
    })
});

/// A named cleanup pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    /// Pass `1`: structural normalization on the freshly built tree.
    Structural,
    /// Pass `paredown`: trimming bookkeeping and empty fields.
    Paredown,
}

impl Pass {
    /// Passes in execution order.
    pub const ALL: [Pass; 2] = [Pass::Structural, Pass::Paredown];
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pass::Structural => write!(f, "1"),
            Pass::Paredown => write!(f, "paredown"),
        }
    }
}

impl FromStr for Pass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" | "structural" => Ok(Pass::Structural),
            "paredown" => Ok(Pass::Paredown),
            other => Err(format!("unknown cleanup pass '{}'", other)),
        }
    }
}

/// The URI taxonomy of an identity-bearing schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UriTemplate {
    /// Link key under which descendants reference this instance.
    pub category: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl UriTemplate {
    pub fn new(category: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            kind: kind.into(),
        }
    }
}

/// Extra value-set expectations attached by [`Schema::shall`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conditions {
    pub value_set_oid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_system: Option<String>,
}

impl Conditions {
    pub fn value_set(oid: impl Into<String>) -> Self {
        Self {
            value_set_oid: oid.into(),
            code_system: None,
        }
    }

    pub fn with_code_system(mut self, oid: impl Into<String>) -> Self {
        self.code_system = Some(oid.into());
        self
    }
}

/// A built, immutable schema.
pub struct Schema {
    name: String,
    parent: Option<Arc<Schema>>,
    template_roots: Vec<String>,
    moods: Vec<String>,
    negation: Option<bool>,
    containing_child: Option<String>,
    fields: Arc<[Field]>,
    structural: Vec<CleanupStep>,
    paredown: Vec<CleanupStep>,
    uri: Option<UriTemplate>,
    conditions: Option<Conditions>,
    predicate: Option<Query>,
}

impl Schema {
    /// The base component every schema derives from: negation status
    /// `false`, and a paredown pass that hides `sourceIds` and clears nulls.
    pub fn base() -> Arc<Schema> {
        Arc::clone(&BASE)
    }

    /// Starts a new schema derived from the base component.
    pub fn define(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::from_parent(name.into(), Schema::base())
    }

    /// Starts a new schema derived from this one.
    pub fn derive(self: &Arc<Self>, name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::from_parent(name.into(), Arc::clone(self))
    }

    /// Derives an anonymous specialization tagged with `conditions`. Matching
    /// and extraction are unchanged.
    pub fn shall(self: &Arc<Self>, conditions: Conditions) -> Result<Arc<Schema>, SchemaError> {
        let tag = condition_tag(&self.name, &conditions)?;
        let mut builder = self.derive(format!("{}{}", self.name, tag));
        builder.conditions = Some(conditions);
        builder.build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<Schema>> {
        self.parent.as_ref()
    }

    pub fn template_roots(&self) -> &[String] {
        &self.template_roots
    }

    pub fn moods(&self) -> &[String] {
        &self.moods
    }

    pub fn negation_status(&self) -> Option<bool> {
        self.negation
    }

    pub fn containing_child(&self) -> Option<&str> {
        self.containing_child.as_deref()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Resolved steps for `pass`: ancestor steps first, then this schema's,
    /// each group in declaration order.
    pub fn steps(&self, pass: Pass) -> &[CleanupStep] {
        match pass {
            Pass::Structural => &self.structural,
            Pass::Paredown => &self.paredown,
        }
    }

    pub fn uri_template(&self) -> Option<&UriTemplate> {
        self.uri.as_ref()
    }

    pub fn is_identity_bearing(&self) -> bool {
        self.uri.is_some()
    }

    pub fn conditions(&self) -> Option<&Conditions> {
        self.conditions.as_ref()
    }

    /// The compiled match predicate.
    pub fn predicate(&self) -> Result<&Query, SchemaError> {
        self.predicate
            .as_ref()
            .ok_or_else(|| SchemaError::NoTemplateRoot {
                schema: self.name.clone(),
            })
    }

    /// Source text of the match predicate.
    pub fn xpath(&self) -> Result<&str, SchemaError> {
        Ok(self.predicate()?.source())
    }

    /// The match predicate followed by a further path, `(predicate)/path`.
    pub fn xpath_then(&self, path: &str) -> Result<String, SchemaError> {
        Ok(format!("({})/{}", self.xpath()?, path))
    }

    /// True if this schema is `name` or derives from it.
    pub fn is_a(&self, name: &str) -> bool {
        let mut current = Some(self);
        while let Some(schema) = current {
            if schema.name == name {
                return true;
            }
            current = schema.parent.as_deref();
        }
        false
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name.as_str()))
            .field("template_roots", &self.template_roots)
            .field("moods", &self.moods)
            .field("negation", &self.negation)
            .field("containing_child", &self.containing_child)
            .field("fields", &self.fields.iter().map(Field::name).collect::<Vec<_>>())
            .field("structural_steps", &self.structural.len())
            .field("paredown_steps", &self.paredown.len())
            .field("uri", &self.uri)
            .field("conditions", &self.conditions)
            .finish()
    }
}

/// Builder returned by [`Schema::define`] and [`Schema::derive`].
pub struct SchemaBuilder {
    name: String,
    parent: Arc<Schema>,
    template_roots: Vec<String>,
    moods: Vec<String>,
    negation: Option<bool>,
    containing_child: Option<String>,
    fields: Option<Vec<FieldSpec>>,
    structural: Vec<CleanupStep>,
    paredown: Vec<CleanupStep>,
    uri: Option<UriTemplate>,
    conditions: Option<Conditions>,
}

impl SchemaBuilder {
    fn from_parent(name: String, parent: Arc<Schema>) -> Self {
        Self {
            name,
            template_roots: parent.template_roots.clone(),
            moods: parent.moods.clone(),
            negation: parent.negation,
            containing_child: parent.containing_child.clone(),
            fields: None,
            structural: Vec::new(),
            paredown: Vec::new(),
            uri: parent.uri.clone(),
            conditions: parent.conditions.clone(),
            parent,
        }
    }

    /// Sets the template-root OIDs anchoring the match predicate.
    pub fn template_root<I, S>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.template_roots = roots.into_iter().map(Into::into).collect();
        self
    }

    /// Restricts matches to the given `moodCode` values.
    pub fn with_mood<I, S>(mut self, moods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.moods = moods.into_iter().map(Into::into).collect();
        self
    }

    /// Restricts matches by `negationInd`. `false` also accepts fragments
    /// that carry no `negationInd` at all.
    pub fn with_negation_status(mut self, status: bool) -> Self {
        self.negation = Some(status);
        self
    }

    /// Accepts either negation status.
    pub fn without_negation_status(mut self) -> Self {
        self.negation = None;
        self
    }

    /// Requires a descendant carrying the given template id.
    pub fn containing_child_template(mut self, root: impl Into<String>) -> Self {
        self.containing_child = Some(root.into());
        self
    }

    /// Replaces the inherited field list wholesale.
    pub fn fields(mut self, fields: Vec<FieldSpec>) -> Self {
        self.fields = Some(fields);
        self
    }

    /// Appends a step to the named pass.
    pub fn cleanup_step(mut self, pass: Pass, step: CleanupStep) -> Self {
        match pass {
            Pass::Structural => self.structural.push(step),
            Pass::Paredown => self.paredown.push(step),
        }
        self
    }

    /// Makes the schema identity-bearing. The identity and link steps are
    /// appended to pass `1` unless an ancestor already registered them.
    pub fn uri_builder(mut self, template: UriTemplate) -> Self {
        if self.uri.is_none() {
            self.structural.push(cleanup::assign_id());
            self.structural.push(cleanup::assign_links());
        }
        self.uri = Some(template);
        self
    }

    /// Compiles field expressions and the match predicate.
    pub fn build(self) -> Result<Arc<Schema>, SchemaError> {
        let SchemaBuilder {
            name,
            parent,
            template_roots,
            moods,
            negation,
            containing_child,
            fields,
            structural,
            paredown,
            uri,
            conditions,
        } = self;

        let fields: Arc<[Field]> = match fields {
            Some(specs) => specs
                .into_iter()
                .map(|spec| spec.compile(&name))
                .collect::<Result<Vec<_>, _>>()?
                .into(),
            None => Arc::clone(&parent.fields),
        };

        let predicate = compile_predicate(
            &template_roots,
            &moods,
            containing_child.as_deref(),
            negation,
        )
        .map(|source| {
            Query::parse(&source).map_err(|source| SchemaError::InvalidPredicate {
                schema: name.clone(),
                source,
            })
        })
        .transpose()?;

        let mut all_structural = parent.structural.clone();
        all_structural.extend(structural);
        let mut all_paredown = parent.paredown.clone();
        all_paredown.extend(paredown);

        tracing::trace!(schema = %name, parent = %parent.name, fields = fields.len(), "schema built");

        Ok(Arc::new(Schema {
            name,
            parent: Some(parent),
            template_roots,
            moods,
            negation,
            containing_child,
            fields,
            structural: all_structural,
            paredown: all_paredown,
            uri,
            conditions,
            predicate,
        }))
    }
}

/// Builds the match predicate source. Refinements apply in the order mood,
/// containment, negation.
fn compile_predicate(
    roots: &[String],
    moods: &[String],
    containing_child: Option<&str>,
    negation: Option<bool>,
) -> Option<String> {
    if roots.is_empty() {
        return None;
    }

    let mut ret = roots
        .iter()
        .map(|root| format!(".//h:templateId[@root='{}']/..", root))
        .collect::<Vec<_>>()
        .join(" | ");

    if !moods.is_empty() {
        let test = moods
            .iter()
            .map(|m| format!("@moodCode='{}'", m))
            .collect::<Vec<_>>()
            .join(" or ");
        ret = format!("({})[{}]", ret, test);
    }

    if let Some(child) = containing_child {
        ret = format!("({})[.//h:templateId[@root='{}']]", ret, child);
    }

    if let Some(status) = negation {
        let mut meets = format!("({})[@negationInd='{}']", ret, status);
        if !status {
            meets.push_str(&format!(" | ({})[not(@negationInd)]", ret));
        }
        ret = meets;
    }

    Some(ret)
}

/// Renders conditions as the JSON suffix of a `shall` schema name.
fn condition_tag<T: Serialize>(schema: &str, conditions: &T) -> Result<String, SchemaError> {
    serde_json::to_string(conditions).map_err(|e| SchemaError::Conditions {
        schema: schema.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coerce::Coercion;

    #[test]
    fn test_predicate_single_root_without_refinements() {
        let schema = Schema::define("Plain")
            .template_root(["1.2.3"])
            .without_negation_status()
            .build()
            .unwrap();
        assert_eq!(schema.xpath().unwrap(), ".//h:templateId[@root='1.2.3']/..");
    }

    #[test]
    fn test_predicate_multiple_roots_and_moods() {
        let schema = Schema::define("Moody")
            .template_root(["1.2", "1.2.1"])
            .with_mood(["EVN", "INT"])
            .without_negation_status()
            .build()
            .unwrap();
        assert_eq!(
            schema.xpath().unwrap(),
            "(.//h:templateId[@root='1.2']/.. | .//h:templateId[@root='1.2.1']/..)[@moodCode='EVN' or @moodCode='INT']"
        );
    }

    #[test]
    fn test_predicate_refinement_order() {
        let schema = Schema::define("Refined")
            .template_root(["1"])
            .with_negation_status(true)
            .containing_child_template("2")
            .with_mood(["EVN"])
            .build()
            .unwrap();
        assert_eq!(
            schema.xpath().unwrap(),
            "(((.//h:templateId[@root='1']/..)[@moodCode='EVN'])[.//h:templateId[@root='2']])[@negationInd='true']"
        );
    }

    #[test]
    fn test_negation_false_accepts_absent_flag() {
        let schema = Schema::define("Given").template_root(["1"]).build().unwrap();
        assert_eq!(
            schema.xpath().unwrap(),
            "(.//h:templateId[@root='1']/..)[@negationInd='false'] | (.//h:templateId[@root='1']/..)[not(@negationInd)]"
        );
    }

    #[test]
    fn test_derive_inherits_and_overrides() {
        let parent = Schema::define("Activity")
            .template_root(["1"])
            .with_mood(["EVN"])
            .fields(vec![FieldSpec::new("code", "1..1", "h:code/@code")])
            .uri_builder(UriTemplate::new("entries", "given"))
            .build()
            .unwrap();
        let planned = parent
            .derive("Planned")
            .with_mood(["INT"])
            .uri_builder(UriTemplate::new("entries", "planned"))
            .build()
            .unwrap();

        assert_eq!(planned.template_roots(), &["1".to_string()]);
        assert_eq!(planned.moods(), &["INT".to_string()]);
        assert_eq!(planned.negation_status(), Some(false));
        assert_eq!(planned.fields().len(), 1);
        assert_eq!(planned.uri_template().unwrap().kind, "planned");
        // identity and link steps are registered once, by the parent
        assert_eq!(
            planned.steps(Pass::Structural).len(),
            parent.steps(Pass::Structural).len()
        );
        assert!(planned.is_a("Activity"));
        assert!(!parent.is_a("Planned"));
    }

    #[test]
    fn test_steps_accumulate_along_the_chain() {
        let parent = Schema::define("A")
            .cleanup_step(Pass::Structural, cleanup::drop_field("x"))
            .build()
            .unwrap();
        let child = parent
            .derive("B")
            .cleanup_step(Pass::Structural, cleanup::drop_field("y"))
            .cleanup_step(Pass::Paredown, cleanup::drop_field("z"))
            .build()
            .unwrap();

        assert_eq!(child.steps(Pass::Structural).len(), 2);
        // base contributes hide(sourceIds) and clear_nulls
        assert_eq!(child.steps(Pass::Paredown).len(), 3);
    }

    #[test]
    fn test_fieldless_schema_has_no_predicate() {
        let schema = Schema::define("Quantity")
            .fields(vec![FieldSpec::new("value", "1..1", "@value").coerce(Coercion::Float)])
            .build()
            .unwrap();
        assert_eq!(
            schema.xpath().unwrap_err(),
            SchemaError::NoTemplateRoot {
                schema: "Quantity".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_field_expression_is_fatal() {
        let err = Schema::define("Broken")
            .fields(vec![FieldSpec::new("x", "0..1", "h:code[")])
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidExpression { ref field, .. } if field == "x"));
    }

    #[test]
    fn test_invalid_cardinality_is_fatal() {
        let err = Schema::define("Broken")
            .fields(vec![FieldSpec::new("x", "2..3", "h:code")])
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidCardinality { .. }));
    }

    #[test]
    fn test_shall_names_and_tags() {
        let concept = Schema::define("ConceptDescriptor")
            .fields(vec![FieldSpec::new("code", "0..1", "@code")])
            .build()
            .unwrap();
        let strict = concept
            .shall(Conditions::value_set("2.16.840.1.113883.3.88.12.80.17"))
            .unwrap();

        assert_eq!(
            strict.name(),
            r#"ConceptDescriptor{"valueSetOid":"2.16.840.1.113883.3.88.12.80.17"}"#
        );
        assert_eq!(strict.fields().len(), 1);
        assert!(strict.is_a("ConceptDescriptor"));
        assert_eq!(
            strict.conditions().unwrap().value_set_oid,
            "2.16.840.1.113883.3.88.12.80.17"
        );
    }

    #[test]
    fn test_unserializable_conditions_are_an_error() {
        let mut conditions = std::collections::BTreeMap::new();
        conditions.insert((1, 2), "tuple keys are not JSON object keys");
        let err = condition_tag("ConceptDescriptor", &conditions).unwrap_err();
        assert!(
            matches!(err, SchemaError::Conditions { ref schema, .. } if schema == "ConceptDescriptor")
        );
    }

    #[test]
    fn test_xpath_then_wraps_predicate() {
        let schema = Schema::define("Age")
            .template_root(["4.31"])
            .without_negation_status()
            .build()
            .unwrap();
        assert_eq!(
            schema.xpath_then("h:value").unwrap(),
            "(.//h:templateId[@root='4.31']/..)/h:value"
        );
    }

    #[test]
    fn test_pass_names() {
        assert_eq!(Pass::Structural.to_string(), "1");
        assert_eq!("paredown".parse::<Pass>().unwrap(), Pass::Paredown);
        assert!("2".parse::<Pass>().is_err());
    }
}
