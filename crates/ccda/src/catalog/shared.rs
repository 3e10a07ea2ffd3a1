//! Datatype schemas shared by every section.

use std::sync::Arc;

use crate::cleanup;
use crate::coerce::Coercion;
use crate::error::SchemaError;
use crate::field::FieldSpec;
use crate::schema::{Conditions, Pass, Schema};

pub struct Shared {
    /// A coded value: `{code, label, codeSystem, codeSystemName, nullFlavor}`.
    pub concept_descriptor: Arc<Schema>,
    /// A coded value collapsed to its label, or its code when unlabeled.
    pub simplified_code: Arc<Schema>,
    /// An `II`: `{root, extension}`.
    pub identifier: Arc<Schema>,
    pub text_with_reference: Arc<Schema>,
    /// A `PQ`: `{value, unit}`.
    pub physical_quantity: Arc<Schema>,
    pub effective_time: Arc<Schema>,
    simple_code: Arc<Schema>,
}

impl Shared {
    pub fn build() -> Result<Self, SchemaError> {
        let concept_descriptor = Schema::define("ConceptDescriptor")
            .fields(vec![
                FieldSpec::new("code", "0..1", "@code"),
                FieldSpec::new("label", "0..1", "@displayName"),
                FieldSpec::new("codeSystem", "0..1", "@codeSystem"),
                FieldSpec::new("codeSystemName", "0..1", "@codeSystemName"),
                FieldSpec::new("nullFlavor", "0..1", "@nullFlavor"),
            ])
            .build()?;

        let simplified_code = concept_descriptor
            .derive("SimplifiedCode")
            .cleanup_step(Pass::Structural, cleanup::simplify_code())
            .build()?;

        let identifier = Schema::define("Identifier")
            .fields(vec![
                FieldSpec::new("root", "0..1", "@root"),
                FieldSpec::new("extension", "0..1", "@extension"),
            ])
            .build()?;

        let text_with_reference = Schema::define("TextWithReference")
            .fields(vec![
                FieldSpec::new("reference", "0..1", "h:reference/@value"),
                FieldSpec::new("text", "0..1", "."),
            ])
            .cleanup_step(Pass::Structural, cleanup::resolve_text_reference())
            .build()?;

        let physical_quantity = Schema::define("PhysicalQuantity")
            .fields(vec![
                FieldSpec::new("value", "1..1", "@value").coerce(Coercion::Float),
                FieldSpec::new("unit", "0..1", "@unit"),
            ])
            .build()?;

        let effective_time = Schema::define("EffectiveTime")
            .fields(vec![
                FieldSpec::new("point", "0..1", "@value").coerce(Coercion::Timestamp),
                FieldSpec::new("pointResolution", "0..1", "@value")
                    .coerce(Coercion::TimestampResolution),
                FieldSpec::new("low", "0..1", "h:low/@value").coerce(Coercion::Timestamp),
                FieldSpec::new("lowResolution", "0..1", "h:low/@value")
                    .coerce(Coercion::TimestampResolution),
                FieldSpec::new("high", "0..1", "h:high/@value").coerce(Coercion::Timestamp),
                FieldSpec::new("highResolution", "0..1", "h:high/@value")
                    .coerce(Coercion::TimestampResolution),
                FieldSpec::new("operator", "0..1", "./@operator"),
                FieldSpec::new("xsitype", "0..1", "./@xsi:type"),
                FieldSpec::new("period", "0..1", "./h:period").nested(&physical_quantity),
            ])
            .cleanup_step(Pass::Paredown, cleanup::drop_field("xsitype"))
            .build()?;

        // A bare code whose allowed values come from a value set.
        let simple_code = Schema::define("SimpleCode").build()?;

        Ok(Self {
            concept_descriptor,
            simplified_code,
            identifier,
            text_with_reference,
            physical_quantity,
            effective_time,
            simple_code,
        })
    }

    /// A plain code constrained to the value set `oid`.
    pub fn simple_code(&self, oid: &str) -> Result<Arc<Schema>, SchemaError> {
        self.simple_code.shall(Conditions::value_set(oid))
    }
}
