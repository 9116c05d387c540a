//! Projection of `Metadata` into JSON Schema fragments.
//!
//! One projection serves two consumers: the `schema<T>` companion export
//! and `components.schemas` of the OpenAPI document, so the two stay
//! equivalent by construction. Named objects always project to `$ref`s;
//! only the registry owner decides when to inline the full record.

use serde_json::{Map, Value, json};

use crate::constraints::ConstraintBag;
use crate::model::{Atomic, Metadata, TupleMeta};
use crate::registry::{ObjectId, ObjectRegistry};

/// Prefix of the shared schema namespace.
pub const REF_PREFIX: &str = "#/components/schemas/";

pub struct SchemaBuilder<'a> {
    registry: &'a ObjectRegistry,
}

impl<'a> SchemaBuilder<'a> {
    #[must_use]
    pub fn new(registry: &'a ObjectRegistry) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &'a ObjectRegistry {
        self.registry
    }

    /// Schema for one metadata node. Object alternatives become `$ref`s.
    #[must_use]
    pub fn node_schema(&self, meta: &Metadata) -> Value {
        let mut alternatives: Vec<Value> = Vec::new();

        for atomic in &meta.atomics {
            alternatives.push(self.atomic_schema(*atomic, &meta.constraints));
        }
        for group in &meta.constants {
            let mut schema = Map::new();
            schema.insert(
                "type".to_string(),
                Value::String(atomic_type_name(group.atomic).to_string()),
            );
            let values: Vec<Value> = group.values.iter().map(|v| v.to_json()).collect();
            schema.insert("enum".to_string(), Value::Array(values));
            alternatives.push(Value::Object(schema));
        }
        for elem in &meta.arrays {
            alternatives.push(self.array_schema(elem, &meta.constraints));
        }
        for tuple in &meta.tuples {
            alternatives.push(self.tuple_schema(tuple));
        }
        for &id in &meta.objects {
            alternatives.push(self.reference(id));
        }
        for map in &meta.maps {
            alternatives.push(json!({
                "type": "object",
                "additionalProperties": self.node_schema(&map.value),
            }));
        }
        if meta.any {
            alternatives.push(json!({}));
        }

        if meta.nullable {
            alternatives.push(json!({ "type": "null" }));
        }

        let mut schema = match alternatives.len() {
            0 => json!({}),
            1 => alternatives.into_iter().next().unwrap_or_default(),
            _ => {
                let mut composed = Map::new();
                composed.insert("oneOf".to_string(), Value::Array(alternatives));
                if let Some(discriminant) = &meta.discriminant {
                    composed.insert(
                        "discriminator".to_string(),
                        json!({ "propertyName": discriminant.field }),
                    );
                }
                Value::Object(composed)
            }
        };

        if let Some(default) = &meta.constraints.default {
            if let Value::Object(object) = &mut schema {
                object.insert("default".to_string(), default.clone());
            }
        }
        schema
    }

    /// The full schema of one registry record.
    #[must_use]
    pub fn object_schema(&self, id: ObjectId) -> Value {
        let record = self.registry.get(id);
        let mut properties = Map::new();
        let mut required = Vec::new();
        for property in &record.properties {
            let mut schema = self.node_schema(&property.value);
            if let Some(doc) = &property.doc {
                if let Value::Object(object) = &mut schema {
                    object.insert("description".to_string(), json!(doc));
                }
            }
            properties.insert(property.name.clone(), schema);
            if !property.optional && property.value.is_required {
                required.push(Value::String(property.name.clone()));
            }
        }

        let mut schema = Map::new();
        schema.insert("type".to_string(), json!("object"));
        if !properties.is_empty() {
            schema.insert("properties".to_string(), Value::Object(properties));
        }
        if !required.is_empty() {
            schema.insert("required".to_string(), Value::Array(required));
        }
        if let Some(index) = &record.index_signature {
            schema.insert(
                "additionalProperties".to_string(),
                self.node_schema(&index.value),
            );
        }
        Value::Object(schema)
    }

    /// `$ref` to a named record.
    #[must_use]
    pub fn reference(&self, id: ObjectId) -> Value {
        json!({ "$ref": format!("{REF_PREFIX}{}", self.registry.get(id).name) })
    }

    fn atomic_schema(&self, atomic: Atomic, constraints: &ConstraintBag) -> Value {
        let mut schema = Map::new();
        match atomic {
            Atomic::Boolean => {
                schema.insert("type".to_string(), json!("boolean"));
            }
            Atomic::BigInt => {
                schema.insert("type".to_string(), json!("integer"));
                schema.insert("format".to_string(), json!("int64"));
            }
            Atomic::Number => {
                let integer = constraints
                    .numeric_kind
                    .is_some_and(super::constraints::NumericKind::is_integer);
                schema.insert(
                    "type".to_string(),
                    json!(if integer { "integer" } else { "number" }),
                );
                if let Some(kind) = constraints.numeric_kind {
                    schema.insert("format".to_string(), json!(kind.format_name()));
                }
                apply_number_bounds(&mut schema, constraints);
            }
            Atomic::String => {
                schema.insert("type".to_string(), json!("string"));
                if let Some(format) = &constraints.format {
                    schema.insert("format".to_string(), json!(format));
                }
                if let Some(pattern) = &constraints.pattern {
                    schema.insert("pattern".to_string(), json!(pattern));
                }
                if let Some(min) = constraints.min_length {
                    schema.insert("minLength".to_string(), json!(min));
                }
                if let Some(max) = constraints.max_length {
                    schema.insert("maxLength".to_string(), json!(max));
                }
            }
        }
        Value::Object(schema)
    }

    fn array_schema(&self, elem: &Metadata, constraints: &ConstraintBag) -> Value {
        let mut schema = Map::new();
        schema.insert("type".to_string(), json!("array"));
        schema.insert("items".to_string(), self.node_schema(elem));
        if let Some(min) = constraints.min_items {
            schema.insert("minItems".to_string(), json!(min));
        }
        if let Some(max) = constraints.max_items {
            schema.insert("maxItems".to_string(), json!(max));
        }
        if constraints.unique_items {
            schema.insert("uniqueItems".to_string(), json!(true));
        }
        Value::Object(schema)
    }

    fn tuple_schema(&self, tuple: &TupleMeta) -> Value {
        let prefix: Vec<Value> = tuple.elems.iter().map(|e| self.node_schema(e)).collect();
        let mut schema = Map::new();
        schema.insert("type".to_string(), json!("array"));
        schema.insert("prefixItems".to_string(), Value::Array(prefix));
        match &tuple.rest {
            Some(rest) => {
                schema.insert("items".to_string(), self.node_schema(rest));
            }
            None => {
                schema.insert("items".to_string(), json!(false));
            }
        }
        Value::Object(schema)
    }
}

fn apply_number_bounds(schema: &mut Map<String, Value>, constraints: &ConstraintBag) {
    if let Some(min) = constraints.minimum {
        schema.insert("minimum".to_string(), json!(min));
    }
    if let Some(max) = constraints.maximum {
        schema.insert("maximum".to_string(), json!(max));
    }
    if let Some(min) = constraints.exclusive_minimum {
        schema.insert("exclusiveMinimum".to_string(), json!(min));
    }
    if let Some(max) = constraints.exclusive_maximum {
        schema.insert("exclusiveMaximum".to_string(), json!(max));
    }
    if let Some(multiple) = constraints.multiple_of {
        schema.insert("multipleOf".to_string(), json!(multiple));
    }
}

fn atomic_type_name(atomic: Atomic) -> &'static str {
    match atomic {
        Atomic::Boolean => "boolean",
        Atomic::BigInt => "integer",
        Atomic::Number => "number",
        Atomic::String => "string",
    }
}
