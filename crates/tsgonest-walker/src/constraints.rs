//! Constraint extraction.
//!
//! Two surface syntaxes fill the same `ConstraintBag`:
//!
//! - JSDoc tags on a property (`@format email`, `@minLength 1`, ...)
//! - phantom properties on an intersection member (`__tsgonest_minLength`
//!   with a literal value, or the legacy `"typia.tag"` carrier object)
//!
//! New constraint kinds extend the bag, not the walker.

use tsgonest_common::diagnostics::{DiagnosticKind, DiagnosticSink};
use tsgonest_common::loc::Loc;
use tsgonest_host::types::{HostObject, HostType, TypeTable};
use tsgonest_host::ast::JsDocTag;
use tsgonest_metadata::constraints::{ConstraintBag, NumericKind, Transform};
use tsgonest_metadata::model::Literal;

/// Prefix of first-party phantom constraint properties.
const PHANTOM_PREFIX: &str = "__tsgonest_";

/// Property name of the legacy carrier object.
const LEGACY_TAG: &str = "typia.tag";

/// Strip the phantom prefix, if this property name is a constraint carrier.
#[must_use]
pub fn phantom_kind(property_name: &str) -> Option<&str> {
    property_name.strip_prefix(PHANTOM_PREFIX)
}

/// Whether an object type exists only to carry constraints: every property
/// is a phantom carrier (and there is at least one).
#[must_use]
pub fn is_phantom_object(obj: &HostObject) -> bool {
    !obj.properties.is_empty()
        && obj
            .properties
            .iter()
            .all(|p| phantom_kind(&p.name).is_some() || p.name == LEGACY_TAG)
}

/// Fold a phantom object's properties into `bag`.
pub fn apply_phantom_object(
    bag: &mut ConstraintBag,
    obj: &HostObject,
    table: &TypeTable,
    sink: &mut DiagnosticSink,
    file: &str,
) {
    for property in &obj.properties {
        if property.name == LEGACY_TAG {
            // Legacy form: the value is an object with `kind` and `value`
            // literal properties.
            if let HostType::Object(carrier) = table.get(property.ty) {
                let kind = carrier
                    .properties
                    .iter()
                    .find(|p| p.name == "kind")
                    .and_then(|p| literal_of(table, p.ty))
                    .and_then(|l| match l {
                        Literal::String(s) => Some(s),
                        _ => None,
                    });
                let value = carrier
                    .properties
                    .iter()
                    .find(|p| p.name == "value")
                    .and_then(|p| literal_of(table, p.ty));
                if let (Some(kind), Some(value)) = (kind, value) {
                    apply_kind(bag, &kind, &value, sink, file, property.loc);
                }
            }
            continue;
        }
        if let Some(kind) = phantom_kind(&property.name) {
            if let Some(value) = literal_of(table, property.ty) {
                apply_kind(bag, kind, &value, sink, file, property.loc);
            }
        }
    }
}

fn literal_of(table: &TypeTable, ty: tsgonest_host::types::TypeId) -> Option<Literal> {
    match table.get(ty) {
        HostType::StringLiteral(s) => Some(Literal::String(s.clone())),
        HostType::NumberLiteral(n) => Some(Literal::Number(*n)),
        HostType::BooleanLiteral(b) => Some(Literal::Boolean(*b)),
        // a bare `true` literal is the conventional marker value
        HostType::Boolean => Some(Literal::Boolean(true)),
        _ => None,
    }
}

/// Apply one `<kind> = value` pair to the bag. Shared by both syntaxes.
pub fn apply_kind(
    bag: &mut ConstraintBag,
    kind: &str,
    value: &Literal,
    sink: &mut DiagnosticSink,
    file: &str,
    loc: Loc,
) {
    // `<kind>_error` carries a per-constraint message.
    if let Some(target) = kind.strip_suffix("_error") {
        if let Literal::String(message) = value {
            bag.errors.insert(target.to_string(), message.clone());
        }
        return;
    }
    match kind {
        "format" => bag.format = string_value(value),
        "minLength" => bag.min_length = unsigned_value(value),
        "maxLength" => bag.max_length = unsigned_value(value),
        "pattern" => {
            if let Some(pattern) = string_value(value) {
                set_pattern(bag, &pattern, sink, file, loc);
            }
        }
        "startsWith" => bag.starts_with = string_value(value),
        "endsWith" => bag.ends_with = string_value(value),
        "includes" => bag.includes = string_value(value),
        "minimum" => bag.minimum = number_value(value),
        "maximum" => bag.maximum = number_value(value),
        "exclusiveMinimum" => bag.exclusive_minimum = number_value(value),
        "exclusiveMaximum" => bag.exclusive_maximum = number_value(value),
        "multipleOf" => bag.multiple_of = number_value(value),
        "type" => {
            if let Some(name) = string_value(value) {
                match NumericKind::parse(&name) {
                    Some(numeric) => bag.numeric_kind = Some(numeric),
                    None => sink.report(
                        DiagnosticKind::ConstraintInvalid,
                        file,
                        loc,
                        format!("unknown numeric kind '{name}'"),
                    ),
                }
            }
        }
        "minItems" => bag.min_items = unsigned_value(value),
        "maxItems" => bag.max_items = unsigned_value(value),
        "uniqueItems" => bag.unique_items = bool_value(value),
        "uppercase" => bag.uppercase = bool_value(value),
        "lowercase" => bag.lowercase = bool_value(value),
        "coerce" => bag.coerce = bool_value(value),
        "transform_trim" => bag.add_transform(Transform::Trim),
        "transform_toLowerCase" => bag.add_transform(Transform::ToLowerCase),
        "transform_toUpperCase" => bag.add_transform(Transform::ToUpperCase),
        "validate" => bag.validate_fn = string_value(value),
        "default" => bag.default = Some(value.to_json()),
        "error" => bag.error = string_value(value),
        other => sink.report(
            DiagnosticKind::ConstraintInvalid,
            file,
            loc,
            format!("unrecognized constraint kind '{other}'"),
        ),
    }
}

/// Build a bag from the JSDoc tags of a property.
#[must_use]
pub fn bag_from_jsdoc(
    tags: &[JsDocTag],
    sink: &mut DiagnosticSink,
    file: &str,
    loc: Loc,
) -> ConstraintBag {
    let mut bag = ConstraintBag::default();
    for tag in tags {
        let text = tag.text.as_deref().map(str::trim).unwrap_or("");
        match tag.name.as_str() {
            "format" => bag.format = non_empty(text),
            "minLength" => parse_unsigned(&mut bag.min_length, text, &tag.name, sink, file, loc),
            "maxLength" => parse_unsigned(&mut bag.max_length, text, &tag.name, sink, file, loc),
            "pattern" => set_pattern(&mut bag, text, sink, file, loc),
            "minimum" => parse_number(&mut bag.minimum, text, &tag.name, sink, file, loc),
            "maximum" => parse_number(&mut bag.maximum, text, &tag.name, sink, file, loc),
            "exclusiveMinimum" => {
                parse_number(&mut bag.exclusive_minimum, text, &tag.name, sink, file, loc);
            }
            "exclusiveMaximum" => {
                parse_number(&mut bag.exclusive_maximum, text, &tag.name, sink, file, loc);
            }
            "multipleOf" => parse_number(&mut bag.multiple_of, text, &tag.name, sink, file, loc),
            "minItems" => parse_unsigned(&mut bag.min_items, text, &tag.name, sink, file, loc),
            "maxItems" => parse_unsigned(&mut bag.max_items, text, &tag.name, sink, file, loc),
            "uniqueItems" => bag.unique_items = true,
            "default" => {
                bag.default = serde_json::from_str(text)
                    .ok()
                    .or_else(|| Some(serde_json::Value::String(text.to_string())));
            }
            // not constraints: @deprecated, @summary, descriptions, ...
            _ => {}
        }
    }
    bag
}

/// Validate and store a pattern. An uncompilable pattern is dropped with a
/// warning; the field still validates type-only.
fn set_pattern(bag: &mut ConstraintBag, pattern: &str, sink: &mut DiagnosticSink, file: &str, loc: Loc) {
    if pattern.is_empty() {
        return;
    }
    match regex::Regex::new(pattern) {
        Ok(_) => bag.pattern = Some(pattern.to_string()),
        Err(e) => sink.report(
            DiagnosticKind::ConstraintInvalid,
            file,
            loc,
            format!("pattern '{pattern}' failed to compile and was dropped: {e}"),
        ),
    }
}

fn parse_unsigned(
    slot: &mut Option<u64>,
    text: &str,
    tag: &str,
    sink: &mut DiagnosticSink,
    file: &str,
    loc: Loc,
) {
    match text.parse::<u64>() {
        Ok(n) => *slot = Some(n),
        Err(_) => sink.report(
            DiagnosticKind::ConstraintInvalid,
            file,
            loc,
            format!("@{tag} expects a non-negative integer, got '{text}'"),
        ),
    }
}

fn parse_number(
    slot: &mut Option<f64>,
    text: &str,
    tag: &str,
    sink: &mut DiagnosticSink,
    file: &str,
    loc: Loc,
) {
    match text.parse::<f64>() {
        Ok(n) => *slot = Some(n),
        Err(_) => sink.report(
            DiagnosticKind::ConstraintInvalid,
            file,
            loc,
            format!("@{tag} expects a number, got '{text}'"),
        ),
    }
}

fn non_empty(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn string_value(value: &Literal) -> Option<String> {
    match value {
        Literal::String(s) => Some(s.clone()),
        _ => None,
    }
}

fn number_value(value: &Literal) -> Option<f64> {
    match value {
        Literal::Number(n) => Some(*n),
        _ => None,
    }
}

fn unsigned_value(value: &Literal) -> Option<u64> {
    match value {
        Literal::Number(n) if *n >= 0.0 && n.fract() == 0.0 => Some(*n as u64),
        _ => None,
    }
}

fn bool_value(value: &Literal) -> bool {
    matches!(value, Literal::Boolean(true))
}
