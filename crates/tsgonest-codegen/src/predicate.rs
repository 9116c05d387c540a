//! The `is<T>` lowering: a straight-line boolean expression tree.
//!
//! Object alternatives dispatch to per-record helper functions
//! (`_io<Name>`), which is also how recursive references resolve: the
//! helper calls itself. Unions with an elected discriminant switch on the
//! tag; unions without one try members in declaration order.

use tsgonest_metadata::model::{Atomic, Literal, MapMeta, Metadata, TupleMeta};
use tsgonest_metadata::registry::{ObjectRecord, ObjectRegistry};

use crate::checks::{self, GenArtifacts};
use crate::context::member_access;

/// Sanitized helper function name for an object record.
#[must_use]
pub fn helper_name(prefix: &str, name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{prefix}{safe}")
}

/// Boolean expression checking `val` against `meta`.
#[must_use]
pub fn node_check(
    meta: &Metadata,
    val: &str,
    registry: &ObjectRegistry,
    artifacts: &mut GenArtifacts,
) -> String {
    // `any` admits everything, constraints included.
    if meta.any {
        return "true".to_string();
    }

    let mut alternatives: Vec<String> = Vec::new();
    if meta.nullable {
        alternatives.push(format!("{val} === null"));
    }
    for atomic in &meta.atomics {
        alternatives.push(atomic_check(*atomic, meta, val, artifacts));
    }
    for group in &meta.constants {
        alternatives.push(constants_check(&group.values, val));
    }
    for elem in &meta.arrays {
        alternatives.push(array_check(elem, meta, val, registry, artifacts));
    }
    for tuple in &meta.tuples {
        alternatives.push(tuple_check(tuple, val, registry, artifacts));
    }
    if !meta.objects.is_empty() {
        alternatives.push(objects_check(meta, val, registry, artifacts));
    }
    for map in &meta.maps {
        alternatives.push(map_check(map, val, registry, artifacts));
    }
    if meta.has_function {
        alternatives.push(format!("typeof {val} === \"function\""));
    }

    match alternatives.len() {
        0 => "false".to_string(),
        1 => alternatives.into_iter().next().unwrap_or_default(),
        _ => format!("({})", alternatives.join(" || ")),
    }
}

fn atomic_check(atomic: Atomic, meta: &Metadata, val: &str, artifacts: &mut GenArtifacts) -> String {
    let bag = &meta.constraints;
    match atomic {
        Atomic::Boolean => {
            if bag.coerce {
                format!(
                    "(typeof {val} === \"boolean\" || {val} === \"true\" || {val} === \"false\")"
                )
            } else {
                format!("typeof {val} === \"boolean\"")
            }
        }
        Atomic::BigInt => format!("typeof {val} === \"bigint\""),
        Atomic::Number => {
            let mut parts = vec![
                format!("typeof {val} === \"number\""),
                format!("Number.isFinite({val})"),
            ];
            parts.extend(checks::number_checks(bag, val).into_iter().map(|c| c.expr));
            let plain = parts.join(" && ");
            if bag.coerce {
                // accept the string form of a conforming number
                let coerced: Vec<String> = checks::number_checks(bag, &format!("+{val}"))
                    .into_iter()
                    .map(|c| c.expr)
                    .collect();
                let mut string_side = format!(
                    "typeof {val} === \"string\" && {val} !== \"\" && Number.isFinite(+{val})"
                );
                if !coerced.is_empty() {
                    string_side = format!("{string_side} && {}", coerced.join(" && "));
                }
                format!("(({plain}) || ({string_side}))")
            } else {
                plain
            }
        }
        Atomic::String => {
            let guard = format!("typeof {val} === \"string\"");
            let target = checks::transform_expr(bag, val);
            let constraint_exprs: Vec<String> = match &target {
                // transforms precede validation: constraints run against a
                // transformed copy bound inside an arrow
                Some(transformed) => {
                    let inner: Vec<String> = checks::string_checks(bag, "y", artifacts)
                        .into_iter()
                        .map(|c| c.expr)
                        .collect();
                    if inner.is_empty() {
                        Vec::new()
                    } else {
                        vec![format!("((y) => {})({transformed})", inner.join(" && "))]
                    }
                }
                None => checks::string_checks(bag, val, artifacts)
                    .into_iter()
                    .map(|c| c.expr)
                    .collect(),
            };
            if constraint_exprs.is_empty() {
                guard
            } else {
                format!("{guard} && {}", constraint_exprs.join(" && "))
            }
        }
    }
}

fn constants_check(values: &[Literal], val: &str) -> String {
    let comparisons: Vec<String> = values
        .iter()
        .map(|literal| format!("{val} === {}", literal.js()))
        .collect();
    if comparisons.len() == 1 {
        comparisons.into_iter().next().unwrap_or_default()
    } else {
        format!("({})", comparisons.join(" || "))
    }
}

fn array_check(
    elem: &Metadata,
    meta: &Metadata,
    val: &str,
    registry: &ObjectRegistry,
    artifacts: &mut GenArtifacts,
) -> String {
    let elem_check = node_check(elem, "e", registry, artifacts);
    let mut parts = vec![format!("Array.isArray({val})")];
    if elem_check != "true" {
        parts.push(format!("{val}.every((e) => {elem_check})"));
    }
    parts.extend(
        checks::array_checks(&meta.constraints, val)
            .into_iter()
            .map(|c| c.expr),
    );
    parts.join(" && ")
}

fn tuple_check(
    tuple: &TupleMeta,
    val: &str,
    registry: &ObjectRegistry,
    artifacts: &mut GenArtifacts,
) -> String {
    let arity = tuple.elems.len();
    let mut parts = vec![format!("Array.isArray({val})")];
    match &tuple.rest {
        Some(_) => parts.push(format!("{val}.length >= {arity}")),
        None => parts.push(format!("{val}.length === {arity}")),
    }
    for (index, elem) in tuple.elems.iter().enumerate() {
        let slot = format!("{val}[{index}]");
        let check = node_check(elem, &slot, registry, artifacts);
        if check != "true" {
            parts.push(check);
        }
    }
    if let Some(rest) = &tuple.rest {
        let rest_check = node_check(rest, "e", registry, artifacts);
        if rest_check != "true" {
            parts.push(format!("{val}.slice({arity}).every((e) => {rest_check})"));
        }
    }
    parts.join(" && ")
}

fn objects_check(
    meta: &Metadata,
    val: &str,
    registry: &ObjectRegistry,
    artifacts: &mut GenArtifacts,
) -> String {
    let _ = artifacts;
    if meta.objects.len() == 1 {
        let name = &registry.get(meta.objects[0]).name;
        return format!("{}({val})", helper_name("_io", name));
    }
    match &meta.discriminant {
        Some(discriminant) => {
            // switch on the tag, expressed as a ternary chain
            let access = format!("{val}{}", member_access(&discriminant.field));
            let mut chain = String::new();
            for (literal, object) in &discriminant.mapping {
                let name = &registry.get(*object).name;
                chain.push_str(&format!(
                    "{access} === {} ? {}({val}) : ",
                    literal.js(),
                    helper_name("_io", name)
                ));
            }
            chain.push_str("false");
            format!("(typeof {val} === \"object\" && {val} !== null && ({chain}))")
        }
        None => {
            // no discriminant: members tried in declaration order
            let tries: Vec<String> = meta
                .objects
                .iter()
                .map(|id| format!("{}({val})", helper_name("_io", &registry.get(*id).name)))
                .collect();
            format!("({})", tries.join(" || "))
        }
    }
}

fn map_check(
    map: &MapMeta,
    val: &str,
    registry: &ObjectRegistry,
    artifacts: &mut GenArtifacts,
) -> String {
    let mut parts = vec![format!(
        "typeof {val} === \"object\" && {val} !== null && !Array.isArray({val})"
    )];
    let numeric_keys = map.key.atomics == vec![Atomic::Number];
    let value_check = node_check(&map.value, &format!("{val}[k]"), registry, artifacts);
    let mut body = Vec::new();
    if numeric_keys {
        body.push("!Number.isNaN(Number(k))".to_string());
    }
    if value_check != "true" {
        body.push(value_check);
    }
    if !body.is_empty() {
        parts.push(format!("Object.keys({val}).every((k) => {})", body.join(" && ")));
    }
    parts.join(" && ")
}

/// The full `is` body for one object record: shape guard plus per-property
/// checks in declaration order.
#[must_use]
pub fn object_helper_body(
    record: &ObjectRecord,
    registry: &ObjectRegistry,
    artifacts: &mut GenArtifacts,
) -> String {
    let mut parts = vec!["typeof v === \"object\" && v !== null && !Array.isArray(v)".to_string()];
    for property in &record.properties {
        let access = format!("v{}", member_access(&property.name));
        let value_check = node_check(&property.value, &access, registry, artifacts);
        if property.optional || !property.value.is_required {
            if value_check != "true" {
                parts.push(format!("({access} === undefined || {value_check})"));
            }
        } else {
            parts.push(format!("{access} !== undefined"));
            if value_check != "true" {
                parts.push(value_check);
            }
        }
    }
    if let Some(index) = &record.index_signature {
        let declared: Vec<String> = record
            .properties
            .iter()
            .map(|p| format!("\"{}\"", crate::writer::escape_js(&p.name)))
            .collect();
        let value_check = node_check(&index.value, "v[k]", registry, artifacts);
        if value_check != "true" {
            let skip = if declared.is_empty() {
                String::new()
            } else {
                format!("[{}].includes(k) || ", declared.join(", "))
            };
            parts.push(format!("Object.keys(v).every((k) => {skip}{value_check})"));
        }
    }
    parts.join(" && ")
}

/// Human-readable description of the type a node expects, used as the
/// `expected` field of error records.
#[must_use]
pub fn expected_desc(meta: &Metadata, registry: &ObjectRegistry) -> String {
    if meta.any {
        return "any".to_string();
    }
    let mut parts: Vec<String> = Vec::new();
    for atomic in &meta.atomics {
        parts.push(atomic.type_of().to_string());
    }
    for group in &meta.constants {
        for value in &group.values {
            parts.push(value.js().replace('"', "'"));
        }
    }
    for elem in &meta.arrays {
        parts.push(format!("{}[]", expected_desc(elem, registry)));
    }
    for _ in &meta.tuples {
        parts.push("tuple".to_string());
    }
    for id in &meta.objects {
        parts.push(registry.get(*id).name.clone());
    }
    for _ in &meta.maps {
        parts.push("record".to_string());
    }
    if meta.has_function {
        parts.push("function".to_string());
    }
    if meta.nullable {
        parts.push("null".to_string());
    }
    if parts.is_empty() {
        "never".to_string()
    } else {
        parts.join(" | ")
    }
}
