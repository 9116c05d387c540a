//! The `validate<T>` lowering: identical structure to `is<T>`, but every
//! check pushes `{path, expected, received}` on a shared error buffer.
//! Paths are JSON pointers built incrementally; per-constraint messages
//! override the node-level fallback.

use tsgonest_metadata::model::{Atomic, Metadata};
use tsgonest_metadata::registry::{ObjectRecord, ObjectRegistry};

use crate::checks::{self, Check, GenArtifacts};
use crate::context::{EmitContext, member_access};
use crate::predicate::{self, expected_desc, helper_name};
use crate::writer::{CodeWriter, escape_js};

/// Render an `e.push({...})` statement.
fn push_error(path: &str, expected: &str, received: &str, message: Option<&str>) -> String {
    let mut body = format!(
        "e.push({{ path: {path}, expected: \"{}\", received: {received}",
        escape_js(expected)
    );
    if let Some(message) = message {
        body.push_str(&format!(", message: \"{}\"", escape_js(message)));
    }
    body.push_str(" });");
    body
}

/// Emit statements validating one node at `ctx`.
pub fn emit_node(
    w: &mut CodeWriter,
    meta: &Metadata,
    ctx: &EmitContext,
    registry: &ObjectRegistry,
    artifacts: &mut GenArtifacts,
) {
    if meta.any {
        return;
    }
    if meta.nullable {
        w.open(&format!("if ({} !== null)", ctx.val));
        emit_non_null(w, meta, ctx, registry, artifacts);
        w.close();
    } else {
        emit_non_null(w, meta, ctx, registry, artifacts);
    }
}

fn emit_non_null(
    w: &mut CodeWriter,
    meta: &Metadata,
    ctx: &EmitContext,
    registry: &ObjectRegistry,
    artifacts: &mut GenArtifacts,
) {
    let alternatives = meta.alternative_count();
    if alternatives == 0 {
        return;
    }

    // a pure constants node is a strict-equality membership test, no
    // matter how many literals the union carried
    if only_constants(meta) {
        let comparisons: Vec<String> = meta
            .constants
            .iter()
            .flat_map(|g| g.values.iter())
            .map(|l| format!("{} === {}", ctx.val, l.js()))
            .collect();
        let expected = expected_desc(meta, registry);
        w.line(&format!(
            "if (!({})) {}",
            comparisons.join(" || "),
            push_error(
                &ctx.path,
                &expected,
                &format!("_t({})", ctx.val),
                meta.constraints.message_for("enum"),
            )
        ));
        return;
    }

    // exactly one structural alternative gets the detailed lowering
    if alternatives == 1 {
        if let Some(atomic) = meta.atomics.first() {
            emit_atomic(w, *atomic, meta, ctx, artifacts);
            return;
        }
        if let Some(elem) = meta.arrays.first() {
            emit_array(w, elem, meta, ctx, registry, artifacts);
            return;
        }
        if let Some(tuple) = meta.tuples.first() {
            emit_tuple(w, tuple, meta, ctx, registry, artifacts);
            return;
        }
        if meta.objects.len() == 1 {
            let name = &registry.get(meta.objects[0]).name;
            w.line(&format!(
                "{}({}, {}, e);",
                helper_name("_vo", name),
                ctx.val,
                ctx.path
            ));
            return;
        }
        if let Some(map) = meta.maps.first() {
            emit_map(w, map, ctx, registry, artifacts);
            return;
        }
        // lone function alternative
        if meta.has_function {
            w.line(&format!(
                "if (typeof {} !== \"function\") {}",
                ctx.val,
                push_error(&ctx.path, "function", &format!("_t({})", ctx.val), None)
            ));
            return;
        }
    }

    // discriminated object unions switch on the tag
    if meta.objects.len() >= 2
        && meta.discriminant.is_some()
        && alternatives == meta.objects.len()
    {
        emit_discriminated(w, meta, ctx, registry);
        return;
    }

    // remaining unions: one coarse membership check
    let check = predicate::node_check(meta, &ctx.val, registry, artifacts);
    let expected = expected_desc(meta, registry);
    w.line(&format!(
        "if (!({check})) {}",
        push_error(
            &ctx.path,
            &expected,
            &format!("_t({})", ctx.val),
            meta.constraints.error.as_deref(),
        )
    ));
}

fn emit_checks(w: &mut CodeWriter, checks: &[Check], meta: &Metadata, ctx: &EmitContext, val: &str) {
    for check in checks {
        let message = meta.constraints.message_for(&check.kind);
        w.line(&format!(
            "if (!({})) {}",
            check.expr,
            push_error(&ctx.path, &check.expected, &format!("_t({val})"), message)
        ));
    }
}

fn emit_atomic(
    w: &mut CodeWriter,
    atomic: Atomic,
    meta: &Metadata,
    ctx: &EmitContext,
    artifacts: &mut GenArtifacts,
) {
    let bag = &meta.constraints;
    match atomic {
        Atomic::Boolean | Atomic::BigInt => {
            let expected = atomic.type_of();
            w.line(&format!(
                "if (typeof {} !== \"{expected}\") {}",
                ctx.val,
                push_error(
                    &ctx.path,
                    expected,
                    &format!("_t({})", ctx.val),
                    bag.message_for("type"),
                )
            ));
        }
        Atomic::Number => {
            w.open(&format!(
                "if (typeof {v} !== \"number\" || !Number.isFinite({v}))",
                v = ctx.val
            ));
            w.line(&push_error(
                &ctx.path,
                "number",
                &format!("_t({})", ctx.val),
                bag.message_for("type"),
            ));
            let number_checks = checks::number_checks(bag, &ctx.val);
            if number_checks.is_empty() {
                w.close();
            } else {
                w.close_open("else");
                emit_checks(w, &number_checks, meta, ctx, &ctx.val);
                w.close();
            }
        }
        Atomic::String => {
            // transforms run on a mutable copy before any check
            let (target, declared) = match checks::transform_expr(bag, &ctx.val) {
                Some(_) => {
                    let tmp = ctx.tmp_var();
                    w.line(&format!("let {tmp} = {};", ctx.val));
                    let chained = checks::transform_expr(bag, &tmp)
                        .unwrap_or_else(|| tmp.clone());
                    w.line(&format!(
                        "if (typeof {tmp} === \"string\") {tmp} = {chained};"
                    ));
                    (tmp, true)
                }
                None => (ctx.val.clone(), false),
            };
            w.open(&format!("if (typeof {target} !== \"string\")"));
            w.line(&push_error(
                &ctx.path,
                "string",
                &format!("_t({target})"),
                bag.message_for("type"),
            ));
            let string_checks = checks::string_checks(bag, &target, artifacts);
            if string_checks.is_empty() {
                w.close();
            } else {
                w.close_open("else");
                let target_ctx = if declared { ctx.rebased(&target) } else { ctx.clone() };
                emit_checks(w, &string_checks, meta, &target_ctx, &target);
                w.close();
            }
        }
    }
}

fn emit_array(
    w: &mut CodeWriter,
    elem: &Metadata,
    meta: &Metadata,
    ctx: &EmitContext,
    registry: &ObjectRegistry,
    artifacts: &mut GenArtifacts,
) {
    w.open(&format!("if (!Array.isArray({}))", ctx.val));
    w.line(&push_error(
        &ctx.path,
        &expected_desc(meta, registry),
        &format!("_t({})", ctx.val),
        meta.constraints.message_for("type"),
    ));
    w.close_open("else");
    emit_checks(
        w,
        &checks::array_checks(&meta.constraints, &ctx.val),
        meta,
        ctx,
        &ctx.val,
    );
    let idx = ctx.idx_var();
    w.open(&format!(
        "for (let {idx} = 0; {idx} < {}.length; {idx}++)",
        ctx.val
    ));
    let elem_ctx = ctx.element(&idx);
    emit_node(w, elem, &elem_ctx, registry, artifacts);
    w.close();
    w.close();
}

fn emit_tuple(
    w: &mut CodeWriter,
    tuple: &tsgonest_metadata::model::TupleMeta,
    meta: &Metadata,
    ctx: &EmitContext,
    registry: &ObjectRegistry,
    artifacts: &mut GenArtifacts,
) {
    let arity = tuple.elems.len();
    let length_test = match tuple.rest {
        Some(_) => format!("{}.length >= {arity}", ctx.val),
        None => format!("{}.length === {arity}", ctx.val),
    };
    w.open(&format!(
        "if (!Array.isArray({v}) || !({length_test}))",
        v = ctx.val
    ));
    w.line(&push_error(
        &ctx.path,
        &format!("tuple of {arity}"),
        &format!("_t({})", ctx.val),
        meta.constraints.message_for("type"),
    ));
    w.close_open("else");
    for (index, elem) in tuple.elems.iter().enumerate() {
        let slot_ctx = ctx.tuple_slot(index);
        emit_node(w, elem, &slot_ctx, registry, artifacts);
    }
    if let Some(rest) = &tuple.rest {
        let idx = ctx.idx_var();
        w.open(&format!(
            "for (let {idx} = {arity}; {idx} < {}.length; {idx}++)",
            ctx.val
        ));
        let elem_ctx = ctx.element(&idx);
        emit_node(w, rest, &elem_ctx, registry, artifacts);
        w.close();
    }
    w.close();
}

fn emit_map(
    w: &mut CodeWriter,
    map: &tsgonest_metadata::model::MapMeta,
    ctx: &EmitContext,
    registry: &ObjectRegistry,
    artifacts: &mut GenArtifacts,
) {
    w.open(&format!(
        "if (typeof {v} !== \"object\" || {v} === null || Array.isArray({v}))",
        v = ctx.val
    ));
    w.line(&push_error(
        &ctx.path,
        "record",
        &format!("_t({})", ctx.val),
        None,
    ));
    w.close_open("else");
    let key = ctx.key_var();
    w.open(&format!("for (const {key} of Object.keys({}))", ctx.val));
    if map.key.atomics == vec![Atomic::Number] {
        w.line(&format!(
            "if (Number.isNaN(Number({key}))) {}",
            push_error(
                &format!("{} + \"/\" + {key}", ctx.path),
                "numeric key",
                &format!("_t({key})"),
                None,
            )
        ));
    }
    let value_ctx = ctx.map_value(&key);
    emit_node(w, &map.value, &value_ctx, registry, artifacts);
    w.close();
    w.close();
}

fn emit_discriminated(
    w: &mut CodeWriter,
    meta: &Metadata,
    ctx: &EmitContext,
    registry: &ObjectRegistry,
) {
    let discriminant = meta
        .discriminant
        .as_ref()
        .expect("caller checked discriminant presence");
    w.open(&format!(
        "if (typeof {v} !== \"object\" || {v} === null)",
        v = ctx.val
    ));
    w.line(&push_error(
        &ctx.path,
        &expected_desc(meta, registry),
        &format!("_t({})", ctx.val),
        meta.constraints.error.as_deref(),
    ));
    w.close_open(&format!(
        "else switch ({}{})",
        ctx.val,
        member_access(&discriminant.field)
    ));
    for (literal, object) in &discriminant.mapping {
        w.line(&format!("case {}:", literal.js()));
        let name = &registry.get(*object).name;
        w.line(&format!(
            "  {}({}, {}, e);",
            helper_name("_vo", name),
            ctx.val,
            ctx.path
        ));
        w.line("  break;");
    }
    w.line("default:");
    let tags: Vec<String> = discriminant
        .mapping
        .iter()
        .map(|(l, _)| l.js().replace('"', "'"))
        .collect();
    let tag_access = format!("{}{}", ctx.val, member_access(&discriminant.field));
    let tag_path = format!(
        "{} + \"/{}\"",
        ctx.path,
        crate::writer::escape_pointer(&discriminant.field)
    );
    w.line(&format!(
        "  {}",
        push_error(&tag_path, &tags.join(" | "), &format!("_t({tag_access})"), None)
    ));
    w.close();
}

/// A node whose only populated alternatives are literal constants.
fn only_constants(meta: &Metadata) -> bool {
    !meta.constants.is_empty()
        && meta.atomics.is_empty()
        && meta.arrays.is_empty()
        && meta.tuples.is_empty()
        && meta.objects.is_empty()
        && meta.maps.is_empty()
        && !meta.has_function
}

/// Emit the `_vo<Name>` helper for one object record.
pub fn emit_object_helper(
    w: &mut CodeWriter,
    record: &ObjectRecord,
    registry: &ObjectRegistry,
    artifacts: &mut GenArtifacts,
) {
    w.open(&format!(
        "function {}(v, p, e)",
        helper_name("_vo", &record.name)
    ));
    w.open("if (typeof v !== \"object\" || v === null || Array.isArray(v))");
    w.line(&push_error(
        "p",
        &record.name,
        "_t(v)",
        None,
    ));
    w.line("return;");
    w.close();

    let ctx = EmitContext::helper();
    for property in &record.properties {
        let prop_ctx = ctx.property(&property.name);
        if property.optional || !property.value.is_required {
            w.open(&format!("if ({} !== undefined)", prop_ctx.val));
            emit_node(w, &property.value, &prop_ctx, registry, artifacts);
            w.close();
        } else {
            w.open(&format!("if ({} === undefined)", prop_ctx.val));
            w.line(&push_error(
                &prop_ctx.path,
                &expected_desc(&property.value, registry),
                "\"undefined\"",
                property.value.constraints.message_for("required"),
            ));
            w.close_open("else");
            emit_node(w, &property.value, &prop_ctx, registry, artifacts);
            w.close();
        }
    }

    if let Some(index) = &record.index_signature {
        let declared: Vec<String> = record
            .properties
            .iter()
            .map(|p| format!("\"{}\"", escape_js(&p.name)))
            .collect();
        let key = ctx.key_var();
        w.open(&format!("for (const {key} of Object.keys(v))"));
        if !declared.is_empty() {
            w.line(&format!("if ([{}].includes({key})) continue;", declared.join(", ")));
        }
        let value_ctx = ctx.map_value(&key);
        emit_node(w, &index.value, &value_ctx, registry, artifacts);
        w.close();
    }
    w.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsgonest_metadata::model::Literal;
    use tsgonest_metadata::registry::Property;

    fn render_node(meta: &Metadata) -> String {
        let registry = ObjectRegistry::default();
        let mut artifacts = GenArtifacts::default();
        let mut w = CodeWriter::new();
        let ctx = EmitContext::helper();
        emit_node(&mut w, meta, &ctx, &registry, &mut artifacts);
        w.finish()
    }

    #[test]
    fn string_type_error_records_received() {
        let meta = Metadata::atomic(Atomic::String);
        let code = render_node(&meta);
        assert!(code.contains("if (typeof v !== \"string\")"));
        assert!(code.contains("expected: \"string\""));
        assert!(code.contains("received: _t(v)"));
    }

    #[test]
    fn constraint_failures_use_kind_expected() {
        let mut meta = Metadata::atomic(Atomic::String);
        meta.constraints.min_length = Some(1);
        meta.constraints.max_length = Some(255);
        let code = render_node(&meta);
        assert!(code.contains("expected: \"minLength 1\""));
        assert!(code.contains("expected: \"maxLength 255\""));
        // constraints only run when the type check passed
        assert!(code.contains("} else {"));
    }

    #[test]
    fn custom_message_overrides() {
        let mut meta = Metadata::atomic(Atomic::String);
        meta.constraints.min_length = Some(3);
        meta.constraints
            .errors
            .insert("minLength".to_string(), "too short".to_string());
        let code = render_node(&meta);
        assert!(code.contains("message: \"too short\""));
    }

    #[test]
    fn nullable_guards_with_null_test() {
        let mut meta = Metadata::atomic(Atomic::Number);
        meta.nullable = true;
        let code = render_node(&meta);
        assert!(code.starts_with("if (v !== null) {"));
    }

    #[test]
    fn missing_required_property_is_one_error() {
        let mut registry = ObjectRegistry::default();
        let id = registry.insert_placeholder("CardPayment", "p.ts");
        registry.get_mut(id).properties = vec![Property {
            name: "cvv".to_string(),
            value: Metadata::atomic(Atomic::String),
            readonly: false,
            optional: false,
            doc: None,
        }];
        let mut artifacts = GenArtifacts::default();
        let mut w = CodeWriter::new();
        emit_object_helper(&mut w, registry.get(id), &registry, &mut artifacts);
        let code = w.finish();
        assert!(code.contains("function _voCardPayment(v, p, e)"));
        assert!(code.contains("if (v.cvv === undefined)"));
        assert!(code.contains("path: p + \"/cvv\""));
        assert!(code.contains("expected: \"string\", received: \"undefined\""));
    }

    #[test]
    fn discriminated_union_switches() {
        let mut registry = ObjectRegistry::default();
        let card = registry.insert_placeholder("CardPayment", "p.ts");
        let bank = registry.insert_placeholder("BankPayment", "p.ts");
        let mut meta = Metadata::new();
        meta.objects = vec![card, bank];
        meta.discriminant = Some(tsgonest_metadata::model::Discriminant {
            field: "type".to_string(),
            mapping: vec![
                (Literal::String("card".to_string()), card),
                (Literal::String("bank".to_string()), bank),
            ],
        });
        let mut artifacts = GenArtifacts::default();
        let mut w = CodeWriter::new();
        let ctx = EmitContext::helper();
        emit_node(&mut w, &meta, &ctx, &registry, &mut artifacts);
        let code = w.finish();
        assert!(code.contains("else switch (v.type)"));
        assert!(code.contains("case \"card\":"));
        assert!(code.contains("_voCardPayment(v, p, e);"));
        assert!(code.contains("default:"));
        assert!(code.contains("path: p + \"/type\""));
    }

    #[test]
    fn array_loop_builds_pointer_paths() {
        let meta = Metadata::array(Metadata::atomic(Atomic::Number));
        let code = render_node(&meta);
        assert!(code.contains("for (let i = 0; i < v.length; i++)"));
        assert!(code.contains("path: p + \"/\" + i"));
    }
}
