//! The `stringify<T>` lowering.
//!
//! Direct string concatenation over a property-ordered template. String
//! values go through the `_str` fast path: a single scan for characters
//! below 0x20, `"` and `\`; clean strings are quoted verbatim, anything
//! else falls back to `JSON.stringify`. The serializer assumes its input
//! conforms to the type — it is the companion of `validate`, not a
//! substitute.

use tsgonest_metadata::model::{Atomic, Metadata, TupleMeta};
use tsgonest_metadata::registry::{ObjectRecord, ObjectRegistry, Property};

use crate::context::member_access;
use crate::predicate::helper_name;
use crate::writer::{CodeWriter, escape_js};

/// The per-companion string fast-path helper.
pub const STR_HELPER: &str = r#"function _str(v) {
  for (let i = 0; i < v.length; i++) {
    const c = v.charCodeAt(i);
    if (c < 32 || c === 34 || c === 92) return JSON.stringify(v);
  }
  return "\"" + v + "\"";
}"#;

/// Expression serializing `val` according to `meta`.
#[must_use]
pub fn serialize_expr(meta: &Metadata, val: &str, registry: &ObjectRegistry) -> String {
    if meta.nullable {
        let mut inner = meta.clone();
        inner.nullable = false;
        return format!(
            "({val} === null ? \"null\" : {})",
            serialize_expr(&inner, val, registry)
        );
    }

    // `any` does not poison serialization; it just loses the fast path
    if meta.any {
        return format!("JSON.stringify({val})");
    }

    let alternatives = meta.alternative_count();

    // literal-only nodes serialize by their atomic kind, even when the
    // union carried several values (discriminant tags are the usual case)
    if !meta.constants.is_empty()
        && meta.atomics.is_empty()
        && meta.arrays.is_empty()
        && meta.tuples.is_empty()
        && meta.objects.is_empty()
        && meta.maps.is_empty()
        && !meta.has_function
    {
        let first = meta.constants[0].atomic;
        if meta.constants.iter().all(|g| g.atomic == first) {
            return atomic_expr(first, val);
        }
        return format!("JSON.stringify({val})");
    }

    if alternatives == 1 {
        if let Some(atomic) = meta.atomics.first() {
            return atomic_expr(*atomic, val);
        }
        if let Some(elem) = meta.arrays.first() {
            let elem_expr = serialize_expr(elem, "e", registry);
            return format!("\"[\" + {val}.map((e) => {elem_expr}).join(\",\") + \"]\"");
        }
        if let Some(tuple) = meta.tuples.first() {
            return tuple_expr(tuple, val, registry);
        }
        if meta.objects.len() == 1 {
            let name = &registry.get(meta.objects[0]).name;
            return format!("{}({val})", helper_name("_so", name));
        }
        if let Some(map) = meta.maps.first() {
            let value_expr = serialize_expr(&map.value, "u", registry);
            return format!(
                "\"{{\" + Object.keys({val}).filter((k) => {val}[k] !== undefined).map((k) => {{ const u = {val}[k]; return _str(k) + \":\" + {value_expr}; }}).join(\",\") + \"}}\""
            );
        }
        if meta.has_function {
            // functions serialize as undefined; property sites skip them
            return "undefined".to_string();
        }
    }

    // discriminated object unions dispatch on the tag
    if meta.objects.len() >= 2 && alternatives == meta.objects.len() {
        if let Some(discriminant) = &meta.discriminant {
            let access = format!("{val}{}", member_access(&discriminant.field));
            let mut chain = String::from("(");
            for (literal, object) in &discriminant.mapping {
                let name = &registry.get(*object).name;
                chain.push_str(&format!(
                    "{access} === {} ? {}({val}) : ",
                    literal.js(),
                    helper_name("_so", name)
                ));
            }
            chain.push_str(&format!("JSON.stringify({val}))"));
            return chain;
        }
    }

    // mixed unions lose the template fast path
    format!("JSON.stringify({val})")
}

fn atomic_expr(atomic: Atomic, val: &str) -> String {
    match atomic {
        Atomic::String => format!("_str({val})"),
        Atomic::Number | Atomic::BigInt => format!("String({val})"),
        Atomic::Boolean => format!("({val} ? \"true\" : \"false\")"),
    }
}

fn tuple_expr(tuple: &TupleMeta, val: &str, registry: &ObjectRegistry) -> String {
    let arity = tuple.elems.len();
    if arity == 0 && tuple.rest.is_none() {
        return "\"[]\"".to_string();
    }
    let slots: Vec<String> = tuple
        .elems
        .iter()
        .enumerate()
        .map(|(index, elem)| serialize_expr(elem, &format!("{val}[{index}]"), registry))
        .collect();
    if slots.is_empty() {
        // rest-only tuple
        let rest_expr = tuple
            .rest
            .as_ref()
            .map(|rest| serialize_expr(rest, "e", registry))
            .unwrap_or_default();
        return format!("\"[\" + {val}.map((e) => {rest_expr}).join(\",\") + \"]\"");
    }
    let head = format!("\"[\" + {}", slots.join(" + \",\" + "));
    match &tuple.rest {
        Some(rest) => {
            let rest_expr = serialize_expr(rest, "e", registry);
            format!(
                "{head} + {val}.slice({arity}).map((e) => \",\" + {rest_expr}).join(\"\") + \"]\""
            )
        }
        None => format!("{head} + \"]\""),
    }
}

/// Whether a property is ever emitted by the serializer.
fn serializable_property(property: &Property) -> bool {
    let meta = &property.value;
    // a pure function-typed property is skipped entirely
    !(meta.has_function && meta.alternative_count() == 1)
}

/// Emit the `_so<Name>` helper for one record.
pub fn emit_object_helper(w: &mut CodeWriter, record: &ObjectRecord, registry: &ObjectRegistry) {
    w.open(&format!("function {}(v)", helper_name("_so", &record.name)));

    let properties: Vec<&Property> = record
        .properties
        .iter()
        .filter(|p| serializable_property(p))
        .collect();

    let first_is_fixed = properties
        .first()
        .is_some_and(|p| !p.optional && p.value.is_required);

    if properties.is_empty() && record.index_signature.is_none() {
        w.line("return \"{}\";");
        w.close();
        return;
    }

    w.line("let s = \"{\";");
    if !first_is_fixed {
        w.line("let c = false;");
    }

    for (position, property) in properties.iter().enumerate() {
        let access = format!("v{}", member_access(&property.name));
        let key = format!("\\\"{}\\\":", escape_js(&property.name));
        let value_expr = serialize_expr(&property.value, &access, registry);
        let optional = property.optional || !property.value.is_required;

        if first_is_fixed {
            let comma = if position == 0 { "" } else { "," };
            if optional {
                w.open(&format!("if ({access} !== undefined)"));
                w.line(&format!("s += \"{comma}{key}\" + {value_expr};"));
                w.close();
            } else {
                w.line(&format!("s += \"{comma}{key}\" + {value_expr};"));
            }
        } else {
            // no guaranteed leading property: track commas at runtime
            if optional {
                w.open(&format!("if ({access} !== undefined)"));
            }
            w.line(&format!(
                "s += (c ? \",\" : \"\") + \"{key}\" + {value_expr};"
            ));
            w.line("c = true;");
            if optional {
                w.close();
            }
        }
    }

    if let Some(index) = &record.index_signature {
        let declared: Vec<String> = properties
            .iter()
            .map(|p| format!("\"{}\"", escape_js(&p.name)))
            .collect();
        let value_expr = serialize_expr(&index.value, "u", registry);
        let skip = if declared.is_empty() {
            String::new()
        } else {
            format!("if ([{}].includes(k)) continue; ", declared.join(", "))
        };
        let comma = if first_is_fixed {
            "\",\"".to_string()
        } else {
            "(c ? \",\" : \"\")".to_string()
        };
        w.open("for (const k of Object.keys(v))");
        w.line(&format!(
            "{skip}const u = v[k]; if (u === undefined) continue; s += {comma} + _str(k) + \":\" + {value_expr};"
        ));
        if !first_is_fixed {
            w.line("c = true;");
        }
        w.close();
    }

    w.line("return s + \"}\";");
    w.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record_with(properties: Vec<Property>) -> (ObjectRegistry, String) {
        let mut registry = ObjectRegistry::default();
        let id = registry.insert_placeholder("UserDto", "u.ts");
        registry.get_mut(id).properties = properties;
        let mut w = CodeWriter::new();
        emit_object_helper(&mut w, registry.get(id), &registry);
        let code = w.finish();
        (registry, code)
    }

    fn prop(name: &str, value: Metadata, optional: bool) -> Property {
        Property {
            name: name.to_string(),
            value,
            readonly: false,
            optional,
            doc: None,
        }
    }

    #[test]
    fn required_properties_use_fixed_template() {
        let (_, code) = record_with(vec![
            prop("name", Metadata::atomic(Atomic::String), false),
            prop("age", Metadata::atomic(Atomic::Number), false),
        ]);
        assert!(code.contains("s += \"\\\"name\\\":\" + _str(v.name);"));
        assert!(code.contains("s += \",\\\"age\\\":\" + String(v.age);"));
        assert!(!code.contains("let c = false;"));
    }

    #[test]
    fn optional_property_elides_on_undefined() {
        let (_, code) = record_with(vec![
            prop("name", Metadata::atomic(Atomic::String), false),
            prop("nick", Metadata::atomic(Atomic::String), true),
        ]);
        assert!(code.contains("if (v.nick !== undefined)"));
        assert!(code.contains("s += \",\\\"nick\\\":\" + _str(v.nick);"));
    }

    #[test]
    fn leading_optional_property_tracks_commas() {
        let (_, code) = record_with(vec![
            prop("nick", Metadata::atomic(Atomic::String), true),
            prop("name", Metadata::atomic(Atomic::String), false),
        ]);
        assert!(code.contains("let c = false;"));
        assert!(code.contains("s += (c ? \",\" : \"\") + \"\\\"nick\\\":\""));
    }

    #[test]
    fn function_properties_are_skipped() {
        let mut fn_meta = Metadata::new();
        fn_meta.has_function = true;
        let (_, code) = record_with(vec![
            prop("callback", fn_meta, false),
            prop("name", Metadata::atomic(Atomic::String), false),
        ]);
        assert!(!code.contains("callback"));
        assert!(code.contains("\\\"name\\\":"));
    }

    #[test]
    fn nullable_wraps_with_null_branch() {
        let registry = ObjectRegistry::default();
        let mut meta = Metadata::atomic(Atomic::String);
        meta.nullable = true;
        assert_eq!(
            serialize_expr(&meta, "x", &registry),
            "(x === null ? \"null\" : _str(x))"
        );
    }

    #[test]
    fn arrays_join_with_commas() {
        let registry = ObjectRegistry::default();
        let meta = Metadata::array(Metadata::atomic(Atomic::Number));
        assert_eq!(
            serialize_expr(&meta, "x", &registry),
            "\"[\" + x.map((e) => String(e)).join(\",\") + \"]\""
        );
    }

    #[test]
    fn booleans_avoid_string_call() {
        let registry = ObjectRegistry::default();
        let meta = Metadata::atomic(Atomic::Boolean);
        assert_eq!(
            serialize_expr(&meta, "x", &registry),
            "(x ? \"true\" : \"false\")"
        );
    }

    #[test]
    fn discriminated_union_dispatches_on_tag() {
        let mut registry = ObjectRegistry::default();
        let card = registry.insert_placeholder("CardPayment", "p.ts");
        let bank = registry.insert_placeholder("BankPayment", "p.ts");
        let mut meta = Metadata::new();
        meta.objects = vec![card, bank];
        meta.discriminant = Some(tsgonest_metadata::model::Discriminant {
            field: "type".to_string(),
            mapping: vec![
                (
                    tsgonest_metadata::model::Literal::String("card".to_string()),
                    card,
                ),
                (
                    tsgonest_metadata::model::Literal::String("bank".to_string()),
                    bank,
                ),
            ],
        });
        let expr = serialize_expr(&meta, "x", &registry);
        assert!(expr.contains("x.type === \"card\" ? _soCardPayment(x)"));
        assert!(expr.ends_with("JSON.stringify(x))"));
    }

    #[test]
    fn str_helper_checks_quote_backslash_and_control() {
        assert!(STR_HELPER.contains("c < 32 || c === 34 || c === 92"));
        assert!(STR_HELPER.contains("JSON.stringify(v)"));
    }
}
