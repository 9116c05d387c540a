//! Companion module assembly.
//!
//! A companion is one ES module per top-level named type, emitted next to
//! the compiled JavaScript of the file that declared the type:
//! `foo/bar.dto.ts` → `<outDir>/foo/bar.<T>.tsgonest.js` plus a
//! `.d.ts` stub. Helpers for every object reachable from the type live
//! inside the module (function declarations hoist, so emission order never
//! matters), which keeps companions self-contained and recursion a plain
//! self-call.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;
use tsgonest_metadata::model::Metadata;
use tsgonest_metadata::registry::{ObjectId, ObjectRegistry};

use crate::checks::GenArtifacts;
use crate::context::EmitContext;
use crate::predicate::{self, helper_name};
use crate::report;
use crate::serializer;
use crate::writer::CodeWriter;

/// Which function families a companion exports.
#[derive(Clone, Copy, Debug)]
pub struct CompanionOptions {
    pub validation: bool,
    pub serialization: bool,
}

impl Default for CompanionOptions {
    fn default() -> Self {
        Self {
            validation: true,
            serialization: true,
        }
    }
}

/// Exported function names, as the manifest records them.
#[derive(Clone, Debug)]
pub struct CompanionExports {
    pub is: String,
    pub validate: String,
    pub assert: String,
    pub stringify: String,
    pub schema: String,
}

impl CompanionExports {
    #[must_use]
    pub fn for_type(type_name: &str) -> Self {
        Self {
            is: format!("is{type_name}"),
            validate: format!("validate{type_name}"),
            assert: format!("assert{type_name}"),
            stringify: format!("stringify{type_name}"),
            schema: format!("schema{type_name}"),
        }
    }
}

/// A fully generated companion, ready to be written to disk.
#[derive(Clone, Debug)]
pub struct Companion {
    pub type_name: String,
    pub js_path: PathBuf,
    pub dts_path: PathBuf,
    pub js: String,
    pub dts: String,
    pub exports: CompanionExports,
}

/// The stem companions are named under: the emitted file name without its
/// `.js` extension and without a trailing `.dto` segment
/// (`user.dto.js` → `user`).
#[must_use]
pub fn companion_file_stem(emitted_file_name: &str) -> String {
    let stem = emitted_file_name
        .strip_suffix(".js")
        .or_else(|| emitted_file_name.strip_suffix(".mjs"))
        .or_else(|| emitted_file_name.strip_suffix(".cjs"))
        .unwrap_or(emitted_file_name);
    stem.strip_suffix(".dto").unwrap_or(stem).to_string()
}

/// Every object record reachable from `meta` through the registry.
#[must_use]
pub fn object_closure(meta: &Metadata, registry: &ObjectRegistry) -> BTreeSet<ObjectId> {
    let mut closure: BTreeSet<ObjectId> = BTreeSet::new();
    let mut worklist: Vec<ObjectId> = meta.definitions.iter().copied().collect();
    while let Some(id) = worklist.pop() {
        if !closure.insert(id) {
            continue;
        }
        let record = registry.get(id);
        for property in &record.properties {
            worklist.extend(property.value.definitions.iter().copied());
        }
        if let Some(index) = &record.index_signature {
            worklist.extend(index.value.definitions.iter().copied());
            worklist.extend(index.key.definitions.iter().copied());
        }
    }
    closure
}

/// Generate the companion for one named type.
///
/// `emitted_js` is the compiled JavaScript of the declaring source file;
/// the companion lands beside it. `schema` is the prebuilt JSON-Schema
/// fragment (kept equivalent to the OpenAPI one by sharing the builder).
pub fn generate_companion(
    type_name: &str,
    meta: &Metadata,
    registry: &ObjectRegistry,
    emitted_js: &Path,
    schema: &serde_json::Value,
    options: CompanionOptions,
) -> Companion {
    debug!(type_name, "generating companion");
    let exports = CompanionExports::for_type(type_name);
    let closure = object_closure(meta, registry);
    let mut artifacts = GenArtifacts::default();

    // function bodies first; the artifact consts they request go on top
    let mut body = CodeWriter::new();

    if options.validation {
        for &id in &closure {
            let record = registry.get(id);
            let helper_body = predicate::object_helper_body(record, registry, &mut artifacts);
            body.open(&format!("function {}(v)", helper_name("_io", &record.name)));
            body.line(&format!("return {helper_body};"));
            body.close();
        }
        for &id in &closure {
            report::emit_object_helper(&mut body, registry.get(id), registry, &mut artifacts);
        }

        let is_expr = predicate::node_check(meta, "x", registry, &mut artifacts);
        body.open(&format!("export function {}(x)", exports.is));
        body.line(&format!("return {is_expr};"));
        body.close();

        body.open(&format!("export function {}(x)", exports.validate));
        body.line("const e = [];");
        let root_ctx = EmitContext {
            val: "x".to_string(),
            path: "\"\"".to_string(),
            depth: 0,
        };
        report::emit_node(&mut body, meta, &root_ctx, registry, &mut artifacts);
        body.line(
            "return e.length === 0 ? { success: true, data: x, errors: e } : { success: false, data: x, errors: e };",
        );
        body.close();

        body.open(&format!("export function {}(x)", exports.assert));
        body.line(&format!("const r = {}(x);", exports.validate));
        body.open("if (!r.success)");
        body.line("const err = r.errors[0];");
        body.line(
            "throw new TypeError(err.message !== undefined ? err.message : \"Expected \" + err.expected + \" at \\\"\" + err.path + \"\\\", got \" + err.received);",
        );
        body.close();
        body.line("return x;");
        body.close();
    }

    if options.serialization {
        for &id in &closure {
            serializer::emit_object_helper(&mut body, registry.get(id), registry);
        }
        let stringify_expr = serializer::serialize_expr(meta, "x", registry);
        body.open(&format!("export function {}(x)", exports.stringify));
        body.line(&format!("return {stringify_expr};"));
        body.close();
    }

    body.line(&format!(
        "export const {} = {};",
        exports.schema,
        serde_json::to_string(schema).unwrap_or_else(|_| "{}".to_string())
    ));

    let mut js = String::new();
    js.push_str("// Generated by tsgonest. Do not edit.\n");
    for decl in artifacts.const_decls() {
        js.push_str(&decl);
        js.push('\n');
    }
    if options.validation {
        js.push_str("function _t(v) { return v === null ? \"null\" : typeof v; }\n");
    }
    if options.serialization {
        js.push_str(serializer::STR_HELPER);
        js.push('\n');
    }
    js.push_str(&body.finish());

    let emitted_name = emitted_js
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("module.js");
    let stem = companion_file_stem(emitted_name);
    let dir = emitted_js.parent().unwrap_or(Path::new("."));
    let js_path = dir.join(format!("{stem}.{type_name}.tsgonest.js"));
    let dts_path = dir.join(format!("{stem}.{type_name}.tsgonest.d.ts"));

    let dts = declaration_stub(type_name, emitted_name, &exports, options);

    Companion {
        type_name: type_name.to_string(),
        js_path,
        dts_path,
        js,
        dts,
        exports,
    }
}

fn declaration_stub(
    type_name: &str,
    emitted_name: &str,
    exports: &CompanionExports,
    options: CompanionOptions,
) -> String {
    let mut out = String::new();
    out.push_str("// Generated by tsgonest. Do not edit.\n");
    out.push_str(&format!(
        "import type {{ {type_name} }} from \"./{emitted_name}\";\n"
    ));
    if options.validation {
        out.push_str(
            "export interface TsgonestValidationError { path: string; expected: string; received: string; message?: string; }\n",
        );
        out.push_str(&format!(
            "export declare function {}(x: unknown): x is {type_name};\n",
            exports.is
        ));
        out.push_str(&format!(
            "export declare function {}(x: unknown): {{ success: boolean; data: unknown; errors: TsgonestValidationError[] }};\n",
            exports.validate
        ));
        out.push_str(&format!(
            "export declare function {}(x: unknown): {type_name};\n",
            exports.assert
        ));
    }
    if options.serialization {
        out.push_str(&format!(
            "export declare function {}(x: {type_name}): string;\n",
            exports.stringify
        ));
    }
    out.push_str(&format!(
        "export declare const {}: Record<string, unknown>;\n",
        exports.schema
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tsgonest_metadata::model::Atomic;
    use tsgonest_metadata::registry::Property;

    fn user_registry() -> (ObjectRegistry, Metadata) {
        let mut registry = ObjectRegistry::default();
        let id = registry.insert_placeholder("CreateUserDto", "src/user.dto.ts");
        let mut email = Metadata::atomic(Atomic::String);
        email.constraints.format = Some("email".to_string());
        registry.get_mut(id).properties = vec![
            Property {
                name: "name".to_string(),
                value: Metadata::atomic(Atomic::String),
                readonly: false,
                optional: false,
                doc: None,
            },
            Property {
                name: "email".to_string(),
                value: email,
                readonly: false,
                optional: false,
                doc: None,
            },
        ];
        (registry, Metadata::object(id))
    }

    #[test]
    fn companion_paths_follow_naming_scheme() {
        let (registry, meta) = user_registry();
        let companion = generate_companion(
            "CreateUserDto",
            &meta,
            &registry,
            Path::new("dist/user.dto.js"),
            &json!({}),
            CompanionOptions::default(),
        );
        assert_eq!(
            companion.js_path,
            PathBuf::from("dist/user.CreateUserDto.tsgonest.js")
        );
        assert_eq!(
            companion.dts_path,
            PathBuf::from("dist/user.CreateUserDto.tsgonest.d.ts")
        );
    }

    #[test]
    fn companion_exports_all_five_names() {
        let (registry, meta) = user_registry();
        let companion = generate_companion(
            "CreateUserDto",
            &meta,
            &registry,
            Path::new("dist/user.dto.js"),
            &json!({ "type": "object" }),
            CompanionOptions::default(),
        );
        for export in [
            "export function isCreateUserDto(x)",
            "export function validateCreateUserDto(x)",
            "export function assertCreateUserDto(x)",
            "export function stringifyCreateUserDto(x)",
            "export const schemaCreateUserDto = {\"type\":\"object\"};",
        ] {
            assert!(companion.js.contains(export), "missing: {export}");
        }
        // format regex const is declared on top
        assert!(companion.js.contains("const __f_email = new RegExp("));
        assert!(companion.js.contains("function _ioCreateUserDto(v)"));
        assert!(companion.js.contains("function _voCreateUserDto(v, p, e)"));
        assert!(companion.js.contains("function _soCreateUserDto(v)"));
    }

    #[test]
    fn validation_can_be_disabled() {
        let (registry, meta) = user_registry();
        let companion = generate_companion(
            "CreateUserDto",
            &meta,
            &registry,
            Path::new("dist/user.dto.js"),
            &json!({}),
            CompanionOptions {
                validation: false,
                serialization: true,
            },
        );
        assert!(!companion.js.contains("isCreateUserDto"));
        assert!(!companion.js.contains("function _t("));
        assert!(companion.js.contains("stringifyCreateUserDto"));
        assert!(!companion.dts.contains("validateCreateUserDto"));
    }

    #[test]
    fn generation_is_deterministic() {
        let (registry, meta) = user_registry();
        let make = || {
            generate_companion(
                "CreateUserDto",
                &meta,
                &registry,
                Path::new("dist/user.dto.js"),
                &json!({ "type": "object" }),
                CompanionOptions::default(),
            )
        };
        let a = make();
        let b = make();
        assert_eq!(a.js, b.js);
        assert_eq!(a.dts, b.dts);
    }

    #[test]
    fn declaration_stub_references_declaring_module() {
        let (registry, meta) = user_registry();
        let companion = generate_companion(
            "CreateUserDto",
            &meta,
            &registry,
            Path::new("dist/user.dto.js"),
            &json!({}),
            CompanionOptions::default(),
        );
        assert!(companion
            .dts
            .contains("import type { CreateUserDto } from \"./user.dto.js\";"));
        assert!(companion
            .dts
            .contains("export declare function isCreateUserDto(x: unknown): x is CreateUserDto;"));
    }

    #[test]
    fn file_stem_strips_dto_suffix() {
        assert_eq!(companion_file_stem("user.dto.js"), "user");
        assert_eq!(companion_file_stem("user.js"), "user");
        assert_eq!(companion_file_stem("index.mjs"), "index");
    }

    #[test]
    fn recursive_types_stay_in_one_module() {
        let mut registry = ObjectRegistry::default();
        let id = registry.insert_placeholder("Category", "src/category.dto.ts");
        let children = Metadata::array(Metadata::object(id));
        registry.get_mut(id).properties = vec![Property {
            name: "children".to_string(),
            value: children,
            readonly: false,
            optional: false,
            doc: None,
        }];
        registry.get_mut(id).is_recursive = true;
        let meta = Metadata::object(id);
        let companion = generate_companion(
            "Category",
            &meta,
            &registry,
            Path::new("dist/category.dto.js"),
            &json!({}),
            CompanionOptions::default(),
        );
        // the recursive reference is a self-call of the helper
        assert!(companion.js.contains("v.children.every((e) => _ioCategory(e))"));
    }
}
