//! The manifest: the JSON index the runtime library uses to discover
//! companions and route metadata at request time.

use serde_json::{Map, Value, json};
use tsgonest_codegen::companion::Companion;
use tsgonest_metadata::model::Metadata;
use tsgonest_metadata::registry::ObjectRegistry;
use tsgonest_routes::route::{Route, RouteTable};

/// Manifest file name inside the output directory.
pub const MANIFEST_FILE_NAME: &str = "__tsgonest_manifest.json";

/// Build the manifest document. Companion keys are sorted by type name;
/// routes keep table order.
#[must_use]
pub fn build_manifest(
    companions: &[Companion],
    routes: &RouteTable,
    registry: &ObjectRegistry,
) -> Value {
    let mut sorted: Vec<&Companion> = companions.iter().collect();
    sorted.sort_by(|a, b| a.type_name.cmp(&b.type_name));

    let mut companion_entries = Map::new();
    for companion in sorted {
        companion_entries.insert(
            companion.type_name.clone(),
            json!({
                "file": path_string(&companion.js_path),
                "validate": companion.exports.validate,
                "assert": companion.exports.assert,
                "serialize": companion.exports.stringify,
                "schema": companion.exports.schema,
            }),
        );
    }

    let route_entries: Vec<Value> = routes
        .routes
        .iter()
        .map(|route| route_entry(route, registry))
        .collect();

    json!({
        "version": 1,
        "companions": companion_entries,
        "routes": route_entries,
    })
}

/// The slice of one route the runtime needs: where it is, which companion
/// validates its body, which serializes its response.
fn route_entry(route: &Route, registry: &ObjectRegistry) -> Value {
    let body_type = route
        .body_param()
        .and_then(|p| p.metadata.as_ref())
        .and_then(|m| single_object_name(m, registry));
    let returns_type = route
        .returns
        .metadata
        .as_ref()
        .and_then(|m| single_object_name(m, registry));
    json!({
        "method": route.http_method.as_str(),
        "path": route.path_pattern,
        "controller": route.controller_class,
        "handler": route.handler_name,
        "statusCode": route.status_code,
        "contentType": route.content_type,
        "body": body_type,
        "returns": returns_type,
        "eventStream": route.is_event_stream,
    })
}

/// A metadata node that is exactly one named object resolves to that name.
fn single_object_name(metadata: &Metadata, registry: &ObjectRegistry) -> Option<Value> {
    if metadata.objects.len() == 1 && metadata.alternative_count() == 1 {
        Some(Value::String(registry.get(metadata.objects[0]).name.clone()))
    } else {
        None
    }
}

fn path_string(path: &std::path::Path) -> String {
    path.display().to_string().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::Path;
    use tsgonest_codegen::companion::{CompanionOptions, generate_companion};
    use tsgonest_metadata::model::Atomic;
    use tsgonest_metadata::registry::Property;

    #[test]
    fn manifest_lists_five_entry_points_per_companion() {
        let mut registry = ObjectRegistry::default();
        let id = registry.insert_placeholder("CreateUserDto", "src/user.dto.ts");
        registry.get_mut(id).properties = vec![Property {
            name: "name".to_string(),
            value: Metadata::atomic(Atomic::String),
            readonly: false,
            optional: false,
            doc: None,
        }];
        let meta = Metadata::object(id);
        let companion = generate_companion(
            "CreateUserDto",
            &meta,
            &registry,
            Path::new("dist/user.dto.js"),
            &serde_json::json!({}),
            CompanionOptions::default(),
        );
        let manifest = build_manifest(&[companion], &RouteTable::default(), &registry);
        assert_eq!(manifest["version"], json!(1));
        let entry = &manifest["companions"]["CreateUserDto"];
        assert_eq!(entry["file"], json!("dist/user.CreateUserDto.tsgonest.js"));
        assert_eq!(entry["validate"], json!("validateCreateUserDto"));
        assert_eq!(entry["assert"], json!("assertCreateUserDto"));
        assert_eq!(entry["serialize"], json!("stringifyCreateUserDto"));
        assert_eq!(entry["schema"], json!("schemaCreateUserDto"));
    }

    #[test]
    fn companion_keys_are_sorted() {
        let mut registry = ObjectRegistry::default();
        let b = registry.insert_placeholder("Beta", "b.ts");
        let a = registry.insert_placeholder("Alpha", "a.ts");
        let make = |name: &str, id| {
            generate_companion(
                name,
                &Metadata::object(id),
                &registry,
                Path::new("dist/x.js"),
                &serde_json::json!({}),
                CompanionOptions::default(),
            )
        };
        let companions = vec![make("Beta", b), make("Alpha", a)];
        let manifest = build_manifest(&companions, &RouteTable::default(), &registry);
        let keys: Vec<&String> = manifest["companions"].as_object().unwrap().keys().collect();
        assert_eq!(keys, ["Alpha", "Beta"]);
    }
}
