//! Top-level document assembly.

use serde_json::{Map, Value, json};
use tracing::debug;
use tsgonest_common::config::OpenApiConfig;
use tsgonest_common::diagnostics::DiagnosticSink;
use tsgonest_metadata::registry::ObjectRegistry;
use tsgonest_metadata::schema::SchemaBuilder;
use tsgonest_routes::route::RouteTable;

use crate::operations::{build_operation, openapi_path};

/// Build the complete OpenAPI 3.2 document.
///
/// Ordering is part of the contract: schemas sorted by name, properties in
/// declaration order, paths in route insertion order.
#[must_use]
pub fn build_document(
    routes: &RouteTable,
    registry: &ObjectRegistry,
    config: &OpenApiConfig,
    sink: &mut DiagnosticSink,
) -> Value {
    debug!(routes = routes.routes.len(), schemas = registry.len(), "assembling OpenAPI document");
    let mut document = Map::new();
    document.insert("openapi".to_string(), json!("3.2.0"));

    // info
    let mut info = Map::new();
    info.insert(
        "title".to_string(),
        json!(config.title.clone().unwrap_or_else(|| "API".to_string())),
    );
    if let Some(description) = &config.description {
        info.insert("description".to_string(), json!(description));
    }
    info.insert(
        "version".to_string(),
        json!(config.version.clone().unwrap_or_else(|| "1.0.0".to_string())),
    );
    if let Some(contact) = &config.contact {
        info.insert("contact".to_string(), contact.clone());
    }
    if let Some(license) = &config.license {
        info.insert("license".to_string(), license.clone());
    }
    document.insert("info".to_string(), Value::Object(info));

    if !config.servers.is_empty() {
        document.insert("servers".to_string(), json!(config.servers));
    }

    // paths, in insertion order; one path item may collect several methods
    let mut paths: Map<String, Value> = Map::new();
    for route in &routes.routes {
        let path = openapi_path(&route.path_pattern);
        let operation = build_operation(route, registry, sink);
        let item = paths
            .entry(path)
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(item) = item {
            item.insert(route.http_method.as_str().to_string(), operation);
        }
    }
    document.insert("paths".to_string(), Value::Object(paths));

    // components: schemas sorted by canonical name
    let schemas_builder = SchemaBuilder::new(registry);
    let mut schemas = Map::new();
    for id in registry.ids_by_name() {
        let record = registry.get(id);
        schemas.insert(record.name.clone(), schemas_builder.object_schema(id));
    }

    let mut components = Map::new();
    if !schemas.is_empty() {
        components.insert("schemas".to_string(), Value::Object(schemas));
    }

    let security_schemes = security_schemes(routes, config);
    if !security_schemes.is_empty() {
        components.insert("securitySchemes".to_string(), Value::Object(security_schemes));
    }
    if !components.is_empty() {
        document.insert("components".to_string(), Value::Object(components));
    }

    Value::Object(document)
}

/// Explicit config schemes first, then a synthesized scheme for every
/// security name routes reference that the config does not define.
fn security_schemes(routes: &RouteTable, config: &OpenApiConfig) -> Map<String, Value> {
    let mut schemes: Map<String, Value> = Map::new();
    for (name, scheme) in &config.security_schemes {
        schemes.insert(name.clone(), scheme.clone());
    }
    let mut detected: Vec<&String> = routes
        .routes
        .iter()
        .flat_map(|r| r.security.iter())
        .collect();
    detected.sort();
    detected.dedup();
    for name in detected {
        if schemes.contains_key(name) {
            continue;
        }
        let synthesized = if name == "bearer" {
            json!({ "type": "http", "scheme": "bearer" })
        } else {
            json!({ "type": "apiKey", "in": "header", "name": name })
        };
        schemes.insert(name.clone(), synthesized);
    }
    schemes
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tsgonest_common::loc::Loc;
    use tsgonest_metadata::model::{Atomic, Metadata};
    use tsgonest_metadata::registry::Property;
    use tsgonest_routes::route::{HttpMethod, ParamKind, Route, RouteParam, RouteReturns};

    fn sink() -> DiagnosticSink {
        DiagnosticSink::new(false)
    }

    fn route_base() -> Route {
        Route {
            http_method: HttpMethod::Post,
            path_pattern: "/users".to_string(),
            controller_class: "UserController".to_string(),
            handler_name: "create".to_string(),
            params: Vec::new(),
            returns: RouteReturns::default(),
            security: Vec::new(),
            tags: vec!["User".to_string()],
            summary: None,
            description: None,
            deprecated: false,
            status_code: 201,
            content_type: "application/json".to_string(),
            versions: Vec::new(),
            version: None,
            is_event_stream: false,
            event_envelope: Vec::new(),
            heartbeat_ms: None,
            file: "src/user.controller.ts".to_string(),
            loc: Loc::none(),
        }
    }

    fn user_registry() -> (ObjectRegistry, Metadata, Metadata) {
        let mut registry = ObjectRegistry::default();
        let dto = registry.insert_placeholder("CreateUserDto", "src/user.dto.ts");
        registry.get_mut(dto).properties = vec![Property {
            name: "name".to_string(),
            value: Metadata::atomic(Atomic::String),
            readonly: false,
            optional: false,
            doc: None,
        }];
        let response = registry.insert_placeholder("UserResponse", "src/user.dto.ts");
        registry.get_mut(response).properties = vec![Property {
            name: "id".to_string(),
            value: Metadata::atomic(Atomic::String),
            readonly: false,
            optional: false,
            doc: None,
        }];
        (
            registry,
            Metadata::object(dto),
            Metadata::object(response),
        )
    }

    #[test]
    fn post_route_request_and_response_are_refs() {
        let (registry, body_meta, response_meta) = user_registry();
        let mut route = route_base();
        route.params.push(RouteParam {
            kind: ParamKind::Body,
            name: "body".to_string(),
            metadata: Some(body_meta),
            loc: Loc::none(),
        });
        route.returns.metadata = Some(response_meta);
        let table = RouteTable {
            routes: vec![route],
            controller_classes: Default::default(),
        };
        let config = OpenApiConfig::default();
        let document = build_document(&table, &registry, &config, &mut sink());

        assert_eq!(document["openapi"], json!("3.2.0"));
        let operation = &document["paths"]["/users"]["post"];
        assert_eq!(
            operation["requestBody"]["content"]["application/json"]["schema"]["$ref"],
            json!("#/components/schemas/CreateUserDto")
        );
        assert_eq!(
            operation["responses"]["201"]["content"]["application/json"]["schema"]["$ref"],
            json!("#/components/schemas/UserResponse")
        );
        // schemas are sorted by name
        let names: Vec<&String> = document["components"]["schemas"]
            .as_object()
            .unwrap()
            .keys()
            .collect();
        assert_eq!(names, ["CreateUserDto", "UserResponse"]);
    }

    #[test]
    fn path_params_are_rewritten_to_braces() {
        let (registry, _, _) = user_registry();
        let mut route = route_base();
        route.http_method = HttpMethod::Get;
        route.path_pattern = "/users/:id".to_string();
        route.status_code = 200;
        route.params.push(RouteParam {
            kind: ParamKind::Param,
            name: "id".to_string(),
            metadata: Some(Metadata::atomic(Atomic::String)),
            loc: Loc::none(),
        });
        let table = RouteTable {
            routes: vec![route],
            controller_classes: Default::default(),
        };
        let document = build_document(&table, &registry, &OpenApiConfig::default(), &mut sink());
        let operation = &document["paths"]["/users/{id}"]["get"];
        assert_eq!(operation["parameters"][0]["in"], json!("path"));
        assert_eq!(operation["parameters"][0]["required"], json!(true));
    }

    #[test]
    fn event_stream_emits_one_of_envelopes() {
        let (registry, body_meta, response_meta) = user_registry();
        let mut route = route_base();
        route.http_method = HttpMethod::Get;
        route.path_pattern = "/events".to_string();
        route.status_code = 200;
        route.is_event_stream = true;
        route.content_type = "text/event-stream".to_string();
        route.heartbeat_ms = Some(30000);
        route.event_envelope = vec![
            ("created".to_string(), body_meta),
            ("deleted".to_string(), response_meta),
        ];
        let table = RouteTable {
            routes: vec![route],
            controller_classes: Default::default(),
        };
        let document = build_document(&table, &registry, &OpenApiConfig::default(), &mut sink());
        let response = &document["paths"]["/events"]["get"]["responses"]["200"];
        assert_eq!(response["x-tsgonest-sse"], json!(true));
        assert_eq!(response["x-tsgonest-heartbeat"], json!(30000));
        let one_of = response["content"]["text/event-stream"]["schema"]["oneOf"]
            .as_array()
            .unwrap();
        assert_eq!(one_of.len(), 2);
        assert_eq!(one_of[0]["properties"]["event"]["enum"], json!(["created"]));
        assert_eq!(
            one_of[1]["properties"]["data"]["$ref"],
            json!("#/components/schemas/UserResponse")
        );
    }

    #[test]
    fn void_routes_have_no_content() {
        let (registry, _, _) = user_registry();
        let mut route = route_base();
        route.http_method = HttpMethod::Delete;
        route.status_code = 204;
        route.returns.is_void = true;
        let table = RouteTable {
            routes: vec![route],
            controller_classes: Default::default(),
        };
        let document = build_document(&table, &registry, &OpenApiConfig::default(), &mut sink());
        let response = &document["paths"]["/users"]["delete"]["responses"]["204"];
        assert!(response.get("content").is_none());
        assert!(response.get("description").is_some());
    }

    #[test]
    fn security_names_synthesize_schemes_when_undefined() {
        let (registry, _, _) = user_registry();
        let mut route = route_base();
        route.security = vec!["bearer".to_string(), "api_key".to_string()];
        let table = RouteTable {
            routes: vec![route],
            controller_classes: Default::default(),
        };
        let document = build_document(&table, &registry, &OpenApiConfig::default(), &mut sink());
        let schemes = document["components"]["securitySchemes"].as_object().unwrap();
        assert_eq!(schemes["bearer"]["type"], json!("http"));
        assert_eq!(schemes["api_key"]["type"], json!("apiKey"));
        let operation = &document["paths"]["/users"]["post"];
        assert_eq!(operation["security"][0], json!({ "bearer": [] }));
    }

    #[test]
    fn document_is_deterministic() {
        let (registry, body_meta, _) = user_registry();
        let mut route = route_base();
        route.params.push(RouteParam {
            kind: ParamKind::Body,
            name: "body".to_string(),
            metadata: Some(body_meta),
            loc: Loc::none(),
        });
        let table = RouteTable {
            routes: vec![route],
            controller_classes: Default::default(),
        };
        let config = OpenApiConfig::default();
        let a = build_document(&table, &registry, &config, &mut sink());
        let b = build_document(&table, &registry, &config, &mut sink());
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
