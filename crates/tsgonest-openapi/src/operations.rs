//! Route → OpenAPI operation projection.

use serde_json::{Map, Value, json};
use tsgonest_common::diagnostics::{DiagnosticKind, DiagnosticSink};
use tsgonest_metadata::registry::ObjectRegistry;
use tsgonest_metadata::schema::SchemaBuilder;
use tsgonest_routes::route::{ParamKind, Route};

/// Rewrite `:name` segments to `{name}`.
#[must_use]
pub fn openapi_path(pattern: &str) -> String {
    pattern
        .split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) => format!("{{{name}}}"),
            None => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Build the operation object for one route.
#[must_use]
pub fn build_operation(
    route: &Route,
    registry: &ObjectRegistry,
    sink: &mut DiagnosticSink,
) -> Value {
    let schemas = SchemaBuilder::new(registry);
    let mut operation = Map::new();

    operation.insert(
        "operationId".to_string(),
        json!(operation_id(route)),
    );
    if !route.tags.is_empty() {
        operation.insert("tags".to_string(), json!(route.tags));
    }
    if let Some(summary) = &route.summary {
        operation.insert("summary".to_string(), json!(summary));
    }
    if let Some(description) = &route.description {
        operation.insert("description".to_string(), json!(description));
    }
    if route.deprecated {
        operation.insert("deprecated".to_string(), json!(true));
    }

    let parameters = build_parameters(route, &schemas);
    if !parameters.is_empty() {
        operation.insert("parameters".to_string(), Value::Array(parameters));
    }

    if let Some(body) = route.body_param() {
        if let Some(metadata) = &body.metadata {
            operation.insert(
                "requestBody".to_string(),
                json!({
                    "required": true,
                    "content": {
                        (route.request_content_type()): {
                            "schema": schemas.node_schema(metadata),
                        }
                    }
                }),
            );
        }
    }

    operation.insert(
        "responses".to_string(),
        build_responses(route, &schemas, sink),
    );

    if !route.security.is_empty() {
        let requirements: Vec<Value> = route
            .security
            .iter()
            .map(|name| json!({ (name.clone()): [] }))
            .collect();
        operation.insert("security".to_string(), Value::Array(requirements));
    }

    Value::Object(operation)
}

fn operation_id(route: &Route) -> String {
    let base = format!("{}_{}", route.controller_class, route.handler_name);
    match &route.version {
        Some(version) if route.versions.len() > 1 => format!("{base}_v{version}"),
        _ => base,
    }
}

fn build_parameters(route: &Route, schemas: &SchemaBuilder<'_>) -> Vec<Value> {
    let mut parameters = Vec::new();
    for param in &route.params {
        let location = match &param.kind {
            ParamKind::Param => "path",
            ParamKind::Query => "query",
            ParamKind::Header => "header",
            ParamKind::Custom { location, .. } => location.as_str(),
            _ => continue,
        };
        let Some(metadata) = &param.metadata else {
            continue;
        };

        // a bare `@Query()` object parameter expands one query parameter
        // per property
        if location == "query" && metadata.objects.len() == 1 && metadata.alternative_count() == 1 {
            let record = schemas_record(schemas, metadata.objects[0]);
            for property in &record.properties {
                parameters.push(json!({
                    "name": property.name,
                    "in": "query",
                    "required": !property.optional && property.value.is_required,
                    "schema": schemas.node_schema(&property.value),
                }));
            }
            continue;
        }

        parameters.push(json!({
            "name": param.name,
            "in": location,
            "required": location == "path" || metadata.is_required,
            "schema": schemas.node_schema(metadata),
        }));
    }
    parameters
}

fn schemas_record<'r>(
    schemas: &SchemaBuilder<'r>,
    id: tsgonest_metadata::registry::ObjectId,
) -> &'r tsgonest_metadata::registry::ObjectRecord {
    schemas.registry().get(id)
}

fn build_responses(route: &Route, schemas: &SchemaBuilder<'_>, sink: &mut DiagnosticSink) -> Value {
    let mut responses = Map::new();
    let status = route.status_code.to_string();

    if route.is_event_stream {
        let mut members: Vec<Value> = Vec::new();
        for (name, payload) in &route.event_envelope {
            let event_schema = if name == "*" {
                json!({ "type": "string" })
            } else {
                json!({ "type": "string", "enum": [name] })
            };
            members.push(json!({
                "type": "object",
                "properties": {
                    "event": event_schema,
                    "data": schemas.node_schema(payload),
                },
                "required": ["event", "data"],
            }));
        }
        if members.is_empty() {
            sink.report(
                DiagnosticKind::OpenapiCompliance,
                &route.file,
                route.loc,
                format!(
                    "event stream '{}.{}' yields no recognizable envelope; emitting a free-form stream",
                    route.controller_class, route.handler_name
                ),
            );
            members.push(json!({}));
        }
        let schema = if members.len() == 1 {
            members.into_iter().next().unwrap_or_default()
        } else {
            json!({ "oneOf": members })
        };
        let mut response = Map::new();
        response.insert("description".to_string(), json!("event stream"));
        response.insert(
            "content".to_string(),
            json!({ "text/event-stream": { "schema": schema } }),
        );
        response.insert("x-tsgonest-sse".to_string(), json!(true));
        if let Some(heartbeat) = route.heartbeat_ms {
            response.insert("x-tsgonest-heartbeat".to_string(), json!(heartbeat));
        }
        responses.insert(status, Value::Object(response));
        return Value::Object(responses);
    }

    let description = route
        .returns
        .description
        .clone()
        .unwrap_or_else(|| "successful response".to_string());
    let mut response = Map::new();
    response.insert("description".to_string(), json!(description));
    if let Some(metadata) = &route.returns.metadata {
        response.insert(
            "content".to_string(),
            json!({
                (route.content_type.clone()): { "schema": schemas.node_schema(metadata) }
            }),
        );
    }
    responses.insert(status, Value::Object(response));
    Value::Object(responses)
}
