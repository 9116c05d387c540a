//! Controller recognition and route synthesis.

use serde_json::Value;
use tracing::debug;
use tsgonest_common::config::VersioningConfig;
use tsgonest_common::diagnostics::DiagnosticKind;
use tsgonest_host::ast::{ClassDecl, Decorator, MethodDecl, ParamDecl, SourceFile};
use tsgonest_host::types::{HostType, TypeId, TypeTable};
use tsgonest_walker::walk::{TypeWalker, WalkError};

use crate::route::{HttpMethod, ParamKind, Route, RouteParam, RouteReturns, RouteTable};
use crate::versioning::compose_path;

/// Routing conventions from the configuration.
#[derive(Clone, Debug, Default)]
pub struct AnalyzerOptions {
    pub global_prefix: String,
    pub versioning: Option<VersioningConfig>,
}

const VERB_DECORATORS: [(&str, HttpMethod); 6] = [
    ("Get", HttpMethod::Get),
    ("Post", HttpMethod::Post),
    ("Put", HttpMethod::Put),
    ("Delete", HttpMethod::Delete),
    ("Patch", HttpMethod::Patch),
    ("Head", HttpMethod::Head),
];

/// Method-level decorators that are recognized but are not verbs.
const AUX_DECORATORS: [&str; 5] = ["Version", "Returns", "ApiSecurity", "HttpCode", "Header"];

/// Walk every `@Controller` class into routes.
pub fn analyze_controllers(
    files: &[SourceFile],
    table: &TypeTable,
    walker: &mut TypeWalker<'_>,
    options: &AnalyzerOptions,
) -> Result<RouteTable, WalkError> {
    let mut routes = RouteTable::default();
    for file in files {
        for class in &file.classes {
            if !class.is_controller() {
                continue;
            }
            routes.controller_classes.insert(class.name.clone());
            analyze_class(file, class, table, walker, options, &mut routes)?;
        }
    }
    Ok(routes)
}

fn analyze_class(
    file: &SourceFile,
    class: &ClassDecl,
    table: &TypeTable,
    walker: &mut TypeWalker<'_>,
    options: &AnalyzerOptions,
    routes: &mut RouteTable,
) -> Result<(), WalkError> {
    let controller = class
        .decorator("Controller")
        .expect("caller checked is_controller");

    // only string-literal controller paths participate
    let controller_path = if controller.args.is_empty() {
        String::new()
    } else if controller.literal_args {
        match controller.string_arg(0) {
            Some(path) => path.to_string(),
            None => {
                warn_dynamic_path(walker, file, class);
                return Ok(());
            }
        }
    } else {
        warn_dynamic_path(walker, file, class);
        return Ok(());
    };

    debug!(controller = %class.name, path = %controller_path, "analyzing controller");

    let class_security = security_names(&class.decorators);
    let class_versions = version_values(class.decorator("Version"));
    let tag = class
        .name
        .strip_suffix("Controller")
        .unwrap_or(&class.name)
        .to_string();

    for method in &class.methods {
        analyze_method(
            file,
            class,
            method,
            &controller_path,
            &class_security,
            &class_versions,
            &tag,
            table,
            walker,
            options,
            routes,
        )?;
    }
    Ok(())
}

fn warn_dynamic_path(walker: &mut TypeWalker<'_>, file: &SourceFile, class: &ClassDecl) {
    walker.sink().report(
        DiagnosticKind::ParameterInvalid,
        &file.path,
        class.loc,
        format!(
            "controller '{}' has a non-literal path and was skipped",
            class.name
        ),
    );
}

fn analyze_method(
    file: &SourceFile,
    class: &ClassDecl,
    method: &MethodDecl,
    controller_path: &str,
    class_security: &[String],
    class_versions: &[String],
    tag: &str,
    table: &TypeTable,
    walker: &mut TypeWalker<'_>,
    options: &AnalyzerOptions,
    routes: &mut RouteTable,
) -> Result<(), WalkError> {
    let verb = find_verb(method);
    let Some((http_method, verb_decorator, is_event_stream)) = verb else {
        // a decorated method with no recognizable verb is worth a warning
        let unknown = method
            .decorators
            .iter()
            .find(|d| !AUX_DECORATORS.contains(&d.name.as_str()));
        if let Some(decorator) = unknown {
            walker.sink().report(
                DiagnosticKind::ParameterInvalid,
                &file.path,
                method.loc,
                format!(
                    "method '{}.{}' has unknown decorator '@{}' and no HTTP verb",
                    class.name, method.name, decorator.name
                ),
            );
        }
        return Ok(());
    };

    let method_path = verb_decorator.string_arg(0).unwrap_or("").to_string();
    let heartbeat_ms = verb_decorator
        .object_arg(1)
        .and_then(|opts| opts.get("heartbeat"))
        .and_then(Value::as_u64);

    // parameters
    let mut params = Vec::new();
    let mut has_raw_response = false;
    for param in &method.params {
        if let Some(route_param) = analyze_param(file, param, walker)? {
            has_raw_response |= route_param.kind == ParamKind::RawResponse;
            params.push(route_param);
        }
    }

    // response side
    let mut status_code = http_method.default_status();
    let mut content_type = "application/json".to_string();
    let mut returns = RouteReturns::default();
    let mut event_envelope = Vec::new();

    if is_event_stream {
        content_type = "text/event-stream".to_string();
        status_code = 200;
        for (name, payload) in envelope_payloads(method, table) {
            let metadata = walker.walk_entry(
                &format!("{}.{}", class.name, method.name),
                payload,
                &file.path,
                method.loc,
            )?;
            event_envelope.push((name, metadata));
        }
    } else {
        let returns_decorator = method.decorator("Returns");
        let return_type = table.unwrap_promise(method.return_type);
        let is_void = matches!(table.get(return_type), HostType::Void | HostType::Undefined);

        if let Some(decorator) = returns_decorator {
            if let Some(&ty) = decorator.type_args.first() {
                returns.metadata = Some(walker.walk_entry(
                    &format!("{}.{}", class.name, method.name),
                    ty,
                    &file.path,
                    method.loc,
                )?);
            }
            apply_returns_options(decorator, &mut content_type, &mut status_code, &mut returns);
        } else if is_void {
            returns.is_void = true;
            if has_raw_response {
                if !method.has_ignore_marker("uses-raw-response") {
                    walker.sink().report(
                        DiagnosticKind::ReturnsMissing,
                        &file.path,
                        method.loc,
                        format!(
                            "handler '{}.{}' writes through @Res() but has no @Returns; \
                             response schema is unknown",
                            class.name, method.name
                        ),
                    );
                }
            } else {
                status_code = 204;
            }
        } else {
            returns.metadata = Some(walker.walk_entry(
                &format!("{}.{}", class.name, method.name),
                return_type,
                &file.path,
                method.loc,
            )?);
        }

        if let Some(code) = method
            .decorator("HttpCode")
            .and_then(|d| d.args.first())
            .and_then(Value::as_u64)
        {
            status_code = code as u16;
        }
    }

    // versions: method overrides controller overrides default
    let method_versions = version_values(method.decorator("Version"));
    let versions: Vec<String> = if !method_versions.is_empty() {
        method_versions
    } else if !class_versions.is_empty() {
        class_versions.to_vec()
    } else {
        options
            .versioning
            .as_ref()
            .and_then(|v| v.default_version.clone())
            .into_iter()
            .collect()
    };

    let mut security = class_security.to_vec();
    for name in security_names(&method.decorators) {
        if !security.contains(&name) {
            security.push(name);
        }
    }

    let (summary, description) = split_doc(method.doc.as_deref());
    let deprecated = method.jsdoc.iter().any(|t| t.name == "deprecated");

    // URI versioning synthesizes one route per version
    let version_slots: Vec<Option<String>> = if versions.is_empty() {
        vec![None]
    } else {
        versions.iter().cloned().map(Some).collect()
    };

    for version in version_slots {
        let path_pattern = compose_path(
            &options.global_prefix,
            options.versioning.as_ref(),
            version.as_deref(),
            controller_path,
            &method_path,
        );
        routes.routes.push(Route {
            version: version.clone(),
            http_method,
            path_pattern,
            controller_class: class.name.clone(),
            handler_name: method.name.clone(),
            params: params.clone(),
            returns: returns.clone(),
            security: security.clone(),
            tags: vec![tag.to_string()],
            summary: summary.clone(),
            description: description.clone(),
            deprecated,
            status_code,
            content_type: content_type.clone(),
            versions: versions.clone(),
            is_event_stream,
            event_envelope: event_envelope.clone(),
            heartbeat_ms,
            file: file.path.clone(),
            loc: method.loc,
        });
    }
    Ok(())
}

fn find_verb(method: &MethodDecl) -> Option<(HttpMethod, &Decorator, bool)> {
    for decorator in &method.decorators {
        for (name, verb) in VERB_DECORATORS {
            if decorator.name == name {
                return Some((verb, decorator, false));
            }
        }
        if decorator.name == "EventStream" || decorator.name == "Sse" {
            return Some((HttpMethod::Get, decorator, true));
        }
    }
    None
}

fn analyze_param(
    file: &SourceFile,
    param: &ParamDecl,
    walker: &mut TypeWalker<'_>,
) -> Result<Option<RouteParam>, WalkError> {
    let Some(decorator) = param.decorators.first() else {
        return Ok(None);
    };
    let binding_name = decorator
        .string_arg(0)
        .unwrap_or(param.name.as_str())
        .to_string();

    let kind = match decorator.name.as_str() {
        "Body" => ParamKind::Body,
        "Query" => ParamKind::Query,
        "Param" => ParamKind::Param,
        "Header" | "Headers" => ParamKind::Header,
        "FormDataBody" => ParamKind::FormDataBody,
        "Req" | "Request" => ParamKind::RawRequest,
        "Res" | "Response" => ParamKind::RawResponse,
        "StreamYield" => ParamKind::StreamYield,
        custom => {
            // a custom decorator participates only when its declaration
            // carries an `@in` location tag
            let location = decorator
                .decl_jsdoc
                .iter()
                .find(|t| t.name == "in")
                .and_then(|t| t.text.as_deref())
                .map(str::trim)
                .filter(|l| ["param", "query", "header", "cookie"].contains(l));
            match location {
                Some(location) => ParamKind::Custom {
                    name: custom.to_string(),
                    location: location.to_string(),
                },
                None => {
                    let info = tsgonest_common::diagnostics::Diagnostic::new(
                        DiagnosticKind::ParameterInvalid,
                        false,
                        &file.path,
                        param.loc,
                        format!(
                            "parameter '{}' uses decorator '@{custom}' without an @in tag; skipped",
                            param.name
                        ),
                    )
                    .into_message();
                    walker.sink().push(info);
                    return Ok(None);
                }
            }
        }
    };

    let metadata = match kind {
        ParamKind::RawRequest | ParamKind::RawResponse | ParamKind::StreamYield => None,
        _ => Some(walker.walk_entry(&binding_name, param.ty, &file.path, param.loc)?),
    };

    Ok(Some(RouteParam {
        kind,
        name: binding_name,
        metadata,
        loc: param.loc,
    }))
}

/// Extract `(event name, payload type)` pairs from an event-stream
/// handler's yield type. `SseEvent<'name', T>` contributes a named entry;
/// `SseEvent<string, T>` and non-envelope yields contribute the `"*"`
/// wildcard.
fn envelope_payloads(method: &MethodDecl, table: &TypeTable) -> Vec<(String, TypeId)> {
    let yielded = match table.get(table.unwrap_promise(method.return_type)) {
        HostType::AsyncIterable(inner) => *inner,
        _ => table.unwrap_promise(method.return_type),
    };
    let members: Vec<TypeId> = match table.get(yielded) {
        HostType::Union(members) => members.clone(),
        _ => vec![yielded],
    };
    let mut entries = Vec::new();
    for member in members {
        let entry = match table.get(member) {
            HostType::Object(obj) if obj.name == "SseEvent" && obj.type_args.len() == 2 => {
                let name = match table.get(obj.type_args[0]) {
                    HostType::StringLiteral(name) => name.clone(),
                    _ => "*".to_string(),
                };
                (name, obj.type_args[1])
            }
            _ => ("*".to_string(), member),
        };
        entries.push(entry);
    }
    entries
}

fn apply_returns_options(
    decorator: &Decorator,
    content_type: &mut String,
    status_code: &mut u16,
    returns: &mut RouteReturns,
) {
    // `@Returns<T>(contentType?, status?, description?)`, or a single
    // options object with those fields
    if let Some(options) = decorator.object_arg(0) {
        if let Some(ct) = options.get("contentType").and_then(Value::as_str) {
            *content_type = ct.to_string();
        }
        if let Some(status) = options.get("status").and_then(Value::as_u64) {
            *status_code = status as u16;
        }
        if let Some(description) = options.get("description").and_then(Value::as_str) {
            returns.description = Some(description.to_string());
        }
        return;
    }
    if let Some(ct) = decorator.string_arg(0) {
        *content_type = ct.to_string();
    }
    if let Some(status) = decorator.args.get(1).and_then(Value::as_u64) {
        *status_code = status as u16;
    }
    if let Some(description) = decorator.args.get(2).and_then(Value::as_str) {
        returns.description = Some(description.to_string());
    }
}

fn security_names(decorators: &[Decorator]) -> Vec<String> {
    decorators
        .iter()
        .filter(|d| d.name == "ApiSecurity")
        .filter_map(|d| d.string_arg(0))
        .map(str::to_string)
        .collect()
}

fn version_values(decorator: Option<&Decorator>) -> Vec<String> {
    let Some(decorator) = decorator else {
        return Vec::new();
    };
    match decorator.args.first() {
        Some(Value::String(version)) => vec![version.clone()],
        Some(Value::Array(versions)) => versions
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::Number(n)) => vec![n.to_string()],
        _ => Vec::new(),
    }
}

/// First doc line becomes the summary, the rest the description.
fn split_doc(doc: Option<&str>) -> (Option<String>, Option<String>) {
    let Some(doc) = doc else {
        return (None, None);
    };
    let mut lines = doc.trim().lines();
    let summary = lines.next().map(|l| l.trim().to_string());
    let rest: Vec<&str> = lines.map(str::trim).skip_while(|l| l.is_empty()).collect();
    let description = if rest.is_empty() {
        None
    } else {
        Some(rest.join("\n"))
    };
    (summary.filter(|s| !s.is_empty()), description)
}
