//! The route table model.

use rustc_hash::FxHashSet;
use tsgonest_common::loc::Loc;
use tsgonest_metadata::model::Metadata;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
}

impl HttpMethod {
    /// Lowercase name as used in OpenAPI path items.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Put => "put",
            Self::Delete => "delete",
            Self::Patch => "patch",
            Self::Head => "head",
        }
    }

    /// Default success status for routes of this method.
    #[must_use]
    pub const fn default_status(self) -> u16 {
        match self {
            Self::Post => 201,
            _ => 200,
        }
    }
}

/// Where a handler parameter comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamKind {
    Body,
    Query,
    Param,
    Header,
    FormDataBody,
    RawRequest,
    RawResponse,
    StreamYield,
    Custom { name: String, location: String },
}

/// One analyzed handler parameter.
#[derive(Clone, Debug)]
pub struct RouteParam {
    pub kind: ParamKind,
    /// Binding name: the decorator argument when given (`@Param('id')`),
    /// else the declared parameter name.
    pub name: String,
    /// Walked metadata; absent for raw request/response parameters.
    pub metadata: Option<Metadata>,
    pub loc: Loc,
}

/// The response side of a route.
#[derive(Clone, Debug, Default)]
pub struct RouteReturns {
    pub metadata: Option<Metadata>,
    pub is_void: bool,
    pub description: Option<String>,
}

/// One synthesized route.
#[derive(Clone, Debug)]
pub struct Route {
    pub http_method: HttpMethod,
    /// Composed pattern with `:name` segments, e.g. `/users/:id`.
    pub path_pattern: String,
    pub controller_class: String,
    pub handler_name: String,
    pub params: Vec<RouteParam>,
    pub returns: RouteReturns,
    pub security: Vec<String>,
    pub tags: Vec<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub deprecated: bool,
    pub status_code: u16,
    /// Response media type.
    pub content_type: String,
    /// Every version the handler is declared for.
    pub versions: Vec<String>,
    /// The version this concrete route was synthesized for (URI
    /// versioning emits one route per version).
    pub version: Option<String>,
    pub is_event_stream: bool,
    /// Event name → payload metadata; `"*"` is the non-discriminated
    /// wildcard entry.
    pub event_envelope: Vec<(String, Metadata)>,
    pub heartbeat_ms: Option<u64>,
    pub file: String,
    pub loc: Loc,
}

impl Route {
    /// The body-ish parameter (`@Body` or `@FormDataBody`), if any.
    #[must_use]
    pub fn body_param(&self) -> Option<&RouteParam> {
        self.params
            .iter()
            .find(|p| matches!(p.kind, ParamKind::Body | ParamKind::FormDataBody))
    }

    #[must_use]
    pub fn request_content_type(&self) -> &'static str {
        match self.body_param().map(|p| &p.kind) {
            Some(ParamKind::FormDataBody) => "multipart/form-data",
            _ => "application/json",
        }
    }
}

/// All routes of one run, plus the set of controller class names (no
/// companions may be generated for those).
#[derive(Debug, Default)]
pub struct RouteTable {
    pub routes: Vec<Route>,
    pub controller_classes: FxHashSet<String>,
}

impl RouteTable {
    #[must_use]
    pub fn is_controller(&self, class_name: &str) -> bool {
        self.controller_classes.contains(class_name)
    }
}
