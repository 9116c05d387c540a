//! The controller analyzer: recognizes the NestJS decorator dialect and
//! builds the [`RouteTable`] the OpenAPI assembler and manifest writer
//! consume.
//!
//! Recognition is purely syntactic (by resolved decorator identifier) plus
//! checker lookups for type arguments — reflect-metadata is never
//! consulted. Classes carrying `@Controller` are recorded so the pipeline
//! can refuse to generate companions for them.

pub mod analyze;
pub mod route;
pub mod versioning;

pub use analyze::{AnalyzerOptions, analyze_controllers};
pub use route::{HttpMethod, ParamKind, Route, RouteParam, RouteTable};
