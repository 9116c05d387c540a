//! OpenAPI 3.2 document assembly.
//!
//! Projects the [`RouteTable`](tsgonest_routes::RouteTable) and the object
//! registry into a single ordered JSON document: schemas sorted by name,
//! properties in declaration order, paths in route insertion order. The
//! same inputs always produce byte-identical output.

pub mod document;
pub mod operations;

pub use document::build_document;
