//! The `Metadata` model: the language-neutral type description produced by
//! the type walker and consumed by the code generator and the OpenAPI
//! assembler.
//!
//! A `Metadata` node is a *sum of alternatives*: a union type populates
//! several alternative lists on one node (atomics, constant groups, arrays,
//! tuples, object references, maps) rather than nesting a union variant.
//! Object structure lives in the [`ObjectRegistry`]; nodes refer to records
//! by [`ObjectId`] index so reference cycles never become ownership cycles.

pub mod constraints;
pub mod model;
pub mod registry;
pub mod schema;

pub use constraints::{ConstraintBag, NumericKind, Transform};
pub use model::{Atomic, ConstantGroup, Discriminant, Literal, MapMeta, Metadata, TupleMeta};
pub use registry::{ObjectId, ObjectRecord, ObjectRegistry, Property};
pub use schema::SchemaBuilder;
