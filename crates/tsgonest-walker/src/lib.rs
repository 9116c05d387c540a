//! The type walker: converts the host checker's type snapshot into the
//! language-neutral [`Metadata`](tsgonest_metadata::Metadata) graph.
//!
//! The walker is a worklist traversal with a per-walk visited map. Object
//! types move through `Unseen → Seen → Expanding → Expanded`; a request
//! against an `Expanding` object yields a back-reference into the object
//! registry and marks the record recursive. Constraints arrive through two
//! surface syntaxes — JSDoc tags and phantom intersection properties — and
//! land in one shared `ConstraintBag`.

pub mod constraints;
pub mod discriminant;
pub mod walk;

pub use constraints::{bag_from_jsdoc, phantom_kind};
pub use discriminant::elect_discriminant;
pub use walk::{TypeWalker, WalkError};
