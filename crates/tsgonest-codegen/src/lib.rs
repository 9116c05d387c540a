//! Companion code generation.
//!
//! For each top-level named type the generator emits one ES module (the
//! *companion*) exporting `is<T>`, `validate<T>`, `assert<T>`,
//! `stringify<T>`, and `schema<T>`, plus a declaration stub. Everything is
//! a pure function of the input `Metadata`: two runs over identical
//! metadata produce byte-identical companions, which is what lets the
//! post-processing cache skip re-emission.
//!
//! The marker rewriter (under `transforms/`) is the consumer-facing half:
//! it retargets `is<T>(x)`-style calls in the compiler's emitted JS at the
//! generated companions.

pub mod checks;
pub mod companion;
pub mod context;
pub mod formats;
pub mod predicate;
pub mod report;
pub mod serializer;
pub mod transforms;
pub mod writer;

pub use companion::{Companion, CompanionExports, CompanionOptions, generate_companion, companion_file_stem};
pub use transforms::marker_rewrite::{MarkerRewriter, SENTINEL};
pub use writer::{CodeWriter, escape_js};
