//! Shared foundations for the tsgonest post-processing pipeline.
//!
//! This crate provides the types every other tsgonest crate builds on:
//! - Diagnostics (`Diagnostic`, `DiagnosticCategory`, `DiagnosticKind`,
//!   `DiagnosticSink`)
//! - Source positions (`Loc`)
//! - Configuration loading and validation (`TsgonestConfig`)

pub mod config;
pub mod diagnostics;
pub mod loc;

pub use config::{ConfigError, LoadedConfig, TsgonestConfig, VersioningType};
pub use diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticKind, DiagnosticSink};
pub use loc::Loc;
