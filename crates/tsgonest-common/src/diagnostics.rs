//! Diagnostic types for the post-processing pipeline.
//!
//! The category set mirrors the host compiler's own taxonomy so compiler
//! diagnostics and pipeline diagnostics can be reported through one channel.
//! Pipeline-originated diagnostics carry a `DiagnosticKind` with a stable
//! numeric code in the 90xxx range.

use serde::Serialize;

use crate::loc::Loc;

/// Diagnostic category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DiagnosticCategory {
    Warning = 0,
    Error = 1,
    Suggestion = 2,
    Message = 3,
}

/// The pipeline's own diagnostic classes. Codes are stable; consumers key
/// suppressions off them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    /// `any`, opaque function types, unrecognizable index signatures.
    TypeUnsupported,
    /// A constraint that cannot be honored (uncompilable `@pattern`,
    /// conflicting bounds reduced to tightest).
    ConstraintInvalid,
    /// Custom parameter decorator without `@in`; unknown method decorator.
    ParameterInvalid,
    /// Bad configuration (missing `controllers.include`, invalid versioning
    /// type, OpenAPI output extension not `.json`).
    ConfigInvalid,
    /// Schema cannot be represented faithfully; a `oneOf` fallback was used.
    OpenapiCompliance,
    /// `@Res()` parameter without `@Returns` and without a
    /// `@tsgonest-ignore uses-raw-response` marker.
    ReturnsMissing,
    /// An `error` diagnostic surfaced by the host compiler.
    CompilerError,
}

impl DiagnosticKind {
    /// Stable numeric code for this kind.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::TypeUnsupported => 90001,
            Self::ConstraintInvalid => 90002,
            Self::ParameterInvalid => 90003,
            Self::ConfigInvalid => 90004,
            Self::OpenapiCompliance => 90005,
            Self::ReturnsMissing => 90006,
            Self::CompilerError => 90007,
        }
    }

    /// Default category for this kind. `strict` upgrades
    /// `TypeUnsupported` to an error.
    #[must_use]
    pub const fn category(self, strict: bool) -> DiagnosticCategory {
        match self {
            Self::ConfigInvalid | Self::CompilerError => DiagnosticCategory::Error,
            Self::TypeUnsupported => {
                if strict {
                    DiagnosticCategory::Error
                } else {
                    DiagnosticCategory::Warning
                }
            }
            _ => DiagnosticCategory::Warning,
        }
    }
}

/// A single pipeline or compiler diagnostic.
#[derive(Clone, Debug, Serialize)]
pub struct Diagnostic {
    pub file: String,
    pub loc: Loc,
    pub message: String,
    pub category: DiagnosticCategory,
    pub code: u32,
}

impl Diagnostic {
    /// Create a diagnostic of the given kind at the given location.
    #[must_use]
    pub fn new(kind: DiagnosticKind, strict: bool, file: &str, loc: Loc, message: String) -> Self {
        Self {
            file: file.to_string(),
            loc,
            message,
            category: kind.category(strict),
            code: kind.code(),
        }
    }

    /// Create an error diagnostic.
    #[must_use]
    pub fn error(file: &str, loc: Loc, message: String, code: u32) -> Self {
        Self {
            file: file.to_string(),
            loc,
            message,
            category: DiagnosticCategory::Error,
            code,
        }
    }

    /// Downgrade to an info-level message (used for silent skips).
    #[must_use]
    pub fn into_message(mut self) -> Self {
        self.category = DiagnosticCategory::Message;
        self
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.category == DiagnosticCategory::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.category {
            DiagnosticCategory::Warning => "warning",
            DiagnosticCategory::Error => "error",
            DiagnosticCategory::Suggestion => "suggestion",
            DiagnosticCategory::Message => "info",
        };
        if self.loc.is_none() {
            write!(f, "{}: {} TSG{}: {}", self.file, tag, self.code, self.message)
        } else {
            write!(
                f,
                "{}:{}: {} TSG{}: {}",
                self.file, self.loc, tag, self.code, self.message
            )
        }
    }
}

/// Collector threaded through a pipeline run. Errors are sticky: once one is
/// pushed, `has_errors` stays true and the orchestrator aborts before
/// writing any output.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
    strict: bool,
}

impl DiagnosticSink {
    #[must_use]
    pub fn new(strict: bool) -> Self {
        Self {
            diagnostics: Vec::new(),
            strict,
        }
    }

    #[must_use]
    pub fn strict(&self) -> bool {
        self.strict
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Report a pipeline diagnostic of the given kind.
    pub fn report(&mut self, kind: DiagnosticKind, file: &str, loc: Loc, message: String) {
        let strict = self.strict;
        self.push(Diagnostic::new(kind, strict, file, loc, message));
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Warnings and informational messages, in report order.
    pub fn non_errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }

    #[must_use]
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}
