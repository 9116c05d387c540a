//! The `Program` trait: everything the pipeline consumes from one compile.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use tsgonest_common::diagnostics::Diagnostic;

use crate::ast::SourceFile;
use crate::types::TypeTable;

/// Outcome of the host compiler's emit phase.
#[derive(Clone, Debug, Default)]
pub struct EmitResult {
    /// JS and declaration outputs written this run.
    pub emitted_files: Vec<PathBuf>,
    /// True when the compiler's incremental state decided nothing needed
    /// re-emission.
    pub emit_skipped: bool,
}

/// A finished host compile, as seen by the post-processing pipeline.
///
/// Implementations must be cheap to query; the pipeline performs all its
/// checker reads before writing any file.
pub trait Program {
    /// Snapshot of the checker's resolved types.
    fn type_table(&self) -> &TypeTable;

    /// The decorator-level view of every source file in the program.
    fn source_files(&self) -> &[SourceFile];

    /// The compiler's own diagnostics (config, syntactic, semantic). Any
    /// error-category entry aborts the pipeline.
    fn diagnostics(&self) -> &[Diagnostic];

    /// Result of the emit phase that preceded post-processing.
    fn emit_result(&self) -> &EmitResult;

    /// Source text of an emitted JavaScript file, for the marker rewriter.
    fn emitted_text(&self, path: &Path) -> std::io::Result<String>;

    /// The compiler's `outDir`, when configured.
    fn out_dir(&self) -> Option<&Path>;

    /// Path of the tsconfig the program was built from; anchors the cache
    /// file when there is no `outDir`.
    fn tsconfig_path(&self) -> &Path;
}

/// In-memory [`Program`]. The host adapter lowers its compile into this;
/// tests construct it directly.
#[derive(Debug, Default)]
pub struct ProgramSnapshot {
    pub types: TypeTable,
    pub files: Vec<SourceFile>,
    pub diagnostics: Vec<Diagnostic>,
    pub emit: EmitResult,
    pub out_dir: Option<PathBuf>,
    pub tsconfig_path: PathBuf,
    /// Emitted JS text keyed by path; falls back to disk when absent.
    pub emitted_text: FxHashMap<PathBuf, String>,
}

impl ProgramSnapshot {
    #[must_use]
    pub fn new(types: TypeTable) -> Self {
        Self {
            types,
            tsconfig_path: PathBuf::from("tsconfig.json"),
            ..Self::default()
        }
    }

    pub fn add_file(&mut self, file: SourceFile) -> &mut Self {
        self.files.push(file);
        self
    }

    pub fn set_emitted(&mut self, path: impl Into<PathBuf>, text: impl Into<String>) {
        let path = path.into();
        self.emit.emitted_files.push(path.clone());
        self.emitted_text.insert(path, text.into());
    }
}

impl Program for ProgramSnapshot {
    fn type_table(&self) -> &TypeTable {
        &self.types
    }

    fn source_files(&self) -> &[SourceFile] {
        &self.files
    }

    fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    fn emit_result(&self) -> &EmitResult {
        &self.emit
    }

    fn emitted_text(&self, path: &Path) -> std::io::Result<String> {
        if let Some(text) = self.emitted_text.get(path) {
            return Ok(text.clone());
        }
        std::fs::read_to_string(path)
    }

    fn out_dir(&self) -> Option<&Path> {
        self.out_dir.as_deref()
    }

    fn tsconfig_path(&self) -> &Path {
        &self.tsconfig_path
    }
}
