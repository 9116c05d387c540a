//! Pipeline sequencing and the fatal-on-error policy.
//!
//! Fixed order per run: cache check → walker over exported and
//! controller-referenced types → controller analyzer → code generator →
//! manifest writer → OpenAPI assembler → marker rewriter → cache write.
//! Any error-severity diagnostic raised during walking or generation
//! aborts before the first write, leaving previous outputs and the cache
//! untouched. An interrupt requested by the host is honored between
//! components; the run finishes the current component and returns without
//! writing the cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use rustc_hash::FxHashSet;
use tracing::{debug, info};
use tsgonest_codegen::companion::{Companion, CompanionOptions, generate_companion};
use tsgonest_codegen::transforms::marker_rewrite::MarkerRewriter;
use tsgonest_common::config::{LoadedConfig, build_glob_set};
use tsgonest_common::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use tsgonest_common::loc::Loc;
use tsgonest_host::program::Program;
use tsgonest_metadata::model::Metadata;
use tsgonest_metadata::registry::ObjectRegistry;
use tsgonest_metadata::schema::SchemaBuilder;
use tsgonest_openapi::build_document;
use tsgonest_routes::analyze::{AnalyzerOptions, analyze_controllers};
use tsgonest_walker::walk::TypeWalker;

use crate::cache::{CacheEntry, cache_path};
use crate::manifest::{MANIFEST_FILE_NAME, build_manifest};

#[derive(Clone, Debug, Default)]
pub struct PipelineOptions {
    /// Upgrade `type-unsupported` findings to errors.
    pub strict: bool,
    /// Set by the host on SIGINT; checked between components.
    pub interrupt: Option<Arc<AtomicBool>>,
}

impl PipelineOptions {
    fn interrupted(&self) -> bool {
        self.interrupt
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStatus {
    /// Fresh outputs were produced.
    Success,
    /// The cache was valid; nothing was re-run.
    Cached,
    /// An error-severity diagnostic aborted the run before any write.
    Failed,
    /// The host requested an interrupt; the cache was not written.
    Interrupted,
}

impl PipelineStatus {
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Success | Self::Cached => 0,
            Self::Failed => 1,
            Self::Interrupted => 130,
        }
    }
}

#[derive(Debug)]
pub struct PipelineResult {
    pub status: PipelineStatus,
    pub diagnostics: Vec<Diagnostic>,
    pub written_files: Vec<PathBuf>,
}

impl PipelineResult {
    fn finished(status: PipelineStatus, sink: DiagnosticSink, written: Vec<PathBuf>) -> Self {
        Self {
            status,
            diagnostics: sink.into_diagnostics(),
            written_files: written,
        }
    }
}

/// Run the whole post-processing pipeline over one finished compile.
pub fn run_pipeline(
    program: &dyn Program,
    config: &LoadedConfig,
    options: &PipelineOptions,
) -> PipelineResult {
    let mut sink = DiagnosticSink::new(options.strict);

    // compiler diagnostics gate everything
    sink.extend(program.diagnostics().iter().cloned());
    if sink.has_errors() {
        return PipelineResult::finished(PipelineStatus::Failed, sink, Vec::new());
    }

    // cache check
    let cache_file = cache_path(program.out_dir(), program.tsconfig_path());
    let compiler_emitted = !program.emit_result().emitted_files.is_empty();
    if !compiler_emitted {
        if let Some(entry) = CacheEntry::load(&cache_file) {
            if entry.is_valid(&config.hash) {
                info!("post-processing cache valid; skipping pipeline");
                return PipelineResult::finished(PipelineStatus::Cached, sink, Vec::new());
            }
        }
    }

    let glob_sets = match GlobSets::build(config) {
        Ok(sets) => sets,
        Err(message) => {
            sink.report(
                DiagnosticKind::ConfigInvalid,
                &config.path.display().to_string(),
                Loc::none(),
                message,
            );
            return PipelineResult::finished(PipelineStatus::Failed, sink, Vec::new());
        }
    };

    // classes carrying @Controller never receive companions
    let controller_class_names: FxHashSet<String> = program
        .source_files()
        .iter()
        .flat_map(|f| f.classes.iter())
        .filter(|c| c.is_controller())
        .map(|c| c.name.clone())
        .collect();

    // walker over all exported types
    let mut registry = ObjectRegistry::default();
    let table = program.type_table();
    let mut entries: Vec<(String, Metadata, PathBuf)> = Vec::new();
    {
        let mut walker = TypeWalker::new(table, &mut registry, &mut sink);
        for file in program.source_files() {
            if !glob_sets.transforms_file_included(&file.path) {
                continue;
            }
            let Some(emitted_js) = &file.emitted_js else {
                continue;
            };
            for entry in &file.exported_types {
                if controller_class_names.contains(&entry.name) {
                    continue;
                }
                if glob_sets.type_excluded(&entry.name) {
                    continue;
                }
                match walker.walk_entry(&entry.name, entry.ty, &file.path, entry.loc) {
                    Ok(metadata) => {
                        entries.push((entry.name.clone(), metadata, emitted_js.clone()));
                    }
                    Err(error) => {
                        walker.sink().push(Diagnostic::error(
                            &file.path,
                            entry.loc,
                            error.to_string(),
                            DiagnosticKind::TypeUnsupported.code(),
                        ));
                    }
                }
            }
        }
    }
    if sink.has_errors() {
        return PipelineResult::finished(PipelineStatus::Failed, sink, Vec::new());
    }
    if options.interrupted() {
        return PipelineResult::finished(PipelineStatus::Interrupted, sink, Vec::new());
    }

    let controller_files: Vec<tsgonest_host::ast::SourceFile> = program
        .source_files()
        .iter()
        .filter(|f| glob_sets.controller_file_included(&f.path))
        .cloned()
        .collect();
    let routes = {
        let mut walker = TypeWalker::new(table, &mut registry, &mut sink);
        let analyzer_options = AnalyzerOptions {
            global_prefix: config.config.nestjs.global_prefix.clone(),
            versioning: config.config.nestjs.versioning.clone(),
        };
        match analyze_controllers(&controller_files, table, &mut walker, &analyzer_options) {
            Ok(routes) => routes,
            Err(error) => {
                sink.push(Diagnostic::error(
                    &config.path.display().to_string(),
                    Loc::none(),
                    error.to_string(),
                    DiagnosticKind::TypeUnsupported.code(),
                ));
                return PipelineResult::finished(PipelineStatus::Failed, sink, Vec::new());
            }
        }
    };
    if sink.has_errors() {
        return PipelineResult::finished(PipelineStatus::Failed, sink, Vec::new());
    }
    if options.interrupted() {
        return PipelineResult::finished(PipelineStatus::Interrupted, sink, Vec::new());
    }

    // code generator (pure phase; writes happen afterwards)
    let companion_options = CompanionOptions {
        validation: config.config.transforms.validation,
        serialization: config.config.transforms.serialization,
    };
    let schemas = SchemaBuilder::new(&registry);
    let companions: Vec<Companion> = entries
        .iter()
        .map(|(name, metadata, emitted_js)| {
            let schema = entry_schema(&schemas, name, metadata, &registry);
            generate_companion(name, metadata, &registry, emitted_js, &schema, companion_options)
        })
        .collect();
    debug!(companions = companions.len(), "generated companions");

    let mut written: Vec<PathBuf> = Vec::new();

    // companion writes fan out; each file is independent
    let write_failures: Vec<String> = companions
        .par_iter()
        .flat_map_iter(|companion| {
            [
                (&companion.js_path, &companion.js),
                (&companion.dts_path, &companion.dts),
            ]
            .into_iter()
            .filter_map(|(path, text)| {
                write_file(path, text)
                    .err()
                    .map(|e| format!("cannot write {}: {e}", path.display()))
            })
        })
        .collect();
    for failure in write_failures {
        sink.push(Diagnostic::error(
            &config.path.display().to_string(),
            Loc::none(),
            failure,
            DiagnosticKind::CompilerError.code(),
        ));
    }
    if sink.has_errors() {
        return PipelineResult::finished(PipelineStatus::Failed, sink, Vec::new());
    }
    for companion in &companions {
        written.push(companion.js_path.clone());
        written.push(companion.dts_path.clone());
    }
    if options.interrupted() {
        return PipelineResult::finished(PipelineStatus::Interrupted, sink, written);
    }

    // manifest
    let manifest_dir = program
        .out_dir()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| cache_file.parent().unwrap_or(Path::new(".")).to_path_buf());
    let manifest_path = manifest_dir.join(MANIFEST_FILE_NAME);
    let manifest = build_manifest(&companions, &routes, &registry);
    let manifest_text = format!("{}\n", stable_json(&manifest));
    if let Err(e) = write_file(&manifest_path, &manifest_text) {
        sink.push(Diagnostic::error(
            &manifest_path.display().to_string(),
            Loc::none(),
            format!("cannot write manifest: {e}"),
            DiagnosticKind::CompilerError.code(),
        ));
        return PipelineResult::finished(PipelineStatus::Failed, sink, written);
    }
    written.push(manifest_path);
    if options.interrupted() {
        return PipelineResult::finished(PipelineStatus::Interrupted, sink, written);
    }

    // OpenAPI document, when configured
    if let Some(openapi_path) = config.openapi_output_path() {
        let document = build_document(&routes, &registry, &config.config.openapi, &mut sink);
        let text = format!("{}\n", stable_json(&document));
        if let Err(e) = write_file(&openapi_path, &text) {
            sink.push(Diagnostic::error(
                &openapi_path.display().to_string(),
                Loc::none(),
                format!("cannot write OpenAPI document: {e}"),
                DiagnosticKind::CompilerError.code(),
            ));
            return PipelineResult::finished(PipelineStatus::Failed, sink, written);
        }
        written.push(openapi_path);
    }
    if options.interrupted() {
        return PipelineResult::finished(PipelineStatus::Interrupted, sink, written);
    }

    // marker rewriter over the compiler's emitted JS
    let companion_paths = companions
        .iter()
        .map(|c| (c.type_name.clone(), c.js_path.clone()))
        .collect();
    let rewriter = MarkerRewriter::new(companion_paths);
    for emitted in &program.emit_result().emitted_files {
        if emitted.extension().and_then(|e| e.to_str()) != Some("js") {
            continue;
        }
        let Ok(text) = program.emitted_text(emitted) else {
            continue;
        };
        if let Some(rewritten) = rewriter.rewrite_file(emitted, &text, &mut sink) {
            if let Err(e) = write_file(emitted, &rewritten) {
                sink.push(Diagnostic::error(
                    &emitted.display().to_string(),
                    Loc::none(),
                    format!("cannot rewrite emitted file: {e}"),
                    DiagnosticKind::CompilerError.code(),
                ));
                return PipelineResult::finished(PipelineStatus::Failed, sink, written);
            }
        }
    }
    if options.interrupted() {
        return PipelineResult::finished(PipelineStatus::Interrupted, sink, written);
    }

    // cache write is the last side effect
    let entry = CacheEntry::new(config.hash.clone(), written.clone());
    if let Err(e) = entry.write_atomic(&cache_file) {
        // a missing cache only costs the next run a rebuild
        sink.report(
            DiagnosticKind::ConstraintInvalid,
            &cache_file.display().to_string(),
            Loc::none(),
            format!("cannot write cache entry: {e}"),
        );
    }

    info!(files = written.len(), "pipeline complete");
    PipelineResult::finished(PipelineStatus::Success, sink, written)
}

/// The `schema<T>` payload: the full object schema when the entry is
/// exactly the named object, otherwise the node projection.
fn entry_schema(
    schemas: &SchemaBuilder<'_>,
    entry_name: &str,
    metadata: &Metadata,
    registry: &ObjectRegistry,
) -> serde_json::Value {
    if metadata.objects.len() == 1 && metadata.alternative_count() == 1 {
        let id = metadata.objects[0];
        if registry.get(id).name == entry_name {
            return schemas.object_schema(id);
        }
    }
    schemas.node_schema(metadata)
}

fn stable_json(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

fn write_file(path: &Path, text: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, text)
}

/// The compiled include/exclude matchers from the configuration.
struct GlobSets {
    controllers_include: globset::GlobSet,
    controllers_exclude: globset::GlobSet,
    transforms_include: globset::GlobSet,
    transforms_include_empty: bool,
    type_exclude: globset::GlobSet,
}

impl GlobSets {
    fn build(config: &LoadedConfig) -> Result<Self, String> {
        let c = &config.config;
        Ok(Self {
            controllers_include: build_glob_set(&c.controllers.include)
                .map_err(|e| e.to_string())?,
            controllers_exclude: build_glob_set(&c.controllers.exclude)
                .map_err(|e| e.to_string())?,
            transforms_include: build_glob_set(&c.transforms.include)
                .map_err(|e| e.to_string())?,
            transforms_include_empty: c.transforms.include.is_empty(),
            type_exclude: build_glob_set(&c.transforms.exclude).map_err(|e| e.to_string())?,
        })
    }

    fn controller_file_included(&self, path: &str) -> bool {
        self.controllers_include.is_match(path) && !self.controllers_exclude.is_match(path)
    }

    fn transforms_file_included(&self, path: &str) -> bool {
        self.transforms_include_empty || self.transforms_include.is_match(path)
    }

    fn type_excluded(&self, type_name: &str) -> bool {
        self.type_exclude.is_match(type_name)
    }
}
