//! The marker rewriter.
//!
//! User code calls `is<T>(x)` / `validate<T>(x)` / `assert<T>(x)` /
//! `stringify<T>(x)` imported from the virtual module `tsgonest`. The
//! compiler's emit keeps those calls intact (via the custom emit
//! callback); this pass retargets them at the generated companions:
//!
//! - the callee becomes the companion export (`isCreateUserDto`),
//! - the virtual import is replaced by named imports from the companion's
//!   relative path,
//! - a sentinel comment on line 1 marks the file as rewritten, making the
//!   pass idempotent.
//!
//! Module format is detected from the existing import form: an `import`
//! binding means ES modules, a `require` call means CommonJS.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use memchr::memmem;
use once_cell::sync::Lazy;
use regex::Regex;
use tsgonest_common::diagnostics::{DiagnosticKind, DiagnosticSink};
use tsgonest_common::loc::Loc;

/// First-line marker of an already-rewritten file.
pub const SENTINEL: &str = "/* tsgonest:rewritten */";

/// The marker function names recognized in imports and calls.
const MARKERS: [&str; 5] = ["is", "validate", "assert", "stringify", "serialize"];

static ESM_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^[ \t]*import\s*\{([^}]*)\}\s*from\s*["']tsgonest["'];?[ \t]*\r?\n?"#)
        .expect("static regex")
});
static CJS_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?m)^[ \t]*(?:const|var|let)\s*\{([^}]*)\}\s*=\s*require\(\s*["']tsgonest["']\s*\);?[ \t]*\r?\n?"#,
    )
    .expect("static regex")
});
static MARKER_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(is|validate|assert|stringify|serialize)<([A-Za-z_$][A-Za-z0-9_$]*)>\(")
        .expect("static regex")
});

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ModuleFormat {
    Esm,
    Cjs,
}

/// Rewrites emitted files against a known companion set.
pub struct MarkerRewriter {
    /// Type name → companion JS path.
    companions: BTreeMap<String, PathBuf>,
}

impl MarkerRewriter {
    #[must_use]
    pub fn new(companions: BTreeMap<String, PathBuf>) -> Self {
        Self { companions }
    }

    /// Rewrite one emitted file. Returns `None` when nothing needs to
    /// change: the file is already rewritten, or it never touches the
    /// virtual module.
    pub fn rewrite_file(
        &self,
        file_path: &Path,
        text: &str,
        sink: &mut DiagnosticSink,
    ) -> Option<String> {
        if text.starts_with(SENTINEL) {
            return None;
        }
        // cheap pre-scan before any regex work
        memmem::find(text.as_bytes(), b"tsgonest")?;

        let (format, _, imported) = self.find_import(text)?;

        // resolve marker calls; remember which companion exports each file
        // ends up needing
        let mut needed: BTreeMap<PathBuf, Vec<String>> = BTreeMap::new();
        let file_str = file_path.display().to_string();
        let rewritten = MARKER_CALL.replace_all(text, |caps: &regex::Captures<'_>| {
            let marker = &caps[1];
            let type_name = &caps[2];
            if !imported.iter().any(|name| name.as_str() == marker) {
                return caps[0].to_string();
            }
            match self.companions.get(type_name) {
                Some(companion) => {
                    // `serialize` is the legacy alias of `stringify`
                    let export_prefix = if marker == "serialize" { "stringify" } else { marker };
                    let export = format!("{export_prefix}{type_name}");
                    let entry = needed.entry(companion.clone()).or_default();
                    if !entry.contains(&export) {
                        entry.push(export.clone());
                    }
                    format!("{export}(")
                }
                None => {
                    sink.report(
                        DiagnosticKind::TypeUnsupported,
                        &file_str,
                        Loc::none(),
                        format!("marker call references '{type_name}', which has no companion"),
                    );
                    caps[0].to_string()
                }
            }
        });

        // swap the virtual import for companion imports; call rewriting
        // never touches the import line, but re-locate it anyway so the
        // span is valid in the rewritten text
        let (_, import_span, _) = self.find_import(&rewritten)?;
        let from_dir = file_path.parent().unwrap_or(Path::new("."));
        let mut import_lines = String::new();
        for (companion, mut exports) in needed {
            exports.sort();
            let specifier = relative_specifier(from_dir, &companion);
            match format {
                ModuleFormat::Esm => {
                    import_lines.push_str(&format!(
                        "import {{ {} }} from \"{specifier}\";\n",
                        exports.join(", ")
                    ));
                }
                ModuleFormat::Cjs => {
                    import_lines.push_str(&format!(
                        "const {{ {} }} = require(\"{specifier}\");\n",
                        exports.join(", ")
                    ));
                }
            }
        }

        let mut out = String::with_capacity(rewritten.len() + SENTINEL.len() + 1);
        out.push_str(SENTINEL);
        out.push('\n');
        out.push_str(&rewritten[..import_span.0]);
        out.push_str(&import_lines);
        out.push_str(&rewritten[import_span.1..]);
        Some(out)
    }

    /// Find the `tsgonest` import and its byte span in `text`.
    fn find_import(&self, text: &str) -> Option<(ModuleFormat, (usize, usize), Vec<String>)> {
        for (regex, format) in [(&ESM_IMPORT, ModuleFormat::Esm), (&CJS_IMPORT, ModuleFormat::Cjs)] {
            if let Some(caps) = regex.captures(text) {
                let all = caps.get(0)?;
                let names: Vec<String> = caps
                    .get(1)
                    .map(|m| {
                        m.as_str()
                            .split(',')
                            .map(|n| n.trim().to_string())
                            .filter(|n| MARKERS.contains(&n.as_str()))
                            .collect()
                    })
                    .unwrap_or_default();
                return Some((format, (all.start(), all.end()), names));
            }
        }
        None
    }
}

/// `./`-style relative module specifier from `from_dir` to `to`.
#[must_use]
pub fn relative_specifier(from_dir: &Path, to: &Path) -> String {
    let from: Vec<&std::ffi::OsStr> = from_dir
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect();
    let target: Vec<&std::ffi::OsStr> = to
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect();

    let common = from
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    for _ in common..from.len() {
        parts.push("..".to_string());
    }
    for part in &target[common..] {
        parts.push(part.to_string_lossy().into_owned());
    }
    let joined = parts.join("/");
    if joined.starts_with("..") {
        joined
    } else {
        format!("./{joined}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rewriter() -> MarkerRewriter {
        let mut companions = BTreeMap::new();
        companions.insert(
            "CreateUserDto".to_string(),
            PathBuf::from("dist/user.CreateUserDto.tsgonest.js"),
        );
        companions.insert(
            "UserResponse".to_string(),
            PathBuf::from("dist/user.UserResponse.tsgonest.js"),
        );
        MarkerRewriter::new(companions)
    }

    #[test]
    fn rewrites_esm_import_and_call() {
        let text = "import { is } from \"tsgonest\";\nconst ok = is<CreateUserDto>(body);\n";
        let mut sink = DiagnosticSink::new(false);
        let out = rewriter()
            .rewrite_file(Path::new("dist/user.controller.js"), text, &mut sink)
            .unwrap();
        let expected = format!(
            "{SENTINEL}\nimport {{ isCreateUserDto }} from \"./user.CreateUserDto.tsgonest.js\";\nconst ok = isCreateUserDto(body);\n"
        );
        assert_eq!(out, expected);
        assert_eq!(sink.diagnostics().len(), 0);
    }

    #[test]
    fn rewrites_cjs_require() {
        let text =
            "const { validate } = require(\"tsgonest\");\nconst r = validate<CreateUserDto>(x);\n";
        let mut sink = DiagnosticSink::new(false);
        let out = rewriter()
            .rewrite_file(Path::new("dist/user.controller.js"), text, &mut sink)
            .unwrap();
        assert!(out.starts_with(SENTINEL));
        assert!(out.contains(
            "const { validateCreateUserDto } = require(\"./user.CreateUserDto.tsgonest.js\");"
        ));
        assert!(out.contains("validateCreateUserDto(x)"));
    }

    #[test]
    fn already_rewritten_files_are_untouched() {
        let text = format!("{SENTINEL}\nimport {{ isCreateUserDto }} from \"./user.CreateUserDto.tsgonest.js\";\n");
        let mut sink = DiagnosticSink::new(false);
        assert!(
            rewriter()
                .rewrite_file(Path::new("dist/user.controller.js"), &text, &mut sink)
                .is_none()
        );
    }

    #[test]
    fn files_without_markers_are_skipped() {
        let mut sink = DiagnosticSink::new(false);
        assert!(
            rewriter()
                .rewrite_file(Path::new("dist/app.js"), "console.log(1);\n", &mut sink)
                .is_none()
        );
    }

    #[test]
    fn serialize_alias_targets_stringify_export() {
        let text =
            "import { serialize } from \"tsgonest\";\nconst s = serialize<UserResponse>(u);\n";
        let mut sink = DiagnosticSink::new(false);
        let out = rewriter()
            .rewrite_file(Path::new("dist/user.service.js"), text, &mut sink)
            .unwrap();
        assert!(out.contains("stringifyUserResponse(u)"));
        assert!(out.contains(
            "import { stringifyUserResponse } from \"./user.UserResponse.tsgonest.js\";"
        ));
    }

    #[test]
    fn unknown_type_argument_warns_and_keeps_call() {
        let text = "import { is } from \"tsgonest\";\nconst ok = is<Mystery>(x);\n";
        let mut sink = DiagnosticSink::new(false);
        let out = rewriter()
            .rewrite_file(Path::new("dist/a.js"), text, &mut sink)
            .unwrap();
        assert!(out.contains("is<Mystery>(x)"));
        assert_eq!(sink.diagnostics().len(), 1);
    }

    #[test]
    fn multiple_types_group_imports_per_companion() {
        let text = "import { is, assert } from \"tsgonest\";\nis<CreateUserDto>(a); assert<UserResponse>(b); is<UserResponse>(c);\n";
        let mut sink = DiagnosticSink::new(false);
        let out = rewriter()
            .rewrite_file(Path::new("dist/user.controller.js"), text, &mut sink)
            .unwrap();
        assert!(out.contains(
            "import { isCreateUserDto } from \"./user.CreateUserDto.tsgonest.js\";"
        ));
        assert!(out.contains(
            "import { assertUserResponse, isUserResponse } from \"./user.UserResponse.tsgonest.js\";"
        ));
    }

    #[test]
    fn relative_specifiers_cross_directories() {
        assert_eq!(
            relative_specifier(Path::new("dist/api"), Path::new("dist/user.X.tsgonest.js")),
            "../user.X.tsgonest.js"
        );
        assert_eq!(
            relative_specifier(Path::new("dist"), Path::new("dist/api/user.X.tsgonest.js")),
            "./api/user.X.tsgonest.js"
        );
    }

    #[test]
    fn rewrite_is_idempotent_end_to_end() {
        let text = "import { is } from \"tsgonest\";\nconst ok = is<CreateUserDto>(body);\n";
        let mut sink = DiagnosticSink::new(false);
        let rewriter = rewriter();
        let first = rewriter
            .rewrite_file(Path::new("dist/user.controller.js"), text, &mut sink)
            .unwrap();
        // a second pass over the rewritten output is a no-op
        assert!(
            rewriter
                .rewrite_file(Path::new("dist/user.controller.js"), &first, &mut sink)
                .is_none()
        );
    }
}
