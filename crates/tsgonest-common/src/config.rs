//! tsgonest configuration: the `tsgonest.json` file.
//!
//! Options are documented in the project manual; the recognized set is
//! `controllers.*`, `transforms.*`, `openapi.*`, and `nestjs.*`. Unknown
//! keys are ignored so configs can be shared with newer tool versions.
//! Validation failures are `config-invalid` errors and abort the run.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{0}")]
    Invalid(String),
}

/// Top-level tsgonest configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TsgonestConfig {
    pub controllers: ControllersConfig,
    pub transforms: TransformsConfig,
    pub openapi: OpenApiConfig,
    pub nestjs: NestJsConfig,
}

/// Which files are scanned for `@Controller` classes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ControllersConfig {
    /// Glob patterns of files to scan. Must be non-empty.
    pub include: Vec<String>,
    /// Glob patterns to skip.
    pub exclude: Vec<String>,
}

impl Default for ControllersConfig {
    fn default() -> Self {
        Self {
            include: vec!["src/**/*.controller.ts".to_string()],
            exclude: Vec::new(),
        }
    }
}

/// Which companion functions are generated, and for which files/types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransformsConfig {
    /// Emit `is`/`validate`/`assert` exports.
    pub validation: bool,
    /// Emit `stringify` exports.
    pub serialization: bool,
    /// Globs restricting which files get companions. Empty = all.
    pub include: Vec<String>,
    /// Type-name patterns to skip.
    pub exclude: Vec<String>,
}

impl Default for TransformsConfig {
    fn default() -> Self {
        Self {
            validation: true,
            serialization: true,
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

/// OpenAPI document generation options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OpenApiConfig {
    /// Output path relative to the config file directory. Empty disables
    /// OpenAPI generation (companions are still emitted).
    pub output: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub contact: Option<serde_json::Value>,
    pub license: Option<serde_json::Value>,
    pub servers: Vec<serde_json::Value>,
    pub security_schemes: serde_json::Map<String, serde_json::Value>,
}

impl Default for OpenApiConfig {
    fn default() -> Self {
        Self {
            output: "dist/openapi.json".to_string(),
            title: None,
            description: None,
            version: None,
            contact: None,
            license: None,
            servers: Vec::new(),
            security_schemes: serde_json::Map::new(),
        }
    }
}

/// NestJS routing conventions the analyzer honors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NestJsConfig {
    /// Prepended to every route.
    pub global_prefix: String,
    pub versioning: Option<VersioningConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VersioningConfig {
    #[serde(rename = "type")]
    pub kind: VersioningType,
    pub default_version: Option<String>,
    /// Segment prefix for URI versioning, e.g. `v` in `/v1/users`.
    pub prefix: String,
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            kind: VersioningType::Uri,
            default_version: None,
            prefix: "v".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersioningType {
    #[serde(rename = "URI")]
    Uri,
    #[serde(rename = "HEADER")]
    Header,
    #[serde(rename = "MEDIA_TYPE")]
    MediaType,
    #[serde(rename = "CUSTOM")]
    Custom,
}

impl TsgonestConfig {
    /// Check the constraints that cannot be expressed in the schema itself.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.controllers.include.is_empty() {
            return Err(ConfigError::Invalid(
                "controllers.include must not be empty".to_string(),
            ));
        }
        if !self.openapi.output.is_empty() && !self.openapi.output.ends_with(".json") {
            return Err(ConfigError::Invalid(format!(
                "openapi.output must end in .json, got '{}'",
                self.openapi.output
            )));
        }
        // Glob syntax errors surface here rather than mid-pipeline.
        build_glob_set(&self.controllers.include)?;
        build_glob_set(&self.controllers.exclude)?;
        build_glob_set(&self.transforms.include)?;
        Ok(())
    }
}

/// Compile a list of glob patterns into a single matcher.
pub fn build_glob_set(patterns: &[String]) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| ConfigError::Invalid(format!("invalid glob '{pattern}': {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| ConfigError::Invalid(format!("cannot build glob set: {e}")))
}

/// SHA-256 of the raw config bytes, lowercase hex. This is the value stored
/// in the post-processing cache.
#[must_use]
pub fn hash_config_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// A configuration loaded from disk, with the context the pipeline needs:
/// the directory it resolves relative paths against and the hash the cache
/// compares.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: TsgonestConfig,
    pub path: PathBuf,
    pub dir: PathBuf,
    pub hash: String,
}

impl LoadedConfig {
    /// Read, parse, and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path)?;
        let config: TsgonestConfig = serde_json::from_slice(&bytes)?;
        config.validate()?;
        let dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        Ok(Self {
            config,
            path: path.to_path_buf(),
            dir,
            hash: hash_config_bytes(&bytes),
        })
    }

    /// An all-defaults config anchored at `dir`, for hosts that run without
    /// a config file. The cache hash is empty in that case.
    #[must_use]
    pub fn defaults_at(dir: &Path) -> Self {
        Self {
            config: TsgonestConfig::default(),
            path: dir.join("tsgonest.json"),
            dir: dir.to_path_buf(),
            hash: String::new(),
        }
    }

    /// Absolute path of the OpenAPI output, or `None` when disabled.
    #[must_use]
    pub fn openapi_output_path(&self) -> Option<PathBuf> {
        if self.config.openapi.output.is_empty() {
            return None;
        }
        Some(self.dir.join(&self.config.openapi.output))
    }
}
