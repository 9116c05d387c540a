//! Path composition: global prefix, version segment, controller path,
//! method path.

use tsgonest_common::config::{VersioningConfig, VersioningType};

/// Join path fragments into a normalized `/`-leading pattern.
#[must_use]
pub fn join_path(segments: &[&str]) -> String {
    let mut out = String::from("/");
    for segment in segments {
        for part in segment.split('/') {
            if part.is_empty() {
                continue;
            }
            if !out.ends_with('/') {
                out.push('/');
            }
            out.push_str(part);
        }
    }
    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

/// Compose the full route pattern for one (possibly versioned) route.
/// URI versioning prepends `<prefix><version>/` after the global prefix;
/// every other scheme (header, media-type, custom) leaves the path alone.
/// An absent version elides the segment entirely.
#[must_use]
pub fn compose_path(
    global_prefix: &str,
    versioning: Option<&VersioningConfig>,
    version: Option<&str>,
    controller_path: &str,
    method_path: &str,
) -> String {
    let version_segment = match (versioning, version) {
        (Some(config), Some(version)) if config.kind == VersioningType::Uri => {
            format!("{}{version}", config.prefix)
        }
        _ => String::new(),
    };
    join_path(&[global_prefix, &version_segment, controller_path, method_path])
}
