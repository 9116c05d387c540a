//! String format predicates.
//!
//! One table maps format names to the regex each generated companion
//! embeds. The table is computed once per process; the Rust side compiles
//! every entry at construction so a bad source is caught in tests, not in
//! generated output.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;

/// One format check: the regex source embedded into companions, plus an
/// optional extra JS condition (`{v}` is replaced by the value expression).
#[derive(Clone, Copy, Debug)]
pub struct FormatSpec {
    pub regex: &'static str,
    pub extra: Option<&'static str>,
}

static FORMATS: Lazy<BTreeMap<&'static str, FormatSpec>> = Lazy::new(|| {
    let entries: &[(&str, FormatSpec)] = &[
        (
            "email",
            FormatSpec {
                regex: r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$",
                extra: None,
            },
        ),
        (
            "uuid",
            FormatSpec {
                regex: r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
                extra: None,
            },
        ),
        (
            "date",
            FormatSpec {
                regex: r"^\d{4}-\d{2}-\d{2}$",
                extra: None,
            },
        ),
        (
            "date-time",
            FormatSpec {
                regex: r"^\d{4}-\d{2}-\d{2}[Tt]\d{2}:\d{2}:\d{2}(\.\d+)?([Zz]|[+-]\d{2}:\d{2})$",
                extra: Some("!Number.isNaN(Date.parse({v}))"),
            },
        ),
        (
            "time",
            FormatSpec {
                regex: r"^\d{2}:\d{2}:\d{2}(\.\d+)?$",
                extra: None,
            },
        ),
        (
            "url",
            FormatSpec {
                regex: r"^https?://[^\s/$.?#].[^\s]*$",
                extra: None,
            },
        ),
        (
            "ipv4",
            FormatSpec {
                regex: r"^(25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)(\.(25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)){3}$",
                extra: None,
            },
        ),
        (
            "ipv6",
            FormatSpec {
                regex: r"^(([0-9a-fA-F]{1,4}:){7}[0-9a-fA-F]{1,4}|([0-9a-fA-F]{1,4}:){1,7}:|([0-9a-fA-F]{1,4}:){1,6}:[0-9a-fA-F]{1,4}|::([0-9a-fA-F]{1,4}:){0,6}[0-9a-fA-F]{1,4}|::)$",
                extra: None,
            },
        ),
        (
            "hex",
            FormatSpec {
                regex: r"^[0-9a-fA-F]+$",
                extra: None,
            },
        ),
        (
            "base64url",
            FormatSpec {
                regex: r"^[A-Za-z0-9_-]+$",
                extra: None,
            },
        ),
        (
            "nanoid",
            FormatSpec {
                regex: r"^[A-Za-z0-9_-]{21}$",
                extra: None,
            },
        ),
        (
            "cuid",
            FormatSpec {
                regex: r"^c[0-9a-z]{8,}$",
                extra: None,
            },
        ),
        (
            "cuid2",
            FormatSpec {
                regex: r"^[a-z][0-9a-z]{7,31}$",
                extra: None,
            },
        ),
        (
            "ulid",
            FormatSpec {
                regex: r"^[0-9A-HJKMNP-TV-Z]{26}$",
                extra: None,
            },
        ),
        (
            "jwt",
            FormatSpec {
                regex: r"^[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]*$",
                extra: None,
            },
        ),
    ];
    entries.iter().copied().collect()
});

/// Look up a format. `None` means the format is unknown to the generator
/// (it still flows into the OpenAPI document untouched).
#[must_use]
pub fn lookup(format: &str) -> Option<FormatSpec> {
    FORMATS.get(format).copied()
}

/// Stable JS const name for a format's compiled regex.
#[must_use]
pub fn const_name(format: &str) -> String {
    let safe: String = format
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("__f_{safe}")
}

/// The `const __f_x = new RegExp("...");` declaration for a format.
#[must_use]
pub fn const_decl(format: &str, spec: FormatSpec) -> String {
    format!(
        "const {} = new RegExp(\"{}\");",
        const_name(format),
        crate::writer::escape_js(spec.regex)
    )
}

/// The check expression for `value_expr` against a format.
#[must_use]
pub fn check_expr(format: &str, spec: FormatSpec, value_expr: &str) -> String {
    let base = format!("{}.test({value_expr})", const_name(format));
    match spec.extra {
        Some(extra) => format!("{base} && {}", extra.replace("{v}", value_expr)),
        None => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_format_source_compiles() {
        for (name, spec) in FORMATS.iter() {
            assert!(
                regex::Regex::new(spec.regex).is_ok(),
                "format '{name}' has an uncompilable source"
            );
        }
    }

    #[test]
    fn known_formats_cover_the_documented_set() {
        for name in [
            "email", "uuid", "date-time", "url", "ipv4", "ipv6", "hex", "base64url", "nanoid",
            "cuid", "cuid2", "ulid", "jwt",
        ] {
            assert!(lookup(name).is_some(), "missing format '{name}'");
        }
        assert!(lookup("credit-card").is_none());
    }

    #[test]
    fn format_regexes_accept_canonical_values() {
        let cases = [
            ("email", "user@example.com", true),
            ("email", "not an email", false),
            ("uuid", "123e4567-e89b-12d3-a456-426614174000", true),
            ("uuid", "123e4567", false),
            ("ipv4", "192.168.0.1", true),
            ("ipv4", "999.1.1.1", false),
            ("ulid", "01ARZ3NDEKTSV4RRFFQ69G5FAV", true),
            ("hex", "deadBEEF", true),
            ("hex", "xyz", false),
            ("jwt", "aaa.bbb.ccc", true),
        ];
        for (format, value, expected) in cases {
            let spec = lookup(format).unwrap();
            let re = regex::Regex::new(spec.regex).unwrap();
            assert_eq!(re.is_match(value), expected, "{format} vs {value}");
        }
    }

    #[test]
    fn const_decl_escapes_backslashes() {
        let spec = lookup("date").unwrap();
        let decl = const_decl("date", spec);
        assert_eq!(decl, "const __f_date = new RegExp(\"^\\\\d{4}-\\\\d{2}-\\\\d{2}$\");");
    }

    #[test]
    fn check_expr_appends_extra_condition() {
        let spec = lookup("date-time").unwrap();
        let expr = check_expr("date-time", spec, "t");
        assert!(expr.starts_with("__f_date_time.test(t)"));
        assert!(expr.contains("Date.parse(t)"));
    }
}
