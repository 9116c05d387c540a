//! Individual constraint checks shared by the `is` and `validate`
//! lowerings.
//!
//! Each check is a `(kind, expression, expected)` triple: the predicate
//! lowering ANDs the expressions together, the full validator emits one
//! error record per failed expression, keyed by `kind` so per-constraint
//! messages can override.

use std::collections::BTreeSet;

use tsgonest_metadata::constraints::{ConstraintBag, Transform};

use crate::formats;
use crate::writer::escape_js;

/// Epsilon for `multipleOf` with non-integer divisors, applied to the
/// quotient: `|q - round(q)| < 1e-9`.
pub const MULTIPLE_OF_EPSILON: &str = "1e-9";

/// Collected per-companion artifacts: which format regexes and compiled
/// patterns the emitted module must declare.
#[derive(Debug, Default)]
pub struct GenArtifacts {
    pub formats: BTreeSet<String>,
    patterns: Vec<String>,
}

impl GenArtifacts {
    /// Intern a pattern, returning its stable const name. Identical
    /// patterns share a const; numbering follows first use.
    pub fn pattern_const(&mut self, pattern: &str) -> String {
        if let Some(index) = self.patterns.iter().position(|p| p == pattern) {
            return format!("__p{index}");
        }
        self.patterns.push(pattern.to_string());
        format!("__p{}", self.patterns.len() - 1)
    }

    pub fn use_format(&mut self, format: &str) {
        self.formats.insert(format.to_string());
    }

    /// The const declarations this companion needs, in stable order:
    /// formats sorted by name, then patterns in first-use order.
    #[must_use]
    pub fn const_decls(&self) -> Vec<String> {
        let mut decls = Vec::new();
        for format in &self.formats {
            if let Some(spec) = formats::lookup(format) {
                decls.push(formats::const_decl(format, spec));
            }
        }
        for (index, pattern) in self.patterns.iter().enumerate() {
            decls.push(format!(
                "const __p{index} = new RegExp(\"{}\");",
                escape_js(pattern)
            ));
        }
        decls
    }
}

/// One lowered constraint check.
#[derive(Debug)]
pub struct Check {
    /// Constraint kind (`minLength`, `format`, ...), for message lookup.
    pub kind: String,
    /// Boolean JS expression that must hold.
    pub expr: String,
    /// `expected` string for the error record.
    pub expected: String,
}

fn check(kind: &str, expr: String, expected: String) -> Check {
    Check {
        kind: kind.to_string(),
        expr,
        expected,
    }
}

/// The transform expression applied before validation, e.g.
/// `v.trim().toLowerCase()`. Returns `None` when there are no transforms.
#[must_use]
pub fn transform_expr(bag: &ConstraintBag, val: &str) -> Option<String> {
    if bag.transforms.is_empty() {
        return None;
    }
    let mut expr = val.to_string();
    for transform in &bag.transforms {
        let method = match transform {
            Transform::Trim => "trim",
            Transform::ToLowerCase => "toLowerCase",
            Transform::ToUpperCase => "toUpperCase",
        };
        expr.push('.');
        expr.push_str(method);
        expr.push_str("()");
    }
    Some(expr)
}

/// Constraint checks for a string value (the `typeof` guard is separate).
#[must_use]
pub fn string_checks(bag: &ConstraintBag, val: &str, artifacts: &mut GenArtifacts) -> Vec<Check> {
    let mut checks = Vec::new();
    if let Some(min) = bag.min_length {
        checks.push(check(
            "minLength",
            format!("{val}.length >= {min}"),
            format!("minLength {min}"),
        ));
    }
    if let Some(max) = bag.max_length {
        checks.push(check(
            "maxLength",
            format!("{val}.length <= {max}"),
            format!("maxLength {max}"),
        ));
    }
    if let Some(format_name) = &bag.format {
        if let Some(spec) = formats::lookup(format_name) {
            artifacts.use_format(format_name);
            checks.push(check(
                "format",
                formats::check_expr(format_name, spec, val),
                format!("format {format_name}"),
            ));
        }
    }
    if let Some(pattern) = &bag.pattern {
        let const_name = artifacts.pattern_const(pattern);
        checks.push(check(
            "pattern",
            format!("{const_name}.test({val})"),
            format!("pattern {pattern}"),
        ));
    }
    if let Some(prefix) = &bag.starts_with {
        checks.push(check(
            "startsWith",
            format!("{val}.startsWith(\"{}\")", escape_js(prefix)),
            format!("startsWith {prefix}"),
        ));
    }
    if let Some(suffix) = &bag.ends_with {
        checks.push(check(
            "endsWith",
            format!("{val}.endsWith(\"{}\")", escape_js(suffix)),
            format!("endsWith {suffix}"),
        ));
    }
    if let Some(needle) = &bag.includes {
        checks.push(check(
            "includes",
            format!("{val}.includes(\"{}\")", escape_js(needle)),
            format!("includes {needle}"),
        ));
    }
    if bag.uppercase {
        checks.push(check(
            "uppercase",
            format!("{val} === {val}.toUpperCase()"),
            "uppercase".to_string(),
        ));
    }
    if bag.lowercase {
        checks.push(check(
            "lowercase",
            format!("{val} === {val}.toLowerCase()"),
            "lowercase".to_string(),
        ));
    }
    checks
}

/// Constraint checks for a number value (after `typeof` and finiteness).
#[must_use]
pub fn number_checks(bag: &ConstraintBag, val: &str) -> Vec<Check> {
    let mut checks = Vec::new();
    if let Some(kind) = bag.numeric_kind {
        if kind.is_integer() {
            checks.push(check(
                "type",
                format!("Number.isInteger({val})"),
                kind.format_name().to_string(),
            ));
        }
        if let Some((low, high)) = kind.implied_range() {
            checks.push(check(
                "type",
                format!(
                    "{val} >= {} && {val} <= {}",
                    js_number(low),
                    js_number(high)
                ),
                kind.format_name().to_string(),
            ));
        }
    }
    if let Some(min) = bag.minimum {
        checks.push(check(
            "minimum",
            format!("{val} >= {}", js_number(min)),
            format!("minimum {}", js_number(min)),
        ));
    }
    if let Some(max) = bag.maximum {
        checks.push(check(
            "maximum",
            format!("{val} <= {}", js_number(max)),
            format!("maximum {}", js_number(max)),
        ));
    }
    if let Some(min) = bag.exclusive_minimum {
        checks.push(check(
            "exclusiveMinimum",
            format!("{val} > {}", js_number(min)),
            format!("exclusiveMinimum {}", js_number(min)),
        ));
    }
    if let Some(max) = bag.exclusive_maximum {
        checks.push(check(
            "exclusiveMaximum",
            format!("{val} < {}", js_number(max)),
            format!("exclusiveMaximum {}", js_number(max)),
        ));
    }
    if let Some(divisor) = bag.multiple_of {
        let expr = if divisor.fract() == 0.0 {
            format!("{val} % {} === 0", js_number(divisor))
        } else {
            // decimal divisors go through the quotient with an epsilon
            let d = js_number(divisor);
            format!(
                "Math.abs({val} / {d} - Math.round({val} / {d})) < {MULTIPLE_OF_EPSILON}"
            )
        };
        checks.push(check(
            "multipleOf",
            expr,
            format!("multipleOf {}", js_number(divisor)),
        ));
    }
    checks
}

/// Size and uniqueness checks for an array value.
#[must_use]
pub fn array_checks(bag: &ConstraintBag, val: &str) -> Vec<Check> {
    let mut checks = Vec::new();
    if let Some(min) = bag.min_items {
        checks.push(check(
            "minItems",
            format!("{val}.length >= {min}"),
            format!("minItems {min}"),
        ));
    }
    if let Some(max) = bag.max_items {
        checks.push(check(
            "maxItems",
            format!("{val}.length <= {max}"),
            format!("maxItems {max}"),
        ));
    }
    if bag.unique_items {
        checks.push(check(
            "uniqueItems",
            format!("new Set({val}).size === {val}.length"),
            "uniqueItems".to_string(),
        ));
    }
    checks
}

/// Render an f64 the way the generated JS should read it.
#[must_use]
pub fn js_number(n: f64) -> String {
    tsgonest_metadata::model::format_number(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_checks_cover_bounds_and_format() {
        let bag = ConstraintBag {
            min_length: Some(1),
            max_length: Some(255),
            format: Some("email".to_string()),
            ..Default::default()
        };
        let mut artifacts = GenArtifacts::default();
        let checks = string_checks(&bag, "t", &mut artifacts);
        assert_eq!(checks.len(), 3);
        assert_eq!(checks[0].expr, "t.length >= 1");
        assert!(checks[2].expr.contains("__f_email.test(t)"));
        assert!(artifacts.formats.contains("email"));
    }

    #[test]
    fn integer_kind_emits_range_and_integrality() {
        let bag = ConstraintBag {
            numeric_kind: Some(tsgonest_metadata::constraints::NumericKind::Uint32),
            ..Default::default()
        };
        let checks = number_checks(&bag, "v");
        assert!(checks.iter().any(|c| c.expr == "Number.isInteger(v)"));
        assert!(checks.iter().any(|c| c.expr.contains("v <= 4294967295")));
    }

    #[test]
    fn decimal_multiple_of_uses_epsilon() {
        let bag = ConstraintBag {
            multiple_of: Some(0.01),
            ..Default::default()
        };
        let checks = number_checks(&bag, "v");
        assert_eq!(checks.len(), 1);
        assert!(checks[0].expr.contains("Math.round(v / 0.01)"));
        assert!(checks[0].expr.contains("1e-9"));
    }

    #[test]
    fn integral_multiple_of_uses_modulo() {
        let bag = ConstraintBag {
            multiple_of: Some(5.0),
            ..Default::default()
        };
        let checks = number_checks(&bag, "v");
        assert_eq!(checks[0].expr, "v % 5 === 0");
    }

    #[test]
    fn patterns_are_interned() {
        let mut artifacts = GenArtifacts::default();
        assert_eq!(artifacts.pattern_const("^a+$"), "__p0");
        assert_eq!(artifacts.pattern_const("^b+$"), "__p1");
        assert_eq!(artifacts.pattern_const("^a+$"), "__p0");
        let decls = artifacts.const_decls();
        assert_eq!(decls.len(), 2);
        assert!(decls[0].contains("__p0"));
    }

    #[test]
    fn epsilon_accepts_float_noise_but_not_real_misses() {
        // mirrors the generated JS check for `multipleOf 0.01`
        let accepts = |value: f64| {
            let q = value / 0.01;
            (q - q.round()).abs() < 1e-9
        };
        assert!(accepts(0.30000000000000004));
        assert!(accepts(0.3));
        assert!(!accepts(0.301));
        assert!(!accepts(0.005));
    }

    #[test]
    fn transforms_chain_in_declaration_order() {
        let mut bag = ConstraintBag::default();
        bag.add_transform(Transform::Trim);
        bag.add_transform(Transform::ToUpperCase);
        assert_eq!(
            transform_expr(&bag, "v").unwrap(),
            "v.trim().toUpperCase()"
        );
        assert_eq!(transform_expr(&ConstraintBag::default(), "v"), None);
    }
}
