//! The constraint bag.
//!
//! Both surface syntaxes — JSDoc tags and `__tsgonest_*` phantom
//! properties — fill this one structure, so downstream emitters never care
//! where a constraint came from. Conflicting constraints resolve to the
//! tightest (largest lower bounds, smallest upper bounds); the resolution
//! reports what it dropped so the walker can warn.

use std::collections::BTreeMap;

use serde::Serialize;

/// Numeric-kind refinement carried by `number` nodes. Affects validation
/// and OpenAPI emission, never the serializer fast path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum NumericKind {
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float,
    Double,
}

impl NumericKind {
    /// Parse the `type` phantom kind / `@type` tag value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "int32" => Some(Self::Int32),
            "uint32" => Some(Self::Uint32),
            "int64" => Some(Self::Int64),
            "uint64" => Some(Self::Uint64),
            "float" => Some(Self::Float),
            "double" => Some(Self::Double),
            _ => None,
        }
    }

    /// OpenAPI `format` string.
    #[must_use]
    pub const fn format_name(self) -> &'static str {
        match self {
            Self::Int32 => "int32",
            Self::Uint32 => "uint32",
            Self::Int64 => "int64",
            Self::Uint64 => "uint64",
            Self::Float => "float",
            Self::Double => "double",
        }
    }

    /// Whether values of this kind must be integers.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::Int32 | Self::Uint32 | Self::Int64 | Self::Uint64)
    }

    /// Inclusive value range implied by the kind, when finite.
    #[must_use]
    pub fn implied_range(self) -> Option<(f64, f64)> {
        match self {
            Self::Int32 => Some((-2147483648.0, 2147483647.0)),
            Self::Uint32 => Some((0.0, 4294967295.0)),
            // IEEE-754 safe-integer bounds
            Self::Int64 => Some((-9007199254740991.0, 9007199254740991.0)),
            Self::Uint64 => Some((0.0, 9007199254740991.0)),
            Self::Float | Self::Double => None,
        }
    }
}

/// Value transforms that logically precede validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Transform {
    Trim,
    ToLowerCase,
    ToUpperCase,
}

/// Every constraint a node can carry, from either surface syntax.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConstraintBag {
    // string
    pub format: Option<String>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<String>,
    pub starts_with: Option<String>,
    pub ends_with: Option<String>,
    pub includes: Option<String>,
    pub uppercase: bool,
    pub lowercase: bool,
    // number
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<f64>,
    pub exclusive_maximum: Option<f64>,
    pub multiple_of: Option<f64>,
    pub numeric_kind: Option<NumericKind>,
    // array
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub unique_items: bool,
    // behavior
    pub coerce: bool,
    pub transforms: Vec<Transform>,
    /// Name of a user validation function referenced by the `validate`
    /// phantom kind; called after structural checks.
    pub validate_fn: Option<String>,
    pub default: Option<serde_json::Value>,
    /// Node-level fallback error message.
    pub error: Option<String>,
    /// Per-constraint error messages, keyed by constraint kind
    /// (`minLength`, `format`, ...).
    pub errors: BTreeMap<String, String>,
}

impl ConstraintBag {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// The error message for one constraint kind: the per-constraint
    /// message when present, else the node-level fallback.
    #[must_use]
    pub fn message_for(&self, kind: &str) -> Option<&str> {
        self.errors
            .get(kind)
            .map(String::as_str)
            .or(self.error.as_deref())
    }

    pub fn add_transform(&mut self, transform: Transform) {
        if !self.transforms.contains(&transform) {
            self.transforms.push(transform);
        }
    }

    /// Fold `other` into `self`, keeping the tightest of every pair.
    /// Returns human-readable notes for each dropped looser constraint so
    /// the caller can emit `constraint-invalid` warnings.
    pub fn merge_tightest(&mut self, other: &ConstraintBag) -> Vec<String> {
        let mut notes = Vec::new();

        merge_max(&mut self.min_length, other.min_length, "minLength", &mut notes);
        merge_min(&mut self.max_length, other.max_length, "maxLength", &mut notes);
        merge_max_f(&mut self.minimum, other.minimum, "minimum", &mut notes);
        merge_min_f(&mut self.maximum, other.maximum, "maximum", &mut notes);
        merge_max_f(
            &mut self.exclusive_minimum,
            other.exclusive_minimum,
            "exclusiveMinimum",
            &mut notes,
        );
        merge_min_f(
            &mut self.exclusive_maximum,
            other.exclusive_maximum,
            "exclusiveMaximum",
            &mut notes,
        );
        merge_max(&mut self.min_items, other.min_items, "minItems", &mut notes);
        merge_min(&mut self.max_items, other.max_items, "maxItems", &mut notes);

        match (&self.format, &other.format) {
            (Some(a), Some(b)) if a != b => {
                notes.push(format!("conflicting formats '{a}' and '{b}'; keeping '{a}'"));
            }
            (None, Some(b)) => self.format = Some(b.clone()),
            _ => {}
        }
        if self.pattern.is_none() {
            self.pattern.clone_from(&other.pattern);
        }
        if self.starts_with.is_none() {
            self.starts_with.clone_from(&other.starts_with);
        }
        if self.ends_with.is_none() {
            self.ends_with.clone_from(&other.ends_with);
        }
        if self.includes.is_none() {
            self.includes.clone_from(&other.includes);
        }
        if self.multiple_of.is_none() {
            self.multiple_of = other.multiple_of;
        }
        if self.numeric_kind.is_none() {
            self.numeric_kind = other.numeric_kind;
        }
        if self.validate_fn.is_none() {
            self.validate_fn.clone_from(&other.validate_fn);
        }
        if self.default.is_none() {
            self.default.clone_from(&other.default);
        }
        if self.error.is_none() {
            self.error.clone_from(&other.error);
        }
        self.uppercase |= other.uppercase;
        self.lowercase |= other.lowercase;
        self.unique_items |= other.unique_items;
        self.coerce |= other.coerce;
        for t in &other.transforms {
            self.add_transform(*t);
        }
        for (kind, message) in &other.errors {
            self.errors
                .entry(kind.clone())
                .or_insert_with(|| message.clone());
        }

        notes
    }
}

fn merge_max(slot: &mut Option<u64>, other: Option<u64>, kind: &str, notes: &mut Vec<String>) {
    if let Some(b) = other {
        match slot {
            Some(a) if *a != b => {
                let kept = (*a).max(b);
                notes.push(format!("conflicting {kind} {a} and {b}; keeping {kept}"));
                *slot = Some(kept);
            }
            Some(_) => {}
            None => *slot = Some(b),
        }
    }
}

fn merge_min(slot: &mut Option<u64>, other: Option<u64>, kind: &str, notes: &mut Vec<String>) {
    if let Some(b) = other {
        match slot {
            Some(a) if *a != b => {
                let kept = (*a).min(b);
                notes.push(format!("conflicting {kind} {a} and {b}; keeping {kept}"));
                *slot = Some(kept);
            }
            Some(_) => {}
            None => *slot = Some(b),
        }
    }
}

fn merge_max_f(slot: &mut Option<f64>, other: Option<f64>, kind: &str, notes: &mut Vec<String>) {
    if let Some(b) = other {
        match slot {
            Some(a) if *a != b => {
                let kept = a.max(b);
                notes.push(format!("conflicting {kind} {a} and {b}; keeping {kept}"));
                *slot = Some(kept);
            }
            Some(_) => {}
            None => *slot = Some(b),
        }
    }
}

fn merge_min_f(slot: &mut Option<f64>, other: Option<f64>, kind: &str, notes: &mut Vec<String>) {
    if let Some(b) = other {
        match slot {
            Some(a) if *a != b => {
                let kept = a.min(b);
                notes.push(format!("conflicting {kind} {a} and {b}; keeping {kept}"));
                *slot = Some(kept);
            }
            Some(_) => {}
            None => *slot = Some(b),
        }
    }
}
