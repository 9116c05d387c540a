//! The context threaded through the `validate` lowering.
//!
//! Carries the JS expressions for the value under inspection and the
//! JSON-pointer path built incrementally next to it. Descent produces new
//! contexts through pure methods; nothing is mutated.

use crate::writer::escape_pointer;

/// Context for one position in the value being validated.
#[derive(Clone, Debug)]
pub struct EmitContext {
    /// JS expression for the current value, e.g. `v` or `v.name`.
    pub val: String,
    /// JS expression producing the JSON-pointer path, e.g. `p + "/name"`.
    pub path: String,
    /// Nesting depth, for unique loop variable names.
    pub depth: usize,
}

impl EmitContext {
    /// Context of an object-validator helper body: `(v, p, e)`.
    #[must_use]
    pub fn helper() -> Self {
        Self {
            val: "v".to_string(),
            path: "p".to_string(),
            depth: 0,
        }
    }

    /// Unique loop index variable at this depth (`i`, `i1`, `i2`, ...).
    #[must_use]
    pub fn idx_var(&self) -> String {
        if self.depth == 0 {
            "i".to_string()
        } else {
            format!("i{}", self.depth)
        }
    }

    /// Unique key variable at this depth (`k`, `k1`, ...).
    #[must_use]
    pub fn key_var(&self) -> String {
        if self.depth == 0 {
            "k".to_string()
        } else {
            format!("k{}", self.depth)
        }
    }

    /// Unique temporary variable (for transform targets).
    #[must_use]
    pub fn tmp_var(&self) -> String {
        if self.depth == 0 {
            "t".to_string()
        } else {
            format!("t{}", self.depth)
        }
    }

    /// Descend into a named property.
    #[must_use]
    pub fn property(&self, name: &str) -> Self {
        Self {
            val: format!("{}{}", self.val, member_access(name)),
            path: format!("{} + \"/{}\"", self.path, escape_pointer(name)),
            depth: self.depth,
        }
    }

    /// Descend into an array element indexed by `idx_var`.
    #[must_use]
    pub fn element(&self, idx_var: &str) -> Self {
        Self {
            val: format!("{}[{idx_var}]", self.val),
            path: format!("{} + \"/\" + {idx_var}", self.path),
            depth: self.depth + 1,
        }
    }

    /// Descend into a fixed tuple slot.
    #[must_use]
    pub fn tuple_slot(&self, index: usize) -> Self {
        Self {
            val: format!("{}[{index}]", self.val),
            path: format!("{} + \"/{index}\"", self.path),
            depth: self.depth,
        }
    }

    /// Descend into a map value keyed by `key_var`.
    #[must_use]
    pub fn map_value(&self, key_var: &str) -> Self {
        Self {
            val: format!("{}[{key_var}]", self.val),
            path: format!("{} + \"/\" + {key_var}", self.path),
            depth: self.depth + 1,
        }
    }

    /// Rebase onto a temporary variable holding a transformed copy of the
    /// current value. The path is unchanged.
    #[must_use]
    pub fn rebased(&self, var: &str) -> Self {
        Self {
            val: var.to_string(),
            path: self.path.clone(),
            depth: self.depth,
        }
    }
}

/// Property access: dot form for identifier-safe names, bracket otherwise.
#[must_use]
pub fn member_access(name: &str) -> String {
    if is_js_identifier(name) {
        format!(".{name}")
    } else {
        format!("[\"{}\"]", crate::writer::escape_js(name))
    }
}

fn is_js_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
