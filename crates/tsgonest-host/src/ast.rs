//! Decorator-level AST view.
//!
//! This is the syntactic slice the controller analyzer reads: classes,
//! methods, parameters, and their decorators. Decorator recognition is by
//! imported identifier — no runtime metadata is involved — so the host
//! records the *resolved import name* of each decorator, and copies the
//! JSDoc tags of the decorator's own declaration (custom parameter
//! decorators advertise their location through an `@in` tag there).

use serde_json::Value;
use tsgonest_common::loc::Loc;

use crate::types::TypeId;

/// One `@tag text` pair from a JSDoc block.
#[derive(Clone, Debug, PartialEq)]
pub struct JsDocTag {
    pub name: String,
    pub text: Option<String>,
}

impl JsDocTag {
    #[must_use]
    pub fn new(name: &str, text: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            text: text.map(str::to_string),
        }
    }
}

/// A decorator application, e.g. `@Get(':id')` or `@Returns<UserDto>()`.
#[derive(Clone, Debug)]
pub struct Decorator {
    /// Resolved import name, e.g. `Controller`, `Get`, `Body`.
    pub name: String,
    /// Literal arguments. Non-literal arguments surface as `Value::Null`
    /// with `literal_args = false`.
    pub args: Vec<Value>,
    /// Whether every argument was a literal the host could evaluate.
    pub literal_args: bool,
    /// Resolved type arguments, e.g. the `T` of `@Returns<T>()`.
    pub type_args: Vec<TypeId>,
    /// JSDoc tags on the decorator's *declaration* (not the use site).
    pub decl_jsdoc: Vec<JsDocTag>,
    pub loc: Loc,
}

impl Decorator {
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            args: Vec::new(),
            literal_args: true,
            type_args: Vec::new(),
            decl_jsdoc: Vec::new(),
            loc: Loc::none(),
        }
    }

    #[must_use]
    pub fn with_arg(mut self, arg: Value) -> Self {
        self.args.push(arg);
        self
    }

    #[must_use]
    pub fn with_type_args(mut self, type_args: Vec<TypeId>) -> Self {
        self.type_args = type_args;
        self
    }

    /// First argument as a string literal, if present.
    #[must_use]
    pub fn string_arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).and_then(Value::as_str)
    }

    /// First argument of object shape, if present.
    #[must_use]
    pub fn object_arg(&self, index: usize) -> Option<&serde_json::Map<String, Value>> {
        self.args.get(index).and_then(Value::as_object)
    }
}

/// A method parameter and its decorators.
#[derive(Clone, Debug)]
pub struct ParamDecl {
    pub name: String,
    pub ty: TypeId,
    pub decorators: Vec<Decorator>,
    pub loc: Loc,
}

/// A class method.
#[derive(Clone, Debug)]
pub struct MethodDecl {
    pub name: String,
    pub decorators: Vec<Decorator>,
    pub params: Vec<ParamDecl>,
    /// Declared return type, as written (the analyzer unwraps `Promise`).
    pub return_type: TypeId,
    /// True for `async *` methods; event streams inspect the yield type.
    pub is_async_generator: bool,
    pub doc: Option<String>,
    pub jsdoc: Vec<JsDocTag>,
    pub loc: Loc,
}

impl MethodDecl {
    /// Find the first decorator with the given resolved name.
    #[must_use]
    pub fn decorator(&self, name: &str) -> Option<&Decorator> {
        self.decorators.iter().find(|d| d.name == name)
    }

    /// Whether a `@tsgonest-ignore <reason>` JSDoc marker is present.
    #[must_use]
    pub fn has_ignore_marker(&self, reason: &str) -> bool {
        self.jsdoc.iter().any(|t| {
            t.name == "tsgonest-ignore" && t.text.as_deref().is_some_and(|s| s.trim() == reason)
        })
    }
}

/// A class declaration.
#[derive(Clone, Debug)]
pub struct ClassDecl {
    pub name: String,
    pub decorators: Vec<Decorator>,
    pub methods: Vec<MethodDecl>,
    pub doc: Option<String>,
    pub jsdoc: Vec<JsDocTag>,
    pub loc: Loc,
}

impl ClassDecl {
    #[must_use]
    pub fn decorator(&self, name: &str) -> Option<&Decorator> {
        self.decorators.iter().find(|d| d.name == name)
    }

    #[must_use]
    pub fn is_controller(&self) -> bool {
        self.decorator("Controller").is_some()
    }
}

/// A named top-level type the pipeline generates a companion for.
#[derive(Clone, Debug)]
pub struct TypeEntry {
    pub name: String,
    pub ty: TypeId,
    pub loc: Loc,
}

/// One source file as the analyzer sees it.
#[derive(Clone, Debug)]
pub struct SourceFile {
    /// Project-relative path, forward slashes.
    pub path: String,
    pub classes: Vec<ClassDecl>,
    /// Exported named types declared in this file.
    pub exported_types: Vec<TypeEntry>,
    /// The JavaScript file the compiler emitted for this source, when any.
    /// Companions for types declared here land adjacent to it.
    pub emitted_js: Option<std::path::PathBuf>,
}

impl SourceFile {
    #[must_use]
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            classes: Vec::new(),
            exported_types: Vec::new(),
            emitted_js: None,
        }
    }
}
