//! Snapshot of the host checker's resolved types.
//!
//! `TypeTable` is an append-only arena; `TypeId` is a copyable index into
//! it. Recursive types are built by reserving a slot first and filling it
//! once the referenced structure exists, so cycles never require cyclic
//! ownership. Generic instantiations arrive pre-expanded: `Page<User>` is
//! its own entry whose `type_args` record the instantiation.

use tsgonest_common::loc::Loc;

use crate::ast::JsDocTag;

/// Index of a type in the [`TypeTable`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Nominal identity of an object type: its declaration site as assigned by
/// the host front-end. Two instantiations of one generic share a symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

/// A property of an object type, in declaration order.
#[derive(Clone, Debug)]
pub struct HostProperty {
    pub name: String,
    pub ty: TypeId,
    pub optional: bool,
    pub readonly: bool,
    /// Leading doc comment, without comment markers.
    pub doc: Option<String>,
    /// JSDoc tags scanned from the property's doc comment.
    pub jsdoc: Vec<JsDocTag>,
    pub loc: Loc,
}

impl HostProperty {
    /// A plain required property with no docs, for builders and tests.
    #[must_use]
    pub fn required(name: &str, ty: TypeId) -> Self {
        Self {
            name: name.to_string(),
            ty,
            optional: false,
            readonly: false,
            doc: None,
            jsdoc: Vec::new(),
            loc: Loc::none(),
        }
    }

    #[must_use]
    pub fn optional(name: &str, ty: TypeId) -> Self {
        Self {
            optional: true,
            ..Self::required(name, ty)
        }
    }

    #[must_use]
    pub fn with_jsdoc(mut self, tags: Vec<JsDocTag>) -> Self {
        self.jsdoc = tags;
        self
    }
}

/// A string- or number-keyed index signature.
#[derive(Clone, Debug)]
pub struct IndexSignature {
    pub key: TypeId,
    pub value: TypeId,
}

/// An object (interface, type literal, or instantiated generic).
#[derive(Clone, Debug)]
pub struct HostObject {
    /// Base declaration name, e.g. `Page` for `Page<User>`.
    pub name: String,
    pub symbol: SymbolId,
    /// Instantiation arguments; empty for non-generic objects.
    pub type_args: Vec<TypeId>,
    /// Properties in declaration order.
    pub properties: Vec<HostProperty>,
    pub index_signature: Option<IndexSignature>,
    /// Path of the declaring source file, relative to the project root.
    pub declared_in: String,
    pub loc: Loc,
}

/// One resolved checker type. The variant set covers exactly what the type
/// walker consumes.
#[derive(Clone, Debug)]
pub enum HostType {
    Boolean,
    BigInt,
    Number,
    String,
    StringLiteral(String),
    NumberLiteral(f64),
    BooleanLiteral(bool),
    Null,
    Undefined,
    Void,
    Any,
    Unknown,
    Array(TypeId),
    Tuple {
        elems: Vec<TypeId>,
        rest: Option<TypeId>,
    },
    Union(Vec<TypeId>),
    Intersection(Vec<TypeId>),
    /// Call signatures are opaque to the pipeline.
    Function,
    Promise(TypeId),
    /// `AsyncGenerator<T>` / `Observable<T>`-like stream; only the yield
    /// type matters.
    AsyncIterable(TypeId),
    Object(HostObject),
    /// `Record<K, V>` and `Map<K, V>` both surface here.
    Mapped {
        key: TypeId,
        value: TypeId,
    },
}

/// Arena of host types. Built once per run by the host adapter, read-only
/// for the rest of the pipeline.
#[derive(Debug, Default)]
pub struct TypeTable {
    types: Vec<HostType>,
}

impl TypeTable {
    #[must_use]
    pub fn get(&self, id: TypeId) -> &HostType {
        &self.types[id.index()]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Unwrap `Promise<T>` to `T`; other types pass through. Nested
    /// promises unwrap fully.
    #[must_use]
    pub fn unwrap_promise(&self, id: TypeId) -> TypeId {
        match self.get(id) {
            HostType::Promise(inner) => self.unwrap_promise(*inner),
            _ => id,
        }
    }

    /// Display name used in diagnostics and canonical object names.
    /// Instantiated generics render as `PageOfUser`.
    #[must_use]
    pub fn type_name(&self, id: TypeId) -> String {
        match self.get(id) {
            HostType::Boolean => "boolean".to_string(),
            HostType::BigInt => "bigint".to_string(),
            HostType::Number => "number".to_string(),
            HostType::String => "string".to_string(),
            HostType::StringLiteral(s) => format!("\"{s}\""),
            HostType::NumberLiteral(n) => format!("{n}"),
            HostType::BooleanLiteral(b) => b.to_string(),
            HostType::Null => "null".to_string(),
            HostType::Undefined => "undefined".to_string(),
            HostType::Void => "void".to_string(),
            HostType::Any => "any".to_string(),
            HostType::Unknown => "unknown".to_string(),
            HostType::Array(elem) => format!("{}[]", self.type_name(*elem)),
            HostType::Tuple { .. } => "tuple".to_string(),
            HostType::Union(_) => "union".to_string(),
            HostType::Intersection(_) => "intersection".to_string(),
            HostType::Function => "function".to_string(),
            HostType::Promise(inner) => format!("Promise<{}>", self.type_name(*inner)),
            HostType::AsyncIterable(inner) => {
                format!("AsyncIterable<{}>", self.type_name(*inner))
            }
            HostType::Object(obj) => self.object_name(obj),
            HostType::Mapped { .. } => "Record".to_string(),
        }
    }

    /// Canonical name of an object: the base name, suffixed with `Of<Arg>`
    /// per instantiation argument.
    #[must_use]
    pub fn object_name(&self, obj: &HostObject) -> String {
        if obj.type_args.is_empty() {
            return obj.name.clone();
        }
        let mut name = obj.name.clone();
        for arg in &obj.type_args {
            name.push_str("Of");
            name.push_str(&pascal(&self.type_name(*arg)));
        }
        name
    }
}

fn pascal(name: &str) -> String {
    let mut chars = name.chars().filter(|c| c.is_alphanumeric());
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Builder for [`TypeTable`]. `reserve`/`fill` make recursive structures
/// expressible: reserve the object's slot, build properties that reference
/// it, then fill.
#[derive(Debug, Default)]
pub struct TypeTableBuilder {
    types: Vec<Option<HostType>>,
    next_symbol: u32,
}

impl TypeTableBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a complete type, returning its id.
    pub fn add(&mut self, ty: HostType) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(Some(ty));
        id
    }

    /// Reserve a slot for a type that participates in a cycle.
    pub fn reserve(&mut self) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(None);
        id
    }

    /// Fill a previously reserved slot.
    ///
    /// # Panics
    /// Panics if the slot was already filled; that is a host adapter bug.
    pub fn fill(&mut self, id: TypeId, ty: HostType) {
        let slot = &mut self.types[id.index()];
        assert!(slot.is_none(), "type slot {id:?} filled twice");
        *slot = Some(ty);
    }

    /// Mint a fresh nominal symbol for an object declaration.
    pub fn symbol(&mut self) -> SymbolId {
        let id = SymbolId(self.next_symbol);
        self.next_symbol += 1;
        id
    }

    /// Finish the table.
    ///
    /// # Panics
    /// Panics if any reserved slot was never filled.
    #[must_use]
    pub fn build(self) -> TypeTable {
        let types = self
            .types
            .into_iter()
            .enumerate()
            .map(|(i, slot)| slot.unwrap_or_else(|| panic!("type slot {i} never filled")))
            .collect();
        TypeTable { types }
    }
}
