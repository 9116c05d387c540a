//! The per-run object registry.
//!
//! The registry exclusively owns object records; metadata nodes refer to
//! them by `ObjectId`. Records are created as placeholders when the walker
//! starts expanding an object, so a recursive reference discovered
//! mid-expansion resolves to the already-allocated id.

use rustc_hash::FxHashMap;
use tsgonest_common::loc::Loc;

use crate::model::{MapMeta, Metadata};

/// Index of an object record in the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

/// One named property, in declaration order.
#[derive(Clone, Debug, PartialEq)]
pub struct Property {
    pub name: String,
    pub value: Metadata,
    pub readonly: bool,
    pub optional: bool,
    pub doc: Option<String>,
}

/// A uniqued object: interface, type literal, or generic instantiation.
#[derive(Clone, Debug)]
pub struct ObjectRecord {
    /// Canonical name; instantiations are suffixed (`PageOfUser`).
    pub name: String,
    /// Properties in declaration order.
    pub properties: Vec<Property>,
    pub index_signature: Option<MapMeta>,
    /// Set when a reference to this record was requested while the record
    /// itself was still being expanded.
    pub is_recursive: bool,
    /// Project-relative path of the declaring source file.
    pub declared_in: String,
    pub loc: Loc,
}

/// Arena of object records, uniqued by canonical name.
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    records: Vec<ObjectRecord>,
    by_name: FxHashMap<String, ObjectId>,
}

impl ObjectRegistry {
    /// Look up a record by canonical name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<ObjectId> {
        self.by_name.get(name).copied()
    }

    /// Allocate an empty record for `name`. The walker fills properties
    /// while the record is in the `Expanding` state.
    ///
    /// # Panics
    /// Panics if `name` is already registered; callers must `lookup` first.
    pub fn insert_placeholder(&mut self, name: &str, declared_in: &str) -> ObjectId {
        assert!(
            !self.by_name.contains_key(name),
            "object '{name}' registered twice"
        );
        let id = ObjectId(self.records.len() as u32);
        self.records.push(ObjectRecord {
            name: name.to_string(),
            properties: Vec::new(),
            index_signature: None,
            is_recursive: false,
            declared_in: declared_in.to_string(),
            loc: Loc::none(),
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    #[must_use]
    pub fn get(&self, id: ObjectId) -> &ObjectRecord {
        &self.records[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: ObjectId) -> &mut ObjectRecord {
        &mut self.records[id.0 as usize]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &ObjectRecord)> {
        self.records
            .iter()
            .enumerate()
            .map(|(i, r)| (ObjectId(i as u32), r))
    }

    /// Ids sorted by canonical name — the order schemas are emitted in.
    #[must_use]
    pub fn ids_by_name(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = (0..self.records.len() as u32).map(ObjectId).collect();
        ids.sort_by(|a, b| self.get(*a).name.cmp(&self.get(*b).name));
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_then_fill() {
        let mut registry = ObjectRegistry::default();
        let id = registry.insert_placeholder("User", "src/user.dto.ts");
        assert_eq!(registry.lookup("User"), Some(id));
        assert!(registry.get(id).properties.is_empty());
        registry.get_mut(id).is_recursive = true;
        assert!(registry.get(id).is_recursive);
    }

    #[test]
    fn ids_by_name_sorts_alphabetically() {
        let mut registry = ObjectRegistry::default();
        let b = registry.insert_placeholder("Beta", "b.ts");
        let a = registry.insert_placeholder("Alpha", "a.ts");
        assert_eq!(registry.ids_by_name(), vec![a, b]);
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn duplicate_names_panic() {
        let mut registry = ObjectRegistry::default();
        registry.insert_placeholder("User", "a.ts");
        registry.insert_placeholder("User", "b.ts");
    }
}
