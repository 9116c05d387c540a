//! The worklist traversal from host types to `Metadata`.

use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;
use tsgonest_common::diagnostics::{DiagnosticKind, DiagnosticSink};
use tsgonest_common::loc::Loc;
use tsgonest_host::types::{HostObject, HostType, TypeId, TypeTable};
use tsgonest_metadata::model::{Atomic, Literal, MapMeta, Metadata, TupleMeta};
use tsgonest_metadata::registry::{ObjectId, ObjectRegistry, Property};

use crate::constraints::{apply_phantom_object, bag_from_jsdoc, is_phantom_object};
use crate::discriminant::elect_discriminant;

#[derive(Debug, Error)]
pub enum WalkError {
    /// A recursive type whose cycle never passes through a named object.
    /// There is no handle to break the cycle with, so generation is
    /// undecidable and the pipeline exits non-zero.
    #[error("recursive type '{0}' cannot be expanded: the cycle does not pass through a named object")]
    UndecidableRecursion(String),
}

/// Expansion state of an object type. Absence from the map is `Unseen`;
/// `Seen` is transient (the worklist enqueues and immediately expands).
#[derive(Clone, Copy, Debug)]
enum ObjectState {
    Expanding(ObjectId),
    Expanded(ObjectId),
}

/// Converts host checker types into `Metadata`, registering object records
/// as a side effect. One walker instance serves a whole pipeline run so
/// structurally identical objects share a single handle.
pub struct TypeWalker<'a> {
    table: &'a TypeTable,
    registry: &'a mut ObjectRegistry,
    sink: &'a mut DiagnosticSink,
    states: FxHashMap<TypeId, ObjectState>,
    site_file: String,
    site_loc: Loc,
}

impl<'a> TypeWalker<'a> {
    pub fn new(
        table: &'a TypeTable,
        registry: &'a mut ObjectRegistry,
        sink: &'a mut DiagnosticSink,
    ) -> Self {
        Self {
            table,
            registry,
            sink,
            states: FxHashMap::default(),
            site_file: String::new(),
            site_loc: Loc::none(),
        }
    }

    /// The diagnostic sink this walker reports into. Callers that drive
    /// the walker (the controller analyzer, the orchestrator) share it.
    pub fn sink(&mut self) -> &mut DiagnosticSink {
        self.sink
    }

    /// Walk a named top-level entry (an exported type, a handler return
    /// type, or a parameter type).
    pub fn walk_entry(
        &mut self,
        name: &str,
        ty: TypeId,
        file: &str,
        loc: Loc,
    ) -> Result<Metadata, WalkError> {
        debug!(entry = name, file, "walking type entry");
        self.site_file = file.to_string();
        self.site_loc = loc;
        let mut stack = Vec::new();
        self.walk(ty, &mut stack)
    }

    fn walk(&mut self, ty: TypeId, stack: &mut Vec<TypeId>) -> Result<Metadata, WalkError> {
        let host = self.table.get(ty).clone();
        if let HostType::Object(obj) = &host {
            return self.walk_object(ty, obj);
        }
        if stack.contains(&ty) {
            return Err(WalkError::UndecidableRecursion(self.table.type_name(ty)));
        }
        stack.push(ty);
        let result = self.walk_non_object(&host, stack);
        stack.pop();
        result
    }

    fn walk_non_object(
        &mut self,
        host: &HostType,
        stack: &mut Vec<TypeId>,
    ) -> Result<Metadata, WalkError> {
        let meta = match host {
            HostType::Boolean => Metadata::atomic(Atomic::Boolean),
            HostType::BigInt => Metadata::atomic(Atomic::BigInt),
            HostType::Number => Metadata::atomic(Atomic::Number),
            HostType::String => Metadata::atomic(Atomic::String),
            HostType::StringLiteral(s) => {
                let mut meta = Metadata::new();
                meta.add_constant(Literal::String(s.clone()));
                meta
            }
            HostType::NumberLiteral(n) => {
                let mut meta = Metadata::new();
                meta.add_constant(Literal::Number(*n));
                meta
            }
            HostType::BooleanLiteral(b) => {
                let mut meta = Metadata::new();
                meta.add_constant(Literal::Boolean(*b));
                meta
            }
            HostType::Null => {
                let mut meta = Metadata::new();
                meta.nullable = true;
                meta
            }
            HostType::Undefined | HostType::Void => {
                let mut meta = Metadata::new();
                meta.is_required = false;
                meta
            }
            HostType::Any | HostType::Unknown => {
                self.warn_unsupported("'any' admits every value; the generated validator for this position returns true");
                Metadata::any()
            }
            HostType::Function => {
                self.warn_unsupported(
                    "function types cannot be validated and are skipped by serializers",
                );
                let mut meta = Metadata::new();
                meta.has_function = true;
                meta
            }
            HostType::AsyncIterable(_) => {
                self.warn_unsupported(
                    "async iterables are opaque outside event-stream handlers",
                );
                let mut meta = Metadata::new();
                meta.has_function = true;
                meta
            }
            HostType::Promise(inner) => self.walk(*inner, stack)?,
            HostType::Array(elem) => Metadata::array(self.walk(*elem, stack)?),
            HostType::Tuple { elems, rest } => {
                let mut tuple = TupleMeta::default();
                for &elem in elems {
                    tuple.elems.push(self.walk(elem, stack)?);
                }
                if let Some(rest) = rest {
                    let mut rest_meta = self.walk(*rest, stack)?;
                    rest_meta.rest = true;
                    tuple.rest = Some(Box::new(rest_meta));
                }
                let mut meta = Metadata::new();
                for elem in &tuple.elems {
                    meta.definitions.extend(elem.definitions.iter().copied());
                }
                if let Some(rest) = &tuple.rest {
                    meta.definitions.extend(rest.definitions.iter().copied());
                }
                meta.tuples.push(tuple);
                meta
            }
            HostType::Union(members) => {
                let mut merged = Metadata::new();
                for &member in members {
                    let walked = self.walk(member, stack)?;
                    merged = Metadata::merge(merged, walked);
                }
                if merged.objects.len() >= 2 && merged.discriminant.is_none() {
                    merged.discriminant =
                        elect_discriminant(self.registry, &merged.objects);
                }
                merged
            }
            HostType::Intersection(members) => self.walk_intersection(members, stack)?,
            HostType::Mapped { key, value } => {
                let key_meta = self.walk(*key, stack)?;
                if !map_key_supported(&key_meta) {
                    self.warn_unsupported(
                        "index signature keys must be strings or numbers; treating as string-keyed",
                    );
                }
                let value_meta = self.walk(*value, stack)?;
                let mut meta = Metadata::new();
                meta.definitions
                    .extend(value_meta.definitions.iter().copied());
                meta.maps.push(MapMeta {
                    key: Box::new(key_meta),
                    value: Box::new(value_meta),
                });
                meta
            }
            HostType::Object(_) => unreachable!("objects handled by walk()"),
        };
        Ok(meta)
    }

    /// Fold an intersection: phantom members fill the constraint bag, real
    /// members merge structurally. Two or more real object members
    /// synthesize a combined record.
    fn walk_intersection(
        &mut self,
        members: &[TypeId],
        stack: &mut Vec<TypeId>,
    ) -> Result<Metadata, WalkError> {
        let mut merged = Metadata::new();
        let mut real_objects: Vec<ObjectId> = Vec::new();
        for &member in members {
            if let HostType::Object(obj) = self.table.get(member) {
                if is_phantom_object(obj) {
                    let obj = obj.clone();
                    let mut bag = std::mem::take(&mut merged.constraints);
                    apply_phantom_object(&mut bag, &obj, self.table, self.sink, &self.site_file);
                    merged.constraints = bag;
                    continue;
                }
            }
            let walked = self.walk(member, stack)?;
            real_objects.extend(walked.objects.iter().copied());
            merged = Metadata::merge(merged, walked);
        }

        if real_objects.len() >= 2 {
            let combined = self.combine_objects(&real_objects);
            merged.objects = vec![combined];
            // the member records are subsumed by the combined one
            merged.definitions.retain(|d| !real_objects.contains(d));
            merged.definitions.insert(combined);
        }
        Ok(merged)
    }

    /// Synthesize one record for an intersection of object types. The
    /// combined record is uniqued by its derived name, so repeated
    /// intersections share a handle.
    fn combine_objects(&mut self, members: &[ObjectId]) -> ObjectId {
        let name = members
            .iter()
            .map(|&id| self.registry.get(id).name.clone())
            .collect::<Vec<_>>()
            .join("And");
        if let Some(existing) = self.registry.lookup(&name) {
            return existing;
        }
        let declared_in = self.registry.get(members[0]).declared_in.clone();
        let id = self.registry.insert_placeholder(&name, &declared_in);
        let mut properties: Vec<Property> = Vec::new();
        for &member in members {
            for property in self.registry.get(member).properties.clone() {
                if let Some(existing) =
                    properties.iter_mut().find(|p| p.name == property.name)
                {
                    // same field on both sides: constraints intersect
                    let value = std::mem::take(&mut existing.value);
                    existing.value = Metadata::merge(value, property.value);
                    existing.optional &= property.optional;
                } else {
                    properties.push(property);
                }
            }
        }
        self.registry.get_mut(id).properties = properties;
        id
    }

    fn walk_object(&mut self, ty: TypeId, obj: &HostObject) -> Result<Metadata, WalkError> {
        if is_phantom_object(obj) {
            // a bare constraint carrier outside an intersection
            let mut meta = Metadata::new();
            let mut bag = std::mem::take(&mut meta.constraints);
            apply_phantom_object(&mut bag, obj, self.table, self.sink, &self.site_file);
            meta.constraints = bag;
            return Ok(meta);
        }

        match self.states.get(&ty) {
            Some(ObjectState::Expanding(id)) => {
                let id = *id;
                self.registry.get_mut(id).is_recursive = true;
                return Ok(Metadata::object(id));
            }
            Some(ObjectState::Expanded(id)) => return Ok(Metadata::object(*id)),
            None => {}
        }

        let name = self.table.object_name(obj);
        // Structurally identical instantiations reached through different
        // checker types share one handle.
        if let Some(id) = self.registry.lookup(&name) {
            self.states.insert(ty, ObjectState::Expanded(id));
            return Ok(Metadata::object(id));
        }

        let id = self.registry.insert_placeholder(&name, &obj.declared_in);
        self.registry.get_mut(id).loc = obj.loc;
        self.states.insert(ty, ObjectState::Expanding(id));
        debug!(object = %name, "expanding object");

        let mut properties = Vec::with_capacity(obj.properties.len());
        for host_property in &obj.properties {
            let saved = (std::mem::take(&mut self.site_file), self.site_loc);
            self.site_file = obj.declared_in.clone();
            self.site_loc = host_property.loc;

            // object properties start a fresh cycle-detection stack: the
            // record's own handle is what breaks recursion
            let mut stack = Vec::new();
            let mut value = self.walk(host_property.ty, &mut stack)?;

            let jsdoc_bag = bag_from_jsdoc(
                &host_property.jsdoc,
                self.sink,
                &obj.declared_in,
                host_property.loc,
            );
            let notes = value.constraints.merge_tightest(&jsdoc_bag);
            for note in notes {
                self.sink.report(
                    DiagnosticKind::ConstraintInvalid,
                    &obj.declared_in,
                    host_property.loc,
                    note,
                );
            }
            if host_property.optional {
                value.is_required = false;
            }
            properties.push(Property {
                name: host_property.name.clone(),
                value,
                readonly: host_property.readonly,
                optional: host_property.optional,
                doc: host_property.doc.clone(),
            });

            (self.site_file, self.site_loc) = saved;
        }

        let index_signature = match &obj.index_signature {
            Some(index) => {
                let mut stack = Vec::new();
                let key = self.walk(index.key, &mut stack)?;
                if !map_key_supported(&key) {
                    self.warn_unsupported(
                        "index signature keys must be strings or numbers; treating as string-keyed",
                    );
                }
                let value = self.walk(index.value, &mut stack)?;
                Some(MapMeta {
                    key: Box::new(key),
                    value: Box::new(value),
                })
            }
            None => None,
        };

        let record = self.registry.get_mut(id);
        record.properties = properties;
        record.index_signature = index_signature;
        self.states.insert(ty, ObjectState::Expanded(id));
        Ok(Metadata::object(id))
    }

    fn warn_unsupported(&mut self, message: &str) {
        let (file, loc) = (self.site_file.clone(), self.site_loc);
        self.sink
            .report(DiagnosticKind::TypeUnsupported, &file, loc, message.to_string());
    }
}

fn map_key_supported(key: &Metadata) -> bool {
    key.atomics
        .iter()
        .all(|a| matches!(a, Atomic::String | Atomic::Number))
        && key.objects.is_empty()
        && key.arrays.is_empty()
        && key.tuples.is_empty()
        && key.maps.is_empty()
        && !key.any
}
