use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, OnceLock};

use crate::descriptor::TypeDescriptor;
use crate::error::ClassTableError;
use crate::value::Value;

/// Runtime identity of a class, interface or primitive.
///
/// Equality and hashing use the dense index only. The name travels with the
/// id so that errors and logs can render types without a table at hand.
#[derive(Clone, Copy)]
pub struct ClassId {
    index: u32,
    name: &'static str,
}

impl ClassId {
    pub const ANY: ClassId = ClassId::builtin(0, "Any");
    pub const COMPARABLE: ClassId = ClassId::builtin(1, "Comparable");
    pub const TEXT: ClassId = ClassId::builtin(2, "Text");
    pub const COLLECTION: ClassId = ClassId::builtin(3, "Collection");
    pub const LIST: ClassId = ClassId::builtin(4, "List");
    pub const MAP: ClassId = ClassId::builtin(5, "Map");
    pub const NUMBER: ClassId = ClassId::builtin(6, "Number");
    pub const BOOLEAN: ClassId = ClassId::builtin(7, "Boolean");
    pub const INTEGER: ClassId = ClassId::builtin(8, "Integer");
    pub const LONG: ClassId = ClassId::builtin(9, "Long");
    pub const DOUBLE: ClassId = ClassId::builtin(10, "Double");
    pub const STRING: ClassId = ClassId::builtin(11, "String");
    pub const PRIM_BOOLEAN: ClassId = ClassId::builtin(12, "boolean");
    pub const PRIM_INT: ClassId = ClassId::builtin(13, "int");
    pub const PRIM_LONG: ClassId = ClassId::builtin(14, "long");
    pub const PRIM_DOUBLE: ClassId = ClassId::builtin(15, "double");
    pub const ARRAY: ClassId = ClassId::builtin(16, "Array");
    pub const ARRAY_LIST: ClassId = ClassId::builtin(17, "ArrayList");
    pub const LINKED_LIST: ClassId = ClassId::builtin(18, "LinkedList");
    pub const HASH_MAP: ClassId = ClassId::builtin(19, "HashMap");
    pub const LINKED_HASH_MAP: ClassId = ClassId::builtin(20, "LinkedHashMap");
    pub const PAIR: ClassId = ClassId::builtin(21, "Pair");

    const fn builtin(index: u32, name: &'static str) -> Self {
        Self { index, name }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

impl PartialEq for ClassId {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for ClassId {}

impl Hash for ClassId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({})", self.name)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    /// A class that is never instantiated directly (`Number`).
    AbstractClass,
    Interface,
    /// Unboxed scalar; always linked to its boxed class.
    Primitive,
}

/// Container family a class belongs to. Inherited from ancestors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerShape {
    Array,
    Sequence,
    Mapping,
}

impl fmt::Display for ContainerShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerShape::Array => f.write_str("array"),
            ContainerShape::Sequence => f.write_str("sequence"),
            ContainerShape::Mapping => f.write_str("mapping"),
        }
    }
}

#[derive(Debug, Clone)]
struct ClassDef {
    id: ClassId,
    kind: ClassKind,
    superclass: Option<ClassId>,
    interfaces: Vec<ClassId>,
    shape: Option<ContainerShape>,
    boxed: Option<ClassId>,
}

/// The class hierarchy every dispatch walks.
///
/// Immutable once built. Parents must exist before their children are
/// defined, so the hierarchy is acyclic by construction and every walk
/// terminates.
#[derive(Debug, Clone)]
pub struct ClassTable {
    defs: Vec<ClassDef>,
    by_name: HashMap<&'static str, ClassId>,
    sequence_default: ClassId,
    mapping_default: ClassId,
}

impl Default for ClassTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl ClassTable {
    /// The standard universe: scalars, primitives and the container families.
    pub fn standard() -> Self {
        ClassTableBuilder::standard().build()
    }

    /// Builder seeded with the standard universe.
    pub fn builder() -> ClassTableBuilder {
        ClassTableBuilder::standard()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn resolve(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    /// Name of a class defined in this table.
    pub fn name(&self, id: ClassId) -> Option<&'static str> {
        self.def(id).map(|d| d.id.name)
    }

    pub fn contains(&self, id: ClassId) -> bool {
        self.def(id).is_some()
    }

    pub fn kind(&self, id: ClassId) -> Option<ClassKind> {
        self.def(id).map(|d| d.kind)
    }

    pub fn shape(&self, id: ClassId) -> Option<ContainerShape> {
        self.def(id).and_then(|d| d.shape)
    }

    pub fn superclass(&self, id: ClassId) -> Option<ClassId> {
        self.def(id).and_then(|d| d.superclass)
    }

    pub fn interfaces(&self, id: ClassId) -> &[ClassId] {
        self.def(id).map(|d| d.interfaces.as_slice()).unwrap_or(&[])
    }

    /// Boxed counterpart of a primitive, or the class itself.
    pub fn boxed(&self, id: ClassId) -> ClassId {
        self.def(id).and_then(|d| d.boxed).unwrap_or(id)
    }

    pub fn default_impl(&self, shape: ContainerShape) -> Option<ClassId> {
        match shape {
            ContainerShape::Array => Some(ClassId::ARRAY),
            ContainerShape::Sequence => Some(self.sequence_default),
            ContainerShape::Mapping => Some(self.mapping_default),
        }
    }

    /// Supertype enumeration used by both dispatch axes.
    ///
    /// Order: the class itself, then each declared interface depth-first
    /// through its super-interfaces, then the superclass, repeating upward.
    /// Primitives continue into their boxed class. An interface reachable
    /// along two paths is yielded twice.
    pub fn ancestors(&self, id: ClassId) -> Ancestors<'_> {
        Ancestors {
            table: self,
            stack: vec![id],
        }
    }

    /// `true` when a value of class `from` may stand where `target` is expected.
    pub fn is_assignable(&self, target: ClassId, from: ClassId) -> bool {
        let target = self.boxed(target);
        let from = self.boxed(from);
        if target == from || target == ClassId::ANY {
            return true;
        }
        self.ancestors(from).any(|c| c == target)
    }

    /// Instance check against a possibly parameterized descriptor.
    ///
    /// Containers are instances only when their elements (and keys) are
    /// instances of the nested descriptors. Null is an instance of anything.
    pub fn is_instance(&self, value: &Value, target: &TypeDescriptor) -> bool {
        if value.is_null() {
            return true;
        }
        if !self.is_assignable(target.raw_class(), value.class()) {
            return false;
        }
        match value {
            Value::Array(items) | Value::Seq { items, .. } => match target.component_type() {
                Some(component) => items.iter().all(|v| self.is_instance(v, component)),
                None => true,
            },
            Value::Map { entries, .. } => {
                let keys_ok = match target.key_type() {
                    Some(key) => entries.keys().all(|k| self.is_instance(k, key)),
                    None => true,
                };
                let values_ok = match target.component_type() {
                    Some(component) => entries.values().all(|v| self.is_instance(v, component)),
                    None => true,
                };
                keys_ok && values_ok
            }
            _ => true,
        }
    }

    /// Concrete class to allocate for `target` of the given shape.
    ///
    /// A concrete class of the right shape is used as-is; an interface or
    /// abstract class falls back to the shape default when that default is
    /// assignable to it.
    pub fn instantiable(&self, target: ClassId, shape: ContainerShape) -> Option<ClassId> {
        let def = self.def(target)?;
        if def.kind == ClassKind::Class && def.shape == Some(shape) {
            return Some(target);
        }
        let fallback = self.default_impl(shape)?;
        self.is_assignable(target, fallback).then_some(fallback)
    }

    fn def(&self, id: ClassId) -> Option<&ClassDef> {
        self.defs
            .get(id.index as usize)
            .filter(|d| d.id.name == id.name)
    }
}

/// Iterator returned by [`ClassTable::ancestors`].
pub struct Ancestors<'a> {
    table: &'a ClassTable,
    stack: Vec<ClassId>,
}

impl Iterator for Ancestors<'_> {
    type Item = ClassId;

    fn next(&mut self) -> Option<ClassId> {
        let id = self.stack.pop()?;
        if let Some(def) = self.table.def(id) {
            // Pushed in reverse: interfaces pop first, in declared order.
            if let Some(sup) = def.superclass {
                self.stack.push(sup);
            }
            if let Some(boxed) = def.boxed {
                self.stack.push(boxed);
            }
            self.stack.extend(def.interfaces.iter().rev().copied());
        }
        Some(id)
    }
}

/// Build phase of a [`ClassTable`].
#[derive(Debug)]
pub struct ClassTableBuilder {
    table: ClassTable,
}

impl ClassTableBuilder {
    fn standard() -> Self {
        let mut b = Self {
            table: ClassTable {
                defs: Vec::new(),
                by_name: HashMap::new(),
                sequence_default: ClassId::ARRAY_LIST,
                mapping_default: ClassId::LINKED_HASH_MAP,
            },
        };
        use ClassKind::*;
        use ContainerShape::*;

        b.seed(ClassId::ANY, Class, None, &[], None, None);
        b.seed(ClassId::COMPARABLE, Interface, None, &[], None, None);
        b.seed(ClassId::TEXT, Interface, None, &[], None, None);
        b.seed(ClassId::COLLECTION, Interface, None, &[], Some(Sequence), None);
        b.seed(ClassId::LIST, Interface, None, &[ClassId::COLLECTION], Some(Sequence), None);
        b.seed(ClassId::MAP, Interface, None, &[], Some(Mapping), None);
        b.seed(ClassId::NUMBER, AbstractClass, Some(ClassId::ANY), &[], None, None);

        let comparable = &[ClassId::COMPARABLE];
        b.seed(ClassId::BOOLEAN, Class, Some(ClassId::ANY), comparable, None, None);
        b.seed(ClassId::INTEGER, Class, Some(ClassId::NUMBER), comparable, None, None);
        b.seed(ClassId::LONG, Class, Some(ClassId::NUMBER), comparable, None, None);
        b.seed(ClassId::DOUBLE, Class, Some(ClassId::NUMBER), comparable, None, None);
        b.seed(
            ClassId::STRING,
            Class,
            Some(ClassId::ANY),
            &[ClassId::TEXT, ClassId::COMPARABLE],
            None,
            None,
        );

        b.seed(ClassId::PRIM_BOOLEAN, Primitive, None, &[], None, Some(ClassId::BOOLEAN));
        b.seed(ClassId::PRIM_INT, Primitive, None, &[], None, Some(ClassId::INTEGER));
        b.seed(ClassId::PRIM_LONG, Primitive, None, &[], None, Some(ClassId::LONG));
        b.seed(ClassId::PRIM_DOUBLE, Primitive, None, &[], None, Some(ClassId::DOUBLE));

        b.seed(ClassId::ARRAY, Class, Some(ClassId::ANY), &[], Some(Array), None);
        b.seed(ClassId::ARRAY_LIST, Class, Some(ClassId::ANY), &[ClassId::LIST], Some(Sequence), None);
        b.seed(ClassId::LINKED_LIST, Class, Some(ClassId::ANY), &[ClassId::LIST], Some(Sequence), None);
        b.seed(ClassId::HASH_MAP, Class, Some(ClassId::ANY), &[ClassId::MAP], Some(Mapping), None);
        b.seed(ClassId::LINKED_HASH_MAP, Class, Some(ClassId::ANY), &[ClassId::MAP], Some(Mapping), None);
        b.seed(ClassId::PAIR, Class, Some(ClassId::ANY), &[], None, None);
        b
    }

    fn seed(
        &mut self,
        id: ClassId,
        kind: ClassKind,
        superclass: Option<ClassId>,
        interfaces: &[ClassId],
        shape: Option<ContainerShape>,
        boxed: Option<ClassId>,
    ) {
        debug_assert_eq!(id.index as usize, self.table.defs.len(), "standard class {id} out of order");
        self.table.by_name.insert(id.name, id);
        self.table.defs.push(ClassDef {
            id,
            kind,
            superclass,
            interfaces: interfaces.to_vec(),
            shape,
            boxed,
        });
    }

    /// Define a concrete class extending `superclass` and implementing `interfaces`.
    pub fn define_class(
        &mut self,
        name: &str,
        superclass: ClassId,
        interfaces: &[ClassId],
    ) -> Result<ClassId, ClassTableError> {
        self.define(name, ClassKind::Class, Some(superclass), interfaces)
    }

    pub fn define_abstract_class(
        &mut self,
        name: &str,
        superclass: ClassId,
        interfaces: &[ClassId],
    ) -> Result<ClassId, ClassTableError> {
        self.define(name, ClassKind::AbstractClass, Some(superclass), interfaces)
    }

    /// Define an interface extending the given super-interfaces.
    pub fn define_interface(
        &mut self,
        name: &str,
        extends: &[ClassId],
    ) -> Result<ClassId, ClassTableError> {
        self.define(name, ClassKind::Interface, None, extends)
    }

    /// Default concrete class allocated for a sequence or mapping target.
    pub fn set_default(
        &mut self,
        shape: ContainerShape,
        class: ClassId,
    ) -> Result<(), ClassTableError> {
        let def = self
            .table
            .def(class)
            .ok_or(ClassTableError::UnknownClass(class.name.to_string()))?;
        if def.kind != ClassKind::Class || def.shape != Some(shape) {
            return Err(ClassTableError::InvalidDefault {
                class: class.name.to_string(),
                shape,
            });
        }
        match shape {
            ContainerShape::Sequence => self.table.sequence_default = class,
            ContainerShape::Mapping => self.table.mapping_default = class,
            ContainerShape::Array => {
                return Err(ClassTableError::InvalidDefault {
                    class: class.name.to_string(),
                    shape,
                });
            }
        }
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Option<ClassId> {
        self.table.resolve(name)
    }

    pub fn build(self) -> ClassTable {
        self.table
    }

    fn define(
        &mut self,
        name: &str,
        kind: ClassKind,
        superclass: Option<ClassId>,
        interfaces: &[ClassId],
    ) -> Result<ClassId, ClassTableError> {
        if name.is_empty() {
            return Err(ClassTableError::InvalidName(name.to_string()));
        }
        if self.table.by_name.contains_key(name) {
            return Err(ClassTableError::Duplicate(name.to_string()));
        }

        let mut shape = None;
        let mut merge = |parent: &ClassDef| -> Result<(), ClassTableError> {
            match (shape, parent.shape) {
                (Some(a), Some(b)) if a != b => Err(ClassTableError::ShapeConflict {
                    class: name.to_string(),
                    first: a,
                    second: b,
                }),
                (None, Some(b)) => {
                    shape = Some(b);
                    Ok(())
                }
                _ => Ok(()),
            }
        };

        if let Some(sup) = superclass {
            let def = self
                .table
                .def(sup)
                .ok_or_else(|| ClassTableError::UnknownClass(sup.name.to_string()))?;
            if !matches!(def.kind, ClassKind::Class | ClassKind::AbstractClass) {
                return Err(ClassTableError::NotAClass(sup.name.to_string()));
            }
            // Array values carry no class of their own.
            if def.shape == Some(ContainerShape::Array) {
                return Err(ClassTableError::Sealed(sup.name.to_string()));
            }
            merge(def)?;
        }
        for iface in interfaces {
            let def = self
                .table
                .def(*iface)
                .ok_or_else(|| ClassTableError::UnknownClass(iface.name.to_string()))?;
            if def.kind != ClassKind::Interface {
                return Err(ClassTableError::NotAnInterface(iface.name.to_string()));
            }
            merge(def)?;
        }

        let index = u32::try_from(self.table.defs.len())
            .map_err(|_| ClassTableError::InvalidName(name.to_string()))?;
        let name = intern(name);
        let id = ClassId { index, name };
        self.table.by_name.insert(name, id);
        self.table.defs.push(ClassDef {
            id,
            kind,
            superclass,
            interfaces: interfaces.to_vec(),
            shape,
            boxed: None,
        });
        Ok(id)
    }
}

/// Process-wide name interner; each distinct class name is allocated once,
/// however many tables define it.
fn intern(name: &str) -> &'static str {
    static NAMES: OnceLock<Mutex<HashSet<&'static str>>> = OnceLock::new();
    let mut names = NAMES
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(&existing) = names.get(name) {
        return existing;
    }
    let leaked: &'static str = Box::leak(name.to_owned().into_boxed_str());
    names.insert(leaked);
    leaked
}
