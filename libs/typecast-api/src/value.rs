use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::class::ClassId;

/// Dynamic value handed to and produced by converters.
///
/// Strategy by type:
/// - Scalars (Bool, Int, Long, Double): stored inline
/// - Str: shared, so identity-preserving returns stay cheap
/// - Array, Seq, Map: owned, elements converted individually
/// - Object: opaque payload of a user-defined class
///
/// `Null` stands for an absent element inside a container. Equality and
/// hashing are total (doubles by bit pattern, objects by payload identity),
/// so any value can key a map.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    Str(Arc<str>),
    /// Fixed-size array; the element type lives in the target descriptor.
    Array(Vec<Value>),
    /// Ordered sequence of a concrete sequence class (`ArrayList`, ...).
    Seq { class: ClassId, items: Vec<Value> },
    /// Insertion-ordered mapping of a concrete mapping class.
    Map {
        class: ClassId,
        entries: IndexMap<Value, Value>,
    },
    /// Already-separated key/value entry.
    Pair(Box<(Value, Value)>),
    Object(Object),
}

impl Value {
    /// Runtime class used for the source-side hierarchy walk.
    pub fn class(&self) -> ClassId {
        match self {
            // Null never reaches a walk; report the root for diagnostics.
            Value::Null => ClassId::ANY,
            Value::Bool(_) => ClassId::BOOLEAN,
            Value::Int(_) => ClassId::INTEGER,
            Value::Long(_) => ClassId::LONG,
            Value::Double(_) => ClassId::DOUBLE,
            Value::Str(_) => ClassId::STRING,
            Value::Array(_) => ClassId::ARRAY,
            Value::Seq { class, .. } | Value::Map { class, .. } => *class,
            Value::Pair(_) => ClassId::PAIR,
            Value::Object(o) => o.class,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn str(s: impl Into<Arc<str>>) -> Self {
        Value::Str(s.into())
    }

    /// `ArrayList` of the given items.
    pub fn list(items: Vec<Value>) -> Self {
        Value::Seq {
            class: ClassId::ARRAY_LIST,
            items,
        }
    }

    pub fn pair(key: Value, value: Value) -> Self {
        Value::Pair(Box::new((key, value)))
    }

    /// `LinkedHashMap` of the given entries; later duplicates overwrite earlier ones.
    pub fn map<I: IntoIterator<Item = (Value, Value)>>(entries: I) -> Self {
        Value::Map {
            class: ClassId::LINKED_HASH_MAP,
            entries: entries.into_iter().collect(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(i64::from(*v)),
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Elements of an array or sequence.
    pub fn items(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) | Value::Seq { items, .. } => Some(items),
            _ => None,
        }
    }

    pub fn entries(&self) -> Option<&IndexMap<Value, Value>> {
        match self {
            Value::Map { entries, .. } => Some(entries),
            _ => None,
        }
    }

    /// Import from JSON: integers become `Int` when they fit, else `Long`;
    /// arrays become `ArrayList`, objects `LinkedHashMap` keyed by strings.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    i32::try_from(i).map(Value::Int).unwrap_or(Value::Long(i))
                } else {
                    Value::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::str(s),
            serde_json::Value::Array(items) => {
                Value::list(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(obj) => Value::map(
                obj.into_iter()
                    .map(|(k, v)| (Value::str(k), Value::from_json(v))),
            ),
        }
    }

    /// Export to JSON. Non-string map keys and objects are rendered with
    /// `Display`; non-finite doubles become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(v) => serde_json::Value::from(*v),
            Value::Long(v) => serde_json::Value::from(*v),
            Value::Double(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.to_string()),
            Value::Array(items) | Value::Seq { items, .. } => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map { entries, .. } => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| {
                        let key = match k {
                            Value::Str(s) => s.to_string(),
                            other => other.to_string(),
                        };
                        (key, v.to_json())
                    })
                    .collect(),
            ),
            Value::Pair(kv) => serde_json::Value::Array(vec![kv.0.to_json(), kv.1.to_json()]),
            Value::Object(o) => serde_json::Value::String(o.to_string()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::str(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::str(v)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Seq { class: ca, items: a }, Value::Seq { class: cb, items: b }) => {
                ca == cb && a == b
            }
            // Insertion order is part of a mapping's identity.
            (Value::Map { class: ca, entries: a }, Value::Map { class: cb, entries: b }) => {
                ca == cb && a.len() == b.len() && a.iter().eq(b.iter())
            }
            (Value::Pair(a), Value::Pair(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(v) => v.hash(state),
            Value::Long(v) => v.hash(state),
            Value::Double(v) => v.to_bits().hash(state),
            Value::Str(s) => s.hash(state),
            Value::Array(items) => items.hash(state),
            Value::Seq { class, items } => {
                class.hash(state);
                items.hash(state);
            }
            Value::Map { class, entries } => {
                class.hash(state);
                state.write_usize(entries.len());
                for (k, v) in entries {
                    k.hash(state);
                    v.hash(state);
                }
            }
            Value::Pair(kv) => kv.hash(state),
            Value::Object(o) => o.hash(state),
        }
    }
}

/// Serializes through the JSON form of [`Value::to_json`].
impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde::Serialize::serialize(&self.to_json(), serializer)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}L"),
            Value::Double(v) => write!(f, "{v:?}"),
            Value::Str(s) => write!(f, "{:?}", &**s),
            Value::Array(items) => write_items(f, "[", items, "]"),
            Value::Seq { class, items } => {
                f.write_str(class.name())?;
                write_items(f, "[", items, "]")
            }
            Value::Map { class, entries } => {
                write!(f, "{}{{", class.name())?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Value::Pair(kv) => write!(f, "{}={}", kv.0, kv.1),
            Value::Object(o) => fmt::Display::fmt(o, f),
        }
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, open: &str, items: &[Value], close: &str) -> fmt::Result {
    f.write_str(open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str(close)
}

/// Instance of a user-defined class.
///
/// The payload is shared; clones refer to the same instance and compare
/// equal only to each other.
#[derive(Clone)]
pub struct Object {
    class: ClassId,
    payload: Arc<dyn Any + Send + Sync>,
}

impl Object {
    pub fn new<T: Any + Send + Sync>(class: ClassId, payload: T) -> Self {
        Self {
            class,
            payload: Arc::new(payload),
        }
    }

    pub fn class(&self) -> ClassId {
        self.class
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref()
    }

    /// `true` when both handles point at the same instance.
    pub fn same_instance(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.payload, &other.payload)
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.payload).cast::<()>() as usize
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class && self.same_instance(other)
    }
}

impl Eq for Object {}

impl Hash for Object {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.class.hash(state);
        self.addr().hash(state);
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("class", &self.class)
            .field("addr", &format_args!("{:#x}", self.addr()))
            .finish()
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}@{:x}>", self.class.name(), self.addr())
    }
}
