//! Container adapters: arrays, ordered sequences and mappings.
//!
//! Each adapter is an ordinary [`Converter`] registered against a container
//! family (`Array`, `Collection`, `Map`) with source `Any`. Elements, keys
//! and mapped values are converted by recursing into the [`Dispatcher`]
//! with the narrowed descriptor. Any element failure aborts the whole
//! container; nothing is dropped silently.

use std::borrow::Cow;
use std::sync::Arc;

use indexmap::IndexMap;
use indexmap::map::Entry;

use typecast_api::{
    ClassId, ClassKind, ContainerShape, ConversionContext, ConversionError, ConvertResult,
    Converter, Dispatcher, TypeDescriptor, Value,
};

/// Separator between key and value in a string-encoded mapping entry.
pub const DEFAULT_ENTRY_SEPARATOR: char = '=';

/// The three container adapters, mapping entries split on `separator`.
pub fn adapters(separator: char) -> Vec<Arc<dyn Converter>> {
    vec![
        Arc::new(ArrayAdapter),
        Arc::new(SequenceAdapter),
        Arc::new(MappingAdapter::new(separator)),
    ]
}

// ---------------------------------------------------------------------------
// Element conversion
// ---------------------------------------------------------------------------

/// One container conversion in progress.
struct Frame<'a> {
    value: &'a Value,
    target: &'a TypeDescriptor,
    ctx: &'a ConversionContext,
    dispatcher: &'a dyn Dispatcher,
}

impl Frame<'_> {
    /// Convert one element. Null stays null unless the element type is
    /// primitive; a non-null element that converts to nothing is a nested
    /// failure.
    fn element(
        &self,
        index: usize,
        element: &Value,
        ty: &TypeDescriptor,
    ) -> Result<Value, ConversionError> {
        if element.is_null() {
            if self.dispatcher.classes().kind(ty.raw_class()) == Some(ClassKind::Primitive) {
                let cause = ConversionError::failed(format!("null cannot be stored as {ty}"));
                return Err(self.nested(index, element, Some(Box::new(cause))));
            }
            return Ok(Value::Null);
        }
        match self.dispatcher.convert(Some(element.clone()), ty, self.ctx) {
            Ok(Some(out)) => Ok(out),
            Ok(None) => Err(self.nested(index, element, None)),
            Err(e) => Err(self.nested(index, element, Some(Box::new(e)))),
        }
    }

    fn nested(
        &self,
        index: usize,
        element: &Value,
        cause: Option<Box<ConversionError>>,
    ) -> ConversionError {
        ConversionError::Nested {
            value: self.value.clone(),
            target: self.target.clone(),
            value_source: self.ctx.source_tag(),
            index,
            element: element.clone(),
            cause,
        }
    }

    fn allocate(&self, shape: ContainerShape) -> Result<ClassId, ConversionError> {
        let raw = self.target.raw_class();
        self.dispatcher
            .classes()
            .instantiable(raw, shape)
            .ok_or_else(|| {
                ConversionError::failed(format!("no concrete {shape} class is assignable to {raw}"))
            })
    }
}

/// Descriptor used when the target leaves the element type open.
fn open(ty: Option<&TypeDescriptor>) -> Cow<'_, TypeDescriptor> {
    match ty {
        Some(ty) => Cow::Borrowed(ty),
        None => Cow::Owned(TypeDescriptor::of(ClassId::ANY)),
    }
}

// ---------------------------------------------------------------------------
// Arrays and sequences
// ---------------------------------------------------------------------------

/// Any array or sequence to an array of the component type.
#[derive(Debug, Default)]
pub struct ArrayAdapter;

impl Converter for ArrayAdapter {
    fn source_type(&self) -> ClassId {
        ClassId::ANY
    }

    fn target_type(&self) -> ClassId {
        ClassId::ARRAY
    }

    fn name(&self) -> &str {
        "ArrayAdapter"
    }

    fn convert(
        &self,
        value: &Value,
        target: &TypeDescriptor,
        ctx: &ConversionContext,
        dispatcher: &dyn Dispatcher,
    ) -> ConvertResult {
        let Some(items) = value.items() else {
            return Ok(None);
        };
        let frame = Frame {
            value,
            target,
            ctx,
            dispatcher,
        };
        let component = open(target.component_type());
        let out = items
            .iter()
            .enumerate()
            .map(|(i, item)| frame.element(i, item, &component))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(Value::Array(out)))
    }
}

/// Any array or sequence to an ordered sequence.
///
/// The requested class is allocated when it is concrete; interfaces get
/// the class table's default sequence implementation.
#[derive(Debug, Default)]
pub struct SequenceAdapter;

impl Converter for SequenceAdapter {
    fn source_type(&self) -> ClassId {
        ClassId::ANY
    }

    fn target_type(&self) -> ClassId {
        ClassId::COLLECTION
    }

    fn name(&self) -> &str {
        "SequenceAdapter"
    }

    fn convert(
        &self,
        value: &Value,
        target: &TypeDescriptor,
        ctx: &ConversionContext,
        dispatcher: &dyn Dispatcher,
    ) -> ConvertResult {
        let Some(items) = value.items() else {
            return Ok(None);
        };
        let frame = Frame {
            value,
            target,
            ctx,
            dispatcher,
        };
        let class = frame.allocate(ContainerShape::Sequence)?;
        let element = open(target.component_type());
        let out = items
            .iter()
            .enumerate()
            .map(|(i, item)| frame.element(i, item, &element))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(Value::Seq { class, items: out }))
    }
}

// ---------------------------------------------------------------------------
// Mappings
// ---------------------------------------------------------------------------

/// Mapping, or sequence of entries, to a mapping.
///
/// Entries come from a source mapping directly, or from an array or
/// sequence whose items are either [`Value::Pair`]s or strings of the form
/// `key<separator>value` (split on the first separator).
#[derive(Debug)]
pub struct MappingAdapter {
    separator: char,
}

impl MappingAdapter {
    pub fn new(separator: char) -> Self {
        Self { separator }
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    fn split(&self, frame: &Frame<'_>, item: &Value) -> Result<(Value, Value), ConversionError> {
        match item {
            Value::Pair(kv) => Ok((kv.0.clone(), kv.1.clone())),
            Value::Str(s) => match s.split_once(self.separator) {
                Some((k, v)) => Ok((Value::from(k), Value::from(v))),
                None => Err(self.malformed(frame, s)),
            },
            other => Err(self.malformed(frame, &other.to_string())),
        }
    }

    fn malformed(&self, frame: &Frame<'_>, entry: &str) -> ConversionError {
        ConversionError::MalformedEntry {
            value: frame.value.clone(),
            entry: entry.to_string(),
            separator: self.separator,
            target: frame.target.clone(),
            value_source: frame.ctx.source_tag(),
        }
    }
}

impl Default for MappingAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_ENTRY_SEPARATOR)
    }
}

impl Converter for MappingAdapter {
    fn source_type(&self) -> ClassId {
        ClassId::ANY
    }

    fn target_type(&self) -> ClassId {
        ClassId::MAP
    }

    fn name(&self) -> &str {
        "MappingAdapter"
    }

    fn convert(
        &self,
        value: &Value,
        target: &TypeDescriptor,
        ctx: &ConversionContext,
        dispatcher: &dyn Dispatcher,
    ) -> ConvertResult {
        let frame = Frame {
            value,
            target,
            ctx,
            dispatcher,
        };
        let raw: Vec<(Value, Value)> = match value {
            Value::Map { entries, .. } => entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            Value::Array(items) | Value::Seq { items, .. } => items
                .iter()
                .map(|item| self.split(&frame, item))
                .collect::<Result<_, _>>()?,
            _ => return Ok(None),
        };

        let class = frame.allocate(ContainerShape::Mapping)?;
        let key_ty = open(target.key_type());
        let value_ty = open(target.component_type());
        let mut entries = IndexMap::with_capacity(raw.len());
        for (i, (k, v)) in raw.iter().enumerate() {
            let key = frame.element(i, k, &key_ty)?;
            let mapped = frame.element(i, v, &value_ty)?;
            match entries.entry(key) {
                Entry::Occupied(slot) => {
                    return Err(ConversionError::DuplicateKey {
                        value: value.clone(),
                        key: slot.key().clone(),
                        target: target.clone(),
                        value_source: ctx.source_tag(),
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(mapped);
                }
            }
        }
        Ok(Some(Value::Map { class, entries }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    fn convert(value: Value, target: TypeDescriptor) -> ConvertResult {
        Registry::standard().convert(Some(value), &target, &ConversionContext::with_source("test"))
    }

    fn strings(items: &[&str]) -> Value {
        Value::list(items.iter().map(|s| Value::from(*s)).collect())
    }

    fn int_list() -> TypeDescriptor {
        TypeDescriptor::sequence(ClassId::LIST, TypeDescriptor::of(ClassId::INTEGER))
    }

    fn string_to_int_map() -> TypeDescriptor {
        TypeDescriptor::mapping(
            ClassId::MAP,
            TypeDescriptor::of(ClassId::STRING),
            TypeDescriptor::of(ClassId::INTEGER),
        )
    }

    #[test]
    fn sequence_allocates_requested_class() {
        let target =
            TypeDescriptor::sequence(ClassId::LINKED_LIST, TypeDescriptor::of(ClassId::LONG));
        let out = convert(strings(&["7", "8"]), target).unwrap().unwrap();
        assert_eq!(
            out,
            Value::Seq {
                class: ClassId::LINKED_LIST,
                items: vec![Value::Long(7), Value::Long(8)],
            }
        );
    }

    #[test]
    fn sequence_interface_uses_default_class() {
        let out = convert(strings(&["1"]), int_list()).unwrap().unwrap();
        assert_eq!(out.class(), ClassId::ARRAY_LIST);
    }

    #[test]
    fn array_from_sequence_and_back() {
        let array = convert(
            strings(&["1", "2"]),
            TypeDescriptor::array_of(TypeDescriptor::of(ClassId::PRIM_INT)),
        )
        .unwrap()
        .unwrap();
        assert_eq!(array, Value::Array(vec![Value::Int(1), Value::Int(2)]));

        let list = convert(array, TypeDescriptor::of(ClassId::ARRAY_LIST))
            .unwrap()
            .unwrap();
        assert_eq!(list, Value::list(vec![Value::Int(1), Value::Int(2)]));
    }

    #[test]
    fn null_elements_are_kept() {
        let source = Value::list(vec![Value::from("1"), Value::Null]);
        let out = convert(source, int_list()).unwrap().unwrap();
        assert_eq!(out, Value::list(vec![Value::Int(1), Value::Null]));
    }

    #[test]
    fn null_elements_are_rejected_by_primitive_components() {
        let source = Value::list(vec![Value::from("1"), Value::Null]);
        let err = convert(
            source.clone(),
            TypeDescriptor::array_of(TypeDescriptor::of(ClassId::PRIM_INT)),
        )
        .unwrap_err();
        match &err {
            ConversionError::Nested {
                index,
                element,
                cause: Some(cause),
                ..
            } => {
                assert_eq!(*index, 1);
                assert_eq!(element, &Value::Null);
                assert_eq!(cause.to_string(), "null cannot be stored as int");
            }
            other => panic!("expected nested failure, got {other:?}"),
        }

        let boxed = convert(
            source,
            TypeDescriptor::array_of(TypeDescriptor::of(ClassId::INTEGER)),
        )
        .unwrap()
        .unwrap();
        assert_eq!(boxed, Value::Array(vec![Value::Int(1), Value::Null]));
    }

    #[test]
    fn non_iterable_source_declines() {
        assert_eq!(convert(Value::Int(1), int_list()).unwrap(), None);
        assert_eq!(convert(Value::Bool(true), string_to_int_map()).unwrap(), None);
    }

    #[test]
    fn element_without_converter_is_nested_failure() {
        let source = Value::list(vec![Value::Int(1), Value::list(vec![])]);
        let err = convert(source.clone(), int_list()).unwrap_err();
        match err {
            ConversionError::Nested {
                value,
                index,
                cause,
                value_source,
                ..
            } => {
                assert_eq!(value, source);
                assert_eq!(index, 1);
                assert!(cause.is_none());
                assert_eq!(value_source.as_deref(), Some("test"));
            }
            other => panic!("expected nested failure, got {other:?}"),
        }
    }

    #[test]
    fn mapping_from_pairs_and_maps() {
        let pairs = Value::list(vec![
            Value::pair(Value::from("a"), Value::from("1")),
            Value::pair(Value::from("b"), Value::Long(2)),
        ]);
        let out = convert(pairs, string_to_int_map()).unwrap().unwrap();
        assert_eq!(
            out,
            Value::map([
                (Value::from("a"), Value::Int(1)),
                (Value::from("b"), Value::Int(2)),
            ])
        );

        let source = Value::map([(Value::from("x"), Value::from("5"))]);
        let target = TypeDescriptor::mapping(
            ClassId::HASH_MAP,
            TypeDescriptor::of(ClassId::STRING),
            TypeDescriptor::of(ClassId::LONG),
        );
        let out = convert(source, target).unwrap().unwrap();
        assert_eq!(out.class(), ClassId::HASH_MAP);
        assert_eq!(out.entries().unwrap()[&Value::from("x")], Value::Long(5));
    }

    #[test]
    fn entry_splits_on_first_separator_only() {
        let target = TypeDescriptor::mapping(
            ClassId::MAP,
            TypeDescriptor::of(ClassId::STRING),
            TypeDescriptor::of(ClassId::STRING),
        );
        let out = convert(strings(&["url=a=b"]), target).unwrap().unwrap();
        assert_eq!(out.entries().unwrap()[&Value::from("url")], Value::from("a=b"));
    }

    #[test]
    fn converted_keys_can_collide() {
        let source = Value::map([
            (Value::from("1"), Value::from("a")),
            (Value::from("01"), Value::from("b")),
        ]);
        let target = TypeDescriptor::mapping(
            ClassId::MAP,
            TypeDescriptor::of(ClassId::INTEGER),
            TypeDescriptor::of(ClassId::STRING),
        );
        let err = convert(source, target).unwrap_err();
        assert!(matches!(err, ConversionError::DuplicateKey { key: Value::Int(1), .. }));
    }

    #[test]
    fn custom_separator() {
        let mut builder = Registry::builder(typecast_api::ClassTable::standard());
        builder
            .extend(crate::builtin::standard(&Default::default()))
            .extend(adapters(':'));
        let registry = builder.freeze();

        let out = registry
            .convert(
                Some(strings(&["a:1"])),
                &string_to_int_map(),
                &ConversionContext::new(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(out, Value::map([(Value::from("a"), Value::Int(1))]));

        let err = registry
            .convert(
                Some(strings(&["a=1"])),
                &string_to_int_map(),
                &ConversionContext::new(),
            )
            .unwrap_err();
        assert!(matches!(err, ConversionError::MalformedEntry { separator: ':', .. }));
    }

    #[test]
    fn non_string_entry_is_malformed() {
        let err = convert(Value::list(vec![Value::Int(3)]), string_to_int_map()).unwrap_err();
        match err {
            ConversionError::MalformedEntry { entry, .. } => assert_eq!(entry, "3"),
            other => panic!("expected malformed entry, got {other:?}"),
        }
    }
}
