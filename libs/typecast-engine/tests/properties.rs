use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use typecast_api::{
    ClassId, ClassTable, ConversionContext, ConversionError, ConvertResult, Converter, Dispatcher,
    Object, TypeDescriptor, Value,
};
use typecast_engine::{EngineConfig, Engine, Registry};

fn ctx() -> ConversionContext {
    ConversionContext::with_source("row 4 of import.csv")
}

fn strings(items: &[&str]) -> Value {
    Value::list(items.iter().map(|s| Value::from(*s)).collect())
}

fn list_of(element: ClassId) -> TypeDescriptor {
    TypeDescriptor::sequence(ClassId::LIST, TypeDescriptor::of(element))
}

fn map_of(key: ClassId, value: ClassId) -> TypeDescriptor {
    TypeDescriptor::mapping(ClassId::MAP, TypeDescriptor::of(key), TypeDescriptor::of(value))
}

/// Produces an object of `target` and counts how often it ran.
struct Counting {
    source: ClassId,
    target: ClassId,
    decline: bool,
    calls: AtomicUsize,
}

impl Counting {
    fn new(source: ClassId, target: ClassId) -> Arc<Self> {
        Arc::new(Self {
            source,
            target,
            decline: false,
            calls: AtomicUsize::new(0),
        })
    }

    fn declining(source: ClassId, target: ClassId) -> Arc<Self> {
        Arc::new(Self {
            source,
            target,
            decline: true,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Converter for Counting {
    fn source_type(&self) -> ClassId {
        self.source
    }

    fn target_type(&self) -> ClassId {
        self.target
    }

    fn convert(
        &self,
        value: &Value,
        target: &TypeDescriptor,
        _ctx: &ConversionContext,
        _dispatcher: &dyn Dispatcher,
    ) -> ConvertResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.decline {
            return Ok(None);
        }
        // Builds the requested class, which may be a subclass of `self.target`.
        let class = target.raw_class();
        Ok(Some(Value::Object(Object::new(class, value.to_string()))))
    }
}

#[test]
fn identity_returns_the_same_instance() {
    let registry = Registry::standard();

    let text: Arc<str> = Arc::from("already a string");
    let out = registry
        .convert(
            Some(Value::Str(Arc::clone(&text))),
            &TypeDescriptor::of(ClassId::STRING),
            &ctx(),
        )
        .unwrap();
    match out {
        Some(Value::Str(s)) => assert!(Arc::ptr_eq(&s, &text)),
        other => panic!("expected the input string, got {other:?}"),
    }

    let object = Object::new(ClassId::PAIR, 5u32);
    let out = registry
        .convert(
            Some(Value::Object(object.clone())),
            &TypeDescriptor::of(ClassId::ANY),
            &ctx(),
        )
        .unwrap();
    match out {
        Some(Value::Object(o)) => assert!(o.same_instance(&object)),
        other => panic!("expected the input object, got {other:?}"),
    }

    // Boxed values satisfy primitive targets.
    let out = registry
        .convert(Some(Value::Int(3)), &TypeDescriptor::of(ClassId::PRIM_INT), &ctx())
        .unwrap();
    assert_eq!(out, Some(Value::Int(3)));

    // A list that already holds strings satisfies List<String> as-is.
    let source = strings(&["a", "b"]);
    let out = registry
        .convert(Some(source.clone()), &list_of(ClassId::STRING), &ctx())
        .unwrap();
    assert_eq!(out, Some(source));
}

#[test]
fn absence_propagates() {
    let registry = Registry::standard();
    for target in [
        TypeDescriptor::of(ClassId::INTEGER),
        TypeDescriptor::of(ClassId::PRIM_DOUBLE),
        list_of(ClassId::LONG),
        map_of(ClassId::STRING, ClassId::INTEGER),
        TypeDescriptor::array_of(TypeDescriptor::of(ClassId::STRING)),
    ] {
        assert_eq!(registry.convert(None, &target, &ctx()).unwrap(), None, "{target}");
    }
}

#[test]
fn derived_target_group_precedes_base() {
    let mut classes = ClassTable::builder();
    let base = classes.define_class("Base", ClassId::ANY, &[]).unwrap();
    let derived = classes.define_class("Derived", base, &[]).unwrap();

    let to_base = Counting::new(ClassId::STRING, base);
    let to_derived = Counting::new(ClassId::STRING, derived);
    let mut builder = Registry::builder(classes.build());
    builder.register(to_base.clone());
    builder.register(to_derived.clone());
    let registry = builder.freeze();

    let out = registry
        .convert(Some(Value::from("x")), &TypeDescriptor::of(derived), &ctx())
        .unwrap()
        .unwrap();
    assert_eq!(out.class(), derived);
    assert_eq!(to_derived.calls(), 1);
    assert_eq!(to_base.calls(), 0);
}

#[test]
fn declining_derived_group_falls_back_to_base() {
    let mut classes = ClassTable::builder();
    let base = classes.define_class("Base", ClassId::ANY, &[]).unwrap();
    let derived = classes.define_class("Derived", base, &[]).unwrap();

    let to_base = Counting::new(ClassId::STRING, base);
    let to_derived = Counting::declining(ClassId::STRING, derived);
    let mut builder = Registry::builder(classes.build());
    builder.extend([to_base.clone() as Arc<dyn Converter>, to_derived.clone()]);
    let registry = builder.freeze();

    let out = registry
        .convert(Some(Value::from("x")), &TypeDescriptor::of(derived), &ctx())
        .unwrap()
        .unwrap();
    assert_eq!(out.class(), derived);
    assert!(registry.classes().is_assignable(out.class(), derived));
    assert_eq!(to_derived.calls(), 1);
    assert_eq!(to_base.calls(), 1);
}

#[test]
fn diamond_reaches_a_converter_once() {
    let mut classes = ClassTable::builder();
    let shape = classes.define_interface("Shape", &[]).unwrap();
    let base = classes.define_class("Base", ClassId::ANY, &[shape]).unwrap();
    let derived = classes.define_class("Derived", base, &[shape]).unwrap();
    let table = classes.build();
    assert_eq!(
        table.ancestors(derived).filter(|c| *c == shape).count(),
        2,
        "Shape is reachable along two paths"
    );

    let via_shape = Counting::declining(shape, ClassId::STRING);
    let mut builder = Registry::builder(table);
    builder.register(via_shape.clone());
    let registry = builder.freeze();

    let out = registry
        .convert(
            Some(Value::Object(Object::new(derived, ()))),
            &TypeDescriptor::of(ClassId::STRING),
            &ctx(),
        )
        .unwrap();
    assert_eq!(out, None);
    assert_eq!(via_shape.calls(), 1);
}

#[test]
fn diamond_in_target_hierarchy_reaches_a_group_once() {
    let mut classes = ClassTable::builder();
    let shape = classes.define_interface("Shape", &[]).unwrap();
    let base = classes.define_class("Base", ClassId::ANY, &[shape]).unwrap();
    let derived = classes.define_class("Derived", base, &[shape]).unwrap();

    let to_shape = Counting::declining(ClassId::STRING, shape);
    let mut builder = Registry::builder(classes.build());
    builder.register(to_shape.clone());
    let registry = builder.freeze();

    let out = registry
        .convert(Some(Value::from("x")), &TypeDescriptor::of(derived), &ctx())
        .unwrap();
    assert_eq!(out, None);
    assert_eq!(to_shape.calls(), 1);
}

#[test]
fn sequence_of_strings_to_list_of_integers() {
    let registry = Registry::standard();
    let out = registry
        .convert(Some(strings(&["1", "2", "3"])), &list_of(ClassId::INTEGER), &ctx())
        .unwrap();
    assert_eq!(
        out,
        Some(Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]))
    );
}

#[test]
fn map_entries_are_parsed() {
    let registry = Registry::standard();
    let out = registry
        .convert(
            Some(strings(&["a=1", "b=2"])),
            &map_of(ClassId::STRING, ClassId::INTEGER),
            &ctx(),
        )
        .unwrap()
        .unwrap();
    assert_eq!(
        out,
        Value::map([
            (Value::from("a"), Value::Int(1)),
            (Value::from("b"), Value::Int(2)),
        ])
    );
}

#[test]
fn repeated_map_key_is_duplicate() {
    let registry = Registry::standard();
    let source = strings(&["a=1", "a=2"]);
    let err = registry
        .convert(
            Some(source.clone()),
            &map_of(ClassId::STRING, ClassId::INTEGER),
            &ctx(),
        )
        .unwrap_err();
    match &err {
        ConversionError::DuplicateKey { value, key, .. } => {
            assert_eq!(value, &source);
            assert_eq!(key, &Value::from("a"));
        }
        other => panic!("expected duplicate key, got {other:?}"),
    }
    assert_eq!(err.value_source(), Some("row 4 of import.csv"));
}

#[test]
fn entry_without_separator_is_malformed() {
    let registry = Registry::standard();
    let err = registry
        .convert(
            Some(strings(&["novalue"])),
            &map_of(ClassId::STRING, ClassId::STRING),
            &ctx(),
        )
        .unwrap_err();
    match err {
        ConversionError::MalformedEntry {
            entry, separator, ..
        } => {
            assert_eq!(entry, "novalue");
            assert_eq!(separator, '=');
        }
        other => panic!("expected malformed entry, got {other:?}"),
    }
}

#[test]
fn nested_failure_references_list_and_element() {
    let registry = Registry::standard();
    let source = strings(&["1", "not-a-number"]);
    let target = list_of(ClassId::INTEGER);
    let err = registry
        .convert(Some(source.clone()), &target, &ctx())
        .unwrap_err();

    match &err {
        ConversionError::Nested {
            value,
            target: reported,
            index,
            element,
            cause,
            ..
        } => {
            assert_eq!(value, &source);
            assert_eq!(reported, &target);
            assert_eq!(*index, 1);
            assert_eq!(element, &Value::from("not-a-number"));
            assert!(cause.is_some());
        }
        other => panic!("expected nested failure, got {other:?}"),
    }
    assert_eq!(err.value(), Some(&source));
    assert_eq!(err.value_source(), Some("row 4 of import.csv"));
    match err.root() {
        ConversionError::Delegate {
            converter, value, ..
        } => {
            assert_eq!(converter, "ParseInteger");
            assert_eq!(value, &Value::from("not-a-number"));
        }
        other => panic!("expected delegate root cause, got {other:?}"),
    }
    assert!(err.to_string().contains("element 1"));
}

#[test]
fn nested_containers_recurse() {
    let registry = Registry::standard();
    let target = TypeDescriptor::mapping(
        ClassId::MAP,
        TypeDescriptor::of(ClassId::STRING),
        list_of(ClassId::LONG),
    );
    let source = Value::map([(Value::from("ports"), strings(&["80", "443"]))]);
    let out = registry
        .convert(Some(source), &target, &ctx())
        .unwrap()
        .unwrap();
    assert_eq!(
        out,
        Value::map([(
            Value::from("ports"),
            Value::list(vec![Value::Long(80), Value::Long(443)]),
        )])
    );
}

#[test]
fn no_converter_is_absent_not_error() {
    let registry = Registry::standard();

    // A class with no converters at all.
    let out = registry
        .convert(Some(Value::from("x")), &TypeDescriptor::of(ClassId::PAIR), &ctx())
        .unwrap();
    assert_eq!(out, None);

    // An empty registry.
    let empty = Registry::builder(ClassTable::standard()).freeze();
    assert!(empty.is_empty());
    let out = empty
        .convert(Some(Value::from("1")), &TypeDescriptor::of(ClassId::INTEGER), &ctx())
        .unwrap();
    assert_eq!(out, None);
}

#[test]
fn lookup_reports_first_candidate() {
    let registry = Registry::standard();
    let conv = registry
        .lookup(ClassId::STRING, ClassId::PRIM_INT)
        .expect("strings parse to int");
    assert_eq!(conv.name(), "ParseInteger");

    let conv = registry.lookup(ClassId::INTEGER, ClassId::LONG).unwrap();
    assert_eq!(conv.name(), "NumberToLong");

    let conv = registry.lookup(ClassId::ARRAY, ClassId::ARRAY_LIST).unwrap();
    assert_eq!(conv.name(), "SequenceAdapter");

    assert!(registry.lookup(ClassId::BOOLEAN, ClassId::INTEGER).is_none());
    assert_eq!(registry.group(ClassId::MAP).map(|g| g.len()), Some(1));
}

#[test]
fn engine_bootstrap_from_config() {
    let config = EngineConfig::parse("[containers]\nentry_separator = \":\"").unwrap();
    let engine = Engine::bootstrap(config).unwrap();
    let out = engine
        .convert_expr(Some(strings(&["a:1"])), "Map<String, int>", &ctx())
        .unwrap();
    assert_eq!(out, Some(Value::map([(Value::from("a"), Value::Int(1))])));

    let registry = engine.into_registry();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                registry
                    .convert(Some(strings(&["1", "2"])), &list_of(ClassId::DOUBLE), &ctx())
                    .unwrap()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(
            handle.join().unwrap(),
            Some(Value::list(vec![Value::Double(1.0), Value::Double(2.0)]))
        );
    }
}
