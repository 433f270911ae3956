use std::sync::Arc;

use crate::class::ContainerShape;
use crate::descriptor::TypeDescriptor;
use crate::value::Value;

/// Boxed cause reported by a converter.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure of a conversion.
///
/// "No converter found" is not an error: dispatch reports it as `Ok(None)`.
/// Every variant except [`ConversionError::Failed`] embeds the original
/// value, the requested target and the value source, however deep the
/// failure occurred.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    /// A string-encoded mapping entry lacks the separator.
    #[error("malformed entry {entry:?} in {value}: expected 'key{separator}value' for {target}{}", at(.value_source))]
    MalformedEntry {
        value: Value,
        entry: String,
        separator: char,
        target: TypeDescriptor,
        value_source: Option<Arc<str>>,
    },

    /// Two source entries produced the same key in the new mapping.
    #[error("duplicate key {key} converting {value} to {target}{}", at(.value_source))]
    DuplicateKey {
        value: Value,
        key: Value,
        target: TypeDescriptor,
        value_source: Option<Arc<str>>,
    },

    /// An element, key or mapped value of a container could not be converted.
    ///
    /// `cause` is `None` when no converter accepted the element.
    #[error("cannot convert element {index} ({element}) of {value} to {target}{}", at(.value_source))]
    Nested {
        value: Value,
        target: TypeDescriptor,
        value_source: Option<Arc<str>>,
        index: usize,
        element: Value,
        #[source]
        cause: Option<Box<ConversionError>>,
    },

    /// The requested target carries parameters its class cannot take.
    #[error("cannot convert {value} to malformed target {target}{}: {source}", at(.value_source))]
    InvalidTarget {
        value: Value,
        target: TypeDescriptor,
        value_source: Option<Arc<str>>,
        #[source]
        source: TypeParseError,
    },

    /// A converter reported an unexpected failure; wrapped at the registry boundary.
    #[error("converter {converter} failed on {value} -> {target}{}: {source}", at(.value_source))]
    Delegate {
        converter: String,
        value: Value,
        target: TypeDescriptor,
        value_source: Option<Arc<str>>,
        source: BoxError,
    },

    /// Raw failure raised inside a converter, before the registry adds context.
    #[error("{0}")]
    Failed(BoxError),
}

impl ConversionError {
    /// Raw converter failure from any error or message.
    pub fn failed(err: impl Into<BoxError>) -> Self {
        Self::Failed(err.into())
    }

    /// Original value of the conversion that failed.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::MalformedEntry { value, .. }
            | Self::DuplicateKey { value, .. }
            | Self::Nested { value, .. }
            | Self::InvalidTarget { value, .. }
            | Self::Delegate { value, .. } => Some(value),
            Self::Failed(_) => None,
        }
    }

    /// Requested target of the conversion that failed.
    pub fn target(&self) -> Option<&TypeDescriptor> {
        match self {
            Self::MalformedEntry { target, .. }
            | Self::DuplicateKey { target, .. }
            | Self::Nested { target, .. }
            | Self::InvalidTarget { target, .. }
            | Self::Delegate { target, .. } => Some(target),
            Self::Failed(_) => None,
        }
    }

    pub fn value_source(&self) -> Option<&str> {
        match self {
            Self::MalformedEntry { value_source, .. }
            | Self::DuplicateKey { value_source, .. }
            | Self::Nested { value_source, .. }
            | Self::InvalidTarget { value_source, .. }
            | Self::Delegate { value_source, .. } => value_source.as_deref(),
            Self::Failed(_) => None,
        }
    }

    /// Innermost failure along the `Nested` chain.
    pub fn root(&self) -> &ConversionError {
        let mut current = self;
        while let Self::Nested {
            cause: Some(inner), ..
        } = current
        {
            current = inner.as_ref();
        }
        current
    }
}

fn at(value_source: &Option<Arc<str>>) -> String {
    match value_source {
        Some(src) => format!(" (from {src})"),
        None => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassTableError {
    #[error("unknown class '{0}'")]
    UnknownClass(String),

    #[error("class '{0}' is already defined")]
    Duplicate(String),

    #[error("invalid class name {0:?}")]
    InvalidName(String),

    #[error("'{0}' is not a class and cannot be extended")]
    NotAClass(String),

    #[error("'{0}' is not an interface")]
    NotAnInterface(String),

    #[error("'{0}' is sealed and cannot be extended")]
    Sealed(String),

    #[error("class '{class}' inherits both {first} and {second} container shapes")]
    ShapeConflict {
        class: String,
        first: ContainerShape,
        second: ContainerShape,
    },

    #[error("'{class}' cannot be the default {shape} implementation")]
    InvalidDefault { class: String, shape: ContainerShape },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeParseError {
    #[error("unknown class '{0}'")]
    UnknownClass(String),

    #[error("expected {expected} at offset {offset}, found {}", .found.map(|c| format!("{c:?}")).unwrap_or_else(|| "end of input".into()))]
    Unexpected {
        expected: &'static str,
        found: Option<char>,
        offset: usize,
    },

    #[error("'{class}' at offset {offset} does not take {found} type parameter(s)")]
    Arity {
        class: String,
        offset: usize,
        found: usize,
    },

    #[error("unexpected trailing input {rest:?} at offset {offset}")]
    Trailing { offset: usize, rest: String },

    /// A descriptor built in code pairs a class with parameters it cannot take.
    #[error("'{class}' does not take {found} type parameter(s)")]
    Parameters { class: String, found: usize },
}
