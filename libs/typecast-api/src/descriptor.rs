use std::fmt;

use crate::class::{ClassId, ClassTable, ContainerShape};
use crate::error::TypeParseError;

/// A possibly parameterized conversion target.
///
/// `component_type` is the element type of an array or sequence, or the
/// value type of a mapping; `key_type` is only set for mappings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    raw: ClassId,
    component: Option<Box<TypeDescriptor>>,
    key: Option<Box<TypeDescriptor>>,
}

impl TypeDescriptor {
    /// Plain, non-parameterized type.
    pub fn of(raw: ClassId) -> Self {
        Self {
            raw,
            component: None,
            key: None,
        }
    }

    pub fn array_of(component: TypeDescriptor) -> Self {
        Self {
            raw: ClassId::ARRAY,
            component: Some(Box::new(component)),
            key: None,
        }
    }

    pub fn sequence(raw: ClassId, element: TypeDescriptor) -> Self {
        Self {
            raw,
            component: Some(Box::new(element)),
            key: None,
        }
    }

    pub fn mapping(raw: ClassId, key: TypeDescriptor, value: TypeDescriptor) -> Self {
        Self {
            raw,
            component: Some(Box::new(value)),
            key: Some(Box::new(key)),
        }
    }

    pub fn raw_class(&self) -> ClassId {
        self.raw
    }

    pub fn component_type(&self) -> Option<&TypeDescriptor> {
        self.component.as_deref()
    }

    pub fn key_type(&self) -> Option<&TypeDescriptor> {
        self.key.as_deref()
    }

    /// Check that every class in the descriptor is known to `classes` and
    /// takes the parameters attached to it.
    ///
    /// Parsed descriptors always pass; descriptors assembled with
    /// [`TypeDescriptor::sequence`] or [`TypeDescriptor::mapping`] may not.
    pub fn validate(&self, classes: &ClassTable) -> Result<(), TypeParseError> {
        if !classes.contains(self.raw) {
            return Err(TypeParseError::UnknownClass(self.raw.name().to_string()));
        }
        let found = usize::from(self.key.is_some()) + usize::from(self.component.is_some());
        // `key` without `component` cannot be built, so the count is enough.
        if !accepts(classes.shape(self.raw), found) {
            return Err(TypeParseError::Parameters {
                class: self.raw.name().to_string(),
                found,
            });
        }
        for param in self.key.iter().chain(self.component.iter()) {
            param.validate(classes)?;
        }
        Ok(())
    }

    /// Parse a type expression such as `Map<String, List<Integer>>` or `int[]`.
    ///
    /// Grammar: `type := name ('<' type (',' type)? '>')? ('[]')*`.
    /// Parameters are accepted only where the class shape takes them.
    pub fn parse(expr: &str, classes: &ClassTable) -> Result<Self, TypeParseError> {
        let mut parser = Parser {
            input: expr,
            pos: 0,
            classes,
        };
        let ty = parser.parse_type()?;
        parser.skip_ws();
        if parser.pos < expr.len() {
            return Err(TypeParseError::Trailing {
                offset: parser.pos,
                rest: expr[parser.pos..].to_string(),
            });
        }
        Ok(ty)
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.raw == ClassId::ARRAY
            && let Some(component) = &self.component
        {
            return write!(f, "{component}[]");
        }
        f.write_str(self.raw.name())?;
        match (&self.key, &self.component) {
            (Some(key), Some(value)) => write!(f, "<{key}, {value}>"),
            (None, Some(element)) => write!(f, "<{element}>"),
            _ => Ok(()),
        }
    }
}

/// Number of type parameters a class of `shape` takes.
fn accepts(shape: Option<ContainerShape>, found: usize) -> bool {
    match shape {
        Some(ContainerShape::Array | ContainerShape::Sequence) => found <= 1,
        Some(ContainerShape::Mapping) => found == 0 || found == 2,
        None => found == 0,
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    classes: &'a ClassTable,
}

impl<'a> Parser<'a> {
    fn parse_type(&mut self) -> Result<TypeDescriptor, TypeParseError> {
        self.skip_ws();
        let name_at = self.pos;
        let name = self.ident()?;
        let raw = self
            .classes
            .resolve(name)
            .ok_or_else(|| TypeParseError::UnknownClass(name.to_string()))?;

        let mut params = Vec::new();
        self.skip_ws();
        if self.eat('<') {
            loop {
                params.push(self.parse_type()?);
                self.skip_ws();
                if self.eat(',') {
                    continue;
                }
                self.expect('>')?;
                break;
            }
        }

        if !accepts(self.classes.shape(raw), params.len()) {
            return Err(TypeParseError::Arity {
                class: name.to_string(),
                offset: name_at,
                found: params.len(),
            });
        }

        let mut params = params.into_iter();
        let mut ty = match (params.next(), params.next()) {
            (Some(key), Some(value)) => TypeDescriptor::mapping(raw, key, value),
            (Some(element), None) => TypeDescriptor::sequence(raw, element),
            _ => TypeDescriptor::of(raw),
        };

        loop {
            self.skip_ws();
            if !self.eat('[') {
                break;
            }
            self.skip_ws();
            self.expect(']')?;
            ty = TypeDescriptor::array_of(ty);
        }
        Ok(ty)
    }

    fn ident(&mut self) -> Result<&'a str, TypeParseError> {
        let input = self.input;
        let start = self.pos;
        let rest = &input[start..];
        let len = rest
            .char_indices()
            .find(|(_, c)| !(c.is_alphanumeric() || matches!(c, '_' | '.' | '$')))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(self.unexpected("type name"));
        }
        self.pos += len;
        Ok(&input[start..start + len])
    }

    fn skip_ws(&mut self) {
        let rest = &self.input[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn eat(&mut self, c: char) -> bool {
        if self.input[self.pos..].starts_with(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<(), TypeParseError> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.unexpected(match c {
                '>' => "'>' or ','",
                ']' => "']'",
                _ => "delimiter",
            }))
        }
    }

    fn unexpected(&self, expected: &'static str) -> TypeParseError {
        TypeParseError::Unexpected {
            expected,
            found: self.input[self.pos..].chars().next(),
            offset: self.pos,
        }
    }
}
