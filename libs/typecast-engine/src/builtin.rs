//! Built-in leaf converters: string parsing, numeric narrowing and
//! widening, and scalar rendering to text.

use std::sync::Arc;

use typecast_api::{
    ClassId, ConversionContext, ConversionError, ConvertResult, Converter, Dispatcher,
    TypeDescriptor, Value,
};

/// How strings are read by the parsing converters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Strip surrounding whitespace before parsing.
    pub trim: bool,
    /// Accepted spellings of `true`, compared case-insensitively.
    pub true_literals: Vec<String>,
    pub false_literals: Vec<String>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            trim: true,
            true_literals: ["true", "yes", "on", "1"].map(String::from).to_vec(),
            false_literals: ["false", "no", "off", "0"].map(String::from).to_vec(),
        }
    }
}

fn input(value: &Value, trim: bool) -> Option<&str> {
    let s = value.as_str()?;
    Some(if trim { s.trim() } else { s })
}

/// Every built-in leaf converter configured with `options`.
pub fn standard(options: &ParseOptions) -> Vec<Arc<dyn Converter>> {
    vec![
        Arc::new(ParseInteger::new(options.trim)),
        Arc::new(ParseLong::new(options.trim)),
        Arc::new(ParseDouble::new(options.trim)),
        Arc::new(ParseBoolean::new(options.clone())),
        Arc::new(NumberToInteger),
        Arc::new(NumberToLong),
        Arc::new(NumberToDouble),
        Arc::new(ToText),
    ]
}

// ---------------------------------------------------------------------------
// String parsing
// ---------------------------------------------------------------------------

macro_rules! parse_converter {
    ($name:ident, $target:expr, $ty:ty, $variant:path) => {
        #[derive(Debug)]
        pub struct $name {
            trim: bool,
        }

        impl $name {
            pub fn new(trim: bool) -> Self {
                Self { trim }
            }
        }

        impl Converter for $name {
            fn source_type(&self) -> ClassId {
                ClassId::STRING
            }

            fn target_type(&self) -> ClassId {
                $target
            }

            fn name(&self) -> &str {
                stringify!($name)
            }

            fn convert(
                &self,
                value: &Value,
                _target: &TypeDescriptor,
                _ctx: &ConversionContext,
                _dispatcher: &dyn Dispatcher,
            ) -> ConvertResult {
                let Some(text) = input(value, self.trim) else {
                    return Ok(None);
                };
                let parsed = text.parse::<$ty>().map_err(ConversionError::failed)?;
                Ok(Some($variant(parsed)))
            }
        }
    };
}

parse_converter!(ParseInteger, ClassId::INTEGER, i32, Value::Int);
parse_converter!(ParseLong, ClassId::LONG, i64, Value::Long);
parse_converter!(ParseDouble, ClassId::DOUBLE, f64, Value::Double);

/// String to `Boolean` using the configured literals.
#[derive(Debug)]
pub struct ParseBoolean {
    options: ParseOptions,
}

impl ParseBoolean {
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }
}

impl Converter for ParseBoolean {
    fn source_type(&self) -> ClassId {
        ClassId::STRING
    }

    fn target_type(&self) -> ClassId {
        ClassId::BOOLEAN
    }

    fn name(&self) -> &str {
        "ParseBoolean"
    }

    fn convert(
        &self,
        value: &Value,
        _target: &TypeDescriptor,
        _ctx: &ConversionContext,
        _dispatcher: &dyn Dispatcher,
    ) -> ConvertResult {
        let Some(text) = input(value, self.options.trim) else {
            return Ok(None);
        };
        let is = |literals: &[String]| literals.iter().any(|l| l.eq_ignore_ascii_case(text));
        if is(&self.options.true_literals) {
            Ok(Some(Value::Bool(true)))
        } else if is(&self.options.false_literals) {
            Ok(Some(Value::Bool(false)))
        } else {
            Err(ConversionError::failed(format!(
                "{text:?} is not a boolean literal"
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

/// Doubles with a fractional part or outside `i64` are rejected.
fn integral(v: f64) -> Result<i64, ConversionError> {
    // 2^63 is exactly representable; anything at or above it overflows.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if v.fract() != 0.0 || !v.is_finite() || v >= LIMIT || v < -LIMIT {
        return Err(ConversionError::failed(format!("{v} is not an integral value")));
    }
    Ok(v as i64)
}

/// Any `Number` to `Integer`, range-checked.
#[derive(Debug, Default)]
pub struct NumberToInteger;

impl Converter for NumberToInteger {
    fn source_type(&self) -> ClassId {
        ClassId::NUMBER
    }

    fn target_type(&self) -> ClassId {
        ClassId::INTEGER
    }

    fn name(&self) -> &str {
        "NumberToInteger"
    }

    fn convert(
        &self,
        value: &Value,
        _target: &TypeDescriptor,
        _ctx: &ConversionContext,
        _dispatcher: &dyn Dispatcher,
    ) -> ConvertResult {
        let wide = match value {
            Value::Int(v) => return Ok(Some(Value::Int(*v))),
            Value::Long(v) => *v,
            Value::Double(v) => integral(*v)?,
            _ => return Ok(None),
        };
        let narrow = i32::try_from(wide)
            .map_err(|_| ConversionError::failed(format!("{wide} is out of range for Integer")))?;
        Ok(Some(Value::Int(narrow)))
    }
}

/// Any `Number` to `Long`; doubles must be integral.
#[derive(Debug, Default)]
pub struct NumberToLong;

impl Converter for NumberToLong {
    fn source_type(&self) -> ClassId {
        ClassId::NUMBER
    }

    fn target_type(&self) -> ClassId {
        ClassId::LONG
    }

    fn name(&self) -> &str {
        "NumberToLong"
    }

    fn convert(
        &self,
        value: &Value,
        _target: &TypeDescriptor,
        _ctx: &ConversionContext,
        _dispatcher: &dyn Dispatcher,
    ) -> ConvertResult {
        Ok(match value {
            Value::Int(v) => Some(Value::Long(i64::from(*v))),
            Value::Long(v) => Some(Value::Long(*v)),
            Value::Double(v) => Some(Value::Long(integral(*v)?)),
            _ => None,
        })
    }
}

#[derive(Debug, Default)]
pub struct NumberToDouble;

impl Converter for NumberToDouble {
    fn source_type(&self) -> ClassId {
        ClassId::NUMBER
    }

    fn target_type(&self) -> ClassId {
        ClassId::DOUBLE
    }

    fn name(&self) -> &str {
        "NumberToDouble"
    }

    fn convert(
        &self,
        value: &Value,
        _target: &TypeDescriptor,
        _ctx: &ConversionContext,
        _dispatcher: &dyn Dispatcher,
    ) -> ConvertResult {
        Ok(match value {
            Value::Int(v) => Some(Value::Double(f64::from(*v))),
            // Longs beyond 2^53 round to the nearest double.
            Value::Long(v) => Some(Value::Double(*v as f64)),
            Value::Double(v) => Some(Value::Double(*v)),
            _ => None,
        })
    }
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

/// Scalars to `String`. Containers, pairs and objects decline.
#[derive(Debug, Default)]
pub struct ToText;

impl Converter for ToText {
    fn source_type(&self) -> ClassId {
        ClassId::ANY
    }

    fn target_type(&self) -> ClassId {
        ClassId::STRING
    }

    fn name(&self) -> &str {
        "ToText"
    }

    fn convert(
        &self,
        value: &Value,
        _target: &TypeDescriptor,
        _ctx: &ConversionContext,
        _dispatcher: &dyn Dispatcher,
    ) -> ConvertResult {
        let text = match value {
            Value::Bool(v) => v.to_string(),
            Value::Int(v) => v.to_string(),
            Value::Long(v) => v.to_string(),
            Value::Double(v) => v.to_string(),
            Value::Str(s) => return Ok(Some(Value::Str(Arc::clone(s)))),
            _ => return Ok(None),
        };
        Ok(Some(Value::str(text)))
    }
}
