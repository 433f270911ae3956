use crate::class::{ClassId, ClassTable};
use crate::context::ConversionContext;
use crate::descriptor::TypeDescriptor;
use crate::error::ConversionError;
use crate::value::Value;

/// Outcome of one conversion attempt.
///
/// `Ok(None)` means "not found / declined": dispatch keeps walking towards a
/// more general converter. `Err` aborts the whole top-level conversion.
pub type ConvertResult = Result<Option<Value>, ConversionError>;

/// A narrow, single-purpose conversion capability.
///
/// Registered once under `(target_type, source_type)`. Implementations may
/// hold their own configuration but must not mutate shared state during
/// `convert`: a frozen registry calls them concurrently.
pub trait Converter: Send + Sync {
    /// Declared source class; dispatch offers values whose runtime class
    /// has this class among its ancestors.
    fn source_type(&self) -> ClassId;

    /// Declared target class; the converter must produce values assignable
    /// to the requested descriptor, which may be any subtype of this class.
    fn target_type(&self) -> ClassId;

    /// Name shown in diagnostics.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn convert(
        &self,
        value: &Value,
        target: &TypeDescriptor,
        ctx: &ConversionContext,
        dispatcher: &dyn Dispatcher,
    ) -> ConvertResult;
}

/// Entry point back into dispatch, used by container adapters to convert
/// elements, keys and mapped values.
pub trait Dispatcher: Send + Sync {
    fn classes(&self) -> &ClassTable;

    /// Convert `value` to `target`. Absent input yields absent output;
    /// `Ok(None)` also means no converter applied.
    fn convert(
        &self,
        value: Option<Value>,
        target: &TypeDescriptor,
        ctx: &ConversionContext,
    ) -> ConvertResult;
}
