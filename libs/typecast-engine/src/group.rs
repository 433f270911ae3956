use std::collections::HashMap;
use std::sync::Arc;

use typecast_api::{
    ClassId, ClassTable, ConversionContext, ConversionError, ConvertResult, Converter, Dispatcher,
    TypeDescriptor, Value,
};

/// All converters registered for one exact target class, keyed by source class.
pub struct TargetGroup {
    target: ClassId,
    by_source: HashMap<ClassId, Arc<dyn Converter>>,
}

impl std::fmt::Debug for TargetGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut sources: Vec<_> = self.by_source.keys().map(|c| c.name()).collect();
        sources.sort_unstable();
        f.debug_struct("TargetGroup")
            .field("target", &self.target)
            .field("sources", &sources)
            .finish()
    }
}

impl TargetGroup {
    pub(crate) fn new(target: ClassId) -> Self {
        Self {
            target,
            by_source: HashMap::new(),
        }
    }

    /// Nominal target class of every converter in the group.
    pub fn target(&self) -> ClassId {
        self.target
    }

    pub fn len(&self) -> usize {
        self.by_source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_source.is_empty()
    }

    /// Converter registered under exactly this source class.
    pub fn get(&self, source: ClassId) -> Option<&Arc<dyn Converter>> {
        self.by_source.get(&source)
    }

    pub fn sources(&self) -> impl Iterator<Item = ClassId> + '_ {
        self.by_source.keys().copied()
    }

    /// Insert or replace; returns the converter previously registered for the source.
    pub(crate) fn insert(&mut self, converter: Arc<dyn Converter>) -> Option<Arc<dyn Converter>> {
        self.by_source.insert(converter.source_type(), converter)
    }

    /// First converter the source-side walk would reach for values of `source`.
    pub(crate) fn find(&self, classes: &ClassTable, source: ClassId) -> Option<&Arc<dyn Converter>> {
        classes
            .ancestors(source)
            .find_map(|class| self.by_source.get(&class))
    }

    /// Source-side walk: offer `value` to each converter registered under
    /// one of its ancestors, nearest first, until one produces a value.
    pub(crate) fn dispatch(
        &self,
        value: &Value,
        target: &TypeDescriptor,
        ctx: &ConversionContext,
        dispatcher: &dyn Dispatcher,
        attempts: &mut Attempts,
    ) -> ConvertResult {
        for class in dispatcher.classes().ancestors(value.class()) {
            let Some(converter) = self.by_source.get(&class) else {
                continue;
            };
            if !attempts.first_time(converter) {
                tracing::trace!(
                    converter = converter.name(),
                    source = %class,
                    "converter already tried, skipping"
                );
                continue;
            }

            tracing::trace!(
                converter = converter.name(),
                source = %class,
                target_type = %target,
                "trying converter"
            );
            match converter.convert(value, target, ctx, dispatcher) {
                Ok(Some(out)) => return Ok(Some(out)),
                Ok(None) => continue,
                Err(e) => return Err(at_boundary(e, converter.as_ref(), value, target, ctx)),
            }
        }
        Ok(None)
    }
}

/// Converter instances already invoked during one top-level conversion.
///
/// Keeps every instance, not just the last one, so no diamond in either
/// hierarchy can invoke a converter twice.
#[derive(Debug, Default)]
pub(crate) struct Attempts {
    seen: Vec<usize>,
}

impl Attempts {
    fn first_time(&mut self, converter: &Arc<dyn Converter>) -> bool {
        let addr = Arc::as_ptr(converter).cast::<()>() as usize;
        if self.seen.contains(&addr) {
            false
        } else {
            self.seen.push(addr);
            true
        }
    }
}

/// Raw converter failures get the converter name, value, target and value
/// source attached; structured failures already carry them.
fn at_boundary(
    err: ConversionError,
    converter: &dyn Converter,
    value: &Value,
    target: &TypeDescriptor,
    ctx: &ConversionContext,
) -> ConversionError {
    match err {
        ConversionError::Failed(source) => ConversionError::Delegate {
            converter: converter.name().to_string(),
            value: value.clone(),
            target: target.clone(),
            value_source: ctx.source_tag(),
            source,
        },
        structured => structured,
    }
}
