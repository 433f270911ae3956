use std::collections::HashMap;
use std::sync::Arc;

use typecast_api::{
    ClassId, ClassTable, ConversionContext, ConversionError, ConvertResult, Converter, Dispatcher,
    TypeDescriptor, Value,
};

use crate::builtin::{self, ParseOptions};
use crate::container::{self, DEFAULT_ENTRY_SEPARATOR};
use crate::group::{Attempts, TargetGroup};

/// Build phase of a [`Registry`].
///
/// Registration is single-threaded and only possible here; [`freeze`]
/// turns the builder into the immutable, shareable dispatcher.
///
/// [`freeze`]: RegistryBuilder::freeze
pub struct RegistryBuilder {
    classes: ClassTable,
    groups: HashMap<ClassId, TargetGroup>,
}

impl std::fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("groups", &self.groups.len())
            .finish()
    }
}

impl RegistryBuilder {
    pub fn new(classes: ClassTable) -> Self {
        Self {
            classes,
            groups: HashMap::new(),
        }
    }

    pub fn classes(&self) -> &ClassTable {
        &self.classes
    }

    /// Insert `converter` under `(target_type, source_type)`.
    ///
    /// Returns the converter previously registered for that exact pair.
    pub fn register(&mut self, converter: Arc<dyn Converter>) -> Option<Arc<dyn Converter>> {
        let target = converter.target_type();
        let source = converter.source_type();
        let previous = self
            .groups
            .entry(target)
            .or_insert_with(|| TargetGroup::new(target))
            .insert(converter);
        if let Some(prev) = &previous {
            tracing::warn!(
                target_type = %target,
                %source,
                replaced = prev.name(),
                "converter registration replaced an existing converter"
            );
        }
        previous
    }

    /// Register every converter in order; later entries replace earlier ones.
    pub fn extend<I>(&mut self, converters: I) -> &mut Self
    where
        I: IntoIterator<Item = Arc<dyn Converter>>,
    {
        for converter in converters {
            self.register(converter);
        }
        self
    }

    /// End the build phase.
    pub fn freeze(self) -> Registry {
        let converters: usize = self.groups.values().map(TargetGroup::len).sum();
        tracing::info!(
            groups = self.groups.len(),
            converters,
            classes = self.classes.len(),
            "converter registry frozen"
        );
        Registry {
            classes: self.classes,
            groups: self.groups,
        }
    }
}

/// Frozen converter registry and dispatcher.
///
/// Immutable after [`RegistryBuilder::freeze`], so a single instance can be
/// shared across threads (`Arc<Registry>`) without locking.
pub struct Registry {
    classes: ClassTable,
    groups: HashMap<ClassId, TargetGroup>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("groups", &self.groups.len())
            .field("converters", &self.len())
            .finish()
    }
}

impl Registry {
    pub fn builder(classes: ClassTable) -> RegistryBuilder {
        RegistryBuilder::new(classes)
    }

    /// Standard class table, built-in leaf converters and container adapters
    /// with default options.
    pub fn standard() -> Self {
        let mut builder = RegistryBuilder::new(ClassTable::standard());
        builder
            .extend(builtin::standard(&ParseOptions::default()))
            .extend(container::adapters(DEFAULT_ENTRY_SEPARATOR));
        builder.freeze()
    }

    pub fn classes(&self) -> &ClassTable {
        &self.classes
    }

    /// Group registered for exactly this target class.
    pub fn group(&self, target: ClassId) -> Option<&TargetGroup> {
        self.groups.get(&target)
    }

    /// Total number of registered converters.
    pub fn len(&self) -> usize {
        self.groups.values().map(TargetGroup::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.values().all(TargetGroup::is_empty)
    }

    /// Converter a dispatch from `source` to `target` would try first.
    pub fn lookup(&self, source: ClassId, target: ClassId) -> Option<&Arc<dyn Converter>> {
        self.candidate_groups(target)
            .find_map(|group| group.find(&self.classes, source))
    }

    /// Convert `value` to `target`.
    ///
    /// 1. Absent (or `Null`) input yields `Ok(None)`.
    /// 2. A value that already is an instance of `target` is returned as-is.
    /// 3. Otherwise the target hierarchy is walked nearest first; each
    ///    compatible group walks the value's own hierarchy (see
    ///    [`TargetGroup`]) and the first produced value wins.
    /// 4. If nothing applies the result is `Ok(None)`.
    pub fn convert(
        &self,
        value: Option<Value>,
        target: &TypeDescriptor,
        ctx: &ConversionContext,
    ) -> ConvertResult {
        let Some(value) = value.filter(|v| !v.is_null()) else {
            return Ok(None);
        };
        if let Err(source) = target.validate(&self.classes) {
            return Err(ConversionError::InvalidTarget {
                value,
                target: target.clone(),
                value_source: ctx.source_tag(),
                source,
            });
        }
        if self.classes.is_instance(&value, target) {
            return Ok(Some(value));
        }

        let mut attempts = Attempts::default();
        for group in self.candidate_groups(target.raw_class()) {
            if let Some(out) = group.dispatch(&value, target, ctx, self, &mut attempts)? {
                return Ok(Some(out));
            }
        }

        tracing::debug!(
            %value,
            target_type = %target,
            value_source = ctx.value_source(),
            "no converter applies"
        );
        Ok(None)
    }

    /// Groups along the target walk whose nominal target accepts `requested`.
    fn candidate_groups(&self, requested: ClassId) -> impl Iterator<Item = &TargetGroup> + '_ {
        self.classes
            .ancestors(requested)
            .filter_map(move |class| self.groups.get(&class))
            // Always true for classes on `requested`'s own walk.
            .filter(move |group| self.classes.is_assignable(group.target(), requested))
    }
}

impl Dispatcher for Registry {
    fn classes(&self) -> &ClassTable {
        &self.classes
    }

    fn convert(
        &self,
        value: Option<Value>,
        target: &TypeDescriptor,
        ctx: &ConversionContext,
    ) -> ConvertResult {
        Registry::convert(self, value, target, ctx)
    }
}
