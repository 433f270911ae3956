use std::sync::Arc;

use typecast_api::{
    ClassTable, ClassTableBuilder, ContainerShape, ConversionContext, Converter, TypeDescriptor,
    Value,
};

use crate::builtin;
use crate::config::EngineConfig;
use crate::container;
use crate::error::EngineError;
use crate::registry::Registry;

/// A frozen registry together with the configuration it was built from.
pub struct Engine {
    registry: Arc<Registry>,
    config: EngineConfig,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}

impl Engine {
    /// Bootstrap the engine from a parsed configuration.
    ///
    /// Standard class table, built-in leaf converters and container adapters.
    pub fn bootstrap(config: EngineConfig) -> Result<Self, EngineError> {
        Self::bootstrap_with(config, ClassTable::builder(), Vec::new())
    }

    /// Bootstrap with user-defined classes and extra converters.
    ///
    /// `extra` is registered after the built-ins, so it replaces any
    /// built-in converter for the same source and target.
    pub fn bootstrap_with(
        config: EngineConfig,
        mut classes: ClassTableBuilder,
        extra: Vec<Arc<dyn Converter>>,
    ) -> Result<Self, EngineError> {
        // --- 1. Class table ---
        let defaults = [
            (ContainerShape::Sequence, &config.containers.sequence_default),
            (ContainerShape::Mapping, &config.containers.mapping_default),
        ];
        for (shape, name) in defaults {
            let ctx = format!("containers.{shape}_default");
            let class = classes.resolve(name).ok_or_else(|| {
                EngineError::Config(format!("unknown class '{name}'")).with_context(&ctx)
            })?;
            classes
                .set_default(shape, class)
                .map_err(|e| EngineError::Config(e.to_string()).with_context(&ctx))?;
        }
        let classes = classes.build();

        // --- 2. Converters ---
        let mut builder = Registry::builder(classes);
        builder
            .extend(builtin::standard(&config.parsing.options()))
            .extend(container::adapters(config.containers.entry_separator))
            .extend(extra);

        tracing::info!(
            separator = %config.containers.entry_separator,
            sequence_default = %config.containers.sequence_default,
            mapping_default = %config.containers.mapping_default,
            "bootstrapped conversion engine"
        );

        Ok(Engine {
            registry: Arc::new(builder.freeze()),
            config,
        })
    }

    /// Shared handle to the frozen registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn into_registry(self) -> Arc<Registry> {
        self.registry
    }

    /// Parse `type_expr` against the engine's class table and convert `value`.
    pub fn convert_expr(
        &self,
        value: Option<Value>,
        type_expr: &str,
        ctx: &ConversionContext,
    ) -> Result<Option<Value>, EngineError> {
        let target = TypeDescriptor::parse(type_expr, self.registry.classes())?;
        Ok(self.registry.convert(value, &target, ctx)?)
    }
}
