//! Hierarchy-aware conversion dispatcher.
//!
//! Build a [`RegistryBuilder`], register converters, [`freeze`] it, and
//! share the resulting [`Registry`] across threads. [`Engine`] does the
//! same from an [`EngineConfig`].
//!
//! [`freeze`]: RegistryBuilder::freeze

pub mod bootstrap;
pub mod builtin;
pub mod config;
pub mod container;
pub mod error;
pub mod group;
pub mod registry;

pub use bootstrap::Engine;
pub use builtin::ParseOptions;
pub use config::{ContainerConfig, EngineConfig, ParsingConfig};
pub use container::{ArrayAdapter, DEFAULT_ENTRY_SEPARATOR, MappingAdapter, SequenceAdapter};
pub use error::EngineError;
pub use group::TargetGroup;
pub use registry::{Registry, RegistryBuilder};
