//! Vocabulary shared by converter implementations and the dispatch engine:
//! the runtime class hierarchy, type descriptors, dynamic values, and the
//! converter contract.

pub mod class;
pub mod context;
pub mod converter;
pub mod descriptor;
pub mod error;
pub mod value;

pub use class::{Ancestors, ClassId, ClassKind, ClassTable, ClassTableBuilder, ContainerShape};
pub use context::ConversionContext;
pub use converter::{ConvertResult, Converter, Dispatcher};
pub use descriptor::TypeDescriptor;
pub use error::{BoxError, ClassTableError, ConversionError, TypeParseError};
pub use value::{Object, Value};
