use std::fmt;
use std::sync::Arc;

/// Diagnostic provenance threaded through recursive conversions.
///
/// The value source ("row 4 of import.csv", "config key `ports`") only ever
/// ends up in error messages; dispatch never branches on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionContext {
    value_source: Option<Arc<str>>,
}

impl ConversionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(value_source: impl Into<Arc<str>>) -> Self {
        Self {
            value_source: Some(value_source.into()),
        }
    }

    pub fn value_source(&self) -> Option<&str> {
        self.value_source.as_deref()
    }

    /// Shared handle for embedding in errors.
    pub fn source_tag(&self) -> Option<Arc<str>> {
        self.value_source.clone()
    }
}

impl fmt::Display for ConversionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value_source().unwrap_or("<unknown source>"))
    }
}
