use typecast_api::{ClassTableError, ConversionError, TypeParseError};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(String),

    #[error("class table error: {0}")]
    Classes(#[from] ClassTableError),

    #[error("type error: {0}")]
    Type(#[from] TypeParseError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Add context to the error.
    ///
    /// `Config` messages get the context prepended; structured variants
    /// are returned unchanged.
    pub fn with_context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            EngineError::Config(msg) => EngineError::Config(format!("{ctx}: {msg}")),
            other => other,
        }
    }
}
