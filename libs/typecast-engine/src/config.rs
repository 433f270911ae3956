use serde::Deserialize;

use crate::builtin::ParseOptions;
use crate::container::DEFAULT_ENTRY_SEPARATOR;
use crate::error::EngineError;

/// Root configuration, parsed from TOML.
///
/// ```toml
/// [parsing]
/// trim = true
/// true_literals = ["true", "yes"]
///
/// [containers]
/// entry_separator = ":"
/// sequence_default = "LinkedList"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default)]
    pub parsing: ParsingConfig,

    #[serde(default)]
    pub containers: ContainerConfig,
}

/// Options of the built-in string parsers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParsingConfig {
    #[serde(default = "default_trim")]
    pub trim: bool,

    #[serde(default = "default_true_literals")]
    pub true_literals: Vec<String>,

    #[serde(default = "default_false_literals")]
    pub false_literals: Vec<String>,
}

fn default_trim() -> bool {
    ParseOptions::default().trim
}

fn default_true_literals() -> Vec<String> {
    ParseOptions::default().true_literals
}

fn default_false_literals() -> Vec<String> {
    ParseOptions::default().false_literals
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            trim: default_trim(),
            true_literals: default_true_literals(),
            false_literals: default_false_literals(),
        }
    }
}

impl ParsingConfig {
    pub fn options(&self) -> ParseOptions {
        ParseOptions {
            trim: self.trim,
            true_literals: self.true_literals.clone(),
            false_literals: self.false_literals.clone(),
        }
    }
}

/// Container adapter settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContainerConfig {
    /// Separator of string-encoded mapping entries (`key=value`).
    #[serde(default = "default_entry_separator")]
    pub entry_separator: char,

    /// Class allocated for sequence targets that name an interface.
    #[serde(default = "default_sequence")]
    pub sequence_default: String,

    #[serde(default = "default_mapping")]
    pub mapping_default: String,
}

fn default_entry_separator() -> char {
    DEFAULT_ENTRY_SEPARATOR
}

fn default_sequence() -> String {
    "ArrayList".into()
}

fn default_mapping() -> String {
    "LinkedHashMap".into()
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            entry_separator: default_entry_separator(),
            sequence_default: default_sequence(),
            mapping_default: default_mapping(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, EngineError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| EngineError::Config(format!("{path}: {e}")))?;
        Self::parse(&content).map_err(|e| e.with_context(path))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, EngineError> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), EngineError> {
        let sep = self.containers.entry_separator;
        if sep.is_whitespace() {
            return Err(EngineError::Config(format!(
                "containers.entry_separator must not be whitespace, got {sep:?}"
            )));
        }
        let overlap = self
            .parsing
            .true_literals
            .iter()
            .find(|t| {
                self.parsing
                    .false_literals
                    .iter()
                    .any(|f| f.eq_ignore_ascii_case(t))
            });
        if let Some(literal) = overlap {
            return Err(EngineError::Config(format!(
                "parsing literal {literal:?} is both true and false"
            )));
        }
        Ok(())
    }
}
