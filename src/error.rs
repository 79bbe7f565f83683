//! Typed failures surfaced by the library.
//!
//! Bad *data* never produces one of these: rows that break a rule are routed
//! to the invalid partition as [`crate::violation::Violation`] values. Only a
//! table with the wrong *shape*, or a rule set that cannot be compiled, is an
//! error.

use thiserror::Error;

/// The input table cannot be validated at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

/// The rule set or pipeline configuration is unusable.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid pattern for field '{field}': {source}")]
    Pattern {
        field: String,
        #[source]
        source: regex::Error,
    },

    #[error("Field '{field}' has inverted bounds ({lower} > {upper})")]
    InvertedBounds {
        field: String,
        lower: String,
        upper: String,
    },

    #[error("Field '{0}' is declared more than once")]
    DuplicateField(String),

    #[error("Code field '{0}' has an empty allowed set")]
    EmptyAllowedSet(String),

    #[error("Invalid configuration document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Either failure mode of a one-shot validation call that also compiles its
/// rules.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
