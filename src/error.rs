// ⚠️ Error Types - Config, load and write failures
// Field-level failures live in validation.rs and never escape it

use std::path::PathBuf;
use thiserror::Error;

/// Rules document missing or malformed. Fatal to a validation run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read rules file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed rules document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid pattern for field `{field}`: {source}")]
    InvalidPattern {
        field: String,
        #[source]
        source: regex::Error,
    },
}

/// Failures of the write stage that reach the caller.
///
/// Unique-constraint violations and component link failures are not here:
/// both are folded into a [`WriteOutcome`](crate::db::WriteOutcome).
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("database connection error: {0}")]
    Connection(#[source] rusqlite::Error),

    #[error("failed to write regulations for entity `{entity}`: {source}")]
    Persistence {
        entity: String,
        #[source]
        source: rusqlite::Error,
    },
}

/// Component link insert failure. Logged and reported, never rolled back into
/// the regulation transaction.
#[derive(Debug, Error)]
#[error("component link insert failed: {0}")]
pub struct LinkError(#[from] pub rusqlite::Error);

/// Reading or writing a record batch file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON batch: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid CSV batch: {0}")]
    Csv(#[from] csv::Error),
}
