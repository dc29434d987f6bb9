// Regulation Ingest - Core Library
// Validation engine + deduplicating write pipeline, shared by the CLI and tests

pub mod config;
pub mod db;
pub mod deduplication;
pub mod error;
pub mod pipeline;
pub mod record;
pub mod rules;
pub mod validation;

// Re-export commonly used types
pub use config::Settings;
pub use db::{
    bulk_insert, fetch_existing, insert_component_links, is_unique_violation, setup_database,
    Gateway, GatewayConfig, WriteOutcome, DEFAULT_COMPONENT_ID,
};
pub use deduplication::{
    Classification, DeduplicationEngine, IdentityKey, Resolution, StoredSummary,
};
pub use error::{ConfigError, LinkError, LoadError, WriteError};
pub use pipeline::{entities_in, run_writing, write_entities, PipelineConfig, DEFAULT_ENTITY};
pub use record::{load_records, records_from_json, write_records, Record, Value, NAMED_FIELDS};
pub use rules::{FieldType, Rule, RuleSet};
pub use validation::{
    check_field, coerce, run_validation, FieldFailure, Validation, ValidationReport, Validator,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
