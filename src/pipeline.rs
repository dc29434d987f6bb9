// 🚚 Write Stage - Entry points the orchestrator calls
// Validated records → one deduplicating transactional write per entity

use crate::db::{Gateway, GatewayConfig, WriteOutcome};
use crate::error::WriteError;
use crate::record::Record;
use std::path::Path;
use tracing::{error, info, warn};

/// Entity the reference pipeline scrapes
pub const DEFAULT_ENTITY: &str = "Agencia Nacional de Infraestructura";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Scopes both the existing-record lookup and the insert
    pub entity: String,
    pub gateway: GatewayConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            entity: DEFAULT_ENTITY.to_string(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Write validated records for the configured entity.
///
/// Returns `(inserted_count, message)`. Only connection failures and
/// non-constraint persistence failures are errors. The connection is closed on
/// every path once opened.
pub fn run_writing(
    database: &Path,
    records: &[Record],
    config: &PipelineConfig,
) -> Result<(usize, String), WriteError> {
    if records.is_empty() {
        warn!("no records to write");
        return Ok((0, "No records to write".to_string()));
    }
    info!(count = records.len(), "records to write");

    let mut gateway = Gateway::open(database, config.gateway.clone())?;
    let result = gateway.write_batch(&config.entity, records);
    if let Err(err) = gateway.close() {
        warn!(error = %err, "failed to close database connection");
    }

    let outcome = result?;
    info!(entity = %outcome.entity, inserted = outcome.inserted, "write finished");
    Ok(outcome.into_parts())
}

/// Write each entity's slice of `records` independently.
///
/// A persistence failure for one entity is reported in its slot and the
/// remaining entities still run.
pub fn write_entities(
    gateway: &mut Gateway,
    entities: &[String],
    records: &[Record],
) -> Vec<(String, Result<WriteOutcome, WriteError>)> {
    entities
        .iter()
        .map(|entity| {
            let result = gateway.write_batch(entity, records);
            if let Err(err) = &result {
                error!(entity = %entity, error = %err, "entity batch failed");
            }
            (entity.clone(), result)
        })
        .collect()
}

/// Distinct entity names in first-seen order (records with no entity skipped)
pub fn entities_in(records: &[Record]) -> Vec<String> {
    let mut entities: Vec<String> = Vec::new();
    for entity in records.iter().filter_map(|r| r.entity.as_str()) {
        if !entities.iter().any(|e| e == entity) {
            entities.push(entity.to_string());
        }
    }
    entities
}

// ============================================================================
// TESTS
// ============================================================================
