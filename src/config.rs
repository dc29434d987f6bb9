// ⚙️ Configuration - Settings from flags or environment
// Everything the core needs is passed in explicitly; nothing is process-global

use crate::db::{GatewayConfig, DEFAULT_COMPONENT_ID};
use crate::pipeline::{PipelineConfig, DEFAULT_ENTITY};
use clap::Args;
use std::path::PathBuf;

#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// SQLite database file
    #[arg(long, env = "INGEST_DATABASE", default_value = "regulations.db", global = true)]
    pub database: PathBuf,

    /// Validation rules YAML
    #[arg(
        long,
        env = "VALIDATION_RULES_PATH",
        default_value = "configs/validation_rules.yaml",
        global = true
    )]
    pub rules: PathBuf,

    /// Entity whose records are written
    #[arg(long, env = "INGEST_ENTITY", default_value = DEFAULT_ENTITY, global = true)]
    pub entity: String,

    /// Component id linked to every new regulation
    #[arg(long, env = "INGEST_COMPONENT_ID", default_value_t = DEFAULT_COMPONENT_ID, global = true)]
    pub component_id: i64,
}

impl Settings {
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            entity: self.entity.clone(),
            gateway: GatewayConfig {
                component_id: self.component_id,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Debug, Parser)]
    struct TestCli {
        #[command(flatten)]
        settings: Settings,
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = TestCli::try_parse_from([
            "test",
            "--database",
            "/tmp/x.db",
            "--entity",
            "Ministerio de Transporte",
            "--component-id",
            "9",
        ])
        .unwrap();

        let pipeline = cli.settings.pipeline();
        assert_eq!(cli.settings.database, PathBuf::from("/tmp/x.db"));
        assert_eq!(pipeline.entity, "Ministerio de Transporte");
        assert_eq!(pipeline.gateway.component_id, 9);
    }

    #[test]
    fn test_rejects_non_numeric_component_id() {
        let result = TestCli::try_parse_from(["test", "--component-id", "seven"]);
        assert!(result.is_err());
    }
}
