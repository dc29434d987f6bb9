use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use regulation_ingest::{
    load_records, run_validation, run_writing, write_records, Gateway, Settings,
};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "regulation-ingest", version, about = "Validate and store scraped regulations")]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the regulation tables (built-in schema, or a DDL file)
    Init {
        #[arg(long)]
        ddl: Option<PathBuf>,
    },

    /// Validate a raw batch (JSON or CSV) and write the survivors as JSON
    Validate {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },

    /// Write a validated JSON batch to the database
    Write {
        #[arg(long)]
        input: PathBuf,
    },

    /// Validate and write in one go
    Run {
        #[arg(long)]
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .try_init();

    let cli = Cli::parse();
    let settings = cli.settings;

    match cli.command {
        Command::Init { ddl } => {
            let gateway = Gateway::open(&settings.database, settings.pipeline().gateway)?;
            match ddl {
                Some(path) => {
                    let script = fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read DDL file: {:?}", path))?;
                    gateway.execute_ddl(&script).context("Failed to execute DDL")?;
                }
                None => gateway.setup_schema().context("Failed to create schema")?,
            }
            gateway.close()?;
            info!(database = %settings.database.display(), "tables created / verified");
        }

        Command::Validate { input, output } => {
            let records = load_records(&input)?;
            let report = run_validation(&records, &settings.rules)?;
            write_records(&output, &report.records)?;
            println!("{}", report.summary());
        }

        Command::Write { input } => {
            let records = load_records(&input)?;
            let (inserted, message) = run_writing(&settings.database, &records, &settings.pipeline())?;
            println!("{}", message);
            info!(inserted, "write stage finished");
        }

        Command::Run { input } => {
            let records = load_records(&input)?;
            let report = run_validation(&records, &settings.rules)?;
            println!("{}", report.summary());

            let (inserted, message) =
                run_writing(&settings.database, &report.records, &settings.pipeline())?;
            println!("{}", message);
            info!(inserted, "pipeline finished");
        }
    }

    Ok(())
}
