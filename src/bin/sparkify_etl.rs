//! sparkify-etl: Load song and event-log JSON files into the star schema
//!
//! Usage:
//!   # Default layout: ./data/song_data, ./data/log_data, ./sparkify.db
//!   sparkify-etl
//!
//!   # Explicit directories and database
//!   sparkify-etl --song-data ./songs --log-data ./logs --database ./out.db
//!
//!   # Load into PostgreSQL instead of SQLite
//!   sparkify-etl --database-url "host=127.0.0.1 dbname=sparkifydb user=student"
//!
//!   # Settings from a TOML file (file values win over flags)
//!   sparkify-etl --config etl.toml
//!
//! Set LOG_LEVEL (e.g. `LOG_LEVEL=debug`) to change verbosity.

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use sparkify::{open_sink, run_etl, CliConfig, EtlConfig, FailurePolicy, FileConfig};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "sparkify-etl")]
#[command(about = "Load song metadata and event logs into the song play schema", long_about = None)]
struct Args {
    /// TOML config file; its values override the flags below
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Root directory of song-metadata files (default: data/song_data)
    #[arg(long, env = "SPARKIFY_SONG_DATA")]
    song_data: Option<PathBuf>,

    /// Root directory of event-log files (default: data/log_data)
    #[arg(long, env = "SPARKIFY_LOG_DATA")]
    log_data: Option<PathBuf>,

    /// SQLite database file (default: sparkify.db)
    #[arg(long, env = "SPARKIFY_DATABASE")]
    database: Option<PathBuf>,

    /// PostgreSQL connection string or URL; when set, --database is ignored
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Seconds a play's length may differ from a song's duration and still
    /// match (default: 0)
    #[arg(long)]
    duration_tolerance: Option<f64>,

    /// What to do when a file fails (default: abort)
    #[arg(long, value_enum)]
    failure_policy: Option<FailurePolicy>,
}

impl Args {
    fn cli_config(&self) -> CliConfig {
        CliConfig {
            song_data: self.song_data.clone(),
            log_data: self.log_data.clone(),
            database: self.database.clone(),
            database_url: self.database_url.clone(),
            duration_tolerance: self.duration_tolerance,
            failure_policy: self.failure_policy,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let config = EtlConfig::resolve(&args.cli_config(), file_config)?;

    let target = config.target();
    let catalog = target.catalog();
    let mut sink =
        open_sink(&target).with_context(|| format!("Failed to open database {target}"))?;

    let summary = run_etl(sink.as_mut(), &catalog, &config).context("ETL run aborted")?;

    info!(
        "Loaded {} song files and {} log files ({} rows)",
        summary.songs.files_processed,
        summary.logs.files_processed,
        summary.songs.rows_submitted + summary.logs.rows_submitted
    );
    for failed in summary.songs.failed.iter().chain(&summary.logs.failed) {
        warn!("Not loaded: {} ({})", failed.path.display(), failed.error);
    }

    Ok(())
}
