//! # Sparkify - song play ETL
//!
//! Loads two kinds of JSON files into a five-table star schema:
//!
//! - **song files**: one JSON object per file, describing a song and its artist
//!   (`songs` and `artists` tables)
//! - **log files**: one JSON event per line, of which only `NextSong` play
//!   events are kept (`time`, `users` and `songplays` tables)
//!
//! Log events carry no song or artist id, so every play is joined back to the
//! already loaded songs by title, artist name and duration.
//!
//! ## Modules
//!
//! - **discovery**: find `*.json` files under a directory
//! - **transform**: reshape raw records into rows
//! - **lookup**: resolve a play event to its (song_id, artist_id)
//! - **driver**: per-file transform, insert and commit loop
//! - **sink**: the persistence interface with SQLite and PostgreSQL implementations
//! - **catalog**: every SQL statement the job runs
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sparkify::{run_etl, EtlConfig, Sink, SqliteSink, StatementCatalog};
//!
//! # fn main() -> sparkify::Result<()> {
//! let config = EtlConfig::default();
//! let catalog = StatementCatalog::sqlite();
//! let mut sink = SqliteSink::open(&config.database)?;
//! sink.create_tables(&catalog)?;
//!
//! let summary = run_etl(&mut sink, &catalog, &config)?;
//! println!("{} log files loaded", summary.logs.files_processed);
//! # Ok(())
//! # }
//! ```
//!
//! Setting `database_url` loads into PostgreSQL instead:
//!
//! ```rust,no_run
//! use sparkify::{open_sink, run_etl, EtlConfig};
//!
//! # fn main() -> sparkify::Result<()> {
//! let config = EtlConfig {
//!     database_url: Some("host=127.0.0.1 dbname=sparkifydb user=student".to_string()),
//!     ..Default::default()
//! };
//! let target = config.target();
//! let catalog = target.catalog();
//! let mut sink = open_sink(&target)?;
//! sink.create_tables(&catalog)?;
//! run_etl(sink.as_mut(), &catalog, &config)?;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod discovery;
pub mod driver;
pub mod error;
pub mod lookup;
pub mod sink;
pub mod transform;
pub mod types;

// Re-export commonly used types for convenience
pub use catalog::{Dialect, StatementCatalog};
pub use config::{CliConfig, EtlConfig, FileConfig, SinkTarget};
pub use driver::{BatchDriver, BatchReport, FailurePolicy};
pub use error::{EtlError, Result};
pub use lookup::{DurationTolerance, LookupResolver};
pub use sink::{open_sink, PostgresSink, Sink, SqliteSink};
pub use transform::{EventTransformer, FileTransform, SongTransformer};
pub use types::{Level, Row, SqlValue, Table};

/// Reports for both passes of a run
#[derive(Debug)]
pub struct EtlSummary {
    pub songs: BatchReport,
    pub logs: BatchReport,
}

/// Main entry point: load every song file, then every log file.
///
/// Songs go first so play events can be resolved against them.
pub fn run_etl(
    sink: &mut dyn Sink,
    catalog: &StatementCatalog,
    config: &EtlConfig,
) -> Result<EtlSummary> {
    let mut driver = BatchDriver::new(sink, catalog).with_policy(config.failure_policy);

    let songs = driver.process_data(&config.song_data, &SongTransformer)?;
    let logs = driver.process_data(
        &config.log_data,
        &EventTransformer::new(config.duration_tolerance),
    )?;

    Ok(EtlSummary { songs, logs })
}
