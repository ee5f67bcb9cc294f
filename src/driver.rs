use crate::catalog::StatementCatalog;
use crate::discovery::get_files;
use crate::error::{EtlError, Result};
use crate::sink::Sink;
use crate::transform::FileTransform;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// What the driver does when a file fails to transform or load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop the run at the failing file. Earlier files stay committed.
    #[default]
    Abort,
    /// Roll back the failing file, record it, and move on to the next one.
    SkipFile,
}

#[derive(Debug)]
pub struct FailedFile {
    pub path: PathBuf,
    pub error: EtlError,
}

/// Outcome of one directory pass
#[derive(Debug)]
pub struct BatchReport {
    pub root: PathBuf,
    pub files_found: usize,
    pub files_processed: usize,
    pub rows_submitted: usize,
    /// Only populated under [`FailurePolicy::SkipFile`]
    pub failed: Vec<FailedFile>,
}

impl BatchReport {
    fn new(root: &Path, files_found: usize) -> Self {
        BatchReport {
            root: root.to_path_buf(),
            files_found,
            files_processed: 0,
            rows_submitted: 0,
            failed: Vec::new(),
        }
    }
}

/// Drives discovery, transformation and loading for one directory at a time.
///
/// Each file is a commit unit: all of its rows are submitted, then the sink
/// commits, then progress is reported.
pub struct BatchDriver<'a> {
    sink: &'a mut dyn Sink,
    catalog: &'a StatementCatalog,
    policy: FailurePolicy,
}

impl<'a> BatchDriver<'a> {
    pub fn new(sink: &'a mut dyn Sink, catalog: &'a StatementCatalog) -> Self {
        BatchDriver {
            sink,
            catalog,
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn process_data(
        &mut self,
        root: &Path,
        transform: &dyn FileTransform,
    ) -> Result<BatchReport> {
        let files = get_files(root)?;
        let total = files.len();
        info!("{} files found in {}", total, root.display());

        let mut report = BatchReport::new(root, total);

        for path in files {
            match self.process_file(&path, transform) {
                Ok(rows) => {
                    report.files_processed += 1;
                    report.rows_submitted += rows;
                    info!("{}/{} files processed.", report.files_processed, total);
                }
                Err(err) => {
                    if let Err(rollback_err) = self.sink.rollback() {
                        warn!(
                            "Rollback after failure in {} failed: {}",
                            path.display(),
                            rollback_err
                        );
                    }

                    match self.policy {
                        FailurePolicy::Abort => {
                            error!(
                                "Aborting {} load at {} after {}/{} files: {}",
                                transform.name(),
                                path.display(),
                                report.files_processed,
                                total,
                                err
                            );
                            return Err(err);
                        }
                        FailurePolicy::SkipFile => {
                            warn!("Skipping {}: {}", path.display(), err);
                            report.failed.push(FailedFile { path, error: err });
                        }
                    }
                }
            }
        }

        if !report.failed.is_empty() {
            warn!(
                "{} of {} {} files failed in {}",
                report.failed.len(),
                total,
                transform.name(),
                root.display()
            );
        }

        Ok(report)
    }

    /// Transform one file, submit its rows in order, and commit
    fn process_file(&mut self, path: &Path, transform: &dyn FileTransform) -> Result<usize> {
        let rows = transform.transform(path, &mut *self.sink, self.catalog)?;

        for row in &rows {
            self.sink
                .execute(self.catalog.insert_for(row.table()), &row.params())?;
        }
        self.sink.commit()?;

        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::testing::{RecordingSink, SinkCall};
    use crate::transform::SongTransformer;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_song(dir: &Path, name: &str, song_id: &str) {
        let value = json!({
            "artist_id": format!("AR{song_id}"),
            "artist_latitude": null,
            "artist_longitude": null,
            "artist_location": "",
            "artist_name": "Casual",
            "song_id": song_id,
            "title": "I Didn't Mean To",
            "duration": 218.93179,
            "year": 0
        });
        std::fs::write(dir.join(name), value.to_string()).unwrap();
    }

    #[test]
    fn test_empty_directory_does_nothing() {
        let dir = TempDir::new().unwrap();
        let catalog = StatementCatalog::sqlite();
        let mut sink = RecordingSink::default();

        let report = BatchDriver::new(&mut sink, &catalog)
            .process_data(dir.path(), &SongTransformer)
            .unwrap();

        assert_eq!(report.files_found, 0);
        assert_eq!(report.files_processed, 0);
        assert!(sink.calls.is_empty());
    }

    #[test]
    fn test_commit_after_each_file() {
        let dir = TempDir::new().unwrap();
        write_song(dir.path(), "a.json", "SOA");
        write_song(dir.path(), "b.json", "SOB");
        let catalog = StatementCatalog::sqlite();
        let mut sink = RecordingSink::default();

        let report = BatchDriver::new(&mut sink, &catalog)
            .process_data(dir.path(), &SongTransformer)
            .unwrap();

        assert_eq!(report.files_processed, 2);
        assert_eq!(report.rows_submitted, 4);
        let shape: Vec<&str> = sink
            .calls
            .iter()
            .map(|c| match c {
                SinkCall::Execute { statement, .. } if *statement == catalog.song_insert => {
                    "song"
                }
                SinkCall::Execute { statement, .. } if *statement == catalog.artist_insert => {
                    "artist"
                }
                SinkCall::Commit => "commit",
                _ => "other",
            })
            .collect();
        assert_eq!(
            shape,
            vec!["song", "artist", "commit", "song", "artist", "commit"]
        );
    }

    #[test]
    fn test_abort_keeps_earlier_commits_and_stops() {
        let dir = TempDir::new().unwrap();
        write_song(dir.path(), "a.json", "SOA");
        std::fs::write(dir.path().join("b.json"), "not json").unwrap();
        write_song(dir.path(), "c.json", "SOC");
        let catalog = StatementCatalog::sqlite();
        let mut sink = RecordingSink::default();

        let err = BatchDriver::new(&mut sink, &catalog)
            .process_data(dir.path(), &SongTransformer)
            .unwrap_err();

        assert!(matches!(err, EtlError::Parse { .. }));
        assert_eq!(sink.commits(), 1);
        assert_eq!(sink.executed().len(), 2);
        assert_eq!(sink.calls.last(), Some(&SinkCall::Rollback));
    }

    #[test]
    fn test_sink_failure_rolls_back_file() {
        let dir = TempDir::new().unwrap();
        write_song(dir.path(), "a.json", "SOA");
        let catalog = StatementCatalog::sqlite();
        let mut sink = RecordingSink {
            fail_on_text: Some("ARSOA".to_string()),
            ..Default::default()
        };

        let err = BatchDriver::new(&mut sink, &catalog)
            .process_data(dir.path(), &SongTransformer)
            .unwrap_err();

        assert!(matches!(err, EtlError::SinkMessage(_)));
        assert_eq!(sink.commits(), 0);
        assert_eq!(sink.calls.last(), Some(&SinkCall::Rollback));
    }

    #[test]
    fn test_skip_file_policy_continues() {
        let dir = TempDir::new().unwrap();
        write_song(dir.path(), "a.json", "SOA");
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        write_song(dir.path(), "c.json", "SOC");
        let catalog = StatementCatalog::sqlite();
        let mut sink = RecordingSink::default();

        let report = BatchDriver::new(&mut sink, &catalog)
            .with_policy(FailurePolicy::SkipFile)
            .process_data(dir.path(), &SongTransformer)
            .unwrap();

        assert_eq!(report.files_found, 3);
        assert_eq!(report.files_processed, 2);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].path.ends_with("b.json"));
        assert_eq!(sink.commits(), 2);
    }
}
