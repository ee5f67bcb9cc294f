use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, EtlError>;

/// Where in the input a parse failure happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub path: PathBuf,
    /// 1-based line for JSON-lines files, `None` for single-object files
    pub line: Option<usize>,
}

impl SourceLocation {
    pub fn file(path: &Path) -> Self {
        SourceLocation {
            path: path.to_path_buf(),
            line: None,
        }
    }

    pub fn line(path: &Path, line: usize) -> Self {
        SourceLocation {
            path: path.to_path_buf(),
            line: Some(line),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}", self.path.display(), line),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

#[derive(Debug, Error)]
pub enum EtlError {
    /// Malformed JSON, or a record missing a required field
    #[error("failed to parse {location}: {source}")]
    Parse {
        location: SourceLocation,
        #[source]
        source: BoxError,
    },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk {}: {source}", .root.display())]
    Discovery {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("sink error: {0}")]
    Sink(#[from] rusqlite::Error),

    #[error("sink error: {0}")]
    Postgres(#[from] postgres::Error),

    #[error("sink error: {0}")]
    SinkMessage(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EtlError {
    pub fn parse(location: SourceLocation, source: impl Into<BoxError>) -> Self {
        EtlError::Parse {
            location,
            source: source.into(),
        }
    }

    pub fn io(path: &Path, source: std::io::Error) -> Self {
        EtlError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_mentions_line() {
        let err = EtlError::parse(
            SourceLocation::line(Path::new("/data/log.json"), 3),
            "missing field `ts`",
        );
        assert_eq!(
            err.to_string(),
            "failed to parse /data/log.json:3: missing field `ts`"
        );
    }
}
