//! Error taxonomy shared by the stop export pipeline.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Fatal conditions that abort a run. Data quality gaps (stops missing from
/// the timetable, stops without coordinates) are counted, never raised.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A required environment variable is missing or empty.
    #[error("missing required configuration {var}")]
    Config { var: &'static str },
    /// An expected column is absent from a header row.
    #[error("required column {column:?} not found in {source_name}")]
    Schema { source_name: String, column: String },
    /// An archive lacks a file the input schema requires.
    #[error("required file {entry:?} not found in archive")]
    MissingEntry { entry: String },
    /// A row has too few fields for the column being read.
    #[error("malformed record at line {line} of {source_name}: expected at least {expected} fields, found {found}")]
    Record {
        source_name: String,
        line: u64,
        expected: usize,
        found: usize,
    },
    /// A network exchange with an external collaborator failed.
    #[error("transport failure for {url}: {message}")]
    Transport { url: String, message: String },
    /// The external tile builder could not be run or exited unsuccessfully.
    #[error("tile build failed: {0}")]
    TileBuild(String),
    /// A blocking stage panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("i/o error on {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
    /// A credential could not be encoded as an HTTP header value.
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn transport(url: impl Into<String>, message: impl ToString) -> Self {
        Error::Transport {
            url: url.into(),
            message: message.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let url = err
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        Error::transport(url, err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
