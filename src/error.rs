//! Error types for each updater component.
//!
//! None of these leave the crate's public entry point as a fault: the
//! orchestrator turns every one of them into a [`crate::status::Status`].

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// The remote manifest could not be fetched or understood.
///
/// Connection failures, timeouts, HTTP status errors and malformed bodies all
/// land here; callers only ever need to know the remote version is unknown.
#[derive(Error, Debug)]
#[error("could not verify remote version: {reason}")]
pub struct NetworkError {
    reason: String,
}

impl NetworkError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        Self::new(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server answered {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("no data received for {0:?}, giving up")]
    Stalled(std::time::Duration),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("hosted provider failed: {0}")]
    Provider(String),
    #[error("could not start download runtime: {0}")]
    Runtime(String),
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("archive {0} does not exist")]
    Missing(PathBuf),
    #[error("{path} is not a valid zip archive")]
    InvalidArchive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("archive rejected the password")]
    BadPassword,
    #[error("extraction failed: {0}")]
    Failed(#[from] zip::result::ZipError),
    #[error("extraction failed: {0}")]
    Io(#[from] io::Error),
}

impl ExtractError {
    /// Whether this is the password case the UI reports separately.
    pub fn is_bad_password(&self) -> bool {
        matches!(self, ExtractError::BadPassword)
    }
}

/// The bundle version marker could not be written.
#[derive(Error, Debug)]
#[error("could not write version marker {path}: {source}")]
pub struct PersistenceError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

#[derive(Error, Debug)]
pub enum ReplaceError {
    #[error("could not download the new launcher: {0}")]
    Download(#[from] DownloadError),
    #[error("could not prepare update workspace: {0}")]
    Workspace(#[source] io::Error),
    #[error("could not write helper script {path}: {source}")]
    Script {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not launch helper script: {0}")]
    Spawn(#[source] io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("required config value {0} is missing")]
    Missing(&'static str),
}

#[derive(Error, Debug)]
pub enum GameError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("game executable not found: {0}")]
    NotFound(PathBuf),
    #[error("could not start {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
