use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("Catalog '{catalog}' ({}) is malformed: {message}", path.display())]
    CatalogParse {
        catalog: String,
        path: PathBuf,
        message: String,
    },

    #[error("No repository could list versions of {coordinate}: {details}")]
    RepositoryUnavailable { coordinate: String, details: String },

    #[error("Version parsing failed: {0}")]
    VersionParse(String),

    #[error("Cannot write catalog '{catalog}' to {}: {message}", path.display())]
    Write {
        catalog: String,
        path: PathBuf,
        message: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UpdateError {
    pub fn catalog_parse(
        catalog: impl Into<String>,
        path: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        UpdateError::CatalogParse {
            catalog: catalog.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn write(
        catalog: impl Into<String>,
        path: impl Into<PathBuf>,
        message: impl std::fmt::Display,
    ) -> Self {
        UpdateError::Write {
            catalog: catalog.into(),
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Failure of a single repository for a single lookup. Never fatal: the
/// repository simply contributes no versions.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("module not published here")]
    NotFound,

    #[error("invalid maven metadata: {0}")]
    Metadata(String),

    #[error("metadata response exceeded {0} bytes")]
    TooLarge(usize),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
}

pub type Result<T> = std::result::Result<T, UpdateError>;
