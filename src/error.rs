use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Source file is missing at open time.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The container could not be read as a zip archive.
    #[error("corrupt archive {}: {source}", .path.display())]
    CorruptArchive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("slide {0} not found in template")]
    SlideNotFound(usize),

    #[error("io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing the archive into memory failed; nothing was written to disk.
    #[error("serialize archive: {0}")]
    Serialize(#[source] zip::result::ZipError),

    #[error("xml error in {part}: {message}")]
    Xml { part: String, message: String },

    /// The value generator could not produce text for a marker.
    #[error("generation failed for marker {marker}: {message}")]
    Generation { marker: String, message: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("config error in {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn xml(part: &str, message: impl ToString) -> Self {
        Self::Xml {
            part: part.to_string(),
            message: message.to_string(),
        }
    }
}
