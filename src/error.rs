use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KappaError {
    #[error("invalid map specifier: {0}")]
    InvalidSpecifier(String),

    #[error("invalid map filename: {0}")]
    InvalidFilename(String),

    #[error("unknown lens model: {0}")]
    UnknownModel(String),

    #[error("missing config file kappa-mm.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("no map index side-store at {0}; run `kappa-mm index` first")]
    IndexUnavailable(String),

    #[error("map not found in index: {0}")]
    MapNotFound(String),

    #[error("index contains duplicate entries for {0}")]
    IndexIntegrity(String),

    #[error("corrupt index side-store: {0}")]
    IndexCorrupt(String),

    #[error("malformed header field {field} in {path}")]
    MalformedHeader { field: String, path: String },

    #[error("malformed map image: {0}")]
    MalformedImage(String),

    #[error("drive credential error: {0}")]
    Auth(String),

    #[error("drive request failed: {0}")]
    DriveHttp(String),

    #[error("drive returned status {status}: {message}")]
    DriveStatus { status: u16, message: String },

    #[error("archive request failed: {0}")]
    ArchiveHttp(String),

    #[error("archive returned status {status}: {message}")]
    ArchiveStatus { status: u16, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
