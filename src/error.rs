use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::property::PropertyType;

/// Coarse classification of an [`ExportError`], used by batch reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Format,
    Authentication,
    UnsupportedType,
    Io,
}

#[derive(Error, Debug)]
pub enum ExportError {
    /// Malformed or truncated input: header, key blob, content blob,
    /// image metadata, or property set.
    #[error("Malformed data: {0}")]
    Format(String),
    /// GCM tag mismatch: a wrong export code or a tampered file.
    #[error("Authentication failed: wrong export code or corrupted file")]
    Authentication,
    #[error("Property type {0:?} has no JSON encoding")]
    UnsupportedType(PropertyType),
    #[error("I/O error on {path}: {source}")]
    Io {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ExportError {
    pub fn format(msg: impl Into<String>) -> Self {
        ExportError::Format(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ExportError::Io { path: path.into(), source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ExportError::Format(_)          => ErrorKind::Format,
            ExportError::Authentication     => ErrorKind::Authentication,
            ExportError::UnsupportedType(_) => ErrorKind::UnsupportedType,
            ExportError::Io { .. }          => ErrorKind::Io,
        }
    }
}

impl From<hex::FromHexError> for ExportError {
    fn from(e: hex::FromHexError) -> Self {
        ExportError::Format(format!("export code is not valid hex: {e}"))
    }
}
