use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Failure that aborts project discovery as a whole.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("projects folder not found: {0}")]
    NotFound(PathBuf),
    #[error("permission denied reading projects folder: {0}")]
    PermissionDenied(PathBuf),
    #[error("failed to read projects folder {path}: {message}")]
    Unknown { path: PathBuf, message: String },
}

impl DiscoveryError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not-found",
            Self::PermissionDenied(_) => "permission",
            Self::Unknown { .. } => "unknown",
        }
    }
}

/// Semantic taxonomy for a failed filesystem step while archiving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Error)]
#[serde(rename_all = "kebab-case")]
pub enum ArchiveErrorKind {
    #[serde(rename = "permission")]
    #[error("permission denied")]
    PermissionDenied,
    #[error("file or directory not found")]
    NotFound,
    #[error("already present in archive folder")]
    AlreadyExists,
    #[error("no space left on device")]
    DiskFull,
    #[error("unknown error")]
    Unknown,
}

impl ArchiveErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission",
            Self::NotFound => "not-found",
            Self::AlreadyExists => "already-exists",
            Self::DiskFull => "disk-full",
            Self::Unknown => "unknown",
        }
    }
}
