use crate::error::{ArchiveErrorKind, DiscoveryError};
use std::io::{self, ErrorKind};
use std::path::Path;

/// Map an I/O failure onto the archive taxonomy using only its structured kind.
pub fn classify_io(err: &io::Error) -> ArchiveErrorKind {
    match err.kind() {
        ErrorKind::PermissionDenied | ErrorKind::ReadOnlyFilesystem => {
            ArchiveErrorKind::PermissionDenied
        }
        ErrorKind::NotFound => ArchiveErrorKind::NotFound,
        ErrorKind::AlreadyExists => ArchiveErrorKind::AlreadyExists,
        ErrorKind::StorageFull | ErrorKind::QuotaExceeded => ArchiveErrorKind::DiskFull,
        _ => ArchiveErrorKind::Unknown,
    }
}

pub fn classify_discovery(base: &Path, err: &io::Error) -> DiscoveryError {
    match err.kind() {
        ErrorKind::NotFound | ErrorKind::NotADirectory => {
            DiscoveryError::NotFound(base.to_path_buf())
        }
        ErrorKind::PermissionDenied => DiscoveryError::PermissionDenied(base.to_path_buf()),
        _ => DiscoveryError::Unknown {
            path: base.to_path_buf(),
            message: err.to_string(),
        },
    }
}
