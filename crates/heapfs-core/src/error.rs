// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for the heapfs engine

use std::io;

/// Core filesystem error type.
///
/// Every failure surfaced by a top-level verb is one of these kinds; messages
/// carry the offending path or attribute name.
#[derive(thiserror::Error, Debug)]
pub enum FsError {
    #[error("no such file or directory: {0}")]
    NotFound(String),
    #[error("file already exists: {0}")]
    AlreadyExists(String),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("is a directory: {0}")]
    IsADirectory(String),
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),
    #[error("too many levels of symbolic links: {0}")]
    LinkLoop(String),
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    #[error("invalid attribute format: {0}")]
    InvalidFormat(String),
    #[error("invalid attribute: {0}")]
    InvalidAttribute(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("out of space")]
    OutOfSpace,
    #[error("filesystem or handle is closed")]
    Closed,
    #[error("interrupted")]
    Interrupted,
    #[error("atomic move not satisfiable: {0}")]
    AtomicViolation(String),
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("cross-device link or move")]
    CrossDevice,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type FsResult<T> = Result<T, FsError>;

impl From<FsError> for io::Error {
    fn from(err: FsError) -> io::Error {
        let kind = match &err {
            FsError::NotFound(_) => io::ErrorKind::NotFound,
            FsError::AlreadyExists(_) => io::ErrorKind::AlreadyExists,
            FsError::NotADirectory(_) => io::ErrorKind::NotADirectory,
            FsError::IsADirectory(_) => io::ErrorKind::IsADirectory,
            FsError::DirectoryNotEmpty(_) => io::ErrorKind::DirectoryNotEmpty,
            FsError::LinkLoop(_) => io::ErrorKind::Other,
            FsError::Unsupported(_) => io::ErrorKind::Unsupported,
            FsError::OutOfSpace => io::ErrorKind::StorageFull,
            FsError::Interrupted => io::ErrorKind::Interrupted,
            FsError::AccessDenied(_) => io::ErrorKind::PermissionDenied,
            FsError::CrossDevice => io::ErrorKind::CrossesDevices,
            FsError::Io(e) => e.kind(),
            _ => io::ErrorKind::InvalidInput,
        };
        io::Error::new(kind, err)
    }
}
