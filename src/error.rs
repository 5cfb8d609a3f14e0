//! Centralized error types for qwkpack.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the qwkpack library.
#[derive(Error, Debug)]
pub enum QwkError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A write ran out of disk space. The session is aborted but the records
    /// written before the failing message stay valid.
    #[error("Disk full while writing '{path}'")]
    DiskExhausted { path: PathBuf },

    /// A reply packet header record could not be read or was truncated.
    #[error("Corrupt reply packet at record {record} ({dispatched} message(s) already dispatched): {reason}")]
    CorruptReplyHeader {
        record: u64,
        dispatched: usize,
        reason: String,
    },

    /// The value does not fit the Microsoft Binary Format exponent.
    #[error("Value {0} overflows the MBF exponent")]
    MsBinOverflow(f32),

    /// A record field held something that cannot be encoded or decoded.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// The message store or mailbox refused an operation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The archiver collaborator failed.
    #[error("Archive error: {0}")]
    Archive(String),

    /// The transport collaborator failed.
    #[error("Transfer error: {0}")]
    Transport(String),

    /// The local board file is corrupt or was written by an incompatible version.
    #[error("Corrupt or incompatible board file '{path}': {reason}")]
    InvalidBoard { path: PathBuf, reason: String },
}

/// Errors reported by message-store and mailbox collaborators.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The area, message or recipient does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The collaborator declined the operation (access, limits, unknown user).
    #[error("Rejected: {0}")]
    Rejected(String),

    /// The area is held by another session.
    #[error("Busy: {0}")]
    Busy(String),

    /// Underlying storage failure.
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for `Result<T, QwkError>`.
pub type Result<T> = std::result::Result<T, QwkError>;

impl QwkError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Classify a failed write: running out of space becomes
    /// [`QwkError::DiskExhausted`], anything else an `Io` error.
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        if is_disk_full(&source) {
            Self::DiskExhausted { path: path.into() }
        } else {
            Self::io(path, source)
        }
    }

    /// Whether this error means the disk filled up.
    pub fn is_disk_exhausted(&self) -> bool {
        matches!(self, Self::DiskExhausted { .. })
    }
}

fn is_disk_full(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::StorageFull | std::io::ErrorKind::WriteZero
    )
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (rare, prefer `QwkError::io`).
impl From<std::io::Error> for QwkError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_classifies_storage_full() {
        let e = std::io::Error::new(std::io::ErrorKind::StorageFull, "no space");
        assert!(QwkError::write("MESSAGES.DAT", e).is_disk_exhausted());

        let e = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(!QwkError::write("MESSAGES.DAT", e).is_disk_exhausted());
    }

    #[test]
    fn test_corrupt_header_message_mentions_count() {
        let err = QwkError::CorruptReplyHeader {
            record: 7,
            dispatched: 3,
            reason: "truncated header".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("record 7"));
        assert!(msg.contains("3 message(s)"));
    }
}
