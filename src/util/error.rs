//! Error taxonomy.
//!
//! Every failure is local and synchronous; nothing is retried internally.
//! A failed mutation (`create_*`, `add_sample`) leaves no trace behind.

use thiserror::Error;

/// Failure conditions surfaced by archive operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The file could not be validated as an archive on open: bad magic,
    /// unsupported major version, or a malformed top-level structure.
    #[error("invalid archive: {0}")]
    InvalidArchive(String),

    /// I/O failure or corruption encountered after a successful open, or an
    /// OS-level error while writing. The archive should be considered
    /// unusable once a close fails with this.
    #[error("archive I/O error: {0}")]
    ArchiveIo(String),

    /// Name collision among siblings under one parent. The first-created
    /// entity remains valid and unaffected.
    #[error("duplicate name {name:?} under {parent:?}")]
    DuplicateName { parent: String, name: String },

    /// Typed-wrapper construction over an object whose schema tag does not
    /// match.
    #[error("schema mismatch: expected {expected:?}, got {actual:?}")]
    SchemaMismatch { expected: String, actual: String },

    /// A sample or value whose data type disagrees with the property's
    /// established type.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Sample or child index beyond bounds.
    #[error("index {index} out of range (count: {count})")]
    IndexOutOfRange { index: usize, count: usize },

    /// Operation on a closed archive, or on a handle whose archive has been
    /// torn down.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    /// I/O-level failure with a message.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::ArchiveIo(msg.into())
    }

    /// Open-time validation failure.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArchive(msg.into())
    }

    /// Closed-archive / dead-handle failure.
    pub fn state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn type_mismatch(expected: impl ToString, actual: impl ToString) -> Self {
        Self::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::ArchiveIo(e.to_string())
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(e: std::string::FromUtf8Error) -> Self {
        Self::ArchiveIo(format!("invalid UTF-8: {e}"))
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(e: std::str::Utf8Error) -> Self {
        Self::ArchiveIo(format!("invalid UTF-8: {e}"))
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let e = Error::IndexOutOfRange { index: 5, count: 3 };
        assert!(e.to_string().contains('5'));
        assert!(e.to_string().contains('3'));

        let e = Error::DuplicateName {
            parent: "/a".into(),
            name: "b".into(),
        };
        assert!(e.to_string().contains("\"b\""));
    }

    #[test]
    fn from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let e: Error = io.into();
        assert!(matches!(e, Error::ArchiveIo(_)));
    }
}
