use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Application-wide result type alias.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// The path vanished or never existed.
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A create collided with an existing entry.
    #[error("Already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    /// The OS refused access.
    #[error("Permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    /// Any other I/O failure, with the path it happened on.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Invalid path or name provided by the user.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// An operation needed an open root directory.
    #[error("No directory is open")]
    NoRootOpen,

    /// Terminal read/write errors (prompts, output).
    #[error("Terminal error: {0}")]
    Terminal(String),
}

impl AppError {
    /// Classify an `io::Error` raised while operating on `path`.
    pub fn io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => AppError::NotFound(path.to_path_buf()),
            io::ErrorKind::AlreadyExists => AppError::AlreadyExists(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => AppError::PermissionDenied(path.to_path_buf()),
            _ => AppError::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}

/// Attach a path to an `io::Result`, classifying the error.
pub trait IoContext<T> {
    fn at(self, path: &Path) -> Result<T>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn at(self, path: &Path) -> Result<T> {
        self.map_err(|e| AppError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_classified() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err = AppError::io(Path::new("/tmp/missing.md"), io_err);
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Not found: /tmp/missing.md");
    }

    #[test]
    fn already_exists_is_classified() {
        let io_err = io::Error::new(io::ErrorKind::AlreadyExists, "exists");
        let err = AppError::io(Path::new("/proj/x.md"), io_err);
        assert!(matches!(err, AppError::AlreadyExists(ref p) if p == Path::new("/proj/x.md")));
    }

    #[test]
    fn permission_denied_is_classified() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err = AppError::io(Path::new("/root"), io_err);
        assert!(matches!(err, AppError::PermissionDenied(_)));
    }

    #[test]
    fn other_kinds_keep_source() {
        let io_err = io::Error::new(io::ErrorKind::Other, "disk on fire");
        let err = AppError::io(Path::new("/proj"), io_err);
        assert!(matches!(err, AppError::Io { .. }));
        assert!(err.to_string().contains("disk on fire"));
    }

    #[test]
    fn io_context_attaches_path() {
        let res: io::Result<()> = Err(io::Error::new(io::ErrorKind::NotFound, "gone"));
        let err = res.at(Path::new("/a/b")).unwrap_err();
        assert_eq!(err.to_string(), "Not found: /a/b");
    }

    #[test]
    fn invalid_path_error_display() {
        let err = AppError::InvalidPath("../escape".into());
        assert_eq!(err.to_string(), "Invalid path: ../escape");
    }
}
