//! Error conversion helpers for file reads

use std::io;
use std::path::Path;

use crate::application::{ApplicationError, ApplicationResult};

/// Extension trait for converting `io::Result` to `ApplicationResult` with context.
pub trait IoResultExt<T> {
    /// Add path context to an I/O error; `NotFound` becomes [`ApplicationError::FileNotFound`].
    ///
    /// # Example
    /// ```ignore
    /// let text = fs::read_to_string(path).with_path_context("read", path)?;
    /// ```
    fn with_path_context(self, action: &str, path: &Path) -> ApplicationResult<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn with_path_context(self, action: &str, path: &Path) -> ApplicationResult<T> {
        self.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ApplicationError::FileNotFound(path.to_path_buf()),
            _ => ApplicationError::OperationFailed {
                context: format!("{}: {}", action, path.display()),
                source: Box::new(e),
            },
        })
    }
}
