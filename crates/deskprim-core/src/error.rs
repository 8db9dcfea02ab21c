//! Common error types for deskprim.

use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigError;

/// Native error code as reported by the OS (`GetLastError` on Windows).
pub type NativeCode = u32;

/// Platform-level errors.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// A native allocation, lock or registration failed.
    #[error("{operation} failed (os error {code})")]
    ResourceUnavailable {
        operation: &'static str,
        code: NativeCode,
    },
    /// Clipboard ownership could not be obtained before the timeout elapsed.
    #[error("clipboard access denied after {waited:?}")]
    AccessDenied {
        waited: Duration,
        code: Option<NativeCode>,
    },
    /// The requested format is not on the clipboard.
    #[error("clipboard format not present: {0}")]
    FormatNotPresent(String),
    /// Operation attempted on a closed session, an already-removed hook, or
    /// while another session of this process is open.
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("not implemented on this platform")]
    NotImplemented,
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Error kinds, for callers that only need to branch on the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ResourceUnavailable,
    AccessDenied,
    FormatNotPresent,
    InvalidState,
    NotImplemented,
    Config,
}

impl PlatformError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlatformError::ResourceUnavailable { .. } => ErrorKind::ResourceUnavailable,
            PlatformError::AccessDenied { .. } => ErrorKind::AccessDenied,
            PlatformError::FormatNotPresent(_) => ErrorKind::FormatNotPresent,
            PlatformError::InvalidState(_) => ErrorKind::InvalidState,
            PlatformError::NotImplemented => ErrorKind::NotImplemented,
            PlatformError::Config(_) => ErrorKind::Config,
        }
    }

    /// The underlying native error code, where one was captured.
    pub fn native_code(&self) -> Option<NativeCode> {
        match self {
            PlatformError::ResourceUnavailable { code, .. } => Some(*code),
            PlatformError::AccessDenied { code, .. } => *code,
            _ => None,
        }
    }

    pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
        PlatformError::InvalidState(msg.into())
    }
}

/// Result type for platform operations.
pub type PlatformResult<T> = Result<T, PlatformError>;
