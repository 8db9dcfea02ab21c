//! Native error capture for the Win32 backends.

pub use deskprim_core::{NativeCode, PlatformError, PlatformResult};

/// `ERROR_CALL_NOT_IMPLEMENTED`, reported by the inert fallbacks.
#[cfg_attr(windows, allow(dead_code))]
pub(crate) const CALL_NOT_IMPLEMENTED: NativeCode = 120;

/// The calling thread's last native error code.
#[cfg(windows)]
pub(crate) fn last_error() -> NativeCode {
    // SAFETY: no preconditions.
    unsafe { windows_sys::Win32::Foundation::GetLastError() }
}

#[cfg(windows)]
pub(crate) fn clear_last_error() {
    // SAFETY: no preconditions.
    unsafe { windows_sys::Win32::Foundation::SetLastError(0) }
}

/// `ResourceUnavailable` for `operation` with the last native error code.
#[cfg(windows)]
pub(crate) fn os_error(operation: &'static str) -> PlatformError {
    PlatformError::ResourceUnavailable {
        operation,
        code: last_error(),
    }
}
