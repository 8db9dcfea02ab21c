//! System clipboard backend.
//!
//! Platform implementations:
//! - Windows: Win32 clipboard and global memory (`windows.rs`)
//! - Elsewhere: an inert clipboard that refuses every operation

#[cfg(windows)]
mod windows;

#[cfg(windows)]
pub use windows::{ClipboardListener, Win32Clipboard};

/// The clipboard backend for the current target.
#[cfg(windows)]
pub type SystemClipboard = Win32Clipboard;

#[cfg(not(windows))]
pub type SystemClipboard = fallback::UnsupportedClipboard;

#[cfg(not(windows))]
pub use fallback::{ClipboardListener, UnsupportedClipboard};

#[cfg(not(windows))]
mod fallback {
    use crate::error::{PlatformError, PlatformResult, CALL_NOT_IMPLEMENTED};
    use deskprim_core::native::{NativeClipboard, NativeMemory, RawHandle};
    use deskprim_core::{BroadcastLifecycle, MessageHookRegistry, NativeCode};

    /// Clipboard for targets without a system clipboard backend.
    #[derive(Debug, Default)]
    pub struct UnsupportedClipboard;

    impl NativeMemory for UnsupportedClipboard {
        fn global_alloc(&self, _size: usize) -> Result<RawHandle, NativeCode> {
            Err(CALL_NOT_IMPLEMENTED)
        }

        fn global_lock(&self, _handle: RawHandle) -> Result<*mut u8, NativeCode> {
            Err(CALL_NOT_IMPLEMENTED)
        }

        fn global_unlock(&self, _handle: RawHandle) -> Result<(), NativeCode> {
            Err(CALL_NOT_IMPLEMENTED)
        }

        fn global_size(&self, _handle: RawHandle) -> Result<usize, NativeCode> {
            Err(CALL_NOT_IMPLEMENTED)
        }

        fn global_free(&self, _handle: RawHandle) -> Result<(), NativeCode> {
            Err(CALL_NOT_IMPLEMENTED)
        }
    }

    impl NativeClipboard for UnsupportedClipboard {
        fn open(&self) -> Result<(), NativeCode> {
            Err(CALL_NOT_IMPLEMENTED)
        }

        fn close(&self) -> Result<(), NativeCode> {
            Err(CALL_NOT_IMPLEMENTED)
        }

        fn empty(&self) -> Result<(), NativeCode> {
            Err(CALL_NOT_IMPLEMENTED)
        }

        fn formats(&self) -> Result<Vec<u32>, NativeCode> {
            Err(CALL_NOT_IMPLEMENTED)
        }

        fn data(&self, _format_id: u32) -> Option<RawHandle> {
            None
        }

        fn set_data(&self, _format_id: u32, _handle: RawHandle) -> Result<(), NativeCode> {
            Err(CALL_NOT_IMPLEMENTED)
        }

        fn register_format(&self, _name: &str) -> Result<u32, NativeCode> {
            Err(CALL_NOT_IMPLEMENTED)
        }

        fn format_name(&self, _format_id: u32) -> Option<String> {
            None
        }
    }

    /// Clipboard format listener registration; unavailable here.
    #[derive(Debug, Default)]
    pub struct ClipboardListener;

    impl BroadcastLifecycle for ClipboardListener {
        fn attach(&self, _registry: &MessageHookRegistry) -> PlatformResult<()> {
            Err(PlatformError::NotImplemented)
        }

        fn detach(&self, _registry: &MessageHookRegistry) {}
    }
}
