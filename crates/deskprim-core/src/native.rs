//! Seams to the native windowing subsystem.
//!
//! The core never calls the OS directly. Platform crates implement these
//! traits over Win32; tests use the in-memory doubles in [`crate::testing`].

use std::rc::Rc;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::error::{NativeCode, PlatformResult};
use crate::messages::WindowMessage;

/// Opaque OS handle value (HGLOBAL, HICON, HWND ...).
pub type RawHandle = usize;

/// Movable global memory, the transport for clipboard payloads.
pub trait NativeMemory {
    /// Allocate a zero-initialized, movable block of `size` bytes.
    fn global_alloc(&self, size: usize) -> Result<RawHandle, NativeCode>;
    /// Lock a block and return the address of its first byte.
    fn global_lock(&self, handle: RawHandle) -> Result<*mut u8, NativeCode>;
    fn global_unlock(&self, handle: RawHandle) -> Result<(), NativeCode>;
    /// Size of a block. Fails for handles that are not global memory.
    fn global_size(&self, handle: RawHandle) -> Result<usize, NativeCode>;
    fn global_free(&self, handle: RawHandle) -> Result<(), NativeCode>;
}

/// The system clipboard as seen by one process.
///
/// All methods except `open` and the format-name helpers require the
/// clipboard to be open by the caller.
pub trait NativeClipboard: NativeMemory + Send + Sync {
    /// Single attempt to take clipboard ownership.
    fn open(&self) -> Result<(), NativeCode>;
    fn close(&self) -> Result<(), NativeCode>;
    /// Empty the clipboard and take ownership of its contents.
    fn empty(&self) -> Result<(), NativeCode>;
    /// Format ids currently on the clipboard, in clipboard order.
    fn formats(&self) -> Result<Vec<u32>, NativeCode>;
    /// Data handle for `format_id`, owned by the clipboard.
    fn data(&self, format_id: u32) -> Option<RawHandle>;
    /// Place `handle` on the clipboard. On success the clipboard owns it.
    fn set_data(&self, format_id: u32, handle: RawHandle) -> Result<(), NativeCode>;
    fn register_format(&self, name: &str) -> Result<u32, NativeCode>;
    fn format_name(&self, format_id: u32) -> Option<String>;

    /// Set while a session is open over this clipboard. The system clipboard
    /// is shared by the whole process, so by default so is the flag.
    fn session_flag(&self) -> &AtomicBool {
        &PROCESS_SESSION_OPEN
    }
}

static PROCESS_SESSION_OPEN: AtomicBool = AtomicBool::new(false);

impl<T: NativeMemory + ?Sized> NativeMemory for Arc<T> {
    fn global_alloc(&self, size: usize) -> Result<RawHandle, NativeCode> {
        (**self).global_alloc(size)
    }

    fn global_lock(&self, handle: RawHandle) -> Result<*mut u8, NativeCode> {
        (**self).global_lock(handle)
    }

    fn global_unlock(&self, handle: RawHandle) -> Result<(), NativeCode> {
        (**self).global_unlock(handle)
    }

    fn global_size(&self, handle: RawHandle) -> Result<usize, NativeCode> {
        (**self).global_size(handle)
    }

    fn global_free(&self, handle: RawHandle) -> Result<(), NativeCode> {
        (**self).global_free(handle)
    }
}

impl<T: NativeClipboard + ?Sized> NativeClipboard for Arc<T> {
    fn open(&self) -> Result<(), NativeCode> {
        (**self).open()
    }

    fn close(&self) -> Result<(), NativeCode> {
        (**self).close()
    }

    fn empty(&self) -> Result<(), NativeCode> {
        (**self).empty()
    }

    fn formats(&self) -> Result<Vec<u32>, NativeCode> {
        (**self).formats()
    }

    fn data(&self, format_id: u32) -> Option<RawHandle> {
        (**self).data(format_id)
    }

    fn set_data(&self, format_id: u32, handle: RawHandle) -> Result<(), NativeCode> {
        (**self).set_data(format_id, handle)
    }

    fn register_format(&self, name: &str) -> Result<u32, NativeCode> {
        (**self).register_format(name)
    }

    fn format_name(&self, format_id: u32) -> Option<String> {
        (**self).format_name(format_id)
    }

    fn session_flag(&self) -> &AtomicBool {
        (**self).session_flag()
    }
}

/// Entry point of the native window procedure into the hook registry.
///
/// Returns `Some(result)` when a hook consumed the message.
pub type Dispatcher = Rc<dyn Fn(&WindowMessage) -> Option<isize>>;

/// Owner of the single native message callback for a thread.
pub trait NativeHookHost {
    /// Start routing window messages to `dispatcher`.
    fn install(&self, dispatcher: Dispatcher) -> PlatformResult<()>;
    fn uninstall(&self);
    /// Window receiving the messages, 0 while not installed.
    fn window_handle(&self) -> RawHandle;
}
