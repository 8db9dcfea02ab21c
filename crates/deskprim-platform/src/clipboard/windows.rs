//! Win32 clipboard and global memory.

use deskprim_core::native::{NativeClipboard, NativeMemory, RawHandle};
use deskprim_core::{BroadcastLifecycle, MessageHookRegistry, NativeCode};
use tracing::{debug, info};
use windows_sys::Win32::Foundation::{GlobalFree, HWND, NO_ERROR};
use windows_sys::Win32::System::DataExchange::{
    AddClipboardFormatListener, CloseClipboard, EmptyClipboard, EnumClipboardFormats,
    GetClipboardData, GetClipboardFormatNameW, OpenClipboard, RegisterClipboardFormatW,
    RemoveClipboardFormatListener, SetClipboardData,
};
use windows_sys::Win32::System::Memory::{
    GlobalAlloc, GlobalLock, GlobalSize, GlobalUnlock, GMEM_MOVEABLE, GMEM_ZEROINIT,
};

use crate::error::{clear_last_error, last_error, os_error, PlatformResult};
use crate::wide::{from_wide, to_wide};

/// Longest registered format name, in UTF-16 units.
const MAX_FORMAT_NAME: usize = 256;

/// The system clipboard, opened on behalf of an optional owner window.
///
/// Without an owner the clipboard is opened for the calling task, as most
/// console tools do.
#[derive(Debug, Default)]
pub struct Win32Clipboard {
    owner: RawHandle,
}

impl Win32Clipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_owner(owner: RawHandle) -> Self {
        Self { owner }
    }
}

fn check(ok: i32) -> Result<(), NativeCode> {
    if ok != 0 {
        Ok(())
    } else {
        Err(last_error())
    }
}

impl NativeMemory for Win32Clipboard {
    fn global_alloc(&self, size: usize) -> Result<RawHandle, NativeCode> {
        // SAFETY: no pointer arguments.
        let handle = unsafe { GlobalAlloc(GMEM_MOVEABLE | GMEM_ZEROINIT, size) };
        if handle.is_null() {
            return Err(last_error());
        }
        Ok(handle as RawHandle)
    }

    fn global_lock(&self, handle: RawHandle) -> Result<*mut u8, NativeCode> {
        // SAFETY: an invalid handle makes the call fail; it does not fault.
        let ptr = unsafe { GlobalLock(handle as _) };
        if ptr.is_null() {
            return Err(last_error());
        }
        Ok(ptr.cast())
    }

    fn global_unlock(&self, handle: RawHandle) -> Result<(), NativeCode> {
        clear_last_error();
        // SAFETY: see `global_lock`.
        let still_locked = unsafe { GlobalUnlock(handle as _) };
        // 0 with NO_ERROR just means the lock count reached zero.
        match last_error() {
            NO_ERROR => Ok(()),
            code if still_locked == 0 => Err(code),
            _ => Ok(()),
        }
    }

    fn global_size(&self, handle: RawHandle) -> Result<usize, NativeCode> {
        clear_last_error();
        // SAFETY: see `global_lock`.
        let size = unsafe { GlobalSize(handle as _) };
        // 0 is also the size of a discarded block.
        match last_error() {
            code if size == 0 && code != NO_ERROR => Err(code),
            _ => Ok(size),
        }
    }

    fn global_free(&self, handle: RawHandle) -> Result<(), NativeCode> {
        // SAFETY: the handle is owned by the caller's guard.
        let failed = unsafe { GlobalFree(handle as _) };
        if failed.is_null() {
            Ok(())
        } else {
            Err(last_error())
        }
    }
}

impl NativeClipboard for Win32Clipboard {
    fn open(&self) -> Result<(), NativeCode> {
        // SAFETY: the owner is either null or a window of this process.
        check(unsafe { OpenClipboard(self.owner as HWND) })
    }

    fn close(&self) -> Result<(), NativeCode> {
        // SAFETY: no arguments.
        check(unsafe { CloseClipboard() })
    }

    fn empty(&self) -> Result<(), NativeCode> {
        // SAFETY: no arguments.
        check(unsafe { EmptyClipboard() })
    }

    fn formats(&self) -> Result<Vec<u32>, NativeCode> {
        let mut ids = Vec::new();
        let mut format = 0;
        loop {
            clear_last_error();
            // SAFETY: no pointer arguments.
            format = unsafe { EnumClipboardFormats(format) };
            if format == 0 {
                break;
            }
            ids.push(format);
        }
        match last_error() {
            NO_ERROR => Ok(ids),
            code => Err(code),
        }
    }

    fn data(&self, format_id: u32) -> Option<RawHandle> {
        // SAFETY: no pointer arguments.
        let handle = unsafe { GetClipboardData(format_id) };
        (!handle.is_null()).then_some(handle as RawHandle)
    }

    fn set_data(&self, format_id: u32, handle: RawHandle) -> Result<(), NativeCode> {
        // SAFETY: the block is unlocked and owned by the caller until this
        // call succeeds.
        let placed = unsafe { SetClipboardData(format_id, handle as _) };
        if placed.is_null() {
            return Err(last_error());
        }
        Ok(())
    }

    fn register_format(&self, name: &str) -> Result<u32, NativeCode> {
        let wide = to_wide(name);
        // SAFETY: `wide` is NUL-terminated and outlives the call.
        let id = unsafe { RegisterClipboardFormatW(wide.as_ptr()) };
        if id == 0 {
            return Err(last_error());
        }
        Ok(id)
    }

    fn format_name(&self, format_id: u32) -> Option<String> {
        let mut buf = [0u16; MAX_FORMAT_NAME];
        // SAFETY: the length passed matches the buffer.
        let len = unsafe { GetClipboardFormatNameW(format_id, buf.as_mut_ptr(), buf.len() as i32) };
        (len > 0).then(|| from_wide(&buf[..len as usize]))
    }
}

/// Registers the hook window as a clipboard format listener while a clipboard
/// monitor has subscribers, so it receives `WM_CLIPBOARDUPDATE`.
#[derive(Debug, Default)]
pub struct ClipboardListener;

impl BroadcastLifecycle for ClipboardListener {
    fn attach(&self, registry: &MessageHookRegistry) -> PlatformResult<()> {
        let hwnd = registry.window_handle();
        // SAFETY: the registry's hook window is alive while it has hooks.
        if unsafe { AddClipboardFormatListener(hwnd as HWND) } == 0 {
            return Err(os_error("AddClipboardFormatListener"));
        }
        info!(hwnd, "Clipboard format listener added");
        Ok(())
    }

    fn detach(&self, registry: &MessageHookRegistry) {
        let hwnd = registry.window_handle();
        // SAFETY: as in `attach`.
        unsafe { RemoveClipboardFormatListener(hwnd as HWND) };
        debug!(hwnd, "Clipboard format listener removed");
    }
}
