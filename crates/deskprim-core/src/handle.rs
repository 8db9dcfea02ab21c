//! Scoped ownership of native handles.
//!
//! A [`HandleGuard`] releases its handle exactly once: on [`HandleGuard::release`],
//! or on drop if that never happened. Handing the handle to the OS (for
//! example `SetClipboardData`) goes through [`HandleGuard::into_raw`], which
//! disarms the release.
//!
//! Release failures are logged and counted, never returned, since release
//! runs during cleanup where the primary outcome must win.

use std::slice;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use crate::error::{NativeCode, PlatformError, PlatformResult};
use crate::native::{NativeMemory, RawHandle};

static RELEASE_FAILURES: AtomicU64 = AtomicU64::new(0);

/// Number of guard releases that failed in this process.
pub fn release_failures() -> u64 {
    RELEASE_FAILURES.load(Ordering::Relaxed)
}

/// What a guard owns, which decides how it is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    /// A global memory block; released with `GlobalFree`.
    GlobalMemory,
    /// A lock on a global memory block; released with `GlobalUnlock`.
    GlobalLock,
    /// An icon; released with `DestroyIcon`.
    Icon,
    /// A window; released with `DestroyWindow`.
    Window,
}

impl HandleKind {
    pub fn acquire_operation(self) -> &'static str {
        match self {
            HandleKind::GlobalMemory => "GlobalAlloc",
            HandleKind::GlobalLock => "GlobalLock",
            HandleKind::Icon => "ExtractIconEx",
            HandleKind::Window => "CreateWindowEx",
        }
    }

    pub fn release_operation(self) -> &'static str {
        match self {
            HandleKind::GlobalMemory => "GlobalFree",
            HandleKind::GlobalLock => "GlobalUnlock",
            HandleKind::Icon => "DestroyIcon",
            HandleKind::Window => "DestroyWindow",
        }
    }
}

type Release<'a> = Box<dyn FnOnce(RawHandle) -> Result<(), NativeCode> + 'a>;

/// Exactly-once owner of a native handle.
pub struct HandleGuard<'a> {
    kind: HandleKind,
    handle: RawHandle,
    release: Option<Release<'a>>,
}

impl<'a> HandleGuard<'a> {
    /// Run `acquire` and guard the handle it yields.
    ///
    /// Failure maps to [`PlatformError::ResourceUnavailable`] carrying the
    /// native code; nothing is released in that case.
    pub fn acquire<A, R>(kind: HandleKind, acquire: A, release: R) -> PlatformResult<Self>
    where
        A: FnOnce() -> Result<RawHandle, NativeCode>,
        R: FnOnce(RawHandle) -> Result<(), NativeCode> + 'a,
    {
        let handle = acquire().map_err(|code| PlatformError::ResourceUnavailable {
            operation: kind.acquire_operation(),
            code,
        })?;
        Ok(Self::adopt(kind, handle, release))
    }

    /// Guard a handle that was acquired elsewhere.
    pub fn adopt<R>(kind: HandleKind, handle: RawHandle, release: R) -> Self
    where
        R: FnOnce(RawHandle) -> Result<(), NativeCode> + 'a,
    {
        debug!(?kind, handle, "Native handle acquired");
        Self {
            kind,
            handle,
            release: Some(Box::new(release)),
        }
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    pub fn handle(&self) -> RawHandle {
        self.handle
    }

    /// Whether the release obligation is still pending.
    pub fn is_armed(&self) -> bool {
        self.release.is_some()
    }

    /// Release the handle now. Later calls and the drop are no-ops.
    pub fn release(&mut self) {
        let Some(release) = self.release.take() else {
            return;
        };
        match release(self.handle) {
            Ok(()) => debug!(kind = ?self.kind, handle = self.handle, "Native handle released"),
            Err(code) => {
                RELEASE_FAILURES.fetch_add(1, Ordering::Relaxed);
                warn!(
                    kind = ?self.kind,
                    handle = self.handle,
                    code,
                    "{} failed during cleanup",
                    self.kind.release_operation()
                );
            }
        }
    }

    /// Give up ownership without releasing; the caller (or the OS) now owns
    /// the handle.
    pub fn into_raw(mut self) -> RawHandle {
        self.release = None;
        self.handle
    }
}

impl Drop for HandleGuard<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for HandleGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleGuard")
            .field("kind", &self.kind)
            .field("handle", &format_args!("{:#x}", self.handle))
            .field("armed", &self.is_armed())
            .finish()
    }
}

/// An owned global memory block ("alloc" mode).
pub struct GlobalBlock<'a, M: NativeMemory + ?Sized> {
    memory: &'a M,
    guard: HandleGuard<'a>,
    size: usize,
}

impl<'a, M: NativeMemory + ?Sized> GlobalBlock<'a, M> {
    /// Allocate a zero-initialized movable block. A size of 0 is allowed.
    pub fn alloc(memory: &'a M, size: usize) -> PlatformResult<Self> {
        let guard = HandleGuard::acquire(
            HandleKind::GlobalMemory,
            || memory.global_alloc(size),
            move |handle| memory.global_free(handle),
        )?;
        Ok(Self {
            memory,
            guard,
            size,
        })
    }

    pub fn handle(&self) -> RawHandle {
        self.guard.handle()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Copy `bytes` to the start of the block.
    pub fn fill(&mut self, bytes: &[u8]) -> PlatformResult<()> {
        if bytes.len() > self.size {
            return Err(PlatformError::invalid_state(format!(
                "payload of {} bytes does not fit a block of {} bytes",
                bytes.len(),
                self.size
            )));
        }
        // Empty blocks are never locked.
        if bytes.is_empty() {
            return Ok(());
        }
        let mut locked = LockedBlock::lock(self.memory, self.handle())?;
        locked.as_bytes_mut()[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Transfer the block to its new owner; it will not be freed here.
    pub fn into_raw(self) -> RawHandle {
        self.guard.into_raw()
    }
}

/// A locked view on a global memory block ("lock" mode).
///
/// The block itself is not owned; dropping the view only unlocks it.
pub struct LockedBlock<'a> {
    guard: HandleGuard<'a>,
    ptr: *mut u8,
    len: usize,
}

impl<'a> LockedBlock<'a> {
    pub fn lock<M: NativeMemory + ?Sized>(memory: &'a M, handle: RawHandle) -> PlatformResult<Self> {
        let ptr = memory
            .global_lock(handle)
            .map_err(|code| PlatformError::ResourceUnavailable {
                operation: HandleKind::GlobalLock.acquire_operation(),
                code,
            })?;
        let guard = HandleGuard::adopt(HandleKind::GlobalLock, handle, move |handle| {
            memory.global_unlock(handle)
        });
        let len = memory
            .global_size(handle)
            .map_err(|code| PlatformError::ResourceUnavailable {
                operation: "GlobalSize",
                code,
            })?;
        Ok(Self { guard, ptr, len })
    }

    pub fn handle(&self) -> RawHandle {
        self.guard.handle()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: the block stays locked, and therefore mapped at `ptr`, for
        // as long as the guard lives; `len` is the block size reported by
        // the memory provider.
        unsafe { slice::from_raw_parts(self.ptr, self.len) }
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: see `as_bytes`; `&mut self` makes this the only view.
        unsafe { slice::from_raw_parts_mut(self.ptr, self.len) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeClipboard;
    use std::cell::Cell;

    #[test]
    fn test_release_runs_once() {
        let calls = Cell::new(0);
        let mut guard = HandleGuard::adopt(HandleKind::Icon, 0x10, |_| {
            calls.set(calls.get() + 1);
            Ok(())
        });
        guard.release();
        guard.release();
        drop(guard);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_drop_releases_on_early_exit() {
        let calls = Cell::new(0);
        let run = || -> PlatformResult<()> {
            let _guard = HandleGuard::adopt(HandleKind::Window, 0x20, |_| {
                calls.set(calls.get() + 1);
                Ok(())
            });
            Err(PlatformError::NotImplemented)
        };
        assert!(run().is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_into_raw_disarms() {
        let calls = Cell::new(0);
        let guard = HandleGuard::adopt(HandleKind::GlobalMemory, 0x30, |_| {
            calls.set(calls.get() + 1);
            Ok(())
        });
        assert!(guard.is_armed());
        assert_eq!(guard.into_raw(), 0x30);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_acquire_failure_carries_code() {
        let err = HandleGuard::acquire(HandleKind::GlobalMemory, || Err(8), |_| Ok(())).unwrap_err();
        assert_eq!(err.native_code(), Some(8));
        assert!(err.to_string().contains("GlobalAlloc"));
    }

    #[test]
    fn test_release_failure_is_counted_not_raised() {
        let before = release_failures();
        let guard = HandleGuard::adopt(HandleKind::Icon, 0x40, |_| Err(6));
        drop(guard);
        assert!(release_failures() > before);
    }

    #[test]
    fn test_global_block_freed_unless_transferred() {
        let clipboard = FakeClipboard::new();
        {
            let mut block = GlobalBlock::alloc(&clipboard, 4).unwrap();
            block.fill(b"abcd").unwrap();
            assert_eq!(clipboard.live_blocks(), 1);
        }
        assert_eq!(clipboard.live_blocks(), 0);

        let block = GlobalBlock::alloc(&clipboard, 2).unwrap();
        let handle = block.into_raw();
        assert_eq!(clipboard.live_blocks(), 1);
        clipboard.global_free(handle).unwrap();
        assert_eq!(clipboard.live_blocks(), 0);
    }

    #[test]
    fn test_locked_block_unlocks_on_drop() {
        let clipboard = FakeClipboard::new();
        let mut block = GlobalBlock::alloc(&clipboard, 3).unwrap();
        block.fill(b"xyz").unwrap();
        {
            let locked = LockedBlock::lock(&clipboard, block.handle()).unwrap();
            assert_eq!(locked.as_bytes(), b"xyz");
            assert_eq!(clipboard.locked_blocks(), 1);
        }
        assert_eq!(clipboard.locked_blocks(), 0);
    }

    #[test]
    fn test_fill_rejects_oversized_payload() {
        let clipboard = FakeClipboard::new();
        let mut block = GlobalBlock::alloc(&clipboard, 1).unwrap();
        assert!(block.fill(b"too long").is_err());
        assert_eq!(clipboard.locked_blocks(), 0);
    }

    #[test]
    fn test_locked_block_unlocks_exactly_once() {
        let clipboard = FakeClipboard::new();
        let block = GlobalBlock::alloc(&clipboard, 2).unwrap();
        drop(LockedBlock::lock(&clipboard, block.handle()).unwrap());
        assert_eq!(
            clipboard.global_unlock(block.handle()),
            Err(crate::testing::ERROR_NOT_LOCKED)
        );
    }
}
