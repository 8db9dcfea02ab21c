//! In-memory native layer for tests.
//!
//! [`FakeClipboard`] behaves like the Win32 clipboard for a single process:
//! ownership, global memory blocks (real heap allocations behind handle
//! values), format registration, and contention from "other processes".
//! [`FakeHookHost`] stands in for the hook window and lets tests deliver
//! messages by hand.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::AtomicBool;
use std::sync::Mutex;

use crate::error::{NativeCode, PlatformError, PlatformResult};
use crate::messages::WindowMessage;
use crate::native::{Dispatcher, NativeClipboard, NativeHookHost, NativeMemory, RawHandle};

pub const ERROR_ACCESS_DENIED: NativeCode = 5;
pub const ERROR_INVALID_HANDLE: NativeCode = 6;
pub const ERROR_NOT_LOCKED: NativeCode = 158;
pub const ERROR_CLIPBOARD_NOT_OPEN: NativeCode = 1418;

/// How long another process keeps the clipboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contention {
    /// Released after this many failed open attempts.
    Attempts(u32),
    Forever,
}

struct FakeBlock {
    data: Box<[u8]>,
    locks: u32,
    on_clipboard: bool,
}

#[derive(Default)]
struct FakeState {
    blocks: HashMap<RawHandle, FakeBlock>,
    next_handle: RawHandle,
    contents: Vec<(u32, RawHandle)>,
    registered: Vec<String>,
    open: bool,
    contention: Option<Contention>,
    open_attempts: u32,
    fail_alloc: Option<NativeCode>,
    fail_set_data: Option<NativeCode>,
}

impl FakeState {
    fn require_open(&self) -> Result<(), NativeCode> {
        if self.open {
            Ok(())
        } else {
            Err(ERROR_CLIPBOARD_NOT_OPEN)
        }
    }

    fn insert_block(&mut self, data: Box<[u8]>, on_clipboard: bool) -> RawHandle {
        self.next_handle += 0x10;
        let handle = 0x1_0000 + self.next_handle;
        self.blocks.insert(
            handle,
            FakeBlock {
                data,
                locks: 0,
                on_clipboard,
            },
        );
        handle
    }

    fn drop_contents(&mut self) {
        for (_, handle) in self.contents.drain(..) {
            self.blocks.remove(&handle);
        }
    }
}

/// Process-local clipboard with Win32 semantics. Each instance stands for
/// one process, with its own open-session flag.
#[derive(Default)]
pub struct FakeClipboard {
    state: Mutex<FakeState>,
    session_open: AtomicBool,
}

impl FakeClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Put data on the clipboard as another application would.
    pub fn seed(&self, format_id: u32, bytes: &[u8]) {
        let mut state = self.state();
        let handle = state.insert_block(bytes.to_vec().into_boxed_slice(), true);
        state.contents.retain(|(id, _)| *id != format_id);
        state.contents.push((format_id, handle));
    }

    /// Put a handle that is not global memory on the clipboard, like a
    /// bitmap or a block another process has already freed.
    pub fn seed_foreign_handle(&self, format_id: u32) -> RawHandle {
        let mut state = self.state();
        state.next_handle += 0x10;
        let handle = 0x2_0000 + state.next_handle;
        state.contents.retain(|(id, _)| *id != format_id);
        state.contents.push((format_id, handle));
        handle
    }

    pub fn hold_by_other_process(&self, contention: Contention) {
        self.state().contention = Some(contention);
    }

    pub fn fail_next_alloc(&self, code: NativeCode) {
        self.state().fail_alloc = Some(code);
    }

    pub fn fail_next_set_data(&self, code: NativeCode) {
        self.state().fail_set_data = Some(code);
    }

    pub fn is_open(&self) -> bool {
        self.state().open
    }

    pub fn open_attempts(&self) -> u32 {
        self.state().open_attempts
    }

    pub fn registrations(&self) -> usize {
        self.state().registered.len()
    }

    /// Blocks allocated by this process and not handed to the clipboard.
    pub fn live_blocks(&self) -> usize {
        self.state().blocks.values().filter(|b| !b.on_clipboard).count()
    }

    pub fn locked_blocks(&self) -> usize {
        self.state().blocks.values().filter(|b| b.locks > 0).count()
    }
}

impl NativeMemory for FakeClipboard {
    fn global_alloc(&self, size: usize) -> Result<RawHandle, NativeCode> {
        let mut state = self.state();
        if let Some(code) = state.fail_alloc.take() {
            return Err(code);
        }
        Ok(state.insert_block(vec![0u8; size].into_boxed_slice(), false))
    }

    fn global_lock(&self, handle: RawHandle) -> Result<*mut u8, NativeCode> {
        let mut state = self.state();
        let block = state.blocks.get_mut(&handle).ok_or(ERROR_INVALID_HANDLE)?;
        // Like a discarded movable block, an empty block cannot be locked.
        if block.data.is_empty() {
            return Err(ERROR_INVALID_HANDLE);
        }
        block.locks += 1;
        Ok(block.data.as_mut_ptr())
    }

    fn global_unlock(&self, handle: RawHandle) -> Result<(), NativeCode> {
        let mut state = self.state();
        let block = state.blocks.get_mut(&handle).ok_or(ERROR_INVALID_HANDLE)?;
        if block.locks == 0 {
            return Err(ERROR_NOT_LOCKED);
        }
        block.locks -= 1;
        Ok(())
    }

    fn global_size(&self, handle: RawHandle) -> Result<usize, NativeCode> {
        self.state()
            .blocks
            .get(&handle)
            .map(|block| block.data.len())
            .ok_or(ERROR_INVALID_HANDLE)
    }

    fn global_free(&self, handle: RawHandle) -> Result<(), NativeCode> {
        let mut state = self.state();
        match state.blocks.get(&handle) {
            Some(block) if !block.on_clipboard => {
                state.blocks.remove(&handle);
                Ok(())
            }
            // Freeing a block the clipboard owns is a double free.
            _ => Err(ERROR_INVALID_HANDLE),
        }
    }
}

impl NativeClipboard for FakeClipboard {
    fn open(&self) -> Result<(), NativeCode> {
        let mut state = self.state();
        state.open_attempts += 1;
        match state.contention {
            Some(Contention::Forever) => return Err(ERROR_ACCESS_DENIED),
            Some(Contention::Attempts(remaining)) if remaining > 0 => {
                state.contention = Some(Contention::Attempts(remaining - 1));
                return Err(ERROR_ACCESS_DENIED);
            }
            _ => state.contention = None,
        }
        if state.open {
            return Err(ERROR_ACCESS_DENIED);
        }
        state.open = true;
        Ok(())
    }

    fn close(&self) -> Result<(), NativeCode> {
        let mut state = self.state();
        state.require_open()?;
        state.open = false;
        Ok(())
    }

    fn empty(&self) -> Result<(), NativeCode> {
        let mut state = self.state();
        state.require_open()?;
        state.drop_contents();
        Ok(())
    }

    fn formats(&self) -> Result<Vec<u32>, NativeCode> {
        let state = self.state();
        state.require_open()?;
        Ok(state.contents.iter().map(|(id, _)| *id).collect())
    }

    fn data(&self, format_id: u32) -> Option<RawHandle> {
        let state = self.state();
        if !state.open {
            return None;
        }
        state
            .contents
            .iter()
            .find(|(id, _)| *id == format_id)
            .map(|(_, handle)| *handle)
    }

    fn set_data(&self, format_id: u32, handle: RawHandle) -> Result<(), NativeCode> {
        let mut state = self.state();
        state.require_open()?;
        if let Some(code) = state.fail_set_data.take() {
            return Err(code);
        }
        match state.blocks.get_mut(&handle) {
            Some(block) if !block.on_clipboard => block.on_clipboard = true,
            _ => return Err(ERROR_INVALID_HANDLE),
        }
        if let Some(pos) = state.contents.iter().position(|(id, _)| *id == format_id) {
            let (_, previous) = state.contents.remove(pos);
            state.blocks.remove(&previous);
        }
        state.contents.push((format_id, handle));
        Ok(())
    }

    fn register_format(&self, name: &str) -> Result<u32, NativeCode> {
        let mut state = self.state();
        let index = match state.registered.iter().position(|n| n.eq_ignore_ascii_case(name)) {
            Some(index) => index,
            None => {
                state.registered.push(name.to_string());
                state.registered.len() - 1
            }
        };
        Ok(0xC000 + index as u32)
    }

    fn format_name(&self, format_id: u32) -> Option<String> {
        let index = format_id.checked_sub(0xC000)? as usize;
        self.state().registered.get(index).cloned()
    }

    fn session_flag(&self) -> &AtomicBool {
        &self.session_open
    }
}

#[derive(Default)]
struct HostState {
    dispatcher: RefCell<Option<Dispatcher>>,
    installs: Cell<u32>,
    uninstalls: Cell<u32>,
    fail_install: Cell<Option<NativeCode>>,
}

/// Hook window double. Clones share state, so a test can keep one clone
/// while the registry owns another.
#[derive(Clone, Default)]
pub struct FakeHookHost {
    state: Rc<HostState>,
}

impl FakeHookHost {
    pub const WINDOW: RawHandle = 0xBEEF;

    pub fn new() -> Self {
        Self::default()
    }

    /// Native callbacks currently installed: 0 or 1.
    pub fn installed_callbacks(&self) -> usize {
        usize::from(self.state.dispatcher.borrow().is_some())
    }

    pub fn install_count(&self) -> u32 {
        self.state.installs.get()
    }

    pub fn uninstall_count(&self) -> u32 {
        self.state.uninstalls.get()
    }

    pub fn fail_next_install(&self, code: NativeCode) {
        self.state.fail_install.set(Some(code));
    }

    /// Deliver a message the way the window procedure would.
    pub fn send(&self, message: &WindowMessage) -> Option<isize> {
        let dispatcher = self.state.dispatcher.borrow().clone();
        dispatcher.and_then(|dispatch| dispatch(message))
    }

    /// Deliver a parameterless message.
    pub fn post(&self, msg: u32) -> Option<isize> {
        // SAFETY: no pointer parameters.
        let message = unsafe { WindowMessage::from_native(Self::WINDOW, msg, 0, 0) };
        self.send(&message)
    }
}

impl NativeHookHost for FakeHookHost {
    fn install(&self, dispatcher: Dispatcher) -> PlatformResult<()> {
        if let Some(code) = self.state.fail_install.take() {
            return Err(PlatformError::ResourceUnavailable {
                operation: "CreateWindowEx",
                code,
            });
        }
        let mut slot = self.state.dispatcher.borrow_mut();
        assert!(slot.is_none(), "native callback installed twice");
        *slot = Some(dispatcher);
        self.state.installs.set(self.state.installs.get() + 1);
        Ok(())
    }

    fn uninstall(&self) {
        if self.state.dispatcher.borrow_mut().take().is_some() {
            self.state.uninstalls.set(self.state.uninstalls.get() + 1);
        }
    }

    fn window_handle(&self) -> RawHandle {
        if self.state.dispatcher.borrow().is_some() {
            Self::WINDOW
        } else {
            0
        }
    }
}
