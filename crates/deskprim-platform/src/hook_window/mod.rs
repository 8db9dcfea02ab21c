//! The hidden window that receives broadcast messages, and the loop that
//! pumps them.
//!
//! Platform implementations:
//! - Windows: hidden top-level window and `GetMessageW` loop (`windows.rs`)
//! - Elsewhere: a host that cannot be installed and a loop that returns
//!   `NotImplemented`

#[cfg(windows)]
mod windows;

#[cfg(windows)]
pub use windows::{current_thread_id, run_message_loop, Win32HookHost};

#[cfg(windows)]
pub type SystemHookHost = Win32HookHost;

#[cfg(not(windows))]
pub type SystemHookHost = fallback::UnsupportedHookHost;

#[cfg(not(windows))]
pub use fallback::{current_thread_id, run_message_loop, UnsupportedHookHost};

/// Stops a message loop from any thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageLoopHandle {
    thread_id: u32,
}

impl MessageLoopHandle {
    /// Handle to the loop that will run (or runs) on the calling thread.
    pub fn current() -> Self {
        Self {
            thread_id: current_thread_id(),
        }
    }

    pub fn thread_id(&self) -> u32 {
        self.thread_id
    }

    /// Ask the loop to exit after the messages already queued.
    pub fn quit(&self) {
        #[cfg(windows)]
        windows::post_quit(self.thread_id);
    }
}

#[cfg(not(windows))]
mod fallback {
    use deskprim_core::native::{Dispatcher, NativeHookHost, RawHandle};

    use crate::error::{PlatformError, PlatformResult};

    /// Hook host for targets without a window system backend.
    #[derive(Debug, Default)]
    pub struct UnsupportedHookHost;

    impl UnsupportedHookHost {
        pub fn new(_class_name: &str) -> Self {
            Self
        }
    }

    impl NativeHookHost for UnsupportedHookHost {
        fn install(&self, _dispatcher: Dispatcher) -> PlatformResult<()> {
            Err(PlatformError::NotImplemented)
        }

        fn uninstall(&self) {}

        fn window_handle(&self) -> RawHandle {
            0
        }
    }

    pub fn current_thread_id() -> u32 {
        0
    }

    pub fn run_message_loop() -> PlatformResult<()> {
        Err(PlatformError::NotImplemented)
    }
}
