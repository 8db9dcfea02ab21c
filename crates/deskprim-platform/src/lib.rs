//! deskprim-platform: Win32 backends for deskprim-core.
//!
//! This crate provides:
//! - The system clipboard and global memory behind `ClipboardManager`
//! - A hidden top-level hook window and the thread's message loop
//! - Clipboard format listener registration for the clipboard monitor
//! - Window enumeration, DPI awareness and icon extraction
//! - Process-wide service handles (`services`)
//!
//! ## Module Structure
//!
//! Each functional area is a submodule with a `windows.rs` implementation
//! and an inert fallback for other targets:
//!
//! - `clipboard` - Win32 clipboard and global memory
//! - `hook_window` - Hook window host and message loop
//! - `window` - Window enumeration
//! - `dpi` - DPI awareness
//! - `icon` - Icon extraction

mod clipboard;
mod dpi;
mod error;
mod hook_window;
mod icon;
pub mod services;
mod window;
#[cfg_attr(not(windows), allow(dead_code))]
mod wide;

pub use error::{NativeCode, PlatformError, PlatformResult};

pub use clipboard::{ClipboardListener, SystemClipboard};
#[cfg(windows)]
pub use clipboard::Win32Clipboard;

pub use hook_window::{run_message_loop, MessageLoopHandle, SystemHookHost};
#[cfg(windows)]
pub use hook_window::Win32HookHost;

pub use dpi::{dpi_for_window, set_dpi_aware, system_dpi, system_scale_factor};
pub use icon::{extract_icon, icon_count, IconGuard, IconSize};
pub use window::{find_window_by_title, foreground_window, list_windows, window_rect, WindowInfo};
