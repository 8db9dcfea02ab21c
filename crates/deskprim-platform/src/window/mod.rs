//! Top-level window enumeration.
//!
//! Platform implementations:
//! - Windows: Uses Win32 API (`windows.rs`)
//! - Elsewhere: no windows are reported

use deskprim_core::{NativeRect, RawHandle};
use serde::Serialize;

#[cfg(windows)]
mod windows;

/// Information about a top-level window.
#[derive(Debug, Clone, Serialize)]
pub struct WindowInfo {
    pub handle: RawHandle,
    pub title: String,
    /// Window class name, e.g. "Notepad".
    pub class_name: String,
    pub pid: u32,
    /// Process name (e.g., "notepad.exe").
    pub process_name: String,
    /// Window rectangle in screen coordinates.
    pub rect: NativeRect,
    pub visible: bool,
}

impl WindowInfo {
    /// Case-insensitive substring match on title, class or process name.
    pub fn matches(&self, text: &str) -> bool {
        let needle = text.to_lowercase();
        [&self.title, &self.class_name, &self.process_name]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

/// Get the currently focused foreground window.
pub fn foreground_window() -> Option<WindowInfo> {
    #[cfg(windows)]
    {
        windows::foreground_window()
    }
    #[cfg(not(windows))]
    {
        None
    }
}

/// List visible windows that have a title, in Z order.
pub fn list_windows() -> Vec<WindowInfo> {
    #[cfg(windows)]
    {
        windows::list_windows()
    }
    #[cfg(not(windows))]
    {
        Vec::new()
    }
}

/// Find a window by its title (partial match, case-insensitive).
pub fn find_window_by_title(title: &str) -> Option<WindowInfo> {
    let title_lower = title.to_lowercase();
    list_windows()
        .into_iter()
        .find(|w| w.title.to_lowercase().contains(&title_lower))
}

/// Get the rectangle of a window by handle.
pub fn window_rect(handle: RawHandle) -> Option<NativeRect> {
    #[cfg(windows)]
    {
        windows::window_rect(handle)
    }
    #[cfg(not(windows))]
    {
        let _ = handle;
        None
    }
}
