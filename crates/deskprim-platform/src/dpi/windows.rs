//! Windows DPI awareness implementation.

use deskprim_core::dpi::DEFAULT_DPI;
use deskprim_core::RawHandle;
use std::sync::Once;
use tracing::{info, warn};
use windows_sys::Win32::Foundation::HWND;
use windows_sys::Win32::UI::HiDpi::{
    GetDpiForSystem, GetDpiForWindow, SetProcessDpiAwarenessContext,
    DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2,
};

use crate::error::last_error;

static INIT: Once = Once::new();

/// Set the process DPI awareness to Per-Monitor V2, so `WM_DPICHANGED`
/// arrives and coordinates are physical.
///
/// Must be called before any window is created.
pub fn set_dpi_aware() {
    INIT.call_once(|| {
        // SAFETY: no pointer arguments.
        let result = unsafe { SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2) };
        if result != 0 {
            info!("Set Per-Monitor V2 DPI awareness");
        } else {
            warn!(code = last_error(), "Failed to set Per-Monitor V2 DPI awareness");
        }
    });
}

/// DPI of the monitor a window is on; the baseline for an invalid window.
pub fn dpi_for_window(handle: RawHandle) -> u32 {
    // SAFETY: an invalid handle yields 0.
    match unsafe { GetDpiForWindow(handle as HWND) } {
        0 => DEFAULT_DPI,
        dpi => dpi,
    }
}

pub fn system_dpi() -> u32 {
    // SAFETY: no arguments.
    unsafe { GetDpiForSystem() }
}
