//! Process DPI awareness and per-window DPI queries.
//!
//! Platform implementations:
//! - Windows: Per-Monitor V2 awareness (`windows.rs`)
//! - Elsewhere: everything reports the 96 DPI baseline

#[cfg(windows)]
mod windows;

#[cfg(windows)]
pub use windows::{dpi_for_window, set_dpi_aware, system_dpi};

#[cfg(not(windows))]
pub use fallback::{dpi_for_window, set_dpi_aware, system_dpi};

#[cfg(not(windows))]
mod fallback {
    use deskprim_core::dpi::DEFAULT_DPI;
    use deskprim_core::RawHandle;

    /// Set DPI awareness (no-op on unsupported platforms).
    pub fn set_dpi_aware() {}

    pub fn dpi_for_window(_handle: RawHandle) -> u32 {
        DEFAULT_DPI
    }

    pub fn system_dpi() -> u32 {
        DEFAULT_DPI
    }
}

/// Scale factor of the system DPI relative to 96.
pub fn system_scale_factor() -> f64 {
    deskprim_core::dpi::scale_factor(system_dpi())
}
