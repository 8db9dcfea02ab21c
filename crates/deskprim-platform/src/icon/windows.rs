//! Icon extraction using the shell.

use super::{IconGuard, IconSize};
use deskprim_core::{HandleGuard, HandleKind, RawHandle};
use std::path::Path;
use std::ptr;
use tracing::debug;
use windows_sys::Win32::UI::Shell::ExtractIconExW;
use windows_sys::Win32::UI::WindowsAndMessaging::{DestroyIcon, HICON};

use crate::error::{last_error, PlatformResult};
use crate::wide::to_wide;

fn wide_path(path: &Path) -> Vec<u16> {
    to_wide(&path.to_string_lossy())
}

pub fn icon_count(path: &Path) -> u32 {
    let file = wide_path(path);
    // SAFETY: index -1 with null outputs only counts.
    unsafe { ExtractIconExW(file.as_ptr(), -1, ptr::null_mut(), ptr::null_mut(), 0) }
}

pub fn extract_icon(path: &Path, index: u32, size: IconSize) -> PlatformResult<Option<IconGuard>> {
    if index >= icon_count(path) {
        return Ok(None);
    }
    let file = wide_path(path);
    let icon = HandleGuard::acquire(
        HandleKind::Icon,
        || {
            let mut icon: HICON = ptr::null_mut();
            let (large, small) = match size {
                IconSize::Large => (&mut icon as *mut HICON, ptr::null_mut()),
                IconSize::Small => (ptr::null_mut(), &mut icon as *mut HICON),
            };
            // SAFETY: exactly one output slot is requested and provided.
            let extracted = unsafe { ExtractIconExW(file.as_ptr(), index as i32, large, small, 1) };
            if extracted == 0 || icon.is_null() {
                Err(last_error())
            } else {
                Ok(icon as RawHandle)
            }
        },
        |handle| {
            // SAFETY: the guard owns the icon.
            if unsafe { DestroyIcon(handle as HICON) } != 0 {
                Ok(())
            } else {
                Err(last_error())
            }
        },
    )?;
    debug!(path = %path.display(), index, ?size, "Icon extracted");
    Ok(Some(icon))
}
