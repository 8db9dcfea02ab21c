//! Icons extracted from executables, DLLs and .ico files.
//!
//! Platform implementations:
//! - Windows: `ExtractIconExW` (`windows.rs`)
//! - Elsewhere: no icons

use deskprim_core::HandleGuard;
use std::path::Path;

use crate::error::PlatformResult;

#[cfg(windows)]
mod windows;

/// An icon handle, destroyed when the guard goes away.
pub type IconGuard = HandleGuard<'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IconSize {
    /// `SM_CXICON`, usually 32x32.
    #[default]
    Large,
    /// `SM_CXSMICON`, usually 16x16.
    Small,
}

/// Number of icons in `path`, 0 if it has none or cannot be read.
pub fn icon_count(path: &Path) -> u32 {
    #[cfg(windows)]
    {
        windows::icon_count(path)
    }
    #[cfg(not(windows))]
    {
        let _ = path;
        0
    }
}

/// The icon at `index`, or `None` if `path` has no icon there.
pub fn extract_icon(path: &Path, index: u32, size: IconSize) -> PlatformResult<Option<IconGuard>> {
    #[cfg(windows)]
    {
        windows::extract_icon(path, index, size)
    }
    #[cfg(not(windows))]
    {
        let _ = (path, index, size);
        Err(crate::error::PlatformError::NotImplemented)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_has_no_icons() {
        let dir = std::env::temp_dir().join("deskprim-no-such-file.exe");
        assert_eq!(icon_count(&dir), 0);
    }

    #[cfg(windows)]
    #[test]
    fn test_shell32_icon_is_guarded() {
        use deskprim_core::HandleKind;

        let shell32 = std::path::PathBuf::from(std::env::var("SystemRoot").unwrap())
            .join("System32")
            .join("shell32.dll");
        assert!(icon_count(&shell32) > 0);
        let mut icon = extract_icon(&shell32, 0, IconSize::Small).unwrap().unwrap();
        assert_eq!(icon.kind(), HandleKind::Icon);
        icon.release();
        assert!(!icon.is_armed());
    }

    #[cfg(not(windows))]
    #[test]
    fn test_extract_not_implemented() {
        let err = extract_icon(Path::new("app.exe"), 0, IconSize::Large).unwrap_err();
        assert_eq!(err.kind(), deskprim_core::ErrorKind::NotImplemented);
    }
}
