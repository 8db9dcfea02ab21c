//! Clipboard format names and their numeric ids.
//!
//! Standard formats have fixed ids. Any other name is registered with the
//! native clipboard on first use and cached for the life of the registry.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;
use tracing::debug;

use crate::error::{PlatformError, PlatformResult};
use crate::native::NativeClipboard;

/// The clipboard formats defined by the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u32)]
pub enum StandardFormat {
    Text = 1,
    Bitmap = 2,
    MetafilePict = 3,
    Sylk = 4,
    Dif = 5,
    Tiff = 6,
    OemText = 7,
    Dib = 8,
    Palette = 9,
    PenData = 10,
    Riff = 11,
    Wave = 12,
    UnicodeText = 13,
    EnhMetafile = 14,
    HDrop = 15,
    Locale = 16,
    DibV5 = 17,
    OwnerDisplay = 0x0080,
    DspText = 0x0081,
    DspBitmap = 0x0082,
    DspMetafilePict = 0x0083,
    DspEnhMetafile = 0x008E,
}

impl StandardFormat {
    pub const ALL: [StandardFormat; 22] = [
        StandardFormat::Text,
        StandardFormat::Bitmap,
        StandardFormat::MetafilePict,
        StandardFormat::Sylk,
        StandardFormat::Dif,
        StandardFormat::Tiff,
        StandardFormat::OemText,
        StandardFormat::Dib,
        StandardFormat::Palette,
        StandardFormat::PenData,
        StandardFormat::Riff,
        StandardFormat::Wave,
        StandardFormat::UnicodeText,
        StandardFormat::EnhMetafile,
        StandardFormat::HDrop,
        StandardFormat::Locale,
        StandardFormat::DibV5,
        StandardFormat::OwnerDisplay,
        StandardFormat::DspText,
        StandardFormat::DspBitmap,
        StandardFormat::DspMetafilePict,
        StandardFormat::DspEnhMetafile,
    ];

    pub fn id(self) -> u32 {
        self as u32
    }

    /// The Win32 constant name, e.g. `CF_UNICODETEXT`.
    pub fn name(self) -> &'static str {
        match self {
            StandardFormat::Text => "CF_TEXT",
            StandardFormat::Bitmap => "CF_BITMAP",
            StandardFormat::MetafilePict => "CF_METAFILEPICT",
            StandardFormat::Sylk => "CF_SYLK",
            StandardFormat::Dif => "CF_DIF",
            StandardFormat::Tiff => "CF_TIFF",
            StandardFormat::OemText => "CF_OEMTEXT",
            StandardFormat::Dib => "CF_DIB",
            StandardFormat::Palette => "CF_PALETTE",
            StandardFormat::PenData => "CF_PENDATA",
            StandardFormat::Riff => "CF_RIFF",
            StandardFormat::Wave => "CF_WAVE",
            StandardFormat::UnicodeText => "CF_UNICODETEXT",
            StandardFormat::EnhMetafile => "CF_ENHMETAFILE",
            StandardFormat::HDrop => "CF_HDROP",
            StandardFormat::Locale => "CF_LOCALE",
            StandardFormat::DibV5 => "CF_DIBV5",
            StandardFormat::OwnerDisplay => "CF_OWNERDISPLAY",
            StandardFormat::DspText => "CF_DSPTEXT",
            StandardFormat::DspBitmap => "CF_DSPBITMAP",
            StandardFormat::DspMetafilePict => "CF_DSPMETAFILEPICT",
            StandardFormat::DspEnhMetafile => "CF_DSPENHMETAFILE",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.name() == name)
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.id() == id)
    }
}

impl fmt::Display for StandardFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Private formats (`CF_PRIVATEFIRST..=CF_PRIVATELAST`); their handles are
/// not freed by the system.
pub fn is_private_format(id: u32) -> bool {
    (0x0200..=0x02FF).contains(&id)
}

/// Application-defined GDI object formats (`CF_GDIOBJFIRST..=CF_GDIOBJLAST`).
pub fn is_gdi_object_format(id: u32) -> bool {
    (0x0300..=0x03FF).contains(&id)
}

/// Formats whose clipboard handle is a GDI object rather than global
/// memory, so their payload cannot be copied out as bytes.
pub fn holds_gdi_handle(id: u32) -> bool {
    matches!(
        StandardFormat::from_id(id),
        Some(
            StandardFormat::Bitmap
                | StandardFormat::Palette
                | StandardFormat::EnhMetafile
                | StandardFormat::DspBitmap
                | StandardFormat::DspEnhMetafile
        )
    ) || is_gdi_object_format(id)
}

/// A format name paired with the id the OS knows it by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FormatDescriptor {
    pub name: String,
    pub id: u32,
}

impl FormatDescriptor {
    pub fn standard(&self) -> Option<StandardFormat> {
        StandardFormat::from_id(self.id)
    }
}

impl From<StandardFormat> for FormatDescriptor {
    fn from(format: StandardFormat) -> Self {
        Self {
            name: format.name().to_string(),
            id: format.id(),
        }
    }
}

#[derive(Default)]
struct FormatTable {
    by_name: HashMap<String, u32>,
    by_id: HashMap<u32, String>,
}

/// Lazily populated name ↔ id cache for registered formats.
#[derive(Default)]
pub struct FormatRegistry {
    table: RwLock<FormatTable>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Numeric id for `name`, registering it with `native` on first use.
    pub fn resolve<C: NativeClipboard + ?Sized>(&self, native: &C, name: &str) -> PlatformResult<u32> {
        if let Some(format) = StandardFormat::from_name(name) {
            return Ok(format.id());
        }
        if let Some(id) = self.cached_id(name) {
            return Ok(id);
        }

        let mut table = self.table.write().unwrap_or_else(|e| e.into_inner());
        // Another thread may have registered it while we waited.
        if let Some(id) = table.by_name.get(name) {
            return Ok(*id);
        }
        let id = native
            .register_format(name)
            .map_err(|code| PlatformError::ResourceUnavailable {
                operation: "RegisterClipboardFormat",
                code,
            })?;
        debug!(name, id, "Registered clipboard format");
        table.by_name.insert(name.to_string(), id);
        table.by_id.insert(id, name.to_string());
        Ok(id)
    }

    /// Id for `name` if it is standard, cached, or among `available` (the
    /// ids on the open clipboard). Never registers anything, so looking up
    /// a name nobody uses leaves no atom behind.
    pub fn lookup<C: NativeClipboard + ?Sized>(&self, native: &C, name: &str, available: &[u32]) -> Option<u32> {
        if let Some(format) = StandardFormat::from_name(name) {
            return Some(format.id());
        }
        if let Some(id) = self.cached_id(name) {
            return Some(id);
        }
        available
            .iter()
            .copied()
            .filter(|id| StandardFormat::from_id(*id).is_none())
            .find(|id| self.describe(native, *id).name.eq_ignore_ascii_case(name))
    }

    /// Descriptor for an id found on the clipboard.
    pub fn describe<C: NativeClipboard + ?Sized>(&self, native: &C, id: u32) -> FormatDescriptor {
        if let Some(format) = StandardFormat::from_id(id) {
            return format.into();
        }
        if let Some(name) = self.cached_name(id) {
            return FormatDescriptor { name, id };
        }
        match native.format_name(id) {
            Some(name) => {
                let mut table = self.table.write().unwrap_or_else(|e| e.into_inner());
                table.by_name.insert(name.clone(), id);
                table.by_id.insert(id, name.clone());
                FormatDescriptor { name, id }
            }
            None => FormatDescriptor {
                name: format!("0x{id:04X}"),
                id,
            },
        }
    }

    pub fn cached_id(&self, name: &str) -> Option<u32> {
        let table = self.table.read().unwrap_or_else(|e| e.into_inner());
        table.by_name.get(name).copied()
    }

    fn cached_name(&self, id: u32) -> Option<String> {
        let table = self.table.read().unwrap_or_else(|e| e.into_inner());
        table.by_id.get(&id).cloned()
    }

    /// Number of registered (non-standard) formats cached.
    pub fn len(&self) -> usize {
        let table = self.table.read().unwrap_or_else(|e| e.into_inner());
        table.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeClipboard;

    #[test]
    fn test_standard_lookup() {
        assert_eq!(StandardFormat::from_name("CF_UNICODETEXT"), Some(StandardFormat::UnicodeText));
        assert_eq!(StandardFormat::from_id(15), Some(StandardFormat::HDrop));
        assert_eq!(StandardFormat::DspEnhMetafile.id(), 0x8E);
        assert_eq!(StandardFormat::from_name("cf_text"), None);
    }

    #[test]
    fn test_standard_names_bypass_registration() {
        let clipboard = FakeClipboard::new();
        let registry = FormatRegistry::new();
        assert_eq!(registry.resolve(&clipboard, "CF_TEXT").unwrap(), 1);
        assert!(registry.is_empty());
        assert_eq!(clipboard.registrations(), 0);
    }

    #[test]
    fn test_custom_names_registered_once() {
        let clipboard = FakeClipboard::new();
        let registry = FormatRegistry::new();
        let first = registry.resolve(&clipboard, "HTML Format").unwrap();
        let second = registry.resolve(&clipboard, "HTML Format").unwrap();
        assert_eq!(first, second);
        assert!(first >= 0xC000);
        assert_eq!(clipboard.registrations(), 1);
        assert_eq!(registry.describe(&clipboard, first).name, "HTML Format");
    }

    #[test]
    fn test_describe_unknown_id() {
        let clipboard = FakeClipboard::new();
        let registry = FormatRegistry::new();
        assert_eq!(registry.describe(&clipboard, 0x0250).name, "0x0250");
        assert_eq!(registry.describe(&clipboard, 13).name, "CF_UNICODETEXT");
        assert!(is_private_format(0x0250));
        assert!(is_gdi_object_format(0x0300));
    }

    #[test]
    fn test_lookup_never_registers() {
        let clipboard = FakeClipboard::new();
        let registry = FormatRegistry::new();
        assert_eq!(registry.lookup(&clipboard, "text", &[]), None);
        assert_eq!(registry.lookup(&clipboard, "CF_DIB", &[]), Some(8));
        assert_eq!(clipboard.registrations(), 0);

        let html = clipboard.register_format("HTML Format").unwrap();
        assert_eq!(registry.lookup(&clipboard, "html format", &[13, html]), Some(html));
        assert_eq!(registry.cached_id("HTML Format"), Some(html));
        assert_eq!(clipboard.registrations(), 1);
    }

    #[test]
    fn test_gdi_handle_formats() {
        assert!(holds_gdi_handle(StandardFormat::Bitmap.id()));
        assert!(holds_gdi_handle(StandardFormat::EnhMetafile.id()));
        assert!(holds_gdi_handle(0x0310));
        assert!(!holds_gdi_handle(StandardFormat::Dib.id()));
        assert!(!holds_gdi_handle(StandardFormat::MetafilePict.id()));
    }
}
