//! Window message identities and the message record handed to hooks.

use serde::Serialize;

use crate::geometry::NativeRect;
use crate::native::RawHandle;

/// Window messages the monitors understand.
///
/// Values are the stable Win32 message ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u32)]
pub enum WindowsMessage {
    Create = 0x0001,
    Destroy = 0x0002,
    Close = 0x0010,
    Quit = 0x0012,
    /// `WM_SETTINGCHANGE` (alias `WM_WININICHANGE`).
    SettingChange = 0x001A,
    DisplayChange = 0x007E,
    PowerBroadcast = 0x0218,
    DeviceChange = 0x0219,
    DpiChanged = 0x02E0,
    DrawClipboard = 0x0308,
    ChangeClipboardChain = 0x030D,
    ThemeChanged = 0x031A,
    ClipboardUpdate = 0x031D,
    DwmCompositionChanged = 0x031E,
    User = 0x0400,
}

impl WindowsMessage {
    const ALL: [WindowsMessage; 15] = [
        WindowsMessage::Create,
        WindowsMessage::Destroy,
        WindowsMessage::Close,
        WindowsMessage::Quit,
        WindowsMessage::SettingChange,
        WindowsMessage::DisplayChange,
        WindowsMessage::PowerBroadcast,
        WindowsMessage::DeviceChange,
        WindowsMessage::DpiChanged,
        WindowsMessage::DrawClipboard,
        WindowsMessage::ChangeClipboardChain,
        WindowsMessage::ThemeChanged,
        WindowsMessage::ClipboardUpdate,
        WindowsMessage::DwmCompositionChanged,
        WindowsMessage::User,
    ];

    pub fn raw(self) -> u32 {
        self as u32
    }

    pub fn from_raw(msg: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.raw() == msg)
    }
}

/// One message as delivered to the native window procedure.
///
/// `wparam`/`lparam` may carry pointers whose meaning depends on `msg`, so
/// records can only be built through the unsafe [`WindowMessage::from_native`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowMessage {
    hwnd: RawHandle,
    msg: u32,
    wparam: usize,
    lparam: isize,
}

impl WindowMessage {
    /// # Safety
    ///
    /// For messages whose parameters carry pointers (`WM_SETTINGCHANGE`,
    /// `WM_DPICHANGED`), those pointers must be null or valid for reads as
    /// the OS documents them, for as long as the record is dispatched.
    pub unsafe fn from_native(hwnd: RawHandle, msg: u32, wparam: usize, lparam: isize) -> Self {
        Self {
            hwnd,
            msg,
            wparam,
            lparam,
        }
    }

    pub fn hwnd(&self) -> RawHandle {
        self.hwnd
    }

    pub fn msg(&self) -> u32 {
        self.msg
    }

    pub fn wparam(&self) -> usize {
        self.wparam
    }

    pub fn lparam(&self) -> isize {
        self.lparam
    }

    pub fn kind(&self) -> Option<WindowsMessage> {
        WindowsMessage::from_raw(self.msg)
    }

    pub fn is(&self, message: WindowsMessage) -> bool {
        self.msg == message.raw()
    }

    pub fn wparam_low(&self) -> u16 {
        (self.wparam & 0xFFFF) as u16
    }

    pub fn wparam_high(&self) -> u16 {
        ((self.wparam >> 16) & 0xFFFF) as u16
    }

    pub fn lparam_low(&self) -> u16 {
        (self.lparam as usize & 0xFFFF) as u16
    }

    pub fn lparam_high(&self) -> u16 {
        ((self.lparam as usize >> 16) & 0xFFFF) as u16
    }

    /// `lparam` read as a NUL-terminated UTF-16 string.
    pub(crate) fn lparam_wide_str(&self) -> Option<String> {
        if self.lparam == 0 {
            return None;
        }
        let ptr = self.lparam as *const u16;
        // SAFETY: guaranteed by the `from_native` contract for the message
        // kinds that call this.
        unsafe {
            let mut len = 0usize;
            while *ptr.add(len) != 0 {
                len += 1;
            }
            Some(String::from_utf16_lossy(std::slice::from_raw_parts(ptr, len)))
        }
    }

    /// `lparam` read as a pointer to a `RECT`.
    pub(crate) fn lparam_rect(&self) -> Option<NativeRect> {
        if self.lparam == 0 {
            return None;
        }
        // SAFETY: see `lparam_wide_str`; `NativeRect` is `repr(C)` like `RECT`.
        unsafe { Some(*(self.lparam as *const NativeRect)) }
    }
}
