//! Typed change events and the monitors that publish them.
//!
//! Each monitor is a [`ChangeBroadcaster`] with a decoder for one window
//! message. Create them against the registry of the thread that runs the
//! message loop.

use serde::Serialize;

use crate::broadcast::{BroadcastLifecycle, ChangeBroadcaster, Subscription};
use crate::dpi;
use crate::error::PlatformResult;
use crate::geometry::NativeRect;
use crate::hook::MessageHookRegistry;
use crate::messages::{WindowMessage, WindowsMessage};
use crate::native::RawHandle;

/// A system-wide setting changed (`WM_SETTINGCHANGE`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentChange {
    /// `SystemParametersInfo` action, 0 for policy or environment changes.
    pub action: u32,
    /// Section that changed, e.g. `"Environment"` or `"ImmersiveColorSet"`.
    pub area: Option<String>,
}

impl EnvironmentChange {
    pub fn matches_area(&self, area: &str) -> bool {
        self.area
            .as_deref()
            .is_some_and(|own| own.eq_ignore_ascii_case(area))
    }

    fn decode(message: &WindowMessage) -> Option<Self> {
        if !message.is(WindowsMessage::SettingChange) {
            return None;
        }
        Some(Self {
            action: message.wparam() as u32,
            area: message.lparam_wide_str(),
        })
    }
}

/// The clipboard contents changed (`WM_CLIPBOARDUPDATE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClipboardUpdate {
    /// Listener window that was notified.
    pub window: RawHandle,
}

impl ClipboardUpdate {
    fn decode(message: &WindowMessage) -> Option<Self> {
        message
            .is(WindowsMessage::ClipboardUpdate)
            .then(|| Self { window: message.hwnd() })
    }
}

/// The window's effective DPI changed (`WM_DPICHANGED`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DpiChange {
    pub dpi_x: u32,
    pub dpi_y: u32,
    /// Position and size the system suggests for the new DPI.
    pub suggested: Option<NativeRect>,
}

impl DpiChange {
    pub fn scale_factor(&self) -> f64 {
        dpi::scale_factor(self.dpi_y)
    }

    fn decode(message: &WindowMessage) -> Option<Self> {
        if !message.is(WindowsMessage::DpiChanged) {
            return None;
        }
        Some(Self {
            dpi_x: u32::from(message.wparam_low()),
            dpi_y: u32::from(message.wparam_high()),
            suggested: message.lparam_rect(),
        })
    }
}

/// The display resolution changed (`WM_DISPLAYCHANGE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DisplayChange {
    pub bits_per_pixel: u32,
    pub width: u32,
    pub height: u32,
}

impl DisplayChange {
    fn decode(message: &WindowMessage) -> Option<Self> {
        message.is(WindowsMessage::DisplayChange).then(|| Self {
            bits_per_pixel: message.wparam() as u32,
            width: u32::from(message.lparam_low()),
            height: u32::from(message.lparam_high()),
        })
    }
}

pub type EnvironmentMonitor = ChangeBroadcaster<EnvironmentChange>;
pub type ClipboardMonitor = ChangeBroadcaster<ClipboardUpdate>;
pub type DpiMonitor = ChangeBroadcaster<DpiChange>;
pub type DisplayMonitor = ChangeBroadcaster<DisplayChange>;

pub fn environment_monitor(registry: &MessageHookRegistry) -> EnvironmentMonitor {
    ChangeBroadcaster::new("environment", registry, EnvironmentChange::decode)
}

/// `lifecycle` registers the hook window as a clipboard format listener;
/// without it the window never receives `WM_CLIPBOARDUPDATE`.
pub fn clipboard_monitor(registry: &MessageHookRegistry, lifecycle: impl BroadcastLifecycle + 'static) -> ClipboardMonitor {
    ChangeBroadcaster::with_lifecycle("clipboard", registry, ClipboardUpdate::decode, lifecycle)
}

pub fn dpi_monitor(registry: &MessageHookRegistry) -> DpiMonitor {
    ChangeBroadcaster::new("dpi", registry, DpiChange::decode)
}

pub fn display_monitor(registry: &MessageHookRegistry) -> DisplayMonitor {
    ChangeBroadcaster::new("display", registry, DisplayChange::decode)
}

impl ChangeBroadcaster<EnvironmentChange> {
    /// Subscribe to changes of one settings area only, compared
    /// case-insensitively.
    pub fn subscribe_area<F>(&self, area: &str, listener: F) -> PlatformResult<Subscription>
    where
        F: Fn(&EnvironmentChange) + 'static,
    {
        let area = area.to_string();
        self.subscribe_filtered(move |change| change.matches_area(&area), listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHookHost;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn wide(s: &str) -> Vec<u16> {
        s.encode_utf16().chain(std::iter::once(0)).collect()
    }

    fn setting_change(action: usize, area: Option<&[u16]>) -> WindowMessage {
        let lparam = area.map_or(0, |a| a.as_ptr() as isize);
        unsafe { WindowMessage::from_native(FakeHookHost::WINDOW, WindowsMessage::SettingChange.raw(), action, lparam) }
    }

    #[test]
    fn test_environment_area_filter() {
        let host = FakeHookHost::new();
        let registry = MessageHookRegistry::new(host.clone());
        let monitor = environment_monitor(&registry);

        let all = Rc::new(RefCell::new(Vec::new()));
        let env_only = Rc::new(RefCell::new(Vec::new()));
        let all_sink = all.clone();
        let env_sink = env_only.clone();
        let _a = monitor.subscribe(move |c| all_sink.borrow_mut().push(c.clone())).unwrap();
        let _b = monitor
            .subscribe_area("environment", move |c| env_sink.borrow_mut().push(c.clone()))
            .unwrap();
        assert_eq!(registry.hook_count(), 1);

        let env = wide("Environment");
        let color = wide("ImmersiveColorSet");
        host.send(&setting_change(0, Some(&env)));
        host.send(&setting_change(0, Some(&color)));
        host.send(&setting_change(0x2F, None));

        assert_eq!(all.borrow().len(), 3);
        assert_eq!(
            *env_only.borrow(),
            vec![EnvironmentChange {
                action: 0,
                area: Some("Environment".into())
            }]
        );
        assert_eq!(all.borrow()[2].action, 0x2F);
        assert_eq!(all.borrow()[2].area, None);
    }

    #[test]
    fn test_dpi_change_decoding() {
        let rect = NativeRect::new(10, 20, 310, 420);
        let message = unsafe {
            WindowMessage::from_native(
                FakeHookHost::WINDOW,
                WindowsMessage::DpiChanged.raw(),
                (144 << 16) | 144,
                &rect as *const NativeRect as isize,
            )
        };
        let change = DpiChange::decode(&message).unwrap();
        assert_eq!(change.dpi_x, 144);
        assert_eq!(change.dpi_y, 144);
        assert_eq!(change.suggested, Some(rect));
        assert_eq!(change.scale_factor(), 1.5);
    }

    #[test]
    fn test_display_change_decoding() {
        let message = unsafe {
            WindowMessage::from_native(
                FakeHookHost::WINDOW,
                WindowsMessage::DisplayChange.raw(),
                32,
                (1080 << 16) | 1920,
            )
        };
        assert_eq!(
            DisplayChange::decode(&message),
            Some(DisplayChange {
                bits_per_pixel: 32,
                width: 1920,
                height: 1080
            })
        );
        assert_eq!(ClipboardUpdate::decode(&message), None);
    }

    #[test]
    fn test_monitors_share_one_native_callback() {
        struct NoListener;
        impl BroadcastLifecycle for NoListener {
            fn attach(&self, _: &MessageHookRegistry) -> PlatformResult<()> {
                Ok(())
            }
            fn detach(&self, _: &MessageHookRegistry) {}
        }

        let host = FakeHookHost::new();
        let registry = MessageHookRegistry::new(host.clone());
        let clipboard = clipboard_monitor(&registry, NoListener);
        let display = display_monitor(&registry);
        let dpi = dpi_monitor(&registry);

        let updates = Rc::new(RefCell::new(Vec::new()));
        let sink = updates.clone();
        let _c = clipboard.subscribe(move |u| sink.borrow_mut().push(*u)).unwrap();
        let _d = display.subscribe(|_| {}).unwrap();
        let _p = dpi.subscribe(|_| {}).unwrap();
        assert_eq!(registry.hook_count(), 3);
        assert_eq!(host.installed_callbacks(), 1);

        host.post(WindowsMessage::ClipboardUpdate.raw());
        assert_eq!(*updates.borrow(), vec![ClipboardUpdate { window: FakeHookHost::WINDOW }]);
    }
}
