//! Process-wide service handles.
//!
//! The clipboard manager is shared by the whole process and built on first
//! use from the user settings. Hook registries and monitors are bound to the
//! thread that pumps messages, so each thread gets its own on first use.
//! Code that needs a fake native layer constructs the core types directly
//! instead of going through these handles.

use deskprim_core::{
    clipboard_monitor, display_monitor, dpi_monitor, environment_monitor, load_settings_or_default,
    ClipboardManager, ClipboardMonitor, DisplayMonitor, DpiMonitor, EnvironmentMonitor,
    MessageHookRegistry, Settings,
};
use std::sync::OnceLock;

use crate::clipboard::{ClipboardListener, SystemClipboard};
use crate::error::{PlatformError, PlatformResult};
use crate::hook_window::SystemHookHost;

static SETTINGS: OnceLock<Settings> = OnceLock::new();
static CLIPBOARD: OnceLock<ClipboardManager<SystemClipboard>> = OnceLock::new();

/// Settings read once from the user's settings file.
pub fn settings() -> &'static Settings {
    SETTINGS.get_or_init(load_settings_or_default)
}

/// The process clipboard manager.
pub fn clipboard() -> PlatformResult<&'static ClipboardManager<SystemClipboard>> {
    if !cfg!(windows) {
        return Err(PlatformError::NotImplemented);
    }
    Ok(CLIPBOARD.get_or_init(|| {
        ClipboardManager::with_options(SystemClipboard::default(), (&settings().clipboard).into())
    }))
}

struct ThreadServices {
    registry: MessageHookRegistry,
    environment: EnvironmentMonitor,
    clipboard: ClipboardMonitor,
    dpi: DpiMonitor,
    display: DisplayMonitor,
}

impl ThreadServices {
    fn new() -> Self {
        let registry = MessageHookRegistry::new(SystemHookHost::new(&settings().hook_window.class_name));
        Self {
            environment: environment_monitor(&registry),
            clipboard: clipboard_monitor(&registry, ClipboardListener),
            dpi: dpi_monitor(&registry),
            display: display_monitor(&registry),
            registry,
        }
    }
}

thread_local! {
    static THREAD: ThreadServices = ThreadServices::new();
}

/// The calling thread's hook registry.
pub fn message_hooks() -> MessageHookRegistry {
    THREAD.with(|t| t.registry.clone())
}

pub fn environment_changes() -> EnvironmentMonitor {
    THREAD.with(|t| t.environment.clone())
}

pub fn clipboard_updates() -> ClipboardMonitor {
    THREAD.with(|t| t.clipboard.clone())
}

pub fn dpi_changes() -> DpiMonitor {
    THREAD.with(|t| t.dpi.clone())
}

pub fn display_changes() -> DisplayMonitor {
    THREAD.with(|t| t.display.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_services_share_one_registry() {
        let hooks = message_hooks();
        let environment = environment_changes();
        assert_eq!(hooks.hook_count(), 0);
        assert_eq!(environment.subscriber_count(), 0);
        assert_eq!(environment.name(), "environment");
        assert_eq!(clipboard_updates().name(), "clipboard");
        assert_eq!(dpi_changes().name(), "dpi");
        assert_eq!(display_changes().name(), "display");
    }

    #[cfg(not(windows))]
    #[test]
    fn test_clipboard_unavailable_off_windows() {
        let err = clipboard().err().unwrap();
        assert_eq!(err.kind(), deskprim_core::ErrorKind::NotImplemented);
    }

    #[cfg(not(windows))]
    #[test]
    fn test_monitor_subscription_fails_off_windows() {
        let err = environment_changes().subscribe(|_| {}).unwrap_err();
        assert_eq!(err.kind(), deskprim_core::ErrorKind::NotImplemented);
        assert_eq!(environment_changes().subscriber_count(), 0);
    }
}
