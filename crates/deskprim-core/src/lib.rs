//! deskprim-core: desktop primitives independent of the OS backend.
//!
//! Design goal: everything that can be reasoned about without calling the OS
//! lives here and talks to the OS only through the traits in [`native`].
//! Win32 backends live in `deskprim-platform`.
//!
//! ## Module Structure
//!
//! - `handle` - Scoped native handle guards
//! - `clipboard` - Clipboard sessions with bounded-retry open
//! - `format` - Clipboard format names and ids
//! - `hook` - Multiplexing of the native message callback
//! - `broadcast` - Ref-counted hot event streams over the hook registry
//! - `events` - Typed change events and monitors
//! - `config` - YAML settings

mod broadcast;
mod clipboard;
pub mod config;
pub mod dpi;
mod error;
mod events;
mod format;
mod geometry;
mod handle;
mod hook;
mod messages;
pub mod native;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use broadcast::{BroadcastLifecycle, ChangeBroadcaster, Subscription, CHANNEL_CAPACITY};
pub use clipboard::{ClipboardManager, ClipboardSession, OpenOptions};
pub use config::{
    load_settings, load_settings_or_default, ClipboardSettings, ConfigError, ConfigResult,
    HookWindowSettings, Settings,
};
pub use error::{ErrorKind, NativeCode, PlatformError, PlatformResult};
pub use events::{
    clipboard_monitor, display_monitor, dpi_monitor, environment_monitor, ClipboardMonitor,
    ClipboardUpdate, DisplayChange, DisplayMonitor, DpiChange, DpiMonitor, EnvironmentChange,
    EnvironmentMonitor,
};
pub use format::{holds_gdi_handle, is_gdi_object_format, is_private_format, FormatDescriptor, FormatRegistry, StandardFormat};
pub use geometry::{NativePoint, NativeRect, NativeSize};
pub use handle::{release_failures, GlobalBlock, HandleGuard, HandleKind, LockedBlock};
pub use hook::{HookId, HookOutcome, MessageHookRegistry};
pub use messages::{WindowMessage, WindowsMessage};
pub use native::RawHandle;
