//! Transactional access to the system clipboard.
//!
//! [`ClipboardManager::open`] retries until the clipboard can be owned or the
//! timeout elapses, and hands out a [`ClipboardSession`]. Only one session per
//! process can be open at a time, however many managers exist; the session
//! closes the clipboard when it is closed or dropped. Every payload goes through a handle guard, so no block
//! or lock outlives the operation that created it.

use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::ClipboardSettings;
use crate::error::{PlatformError, PlatformResult};
use crate::format::{holds_gdi_handle, FormatDescriptor, FormatRegistry, StandardFormat};
use crate::handle::{GlobalBlock, LockedBlock};
use crate::native::NativeClipboard;

/// How long `open` keeps trying, and how often.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenOptions {
    pub timeout: Duration,
    pub retry_interval: Duration,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(500),
            retry_interval: Duration::from_millis(20),
        }
    }
}

impl From<&ClipboardSettings> for OpenOptions {
    fn from(settings: &ClipboardSettings) -> Self {
        Self {
            timeout: Duration::from_millis(settings.open_timeout_ms),
            retry_interval: Duration::from_millis(settings.retry_interval_ms),
        }
    }
}

/// Process-side owner of clipboard access.
pub struct ClipboardManager<C: NativeClipboard> {
    native: C,
    formats: FormatRegistry,
    options: OpenOptions,
}

impl<C: NativeClipboard> ClipboardManager<C> {
    pub fn new(native: C) -> Self {
        Self::with_options(native, OpenOptions::default())
    }

    pub fn with_options(native: C, options: OpenOptions) -> Self {
        Self {
            native,
            formats: FormatRegistry::new(),
            options,
        }
    }

    pub fn native(&self) -> &C {
        &self.native
    }

    pub fn formats(&self) -> &FormatRegistry {
        &self.formats
    }

    pub fn options(&self) -> OpenOptions {
        self.options
    }

    pub fn is_session_open(&self) -> bool {
        self.native.session_flag().load(Ordering::Acquire)
    }

    /// Open with the manager's default options.
    pub fn open(&self) -> PlatformResult<ClipboardSession<'_, C>> {
        self.open_with(self.options)
    }

    /// Take clipboard ownership, retrying every `retry_interval` until
    /// `timeout` has elapsed. At least one attempt is always made.
    ///
    /// Fails fast with `InvalidState` if a session is already open in this
    /// process.
    pub fn open_with(&self, options: OpenOptions) -> PlatformResult<ClipboardSession<'_, C>> {
        let session_open = self.native.session_flag();
        if session_open
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(PlatformError::invalid_state(
                "a clipboard session is already open in this process",
            ));
        }

        let started = Instant::now();
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.native.open() {
                Ok(()) => {
                    debug!(attempts, "Clipboard opened");
                    return Ok(ClipboardSession {
                        manager: self,
                        closed: false,
                    });
                }
                Err(code) => {
                    let waited = started.elapsed();
                    if waited >= options.timeout {
                        session_open.store(false, Ordering::Release);
                        info!(?waited, attempts, code, "Clipboard ownership not obtained");
                        return Err(PlatformError::AccessDenied {
                            waited,
                            code: Some(code),
                        });
                    }
                    let remaining = options.timeout - waited;
                    thread::sleep(options.retry_interval.min(remaining));
                }
            }
        }
    }
}

/// Exclusive ownership of the clipboard, released on close or drop.
pub struct ClipboardSession<'a, C: NativeClipboard> {
    manager: &'a ClipboardManager<C>,
    closed: bool,
}

impl<'a, C: NativeClipboard> ClipboardSession<'a, C> {
    /// Formats currently on the clipboard, in clipboard order, without
    /// consuming them.
    pub fn available_formats(&self) -> PlatformResult<Vec<FormatDescriptor>> {
        let native = &self.manager.native;
        let ids = native
            .formats()
            .map_err(|code| PlatformError::ResourceUnavailable {
                operation: "EnumClipboardFormats",
                code,
            })?;
        Ok(ids
            .into_iter()
            .map(|id| self.manager.formats.describe(native, id))
            .collect())
    }

    /// Id of `format` if it is on the clipboard. Names are not registered
    /// just to be looked up.
    fn find(&self, format: &str) -> PlatformResult<Option<u32>> {
        let native = &self.manager.native;
        let id = match StandardFormat::from_name(format) {
            Some(standard) => Some(standard.id()),
            None => {
                let available = native
                    .formats()
                    .map_err(|code| PlatformError::ResourceUnavailable {
                        operation: "EnumClipboardFormats",
                        code,
                    })?;
                self.manager.formats.lookup(native, format, &available)
            }
        };
        Ok(id.filter(|id| native.data(*id).is_some()))
    }

    pub fn contains(&self, format: &str) -> PlatformResult<bool> {
        Ok(self.find(format)?.is_some())
    }

    /// Copy the payload stored under `format`.
    ///
    /// Formats carried as GDI objects (`CF_BITMAP`, `CF_ENHMETAFILE` ...)
    /// have no byte payload and fail with `InvalidState`.
    pub fn read(&self, format: &str) -> PlatformResult<Vec<u8>> {
        let native = &self.manager.native;
        let id = self
            .find(format)?
            .ok_or_else(|| PlatformError::FormatNotPresent(format.to_string()))?;
        if holds_gdi_handle(id) {
            return Err(PlatformError::invalid_state(format!(
                "{format} holds a GDI object, not global memory"
            )));
        }
        let handle = native
            .data(id)
            .ok_or_else(|| PlatformError::FormatNotPresent(format.to_string()))?;

        let size = native
            .global_size(handle)
            .map_err(|code| PlatformError::ResourceUnavailable {
                operation: "GlobalSize",
                code,
            })?;
        // Zero-sized blocks cannot be locked; they hold an empty payload.
        if size == 0 {
            return Ok(Vec::new());
        }
        let locked = LockedBlock::lock(native, handle)?;
        let bytes = locked.as_bytes().to_vec();
        debug!(format, id, len = bytes.len(), "Read clipboard data");
        Ok(bytes)
    }

    /// Place `bytes` on the clipboard under `format`.
    ///
    /// The block is freed here on any failure; once the clipboard accepts it
    /// the clipboard owns it.
    pub fn write(&mut self, format: &str, bytes: &[u8]) -> PlatformResult<()> {
        let native = &self.manager.native;
        let id = self.manager.formats.resolve(native, format)?;

        let mut block = GlobalBlock::alloc(native, bytes.len())?;
        block.fill(bytes)?;
        native
            .set_data(id, block.handle())
            .map_err(|code| PlatformError::ResourceUnavailable {
                operation: "SetClipboardData",
                code,
            })?;
        let handle = block.into_raw();
        debug!(format, id, handle, len = bytes.len(), "Wrote clipboard data");
        Ok(())
    }

    /// Empty the clipboard and become its owner.
    pub fn clear(&mut self) -> PlatformResult<()> {
        self.manager
            .native
            .empty()
            .map_err(|code| PlatformError::ResourceUnavailable {
                operation: "EmptyClipboard",
                code,
            })
    }

    /// `CF_UNICODETEXT` contents, up to the first NUL.
    pub fn read_text(&self) -> PlatformResult<String> {
        let bytes = self.read(StandardFormat::UnicodeText.name())?;
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .take_while(|unit| *unit != 0)
            .collect();
        Ok(String::from_utf16_lossy(&units))
    }

    /// Store `text` as NUL-terminated `CF_UNICODETEXT`.
    pub fn write_text(&mut self, text: &str) -> PlatformResult<()> {
        let bytes: Vec<u8> = text
            .encode_utf16()
            .chain(std::iter::once(0))
            .flat_map(u16::to_le_bytes)
            .collect();
        self.write(StandardFormat::UnicodeText.name(), &bytes)
    }

    /// Release clipboard ownership.
    pub fn close(mut self) -> PlatformResult<()> {
        self.release()
    }

    fn release(&mut self) -> PlatformResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let result = self.manager.native.close();
        self.manager.native.session_flag().store(false, Ordering::Release);
        debug!("Clipboard closed");
        result.map_err(|code| PlatformError::ResourceUnavailable {
            operation: "CloseClipboard",
            code,
        })
    }
}

impl<C: NativeClipboard> Drop for ClipboardSession<'_, C> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        debug!("Clipboard session dropped without close");
        if let Err(e) = self.release() {
            warn!(error = %e, "Failed to close clipboard");
        }
    }
}
