//! Hidden top-level window hosting the thread's hook registry.
//!
//! Message-only windows never see broadcasts such as `WM_SETTINGCHANGE` or
//! `WM_DISPLAYCHANGE`, so the window has no parent and is never shown.

use deskprim_core::native::{Dispatcher, NativeHookHost, RawHandle};
use deskprim_core::{HandleGuard, HandleKind, WindowMessage};
use std::cell::RefCell;
use std::ptr;
use tracing::{debug, info, warn};
use windows_sys::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows_sys::Win32::System::LibraryLoader::GetModuleHandleW;
use windows_sys::Win32::System::Threading::GetCurrentThreadId;
use windows_sys::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetMessageW,
    PeekMessageW, PostThreadMessageW, RegisterClassW, TranslateMessage, MSG, PM_NOREMOVE,
    WM_QUIT, WM_USER, WNDCLASSW,
};

use crate::error::{last_error, os_error, PlatformResult};
use crate::wide::to_wide;

const ERROR_CLASS_ALREADY_EXISTS: u32 = 1410;

thread_local! {
    static DISPATCHER: RefCell<Option<Dispatcher>> = const { RefCell::new(None) };
}

/// Owns the hook window of the thread it was created on.
///
/// Messages reach the registry through a thread-local dispatcher, so one
/// host per thread may be installed at a time.
pub struct Win32HookHost {
    class_name: String,
    window: RefCell<Option<HandleGuard<'static>>>,
}

impl Win32HookHost {
    pub fn new(class_name: &str) -> Self {
        Self {
            class_name: class_name.to_string(),
            window: RefCell::new(None),
        }
    }

    fn create_window(&self) -> PlatformResult<HandleGuard<'static>> {
        let class_name = to_wide(&self.class_name);
        // SAFETY: all pointers are null or NUL-terminated buffers that outlive
        // the calls.
        unsafe {
            let instance = GetModuleHandleW(ptr::null());
            let wc = WNDCLASSW {
                style: 0,
                lpfnWndProc: Some(window_proc),
                cbClsExtra: 0,
                cbWndExtra: 0,
                hInstance: instance,
                hIcon: ptr::null_mut(),
                hCursor: ptr::null_mut(),
                hbrBackground: ptr::null_mut(),
                lpszMenuName: ptr::null(),
                lpszClassName: class_name.as_ptr(),
            };
            if RegisterClassW(&wc) == 0 && last_error() != ERROR_CLASS_ALREADY_EXISTS {
                return Err(os_error("RegisterClass"));
            }

            HandleGuard::acquire(
                HandleKind::Window,
                || {
                    let hwnd = CreateWindowExW(
                        0,
                        class_name.as_ptr(),
                        class_name.as_ptr(),
                        0,
                        0,
                        0,
                        0,
                        0,
                        ptr::null_mut(),
                        ptr::null_mut(),
                        instance,
                        ptr::null(),
                    );
                    if hwnd.is_null() {
                        Err(last_error())
                    } else {
                        Ok(hwnd as RawHandle)
                    }
                },
                |handle| {
                    if DestroyWindow(handle as HWND) != 0 {
                        Ok(())
                    } else {
                        Err(last_error())
                    }
                },
            )
        }
    }
}

impl NativeHookHost for Win32HookHost {
    fn install(&self, dispatcher: Dispatcher) -> PlatformResult<()> {
        let window = self.create_window()?;
        info!(hwnd = window.handle(), class = %self.class_name, "Hook window created");
        DISPATCHER.with(|slot| *slot.borrow_mut() = Some(dispatcher));
        *self.window.borrow_mut() = Some(window);
        Ok(())
    }

    fn uninstall(&self) {
        // The slot may already be gone when this runs during thread exit.
        let _ = DISPATCHER.try_with(|slot| slot.borrow_mut().take());
        if let Some(mut window) = self.window.borrow_mut().take() {
            window.release();
            debug!("Hook window destroyed");
        }
    }

    fn window_handle(&self) -> RawHandle {
        self.window.borrow().as_ref().map_or(0, HandleGuard::handle)
    }
}

impl Drop for Win32HookHost {
    fn drop(&mut self) {
        self.uninstall();
    }
}

unsafe extern "system" fn window_proc(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    let dispatcher = DISPATCHER
        .try_with(|slot| slot.borrow().clone())
        .ok()
        .flatten();
    if let Some(dispatch) = dispatcher {
        // SAFETY: parameters come straight from the system.
        let message = WindowMessage::from_native(hwnd as RawHandle, msg, wparam, lparam);
        if let Some(result) = dispatch(&message) {
            return result;
        }
    }
    DefWindowProcW(hwnd, msg, wparam, lparam)
}

/// Id of the calling thread. Its message queue is created if it does not
/// exist yet, so `WM_QUIT` can be posted to it right away.
pub fn current_thread_id() -> u32 {
    // SAFETY: `msg` is a plain out-parameter and nothing is removed.
    unsafe {
        let mut msg: MSG = std::mem::zeroed();
        PeekMessageW(&mut msg, ptr::null_mut(), WM_USER, WM_USER, PM_NOREMOVE);
        GetCurrentThreadId()
    }
}

/// Pump messages on the calling thread until `WM_QUIT`.
pub fn run_message_loop() -> PlatformResult<()> {
    info!(thread_id = current_thread_id(), "Starting message loop");
    // SAFETY: `msg` is a plain out-parameter.
    let mut msg: MSG = unsafe { std::mem::zeroed() };
    loop {
        let ret = unsafe { GetMessageW(&mut msg, ptr::null_mut(), 0, 0) };
        if ret == 0 {
            break;
        }
        if ret < 0 {
            return Err(os_error("GetMessage"));
        }
        unsafe {
            TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
    info!("Message loop exited");
    Ok(())
}

pub(super) fn post_quit(thread_id: u32) {
    // SAFETY: posting to a dead thread fails harmlessly.
    if unsafe { PostThreadMessageW(thread_id, WM_QUIT, 0, 0) } == 0 {
        warn!(thread_id, code = last_error(), "Failed to post WM_QUIT");
    }
}
