//! Windows implementation of window enumeration using Win32.

use super::WindowInfo;
use deskprim_core::{NativeRect, RawHandle};
use std::ptr;
use windows_sys::Win32::Foundation::{CloseHandle, BOOL, HWND, LPARAM, RECT, TRUE};
use windows_sys::Win32::System::ProcessStatus::GetModuleBaseNameW;
use windows_sys::Win32::System::Threading::{OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ};
use windows_sys::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetClassNameW, GetForegroundWindow, GetWindowRect, GetWindowTextLengthW,
    GetWindowTextW, GetWindowThreadProcessId, IsWindowVisible,
};

use crate::wide::from_wide;

pub fn foreground_window() -> Option<WindowInfo> {
    // SAFETY: no arguments.
    let hwnd = unsafe { GetForegroundWindow() };
    if hwnd.is_null() {
        return None;
    }
    window_info(hwnd as RawHandle)
}

pub fn list_windows() -> Vec<WindowInfo> {
    let mut windows: Vec<WindowInfo> = Vec::new();
    // SAFETY: the callback only runs during this call, while `windows` lives.
    unsafe {
        EnumWindows(Some(enum_window_callback), &mut windows as *mut Vec<WindowInfo> as LPARAM);
    }
    windows
}

unsafe extern "system" fn enum_window_callback(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let windows = &mut *(lparam as *mut Vec<WindowInfo>);
    if IsWindowVisible(hwnd) == 0 || GetWindowTextLengthW(hwnd) == 0 {
        return TRUE;
    }
    if let Some(info) = window_info(hwnd as RawHandle) {
        windows.push(info);
    }
    TRUE
}

fn window_info(handle: RawHandle) -> Option<WindowInfo> {
    let hwnd = handle as HWND;
    // SAFETY: buffers are sized as passed; a stale handle makes calls fail.
    unsafe {
        let title_len = GetWindowTextLengthW(hwnd);
        if title_len == 0 {
            return None;
        }
        let mut title_buf: Vec<u16> = vec![0; (title_len + 1) as usize];
        let copied = GetWindowTextW(hwnd, title_buf.as_mut_ptr(), title_buf.len() as i32);
        if copied == 0 {
            return None;
        }
        let title = from_wide(&title_buf[..copied as usize]);

        let mut class_buf = [0u16; 256];
        let class_len = GetClassNameW(hwnd, class_buf.as_mut_ptr(), class_buf.len() as i32);
        let class_name = from_wide(&class_buf[..class_len.max(0) as usize]);

        let mut pid: u32 = 0;
        GetWindowThreadProcessId(hwnd, &mut pid);

        Some(WindowInfo {
            handle,
            title,
            class_name,
            pid,
            process_name: process_name(pid).unwrap_or_default(),
            rect: window_rect(handle).unwrap_or_default(),
            visible: IsWindowVisible(hwnd) != 0,
        })
    }
}

fn process_name(pid: u32) -> Option<String> {
    // SAFETY: the process handle is closed before returning.
    unsafe {
        let process = OpenProcess(PROCESS_QUERY_INFORMATION | PROCESS_VM_READ, 0, pid);
        if process.is_null() {
            return None;
        }
        let mut name_buf = [0u16; 260];
        let len = GetModuleBaseNameW(process, ptr::null_mut(), name_buf.as_mut_ptr(), name_buf.len() as u32);
        CloseHandle(process);
        (len > 0).then(|| from_wide(&name_buf[..len as usize]))
    }
}

pub fn window_rect(handle: RawHandle) -> Option<NativeRect> {
    // SAFETY: `rect` is a plain out-parameter.
    unsafe {
        let mut rect: RECT = std::mem::zeroed();
        if GetWindowRect(handle as HWND, &mut rect) == 0 {
            return None;
        }
        Some(NativeRect::new(rect.left, rect.top, rect.right, rect.bottom))
    }
}
