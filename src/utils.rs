//! Win32 helpers shared by the window host

use std::ffi::OsStr;
use std::os::windows::ffi::OsStrExt;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{HWND, RECT};
use windows::Win32::Graphics::Gdi::{
    GetMonitorInfoW, MonitorFromWindow, HMONITOR, MONITORINFO, MONITOR_DEFAULTTOPRIMARY,
};
use windows::Win32::UI::HiDpi::GetDpiForWindow;

use crate::error::{MenuBarError, MenuBarResult};
use crate::geometry::{DpiScale, Monitor, MonitorId, Rect};

/// Convert a Rust string to a wide string for Windows API
pub fn to_wide_string(s: &str) -> Vec<u16> {
    OsStr::new(s)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

/// Create a PCWSTR from a wide string slice
pub fn to_pcwstr(s: &[u16]) -> PCWSTR {
    PCWSTR::from_raw(s.as_ptr())
}

pub fn rect_from_win32(rc: &RECT) -> Rect {
    Rect::from_ltrb(rc.left, rc.top, rc.right, rc.bottom)
}

pub fn rect_to_win32(rect: &Rect) -> RECT {
    RECT {
        left: rect.x,
        top: rect.y,
        right: rect.right(),
        bottom: rect.bottom(),
    }
}

pub fn hmonitor(id: MonitorId) -> HMONITOR {
    HMONITOR(id.0 as *mut std::ffi::c_void)
}

/// Bounds and work area of `monitor`
pub fn monitor_rects(monitor: HMONITOR) -> MenuBarResult<(Rect, Rect)> {
    let mut info = MONITORINFO {
        cbSize: std::mem::size_of::<MONITORINFO>() as u32,
        ..Default::default()
    };
    let ok = unsafe { GetMonitorInfoW(monitor, &mut info) };
    if !ok.as_bool() {
        return Err(MenuBarError::InvalidGeometry(format!(
            "no monitor info for {:?}",
            monitor
        )));
    }
    Ok((rect_from_win32(&info.rcMonitor), rect_from_win32(&info.rcWork)))
}

/// Monitor the window sits on, with its current DPI scale
pub fn monitor_for_window(hwnd: HWND) -> MenuBarResult<Monitor> {
    let handle = unsafe { MonitorFromWindow(hwnd, MONITOR_DEFAULTTOPRIMARY) };
    let (bounds, work_area) = monitor_rects(handle)?;
    let dpi = unsafe { GetDpiForWindow(hwnd) };
    let scale = DpiScale::from_dpi(dpi).unwrap_or_default();

    Ok(Monitor::new(
        MonitorId(handle.0 as isize),
        bounds,
        work_area,
        scale,
    ))
}
