//! Win32 implementations of the shell, window and service seams

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use log::debug;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{HWND, LPARAM, POINT, RECT};
use windows::Win32::Graphics::Gdi::{MonitorFromPoint, MONITOR_DEFAULTTOPRIMARY};
use windows::Win32::System::Services::{
    CloseServiceHandle, OpenSCManagerW, OpenServiceW, QueryServiceStatus, SC_MANAGER_CONNECT,
    SERVICE_QUERY_STATUS, SERVICE_RUNNING, SERVICE_STATUS,
};
use windows::Win32::UI::Shell::{
    SHAppBarMessage, ABE_BOTTOM, ABE_LEFT, ABE_RIGHT, ABE_TOP, ABM_ACTIVATE, ABM_NEW,
    ABM_QUERYPOS, ABM_REMOVE, ABM_SETPOS, ABM_WINDOWPOSCHANGED, APPBARDATA,
};
use windows::Win32::UI::WindowsAndMessaging::{
    IsWindow, SetWindowPos, ShowWindow, SystemParametersInfoW, HWND_BOTTOM, HWND_TOPMOST,
    SPIF_SENDCHANGE, SPI_SETWORKAREA, SWP_NOACTIVATE, SWP_NOMOVE, SWP_NOSIZE, SWP_NOZORDER,
    SW_HIDE, SW_SHOWNOACTIVATE,
};

use crate::appbar::{AppBarHandle, AppBarShell, WindowId};
use crate::companion::WindowSurface;
use crate::error::{MenuBarError, MenuBarResult};
use crate::geometry::{MonitorId, Rect, ScreenEdge};
use crate::probe::{ServiceStatus, ServiceStatusSource};
use crate::utils::{hmonitor, monitor_rects, rect_from_win32, rect_to_win32, to_pcwstr, to_wide_string};

fn hwnd_of(id: isize) -> HWND {
    HWND(id as *mut std::ffi::c_void)
}

fn abe(edge: ScreenEdge) -> u32 {
    match edge {
        ScreenEdge::Top => ABE_TOP,
        ScreenEdge::Bottom => ABE_BOTTOM,
        ScreenEdge::Left => ABE_LEFT,
        ScreenEdge::Right => ABE_RIGHT,
    }
}

/// A top-level window we created
#[derive(Debug, Clone, Copy)]
pub struct Win32Window {
    hwnd: HWND,
}

impl Win32Window {
    pub fn new(hwnd: HWND) -> Self {
        Self { hwnd }
    }

    /// Map a failed call to `WindowGone` when the window no longer exists
    fn check(&self, result: windows::core::Result<()>) -> MenuBarResult<()> {
        match result {
            Ok(()) => Ok(()),
            Err(_) if !self.is_alive() => Err(MenuBarError::WindowGone(self.id())),
            Err(e) => Err(e.into()),
        }
    }
}

impl WindowSurface for Win32Window {
    fn id(&self) -> WindowId {
        WindowId(self.hwnd.0 as isize)
    }

    fn set_rect(&mut self, rect: &Rect) -> MenuBarResult<()> {
        let result = unsafe {
            SetWindowPos(
                self.hwnd,
                HWND::default(),
                rect.x,
                rect.y,
                rect.width,
                rect.height,
                SWP_NOACTIVATE | SWP_NOZORDER,
            )
        };
        self.check(result)
    }

    fn set_topmost(&mut self, topmost: bool) -> MenuBarResult<()> {
        // Dropping to the bottom also clears the topmost flag
        let insert_after = if topmost { HWND_TOPMOST } else { HWND_BOTTOM };
        let result = unsafe {
            SetWindowPos(
                self.hwnd,
                insert_after,
                0,
                0,
                0,
                0,
                SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE,
            )
        };
        self.check(result)
    }

    fn set_visible(&mut self, visible: bool) -> MenuBarResult<()> {
        if !self.is_alive() {
            return Err(MenuBarError::WindowGone(self.id()));
        }
        let cmd = if visible { SW_SHOWNOACTIVATE } else { SW_HIDE };
        unsafe {
            let _ = ShowWindow(self.hwnd, cmd);
        }
        Ok(())
    }

    fn is_alive(&self) -> bool {
        unsafe { IsWindow(self.hwnd).as_bool() }
    }
}

/// `SHAppBarMessage` wrapper.
///
/// Clones share the set of live registrations, so a taskbar restart seen by
/// the window procedure invalidates every handle at once.
#[derive(Debug, Clone)]
pub struct Win32AppBarShell {
    callback_message: u32,
    registered: Rc<RefCell<HashSet<isize>>>,
}

impl Win32AppBarShell {
    pub fn new(callback_message: u32) -> Self {
        Self {
            callback_message,
            registered: Rc::new(RefCell::new(HashSet::new())),
        }
    }

    /// Explorer restarted: every reservation it held is gone
    pub fn forget_all(&self) {
        self.registered.borrow_mut().clear();
    }

    fn check(&self, handle: AppBarHandle) -> MenuBarResult<()> {
        if self.registered.borrow().contains(&handle.0) {
            Ok(())
        } else {
            Err(MenuBarError::StaleHandle(handle))
        }
    }

    fn data(&self, handle: isize, edge: u32, rect: &Rect) -> APPBARDATA {
        APPBARDATA {
            cbSize: std::mem::size_of::<APPBARDATA>() as u32,
            hWnd: hwnd_of(handle),
            uCallbackMessage: self.callback_message,
            uEdge: edge,
            rc: rect_to_win32(rect),
            lParam: LPARAM(0),
        }
    }

    fn send(&self, message: u32, abd: &mut APPBARDATA) -> usize {
        unsafe { SHAppBarMessage(message, abd) }
    }
}

impl AppBarShell for Win32AppBarShell {
    fn register(&mut self, window: WindowId) -> MenuBarResult<AppBarHandle> {
        let mut abd = self.data(window.0, 0, &Rect::default());

        // Clears a registration the shell may still hold for this window
        self.send(ABM_REMOVE, &mut abd);
        if self.send(ABM_NEW, &mut abd) == 0 {
            return Err(MenuBarError::RegistrationDenied(format!(
                "ABM_NEW refused for window {:#x}",
                window.0
            )));
        }

        self.registered.borrow_mut().insert(window.0);
        Ok(AppBarHandle(window.0))
    }

    fn query_pos(&mut self, handle: AppBarHandle, edge: ScreenEdge, rect: Rect) -> MenuBarResult<Rect> {
        self.check(handle)?;
        let mut abd = self.data(handle.0, abe(edge), &rect);
        self.send(ABM_QUERYPOS, &mut abd);
        Ok(rect_from_win32(&abd.rc))
    }

    fn set_pos(&mut self, handle: AppBarHandle, edge: ScreenEdge, rect: Rect) -> MenuBarResult<Rect> {
        self.check(handle)?;
        let mut abd = self.data(handle.0, abe(edge), &rect);
        self.send(ABM_SETPOS, &mut abd);
        Ok(rect_from_win32(&abd.rc))
    }

    fn remove(&mut self, handle: AppBarHandle) -> MenuBarResult<()> {
        self.check(handle)?;
        let mut abd = self.data(handle.0, 0, &Rect::default());
        self.send(ABM_REMOVE, &mut abd);
        self.registered.borrow_mut().remove(&handle.0);
        Ok(())
    }

    fn activate(&mut self, handle: AppBarHandle) {
        let mut abd = self.data(handle.0, 0, &Rect::default());
        abd.lParam = LPARAM(1);
        self.send(ABM_ACTIVATE, &mut abd);
    }

    fn window_pos_changed(&mut self, handle: AppBarHandle) {
        let mut abd = self.data(handle.0, 0, &Rect::default());
        self.send(ABM_WINDOWPOSCHANGED, &mut abd);
    }

    fn query_work_area(&self, monitor: MonitorId) -> MenuBarResult<Rect> {
        monitor_rects(hmonitor(monitor)).map(|(_, work_area)| work_area)
    }

    fn reset_work_area(&mut self) -> MenuBarResult<()> {
        let primary = unsafe { MonitorFromPoint(POINT { x: 0, y: 0 }, MONITOR_DEFAULTTOPRIMARY) };
        let (bounds, _) = monitor_rects(primary)?;
        let mut rc: RECT = rect_to_win32(&bounds);
        unsafe {
            SystemParametersInfoW(
                SPI_SETWORKAREA,
                0,
                Some(&mut rc as *mut RECT as *mut std::ffi::c_void),
                SPIF_SENDCHANGE,
            )?;
        }
        debug!("Work area reset to {:?}", bounds);
        Ok(())
    }
}

/// Service status from the Service Control Manager
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceControlManager;

impl ServiceControlManager {
    fn is_running(service_name: &str) -> windows::core::Result<bool> {
        let name = to_wide_string(service_name);
        unsafe {
            let scm = OpenSCManagerW(PCWSTR::null(), PCWSTR::null(), SC_MANAGER_CONNECT)?;
            let running = OpenServiceW(scm, to_pcwstr(&name), SERVICE_QUERY_STATUS).and_then(
                |service| {
                    let mut status = SERVICE_STATUS::default();
                    let queried = QueryServiceStatus(service, &mut status);
                    let _ = CloseServiceHandle(service);
                    queried.map(|()| status.dwCurrentState == SERVICE_RUNNING)
                },
            );
            let _ = CloseServiceHandle(scm);
            running
        }
    }
}

impl ServiceStatusSource for ServiceControlManager {
    fn query_status(&self, service_name: &str) -> ServiceStatus {
        match Self::is_running(service_name) {
            Ok(true) => ServiceStatus::Running,
            Ok(false) => ServiceStatus::Stopped,
            Err(e) => {
                debug!("Could not query service {}: {}", service_name, e);
                ServiceStatus::Unknown
            }
        }
    }
}
