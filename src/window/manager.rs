//! Window manager for creating and managing the MenuBar windows
//!
//! Creates the bar and its companions, builds the [`MenuBar`] over them and
//! runs the message loop.

use anyhow::Result;
use log::{info, warn};
use std::sync::Arc;
use windows::core::w;
use windows::Win32::Foundation::{COLORREF, HWND};
use windows::Win32::Graphics::Gdi::{GetStockObject, GetSysColorBrush, BLACK_BRUSH, COLOR_MENUBAR, HBRUSH};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::HiDpi::{
    SetProcessDpiAwarenessContext, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2,
};
use windows::Win32::UI::WindowsAndMessaging::*;

use crate::app::{BarWindows, MenuBar};
use crate::config::Config;
use crate::probe::ReadinessLatch;
use crate::utils::{monitor_for_window, to_pcwstr, to_wide_string};

use super::platform::{ServiceControlManager, Win32AppBarShell, Win32Window};
use super::state::{
    set_main_hwnd, set_menubar, set_message_ids, set_relay, take_menubar, MessageIds,
};

/// Window class names
const BAR_CLASS: &str = "MenuBarWindowClass";
const SHADOW_CLASS: &str = "MenuBarShadowClass";
const BAR_TITLE: &str = "MenuBar";
const SHADOW_TITLE: &str = "MenuBarShadow";
const TASKBAR_TITLE: &str = "MenuBarTaskbar";

/// Timer driving the search readiness probe
pub const PROBE_TIMER_ID: usize = 1;

const SHADOW_ALPHA: u8 = 60;

/// Main window manager
pub struct WindowManager {
    hwnd: HWND,
    companions: Vec<HWND>,
}

impl WindowManager {
    /// Create the windows and dock the bar
    pub fn new(config: Arc<Config>) -> Result<Self> {
        // Set DPI awareness
        unsafe {
            let _ = SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2);
        }

        let ids = unsafe {
            MessageIds {
                appbar: RegisterWindowMessageW(w!("MenuBarAppBarMessage")),
                taskbar_created: RegisterWindowMessageW(w!("TaskbarCreated")),
            }
        };
        if ids.appbar == 0 {
            return Err(anyhow::anyhow!("Failed to register AppBar callback message"));
        }
        set_message_ids(ids);

        let bar_class = to_wide_string(BAR_CLASS);
        let shadow_class = to_wide_string(SHADOW_CLASS);
        unsafe {
            Self::register_window_class(&bar_class, GetSysColorBrush(COLOR_MENUBAR))?;
            Self::register_window_class(&shadow_class, HBRUSH(GetStockObject(BLACK_BRUSH).0))?;
        }

        let hwnd = Self::create_window(&bar_class, BAR_TITLE, WS_EX_TOPMOST | WS_EX_NOACTIVATE)?;
        set_main_hwnd(hwnd.0 as isize);

        let shadow = if config.appearance.shadow_enabled {
            Some(Self::create_shadow(&shadow_class)?)
        } else {
            None
        };
        let taskbar = if config.taskbar.enabled {
            Some(Self::create_window(
                &bar_class,
                TASKBAR_TITLE,
                WS_EX_TOPMOST | WS_EX_NOACTIVATE,
            )?)
        } else {
            None
        };
        let companions: Vec<HWND> = shadow.into_iter().chain(taskbar).collect();

        let monitor = monitor_for_window(hwnd)?;
        info!("Bar monitor: {:?}", monitor);

        let mut menubar = MenuBar::new(
            config.clone(),
            BarWindows {
                bar: Win32Window::new(hwnd),
                shadow: shadow.map(Win32Window::new),
                taskbar: taskbar.map(Win32Window::new),
            },
            Win32AppBarShell::new(ids.appbar),
            ServiceControlManager,
            monitor,
            ReadinessLatch::new(),
        );
        // Messages our own moves send during start cannot reach the menu bar yet
        set_relay(menubar.relay());
        let needs_probe = menubar.start()?;
        let probe_interval = menubar.probe().interval();

        if config.behavior.hide_from_tasks {
            Self::hide_from_tasks(hwnd);
            for companion in &companions {
                Self::hide_from_tasks(*companion);
            }
        }

        set_menubar(menubar);

        if needs_probe {
            let interval = u32::try_from(probe_interval.as_millis()).unwrap_or(u32::MAX);
            unsafe {
                SetTimer(hwnd, PROBE_TIMER_ID, interval, None);
            }
        }

        info!("Windows created, {} companion(s)", companions.len());
        Ok(Self { hwnd, companions })
    }

    /// Register a window class
    fn register_window_class(class_name: &[u16], background: HBRUSH) -> Result<()> {
        unsafe {
            let hinstance = GetModuleHandleW(None)?;

            let wc = WNDCLASSEXW {
                cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
                style: CS_HREDRAW | CS_VREDRAW,
                lpfnWndProc: Some(super::proc::window_proc),
                hInstance: hinstance.into(),
                hCursor: LoadCursorW(None, IDC_ARROW)?,
                lpszClassName: to_pcwstr(class_name),
                hbrBackground: background,
                ..Default::default()
            };

            let atom = RegisterClassExW(&wc);
            if atom == 0 {
                return Err(anyhow::anyhow!("Failed to register window class"));
            }
        }
        Ok(())
    }

    /// Create a borderless popup
    fn create_window(class_name: &[u16], title: &str, ex_style: WINDOW_EX_STYLE) -> Result<HWND> {
        let title = to_wide_string(title);

        unsafe {
            let hinstance = GetModuleHandleW(None)?;

            let hwnd = CreateWindowExW(
                ex_style,
                to_pcwstr(class_name),
                to_pcwstr(&title),
                WS_POPUP,
                0,
                0,
                100,
                100, // Temporary size, the dispatcher places it
                None,
                None,
                hinstance,
                None,
            )?;

            if hwnd.0.is_null() {
                return Err(anyhow::anyhow!("Failed to create window"));
            }
            Ok(hwnd)
        }
    }

    /// Translucent, click-through strip
    fn create_shadow(class_name: &[u16]) -> Result<HWND> {
        let hwnd = Self::create_window(
            class_name,
            SHADOW_TITLE,
            WS_EX_TOPMOST | WS_EX_NOACTIVATE | WS_EX_LAYERED | WS_EX_TRANSPARENT,
        )?;
        unsafe {
            SetLayeredWindowAttributes(hwnd, COLORREF(0), SHADOW_ALPHA, LWA_ALPHA)?;
        }
        Ok(hwnd)
    }

    /// Keep a window out of Alt+Tab and the taskbar
    fn hide_from_tasks(hwnd: HWND) {
        unsafe {
            let ex_style = GetWindowLongW(hwnd, GWL_EXSTYLE);
            SetWindowLongW(hwnd, GWL_EXSTYLE, ex_style | WS_EX_TOOLWINDOW.0 as i32);
        }
    }

    /// Run the message loop
    pub fn run_message_loop(&self) -> Result<()> {
        unsafe {
            let mut msg = MSG::default();

            while GetMessageW(&mut msg, None, 0, 0).into() {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }

        // WM_QUIT can arrive without a WM_CLOSE (e.g. session end)
        if let Some(mut menubar) = take_menubar() {
            if !menubar.is_shut_down() {
                warn!("Message loop ended before cleanup, releasing now");
                menubar.prepare_for_shutdown();
            }
        }
        Ok(())
    }
}

impl Drop for WindowManager {
    fn drop(&mut self) {
        unsafe {
            for companion in &self.companions {
                if IsWindow(*companion).as_bool() {
                    let _ = DestroyWindow(*companion);
                }
            }
            if IsWindow(self.hwnd).as_bool() {
                let _ = DestroyWindow(self.hwnd);
            }
        }
    }
}
