//! Window procedure for handling Windows messages
//!
//! Messages are decoded into [`Notification`]s and fed to the menu bar,
//! which routes them by window. Timer, close and restart handling only apply
//! to the bar window.

use log::{debug, info, warn};
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::UI::WindowsAndMessaging::*;

use crate::appbar::WindowId;
use crate::geometry::Rect;
use crate::notification::{Disposition, Notification, RawMessage};
use crate::shutdown::CloseDecision;

use super::manager::PROBE_TIMER_ID;
use super::state::{main_hwnd, message_ids, with_menubar, with_relay};

/// Window procedure for handling Windows messages
pub unsafe extern "system" fn window_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    if hwnd.0 as isize != main_hwnd() {
        return dispatch(hwnd, msg, wparam, lparam);
    }

    let ids = message_ids();
    if ids.taskbar_created != 0 && msg == ids.taskbar_created {
        with_menubar(|menubar| {
            menubar.dispatcher().appbar().shell().forget_all();
            menubar.on_shell_restarted();
        });
        return LRESULT(0);
    }

    match msg {
        WM_TIMER if wparam.0 == PROBE_TIMER_ID => {
            let keep_polling = with_menubar(|menubar| menubar.poll_probe()).unwrap_or(true);
            if !keep_polling {
                let available = with_menubar(|menubar| menubar.search_available()).unwrap_or(false);
                debug!("Search probe finished (available={}), stopping timer", available);
                let _ = KillTimer(hwnd, PROBE_TIMER_ID);
            }
            LRESULT(0)
        }

        WM_WINDOWPOSCHANGED => {
            // Moves made by the bar itself arrive while the menu bar is
            // borrowed, so the anchor guard only sees outside moves. Their
            // shell bookkeeping still goes out through the relay.
            let pos = &*(lparam.0 as *const WINDOWPOS);
            if !pos.flags.contains(SWP_NOMOVE) {
                let observed = Rect::new(pos.x, pos.y, pos.cx, pos.cy);
                with_menubar(|menubar| menubar.on_moved(observed));
            }
            dispatch(hwnd, msg, wparam, lparam)
        }

        WM_CLOSE => {
            let decision = with_menubar(|menubar| menubar.request_close())
                .unwrap_or(CloseDecision::Proceed);
            match decision {
                CloseDecision::Defer => {
                    with_menubar(|menubar| menubar.prepare_for_shutdown());
                    if let Err(e) = PostMessageW(hwnd, WM_CLOSE, WPARAM(0), LPARAM(0)) {
                        warn!("Could not re-post close request: {}", e);
                        let _ = DestroyWindow(hwnd);
                    }
                }
                CloseDecision::Proceed => {
                    let _ = KillTimer(hwnd, PROBE_TIMER_ID);
                    let _ = DestroyWindow(hwnd);
                }
            }
            LRESULT(0)
        }

        WM_DESTROY => {
            info!("Window destroyed, quitting application");
            PostQuitMessage(0);
            LRESULT(0)
        }

        _ => dispatch(hwnd, msg, wparam, lparam),
    }
}

/// Run a message through the menu bar, falling back to default processing
unsafe fn dispatch(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    let raw = RawMessage::new(msg, wparam.0, lparam.0);
    let notification = Notification::decode(Some(message_ids().appbar), raw);
    if let Notification::Other(_) = notification {
        return DefWindowProcW(hwnd, msg, wparam, lparam);
    }

    let window = WindowId(hwnd.0 as isize);
    let disposition = match with_menubar(|menubar| menubar.handle_window(window, notification)) {
        Some(disposition) => disposition,
        None => {
            // Sent synchronously by one of our own window calls
            with_relay(|relay| relay.forward(window, &notification));
            Disposition::PassThrough
        }
    };

    match disposition {
        Disposition::Consumed => LRESULT(0),
        Disposition::PassThrough => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}
