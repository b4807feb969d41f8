//! Window state for the MenuBar host
//!
//! The window procedure reaches the menu bar through thread-local storage:
//! everything lives on the message-loop thread.

use std::cell::{Cell, RefCell};

use crate::app::MenuBar;
use crate::appbar::BookkeepingRelay;

use super::platform::{ServiceControlManager, Win32AppBarShell, Win32Window};

pub type HostMenuBar = MenuBar<Win32Window, Win32AppBarShell, ServiceControlManager>;
pub type HostRelay = BookkeepingRelay<Win32AppBarShell>;

/// Registered message ids the window procedure needs to recognize
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageIds {
    /// AppBar callback message
    pub appbar: u32,
    /// Broadcast when Explorer (re)creates the taskbar
    pub taskbar_created: u32,
}

thread_local! {
    static MENUBAR: RefCell<Option<HostMenuBar>> = const { RefCell::new(None) };
    static RELAY: RefCell<Option<HostRelay>> = const { RefCell::new(None) };
    static MESSAGE_IDS: Cell<MessageIds> = const {
        Cell::new(MessageIds { appbar: 0, taskbar_created: 0 })
    };
    static MAIN_HWND: Cell<isize> = const { Cell::new(0) };
}

/// Install the menu bar
pub fn set_menubar(menubar: HostMenuBar) {
    MENUBAR.with(|m| {
        *m.borrow_mut() = Some(menubar);
    });
}

/// Remove the menu bar (after the window is gone)
pub fn take_menubar() -> Option<HostMenuBar> {
    MENUBAR.with(|m| m.borrow_mut().take())
}

/// Access the menu bar.
///
/// Returns `None` when there is none, or when called re-entrantly from a
/// message sent while the bar is already being driven (e.g. the
/// `WM_WINDOWPOSCHANGED` a `SetWindowPos` call sends synchronously).
pub fn with_menubar<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&mut HostMenuBar) -> R,
{
    MENUBAR.with(|m| match m.try_borrow_mut() {
        Ok(mut guard) => guard.as_mut().map(f),
        Err(_) => None,
    })
}

/// Install the relay used while the menu bar is borrowed
pub fn set_relay(relay: HostRelay) {
    RELAY.with(|r| {
        *r.borrow_mut() = Some(relay);
    });
}

pub fn with_relay<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&mut HostRelay) -> R,
{
    RELAY.with(|r| match r.try_borrow_mut() {
        Ok(mut guard) => guard.as_mut().map(f),
        Err(_) => None,
    })
}

pub fn set_message_ids(ids: MessageIds) {
    MESSAGE_IDS.with(|m| m.set(ids));
}

pub fn message_ids() -> MessageIds {
    MESSAGE_IDS.with(|m| m.get())
}

pub fn set_main_hwnd(hwnd: isize) {
    MAIN_HWND.with(|h| h.set(hwnd));
}

pub fn main_hwnd() -> isize {
    MAIN_HWND.with(|h| h.get())
}
