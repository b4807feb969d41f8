//! Recording fakes for the shell, windows and service status

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use crate::appbar::{AppBarHandle, AppBarShell, WindowId};
use crate::companion::WindowSurface;
use crate::error::{MenuBarError, MenuBarResult};
use crate::geometry::{MonitorId, Rect, ScreenEdge};
use crate::probe::{ServiceStatus, ServiceStatusSource};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCall {
    Register(WindowId),
    QueryPos(AppBarHandle, Rect),
    SetPos(AppBarHandle, Rect),
    Remove(AppBarHandle),
    Activate(AppBarHandle),
    WindowPosChanged(AppBarHandle),
    ResetWorkArea,
}

#[derive(Default)]
struct ShellInner {
    next_handle: isize,
    deny: bool,
    fail_set_pos: bool,
    occupied_top: i32,
    work_area: Rect,
    known: HashMap<AppBarHandle, Option<Rect>>,
    calls: Vec<ShellCall>,
}

impl ShellInner {
    /// Push rectangles below whatever another AppBar holds at the top
    fn adjust(&self, rect: Rect) -> Rect {
        if rect.y < self.occupied_top {
            rect.with_origin(rect.x, self.occupied_top)
        } else {
            rect
        }
    }

    fn check(&self, handle: AppBarHandle) -> MenuBarResult<()> {
        if self.known.contains_key(&handle) {
            Ok(())
        } else {
            Err(MenuBarError::StaleHandle(handle))
        }
    }
}

/// Shell that records every call; clones share state
#[derive(Clone, Default)]
pub struct FakeShell(Rc<RefCell<ShellInner>>);

impl FakeShell {
    pub fn new() -> Self {
        let shell = Self::default();
        shell.0.borrow_mut().next_handle = 100;
        shell
    }

    pub fn deny_registration(&self) {
        self.0.borrow_mut().deny = true;
    }

    /// Every later `set_pos` fails
    pub fn fail_set_pos(&self) {
        self.0.borrow_mut().fail_set_pos = true;
    }

    pub fn allow_registration(&self) {
        self.0.borrow_mut().deny = false;
    }

    /// Pretend another AppBar holds the top `px` pixels
    pub fn occupy_top(&self, px: i32) {
        self.0.borrow_mut().occupied_top = px;
    }

    /// Pretend the shell restarted and lost every registration
    pub fn forget_all(&self) {
        self.0.borrow_mut().known.clear();
    }

    pub fn set_work_area(&self, rect: Rect) {
        self.0.borrow_mut().work_area = rect;
    }

    pub fn calls(&self) -> Vec<ShellCall> {
        self.0.borrow().calls.clone()
    }

    pub fn count<F: Fn(&ShellCall) -> bool>(&self, pred: F) -> usize {
        self.0.borrow().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn reservation(&self, handle: AppBarHandle) -> Option<Rect> {
        self.0.borrow().known.get(&handle).copied().flatten()
    }

    pub fn active_reservations(&self) -> usize {
        self.0
            .borrow()
            .known
            .values()
            .filter(|r| r.is_some())
            .count()
    }
}

impl AppBarShell for FakeShell {
    fn register(&mut self, window: WindowId) -> MenuBarResult<AppBarHandle> {
        let mut inner = self.0.borrow_mut();
        inner.calls.push(ShellCall::Register(window));
        if inner.deny {
            return Err(MenuBarError::RegistrationDenied("denied by test".into()));
        }
        inner.next_handle += 1;
        let handle = AppBarHandle(inner.next_handle);
        inner.known.insert(handle, None);
        Ok(handle)
    }

    fn query_pos(&mut self, handle: AppBarHandle, _edge: ScreenEdge, rect: Rect) -> MenuBarResult<Rect> {
        let mut inner = self.0.borrow_mut();
        inner.calls.push(ShellCall::QueryPos(handle, rect));
        inner.check(handle)?;
        Ok(inner.adjust(rect))
    }

    fn set_pos(&mut self, handle: AppBarHandle, _edge: ScreenEdge, rect: Rect) -> MenuBarResult<Rect> {
        let mut inner = self.0.borrow_mut();
        inner.calls.push(ShellCall::SetPos(handle, rect));
        inner.check(handle)?;
        if inner.fail_set_pos {
            return Err(MenuBarError::RegistrationDenied("position refused by test".into()));
        }
        let granted = inner.adjust(rect);
        inner.known.insert(handle, Some(granted));
        Ok(granted)
    }

    fn remove(&mut self, handle: AppBarHandle) -> MenuBarResult<()> {
        let mut inner = self.0.borrow_mut();
        inner.calls.push(ShellCall::Remove(handle));
        inner.check(handle)?;
        inner.known.remove(&handle);
        Ok(())
    }

    fn activate(&mut self, handle: AppBarHandle) {
        self.0.borrow_mut().calls.push(ShellCall::Activate(handle));
    }

    fn window_pos_changed(&mut self, handle: AppBarHandle) {
        self.0
            .borrow_mut()
            .calls
            .push(ShellCall::WindowPosChanged(handle));
    }

    fn query_work_area(&self, _monitor: MonitorId) -> MenuBarResult<Rect> {
        Ok(self.0.borrow().work_area)
    }

    fn reset_work_area(&mut self) -> MenuBarResult<()> {
        self.0.borrow_mut().calls.push(ShellCall::ResetWorkArea);
        Ok(())
    }
}

struct WindowInner {
    id: WindowId,
    rect: Option<Rect>,
    topmost: bool,
    visible: bool,
    alive: bool,
    fail_next: bool,
}

/// Window surface that remembers what it was told; clones share state
#[derive(Clone)]
pub struct FakeWindow(Rc<RefCell<WindowInner>>);

impl FakeWindow {
    pub fn new(id: isize) -> Self {
        Self(Rc::new(RefCell::new(WindowInner {
            id: WindowId(id),
            rect: None,
            topmost: false,
            visible: false,
            alive: true,
            fail_next: false,
        })))
    }

    pub fn rect(&self) -> Option<Rect> {
        self.0.borrow().rect
    }

    pub fn topmost(&self) -> bool {
        self.0.borrow().topmost
    }

    pub fn visible(&self) -> bool {
        self.0.borrow().visible
    }

    pub fn destroy(&self) {
        self.0.borrow_mut().alive = false;
    }

    pub fn revive(&self) {
        self.0.borrow_mut().alive = true;
    }

    /// Next command reports the window as gone even though `is_alive` said yes
    pub fn fail_next_command(&self) {
        self.0.borrow_mut().fail_next = true;
    }

    fn command<F: FnOnce(&mut WindowInner)>(&mut self, f: F) -> MenuBarResult<()> {
        let mut inner = self.0.borrow_mut();
        if !inner.alive || inner.fail_next {
            inner.fail_next = false;
            return Err(MenuBarError::WindowGone(inner.id));
        }
        f(&mut *inner);
        Ok(())
    }
}

impl WindowSurface for FakeWindow {
    fn id(&self) -> WindowId {
        self.0.borrow().id
    }

    fn set_rect(&mut self, rect: &Rect) -> MenuBarResult<()> {
        let rect = *rect;
        self.command(|w| w.rect = Some(rect))
    }

    fn set_topmost(&mut self, topmost: bool) -> MenuBarResult<()> {
        self.command(|w| w.topmost = topmost)
    }

    fn set_visible(&mut self, visible: bool) -> MenuBarResult<()> {
        self.command(|w| w.visible = visible)
    }

    fn is_alive(&self) -> bool {
        self.0.borrow().alive
    }
}

/// Status source that replays a script, then reports `Unknown`
#[derive(Clone)]
pub struct ScriptedStatus {
    script: Rc<RefCell<VecDeque<ServiceStatus>>>,
    queries: Rc<Cell<u32>>,
}

impl ScriptedStatus {
    pub fn new(script: &[ServiceStatus]) -> Self {
        Self {
            script: Rc::new(RefCell::new(script.iter().copied().collect())),
            queries: Rc::new(Cell::new(0)),
        }
    }

    pub fn queries(&self) -> u32 {
        self.queries.get()
    }
}

impl ServiceStatusSource for ScriptedStatus {
    fn query_status(&self, _service_name: &str) -> ServiceStatus {
        self.queries.set(self.queries.get() + 1);
        self.script
            .borrow_mut()
            .pop_front()
            .unwrap_or(ServiceStatus::Unknown)
    }
}
