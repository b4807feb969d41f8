//! AppBar registration with the shell
//!
//! Owns the lifecycle of a bar's space reservation: register, reposition,
//! unregister. The shell side of the protocol sits behind [`AppBarShell`] so
//! the manager can run against the real shell or a recording fake.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use log::{debug, info, warn};

use crate::error::{MenuBarError, MenuBarResult};
use crate::geometry::{compute_bar_rectangle, DpiScale, MonitorId, Rect, ScreenEdge};
use crate::notification::Notification;

/// Window identity as the shell sees it (an `HWND` value on Windows)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct WindowId(pub isize);

/// Token for a reservation held with the shell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AppBarHandle(pub isize);

impl fmt::Display for AppBarHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Shell side of the AppBar protocol
pub trait AppBarShell {
    /// Announce a new AppBar (`ABM_NEW`)
    fn register(&mut self, window: WindowId) -> MenuBarResult<AppBarHandle>;

    /// Ask where the shell would put `rect` on `edge` (`ABM_QUERYPOS`)
    fn query_pos(&mut self, handle: AppBarHandle, edge: ScreenEdge, rect: Rect)
        -> MenuBarResult<Rect>;

    /// Reserve `rect` on `edge`, returning what was granted (`ABM_SETPOS`)
    fn set_pos(&mut self, handle: AppBarHandle, edge: ScreenEdge, rect: Rect)
        -> MenuBarResult<Rect>;

    /// Release the reservation (`ABM_REMOVE`)
    fn remove(&mut self, handle: AppBarHandle) -> MenuBarResult<()>;

    /// `ABM_ACTIVATE`
    fn activate(&mut self, handle: AppBarHandle);

    /// `ABM_WINDOWPOSCHANGED`
    fn window_pos_changed(&mut self, handle: AppBarHandle);

    /// Current work area of a monitor
    fn query_work_area(&self, monitor: MonitorId) -> MenuBarResult<Rect>;

    /// Restore the desktop work area to the full monitor
    fn reset_work_area(&mut self) -> MenuBarResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    Unregistered,
    Registered,
}

/// Cached view of one bar's reservation
#[derive(Debug, Clone, PartialEq)]
pub struct BarRegistration {
    pub edge: ScreenEdge,
    /// Requested rectangle in logical units
    pub requested: Rect,
    /// Requested rectangle in device pixels, as last sent to the shell
    pub target: Rect,
    /// Rectangle the shell granted
    pub reserved: Rect,
    pub handle: Option<AppBarHandle>,
    pub state: RegistrationState,
}

impl BarRegistration {
    fn new(edge: ScreenEdge) -> Self {
        Self {
            edge,
            requested: Rect::default(),
            target: Rect::default(),
            reserved: Rect::default(),
            handle: None,
            state: RegistrationState::Unregistered,
        }
    }
}

/// Live handle of one manager, readable while the manager itself is busy
#[derive(Debug, Clone, Default)]
pub struct HandleSlot(Rc<Cell<Option<AppBarHandle>>>);

impl HandleSlot {
    pub fn get(&self) -> Option<AppBarHandle> {
        self.0.get()
    }

    fn set(&self, handle: Option<AppBarHandle>) {
        self.0.set(handle);
    }
}

/// Lifecycle of a single bar's reservation
pub struct AppBarManager<S: AppBarShell> {
    shell: S,
    window: WindowId,
    scale: DpiScale,
    registration: BarRegistration,
    slot: HandleSlot,
}

impl<S: AppBarShell> AppBarManager<S> {
    pub fn new(shell: S, window: WindowId, edge: ScreenEdge, scale: DpiScale) -> Self {
        Self {
            shell,
            window,
            scale,
            registration: BarRegistration::new(edge),
            slot: HandleSlot::default(),
        }
    }

    pub fn window(&self) -> WindowId {
        self.window
    }

    /// Shared view of the current handle
    pub fn handle_slot(&self) -> HandleSlot {
        self.slot.clone()
    }

    pub fn registration(&self) -> &BarRegistration {
        &self.registration
    }

    pub fn is_registered(&self) -> bool {
        self.registration.state == RegistrationState::Registered
    }

    pub fn edge(&self) -> ScreenEdge {
        self.registration.edge
    }

    pub fn shell(&self) -> &S {
        &self.shell
    }

    pub fn set_scale(&mut self, scale: DpiScale) {
        self.scale = scale;
    }

    /// Reserve a bar `thickness` logical units thick on the manager's edge of `area`.
    ///
    /// On `RegistrationDenied` the cached rectangle is still updated so the
    /// caller can show the bar floating.
    pub fn register(&mut self, area: &Rect, thickness: i32) -> MenuBarResult<AppBarHandle> {
        let rect = compute_bar_rectangle(self.registration.edge, area, thickness, self.scale)?;

        if let Some(handle) = self.registration.handle {
            self.reposition(rect)?;
            return Ok(handle);
        }

        self.cache(rect, rect);
        self.register_rect(rect)
    }

    /// Re-assert the reservation at `rect` (device pixels).
    ///
    /// A rectangle equal to the last one sent does not reach the shell again.
    pub fn reposition(&mut self, rect: Rect) -> MenuBarResult<Rect> {
        Self::validate(&rect)?;

        let Some(handle) = self.registration.handle else {
            self.cache(rect, rect);
            return Ok(rect);
        };

        if rect == self.registration.target {
            debug!("AppBar {} already at {:?}", handle, rect);
            self.cache(rect, self.registration.reserved);
            return Ok(self.registration.reserved);
        }

        self.apply(handle, rect)
    }

    /// Compare the shell's proposal for `rect` with the cached reservation and
    /// re-assert it when they disagree.
    pub fn reconcile(&mut self, rect: Rect) -> MenuBarResult<Rect> {
        Self::validate(&rect)?;

        let Some(handle) = self.registration.handle else {
            self.cache(rect, rect);
            return Ok(rect);
        };

        match self.shell.query_pos(handle, self.registration.edge, rect) {
            Ok(proposal)
                if proposal == self.registration.reserved && rect == self.registration.target =>
            {
                debug!("AppBar {} reservation still matches {:?}", handle, proposal);
                Ok(proposal)
            }
            Ok(_) => self.apply(handle, rect),
            Err(MenuBarError::StaleHandle(_)) => self.recover(rect),
            Err(e) => Err(e),
        }
    }

    /// Release the reservation; later calls are no-ops
    pub fn unregister(&mut self) -> MenuBarResult<()> {
        let Some(handle) = self.registration.handle.take() else {
            return Ok(());
        };
        self.registration.state = RegistrationState::Unregistered;
        self.slot.set(None);

        match self.shell.remove(handle) {
            Ok(()) => {
                info!("AppBar {} unregistered", handle);
                Ok(())
            }
            // Already gone on the shell side
            Err(MenuBarError::StaleHandle(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Forward `WM_ACTIVATE` bookkeeping to the shell
    pub fn activate(&mut self) {
        if let Some(handle) = self.registration.handle {
            self.shell.activate(handle);
        }
    }

    /// Forward `WM_WINDOWPOSCHANGED` bookkeeping to the shell
    pub fn window_pos_changed(&mut self) {
        if let Some(handle) = self.registration.handle {
            self.shell.window_pos_changed(handle);
        }
    }

    pub fn query_work_area(&self, monitor: MonitorId) -> MenuBarResult<Rect> {
        self.shell.query_work_area(monitor)
    }

    pub fn reset_work_area(&mut self) -> MenuBarResult<()> {
        self.shell.reset_work_area()
    }

    fn register_rect(&mut self, rect: Rect) -> MenuBarResult<AppBarHandle> {
        let handle = match self.shell.register(self.window) {
            Ok(handle) => handle,
            Err(e) => {
                warn!("AppBar registration failed, bar stays floating: {}", e);
                return Err(e);
            }
        };

        let granted = self
            .shell
            .query_pos(handle, self.registration.edge, rect)
            .and_then(|proposal| self.shell.set_pos(handle, self.registration.edge, proposal));

        match granted {
            Ok(granted) => {
                self.registration.handle = Some(handle);
                self.registration.state = RegistrationState::Registered;
                self.slot.set(Some(handle));
                self.cache(rect, granted);
                info!(
                    "AppBar {} registered on {:?} at {:?}",
                    handle, self.registration.edge, granted
                );
                Ok(handle)
            }
            Err(e) => {
                warn!("Shell refused AppBar position, bar stays floating: {}", e);
                if let Err(remove_err) = self.shell.remove(handle) {
                    warn!("Failed to roll back AppBar {}: {}", handle, remove_err);
                }
                Err(MenuBarError::RegistrationDenied(e.to_string()))
            }
        }
    }

    fn apply(&mut self, handle: AppBarHandle, rect: Rect) -> MenuBarResult<Rect> {
        match self.shell.set_pos(handle, self.registration.edge, rect) {
            Ok(granted) => {
                debug!("AppBar {} moved to {:?}", handle, granted);
                self.cache(rect, granted);
                Ok(granted)
            }
            Err(MenuBarError::StaleHandle(_)) => self.recover(rect),
            Err(e) => Err(e),
        }
    }

    /// The shell forgot our handle (e.g. Explorer restarted): start over.
    fn recover(&mut self, rect: Rect) -> MenuBarResult<Rect> {
        warn!(
            "AppBar handle {:?} went stale, registering again",
            self.registration.handle
        );
        self.registration.handle = None;
        self.registration.state = RegistrationState::Unregistered;
        self.slot.set(None);
        self.cache(rect, rect);
        self.register_rect(rect)?;
        Ok(self.registration.reserved)
    }

    fn cache(&mut self, target: Rect, reserved: Rect) {
        let (width, height) = (
            self.scale.to_logical(target.width),
            self.scale.to_logical(target.height),
        );
        self.registration.requested = Rect::new(
            self.scale.to_logical(target.x),
            self.scale.to_logical(target.y),
            width,
            height,
        );
        self.registration.target = target;
        self.registration.reserved = reserved;
    }

    fn validate(rect: &Rect) -> MenuBarResult<()> {
        if rect.is_empty() {
            return Err(MenuBarError::InvalidGeometry(format!(
                "cannot reserve an empty rectangle: {:?}",
                rect
            )));
        }
        Ok(())
    }
}

/// Forwards activation and move bookkeeping to the shell on behalf of
/// managers that cannot be reached right now (a message sent to the window
/// while its own manager is in the middle of moving it).
pub struct BookkeepingRelay<S> {
    shell: S,
    bars: Vec<(WindowId, HandleSlot)>,
}

impl<S: AppBarShell> BookkeepingRelay<S> {
    pub fn new(shell: S) -> Self {
        Self {
            shell,
            bars: Vec::new(),
        }
    }

    pub fn track(&mut self, window: WindowId, slot: HandleSlot) {
        self.bars.push((window, slot));
    }

    /// Forward `notification` for `window`; false when nothing was sent
    pub fn forward(&mut self, window: WindowId, notification: &Notification) -> bool {
        let Some(handle) = self
            .bars
            .iter()
            .find(|(id, _)| *id == window)
            .and_then(|(_, slot)| slot.get())
        else {
            return false;
        };

        match notification {
            Notification::Activate => self.shell.activate(handle),
            Notification::WindowPosChanged => self.shell.window_pos_changed(handle),
            _ => return false,
        }
        debug!("Relayed {:?} for AppBar {}", notification, handle);
        true
    }
}
