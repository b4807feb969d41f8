//! Companion windows that follow the primary bar
//!
//! The coordinator never owns its companions: it holds non-owning references
//! and issues idempotent "set state to X" commands after the bar moves,
//! yields or hides. A companion whose window has gone away is skipped for the
//! rest of the session.

use std::fmt;

use log::{debug, warn};

use crate::appbar::{AppBarManager, AppBarShell, WindowId};
use crate::error::{MenuBarError, MenuBarResult};
use crate::geometry::{compute_bar_rectangle, logical_to_pixels, Monitor, Rect, ScreenEdge};
use crate::notification::{Disposition, Notification};

/// Control surface of a window whose placement someone else decides
pub trait WindowSurface {
    fn id(&self) -> WindowId;

    fn set_rect(&mut self, rect: &Rect) -> MenuBarResult<()>;

    fn set_topmost(&mut self, topmost: bool) -> MenuBarResult<()>;

    fn set_visible(&mut self, visible: bool) -> MenuBarResult<()>;

    /// False once the underlying window has been destroyed
    fn is_alive(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompanionRole {
    Shadow,
    SecondaryTaskbar,
}

impl fmt::Display for CompanionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompanionRole::Shadow => write!(f, "shadow"),
            CompanionRole::SecondaryTaskbar => write!(f, "secondary taskbar"),
        }
    }
}

/// A window positioned from the bar, never reserved itself
pub struct CompanionWindow<W> {
    pub window: W,
    pub role: CompanionRole,
    pub topmost: bool,
    pub last_synced: Option<Rect>,
    available: bool,
}

impl<W: WindowSurface> CompanionWindow<W> {
    pub fn new(window: W, role: CompanionRole) -> Self {
        Self {
            window,
            role,
            topmost: true,
            last_synced: None,
            available: true,
        }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Run `op` against the window, retiring the companion if it is gone
    fn command<F>(&mut self, what: &str, op: F) -> MenuBarResult<()>
    where
        F: FnOnce(&mut W) -> MenuBarResult<()>,
    {
        if !self.available {
            return Err(MenuBarError::CompanionUnavailable(self.role));
        }
        if !self.window.is_alive() {
            return Err(self.retire(what));
        }
        match op(&mut self.window) {
            Ok(()) => Ok(()),
            Err(MenuBarError::WindowGone(_)) => Err(self.retire(what)),
            Err(e) => Err(e),
        }
    }

    fn retire(&mut self, what: &str) -> MenuBarError {
        warn!(
            "{} window {:?} is gone ({}), skipping it from now on",
            self.role,
            self.window.id(),
            what
        );
        self.available = false;
        MenuBarError::CompanionUnavailable(self.role)
    }
}

/// Placement of the shadow relative to the bar, in logical units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowPlacement {
    /// Thickness of the shadow strip
    pub thickness: i32,
    /// How far the strip reaches back under the bar
    pub overlap: i32,
}

/// Placement of the secondary taskbar, in logical units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskbarPlacement {
    pub edge: ScreenEdge,
    pub thickness: i32,
}

/// Shadow strip on the inner side of a bar docked on `edge`
pub fn shadow_rect(primary: &Rect, edge: ScreenEdge, placement: ShadowPlacement, monitor: &Monitor) -> Rect {
    let (t, o) = logical_to_pixels(placement.thickness, placement.overlap, monitor.scale);
    match edge {
        ScreenEdge::Top => Rect::new(primary.x, primary.bottom() - o, primary.width, t),
        ScreenEdge::Bottom => Rect::new(primary.x, primary.y + o - t, primary.width, t),
        ScreenEdge::Left => Rect::new(primary.right() - o, primary.y, t, primary.height),
        ScreenEdge::Right => Rect::new(primary.x + o - t, primary.y, t, primary.height),
    }
}

/// Keeps the shadow and secondary taskbar consistent with the primary bar
pub struct CompanionCoordinator<W, S: AppBarShell> {
    primary_edge: ScreenEdge,
    shadow_placement: ShadowPlacement,
    taskbar_placement: TaskbarPlacement,
    companions: Vec<CompanionWindow<W>>,
    /// The secondary taskbar's own reservation
    taskbar_appbar: Option<AppBarManager<S>>,
}

impl<W: WindowSurface, S: AppBarShell> CompanionCoordinator<W, S> {
    pub fn new(
        primary_edge: ScreenEdge,
        shadow_placement: ShadowPlacement,
        taskbar_placement: TaskbarPlacement,
    ) -> Self {
        Self {
            primary_edge,
            shadow_placement,
            taskbar_placement,
            companions: Vec::new(),
            taskbar_appbar: None,
        }
    }

    /// Attach the shadow window
    pub fn attach_shadow(&mut self, window: W) {
        self.companions.retain(|c| c.role != CompanionRole::Shadow);
        self.companions.push(CompanionWindow::new(window, CompanionRole::Shadow));
    }

    /// Attach the secondary taskbar together with its own registration manager
    pub fn attach_taskbar(&mut self, window: W, appbar: AppBarManager<S>) {
        self.companions
            .retain(|c| c.role != CompanionRole::SecondaryTaskbar);
        self.companions
            .push(CompanionWindow::new(window, CompanionRole::SecondaryTaskbar));
        self.taskbar_appbar = Some(appbar);
    }

    pub fn companions(&self) -> &[CompanionWindow<W>] {
        &self.companions
    }

    pub fn companion(&self, role: CompanionRole) -> Option<&CompanionWindow<W>> {
        self.companions.iter().find(|c| c.role == role)
    }

    pub fn taskbar_appbar(&self) -> Option<&AppBarManager<S>> {
        self.taskbar_appbar.as_ref()
    }

    /// Window of the secondary taskbar, when one is attached
    pub fn taskbar_window(&self) -> Option<WindowId> {
        self.taskbar_appbar.as_ref().map(|appbar| appbar.window())
    }

    /// Number of companions still reachable
    #[cfg(test)]
    pub fn live_count(&self) -> usize {
        self.companions.iter().filter(|c| c.available).count()
    }

    /// Register the secondary taskbar's reservation on `monitor`
    pub fn register_taskbar(&mut self, monitor: &Monitor) {
        let thickness = self.taskbar_placement.thickness;
        if let Some(appbar) = self.taskbar_appbar.as_mut() {
            appbar.set_scale(monitor.scale);
            if let Err(e) = appbar.register(&monitor.bounds, thickness) {
                warn!("Secondary taskbar stays floating: {}", e);
            }
        }
    }

    /// Claim the secondary taskbar's reservation again after a shell restart
    pub fn reclaim_taskbar(&mut self, monitor: &Monitor) {
        let placement = self.taskbar_placement;
        let Some(appbar) = self.taskbar_appbar.as_mut() else {
            return;
        };
        appbar.set_scale(monitor.scale);

        let result = if appbar.is_registered() {
            compute_bar_rectangle(placement.edge, &monitor.bounds, placement.thickness, monitor.scale)
                .and_then(|rect| appbar.reconcile(rect))
                .map(|_| ())
        } else {
            appbar.register(&monitor.bounds, placement.thickness).map(|_| ())
        };
        if let Err(e) = result {
            warn!("Secondary taskbar stays floating: {}", e);
        }
    }

    /// Handle a notification sent to the secondary taskbar's own window.
    ///
    /// Full-screen and arrange notices are already acted on through the
    /// primary bar, so the taskbar's copies are swallowed.
    pub fn handle_taskbar(&mut self, notification: Notification, monitor: &Monitor) -> Disposition {
        let Some(appbar) = self.taskbar_appbar.as_mut() else {
            return Disposition::PassThrough;
        };

        match notification {
            Notification::Activate => {
                appbar.activate();
                Disposition::PassThrough
            }
            Notification::WindowPosChanged => {
                appbar.window_pos_changed();
                Disposition::PassThrough
            }
            Notification::PosChanged => {
                self.reconcile_taskbar(monitor);
                Disposition::Consumed
            }
            Notification::FullScreenApp { .. } | Notification::WindowArrange(_) => {
                Disposition::Consumed
            }
            _ => Disposition::PassThrough,
        }
    }

    /// Reposition every live companion after the primary bar moved to `primary`
    pub fn sync_position(&mut self, primary: &Rect, monitor: &Monitor) {
        let shadow = shadow_rect(primary, self.primary_edge, self.shadow_placement, monitor);
        let taskbar = self.taskbar_rect(monitor);

        for companion in self.companions.iter_mut() {
            let rect = match companion.role {
                CompanionRole::Shadow => shadow,
                CompanionRole::SecondaryTaskbar => match taskbar {
                    Some(rect) => rect,
                    None => continue,
                },
            };
            if companion.command("set_rect", |w| w.set_rect(&rect)).is_ok() {
                debug!("{} synced to {:?}", companion.role, rect);
                companion.last_synced = Some(rect);
            }
        }
    }

    /// Give every live companion the bar's topmost flag
    pub fn sync_topmost(&mut self, topmost: bool) {
        for companion in self.companions.iter_mut() {
            if companion
                .command("set_topmost", |w| w.set_topmost(topmost))
                .is_ok()
            {
                companion.topmost = topmost;
            }
        }
    }

    /// Show or hide every live companion along with the bar
    pub fn sync_visible(&mut self, visible: bool) {
        for companion in self.companions.iter_mut() {
            let _ = companion.command("set_visible", |w| w.set_visible(visible));
        }
    }

    /// Drop the secondary taskbar's reservation (shutdown)
    pub fn release(&mut self) {
        if let Some(appbar) = self.taskbar_appbar.as_mut() {
            if let Err(e) = appbar.unregister() {
                warn!("Failed to release secondary taskbar reservation: {}", e);
            }
        }
    }

    /// Re-assert the taskbar reservation after the shell moved things around
    fn reconcile_taskbar(&mut self, monitor: &Monitor) {
        let placement = self.taskbar_placement;
        let Some(appbar) = self.taskbar_appbar.as_mut() else {
            return;
        };
        if !appbar.is_registered() {
            debug!("Secondary taskbar is floating, position change ignored");
            return;
        }
        let rect = match compute_bar_rectangle(
            placement.edge,
            &monitor.bounds,
            placement.thickness,
            monitor.scale,
        ) {
            Ok(rect) => rect,
            Err(e) => {
                warn!("Cannot place secondary taskbar: {}", e);
                return;
            }
        };

        appbar.set_scale(monitor.scale);
        let granted = match appbar.reconcile(rect) {
            Ok(granted) => granted,
            Err(e) => {
                warn!("Failed to re-assert secondary taskbar position: {}", e);
                rect
            }
        };

        let taskbar = self
            .companions
            .iter_mut()
            .find(|c| c.role == CompanionRole::SecondaryTaskbar);
        if let Some(companion) = taskbar {
            if companion.command("set_rect", |w| w.set_rect(&granted)).is_ok() {
                companion.last_synced = Some(granted);
            }
        }
    }

    fn taskbar_rect(&mut self, monitor: &Monitor) -> Option<Rect> {
        let placement = self.taskbar_placement;
        let rect = match compute_bar_rectangle(
            placement.edge,
            &monitor.bounds,
            placement.thickness,
            monitor.scale,
        ) {
            Ok(rect) => rect,
            Err(e) => {
                warn!("Cannot place secondary taskbar: {}", e);
                return None;
            }
        };

        let Some(appbar) = self.taskbar_appbar.as_mut() else {
            return Some(rect);
        };
        appbar.set_scale(monitor.scale);
        match appbar.reposition(rect) {
            Ok(granted) => Some(granted),
            Err(e) => {
                warn!("Secondary taskbar reposition failed: {}", e);
                Some(rect)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{DpiScale, MonitorId};
    use crate::testing::{FakeShell, FakeWindow, ShellCall};

    fn monitor() -> Monitor {
        let bounds = Rect::new(0, 0, 1920, 1080);
        Monitor::new(MonitorId(1), bounds, bounds, DpiScale::IDENTITY)
    }

    fn coordinator() -> CompanionCoordinator<FakeWindow, FakeShell> {
        CompanionCoordinator::new(
            ScreenEdge::Top,
            ShadowPlacement {
                thickness: 14,
                overlap: 4,
            },
            TaskbarPlacement {
                edge: ScreenEdge::Bottom,
                thickness: 30,
            },
        )
    }

    #[test]
    fn shadow_sits_beneath_the_bar() {
        let mut coord = coordinator();
        let shadow = FakeWindow::new(2);
        coord.attach_shadow(shadow.clone());

        coord.sync_position(&Rect::new(0, 0, 1920, 23), &monitor());

        assert_eq!(shadow.rect(), Some(Rect::new(0, 19, 1920, 14)));
        assert_eq!(
            coord.companion(CompanionRole::Shadow).unwrap().last_synced,
            Some(Rect::new(0, 19, 1920, 14))
        );
    }

    #[test]
    fn shadow_scales_with_dpi() {
        let mut coord = coordinator();
        let shadow = FakeWindow::new(2);
        coord.attach_shadow(shadow.clone());
        let mut mon = monitor();
        mon.scale = DpiScale::new(2.0).unwrap();

        coord.sync_position(&Rect::new(0, 0, 1920, 46), &mon);

        assert_eq!(shadow.rect(), Some(Rect::new(0, 38, 1920, 28)));
    }

    #[test]
    fn taskbar_is_placed_on_its_own_edge_and_reserved() {
        let shell = FakeShell::new();
        let mut coord = coordinator();
        let taskbar = FakeWindow::new(3);
        let appbar = AppBarManager::new(
            shell.clone(),
            taskbar.id(),
            ScreenEdge::Bottom,
            DpiScale::IDENTITY,
        );
        coord.attach_taskbar(taskbar.clone(), appbar);

        coord.register_taskbar(&monitor());
        coord.sync_position(&Rect::new(0, 0, 1920, 23), &monitor());

        assert_eq!(taskbar.rect(), Some(Rect::new(0, 1050, 1920, 30)));
        assert!(coord.taskbar_appbar().unwrap().is_registered());
        assert_eq!(shell.active_reservations(), 1);
    }

    fn attached_taskbar(shell: &FakeShell) -> (CompanionCoordinator<FakeWindow, FakeShell>, FakeWindow) {
        let mut coord = coordinator();
        let taskbar = FakeWindow::new(3);
        let appbar = AppBarManager::new(shell.clone(), taskbar.id(), ScreenEdge::Bottom, DpiScale::IDENTITY);
        coord.attach_taskbar(taskbar.clone(), appbar);
        coord.register_taskbar(&monitor());
        coord.sync_position(&Rect::new(0, 0, 1920, 23), &monitor());
        (coord, taskbar)
    }

    #[test]
    fn taskbar_window_bookkeeping_reaches_its_own_reservation() {
        let shell = FakeShell::new();
        let (mut coord, taskbar) = attached_taskbar(&shell);
        let handle = coord.taskbar_appbar().unwrap().registration().handle.unwrap();

        assert_eq!(coord.taskbar_window(), Some(taskbar.id()));
        assert_eq!(
            coord.handle_taskbar(Notification::Activate, &monitor()),
            Disposition::PassThrough
        );
        assert_eq!(
            coord.handle_taskbar(Notification::WindowPosChanged, &monitor()),
            Disposition::PassThrough
        );

        assert_eq!(shell.count(|c| *c == ShellCall::Activate(handle)), 1);
        assert_eq!(shell.count(|c| *c == ShellCall::WindowPosChanged(handle)), 1);
    }

    #[test]
    fn taskbar_pos_changed_reconciles_and_moves_window() {
        let shell = FakeShell::new();
        let (mut coord, taskbar) = attached_taskbar(&shell);
        let handle = coord.taskbar_appbar().unwrap().registration().handle.unwrap();

        shell.forget_all();
        let d = coord.handle_taskbar(Notification::PosChanged, &monitor());

        assert_eq!(d, Disposition::Consumed);
        let appbar = coord.taskbar_appbar().unwrap();
        assert!(appbar.is_registered());
        assert_ne!(appbar.registration().handle, Some(handle));
        assert_eq!(shell.active_reservations(), 1);
        assert_eq!(taskbar.rect(), Some(Rect::new(0, 1050, 1920, 30)));
    }

    #[test]
    fn taskbar_swallows_notices_the_bar_handles() {
        let shell = FakeShell::new();
        let (mut coord, taskbar) = attached_taskbar(&shell);
        let calls = shell.calls().len();

        assert_eq!(
            coord.handle_taskbar(Notification::FullScreenApp { entering: true }, &monitor()),
            Disposition::Consumed
        );
        assert_eq!(
            coord.handle_taskbar(Notification::DisplayChange { width: 800, height: 600 }, &monitor()),
            Disposition::PassThrough
        );
        assert_eq!(shell.calls().len(), calls);
        assert_eq!(taskbar.rect(), Some(Rect::new(0, 1050, 1920, 30)));
    }

    #[test]
    fn no_taskbar_means_pass_through() {
        let mut coord = coordinator();
        assert_eq!(coord.taskbar_window(), None);
        assert_eq!(
            coord.handle_taskbar(Notification::PosChanged, &monitor()),
            Disposition::PassThrough
        );
    }

    #[test]
    fn topmost_reaches_every_companion() {
        let mut coord = coordinator();
        let shadow = FakeWindow::new(2);
        let taskbar = FakeWindow::new(3);
        coord.attach_shadow(shadow.clone());
        coord.attach_taskbar(
            taskbar.clone(),
            AppBarManager::new(FakeShell::new(), taskbar.id(), ScreenEdge::Bottom, DpiScale::IDENTITY),
        );

        coord.sync_topmost(false);
        assert!(!shadow.topmost());
        assert!(!taskbar.topmost());
        assert!(coord.companions().iter().all(|c| !c.topmost));

        coord.sync_topmost(true);
        assert!(shadow.topmost());
        assert!(taskbar.topmost());
    }

    #[test]
    fn destroyed_companion_is_skipped_for_the_session() {
        let mut coord = coordinator();
        let shadow = FakeWindow::new(2);
        let taskbar = FakeWindow::new(3);
        coord.attach_shadow(shadow.clone());
        coord.attach_taskbar(
            taskbar.clone(),
            AppBarManager::new(FakeShell::new(), taskbar.id(), ScreenEdge::Bottom, DpiScale::IDENTITY),
        );

        shadow.destroy();
        coord.sync_topmost(false);

        assert!(!taskbar.topmost());
        assert_eq!(coord.live_count(), 1);
        assert!(!coord.companion(CompanionRole::Shadow).unwrap().is_available());

        // Still skipped after the window handle would be reused
        shadow.revive();
        coord.sync_topmost(true);
        assert!(!shadow.topmost());
        assert!(taskbar.topmost());
    }

    #[test]
    fn window_gone_error_retires_companion() {
        let mut coord = coordinator();
        let shadow = FakeWindow::new(2);
        coord.attach_shadow(shadow.clone());

        shadow.fail_next_command();
        coord.sync_visible(false);

        assert_eq!(coord.live_count(), 0);
    }

    #[test]
    fn visibility_follows_the_bar() {
        let mut coord = coordinator();
        let shadow = FakeWindow::new(2);
        coord.attach_shadow(shadow.clone());

        coord.sync_visible(false);
        assert!(!shadow.visible());
        coord.sync_visible(true);
        assert!(shadow.visible());
    }
}
