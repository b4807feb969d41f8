//! Notification dispatch state machine
//!
//! Every notification from the window manager ends up in
//! [`Dispatcher::handle`], which turns it into actions against the
//! registration manager, the bar's own window and the companion coordinator.

use log::{debug, info, warn};

use crate::appbar::{AppBarManager, AppBarShell};
use crate::companion::{CompanionCoordinator, WindowSurface};
use crate::error::{MenuBarError, MenuBarResult};
use crate::geometry::{compute_bar_rectangle, pixels_to_logical, DpiScale, Monitor, Rect};
use crate::notification::{ArrangePhase, Disposition, Notification};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarState {
    Unregistered,
    Registered,
    /// A full-screen app owns the top of the z-order
    Yielding,
}

/// State machine driving the primary bar and its companions
pub struct Dispatcher<W: WindowSurface, S: AppBarShell> {
    bar: W,
    appbar: AppBarManager<S>,
    companions: CompanionCoordinator<W, S>,
    monitor: Monitor,
    /// Configured thickness in logical units
    thickness: i32,
    reserve_space: bool,
    state: BarState,
    bar_rect: Rect,
    topmost: bool,
    /// Set once by `shutdown`; nothing claims space after that
    shutting_down: bool,
}

impl<W: WindowSurface, S: AppBarShell> Dispatcher<W, S> {
    pub fn new(
        bar: W,
        appbar: AppBarManager<S>,
        companions: CompanionCoordinator<W, S>,
        monitor: Monitor,
        thickness: i32,
        reserve_space: bool,
    ) -> Self {
        Self {
            bar,
            appbar,
            companions,
            monitor,
            thickness,
            reserve_space,
            state: BarState::Unregistered,
            bar_rect: Rect::default(),
            topmost: true,
            shutting_down: false,
        }
    }

    pub fn state(&self) -> BarState {
        self.state
    }

    pub fn bar_rect(&self) -> Rect {
        self.bar_rect
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn appbar(&self) -> &AppBarManager<S> {
        &self.appbar
    }

    pub fn companions(&self) -> &CompanionCoordinator<W, S> {
        &self.companions
    }

    pub fn bar(&self) -> &W {
        &self.bar
    }

    /// Place and show the bar, then reserve its space.
    ///
    /// Only invalid geometry is an error; a refused reservation leaves the
    /// bar floating.
    pub fn start(&mut self) -> MenuBarResult<()> {
        if self.shutting_down {
            debug!("Start ignored after shutdown");
            return Ok(());
        }
        self.appbar.set_scale(self.monitor.scale);
        let rect = self.target_rect()?;

        self.place_bar(rect);
        self.set_topmost(true);
        self.set_visible(true);

        if self.reserve_space {
            match self.appbar.register(&self.monitor.bounds, self.thickness) {
                Ok(_) => {
                    self.state = BarState::Registered;
                    self.bar_rect = self.appbar.registration().reserved;
                    self.place_bar(self.bar_rect);
                }
                Err(e @ MenuBarError::InvalidGeometry(_)) => return Err(e),
                Err(e) => warn!("Running without space reservation: {}", e),
            }
        } else {
            info!("Space reservation disabled, bar is floating");
        }

        self.refresh_work_area();
        if self.reserve_space {
            self.companions.register_taskbar(&self.monitor);
        }
        self.companions.sync_position(&self.bar_rect, &self.monitor);
        Ok(())
    }

    /// Handle one notification
    pub fn handle(&mut self, notification: Notification) -> Disposition {
        debug!("{:?} in state {:?}", notification, self.state);

        match notification {
            Notification::PosChanged => {
                self.on_pos_changed();
                Disposition::Consumed
            }
            Notification::FullScreenApp { entering } => {
                self.on_full_screen_app(entering);
                Disposition::Consumed
            }
            Notification::WindowArrange(phase) => {
                self.set_visible(phase == ArrangePhase::After);
                Disposition::Consumed
            }
            Notification::Activate => {
                self.appbar.activate();
                Disposition::PassThrough
            }
            Notification::WindowPosChanged => {
                self.appbar.window_pos_changed();
                Disposition::PassThrough
            }
            Notification::DpiChanged { dpi } => {
                self.on_dpi_changed(dpi);
                Disposition::PassThrough
            }
            Notification::DisplayChange { width, height } => {
                self.on_display_change(width, height);
                Disposition::Consumed
            }
            Notification::Other(_) => Disposition::PassThrough,
        }
    }

    /// Handle one notification addressed to the secondary taskbar's window
    pub fn handle_taskbar(&mut self, notification: Notification) -> Disposition {
        debug!("Taskbar {:?} in state {:?}", notification, self.state);
        self.companions.handle_taskbar(notification, &self.monitor)
    }

    /// Snap the bar back if something moved it off its edge
    pub fn enforce_anchor(&mut self, observed: Rect) -> bool {
        if observed.x == self.bar_rect.x && observed.y == self.bar_rect.y {
            return false;
        }
        debug!(
            "Bar moved to {:?}, snapping back to {:?}",
            observed, self.bar_rect
        );
        self.place_bar(self.bar_rect);
        self.companions.sync_position(&self.bar_rect, &self.monitor);
        true
    }

    /// The shell restarted and dropped every reservation: claim them again.
    ///
    /// A bar left floating by an earlier refusal gets another try.
    pub fn reclaim(&mut self) {
        if !self.reserve_space {
            return;
        }
        if self.shutting_down {
            debug!("Shell restart after shutdown, nothing to reclaim");
            return;
        }
        let Ok(rect) = self.target_rect() else {
            return;
        };

        let result = if self.appbar.is_registered() {
            self.appbar.reconcile(rect)
        } else {
            self.appbar
                .register(&self.monitor.bounds, self.thickness)
                .map(|_| self.appbar.registration().reserved)
        };

        self.companions.reclaim_taskbar(&self.monitor);
        match result {
            Ok(granted) => {
                if self.state == BarState::Unregistered {
                    info!("AppBar reservation reclaimed");
                    self.state = BarState::Registered;
                }
                self.apply_rect(granted);
            }
            Err(e) => {
                warn!("Could not reclaim AppBar reservation: {}", e);
                self.follow_registration();
            }
        }
        self.refresh_work_area();
    }

    /// Release every reservation held by the bar and its taskbar
    pub fn shutdown(&mut self, reset_work_area: bool) {
        self.shutting_down = true;
        if let Err(e) = self.appbar.unregister() {
            warn!("Failed to release AppBar reservation: {}", e);
        }
        self.companions.release();
        self.state = BarState::Unregistered;

        if reset_work_area {
            if let Err(e) = self.appbar.reset_work_area() {
                warn!("Failed to reset work area: {}", e);
            }
        }
    }

    fn on_pos_changed(&mut self) {
        if self.state == BarState::Unregistered {
            debug!("Position change ignored while unregistered");
            return;
        }
        let Ok(rect) = self.target_rect() else {
            return;
        };
        let granted = match self.appbar.reconcile(rect) {
            Ok(granted) => granted,
            Err(e) => {
                warn!("Failed to re-assert AppBar position: {}", e);
                rect
            }
        };
        self.follow_registration();
        self.apply_rect(granted);
    }

    fn on_full_screen_app(&mut self, entering: bool) {
        match (entering, self.state) {
            (true, BarState::Registered) => {
                info!("Full-screen app opened, leaving on-top");
                self.set_topmost(false);
                self.state = BarState::Yielding;
            }
            (false, BarState::Yielding) => {
                info!("Full-screen app closed, entering on-top");
                self.set_topmost(true);
                self.state = BarState::Registered;
            }
            (entering, state) => {
                debug!("Full-screen notice (entering={}) ignored in {:?}", entering, state);
            }
        }
    }

    fn on_dpi_changed(&mut self, dpi: u32) {
        let scale = match DpiScale::from_dpi(dpi) {
            Ok(scale) => scale,
            Err(e) => {
                warn!("Ignoring DPI change: {}", e);
                return;
            }
        };
        info!("DPI changed to {} (scale {})", dpi, scale.factor());
        self.monitor.scale = scale;
        self.appbar.set_scale(scale);
        self.reposition();
    }

    fn on_display_change(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            warn!("Ignoring display change to {}x{}", width, height);
            return;
        }
        let (logical_width, logical_height) = pixels_to_logical(width, height, self.monitor.scale);
        info!(
            "Display changed to {}x{} ({}x{} logical)",
            width, height, logical_width, logical_height
        );
        self.monitor.bounds = Rect::new(0, 0, width as i32, height as i32);
        self.reposition();
        self.refresh_work_area();
    }

    /// Recompute the bar rectangle and push it through the registration
    fn reposition(&mut self) {
        let Ok(rect) = self.target_rect() else {
            return;
        };
        let granted = match self.appbar.reposition(rect) {
            Ok(granted) => granted,
            Err(e) => {
                warn!("Failed to reposition AppBar: {}", e);
                rect
            }
        };
        self.follow_registration();
        self.apply_rect(granted);
    }

    fn apply_rect(&mut self, rect: Rect) {
        self.place_bar(rect);
        self.companions.sync_position(&rect, &self.monitor);
    }

    fn target_rect(&self) -> MenuBarResult<Rect> {
        compute_bar_rectangle(
            self.appbar.edge(),
            &self.monitor.bounds,
            self.thickness,
            self.monitor.scale,
        )
        .map_err(|e| {
            warn!("Cannot compute bar rectangle: {}", e);
            e
        })
    }

    /// Drop to Unregistered if the manager lost its reservation
    fn follow_registration(&mut self) {
        if self.state != BarState::Unregistered && !self.appbar.is_registered() {
            warn!("AppBar reservation lost, bar is floating");
            self.state = BarState::Unregistered;
            if !self.topmost {
                self.set_topmost(true);
            }
        }
    }

    fn refresh_work_area(&mut self) {
        match self.appbar.query_work_area(self.monitor.id) {
            Ok(area) => self.monitor.work_area = area,
            Err(e) => debug!("Work area query failed: {}", e),
        }
    }

    fn place_bar(&mut self, rect: Rect) {
        self.bar_rect = rect;
        if let Err(e) = self.bar.set_rect(&rect) {
            warn!("Failed to move bar to {:?}: {}", rect, e);
        }
    }

    fn set_topmost(&mut self, topmost: bool) {
        self.topmost = topmost;
        if let Err(e) = self.bar.set_topmost(topmost) {
            warn!("Failed to set bar topmost={}: {}", topmost, e);
        }
        self.companions.sync_topmost(topmost);
    }

    fn set_visible(&mut self, visible: bool) {
        if let Err(e) = self.bar.set_visible(visible) {
            warn!("Failed to set bar visible={}: {}", visible, e);
        }
        self.companions.sync_visible(visible);
    }
}
