//! Main application logic for MenuBar
//!
//! Ties the notification dispatcher, the search readiness probe and the
//! shutdown handshake together. Platform code builds one of these with real
//! windows and feeds it messages; tests build it with fakes.

use anyhow::Result;
use log::{info, warn};
use std::sync::Arc;

use crate::appbar::{AppBarManager, AppBarShell, BookkeepingRelay, WindowId};
use crate::companion::{CompanionCoordinator, WindowSurface};
use crate::config::Config;
use crate::dispatch::{BarState, Dispatcher};
use crate::geometry::Monitor;
use crate::notification::{Disposition, Notification};
use crate::probe::{ReadinessLatch, ReadinessProbe, ServiceStatusSource};
use crate::shutdown::{CloseDecision, ShutdownGate, ShutdownPhase};

/// Windows the bar coordinates, all created by the host
pub struct BarWindows<W> {
    pub bar: W,
    pub shadow: Option<W>,
    pub taskbar: Option<W>,
}

/// Main application state
pub struct MenuBar<W: WindowSurface, S: AppBarShell + Clone, Q: ServiceStatusSource> {
    config: Arc<Config>,
    dispatcher: Dispatcher<W, S>,
    probe: ReadinessProbe<Q>,
    shutdown: ShutdownGate,
}

impl<W, S, Q> MenuBar<W, S, Q>
where
    W: WindowSurface,
    S: AppBarShell + Clone,
    Q: ServiceStatusSource,
{
    /// Create a new menu bar over `windows` on `monitor`
    pub fn new(
        config: Arc<Config>,
        windows: BarWindows<W>,
        shell: S,
        status: Q,
        monitor: Monitor,
        latch: ReadinessLatch,
    ) -> Self {
        info!("Initializing MenuBar");

        let appearance = &config.appearance;
        let mut companions = CompanionCoordinator::new(
            appearance.edge,
            appearance.shadow_placement(),
            config.taskbar.placement(),
        );

        if let Some(shadow) = windows.shadow.filter(|_| appearance.shadow_enabled) {
            companions.attach_shadow(shadow);
        }
        if let Some(taskbar) = windows.taskbar.filter(|_| config.taskbar.enabled) {
            let appbar = AppBarManager::new(
                shell.clone(),
                taskbar.id(),
                config.taskbar.edge,
                monitor.scale,
            );
            companions.attach_taskbar(taskbar, appbar);
        }

        let appbar = AppBarManager::new(shell, windows.bar.id(), appearance.edge, monitor.scale);
        let dispatcher = Dispatcher::new(
            windows.bar,
            appbar,
            companions,
            monitor,
            appearance.bar_height as i32,
            config.behavior.reserve_space,
        );

        let probe = ReadinessProbe::new(
            status,
            config.search.service_name.clone(),
            config.search.probe_interval(),
            latch,
        );
        let shutdown = ShutdownGate::new(config.shutdown.max_close_deferrals);

        Self {
            config,
            dispatcher,
            probe,
            shutdown,
        }
    }

    /// Dock the bar and check the search service once.
    ///
    /// Returns true when the probe still needs its periodic timer.
    pub fn start(&mut self) -> Result<bool> {
        self.dispatcher.start()?;
        self.probe.poll();
        info!(
            "MenuBar started in state {:?} at {:?}",
            self.dispatcher.state(),
            self.dispatcher.bar_rect()
        );
        Ok(self.probe.is_active())
    }

    /// Feed one notification from the window procedure
    pub fn handle(&mut self, notification: Notification) -> Disposition {
        self.dispatcher.handle(notification)
    }

    /// Feed a notification received by `window`, which may be the bar, its
    /// secondary taskbar or a companion with nothing to do
    pub fn handle_window(&mut self, window: WindowId, notification: Notification) -> Disposition {
        if window == self.dispatcher.bar().id() {
            self.dispatcher.handle(notification)
        } else if Some(window) == self.dispatcher.companions().taskbar_window() {
            self.dispatcher.handle_taskbar(notification)
        } else {
            Disposition::PassThrough
        }
    }

    /// Relay for the bookkeeping of messages that arrive while the menu bar
    /// is busy moving one of its own windows
    pub fn relay(&self) -> BookkeepingRelay<S> {
        let appbar = self.dispatcher.appbar();
        let mut relay = BookkeepingRelay::new(appbar.shell().clone());
        relay.track(appbar.window(), appbar.handle_slot());
        if let Some(taskbar) = self.dispatcher.companions().taskbar_appbar() {
            relay.track(taskbar.window(), taskbar.handle_slot());
        }
        relay
    }

    /// Explorer restarted; reservations must be claimed again
    pub fn on_shell_restarted(&mut self) {
        info!("Shell restarted, reclaiming reservations");
        self.dispatcher.reclaim();
    }

    /// Timer tick for the readiness probe; false once the timer can stop
    pub fn poll_probe(&mut self) -> bool {
        self.probe.poll();
        self.probe.is_active()
    }

    /// Close request from the host
    pub fn request_close(&mut self) -> CloseDecision {
        self.shutdown.on_close_requested()
    }

    /// Release everything the bar holds before the process exits
    pub fn prepare_for_shutdown(&mut self) {
        self.shutdown.begin();
        self.probe.cancel();
        self.dispatcher
            .shutdown(self.config.behavior.reset_work_area_on_exit);
        self.shutdown.complete();
        info!("MenuBar cleanup finished");
    }

    /// Whether cleanup has already run
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.phase() == ShutdownPhase::Complete
    }

    /// Snap the bar back after an outside move
    pub fn on_moved(&mut self, observed: crate::geometry::Rect) {
        if self.dispatcher.enforce_anchor(observed) {
            warn!("Bar was moved off its edge");
        }
    }

    pub fn state(&self) -> BarState {
        self.dispatcher.state()
    }

    pub fn dispatcher(&self) -> &Dispatcher<W, S> {
        &self.dispatcher
    }

    pub fn probe(&self) -> &ReadinessProbe<Q> {
        &self.probe
    }

    /// Whether the search entry may be shown
    pub fn search_available(&self) -> bool {
        self.probe.latch().is_open()
    }
}
