//! Shutdown handshake
//!
//! A close request that arrives before cleanup has run is deferred so the
//! bar can release its reservation first, but only a bounded number of
//! times: the host is never kept alive indefinitely.

use log::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    Running,
    Pending,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDecision {
    /// Let the window close now
    Proceed,
    /// Run cleanup first and ask again
    Defer,
}

pub struct ShutdownGate {
    phase: ShutdownPhase,
    deferrals: u32,
    max_deferrals: u32,
}

impl ShutdownGate {
    pub fn new(max_deferrals: u32) -> Self {
        Self {
            phase: ShutdownPhase::Running,
            deferrals: 0,
            max_deferrals,
        }
    }

    pub fn phase(&self) -> ShutdownPhase {
        self.phase
    }

    #[cfg(test)]
    pub fn deferrals(&self) -> u32 {
        self.deferrals
    }

    /// Cleanup has started
    pub fn begin(&mut self) {
        if self.phase == ShutdownPhase::Running {
            self.phase = ShutdownPhase::Pending;
        }
    }

    /// Cleanup has finished
    pub fn complete(&mut self) {
        self.phase = ShutdownPhase::Complete;
    }

    /// Decide what to do with a close request
    pub fn on_close_requested(&mut self) -> CloseDecision {
        if self.phase == ShutdownPhase::Complete {
            return CloseDecision::Proceed;
        }
        if self.deferrals >= self.max_deferrals {
            warn!(
                "Closing after {} deferrals with cleanup unfinished",
                self.deferrals
            );
            return CloseDecision::Proceed;
        }

        self.begin();
        self.deferrals += 1;
        info!("Close deferred until cleanup finishes ({})", self.deferrals);
        CloseDecision::Defer
    }
}
