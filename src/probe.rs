//! Readiness probe for the search service
//!
//! The search entry in the bar only appears once the indexing service is
//! running. The probe polls the service at a fixed interval until it reports
//! `Running`, opens a one-shot latch, and stops for good.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use once_cell::sync::OnceCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Running,
    Stopped,
    Unknown,
}

/// Source of service status reports
pub trait ServiceStatusSource {
    fn query_status(&self, service_name: &str) -> ServiceStatus;
}

/// One-shot flag shared between the probe and whoever shows the feature
#[derive(Debug, Clone, Default)]
pub struct ReadinessLatch(Arc<OnceCell<()>>);

impl ReadinessLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the latch; true only for the call that actually opened it
    pub fn open(&self) -> bool {
        self.0.set(()).is_ok()
    }

    pub fn is_open(&self) -> bool {
        self.0.get().is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbePhase {
    Polling,
    Ready,
    Cancelled,
}

/// Fixed-interval poll-until-ready
pub struct ReadinessProbe<Q> {
    source: Q,
    service_name: String,
    interval: Duration,
    latch: ReadinessLatch,
    phase: ProbePhase,
    polls: u32,
}

impl<Q: ServiceStatusSource> ReadinessProbe<Q> {
    pub fn new(source: Q, service_name: impl Into<String>, interval: Duration, latch: ReadinessLatch) -> Self {
        Self {
            source,
            service_name: service_name.into(),
            interval,
            latch,
            phase: ProbePhase::Polling,
            polls: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn phase(&self) -> ProbePhase {
        self.phase
    }

    /// True while the caller should keep its timer running
    pub fn is_active(&self) -> bool {
        self.phase == ProbePhase::Polling
    }

    #[cfg(test)]
    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn latch(&self) -> &ReadinessLatch {
        &self.latch
    }

    /// Query the service once. Does nothing after success or cancellation.
    pub fn poll(&mut self) -> ProbePhase {
        if self.phase != ProbePhase::Polling {
            return self.phase;
        }

        self.polls += 1;
        match self.source.query_status(&self.service_name) {
            ServiceStatus::Running => {
                self.phase = ProbePhase::Ready;
                if self.latch.open() {
                    info!(
                        "Service '{}' is running after {} poll(s), enabling search",
                        self.service_name, self.polls
                    );
                }
            }
            status => {
                debug!(
                    "Service '{}' is {:?}, search stays hidden",
                    self.service_name, status
                );
            }
        }
        self.phase
    }

    /// Stop polling without opening the latch
    pub fn cancel(&mut self) {
        if self.phase == ProbePhase::Polling {
            debug!("Readiness probe for '{}' cancelled", self.service_name);
            self.phase = ProbePhase::Cancelled;
        }
    }
}
