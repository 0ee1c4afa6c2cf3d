// SPDX-License-Identifier: MIT OR Apache-2.0
//! Refresh loop driving a shared session.

use crate::config::HostConfig;
use atlas_graph::{CycleReport, Session};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Runs one execution cycle per refresh tick until terminated.
///
/// The whole session sits behind one mutex, so topology edits made by other
/// tasks never interleave with a running cycle.
pub struct Driver {
    session: Arc<Mutex<Session>>,
    config: HostConfig,
    terminate: Arc<AtomicBool>,
}

impl Driver {
    /// Create a driver for `session`
    pub fn new(session: Arc<Mutex<Session>>, config: HostConfig) -> Self {
        Self {
            session,
            config,
            terminate: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The shared session
    pub fn session(&self) -> &Arc<Mutex<Session>> {
        &self.session
    }

    /// Flag that stops the loop after the current cycle once set
    pub fn terminate_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.terminate)
    }

    /// Whether termination was requested
    pub fn is_terminated(&self) -> bool {
        self.terminate.load(Ordering::SeqCst)
    }

    /// Run one cycle under the session lock
    pub fn tick(&self) -> CycleReport {
        let (report, cycle) = {
            let mut session = self.session.lock();
            let report = session.tick();
            (report, session.cycles())
        };

        if !report.is_clean() {
            let nodes: Vec<_> = report.failures.iter().map(|f| f.node_id).collect();
            tracing::warn!(cycle, ?nodes, "cycle finished with failures");
        }
        if self.config.report_every > 0 && cycle % self.config.report_every == 0 {
            tracing::info!(
                cycle,
                executed = report.executed.len(),
                failures = report.failures.len(),
                cycle_warning = report.warning.is_some(),
                "cycle summary"
            );
        }
        if self.config.max_cycles.is_some_and(|max| cycle >= max) {
            tracing::info!(cycle, "cycle limit reached");
            self.terminate.store(true, Ordering::SeqCst);
        }
        report
    }

    /// Tick on the refresh interval until terminated. Returns the cycles run.
    pub async fn run(&self) -> u64 {
        let mut interval = tokio::time::interval(Duration::from_millis(self.config.refresh_interval_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut cycles = 0;
        while !self.is_terminated() {
            interval.tick().await;
            if self.is_terminated() {
                break;
            }
            self.tick();
            cycles += 1;
        }
        tracing::info!(cycles, "refresh loop stopped");
        cycles
    }
}
