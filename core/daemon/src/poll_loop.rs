//! Adaptive poll loop.
//!
//! ```text
//! Starting ──first cycle──▶ Polling ◀──changes──┐
//!                             │                 │
//!                   idle ≥ threshold            │
//!                             ▼                 │
//!                        IdleBackoff ───────────┘
//!
//! any state ──shutdown flag──▶ ShuttingDown
//! ```
//!
//! The first cycle runs immediately. Afterwards the loop sleeps for the current
//! interval between cycles, waking in short slices to notice a shutdown
//! request. A cycle in progress always runs to completion.

use smart_tabs_core::PollTuning;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

const SLEEP_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Starting,
    Polling,
    IdleBackoff,
    ShuttingDown,
}

/// Poll interval that stretches while nothing changes.
#[derive(Debug, Clone)]
pub struct AdaptiveInterval {
    base: Duration,
    max: Duration,
    factor: f64,
    idle_threshold: u32,
    current: Duration,
    idle_cycles: u32,
}

impl AdaptiveInterval {
    pub fn new(tuning: &PollTuning) -> Self {
        Self {
            base: tuning.base_interval,
            max: tuning.max_interval().max(tuning.base_interval),
            factor: tuning.backoff_factor,
            idle_threshold: tuning.idle_threshold,
            current: tuning.base_interval,
            idle_cycles: 0,
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    /// Feeds one cycle's change count and returns the resulting state.
    pub fn record(&mut self, changes: usize) -> LoopState {
        if changes > 0 {
            self.idle_cycles = 0;
            self.current = self.base;
            return LoopState::Polling;
        }

        self.idle_cycles = self.idle_cycles.saturating_add(1);
        if self.idle_cycles < self.idle_threshold {
            return LoopState::Polling;
        }
        if self.current < self.max {
            let next = self.current.as_secs_f64() * self.factor;
            self.current =
                Duration::try_from_secs_f64(next).map_or(self.max, |next| next.min(self.max));
        }
        LoopState::IdleBackoff
    }
}

pub struct PollLoop<'a> {
    interval: AdaptiveInterval,
    shutdown: &'a AtomicBool,
    state: LoopState,
}

impl<'a> PollLoop<'a> {
    pub fn new(tuning: &PollTuning, shutdown: &'a AtomicBool) -> Self {
        Self {
            interval: AdaptiveInterval::new(tuning),
            shutdown,
            state: LoopState::Starting,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Runs cycles until shutdown is requested. Returns the number of cycles run.
    ///
    /// A panicking cycle is logged and counted as a zero-change cycle.
    pub fn run<F: FnMut() -> usize>(&mut self, mut cycle: F) -> u64 {
        let mut cycles = 0u64;

        while !self.shutdown_requested() {
            if self.state != LoopState::Starting {
                self.sleep(self.interval.current());
                if self.shutdown_requested() {
                    break;
                }
            }

            let changes = match panic::catch_unwind(AssertUnwindSafe(&mut cycle)) {
                Ok(changes) => changes,
                Err(_) => {
                    error!("Poll cycle panicked; continuing");
                    0
                }
            };
            cycles += 1;

            let next = self.interval.record(changes);
            if next != self.state {
                info!(
                    from = ?self.state,
                    to = ?next,
                    interval_ms = self.interval.current().as_millis() as u64,
                    "Poll state changed"
                );
            }
            debug!(
                changes,
                interval_ms = self.interval.current().as_millis() as u64,
                "Poll cycle complete"
            );
            self.state = next;
        }

        self.state = LoopState::ShuttingDown;
        cycles
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    fn sleep(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        loop {
            if self.shutdown_requested() {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }
}
