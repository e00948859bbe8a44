//! Fixed-timestep accumulator.
//!
//! The clock tracks the last tick boundary and, given the current instant,
//! decides how many whole ticks are due. It never sleeps and never reads the
//! wall clock itself, so every scheduling decision is testable with
//! synthetic instants.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// What to do with backlog beyond the catch-up cap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverloadPolicy {
    /// Run `cap` steps and forget the remaining elapsed time.
    #[default]
    DropBacklog,
    /// Run `cap` steps and carry at most `cap` ticks of backlog forward;
    /// simulated time falls behind wall time instead of being skipped.
    SlowMotion,
}

/// Work for one outer iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickPlan {
    /// `update()` calls to make now
    pub steps: u32,
    /// Ticks of backlog discarded by the overload policy
    pub dropped: u64,
}

/// Fixed-step tick accumulator with an optional catch-up cap.
#[derive(Debug, Clone)]
pub struct TickClock {
    tick: Duration,
    boundary: Instant,
    max_catch_up: Option<u32>,
    policy: OverloadPolicy,
}

impl TickClock {
    /// Start a clock whose first boundary is `now`.
    ///
    /// `tick` must be non-zero; `max_catch_up` of `None` never caps.
    pub fn new(
        tick: Duration,
        max_catch_up: Option<u32>,
        policy: OverloadPolicy,
        now: Instant,
    ) -> Self {
        Self {
            tick: tick.max(Duration::from_nanos(1)),
            boundary: now,
            max_catch_up,
            policy,
        }
    }

    /// Whole ticks elapsed since the last boundary.
    fn due(&self, now: Instant) -> u64 {
        let behind = now.saturating_duration_since(self.boundary).as_nanos();
        let due = behind / self.tick.as_nanos();
        u64::try_from(due).unwrap_or(u64::MAX)
    }

    /// Decide how many steps to run at `now` and advance the boundary.
    pub fn plan(&mut self, now: Instant) -> TickPlan {
        let due = self.due(now);
        if due == 0 {
            return TickPlan::default();
        }

        let cap = match self.max_catch_up {
            Some(cap) if due > cap as u64 => cap,
            _ => {
                let steps = u32::try_from(due).unwrap_or(u32::MAX);
                self.boundary += self.tick * steps;
                return TickPlan { steps, dropped: 0 };
            }
        };

        match self.policy {
            OverloadPolicy::DropBacklog => {
                self.boundary = now;
                TickPlan {
                    steps: cap,
                    dropped: due - cap as u64,
                }
            }
            OverloadPolicy::SlowMotion => {
                self.boundary += self.tick * cap;
                let carried = self.due(now);
                let dropped = carried.saturating_sub(cap as u64);
                if dropped > 0 {
                    self.boundary = now.checked_sub(self.tick * cap).unwrap_or(now);
                }
                TickPlan {
                    steps: cap,
                    dropped,
                }
            }
        }
    }

    /// Forget all elapsed time; the next tick is due one tick after `now`.
    pub fn rebase(&mut self, now: Instant) {
        self.boundary = now;
    }

    /// Time from `now` until the next tick is due (zero if already due).
    pub fn until_next(&self, now: Instant) -> Duration {
        (self.boundary + self.tick).saturating_duration_since(now)
    }
}
