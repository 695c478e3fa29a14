//! Pluggable time source so the protocol engine's timer logic can be driven
//! deterministically in tests instead of reading the real clock.

use std::fmt::Debug;
use std::sync::RwLock;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Abstracts "what time is it" for the engine's monotonic timer arming and
/// wall-clock reset-timestamp decisions (§5: "Timeouts are approximate
/// (monotonic clock); wall-clock is read only for timeslot computation and
/// reset decisions").
pub trait TimeProvider: Debug + Send + Sync {
    fn now_instant(&self) -> Instant;
    /// Wall-clock nanoseconds since the Unix epoch.
    fn now_wall_ns(&self) -> i64;
}

#[derive(Debug, Default)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_instant(&self) -> Instant {
        Instant::now()
    }

    fn now_wall_ns(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0)
    }
}

/// A manually-advanced clock for deterministic simulation and tests.
#[derive(Debug)]
pub struct ManualTimeProvider {
    instant: RwLock<Instant>,
    wall_ns: RwLock<i64>,
}

impl ManualTimeProvider {
    pub fn new(instant: Instant, wall_ns: i64) -> Self {
        Self {
            instant: RwLock::new(instant),
            wall_ns: RwLock::new(wall_ns),
        }
    }

    pub fn advance(&self, duration: Duration) {
        *self.instant.write().unwrap() += duration;
        *self.wall_ns.write().unwrap() += duration.as_nanos() as i64;
    }

    pub fn set(&self, instant: Instant, wall_ns: i64) {
        *self.instant.write().unwrap() = instant;
        *self.wall_ns.write().unwrap() = wall_ns;
    }
}

impl TimeProvider for ManualTimeProvider {
    fn now_instant(&self) -> Instant {
        *self.instant.read().unwrap()
    }

    fn now_wall_ns(&self) -> i64 {
        *self.wall_ns.read().unwrap()
    }
}
