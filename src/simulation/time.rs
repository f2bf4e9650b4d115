use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

pub const MS_PER_DAY: i64 = 86_400_000;

/// Wall-clock resource. The host injects `now_ms` on every tick, so the
/// simulation never reads the system clock directly.
#[derive(Resource, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GameClock {
    pub now_ms: i64,
    pub tick: u64,
}

impl GameClock {
    /// Moves the clock forward; a stale timestamp never moves it back.
    pub fn advance_to(&mut self, now_ms: i64) {
        if now_ms > self.now_ms {
            self.now_ms = now_ms;
        }
        self.tick += 1;
    }

    /// Calendar day number (UTC) used for daily quotas.
    pub fn day_number(&self) -> i64 {
        self.now_ms.div_euclid(MS_PER_DAY)
    }
}

/// Fixed-interval gate for background processes (regeneration, enemy
/// movement). Fires at most once per elapsed interval.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntervalGate {
    last_ms: i64,
}

impl IntervalGate {
    pub fn ready(&mut self, now_ms: i64, interval_ms: i64) -> bool {
        if now_ms - self.last_ms >= interval_ms {
            self.last_ms = now_ms;
            true
        } else {
            false
        }
    }
}
