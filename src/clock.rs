//! Time and input drivers.
//!
//! Both are polled once per host tick. Time is always real (unscaled) time, so sequences
//! keep advancing while the host's own simulation is paused.

use std::time::{Duration, Instant};

use crate::core::Fps;

pub trait Clock {
    fn elapsed_since_last_tick(&mut self) -> Duration;
}

/// Wall clock backed by `Instant`.
#[derive(Debug)]
pub struct SystemClock {
    last: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn elapsed_since_last_tick(&mut self) -> Duration {
        let now = Instant::now();
        let dt = now.saturating_duration_since(self.last);
        self.last = now;
        dt
    }
}

/// Deterministic clock: every tick is the same length.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock {
    step: Duration,
    now: Duration,
}

impl FixedClock {
    pub fn new(step: Duration) -> Self {
        Self {
            step,
            now: Duration::ZERO,
        }
    }

    pub fn from_fps(fps: Fps) -> Self {
        Self::new(fps.tick())
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    /// Total time handed out so far.
    pub fn now(&self) -> Duration {
        self.now
    }
}

impl Clock for FixedClock {
    fn elapsed_since_last_tick(&mut self) -> Duration {
        self.now += self.step;
        self.step
    }
}

/// Edge-triggered click/key source: true at most once per physical press.
pub trait InputSource {
    fn poll_trigger_pulse(&mut self) -> bool;
}

/// Replays presses at fixed times against an internal clock advanced by `advance`.
#[derive(Clone, Debug, Default)]
pub struct ScriptedInput {
    presses: Vec<Duration>, // sorted ascending
    cursor: usize,
    now: Duration,
}

impl ScriptedInput {
    pub fn new(mut presses: Vec<Duration>) -> Self {
        presses.sort();
        Self {
            presses,
            cursor: 0,
            now: Duration::ZERO,
        }
    }

    pub fn from_secs(presses: &[f64]) -> Self {
        Self::new(presses.iter().map(|&s| crate::core::secs(s)).collect())
    }

    pub fn advance(&mut self, dt: Duration) {
        self.now += dt;
    }

    pub fn remaining(&self) -> usize {
        self.presses.len() - self.cursor
    }
}

impl InputSource for ScriptedInput {
    // Presses that fall inside the same tick collapse into one pulse, like a real
    // edge-triggered device sampled once per frame.
    fn poll_trigger_pulse(&mut self) -> bool {
        let mut fired = false;
        while self.cursor < self.presses.len() && self.presses[self.cursor] <= self.now {
            self.cursor += 1;
            fired = true;
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_accumulates() {
        let mut clock = FixedClock::new(Duration::from_millis(50));
        assert_eq!(clock.elapsed_since_last_tick(), Duration::from_millis(50));
        clock.elapsed_since_last_tick();
        assert_eq!(clock.now(), Duration::from_millis(100));
    }

    #[test]
    fn scripted_input_fires_once_per_press() {
        let mut input = ScriptedInput::from_secs(&[0.1, 0.3]);
        assert!(!input.poll_trigger_pulse());
        input.advance(Duration::from_millis(100));
        assert!(input.poll_trigger_pulse());
        assert!(!input.poll_trigger_pulse());
        input.advance(Duration::from_millis(500));
        assert!(input.poll_trigger_pulse());
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let mut clock = SystemClock::new();
        let a = clock.elapsed_since_last_tick();
        let b = clock.elapsed_since_last_tick();
        assert!(a >= Duration::ZERO && b >= Duration::ZERO);
    }
}
