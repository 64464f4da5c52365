use std::time::Duration;

use crate::error::{CutsceneError, CutsceneResult};

pub use kurbo::{Size, Vec2};

/// Key under which a target is registered on a [`crate::Stage`].
///
/// Steps refer to targets by key only; two steps with the same key address the same object.
#[derive(
    Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct TargetId(pub String);

impl TargetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TargetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Slide direction. `Up` is +y, matching a y-up layout space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    pub fn unit(self) -> Vec2 {
        match self {
            Self::Left => Vec2::new(-1.0, 0.0),
            Self::Right => Vec2::new(1.0, 0.0),
            Self::Up => Vec2::new(0.0, 1.0),
            Self::Down => Vec2::new(0.0, -1.0),
        }
    }
}

/// Tick rate for deterministic drivers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    pub num: u32,
    pub den: u32, // must be > 0
}

impl Fps {
    pub fn new(num: u32, den: u32) -> CutsceneResult<Self> {
        if den == 0 {
            return Err(CutsceneError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(CutsceneError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Exact tick length, rounded to whole nanoseconds.
    pub fn tick(self) -> Duration {
        let nanos = (u64::from(self.den) * 1_000_000_000) / u64::from(self.num);
        Duration::from_nanos(nanos)
    }
}

/// Converts authored seconds to a `Duration`, mapping non-positive or non-finite values to
/// zero. Values too large for a `Duration` saturate to `Duration::MAX`.
pub fn secs(seconds: f64) -> Duration {
    if seconds.is_finite() && seconds > 0.0 {
        Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_units_are_axis_aligned() {
        assert_eq!(Direction::Left.unit(), Vec2::new(-1.0, 0.0));
        assert_eq!(Direction::Up.unit(), Vec2::new(0.0, 1.0));
        assert_eq!(Direction::Down.unit() + Direction::Up.unit(), Vec2::ZERO);
    }

    #[test]
    fn fps_tick_is_exact_for_round_rates() {
        let fps = Fps::new(20, 1).unwrap();
        assert_eq!(fps.tick(), Duration::from_millis(50));
        assert!(Fps::new(0, 1).is_err());
        assert!(Fps::new(30, 0).is_err());
    }

    #[test]
    fn secs_clamps_degenerate_values() {
        assert_eq!(secs(-1.0), Duration::ZERO);
        assert_eq!(secs(f64::NAN), Duration::ZERO);
        assert_eq!(secs(0.5), Duration::from_millis(500));
        assert_eq!(secs(1e30), Duration::MAX);
    }
}
