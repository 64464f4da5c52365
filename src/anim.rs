use std::time::Duration;

use crate::{anim_ease::Ease, core::Vec2};

/// Opacity above which a target counts as shown (and accepts input).
pub const VISIBLE_EPSILON: f64 = 0.001;

pub trait Lerp: Sized {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self;
}

impl Lerp for f64 {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        a + (b - a) * t
    }
}

impl Lerp for f32 {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        (*a as f64 + ((*b as f64 - *a as f64) * t)) as f32
    }
}

impl Lerp for Vec2 {
    fn lerp(a: &Self, b: &Self, t: f64) -> Self {
        Vec2::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
    }
}

/// `clamp01(elapsed / duration)`; a zero duration is already complete.
pub fn progress(elapsed: Duration, duration: Duration) -> f64 {
    if duration.is_zero() {
        return 1.0;
    }
    (elapsed.as_secs_f64() / duration.as_secs_f64()).clamp(0.0, 1.0)
}

/// A time-parameterized interpolation from `from` to `to`.
///
/// Sampling is a pure function of elapsed (unscaled) time. Once `elapsed >= duration`
/// the sample is exactly `to`, so the final tick never carries float error.
#[derive(Clone, Debug, PartialEq)]
pub struct Tween<T> {
    pub from: T,
    pub to: T,
    pub duration: Duration,
    pub ease: Ease,
}

impl<T> Tween<T>
where
    T: Lerp + Clone,
{
    pub fn new(from: T, to: T, duration: Duration, ease: Ease) -> Self {
        Self {
            from,
            to,
            duration,
            ease,
        }
    }

    pub fn is_instant(&self) -> bool {
        self.duration.is_zero()
    }

    pub fn is_complete(&self, elapsed: Duration) -> bool {
        elapsed >= self.duration
    }

    pub fn sample(&self, elapsed: Duration) -> T {
        if self.is_complete(elapsed) {
            return self.to.clone();
        }
        let u = self.ease.apply(progress(elapsed, self.duration));
        T::lerp(&self.from, &self.to, u)
    }
}

/// Linear opacity fade.
pub fn fade(from: f64, to: f64, duration: Duration) -> Tween<f64> {
    Tween::new(from, to, duration, Ease::Linear)
}

/// Positional slide with a smoothstep ease.
pub fn slide<T: Lerp + Clone>(from: T, to: T, duration: Duration) -> Tween<T> {
    Tween::new(from, to, duration, Ease::SmoothStep)
}

/// Character-reveal schedule: `min(total, floor(t * cps))`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Typewriter {
    pub total: usize,
    pub chars_per_second: f64,
}

impl Typewriter {
    pub fn new(total: usize, chars_per_second: f64) -> Self {
        Self {
            total,
            chars_per_second,
        }
    }

    /// Non-positive rates reveal everything at once.
    pub fn is_instant(&self) -> bool {
        self.total == 0 || !(self.chars_per_second.is_finite() && self.chars_per_second > 0.0)
    }

    pub fn visible_at(&self, elapsed: Duration) -> usize {
        if self.is_instant() {
            return self.total;
        }
        let n = (elapsed.as_secs_f64() * self.chars_per_second).floor();
        if n >= self.total as f64 {
            self.total
        } else {
            n.max(0.0) as usize
        }
    }

    pub fn is_complete(&self, elapsed: Duration) -> bool {
        self.visible_at(elapsed) >= self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn fade_is_linear_and_snaps() {
        let f = fade(0.0, 1.0, ms(400));
        assert_eq!(f.sample(ms(0)), 0.0);
        assert_eq!(f.sample(ms(100)), 0.25);
        assert_eq!(f.sample(ms(400)), 1.0);
        assert_eq!(f.sample(ms(900)), 1.0);
    }

    #[test]
    fn zero_duration_is_the_end_state() {
        let f = fade(1.0, 0.0, Duration::ZERO);
        assert!(f.is_instant());
        assert!(f.is_complete(Duration::ZERO));
        assert_eq!(f.sample(Duration::ZERO), 0.0);
    }

    #[test]
    fn slide_uses_smoothstep() {
        let s = slide(Vec2::new(-500.0, 0.0), Vec2::ZERO, ms(1000));
        assert_eq!(s.sample(ms(500)), Vec2::new(-250.0, 0.0));
        let quarter = s.sample(ms(250));
        let u = 0.25 * 0.25 * (3.0 - 2.0 * 0.25);
        assert!((quarter.x - (-500.0 + 500.0 * u)).abs() < 1e-9);
        assert_eq!(s.sample(ms(1000)), Vec2::ZERO);
    }

    #[test]
    fn typewriter_counts_whole_characters() {
        let tw = Typewriter::new(2, 10.0);
        assert_eq!(tw.visible_at(ms(50)), 0);
        assert_eq!(tw.visible_at(ms(100)), 1);
        assert_eq!(tw.visible_at(ms(250)), 2);
        assert_eq!(tw.visible_at(ms(10_000)), 2);
        assert!(tw.is_complete(ms(200)));
        assert!(!tw.is_complete(ms(199)));
    }

    #[test]
    fn typewriter_is_monotonic() {
        let tw = Typewriter::new(17, 35.0);
        let mut last = 0;
        let mut t = Duration::ZERO;
        while !tw.is_complete(t) {
            let v = tw.visible_at(t);
            assert!(v >= last);
            last = v;
            t += ms(16);
        }
        assert_eq!(tw.visible_at(t), 17);
    }

    #[test]
    fn typewriter_non_positive_rate_reveals_all() {
        assert_eq!(Typewriter::new(5, 0.0).visible_at(Duration::ZERO), 5);
        assert_eq!(Typewriter::new(5, -3.0).visible_at(Duration::ZERO), 5);
        assert!(Typewriter::new(5, 0.0).is_instant());
    }
}
