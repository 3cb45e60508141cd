//! Quintic interpolator for vector-space values

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use super::{Interpolable, TIME_EPSILON};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Bounded-jerk interpolator.
///
/// `set_goal` fits a quintic from the current position, velocity and
/// acceleration to the goal with zero velocity and acceleration. Retargeting
/// part way through refits from the current state, so the value and its
/// first two derivatives never jump. Calling `set_goal` each tick with the
/// same goal and the time left reproduces the same polynomial.
#[derive(Debug, Clone)]
pub struct Interpolator<T: Interpolable> {
    x: T,
    v: T,
    a: T,
    goal: T,

    /// Polynomial coefficients in ascending powers of the elapsed time.
    coeffs: [T; 6],

    /// Time to reach the goal from the last `set_goal`.
    ///
    /// Units: seconds
    duration: f64,

    /// Time since the last `set_goal`.
    ///
    /// Units: seconds
    elapsed: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<T: Interpolable> Interpolator<T> {
    /// Create an interpolator at rest at `value`.
    pub fn new(value: T) -> Self {
        let zero = T::zero();
        Self {
            x: value,
            v: zero,
            a: zero,
            goal: value,
            coeffs: [value, zero, zero, zero, zero, zero],
            duration: 0.0,
            elapsed: 0.0,
        }
    }

    /// Snap to `value` at rest, discarding any motion in progress.
    pub fn reset(&mut self, value: T) {
        *self = Self::new(value);
    }

    /// Snap to `value` keeping the given rates, to be followed by `set_goal`.
    pub(crate) fn reset_with_rates(&mut self, value: T, velocity: T, acceleration: T) {
        self.reset(value);
        self.v = velocity;
        self.a = acceleration;
    }

    /// Move towards `goal`, arriving at rest after `duration` seconds.
    ///
    /// A non-positive duration snaps to the goal.
    pub fn set_goal(&mut self, goal: T, duration: f64) {
        self.goal = goal;
        self.elapsed = 0.0;

        if duration <= TIME_EPSILON {
            self.x = goal;
            self.v = T::zero();
            self.a = T::zero();
            self.duration = 0.0;
            self.coeffs = [goal, T::zero(), T::zero(), T::zero(), T::zero(), T::zero()];
            return
        }

        let t = duration;
        let t2 = t * t;
        let t3 = t2 * t;
        let h = goal - self.x;
        let (v, a) = (self.v, self.a);

        self.coeffs = [
            self.x,
            v,
            a * 0.5,
            (h * 20.0 - v * (12.0 * t) - a * (3.0 * t2)) * (1.0 / (2.0 * t3)),
            (h * -30.0 + v * (16.0 * t) + a * (3.0 * t2)) * (1.0 / (2.0 * t3 * t)),
            (h * 12.0 - v * (6.0 * t) - a * t2) * (1.0 / (2.0 * t3 * t2)),
        ];
        self.duration = t;
    }

    /// Advance by `dt` seconds. A zero `dt` leaves the state unchanged.
    pub fn interpolate(&mut self, dt: f64) {
        if !self.is_moving() {
            return
        }

        self.elapsed = (self.elapsed + dt).min(self.duration);

        if self.elapsed + TIME_EPSILON >= self.duration {
            self.x = self.goal;
            self.v = T::zero();
            self.a = T::zero();
            self.elapsed = self.duration;
            return
        }

        let t = self.elapsed;
        let c = &self.coeffs;
        self.x = c[0] + (c[1] + (c[2] + (c[3] + (c[4] + c[5] * t) * t) * t) * t) * t;
        self.v = c[1] + (c[2] * 2.0 + (c[3] * 3.0 + (c[4] * 4.0 + c[5] * (5.0 * t)) * t) * t) * t;
        self.a = c[2] * 2.0 + (c[3] * 6.0 + (c[4] * 12.0 + c[5] * (20.0 * t)) * t) * t;
    }

    pub fn value(&self) -> T {
        self.x
    }

    pub fn velocity(&self) -> T {
        self.v
    }

    pub fn acceleration(&self) -> T {
        self.a
    }

    pub fn goal(&self) -> T {
        self.goal
    }

    /// Time left until the goal is reached.
    pub fn remain_time(&self) -> f64 {
        (self.duration - self.elapsed).max(0.0)
    }

    /// True while the goal has not been reached.
    pub fn is_moving(&self) -> bool {
        self.elapsed + TIME_EPSILON < self.duration
    }
}

impl<T: Interpolable> Default for Interpolator<T> {
    fn default() -> Self {
        Self::new(T::zero())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::Vector3;

    const DT: f64 = 0.002;

    #[test]
    fn test_converges_exactly() {
        let mut i = Interpolator::new(0.0);
        i.set_goal(1.5, 0.5);

        for _ in 0..250 {
            i.interpolate(DT);
        }

        assert_eq!(i.value(), 1.5);
        assert_eq!(i.velocity(), 0.0);
        assert!(!i.is_moving());
    }

    #[test]
    fn test_not_reached_early() {
        let mut i = Interpolator::new(0.0);
        i.set_goal(1.0, 0.5);

        for _ in 0..249 {
            i.interpolate(DT);
        }

        assert!(i.value() < 1.0);
        assert!(i.value() > 0.99);
        assert!(i.is_moving());
    }

    #[test]
    fn test_zero_dt_idempotent() {
        let mut i = Interpolator::new(Vector3::new(0.0, 1.0, 2.0));
        i.set_goal(Vector3::new(1.0, 0.0, -1.0), 1.0);
        for _ in 0..100 {
            i.interpolate(DT);
        }

        let (x, v) = (i.value(), i.velocity());
        i.interpolate(0.0);
        i.interpolate(0.0);
        assert_eq!(i.value(), x);
        assert_eq!(i.velocity(), v);
    }

    #[test]
    fn test_retarget_is_continuous() {
        let mut i = Interpolator::new(0.0);
        i.set_goal(1.0, 1.0);

        let mut prev_x = i.value();
        let mut prev_v = i.velocity();
        let mut max_dx: f64 = 0.0;
        let mut max_dv: f64 = 0.0;

        for k in 0..1000 {
            // Change the goal a few times mid-flight
            match k {
                100 => i.set_goal(-2.0, 0.8),
                300 => i.set_goal(0.5, 0.3),
                350 => i.set_goal(3.0, 1.0),
                _ => ()
            }
            i.interpolate(DT);

            max_dx = max_dx.max((i.value() - prev_x).abs());
            max_dv = max_dv.max((i.velocity() - prev_v).abs());
            prev_x = i.value();
            prev_v = i.velocity();
        }

        // A jump would show as a step of the order of the goal change
        assert!(max_dx < 0.05, "max step in value {}", max_dx);
        assert!(max_dv < 1.0, "max step in velocity {}", max_dv);
        assert_eq!(i.value(), 3.0);
    }

    #[test]
    fn test_repeated_set_goal_matches_single() {
        let mut once = Interpolator::new(0.0);
        let mut every_tick = Interpolator::new(0.0);
        once.set_goal(1.0, 0.2);

        let mut remain = 0.2;
        for _ in 0..50 {
            every_tick.set_goal(1.0, remain);
            every_tick.interpolate(DT);
            once.interpolate(DT);
            remain -= DT;
            assert!((once.value() - every_tick.value()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_non_positive_duration_snaps() {
        let mut i = Interpolator::new(0.0);
        i.set_goal(2.0, 0.0);
        assert_eq!(i.value(), 2.0);
        assert_eq!(i.remain_time(), 0.0);

        i.set_goal(-1.0, -3.0);
        assert_eq!(i.value(), -1.0);
    }
}
