//! Rotation and rigid-body pose interpolators

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};

// Internal
use super::Interpolator;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Smoothed rotation.
///
/// The rotation is kept as an origin plus an axis-angle delta, the delta
/// being interpolated as a 3-vector. Retargeting folds the current rotation
/// into the origin while keeping the angular rates.
#[derive(Debug, Clone)]
pub struct RotationInterpolator {
    origin: UnitQuaternion<f64>,
    delta: Interpolator<Vector3<f64>>,
    goal: UnitQuaternion<f64>,
}

/// Smoothed SE(3) pose.
#[derive(Debug, Clone)]
pub struct PoseInterpolator {
    trans: Interpolator<Vector3<f64>>,
    rot: RotationInterpolator,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl RotationInterpolator {
    pub fn new(value: UnitQuaternion<f64>) -> Self {
        Self {
            origin: value,
            delta: Interpolator::new(Vector3::zeros()),
            goal: value,
        }
    }

    pub fn reset(&mut self, value: UnitQuaternion<f64>) {
        *self = Self::new(value);
    }

    pub fn set_goal(&mut self, goal: UnitQuaternion<f64>, duration: f64) {
        let current = self.value();
        let v = self.delta.velocity();
        let a = self.delta.acceleration();

        self.origin = current;
        self.goal = goal;
        self.delta.reset_with_rates(Vector3::zeros(), v, a);
        self.delta.set_goal((goal * current.inverse()).scaled_axis(), duration);

        if duration <= super::TIME_EPSILON {
            self.origin = goal;
            self.delta.reset(Vector3::zeros());
        }
    }

    pub fn interpolate(&mut self, dt: f64) {
        self.delta.interpolate(dt);
        if !self.delta.is_moving() {
            // Avoid accumulating round-off in the origin once the goal is reached
            self.origin = self.goal;
            self.delta.reset(Vector3::zeros());
        }
    }

    pub fn value(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_scaled_axis(self.delta.value()) * self.origin
    }

    /// Angular velocity in the world frame.
    pub fn angular_velocity(&self) -> Vector3<f64> {
        self.delta.velocity()
    }

    pub fn goal(&self) -> UnitQuaternion<f64> {
        self.goal
    }

    pub fn remain_time(&self) -> f64 {
        self.delta.remain_time()
    }

    pub fn is_moving(&self) -> bool {
        self.delta.is_moving()
    }
}

impl Default for RotationInterpolator {
    fn default() -> Self {
        Self::new(UnitQuaternion::identity())
    }
}

impl PoseInterpolator {
    pub fn new(value: Isometry3<f64>) -> Self {
        Self {
            trans: Interpolator::new(value.translation.vector),
            rot: RotationInterpolator::new(value.rotation),
        }
    }

    pub fn reset(&mut self, value: Isometry3<f64>) {
        *self = Self::new(value);
    }

    pub fn set_goal(&mut self, goal: Isometry3<f64>, duration: f64) {
        self.trans.set_goal(goal.translation.vector, duration);
        self.rot.set_goal(goal.rotation, duration);
    }

    pub fn interpolate(&mut self, dt: f64) {
        self.trans.interpolate(dt);
        self.rot.interpolate(dt);
    }

    pub fn value(&self) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::from(self.trans.value()),
            self.rot.value()
        )
    }

    /// Linear velocity of the origin in the world frame.
    pub fn linear_velocity(&self) -> Vector3<f64> {
        self.trans.velocity()
    }

    pub fn angular_velocity(&self) -> Vector3<f64> {
        self.rot.angular_velocity()
    }

    pub fn goal(&self) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::from(self.trans.goal()),
            self.rot.goal()
        )
    }

    pub fn remain_time(&self) -> f64 {
        self.trans.remain_time().max(self.rot.remain_time())
    }

    pub fn is_moving(&self) -> bool {
        self.trans.is_moving() || self.rot.is_moving()
    }
}

impl Default for PoseInterpolator {
    fn default() -> Self {
        Self::new(Isometry3::identity())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const DT: f64 = 0.002;

    fn pose(x: f64, y: f64, z: f64, r: f64, p: f64, yaw: f64) -> Isometry3<f64> {
        Isometry3::from_parts(
            Translation3::new(x, y, z),
            UnitQuaternion::from_euler_angles(r, p, yaw)
        )
    }

    #[test]
    fn test_pose_reaches_goal() {
        let mut p = PoseInterpolator::new(pose(0.0, 0.0, 0.0, 0.0, 0.0, 0.0));
        let goal = pose(0.3, -0.1, 0.05, 0.1, -0.2, 0.8);
        p.set_goal(goal, 0.4);

        for _ in 0..200 {
            p.interpolate(DT);
        }

        assert!(!p.is_moving());
        let v = p.value();
        assert!((v.translation.vector - goal.translation.vector).norm() < 1e-12);
        assert!(v.rotation.angle_to(&goal.rotation) < 1e-9);
    }

    #[test]
    fn test_rotation_retarget_is_smooth() {
        let mut r = RotationInterpolator::new(UnitQuaternion::identity());
        r.set_goal(UnitQuaternion::from_euler_angles(0.0, 0.0, 1.0), 1.0);

        let mut prev = r.value();
        let mut max_step: f64 = 0.0;
        for k in 0..600 {
            if k == 200 {
                r.set_goal(UnitQuaternion::from_euler_angles(0.3, 0.0, -0.5), 0.6);
            }
            r.interpolate(DT);
            max_step = max_step.max(r.value().angle_to(&prev));
            prev = r.value();
        }

        assert!(max_step < 0.01, "largest angular step {}", max_step);
        let goal = UnitQuaternion::from_euler_angles(0.3, 0.0, -0.5);
        assert!(r.value().angle_to(&goal) < 1e-9);
    }

    #[test]
    fn test_snap() {
        let mut p = PoseInterpolator::default();
        let goal = pose(1.0, 2.0, 3.0, 0.0, 0.0, 0.5);
        p.set_goal(goal, 0.0);
        assert!(!p.is_moving());
        assert!((p.value().translation.vector - goal.translation.vector).norm() < 1e-12);
        assert!(p.value().rotation.angle_to(&goal.rotation) < 1e-12);
    }
}
