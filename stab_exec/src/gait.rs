//! Rolling gait state shared by the generators
//!
//! The orchestrator owns one `GaitParam`. Each component reads what it needs
//! and hands back its results, which the orchestrator writes into the
//! relevant fields.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector2, Vector3};
use std::collections::VecDeque;

// Internal
use crate::interp::{Interpolator, PoseInterpolator};
use util::maths;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of legs. The first two end effectors are always the legs.
pub const NUM_LEGS: usize = 2;

/// Index of the right leg.
pub const RLEG: usize = 0;

/// Index of the left leg.
pub const LLEG: usize = 1;

/// Standard gravity.
///
/// Units: meters/second^2
pub const GRAVITY: f64 = 9.80665;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One planned step, or a stand.
#[derive(Debug, Clone)]
pub struct FootstepNode {
    /// Destination of each leg in the generate frame.
    pub dst_coords: [Isometry3<f64>; NUM_LEGS],

    pub is_support_phase: [bool; NUM_LEGS],

    /// Time left until the node completes.
    ///
    /// Units: seconds
    pub remain_time: f64,

    /// Full duration of the node.
    ///
    /// Units: seconds
    pub step_time: f64,

    /// Swing apex height above the straight line to the destination.
    ///
    /// Units: meters
    pub step_height: [f64; NUM_LEGS],
}

/// A linear segment of the reference ZMP trajectory.
#[derive(Debug, Clone, Copy)]
pub struct LinearTrajectory {
    start: Vector3<f64>,
    goal: Vector3<f64>,
    duration: f64,
}

/// Generated trajectory of one foot: a smoothed pose plus a smoothed lift
/// added to its height.
#[derive(Debug, Clone)]
pub struct LegTrajectory {
    pub pose: PoseInterpolator,
    pub lift: Interpolator<f64>,
}

/// Static geometry of one leg's foot.
#[derive(Debug, Clone)]
pub struct FootGeometry {
    /// Neutral stance position relative to the foot-mid frame.
    ///
    /// Units: meters
    pub default_translate_pos: Vector3<f64>,

    /// Target centre of pressure in the foot frame.
    ///
    /// Units: meters
    pub cop_offset: Vector3<f64>,

    /// Sole outline in the foot frame, counter-clockwise.
    ///
    /// Units: meters
    pub sole_hull: Vec<Vector2<f64>>,
}

#[derive(Debug, Clone)]
pub struct GaitParam {
    /// Anchor of the generate frame.
    pub foot_mid_coords: PoseInterpolator,

    /// Units: meters
    pub gen_cog: Vector3<f64>,

    /// Units: meters/second
    pub gen_cog_vel: Vector3<f64>,

    /// Commanded ZMP from the last CoM update.
    ///
    /// Units: meters
    pub gen_zmp: Vector3<f64>,

    /// Units: meters
    pub act_cog: Vector3<f64>,

    /// Units: meters/second
    pub act_cog_vel: Vector3<f64>,

    pub ref_zmp_traj: Vec<LinearTrajectory>,

    pub default_translate_pos: [Interpolator<Vector3<f64>>; NUM_LEGS],
    pub cop_offset: [Interpolator<Vector3<f64>>; NUM_LEGS],
    pub sole_hulls: [Vec<Vector2<f64>>; NUM_LEGS],

    pub prev_support_phase: [bool; NUM_LEGS],

    pub gen_coords: [LegTrajectory; NUM_LEGS],

    /// Queue of steps, the front one executing. Never empty.
    pub footstep_nodes: VecDeque<FootstepNode>,

    /// Leg coordinates at the start of the current swing.
    pub src_coords: [Isometry3<f64>; NUM_LEGS],

    /// Reference CoM height above the foot-mid frame.
    ///
    /// Units: meters
    pub dz: f64,

    /// `(0, 0, dz)` as of the last tick.
    pub l: Vector3<f64>,

    /// Stabilizer root lean in the foot-mid frame as roll, pitch, yaw.
    ///
    /// Units: radians
    pub st_offset_root_rpy: Interpolator<Vector3<f64>>,

    pub st_target_root_pose: Isometry3<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FootstepNode {
    /// A double support node holding the given leg coordinates.
    pub fn stand(dst_coords: [Isometry3<f64>; NUM_LEGS], duration: f64) -> Self {
        Self {
            dst_coords,
            is_support_phase: [true; NUM_LEGS],
            remain_time: duration,
            step_time: duration,
            step_height: [0.0; NUM_LEGS],
        }
    }

    pub fn is_double_support(&self) -> bool {
        self.is_support_phase.iter().all(|s| *s)
    }

    pub fn is_flight(&self) -> bool {
        !self.is_support_phase.iter().any(|s| *s)
    }

    /// The leg in the air, if exactly one is.
    pub fn swing_leg(&self) -> Option<usize> {
        match self.is_support_phase {
            [true, false] => Some(LLEG),
            [false, true] => Some(RLEG),
            _ => None
        }
    }
}

impl LinearTrajectory {
    pub fn new(start: Vector3<f64>, goal: Vector3<f64>, duration: f64) -> Self {
        Self {
            start,
            goal,
            duration: duration.max(0.0),
        }
    }

    pub fn start(&self) -> Vector3<f64> {
        self.start
    }

    pub fn goal(&self) -> Vector3<f64> {
        self.goal
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Rate of change along the segment, zero for an instantaneous one.
    pub fn slope(&self) -> Vector3<f64> {
        if self.duration > 0.0 {
            (self.goal - self.start) / self.duration
        }
        else {
            Vector3::zeros()
        }
    }

    /// Value `t` seconds after the segment start, held past the end.
    pub fn value_at(&self, t: f64) -> Vector3<f64> {
        if t >= self.duration {
            self.goal
        }
        else {
            self.start + self.slope() * t.max(0.0)
        }
    }
}

impl LegTrajectory {
    pub fn new(coords: Isometry3<f64>) -> Self {
        Self {
            pose: PoseInterpolator::new(coords),
            lift: Interpolator::new(0.0),
        }
    }

    pub fn interpolate(&mut self, dt: f64) {
        self.pose.interpolate(dt);
        self.lift.interpolate(dt);
    }

    pub fn value(&self) -> Isometry3<f64> {
        let mut v = self.pose.value();
        v.translation.vector.z += self.lift.value();
        v
    }
}

impl GaitParam {
    pub fn new(feet: &[FootGeometry; NUM_LEGS]) -> Self {
        let foot = |i: usize| Isometry3::from_parts(
            Translation3::from(feet[i].default_translate_pos),
            UnitQuaternion::identity()
        );
        let stance = [foot(RLEG), foot(LLEG)];

        let mut footstep_nodes = VecDeque::new();
        footstep_nodes.push_back(FootstepNode::stand(stance, 0.0));

        Self {
            foot_mid_coords: PoseInterpolator::default(),
            gen_cog: Vector3::zeros(),
            gen_cog_vel: Vector3::zeros(),
            gen_zmp: Vector3::zeros(),
            act_cog: Vector3::zeros(),
            act_cog_vel: Vector3::zeros(),
            ref_zmp_traj: vec![LinearTrajectory::new(Vector3::zeros(), Vector3::zeros(), 0.0)],
            default_translate_pos: [
                Interpolator::new(feet[RLEG].default_translate_pos),
                Interpolator::new(feet[LLEG].default_translate_pos),
            ],
            cop_offset: [
                Interpolator::new(feet[RLEG].cop_offset),
                Interpolator::new(feet[LLEG].cop_offset),
            ],
            sole_hulls: [
                maths::convex_hull(&feet[RLEG].sole_hull),
                maths::convex_hull(&feet[LLEG].sole_hull),
            ],
            prev_support_phase: [true; NUM_LEGS],
            gen_coords: [LegTrajectory::new(stance[RLEG]), LegTrajectory::new(stance[LLEG])],
            footstep_nodes,
            src_coords: stance,
            dz: 0.0,
            l: Vector3::zeros(),
            st_offset_root_rpy: Interpolator::new(Vector3::zeros()),
            st_target_root_pose: Isometry3::identity(),
        }
    }

    /// The executing footstep node.
    pub fn node0(&self) -> &FootstepNode {
        &self.footstep_nodes[0]
    }

    pub fn is_support_phase(&self, leg: usize) -> bool {
        self.node0().is_support_phase[leg]
    }

    /// Current generated coordinates of each leg.
    pub fn gen_leg_coords(&self) -> [Isometry3<f64>; NUM_LEGS] {
        [self.gen_coords[RLEG].value(), self.gen_coords[LLEG].value()]
    }

    /// World centre of pressure target of a leg placed at `coords`.
    pub fn cop_point(&self, leg: usize, coords: &Isometry3<f64>) -> Vector3<f64> {
        coords.translation.vector + coords.rotation * self.cop_offset[leg].value()
    }

    /// Convex hull of the soles of the supporting legs, at their generated
    /// coordinates. Both legs count during flight.
    pub fn support_polygon(&self) -> Vec<Vector2<f64>> {
        let node = self.node0();
        let mut points = Vec::new();
        for leg in 0..NUM_LEGS {
            if node.is_support_phase[leg] || node.is_flight() {
                points.extend(self.sole_points(leg, &self.gen_coords[leg].value()));
            }
        }
        maths::convex_hull(&points)
    }

    /// Sole outline of one leg placed at `coords`, projected onto the ground.
    pub fn sole_hull_at(&self, leg: usize, coords: &Isometry3<f64>) -> Vec<Vector2<f64>> {
        maths::convex_hull(&self.sole_points(leg, coords))
    }

    fn sole_points(&self, leg: usize, coords: &Isometry3<f64>) -> Vec<Vector2<f64>> {
        self.sole_hulls[leg]
            .iter()
            .map(|v| {
                let p = coords * Point3::new(v.x, v.y, 0.0);
                Vector2::new(p.x, p.y)
            })
            .collect()
    }
}
