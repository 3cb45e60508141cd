//! Robot model state, kinematics and Jacobians

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{
    DMatrix, DVector, Isometry3, Matrix3, Point3, Translation3, Unit, UnitQuaternion, Vector3
};
use std::sync::Arc;

// Internal
use super::{RobotModelError, NUM_BASE_DOF};
use util::maths::cross_matrix;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A rigid link of the robot.
#[derive(Debug, Clone)]
pub struct Link {
    pub name: String,

    /// Index of the parent link, `None` for the root.
    pub parent: Option<usize>,

    /// Index of the joint attaching this link to its parent, `None` for the
    /// root and for fixed joints.
    pub joint: Option<usize>,

    /// Pose of the joint frame in the parent link frame at zero angle.
    pub offset: Isometry3<f64>,

    /// Joint axis in the link frame.
    pub axis: Unit<Vector3<f64>>,

    /// Units: kilograms
    pub mass: f64,

    /// Centre of mass in the link frame.
    ///
    /// Units: meters
    pub com: Vector3<f64>,

    /// Inertia tensor about the centre of mass in the link frame.
    ///
    /// Units: kilogram meters^2
    pub inertia: Matrix3<f64>,
}

/// A revolute joint.
#[derive(Debug, Clone)]
pub struct Joint {
    pub name: String,

    /// The link this joint moves.
    pub link: usize,

    /// Units: radians
    pub q_min: f64,
    pub q_max: f64,

    /// Units: radians/second
    pub dq_min: f64,
    pub dq_max: f64,

    /// Motor current limit.
    ///
    /// Units: amperes
    pub climit: f64,

    pub gear_ratio: f64,

    /// Units: newton meters/ampere
    pub torque_const: f64,
}

/// A six-axis force sensor.
#[derive(Debug, Clone)]
pub struct ForceSensor {
    pub name: String,
    pub link: usize,

    /// Pose of the sensor in the link frame.
    pub local: Isometry3<f64>,
}

/// A rate gyro/IMU attached to a link.
#[derive(Debug, Clone)]
pub struct RateGyro {
    pub name: String,
    pub link: usize,
    pub local: Isometry3<f64>,
}

/// The static part of the model, shared between all copies.
#[derive(Debug)]
struct Structure {
    links: Vec<Link>,
    joints: Vec<Joint>,
    force_sensors: Vec<ForceSensor>,
    gyrometer: Option<RateGyro>,

    /// For each link the links from the root to it, inclusive.
    chains: Vec<Vec<usize>>,

    total_mass: f64,
}

/// A robot: shared structure plus its current configuration.
#[derive(Debug, Clone)]
pub struct RobotModel {
    structure: Arc<Structure>,

    root: Isometry3<f64>,
    q: DVector<f64>,
    dq: DVector<f64>,
    u: DVector<f64>,

    /// World pose of each link, valid after `calc_forward_kinematics`.
    link_poses: Vec<Isometry3<f64>>,

    /// World centre of mass, valid after `calc_center_of_mass`.
    com: Vector3<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl RobotModel {
    /// Build a model from resolved parts.
    ///
    /// Links must be topologically ordered with the root first. The model
    /// starts at the identity root pose with all joints at zero.
    pub fn from_parts(
        links: Vec<Link>,
        joints: Vec<Joint>,
        force_sensors: Vec<ForceSensor>,
        gyrometer: Option<RateGyro>
    ) -> Result<Self, RobotModelError> {
        if links.is_empty() {
            return Err(RobotModelError::NoLinks)
        }
        if links[0].parent.is_some() {
            return Err(RobotModelError::RootHasParent(links[0].name.clone()))
        }

        let mut chains: Vec<Vec<usize>> = Vec::with_capacity(links.len());
        for (i, link) in links.iter().enumerate() {
            let chain = match link.parent {
                None if i == 0 => vec![0],
                None => return Err(RobotModelError::MultipleRoots(link.name.clone())),
                Some(p) if p >= i => return Err(RobotModelError::ParentAfterChild {
                    link: link.name.clone(),
                    parent: links.get(p).map_or_else(|| p.to_string(), |l| l.name.clone())
                }),
                Some(p) => {
                    let mut c = chains[p].clone();
                    c.push(i);
                    c
                }
            };
            chains.push(chain);
        }

        for joint in joints.iter() {
            // NaN bounds fail too
            if !(joint.q_min <= joint.q_max) || !(joint.dq_min <= joint.dq_max) {
                return Err(RobotModelError::InvalidRange(joint.name.clone()))
            }
        }

        let total_mass = links.iter().map(|l| l.mass).sum();
        let num_joints = joints.len();
        let num_links = links.len();

        let mut model = Self {
            structure: Arc::new(Structure {
                links,
                joints,
                force_sensors,
                gyrometer,
                chains,
                total_mass,
            }),
            root: Isometry3::identity(),
            q: DVector::zeros(num_joints),
            dq: DVector::zeros(num_joints),
            u: DVector::zeros(num_joints),
            link_poses: vec![Isometry3::identity(); num_links],
            com: Vector3::zeros(),
        };
        model.calc_forward_kinematics();
        model.calc_center_of_mass();

        Ok(model)
    }

    // ---- STRUCTURE ----

    pub fn links(&self) -> &[Link] {
        &self.structure.links
    }

    pub fn joints(&self) -> &[Joint] {
        &self.structure.joints
    }

    pub fn force_sensors(&self) -> &[ForceSensor] {
        &self.structure.force_sensors
    }

    pub fn gyrometer(&self) -> Option<&RateGyro> {
        self.structure.gyrometer.as_ref()
    }

    pub fn num_joints(&self) -> usize {
        self.structure.joints.len()
    }

    /// Number of generalised coordinates, base plus joints.
    pub fn num_dof(&self) -> usize {
        NUM_BASE_DOF + self.num_joints()
    }

    pub fn total_mass(&self) -> f64 {
        self.structure.total_mass
    }

    pub fn link_index(&self, name: &str) -> Option<usize> {
        self.structure.links.iter().position(|l| l.name == name)
    }

    pub fn joint_index(&self, name: &str) -> Option<usize> {
        self.structure.joints.iter().position(|j| j.name == name)
    }

    /// Find the force sensor nearest to `link` walking towards the root.
    pub fn find_nearest_force_sensor(&self, link: usize) -> Option<usize> {
        let s = &self.structure;
        s.chains.get(link)?
            .iter()
            .rev()
            .find_map(|l| s.force_sensors.iter().position(|f| f.link == *l))
    }

    // ---- STATE ----

    /// Copy the configuration of another model of the same robot.
    pub fn copy_state_from(&mut self, other: &RobotModel) {
        self.root = other.root;
        self.q.copy_from(&other.q);
        self.dq.copy_from(&other.dq);
        self.u.copy_from(&other.u);
        self.link_poses.clone_from_slice(&other.link_poses);
        self.com = other.com;
    }

    pub fn root_pose(&self) -> &Isometry3<f64> {
        &self.root
    }

    /// Set the root pose. Link poses are stale until the next FK.
    pub fn set_root_pose(&mut self, pose: Isometry3<f64>) {
        self.root = pose;
    }

    pub fn q(&self) -> &DVector<f64> {
        &self.q
    }

    pub fn q_mut(&mut self) -> &mut DVector<f64> {
        &mut self.q
    }

    pub fn dq(&self) -> &DVector<f64> {
        &self.dq
    }

    pub fn dq_mut(&mut self) -> &mut DVector<f64> {
        &mut self.dq
    }

    pub fn u(&self) -> &DVector<f64> {
        &self.u
    }

    pub fn u_mut(&mut self) -> &mut DVector<f64> {
        &mut self.u
    }

    pub fn link_pose(&self, link: usize) -> &Isometry3<f64> {
        &self.link_poses[link]
    }

    /// World pose of a force sensor.
    pub fn force_sensor_pose(&self, sensor: usize) -> Isometry3<f64> {
        let s = &self.structure.force_sensors[sensor];
        self.link_poses[s.link] * s.local
    }

    /// World centre of mass as of the last `calc_center_of_mass`.
    pub fn com(&self) -> &Vector3<f64> {
        &self.com
    }

    // ---- KINEMATICS ----

    /// Update the world pose of every link from the root pose and joint
    /// angles.
    pub fn calc_forward_kinematics(&mut self) {
        let s = &self.structure;
        for (i, link) in s.links.iter().enumerate() {
            let parent_pose = match link.parent {
                Some(p) => self.link_poses[p],
                None => self.root
            };

            let joint_rot = match link.joint {
                Some(j) => UnitQuaternion::from_axis_angle(&link.axis, self.q[j]),
                None => UnitQuaternion::identity()
            };

            self.link_poses[i] = parent_pose
                * link.offset
                * Isometry3::from_parts(Translation3::identity(), joint_rot);
        }
    }

    /// Update and return the world centre of mass. Requires up to date FK.
    pub fn calc_center_of_mass(&mut self) -> Vector3<f64> {
        let mut sum = Vector3::zeros();
        for (i, link) in self.structure.links.iter().enumerate() {
            sum += self.link_com(i, link) * link.mass;
        }

        self.com = if self.structure.total_mass > 0.0 {
            sum / self.structure.total_mass
        }
        else {
            self.root.translation.vector
        };

        self.com
    }

    /// Rigidly move the whole robot so that `current` (a world pose attached
    /// to the robot) lands on `target`. FK and CoM are recomputed.
    pub fn move_coords(&mut self, target: &Isometry3<f64>, current: &Isometry3<f64>) {
        self.root = target * current.inverse() * self.root;
        self.calc_forward_kinematics();
        self.calc_center_of_mass();
    }

    /// Jacobian of the world velocity of a point fixed to `link`.
    ///
    /// Rows are linear then angular velocity, columns base linear, base
    /// angular (world frame) then joints.
    pub fn link_jacobian(&self, link: usize, point: &Vector3<f64>) -> DMatrix<f64> {
        let mut jac = DMatrix::zeros(6, self.num_dof());

        let r = point - self.root.translation.vector;
        jac.fixed_view_mut::<3, 3>(0, 0).copy_from(&Matrix3::identity());
        jac.fixed_view_mut::<3, 3>(0, 3).copy_from(&(-cross_matrix(&r)));
        jac.fixed_view_mut::<3, 3>(3, 3).copy_from(&Matrix3::identity());

        let s = &self.structure;
        for l in s.chains[link].iter() {
            if let Some(j) = s.links[*l].joint {
                let pose = &self.link_poses[*l];
                let axis = pose.rotation * s.links[*l].axis.into_inner();
                let col = NUM_BASE_DOF + j;

                jac.fixed_view_mut::<3, 1>(0, col)
                    .copy_from(&axis.cross(&(point - pose.translation.vector)));
                jac.fixed_view_mut::<3, 1>(3, col).copy_from(&axis);
            }
        }

        jac
    }

    /// Jacobian of the world CoM velocity (3 x dof).
    pub fn com_jacobian(&self) -> DMatrix<f64> {
        let mut jac = DMatrix::zeros(3, self.num_dof());
        let m = self.structure.total_mass;
        if m <= 0.0 {
            return jac
        }

        for (i, link) in self.structure.links.iter().enumerate() {
            if link.mass <= 0.0 {
                continue
            }
            let j = self.link_jacobian(i, &self.link_com(i, link));
            jac += j.rows(0, 3) * (link.mass / m);
        }

        jac
    }

    /// Jacobian of the angular momentum about the CoM (3 x dof).
    pub fn angular_momentum_jacobian(&self) -> DMatrix<f64> {
        let mut jac = DMatrix::zeros(3, self.num_dof());

        for (i, link) in self.structure.links.iter().enumerate() {
            if link.mass <= 0.0 {
                continue
            }
            let c = self.link_com(i, link);
            let j = self.link_jacobian(i, &c);

            let rot = self.link_poses[i].rotation.to_rotation_matrix();
            let inertia_w = rot.matrix() * link.inertia * rot.matrix().transpose();

            jac += cross_matrix(&(c - self.com)) * j.rows(0, 3) * link.mass
                + inertia_w * j.rows(3, 3);
        }

        jac
    }

    /// World centre of mass of one link.
    fn link_com(&self, i: usize, link: &Link) -> Vector3<f64> {
        (self.link_poses[i] * Point3::from(link.com)).coords
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_fixtures::test_robot;

    const EPS: f64 = 1e-6;

    /// Apply a small generalised displacement to the model.
    fn displace(model: &mut RobotModel, dof: usize, delta: f64) {
        let mut root = *model.root_pose();
        match dof {
            0..=2 => root.translation.vector[dof] += delta,
            3..=5 => {
                let mut w = Vector3::zeros();
                w[dof - 3] = delta;
                root.rotation = UnitQuaternion::from_scaled_axis(w) * root.rotation;
            },
            _ => model.q_mut()[dof - NUM_BASE_DOF] += delta
        }
        model.set_root_pose(root);
        model.calc_forward_kinematics();
        model.calc_center_of_mass();
    }

    fn bent_robot() -> RobotModel {
        let mut model = test_robot();
        for (j, q) in model.q_mut().iter_mut().enumerate() {
            *q += 0.05 * (j as f64 + 1.0).sin();
        }
        model.set_root_pose(Isometry3::from_parts(
            Translation3::new(0.1, -0.05, 0.8),
            UnitQuaternion::from_euler_angles(0.05, -0.1, 0.3)
        ));
        model.calc_forward_kinematics();
        model.calc_center_of_mass();
        model
    }

    #[test]
    fn test_mass_and_symmetric_com() {
        let model = test_robot();
        assert!((model.total_mass() - 25.4).abs() < 1e-9);

        let com = model.com() - model.root_pose().translation.vector;
        assert!(com.x.abs() < 1e-9);
        assert!(com.y.abs() < 1e-9);
    }

    #[test]
    fn test_link_jacobian_matches_finite_difference() {
        let model = bent_robot();
        let link = model.link_index("RLEG_ANKLE_R").unwrap();
        let local = Vector3::new(0.02, 0.0, -0.1);
        let point = |m: &RobotModel| (m.link_pose(link) * Point3::from(local)).coords;

        let jac = model.link_jacobian(link, &point(&model));

        for dof in 0..model.num_dof() {
            let mut m = model.clone();
            displace(&mut m, dof, EPS);
            let fd = (point(&m) - point(&model)) / EPS;
            let an = jac.fixed_view::<3, 1>(0, dof);
            assert!((fd - an).norm() < 1e-4, "dof {}: fd {} jac {}", dof, fd, an);

            let drot = (m.link_pose(link).rotation * model.link_pose(link).rotation.inverse())
                .scaled_axis() / EPS;
            let an_w = jac.fixed_view::<3, 1>(3, dof);
            assert!((drot - an_w).norm() < 1e-4, "dof {}: fd {} jac {}", dof, drot, an_w);
        }
    }

    #[test]
    fn test_com_jacobian_matches_finite_difference() {
        let model = bent_robot();
        let jac = model.com_jacobian();

        for dof in 0..model.num_dof() {
            let mut m = model.clone();
            displace(&mut m, dof, EPS);
            let fd = (m.com() - model.com()) / EPS;
            assert!((fd - jac.fixed_view::<3, 1>(0, dof)).norm() < 1e-4, "dof {}", dof);
        }
    }

    #[test]
    fn test_angular_momentum_jacobian_ignores_translation() {
        let model = bent_robot();
        let jac = model.angular_momentum_jacobian();

        // Pure base translation carries no angular momentum about the CoM
        assert!(jac.columns(0, 3).norm() < 1e-9);
        // A hip pitch swing does
        let hip = model.joint_index("RLEG_HIP_P").unwrap();
        assert!(jac.column(NUM_BASE_DOF + hip).norm() > 1e-3);
    }

    #[test]
    fn test_move_coords_and_copy() {
        let mut model = bent_robot();
        let foot = model.link_index("LLEG_ANKLE_R").unwrap();
        let current = *model.link_pose(foot);
        let target = Isometry3::translation(0.0, 0.1, 0.1);

        model.move_coords(&target, &current);
        let moved = model.link_pose(foot);
        assert!((moved.translation.vector - target.translation.vector).norm() < 1e-12);
        assert!(moved.rotation.angle() < 1e-9);

        let mut other = test_robot();
        other.copy_state_from(&model);
        assert_eq!(other.root_pose(), model.root_pose());
        assert_eq!(other.com(), model.com());
    }

    #[test]
    fn test_nearest_force_sensor() {
        let model = test_robot();
        let ankle = model.link_index("RLEG_ANKLE_R").unwrap();
        let sensor = model.find_nearest_force_sensor(ankle).unwrap();
        assert_eq!(model.force_sensors()[sensor].name, "rfsensor");

        let waist = model.link_index("WAIST").unwrap();
        assert!(model.find_nearest_force_sensor(waist).is_none());
    }
}
