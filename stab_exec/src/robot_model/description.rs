//! TOML description of a robot model

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;
use nalgebra::{Isometry3, Matrix3, Translation3, Unit, UnitQuaternion, Vector3};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

// Internal
use super::{ForceSensor, Joint, Link, RateGyro, RobotModel, RobotModelError};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Description of a robot as read from its model file.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelDescription {
    pub name: String,

    /// Initial root position.
    ///
    /// Units: meters
    #[serde(default)]
    pub root_pos: [f64; 3],

    /// Initial root orientation as roll, pitch, yaw.
    ///
    /// Units: radians
    #[serde(default)]
    pub root_rpy: [f64; 3],

    /// Links in topological order, root first.
    pub links: Vec<LinkDescription>,

    #[serde(default)]
    pub force_sensors: Vec<SensorDescription>,

    #[serde(default)]
    pub gyrometer: Option<SensorDescription>,
}

/// One link and the joint attaching it to its parent.
///
/// Revolute joints take the name of the link they move.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkDescription {
    pub name: String,

    #[serde(default)]
    pub parent: Option<String>,

    #[serde(default)]
    pub joint_type: JointType,

    /// Joint frame origin in the parent frame.
    ///
    /// Units: meters
    #[serde(default)]
    pub offset_pos: [f64; 3],

    /// Joint frame orientation in the parent frame.
    ///
    /// Units: radians
    #[serde(default)]
    pub offset_rpy: [f64; 3],

    #[serde(default = "default_axis")]
    pub axis: [f64; 3],

    /// Units: radians
    #[serde(default = "default_q_range")]
    pub q_range: [f64; 2],

    /// Units: radians/second
    #[serde(default = "default_dq_range")]
    pub dq_range: [f64; 2],

    /// Units: amperes
    #[serde(default)]
    pub climit: f64,

    #[serde(default = "default_one")]
    pub gear_ratio: f64,

    /// Units: newton meters/ampere
    #[serde(default = "default_one")]
    pub torque_const: f64,

    /// Joint angle the model starts at.
    ///
    /// Units: radians
    #[serde(default)]
    pub init_q: f64,

    /// Units: kilograms
    #[serde(default)]
    pub mass: f64,

    /// Units: meters
    #[serde(default)]
    pub com: [f64; 3],

    /// Principal moments of inertia about the centre of mass.
    ///
    /// Units: kilogram meters^2
    #[serde(default)]
    pub inertia: [f64; 3],
}

/// A sensor fixed to a link.
#[derive(Debug, Clone, Deserialize)]
pub struct SensorDescription {
    pub name: String,
    pub link: String,

    #[serde(default)]
    pub local_pos: [f64; 3],

    #[serde(default)]
    pub local_rpy: [f64; 3],
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointType {
    Revolute,
    Fixed,
}

impl Default for JointType {
    fn default() -> Self {
        JointType::Revolute
    }
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ModelDescription {
    /// Load a description from a model file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RobotModelError> {
        Ok(util::params::load_from_path(path)?)
    }

    /// Parse a description from a TOML string.
    pub fn parse(model_str: &str) -> Result<Self, RobotModelError> {
        Ok(util::params::parse(model_str)?)
    }

    /// Resolve names and build the model at its initial configuration.
    pub fn build(&self) -> Result<RobotModel, RobotModelError> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        for (i, l) in self.links.iter().enumerate() {
            if index.insert(l.name.as_str(), i).is_some() {
                return Err(RobotModelError::DuplicateName(l.name.clone()))
            }
        }

        let mut links = Vec::with_capacity(self.links.len());
        let mut joints = Vec::new();
        let mut init_q = Vec::new();

        for (i, l) in self.links.iter().enumerate() {
            let parent = match &l.parent {
                None => None,
                Some(p) => match index.get(p.as_str()) {
                    None => return Err(RobotModelError::UnknownParent {
                        link: l.name.clone(),
                        parent: p.clone()
                    }),
                    Some(pi) if *pi >= i => return Err(RobotModelError::ParentAfterChild {
                        link: l.name.clone(),
                        parent: p.clone()
                    }),
                    Some(pi) => Some(*pi)
                }
            };

            let axis = Unit::try_new(Vector3::from(l.axis), 1e-9)
                .ok_or_else(|| RobotModelError::DegenerateAxis(l.name.clone()))?;

            let joint = match (parent, l.joint_type) {
                (Some(_), JointType::Revolute) => {
                    joints.push(Joint {
                        name: l.name.clone(),
                        link: i,
                        q_min: l.q_range[0],
                        q_max: l.q_range[1],
                        dq_min: l.dq_range[0],
                        dq_max: l.dq_range[1],
                        climit: l.climit,
                        gear_ratio: l.gear_ratio,
                        torque_const: l.torque_const,
                    });
                    init_q.push(l.init_q);
                    Some(joints.len() - 1)
                },
                _ => None
            };

            links.push(Link {
                name: l.name.clone(),
                parent,
                joint,
                offset: pose_from_arrays(&l.offset_pos, &l.offset_rpy),
                axis,
                mass: l.mass,
                com: Vector3::from(l.com),
                inertia: Matrix3::from_diagonal(&Vector3::from(l.inertia)),
            });
        }

        let find_link = |s: &SensorDescription| {
            index.get(s.link.as_str()).copied().ok_or_else(|| {
                RobotModelError::UnknownSensorLink {
                    sensor: s.name.clone(),
                    link: s.link.clone()
                }
            })
        };

        let mut force_sensors = Vec::with_capacity(self.force_sensors.len());
        for s in self.force_sensors.iter() {
            force_sensors.push(ForceSensor {
                name: s.name.clone(),
                link: find_link(s)?,
                local: pose_from_arrays(&s.local_pos, &s.local_rpy),
            });
        }

        let gyrometer = match &self.gyrometer {
            Some(g) => Some(RateGyro {
                name: g.name.clone(),
                link: find_link(g)?,
                local: pose_from_arrays(&g.local_pos, &g.local_rpy),
            }),
            None => None
        };

        let mut model = RobotModel::from_parts(links, joints, force_sensors, gyrometer)?;

        model.set_root_pose(pose_from_arrays(&self.root_pos, &self.root_rpy));
        for (j, q) in init_q.iter().enumerate() {
            model.q_mut()[j] = *q;
        }
        model.calc_forward_kinematics();
        model.calc_center_of_mass();

        debug!(
            "Built robot model {}: {} links, {} joints, {} force sensors, mass {:.3} kg",
            self.name,
            model.links().len(),
            model.num_joints(),
            model.force_sensors().len(),
            model.total_mass()
        );

        Ok(model)
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn pose_from_arrays(pos: &[f64; 3], rpy: &[f64; 3]) -> Isometry3<f64> {
    Isometry3::from_parts(
        Translation3::new(pos[0], pos[1], pos[2]),
        UnitQuaternion::from_euler_angles(rpy[0], rpy[1], rpy[2])
    )
}

fn default_axis() -> [f64; 3] {
    [0.0, 0.0, 1.0]
}

fn default_q_range() -> [f64; 2] {
    [-std::f64::consts::PI, std::f64::consts::PI]
}

fn default_dq_range() -> [f64; 2] {
    [-20.0, 20.0]
}

fn default_one() -> f64 {
    1.0
}
