//! Implementations for the AutoStabilizer state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, trace, warn};
use nalgebra::{
    Isometry3, Point3, Translation3, UnitQuaternion, Vector2, Vector3, Vector6
};
use serde::Serialize;
use std::convert::Infallible;

// Internal
use super::{AutoStabilizerInitError, EndEffectorParams, Params, LEG_NAMES};
use crate::ctrl_mode::{ControlMode, Mode};
use crate::footstep_gen::FootstepGenerator;
use crate::frame_conv::{merge_imu_attitude, ActToGenFrameConverter, RefToGenFrameConverter};
use crate::fullbody_ik::FullbodyIkSolver;
use crate::gait::{
    FootGeometry, FootstepNode, GaitParam, LegTrajectory, LinearTrajectory, LLEG, NUM_LEGS, RLEG
};
use crate::imp_ctrl::ImpedanceController;
use crate::leg_coords_gen::LegCoordsGenerator;
use crate::limbs::{apply_offset, EndEffector, JointParam};
use crate::output_blend::{OutputBlender, RobotCommand};
use crate::robot_model::{ModelDescription, RobotModel};
use crate::stabilizer::Stabilizer;
use util::{
    archive::{ArchiveError, Archived, Archiver},
    maths::{calc_mid_coords_pair, orient_coord_to_axis},
    module::State,
    params,
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// AutoStabilizer module state
pub struct AutoStabilizer {
    pub(crate) params: Params,

    /// Robot as commanded by the reference, in the reference frame.
    ref_robot_raw: RobotModel,

    /// Robot as measured, root attitude from the IMU.
    act_robot_raw: RobotModel,

    /// Reference robot moved into the generate frame.
    pub(crate) ref_robot: RobotModel,

    /// Measured robot moved into the generate frame.
    pub(crate) act_robot: RobotModel,

    /// Robot solved by the IK, the source of the output.
    pub(crate) gen_robot: RobotModel,

    /// Last good wrench of each force sensor, sensor frame.
    sensor_wrench: Vec<Vector6<f64>>,

    /// Last good IMU attitude, if one was ever received.
    act_imu_rpy: Option<Vector3<f64>>,

    pub(crate) ees: Vec<EndEffector>,
    pub(crate) joint_params: Vec<JointParam>,
    pub(crate) gait: GaitParam,

    pub(crate) mode: ControlMode,
    pub(crate) ref_to_gen: RefToGenFrameConverter,
    act_to_gen: ActToGenFrameConverter,
    pub(crate) footstep_gen: FootstepGenerator,
    leg_coords_gen: LegCoordsGenerator,
    pub(crate) imp_ctrl: ImpedanceController,
    stabilizer: Stabilizer,
    fullbody_ik: FullbodyIkSolver,
    pub(crate) blender: OutputBlender,

    pub(crate) output: Option<OutputData>,

    pub(crate) report: StatusReport,
    arch_report: Archiver,
}

/// Input data to the AutoStabilizer.
///
/// Every field is `None` if nothing new arrived this cycle. Vectors of the
/// wrong length are ignored and non-finite elements are dropped, keeping the
/// last good value.
#[derive(Debug, Clone, Default)]
pub struct InputData {
    /// Reference joint angles. A cycle without them does nothing.
    ///
    /// Units: radians
    pub q_ref: Option<Vec<f64>>,

    /// Reference joint torques.
    ///
    /// Units: newton meters
    pub tau_ref: Option<Vec<f64>>,

    /// Units: meters
    pub ref_base_pos: Option<[f64; 3]>,

    /// Units: radians
    pub ref_base_rpy: Option<[f64; 3]>,

    /// Measured joint angles.
    ///
    /// Units: radians
    pub q_act: Option<Vec<f64>>,

    /// Measured joint velocities.
    ///
    /// Units: radians/second
    pub dq_act: Option<Vec<f64>>,

    /// Measured attitude of the gyrometer frame.
    ///
    /// Units: radians
    pub act_imu_rpy: Option<[f64; 3]>,

    /// Reference wrench of each end effector, `[force, moment]` in the
    /// reference frame.
    pub ref_wrench: Vec<Option<[f64; 6]>>,

    /// Measured wrench of each force sensor, `[force, moment]` in the sensor
    /// frame.
    pub act_wrench: Vec<Option<[f64; 6]>>,
}

/// Joint and base command produced each cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutputData {
    /// Units: radians
    pub q: Vec<f64>,

    /// Units: newton meters
    pub tau: Vec<f64>,

    /// Units: meters
    pub base_pos: [f64; 3],

    /// Units: radians
    pub base_rpy: [f64; 3],

    /// Base position followed by the row-major base rotation matrix.
    pub base_tform: [f64; 12],
}

/// Status report for AutoStabilizer processing.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    pub mode: Mode,
    pub mode_changed: bool,

    /// Time left in a transient mode.
    ///
    /// Units: seconds
    pub remain_time: f64,

    /// No new reference this cycle, the previous output was repeated.
    pub skipped: bool,

    /// The IK step was rejected this cycle.
    pub ik_failed: bool,

    pub num_footstep_nodes: usize,

    /// Units: meters
    pub gen_cog_x: f64,
    pub gen_cog_y: f64,
    pub gen_cog_z: f64,
    pub act_cog_x: f64,
    pub act_cog_y: f64,
    pub gen_zmp_x: f64,
    pub gen_zmp_y: f64,
    pub target_zmp_x: f64,
    pub target_zmp_y: f64,

    /// Units: radians
    pub st_root_roll: f64,
    pub st_root_pitch: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl From<&RobotCommand> for OutputData {
    fn from(cmd: &RobotCommand) -> Self {
        let p = cmd.base_pose.translation.vector;
        OutputData {
            q: cmd.q.iter().copied().collect(),
            tau: cmd.tau.iter().copied().collect(),
            base_pos: [p.x, p.y, p.z],
            base_rpy: cmd.base_rpy(),
            base_tform: cmd.base_tform(),
        }
    }
}

impl AutoStabilizer {
    /// Build the AutoStabilizer for the given robot.
    ///
    /// The first two end effectors must be the right and left legs.
    pub fn new(params: Params, model: RobotModel) -> Result<Self, AutoStabilizerInitError> {
        if !(params.dt.is_finite() && params.dt > 0.0) {
            return Err(AutoStabilizerInitError::NonPositiveDt(params.dt))
        }

        params.footstep.validate().map_err(AutoStabilizerInitError::FootstepParams)?;

        for name in params.uncontrollable_joints.iter() {
            if model.joint_index(name).is_none() {
                return Err(AutoStabilizerInitError::UnknownJoint(name.clone()))
            }
        }

        let mut model = model;
        model.calc_forward_kinematics();
        model.calc_center_of_mass();

        let ees = build_end_effectors(&params.end_effectors, &model)?;
        let gait = build_gait(&params.end_effectors, &ees, &model)?;
        let joint_params = JointParam::from_model(&model, &params.uncontrollable_joints);

        info!(
            "AutoStabilizer built for {} joints, {} end effectors, {:.2} kg",
            model.num_joints(), ees.len(), model.total_mass()
        );

        Ok(Self {
            sensor_wrench: vec![Vector6::zeros(); model.force_sensors().len()],
            act_imu_rpy: None,
            mode: ControlMode::new(params.mode.clone()),
            ref_to_gen: RefToGenFrameConverter::new(params.ref_to_gen.clone()),
            act_to_gen: ActToGenFrameConverter::new(),
            footstep_gen: FootstepGenerator::new(params.footstep.clone()),
            leg_coords_gen: LegCoordsGenerator::new(params.leg_coords.clone()),
            imp_ctrl: ImpedanceController::new(params.impedance.clone(), ees.len()),
            stabilizer: Stabilizer::new(params.stabilizer.clone()),
            fullbody_ik: FullbodyIkSolver::new(params.fullbody_ik.clone()),
            blender: OutputBlender::new(model.num_joints()),
            ref_robot_raw: model.clone(),
            act_robot_raw: model.clone(),
            ref_robot: model.clone(),
            act_robot: model.clone(),
            gen_robot: model,
            ees,
            joint_params,
            gait,
            output: None,
            report: StatusReport::default(),
            arch_report: Archiver::default(),
            params,
        })
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn mode(&self) -> Mode {
        self.mode.now()
    }

    pub fn control_mode(&self) -> &ControlMode {
        &self.mode
    }

    pub fn gait(&self) -> &GaitParam {
        &self.gait
    }

    pub fn end_effectors(&self) -> &[EndEffector] {
        &self.ees
    }

    pub fn gen_robot(&self) -> &RobotModel {
        &self.gen_robot
    }

    pub fn report(&self) -> &StatusReport {
        &self.report
    }

    /// Copy the new inputs into the raw robots.
    ///
    /// Returns true if new reference joint angles arrived.
    fn read_inputs(&mut self, input: &InputData) -> bool {
        let n = self.ref_robot_raw.num_joints();

        if let Some(q) = valid_len(&input.q_ref, n, "reference joint angles") {
            copy_finite(q, self.ref_robot_raw.q_mut().as_mut_slice());
        }
        if let Some(tau) = valid_len(&input.tau_ref, n, "reference torques") {
            copy_finite(tau, self.ref_robot_raw.u_mut().as_mut_slice());
        }

        let mut root = *self.ref_robot_raw.root_pose();
        if let Some(pos) = input.ref_base_pos {
            copy_finite(&pos, root.translation.vector.as_mut_slice());
        }
        if let Some(rpy) = input.ref_base_rpy {
            let (r, p, y) = root.rotation.euler_angles();
            let mut current = [r, p, y];
            copy_finite(&rpy, &mut current);
            root.rotation = UnitQuaternion::from_euler_angles(current[0], current[1], current[2]);
        }
        self.ref_robot_raw.set_root_pose(root);
        self.ref_robot_raw.calc_forward_kinematics();
        self.ref_robot_raw.calc_center_of_mass();

        for (ee, w) in self.ees.iter_mut().zip(input.ref_wrench.iter()) {
            if let Some(w) = w {
                copy_finite(w, ee.ref_wrench_origin.as_mut_slice());
            }
        }

        if let Some(q) = valid_len(&input.q_act, n, "measured joint angles") {
            copy_finite(q, self.act_robot_raw.q_mut().as_mut_slice());
        }
        if let Some(dq) = valid_len(&input.dq_act, n, "measured joint velocities") {
            copy_finite(dq, self.act_robot_raw.dq_mut().as_mut_slice());
        }
        if let Some(rpy) = input.act_imu_rpy {
            let mut current = self.act_imu_rpy.unwrap_or_else(Vector3::zeros);
            copy_finite(&rpy, current.as_mut_slice());
            self.act_imu_rpy = Some(current);
        }
        match self.act_imu_rpy {
            Some(rpy) => merge_imu_attitude(&mut self.act_robot_raw, &rpy),
            None => {
                self.act_robot_raw.calc_forward_kinematics();
                self.act_robot_raw.calc_center_of_mass();
            }
        }

        for (sw, w) in self.sensor_wrench.iter_mut().zip(input.act_wrench.iter()) {
            if let Some(w) = w {
                copy_finite(w, sw.as_mut_slice());
            }
        }

        input.q_ref.is_some()
    }

    /// Seed the generated state from the reference when balancing starts.
    fn on_activate_balancer(&mut self) {
        self.ref_to_gen.reset();
        self.act_to_gen.reset();
        self.footstep_gen.reset();
        self.imp_ctrl.reset();
        for ee in self.ees.iter_mut() {
            ee.ic_offset.reset(Vector6::zeros());
            ee.st_offset.reset(Vector6::zeros());
        }

        let init = self.ref_to_gen.init_gen_robot(&self.ref_robot_raw, &self.ees, &self.gait);
        self.gen_robot = init.gen_robot;
        seed_gait(&mut self.gait, &self.gen_robot, &self.ees, init.foot_mid_coords);

        info!("Balancer activated, CoM height {:.3} m", self.gait.dz);
    }

    /// Ramp the corrective offsets out while balancing is off.
    fn release_offsets(&mut self, dt: f64) {
        if self.mode.is_sync_to_idle_init() {
            let remain = self.mode.remain_time();
            for ee in self.ees.iter_mut() {
                ee.ic_offset.set_goal(Vector6::zeros(), remain);
                ee.st_offset.set_goal(Vector6::zeros(), remain);
            }
            self.gait.st_offset_root_rpy.set_goal(Vector3::zeros(), remain);
            self.imp_ctrl.reset();
            self.footstep_gen.reset();
            return
        }

        for ee in self.ees.iter_mut() {
            ee.ic_offset.interpolate(dt);
            ee.st_offset.interpolate(dt);
        }
        self.gait.st_offset_root_rpy.interpolate(dt);
    }

    /// Everything between the inputs and the IK, on a balancing cycle.
    fn exec_auto_stabilizer(&mut self, dt: f64) {
        // ---- FRAME CONVERSION ----

        let ref_frame = self.ref_to_gen.convert_frame(
            &self.ref_robot_raw, &self.ees, &self.gait, dt);
        self.ref_robot = ref_frame.ref_robot;
        self.gait.foot_mid_coords = ref_frame.foot_mid_coords;
        self.gait.dz = ref_frame.dz;
        self.gait.l = Vector3::new(0.0, 0.0, ref_frame.dz);
        for (i, ee) in self.ees.iter_mut().enumerate() {
            ee.ref_pose = ref_frame.ref_pose[i];
            ee.ref_wrench = ref_frame.ref_wrench[i];
        }

        let act_frame = self.act_to_gen.convert_frame(
            &self.act_robot_raw, &self.sensor_wrench, &self.ees, &self.gait, dt);
        self.act_robot = act_frame.act_robot;
        self.gait.act_cog = act_frame.act_cog;
        self.gait.act_cog_vel = act_frame.act_cog_vel;
        for (i, ee) in self.ees.iter_mut().enumerate() {
            ee.act_pose = act_frame.act_pose[i];
            ee.act_wrench = act_frame.act_wrench[i];
        }

        // ---- IMPEDANCE ----

        let ic_offsets = self.imp_ctrl.calc_impedance_control(&self.ees, dt);
        for (ee, mut offset) in self.ees.iter_mut().zip(ic_offsets) {
            offset.interpolate(dt);
            ee.ic_offset = offset;
            ee.ic_target_pose = apply_offset(&ee.ref_pose, &ee.ic_offset.value());
        }

        // ---- GENERATION ----

        let (nodes, src_coords) = self.footstep_gen.calc_foot_steps(&self.gait, dt);
        self.gait.footstep_nodes = nodes;
        self.gait.src_coords = src_coords;

        let legs = self.leg_coords_gen.calc_leg_coords(&self.gait, dt);
        self.gait.ref_zmp_traj = legs.ref_zmp_traj;
        self.gait.gen_coords = legs.gen_coords;
        self.gait.src_coords = legs.src_coords;
        self.gait.prev_support_phase = legs.prev_support_phase;

        let com = self.leg_coords_gen.calc_com_coords(&self.gait, dt);
        self.gait.gen_cog = com.gen_cog;
        self.gait.gen_cog_vel = com.gen_cog_vel;
        self.gait.gen_zmp = com.gen_zmp;

        // Legs follow the generated trajectories, the other limbs the
        // impedance targets
        for (i, ee) in self.ees.iter_mut().enumerate() {
            ee.abc_target_pose = if i < NUM_LEGS {
                self.gait.gen_coords[i].value()
            }
            else {
                ee.ic_target_pose
            };
        }

        // ---- STABILIZER ----

        if self.mode.is_st_running() {
            let st = self.stabilizer.exec_stabilizer(
                &self.gait, &self.ees, self.gen_robot.total_mass(), dt);
            self.gait.st_offset_root_rpy = st.st_offset_root_rpy;
            for (ee, offset) in self.ees.iter_mut().zip(st.st_offset) {
                ee.st_offset = offset;
            }
            self.report.target_zmp_x = st.target_zmp.x;
            self.report.target_zmp_y = st.target_zmp.y;
        }
        else if self.mode.is_sync_to_stop_st_init() {
            let remain = self.mode.remain_time();
            self.gait.st_offset_root_rpy.set_goal(Vector3::zeros(), remain);
            for ee in self.ees.iter_mut() {
                ee.st_offset.set_goal(Vector6::zeros(), remain);
            }
        }
        self.gait.st_offset_root_rpy.interpolate(dt);
        for ee in self.ees.iter_mut() {
            ee.st_offset.interpolate(dt);
        }

        // Lean the reference root about the foot-mid axes
        let mid_rot = self.gait.foot_mid_coords.value().rotation;
        let rpy = self.gait.st_offset_root_rpy.value();
        let lean = UnitQuaternion::from_euler_angles(rpy.x, rpy.y, rpy.z);
        let ref_root = *self.ref_robot.root_pose();
        self.gait.st_target_root_pose = Isometry3::from_parts(
            ref_root.translation,
            mid_rot * lean * mid_rot.inverse() * ref_root.rotation
        );

        for ee in self.ees.iter_mut() {
            ee.st_target_pose = apply_offset(&ee.abc_target_pose, &ee.st_offset.value());
        }
    }

    fn fill_report(&mut self) {
        let r = &mut self.report;
        r.mode = self.mode.now();
        r.mode_changed = self.mode.changed();
        r.remain_time = self.mode.remain_time();
        r.num_footstep_nodes = self.gait.footstep_nodes.len();
        r.gen_cog_x = self.gait.gen_cog.x;
        r.gen_cog_y = self.gait.gen_cog.y;
        r.gen_cog_z = self.gait.gen_cog.z;
        r.act_cog_x = self.gait.act_cog.x;
        r.act_cog_y = self.gait.act_cog.y;
        r.gen_zmp_x = self.gait.gen_zmp.x;
        r.gen_zmp_y = self.gait.gen_zmp.y;
        let rpy = self.gait.st_offset_root_rpy.value();
        r.st_root_roll = rpy.x;
        r.st_root_pitch = rpy.y;
    }
}

impl State for AutoStabilizer {
    type InitData = &'static str;
    type InitError = AutoStabilizerInitError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = Infallible;

    /// Initialise the AutoStabilizer module.
    ///
    /// Expected init data is the path to the parameter file, the robot model
    /// file it names is loaded from the same directory.
    fn init(init_data: Self::InitData, session: &Session) -> Result<Self, Self::InitError> {
        let params: Params = params::load(init_data)?;

        let model_path = params::params_dir()?.join(&params.robot_model_file);
        let model = ModelDescription::load(&model_path)?.build()?;
        info!("Robot model loaded from {:?}", model_path);

        let mut state = Self::new(params, model)?;
        state.arch_report = Archiver::from_path(session, "auto_stab/status_report.csv")?;

        Ok(state)
    }

    /// Perform one control cycle.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        self.report = StatusReport::default();
        let dt = self.params.dt;

        if !self.read_inputs(input_data) {
            self.fill_report();
            self.report.skipped = true;
            trace!("No new reference, repeating the previous output");

            let output = match self.output {
                Some(ref o) => o.clone(),
                None => OutputData::from(&command_of(&self.ref_robot_raw))
            };
            return Ok((output, self.report))
        }

        self.mode.update(dt);
        self.ref_to_gen.update(dt);
        if self.mode.changed() {
            info!("AutoStabilizer mode is now {:?}", self.mode.now());
        }

        if !self.mode.is_abc_running() {
            self.gen_robot.copy_state_from(&self.ref_robot_raw);
            self.release_offsets(dt);
        }
        else {
            if self.mode.is_sync_to_abc_init() {
                self.on_activate_balancer();
            }

            self.exec_auto_stabilizer(dt);

            if let Err(e) = self.fullbody_ik.solve(
                &mut self.gen_robot,
                &self.ees,
                &self.ref_robot,
                &self.gait,
                &self.joint_params,
                dt
            ) {
                warn!("Whole-body IK step rejected: {}", e);
                self.report.ik_failed = true;
            }

            // Torques pass through
            self.gen_robot.u_mut().copy_from(self.ref_robot_raw.u());
        }

        let cmd = self.blender.blend(&command_of(&self.gen_robot), &self.mode, dt);
        let output = OutputData::from(&cmd);
        self.output = Some(output.clone());

        self.fill_report();

        trace!(
            "AutoStabilizer {:?}, CoM ({:.4}, {:.4}), ZMP ({:.4}, {:.4})",
            self.report.mode,
            self.report.gen_cog_x, self.report.gen_cog_y,
            self.report.gen_zmp_x, self.report.gen_zmp_y
        );

        Ok((output, self.report))
    }
}

impl Archived for AutoStabilizer {
    fn write(&mut self) -> Result<(), ArchiveError> {
        self.arch_report.serialise(self.report)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Build the end effectors from their parameters.
pub(crate) fn build_end_effectors(
    params: &[EndEffectorParams],
    model: &RobotModel
) -> Result<Vec<EndEffector>, AutoStabilizerInitError> {
    if params.len() < NUM_LEGS {
        return Err(AutoStabilizerInitError::TooFewEndEffectors(params.len()))
    }
    for (i, expected) in LEG_NAMES.iter().enumerate() {
        if params[i].name != *expected {
            return Err(AutoStabilizerInitError::UnexpectedLegName {
                index: i,
                expected: expected.to_string(),
                found: params[i].name.clone(),
            })
        }
    }

    params.iter()
        .map(|p| {
            let link = model.link_index(&p.parent_link)
                .ok_or_else(|| AutoStabilizerInitError::UnknownLink {
                    ee: p.name.clone(),
                    link: p.parent_link.clone(),
                })?;
            let local = Isometry3::from_parts(
                Translation3::from(Vector3::from(p.local_pos)),
                UnitQuaternion::from_euler_angles(p.local_rpy[0], p.local_rpy[1], p.local_rpy[2])
            );
            let sensor = model.find_nearest_force_sensor(link);
            if sensor.is_none() {
                warn!("End effector {} has no force sensor, its wrench reads zero", p.name);
            }
            Ok(EndEffector::new(&p.name, link, local, sensor))
        })
        .collect()
}

/// Build the gait state from the leg geometry of the model at its initial
/// configuration.
///
/// The neutral stance of each leg is its offset from the foot-mid coordinate
/// on the ground plane.
pub(crate) fn build_gait(
    params: &[EndEffectorParams],
    ees: &[EndEffector],
    model: &RobotModel
) -> Result<GaitParam, AutoStabilizerInitError> {
    let legs = [ees[RLEG].pose_in(model), ees[LLEG].pose_in(model)];
    let mid = orient_coord_to_axis(
        &calc_mid_coords_pair(&legs[RLEG], &legs[LLEG], 0.5), &Vector3::z());

    let mut feet = Vec::with_capacity(NUM_LEGS);
    for leg in 0..NUM_LEGS {
        let foot = &params[leg].foot;
        if foot.sole_vertices.len() < 3 {
            return Err(AutoStabilizerInitError::InvalidSole(params[leg].name.clone()))
        }

        let mut default_translate_pos = (mid.inverse() * legs[leg]).translation.vector;
        default_translate_pos.z = 0.0;

        feet.push(FootGeometry {
            default_translate_pos,
            cop_offset: Vector3::from(foot.cop_offset),
            sole_hull: foot.sole_vertices.iter().map(|v| Vector2::new(v[0], v[1])).collect(),
        });
    }

    Ok(GaitParam::new(&[feet[RLEG].clone(), feet[LLEG].clone()]))
}

/// Reset the gait to a stand at the current state of `robot`.
pub(crate) fn seed_gait(
    gait: &mut GaitParam,
    robot: &RobotModel,
    ees: &[EndEffector],
    foot_mid: Isometry3<f64>
) {
    let legs = [ees[RLEG].pose_in(robot), ees[LLEG].pose_in(robot)];
    let com = *robot.com();

    gait.foot_mid_coords.reset(foot_mid);
    gait.gen_cog = com;
    gait.gen_cog_vel = Vector3::zeros();
    gait.act_cog = com;
    gait.act_cog_vel = Vector3::zeros();
    gait.dz = (foot_mid.inverse() * Point3::from(com)).z;
    gait.l = Vector3::new(0.0, 0.0, gait.dz);

    gait.footstep_nodes.clear();
    gait.footstep_nodes.push_back(FootstepNode::stand(legs, 0.0));
    gait.src_coords = legs;
    gait.gen_coords = [LegTrajectory::new(legs[RLEG]), LegTrajectory::new(legs[LLEG])];
    gait.prev_support_phase = [true; NUM_LEGS];

    let zmp = (gait.cop_point(RLEG, &legs[RLEG]) + gait.cop_point(LLEG, &legs[LLEG])) / 2.0;
    gait.ref_zmp_traj = vec![LinearTrajectory::new(zmp, zmp, 0.0)];
    gait.gen_zmp = zmp;

    gait.st_offset_root_rpy.reset(Vector3::zeros());
    gait.st_target_root_pose = *robot.root_pose();
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn command_of(robot: &RobotModel) -> RobotCommand {
    RobotCommand {
        q: robot.q().clone(),
        tau: robot.u().clone(),
        base_pose: *robot.root_pose(),
    }
}

/// The vector if it has the expected length.
fn valid_len<'a>(v: &'a Option<Vec<f64>>, len: usize, what: &str) -> Option<&'a [f64]> {
    match v {
        Some(v) if v.len() == len => Some(v.as_slice()),
        Some(v) => {
            warn!("Ignoring {} of length {}, expected {}", what, v.len(), len);
            None
        },
        None => None
    }
}

/// Copy the finite elements of `src` into `dst`.
fn copy_finite(src: &[f64], dst: &mut [f64]) {
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        if s.is_finite() {
            *d = *s;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ctrl_mode::Transition;
    use crate::footstep_gen::FootstepError;
    use crate::test_fixtures::{test_params, test_robot};

    fn stabilizer() -> AutoStabilizer {
        AutoStabilizer::new(test_params(), test_robot()).unwrap()
    }

    /// Input holding the model's initial posture, both feet loaded evenly.
    fn standing_input(s: &AutoStabilizer) -> InputData {
        let robot = test_robot();
        let half = robot.total_mass() * crate::gait::GRAVITY / 2.0;
        let mut act_wrench = vec![None; robot.force_sensors().len()];
        for leg in 0..NUM_LEGS {
            if let Some(fs) = s.end_effectors()[leg].force_sensor {
                act_wrench[fs] = Some([0.0, 0.0, half, 0.0, 0.0, 0.0]);
            }
        }

        InputData {
            q_ref: Some(robot.q().iter().copied().collect()),
            tau_ref: Some(vec![0.0; robot.num_joints()]),
            q_act: Some(robot.q().iter().copied().collect()),
            dq_act: Some(vec![0.0; robot.num_joints()]),
            act_imu_rpy: Some([0.0; 3]),
            act_wrench,
            ..InputData::default()
        }
    }

    fn run(s: &mut AutoStabilizer, input: &InputData, time: f64) -> OutputData {
        let ticks = (time / s.params().dt).round() as usize;
        let mut out = OutputData::default();
        for _ in 0..ticks {
            out = s.proc(input).unwrap().0;
        }
        out
    }

    #[test]
    fn test_invalid_configurations() {
        let mut p = test_params();
        p.dt = 0.0;
        assert!(matches!(
            AutoStabilizer::new(p, test_robot()),
            Err(AutoStabilizerInitError::NonPositiveDt(_))
        ));

        let mut p = test_params();
        p.end_effectors.truncate(1);
        assert!(matches!(
            AutoStabilizer::new(p, test_robot()),
            Err(AutoStabilizerInitError::TooFewEndEffectors(1))
        ));

        let mut p = test_params();
        p.end_effectors.swap(0, 1);
        assert!(matches!(
            AutoStabilizer::new(p, test_robot()),
            Err(AutoStabilizerInitError::UnexpectedLegName { index: 0, .. })
        ));

        let mut p = test_params();
        p.end_effectors[2].parent_link = "TAIL".into();
        assert!(matches!(
            AutoStabilizer::new(p, test_robot()),
            Err(AutoStabilizerInitError::UnknownLink { .. })
        ));

        let mut p = test_params();
        p.uncontrollable_joints.push("NECK_Y".into());
        assert!(matches!(
            AutoStabilizer::new(p, test_robot()),
            Err(AutoStabilizerInitError::UnknownJoint(_))
        ));

        let mut p = test_params();
        p.end_effectors[1].foot.sole_vertices.truncate(2);
        assert!(matches!(
            AutoStabilizer::new(p, test_robot()),
            Err(AutoStabilizerInitError::InvalidSole(_))
        ));

        let mut p = test_params();
        p.footstep.max_stride[0] = 0.0;
        assert!(matches!(
            AutoStabilizer::new(p, test_robot()),
            Err(AutoStabilizerInitError::FootstepParams(FootstepError::InvalidParam("max_stride")))
        ));
    }

    #[test]
    fn test_neutral_stance_from_model() {
        let s = stabilizer();
        let dtp = [
            s.gait().default_translate_pos[RLEG].value(),
            s.gait().default_translate_pos[LLEG].value(),
        ];
        assert!((dtp[RLEG] - Vector3::new(0.0, -0.1, 0.0)).norm() < 1e-9);
        assert!((dtp[LLEG] - Vector3::new(0.0, 0.1, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn test_no_reference_repeats_output() {
        let mut s = stabilizer();
        let input = standing_input(&s);
        let first = s.proc(&input).unwrap().0;

        let (again, report) = s.proc(&InputData::default()).unwrap();
        assert!(report.skipped);
        assert_eq!(again, first);
    }

    #[test]
    fn test_input_filtering() {
        let mut s = stabilizer();
        let mut input = standing_input(&s);
        let knee = s.gen_robot().joint_index("RLEG_KNEE").unwrap();
        let n = s.gen_robot().num_joints();

        let mut q = vec![0.0; n];
        q[knee] = 0.8;
        input.q_ref = Some(q.clone());
        let out = s.proc(&input).unwrap().0;
        assert_eq!(out.q[knee], 0.8);

        // A non-finite element keeps its last value, the others update
        q[knee] = f64::NAN;
        q[0] = 0.1;
        input.q_ref = Some(q);
        let out = s.proc(&input).unwrap().0;
        assert_eq!(out.q[knee], 0.8);
        assert_eq!(out.q[0], 0.1);

        // A vector of the wrong length is ignored altogether
        input.q_ref = Some(vec![0.5; n - 1]);
        let out = s.proc(&input).unwrap().0;
        assert_eq!(out.q[knee], 0.8);
        assert_eq!(out.q[0], 0.1);

        input.ref_base_pos = Some([0.3, f64::INFINITY, 0.9]);
        let out = s.proc(&input).unwrap().0;
        assert_eq!(out.base_pos, [0.3, 0.0, 0.9]);
    }

    #[test]
    fn test_idle_passes_reference_through() {
        let mut s = stabilizer();
        let mut input = standing_input(&s);
        input.tau_ref = Some(vec![1.5; s.gen_robot().num_joints()]);
        input.ref_base_pos = Some([0.2, 0.0, 0.8]);

        let out = s.proc(&input).unwrap().0;
        assert_eq!(out.q, input.q_ref.clone().unwrap());
        assert_eq!(out.tau, input.tau_ref.clone().unwrap());
        assert_eq!(out.base_pos, [0.2, 0.0, 0.8]);
        assert_eq!(s.mode(), Mode::Idle);
    }

    #[test]
    fn test_symmetric_stand_keeps_reference_angles() {
        let mut s = stabilizer();
        let input = standing_input(&s);
        let q_ref = input.q_ref.clone().unwrap();

        let idle_out = s.proc(&input).unwrap().0;
        s.request_transition(Transition::StartAbc).unwrap();
        run(&mut s, &input, 2.5);
        assert_eq!(s.mode(), Mode::Abc);

        s.request_transition(Transition::StartSt).unwrap();
        let out = run(&mut s, &input, 1.0);
        assert_eq!(s.mode(), Mode::St);

        for (q, r) in out.q.iter().zip(q_ref.iter()) {
            assert!((q - r).abs() < 1e-3, "joint moved from {} to {}", r, q);
        }
        for i in 0..3 {
            assert!(
                (out.base_pos[i] - idle_out.base_pos[i]).abs() < 1e-6,
                "base moved from {:?} to {:?}", idle_out.base_pos, out.base_pos
            );
            assert!(
                (out.base_rpy[i] - idle_out.base_rpy[i]).abs() < 1e-6,
                "base turned from {:?} to {:?}", idle_out.base_rpy, out.base_rpy
            );
        }
        assert!(s.gait().footstep_nodes.iter().all(|n| n.is_double_support()));
    }

    #[test]
    fn test_walking_queue_advances() {
        let mut s = stabilizer();
        let input = standing_input(&s);
        s.proc(&input).unwrap();

        // Walking needs balancing
        assert!(s.go_velocity(0.1, 0.0, 0.0).is_err());

        s.request_transition(Transition::StartAbc).unwrap();
        run(&mut s, &input, 2.5);
        s.go_velocity(0.1, 0.0, 0.0).unwrap();
        run(&mut s, &input, 0.1);

        let step_time = s.params().footstep.default_step_time;

        // The stand executing when walking started may still be queued
        let steps: Vec<&FootstepNode> = s.gait().footstep_nodes
            .iter()
            .filter(|n| n.swing_leg().is_some())
            .collect();
        assert!(steps.len() >= 2);

        for pair in steps.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let swing_a = a.swing_leg().unwrap();
            let swing_b = b.swing_leg().unwrap();
            assert_ne!(swing_a, swing_b);
            let advance = b.dst_coords[swing_b].translation.vector.x
                - a.dst_coords[swing_a].translation.vector.x;
            assert!((advance - 0.1 * step_time).abs() < 1e-9);
        }
    }

    #[test]
    fn test_impedance_offset_released_with_balancer() {
        let mut s = stabilizer();
        let mut input = standing_input(&s);
        s.proc(&input).unwrap();

        s.request_transition(Transition::StartAbc).unwrap();
        run(&mut s, &input, 2.5);

        // Push on the right hand
        let rarm = s.end_effectors().iter().position(|e| e.name == "rarm").unwrap();
        s.start_impedance_controller("rarm").unwrap();
        let fs = s.end_effectors()[rarm].force_sensor.unwrap();
        input.act_wrench[fs] = Some([20.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        run(&mut s, &input, 1.0);
        assert!(s.end_effectors()[rarm].ic_offset.value().norm() > 0.0);

        s.request_transition(Transition::StopAbc).unwrap();
        s.proc(&input).unwrap();
        assert_eq!(s.mode(), Mode::SyncToIdle);

        while s.mode() == Mode::SyncToIdle {
            assert!(s.end_effectors()[rarm].ic_offset.value().norm() > 0.0);
            s.proc(&input).unwrap();
        }
        assert_eq!(s.mode(), Mode::Idle);
        assert_eq!(s.end_effectors()[rarm].ic_offset.value(), Vector6::zeros());
    }

    #[test]
    fn test_output_has_no_jump_at_activation() {
        let mut s = stabilizer();
        let mut input = standing_input(&s);
        input.ref_base_pos = Some([1.0, 2.0, 0.76874]);
        let before = s.proc(&input).unwrap().0;

        s.request_transition(Transition::StartAbc).unwrap();
        let first = s.proc(&input).unwrap().0;
        for (a, b) in first.q.iter().zip(before.q.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
        for k in 0..3 {
            assert!((first.base_pos[k] - before.base_pos[k]).abs() < 1e-9);
        }
    }
}
