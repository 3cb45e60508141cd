//! Impedance controller
//!
//! Lets selected end effectors comply with the difference between the
//! measured and reference wrench, as a spring-damper per axis:
//!
//! ```text
//! D * d(offset)/dt + K * offset = act_wrench - ref_wrench
//! ```

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::info;
use nalgebra::Vector6;
use serde::Deserialize;

// Internal
use crate::interp::Interpolator;
use crate::limbs::EndEffector;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImpedanceParams {
    /// Spring stiffness per axis, translation then rotation.
    ///
    /// Units: newtons/meter, newton meters/radian
    pub stiffness: [f64; 6],

    /// Damping per axis, translation then rotation.
    ///
    /// Units: newton seconds/meter, newton meter seconds/radian
    pub damping: [f64; 6],

    /// Largest absolute offset per axis.
    ///
    /// Units: meters, radians
    pub offset_limit: [f64; 6],

    /// Time taken to bring the offset back to zero when stopped.
    ///
    /// Units: seconds
    pub stop_ramp_time: f64,
}

#[derive(Debug, Clone)]
pub struct ImpedanceController {
    params: ImpedanceParams,

    /// Whether each end effector is compliant.
    is_active: Vec<bool>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ImpedanceError {
    #[error("No end effector named \"{0}\"")]
    UnknownEndEffector(String),

    #[error("Impedance control is already running on \"{0}\"")]
    AlreadyActive(String),

    #[error("Impedance control is not running on \"{0}\"")]
    NotActive(String),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for ImpedanceParams {
    fn default() -> Self {
        Self {
            stiffness: [2000.0, 2000.0, 2000.0, 100.0, 100.0, 100.0],
            damping: [1000.0, 1000.0, 1000.0, 50.0, 50.0, 50.0],
            offset_limit: [0.05, 0.05, 0.05, 0.17, 0.17, 0.17],
            stop_ramp_time: 2.0,
        }
    }
}

impl ImpedanceController {
    pub fn new(params: ImpedanceParams, num_ees: usize) -> Self {
        Self {
            params,
            is_active: vec![false; num_ees],
        }
    }

    /// Make every end effector stiff again.
    pub fn reset(&mut self) {
        self.is_active.iter_mut().for_each(|a| *a = false);
    }

    pub fn is_active(&self, ee: usize) -> bool {
        self.is_active.get(ee).copied().unwrap_or(false)
    }

    pub fn start(&mut self, name: &str, ees: &[EndEffector]) -> Result<(), ImpedanceError> {
        let i = find(name, ees)?;
        if self.is_active[i] {
            return Err(ImpedanceError::AlreadyActive(name.to_string()))
        }
        self.is_active[i] = true;
        info!("Impedance control started on {}", name);
        Ok(())
    }

    /// Stop compliance on an end effector, ramping its offset to zero.
    pub fn stop(&mut self, name: &str, ees: &mut [EndEffector]) -> Result<(), ImpedanceError> {
        let i = find(name, ees)?;
        if !self.is_active[i] {
            return Err(ImpedanceError::NotActive(name.to_string()))
        }
        self.is_active[i] = false;
        ees[i].ic_offset.set_goal(Vector6::zeros(), self.params.stop_ramp_time);
        info!("Impedance control stopped on {}", name);
        Ok(())
    }

    /// Retarget the offsets of the compliant end effectors for this tick.
    ///
    /// Returns one offset per end effector, not yet interpolated. Offsets of
    /// stiff end effectors are returned unchanged.
    pub fn calc_impedance_control(
        &self,
        ees: &[EndEffector],
        dt: f64
    ) -> Vec<Interpolator<Vector6<f64>>> {
        ees.iter()
            .enumerate()
            .map(|(i, ee)| {
                let mut offset = ee.ic_offset.clone();
                if !self.is_active(i) {
                    return offset
                }

                let current = offset.value();
                let dw = ee.act_wrench - ee.ref_wrench;
                let mut next = Vector6::zeros();
                for a in 0..6 {
                    let rate = (dw[a] - self.params.stiffness[a] * current[a])
                        / self.params.damping[a];
                    let limit = self.params.offset_limit[a].abs();
                    next[a] = (current[a] + dt * rate).clamp(-limit, limit);
                }
                offset.set_goal(next, dt);
                offset
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn find(name: &str, ees: &[EndEffector]) -> Result<usize, ImpedanceError> {
    ees.iter()
        .position(|e| e.name == name)
        .ok_or_else(|| ImpedanceError::UnknownEndEffector(name.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::Isometry3;

    const DT: f64 = 0.002;

    fn ees() -> Vec<EndEffector> {
        vec![
            EndEffector::new("rleg", 0, Isometry3::identity(), None),
            EndEffector::new("lleg", 0, Isometry3::identity(), None),
            EndEffector::new("rarm", 0, Isometry3::identity(), None),
        ]
    }

    fn step(ic: &ImpedanceController, ees: &mut [EndEffector]) {
        let offsets = ic.calc_impedance_control(ees, DT);
        for (ee, mut o) in ees.iter_mut().zip(offsets) {
            o.interpolate(DT);
            ee.ic_offset = o;
        }
    }

    #[test]
    fn test_start_stop_requests() {
        let mut ees = ees();
        let mut ic = ImpedanceController::new(ImpedanceParams::default(), ees.len());

        assert!(matches!(ic.start("tail", &ees), Err(ImpedanceError::UnknownEndEffector(_))));
        assert!(matches!(ic.stop("rarm", &mut ees), Err(ImpedanceError::NotActive(_))));
        ic.start("rarm", &ees).unwrap();
        assert!(matches!(ic.start("rarm", &ees), Err(ImpedanceError::AlreadyActive(_))));
        assert!(ic.is_active(2));
        ic.stop("rarm", &mut ees).unwrap();
        assert!(!ic.is_active(2));
    }

    #[test]
    fn test_complies_towards_spring_equilibrium() {
        let mut ees = ees();
        let params = ImpedanceParams::default();
        let mut ic = ImpedanceController::new(params.clone(), ees.len());
        ic.start("rarm", &ees).unwrap();

        ees[2].act_wrench = Vector6::new(20.0, 0.0, 0.0, 0.0, 0.0, 0.0);

        step(&ic, &mut ees);
        let first = ees[2].ic_offset.value();
        let expected = DT * 20.0 / params.damping[0];
        assert!((first.x - expected).abs() < 1e-12);
        // Stiff end effectors do not move
        assert_eq!(ees[0].ic_offset.value(), Vector6::zeros());

        let ticks = (10.0 / DT).round() as usize;
        for _ in 0..ticks {
            step(&ic, &mut ees);
        }
        assert!((ees[2].ic_offset.value().x - 20.0 / params.stiffness[0]).abs() < 1e-6);
    }

    #[test]
    fn test_offset_limit_and_stop_ramp() {
        let mut ees = ees();
        let params = ImpedanceParams {
            stiffness: [0.0; 6],
            ..ImpedanceParams::default()
        };
        let mut ic = ImpedanceController::new(params, ees.len());
        ic.start("rarm", &ees).unwrap();
        ees[2].act_wrench = Vector6::new(0.0, 0.0, -500.0, 0.0, 0.0, 0.0);

        let ticks = (2.0 / DT).round() as usize;
        for _ in 0..ticks {
            step(&ic, &mut ees);
        }
        assert!((ees[2].ic_offset.value().z + 0.05).abs() < 1e-12);

        ic.stop("rarm", &mut ees).unwrap();
        let ticks = (1.0 / DT).round() as usize;
        for _ in 0..ticks {
            step(&ic, &mut ees);
        }
        assert!(ees[2].ic_offset.value().z < -1e-3);
        for _ in 0..ticks {
            step(&ic, &mut ees);
        }
        assert!(ees[2].ic_offset.value().norm() < 1e-12);
    }
}
