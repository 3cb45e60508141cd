//! Kinematic and inertial model of the robot
//!
//! The model is a tree of links rooted at a floating base. Each non-root link
//! is attached to its parent by a revolute or fixed joint. The static
//! structure is shared between copies, so snapshots of the robot state (the
//! reference, actual and generated robots) are cheap to clone and never alias.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod description;
mod model;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use description::*;
pub use model::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of degrees of freedom of the floating base.
///
/// Base columns of the Jacobians come first, linear then angular.
pub const NUM_BASE_DOF: usize = 6;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised when building a robot model.
#[derive(Debug, thiserror::Error)]
pub enum RobotModelError {
    #[error("Cannot load the model description: {0}")]
    LoadError(#[from] util::params::LoadError),

    #[error("The model has no links")]
    NoLinks,

    #[error("The first link ({0}) must be the root and have no parent")]
    RootHasParent(String),

    #[error("Link {0} has no parent but is not the first link")]
    MultipleRoots(String),

    #[error("Two links are named {0}")]
    DuplicateName(String),

    #[error("Link {link} names an unknown parent {parent}")]
    UnknownParent { link: String, parent: String },

    #[error("Link {link} is listed before its parent {parent}")]
    ParentAfterChild { link: String, parent: String },

    #[error("Joint {0} has a zero length axis")]
    DegenerateAxis(String),

    #[error("Joint {0} has an empty position or velocity range")]
    InvalidRange(String),

    #[error("Sensor {sensor} is attached to an unknown link {link}")]
    UnknownSensorLink { sensor: String, link: String },
}
