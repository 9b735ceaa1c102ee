use thiserror::Error;

/// Errors raised while building or driving a simulation.
///
/// Everything here is a configuration or usage error: the control core
/// itself never fails once a vehicle has been constructed.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to parse vehicle parameters: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to read vehicle parameters: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("flight mode must be in 0..=7, got {0}")]
    InvalidFlightMode(i64),

    #[error("angle representation must be either `euler` or `quaternion`, not `{0}`")]
    InvalidAngleRepresentation(String),

    #[error("agent rate {agent_hz} Hz must evenly divide {base_hz} Hz, try {lowest} or {highest}")]
    InvalidAgentRate {
        agent_hz: u32,
        base_hz: u32,
        lowest: u32,
        highest: u32,
    },

    #[error("control rate {ctrl_hz} Hz must evenly divide the physics rate {physics_hz} Hz")]
    InvalidControlRate { ctrl_hz: u32, physics_hz: u32 },

    #[error("expected {positions} start orientations to match {positions} start positions, got {orientations}")]
    StartShapeMismatch {
        positions: usize,
        orientations: usize,
    },

    #[error("expected at least one start position")]
    NoVehicles,

    #[error("expected {expected} drone options (one per vehicle), got {actual}")]
    DroneOptionsCount { expected: usize, actual: usize },

    #[error("unknown agent `{0}`")]
    UnknownAgent(String),

    #[error("action for `{agent}` must have {expected} elements, got {actual}")]
    ActionSize {
        agent: String,
        expected: usize,
        actual: usize,
    },

    #[error("vehicle index {index} out of range for {count} vehicles")]
    VehicleIndex { index: usize, count: usize },

    #[error("environment must be reset before stepping")]
    ResetIncomplete,
}

pub type Result<T, E = Error> = core::result::Result<T, E>;

impl Error {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
