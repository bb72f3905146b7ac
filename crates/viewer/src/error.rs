use thiserror::Error;

use crate::controller::ControllerState;

pub type Result<T> = std::result::Result<T, ViewerError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewerError {
    #[error("compute engine is not ready")]
    NotReady,

    #[error("compute engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("engine error: {0}")]
    Engine(String),

    #[error("malformed payload: {0}")]
    Parse(String),

    #[error("transport error: {0}")]
    Transport(String),

    /// Never returned by the projector; see [`crate::projector::Projection::capacity_exceeded`].
    #[error("population {population} exceeds instance capacity {capacity}")]
    CapacityExceeded { population: usize, capacity: usize },

    #[error("cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: ControllerState,
    },

    #[error("{0} is unavailable on a push-only stream")]
    PushOnly(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for ViewerError {
    fn from(e: serde_json::Error) -> Self {
        ViewerError::Parse(e.to_string())
    }
}
