//! Error taxonomy for the navigation core
//!
//! None of these are fatal to a session: the worst visible outcome is
//! "no route drawn" or "position/heading stops updating".

use thiserror::Error;

/// Why a one-shot geolocation request produced no fix
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeolocationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("location request timed out after {0} ms")]
    Timeout(u64),

    #[error("location hardware failure: {0}")]
    Unavailable(String),
}

/// Failures of the device and Directions Service collaborators
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NavError {
    #[error("position unavailable: {0}")]
    PositionUnavailable(#[from] GeolocationError),

    #[error("no route found")]
    RouteNotFound,

    #[error("directions service error: {0}")]
    ServiceError(String),

    #[error("orientation permission denied")]
    PermissionDenied,
}

impl From<reqwest::Error> for NavError {
    fn from(e: reqwest::Error) -> Self {
        NavError::ServiceError(e.to_string())
    }
}

impl From<serde_json::Error> for NavError {
    fn from(e: serde_json::Error) -> Self {
        NavError::ServiceError(format!("malformed response: {e}"))
    }
}

/// A state-machine transition requested in a phase that does not allow it
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    #[error("navigation requires a destination")]
    NoDestination,

    #[error("navigation already active")]
    AlreadyNavigating,

    #[error("navigation not active")]
    NotNavigating,

    #[error("destination is locked while navigating")]
    DestinationLocked,
}

pub type Result<T> = std::result::Result<T, NavError>;
