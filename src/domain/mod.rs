//! Domain models - value types, session state and error taxonomy
//!
//! - `types` - GeoPoint, TravelProfile, Heading, SessionState
//! - `error` - NavError, GeolocationError, TransitionError

pub mod error;
pub mod types;

// Re-export commonly used types at module level
pub use error::{GeolocationError, NavError, TransitionError};
pub use types::{
    GeoPoint, Heading, InstructionList, NavPhase, PlannedRoute, RouteGeometry, RouteInputs,
    SessionState, TravelProfile,
};
