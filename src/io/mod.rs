//! IO modules - external system interfaces
//!
//! This module contains everything that talks to the outside world:
//! - `directions` - Directions Service URL and response format
//! - `geolocation` - Device location source behind an async trait
//! - `orientation` - Compass and screen rotation streams, permission prompt
//! - `view` - Map view layers, camera commands and the view channel
//! - `bridge` - JSON-lines bridge between the session and an external view
//! - `mock_directions` - In-process Directions Service for local runs and tests

pub mod bridge;
pub mod directions;
pub mod geolocation;
pub mod mock_directions;
pub mod orientation;
pub mod view;

// Re-export commonly used types
pub use bridge::{run_output, Bridge, BridgeInput};
pub use geolocation::{FixFeed, FixReading, GeolocationOptions, GeolocationSource};
pub use orientation::{
    orientation_channel, OrientationFeed, OrientationPermission, OrientationSource,
    StaticPermission,
};
pub use view::{create_view_channel, CameraCommand, LayerId, MapEvent, ViewCommand, ViewSender};
