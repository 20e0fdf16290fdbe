//! Device orientation inputs
//!
//! Two independent streams: compass samples and screen rotation changes.
//! Platforms without an orientation API simply have no `OrientationSource`.

use crate::domain::error::NavError;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;

/// Buffer for each orientation stream; samples are dropped when the tracker lags
const ORIENTATION_CHANNEL_SIZE: usize = 64;

/// One compass reading
///
/// The vendor compass heading (when the platform reports one) takes
/// precedence over the raw `alpha` angle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct CompassSample {
    #[serde(default)]
    pub alpha: Option<f64>,
    #[serde(default)]
    pub compass_heading: Option<f64>,
}

impl CompassSample {
    pub fn from_alpha(alpha: f64) -> Self {
        Self { alpha: Some(alpha), compass_heading: None }
    }

    /// The raw bearing to use; `None` when the sample carries neither value
    pub fn raw_degrees(&self) -> Option<f64> {
        self.compass_heading.or(self.alpha)
    }
}

/// A screen rotation change
///
/// `angle` is one of {0, 90, 180, 270}; `legacy` is the older orientation
/// value used when the angle is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct ScreenRotation {
    #[serde(default)]
    pub angle: Option<f64>,
    #[serde(default)]
    pub legacy: Option<f64>,
}

impl ScreenRotation {
    pub fn from_angle(angle: f64) -> Self {
        Self { angle: Some(angle), legacy: None }
    }

    /// Offset in degrees; a change event with no usable value counts as 0
    pub fn offset_degrees(&self) -> f64 {
        self.angle.or(self.legacy).filter(|v| v.is_finite()).unwrap_or(0.0)
    }
}

/// Receiving side of the two orientation streams
#[derive(Debug)]
pub struct OrientationSource {
    pub compass: mpsc::Receiver<CompassSample>,
    pub rotation: mpsc::Receiver<ScreenRotation>,
}

/// Sending side, held by whatever produces device readings
#[derive(Debug, Clone)]
pub struct OrientationFeed {
    compass: mpsc::Sender<CompassSample>,
    rotation: mpsc::Sender<ScreenRotation>,
}

/// Create a connected feed/source pair
pub fn orientation_channel() -> (OrientationFeed, OrientationSource) {
    let (compass_tx, compass_rx) = mpsc::channel(ORIENTATION_CHANNEL_SIZE);
    let (rotation_tx, rotation_rx) = mpsc::channel(ORIENTATION_CHANNEL_SIZE);
    (
        OrientationFeed { compass: compass_tx, rotation: rotation_tx },
        OrientationSource { compass: compass_rx, rotation: rotation_rx },
    )
}

impl OrientationFeed {
    /// Returns false when the sample was dropped (lagging or detached tracker)
    pub fn push_compass(&self, sample: CompassSample) -> bool {
        self.compass.try_send(sample).is_ok()
    }

    pub fn push_rotation(&self, rotation: ScreenRotation) -> bool {
        self.rotation.try_send(rotation).is_ok()
    }

    /// True once the tracker has detached from both streams
    pub fn is_detached(&self) -> bool {
        self.compass.is_closed() && self.rotation.is_closed()
    }
}

/// Explicit user consent for orientation events (iOS-style)
#[async_trait]
pub trait OrientationPermission: Send + Sync {
    async fn request(&self) -> Result<(), NavError>;
}

/// Permission with a fixed answer; platforms without a consent prompt grant
#[derive(Debug, Clone, Copy)]
pub struct StaticPermission {
    pub granted: bool,
}

impl StaticPermission {
    pub fn granted() -> Self {
        Self { granted: true }
    }

    pub fn denied() -> Self {
        Self { granted: false }
    }
}

#[async_trait]
impl OrientationPermission for StaticPermission {
    async fn request(&self) -> Result<(), NavError> {
        if self.granted {
            Ok(())
        } else {
            Err(NavError::PermissionDenied)
        }
    }
}
