//! Map View protocol - declarative draw instructions out, user events in
//!
//! Layers are keyed by stable identifiers so the view can upsert them in
//! place. Commands go through a bounded channel; a slow view drops commands
//! instead of stalling the session.

use crate::domain::types::GeoPoint;
use crate::infra::metrics::Metrics;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;

/// Stable layer identifiers understood by the view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerId {
    Route,
    Start,
    End,
    Waypoint,
    Current,
}

impl LayerId {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerId::Route => "route",
            LayerId::Start => "start",
            LayerId::End => "end",
            LayerId::Waypoint => "waypoint",
            LayerId::Current => "current",
        }
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineStyle {
    pub color: &'static str,
    pub width: f64,
    pub opacity: f64,
    pub join: &'static str,
    pub cap: &'static str,
    /// Draw beneath this layer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<LayerId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointStyle {
    pub color: &'static str,
    pub radius: f64,
}

/// A declarative layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Layer {
    Line { coordinates: Vec<GeoPoint>, style: LineStyle },
    Point { at: GeoPoint, style: PointStyle },
    Marker { at: GeoPoint, rotation: f64, draggable: bool, style: PointStyle },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CameraCommand {
    FlyTo { center: GeoPoint, zoom: f64 },
    SetCenter { center: GeoPoint },
    RotateTo { degrees: f64 },
    ResetNorth,
    SetZoom { zoom: f64 },
}

/// Everything the session asks the view to do
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewCommand {
    UpsertLayer { id: LayerId, layer: Layer },
    RemoveLayer { id: LayerId },
    Camera { camera: CameraCommand },
}

/// Raw events emitted by the map
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MapEvent {
    Click { at: GeoPoint },
    MarkerDrag { id: LayerId, at: GeoPoint },
}

/// Non-blocking sender for view commands
#[derive(Clone)]
pub struct ViewSender {
    tx: mpsc::Sender<ViewCommand>,
    metrics: Arc<Metrics>,
    last_drop_warn: Arc<parking_lot::Mutex<Option<Instant>>>,
}

/// Create a view command channel
pub fn create_view_channel(
    buffer_size: usize,
    metrics: Arc<Metrics>,
) -> (ViewSender, mpsc::Receiver<ViewCommand>) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (ViewSender { tx, metrics, last_drop_warn: Arc::new(parking_lot::Mutex::new(None)) }, rx)
}

impl ViewSender {
    /// Enqueue a command, dropping it if the view is not keeping up
    pub fn send(&self, cmd: ViewCommand) {
        match self.tx.try_send(cmd) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.metrics.record_view_command_dropped();
                // Rate-limit warning to 1 per second
                let mut last = self.last_drop_warn.lock();
                if last.map_or(true, |t| t.elapsed() > Duration::from_secs(1)) {
                    warn!("view_command_dropped: channel full");
                    *last = Some(Instant::now());
                }
            }
            Err(TrySendError::Closed(_)) => {
                self.metrics.record_view_command_dropped();
            }
        }
    }

    pub fn camera(&self, camera: CameraCommand) {
        self.send(ViewCommand::Camera { camera });
    }
}
