//! JSON-lines bridge between the session and an external map view
//!
//! Input (one object per line, tagged by `type`):
//!   {"type":"click","lat":35.71,"lng":139.71}
//!   {"type":"drag","id":"waypoint","lat":35.705,"lng":139.70}
//!   {"type":"profile","profile":"walking"}
//!   {"type":"start"} / {"type":"finish"}
//!   {"type":"fix","lat":35.70,"lng":139.70}
//!   {"type":"fix_error","error":"timeout"}
//!   {"type":"compass","alpha":350.0} / {"type":"rotation","angle":90}
//!   {"type":"resync"}  (view reloaded; every layer is sent again)
//!
//! Output: every `ViewCommand` serialized on its own line.

use crate::domain::error::GeolocationError;
use crate::domain::types::{GeoPoint, TravelProfile};
use crate::io::geolocation::{FixFeed, FixReading};
use crate::io::orientation::{CompassSample, OrientationFeed, ScreenRotation};
use crate::io::view::{LayerId, MapEvent, ViewCommand};
use crate::services::session::{Intent, SessionEvent, SessionHandle};
use serde::Deserialize;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixErrorKind {
    PermissionDenied,
    Timeout,
    Unavailable,
}

/// One input line
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeInput {
    Click { lat: f64, lng: f64 },
    Drag { id: LayerId, lat: f64, lng: f64 },
    Profile { profile: TravelProfile },
    Start,
    Finish,
    Fix { lat: f64, lng: f64 },
    FixError {
        error: FixErrorKind,
        #[serde(default)]
        message: Option<String>,
    },
    Compass(CompassSample),
    Rotation(ScreenRotation),
    Resync,
}

impl BridgeInput {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

/// Routes bridge input to the session and the device feeds
pub struct Bridge {
    session: SessionHandle,
    fixes: Arc<FixFeed>,
    orientation: Option<OrientationFeed>,
}

impl Bridge {
    pub fn new(
        session: SessionHandle,
        fixes: Arc<FixFeed>,
        orientation: Option<OrientationFeed>,
    ) -> Self {
        Self { session, fixes, orientation }
    }

    /// Deliver one input; false once the session is gone
    pub async fn dispatch(&self, input: BridgeInput) -> bool {
        match input {
            BridgeInput::Click { lat, lng } => {
                self.session.map_event(MapEvent::Click { at: GeoPoint::new(lat, lng) }).await
            }
            BridgeInput::Drag { id, lat, lng } => {
                self.session
                    .map_event(MapEvent::MarkerDrag { id, at: GeoPoint::new(lat, lng) })
                    .await
            }
            BridgeInput::Profile { profile } => {
                self.session.intent(Intent::SelectProfile(profile)).await
            }
            BridgeInput::Start => self.session.intent(Intent::StartNavigation).await,
            BridgeInput::Resync => self.session.send(SessionEvent::ViewReset).await,
            BridgeInput::Finish => self.session.intent(Intent::FinishNavigation).await,
            BridgeInput::Fix { lat, lng } => {
                self.fixes.push(FixReading::Fix(GeoPoint::new(lat, lng)));
                true
            }
            BridgeInput::FixError { error, message } => {
                let error = match error {
                    FixErrorKind::PermissionDenied => GeolocationError::PermissionDenied,
                    FixErrorKind::Timeout => GeolocationError::Timeout(0),
                    FixErrorKind::Unavailable => {
                        GeolocationError::Unavailable(message.unwrap_or_default())
                    }
                };
                self.fixes.push(FixReading::Error(error));
                true
            }
            BridgeInput::Compass(sample) => {
                if let Some(feed) = &self.orientation {
                    if !feed.push_compass(sample) {
                        debug!("compass_sample_dropped");
                    }
                }
                true
            }
            BridgeInput::Rotation(rotation) => {
                if let Some(feed) = &self.orientation {
                    if !feed.push_rotation(rotation) {
                        debug!("rotation_dropped");
                    }
                }
                true
            }
        }
    }

    /// Read input lines until EOF or shutdown
    pub async fn run_input<R>(
        &self,
        reader: R,
        mut shutdown: watch::Receiver<bool>,
    ) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        info!("bridge_input_closed");
                        return Ok(());
                    };
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match BridgeInput::parse(line) {
                        Ok(input) => {
                            if !self.dispatch(input).await {
                                warn!("bridge_session_gone");
                                return Ok(());
                            }
                        }
                        Err(e) => warn!(line = %line, error = %e, "bridge_input_invalid"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Write view commands as JSON lines until the channel closes
pub async fn run_output<W>(mut rx: mpsc::Receiver<ViewCommand>, mut writer: W) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(cmd) = rx.recv().await {
        let mut line = serde_json::to_vec(&cmd)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    Ok(())
}
