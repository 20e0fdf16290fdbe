//! Navigation session - the state machine at the center of the client
//!
//! The session owns `SessionState` and is the only thing that mutates it.
//! It runs as a single task consuming `SessionEvent`s one at a time:
//! - user intents (select end, profile, drag waypoint, start/finish)
//! - position fixes from the position tracker
//! - heading samples from the orientation tracker
//! - route responses from spawned planner requests
//!
//! Work that suspends (HTTP, geolocation) runs in spawned tasks that post
//! their result back as an event. Results are tagged (route token, polling
//! generation) so anything superseded while in flight is dropped on arrival.

mod handlers;

use crate::domain::error::NavError;
use crate::domain::types::{GeoPoint, NavPhase, PlannedRoute, RouteInputs, SessionState, TravelProfile};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::geolocation::{GeolocationOptions, GeolocationSource};
use crate::io::orientation::{OrientationPermission, OrientationSource};
use crate::io::view::{MapEvent, ViewSender};
use crate::services::orientation_tracker::{self, OrientationSubscription};
use crate::services::position_tracker::PositionTracker;
use crate::services::route_planner::RoutePlanning;
use crate::services::view_adapter::ViewAdapter;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Session event queue depth
const EVENT_CHANNEL_SIZE: usize = 256;

/// What the user asked for
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    SelectEnd(GeoPoint),
    SelectProfile(TravelProfile),
    DragWaypoint(GeoPoint),
    StartNavigation,
    FinishNavigation,
}

/// Everything the session reacts to
#[derive(Debug)]
pub enum SessionEvent {
    Intent(Intent),
    Map(MapEvent),
    /// Best-effort fix requested at mount
    MountFix(Result<GeoPoint, NavError>),
    /// Fix requested when navigation started
    SeedFix { generation: u64, result: Result<GeoPoint, NavError> },
    /// Periodic fix from the polling loop of `generation`
    PositionUpdate { generation: u64, position: GeoPoint },
    /// Raw heading from the orientation tracker (not normalized)
    Heading(f64),
    /// The view lost its layers (style reload); re-send everything
    ViewReset,
    /// Planner response for the request tagged `token`
    RouteResolved { token: u64, result: Result<PlannedRoute, NavError> },
}

/// Cloneable handle for feeding events into a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionEvent>,
}

impl SessionHandle {
    /// Handle over a bare channel, for driving consumers without a session
    pub fn from_sender(tx: mpsc::Sender<SessionEvent>) -> Self {
        Self { tx }
    }

    pub async fn send(&self, event: SessionEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }

    pub async fn intent(&self, intent: Intent) -> bool {
        self.send(SessionEvent::Intent(intent)).await
    }

    pub async fn map_event(&self, event: MapEvent) -> bool {
        self.send(SessionEvent::Map(event)).await
    }
}

/// The navigation session state machine
pub struct NavigationSession {
    /// Identifier used in logs
    pub(crate) id: Uuid,
    pub(crate) state: SessionState,
    pub(crate) config: Config,
    pub(crate) planner: Arc<dyn RoutePlanning>,
    pub(crate) positions: PositionTracker,
    pub(crate) permission: Arc<dyn OrientationPermission>,
    pub(crate) adapter: ViewAdapter,
    pub(crate) view: ViewSender,
    pub(crate) metrics: Arc<Metrics>,
    pub(crate) events_tx: mpsc::Sender<SessionEvent>,
    events_rx: mpsc::Receiver<SessionEvent>,
    /// Token of the newest route request; any other token is stale
    pub(crate) route_token: u64,
    /// Input tuple the newest route request (or invalidation) was made for
    pub(crate) planned_inputs: Option<RouteInputs>,
    /// Bumped on every navigation start/finish; older position results are dropped
    pub(crate) polling_generation: u64,
    orientation: Option<OrientationSubscription>,
}

impl NavigationSession {
    pub fn new(
        config: Config,
        planner: Arc<dyn RoutePlanning>,
        geolocation: Arc<dyn GeolocationSource>,
        permission: Arc<dyn OrientationPermission>,
        view: ViewSender,
        metrics: Arc<Metrics>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        let positions = PositionTracker::new(
            geolocation,
            GeolocationOptions::from_config(&config),
            metrics.clone(),
        );

        Self {
            id: Uuid::now_v7(),
            state: SessionState::default(),
            config,
            planner,
            positions,
            permission,
            adapter: ViewAdapter::new(),
            view,
            metrics,
            events_tx,
            events_rx,
            route_token: 0,
            planned_inputs: None,
            polling_generation: 0,
            orientation: None,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle::from_sender(self.events_tx.clone())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> NavPhase {
        self.state.phase()
    }

    /// Subscribe to device orientation; `None` means the platform has none
    pub fn attach_orientation(&mut self, source: Option<OrientationSource>) {
        let tx = self.events_tx.clone();
        let subscription = orientation_tracker::start(source, move |raw| {
            match tx.try_send(SessionEvent::Heading(raw)) {
                Ok(()) => {}
                // Headings are superseded quickly; dropping one under load is harmless
                Err(TrySendError::Full(_)) => debug!("heading_dropped: session busy"),
                Err(TrySendError::Closed(_)) => {}
            }
        });
        if let Some(mut previous) = self.orientation.replace(subscription) {
            previous.unsubscribe();
        }
    }

    /// Receive and handle one event; false once every sender is gone
    pub async fn process_next(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }

    /// Mount, then process events until shutdown
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(session = %self.id, "session_started");
        self.mount();

        loop {
            tokio::select! {
                event = self.events_rx.recv() => {
                    match event {
                        Some(e) => self.handle_event(e),
                        None => break,
                    }
                }
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.positions.stop_polling();
        if let Some(mut orientation) = self.orientation.take() {
            orientation.unsubscribe();
        }
        info!(session = %self.id, "session_stopped");
    }

    /// Dispatch one event to its handler, then re-render
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Intent(intent) => {
                if let Err(e) = self.apply_intent(intent) {
                    warn!(session = %self.id, intent = ?intent, error = %e, "intent_rejected");
                }
            }
            SessionEvent::Map(map_event) => match ViewAdapter::intent_for(map_event) {
                Some(intent) => {
                    if let Err(e) = self.apply_intent(intent) {
                        warn!(session = %self.id, intent = ?intent, error = %e, "intent_rejected");
                    }
                }
                None => debug!(event = ?map_event, "map_event_ignored"),
            },
            SessionEvent::MountFix(result) => self.handle_mount_fix(result),
            SessionEvent::SeedFix { generation, result } => self.handle_seed_fix(generation, result),
            SessionEvent::PositionUpdate { generation, position } => {
                self.handle_position_update(generation, position)
            }
            SessionEvent::Heading(raw) => self.handle_heading(raw),
            SessionEvent::RouteResolved { token, result } => self.handle_route_resolved(token, result),
            SessionEvent::ViewReset => {
                debug!("view_reset");
                self.adapter.invalidate();
            }
        }

        self.render();
    }

    /// Push layer changes to the view
    fn render(&mut self) {
        for cmd in self.adapter.render(&self.state) {
            self.view.send(cmd);
        }
    }
}
