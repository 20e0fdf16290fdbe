//! Event handlers for the navigation session
//!
//! Handlers run on the session task and never await. Anything that suspends
//! is spawned and reports back through the session's own event channel.

use super::{Intent, NavigationSession, SessionEvent};
use crate::domain::error::{NavError, TransitionError};
use crate::domain::types::{GeoPoint, Heading, PlannedRoute, TravelProfile};
use crate::io::view::CameraCommand;
use crate::services::route_planner::RouteRequest;
use std::time::Instant;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

impl NavigationSession {
    /// Best-effort initial fix; the session is usable whether or not it lands
    pub fn mount(&mut self) {
        self.view.camera(CameraCommand::FlyTo {
            center: self.config.initial_center(),
            zoom: self.config.initial_zoom(),
        });

        let fetch = self.positions.fetch_detached();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = fetch.await;
            let _ = tx.send(SessionEvent::MountFix(result)).await;
        });
    }

    pub(crate) fn apply_intent(&mut self, intent: Intent) -> Result<(), TransitionError> {
        match intent {
            Intent::SelectEnd(point) => self.select_end(point),
            Intent::SelectProfile(profile) => {
                self.select_profile(profile);
                Ok(())
            }
            Intent::DragWaypoint(point) => {
                self.drag_waypoint(point);
                Ok(())
            }
            Intent::StartNavigation => self.start_navigation(),
            Intent::FinishNavigation => self.finish_navigation(),
        }
    }

    /// Choose the destination; locked while navigating
    pub(crate) fn select_end(&mut self, point: GeoPoint) -> Result<(), TransitionError> {
        if self.state.navigation_active {
            return Err(TransitionError::DestinationLocked);
        }
        debug!(end = %point, "end_selected");
        self.state.end = Some(point);
        self.replan_if_changed();
        Ok(())
    }

    pub(crate) fn select_profile(&mut self, profile: TravelProfile) {
        debug!(profile = %profile, "profile_selected");
        self.state.profile = profile;
        self.replan_if_changed();
    }

    pub(crate) fn drag_waypoint(&mut self, point: GeoPoint) {
        debug!(waypoint = %point, "waypoint_dragged");
        self.state.waypoint = Some(point);
        self.replan_if_changed();
    }

    /// Enter navigation mode
    ///
    /// Does not wait for the seed fix: navigation is active as soon as this
    /// returns, and `start`/`current_position` are filled in when the fix lands.
    pub(crate) fn start_navigation(&mut self) -> Result<(), TransitionError> {
        if self.state.end.is_none() {
            return Err(TransitionError::NoDestination);
        }
        if self.state.navigation_active {
            return Err(TransitionError::AlreadyNavigating);
        }

        let permission = self.permission.clone();
        tokio::spawn(async move {
            if let Err(e) = permission.request().await {
                warn!(error = %e, "orientation_permission_denied");
            }
        });

        self.polling_generation += 1;
        let generation = self.polling_generation;
        self.state.navigation_active = true;
        info!(session = %self.id, generation = %generation, "navigation_started");

        let seed = self.positions.fetch_detached();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = seed.await;
            let _ = tx.send(SessionEvent::SeedFix { generation, result }).await;
        });

        let tx = self.events_tx.clone();
        self.positions.start_polling(self.config.poll_interval(), move |position| {
            match tx.try_send(SessionEvent::PositionUpdate { generation, position }) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => debug!("position_update_dropped: session busy"),
                Err(TrySendError::Closed(_)) => {}
            }
        });

        // No-op on a first start; after a finish the cleared route is requested again
        self.replan_if_changed();

        Ok(())
    }

    /// Leave navigation mode and reset the camera
    pub(crate) fn finish_navigation(&mut self) -> Result<(), TransitionError> {
        if !self.state.navigation_active {
            return Err(TransitionError::NotNavigating);
        }

        self.positions.stop_polling();
        // Abort is asynchronous; updates already queued carry the old generation
        self.polling_generation += 1;
        // Suppress any route response still in flight
        self.route_token += 1;
        // The route is dropped below, so the same tuple must plan again
        self.planned_inputs = None;

        self.state.navigation_active = false;
        self.state.heading = Heading::NORTH;
        self.state.clear_route();

        let center = self
            .state
            .current_position
            .or(self.state.start)
            .unwrap_or_else(|| self.config.initial_center());
        self.view.camera(CameraCommand::FlyTo { center, zoom: self.config.initial_zoom() });
        self.view.camera(CameraCommand::ResetNorth);

        info!(session = %self.id, "navigation_finished");
        Ok(())
    }

    /// Issue exactly one route request per distinct input tuple
    ///
    /// Every new tuple bumps the token and clears the displayed route, even
    /// when the tuple is not plannable, so an older response can never land.
    pub(crate) fn replan_if_changed(&mut self) {
        let inputs = self.state.route_inputs();
        if self.planned_inputs == Some(inputs) {
            return;
        }
        self.planned_inputs = Some(inputs);
        self.route_token += 1;
        self.state.clear_route();

        let Some(request) = RouteRequest::from_inputs(&inputs) else {
            return;
        };
        let token = self.route_token;
        self.metrics.record_route_request();

        if !self.state.navigation_active {
            self.view.camera(CameraCommand::FlyTo {
                center: request.start,
                zoom: self.config.navigation_zoom(),
            });
        }

        debug!(
            token = %token,
            profile = %request.profile,
            start = %request.start,
            end = %request.end,
            waypoint = request.waypoint.is_some(),
            "route_requested"
        );

        let planner = self.planner.clone();
        let metrics = self.metrics.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let result = planner.plan_route(&request).await;
            metrics.record_route_latency(started.elapsed().as_millis() as u64);
            let _ = tx.send(SessionEvent::RouteResolved { token, result }).await;
        });
    }

    pub(crate) fn handle_route_resolved(&mut self, token: u64, result: Result<PlannedRoute, NavError>) {
        if token != self.route_token {
            self.metrics.record_route_stale_dropped();
            debug!(token = %token, current = %self.route_token, "route_stale_dropped");
            return;
        }

        match result {
            Ok(route) => {
                self.metrics.record_route_applied();
                info!(
                    token = %token,
                    points = %route.geometry.len(),
                    steps = %route.instructions.len(),
                    "route_planned"
                );
                self.state.route = Some(route.geometry);
                self.state.instructions = route.instructions;
            }
            Err(e) => {
                self.metrics.record_route_failure();
                warn!(token = %token, error = %e, "route_failed");
                self.state.clear_route();
            }
        }
    }

    pub(crate) fn handle_mount_fix(&mut self, result: Result<GeoPoint, NavError>) {
        let fix = match result {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "initial_position_unavailable");
                return;
            }
        };

        info!(lat = %fix.lat, lng = %fix.lng, "initial_position");
        if self.state.start.is_none() {
            self.state.start = Some(fix);
        }
        if self.state.current_position.is_none() {
            self.state.current_position = Some(fix);
        }
        if self.state.waypoint.is_none() {
            self.state.waypoint = Some(self.config.waypoint_for(fix));
        }

        self.view.camera(CameraCommand::FlyTo { center: fix, zoom: self.config.initial_zoom() });
        self.replan_if_changed();
    }

    pub(crate) fn handle_seed_fix(&mut self, generation: u64, result: Result<GeoPoint, NavError>) {
        if !self.state.navigation_active || generation != self.polling_generation {
            debug!(generation = %generation, "seed_fix_stale");
            return;
        }

        match result {
            Ok(fix) => {
                info!(lat = %fix.lat, lng = %fix.lng, "navigation_seeded");
                self.state.start = Some(fix);
                self.state.current_position = Some(fix);
                self.view.camera(CameraCommand::FlyTo {
                    center: fix,
                    zoom: self.config.navigation_zoom(),
                });
                self.replan_if_changed();
            }
            Err(e) => {
                // Navigation stays active; polling may still produce a fix
                warn!(error = %e, "navigation_seed_failed");
            }
        }
    }

    pub(crate) fn handle_position_update(&mut self, generation: u64, position: GeoPoint) {
        if !self.state.navigation_active || generation != self.polling_generation {
            debug!(generation = %generation, "position_update_stale");
            return;
        }
        self.state.current_position = Some(position);
        self.view.camera(CameraCommand::SetCenter { center: position });
    }

    pub(crate) fn handle_heading(&mut self, raw: f64) {
        self.metrics.record_heading_sample();
        let heading = Heading::from_degrees(raw);
        self.state.heading = heading;
        if self.state.navigation_active {
            self.view.camera(CameraCommand::RotateTo { degrees: heading.degrees() });
        }
    }
}
