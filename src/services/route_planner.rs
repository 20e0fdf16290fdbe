//! Route planning against the Directions Service
//!
//! The planner is stateless with respect to the session: it neither caches
//! nor cancels. Superseded responses are discarded by the session.

use crate::domain::error::NavError;
use crate::domain::types::{GeoPoint, PlannedRoute, RouteInputs, TravelProfile};
use crate::infra::config::Config;
use crate::io::directions::{request_url, DirectionsResponse};
use async_trait::async_trait;
use smallvec::SmallVec;
use std::time::Instant;
use tracing::{debug, warn};

/// A route query: start, optional waypoint, end
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteRequest {
    pub profile: TravelProfile,
    pub start: GeoPoint,
    pub end: GeoPoint,
    pub waypoint: Option<GeoPoint>,
}

impl RouteRequest {
    /// Build from session inputs; `None` unless both endpoints are set
    pub fn from_inputs(inputs: &RouteInputs) -> Option<Self> {
        Some(Self {
            profile: inputs.profile,
            start: inputs.start?,
            end: inputs.end?,
            waypoint: inputs.waypoint,
        })
    }

    /// Ordered points; the waypoint is omitted entirely when absent
    pub fn waypoints(&self) -> SmallVec<[GeoPoint; 3]> {
        let mut points = SmallVec::new();
        points.push(self.start);
        if let Some(w) = self.waypoint {
            points.push(w);
        }
        points.push(self.end);
        points
    }
}

/// Anything that can turn a route request into a planned route
#[async_trait]
pub trait RoutePlanning: Send + Sync {
    async fn plan_route(&self, request: &RouteRequest) -> Result<PlannedRoute, NavError>;
}

/// HTTP client for the Directions Service
pub struct HttpRoutePlanner {
    client: reqwest::Client,
    api_base: String,
    access_token: String,
    language: Option<String>,
}

impl HttpRoutePlanner {
    pub fn new(config: &Config) -> Result<Self, NavError> {
        // Create HTTP client once for reuse (connection pooling)
        let client = reqwest::Client::builder()
            .timeout(config.directions_timeout())
            .build()
            .map_err(|e| NavError::ServiceError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: config.directions_api_base().to_string(),
            access_token: config.access_token().to_string(),
            language: config.language().map(str::to_string),
        })
    }

    pub fn url_for(&self, request: &RouteRequest) -> Result<reqwest::Url, NavError> {
        request_url(
            &self.api_base,
            request.profile,
            &request.waypoints(),
            &self.access_token,
            self.language.as_deref(),
        )
    }
}

#[async_trait]
impl RoutePlanning for HttpRoutePlanner {
    async fn plan_route(&self, request: &RouteRequest) -> Result<PlannedRoute, NavError> {
        let url = self.url_for(request)?;
        let start = Instant::now();

        let response = self.client.get(url).header("Accept", "application/json").send().await?;
        let status = response.status();
        let body = response.text().await?;
        let latency_ms = start.elapsed().as_millis() as u64;

        if !status.is_success() {
            warn!(
                status = %status.as_u16(),
                latency_ms = %latency_ms,
                profile = %request.profile,
                "directions_http_error"
            );
            return Err(NavError::ServiceError(format!("HTTP {}", status.as_u16())));
        }

        let parsed: DirectionsResponse = serde_json::from_str(&body)?;
        let route = parsed.into_planned_route()?;

        debug!(
            points = %route.geometry.len(),
            instructions = %route.instructions.len(),
            latency_ms = %latency_ms,
            "directions_response"
        );
        Ok(route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(waypoint: Option<GeoPoint>) -> RouteRequest {
        RouteRequest {
            profile: TravelProfile::Driving,
            start: GeoPoint::new(35.70, 139.70),
            end: GeoPoint::new(35.71, 139.71),
            waypoint,
        }
    }

    #[test]
    fn test_two_point_waypoints() {
        let points = request(None).waypoints();
        assert_eq!(points.as_slice(), &[GeoPoint::new(35.70, 139.70), GeoPoint::new(35.71, 139.71)]);
        assert!(!points.spilled());
    }

    #[test]
    fn test_waypoint_inserted_between() {
        let w = GeoPoint::new(35.705, 139.69);
        let points = request(Some(w)).waypoints();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0], GeoPoint::new(35.70, 139.70));
        assert_eq!(points[1], w);
        assert_eq!(points[2], GeoPoint::new(35.71, 139.71));
    }

    #[test]
    fn test_url_path_order() {
        let planner = HttpRoutePlanner::new(&Config::default()).unwrap();
        let url = planner.url_for(&request(None)).unwrap();
        assert!(url.as_str().contains("/driving/139.7,35.7;139.71,35.71?"), "{url}");

        let url = planner.url_for(&request(Some(GeoPoint::new(35.705, 139.69)))).unwrap();
        assert!(url.as_str().contains("/driving/139.7,35.7;139.69,35.705;139.71,35.71?"), "{url}");
    }

    #[test]
    fn test_from_inputs_requires_both_endpoints() {
        let mut inputs = RouteInputs {
            profile: TravelProfile::Walking,
            start: Some(GeoPoint::new(1.0, 1.0)),
            end: None,
            waypoint: None,
        };
        assert!(RouteRequest::from_inputs(&inputs).is_none());

        inputs.end = Some(GeoPoint::new(2.0, 2.0));
        let request = RouteRequest::from_inputs(&inputs).unwrap();
        assert_eq!(request.profile, TravelProfile::Walking);
        assert_eq!(request.waypoints().len(), 2);
    }
}
