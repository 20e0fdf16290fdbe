//! Shared value types for the navigation session

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// WGS84 coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Build from a `[lng, lat]` pair as used by GeoJSON and the Directions Service
    pub fn from_lng_lat(pair: [f64; 2]) -> Self {
        Self { lat: pair[1], lng: pair[0] }
    }

    /// Shift by a fixed number of degrees on each axis
    pub fn offset(self, d_lat: f64, d_lng: f64) -> Self {
        Self { lat: self.lat + d_lat, lng: self.lng + d_lng }
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6},{:.6})", self.lat, self.lng)
    }
}

/// Travel mode, selects the Directions Service endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelProfile {
    #[default]
    Driving,
    Walking,
}

impl TravelProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            TravelProfile::Driving => "driving",
            TravelProfile::Walking => "walking",
        }
    }
}

impl fmt::Display for TravelProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TravelProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "driving" => Ok(TravelProfile::Driving),
            "walking" => Ok(TravelProfile::Walking),
            other => Err(format!("unknown travel profile: {other}")),
        }
    }
}

/// Camera bearing in degrees, always within [0, 360)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[repr(transparent)]
pub struct Heading(f64);

impl Heading {
    pub const NORTH: Heading = Heading(0.0);

    /// Wrap an arbitrary angle (possibly negative or above 360) into range
    pub fn from_degrees(degrees: f64) -> Self {
        if !degrees.is_finite() {
            return Self::NORTH;
        }
        let wrapped = degrees.rem_euclid(360.0);
        // rem_euclid can round up to exactly 360.0 for tiny negative inputs
        Self(if wrapped >= 360.0 { 0.0 } else { wrapped })
    }

    pub fn degrees(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Heading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}

pub type RouteGeometry = Vec<GeoPoint>;
pub type InstructionList = Vec<String>;

/// Result of a successful route query
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PlannedRoute {
    pub geometry: RouteGeometry,
    pub instructions: InstructionList,
}

/// The inputs a route depends on; any change invalidates the current route
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteInputs {
    pub profile: TravelProfile,
    pub start: Option<GeoPoint>,
    pub end: Option<GeoPoint>,
    pub waypoint: Option<GeoPoint>,
}

impl RouteInputs {
    /// Both endpoints present, so a route can be requested
    pub fn is_plannable(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }
}

/// Coarse session phase, derived from the state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavPhase {
    Idle,
    Ready,
    Navigating,
}

impl NavPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            NavPhase::Idle => "idle",
            NavPhase::Ready => "ready",
            NavPhase::Navigating => "navigating",
        }
    }
}

/// Aggregate state owned by the navigation session
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub start: Option<GeoPoint>,
    pub end: Option<GeoPoint>,
    pub waypoint: Option<GeoPoint>,
    pub profile: TravelProfile,
    pub navigation_active: bool,
    pub current_position: Option<GeoPoint>,
    pub heading: Heading,
    pub route: Option<RouteGeometry>,
    pub instructions: InstructionList,
}

impl SessionState {
    pub fn phase(&self) -> NavPhase {
        if self.navigation_active {
            NavPhase::Navigating
        } else if self.end.is_some() {
            NavPhase::Ready
        } else {
            NavPhase::Idle
        }
    }

    pub fn route_inputs(&self) -> RouteInputs {
        RouteInputs {
            profile: self.profile,
            start: self.start,
            end: self.end,
            waypoint: self.waypoint,
        }
    }

    /// Drop the displayed route and its instructions
    pub fn clear_route(&mut self) {
        self.route = None;
        self.instructions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_wraps_into_range() {
        assert_eq!(Heading::from_degrees(440.0).degrees(), 80.0);
        assert_eq!(Heading::from_degrees(-90.0).degrees(), 270.0);
        assert_eq!(Heading::from_degrees(360.0).degrees(), 0.0);
        assert_eq!(Heading::from_degrees(f64::NAN), Heading::NORTH);
        assert!(Heading::from_degrees(-1e-20).degrees() < 360.0);
    }

    #[test]
    fn test_phase_follows_state() {
        let mut state = SessionState::default();
        assert_eq!(state.phase(), NavPhase::Idle);

        state.end = Some(GeoPoint::new(35.71, 139.71));
        assert_eq!(state.phase(), NavPhase::Ready);

        state.navigation_active = true;
        assert_eq!(state.phase(), NavPhase::Navigating);
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!("walking".parse::<TravelProfile>(), Ok(TravelProfile::Walking));
        assert_eq!("driving".parse::<TravelProfile>(), Ok(TravelProfile::Driving));
        assert!("cycling".parse::<TravelProfile>().is_err());
        assert_eq!(TravelProfile::default(), TravelProfile::Driving);
    }

    #[test]
    fn test_from_lng_lat_swaps_order() {
        let p = GeoPoint::from_lng_lat([139.70, 35.70]);
        assert_eq!(p.lat, 35.70);
        assert_eq!(p.lng, 139.70);
    }

    #[test]
    fn test_route_inputs_plannable() {
        let mut state = SessionState::default();
        assert!(!state.route_inputs().is_plannable());
        state.start = Some(GeoPoint::new(35.70, 139.70));
        assert!(!state.route_inputs().is_plannable());
        state.end = Some(GeoPoint::new(35.71, 139.71));
        assert!(state.route_inputs().is_plannable());
    }
}
