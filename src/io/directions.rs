//! Directions Service wire format
//!
//! Request: GET `{base}/{profile}/{lng},{lat};...;{lng},{lat}?steps=true&geometries=geojson&access_token=..`
//! Response: `{routes: [{geometry: {coordinates: [[lng,lat],..]}, legs: [{steps: [{maneuver: {instruction}}]}]}]}`
//!
//! Only `routes[0]` is consumed.

use crate::domain::error::NavError;
use crate::domain::types::{GeoPoint, PlannedRoute, TravelProfile};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

#[derive(Debug, Deserialize, Serialize)]
pub struct DirectionsResponse {
    #[serde(default)]
    pub routes: Vec<DirectionsRoute>,
    /// Service status code ("Ok", "NoRoute", ..), absent on some error bodies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DirectionsRoute {
    pub geometry: RouteLineString,
    #[serde(default)]
    pub legs: Vec<RouteLeg>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RouteLineString {
    pub coordinates: Vec<[f64; 2]>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RouteLeg {
    #[serde(default)]
    pub steps: Vec<RouteStep>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RouteStep {
    pub maneuver: Maneuver,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Maneuver {
    #[serde(default)]
    pub instruction: String,
}

/// Format a coordinate path segment: `lng,lat;lng,lat[;...]`
pub fn coordinate_path(points: &[GeoPoint]) -> String {
    let mut path = String::with_capacity(points.len() * 24);
    for (i, p) in points.iter().enumerate() {
        if i > 0 {
            path.push(';');
        }
        let _ = write!(path, "{},{}", p.lng, p.lat);
    }
    path
}

/// Build the full request URL for an ordered waypoint list
///
/// Query values are form-encoded; the coordinate path is left as is.
pub fn request_url(
    base: &str,
    profile: TravelProfile,
    points: &[GeoPoint],
    access_token: &str,
    language: Option<&str>,
) -> Result<Url, NavError> {
    let raw = format!(
        "{}/{}/{}",
        base.trim_end_matches('/'),
        profile.as_str(),
        coordinate_path(points)
    );
    let mut url = Url::parse(&raw)
        .map_err(|e| NavError::ServiceError(format!("invalid directions URL {raw}: {e}")))?;

    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("steps", "true")
            .append_pair("geometries", "geojson")
            .append_pair("access_token", access_token);
        if let Some(lang) = language {
            query.append_pair("language", lang);
        }
    }
    Ok(url)
}

/// Parse a `lng,lat;lng,lat` path segment back into points
pub fn parse_coordinate_path(path: &str) -> Option<Vec<GeoPoint>> {
    path.split(';')
        .map(|pair| {
            let (lng, lat) = pair.split_once(',')?;
            Some(GeoPoint::new(lat.trim().parse().ok()?, lng.trim().parse().ok()?))
        })
        .collect()
}

impl DirectionsResponse {
    /// Take the best candidate route, flattening legs→steps into one instruction list
    pub fn into_planned_route(self) -> Result<PlannedRoute, NavError> {
        let route = self.routes.into_iter().next().ok_or(NavError::RouteNotFound)?;

        let geometry = route.geometry.coordinates.into_iter().map(GeoPoint::from_lng_lat).collect();
        let instructions = route
            .legs
            .into_iter()
            .flat_map(|leg| leg.steps)
            .map(|step| step.maneuver.instruction)
            .collect();

        Ok(PlannedRoute { geometry, instructions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://api.mapbox.com/directions/v5/mapbox";

    #[test]
    fn test_two_point_url() {
        let url = request_url(
            BASE,
            TravelProfile::Driving,
            &[GeoPoint::new(35.70, 139.70), GeoPoint::new(35.71, 139.71)],
            "tok",
            None,
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.mapbox.com/directions/v5/mapbox/driving/139.7,35.7;139.71,35.71\
             ?steps=true&geometries=geojson&access_token=tok"
        );
    }

    #[test]
    fn test_three_point_url_with_language() {
        let url = request_url(
            BASE,
            TravelProfile::Walking,
            &[GeoPoint::new(1.0, 2.0), GeoPoint::new(3.0, 4.0), GeoPoint::new(5.0, 6.0)],
            "tok",
            Some("ja"),
        )
        .unwrap();
        assert!(url.as_str().contains("/walking/2,1;4,3;6,5?"), "{url}");
        assert!(url.as_str().ends_with("&language=ja"), "{url}");
    }

    #[test]
    fn test_query_values_are_encoded() {
        let url = request_url(
            BASE,
            TravelProfile::Driving,
            &[GeoPoint::new(35.70, 139.70), GeoPoint::new(35.71, 139.71)],
            "pk.a&b=c d",
            Some("zh-Hant#x"),
        )
        .unwrap();
        assert!(url.as_str().contains("&access_token=pk.a%26b%3Dc+d&"), "{url}");
        assert!(url.as_str().ends_with("&language=zh-Hant%23x"), "{url}");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("access_token".to_string(), "pk.a&b=c d".to_string())));
        assert!(pairs.contains(&("language".to_string(), "zh-Hant#x".to_string())));
    }

    #[test]
    fn test_invalid_base_is_service_error() {
        let url = request_url("not a url", TravelProfile::Driving, &[], "tok", None);
        assert!(matches!(url, Err(NavError::ServiceError(_))));
    }

    #[test]
    fn test_parse_coordinate_path() {
        let points = parse_coordinate_path("139.7,35.7;139.71,35.71").unwrap();
        assert_eq!(points, vec![GeoPoint::new(35.7, 139.7), GeoPoint::new(35.71, 139.71)]);
        assert!(parse_coordinate_path("139.7;35.7").is_none());
        assert!(parse_coordinate_path("abc,35.7").is_none());
    }

    #[test]
    fn test_flatten_legs_and_steps() {
        let json = r#"{
            "routes": [
                {
                    "geometry": {"coordinates": [[139.70, 35.70], [139.705, 35.705], [139.71, 35.71]]},
                    "legs": [
                        {"steps": [{"maneuver": {"instruction": "Head north"}}, {"maneuver": {"instruction": "Turn left"}}]},
                        {"steps": [{"maneuver": {"instruction": "Arrive"}}]}
                    ]
                },
                {
                    "geometry": {"coordinates": [[0.0, 0.0]]},
                    "legs": [{"steps": [{"maneuver": {"instruction": "Other"}}]}]
                }
            ]
        }"#;
        let response: DirectionsResponse = serde_json::from_str(json).unwrap();
        let route = response.into_planned_route().unwrap();

        assert_eq!(
            route.geometry,
            vec![
                GeoPoint::new(35.70, 139.70),
                GeoPoint::new(35.705, 139.705),
                GeoPoint::new(35.71, 139.71)
            ]
        );
        assert_eq!(route.instructions, vec!["Head north", "Turn left", "Arrive"]);
    }

    #[test]
    fn test_zero_routes_is_not_found() {
        let response: DirectionsResponse =
            serde_json::from_str(r#"{"routes": [], "code": "NoRoute"}"#).unwrap();
        assert_eq!(response.into_planned_route(), Err(NavError::RouteNotFound));

        let response: DirectionsResponse =
            serde_json::from_str(r#"{"message": "Not Found"}"#).unwrap();
        assert_eq!(response.into_planned_route(), Err(NavError::RouteNotFound));
    }
}
