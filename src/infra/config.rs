//! Configuration loading from TOML files
//!
//! Config file is selected via `--config <path>` (default: config/dev.toml).
//! Every section is optional; missing values fall back to the defaults below.

use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::domain::types::GeoPoint;

#[derive(Debug, Clone, Deserialize)]
pub struct DirectionsConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub access_token: String,
    /// Instruction language passed through to the service (e.g. "ja")
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default = "default_directions_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for DirectionsConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            access_token: String::new(),
            language: None,
            timeout_ms: default_directions_timeout_ms(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.mapbox.com/directions/v5/mapbox".to_string()
}

fn default_directions_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapConfig {
    #[serde(default)]
    pub style_url: String,
    #[serde(default = "default_initial_lat")]
    pub initial_lat: f64,
    #[serde(default = "default_initial_lng")]
    pub initial_lng: f64,
    #[serde(default = "default_initial_zoom")]
    pub initial_zoom: f64,
    /// Zoom used while following a route
    #[serde(default = "default_navigation_zoom")]
    pub navigation_zoom: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            style_url: String::new(),
            initial_lat: default_initial_lat(),
            initial_lng: default_initial_lng(),
            initial_zoom: default_initial_zoom(),
            navigation_zoom: default_navigation_zoom(),
        }
    }
}

fn default_initial_lat() -> f64 {
    35.7340486
}

fn default_initial_lng() -> f64 {
    139.6632556
}

fn default_initial_zoom() -> f64 {
    14.0
}

fn default_navigation_zoom() -> f64 {
    18.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeolocationConfig {
    #[serde(default = "default_geolocation_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub max_cache_age_ms: u64,
    #[serde(default = "default_high_accuracy")]
    pub high_accuracy: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_geolocation_timeout_ms(),
            max_cache_age_ms: 0,
            high_accuracy: default_high_accuracy(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_geolocation_timeout_ms() -> u64 {
    10_000
}

fn default_high_accuracy() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaypointConfig {
    #[serde(default = "default_waypoint_offset")]
    pub offset_lat: f64,
    #[serde(default = "default_waypoint_offset")]
    pub offset_lng: f64,
}

impl Default for WaypointConfig {
    fn default() -> Self {
        Self { offset_lat: default_waypoint_offset(), offset_lng: default_waypoint_offset() }
    }
}

fn default_waypoint_offset() -> f64 {
    0.002
}

/// Credentials of the upstream basic-auth gate; carried, never checked here
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval() }
    }
}

fn default_metrics_interval() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub directions: DirectionsConfig,
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub geolocation: GeolocationConfig,
    #[serde(default)]
    pub waypoint: WaypointConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Main configuration struct injected into the session and its collaborators
#[derive(Debug, Clone)]
pub struct Config {
    directions_api_base: String,
    access_token: String,
    language: Option<String>,
    directions_timeout_ms: u64,
    map_style_url: String,
    initial_center: GeoPoint,
    initial_zoom: f64,
    navigation_zoom: f64,
    geolocation_timeout_ms: u64,
    geolocation_max_cache_age_ms: u64,
    geolocation_high_accuracy: bool,
    poll_interval_ms: u64,
    waypoint_offset: (f64, f64),
    auth_user: Option<String>,
    auth_password: Option<String>,
    metrics_interval_secs: u64,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default")
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: &str) -> Self {
        let TomlConfig { directions, map, geolocation, waypoint, auth, metrics } = toml_config;
        Self {
            directions_api_base: directions.api_base.trim_end_matches('/').to_string(),
            access_token: directions.access_token,
            language: directions.language.filter(|l| !l.is_empty()),
            directions_timeout_ms: directions.timeout_ms,
            map_style_url: map.style_url,
            initial_center: GeoPoint::new(map.initial_lat, map.initial_lng),
            initial_zoom: map.initial_zoom,
            navigation_zoom: map.navigation_zoom,
            geolocation_timeout_ms: geolocation.timeout_ms,
            geolocation_max_cache_age_ms: geolocation.max_cache_age_ms,
            geolocation_high_accuracy: geolocation.high_accuracy,
            poll_interval_ms: geolocation.poll_interval_ms.max(1),
            waypoint_offset: (waypoint.offset_lat, waypoint.offset_lng),
            auth_user: auth.user,
            auth_password: auth.password,
            metrics_interval_secs: metrics.interval_secs.max(1),
            config_file: config_file.to_string(),
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, &path.display().to_string()))
    }

    /// Load configuration - tries TOML file first, falls back to defaults
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "config_load_failed_using_defaults");
                Self::default()
            }
        }
    }

    pub fn directions_api_base(&self) -> &str {
        &self.directions_api_base
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn directions_timeout(&self) -> Duration {
        Duration::from_millis(self.directions_timeout_ms)
    }

    pub fn map_style_url(&self) -> &str {
        &self.map_style_url
    }

    pub fn initial_center(&self) -> GeoPoint {
        self.initial_center
    }

    pub fn initial_zoom(&self) -> f64 {
        self.initial_zoom
    }

    pub fn navigation_zoom(&self) -> f64 {
        self.navigation_zoom
    }

    pub fn geolocation_timeout_ms(&self) -> u64 {
        self.geolocation_timeout_ms
    }

    pub fn geolocation_max_cache_age_ms(&self) -> u64 {
        self.geolocation_max_cache_age_ms
    }

    pub fn geolocation_high_accuracy(&self) -> bool {
        self.geolocation_high_accuracy
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Default waypoint position relative to the initial fix
    pub fn waypoint_for(&self, origin: GeoPoint) -> GeoPoint {
        origin.offset(self.waypoint_offset.0, self.waypoint_offset.1)
    }

    pub fn auth_user(&self) -> Option<&str> {
        self.auth_user.as_deref()
    }

    pub fn auth_password(&self) -> Option<&str> {
        self.auth_password.as_deref()
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method to point the planner at another service (tests, mock server)
    pub fn with_directions_api_base(mut self, base: &str) -> Self {
        self.directions_api_base = base.trim_end_matches('/').to_string();
        self
    }

    /// Builder method for tests to shorten the geolocation timeout
    pub fn with_geolocation_timeout_ms(mut self, ms: u64) -> Self {
        self.geolocation_timeout_ms = ms;
        self
    }

    /// Builder method for tests to change the polling cadence
    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.directions_api_base(), "https://api.mapbox.com/directions/v5/mapbox");
        assert_eq!(config.access_token(), "");
        assert_eq!(config.language(), None);
        assert_eq!(config.geolocation_timeout_ms(), 10_000);
        assert_eq!(config.geolocation_max_cache_age_ms(), 0);
        assert!(config.geolocation_high_accuracy());
        assert_eq!(config.poll_interval(), Duration::from_millis(1000));
        assert_eq!(config.initial_center(), GeoPoint::new(35.7340486, 139.6632556));
        assert_eq!(config.initial_zoom(), 14.0);
        assert_eq!(config.navigation_zoom(), 18.0);
        assert_eq!(config.config_file(), "default");
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let toml_config: TomlConfig = toml::from_str("").unwrap();
        let config = Config::from_toml(toml_config, "empty.toml");
        assert_eq!(config.poll_interval(), Duration::from_millis(1000));
        assert_eq!(config.metrics_interval_secs(), 10);
        assert_eq!(config.config_file(), "empty.toml");
    }

    #[test]
    fn test_api_base_trailing_slash_trimmed() {
        let config = Config::default().with_directions_api_base("http://127.0.0.1:9000/");
        assert_eq!(config.directions_api_base(), "http://127.0.0.1:9000");
    }

    #[test]
    fn test_empty_language_ignored() {
        let toml_config: TomlConfig = toml::from_str("[directions]\nlanguage = \"\"\n").unwrap();
        let config = Config::from_toml(toml_config, "x");
        assert_eq!(config.language(), None);
    }

    #[test]
    fn test_waypoint_offset() {
        let config = Config::default();
        let wp = config.waypoint_for(GeoPoint::new(35.0, 139.0));
        assert!((wp.lat - 35.002).abs() < 1e-9);
        assert!((wp.lng - 139.002).abs() < 1e-9);
    }

    #[test]
    fn test_zero_poll_interval_clamped() {
        let config = Config::default().with_poll_interval_ms(0);
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
    }
}
