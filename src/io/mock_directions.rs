//! Mock Directions Service over HTTP
//!
//! Answers `GET {prefix}/{profile}/{lng,lat;...}` the way the real service
//! does, either with a straight-line route through the requested points or
//! with a canned body. Used by the `mock_directions` binary and by tests.

use crate::domain::types::{GeoPoint, TravelProfile};
use crate::io::directions::{
    parse_coordinate_path, DirectionsResponse, DirectionsRoute, Maneuver, RouteLeg,
    RouteLineString, RouteStep,
};
use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// What the mock answers with
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Straight segments between consecutive points, one instruction per leg
    StraightLine,
    /// Fixed JSON body with status 200
    Canned(String),
    /// Empty body with the given status
    Status(u16),
}

/// Mock service state shared across connections
#[derive(Debug)]
pub struct MockDirections {
    reply: parking_lot::Mutex<MockReply>,
    delay: parking_lot::Mutex<Duration>,
    requests: parking_lot::Mutex<Vec<String>>,
}

impl MockDirections {
    pub fn new(reply: MockReply) -> Arc<Self> {
        Arc::new(Self {
            reply: parking_lot::Mutex::new(reply),
            delay: parking_lot::Mutex::new(Duration::ZERO),
            requests: parking_lot::Mutex::new(Vec::new()),
        })
    }

    pub fn set_reply(&self, reply: MockReply) {
        *self.reply.lock() = reply;
    }

    /// Delay every response (simulates a slow upstream)
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Path and query of every request received so far
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    fn respond(&self, path: &str) -> (StatusCode, String) {
        let reply = self.reply.lock().clone();
        match reply {
            MockReply::Canned(body) => (StatusCode::OK, body),
            MockReply::Status(code) => {
                (StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR), String::new())
            }
            MockReply::StraightLine => straight_line_reply(path),
        }
    }
}

/// Build a straight-line response for `.../{profile}/{coords}`
fn straight_line_reply(path: &str) -> (StatusCode, String) {
    let mut segments = path.trim_end_matches('/').rsplitn(3, '/');
    let coords = segments.next().unwrap_or_default();
    let profile = segments.next().unwrap_or_default();

    if profile.parse::<TravelProfile>().is_err() {
        return (StatusCode::NOT_FOUND, r#"{"message":"Profile not found"}"#.to_string());
    }

    let points = match parse_coordinate_path(coords) {
        Some(points) if points.len() >= 2 => points,
        Some(_) => return (StatusCode::OK, no_route_body()),
        None => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                r#"{"message":"Invalid coordinates"}"#.to_string(),
            )
        }
    };

    let legs = points
        .windows(2)
        .enumerate()
        .map(|(i, pair)| RouteLeg {
            steps: vec![RouteStep {
                maneuver: Maneuver {
                    instruction: if i + 2 == points.len() {
                        format!("Head to destination {}", pair[1])
                    } else {
                        format!("Head to waypoint {}", pair[1])
                    },
                },
            }],
        })
        .collect();

    let response = DirectionsResponse {
        routes: vec![DirectionsRoute {
            geometry: RouteLineString { coordinates: points.iter().map(lng_lat).collect() },
            legs,
        }],
        code: Some("Ok".to_string()),
        message: None,
    };

    match serde_json::to_string(&response) {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!(r#"{{"message":"{e}"}}"#)),
    }
}

fn lng_lat(p: &GeoPoint) -> [f64; 2] {
    [p.lng, p.lat]
}

fn no_route_body() -> String {
    r#"{"routes":[],"code":"NoRoute"}"#.to_string()
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    mock: Arc<MockDirections>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let path_and_query =
        req.uri().path_and_query().map(|pq| pq.as_str().to_string()).unwrap_or_default();
    mock.requests.lock().push(path_and_query.clone());

    if req.method() != Method::GET {
        let response = Response::builder()
            .status(StatusCode::METHOD_NOT_ALLOWED)
            .body(Full::new(Bytes::new()))
            .unwrap_or_default();
        return Ok(response);
    }

    let delay = *mock.delay.lock();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let (status, body) = mock.respond(req.uri().path());
    debug!(path = %path_and_query, status = %status.as_u16(), "mock_directions_request");

    let response = Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_default();
    Ok(response)
}

/// Serve the mock on an already-bound listener until shutdown flips to true
pub async fn serve(
    listener: TcpListener,
    mock: Arc<MockDirections>,
    mut shutdown: watch::Receiver<bool>,
) {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "mock_directions_started");
    }

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let mock = mock.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let mock = mock.clone();
                                async move { handle_request(req, mock).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "mock_directions_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "mock_directions_accept_error");
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("mock_directions_shutdown");
                    return;
                }
            }
        }
    }
}
