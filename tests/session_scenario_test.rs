//! End-to-end session scenarios over real HTTP to the mock Directions Service

use async_trait::async_trait;
use mapnav::domain::error::GeolocationError;
use mapnav::domain::types::{GeoPoint, NavPhase};
use mapnav::infra::{Config, Metrics};
use mapnav::io::mock_directions::{serve, MockDirections, MockReply};
use mapnav::io::view::Layer;
use mapnav::io::{
    create_view_channel, CameraCommand, GeolocationOptions, GeolocationSource, LayerId,
    StaticPermission, ViewCommand,
};
use mapnav::services::{HttpRoutePlanner, Intent, NavigationSession, SessionEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};

const START: GeoPoint = GeoPoint::new(35.70, 139.70);
const END: GeoPoint = GeoPoint::new(35.71, 139.71);

const HEAD_NORTH: &str = r#"{"routes":[{
    "geometry":{"coordinates":[[139.70,35.70],[139.705,35.705],[139.71,35.71]]},
    "legs":[{"steps":[{"maneuver":{"instruction":"Head north"}}]}]
}],"code":"Ok"}"#;

struct FixedSource(GeoPoint);

#[async_trait]
impl GeolocationSource for FixedSource {
    async fn current_position(
        &self,
        _options: &GeolocationOptions,
    ) -> Result<GeoPoint, GeolocationError> {
        Ok(self.0)
    }
}

async fn start_mock(reply: MockReply) -> (Arc<MockDirections>, String, watch::Sender<bool>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let mock = MockDirections::new(reply);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(serve(listener, mock.clone(), shutdown_rx));
    (mock, format!("http://{addr}"), shutdown_tx)
}

fn session_for(base: &str) -> (NavigationSession, mpsc::Receiver<ViewCommand>) {
    let config = Config::default()
        .with_directions_api_base(base)
        .with_poll_interval_ms(60_000);
    let metrics = Arc::new(Metrics::new());
    let (view, view_rx) = create_view_channel(256, metrics.clone());
    let planner = Arc::new(HttpRoutePlanner::new(&config).unwrap());

    let session = NavigationSession::new(
        config,
        planner,
        Arc::new(FixedSource(START)),
        Arc::new(StaticPermission::granted()),
        view,
        metrics,
    );
    (session, view_rx)
}

#[tokio::test]
async fn test_navigation_start_plans_route_from_seed_fix() {
    let (mock, base, _shutdown) = start_mock(MockReply::Canned(HEAD_NORTH.to_string())).await;
    let (mut session, _view_rx) = session_for(&base);

    session.handle_event(SessionEvent::Intent(Intent::SelectEnd(END)));
    assert_eq!(session.phase(), NavPhase::Ready);
    session.handle_event(SessionEvent::Intent(Intent::StartNavigation));
    assert_eq!(session.phase(), NavPhase::Navigating);

    // Seed fix, first poll and the route response, in whatever order they land
    tokio::time::timeout(Duration::from_secs(5), async {
        while session.state().route.is_none() {
            assert!(session.process_next().await);
        }
    })
    .await
    .expect("route within 5s");

    let state = session.state();
    assert_eq!(state.start, Some(START));
    assert_eq!(state.route, Some(vec![START, GeoPoint::new(35.705, 139.705), END]));
    assert_eq!(state.instructions, vec!["Head north"]);

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].starts_with("/driving/139.7,35.7;139.71,35.71?"), "{}", requests[0]);
}

#[tokio::test]
async fn test_running_session_draws_route_through_default_waypoint() {
    let (mock, base, _mock_shutdown) = start_mock(MockReply::StraightLine).await;
    let (session, mut view_rx) = session_for(&base);
    let handle = session.handle();
    let waypoint = Config::default().waypoint_for(START);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = tokio::spawn(session.run(shutdown_rx));

    // Mount flies to the configured initial view first
    let first = tokio::time::timeout(Duration::from_secs(5), view_rx.recv()).await.unwrap();
    assert!(matches!(
        first,
        Some(ViewCommand::Camera { camera: CameraCommand::FlyTo { zoom, .. } }) if zoom == 14.0
    ));

    // Wait for the mount fix to place the start marker before choosing an end
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(ViewCommand::UpsertLayer { id: LayerId::Start, .. }) = view_rx.recv().await {
                break;
            }
        }
    })
    .await
    .expect("start marker within 5s");

    assert!(handle.intent(Intent::SelectEnd(END)).await);

    let route = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match view_rx.recv().await {
                Some(ViewCommand::UpsertLayer {
                    id: LayerId::Route,
                    layer: Layer::Line { coordinates, .. },
                }) => break coordinates,
                Some(_) => continue,
                None => panic!("view channel closed"),
            }
        }
    })
    .await
    .expect("route layer within 5s");

    assert_eq!(route, vec![START, waypoint, END]);
    assert_eq!(mock.requests().len(), 1);

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), runner).await.unwrap().unwrap();
}
