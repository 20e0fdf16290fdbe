//! View adapter - session state to map layers, map events to intents
//!
//! Rendering is declarative: the full layer set is derived from state and
//! diffed against what was last sent, so unchanged layers are not re-sent.

use crate::domain::types::SessionState;
use crate::io::view::{Layer, LayerId, LineStyle, MapEvent, PointStyle, ViewCommand};
use crate::services::session::Intent;
use std::collections::BTreeMap;

const ROUTE_STYLE: LineStyle = LineStyle {
    color: "#3887be",
    width: 5.0,
    opacity: 0.75,
    join: "round",
    cap: "round",
    before: Some(LayerId::End),
};

const START_STYLE: PointStyle = PointStyle { color: "#3887be", radius: 10.0 };
const END_STYLE: PointStyle = PointStyle { color: "#ff001d", radius: 10.0 };
const WAYPOINT_STYLE: PointStyle = PointStyle { color: "#f5a623", radius: 8.0 };
const CURRENT_STYLE: PointStyle = PointStyle { color: "#1a73e8", radius: 8.0 };

#[derive(Debug, Default)]
pub struct ViewAdapter {
    /// Layers as last sent to the view
    rendered: BTreeMap<LayerId, Layer>,
}

impl ViewAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full layer set for a state
    pub fn layers_for(state: &SessionState) -> BTreeMap<LayerId, Layer> {
        let mut layers = BTreeMap::new();

        if let Some(route) = &state.route {
            layers.insert(
                LayerId::Route,
                Layer::Line { coordinates: route.clone(), style: ROUTE_STYLE },
            );
        }
        if let Some(start) = state.start {
            layers.insert(LayerId::Start, Layer::Point { at: start, style: START_STYLE });
        }
        if let Some(end) = state.end {
            layers.insert(LayerId::End, Layer::Point { at: end, style: END_STYLE });
        }
        if let Some(waypoint) = state.waypoint {
            layers.insert(
                LayerId::Waypoint,
                Layer::Marker { at: waypoint, rotation: 0.0, draggable: true, style: WAYPOINT_STYLE },
            );
        }
        if let Some(current) = state.current_position {
            layers.insert(
                LayerId::Current,
                Layer::Marker {
                    at: current,
                    rotation: state.heading.degrees(),
                    draggable: false,
                    style: CURRENT_STYLE,
                },
            );
        }

        layers
    }

    /// Commands that bring the view from the last render to `state`
    pub fn render(&mut self, state: &SessionState) -> Vec<ViewCommand> {
        let next = Self::layers_for(state);
        let mut commands = Vec::new();

        for id in self.rendered.keys() {
            if !next.contains_key(id) {
                commands.push(ViewCommand::RemoveLayer { id: *id });
            }
        }
        for (id, layer) in &next {
            if self.rendered.get(id) != Some(layer) {
                commands.push(ViewCommand::UpsertLayer { id: *id, layer: layer.clone() });
            }
        }

        self.rendered = next;
        commands
    }

    /// Forget what was rendered, so the next render re-sends every layer
    pub fn invalidate(&mut self) {
        self.rendered.clear();
    }

    /// Translate a raw map event into a session intent
    pub fn intent_for(event: MapEvent) -> Option<Intent> {
        match event {
            MapEvent::Click { at } => Some(Intent::SelectEnd(at)),
            MapEvent::MarkerDrag { id: LayerId::Waypoint, at } => Some(Intent::DragWaypoint(at)),
            MapEvent::MarkerDrag { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{GeoPoint, Heading};

    fn ids(commands: &[ViewCommand]) -> Vec<String> {
        commands
            .iter()
            .map(|c| match c {
                ViewCommand::UpsertLayer { id, .. } => format!("+{id}"),
                ViewCommand::RemoveLayer { id } => format!("-{id}"),
                ViewCommand::Camera { .. } => "camera".to_string(),
            })
            .collect()
    }

    #[test]
    fn test_empty_state_renders_nothing() {
        let mut adapter = ViewAdapter::new();
        assert!(adapter.render(&SessionState::default()).is_empty());
    }

    #[test]
    fn test_render_diffs_against_previous() {
        let mut adapter = ViewAdapter::new();
        let mut state = SessionState {
            start: Some(GeoPoint::new(35.70, 139.70)),
            end: Some(GeoPoint::new(35.71, 139.71)),
            ..SessionState::default()
        };
        assert_eq!(ids(&adapter.render(&state)), vec!["+start", "+end"]);

        // Unchanged state sends nothing
        assert!(adapter.render(&state).is_empty());

        state.route = Some(vec![GeoPoint::new(35.70, 139.70), GeoPoint::new(35.71, 139.71)]);
        assert_eq!(ids(&adapter.render(&state)), vec!["+route"]);

        state.route = None;
        state.end = Some(GeoPoint::new(35.72, 139.72));
        assert_eq!(ids(&adapter.render(&state)), vec!["-route", "+end"]);
    }

    #[test]
    fn test_current_marker_follows_heading() {
        let mut adapter = ViewAdapter::new();
        let mut state = SessionState {
            current_position: Some(GeoPoint::new(35.70, 139.70)),
            ..SessionState::default()
        };
        adapter.render(&state);

        state.heading = Heading::from_degrees(90.0);
        let commands = adapter.render(&state);
        match commands.as_slice() {
            [ViewCommand::UpsertLayer { id: LayerId::Current, layer: Layer::Marker { rotation, .. } }] => {
                assert_eq!(*rotation, 90.0)
            }
            other => panic!("unexpected commands: {other:?}"),
        }
    }

    #[test]
    fn test_route_drawn_beneath_end_marker() {
        let state = SessionState {
            route: Some(vec![GeoPoint::new(0.0, 0.0)]),
            ..SessionState::default()
        };
        match ViewAdapter::layers_for(&state).get(&LayerId::Route) {
            Some(Layer::Line { style, .. }) => assert_eq!(style.before, Some(LayerId::End)),
            other => panic!("unexpected route layer: {other:?}"),
        }
    }

    #[test]
    fn test_invalidate_resends_everything() {
        let mut adapter = ViewAdapter::new();
        let state = SessionState { end: Some(GeoPoint::new(1.0, 1.0)), ..SessionState::default() };
        adapter.render(&state);
        adapter.invalidate();
        assert_eq!(ids(&adapter.render(&state)), vec!["+end"]);
    }

    #[test]
    fn test_intent_for_map_events() {
        let at = GeoPoint::new(35.0, 139.0);
        assert_eq!(ViewAdapter::intent_for(MapEvent::Click { at }), Some(Intent::SelectEnd(at)));
        assert_eq!(
            ViewAdapter::intent_for(MapEvent::MarkerDrag { id: LayerId::Waypoint, at }),
            Some(Intent::DragWaypoint(at))
        );
        assert_eq!(ViewAdapter::intent_for(MapEvent::MarkerDrag { id: LayerId::End, at }), None);
    }
}
