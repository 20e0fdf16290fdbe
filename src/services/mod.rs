//! Services - navigation logic and state management
//!
//! This module contains the core services:
//! - `session` - Navigation session state machine, sole owner of `SessionState`
//! - `route_planner` - Route requests against the Directions Service
//! - `position_tracker` - One-shot fixes and fixed-interval polling
//! - `orientation_tracker` - Fuses compass and screen rotation into a heading
//! - `view_adapter` - Session state to map layers, map events to intents

pub mod orientation_tracker;
pub mod position_tracker;
pub mod route_planner;
pub mod session;
pub mod view_adapter;

// Re-export commonly used types
pub use position_tracker::PositionTracker;
pub use route_planner::{HttpRoutePlanner, RoutePlanning, RouteRequest};
pub use session::{Intent, NavigationSession, SessionEvent, SessionHandle};
pub use view_adapter::ViewAdapter;
