//! Parking lot occupancy demo: camera and slot registries kept in sync with a
//! remote data service, role-gated sessions, and pluggable detection sources.

pub mod api;
pub mod config;
pub mod db;
pub mod detection;
pub mod error;
pub mod messaging;
pub mod registry;
pub mod remote;
pub mod security;
pub mod services;
pub mod session;

// Re-export main components for easier use
pub use config::{load_config, Config};
pub use error::Error;
pub use messaging::Notifier;
pub use registry::{CameraRegistry, DetectionStatusBook, SlotRegistry};
pub use remote::{DataService, InMemoryDataService, PgDataService};
pub use session::{Navigator, Route, SessionResolver};
