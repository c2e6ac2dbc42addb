pub mod boundary;
pub mod directions;
pub mod seed;

pub use boundary::{BoundaryState, ErrorBoundary};
pub use directions::{plan, plan_for_route, DirectionStep, DirectionsPlan, StepIcon};
pub use seed::{demo_slots, VideoCameraSeeder, VIDEO_CAMERAS};
