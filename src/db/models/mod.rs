pub mod camera_models;
pub mod detection_models;
pub mod slot_models;
pub mod user_models;

pub use camera_models::{Camera, CameraFormData, CameraId, CameraRow, CameraStatus, CameraUpdate, NewCameraRow};
pub use detection_models::{
    BoundingBox, CommandKind, CornerBox, Detection, DetectionBatch, DetectionStatus, FeedCommand,
    FeedMessage, FrameMessage, Resolution, WireBatch, WireDetection,
};
pub use slot_models::{OccupancyStats, ParkingSlot, SlotId, SlotLocation, SlotRow, SlotStatus};
pub use user_models::{AuthEvent, AuthUser, AuthUserRow, Profile, Session, SessionUser, SignUpRequest, UserRole};
