use super::camera_models::CameraId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Box in `{x, y, width, height}` form
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Box in `{x1, y1, x2, y2}` form, as sent by the analytics socket
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CornerBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn from_corners(corners: CornerBox) -> Self {
        Self {
            x: corners.x1,
            y: corners.y1,
            width: (corners.x2 - corners.x1).max(0.0),
            height: (corners.y2 - corners.y1).max(0.0),
        }
    }

    pub fn to_corners(&self) -> CornerBox {
        CornerBox {
            x1: self.x,
            y1: self.y,
            x2: self.x + self.width,
            y2: self.y + self.height,
        }
    }

    pub fn is_non_negative(&self) -> bool {
        self.x >= 0.0 && self.y >= 0.0 && self.width >= 0.0 && self.height >= 0.0
    }
}

/// One detected object in a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_name: String,
    /// In [0, 1]
    pub confidence: f32,
    pub bbox: BoundingBox,
    #[serde(default)]
    pub class_id: Option<u32>,
}

/// All detections for a single frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionBatch {
    pub detections: Vec<Detection>,
    pub count: usize,
    pub frame_number: u64,
    /// Seconds since the Unix epoch
    pub timestamp: f64,
}

impl DetectionBatch {
    pub fn new(detections: Vec<Detection>, frame_number: u64) -> Self {
        Self {
            count: detections.len(),
            detections,
            frame_number,
            timestamp: Utc::now().timestamp_millis() as f64 / 1000.0,
        }
    }
}

/// Per-camera detection state held by a view; never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionStatus {
    pub camera_id: CameraId,
    pub is_detecting: bool,
    pub last_detection: Option<DateTime<Utc>>,
    pub total_slots: usize,
    pub occupied_slots: usize,
    pub vacant_slots: usize,
    pub fps: u32,
}

/// Detection as it appears on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireDetection {
    #[serde(default)]
    pub class_id: Option<u32>,
    pub class_name: String,
    pub confidence: f32,
    pub bbox: CornerBox,
}

/// Detection batch as it appears on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireBatch {
    pub detections: Vec<WireDetection>,
    pub count: usize,
    pub frame_number: u64,
    pub timestamp: f64,
}

impl From<WireBatch> for DetectionBatch {
    fn from(wire: WireBatch) -> Self {
        Self {
            detections: wire
                .detections
                .into_iter()
                .map(|d| Detection {
                    class_name: d.class_name,
                    confidence: d.confidence,
                    bbox: BoundingBox::from_corners(d.bbox),
                    class_id: d.class_id,
                })
                .collect(),
            count: wire.count,
            frame_number: wire.frame_number,
            timestamp: wire.timestamp,
        }
    }
}

impl From<&DetectionBatch> for WireBatch {
    fn from(batch: &DetectionBatch) -> Self {
        Self {
            detections: batch
                .detections
                .iter()
                .map(|d| WireDetection {
                    class_id: d.class_id,
                    class_name: d.class_name.clone(),
                    confidence: d.confidence,
                    bbox: d.bbox.to_corners(),
                })
                .collect(),
            count: batch.count,
            frame_number: batch.frame_number,
            timestamp: batch.timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Payload of a `frame` message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameMessage {
    /// Base64-encoded JPEG
    pub frame: String,
    pub detections: WireBatch,
    pub fps: f64,
    pub resolution: Resolution,
}

/// Inbound message from the analytics socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FeedMessage {
    #[serde(rename = "frame")]
    Frame(FrameMessage),
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Start,
    Pause,
    Stop,
}

/// Outbound command to the analytics socket; fire-and-forget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedCommand {
    pub command: CommandKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_path: Option<String>,
}

impl FeedCommand {
    pub fn start(video_path: Option<String>) -> Self {
        Self {
            command: CommandKind::Start,
            video_path,
        }
    }

    pub fn pause() -> Self {
        Self {
            command: CommandKind::Pause,
            video_path: None,
        }
    }

    pub fn stop() -> Self {
        Self {
            command: CommandKind::Stop,
            video_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_frame_message() {
        let raw = r#"{
            "type": "frame",
            "frame": "AAAA",
            "detections": {
                "detections": [
                    {"class_id": 2, "class_name": "car", "confidence": 0.91,
                     "bbox": {"x1": 10, "y1": 20, "x2": 110, "y2": 90}}
                ],
                "count": 1,
                "frame_number": 12,
                "timestamp": 1690000000
            },
            "fps": 15,
            "resolution": {"width": 640, "height": 480}
        }"#;

        let message: FeedMessage = serde_json::from_str(raw).unwrap();
        let FeedMessage::Frame(frame) = message else {
            panic!("expected frame message");
        };
        assert_eq!(frame.fps, 15.0);

        let batch = DetectionBatch::from(frame.detections);
        assert_eq!(batch.frame_number, 12);
        assert_eq!(batch.detections[0].bbox.width, 100.0);
        assert_eq!(batch.detections[0].bbox.height, 70.0);
    }

    #[test]
    fn unknown_message_types_are_tolerated() {
        let message: FeedMessage = serde_json::from_str(r#"{"type": "status"}"#).unwrap();
        assert_eq!(message, FeedMessage::Other);
    }

    #[test]
    fn commands_serialize_without_empty_video_path() {
        let stop = serde_json::to_value(FeedCommand::stop()).unwrap();
        assert_eq!(stop, serde_json::json!({"command": "stop"}));

        let start = serde_json::to_value(FeedCommand::start(Some("lot.mp4".to_string()))).unwrap();
        assert_eq!(
            start,
            serde_json::json!({"command": "start", "video_path": "lot.mp4"})
        );
    }

    #[test]
    fn inverted_corners_clamp_to_zero_size() {
        let bbox = BoundingBox::from_corners(CornerBox {
            x1: 50.0,
            y1: 50.0,
            x2: 40.0,
            y2: 45.0,
        });
        assert_eq!(bbox.width, 0.0);
        assert_eq!(bbox.height, 0.0);
    }
}
