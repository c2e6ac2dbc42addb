use crate::db::models::Detection;
use serde::{Deserialize, Serialize};

const VEHICLE_CLASSES: [&str; 4] = ["car", "truck", "bus", "motorcycle"];

/// Per-frame summary shown next to a detection view
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionStats {
    pub total: usize,
    pub vehicles: usize,
    pub persons: usize,
    pub fps: u32,
    /// Mean confidence as a percentage; 0 for an empty frame
    pub average_confidence: f32,
}

impl DetectionStats {
    pub fn from_detections(detections: &[Detection], fps: u32) -> Self {
        let vehicles = detections
            .iter()
            .filter(|d| VEHICLE_CLASSES.contains(&d.class_name.as_str()))
            .count();
        let persons = detections.iter().filter(|d| d.class_name == "person").count();
        let average_confidence = if detections.is_empty() {
            0.0
        } else {
            detections.iter().map(|d| d.confidence).sum::<f32>() / detections.len() as f32 * 100.0
        };

        Self {
            total: detections.len(),
            vehicles,
            persons,
            fps,
            average_confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::BoundingBox;

    fn detection(class_name: &str, confidence: f32) -> Detection {
        Detection {
            class_name: class_name.to_string(),
            confidence,
            bbox: BoundingBox {
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 10.0,
            },
            class_id: None,
        }
    }

    #[test]
    fn splits_vehicles_and_persons() {
        let stats = DetectionStats::from_detections(
            &[
                detection("car", 0.9),
                detection("bus", 0.7),
                detection("person", 0.8),
            ],
            15,
        );
        assert_eq!((stats.total, stats.vehicles, stats.persons), (3, 2, 1));
        assert!((stats.average_confidence - 80.0).abs() < 0.01);
    }

    #[test]
    fn empty_frame_has_zero_confidence() {
        assert_eq!(DetectionStats::from_detections(&[], 15).average_confidence, 0.0);
    }
}
