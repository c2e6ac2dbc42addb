use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

pub type SlotId = i64;

/// Row shape of the `parking_slots` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SlotRow {
    pub id: SlotId,
    pub slot_number: String,
    pub location: serde_json::Value,
    pub status: String,
    pub zone: String,
}

/// Position of a slot on the lot map
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlotLocation {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Vacant,
    Occupied,
}

impl SlotStatus {
    pub fn flipped(self) -> Self {
        match self {
            SlotStatus::Vacant => SlotStatus::Occupied,
            SlotStatus::Occupied => SlotStatus::Vacant,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Vacant => "vacant",
            SlotStatus::Occupied => "occupied",
        }
    }
}

impl Display for SlotStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vacant" => Ok(SlotStatus::Vacant),
            "occupied" => Ok(SlotStatus::Occupied),
            other => Err(Error::Decode(format!("Unknown slot status: {}", other))),
        }
    }
}

/// Parking slot model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParkingSlot {
    pub id: SlotId,
    pub slot_number: String,
    pub location: SlotLocation,
    pub status: SlotStatus,
    pub zone: String,
}

impl ParkingSlot {
    pub fn is_vacant(&self) -> bool {
        self.status == SlotStatus::Vacant
    }
}

impl TryFrom<SlotRow> for ParkingSlot {
    type Error = Error;

    fn try_from(row: SlotRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<SlotStatus>()?;
        let location: SlotLocation = serde_json::from_value(row.location).map_err(|e| {
            Error::Decode(format!("Invalid location for slot {}: {}", row.slot_number, e))
        })?;

        Ok(Self {
            id: row.id,
            slot_number: row.slot_number,
            location,
            status,
            zone: row.zone,
        })
    }
}

impl From<&ParkingSlot> for SlotRow {
    fn from(slot: &ParkingSlot) -> Self {
        Self {
            id: slot.id,
            slot_number: slot.slot_number.clone(),
            location: serde_json::json!({
                "x": slot.location.x,
                "y": slot.location.y,
                "width": slot.location.width,
                "height": slot.location.height,
            }),
            status: slot.status.as_str().to_string(),
            zone: slot.zone.clone(),
        }
    }
}

/// Occupancy counts over a slot list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OccupancyStats {
    pub total: usize,
    pub vacant: usize,
    pub occupied: usize,
    /// Occupied share, rounded to a whole percent
    pub rate_percent: u32,
}

impl OccupancyStats {
    pub fn from_slots(slots: &[ParkingSlot]) -> Self {
        let vacant = slots.iter().filter(|s| s.status == SlotStatus::Vacant).count();
        let occupied = slots.iter().filter(|s| s.status == SlotStatus::Occupied).count();
        let total = slots.len();
        let rate_percent = if total > 0 {
            ((occupied as f64 / total as f64) * 100.0).round() as u32
        } else {
            0
        };

        Self {
            total,
            vacant,
            occupied,
            rate_percent,
        }
    }
}
