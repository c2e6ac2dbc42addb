//! Turn-by-turn walking directions from the main entrance to a slot.

use crate::session::Route;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepIcon {
    Start,
    Straight,
    TurnRight,
    TurnLeft,
    Destination,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionStep {
    pub instruction: String,
    pub distance_m: u32,
    pub icon: StepIcon,
}

/// Directions to one slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionsPlan {
    pub slot: String,
    pub zone: String,
    pub steps: Vec<DirectionStep>,
    pub estimated_minutes: u32,
    pub total_distance_m: u32,
}

struct ZoneRoute {
    steps: [(&'static str, u32, StepIcon); 5],
    minutes: u32,
    distance_m: u32,
}

const ZONE_A: ZoneRoute = ZoneRoute {
    steps: [
        ("Start from main entrance", 0, StepIcon::Start),
        ("Head straight towards Zone A", 50, StepIcon::Straight),
        ("Turn right at the first intersection", 30, StepIcon::TurnRight),
        ("Continue straight for 20 meters", 20, StepIcon::Straight),
        ("Parking slot {slot} will be on your left", 50, StepIcon::Destination),
    ],
    minutes: 2,
    distance_m: 150,
};

const ZONE_B: ZoneRoute = ZoneRoute {
    steps: [
        ("Start from main entrance", 0, StepIcon::Start),
        ("Head straight towards the central area", 40, StepIcon::Straight),
        ("Turn left at the Zone B sign", 35, StepIcon::TurnLeft),
        ("Drive straight past the first row", 25, StepIcon::Straight),
        ("Parking slot {slot} will be on your right", 50, StepIcon::Destination),
    ],
    minutes: 3,
    distance_m: 180,
};

const ZONE_C: ZoneRoute = ZoneRoute {
    steps: [
        ("Start from main entrance", 0, StepIcon::Start),
        ("Head towards the back of the parking area", 80, StepIcon::Straight),
        ("Turn right towards Zone C", 40, StepIcon::TurnRight),
        ("Continue until you see the Zone C marker", 30, StepIcon::Straight),
        ("Parking slot {slot} will be directly ahead", 20, StepIcon::Destination),
    ],
    minutes: 4,
    distance_m: 220,
};

/// Plan the way to `slot` in `zone`. Unknown zones get zone A's route.
pub fn plan(slot: &str, zone: &str) -> Option<DirectionsPlan> {
    if slot.is_empty() || zone.is_empty() {
        return None;
    }
    let route = match zone {
        "B" => &ZONE_B,
        "C" => &ZONE_C,
        _ => &ZONE_A,
    };

    Some(DirectionsPlan {
        slot: slot.to_string(),
        zone: zone.to_string(),
        steps: route
            .steps
            .iter()
            .map(|(instruction, distance_m, icon)| DirectionStep {
                instruction: instruction.replace("{slot}", slot),
                distance_m: *distance_m,
                icon: *icon,
            })
            .collect(),
        estimated_minutes: route.minutes,
        total_distance_m: route.distance_m,
    })
}

/// Plan for a `/directions` route; any other route has none
pub fn plan_for_route(route: &Route) -> Option<DirectionsPlan> {
    match route {
        Route::Directions {
            slot: Some(slot),
            zone: Some(zone),
        } => plan(slot, zone),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_b_route() {
        let plan = plan("B-07", "B").unwrap();
        assert_eq!(plan.steps.len(), 5);
        assert_eq!(plan.steps[2].icon, StepIcon::TurnLeft);
        assert_eq!(plan.steps[4].instruction, "Parking slot B-07 will be on your right");
        assert_eq!((plan.estimated_minutes, plan.total_distance_m), (3, 180));
    }

    #[test]
    fn unknown_zone_uses_zone_a() {
        let plan = plan("Q-1", "Q").unwrap();
        assert_eq!(plan.steps[1].instruction, "Head straight towards Zone A");
        assert_eq!(plan.total_distance_m, 150);
        assert_eq!(plan.zone, "Q");
    }

    #[test]
    fn route_without_slot_has_no_plan() {
        let route = Route::parse("/directions?zone=A");
        assert!(plan_for_route(&route).is_none());
        assert!(plan_for_route(&Route::parse("/directions?slot=A-101&zone=A")).is_some());
        assert!(plan_for_route(&Route::Home).is_none());
    }

    #[test]
    fn step_distances_add_up() {
        for zone in ["A", "B", "C"] {
            let plan = plan("X-1", zone).unwrap();
            let sum: u32 = plan.steps.iter().map(|s| s.distance_m).sum();
            assert_eq!(sum, plan.total_distance_m);
        }
    }
}
