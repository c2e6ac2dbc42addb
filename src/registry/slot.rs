use crate::db::models::{OccupancyStats, ParkingSlot, SlotId};
use crate::error::Error;
use crate::messaging::Notifier;
use crate::registry::SyncHandle;
use crate::remote::{DataService, Table};
use anyhow::Result;
use log::{debug, error, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Snapshot published to slot map subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotListState {
    /// Ordered by slot number
    pub slots: Vec<ParkingSlot>,
    pub loading: bool,
    /// Slot the driver picked, if any
    pub selected: Option<SlotId>,
}

impl Default for SlotListState {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            loading: true,
            selected: None,
        }
    }
}

/// Local mirror of the `parking_slots` table
pub struct SlotRegistry {
    remote: Arc<dyn DataService>,
    notifier: Notifier,
    state: watch::Sender<SlotListState>,
    sync: Mutex<Option<SyncHandle>>,
}

impl SlotRegistry {
    /// Create a new slot registry
    pub fn new(remote: Arc<dyn DataService>, notifier: Notifier) -> Arc<Self> {
        let (state, _) = watch::channel(SlotListState::default());
        Arc::new(Self {
            remote,
            notifier,
            state,
            sync: Mutex::new(None),
        })
    }

    pub fn slots(&self) -> Vec<ParkingSlot> {
        self.state.borrow().slots.clone()
    }

    pub fn selected(&self) -> Option<ParkingSlot> {
        let state = self.state.borrow();
        state
            .selected
            .and_then(|id| state.slots.iter().find(|s| s.id == id).cloned())
    }

    pub fn subscribe(&self) -> watch::Receiver<SlotListState> {
        self.state.subscribe()
    }

    pub fn occupancy(&self) -> OccupancyStats {
        OccupancyStats::from_slots(&self.state.borrow().slots)
    }

    /// Replace the local list with the remote one; undecodable rows are skipped
    pub async fn fetch(&self) {
        match self.remote.list_slots().await {
            Ok(rows) => {
                let slots: Vec<ParkingSlot> = rows
                    .into_iter()
                    .filter_map(|row| match ParkingSlot::try_from(row) {
                        Ok(slot) => Some(slot),
                        Err(e) => {
                            warn!("Skipping slot row: {}", e);
                            None
                        }
                    })
                    .collect();
                debug!("Fetched {} parking slots", slots.len());
                self.state.send_modify(|state| {
                    state.slots = slots;
                    state.loading = false;
                });
            }
            Err(e) => {
                error!("Error fetching parking slots: {}", e);
                self.notifier.error("Failed to load parking slots");
                self.state.send_modify(|state| state.loading = false);
            }
        }
    }

    /// Flip one random slot and persist it.
    ///
    /// Stand-in for a detection pipeline; no image analysis is involved. The
    /// local list is not touched, the change notification brings it in.
    pub async fn simulate_detection(&self) -> Result<ParkingSlot> {
        let picked = {
            let state = self.state.borrow();
            if state.slots.is_empty() {
                None
            } else {
                let index = rand::thread_rng().gen_range(0..state.slots.len());
                Some(state.slots[index].clone())
            }
        };
        let Some(mut slot) = picked else {
            self.notifier.error("Simulation failed");
            return Err(Error::NotFound("No parking slots to simulate".to_string()).into());
        };

        let status = slot.status.flipped();
        match self.remote.update_slot_status(slot.id, status).await {
            Ok(()) => {
                info!("Simulated detection on slot {}", slot.slot_number);
                self.notifier.success(format!(
                    "Simulated detection: {} is now {}",
                    slot.slot_number, status
                ));
                slot.status = status;
                Ok(slot)
            }
            Err(e) => {
                error!("Simulated detection on {} failed: {}", slot.slot_number, e);
                self.notifier.error("Simulation failed");
                Err(e)
            }
        }
    }

    /// First vacant slot in slot order, which also becomes the selection
    pub fn nearest_vacant(&self) -> Option<ParkingSlot> {
        let nearest = self
            .state
            .borrow()
            .slots
            .iter()
            .find(|s| s.is_vacant())
            .cloned();

        match nearest {
            Some(slot) => {
                self.state.send_modify(|state| state.selected = Some(slot.id));
                self.notifier.success(format!(
                    "Nearest slot: {} in Zone {}",
                    slot.slot_number, slot.zone
                ));
                Some(slot)
            }
            None => {
                self.notifier.error("No vacant slots available");
                None
            }
        }
    }

    /// Select a slot; only vacant slots can be selected
    pub fn select(&self, id: SlotId) -> Result<ParkingSlot> {
        let slot = self
            .state
            .borrow()
            .slots
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Slot {} not found", id)))?;

        if !slot.is_vacant() {
            self.notifier.error("This slot is occupied");
            return Err(Error::Validation(format!("Slot {} is occupied", slot.slot_number)).into());
        }

        self.state.send_modify(|state| state.selected = Some(slot.id));
        self.notifier
            .success(format!("Selected slot {}", slot.slot_number));
        Ok(slot)
    }

    /// Refetch immediately on every slot table change
    pub fn start_sync(self: &Arc<Self>) {
        let mut feed = self.remote.subscribe(Table::Slots);
        let handle = SyncHandle::new();
        let token = handle.token();
        let registry = Arc::downgrade(self);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = feed.recv() => {
                        let Some(event) = event else { break };
                        let Some(registry) = registry.upgrade() else { break };
                        debug!("Slot change {:?}, refetching", event.kind);
                        registry.fetch().await;
                    }
                }
            }
            debug!("Slot sync stopped");
        });

        *self
            .sync
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handle);
    }

    pub fn stop_sync(&self) {
        self.sync
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{SlotLocation, SlotRow, SlotStatus};
    use crate::remote::{InMemoryDataService, RemoteOp};

    fn slot(id: SlotId, number: &str, status: SlotStatus) -> ParkingSlot {
        ParkingSlot {
            id,
            slot_number: number.to_string(),
            location: SlotLocation {
                x: 0.0,
                y: 0.0,
                width: 40.0,
                height: 80.0,
            },
            status,
            zone: "A".to_string(),
        }
    }

    async fn loaded(slots: &[ParkingSlot]) -> (Arc<InMemoryDataService>, Arc<SlotRegistry>, Notifier) {
        let remote = Arc::new(InMemoryDataService::new());
        remote.seed_slots(slots);
        let notifier = Notifier::new();
        let registry = SlotRegistry::new(remote.clone(), notifier.clone());
        registry.fetch().await;
        (remote, registry, notifier)
    }

    #[tokio::test]
    async fn occupancy_of_mixed_lot() {
        let (_, registry, _) = loaded(&[
            slot(1, "A-01", SlotStatus::Vacant),
            slot(2, "A-02", SlotStatus::Occupied),
            slot(3, "A-03", SlotStatus::Vacant),
            slot(4, "A-04", SlotStatus::Occupied),
        ])
        .await;

        let stats = registry.occupancy();
        assert_eq!((stats.vacant, stats.occupied, stats.rate_percent), (2, 2, 50));
    }

    #[tokio::test]
    async fn slots_are_ordered_by_number() {
        let (_, registry, _) = loaded(&[
            slot(1, "B-01", SlotStatus::Vacant),
            slot(2, "A-01", SlotStatus::Vacant),
        ])
        .await;

        let numbers: Vec<String> = registry.slots().into_iter().map(|s| s.slot_number).collect();
        assert_eq!(numbers, vec!["A-01", "B-01"]);
    }

    #[tokio::test]
    async fn bad_rows_are_skipped() {
        let (remote, registry, _) = loaded(&[slot(1, "A-01", SlotStatus::Vacant)]).await;
        remote.seed_slot_row(SlotRow {
            id: 2,
            slot_number: "A-02".to_string(),
            location: serde_json::json!({"x": 1}),
            status: "vacant".to_string(),
            zone: "A".to_string(),
        });

        registry.fetch().await;
        assert_eq!(registry.slots().len(), 1);
    }

    #[tokio::test]
    async fn simulate_flips_and_persists() {
        let (remote, registry, notifier) = loaded(&[slot(1, "A-01", SlotStatus::Vacant)]).await;

        let flipped = registry.simulate_detection().await.unwrap();
        assert_eq!(flipped.status, SlotStatus::Occupied);
        assert_eq!(remote.slot_status(1).as_deref(), Some("occupied"));
        assert_eq!(
            notifier.messages(),
            vec!["Simulated detection: A-01 is now occupied"]
        );
    }

    #[tokio::test]
    async fn simulate_failure_is_notified() {
        let (remote, registry, notifier) = loaded(&[slot(1, "A-01", SlotStatus::Vacant)]).await;
        remote.fail_next(RemoteOp::UpdateSlotStatus);

        assert!(registry.simulate_detection().await.is_err());
        assert_eq!(remote.slot_status(1).as_deref(), Some("vacant"));
        assert_eq!(notifier.messages(), vec!["Simulation failed"]);
    }

    #[tokio::test]
    async fn nearest_vacant_picks_first_in_order() {
        let (_, registry, notifier) = loaded(&[
            slot(1, "A-01", SlotStatus::Occupied),
            slot(2, "A-02", SlotStatus::Vacant),
            slot(3, "A-03", SlotStatus::Vacant),
        ])
        .await;

        assert_eq!(registry.nearest_vacant().map(|s| s.id), Some(2));
        assert_eq!(registry.selected().map(|s| s.id), Some(2));
        assert_eq!(notifier.messages(), vec!["Nearest slot: A-02 in Zone A"]);
    }

    #[tokio::test]
    async fn full_lot_has_no_nearest() {
        let (_, registry, notifier) = loaded(&[slot(1, "A-01", SlotStatus::Occupied)]).await;
        assert!(registry.nearest_vacant().is_none());
        assert_eq!(notifier.messages(), vec!["No vacant slots available"]);
    }

    #[tokio::test]
    async fn occupied_slots_cannot_be_selected() {
        let (_, registry, notifier) = loaded(&[slot(1, "A-01", SlotStatus::Occupied)]).await;
        assert!(registry.select(1).is_err());
        assert!(registry.selected().is_none());
        assert_eq!(notifier.messages(), vec!["This slot is occupied"]);
    }

    #[tokio::test]
    async fn sync_refetches_on_change() {
        let (remote, registry, _) = loaded(&[slot(1, "A-01", SlotStatus::Vacant)]).await;
        let mut updates = registry.subscribe();
        registry.start_sync();

        remote.update_slot_status(1, SlotStatus::Occupied).await.unwrap();
        updates.changed().await.unwrap();
        assert_eq!(registry.slots()[0].status, SlotStatus::Occupied);
    }
}
