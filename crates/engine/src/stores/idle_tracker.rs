//! Idle world tracker.
//!
//! Remembers, per loaded world, when it last became empty. Each world moves
//! through `Occupied -> Idle -> (Occupied | Evicting)`; only the eviction
//! scheduler moves a world out of `Idle` into `Evicting`.
//!
//! Updates for one world go through that world's `DashMap` shard lock, so they
//! are serialized per world. Every slot also remembers the timestamp of the
//! last event applied to it; older events are dropped, which makes the most
//! recent event win regardless of delivery order.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use buildsys_domain::WorldName;

/// A world with zero occupants and the instant it became empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdleEntry {
    pub world: WorldName,
    pub since: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OccupancyState {
    Occupied,
    Idle { since: DateTime<Utc> },
    /// Claimed by a sweep; the unload is in flight.
    Evicting { since: DateTime<Utc> },
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    state: OccupancyState,
    observed_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct IdleWorldTracker {
    slots: DashMap<WorldName, Slot>,
}

impl IdleWorldTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The world's last occupant left at `at`.
    ///
    /// Returns `false` if the event is older than one already applied.
    pub fn mark_empty(&self, world: &WorldName, at: DateTime<Utc>) -> bool {
        self.apply(world, at, OccupancyState::Idle { since: at })
    }

    /// Someone entered the world at `at`.
    ///
    /// Returns `false` if the event is older than one already applied.
    pub fn mark_occupied(&self, world: &WorldName, at: DateTime<Utc>) -> bool {
        self.apply(world, at, OccupancyState::Occupied)
    }

    fn apply(&self, world: &WorldName, at: DateTime<Utc>, state: OccupancyState) -> bool {
        match self.slots.entry(world.clone()) {
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                if at < slot.observed_at {
                    tracing::debug!(
                        world = %world,
                        event_at = %at,
                        last_applied_at = %slot.observed_at,
                        "Dropping stale occupancy event"
                    );
                    return false;
                }
                slot.state = state;
                slot.observed_at = at;
                true
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Slot {
                    state,
                    observed_at: at,
                });
                true
            }
        }
    }

    /// When the world became empty, if it is currently idle.
    pub fn idle_since(&self, world: &WorldName) -> Option<DateTime<Utc>> {
        self.slots.get(world).and_then(|slot| match slot.state {
            OccupancyState::Idle { since } => Some(since),
            _ => None,
        })
    }

    pub fn is_idle(&self, world: &WorldName) -> bool {
        self.idle_since(world).is_some()
    }

    /// Copy of every idle entry at this moment.
    pub fn snapshot(&self) -> Vec<IdleEntry> {
        self.slots
            .iter()
            .filter_map(|slot| match slot.state {
                OccupancyState::Idle { since } => Some(IdleEntry {
                    world: slot.key().clone(),
                    since,
                }),
                _ => None,
            })
            .collect()
    }

    /// Number of idle worlds.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot.state, OccupancyState::Idle { .. }))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take the entry for eviction if it is still idle since the same instant.
    ///
    /// Fails if an occupant arrived (or the world emptied again) after the
    /// snapshot was taken.
    pub fn claim(&self, entry: &IdleEntry) -> bool {
        match self.slots.get_mut(&entry.world) {
            Some(mut slot) if slot.state == (OccupancyState::Idle { since: entry.since }) => {
                slot.state = OccupancyState::Evicting { since: entry.since };
                true
            }
            _ => false,
        }
    }

    /// Drop a claimed entry once its world has been unloaded.
    pub fn complete(&self, entry: &IdleEntry) {
        self.slots.remove_if(&entry.world, |_, slot| {
            slot.state == (OccupancyState::Evicting { since: entry.since })
        });
    }

    /// Put a claimed entry back after a failed unload.
    ///
    /// Does nothing if a newer occupancy event replaced the claim.
    pub fn restore(&self, entry: &IdleEntry) -> bool {
        match self.slots.get_mut(&entry.world) {
            Some(mut slot) if slot.state == (OccupancyState::Evicting { since: entry.since }) => {
                slot.state = OccupancyState::Idle { since: entry.since };
                true
            }
            _ => false,
        }
    }

    /// Stop tracking a world entirely (it was deleted).
    pub fn forget(&self, world: &WorldName) -> bool {
        self.slots.remove(world).is_some()
    }
}
