use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::AbortHandle;
use tracing::{debug, info};

use super::room::Room;

/// How long a room must stay empty before it is dropped.
pub const EVICTION_GRACE_PERIOD: Duration = Duration::from_secs(60 * 60);

/// Delivered to the reaper when an eviction timer fires.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvictionTicket {
    pub room_id: String,
    pub generation: u64,
}

#[derive(Debug)]
struct PendingEviction {
    generation: u64,
    handle: AbortHandle,
}

/// Owns every live room.
///
/// Rooms are created lazily on first join and dropped only through an
/// eviction ticket, and only while they have no participants. At most one
/// eviction timer is pending per room id; scheduling again or rejoining the
/// room invalidates the previous one.
#[derive(Debug)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
    pending: HashMap<String, PendingEviction>,
    next_generation: u64,
    grace_period: Duration,
    reaper: UnboundedSender<EvictionTicket>,
}

impl RoomRegistry {
    pub fn new(reaper: UnboundedSender<EvictionTicket>) -> Self {
        Self::with_grace_period(reaper, EVICTION_GRACE_PERIOD)
    }

    pub fn with_grace_period(reaper: UnboundedSender<EvictionTicket>, grace_period: Duration) -> Self {
        Self {
            rooms: HashMap::new(),
            pending: HashMap::new(),
            next_generation: 0,
            grace_period,
            reaper,
        }
    }

    /// Get the room, creating and seeding it if the id is unknown.
    /// Any pending eviction for the id is cancelled.
    pub fn get_or_create(&mut self, room_id: &str) -> &mut Room {
        self.cancel_eviction(room_id);
        self.rooms.entry(room_id.to_string()).or_insert_with(|| {
            info!("Room {} created", room_id);
            Room::new(room_id)
        })
    }

    pub fn get(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn get_mut(&mut self, room_id: &str) -> Option<&mut Room> {
        self.rooms.get_mut(room_id)
    }

    pub fn contains(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Total number of attached connections across all rooms.
    pub fn connection_count(&self) -> usize {
        self.rooms.values().map(Room::participant_count).sum()
    }

    pub fn pending_eviction_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_eviction_pending(&self, room_id: &str) -> bool {
        self.pending.contains_key(room_id)
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Arm a one-shot eviction check for the room, replacing any earlier one.
    pub fn schedule_eviction(&mut self, room_id: &str) {
        self.cancel_eviction(room_id);

        self.next_generation += 1;
        let generation = self.next_generation;
        let ticket = EvictionTicket {
            room_id: room_id.to_string(),
            generation,
        };
        let reaper = self.reaper.clone();
        let delay = self.grace_period;
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if reaper.send(ticket).is_err() {
                debug!("Eviction reaper gone, dropping ticket");
            }
        });

        self.pending.insert(
            room_id.to_string(),
            PendingEviction {
                generation,
                handle: task.abort_handle(),
            },
        );
        debug!("Eviction of room {} scheduled in {:?} (generation {})", room_id, delay, generation);
    }

    /// Drop the pending eviction timer for the room, if any.
    pub fn cancel_eviction(&mut self, room_id: &str) {
        if let Some(pending) = self.pending.remove(room_id) {
            pending.handle.abort();
            debug!("Eviction of room {} cancelled (generation {})", room_id, pending.generation);
        }
    }

    /// Apply a fired eviction ticket. Returns true if the room was removed.
    ///
    /// A ticket only counts if it is still the pending one for its room, and
    /// the room is only removed if it is empty right now.
    pub fn evict_if_idle(&mut self, ticket: &EvictionTicket) -> bool {
        match self.pending.get(&ticket.room_id) {
            Some(pending) if pending.generation == ticket.generation => {
                self.pending.remove(&ticket.room_id);
            }
            _ => {
                debug!("Stale eviction ticket for room {} (generation {})", ticket.room_id, ticket.generation);
                return false;
            }
        }

        match self.rooms.get(&ticket.room_id) {
            Some(room) if room.is_empty() => {
                self.rooms.remove(&ticket.room_id);
                info!("Room {} deleted (empty)", ticket.room_id);
                true
            }
            Some(room) => {
                debug!("Room {} repopulated ({} participants), keeping it", ticket.room_id, room.participant_count());
                false
            }
            None => false,
        }
    }
}

impl Drop for RoomRegistry {
    fn drop(&mut self) {
        for pending in self.pending.values() {
            pending.handle.abort();
        }
    }
}
