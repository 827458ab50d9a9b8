use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::registry::{EvictionTicket, RoomRegistry};
use super::transport::{ChannelTransport, Transport};

/// Rooms plus the transport that reaches their members.
///
/// Always used behind a single mutex: one inbound message, teardown or
/// eviction ticket is processed to completion before the next one starts,
/// so room mutations and the broadcasts they trigger are totally ordered.
#[derive(Debug)]
pub struct Hub<T: Transport = ChannelTransport> {
    pub registry: RoomRegistry,
    pub transport: T,
}

pub type SharedHub<T = ChannelTransport> = Arc<Mutex<Hub<T>>>;

impl<T: Transport> Hub<T> {
    pub fn new(registry: RoomRegistry, transport: T) -> Self {
        Self { registry, transport }
    }
}

impl<T: Transport + Send + 'static> Hub<T> {
    /// Build a shared hub and spawn the reaper that applies eviction tickets.
    pub fn start(transport: T, grace_period: Duration) -> SharedHub<T> {
        let (reaper_tx, reaper_rx) = mpsc::unbounded_channel();
        let registry = RoomRegistry::with_grace_period(reaper_tx, grace_period);
        let hub = Arc::new(Mutex::new(Hub::new(registry, transport)));
        tokio::spawn(run_reaper(Arc::downgrade(&hub), reaper_rx));
        info!("Room hub started (eviction grace period {:?})", grace_period);
        hub
    }
}

async fn run_reaper<T: Transport + Send>(hub: Weak<Mutex<Hub<T>>>, mut tickets: UnboundedReceiver<EvictionTicket>) {
    while let Some(ticket) = tickets.recv().await {
        let Some(hub) = hub.upgrade() else {
            break;
        };
        hub.lock().await.registry.evict_if_idle(&ticket);
    }
    debug!("Eviction reaper stopped");
}
