use std::collections::HashMap;
use indexmap::IndexSet;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::models::SendMessage;
use super::room::ConnectionId;

/// What the protocol needs from the underlying messaging layer.
pub trait Transport {
    /// Subscribe a connection to the broadcast group of a room.
    fn join_room(&mut self, room_id: &str, conn_id: &str);

    /// Unsubscribe a connection from the broadcast group of a room.
    fn leave_room(&mut self, room_id: &str, conn_id: &str);

    /// Deliver a message to a single connection.
    fn send_to(&self, conn_id: &str, msg: &SendMessage);

    /// Deliver a message to every member of the room's group, optionally
    /// skipping one connection (the sender).
    fn broadcast_to_room_except(&self, room_id: &str, except: Option<&str>, msg: &SendMessage);
}

/// In-process transport: one unbounded queue per connection, drained by the
/// connection's writer task.
#[derive(Debug, Default)]
pub struct ChannelTransport {
    connections: HashMap<ConnectionId, UnboundedSender<SendMessage>>,
    groups: HashMap<String, IndexSet<ConnectionId>>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and get the receiving end of its outbound queue.
    pub fn connect(&mut self, conn_id: &str) -> UnboundedReceiver<SendMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.insert(conn_id.to_string(), tx);
        rx
    }

    /// Forget a connection. Its queue closes once the sender is dropped.
    pub fn disconnect(&mut self, conn_id: &str) {
        self.connections.remove(conn_id);
        self.groups.retain(|_, members| {
            members.shift_remove(conn_id);
            !members.is_empty()
        });
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn group_size(&self, room_id: &str) -> usize {
        self.groups.get(room_id).map_or(0, IndexSet::len)
    }
}

impl Transport for ChannelTransport {
    fn join_room(&mut self, room_id: &str, conn_id: &str) {
        self.groups
            .entry(room_id.to_string())
            .or_default()
            .insert(conn_id.to_string());
    }

    fn leave_room(&mut self, room_id: &str, conn_id: &str) {
        if let Some(members) = self.groups.get_mut(room_id) {
            members.shift_remove(conn_id);
            if members.is_empty() {
                self.groups.remove(room_id);
            }
        }
    }

    fn send_to(&self, conn_id: &str, msg: &SendMessage) {
        match self.connections.get(conn_id) {
            Some(tx) => {
                if tx.send(msg.clone()).is_err() {
                    debug!("Connection {} outbound queue closed", conn_id);
                }
            }
            None => debug!("Dropping message for unknown connection {}", conn_id),
        }
    }

    fn broadcast_to_room_except(&self, room_id: &str, except: Option<&str>, msg: &SendMessage) {
        let Some(members) = self.groups.get(room_id) else {
            return;
        };
        for member in members {
            if Some(member.as_str()) == except {
                continue;
            }
            self.send_to(member, msg);
        }
    }
}
