//! Connection registry for the relay server
//!
//! This module tracks every live connection and its room association:
//! - Player identity assignment (stable for the connection lifetime)
//! - Outbound send queues for best-effort, non-blocking delivery
//! - The player-to-room side mapping used by the message router
//!
//! Domain state is never attached to transport objects; the registry is
//! the single place that knows which room a connection belongs to.

use log::{debug, info};
use rand::Rng;
use shared::ServerMessage;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Outbound queue handle for one connection. The connection's writer task
/// drains this queue and encodes each message onto the socket.
pub type OutboundSender = mpsc::UnboundedSender<ServerMessage>;

const PLAYER_ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const PLAYER_ID_LEN: usize = 13;

/// Generates an opaque player id: 13 characters drawn from `[a-z0-9]`.
///
/// Ids are created by the transport layer when a connection is accepted
/// and remain stable until the connection closes.
pub fn generate_player_id() -> String {
    let mut rng = rand::thread_rng();
    (0..PLAYER_ID_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..PLAYER_ID_CHARSET.len());
            PLAYER_ID_CHARSET[idx] as char
        })
        .collect()
}

/// A registered connection and its current room association.
#[derive(Debug)]
struct Connection {
    sender: OutboundSender,
    room_code: Option<String>,
}

/// Tracks all live connections indexed by player id.
///
/// The registry owns the send primitive: every outbound message goes
/// through [`ConnectionRegistry::send`], which never blocks. Backpressure
/// and socket errors are the transport's concern; a closed queue here only
/// means the connection is already on its way out.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<String, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
        }
    }

    /// Registers a new connection under the given player id.
    pub fn register(&mut self, player_id: String, sender: OutboundSender) {
        info!("Player {} connected", player_id);
        self.connections.insert(
            player_id,
            Connection {
                sender,
                room_code: None,
            },
        );
    }

    /// Removes a connection. Returns true if it was present.
    pub fn unregister(&mut self, player_id: &str) -> bool {
        if self.connections.remove(player_id).is_some() {
            info!("Player {} disconnected", player_id);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.connections.contains_key(player_id)
    }

    /// Returns the code of the room the player currently belongs to.
    pub fn room_of(&self, player_id: &str) -> Option<&str> {
        self.connections
            .get(player_id)?
            .room_code
            .as_deref()
    }

    /// Associates the player with a room. A player belongs to at most one
    /// room at a time; any previous association is replaced.
    pub fn attach_room(&mut self, player_id: &str, room_code: &str) {
        if let Some(conn) = self.connections.get_mut(player_id) {
            conn.room_code = Some(room_code.to_owned());
        }
    }

    /// Clears the player's room association.
    pub fn detach_room(&mut self, player_id: &str) {
        if let Some(conn) = self.connections.get_mut(player_id) {
            conn.room_code = None;
        }
    }

    /// Queues a message for one player. Best-effort: unknown recipients and
    /// closed queues are dropped with a local diagnostic.
    pub fn send(&self, player_id: &str, message: ServerMessage) {
        match self.connections.get(player_id) {
            Some(conn) => {
                if conn.sender.send(message).is_err() {
                    debug!("Send queue for player {} is closed, dropping", player_id);
                }
            }
            None => debug!("No connection for player {}, dropping", player_id),
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
