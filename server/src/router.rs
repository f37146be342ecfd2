//! Message routing and the per-room lifecycle state machine
//!
//! This module is the heart of the relay: it owns the room store and the
//! connection registry, dispatches every inbound message to exactly one
//! room operation, and fans out the resulting state to the affected
//! players. All events are handled to completion, one at a time, by a
//! single engine task, so no room is ever mutated concurrently.
//!
//! The one piece of deferred work is the post-match reset: three seconds
//! after `game_end` the room returns to the lobby. The reset re-enters the
//! engine as an event keyed by room code and re-fetches the room, so a
//! room that emptied in the meantime is simply skipped.

use log::{debug, error, info};
use rand::seq::SliceRandom;
use serde_json::Value;
use shared::{ClientMessage, ServerMessage, SettingsPatch, MIN_PLAYERS_TO_START};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::registry::{ConnectionRegistry, OutboundSender};
use crate::rooms::{Room, RoomStore};

/// Delay between `game_end` and the room returning to the lobby.
pub const GAME_RESET_DELAY: Duration = Duration::from_secs(3);

/// Join failures that are reported back to the requester. The display
/// strings are the wire `error.message` texts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("Room not found")]
    RoomNotFound,
    #[error("Game already started")]
    GameAlreadyStarted,
}

/// Events from the transport tasks to the engine task.
#[derive(Debug)]
pub enum EngineEvent {
    Connected {
        player_id: String,
        sender: OutboundSender,
    },
    Disconnected {
        player_id: String,
    },
    Inbound {
        player_id: String,
        message: ClientMessage,
    },
    /// Deferred post-match reset, keyed by room code.
    ResetRoom {
        code: String,
    },
}

/// Dispatches inbound messages to room operations and routes the results.
pub struct Router {
    rooms: RoomStore,
    registry: ConnectionRegistry,
    events: mpsc::UnboundedSender<EngineEvent>,
    reset_delay: Duration,
}

impl Router {
    /// Creates a router that schedules deferred resets through `events`.
    pub fn new(events: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self::with_reset_delay(events, GAME_RESET_DELAY)
    }

    /// Same as [`Router::new`] with an injectable reset delay.
    pub fn with_reset_delay(
        events: mpsc::UnboundedSender<EngineEvent>,
        reset_delay: Duration,
    ) -> Self {
        Self {
            rooms: RoomStore::new(),
            registry: ConnectionRegistry::new(),
            events,
            reset_delay,
        }
    }

    pub fn rooms(&self) -> &RoomStore {
        &self.rooms
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Consumes engine events until every transport handle is dropped.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<EngineEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event);
        }
    }

    /// Handles one event to completion.
    pub fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Connected { player_id, sender } => {
                self.registry.register(player_id, sender);
            }
            EngineEvent::Disconnected { player_id } => {
                // Indistinguishable from an explicit leave.
                self.leave_room(&player_id);
                self.registry.unregister(&player_id);
            }
            EngineEvent::Inbound { player_id, message } => {
                self.dispatch(&player_id, message);
            }
            EngineEvent::ResetRoom { code } => {
                self.reset_room(&code);
            }
        }
    }

    fn dispatch(&mut self, player_id: &str, message: ClientMessage) {
        match message {
            ClientMessage::CreateRoom => self.create_room(player_id),
            ClientMessage::JoinRoom { room_code } => self.join_room(player_id, &room_code),
            ClientMessage::LeaveRoom => self.leave_room(player_id),
            ClientMessage::ToggleReady => self.toggle_ready(player_id),
            ClientMessage::UpdateSettings { settings } => {
                self.update_settings(player_id, settings)
            }
            ClientMessage::GameUpdate { game_state } => {
                self.relay_game_update(player_id, game_state)
            }
            ClientMessage::SendGarbage {
                amount,
                colors,
                positions,
            } => self.relay_garbage(player_id, amount, colors, positions),
            ClientMessage::GameOver => self.handle_game_over(player_id),
        }
    }

    fn create_room(&mut self, player_id: &str) {
        // A player belongs to at most one room at a time.
        if self.registry.room_of(player_id).is_some() {
            self.leave_room(player_id);
        }

        let code = match self.rooms.create(player_id) {
            Some(code) => code,
            None => {
                error!("Room code space exhausted, cannot create room for {}", player_id);
                self.registry.send(
                    player_id,
                    ServerMessage::Error {
                        message: "Could not create room".to_string(),
                    },
                );
                return;
            }
        };

        self.registry.attach_room(player_id, &code);
        self.registry.send(
            player_id,
            ServerMessage::RoomCreated {
                room_code: code.clone(),
                player_id: player_id.to_owned(),
            },
        );
        self.broadcast_room_state(&code);
    }

    fn join_room(&mut self, player_id: &str, room_code: &str) {
        // Validate the target before touching any existing membership, so
        // a failed join mutates nothing.
        match self.rooms.get(room_code) {
            None => {
                self.send_error(player_id, RelayError::RoomNotFound);
                return;
            }
            Some(room) if room.game_started => {
                self.send_error(player_id, RelayError::GameAlreadyStarted);
                return;
            }
            Some(room) if room.contains(player_id) => return,
            Some(_) => {}
        }

        if self.registry.room_of(player_id).is_some() {
            self.leave_room(player_id);
        }

        let Some(room) = self.rooms.get_mut(room_code) else {
            return;
        };
        room.add_member(player_id);
        let member_count = room.members.len();

        self.registry.attach_room(player_id, room_code);
        self.registry.send(
            player_id,
            ServerMessage::RoomJoined {
                room_code: room_code.to_owned(),
                player_id: player_id.to_owned(),
            },
        );
        self.broadcast_room_state(room_code);
        info!(
            "Player {} joined room {} (total: {})",
            player_id, room_code, member_count
        );
    }

    fn leave_room(&mut self, player_id: &str) {
        let Some(code) = self.registry.room_of(player_id).map(str::to_owned) else {
            return;
        };
        self.registry.detach_room(player_id);

        let Some(room) = self.rooms.get_mut(&code) else {
            return;
        };
        if !room.remove_member(player_id) {
            return;
        }
        info!("Player {} left room {}", player_id, code);

        if room.is_empty() {
            self.rooms.remove(&code);
            return;
        }

        if room.host_id == player_id {
            // Host migration: the oldest remaining member takes over.
            let new_host = room.members[0].id.clone();
            room.host_id = new_host.clone();
            info!("Player {} is now host of room {}", new_host, code);
            self.registry.send(&new_host, ServerMessage::YouAreHost);
        }

        let match_in_progress = room.game_started;
        self.broadcast_room_state(&code);
        if match_in_progress {
            // The departure may leave zero or one alive players.
            self.check_game_end(&code);
        }
    }

    fn toggle_ready(&mut self, player_id: &str) {
        let Some(code) = self.registry.room_of(player_id).map(str::to_owned) else {
            return;
        };
        let Some(room) = self.rooms.get_mut(&code) else {
            return;
        };
        if room.game_started {
            return;
        }
        let Some(member) = room.member_mut(player_id) else {
            return;
        };
        member.ready = !member.ready;

        let should_start = room.members.len() >= MIN_PLAYERS_TO_START && room.all_ready();
        self.broadcast_room_state(&code);
        if should_start {
            self.start_match(&code);
        }
    }

    fn start_match(&mut self, code: &str) {
        let Some(room) = self.rooms.get_mut(code) else {
            return;
        };
        room.begin_match();
        info!(
            "Game started in room {} with {} players",
            code,
            room.members.len()
        );

        let message = ServerMessage::GameStart {
            players: room.members.clone(),
            settings: room.settings,
        };
        for id in room.member_ids() {
            self.registry.send(&id, message.clone());
        }
    }

    fn update_settings(&mut self, player_id: &str, patch: SettingsPatch) {
        let Some(code) = self.registry.room_of(player_id).map(str::to_owned) else {
            return;
        };
        let Some(room) = self.rooms.get_mut(&code) else {
            return;
        };
        if room.host_id != player_id {
            debug!("Ignoring settings update from non-host {}", player_id);
            return;
        }

        patch.merge_into(&mut room.settings);
        self.broadcast_room_state(&code);
    }

    /// Relays an opaque game-state payload to every other room member.
    /// Fire-and-forget; room state is not touched.
    fn relay_game_update(&self, player_id: &str, game_state: Value) {
        let Some(code) = self.registry.room_of(player_id) else {
            return;
        };
        let Some(room) = self.rooms.get(code) else {
            return;
        };
        let message = ServerMessage::OpponentUpdate {
            player_id: player_id.to_owned(),
            data: game_state,
        };
        self.targeted_send(room, player_id, message);
    }

    /// Picks one alive opponent uniformly at random and relays the attack
    /// payload verbatim. No opponents alive means the attack is dropped.
    fn relay_garbage(&self, player_id: &str, amount: Value, colors: Value, positions: Value) {
        let Some(code) = self.registry.room_of(player_id) else {
            return;
        };
        let Some(room) = self.rooms.get(code) else {
            return;
        };

        let candidates: Vec<&String> = room
            .alive_ids
            .iter()
            .filter(|id| id.as_str() != player_id)
            .collect();
        let Some(target) = candidates.choose(&mut rand::thread_rng()) else {
            debug!(
                "Player {} sent garbage with no alive opponents in room {}",
                player_id, code
            );
            return;
        };

        self.registry.send(
            target.as_str(),
            ServerMessage::ReceiveGarbage {
                from_player_id: player_id.to_owned(),
                amount,
                colors,
                source_positions: positions,
            },
        );
    }

    fn handle_game_over(&mut self, player_id: &str) {
        let Some(code) = self.registry.room_of(player_id).map(str::to_owned) else {
            return;
        };
        let Some(room) = self.rooms.get_mut(&code) else {
            return;
        };
        // A defeat outside an active match is meaningless.
        if !room.game_started {
            return;
        }
        if !room.mark_defeated(player_id) {
            return;
        }
        info!("Player {} defeated in room {}", player_id, code);

        let message = ServerMessage::PlayerDefeated {
            player_id: player_id.to_owned(),
        };
        for id in room.member_ids() {
            self.registry.send(&id, message.clone());
        }

        self.check_game_end(&code);
    }

    /// Match-end evaluation. One alive player is the winner; zero is a
    /// draw; two or more means the match continues.
    fn check_game_end(&self, code: &str) {
        let Some(room) = self.rooms.get(code) else {
            return;
        };
        if !room.game_started || room.alive_ids.len() >= 2 {
            return;
        }

        let winner = room.alive_ids.iter().next().cloned();
        match &winner {
            Some(id) => info!("Game over in room {}: {} wins", code, id),
            None => info!("Game over in room {}: draw", code),
        }

        for member in &room.members {
            let is_winner = winner.as_deref() == Some(member.id.as_str());
            self.registry.send(
                &member.id,
                ServerMessage::GameEnd {
                    winner_id: winner.clone(),
                    is_winner,
                },
            );
        }

        self.schedule_reset(code);
    }

    fn schedule_reset(&self, code: &str) {
        let events = self.events.clone();
        let code = code.to_owned();
        let delay = self.reset_delay;
        tokio::spawn(async move {
            sleep(delay).await;
            // The handler re-fetches the room by code; a room that emptied
            // in the meantime makes this a no-op.
            let _ = events.send(EngineEvent::ResetRoom { code });
        });
    }

    fn reset_room(&mut self, code: &str) {
        let Some(room) = self.rooms.get_mut(code) else {
            debug!("Room {} already gone, skipping reset", code);
            return;
        };
        room.reset_to_lobby();
        info!("Room {} reset to lobby", code);
        self.broadcast_room_state(code);
    }

    /// Serializes the room state once per recipient queue and sends it to
    /// every current member.
    fn broadcast_room_state(&self, code: &str) {
        let Some(room) = self.rooms.get(code) else {
            return;
        };
        let message = ServerMessage::RoomState {
            players: room.members.clone(),
            host_id: room.host_id.clone(),
            game_started: room.game_started,
            settings: room.settings,
        };
        for member in &room.members {
            self.registry.send(&member.id, message.clone());
        }
    }

    fn targeted_send(&self, room: &Room, exclude_id: &str, message: ServerMessage) {
        for member in &room.members {
            if member.id != exclude_id {
                self.registry.send(&member.id, message.clone());
            }
        }
    }

    fn send_error(&self, player_id: &str, error: RelayError) {
        debug!("Rejecting request from {}: {}", player_id, error);
        self.registry.send(
            player_id,
            ServerMessage::Error {
                message: error.to_string(),
            },
        );
    }
}
