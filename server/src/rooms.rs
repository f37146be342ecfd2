//! Room entities and the process-wide room store.

use log::info;
use rand::Rng;
use shared::{GameSettings, PlayerInfo};
use std::collections::{HashMap, HashSet};

pub const ROOM_CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const ROOM_CODE_LEN: usize = 6;

// The code space holds 36^6 rooms; collisions are retried a bounded number
// of times so allocation always terminates.
const MAX_CODE_ATTEMPTS: usize = 10_000;

/// A lobby/match container identified by a short generated code.
///
/// Members keep their insertion order: join order decides the `Player N`
/// display name and the host-migration tie-break.
#[derive(Debug, Clone)]
pub struct Room {
    pub code: String,
    pub host_id: String,
    pub members: Vec<PlayerInfo>,
    pub game_started: bool,
    pub alive_ids: HashSet<String>,
    pub settings: GameSettings,
}

impl Room {
    fn new(code: String, host_id: &str) -> Self {
        let mut room = Self {
            code,
            host_id: host_id.to_owned(),
            members: Vec::new(),
            game_started: false,
            alive_ids: HashSet::new(),
            settings: GameSettings::default(),
        };
        room.add_member(host_id);
        room
    }

    /// Appends a new member named `Player N` (N = 1-based join position).
    /// Duplicate ids are rejected so the member list never repeats a player.
    pub fn add_member(&mut self, player_id: &str) -> bool {
        if self.contains(player_id) {
            return false;
        }
        self.members.push(PlayerInfo {
            id: player_id.to_owned(),
            name: format!("Player {}", self.members.len() + 1),
            ready: false,
            alive: true,
        });
        true
    }

    /// Removes a member and drops them from the alive set. Returns true if
    /// the player was present.
    pub fn remove_member(&mut self, player_id: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|p| p.id != player_id);
        self.alive_ids.remove(player_id);
        self.members.len() != before
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.members.iter().any(|p| p.id == player_id)
    }

    pub fn member_mut(&mut self, player_id: &str) -> Option<&mut PlayerInfo> {
        self.members.iter_mut().find(|p| p.id == player_id)
    }

    pub fn member_ids(&self) -> Vec<String> {
        self.members.iter().map(|p| p.id.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn all_ready(&self) -> bool {
        self.members.iter().all(|p| p.ready)
    }

    /// Transition into an active match: every current member is alive and
    /// no longer ready.
    pub fn begin_match(&mut self) {
        self.game_started = true;
        self.alive_ids = self.members.iter().map(|p| p.id.clone()).collect();
        for member in &mut self.members {
            member.alive = true;
            member.ready = false;
        }
    }

    /// Transition back to the lobby after a concluded match.
    pub fn reset_to_lobby(&mut self) {
        self.game_started = false;
        self.alive_ids.clear();
        for member in &mut self.members {
            member.ready = false;
            member.alive = true;
        }
    }

    /// Marks a member defeated and removes them from the alive set.
    /// Returns true if the player was a member.
    pub fn mark_defeated(&mut self, player_id: &str) -> bool {
        self.alive_ids.remove(player_id);
        match self.member_mut(player_id) {
            Some(member) => {
                member.alive = false;
                true
            }
            None => false,
        }
    }
}

/// Process-wide mapping from room code to room.
///
/// Initialized empty at startup; entries are inserted and removed only
/// through these operations, so a live code is always unique.
#[derive(Debug, Default)]
pub struct RoomStore {
    rooms: HashMap<String, Room>,
}

impl RoomStore {
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
        }
    }

    /// Creates a room with `host_id` as sole member and host, returning the
    /// generated code. Returns None only if the code space is exhausted.
    pub fn create(&mut self, host_id: &str) -> Option<String> {
        let code = self.generate_unique_code()?;
        info!("Room created: {}", code);
        self.rooms.insert(code.clone(), Room::new(code.clone(), host_id));
        Some(code)
    }

    pub fn get(&self, code: &str) -> Option<&Room> {
        self.rooms.get(code)
    }

    pub fn get_mut(&mut self, code: &str) -> Option<&mut Room> {
        self.rooms.get_mut(code)
    }

    /// Deletes a room; idempotent.
    pub fn remove(&mut self, code: &str) {
        if self.rooms.remove(code).is_some() {
            info!("Room deleted: {}", code);
        }
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    fn generate_unique_code(&self) -> Option<String> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_room_code();
            if !self.rooms.contains_key(&code) {
                return Some(code);
            }
        }
        None
    }
}

/// Samples 6 characters uniformly from `[A-Z0-9]`.
fn generate_room_code() -> String {
    let mut rng = rand::thread_rng();
    (0..ROOM_CODE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..ROOM_CODE_CHARSET.len());
            ROOM_CODE_CHARSET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_room_code_shape() {
        let code = generate_room_code();
        assert_eq!(code.len(), ROOM_CODE_LEN);
        assert!(code.bytes().all(|b| ROOM_CODE_CHARSET.contains(&b)));
    }

    #[test]
    fn test_live_room_codes_are_unique() {
        let mut store = RoomStore::new();
        let mut codes = HashSet::new();

        for i in 0..500 {
            let code = store.create(&format!("host{}", i)).unwrap();
            assert!(codes.insert(code), "duplicate room code handed out");
        }
        assert_eq!(store.len(), 500);
    }

    #[test]
    fn test_new_room_has_host_as_sole_member() {
        let mut store = RoomStore::new();
        let code = store.create("host").unwrap();
        let room = store.get(&code).unwrap();

        assert_eq!(room.host_id, "host");
        assert_eq!(room.members.len(), 1);
        assert_eq!(room.members[0].name, "Player 1");
        assert!(!room.members[0].ready);
        assert!(room.members[0].alive);
        assert!(!room.game_started);
        assert_eq!(room.settings, GameSettings::default());
    }

    #[test]
    fn test_members_are_named_by_join_order() {
        let mut room = Room::new("AAAAAA".to_string(), "p1");
        room.add_member("p2");
        room.add_member("p3");

        let names: Vec<&str> = room.members.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Player 1", "Player 2", "Player 3"]);
    }

    #[test]
    fn test_duplicate_member_is_rejected() {
        let mut room = Room::new("AAAAAA".to_string(), "p1");
        assert!(room.add_member("p2"));
        assert!(!room.add_member("p2"));
        assert_eq!(room.members.len(), 2);
    }

    #[test]
    fn test_begin_match_resets_flags_and_fills_alive_set() {
        let mut room = Room::new("AAAAAA".to_string(), "p1");
        room.add_member("p2");
        room.member_mut("p1").unwrap().ready = true;
        room.member_mut("p2").unwrap().ready = true;

        room.begin_match();

        assert!(room.game_started);
        assert_eq!(room.alive_ids.len(), 2);
        assert!(room.alive_ids.contains("p1"));
        assert!(room.members.iter().all(|p| p.alive && !p.ready));
    }

    #[test]
    fn test_remove_member_clears_alive_entry() {
        let mut room = Room::new("AAAAAA".to_string(), "p1");
        room.add_member("p2");
        room.begin_match();

        assert!(room.remove_member("p2"));
        assert_eq!(room.members.len(), 1);
        assert!(!room.alive_ids.contains("p2"));

        assert!(!room.remove_member("p2"));
    }

    #[test]
    fn test_mark_defeated() {
        let mut room = Room::new("AAAAAA".to_string(), "p1");
        room.add_member("p2");
        room.begin_match();

        assert!(room.mark_defeated("p2"));
        assert!(!room.alive_ids.contains("p2"));
        assert!(!room.member_mut("p2").unwrap().alive);

        assert!(!room.mark_defeated("ghost"));
    }

    #[test]
    fn test_reset_to_lobby() {
        let mut room = Room::new("AAAAAA".to_string(), "p1");
        room.add_member("p2");
        room.begin_match();
        room.mark_defeated("p2");

        room.reset_to_lobby();

        assert!(!room.game_started);
        assert!(room.alive_ids.is_empty());
        assert!(room.members.iter().all(|p| p.alive && !p.ready));
    }

    #[test]
    fn test_all_ready() {
        let mut room = Room::new("AAAAAA".to_string(), "p1");
        room.add_member("p2");
        assert!(!room.all_ready());

        room.member_mut("p1").unwrap().ready = true;
        assert!(!room.all_ready());

        room.member_mut("p2").unwrap().ready = true;
        assert!(room.all_ready());
    }

    #[test]
    fn test_room_removal_is_idempotent() {
        let mut store = RoomStore::new();
        let code = store.create("host").unwrap();

        store.remove(&code);
        assert!(store.get(&code).is_none());
        store.remove(&code);
        assert!(store.is_empty());
    }
}
