use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Minimum number of room members required before a match can start.
pub const MIN_PLAYERS_TO_START: usize = 2;

/// Per-room match settings, chosen by the host and sent to every player
/// in `game_start`. All fields use the wire's camelCase names.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameSettings {
    /// Multiplier applied by clients to incoming garbage rows.
    pub garbage_rate: f64,
    /// Gravity interval in milliseconds.
    pub drop_speed: u64,
    /// Seconds a stack may sit above the kill line before defeat.
    pub defeat_time: u64,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            garbage_rate: 1.0,
            drop_speed: 500,
            defeat_time: 10,
        }
    }
}

/// Partial settings update from the host. Absent fields keep their
/// previous value.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub garbage_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drop_speed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defeat_time: Option<u64>,
}

impl SettingsPatch {
    /// Merges the present fields into `settings`, field by field.
    pub fn merge_into(&self, settings: &mut GameSettings) {
        if let Some(garbage_rate) = self.garbage_rate {
            settings.garbage_rate = garbage_rate;
        }
        if let Some(drop_speed) = self.drop_speed {
            settings.drop_speed = drop_speed;
        }
        if let Some(defeat_time) = self.defeat_time {
            settings.defeat_time = defeat_time;
        }
    }
}

/// Public view of a room member, broadcast in `room_state` and `game_start`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerInfo {
    pub id: String,
    pub name: String,
    pub ready: bool,
    pub alive: bool,
}

// Messages from client to server
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    CreateRoom,
    JoinRoom {
        room_code: String,
    },
    LeaveRoom,
    ToggleReady,
    UpdateSettings {
        settings: SettingsPatch,
    },
    GameUpdate {
        game_state: Value,
    },
    /// Attack payload relayed verbatim to one alive opponent. Amount,
    /// colors, and positions are opaque to the server.
    SendGarbage {
        #[serde(default)]
        amount: Value,
        #[serde(default)]
        colors: Value,
        #[serde(default)]
        positions: Value,
    },
    GameOver,
}

// Messages from server to client
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    RoomCreated {
        room_code: String,
        player_id: String,
    },
    RoomJoined {
        room_code: String,
        player_id: String,
    },
    Error {
        message: String,
    },
    RoomState {
        players: Vec<PlayerInfo>,
        host_id: String,
        game_started: bool,
        settings: GameSettings,
    },
    YouAreHost,
    GameStart {
        players: Vec<PlayerInfo>,
        settings: GameSettings,
    },
    OpponentUpdate {
        player_id: String,
        data: Value,
    },
    ReceiveGarbage {
        from_player_id: String,
        amount: Value,
        colors: Value,
        source_positions: Value,
    },
    PlayerDefeated {
        player_id: String,
    },
    /// End of match. `winner_id` is null when everyone was defeated
    /// simultaneously.
    GameEnd {
        winner_id: Option<String>,
        is_winner: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_settings() {
        let settings = GameSettings::default();
        assert_eq!(settings.garbage_rate, 1.0);
        assert_eq!(settings.drop_speed, 500);
        assert_eq!(settings.defeat_time, 10);
    }

    #[test]
    fn test_settings_patch_merges_present_fields_only() {
        let mut settings = GameSettings::default();
        let patch = SettingsPatch {
            drop_speed: Some(250),
            ..Default::default()
        };

        patch.merge_into(&mut settings);

        assert_eq!(settings.drop_speed, 250);
        assert_eq!(settings.garbage_rate, 1.0);
        assert_eq!(settings.defeat_time, 10);
    }

    #[test]
    fn test_join_room_wire_format() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"join_room","roomCode":"AB12CD"}"#).unwrap();

        match msg {
            ClientMessage::JoinRoom { room_code } => assert_eq!(room_code, "AB12CD"),
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_create_room_wire_format() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"create_room"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::CreateRoom));
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result: Result<ClientMessage, _> =
            serde_json::from_str(r#"{"type":"teleport_block"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_send_garbage_defaults_opaque_payloads() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"send_garbage","amount":3}"#).unwrap();

        match msg {
            ClientMessage::SendGarbage {
                amount,
                colors,
                positions,
            } => {
                assert_eq!(amount, json!(3));
                assert!(colors.is_null());
                assert!(positions.is_null());
            }
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_send_garbage_amount_is_opaque() {
        // The relay never interprets the amount; fractional values from a
        // client pass through undisturbed.
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"send_garbage","amount":2.5}"#).unwrap();

        match msg {
            ClientMessage::SendGarbage { amount, .. } => assert_eq!(amount, json!(2.5)),
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_update_settings_wire_format() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"update_settings","settings":{"garbageRate":2.0}}"#,
        )
        .unwrap();

        match msg {
            ClientMessage::UpdateSettings { settings } => {
                assert_eq!(settings.garbage_rate, Some(2.0));
                assert_eq!(settings.drop_speed, None);
            }
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_room_state_uses_camel_case_keys() {
        let msg = ServerMessage::RoomState {
            players: vec![PlayerInfo {
                id: "abc".to_string(),
                name: "Player 1".to_string(),
                ready: false,
                alive: true,
            }],
            host_id: "abc".to_string(),
            game_started: false,
            settings: GameSettings::default(),
        };

        let value: Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "room_state");
        assert_eq!(value["hostId"], "abc");
        assert_eq!(value["gameStarted"], false);
        assert_eq!(value["settings"]["garbageRate"], 1.0);
        assert_eq!(value["settings"]["dropSpeed"], 500);
        assert_eq!(value["players"][0]["name"], "Player 1");
    }

    #[test]
    fn test_game_end_serializes_null_winner() {
        let msg = ServerMessage::GameEnd {
            winner_id: None,
            is_winner: false,
        };

        let value: Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "game_end");
        assert_eq!(value["winnerId"], Value::Null);
        assert_eq!(value["isWinner"], false);
    }

    #[test]
    fn test_receive_garbage_round_trip() {
        let msg = ServerMessage::ReceiveGarbage {
            from_player_id: "p1".to_string(),
            amount: json!(5),
            colors: json!(["red", "blue"]),
            source_positions: json!([[0, 1], [2, 3]]),
        };

        let text = serde_json::to_string(&msg).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["type"], "receive_garbage");
        assert_eq!(value["fromPlayerId"], "p1");
        assert_eq!(value["amount"], 5);
        assert_eq!(value["colors"][0], "red");
        assert_eq!(value["sourcePositions"][1][0], 2);
    }
}
