//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use std::fmt;

use serde::{Deserialize, Serialize};

/// Seat a player occupies in a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Room creator, owns the bottom half of the board
    P1,
    /// Joiner, owns the top half of the board
    P2,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::P1 => f.write_str("p1"),
            Role::P2 => f.write_str("p2"),
        }
    }
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ClientMsg {
    /// Open a new room and take the p1 seat
    CreateRoom {
        #[serde(default)]
        name: Option<String>,
    },

    /// Take the p2 seat of an existing room
    JoinRoom {
        code: String,
        #[serde(default)]
        name: Option<String>,
    },

    /// Place a unit on the board
    Spawn {
        #[serde(alias = "typeId")]
        archetype_id: String,
        row: i32,
        col: i32,
    },

    /// Latency probe
    Ping,
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ServerMsg {
    /// Room created, sender is p1
    RoomCreated { code: String, role: Role },

    /// Room joined, sender is p2
    JoinedRoom { code: String, role: Role },

    /// Request could not be served
    Error { msg: String },

    /// The other seat was taken
    OpponentJoined { name: String },

    /// Both seats filled, match about to begin
    GameStart { p1_name: String, p2_name: String },

    RoundStart {
        round: u32,
        time_left: u32,
        p1_stars: u32,
        p2_stars: u32,
    },

    /// Round clock, once per second
    Timer { time_left: u32 },

    /// Result of one simulation step
    Tick {
        units: Vec<UnitSnapshot>,
        events: Vec<SimEvent>,
        time_left: u32,
    },

    UnitSpawned { unit: UnitSnapshot },

    SpawnDenied { reason: String },

    RoundEnd {
        round: u32,
        /// None on a draw
        winner: Option<Role>,
        p1_count: u32,
        p2_count: u32,
        p1_stars: u32,
        p2_stars: u32,
    },

    GameOver { p1_stars: u32, p2_stars: u32 },

    OpponentDisconnected,

    Pong,
}

/// Unit state as seen by clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitSnapshot {
    pub id: u32,
    pub archetype_id: String,
    pub row: i32,
    pub col: i32,
    pub hp: u32,
    pub max_hp: u32,
    pub team: Role,
}

/// Events produced by one simulation step, in the order they happened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum SimEvent {
    Attack {
        attacker_id: u32,
        target_id: u32,
        new_hp: u32,
        dmg: u32,
    },

    Move { unit_id: u32, row: i32, col: i32 },

    Death { unit_id: u32 },
}
