//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};

/// A connection's designation, fixed for the connection's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "1")]
    Player1,
    #[serde(rename = "2")]
    Player2,
    #[serde(rename = "S")]
    Spectator,
}

impl Role {
    /// Role for a newly connected client, derived from its registry slot.
    /// Slot 0 is player 1, slot 1 is player 2, everyone else watches.
    pub fn from_slot(slot: usize) -> Self {
        match slot {
            0 => Role::Player1,
            1 => Role::Player2,
            _ => Role::Spectator,
        }
    }

    pub fn is_player(&self) -> bool {
        matches!(self, Role::Player1 | Role::Player2)
    }
}

/// Table geometry sent once in the `init` handshake
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TableDims {
    /// Table width in meters
    pub width: f32,
    /// Table height in meters
    pub height: f32,
    /// Goal mouth width in meters
    pub goal: f32,
}

impl TableDims {
    pub fn half_width(&self) -> f32 {
        self.width / 2.0
    }

    pub fn half_height(&self) -> f32 {
        self.height / 2.0
    }
}

/// Position and radius of a puck or paddle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub x: f32,
    pub y: f32,
    pub r: f32,
}

/// A paddle as seen by one client: entity plus that player's goal count
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub x: f32,
    pub y: f32,
    pub r: f32,
    pub score: u32,
}

impl PlayerView {
    pub fn new(entity: EntityState, score: u32) -> Self {
        Self {
            x: entity.x,
            y: entity.y,
            r: entity.r,
            score,
        }
    }
}

/// One tick's state, already transformed into the receiving client's
/// perspective: `player` is always the receiver's own paddle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub puck: EntityState,
    pub player: PlayerView,
    pub opponent: PlayerView,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMsg {
    /// Handshake sent once, immediately after connect
    Init {
        table: TableDims,
        clienttype: Role,
        message: Option<String>,
    },

    /// Per-tick state broadcast
    State {
        state: ViewState,
        message: Option<String>,
    },
}

/// The only inbound message: the player's desired paddle position in
/// table-unit coordinates (the client's own local frame)
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PaddleTarget {
    pub x: f32,
    pub y: f32,
}
