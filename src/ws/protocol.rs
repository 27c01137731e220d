//! WebSocket protocol message definitions
//! These are the wire types between the page shell and a running scene

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::game::{Iteration, MatchStatus};

/// Player character skins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Character {
    Messi,
    Ronaldo,
}

impl Character {
    /// Texture key of the idle frame for this character
    pub fn texture_key(self) -> &'static str {
        match self {
            Character::Messi => "player1_idle_frame1",
            Character::Ronaldo => "player2_idle_frame1",
        }
    }
}

fn default_my_char() -> Character {
    Character::Messi
}

fn default_other_char() -> Character {
    Character::Ronaldo
}

/// A character name, or anything else the page shell happened to send
#[derive(Deserialize)]
#[serde(untagged)]
enum LenientCharacter {
    Known(Character),
    Other(IgnoredAny),
}

fn lenient_character<'de, D>(deserializer: D, fallback: Character) -> Result<Character, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<LenientCharacter>::deserialize(deserializer)? {
        Some(LenientCharacter::Known(character)) => character,
        Some(LenientCharacter::Other(_)) | None => fallback,
    })
}

fn deserialize_my_char<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Character, D::Error> {
    lenient_character(deserializer, default_my_char())
}

fn deserialize_other_char<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Character, D::Error> {
    lenient_character(deserializer, default_other_char())
}

/// Field side. Player 1 always plays on the left, player 2 on the right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    /// 1 for the left player, 2 for the right player
    pub fn player_number(self) -> u8 {
        match self {
            Side::Left => 1,
            Side::Right => 2,
        }
    }
}

/// Payload handed to the game scene when a client starts a game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneEntry {
    /// Match identifier, opaque to the scene
    #[serde(default)]
    pub match_id: Option<String>,
    /// Whether this seat is authoritative for the match
    #[serde(default)]
    pub is_host: bool,
    /// Null, empty or unknown names fall back to messi
    #[serde(default = "default_my_char", deserialize_with = "deserialize_my_char")]
    pub my_char: Character,
    /// Null, empty or unknown names fall back to ronaldo
    #[serde(default = "default_other_char", deserialize_with = "deserialize_other_char")]
    pub other_char: Character,
}

impl Default for SceneEntry {
    fn default() -> Self {
        Self {
            match_id: None,
            is_host: false,
            my_char: default_my_char(),
            other_char: default_other_char(),
        }
    }
}

impl SceneEntry {
    /// Side driven by this seat's keyboard
    pub fn local_side(&self) -> Side {
        if self.is_host {
            Side::Left
        } else {
            Side::Right
        }
    }

    /// Character for the player on the given side
    pub fn character_for(&self, side: Side) -> Character {
        if side == self.local_side() {
            self.my_char
        } else {
            self.other_char
        }
    }
}

/// Held state of the four directional keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyState {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
}

/// Messages sent from the page shell to a scene
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Current held keys, kept until the next update
    Keys { keys: KeyState },

    /// Raw key codes currently held, mapped with the seat's bindings
    Pressed { codes: Vec<String> },

    /// Text box or other page UI took or released keyboard focus
    Focus { focused: bool },

    /// Placement of the remote player, relayed by the external transport
    RemotePose {
        x: f32,
        y: f32,
        #[serde(default)]
        facing_right: Option<bool>,
    },

    /// Score decided by the host seat, relayed by the external transport
    SyncScore { player1: u32, player2: u32 },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from a scene to the page shell
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection, with the scene's current status
    Welcome {
        connection_id: Uuid,
        scene_id: Uuid,
        server_time: u64,
        status: MatchStatus,
    },

    /// One asset finished loading (or failed)
    Loading {
        key: String,
        /// Fraction of the manifest processed, 0.0..=1.0
        progress: f32,
        ok: bool,
    },

    /// Loading finished and the game scene is live
    SceneStarted {
        scene_id: Uuid,
        match_id: Option<String>,
        is_host: bool,
        local_side: Side,
        player1: Character,
        player2: Character,
        iteration: Iteration,
        frame_rate: u32,
    },

    /// Scene state (sent at regular intervals)
    Frame {
        /// Frame counter since the game scene started
        frame: u64,
        players: Vec<PlayerSnapshot>,
        ball: BallSnapshot,
        player1_score: u32,
        player2_score: u32,
        scoreboard: String,
        input_focused: bool,
    },

    /// A goal was detected by this seat
    Goal {
        frame: u64,
        scorer: Side,
        player1_score: u32,
        player2_score: u32,
        scoreboard: String,
    },

    /// A relayed score was refused
    ScoreRejected {
        player1: u32,
        player2: u32,
        reason: String,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },

    /// Scene was torn down
    SceneEnded {
        reason: String,
        player1_score: u32,
        player2_score: u32,
    },

    /// Error message
    Error { code: String, message: String },
}

/// Player state in a frame snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub side: Side,
    pub character: Character,
    /// Sprite position (bottom centre)
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub facing_right: bool,
    pub on_ground: bool,
    /// Driven by this seat's keyboard
    pub local: bool,
}

/// Ball state in a frame snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallSnapshot {
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
}
