//! Wire messages. One JSON object per line; client messages carry an
//! `action` tag, server messages a `type` tag.

use serde::{Deserialize, Serialize};
use strata_chunk::{ChunkCoord, ChunkRecord};
use strata_runtime::VoxelEdit;

use crate::NetError;

/// Last reported player position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Where a player stands until its first `state` message.
pub const SPAWN: Position = Position::new(0.0, 70.0, 0.0);

/// Client → server.
///
/// Handshake fields are optional so a message missing them still parses and
/// can be answered (or dropped) the way the relay decides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ClientMessage {
    Create {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seed: Option<String>,
        #[serde(rename = "peerId", default, skip_serializing_if = "Option::is_none")]
        peer_id: Option<String>,
    },
    Join {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        #[serde(rename = "peerId", default, skip_serializing_if = "Option::is_none")]
        peer_id: Option<String>,
    },
    ChunkRequest {
        payload: ChunkCoord,
    },
    Edit {
        payload: VoxelEdit,
    },
    State {
        payload: Position,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReason {
    /// Session bound reached or room code taken.
    SessionUnavailable,
    NotFound,
}

/// Server → client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    Created {
        code: String,
        seed: String,
    },
    Joined {
        code: String,
        seed: String,
    },
    Error {
        reason: ErrorReason,
    },
    Players {
        players: Vec<(String, Position)>,
    },
    PlayerJoined {
        #[serde(rename = "peerId")]
        peer_id: String,
    },
    ChunkData {
        chunk: ChunkRecord,
    },
    Edit(VoxelEdit),
    State {
        #[serde(rename = "peerId")]
        peer_id: String,
        x: f32,
        y: f32,
        z: f32,
    },
}

/// Serializes `msg` as one newline-terminated frame.
pub fn encode_line<T: Serialize>(msg: &T) -> Result<String, NetError> {
    let mut line = serde_json::to_string(msg)?;
    line.push('\n');
    Ok(line)
}

/// Parses one frame; blank lines and malformed frames yield `None`.
pub fn decode_line<T: for<'de> Deserialize<'de>>(line: &str) -> Option<T> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str(trimmed) {
        Ok(msg) => Some(msg),
        Err(e) => {
            log::debug!("dropping malformed frame: {e}");
            None
        }
    }
}
