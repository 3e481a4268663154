//! Wire messages and the encode/decode boundary.
//!
//! Every datagram carries exactly one bincode-encoded [`Packet`].

use crate::{EntityId, InputKeys, PlayerState, ProjectileState};
use serde::{Deserialize, Serialize};

/// Largest payload a UDP datagram can carry.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;
/// Upper bound for anything a client is expected to send.
pub const MAX_CLIENT_PACKET_SIZE: usize = 1024;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    // Client -> server
    Connect {
        client_version: u32,
    },
    Input {
        seq: u32,
        keys: InputKeys,
        timestamp: u64,
    },
    Shoot {
        angle: f32,
        timestamp: u64,
    },
    Camera {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    Disconnect,

    // Server -> client
    Welcome {
        id: EntityId,
    },
    GameStateDelta {
        tick: u32,
        is_full_state: bool,
        /// Highest input sequence applied for this connection, `None` before the first input.
        last_processed_input: Option<u32>,
        your_state: PlayerState,
        delta: Delta,
    },
    Disconnected {
        reason: String,
    },
}

/// Entities a client has to add, update or drop since its last update.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Delta {
    pub players: Vec<(EntityId, PlayerState)>,
    pub projectiles: Vec<ProjectileState>,
    pub deleted_players: Vec<EntityId>,
    pub deleted_projectiles: Vec<EntityId>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
            && self.projectiles.is_empty()
            && self.deleted_players.is_empty()
            && self.deleted_projectiles.is_empty()
    }

    /// Empties every list while keeping the allocations.
    pub fn clear(&mut self) {
        self.players.clear();
        self.projectiles.clear();
        self.deleted_players.clear();
        self.deleted_projectiles.clear();
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode packet: {0}")]
    Encode(#[source] bincode::Error),
    #[error("malformed packet ({len} bytes): {source}")]
    Decode {
        len: usize,
        #[source]
        source: bincode::Error,
    },
    #[error("packet of {len} bytes exceeds the {max} byte limit")]
    TooLarge { len: usize, max: usize },
}

pub fn encode_packet(packet: &Packet) -> Result<Vec<u8>, CodecError> {
    let bytes = bincode::serialize(packet).map_err(CodecError::Encode)?;
    if bytes.len() > MAX_DATAGRAM_SIZE {
        return Err(CodecError::TooLarge {
            len: bytes.len(),
            max: MAX_DATAGRAM_SIZE,
        });
    }
    Ok(bytes)
}

/// Decodes a datagram, rejecting anything larger than `max_len` before parsing.
pub fn decode_packet(bytes: &[u8], max_len: usize) -> Result<Packet, CodecError> {
    if bytes.len() > max_len {
        return Err(CodecError::TooLarge {
            len: bytes.len(),
            max: max_len,
        });
    }
    bincode::deserialize(bytes).map_err(|source| CodecError::Decode {
        len: bytes.len(),
        source,
    })
}
