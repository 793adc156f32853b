//! Client-to-server packets.
//!
//! Encoders return the complete frame payload (kind byte included), ready
//! for `towerio::frame::FrameWriter`. Parsers take the body only (kind byte
//! already stripped by `parse_envelope`); the server side of the protocol
//! uses them, as do test stubs.

use bytes::Bytes;

use crate::{
    KIND_CLIENT_JOIN_REQUEST, KIND_HEART_BEAT, KIND_PLAYER_ENTER_ZONE_REQUEST,
    KIND_PLAYER_MOVEMENT, PktError, Vec2, get_u16, get_u32, get_vec2, put_vec2,
};

/// Join handshake, sent once right after connecting.
///
/// Encoding:
/// - kind: `KIND_CLIENT_JOIN_REQUEST` (1 byte)
/// - username_len: u16 LE, username: utf-8
/// - character_len: u16 LE, character: utf-8
/// - token_len: u16 LE, token: opaque bytes (the auth gateway's jwt)
#[derive(Debug, Clone)]
pub struct ClientJoinRequest {
    pub username: Bytes,
    pub character: Bytes,
    pub token: Bytes,
}

pub fn encode_client_join_request(username: &str, character: &str, token: &str) -> Bytes {
    let mut b = Vec::with_capacity(1 + 6 + username.len() + character.len() + token.len());
    b.push(KIND_CLIENT_JOIN_REQUEST);
    for field in [username.as_bytes(), character.as_bytes(), token.as_bytes()] {
        let len = u16::try_from(field.len()).unwrap_or(u16::MAX) as usize;
        b.extend_from_slice(&(len as u16).to_le_bytes());
        b.extend_from_slice(&field[..len]);
    }
    Bytes::from(b)
}

pub fn parse_client_join_request(p: Bytes) -> Result<ClientJoinRequest, PktError> {
    let mut i = 0usize;
    let mut fields = [Bytes::new(), Bytes::new(), Bytes::new()];
    for f in fields.iter_mut() {
        let len = get_u16(&p, i)? as usize;
        i += 2;
        if p.len() < i + len {
            return Err(PktError::TooShort {
                need: i + len,
                got: p.len(),
            });
        }
        *f = p.slice(i..i + len);
        i += len;
    }
    if i != p.len() {
        return Err(PktError::Malformed("trailing bytes after join request"));
    }
    let [username, character, token] = fields;
    Ok(ClientJoinRequest {
        username,
        character,
        token,
    })
}

/// Heartbeat carries no body; both directions use the same encoding.
pub fn encode_heart_beat() -> Bytes {
    Bytes::from_static(&[KIND_HEART_BEAT])
}

/// Movement intent: the player's current target direction.
///
/// Encoding: kind byte + `Vec2` (two f32 LE). Zero vector means "stopped".
pub fn encode_player_movement(target_direction: Vec2) -> Bytes {
    let mut b = Vec::with_capacity(1 + 8);
    b.push(KIND_PLAYER_MOVEMENT);
    put_vec2(&mut b, target_direction);
    Bytes::from(b)
}

pub fn parse_player_movement(p: Bytes) -> Result<Vec2, PktError> {
    if p.len() != 8 {
        return Err(PktError::Malformed("player movement must be 8 bytes"));
    }
    get_vec2(&p, 0)
}

/// Zone transfer request.
///
/// Encoding: kind byte + floor u32 LE + zone_id u32 LE.
pub fn encode_player_enter_zone_request(floor: u32, zone_id: u32) -> Bytes {
    let mut b = Vec::with_capacity(1 + 8);
    b.push(KIND_PLAYER_ENTER_ZONE_REQUEST);
    b.extend_from_slice(&floor.to_le_bytes());
    b.extend_from_slice(&zone_id.to_le_bytes());
    Bytes::from(b)
}

pub fn parse_player_enter_zone_request(p: Bytes) -> Result<(u32, u32), PktError> {
    if p.len() != 8 {
        return Err(PktError::Malformed("enter zone request must be 8 bytes"));
    }
    Ok((get_u32(&p, 0)?, get_u32(&p, 4)?))
}
