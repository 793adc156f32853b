//! Server-to-client packets.
//!
//! Parsers take the frame body (kind byte already stripped). Encoders exist
//! for the server side of the protocol and for test stubs standing in for
//! the real server.

use bytes::Bytes;

use crate::{
    KIND_CLIENT_JOIN_RESPONSE, KIND_ENTITY_DESPAWN, KIND_ENTITY_MOVEMENTS, KIND_ENTITY_SPAWNS,
    KIND_PLAYER_ENTER_ZONE_RESPONSE, KIND_PLAYER_SPAWN, PktError, Vec2, get_f32, get_u16, get_u32,
    get_vec2, put_vec2,
};

pub const JOIN_OK: u8 = 0;

/// Join handshake reply.
///
/// Encoding:
/// - kind: `KIND_CLIENT_JOIN_RESPONSE` (1 byte)
/// - result: u8 (`JOIN_OK` or a server-defined failure code)
/// - entity_id: u32 LE (the player's server-assigned entity)
/// - floor: u32 LE, zone_id: u32 LE (current location)
#[derive(Debug, Clone, Copy)]
pub struct ClientJoinResponse {
    pub result: u8,
    pub entity_id: u32,
    pub floor: u32,
    pub zone_id: u32,
}

impl ClientJoinResponse {
    pub fn is_ok(&self) -> bool {
        self.result == JOIN_OK
    }
}

pub fn encode_client_join_response(r: &ClientJoinResponse) -> Bytes {
    let mut b = Vec::with_capacity(1 + 1 + 12);
    b.push(KIND_CLIENT_JOIN_RESPONSE);
    b.push(r.result);
    b.extend_from_slice(&r.entity_id.to_le_bytes());
    b.extend_from_slice(&r.floor.to_le_bytes());
    b.extend_from_slice(&r.zone_id.to_le_bytes());
    Bytes::from(b)
}

pub fn parse_client_join_response(p: Bytes) -> Result<ClientJoinResponse, PktError> {
    if p.len() != 13 {
        return Err(PktError::Malformed("join response must be 13 bytes"));
    }
    Ok(ClientJoinResponse {
        result: p[0],
        entity_id: get_u32(&p, 1)?,
        floor: get_u32(&p, 5)?,
        zone_id: get_u32(&p, 9)?,
    })
}

/// Zone transfer reply: a single accept/reject byte.
pub fn encode_player_enter_zone_response(ok: bool) -> Bytes {
    Bytes::from(vec![KIND_PLAYER_ENTER_ZONE_RESPONSE, u8::from(ok)])
}

pub fn parse_player_enter_zone_response(p: Bytes) -> Result<bool, PktError> {
    if p.len() != 1 {
        return Err(PktError::Malformed("enter zone response must be 1 byte"));
    }
    Ok(p[0] != 0)
}

#[derive(Debug, Clone, Copy)]
pub struct EntityMovement {
    pub entity_id: u32,
    pub target_direction: Vec2,
    pub target_position: Vec2,
}

/// Batched entity movement updates.
///
/// Encoding: kind byte + count u16 LE + count × (entity_id u32 LE,
/// target_direction Vec2, target_position Vec2).
pub fn encode_entity_movements(moves: &[EntityMovement]) -> Bytes {
    let mut b = Vec::with_capacity(1 + 2 + moves.len() * 20);
    b.push(KIND_ENTITY_MOVEMENTS);
    b.extend_from_slice(&(moves.len() as u16).to_le_bytes());
    for m in moves {
        b.extend_from_slice(&m.entity_id.to_le_bytes());
        put_vec2(&mut b, m.target_direction);
        put_vec2(&mut b, m.target_position);
    }
    Bytes::from(b)
}

pub fn parse_entity_movements(p: Bytes) -> Result<Vec<EntityMovement>, PktError> {
    let count = get_u16(&p, 0)? as usize;
    let need = 2 + count * 20;
    if p.len() != need {
        return Err(PktError::TooShort { need, got: p.len() });
    }
    let mut out = Vec::with_capacity(count);
    let mut i = 2;
    for _ in 0..count {
        out.push(EntityMovement {
            entity_id: get_u32(&p, i)?,
            target_direction: get_vec2(&p, i + 4)?,
            target_position: get_vec2(&p, i + 12)?,
        });
        i += 20;
    }
    Ok(out)
}

#[derive(Debug, Clone, Copy)]
pub struct EntitySpawn {
    pub entity_id: u32,
    pub entity_type: u32,
    pub position: Vec2,
    pub rotation: f32,
}

/// Batched entity spawns.
///
/// Encoding: kind byte + count u16 LE + count × (entity_id u32 LE,
/// entity_type u32 LE, position Vec2, rotation f32 LE).
pub fn encode_entity_spawns(spawns: &[EntitySpawn]) -> Bytes {
    let mut b = Vec::with_capacity(1 + 2 + spawns.len() * 20);
    b.push(KIND_ENTITY_SPAWNS);
    b.extend_from_slice(&(spawns.len() as u16).to_le_bytes());
    for s in spawns {
        b.extend_from_slice(&s.entity_id.to_le_bytes());
        b.extend_from_slice(&s.entity_type.to_le_bytes());
        put_vec2(&mut b, s.position);
        b.extend_from_slice(&s.rotation.to_le_bytes());
    }
    Bytes::from(b)
}

pub fn parse_entity_spawns(p: Bytes) -> Result<Vec<EntitySpawn>, PktError> {
    let count = get_u16(&p, 0)? as usize;
    let need = 2 + count * 20;
    if p.len() != need {
        return Err(PktError::TooShort { need, got: p.len() });
    }
    let mut out = Vec::with_capacity(count);
    let mut i = 2;
    for _ in 0..count {
        out.push(EntitySpawn {
            entity_id: get_u32(&p, i)?,
            entity_type: get_u32(&p, i + 4)?,
            position: get_vec2(&p, i + 8)?,
            rotation: get_f32(&p, i + 16)?,
        });
        i += 20;
    }
    Ok(out)
}

/// Single entity leaving the bot's view.
pub fn encode_entity_despawn(entity_id: u32) -> Bytes {
    let mut b = Vec::with_capacity(1 + 4);
    b.push(KIND_ENTITY_DESPAWN);
    b.extend_from_slice(&entity_id.to_le_bytes());
    Bytes::from(b)
}

pub fn parse_entity_despawn(p: Bytes) -> Result<u32, PktError> {
    if p.len() != 4 {
        return Err(PktError::Malformed("entity despawn must be 4 bytes"));
    }
    get_u32(&p, 0)
}

#[derive(Debug, Clone, Copy)]
pub struct PlayerSpawn {
    pub entity_id: u32,
    pub entity_type: u32,
    pub position: Vec2,
    pub rotation: f32,
}

/// The bot's own avatar spawning into the zone.
pub fn encode_player_spawn(s: &PlayerSpawn) -> Bytes {
    let mut b = Vec::with_capacity(1 + 20);
    b.push(KIND_PLAYER_SPAWN);
    b.extend_from_slice(&s.entity_id.to_le_bytes());
    b.extend_from_slice(&s.entity_type.to_le_bytes());
    put_vec2(&mut b, s.position);
    b.extend_from_slice(&s.rotation.to_le_bytes());
    Bytes::from(b)
}

pub fn parse_player_spawn(p: Bytes) -> Result<PlayerSpawn, PktError> {
    if p.len() != 20 {
        return Err(PktError::Malformed("player spawn must be 20 bytes"));
    }
    Ok(PlayerSpawn {
        entity_id: get_u32(&p, 0)?,
        entity_type: get_u32(&p, 4)?,
        position: get_vec2(&p, 8)?,
        rotation: get_f32(&p, 16)?,
    })
}
