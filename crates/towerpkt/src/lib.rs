//! `towerpkt`: the binary packet schema spoken by the tower game server.
//!
//! All packets travel inside a `towerio::frame` length-prefixed frame:
//! - outer framing: `u32` little-endian byte length + payload
//! - payload: first byte is the packet kind; remaining bytes are
//!   kind-specific (all scalars little-endian)
//!
//! Decoders are "zero-copy": string fields come back as `bytes::Bytes`
//! slices referencing the original frame payload.

use bytes::Bytes;

pub mod client;
pub mod server;

#[derive(Debug, Clone)]
pub enum PktError {
    TooShort { need: usize, got: usize },
    UnknownKind(u8),
    Malformed(&'static str),
}

impl std::fmt::Display for PktError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PktError::TooShort { need, got } => {
                write!(f, "packet too short: need {need}, got {got}")
            }
            PktError::UnknownKind(k) => write!(f, "unknown packet kind: 0x{k:02x}"),
            PktError::Malformed(s) => write!(f, "malformed packet: {s}"),
        }
    }
}

impl std::error::Error for PktError {}

pub const KIND_CLIENT_JOIN_REQUEST: u8 = 0x01;
pub const KIND_CLIENT_JOIN_RESPONSE: u8 = 0x02;
pub const KIND_HEART_BEAT: u8 = 0x03;
pub const KIND_PLAYER_MOVEMENT: u8 = 0x04;
pub const KIND_PLAYER_ENTER_ZONE_REQUEST: u8 = 0x05;
pub const KIND_PLAYER_ENTER_ZONE_RESPONSE: u8 = 0x06;
pub const KIND_ENTITY_MOVEMENTS: u8 = 0x10;
pub const KIND_ENTITY_SPAWNS: u8 = 0x11;
pub const KIND_ENTITY_DESPAWN: u8 = 0x12;
pub const KIND_PLAYER_SPAWN: u8 = 0x13;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    ClientJoinRequest,
    ClientJoinResponse,
    HeartBeat,
    PlayerMovement,
    PlayerEnterZoneRequest,
    PlayerEnterZoneResponse,
    EntityMovements,
    EntitySpawns,
    EntityDespawn,
    PlayerSpawn,
}

impl PacketKind {
    pub fn from_u8(k: u8) -> Option<Self> {
        match k {
            KIND_CLIENT_JOIN_REQUEST => Some(PacketKind::ClientJoinRequest),
            KIND_CLIENT_JOIN_RESPONSE => Some(PacketKind::ClientJoinResponse),
            KIND_HEART_BEAT => Some(PacketKind::HeartBeat),
            KIND_PLAYER_MOVEMENT => Some(PacketKind::PlayerMovement),
            KIND_PLAYER_ENTER_ZONE_REQUEST => Some(PacketKind::PlayerEnterZoneRequest),
            KIND_PLAYER_ENTER_ZONE_RESPONSE => Some(PacketKind::PlayerEnterZoneResponse),
            KIND_ENTITY_MOVEMENTS => Some(PacketKind::EntityMovements),
            KIND_ENTITY_SPAWNS => Some(PacketKind::EntitySpawns),
            KIND_ENTITY_DESPAWN => Some(PacketKind::EntityDespawn),
            KIND_PLAYER_SPAWN => Some(PacketKind::PlayerSpawn),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            PacketKind::ClientJoinRequest => KIND_CLIENT_JOIN_REQUEST,
            PacketKind::ClientJoinResponse => KIND_CLIENT_JOIN_RESPONSE,
            PacketKind::HeartBeat => KIND_HEART_BEAT,
            PacketKind::PlayerMovement => KIND_PLAYER_MOVEMENT,
            PacketKind::PlayerEnterZoneRequest => KIND_PLAYER_ENTER_ZONE_REQUEST,
            PacketKind::PlayerEnterZoneResponse => KIND_PLAYER_ENTER_ZONE_RESPONSE,
            PacketKind::EntityMovements => KIND_ENTITY_MOVEMENTS,
            PacketKind::EntitySpawns => KIND_ENTITY_SPAWNS,
            PacketKind::EntityDespawn => KIND_ENTITY_DESPAWN,
            PacketKind::PlayerSpawn => KIND_PLAYER_SPAWN,
        }
    }
}

/// One decoded frame payload: the kind tag plus the untouched body bytes.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub kind: PacketKind,
    pub body: Bytes,
}

/// Split a frame payload into kind + body.
///
/// The body is not validated here; typed parsing is per-kind and up to the
/// consumer, which also gets to decide whether an unknown kind is fatal.
pub fn parse_envelope(p: Bytes) -> Result<Envelope, PktError> {
    if p.is_empty() {
        return Err(PktError::TooShort { need: 1, got: 0 });
    }
    let kind = PacketKind::from_u8(p[0]).ok_or(PktError::UnknownKind(p[0]))?;
    Ok(Envelope {
        kind,
        body: p.slice(1..),
    })
}

/// 2D vector as carried on the wire (two little-endian `f32`s).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn normalized(self) -> Vec2 {
        let len = self.length();
        if len == 0.0 {
            return Vec2::ZERO;
        }
        Vec2 {
            x: self.x / len,
            y: self.y / len,
        }
    }
}

pub(crate) fn put_vec2(out: &mut Vec<u8>, v: Vec2) {
    out.extend_from_slice(&v.x.to_le_bytes());
    out.extend_from_slice(&v.y.to_le_bytes());
}

pub(crate) fn get_f32(p: &[u8], i: usize) -> Result<f32, PktError> {
    let b = p
        .get(i..i + 4)
        .ok_or(PktError::TooShort { need: i + 4, got: p.len() })?;
    Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

pub(crate) fn get_u32(p: &[u8], i: usize) -> Result<u32, PktError> {
    let b = p
        .get(i..i + 4)
        .ok_or(PktError::TooShort { need: i + 4, got: p.len() })?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

pub(crate) fn get_u16(p: &[u8], i: usize) -> Result<u16, PktError> {
    let b = p
        .get(i..i + 2)
        .ok_or(PktError::TooShort { need: i + 2, got: p.len() })?;
    Ok(u16::from_le_bytes([b[0], b[1]]))
}

pub(crate) fn get_vec2(p: &[u8], i: usize) -> Result<Vec2, PktError> {
    Ok(Vec2 {
        x: get_f32(p, i)?,
        y: get_f32(p, i + 4)?,
    })
}
