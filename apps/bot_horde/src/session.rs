//! One simulated client: auth, join handshake, then the active loop that
//! marries inbound dispatch to the behavior timers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use towerpkt::{Envelope, PacketKind, Vec2, client, server};
use tracing::{debug, info, trace, warn};

use crate::Config;
use crate::auth::AuthClient;
use crate::behavior::Behavior;
use crate::connection::{ConnHandle, Connection};
use crate::error::{AuthFailed, ProtocolRejected, SessionError};

/// How often the active loop samples behavior state for outbound movement.
const MOVEMENT_TICK: Duration = Duration::from_millis(100);

/// Direction deltas below this are not worth a frame.
const DIR_EPSILON: f32 = 1e-3;

pub struct Session {
    username: String,
    cfg: Arc<Config>,
    shutdown: watch::Receiver<bool>,
}

impl Session {
    pub fn new(username: String, cfg: Arc<Config>, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            username,
            cfg,
            shutdown,
        }
    }

    /// Run the session to completion. Operator shutdown at any point is a
    /// clean `Ok`; anything else that stops the session early is an error
    /// for the orchestrator's report.
    pub async fn run(self) -> Result<(), SessionError> {
        let Session {
            username,
            cfg,
            mut shutdown,
        } = self;

        let setup = async {
            let auth = AuthClient::new(&cfg.auth_url)?;
            let token = auth.request_auth_token(&username).await?;
            let characters = auth.request_characters(&username, &token).await?;
            let Some(character) = characters.first() else {
                return Err(AuthFailed::NoCharacters.into());
            };
            info!(bot = %username, character = %character.name, "authenticated");

            let conn = Connection::connect(
                &cfg.remote_host,
                cfg.remote_port,
                cfg.connect_timeout,
                &username,
            )
            .await?;
            conn.handle().send(client::encode_client_join_request(
                &username,
                &character.name,
                &token,
            ));
            Ok::<Connection, SessionError>(conn)
        };

        let conn = tokio::select! {
            res = setup => res?,
            _ = wait_shutdown(&mut shutdown) => {
                info!(bot = %username, "cancelled before joining");
                return Ok(());
            }
        };

        let handle = conn.handle();
        let (inbound_tx, inbound_rx) = mpsc::channel::<Envelope>(64);
        let (_, res) = tokio::join!(
            conn.run(inbound_tx),
            drive(&cfg, &username, handle, inbound_rx, &mut shutdown),
        );
        res
    }
}

/// The active loop: dispatch inbound envelopes, sample behavior on a fixed
/// tick, fire the behavior timers, and watch for shutdown. Every exit path
/// disconnects the engine so the caller's join completes.
async fn drive(
    cfg: &Config,
    username: &str,
    handle: ConnHandle,
    mut inbound: mpsc::Receiver<Envelope>,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<(), SessionError> {
    let mut behavior = Behavior::new(cfg.enable_movement, cfg.enable_zone_movement, Instant::now());
    let mut tick = tokio::time::interval(MOVEMENT_TICK);
    let mut last_sent_dir = Vec2::ZERO;
    let mut entity_id: Option<u32> = None;

    let result = loop {
        let move_at = behavior.movement_deadline();
        let zone_at = behavior.zone_deadline();

        tokio::select! {
            env = inbound.recv() => {
                let Some(env) = env else {
                    // Engine wound down underneath us.
                    if *shutdown.borrow() {
                        break Ok(());
                    }
                    break Err(SessionError::ConnectionLost);
                };
                match dispatch(env, username, &handle, &mut behavior, &mut entity_id) {
                    Ok(()) => {}
                    Err(e) => break Err(e.into()),
                }
            }
            _ = tick.tick() => {
                let dir = behavior.target_direction();
                if (dir.x - last_sent_dir.x).abs() > DIR_EPSILON
                    || (dir.y - last_sent_dir.y).abs() > DIR_EPSILON
                {
                    handle.send(client::encode_player_movement(dir));
                    last_sent_dir = dir;
                }
            }
            _ = tokio::time::sleep_until(move_at) => {
                let mut rng = rand::rng();
                behavior.tick_movement(&mut rng, Instant::now());
            }
            _ = sleep_until_opt(zone_at) => {
                let mut rng = rand::rng();
                if let Some((floor, zone_id)) = behavior.tick_zone(&mut rng, Instant::now()) {
                    debug!(bot = %username, floor, zone_id, "requesting zone change");
                    handle.send(client::encode_player_enter_zone_request(floor, zone_id));
                }
            }
            _ = wait_shutdown(shutdown) => {
                info!(bot = %username, entity_id = ?entity_id, "shutting down");
                break Ok(());
            }
        }
    };

    handle.disconnect();
    result
}

fn dispatch(
    env: Envelope,
    username: &str,
    handle: &ConnHandle,
    behavior: &mut Behavior,
    entity_id: &mut Option<u32>,
) -> Result<(), ProtocolRejected> {
    match env.kind {
        PacketKind::ClientJoinResponse => match server::parse_client_join_response(env.body) {
            Ok(resp) if resp.is_ok() => {
                *entity_id = Some(resp.entity_id);
                behavior.set_zone(resp.floor, resp.zone_id);
                info!(bot = %username, entity_id = resp.entity_id, "joined");
            }
            Ok(resp) => {
                warn!(bot = %username, result = resp.result, "join rejected");
                return Err(ProtocolRejected::JoinFailed(resp.result));
            }
            Err(e) => warn!(bot = %username, err = %e, "bad join response"),
        },
        PacketKind::HeartBeat => {
            debug!(bot = %username, "beating");
            handle.send(client::encode_heart_beat());
        }
        PacketKind::PlayerEnterZoneResponse => {
            match server::parse_player_enter_zone_response(env.body) {
                Ok(true) => debug!(bot = %username, "zone change accepted"),
                Ok(false) => warn!(bot = %username, "zone change rejected"),
                Err(e) => warn!(bot = %username, err = %e, "bad zone response"),
            }
        }
        PacketKind::PlayerSpawn => match server::parse_player_spawn(env.body) {
            Ok(spawn) => info!(bot = %username, entity_id = spawn.entity_id, "player spawned"),
            Err(e) => warn!(bot = %username, err = %e, "bad player spawn"),
        },
        PacketKind::EntityMovements => match server::parse_entity_movements(env.body) {
            Ok(moves) => trace!(bot = %username, count = moves.len(), "entity movements"),
            Err(e) => warn!(bot = %username, err = %e, "bad entity movements"),
        },
        PacketKind::EntitySpawns => match server::parse_entity_spawns(env.body) {
            Ok(spawns) => trace!(bot = %username, count = spawns.len(), "entity spawns"),
            Err(e) => warn!(bot = %username, err = %e, "bad entity spawns"),
        },
        PacketKind::EntityDespawn => match server::parse_entity_despawn(env.body) {
            Ok(id) => trace!(bot = %username, entity_id = id, "entity despawn"),
            Err(e) => warn!(bot = %username, err = %e, "bad entity despawn"),
        },
        PacketKind::ClientJoinRequest
        | PacketKind::PlayerMovement
        | PacketKind::PlayerEnterZoneRequest => {
            warn!(bot = %username, kind = ?env.kind, "unexpected client-bound packet");
        }
    }
    Ok(())
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}

async fn wait_shutdown(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|stop| *stop).await.is_err() {
        // Sender gone without ever signalling; treat as "never".
        std::future::pending::<()>().await;
    }
}
