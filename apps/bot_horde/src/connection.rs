//! The per-session connection engine: one TCP socket, one send loop, one
//! receive loop.
//!
//! Callers enqueue encoded frame payloads through a [`ConnHandle`]; the send
//! loop drains the queue in FIFO order and writes each payload as one frame.
//! The receive loop reassembles frames, splits them into envelopes, and
//! forwards them to the session's inbound channel. Either loop hitting an
//! IO or framing error disconnects the engine; the other loop observes the
//! state change and exits, dropping the socket.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::watch;
use towerio::frame::{FrameReader, FrameWriter};
use towerpkt::{Envelope, PktError, parse_envelope};
use tracing::{debug, warn};

use crate::error::ConnectError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    outbound_rx: mpsc::UnboundedReceiver<Bytes>,
    handle: ConnHandle,
    label: String,
}

/// Cheap clone shared with anything that needs to submit frames or tear the
/// connection down.
#[derive(Debug, Clone)]
pub struct ConnHandle {
    outbound: mpsc::UnboundedSender<Bytes>,
    state: Arc<watch::Sender<ConnectionState>>,
}

impl ConnHandle {
    /// Enqueue one encoded frame payload. Returns immediately; the payload
    /// is silently dropped unless the engine is `Connected`.
    pub fn send(&self, payload: Bytes) {
        if *self.state.borrow() != ConnectionState::Connected {
            return;
        }
        let _ = self.outbound.send(payload);
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Idempotent teardown. Returns whether this call performed the
    /// transition; only the first caller does, so the disconnect
    /// notification fires exactly once no matter how many paths race here.
    pub fn disconnect(&self) -> bool {
        let mut fired = false;
        self.state.send_if_modified(|s| match *s {
            ConnectionState::Connecting | ConnectionState::Connected => {
                *s = ConnectionState::Closing;
                fired = true;
                true
            }
            ConnectionState::Closing | ConnectionState::Disconnected => false,
        });
        fired
    }
}

/// Resolves once the engine has been asked to close (or already has).
async fn closed(rx: &mut watch::Receiver<ConnectionState>) {
    let _ = rx
        .wait_for(|s| matches!(s, ConnectionState::Closing | ConnectionState::Disconnected))
        .await;
}

impl Connection {
    /// Open the socket. Resolution, refusal, and timeout map to their own
    /// [`ConnectError`] variants so the orchestrator report can tell them
    /// apart. Nagle is off; every frame should leave as soon as written.
    pub async fn connect(
        host: &str,
        port: u16,
        timeout: Duration,
        label: &str,
    ) -> Result<Self, ConnectError> {
        let (state_tx, _) = watch::channel(ConnectionState::Connecting);
        let state = Arc::new(state_tx);

        let mut addrs = tokio::net::lookup_host((host, port))
            .await
            .map_err(ConnectError::Resolution)?;
        let Some(addr) = addrs.next() else {
            return Err(ConnectError::Resolution(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no addresses for host",
            )));
        };

        let stream = match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(s)) => s,
            Ok(Err(e)) => return Err(ConnectError::Refused(e)),
            Err(_) => return Err(ConnectError::Timeout),
        };
        stream.set_nodelay(true).map_err(ConnectError::Refused)?;

        state.send_replace(ConnectionState::Connected);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        Ok(Self {
            stream,
            outbound_rx,
            handle: ConnHandle {
                outbound: outbound_tx,
                state,
            },
            label: label.to_string(),
        })
    }

    pub fn handle(&self) -> ConnHandle {
        self.handle.clone()
    }

    /// Drive both loops until disconnect. Inbound envelopes go to
    /// `inbound`; the channel closing early (receiver dropped) also winds
    /// the engine down.
    pub async fn run(self, inbound: mpsc::Sender<Envelope>) {
        let Connection {
            stream,
            mut outbound_rx,
            handle,
            label,
        } = self;
        let (rd, wr) = stream.into_split();
        let mut fr = FrameReader::new(rd);
        let mut fw = FrameWriter::new(wr);

        let recv_handle = handle.clone();
        let recv_label = label.clone();
        let mut recv_closed = handle.state.subscribe();
        let recv_loop = async move {
            loop {
                let res = tokio::select! {
                    res = fr.read_frame() => res,
                    _ = closed(&mut recv_closed) => break,
                };
                match res {
                    Ok(Some(payload)) => match parse_envelope(payload) {
                        Ok(env) => {
                            if inbound.send(env).await.is_err() {
                                recv_handle.disconnect();
                                break;
                            }
                        }
                        Err(PktError::UnknownKind(k)) => {
                            warn!(bot = %recv_label, kind = k, "dropping unknown packet kind");
                        }
                        Err(e) => {
                            warn!(bot = %recv_label, err = %e, "malformed frame");
                            recv_handle.disconnect();
                            break;
                        }
                    },
                    Ok(None) => {
                        debug!(bot = %recv_label, "server closed connection");
                        recv_handle.disconnect();
                        break;
                    }
                    Err(e) => {
                        warn!(bot = %recv_label, err = %e, "read failed");
                        recv_handle.disconnect();
                        break;
                    }
                }
            }
        };

        let send_handle = handle.clone();
        let send_label = label.clone();
        let mut send_closed = handle.state.subscribe();
        let send_loop = async move {
            loop {
                let payload = tokio::select! {
                    p = outbound_rx.recv() => p,
                    _ = closed(&mut send_closed) => break,
                };
                let Some(payload) = payload else { break };
                let res = async {
                    fw.write_frame(&payload).await?;
                    fw.flush().await
                }
                .await;
                if let Err(e) = res {
                    warn!(bot = %send_label, err = %e, "write failed");
                    send_handle.disconnect();
                    break;
                }
            }
        };

        tokio::join!(recv_loop, send_loop);
        handle.state.send_replace(ConnectionState::Disconnected);
        debug!(bot = %label, "disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use towerpkt::PacketKind;
    use towerpkt::client::{encode_heart_beat, encode_player_movement};

    const TIMEOUT: Duration = Duration::from_secs(5);

    async fn pair() -> (Connection, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let conn = Connection::connect("127.0.0.1", addr.port(), TIMEOUT, "t").await;
        let (server, _) = listener.accept().await.unwrap();
        (conn.unwrap(), server)
    }

    #[tokio::test]
    async fn connect_refused_maps_to_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = Connection::connect("127.0.0.1", port, TIMEOUT, "t")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ConnectError::Refused(_)));
    }

    #[tokio::test]
    async fn sends_stay_in_submission_order() {
        let (conn, mut server) = pair().await;
        let handle = conn.handle();

        let a = encode_player_movement(towerpkt::Vec2 { x: 1.0, y: 0.0 });
        let b = encode_heart_beat();
        handle.send(a.clone());
        handle.send(b.clone());

        let (inbound_tx, _inbound_rx) = mpsc::channel(8);
        let engine = tokio::spawn(conn.run(inbound_tx));

        let mut expected = Vec::new();
        expected.extend_from_slice(&(a.len() as u32).to_le_bytes());
        expected.extend_from_slice(&a);
        expected.extend_from_slice(&(b.len() as u32).to_le_bytes());
        expected.extend_from_slice(&b);

        let mut got = vec![0u8; expected.len()];
        tokio::time::timeout(TIMEOUT, server.read_exact(&mut got))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, expected);

        handle.disconnect();
        engine.await.unwrap();
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let (conn, _server) = pair().await;
        let handle = conn.handle();
        let (inbound_tx, _inbound_rx) = mpsc::channel(8);
        let engine = tokio::spawn(conn.run(inbound_tx));

        assert!(handle.disconnect());
        assert!(!handle.disconnect());
        engine.await.unwrap();
        assert_eq!(handle.state(), ConnectionState::Disconnected);
        assert!(!handle.disconnect());
    }

    #[tokio::test]
    async fn oversized_header_disconnects() {
        let (conn, mut server) = pair().await;
        let handle = conn.handle();
        let (inbound_tx, mut inbound_rx) = mpsc::channel(8);
        let engine = tokio::spawn(conn.run(inbound_tx));

        server.write_all(&u32::MAX.to_le_bytes()).await.unwrap();

        // The receive loop treats the corrupt prefix as fatal: the inbound
        // channel closes and the engine settles in Disconnected.
        assert!(
            tokio::time::timeout(TIMEOUT, inbound_rx.recv())
                .await
                .unwrap()
                .is_none()
        );
        engine.await.unwrap();
        assert_eq!(handle.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn unknown_kind_is_dropped_not_fatal() {
        let (conn, mut server) = pair().await;
        let (inbound_tx, mut inbound_rx) = mpsc::channel(8);
        let engine = tokio::spawn(conn.run(inbound_tx));

        server.write_all(&1u32.to_le_bytes()).await.unwrap();
        server.write_all(&[0x7f]).await.unwrap();
        let beat = encode_heart_beat();
        server
            .write_all(&(beat.len() as u32).to_le_bytes())
            .await
            .unwrap();
        server.write_all(&beat).await.unwrap();

        let env = tokio::time::timeout(TIMEOUT, inbound_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(env.kind, PacketKind::HeartBeat);

        drop(server);
        engine.await.unwrap();
    }

    #[tokio::test]
    async fn server_close_ends_the_engine() {
        let (conn, server) = pair().await;
        let handle = conn.handle();
        let (inbound_tx, mut inbound_rx) = mpsc::channel(8);
        let engine = tokio::spawn(conn.run(inbound_tx));

        drop(server);
        assert!(
            tokio::time::timeout(TIMEOUT, inbound_rx.recv())
                .await
                .unwrap()
                .is_none()
        );
        engine.await.unwrap();
        assert_eq!(handle.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn send_after_disconnect_is_dropped() {
        let (conn, mut server) = pair().await;
        let handle = conn.handle();
        let (inbound_tx, _inbound_rx) = mpsc::channel(8);
        let engine = tokio::spawn(conn.run(inbound_tx));

        handle.disconnect();
        engine.await.unwrap();
        handle.send(encode_heart_beat());

        // Nothing was written; the socket just reports EOF.
        let mut buf = [0u8; 1];
        let n = tokio::time::timeout(TIMEOUT, server.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);
    }
}
