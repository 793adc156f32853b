//! In-process stand-ins for the auth gateway and the game server, used by
//! the unit and end-to-end tests.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};
use towerio::frame::{FrameReader, FrameWriter};
use towerpkt::{PacketKind, client, parse_envelope, server};

/// Minimal HTTP/1.1 responder: reads one request, answers with the
/// `(status, json body)` the closure returns for the path, closes.
pub(crate) async fn serve_http<F>(listener: TcpListener, respond: F)
where
    F: Fn(&str) -> (u16, String) + Send + Sync + 'static,
{
    let respond = Arc::new(respond);
    loop {
        let Ok((mut stream, _)) = listener.accept().await else {
            break;
        };
        let respond = respond.clone();
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let mut tmp = [0u8; 1024];
            let (path, body_start, content_length) = loop {
                let Ok(n) = stream.read(&mut tmp).await else {
                    return;
                };
                if n == 0 {
                    return;
                }
                buf.extend_from_slice(&tmp[..n]);
                if let Some(pos) = find_subslice(&buf, b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&buf[..pos]).into_owned();
                    let path = head
                        .lines()
                        .next()
                        .and_then(|l| l.split_whitespace().nth(1))
                        .unwrap_or("/")
                        .to_string();
                    let content_length = head
                        .lines()
                        .filter_map(|l| l.split_once(':'))
                        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    break (path, pos + 4, content_length);
                }
            };
            while buf.len() < body_start + content_length {
                let Ok(n) = stream.read(&mut tmp).await else {
                    return;
                };
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&tmp[..n]);
            }

            let (status, body) = respond(&path);
            let resp = format!(
                "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                if status < 400 { "OK" } else { "Error" },
                body.len(),
            );
            let _ = stream.write_all(resp.as_bytes()).await;
            let _ = stream.shutdown().await;
        });
    }
}

/// The stock auth stub: issues a jwt and a one-character list.
pub(crate) async fn serve_auth_ok(listener: TcpListener) {
    serve_http(listener, |path| match path {
        "/token/test" => (200, r#"{"jwt":"stub-jwt"}"#.to_string()),
        "/characters" => (200, r#"{"characters":[{"name":"StubHero"}]}"#.to_string()),
        _ => (404, "{}".to_string()),
    })
    .await
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[derive(Debug)]
pub(crate) struct StubConn {
    pub username: String,
    pub kinds: Vec<PacketKind>,
    pub close: Option<oneshot::Sender<()>>,
}

pub(crate) type StubConns = Arc<Mutex<Vec<StubConn>>>;

/// Frame-speaking game server stub: answers joins with `join_result`,
/// immediately sends one heartbeat, and records every packet kind each
/// connection delivers. Firing a connection's `close` sender drops just
/// that socket.
pub(crate) async fn serve_game(listener: TcpListener, conns: StubConns, join_result: u8) {
    loop {
        let Ok((stream, _)) = listener.accept().await else {
            break;
        };
        let conns = conns.clone();
        tokio::spawn(async move {
            let (close_tx, mut close_rx) = oneshot::channel::<()>();
            let idx = {
                let mut g = conns.lock().await;
                g.push(StubConn {
                    username: String::new(),
                    kinds: Vec::new(),
                    close: Some(close_tx),
                });
                g.len() - 1
            };

            let (rd, wr) = stream.into_split();
            let mut fr = FrameReader::new(rd);
            let mut fw = FrameWriter::new(wr);
            let mut next_entity = idx as u32 + 100;

            loop {
                let res = tokio::select! {
                    _ = &mut close_rx => break,
                    res = fr.read_frame() => res,
                };
                let Ok(Some(payload)) = res else { break };
                let Ok(env) = parse_envelope(payload) else {
                    break;
                };
                conns.lock().await[idx].kinds.push(env.kind);

                match env.kind {
                    PacketKind::ClientJoinRequest => {
                        let Ok(req) = client::parse_client_join_request(env.body) else {
                            break;
                        };
                        conns.lock().await[idx].username =
                            String::from_utf8_lossy(&req.username).into_owned();
                        let resp = server::ClientJoinResponse {
                            result: join_result,
                            entity_id: next_entity,
                            floor: 0,
                            zone_id: 1,
                        };
                        next_entity += 1;
                        if fw
                            .write_frame(&server::encode_client_join_response(&resp))
                            .await
                            .is_err()
                        {
                            break;
                        }
                        if fw.write_frame(&client::encode_heart_beat()).await.is_err() {
                            break;
                        }
                        let _ = fw.flush().await;
                    }
                    PacketKind::PlayerEnterZoneRequest => {
                        let _ = fw
                            .write_frame(&server::encode_player_enter_zone_response(true))
                            .await;
                        let _ = fw.flush().await;
                    }
                    _ => {}
                }
            }
        });
    }
}
