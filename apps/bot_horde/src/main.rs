use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{Level, info, warn};

mod auth;
mod behavior;
mod connection;
mod error;
mod session;
#[cfg(test)]
mod stubs;

use error::SessionError;
use session::Session;

#[derive(Clone, Debug)]
pub struct Config {
    pub remote_host: String,
    pub remote_port: u16,
    pub auth_url: String,
    pub num_clients: u32,
    pub enable_movement: bool,
    pub enable_zone_movement: bool,
    pub connect_timeout: Duration,
}

fn usage_and_exit() -> ! {
    eprintln!(
        "bot_horde\n\n\
USAGE:\n  bot_horde [--host HOST] [--port PORT] [--auth-url URL] [--bots N]\n            [--movement BOOL] [--zone-movement BOOL]\n\n\
ENV:\n  REMOTE_HOST           default 127.0.0.1\n  REMOTE_PORT           default 30000\n  AUTH_URL              default https://HOST:8000\n  NUM_CLIENTS           default 1\n  ENABLE_MOVEMENT       default true\n  ENABLE_ZONE_MOVEMENT  default false\n  CONNECT_TIMEOUT_MS    default 5000\n"
    );
    std::process::exit(2);
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn parse_args() -> Config {
    let mut remote_host = std::env::var("REMOTE_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let mut remote_port: u16 = env_parse("REMOTE_PORT").unwrap_or(30000);
    let mut auth_url: Option<String> = std::env::var("AUTH_URL").ok();
    let mut num_clients: u32 = env_parse("NUM_CLIENTS").unwrap_or(1);
    let mut enable_movement: bool = env_parse("ENABLE_MOVEMENT").unwrap_or(true);
    let mut enable_zone_movement: bool = env_parse("ENABLE_ZONE_MOVEMENT").unwrap_or(false);
    let connect_timeout = Duration::from_millis(env_parse("CONNECT_TIMEOUT_MS").unwrap_or(5000));

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--host" => remote_host = it.next().unwrap_or_else(|| usage_and_exit()),
            "--port" => {
                remote_port = it
                    .next()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(|| usage_and_exit())
            }
            "--auth-url" => auth_url = Some(it.next().unwrap_or_else(|| usage_and_exit())),
            "--bots" => {
                num_clients = it
                    .next()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(|| usage_and_exit())
            }
            "--movement" => {
                enable_movement = it
                    .next()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(|| usage_and_exit())
            }
            "--zone-movement" => {
                enable_zone_movement = it
                    .next()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(|| usage_and_exit())
            }
            "-h" | "--help" => usage_and_exit(),
            _ => usage_and_exit(),
        }
    }

    let auth_url = auth_url.unwrap_or_else(|| format!("https://{remote_host}:8000"));
    Config {
        remote_host,
        remote_port,
        auth_url,
        num_clients: num_clients.max(1),
        enable_movement,
        enable_zone_movement,
        connect_timeout,
    }
}

/// Fan out one session per configured client and wait for every one of them.
/// A session failing never cancels its siblings; each result is collected
/// for the final report.
async fn run_all(
    cfg: Arc<Config>,
    shutdown: watch::Receiver<bool>,
) -> Vec<(String, Result<(), SessionError>)> {
    let mut names = Vec::new();
    let mut tasks = Vec::new();
    for i in 0..cfg.num_clients {
        let username = format!("dummy_{:05}", i + 1);
        let session = Session::new(username.clone(), cfg.clone(), shutdown.clone());
        names.push(username);
        tasks.push(tokio::spawn(session.run()));
    }

    let joined = futures_util::future::join_all(tasks).await;
    names
        .into_iter()
        .zip(joined)
        .map(|(name, res)| match res {
            Ok(res) => (name, res),
            Err(e) => {
                warn!(bot = %name, err = %e, "session task panicked");
                (name, Err(SessionError::ConnectionLost))
            }
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,bot_horde=info".into()),
        )
        .with_target(false)
        .with_max_level(Level::INFO)
        .init();

    let cfg = Arc::new(parse_args());
    info!(
        host = %cfg.remote_host,
        port = %cfg.remote_port,
        bots = %cfg.num_clients,
        movement = %cfg.enable_movement,
        zone_movement = %cfg.enable_zone_movement,
        "bot horde starting"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let results = run_all(cfg, shutdown_rx).await;

    let mut failed = 0usize;
    for (username, res) in &results {
        match res {
            Ok(()) => info!(bot = %username, "session done"),
            Err(e) => {
                failed += 1;
                warn!(bot = %username, err = %e, "session failed");
            }
        }
    }
    info!(ok = results.len() - failed, failed, "bot horde finished");
    if failed > 0 {
        anyhow::bail!("{failed} of {} sessions failed", results.len());
    }
    Ok(())
}
