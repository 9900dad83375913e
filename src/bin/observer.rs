//! Headless observer: follows the authority over WebSocket and keeps a
//! virtual local player reconciled against every snapshot, the same way a
//! browser client keeps its audio element reconciled. Useful for watching
//! what every real client should currently be hearing.

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{interval, sleep};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use syncsound_backend::engine::{PlaybackEngine, VirtualEngine};
use syncsound_backend::events::{ClientCommand, ServerMessage};
use syncsound_backend::observer::Observer;
use syncsound_backend::state::now_ms;

/// Reconciliation cadence, matching the interval a UI client would use.
const TICK_INTERVAL: Duration = Duration::from_millis(200);

/// Reconnect backoff bounds. Reset on every successful connection.
const BACKOFF_INITIAL: Duration = Duration::from_secs(1);
const BACKOFF_MAX: Duration = Duration::from_secs(15);

/// Syncsound observer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket endpoint of the authority
    #[arg(
        short,
        long,
        default_value = "ws://127.0.0.1:3000/ws",
        env = "SYNCSOUND_SERVER_URL"
    )]
    server_url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "syncsound_backend=debug,syncsound_observer=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut observer = Observer::new(VirtualEngine::new());
    let mut backoff = BACKOFF_INITIAL;

    // The connection is disposable; the observer and its engine survive
    // across reconnects and resynchronize via request_state.
    loop {
        match connect_async(args.server_url.as_str()).await {
            Ok((stream, _)) => {
                info!("connected to {}", args.server_url);
                backoff = BACKOFF_INITIAL;
                if let Err(err) = run_connection(stream, &mut observer).await {
                    warn!(%err, "connection lost");
                } else {
                    info!("connection closed by server");
                }
            }
            Err(err) => warn!(%err, "connect to {} failed", args.server_url),
        }

        debug!("retrying in {backoff:?}");
        sleep(backoff).await;
        backoff = (backoff * 2).min(BACKOFF_MAX);
    }
}

async fn run_connection(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    observer: &mut Observer<VirtualEngine>,
) -> anyhow::Result<()> {
    let (mut tx, mut rx) = stream.split();

    // Resynchronize: the authority keeps no backlog of missed broadcasts.
    let request =
        serde_json::to_string(&ClientCommand::RequestState).context("encode request_state")?;
    tx.send(Message::Text(request)).await?;

    let mut ticks = interval(TICK_INTERVAL);

    loop {
        tokio::select! {
            _ = ticks.tick() => {
                if let Some(command) = observer.tick(now_ms()) {
                    let payload = serde_json::to_string(&command)?;
                    tx.send(Message::Text(payload)).await?;
                }
                trace!(
                    position = observer.engine().position(),
                    paused = observer.engine().is_paused(),
                    "tick"
                );
            }

            inbound = rx.next() => {
                let Some(message) = inbound else {
                    return Ok(());
                };
                match message? {
                    Message::Text(text) => match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(ServerMessage::State { state }) => {
                            debug!(?state, "snapshot received");
                            observer.ingest(state, now_ms());
                        }
                        Err(err) => warn!(%err, "ignoring malformed server message"),
                    },
                    Message::Close(_) => return Ok(()),
                    _ => {}
                }
            }
        }
    }
}
