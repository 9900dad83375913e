//! Syncsound backend: the authority process.
//!
//! Serves the WebSocket distribution channel, accepts media uploads and
//! serves the uploaded files back to observers.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{DefaultBodyLimit, Multipart, State, WebSocketUpgrade};
use axum::http::{StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use futures_util::sink::SinkExt;
use futures_util::stream::{SplitSink, StreamExt};
use serde_json::json;
use tokio::time::timeout;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use syncsound_backend::config::Args;
use syncsound_backend::error::Error;
use syncsound_backend::events::{ClientCommand, ServerMessage};
use syncsound_backend::player::{Player, PlayerHandle};
use syncsound_backend::state::{now_ms, PlaybackState};
use syncsound_backend::upload::{UploadStore, URL_PREFIX};

/// Idle connections get the current state re-sent so that intermediaries do
/// not reap an apparently silent socket.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(5);

/// Upload cap; the file is buffered in memory while it is stored.
const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

#[derive(Clone)]
struct AppState {
    player: PlayerHandle,
    uploads: Arc<UploadStore>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "syncsound_backend=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    info!("starting syncsound backend on {}", args.listen_addr);

    let uploads = Arc::new(
        UploadStore::open(args.uploads_dir.clone())
            .await
            .context("failed to prepare uploads directory")?,
    );
    let player = Player::new(now_ms()).into_handle();

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route(
            "/upload",
            post(handle_upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .nest_service(URL_PREFIX, ServeDir::new(uploads.dir()))
        .fallback(fallback)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { player, uploads });

    let listener = tokio::net::TcpListener::bind(&args.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", args.listen_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

/// Stores the uploaded file, resets the authoritative state to the new
/// media and replies with the URL plus the snapshot the reset produced.
async fn handle_upload(
    State(app): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, Error> {
    let mut stored_url = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("audio") {
            continue;
        }
        let file_name = field.file_name().map(str::to_owned);
        let data = field.bytes().await?;
        stored_url = Some(app.uploads.store(file_name.as_deref(), &data).await?);
        break;
    }

    let audio_url = stored_url.ok_or(Error::MissingUpload)?;

    let state = {
        let mut player = app.player.write().unwrap();
        player.load_media(audio_url.clone(), now_ms());
        player.snapshot()
    };
    info!(%audio_url, "new media uploaded");

    Ok(Json(json!({ "audioUrl": audio_url, "state": state })))
}

async fn ws_handler(ws: WebSocketUpgrade, State(app): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, app.player))
}

async fn handle_socket(socket: WebSocket, player: PlayerHandle) {
    let (mut sender, mut receiver) = socket.split();
    let mut changes = { player.read().unwrap().subscribe() };

    // New connections get the current state before anything else.
    let snapshot = { player.read().unwrap().snapshot() };
    if send_state(&mut sender, snapshot).await.is_err() {
        debug!("client went away during initial send");
        return;
    }

    loop {
        tokio::select! {
            changed = timeout(KEEPALIVE_INTERVAL, changes.changed()) => {
                let snapshot = match changed {
                    // Nothing changed for a while: re-send as keepalive.
                    Err(_) => player.read().unwrap().snapshot(),
                    // The authority is gone, nothing left to distribute.
                    Ok(Err(_)) => return,
                    Ok(Ok(())) => changes.borrow_and_update().clone(),
                };
                if send_state(&mut sender, snapshot).await.is_err() {
                    debug!("client disconnected");
                    return;
                }
            }

            inbound = receiver.next() => {
                let Some(Ok(message)) = inbound else {
                    debug!("client closed connection");
                    return;
                };
                if let Message::Text(text) = message {
                    handle_command(&text, &player, &mut sender).await;
                }
            }
        }
    }
}

/// Applies one inbound frame. Malformed payloads are dropped with a log
/// line and the connection stays open.
async fn handle_command(
    text: &str,
    player: &PlayerHandle,
    sender: &mut SplitSink<WebSocket, Message>,
) {
    let command = match serde_json::from_str::<ClientCommand>(text) {
        Ok(command) => command,
        Err(err) => {
            warn!(%err, "ignoring malformed client message");
            return;
        }
    };

    match command {
        ClientCommand::RequestState => {
            // Replied to the requester only, never broadcast.
            let snapshot = { player.read().unwrap().snapshot() };
            if send_state(sender, snapshot).await.is_err() {
                debug!("client went away before state reply");
            }
        }
        command => {
            player.write().unwrap().apply(command, now_ms());
        }
    }
}

async fn send_state(
    sender: &mut SplitSink<WebSocket, Message>,
    snapshot: PlaybackState,
) -> Result<(), axum::Error> {
    let payload = serde_json::to_string(&ServerMessage::State { state: snapshot }).unwrap();
    sender.send(Message::Text(payload)).await
}

async fn fallback(uri: Uri) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("No route for {uri}"))
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    info!("shutdown requested");
}
