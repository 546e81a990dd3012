use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use landlord_server::protocol::{ClientMessage, ServerMessage};
use landlord_server::{display_name_for_user, session, RoomManager, ServerConfig, TurnEngine};
use rand::Rng;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

const MAX_NAME_LEN: usize = 20;

#[derive(Clone)]
struct AppState {
    rooms: Arc<RoomManager>,
    engine: Arc<TurnEngine>,
    next_conn: Arc<AtomicU64>,
}

#[derive(Debug, Deserialize)]
struct ConnectParams {
    id: Option<u64>,
    name: Option<String>,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let config = ServerConfig::parse();
    init_tracing(config.json_logs);

    let rooms = Arc::new(RoomManager::new(config.lobby()));
    let engine = Arc::new(TurnEngine::new(rooms.clone(), config.engine()));
    rooms.spawn_reaper(config.reap_interval());

    let state = AppState {
        rooms,
        engine,
        next_conn: Arc::new(AtomicU64::new(1)),
    };

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any));

    info!(addr = %config.bind, "listening");
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app).await
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params))
}

async fn handle_socket(socket: WebSocket, state: AppState, params: ConnectParams) {
    let user_id = params
        .id
        .filter(|id| *id != 0)
        .unwrap_or_else(|| rand::thread_rng().gen_range(1..=u32::MAX as u64));
    let user_name = params
        .name
        .map(|name| name.trim().chars().take(MAX_NAME_LEN).collect::<String>())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| display_name_for_user(user_id));
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(text) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        }
    });

    let conn = state.next_conn.fetch_add(1, Ordering::SeqCst);
    let player = state.rooms.connect(conn, user_id, &user_name, Some(tx.clone()));
    let _ = tx.send(ServerMessage::Welcome {
        user_id: player.id,
        user_name: player.name.clone(),
    });
    if player.claim_session() {
        tokio::spawn(session::run(
            state.rooms.clone(),
            state.engine.clone(),
            player.clone(),
        ));
    }

    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Input { text }) => {
                    player.deliver(text);
                }
                Ok(ClientMessage::Ping) => {
                    let _ = tx.send(ServerMessage::Pong);
                }
                Err(_) => {
                    let _ = tx.send(ServerMessage::Error {
                        message: "invalid message".to_string(),
                    });
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.rooms.disconnect(conn);
}
