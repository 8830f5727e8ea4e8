use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use chrono::Utc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use courier_api::middleware::require_auth;
use courier_api::{AppState, AppStateInner, RuntimeConfig, conversations, messages, presence, settings};
use courier_gateway::connection;
use courier_gateway::dispatcher::Dispatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("COURIER_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("COURIER_DB_PATH").unwrap_or_else(|_| "courier.db".into());
    let host = std::env::var("COURIER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("COURIER_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let typing_ttl_secs: i64 = std::env::var("COURIER_TYPING_TTL_SECS")
        .unwrap_or_else(|_| "5".into())
        .parse()?;
    let online_stale_secs: i64 = std::env::var("COURIER_ONLINE_STALE_SECS")
        .unwrap_or_else(|_| "30".into())
        .parse()?;
    let sweep_interval_secs: u64 = std::env::var("COURIER_SWEEP_INTERVAL_SECS")
        .unwrap_or_else(|_| "10".into())
        .parse()?;

    // Init database
    let db = Arc::new(courier_db::Database::open(&PathBuf::from(&db_path))?);

    // Shared state
    let dispatcher = Dispatcher::new();
    let state: AppState = Arc::new(AppStateInner {
        db: db.clone(),
        dispatcher: dispatcher.clone(),
        config: RuntimeConfig {
            jwt_secret,
            typing_ttl_secs,
            online_stale_secs,
        },
    });

    // Routes
    let api_routes = Router::new()
        .route(
            "/conversations",
            post(conversations::open_conversation).get(conversations::list_conversations),
        )
        .route(
            "/conversations/{conversation_id}/messages",
            get(messages::get_messages).post(messages::send_message),
        )
        .route("/conversations/{conversation_id}/read", post(conversations::mark_read))
        .route(
            "/conversations/{conversation_id}/typing",
            post(presence::set_typing).get(presence::get_typing),
        )
        .route(
            "/conversations/{conversation_id}/settings",
            put(settings::update_settings),
        )
        .route("/messages/{message_id}", delete(messages::delete_message))
        .route("/presence/heartbeat", post(presence::heartbeat))
        .route("/presence/{user_id}", get(presence::get_presence))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state.clone());

    let app = Router::new()
        .merge(api_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    // Scheduled typing sweep: the store exposes the idempotent operation,
    // the process owns the schedule. Aborting mid-run is safe; leftover
    // expired rows are picked up on the next tick.
    let sweep_db = db.clone();
    let sweep_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(sweep_interval_secs));
        loop {
            ticker.tick().await;
            let db = sweep_db.clone();
            let result =
                tokio::task::spawn_blocking(move || db.sweep_expired_typing(Utc::now().timestamp_millis()))
                    .await;
            match result {
                Ok(Ok(0)) => {}
                Ok(Ok(n)) => debug!("Swept {} expired typing rows", n),
                Ok(Err(e)) => warn!("Typing sweep failed: {}", e),
                Err(e) => warn!("Typing sweep join error: {}", e),
            }
        }
    });

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Courier server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweep_task.abort();
    info!("Courier server shut down");

    Ok(())
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(
            socket,
            state.dispatcher.clone(),
            state.db.clone(),
            state.config.jwt_secret.clone(),
            state.config.typing_ttl_secs,
        )
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
}
