mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use chatty_api::auth::{AppState, AppStateInner};
use chatty_api::middleware::require_auth;
use chatty_api::{assist, discovery, messages, posts, profiles, relationships};
use chatty_core::{CompletionService, DisabledCompletion, Engine, HttpCompletion};
use chatty_gateway::Dispatcher;
use chatty_gateway::connection;

use crate::config::ServerConfig;

#[derive(Clone)]
struct ServerState {
    dispatcher: Dispatcher,
    jwt_secret: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatty=debug,tower_http=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;
    if config.uses_default_secret() {
        warn!("CHATTY_JWT_SECRET is not set, using the development secret");
    }

    // Init database
    let db = Arc::new(chatty_db::Database::open(&PathBuf::from(&config.db_path))?);
    let dispatcher = Dispatcher::new(db.clone());

    let completion: Arc<dyn CompletionService> = match &config.completion_url {
        Some(url) => {
            info!("Completion endpoint {} (model {})", url, config.engine.model);
            Arc::new(HttpCompletion::new(
                url.as_str(),
                config.completion_key.clone(),
                config.engine.completion_timeout,
            )?)
        }
        None => {
            warn!("CHATTY_COMPLETION_URL is not set, generation is disabled");
            Arc::new(DisabledCompletion)
        }
    };

    let engine = Engine::start(db, dispatcher.clone(), completion, config.engine.clone());
    if config.seed_bots {
        let seeded = engine.profiles().seed_bots().await?;
        info!("Seeded {} automated personas", seeded);
    }

    // Shared state
    let app_state: AppState = Arc::new(AppStateInner {
        engine,
        jwt_secret: config.jwt_secret.clone(),
    });

    let state = ServerState {
        dispatcher,
        jwt_secret: config.jwt_secret.clone(),
    };

    // Routes
    let public_routes = Router::new().route("/health", get(health));

    let protected_routes = Router::new()
        .route("/me", get(profiles::get_me))
        .route("/me/profile", put(profiles::setup_profile))
        .route("/me/reading", get(profiles::get_reading))
        .route("/users/{user_id}", get(profiles::get_user))
        .route("/people", get(relationships::people))
        .route("/contacts", get(relationships::contacts))
        .route("/friends/requests/{user_id}", post(relationships::send_request))
        .route("/friends/requests/{user_id}/accept", post(relationships::accept_request))
        .route("/friends/requests/{user_id}/decline", post(relationships::decline_request))
        .route("/discover", get(discovery::current))
        .route("/discover/like", post(discovery::like))
        .route("/discover/skip", post(discovery::skip))
        .route("/discover/refresh", post(discovery::refresh))
        .route("/chats/{peer_id}/messages", get(messages::get_messages).post(messages::send_message))
        .route("/chats/{peer_id}/messages/{message_id}/status", post(messages::set_game_status))
        .route("/chats/{peer_id}/seen", post(messages::mark_seen))
        .route(
            "/chats/{peer_id}/astro",
            get(messages::get_persona_details).put(messages::set_persona_details),
        )
        .route("/chats/{peer_id}/assist/rephrase", post(assist::rephrase))
        .route("/chats/{peer_id}/assist/translate", post(assist::translate))
        .route("/chats/{peer_id}/assist/suggest", post(assist::suggest))
        .route("/chats/{peer_id}/games/truth-or-dare", post(assist::truth_or_dare))
        .route("/chats/{peer_id}/games/report", post(assist::report))
        .route("/chats/{peer_id}/games/astro", post(assist::astro))
        .route("/posts", get(posts::list_posts).post(posts::create_post))
        .route("/posts/{post_id}/like", post(posts::toggle_like))
        .layer(middleware::from_fn_with_state(app_state.clone(), require_auth))
        .with_state(app_state);

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        );

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Chatty server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn ws_upgrade(
    State(state): State<ServerState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, state.dispatcher, state.jwt_secret)
    })
}
