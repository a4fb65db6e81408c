//! HTTP route definitions

use std::fmt::Write;

use axum::{
    extract::State,
    http::{header, Method},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::app::AppState;
use crate::game::room::ROOM_CAPACITY;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(status_handler))
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(state.config.client_origin.as_deref()))
        .with_state(state)
}

fn cors_layer(client_origin: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods([Method::GET, Method::OPTIONS]);

    match client_origin {
        // Support multiple origins (comma-separated)
        Some(origins) => {
            let allowed_origins: Vec<header::HeaderValue> = origins
                .split(',')
                .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
                .collect();
            cors.allow_origin(allowed_origins)
                .allow_headers([header::CONTENT_TYPE])
                .allow_credentials(true)
        }
        None => cors.allow_origin(Any).allow_headers(Any),
    }
}

// ============================================================================
// Status endpoints
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_rooms: usize,
    active_players: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_rooms: state.rooms.active_rooms(),
        active_players: state.rooms.total_players(),
    })
}

/// Plain-text room listing
async fn status_handler(State(state): State<AppState>) -> String {
    let rooms = state.rooms.summaries();

    let mut body = format!("Arena Battle Server - {} room(s) active\n", rooms.len());
    for (code, players) in rooms {
        let _ = writeln!(body, "  Room {}: {}/{} players", code, players, ROOM_CAPACITY);
    }
    body
}
