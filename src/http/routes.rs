//! HTTP route definitions

use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use uuid::Uuid;

use crate::app::AppState;
use crate::assets::{manifest, AssetRef, MANIFEST};
use crate::game::goal::GeometryError;
use crate::game::{Iteration, MatchHandle, MatchStatus, SceneCommand};
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;
use crate::ws::protocol::{Character, SceneEntry};

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    let asset_routes = Router::new()
        .route("/assets", get(assets_handler))
        .route("/assets/:key", get(texture_handler));

    let match_routes = Router::new()
        .route("/matches", post(start_match_handler))
        .route(
            "/matches/:id",
            get(match_status_handler).delete(end_match_handler),
        )
        .route("/matches/:id/focus", post(focus_handler))
        .route("/matches/:id/ws", get(ws_handler));

    Router::new()
        .route("/health", get(health_handler))
        .merge(asset_routes)
        .merge(match_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(Duration::from_secs(30)))
                .layer(cors),
        )
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_matches: usize,
    cached_textures: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_matches: state.match_registry.active_matches(),
        cached_textures: state.textures.len(),
    })
}

// ============================================================================
// Asset endpoints
// ============================================================================

#[derive(Serialize)]
struct AssetEntry {
    #[serde(flatten)]
    asset: AssetRef,
    cached: bool,
}

#[derive(Serialize)]
struct CharacterTexture {
    character: Character,
    texture_key: &'static str,
}

#[derive(Serialize)]
struct AssetsResponse {
    assets: Vec<AssetEntry>,
    characters: Vec<CharacterTexture>,
}

async fn assets_handler(State(state): State<AppState>) -> Json<AssetsResponse> {
    let assets = MANIFEST
        .iter()
        .map(|asset| AssetEntry {
            asset: *asset,
            cached: state.textures.contains(asset.key),
        })
        .collect();

    let characters = [Character::Messi, Character::Ronaldo]
        .into_iter()
        .map(|character| CharacterTexture {
            character,
            texture_key: character.texture_key(),
        })
        .collect();

    Json(AssetsResponse { assets, characters })
}

async fn texture_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let asset = manifest::find(&key)
        .ok_or_else(|| AppError::NotFound(format!("Unknown asset {}", key)))?;
    let bytes = state
        .textures
        .get(asset.key)
        .ok_or_else(|| AppError::NotFound(format!("Asset {} is not loaded", asset.key)))?;

    Ok(([(header::CONTENT_TYPE, "image/png")], bytes).into_response())
}

// ============================================================================
// Match endpoints
// ============================================================================

#[derive(Debug, Deserialize)]
struct StartQuery {
    iteration: Option<String>,
}

#[derive(Serialize)]
struct StartMatchResponse {
    scene_id: Uuid,
    ws_url: String,
    status: MatchStatus,
}

async fn start_match_handler(
    State(state): State<AppState>,
    Query(query): Query<StartQuery>,
    Json(entry): Json<SceneEntry>,
) -> Result<(StatusCode, Json<StartMatchResponse>), AppError> {
    let iteration = query
        .iteration
        .as_deref()
        .map(str::parse::<Iteration>)
        .transpose()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let settings = state.match_settings(iteration);
    let handle = state.match_registry.start(
        entry,
        settings,
        state.asset_loader.clone(),
        state.textures.clone(),
    )?;

    info!(
        scene_id = %handle.id,
        match_id = ?handle.entry.match_id,
        is_host = handle.entry.is_host,
        iteration = %settings.iteration,
        "Match scene requested"
    );

    // Generate the WebSocket URL the page shell connects to
    let ws_url = format!(
        "{}/matches/{}/ws",
        state
            .config
            .public_base_url
            .replace("https://", "wss://")
            .replace("http://", "ws://"),
        handle.id
    );

    Ok((
        StatusCode::CREATED,
        Json(StartMatchResponse {
            scene_id: handle.id,
            ws_url,
            status: handle.status(),
        }),
    ))
}

fn find_match(state: &AppState, id: Uuid) -> Result<MatchHandle, AppError> {
    state
        .match_registry
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("No running scene {}", id)))
}

async fn match_status_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchStatus>, AppError> {
    Ok(Json(find_match(&state, id)?.status()))
}

#[derive(Deserialize)]
struct FocusRequest {
    focused: bool,
}

async fn focus_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<FocusRequest>,
) -> Result<StatusCode, AppError> {
    let handle = find_match(&state, id)?;
    handle
        .command_tx
        .send(SceneCommand::Focus(req.focused))
        .await
        .map_err(|_| AppError::Gone(format!("Scene {} has ended", id)))?;

    Ok(StatusCode::ACCEPTED)
}

/// How long DELETE waits for the scene to broadcast `scene_ended`
const END_GRACE: Duration = Duration::from_secs(2);

async fn end_match_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MatchStatus>, AppError> {
    let handle = find_match(&state, id)?;
    let status = handle.stop("ended by request", END_GRACE).await;
    state.match_registry.remove(&id);

    info!(scene_id = %id, phase = ?status.phase, "Match scene ended by request");
    Ok(Json(status))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Gone: {0}")]
    Gone(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<GeometryError> for AppError {
    fn from(err: GeometryError) -> Self {
        AppError::Internal(format!("Invalid goal geometry: {}", err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Gone(msg) => (StatusCode::GONE, msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
