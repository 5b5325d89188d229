//! HTTP API for room actions.
//!
//! Every mutating endpoint answers the acting caller with the committed room;
//! everybody else in the room learns about it over the WebSocket channel.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

use crate::game::GameError;
use crate::protocol::*;
use crate::state::{AppState, Caller};
use crate::store::StoreError;
use crate::ws;

/// Header carrying the token handed out by `enter-room`
pub const SESSION_HEADER: &str = "x-session-token";

/// Errors an endpoint can answer with
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("missing or unknown session")]
    Unauthenticated,

    #[error(transparent)]
    Game(#[from] GameError),
}

impl GameError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GameError::RoomNotFound | GameError::UserNotFound => StatusCode::NOT_FOUND,
            GameError::NotAuthorized => StatusCode::FORBIDDEN,
            GameError::UsernameTaken
            | GameError::PersistenceConflict
            | GameError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            GameError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for GameError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            GameError::Store(_) => "internal error".to_string(),
            other => other.to_string(),
        };
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::warn!(status = status.as_u16(), "Rejected action: {}", message);
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "missing or unknown session" })),
            )
                .into_response(),
            ApiError::Game(e) => e.into_response(),
        }
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Resolve the session header to a token and its seat
async fn session(state: &AppState, headers: &HeaderMap) -> Result<(String, Caller), ApiError> {
    let token = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::Unauthenticated)?;

    let caller = state
        .sessions
        .get(token)
        .await
        .ok_or(ApiError::Unauthenticated)?;
    Ok((token.to_string(), caller))
}

/// All routes, ready for `with_state`
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/status", get(status))
        .route("/api/check-session", get(check_session))
        .route("/api/enter-room", post(enter_room))
        .route("/api/leave-room", post(leave_room))
        .route("/api/kick-user", post(kick_user))
        .route("/api/room", get(get_room))
        .route("/api/start-game", post(start_game))
        .route("/api/end-turn", post(end_turn))
        .route("/api/vote", post(vote))
        .route("/api/host-vote", post(host_vote))
        .route("/api/end-game", post(end_game))
        .route("/api/leave-game", post(leave_game))
        .route("/ws", get(ws::ws_handler))
}

/// GET /api/status
pub async fn status() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /api/check-session
pub async fn check_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<SeatedSession> {
    let (token, _) = session(&state, &headers).await?;
    state
        .check_session(&token)
        .await
        .map(Json)
        .ok_or(ApiError::Unauthenticated)
}

/// POST /api/enter-room
pub async fn enter_room(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EnterRoomRequest>,
) -> ApiResult<SessionInfo> {
    Ok(Json(state.enter_room(&request).await?))
}

/// POST /api/leave-room
pub async fn leave_room(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<RoomEvent> {
    let (token, caller) = session(&state, &headers).await?;
    Ok(Json(state.leave_room(&token, &caller).await?))
}

/// POST /api/kick-user
pub async fn kick_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<KickUserRequest>,
) -> ApiResult<RoomEvent> {
    let (_, caller) = session(&state, &headers).await?;
    Ok(Json(state.kick_user(&caller, &request.user_to_kick).await?))
}

/// GET /api/room
pub async fn get_room(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<RoomView> {
    let (_, caller) = session(&state, &headers).await?;
    Ok(Json(state.room_view(&caller).await?))
}

/// POST /api/start-game
pub async fn start_game(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<StartGameRequest>,
) -> ApiResult<RoomEvent> {
    let (_, caller) = session(&state, &headers).await?;
    Ok(Json(state.start_game(&caller, &request).await?))
}

/// POST /api/end-turn
pub async fn end_turn(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<RoomEvent> {
    let (_, caller) = session(&state, &headers).await?;
    Ok(Json(state.end_turn(&caller).await?))
}

/// POST /api/vote
pub async fn vote(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<VoteRequest>,
) -> ApiResult<RoomEvent> {
    let (_, caller) = session(&state, &headers).await?;
    Ok(Json(state.vote(&caller, request.chosen_user).await?))
}

/// POST /api/host-vote
pub async fn host_vote(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<VoteRequest>,
) -> ApiResult<RoomEvent> {
    let (_, caller) = session(&state, &headers).await?;
    Ok(Json(state.host_vote(&caller, request.chosen_user).await?))
}

/// POST /api/end-game
pub async fn end_game(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<EndGameRequest>,
) -> ApiResult<RoomEvent> {
    let (_, caller) = session(&state, &headers).await?;
    Ok(Json(state.end_game(&caller, &request).await?))
}

/// POST /api/leave-game
pub async fn leave_game(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<RoomEvent> {
    let (_, caller) = session(&state, &headers).await?;
    Ok(Json(state.leave_game(&caller).await?))
}
