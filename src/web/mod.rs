//! REST-бэкенд голосования.
//!
//! Поднимается командой `golosbot serve` на WEB_PORT (по умолчанию 8000).
//! Бот ходит сюда по HTTP; хранилище — SQLite через пул соединений.

pub mod campaigns;
pub mod participants;
pub mod rounds;
pub mod votes;

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::core::error::AppError;
use crate::storage::db::DbPool;

/// Shared state for the voting API.
#[derive(Clone)]
pub struct WebState {
    pub db: Arc<DbPool>,
    pub auth_token: Option<String>,
}

/// Собирает роутер API. Выделено из start_web_server ради тестов.
pub fn build_router(state: WebState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/active-campaigns/", get(campaigns::active_campaigns_handler))
        .route("/api/create-campaign/", post(campaigns::create_campaign_handler))
        .route("/api/active-rounds/", get(rounds::active_rounds_handler))
        .route("/api/start-round/", post(rounds::start_round_handler))
        .route("/api/end-round/", post(rounds::end_round_handler))
        .route("/api/set-current-round/", post(rounds::set_current_round_handler))
        .route("/api/get-current-round/", get(rounds::get_current_round_handler))
        .route("/api/transfer-winners/", post(rounds::transfer_winners_handler))
        .route("/api/add-participant/", post(participants::add_participant_handler))
        .route("/api/active-round-participants/", get(participants::active_round_participants_handler))
        .route("/api/vote/", post(votes::vote_handler))
        .route("/api/active-round-info/", get(votes::active_round_info_handler))
        .with_state(state)
}

/// Start the voting API server.
pub async fn start_web_server(
    port: u16,
    db: Arc<DbPool>,
    auth_token: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = build_router(WebState { db, auth_token });

    log::info!("Starting voting API on http://{}", addr);
    log::info!("  /health                        - Health check");
    log::info!("  /api/active-campaigns/         - Campaign list");
    log::info!("  /api/active-rounds/            - Round list");
    log::info!("  /api/vote/                     - Vote submission");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// GET /health — simple health check.
async fn health_handler() -> Response {
    (StatusCode::OK, "ok").into_response()
}

/// Проверка Bearer-токена на админских эндпоинтах. Пустой токен в
/// конфигурации отключает проверку.
pub(crate) fn check_auth(state: &WebState, headers: &HeaderMap) -> Result<(), Response> {
    let Some(expected) = &state.auth_token else {
        return Ok(());
    };

    let provided = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if provided == Some(expected.as_str()) {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Не авторизован"})),
        )
            .into_response())
    }
}

/// Переводит AppError в HTTP-ответ с текстом ошибки.
pub(crate) fn error_response(err: AppError) -> Response {
    let status = match &err {
        AppError::Validation(_) => StatusCode::BAD_REQUEST,
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        log::error!("API error: {}", err);
    }
    (status, Json(json!({"error": err.to_string()}))).into_response()
}

/// Достаёт соединение из пула или отвечает 500.
pub(crate) fn pooled_connection(
    state: &WebState,
) -> Result<crate::storage::db::DbConnection, Response> {
    crate::storage::db::get_connection(&state.db).map_err(|e| error_response(e.into()))
}
