//! Эндпоинты участников.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::core::types::{normalize_full_name, Participant, RoundStatus};
use crate::storage::db;

use super::{check_auth, error_response, pooled_connection, WebState};

#[derive(Debug, Deserialize)]
pub struct AddParticipantRequest {
    pub round_id: Option<i64>,
    pub full_name: Option<String>,
    pub description: Option<String>,
}

pub(crate) fn participant_value(p: &Participant) -> serde_json::Value {
    json!({
        "id": p.id,
        "order_number": p.order_number,
        "full_name": p.full_name,
        "description": p.description,
    })
}

/// POST /api/add-participant/
pub async fn add_participant_handler(
    State(state): State<WebState>,
    headers: HeaderMap,
    Json(req): Json<AddParticipantRequest>,
) -> Response {
    if let Err(resp) = check_auth(&state, &headers) {
        return resp;
    }
    let Some(round_id) = req.round_id else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "round_id обязателен"})),
        )
            .into_response();
    };

    let full_name = normalize_full_name(req.full_name.as_deref().unwrap_or(""));
    if full_name.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Имя участника обязательно"})),
        )
            .into_response();
    }
    let description = req.description.unwrap_or_default();

    let conn = match pooled_connection(&state) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };

    match db::get_round(&conn, round_id) {
        Ok(Some(round)) if round.status == RoundStatus::Active => {}
        Ok(Some(_)) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Раунд не активен"})),
            )
                .into_response()
        }
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"error": "Раунд не найден"})),
            )
                .into_response()
        }
        Err(e) => return error_response(e.into()),
    }

    let participant = match db::create_participant(&conn, round_id, &full_name, &description) {
        Ok(p) => p,
        Err(e) => return error_response(e.into()),
    };

    (
        StatusCode::CREATED,
        Json(json!({
            "participant_id": participant.id,
            "order_number": participant.order_number,
            "full_name": participant.full_name,
            "message": format!("Участник {} добавлен под номером {}", participant.full_name, participant.order_number),
        })),
    )
        .into_response()
}

/// GET /api/active-round-participants/
///
/// Отсутствие активного раунда — не ошибка: отдаём 200 с пометкой
/// error_code, чтобы бот отличал его от настоящего сбоя.
pub async fn active_round_participants_handler(State(state): State<WebState>) -> Response {
    let conn = match pooled_connection(&state) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };

    let round = match db::find_current_round(&conn) {
        Ok(Some(round)) => round,
        Ok(None) => {
            return (
                StatusCode::OK,
                Json(json!({"error_code": "no_active_round", "participants": []})),
            )
                .into_response()
        }
        Err(e) => return error_response(e.into()),
    };

    let participants = match db::list_participants(&conn, round.id) {
        Ok(participants) => participants,
        Err(e) => return error_response(e.into()),
    };
    let items: Vec<serde_json::Value> = participants.iter().map(participant_value).collect();

    (
        StatusCode::OK,
        Json(json!({
            "round_id": round.id,
            "round_number": round.number,
            "participants": items,
        })),
    )
        .into_response()
}
