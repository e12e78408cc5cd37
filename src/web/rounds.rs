//! Эндпоинты раундов: запуск, завершение, текущий раунд, перенос победителей.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::core::types::{Round, RoundStatus, RoundType};
use crate::storage::db;
use crate::voting::{transfer_winners, winners::round_winners};

use super::{check_auth, error_response, pooled_connection, WebState};

#[derive(Debug, Deserialize)]
pub struct StartRoundRequest {
    pub campaign_id: Option<i64>,
    pub number: Option<i64>,
    pub winners_count: Option<i64>,
    #[serde(rename = "type")]
    pub round_type: Option<RoundType>,
}

#[derive(Debug, Deserialize)]
pub struct RoundIdRequest {
    pub round_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub round_id: Option<i64>,
    pub target_round_id: Option<i64>,
}

fn round_value(round: &Round) -> serde_json::Value {
    json!({
        "id": round.id,
        "campaign_id": round.campaign_id,
        "number": round.number,
        "status": round.status.as_str(),
        "type": round.round_type.as_str(),
        "winners_count": round.winners_count,
        "is_current": round.is_current,
        "started_at": round.started_at,
        "ended_at": round.ended_at,
    })
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({"error": message}))).into_response()
}

fn not_found(message: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"error": message}))).into_response()
}

/// GET /api/active-rounds/
pub async fn active_rounds_handler(State(state): State<WebState>) -> Response {
    let conn = match pooled_connection(&state) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };

    let rounds = match db::list_active_rounds(&conn) {
        Ok(rounds) => rounds,
        Err(e) => return error_response(e.into()),
    };

    let items: Vec<serde_json::Value> = rounds
        .iter()
        .map(|info| {
            json!({
                "id": info.round.id,
                "number": info.round.number,
                "campaign_name": info.campaign_name,
                "campaign_order_number": info.campaign_order_number,
                "status": info.round.status.as_str(),
                "type": info.round.round_type.as_str(),
                "winners_count": info.round.winners_count,
                "is_current": info.round.is_current,
                "started_at": info.round.started_at,
                "ended_at": info.round.ended_at,
            })
        })
        .collect();

    (StatusCode::OK, Json(json!({"rounds": items}))).into_response()
}

/// POST /api/start-round/
pub async fn start_round_handler(
    State(state): State<WebState>,
    headers: HeaderMap,
    Json(req): Json<StartRoundRequest>,
) -> Response {
    if let Err(resp) = check_auth(&state, &headers) {
        return resp;
    }
    let Some(campaign_id) = req.campaign_id else {
        return bad_request("campaign_id обязателен");
    };

    let conn = match pooled_connection(&state) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };

    let campaign = match db::get_campaign(&conn, campaign_id) {
        Ok(Some(campaign)) => campaign,
        Ok(None) => return not_found("Кампания не найдена"),
        Err(e) => return error_response(e.into()),
    };

    let number = match req.number {
        Some(number) if number < 1 => return bad_request("Номер раунда должен быть не меньше 1"),
        Some(number) => number,
        None => match db::next_round_number(&conn, campaign_id) {
            Ok(number) => number,
            Err(e) => return error_response(e.into()),
        },
    };
    match db::round_number_exists(&conn, campaign_id, number) {
        Ok(true) => {
            return bad_request(&format!("Раунд №{} уже есть в этой кампании", number));
        }
        Ok(false) => {}
        Err(e) => return error_response(e.into()),
    }

    let winners_count = req.winners_count.unwrap_or(3);
    if winners_count < 1 {
        return bad_request("winners_count должен быть не меньше 1");
    }
    let round_type = req.round_type.unwrap_or_default();

    let round_id = match db::create_round(&conn, campaign_id, number, winners_count, round_type) {
        Ok(id) => id,
        Err(e) => return error_response(e.into()),
    };

    log::info!("Round #{} ({}) started in campaign '{}'", number, round_type, campaign.name);
    (
        StatusCode::CREATED,
        Json(json!({
            "round_id": round_id,
            "round_number": number,
            "round_type": round_type.as_str(),
            "message": format!("Раунд №{} запущен в кампании {}", number, campaign.name),
        })),
    )
        .into_response()
}

/// POST /api/end-round/
pub async fn end_round_handler(
    State(state): State<WebState>,
    headers: HeaderMap,
    Json(req): Json<RoundIdRequest>,
) -> Response {
    if let Err(resp) = check_auth(&state, &headers) {
        return resp;
    }
    let Some(round_id) = req.round_id else {
        return bad_request("round_id обязателен");
    };

    let conn = match pooled_connection(&state) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };

    let round = match db::get_round(&conn, round_id) {
        Ok(Some(round)) => round,
        Ok(None) => return not_found("Раунд не найден"),
        Err(e) => return error_response(e.into()),
    };
    if round.status == RoundStatus::Ended {
        return bad_request("Раунд уже завершён");
    }

    if let Err(e) = db::mark_round_ended(&conn, round_id) {
        return error_response(e.into());
    }

    let winners = match round_winners(&conn, &round) {
        Ok(winners) => winners,
        Err(e) => return error_response(e),
    };

    let individual = round.round_type == RoundType::Individual;
    let winners_json: Vec<serde_json::Value> = winners
        .iter()
        .map(|w| {
            let mut value = json!({
                "participant_id": w.participant_id,
                "full_name": w.full_name,
                "votes": w.votes,
            });
            if individual {
                value["yes_voters"] = json!(w.yes_voters);
            }
            value
        })
        .collect();

    log::info!("Round #{} ended with {} winner(s)", round.number, winners.len());
    (
        StatusCode::OK,
        Json(json!({
            "message": format!("Раунд #{} завершён", round.number),
            "winners_count": round.winners_count,
            "winners": winners_json,
            "round_type": round.round_type.as_str(),
            "ended_round_campaign_id": round.campaign_id,
        })),
    )
        .into_response()
}

/// POST /api/set-current-round/
pub async fn set_current_round_handler(
    State(state): State<WebState>,
    headers: HeaderMap,
    Json(req): Json<RoundIdRequest>,
) -> Response {
    if let Err(resp) = check_auth(&state, &headers) {
        return resp;
    }
    let Some(round_id) = req.round_id else {
        return bad_request("round_id обязателен");
    };

    let conn = match pooled_connection(&state) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };

    match db::get_round(&conn, round_id) {
        Ok(Some(round)) if round.status == RoundStatus::Active => {}
        Ok(Some(_)) => return not_found("Раунд не активен"),
        Ok(None) => return not_found("Раунд не найден"),
        Err(e) => return error_response(e.into()),
    }

    if let Err(e) = db::set_current_round(&conn, round_id) {
        return error_response(e.into());
    }

    (
        StatusCode::OK,
        Json(json!({"message": format!("Раунд {} назначен текущим", round_id)})),
    )
        .into_response()
}

/// GET /api/get-current-round/
pub async fn get_current_round_handler(State(state): State<WebState>) -> Response {
    let conn = match pooled_connection(&state) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };

    match db::find_current_round(&conn) {
        Ok(Some(round)) => (
            StatusCode::OK,
            Json(json!({"current_round_id": round.id, "round": round_value(&round)})),
        )
            .into_response(),
        Ok(None) => (StatusCode::OK, Json(json!({"current_round_id": null}))).into_response(),
        Err(e) => error_response(e.into()),
    }
}

/// POST /api/transfer-winners/
pub async fn transfer_winners_handler(
    State(state): State<WebState>,
    headers: HeaderMap,
    Json(req): Json<TransferRequest>,
) -> Response {
    if let Err(resp) = check_auth(&state, &headers) {
        return resp;
    }
    let (Some(round_id), Some(target_round_id)) = (req.round_id, req.target_round_id) else {
        return bad_request("round_id и target_round_id обязательны");
    };

    let conn = match pooled_connection(&state) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };

    match transfer_winners(&conn, round_id, target_round_id) {
        Ok(summary) => (
            StatusCode::OK,
            Json(json!({
                "transferred": summary.transferred,
                "total_winners": summary.total_winners,
                "errors": summary.errors,
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}
