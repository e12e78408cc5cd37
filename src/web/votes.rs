//! Приём голосов и сводка активного раунда.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::core::types::{RoundStatus, RoundType, VoteChoice};
use crate::storage::db;

use super::participants::participant_value;
use super::{error_response, pooled_connection, WebState};

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub round: Option<i64>,
    pub participant: Option<i64>,
    pub user_telegram_id: Option<i64>,
    pub choice: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoundInfoQuery {
    pub user_id: Option<i64>,
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({"error": message}))).into_response()
}

fn not_found(message: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"error": message}))).into_response()
}

/// POST /api/vote/
pub async fn vote_handler(State(state): State<WebState>, Json(req): Json<VoteRequest>) -> Response {
    let (Some(round_id), Some(participant_id), Some(user_id)) =
        (req.round, req.participant, req.user_telegram_id)
    else {
        return bad_request("round, participant и user_telegram_id обязательны");
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
    if round.status != RoundStatus::Active {
        return bad_request("Раунд не активен");
    }

    let participant = match db::get_participant(&conn, participant_id) {
        Ok(Some(participant)) => participant,
        Ok(None) => return not_found("Участник не найден"),
        Err(e) => return error_response(e.into()),
    };
    if participant.round_id != round.id {
        return bad_request("Участник не из этого раунда");
    }

    let choice = match (round.round_type, req.choice.as_deref()) {
        (RoundType::Standard, None) => None,
        (RoundType::Standard, Some(_)) => {
            return bad_request("В стандартном раунде ответ да/нет не передаётся")
        }
        (RoundType::Individual, Some(raw)) => match VoteChoice::from_str(raw) {
            Some(choice) => Some(choice),
            None => return bad_request("choice должен быть yes или no"),
        },
        (RoundType::Individual, None) => {
            return bad_request("В индивидуальном раунде нужен ответ yes или no")
        }
    };

    let single_vote = round.round_type == RoundType::Standard;
    match db::record_vote(&conn, round.id, participant.id, user_id, choice, single_vote) {
        Ok(true) => {}
        Ok(false) => return bad_request("Вы уже голосовали в этом раунде"),
        Err(e) => return error_response(e.into()),
    }

    log::debug!("Vote recorded: round {} participant {} user {}", round.id, participant.id, user_id);
    (
        StatusCode::CREATED,
        Json(json!({"message": format!("Голос за {} принят", participant.full_name)})),
    )
        .into_response()
}

/// GET /api/active-round-info/?user_id=
pub async fn active_round_info_handler(
    State(state): State<WebState>,
    Query(query): Query<RoundInfoQuery>,
) -> Response {
    let conn = match pooled_connection(&state) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };

    let round = match db::find_current_round(&conn) {
        Ok(Some(round)) => round,
        Ok(None) => return not_found("Активного раунда нет"),
        Err(e) => return error_response(e.into()),
    };

    let participants = match db::list_participants(&conn, round.id) {
        Ok(participants) => participants,
        Err(e) => return error_response(e.into()),
    };
    let items: Vec<serde_json::Value> = participants.iter().map(participant_value).collect();

    let mut body = json!({
        "round": {
            "id": round.id,
            "campaign_id": round.campaign_id,
            "number": round.number,
            "type": round.round_type.as_str(),
            "winners_count": round.winners_count,
            "is_current": round.is_current,
        },
        "participants": items,
        "user_vote": null,
    });

    if let Some(user_id) = query.user_id {
        match round.round_type {
            RoundType::Standard => match db::get_user_vote(&conn, round.id, user_id) {
                Ok(Some(vote)) => {
                    body["user_vote"] = json!({
                        "participant_id": vote.participant_id,
                        "participant_order": vote.participant_order,
                        "participant_name": vote.participant_name,
                        "voted_at": vote.voted_at,
                    });
                }
                Ok(None) => {}
                Err(e) => return error_response(e.into()),
            },
            RoundType::Individual => match db::list_user_choices(&conn, round.id, user_id) {
                Ok(choices) => {
                    let items: Vec<serde_json::Value> = choices
                        .iter()
                        .map(|(participant_id, choice)| {
                            json!({"participant_id": participant_id, "choice": choice})
                        })
                        .collect();
                    body["user_choices"] = serde_json::Value::Array(items);
                }
                Err(e) => return error_response(e.into()),
            },
        }
    }

    (StatusCode::OK, Json(body)).into_response()
}
