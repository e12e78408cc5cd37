//! Эндпоинты кампаний.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::storage::db;

use super::{check_auth, error_response, pooled_connection, WebState};

#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    pub name: Option<String>,
    pub admin_telegram_id: Option<i64>,
}

/// GET /api/active-campaigns/
pub async fn active_campaigns_handler(State(state): State<WebState>) -> Response {
    let conn = match pooled_connection(&state) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };

    let campaigns = match db::list_active_campaigns(&conn) {
        Ok(campaigns) => campaigns,
        Err(e) => return error_response(e.into()),
    };

    let items: Vec<serde_json::Value> = campaigns
        .iter()
        .map(|c| {
            json!({
                "id": c.id,
                "name": c.name,
                "campaign_order_number": c.order_number,
                "created_at": c.created_at,
            })
        })
        .collect();

    (StatusCode::OK, Json(json!({"campaigns": items, "total": items.len()}))).into_response()
}

/// POST /api/create-campaign/
pub async fn create_campaign_handler(
    State(state): State<WebState>,
    headers: HeaderMap,
    Json(req): Json<CreateCampaignRequest>,
) -> Response {
    if let Err(resp) = check_auth(&state, &headers) {
        return resp;
    }

    let name = match req.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Название кампании обязательно"})),
            )
                .into_response()
        }
    };
    let Some(admin_telegram_id) = req.admin_telegram_id else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "admin_telegram_id обязателен"})),
        )
            .into_response();
    };

    let conn = match pooled_connection(&state) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };

    let campaign_id = match db::create_campaign(&conn, &name, admin_telegram_id) {
        Ok(id) => id,
        Err(e) => return error_response(e.into()),
    };
    let order = match db::campaign_order_number(&conn, campaign_id) {
        Ok(order) => order,
        Err(e) => return error_response(e.into()),
    };

    log::info!("Campaign #{} '{}' created by {}", order, name, admin_telegram_id);
    (
        StatusCode::CREATED,
        Json(json!({
            "campaign_id": campaign_id,
            "campaign_order_number": order,
            "message": format!("Кампания #{} '{}' создана", order, name),
        })),
    )
        .into_response()
}
