//! HTTP-клиент бота к бэкенду голосования.
//!
//! Бот не трогает базу напрямую: всё идёт через REST API. Таймауты
//! жёсткие (8 с на чтение, 10 с на запись), ретраев нет — ошибка сразу
//! уходит пользователю в чат.

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config;
use crate::core::error::{AppError, AppResult};

#[derive(Debug, Clone, Deserialize)]
pub struct CampaignSummary {
    pub id: i64,
    pub name: String,
    pub campaign_order_number: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoundSummary {
    pub id: i64,
    pub number: i64,
    pub campaign_name: String,
    pub campaign_order_number: i64,
    #[serde(rename = "type")]
    pub round_type: String,
    pub winners_count: i64,
    pub is_current: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartedRound {
    pub round_id: i64,
    pub round_number: i64,
    pub round_type: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WinnerSummary {
    pub participant_id: i64,
    pub full_name: String,
    pub votes: i64,
    #[serde(default)]
    pub yes_voters: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndedRound {
    pub winners_count: i64,
    pub winners: Vec<WinnerSummary>,
    pub round_type: String,
    pub ended_round_campaign_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddedParticipant {
    pub participant_id: i64,
    pub order_number: i64,
    pub full_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActiveRoundBrief {
    pub id: i64,
    pub number: i64,
    #[serde(rename = "type")]
    pub round_type: String,
    pub winners_count: i64,
    pub is_current: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParticipantBrief {
    pub id: i64,
    pub order_number: i64,
    pub full_name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserVoteBrief {
    pub participant_order: i64,
    pub participant_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserChoiceBrief {
    pub participant_id: i64,
    pub choice: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActiveRoundInfo {
    pub round: ActiveRoundBrief,
    pub participants: Vec<ParticipantBrief>,
    pub user_vote: Option<UserVoteBrief>,
    #[serde(default)]
    pub user_choices: Vec<UserChoiceBrief>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferOutcome {
    pub transferred: u32,
    pub total_winners: u32,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Клиент API голосования.
#[derive(Clone)]
pub struct VotingApi {
    base: String,
    get_client: Client,
    post_client: Client,
    auth_token: Option<String>,
}

impl VotingApi {
    pub fn new(base_url: &str, auth_token: Option<String>) -> AppResult<Self> {
        Ok(Self {
            base: base_url.trim_end_matches('/').to_string(),
            get_client: Client::builder().timeout(config::network::get_timeout()).build()?,
            post_client: Client::builder().timeout(config::network::post_timeout()).build()?,
            auth_token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn read_body(response: reqwest::Response) -> AppResult<Value> {
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if status.is_success() {
            return Ok(body);
        }

        let message = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("Бэкенд вернул ошибку")
            .to_string();
        Err(AppError::Api { status, message })
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> AppResult<Value> {
        let response = self.get_client.get(self.url(path)).query(query).send().await?;
        Self::read_body(response).await
    }

    async fn post(&self, path: &str, body: Value, admin: bool) -> AppResult<Value> {
        let mut request = self.post_client.post(self.url(path)).json(&body);
        if admin {
            if let Some(token) = &self.auth_token {
                request = request.bearer_auth(token);
            }
        }
        Self::read_body(request.send().await?).await
    }

    fn parse<T: serde::de::DeserializeOwned>(value: Value) -> AppResult<T> {
        serde_json::from_value(value)
            .map_err(|e| AppError::Validation(format!("Неожиданный ответ бэкенда: {}", e)))
    }

    pub async fn active_campaigns(&self) -> AppResult<Vec<CampaignSummary>> {
        let body = self.get("/api/active-campaigns/", &[]).await?;
        Self::parse(body.get("campaigns").cloned().unwrap_or(Value::Array(vec![])))
    }

    pub async fn create_campaign(&self, name: &str, admin_telegram_id: i64) -> AppResult<i64> {
        let body = self
            .post(
                "/api/create-campaign/",
                json!({"name": name, "admin_telegram_id": admin_telegram_id}),
                true,
            )
            .await?;
        body.get("campaign_id").and_then(Value::as_i64).ok_or_else(|| {
            AppError::Validation("Бэкенд не вернул campaign_id".to_string())
        })
    }

    pub async fn active_rounds(&self) -> AppResult<Vec<RoundSummary>> {
        let body = self.get("/api/active-rounds/", &[]).await?;
        Self::parse(body.get("rounds").cloned().unwrap_or(Value::Array(vec![])))
    }

    pub async fn start_round(
        &self,
        campaign_id: i64,
        number: Option<i64>,
        winners_count: Option<i64>,
        round_type: Option<&str>,
    ) -> AppResult<StartedRound> {
        let mut body = json!({"campaign_id": campaign_id});
        if let Some(number) = number {
            body["number"] = json!(number);
        }
        if let Some(winners_count) = winners_count {
            body["winners_count"] = json!(winners_count);
        }
        if let Some(round_type) = round_type {
            body["type"] = json!(round_type);
        }
        Self::parse(self.post("/api/start-round/", body, true).await?)
    }

    pub async fn end_round(&self, round_id: i64) -> AppResult<EndedRound> {
        Self::parse(self.post("/api/end-round/", json!({"round_id": round_id}), true).await?)
    }

    pub async fn add_participant(
        &self,
        round_id: i64,
        full_name: &str,
        description: &str,
    ) -> AppResult<AddedParticipant> {
        Self::parse(
            self.post(
                "/api/add-participant/",
                json!({"round_id": round_id, "full_name": full_name, "description": description}),
                true,
            )
            .await?,
        )
    }

    /// Отправляет голос. Возвращает текст подтверждения от бэкенда.
    pub async fn vote(
        &self,
        round_id: i64,
        participant_id: i64,
        user_telegram_id: i64,
        choice: Option<&str>,
    ) -> AppResult<String> {
        let mut body = json!({
            "round": round_id,
            "participant": participant_id,
            "user_telegram_id": user_telegram_id,
        });
        if let Some(choice) = choice {
            body["choice"] = json!(choice);
        }
        let response = self.post("/api/vote/", body, false).await?;
        Ok(response
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Голос принят")
            .to_string())
    }

    /// Участники текущего раунда. None — активного раунда нет
    /// (бэкенд шлёт сентинел error_code, а не ошибку).
    pub async fn active_round_participants(&self) -> AppResult<Option<(i64, Vec<ParticipantBrief>)>> {
        let body = self.get("/api/active-round-participants/", &[]).await?;
        if body.get("error_code").and_then(Value::as_str) == Some("no_active_round") {
            return Ok(None);
        }
        let round_number = body.get("round_number").and_then(Value::as_i64).unwrap_or(0);
        let participants: Vec<ParticipantBrief> =
            Self::parse(body.get("participants").cloned().unwrap_or(Value::Array(vec![])))?;
        Ok(Some((round_number, participants)))
    }

    pub async fn active_round_info(&self, user_id: i64) -> AppResult<ActiveRoundInfo> {
        let body = self
            .get("/api/active-round-info/", &[("user_id", user_id.to_string())])
            .await?;
        Self::parse(body)
    }

    pub async fn set_current_round(&self, round_id: i64) -> AppResult<String> {
        let body = self
            .post("/api/set-current-round/", json!({"round_id": round_id}), true)
            .await?;
        Ok(body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Готово")
            .to_string())
    }

    pub async fn transfer_winners(&self, round_id: i64, target_round_id: i64) -> AppResult<TransferOutcome> {
        Self::parse(
            self.post(
                "/api/transfer-winners/",
                json!({"round_id": round_id, "target_round_id": target_round_id}),
                true,
            )
            .await?,
        )
    }
}
