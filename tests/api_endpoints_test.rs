//! Integration tests for the voting REST API.
//!
//! Каждый тест поднимает роутер поверх временной базы и гоняет запросы
//! через tower::ServiceExt::oneshot, без реального сокета.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use golosbot::storage::create_pool;
use golosbot::web::{build_router, WebState};

const TEST_TOKEN: &str = "test-token";

fn test_router() -> (Router, TempDir) {
    let dir = TempDir::new().expect("tempdir");
    let db_path = dir.path().join("voting.sqlite");
    let pool = create_pool(db_path.to_str().expect("utf-8 path")).expect("pool");
    let state = WebState {
        db: Arc::new(pool),
        auth_token: Some(TEST_TOKEN.to_string()),
    };
    (build_router(state), dir)
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.expect("request");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn post(router: &Router, path: &str, body: Value, token: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = builder.body(Body::from(body.to_string())).expect("request");
    send(router, request).await
}

async fn get(router: &Router, path: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(path).body(Body::empty()).expect("request");
    send(router, request).await
}

async fn create_campaign(router: &Router, name: &str) -> i64 {
    let (status, body) = post(
        router,
        "/api/create-campaign/",
        json!({"name": name, "admin_telegram_id": 1}),
        Some(TEST_TOKEN),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["campaign_id"].as_i64().expect("campaign_id")
}

async fn start_round(router: &Router, campaign_id: i64, extra: Value) -> (StatusCode, Value) {
    let mut body = json!({"campaign_id": campaign_id});
    if let (Some(obj), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            obj.insert(k.clone(), v.clone());
        }
    }
    post(router, "/api/start-round/", body, Some(TEST_TOKEN)).await
}

async fn add_participant(router: &Router, round_id: i64, full_name: &str) -> i64 {
    let (status, body) = post(
        router,
        "/api/add-participant/",
        json!({"round_id": round_id, "full_name": full_name}),
        Some(TEST_TOKEN),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["participant_id"].as_i64().expect("participant_id")
}

async fn vote(router: &Router, round_id: i64, participant_id: i64, user_id: i64) -> (StatusCode, Value) {
    post(
        router,
        "/api/vote/",
        json!({"round": round_id, "participant": participant_id, "user_telegram_id": user_id}),
        None,
    )
    .await
}

mod health {
    use super::*;

    #[tokio::test]
    async fn responds_ok() {
        let (router, _dir) = test_router();
        let (status, _) = get(&router, "/health").await;
        assert_eq!(status, StatusCode::OK);
    }
}

mod auth {
    use super::*;

    #[tokio::test]
    async fn admin_endpoint_rejects_missing_token() {
        let (router, _dir) = test_router();
        let (status, body) =
            post(&router, "/api/create-campaign/", json!({"name": "X", "admin_telegram_id": 1}), None)
                .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{body}");
    }

    #[tokio::test]
    async fn admin_endpoint_rejects_wrong_token() {
        let (router, _dir) = test_router();
        let (status, _) = post(
            &router,
            "/api/start-round/",
            json!({"campaign_id": 1}),
            Some("wrong"),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn vote_endpoint_is_open() {
        let (router, _dir) = test_router();
        let campaign = create_campaign(&router, "Кампания").await;
        let (_, round) = start_round(&router, campaign, json!({})).await;
        let round_id = round["round_id"].as_i64().unwrap();
        let participant = add_participant(&router, round_id, "Иван Петров").await;

        let (status, body) = vote(&router, round_id, participant, 100).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }
}

mod campaigns {
    use super::*;

    #[tokio::test]
    async fn create_requires_name() {
        let (router, _dir) = test_router();
        let (status, _) = post(
            &router,
            "/api/create-campaign/",
            json!({"name": "  ", "admin_telegram_id": 1}),
            Some(TEST_TOKEN),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn order_number_follows_creation_order() {
        let (router, _dir) = test_router();
        create_campaign(&router, "Первая").await;
        create_campaign(&router, "Вторая").await;

        let (status, body) = get(&router, "/api/active-campaigns/").await;
        assert_eq!(status, StatusCode::OK);
        let campaigns = body["campaigns"].as_array().unwrap();
        assert_eq!(campaigns.len(), 2);
        assert_eq!(campaigns[0]["campaign_order_number"], 1);
        assert_eq!(campaigns[1]["campaign_order_number"], 2);
        assert_eq!(body["total"], 2);
    }
}

mod rounds {
    use super::*;

    #[tokio::test]
    async fn number_defaults_to_max_plus_one() {
        let (router, _dir) = test_router();
        let campaign = create_campaign(&router, "Кампания").await;

        let (status, first) = start_round(&router, campaign, json!({})).await;
        assert_eq!(status, StatusCode::CREATED, "{first}");
        assert_eq!(first["round_number"], 1);

        let (_, second) = start_round(&router, campaign, json!({})).await;
        assert_eq!(second["round_number"], 2);
    }

    #[tokio::test]
    async fn duplicate_number_rejected() {
        let (router, _dir) = test_router();
        let campaign = create_campaign(&router, "Кампания").await;
        start_round(&router, campaign, json!({"number": 3})).await;

        let (status, _) = start_round(&router, campaign, json!({"number": 3})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_campaign_is_404() {
        let (router, _dir) = test_router();
        let (status, _) = start_round(&router, 999, json!({})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ending_twice_is_rejected() {
        let (router, _dir) = test_router();
        let campaign = create_campaign(&router, "Кампания").await;
        let (_, round) = start_round(&router, campaign, json!({"winners_count": 1})).await;
        let round_id = round["round_id"].as_i64().unwrap();
        let participant = add_participant(&router, round_id, "Иван Петров").await;
        let rival = add_participant(&router, round_id, "Анна Смирнова").await;

        let (status, _) = vote(&router, round_id, participant, 500).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, first) =
            post(&router, "/api/end-round/", json!({"round_id": round_id}), Some(TEST_TOKEN)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["winners_count"].as_i64().unwrap(), 1);
        assert_eq!(first["winners"][0]["full_name"], "Иван Петров");
        assert_eq!(first["winners"][0]["votes"], 1);

        // опоздавший голос в завершённый раунд не принимается
        let (status, _) = vote(&router, round_id, rival, 501).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) =
            post(&router, "/api/end-round/", json!({"round_id": round_id}), Some(TEST_TOKEN)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Раунд уже завершён");
        // повторное завершение не пересчитывает победителей
        assert!(body.get("winners").is_none());
    }

    #[tokio::test]
    async fn set_and_get_current_round() {
        let (router, _dir) = test_router();
        let campaign = create_campaign(&router, "Кампания").await;
        let (_, first) = start_round(&router, campaign, json!({})).await;
        let (_, second) = start_round(&router, campaign, json!({})).await;
        let first_id = first["round_id"].as_i64().unwrap();
        let second_id = second["round_id"].as_i64().unwrap();

        // Без пометки текущим считается последний активный
        let (_, body) = get(&router, "/api/get-current-round/").await;
        assert_eq!(body["current_round_id"], second_id);

        let (status, _) = post(
            &router,
            "/api/set-current-round/",
            json!({"round_id": first_id}),
            Some(TEST_TOKEN),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = get(&router, "/api/get-current-round/").await;
        assert_eq!(body["current_round_id"], first_id);
        assert_eq!(body["round"]["is_current"], true);
    }
}

mod winners {
    use super::*;

    /// Готовит завершаемый раунд с заданными голосами по участникам.
    async fn round_with_votes(router: &Router, counts: &[i64]) -> i64 {
        let campaign = create_campaign(router, "Кампания").await;
        let (_, round) = start_round(router, campaign, json!({"winners_count": 3})).await;
        let round_id = round["round_id"].as_i64().unwrap();

        let mut user = 0i64;
        for (i, count) in counts.iter().enumerate() {
            let participant =
                add_participant(router, round_id, &format!("Участник Номер{}", i + 1)).await;
            for _ in 0..*count {
                user += 1;
                let (status, body) = vote(router, round_id, participant, user).await;
                assert_eq!(status, StatusCode::CREATED, "{body}");
            }
        }
        round_id
    }

    #[tokio::test]
    async fn tie_at_cutoff_returns_more_than_requested() {
        let (router, _dir) = test_router();
        let round_id = round_with_votes(&router, &[5, 5, 4, 4, 2]).await;

        let (status, body) =
            post(&router, "/api/end-round/", json!({"round_id": round_id}), Some(TEST_TOKEN)).await;
        assert_eq!(status, StatusCode::OK, "{body}");

        let winners = body["winners"].as_array().unwrap();
        assert_eq!(winners.len(), 4, "{body}");
        let votes: Vec<i64> = winners.iter().map(|w| w["votes"].as_i64().unwrap()).collect();
        assert_eq!(votes, vec![5, 5, 4, 4]);
    }

    #[tokio::test]
    async fn zero_vote_participants_never_win() {
        let (router, _dir) = test_router();
        let round_id = round_with_votes(&router, &[2, 0, 0]).await;

        let (_, body) =
            post(&router, "/api/end-round/", json!({"round_id": round_id}), Some(TEST_TOKEN)).await;
        assert_eq!(body["winners"].as_array().unwrap().len(), 1);
    }
}

mod votes {
    use super::*;

    #[tokio::test]
    async fn duplicate_vote_rejected() {
        let (router, _dir) = test_router();
        let campaign = create_campaign(&router, "Кампания").await;
        let (_, round) = start_round(&router, campaign, json!({})).await;
        let round_id = round["round_id"].as_i64().unwrap();
        let participant = add_participant(&router, round_id, "Иван Петров").await;

        vote(&router, round_id, participant, 100).await;
        let (status, body) = vote(&router, round_id, participant, 100).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Вы уже голосовали в этом раунде");
    }

    #[tokio::test]
    async fn standard_round_allows_single_vote_per_user() {
        let (router, _dir) = test_router();
        let campaign = create_campaign(&router, "Кампания").await;
        let (_, round) = start_round(&router, campaign, json!({})).await;
        let round_id = round["round_id"].as_i64().unwrap();
        let first = add_participant(&router, round_id, "Иван Петров").await;
        let second = add_participant(&router, round_id, "Анна Смирнова").await;

        vote(&router, round_id, first, 100).await;
        let (status, _) = vote(&router, round_id, second, 100).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn individual_round_takes_choice_per_participant() {
        let (router, _dir) = test_router();
        let campaign = create_campaign(&router, "Кампания").await;
        let (_, round) = start_round(&router, campaign, json!({"type": "individual"})).await;
        let round_id = round["round_id"].as_i64().unwrap();
        let first = add_participant(&router, round_id, "Иван Петров").await;
        let second = add_participant(&router, round_id, "Анна Смирнова").await;

        for (participant, choice) in [(first, "yes"), (second, "no")] {
            let (status, body) = post(
                &router,
                "/api/vote/",
                json!({"round": round_id, "participant": participant, "user_telegram_id": 100, "choice": choice}),
                None,
            )
            .await;
            assert_eq!(status, StatusCode::CREATED, "{body}");
        }

        // Без choice в индивидуальном раунде голос не принимается
        let (status, _) = vote(&router, round_id, first, 200).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn participant_from_other_round_rejected() {
        let (router, _dir) = test_router();
        let campaign = create_campaign(&router, "Кампания").await;
        let (_, first) = start_round(&router, campaign, json!({})).await;
        let (_, second) = start_round(&router, campaign, json!({})).await;
        let first_id = first["round_id"].as_i64().unwrap();
        let second_id = second["round_id"].as_i64().unwrap();
        let participant = add_participant(&router, first_id, "Иван Петров").await;

        let (status, _) = vote(&router, second_id, participant, 100).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

mod participants {
    use super::*;

    #[tokio::test]
    async fn names_are_normalized() {
        let (router, _dir) = test_router();
        let campaign = create_campaign(&router, "Кампания").await;
        let (_, round) = start_round(&router, campaign, json!({})).await;
        let round_id = round["round_id"].as_i64().unwrap();

        let (status, body) = post(
            &router,
            "/api/add-participant/",
            json!({"round_id": round_id, "full_name": "  иван петров (капитан)"}),
            Some(TEST_TOKEN),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["full_name"], "Иван Петров (капитан)");
    }

    #[tokio::test]
    async fn sentinel_when_no_active_round() {
        let (router, _dir) = test_router();
        let (status, body) = get(&router, "/api/active-round-participants/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error_code"], "no_active_round");
        assert_eq!(body["participants"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn lists_current_round_participants() {
        let (router, _dir) = test_router();
        let campaign = create_campaign(&router, "Кампания").await;
        let (_, round) = start_round(&router, campaign, json!({})).await;
        let round_id = round["round_id"].as_i64().unwrap();
        add_participant(&router, round_id, "Иван Петров").await;
        add_participant(&router, round_id, "Анна Смирнова").await;

        let (status, body) = get(&router, "/api/active-round-participants/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["round_id"], round_id);
        assert_eq!(body["participants"].as_array().unwrap().len(), 2);
    }
}

mod round_info {
    use super::*;

    #[tokio::test]
    async fn reports_user_vote() {
        let (router, _dir) = test_router();
        let campaign = create_campaign(&router, "Кампания").await;
        let (_, round) = start_round(&router, campaign, json!({})).await;
        let round_id = round["round_id"].as_i64().unwrap();
        let participant = add_participant(&router, round_id, "Иван Петров").await;
        vote(&router, round_id, participant, 100).await;

        let (status, body) = get(&router, "/api/active-round-info/?user_id=100").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["round"]["id"], round_id);
        assert_eq!(body["user_vote"]["participant_id"], participant);

        let (_, body) = get(&router, "/api/active-round-info/?user_id=200").await;
        assert_eq!(body["user_vote"], Value::Null);
    }

    #[tokio::test]
    async fn missing_round_is_404() {
        let (router, _dir) = test_router();
        let (status, body) = get(&router, "/api/active-round-info/?user_id=1").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Активного раунда нет");
    }
}

mod transfer {
    use super::*;

    #[tokio::test]
    async fn zero_voted_round_transfers_nothing() {
        let (router, _dir) = test_router();
        let campaign = create_campaign(&router, "Кампания").await;
        let (_, source) = start_round(&router, campaign, json!({})).await;
        let source_id = source["round_id"].as_i64().unwrap();
        add_participant(&router, source_id, "Иван Петров").await;
        post(&router, "/api/end-round/", json!({"round_id": source_id}), Some(TEST_TOKEN)).await;

        let (_, target) = start_round(&router, campaign, json!({})).await;
        let target_id = target["round_id"].as_i64().unwrap();

        let (status, body) = post(
            &router,
            "/api/transfer-winners/",
            json!({"round_id": source_id, "target_round_id": target_id}),
            Some(TEST_TOKEN),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["transferred"], 0);
        assert_eq!(body["errors"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn active_source_is_rejected() {
        let (router, _dir) = test_router();
        let campaign = create_campaign(&router, "Кампания").await;
        let (_, source) = start_round(&router, campaign, json!({})).await;
        let (_, target) = start_round(&router, campaign, json!({})).await;

        let (status, _) = post(
            &router,
            "/api/transfer-winners/",
            json!({
                "round_id": source["round_id"].as_i64().unwrap(),
                "target_round_id": target["round_id"].as_i64().unwrap(),
            }),
            Some(TEST_TOKEN),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn winners_carry_provenance_into_target() {
        let (router, _dir) = test_router();
        let campaign = create_campaign(&router, "Кампания").await;
        let (_, source) = start_round(&router, campaign, json!({"winners_count": 1})).await;
        let source_id = source["round_id"].as_i64().unwrap();
        let participant = add_participant(&router, source_id, "Иван Петров").await;
        vote(&router, source_id, participant, 100).await;
        vote(&router, source_id, participant, 101).await;
        post(&router, "/api/end-round/", json!({"round_id": source_id}), Some(TEST_TOKEN)).await;

        let (_, target) = start_round(&router, campaign, json!({})).await;
        let target_id = target["round_id"].as_i64().unwrap();

        let (status, body) = post(
            &router,
            "/api/transfer-winners/",
            json!({"round_id": source_id, "target_round_id": target_id}),
            Some(TEST_TOKEN),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["transferred"], 1);
        assert_eq!(body["total_winners"], 1);
    }
}
