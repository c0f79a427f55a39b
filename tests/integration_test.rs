//! Integration tests for the API.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use tower::ServiceExt;

use samu_contest::api::create_router;
use samu_contest::app::{AppService, AppState, ServiceConfig};
use samu_contest::domain::{
    CastVoteResponse, Contest, ContestStatus, CreateContestRequest, CreateMemeRequest,
    CurrentContestResponse, ErrorResponse, HealthResponse, HealthStatus, Meme, PaginatedResponse,
    VoteStatusResponse, VotingPowerResponse,
};
use samu_contest::test_utils::wallets::{ALICE, BOB, TREASURY};
use samu_contest::test_utils::{MockBlockchainClient, MockDatabaseClient};

const ADMIN: &str = "admin@samu.io";

struct TestApp {
    router: Router,
    db: Arc<MockDatabaseClient>,
    blockchain: Arc<MockBlockchainClient>,
}

fn create_test_app() -> TestApp {
    create_test_app_with(MockDatabaseClient::new(), MockBlockchainClient::new())
}

fn create_test_app_with(db: MockDatabaseClient, blockchain: MockBlockchainClient) -> TestApp {
    let db = Arc::new(db);
    let blockchain = Arc::new(blockchain);
    let service = AppService::new(db.clone(), blockchain.clone()).with_config(ServiceConfig {
        admin_emails: vec![ADMIN.to_string()],
        treasury_wallet: TREASURY.to_string(),
        ..ServiceConfig::default()
    });
    let state = Arc::new(AppState::with_service(Arc::new(service)));
    TestApp {
        router: create_router(state),
        db,
        blockchain,
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json<T: serde::Serialize>(uri: &str, payload: &T) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_string(payload).unwrap()))
        .unwrap()
}

fn admin_post(uri: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .header("x-admin-email", ADMIN)
        .body(body)
        .unwrap()
}

async fn read_json<T: DeserializeOwned>(response: axum::response::Response) -> T {
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body_bytes).unwrap()
}

async fn start_contest(app: &TestApp) -> Contest {
    let now = Utc::now();
    let request = CreateContestRequest::new("Weekly Memes", now, now + Duration::days(7));
    let response = app
        .router
        .clone()
        .oneshot(admin_post(
            "/api/admin/contests",
            Body::from(serde_json::to_string(&request).unwrap()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let contest: Contest = read_json(response).await;
    assert_eq!(contest.status, ContestStatus::Draft);

    let response = app
        .router
        .clone()
        .oneshot(admin_post(
            &format!("/api/admin/contests/{}/start", contest.id),
            Body::empty(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    read_json(response).await
}

fn meme_request(author: &str) -> CreateMemeRequest {
    CreateMemeRequest {
        title: "Samu to the moon".to_string(),
        description: None,
        image_url: "https://cdn.samu.io/memes/moon.png".to_string(),
        author_wallet: author.to_string(),
        author_username: "moonboy".to_string(),
    }
}

async fn submit_meme(app: &TestApp, author: &str) -> Meme {
    let response = app
        .router
        .clone()
        .oneshot(post_json("/api/memes", &meme_request(author)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    read_json(response).await
}

fn vote_body(voter: &str, samu: i64, signature: &str) -> serde_json::Value {
    serde_json::json!({
        "voter_wallet": voter,
        "samu_amount": samu,
        "tx_signature": signature,
    })
}

// ---------------------------------------------------------------------------
// Health and docs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_health_check_healthy() {
    let app = create_test_app();

    let response = app.router.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let health: HealthResponse = read_json(response).await;
    assert_eq!(health.status, HealthStatus::Healthy);
    assert_eq!(health.database, HealthStatus::Healthy);
    assert_eq!(health.blockchain, HealthStatus::Healthy);
}

#[tokio::test]
async fn test_health_check_degraded_when_rpc_down() {
    let app = create_test_app();
    app.blockchain.set_healthy(false);

    let response = app.router.clone().oneshot(get("/health")).await.unwrap();
    let health: HealthResponse = read_json(response).await;
    assert_eq!(health.status, HealthStatus::Degraded);

    let response = app.router.oneshot(get("/health/ready")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_readiness_fails_when_database_down() {
    let app = create_test_app();
    app.db.set_healthy(false);

    let response = app.router.clone().oneshot(get("/health")).await.unwrap();
    let health: HealthResponse = read_json(response).await;
    assert_eq!(health.status, HealthStatus::Unhealthy);

    let response = app.router.clone().oneshot(get("/health/ready")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let response = app.router.oneshot(get("/health/live")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_openapi_document_lists_routes() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(get("/api-docs/openapi.json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let doc: serde_json::Value = read_json(response).await;
    let paths = doc["paths"].as_object().unwrap();
    assert!(paths.contains_key("/api/memes/{id}/vote"));
    assert!(paths.contains_key("/api/rewards/claim/{contest_id}"));
}

#[tokio::test]
async fn test_metrics_without_recorder_is_not_found() {
    let app = create_test_app();
    let response = app.router.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Contests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_current_contest_empty_before_start() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(get("/api/contests/current"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let current: CurrentContestResponse = read_json(response).await;
    assert!(current.contest.is_none());
}

#[tokio::test]
async fn test_contest_lifecycle() {
    let app = create_test_app();
    let contest = start_contest(&app).await;
    assert_eq!(contest.status, ContestStatus::Active);

    let response = app
        .router
        .clone()
        .oneshot(get("/api/contests/current"))
        .await
        .unwrap();
    let current: CurrentContestResponse = read_json(response).await;
    assert_eq!(current.contest.map(|c| c.id), Some(contest.id));

    let response = app
        .router
        .clone()
        .oneshot(admin_post(
            &format!("/api/admin/contests/{}/end", contest.id),
            Body::empty(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router
        .clone()
        .oneshot(get(&format!("/api/contests/{}", contest.id)))
        .await
        .unwrap();
    let ended: Contest = read_json(response).await;
    assert_eq!(ended.status, ContestStatus::Ended);
    assert!(ended.ended_at.is_some());

    let response = app
        .router
        .oneshot(admin_post(
            &format!("/api/admin/contests/{}/end", contest.id),
            Body::empty(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_only_one_contest_can_be_active() {
    let app = create_test_app();
    start_contest(&app).await;

    let now = Utc::now();
    let request = CreateContestRequest::new("Second", now, now + Duration::days(1));
    let response = app
        .router
        .clone()
        .oneshot(admin_post(
            "/api/admin/contests",
            Body::from(serde_json::to_string(&request).unwrap()),
        ))
        .await
        .unwrap();
    let second: Contest = read_json(response).await;

    let response = app
        .router
        .oneshot(admin_post(
            &format!("/api/admin/contests/{}/start", second.id),
            Body::empty(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_create_contest_rejects_inverted_window() {
    let app = create_test_app();
    let now = Utc::now();
    let request = CreateContestRequest::new("Backwards", now, now - Duration::hours(1));

    let response = app
        .router
        .oneshot(admin_post(
            "/api/admin/contests",
            Body::from(serde_json::to_string(&request).unwrap()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error: ErrorResponse = read_json(response).await;
    assert_eq!(error.error.r#type, "validation_error");
}

#[tokio::test]
async fn test_admin_routes_reject_unknown_email() {
    let app = create_test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/api/admin/contests/1/start")
        .header("x-admin-email", "mallory@example.com")
        .body(Body::empty())
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_check_is_case_insensitive() {
    let app = create_test_app();

    let response = app
        .router
        .clone()
        .oneshot(get("/api/admin/check/Admin@SAMU.io"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = read_json(response).await;
    assert_eq!(body["is_admin"], true);

    let response = app
        .router
        .oneshot(get("/api/admin/check/someone@samu.io"))
        .await
        .unwrap();
    let body: serde_json::Value = read_json(response).await;
    assert_eq!(body["is_admin"], false);
}

// ---------------------------------------------------------------------------
// Memes and votes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_create_meme_requires_active_contest() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(post_json("/api/memes", &meme_request(ALICE)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_meme_validation_error() {
    let app = create_test_app();
    start_contest(&app).await;

    let mut request = meme_request("not-a-wallet");
    request.image_url = "not a url".to_string();
    let response = app
        .router
        .oneshot(post_json("/api/memes", &request))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error: ErrorResponse = read_json(response).await;
    assert_eq!(error.error.r#type, "validation_error");
}

#[tokio::test]
async fn test_vote_updates_meme_total() {
    let app = create_test_app();
    let contest = start_contest(&app).await;
    let meme = submit_meme(&app, ALICE).await;
    assert_eq!(meme.contest_id, Some(contest.id));
    assert_eq!(meme.votes, 0);

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            &format!("/api/memes/{}/vote", meme.id),
            &vote_body(BOB, 250, "5sigVoteBob1"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let voted: CastVoteResponse = read_json(response).await;
    assert_eq!(voted.meme.votes, 250);
    assert_eq!(voted.vote.contest_id, contest.id);

    // Verified against the configured mint and treasury, in raw units.
    let checks = app.blockchain.get_checks();
    assert_eq!(checks.len(), 1);
    assert_eq!(checks[0].destination_wallet, TREASURY);
    assert_eq!(checks[0].min_amount, 250 * 100_000_000);

    let response = app
        .router
        .clone()
        .oneshot(get(&format!("/api/memes/{}/voted/{BOB}", meme.id)))
        .await
        .unwrap();
    let status: VoteStatusResponse = read_json(response).await;
    assert!(status.has_voted);

    let response = app
        .router
        .oneshot(get(&format!("/api/memes/{}/voted/{ALICE}", meme.id)))
        .await
        .unwrap();
    let status: VoteStatusResponse = read_json(response).await;
    assert!(!status.has_voted);
}

#[tokio::test]
async fn test_vote_signature_cannot_be_reused() {
    let app = create_test_app();
    start_contest(&app).await;
    let meme = submit_meme(&app, ALICE).await;
    let uri = format!("/api/memes/{}/vote", meme.id);

    let response = app
        .router
        .clone()
        .oneshot(post_json(&uri, &vote_body(BOB, 10, "5sigReplay")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router
        .oneshot(post_json(&uri, &vote_body(BOB, 10, "5sigReplay")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(app.db.all_votes().len(), 1);
}

#[tokio::test]
async fn test_vote_rejected_when_transfer_unverified() {
    let app = create_test_app();
    start_contest(&app).await;
    let meme = submit_meme(&app, ALICE).await;
    app.blockchain.set_transfers_valid(false);

    let response = app
        .router
        .oneshot(post_json(
            &format!("/api/memes/{}/vote", meme.id),
            &vote_body(BOB, 10, "5sigForged"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.db.all_votes().is_empty());
}

#[tokio::test]
async fn test_vote_on_missing_meme_not_found() {
    let app = create_test_app();
    start_contest(&app).await;

    let response = app
        .router
        .oneshot(post_json("/api/memes/404/vote", &vote_body(BOB, 10, "5sig")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_memes_paginates_by_votes() {
    let app = create_test_app();
    start_contest(&app).await;
    let first = submit_meme(&app, ALICE).await;
    let second = submit_meme(&app, BOB).await;
    let third = submit_meme(&app, ALICE).await;
    app.db.set_meme_votes(second.id, 900);
    app.db.set_meme_votes(first.id, 100);

    let response = app
        .router
        .clone()
        .oneshot(get("/api/memes?page=1&limit=2"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page: PaginatedResponse<Meme> = read_json(response).await;
    assert_eq!(page.total, 3);
    assert_eq!(page.total_pages, 2);
    assert!(page.has_more);
    let ids: Vec<_> = page.items.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);

    let response = app
        .router
        .clone()
        .oneshot(get("/api/memes?page=2&limit=2&sort=votes"))
        .await
        .unwrap();
    let page: PaginatedResponse<Meme> = read_json(response).await;
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, third.id);
    assert!(!page.has_more);

    let response = app
        .router
        .oneshot(get("/api/memes?limit=1&sort=latest"))
        .await
        .unwrap();
    let page: PaginatedResponse<Meme> = read_json(response).await;
    assert_eq!(page.items[0].id, third.id);
}

#[tokio::test]
async fn test_delete_meme_only_by_author() {
    let app = create_test_app();
    start_contest(&app).await;
    let meme = submit_meme(&app, ALICE).await;

    let delete = |wallet: &str| {
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/memes/{}", meme.id))
            .header("Content-Type", "application/json")
            .body(Body::from(
                serde_json::json!({ "author_wallet": wallet }).to_string(),
            ))
            .unwrap()
    };

    let response = app.router.clone().oneshot(delete(BOB)).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.router.clone().oneshot(delete(ALICE)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router
        .oneshot(get(&format!("/api/memes/{}", meme.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_user_profile_created_on_first_read() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(get(&format!("/api/users/{ALICE}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let user: serde_json::Value = read_json(response).await;
    assert_eq!(user["wallet_address"], ALICE);
    assert_eq!(user["username"], "9WzDXwBb...AWWM");
}

#[tokio::test]
async fn test_user_invalid_wallet_rejected() {
    let app = create_test_app();

    let response = app
        .router
        .oneshot(get("/api/users/0xdeadbeef"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_voting_power_from_balance() {
    let app = create_test_app();
    // 2.5M SAMU with 8 decimals
    app.blockchain.set_balance(ALICE, 2_500_000 * 100_000_000);

    let response = app
        .router
        .oneshot(get(&format!("/api/users/{ALICE}/voting-power")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let power: VotingPowerResponse = read_json(response).await;
    assert_eq!(power.samu_balance, 2_500_000);
    assert_eq!(power.voting_power, 23);
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_database_failure_maps_to_server_error() {
    let app = create_test_app_with(
        MockDatabaseClient::failing("connection reset"),
        MockBlockchainClient::new(),
    );

    let response = app.router.oneshot(get("/api/contests")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let error: ErrorResponse = read_json(response).await;
    assert_eq!(error.error.r#type, "database_error");
    assert_eq!(app.db.call_count(), 1);
}

#[tokio::test]
async fn test_unknown_route_not_found() {
    let app = create_test_app();
    let response = app.router.oneshot(get("/api/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
