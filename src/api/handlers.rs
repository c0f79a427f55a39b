//! HTTP request handlers with OpenAPI documentation.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use tracing::error;
use utoipa::OpenApi;

use crate::app::AppState;
use crate::domain::webhook::SIGNATURE_HEADER;
use crate::domain::{
    AdminStatusResponse, AppError, BlockchainError, CastVoteRequest, CastVoteResponse,
    ClaimRequest, ClaimResponse, ClaimWithPending, ClaimableResponse, Contest, ContestEndResult,
    ContestRevenueResponse, CreateContestRequest, CreateGoodsRequest, CreateMemeRequest,
    CreateRevenueRequest, CurrentContestResponse, DatabaseError, DeleteMemeRequest,
    DistributeRevenueRequest, DistributionResult, EntityId, ErrorDetail, ErrorResponse,
    ExternalServiceError, Goods, HealthResponse, HealthStatus, Meme, MemeQuery, MessageResponse,
    MyShareResponse, Order, OrderMapQuery, OrderMapResponse, PaginatedResponse,
    PlaceOrderRequest, PlaceOrderResponse, RateLimitResponse, Revenue, RewardsDashboard,
    ShippingAddress, ShippingEstimateResponse, UpdateProfileRequest, User, UserStats,
    VariantCatalog, Vote, VoteStatusResponse, VoterPoolResponse, VotingPowerResponse,
    WalletRevenueResponse, WebhookAck,
};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    info(
        title = "SAMU Meme Contest API",
        version = "0.1.0",
        description = "Meme contests voted with SAMU, merchandise with escrowed profit and revenue sharing on Solana",
        license(
            name = "MIT"
        )
    ),
    paths(
        list_contests_handler,
        current_contest_handler,
        get_contest_handler,
        create_contest_handler,
        start_contest_handler,
        end_contest_handler,
        admin_check_handler,
        list_memes_handler,
        list_all_memes_handler,
        create_meme_handler,
        get_meme_handler,
        delete_meme_handler,
        cast_vote_handler,
        vote_status_handler,
        get_user_handler,
        update_user_handler,
        user_memes_handler,
        user_votes_handler,
        user_stats_handler,
        voting_power_handler,
        list_goods_handler,
        variants_handler,
        get_goods_handler,
        estimate_shipping_handler,
        place_order_handler,
        wallet_orders_handler,
        create_goods_handler,
        mark_delivered_handler,
        printful_webhook_handler,
        create_revenue_handler,
        distribute_revenue_handler,
        contest_revenue_handler,
        my_share_handler,
        wallet_revenue_handler,
        dashboard_handler,
        voter_pool_handler,
        claimable_handler,
        claim_handler,
        my_claims_handler,
        order_map_handler,
        health_check_handler,
        liveness_handler,
        readiness_handler,
    ),
    components(
        schemas(
            HealthResponse,
            HealthStatus,
            ErrorResponse,
            ErrorDetail,
            RateLimitResponse,
            MessageResponse,
        )
    ),
    tags(
        (name = "contests", description = "Contest lifecycle"),
        (name = "memes", description = "Meme submissions and votes"),
        (name = "users", description = "Profiles and voting power"),
        (name = "goods", description = "Merchandise, orders and fulfillment"),
        (name = "revenue", description = "Contest revenue distribution"),
        (name = "rewards", description = "Goods rewards and voter pool claims"),
        (name = "admin", description = "Endpoints requiring the x-admin-email header"),
        (name = "health", description = "Health check endpoints")
    )
)]
pub struct ApiDoc;

type ApiState = State<Arc<AppState>>;

// ---------------------------------------------------------------------------
// Contests
// ---------------------------------------------------------------------------

/// List contests, newest first
#[utoipa::path(
    get,
    path = "/api/contests",
    tag = "contests",
    responses(
        (status = 200, description = "All contests", body = Vec<Contest>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn list_contests_handler(
    State(state): ApiState,
) -> Result<Json<Vec<Contest>>, AppError> {
    Ok(Json(state.service.list_contests().await?))
}

/// The active contest, if any
#[utoipa::path(
    get,
    path = "/api/contests/current",
    tag = "contests",
    responses(
        (status = 200, description = "Active contest or null", body = CurrentContestResponse)
    )
)]
pub async fn current_contest_handler(
    State(state): ApiState,
) -> Result<Json<CurrentContestResponse>, AppError> {
    let contest = state.service.get_current_contest().await?;
    Ok(Json(CurrentContestResponse { contest }))
}

#[utoipa::path(
    get,
    path = "/api/contests/{id}",
    tag = "contests",
    params(("id" = i64, Path, description = "Contest ID")),
    responses(
        (status = 200, description = "Contest found", body = Contest),
        (status = 404, description = "Contest not found", body = ErrorResponse)
    )
)]
pub async fn get_contest_handler(
    State(state): ApiState,
    Path(id): Path<EntityId>,
) -> Result<Json<Contest>, AppError> {
    Ok(Json(state.service.get_contest(id).await?))
}

/// Create a draft contest
#[utoipa::path(
    post,
    path = "/api/admin/contests",
    tag = "admin",
    request_body = CreateContestRequest,
    responses(
        (status = 201, description = "Contest created", body = Contest),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 403, description = "Not an administrator", body = ErrorResponse)
    )
)]
pub async fn create_contest_handler(
    State(state): ApiState,
    Json(payload): Json<CreateContestRequest>,
) -> Result<impl IntoResponse, AppError> {
    let contest = state.service.create_contest(&payload).await?;
    Ok((StatusCode::CREATED, Json(contest)))
}

#[utoipa::path(
    post,
    path = "/api/admin/contests/{id}/start",
    tag = "admin",
    params(("id" = i64, Path, description = "Contest ID")),
    responses(
        (status = 200, description = "Contest started", body = Contest),
        (status = 409, description = "Another contest is active or the contest is not a draft", body = ErrorResponse)
    )
)]
pub async fn start_contest_handler(
    State(state): ApiState,
    Path(id): Path<EntityId>,
) -> Result<Json<Contest>, AppError> {
    Ok(Json(state.service.start_contest(id).await?))
}

/// End an active contest and archive its memes
#[utoipa::path(
    post,
    path = "/api/admin/contests/{id}/end",
    tag = "admin",
    params(("id" = i64, Path, description = "Contest ID")),
    responses(
        (status = 200, description = "Contest ended", body = ContestEndResult),
        (status = 409, description = "Contest is not active", body = ErrorResponse)
    )
)]
pub async fn end_contest_handler(
    State(state): ApiState,
    Path(id): Path<EntityId>,
) -> Result<Json<ContestEndResult>, AppError> {
    Ok(Json(state.service.end_contest(id).await?))
}

/// Whether an email belongs to an administrator
#[utoipa::path(
    get,
    path = "/api/admin/check/{email}",
    tag = "admin",
    params(("email" = String, Path, description = "Email address")),
    responses(
        (status = 200, description = "Admin status", body = AdminStatusResponse)
    )
)]
pub async fn admin_check_handler(
    State(state): ApiState,
    Path(email): Path<String>,
) -> Json<AdminStatusResponse> {
    Json(AdminStatusResponse {
        is_admin: state.service.is_admin(&email),
    })
}

// ---------------------------------------------------------------------------
// Memes and votes
// ---------------------------------------------------------------------------

/// List memes of a contest (the active one by default)
#[utoipa::path(
    get,
    path = "/api/memes",
    tag = "memes",
    params(MemeQuery),
    responses(
        (status = 200, description = "Page of memes", body = PaginatedResponse<Meme>)
    )
)]
pub async fn list_memes_handler(
    State(state): ApiState,
    Query(query): Query<MemeQuery>,
) -> Result<Json<PaginatedResponse<Meme>>, AppError> {
    Ok(Json(state.service.list_memes(&query).await?))
}

#[utoipa::path(
    get,
    path = "/api/memes/all",
    tag = "memes",
    responses(
        (status = 200, description = "Memes of every contest", body = Vec<Meme>)
    )
)]
pub async fn list_all_memes_handler(State(state): ApiState) -> Result<Json<Vec<Meme>>, AppError> {
    Ok(Json(state.service.list_all_memes().await?))
}

/// Submit a meme to the active contest
#[utoipa::path(
    post,
    path = "/api/memes",
    tag = "memes",
    request_body = CreateMemeRequest,
    responses(
        (status = 201, description = "Meme created", body = Meme),
        (status = 400, description = "Validation error or no active contest", body = ErrorResponse)
    )
)]
pub async fn create_meme_handler(
    State(state): ApiState,
    Json(payload): Json<CreateMemeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let meme = state.service.create_meme(&payload).await?;
    Ok((StatusCode::CREATED, Json(meme)))
}

#[utoipa::path(
    get,
    path = "/api/memes/{id}",
    tag = "memes",
    params(("id" = i64, Path, description = "Meme ID")),
    responses(
        (status = 200, description = "Meme found", body = Meme),
        (status = 404, description = "Meme not found", body = ErrorResponse)
    )
)]
pub async fn get_meme_handler(
    State(state): ApiState,
    Path(id): Path<EntityId>,
) -> Result<Json<Meme>, AppError> {
    Ok(Json(state.service.get_meme(id).await?))
}

/// Delete a meme; only its author may do so
#[utoipa::path(
    delete,
    path = "/api/memes/{id}",
    tag = "memes",
    params(("id" = i64, Path, description = "Meme ID")),
    request_body = DeleteMemeRequest,
    responses(
        (status = 200, description = "Meme deleted", body = MessageResponse),
        (status = 403, description = "Not the author", body = ErrorResponse),
        (status = 404, description = "Meme not found", body = ErrorResponse),
        (status = 409, description = "Contest already ended", body = ErrorResponse)
    )
)]
pub async fn delete_meme_handler(
    State(state): ApiState,
    Path(id): Path<EntityId>,
    Json(payload): Json<DeleteMemeRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.service.delete_meme(id, &payload.author_wallet).await?;
    Ok(Json(MessageResponse {
        message: "Meme deleted successfully".to_string(),
    }))
}

/// Vote for a meme with a SAMU transfer
#[utoipa::path(
    post,
    path = "/api/memes/{id}/vote",
    tag = "memes",
    params(("id" = i64, Path, description = "Meme ID")),
    request_body = CastVoteRequest,
    responses(
        (status = 200, description = "Vote recorded", body = CastVoteResponse),
        (status = 400, description = "Invalid vote or unverified transfer", body = ErrorResponse),
        (status = 409, description = "Transaction signature already used", body = ErrorResponse)
    )
)]
pub async fn cast_vote_handler(
    State(state): ApiState,
    Path(id): Path<EntityId>,
    Json(payload): Json<CastVoteRequest>,
) -> Result<Json<CastVoteResponse>, AppError> {
    Ok(Json(state.service.cast_vote(id, &payload).await?))
}

#[utoipa::path(
    get,
    path = "/api/memes/{id}/voted/{wallet}",
    tag = "memes",
    params(
        ("id" = i64, Path, description = "Meme ID"),
        ("wallet" = String, Path, description = "Voter wallet")
    ),
    responses(
        (status = 200, description = "Whether the wallet voted", body = VoteStatusResponse)
    )
)]
pub async fn vote_status_handler(
    State(state): ApiState,
    Path((id, wallet)): Path<(EntityId, String)>,
) -> Result<Json<VoteStatusResponse>, AppError> {
    let has_voted = state.service.has_voted(id, &wallet).await?;
    Ok(Json(VoteStatusResponse { has_voted }))
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Profile of a wallet, created on first access
#[utoipa::path(
    get,
    path = "/api/users/{wallet}",
    tag = "users",
    params(("wallet" = String, Path, description = "Wallet address")),
    responses(
        (status = 200, description = "User profile", body = User),
        (status = 400, description = "Invalid wallet", body = ErrorResponse)
    )
)]
pub async fn get_user_handler(
    State(state): ApiState,
    Path(wallet): Path<String>,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.service.get_or_create_profile(&wallet).await?))
}

#[utoipa::path(
    put,
    path = "/api/users/{wallet}",
    tag = "users",
    params(("wallet" = String, Path, description = "Wallet address")),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = User),
        (status = 400, description = "Validation error", body = ErrorResponse)
    )
)]
pub async fn update_user_handler(
    State(state): ApiState,
    Path(wallet): Path<String>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.service.update_profile(&wallet, &payload).await?))
}

#[utoipa::path(
    get,
    path = "/api/users/{wallet}/memes",
    tag = "users",
    params(("wallet" = String, Path, description = "Wallet address")),
    responses((status = 200, description = "Memes by the wallet", body = Vec<Meme>))
)]
pub async fn user_memes_handler(
    State(state): ApiState,
    Path(wallet): Path<String>,
) -> Result<Json<Vec<Meme>>, AppError> {
    Ok(Json(state.service.user_memes(&wallet).await?))
}

#[utoipa::path(
    get,
    path = "/api/users/{wallet}/votes",
    tag = "users",
    params(("wallet" = String, Path, description = "Wallet address")),
    responses((status = 200, description = "Votes cast by the wallet", body = Vec<Vote>))
)]
pub async fn user_votes_handler(
    State(state): ApiState,
    Path(wallet): Path<String>,
) -> Result<Json<Vec<Vote>>, AppError> {
    Ok(Json(state.service.user_votes(&wallet).await?))
}

#[utoipa::path(
    get,
    path = "/api/users/{wallet}/stats",
    tag = "users",
    params(("wallet" = String, Path, description = "Wallet address")),
    responses((status = 200, description = "Activity totals", body = UserStats))
)]
pub async fn user_stats_handler(
    State(state): ApiState,
    Path(wallet): Path<String>,
) -> Result<Json<UserStats>, AppError> {
    Ok(Json(state.service.user_stats(&wallet).await?))
}

/// Voting power derived from the on-chain SAMU balance
#[utoipa::path(
    get,
    path = "/api/users/{wallet}/voting-power",
    tag = "users",
    params(("wallet" = String, Path, description = "Wallet address")),
    responses(
        (status = 200, description = "Voting power", body = VotingPowerResponse),
        (status = 503, description = "Blockchain unavailable", body = ErrorResponse)
    )
)]
pub async fn voting_power_handler(
    State(state): ApiState,
    Path(wallet): Path<String>,
) -> Result<Json<VotingPowerResponse>, AppError> {
    Ok(Json(state.service.voting_power(&wallet).await?))
}

// ---------------------------------------------------------------------------
// Goods and orders
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/goods",
    tag = "goods",
    responses((status = 200, description = "All goods", body = Vec<Goods>))
)]
pub async fn list_goods_handler(State(state): ApiState) -> Result<Json<Vec<Goods>>, AppError> {
    Ok(Json(state.service.list_goods().await?))
}

/// Colour and size variants of the t-shirt product
#[utoipa::path(
    get,
    path = "/api/goods/variants",
    tag = "goods",
    responses((status = 200, description = "Variant catalogue", body = VariantCatalog))
)]
pub async fn variants_handler(State(state): ApiState) -> Json<VariantCatalog> {
    Json(state.service.variants())
}

#[utoipa::path(
    get,
    path = "/api/goods/{id}",
    tag = "goods",
    params(("id" = i64, Path, description = "Goods ID")),
    responses(
        (status = 200, description = "Goods found", body = Goods),
        (status = 404, description = "Goods not found", body = ErrorResponse)
    )
)]
pub async fn get_goods_handler(
    State(state): ApiState,
    Path(id): Path<EntityId>,
) -> Result<Json<Goods>, AppError> {
    Ok(Json(state.service.get_goods(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/goods/{id}/estimate-shipping",
    tag = "goods",
    params(("id" = i64, Path, description = "Goods ID")),
    request_body = ShippingAddress,
    responses(
        (status = 200, description = "Shipping rates", body = ShippingEstimateResponse),
        (status = 400, description = "Invalid address", body = ErrorResponse)
    )
)]
pub async fn estimate_shipping_handler(
    State(state): ApiState,
    Path(id): Path<EntityId>,
    Json(payload): Json<ShippingAddress>,
) -> Result<Json<ShippingEstimateResponse>, AppError> {
    Ok(Json(state.service.estimate_shipping(id, &payload).await?))
}

/// Place an order, opening an escrow when it is paid in SOL
#[utoipa::path(
    post,
    path = "/api/goods/{id}/order",
    tag = "goods",
    params(("id" = i64, Path, description = "Goods ID")),
    request_body = PlaceOrderRequest,
    responses(
        (status = 201, description = "Order placed", body = PlaceOrderResponse),
        (status = 400, description = "Validation error or unverified payment", body = ErrorResponse),
        (status = 404, description = "Goods not found", body = ErrorResponse),
        (status = 409, description = "Payment signature already used", body = ErrorResponse)
    )
)]
pub async fn place_order_handler(
    State(state): ApiState,
    Path(id): Path<EntityId>,
    Json(payload): Json<PlaceOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let placed = state.service.place_order(id, &payload).await?;
    Ok((StatusCode::CREATED, Json(placed)))
}

#[utoipa::path(
    get,
    path = "/api/goods/orders/{wallet}",
    tag = "goods",
    params(("wallet" = String, Path, description = "Buyer wallet")),
    responses((status = 200, description = "Orders of the wallet", body = Vec<Order>))
)]
pub async fn wallet_orders_handler(
    State(state): ApiState,
    Path(wallet): Path<String>,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(state.service.orders_by_wallet(&wallet).await?))
}

#[utoipa::path(
    post,
    path = "/api/admin/goods",
    tag = "admin",
    request_body = CreateGoodsRequest,
    responses(
        (status = 201, description = "Goods created", body = Goods),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 403, description = "Not an administrator", body = ErrorResponse)
    )
)]
pub async fn create_goods_handler(
    State(state): ApiState,
    Json(payload): Json<CreateGoodsRequest>,
) -> Result<impl IntoResponse, AppError> {
    let goods = state.service.create_goods(&payload).await?;
    Ok((StatusCode::CREATED, Json(goods)))
}

/// Mark an order delivered and release its escrow
#[utoipa::path(
    post,
    path = "/api/admin/orders/{id}/delivered",
    tag = "admin",
    params(("id" = i64, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order delivered", body = Order),
        (status = 404, description = "Order not found", body = ErrorResponse)
    )
)]
pub async fn mark_delivered_handler(
    State(state): ApiState,
    Path(id): Path<EntityId>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.service.mark_delivered(id).await?))
}

/// Fulfillment provider events
#[utoipa::path(
    post,
    path = "/api/webhooks/printful",
    tag = "goods",
    request_body(content = String, content_type = "application/json"),
    responses(
        (status = 200, description = "Event acknowledged", body = WebhookAck),
        (status = 400, description = "Malformed payload", body = ErrorResponse),
        (status = 401, description = "Invalid signature", body = ErrorResponse)
    )
)]
pub async fn printful_webhook_handler(
    State(state): ApiState,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    Ok(Json(
        state
            .service
            .handle_fulfillment_webhook(&body, signature)
            .await?,
    ))
}

// ---------------------------------------------------------------------------
// Contest revenue
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/admin/revenue",
    tag = "admin",
    request_body = CreateRevenueRequest,
    responses(
        (status = 201, description = "Revenue recorded", body = Revenue),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 404, description = "Contest not found", body = ErrorResponse)
    )
)]
pub async fn create_revenue_handler(
    State(state): ApiState,
    Json(payload): Json<CreateRevenueRequest>,
) -> Result<impl IntoResponse, AppError> {
    let revenue = state.service.create_revenue(&payload).await?;
    Ok((StatusCode::CREATED, Json(revenue)))
}

/// Split a revenue between creator, voters, NFT holder and platform
#[utoipa::path(
    post,
    path = "/api/admin/revenue/{id}/distribute",
    tag = "admin",
    params(("id" = i64, Path, description = "Revenue ID")),
    request_body = DistributeRevenueRequest,
    responses(
        (status = 200, description = "Revenue distributed", body = DistributionResult),
        (status = 404, description = "Revenue not found", body = ErrorResponse),
        (status = 409, description = "Already distributed", body = ErrorResponse)
    )
)]
pub async fn distribute_revenue_handler(
    State(state): ApiState,
    Path(id): Path<EntityId>,
    Json(payload): Json<DistributeRevenueRequest>,
) -> Result<Json<DistributionResult>, AppError> {
    Ok(Json(state.service.distribute_revenue(id, &payload).await?))
}

#[utoipa::path(
    get,
    path = "/api/revenue/contest/{id}",
    tag = "revenue",
    params(("id" = i64, Path, description = "Contest ID")),
    responses(
        (status = 200, description = "Contest revenue and shares", body = ContestRevenueResponse),
        (status = 404, description = "Contest not found", body = ErrorResponse)
    )
)]
pub async fn contest_revenue_handler(
    State(state): ApiState,
    Path(id): Path<EntityId>,
) -> Result<Json<ContestRevenueResponse>, AppError> {
    Ok(Json(state.service.contest_revenue(id).await?))
}

#[utoipa::path(
    get,
    path = "/api/revenue/contest/{id}/my-share/{wallet}",
    tag = "revenue",
    params(
        ("id" = i64, Path, description = "Contest ID"),
        ("wallet" = String, Path, description = "Wallet address")
    ),
    responses((status = 200, description = "The wallet's stake", body = MyShareResponse))
)]
pub async fn my_share_handler(
    State(state): ApiState,
    Path((id, wallet)): Path<(EntityId, String)>,
) -> Result<Json<MyShareResponse>, AppError> {
    Ok(Json(state.service.my_share(id, &wallet).await?))
}

#[utoipa::path(
    get,
    path = "/api/revenue/wallet/{wallet}",
    tag = "revenue",
    params(("wallet" = String, Path, description = "Wallet address")),
    responses((status = 200, description = "Shares earned", body = WalletRevenueResponse))
)]
pub async fn wallet_revenue_handler(
    State(state): ApiState,
    Path(wallet): Path<String>,
) -> Result<Json<WalletRevenueResponse>, AppError> {
    Ok(Json(state.service.wallet_revenue(&wallet).await?))
}

// ---------------------------------------------------------------------------
// Rewards
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/rewards/dashboard",
    tag = "rewards",
    responses((status = 200, description = "Goods reward totals", body = RewardsDashboard))
)]
pub async fn dashboard_handler(State(state): ApiState) -> Result<Json<RewardsDashboard>, AppError> {
    Ok(Json(state.service.dashboard().await?))
}

#[utoipa::path(
    get,
    path = "/api/rewards/voter-pool/{contest_id}",
    tag = "rewards",
    params(("contest_id" = i64, Path, description = "Contest ID")),
    responses((status = 200, description = "Pool and voter weights", body = VoterPoolResponse))
)]
pub async fn voter_pool_handler(
    State(state): ApiState,
    Path(contest_id): Path<EntityId>,
) -> Result<Json<VoterPoolResponse>, AppError> {
    Ok(Json(state.service.voter_pool(contest_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/rewards/claimable/{contest_id}/{wallet}",
    tag = "rewards",
    params(
        ("contest_id" = i64, Path, description = "Contest ID"),
        ("wallet" = String, Path, description = "Voter wallet")
    ),
    responses((status = 200, description = "Claimable amount", body = ClaimableResponse))
)]
pub async fn claimable_handler(
    State(state): ApiState,
    Path((contest_id, wallet)): Path<(EntityId, String)>,
) -> Result<Json<ClaimableResponse>, AppError> {
    Ok(Json(state.service.claimable(contest_id, &wallet).await?))
}

/// Claim a voter's pending pool rewards
#[utoipa::path(
    post,
    path = "/api/rewards/claim/{contest_id}",
    tag = "rewards",
    params(("contest_id" = i64, Path, description = "Contest ID")),
    request_body = ClaimRequest,
    responses(
        (status = 200, description = "Claim recorded", body = ClaimResponse),
        (status = 400, description = "Nothing to claim", body = ErrorResponse),
        (status = 409, description = "Concurrent claim", body = ErrorResponse)
    )
)]
pub async fn claim_handler(
    State(state): ApiState,
    Path(contest_id): Path<EntityId>,
    Json(payload): Json<ClaimRequest>,
) -> Result<Json<ClaimResponse>, AppError> {
    Ok(Json(state.service.claim(contest_id, &payload).await?))
}

#[utoipa::path(
    get,
    path = "/api/rewards/my-claims/{wallet}",
    tag = "rewards",
    params(("wallet" = String, Path, description = "Voter wallet")),
    responses((status = 200, description = "Claims with pending amounts", body = Vec<ClaimWithPending>))
)]
pub async fn my_claims_handler(
    State(state): ApiState,
    Path(wallet): Path<String>,
) -> Result<Json<Vec<ClaimWithPending>>, AppError> {
    Ok(Json(state.service.my_claims(&wallet).await?))
}

/// Shipped orders for the world map
#[utoipa::path(
    get,
    path = "/api/rewards/map",
    tag = "rewards",
    params(OrderMapQuery),
    responses((status = 200, description = "Orders and totals", body = OrderMapResponse))
)]
pub async fn order_map_handler(
    State(state): ApiState,
    Query(query): Query<OrderMapQuery>,
) -> Result<Json<OrderMapResponse>, AppError> {
    Ok(Json(state.service.order_map(query.wallet.as_deref()).await?))
}

// ---------------------------------------------------------------------------
// Health and metrics
// ---------------------------------------------------------------------------

/// Detailed health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Health status", body = HealthResponse)
    )
)]
pub async fn health_check_handler(State(state): ApiState) -> Json<HealthResponse> {
    Json(state.service.health_check().await)
}

/// Kubernetes liveness probe
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "health",
    responses(
        (status = 200, description = "Application is alive")
    )
)]
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Kubernetes readiness probe
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Application is ready to serve traffic"),
        (status = 503, description = "Application is not ready")
    )
)]
pub async fn readiness_handler(State(state): ApiState) -> StatusCode {
    let health = state.service.health_check().await;
    match health.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Prometheus text exposition
pub async fn metrics_handler(State(state): ApiState) -> axum::response::Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_type, message) = match &self {
            AppError::Database(db_err) => match db_err {
                DatabaseError::Connection(_) | DatabaseError::PoolExhausted(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "database_error",
                    self.to_string(),
                ),
                DatabaseError::NotFound(_) => {
                    (StatusCode::NOT_FOUND, "not_found", self.to_string())
                }
                DatabaseError::Duplicate(_) => {
                    (StatusCode::CONFLICT, "duplicate", self.to_string())
                }
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    self.to_string(),
                ),
            },
            AppError::Blockchain(bc_err) => match bc_err {
                BlockchainError::Connection(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "blockchain_error",
                    self.to_string(),
                ),
                BlockchainError::InsufficientFunds => (
                    StatusCode::PAYMENT_REQUIRED,
                    "insufficient_funds",
                    self.to_string(),
                ),
                BlockchainError::InvalidSignature(_) | BlockchainError::InvalidAddress(_) => (
                    StatusCode::BAD_REQUEST,
                    "blockchain_error",
                    self.to_string(),
                ),
                BlockchainError::Timeout(_) => {
                    (StatusCode::GATEWAY_TIMEOUT, "timeout", self.to_string())
                }
                _ => (
                    StatusCode::BAD_GATEWAY,
                    "blockchain_error",
                    self.to_string(),
                ),
            },
            AppError::ExternalService(ext_err) => match ext_err {
                ExternalServiceError::Timeout(_) => {
                    (StatusCode::GATEWAY_TIMEOUT, "timeout", self.to_string())
                }
                ExternalServiceError::RateLimited(_) => (
                    StatusCode::TOO_MANY_REQUESTS,
                    "rate_limited",
                    self.to_string(),
                ),
                _ => (
                    StatusCode::BAD_GATEWAY,
                    "external_service_error",
                    self.to_string(),
                ),
            },
            AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "configuration_error",
                self.to_string(),
            ),
            AppError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                self.to_string(),
            ),
            AppError::Authentication(_) => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                self.to_string(),
            ),
            AppError::Authorization(_) => (
                StatusCode::FORBIDDEN,
                "authorization_error",
                self.to_string(),
            ),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict", self.to_string()),
            AppError::Serialization(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "serialization_error",
                self.to_string(),
            ),
        };

        if status.is_server_error() {
            error!(error_type = %error_type, message = %message, "Server error");
        }

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                r#type: error_type.to_string(),
                message,
            },
        });

        (status, body).into_response()
    }
}
