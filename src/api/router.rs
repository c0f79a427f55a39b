//! HTTP routing configuration with rate limiting and OpenAPI documentation.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::{
    Json, Router,
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderValue, Request, Response, StatusCode},
    middleware::{self, Next},
    response::IntoResponse,
    routing::{get, post},
};
use governor::{Quota, RateLimiter};
use tower::ServiceBuilder;
use tower_http::{
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::app::AppState;
use crate::domain::{ErrorDetail, ErrorResponse, RateLimitResponse};

use super::handlers::{
    ApiDoc, admin_check_handler, cast_vote_handler, claim_handler, claimable_handler,
    contest_revenue_handler, create_contest_handler, create_goods_handler, create_meme_handler,
    create_revenue_handler, current_contest_handler, dashboard_handler, delete_meme_handler,
    distribute_revenue_handler, end_contest_handler, estimate_shipping_handler,
    get_contest_handler, get_goods_handler, get_meme_handler, get_user_handler,
    health_check_handler, list_all_memes_handler, list_contests_handler, list_goods_handler,
    list_memes_handler, liveness_handler, mark_delivered_handler, metrics_handler,
    my_claims_handler, my_share_handler, order_map_handler, place_order_handler,
    printful_webhook_handler, readiness_handler, start_contest_handler, update_user_handler,
    user_memes_handler, user_stats_handler, user_votes_handler, variants_handler,
    voter_pool_handler, vote_status_handler, voting_power_handler, wallet_orders_handler,
    wallet_revenue_handler,
};
use super::middleware::require_admin;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests per second for API endpoints
    pub general_rps: u32,
    /// Burst size for API endpoints
    pub general_burst: u32,
    /// Requests per second for health endpoints
    pub health_rps: u32,
    /// Burst size for health endpoints
    pub health_burst: u32,
    /// Key clients by `X-Forwarded-For` / `X-Real-IP`. Only safe behind a proxy
    /// that overwrites those headers.
    pub trust_proxy_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            general_rps: 10,
            general_burst: 20,
            health_rps: 100,
            health_burst: 100,
            trust_proxy_headers: false,
        }
    }
}

impl RateLimitConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config through `lookup`; unparsable values fall back to defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let read = |key: &str, default: u32| {
            lookup(key)
                .and_then(|v| v.trim().parse().ok())
                .filter(|v: &u32| *v > 0)
                .unwrap_or(default)
        };

        let trust_proxy_headers = lookup("TRUST_PROXY_HEADERS")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(defaults.trust_proxy_headers);

        Self {
            general_rps: read("RATE_LIMIT_RPS", defaults.general_rps),
            general_burst: read("RATE_LIMIT_BURST", defaults.general_burst),
            trust_proxy_headers,
            ..defaults
        }
    }
}

type KeyedLimiter = RateLimiter<
    IpAddr,
    governor::state::keyed::DashMapStateStore<IpAddr>,
    governor::clock::DefaultClock,
>;

type ClockInstant = <governor::clock::DefaultClock as governor::clock::Clock>::Instant;

/// Idle client keys are pruned once per this many checks.
const RETAIN_EVERY: u64 = 4096;

/// Shared rate limiter state (keyed by client IP to prevent global DoS)
pub struct RateLimitState {
    api_limiter: KeyedLimiter,
    health_limiter: KeyedLimiter,
    config: RateLimitConfig,
    checks: AtomicU64,
}

fn quota(rps: u32, burst: u32) -> Quota {
    Quota::per_second(NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN))
        .allow_burst(NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN))
}

impl RateLimitState {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            api_limiter: RateLimiter::dashmap(quota(config.general_rps, config.general_burst)),
            health_limiter: RateLimiter::dashmap(quota(config.health_rps, config.health_burst)),
            config,
            checks: AtomicU64::new(0),
        }
    }

    fn check(
        &self,
        limiter: &KeyedLimiter,
        client_ip: &IpAddr,
    ) -> Result<(), governor::NotUntil<ClockInstant>> {
        if self.checks.fetch_add(1, Ordering::Relaxed) % RETAIN_EVERY == RETAIN_EVERY - 1 {
            self.retain_recent();
        }
        limiter.check_key(client_ip)
    }

    /// Drops keys whose buckets have fully refilled.
    pub fn retain_recent(&self) {
        self.api_limiter.retain_recent();
        self.api_limiter.shrink_to_fit();
        self.health_limiter.retain_recent();
        self.health_limiter.shrink_to_fit();
    }

    fn client_ip<B>(&self, request: &Request<B>) -> IpAddr {
        client_ip_from_request(request, self.config.trust_proxy_headers)
    }
}

/// Extract client IP from request (X-Forwarded-For and X-Real-IP when trusted,
/// then ConnectInfo). Unknown clients share the 0.0.0.0 bucket.
fn client_ip_from_request<B>(request: &Request<B>, trust_proxy_headers: bool) -> IpAddr {
    if trust_proxy_headers {
        if let Some(ip) = forwarded_ip(request) {
            return ip;
        }
    }
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip();
    }
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn forwarded_ip<B>(request: &Request<B>) -> Option<IpAddr> {
    // client is first in X-Forwarded-For
    if let Some(ip) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok())
    {
        return Some(ip);
    }
    request
        .headers()
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

fn retry_after_secs(not_until: &governor::NotUntil<ClockInstant>) -> u64 {
    let wait = not_until.wait_time_from(governor::clock::Clock::now(
        &governor::clock::DefaultClock::default(),
    ));
    wait.as_secs().max(1)
}

/// Rate limit middleware for API endpoints
async fn rate_limit_api_middleware(
    State(rate_limit): State<Arc<RateLimitState>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let client_ip = rate_limit.client_ip(&request);
    let limit = HeaderValue::from(rate_limit.config.general_rps);
    match rate_limit.check(&rate_limit.api_limiter, &client_ip) {
        Ok(_) => {
            let mut response = next.run(request).await;
            response.headers_mut().insert("X-RateLimit-Limit", limit);
            response
        }
        Err(not_until) => {
            let retry_after = retry_after_secs(&not_until);
            let body = RateLimitResponse {
                error: ErrorDetail {
                    r#type: "rate_limited".to_string(),
                    message: "Rate limit exceeded. Please slow down your requests.".to_string(),
                },
                retry_after,
            };

            let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
            let headers = response.headers_mut();
            headers.insert("X-RateLimit-Limit", limit);
            headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));
            headers.insert("Retry-After", HeaderValue::from(retry_after));
            response
        }
    }
}

/// Rate limit middleware for health endpoints
async fn rate_limit_health_middleware(
    State(rate_limit): State<Arc<RateLimitState>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let client_ip = rate_limit.client_ip(&request);
    match rate_limit.check(&rate_limit.health_limiter, &client_ip) {
        Ok(_) => next.run(request).await,
        Err(not_until) => {
            let retry_after = retry_after_secs(&not_until);
            let body = ErrorResponse {
                error: ErrorDetail {
                    r#type: "rate_limited".to_string(),
                    message: "Rate limit exceeded".to_string(),
                },
            };

            let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
            response
                .headers_mut()
                .insert("Retry-After", HeaderValue::from(retry_after));
            response
        }
    }
}

/// Routes under `/api`.
fn api_routes(app_state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let admin_routes = Router::new()
        .route("/contests", post(create_contest_handler))
        .route("/contests/{id}/start", post(start_contest_handler))
        .route("/contests/{id}/end", post(end_contest_handler))
        .route("/goods", post(create_goods_handler))
        .route("/orders/{id}/delivered", post(mark_delivered_handler))
        .route("/revenue", post(create_revenue_handler))
        .route("/revenue/{id}/distribute", post(distribute_revenue_handler))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(app_state),
            require_admin,
        ))
        .route("/check/{email}", get(admin_check_handler));

    let contest_routes = Router::new()
        .route("/", get(list_contests_handler))
        .route("/current", get(current_contest_handler))
        .route("/{id}", get(get_contest_handler));

    let meme_routes = Router::new()
        .route("/", get(list_memes_handler).post(create_meme_handler))
        .route("/all", get(list_all_memes_handler))
        .route("/{id}", get(get_meme_handler).delete(delete_meme_handler))
        .route("/{id}/vote", post(cast_vote_handler))
        .route("/{id}/voted/{wallet}", get(vote_status_handler));

    let user_routes = Router::new()
        .route("/{wallet}", get(get_user_handler).put(update_user_handler))
        .route("/{wallet}/memes", get(user_memes_handler))
        .route("/{wallet}/votes", get(user_votes_handler))
        .route("/{wallet}/stats", get(user_stats_handler))
        .route("/{wallet}/voting-power", get(voting_power_handler));

    let goods_routes = Router::new()
        .route("/", get(list_goods_handler))
        .route("/variants", get(variants_handler))
        .route("/orders/{wallet}", get(wallet_orders_handler))
        .route("/{id}", get(get_goods_handler))
        .route("/{id}/estimate-shipping", post(estimate_shipping_handler))
        .route("/{id}/order", post(place_order_handler));

    let revenue_routes = Router::new()
        .route("/contest/{id}", get(contest_revenue_handler))
        .route("/contest/{id}/my-share/{wallet}", get(my_share_handler))
        .route("/wallet/{wallet}", get(wallet_revenue_handler));

    let reward_routes = Router::new()
        .route("/dashboard", get(dashboard_handler))
        .route("/voter-pool/{contest_id}", get(voter_pool_handler))
        .route("/claimable/{contest_id}/{wallet}", get(claimable_handler))
        .route("/claim/{contest_id}", post(claim_handler))
        .route("/my-claims/{wallet}", get(my_claims_handler))
        .route("/map", get(order_map_handler));

    Router::new()
        .nest("/contests", contest_routes)
        .nest("/memes", meme_routes)
        .nest("/users", user_routes)
        .nest("/goods", goods_routes)
        .nest("/revenue", revenue_routes)
        .nest("/rewards", reward_routes)
        .nest("/admin", admin_routes)
        .route("/webhooks/printful", post(printful_webhook_handler))
}

fn health_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health_check_handler))
        .route("/live", get(liveness_handler))
        .route("/ready", get(readiness_handler))
}

fn build_router(app_state: Arc<AppState>, rate_limit: Option<Arc<RateLimitState>>) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ));

    let mut api = api_routes(&app_state);
    let mut health = health_routes();
    let mut metrics = Router::new().route("/", get(metrics_handler));
    if let Some(rate_limit) = rate_limit {
        api = api.layer(middleware::from_fn_with_state(
            Arc::clone(&rate_limit),
            rate_limit_api_middleware,
        ));
        health = health.layer(middleware::from_fn_with_state(
            Arc::clone(&rate_limit),
            rate_limit_health_middleware,
        ));
        metrics = metrics.layer(middleware::from_fn_with_state(
            rate_limit,
            rate_limit_health_middleware,
        ));
    }

    Router::new()
        .nest("/api", api)
        .nest("/health", health)
        .nest("/metrics", metrics)
        .layer(middleware)
        .with_state(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

/// Create router without rate limiting
pub fn create_router(app_state: Arc<AppState>) -> Router {
    build_router(app_state, None)
}

/// Create router with rate limiting enabled
pub fn create_router_with_rate_limit(app_state: Arc<AppState>, config: RateLimitConfig) -> Router {
    build_router(app_state, Some(Arc::new(RateLimitState::new(config))))
}
