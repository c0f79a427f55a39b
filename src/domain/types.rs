use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::voting::validate_wallet;

/// Database identifier for every persisted entity.
pub type EntityId = i64;

/// Base58-encoded Solana wallet address.
pub type WalletAddress = String;

/// Base58-encoded transaction signature.
pub type TransactionId = String;

/// Implements `as_str`, `Display` and `FromStr` for a lowercase status enum.
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            #[must_use]
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!("unknown {}: {}", stringify!($name), other)),
                }
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Contests
// ---------------------------------------------------------------------------

/// Lifecycle of a contest. Transitions only move forward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContestStatus {
    Draft,
    Active,
    Ended,
}

string_enum!(ContestStatus {
    Draft => "draft",
    Active => "active",
    Ended => "ended",
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Contest {
    pub id: EntityId,
    pub title: String,
    pub description: Option<String>,
    pub status: ContestStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub winner_meme_id: Option<EntityId>,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Contest {
    /// Whether the scheduler should start this contest at `now`.
    #[must_use]
    pub fn is_due_to_start(&self, now: DateTime<Utc>) -> bool {
        self.status == ContestStatus::Draft && self.start_time <= now
    }

    /// Whether the scheduler should end this contest at `now`.
    #[must_use]
    pub fn is_due_to_end(&self, now: DateTime<Utc>) -> bool {
        self.status == ContestStatus::Active && self.end_time <= now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateContestRequest {
    #[validate(length(min = 1, max = 100, message = "Contest title is required"))]
    pub title: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl CreateContestRequest {
    pub fn new(title: impl Into<String>, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            description: None,
            start_time,
            end_time,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContestEndResult {
    pub contest: Contest,
    pub archived_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrentContestResponse {
    pub contest: Option<Contest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminStatusResponse {
    pub is_admin: bool,
}

// ---------------------------------------------------------------------------
// Memes and votes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Meme {
    pub id: EntityId,
    pub contest_id: Option<EntityId>,
    pub title: String,
    pub description: Option<String>,
    pub image_url: String,
    pub author_wallet: WalletAddress,
    pub author_username: String,
    /// Total SAMU voted for this meme.
    pub votes: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateMemeRequest {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[validate(url)]
    pub image_url: String,
    #[validate(custom(function = "validate_wallet"))]
    pub author_wallet: WalletAddress,
    #[validate(length(min = 1, max = 64))]
    pub author_username: String,
}

/// Meme fields after the service has resolved the contest and author name.
#[derive(Debug, Clone)]
pub struct NewMeme {
    pub contest_id: EntityId,
    pub title: String,
    pub description: Option<String>,
    pub image_url: String,
    pub author_wallet: WalletAddress,
    pub author_username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteMemeRequest {
    pub author_wallet: WalletAddress,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MemeSort {
    #[default]
    Votes,
    Latest,
}

/// Query parameters for listing memes.
#[derive(Debug, Clone, Serialize, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct MemeQuery {
    pub contest_id: Option<EntityId>,
    #[serde(default, alias = "sort_by")]
    pub sort: MemeSort,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_meme_limit")]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_meme_limit() -> u32 {
    1000
}

impl Default for MemeQuery {
    fn default() -> Self {
        Self {
            contest_id: None,
            sort: MemeSort::Votes,
            page: default_page(),
            limit: default_meme_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Vote {
    pub id: EntityId,
    pub meme_id: EntityId,
    pub contest_id: EntityId,
    pub voter_wallet: WalletAddress,
    pub samu_amount: i64,
    pub tx_signature: TransactionId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CastVoteRequest {
    #[validate(custom(function = "validate_wallet"))]
    pub voter_wallet: WalletAddress,
    #[validate(range(min = 1, message = "SAMU amount must be greater than 0"))]
    pub samu_amount: i64,
    #[validate(length(min = 1, message = "Transaction signature is required"))]
    pub tx_signature: TransactionId,
}

/// Vote fields after validation, ready for persistence.
#[derive(Debug, Clone)]
pub struct NewVote {
    pub meme_id: EntityId,
    pub contest_id: EntityId,
    pub voter_wallet: WalletAddress,
    pub samu_amount: i64,
    pub tx_signature: TransactionId,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CastVoteResponse {
    pub vote: Vote,
    pub meme: Meme,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VoteStatusResponse {
    pub has_voted: bool,
}

/// Total SAMU a single wallet voted within one contest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct VoterTotal {
    pub voter_wallet: WalletAddress,
    pub total_samu_amount: i64,
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct User {
    pub wallet_address: WalletAddress,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Name shown as meme author.
    #[must_use]
    pub fn public_name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.username)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 64))]
    pub display_name: Option<String>,
    #[validate(url)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct UserStats {
    pub total_memes: usize,
    pub total_meme_votes: i64,
    pub total_votes_cast: usize,
    pub total_samu_spent: i64,
    pub member_since: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct VotingPowerResponse {
    pub wallet_address: WalletAddress,
    /// Whole SAMU held by the wallet.
    pub samu_balance: u64,
    pub voting_power: u64,
}

// ---------------------------------------------------------------------------
// Goods, orders and escrow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GoodsStatus {
    Active,
    Archived,
}

string_enum!(GoodsStatus {
    Active => "active",
    Archived => "archived",
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Goods {
    pub id: EntityId,
    pub contest_id: Option<EntityId>,
    pub meme_id: Option<EntityId>,
    pub title: String,
    pub description: Option<String>,
    pub image_url: String,
    pub mockup_urls: Vec<String>,
    pub category: String,
    pub product_type: String,
    pub base_price_cents: i64,
    pub retail_price_cents: i64,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub status: GoodsStatus,
    pub fulfillment_product_id: Option<i64>,
    pub fulfillment_variant_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Goods {
    #[must_use]
    pub fn offers(&self, size: &str, color: &str) -> bool {
        self.sizes.iter().any(|s| s == size) && self.colors.iter().any(|c| c == color)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateGoodsRequest {
    #[validate(length(min = 1, max = 120))]
    pub title: String,
    pub description: Option<String>,
    #[validate(url)]
    pub image_url: String,
    pub contest_id: Option<EntityId>,
    pub meme_id: Option<EntityId>,
    #[validate(range(min = 1))]
    pub retail_price_cents: i64,
    pub base_price_cents: Option<i64>,
    pub sizes: Option<Vec<String>>,
    pub colors: Option<Vec<String>>,
    pub category: Option<String>,
    pub product_type: Option<String>,
    pub fulfillment_product_id: Option<i64>,
    pub fulfillment_variant_id: Option<i64>,
}

impl CreateGoodsRequest {
    pub fn new(title: impl Into<String>, image_url: impl Into<String>, retail_price_cents: i64) -> Self {
        Self {
            title: title.into(),
            description: None,
            image_url: image_url.into(),
            contest_id: None,
            meme_id: None,
            retail_price_cents,
            base_price_cents: None,
            sizes: None,
            colors: None,
            category: None,
            product_type: None,
            fulfillment_product_id: None,
            fulfillment_variant_id: None,
        }
    }
}

/// Goods fields after defaults have been applied.
#[derive(Debug, Clone)]
pub struct NewGoods {
    pub contest_id: Option<EntityId>,
    pub meme_id: Option<EntityId>,
    pub title: String,
    pub description: Option<String>,
    pub image_url: String,
    pub mockup_urls: Vec<String>,
    pub category: String,
    pub product_type: String,
    pub base_price_cents: i64,
    pub retail_price_cents: i64,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub fulfillment_product_id: Option<i64>,
    pub fulfillment_variant_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Failed,
    Canceled,
}

string_enum!(OrderStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    Shipped => "shipped",
    Delivered => "delivered",
    Failed => "failed",
    Canceled => "canceled",
});

impl OrderStatus {
    /// Delivered, failed and canceled orders never change again.
    #[must_use]
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Delivered | Self::Failed | Self::Canceled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ShippingDetails {
    pub name: String,
    pub address1: String,
    pub address2: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub country: String,
    pub zip: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Order {
    pub id: EntityId,
    pub goods_id: EntityId,
    pub buyer_wallet: WalletAddress,
    pub buyer_email: String,
    pub size: String,
    pub color: String,
    pub quantity: i32,
    pub total_price_cents: i64,
    pub sol_amount_lamports: Option<i64>,
    pub payment_signature: Option<TransactionId>,
    pub shipping: ShippingDetails,
    pub status: OrderStatus,
    pub fulfillment_order_id: Option<i64>,
    pub fulfillment_status: Option<String>,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct PlaceOrderRequest {
    #[validate(length(min = 1))]
    pub size: String,
    #[validate(length(min = 1))]
    pub color: String,
    #[validate(custom(function = "validate_wallet"))]
    pub buyer_wallet: WalletAddress,
    #[validate(email)]
    pub buyer_email: String,
    #[validate(length(min = 1))]
    pub shipping_name: String,
    #[validate(length(min = 1))]
    pub shipping_address1: String,
    pub shipping_address2: Option<String>,
    #[validate(length(min = 1))]
    pub shipping_city: String,
    pub shipping_state: Option<String>,
    #[validate(length(min = 2, max = 2, message = "Country must be an ISO 3166 alpha-2 code"))]
    pub shipping_country: String,
    #[validate(length(min = 1))]
    pub shipping_zip: String,
    pub shipping_phone: Option<String>,
    #[validate(range(min = 1))]
    pub sol_amount_lamports: Option<i64>,
    pub payment_signature: Option<TransactionId>,
}

impl PlaceOrderRequest {
    #[must_use]
    pub fn shipping(&self) -> ShippingDetails {
        ShippingDetails {
            name: self.shipping_name.clone(),
            address1: self.shipping_address1.clone(),
            address2: self.shipping_address2.clone(),
            city: self.shipping_city.clone(),
            state: self.shipping_state.clone(),
            country: self.shipping_country.clone(),
            zip: self.shipping_zip.clone(),
            phone: self.shipping_phone.clone(),
        }
    }
}

/// Order fields ready for persistence.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub goods_id: EntityId,
    pub buyer_wallet: WalletAddress,
    pub buyer_email: String,
    pub size: String,
    pub color: String,
    pub quantity: i32,
    pub total_price_cents: i64,
    pub sol_amount_lamports: Option<i64>,
    pub payment_signature: Option<TransactionId>,
    pub shipping: ShippingDetails,
    pub status: OrderStatus,
    pub fulfillment_order_id: Option<i64>,
    pub fulfillment_status: Option<String>,
}

/// Partial update applied to an order by webhooks and admin actions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderUpdate {
    pub status: Option<OrderStatus>,
    pub fulfillment_status: Option<String>,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
}

impl OrderUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EscrowStatus {
    Held,
    Released,
    Refunded,
}

string_enum!(EscrowStatus {
    Held => "held",
    Released => "released",
    Refunded => "refunded",
});

/// Profit portion of a paid order, held until delivery is confirmed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Escrow {
    pub id: EntityId,
    pub order_id: EntityId,
    pub amount_lamports: i64,
    pub status: EscrowStatus,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlaceOrderResponse {
    pub order: Order,
    pub escrow: Option<Escrow>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ShippingAddress {
    #[validate(length(min = 1))]
    pub address1: String,
    #[validate(length(min = 1))]
    pub city: String,
    #[validate(length(min = 2, max = 2))]
    pub country_code: String,
    pub state_code: Option<String>,
    #[validate(length(min = 1))]
    pub zip: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ShippingRate {
    pub id: String,
    pub name: String,
    /// Decimal amount as returned by the carrier, e.g. "4.99".
    pub rate: String,
    pub currency: String,
    pub min_delivery_days: Option<u32>,
    pub max_delivery_days: Option<u32>,
}

impl ShippingRate {
    /// Rate quoted when no fulfillment provider is configured.
    #[must_use]
    pub fn flat_rate() -> Self {
        Self {
            id: "STANDARD".to_string(),
            name: "Flat Rate (Standard)".to_string(),
            rate: "4.99".to_string(),
            currency: "USD".to_string(),
            min_delivery_days: Some(5),
            max_delivery_days: Some(10),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShippingEstimateResponse {
    pub shipping_rates: Vec<ShippingRate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VariantCatalog {
    pub product_id: i64,
    pub product_name: String,
    /// colour -> size -> provider variant id
    pub variants: std::collections::BTreeMap<String, std::collections::BTreeMap<String, i64>>,
    pub available_colors: Vec<String>,
    pub available_sizes: Vec<String>,
}

/// Order submitted to the print-on-demand provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FulfillmentOrderRequest {
    pub recipient: ShippingDetails,
    pub email: String,
    pub sync_variant_id: Option<i64>,
    pub quantity: i32,
    pub retail_price_cents: i64,
    pub file_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FulfillmentOrderReceipt {
    pub id: i64,
    pub status: String,
}

// ---------------------------------------------------------------------------
// Revenue and rewards
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ShareRole {
    Creator,
    Voter,
    NftHolder,
    Platform,
}

string_enum!(ShareRole {
    Creator => "creator",
    Voter => "voter",
    NftHolder => "nft_holder",
    Platform => "platform",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RevenueStatus {
    Pending,
    Distributed,
}

string_enum!(RevenueStatus {
    Pending => "pending",
    Distributed => "distributed",
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Revenue {
    pub id: EntityId,
    pub contest_id: EntityId,
    pub source: String,
    pub description: Option<String>,
    pub total_lamports: i64,
    pub status: RevenueStatus,
    pub memo_signature: Option<TransactionId>,
    pub created_at: DateTime<Utc>,
    pub distributed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateRevenueRequest {
    pub contest_id: EntityId,
    #[validate(length(min = 1, max = 64))]
    pub source: String,
    pub description: Option<String>,
    #[validate(range(min = 1, message = "A positive SOL amount is required"))]
    pub total_lamports: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct DistributeRevenueRequest {
    #[validate(custom(function = "validate_wallet"))]
    pub nft_holder_wallet: Option<WalletAddress>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct RevenueShare {
    pub id: EntityId,
    pub revenue_id: EntityId,
    pub contest_id: EntityId,
    pub wallet_address: WalletAddress,
    pub role: ShareRole,
    pub share_bps: i64,
    pub amount_lamports: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// A share line before it is persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewRevenueShare {
    pub wallet_address: WalletAddress,
    pub role: ShareRole,
    pub share_bps: i64,
    pub amount_lamports: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DistributionResult {
    pub revenue: Revenue,
    pub shares: Vec<RevenueShare>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct VoterBreakdown {
    pub wallet: WalletAddress,
    pub samu_voted: i64,
    pub vote_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct VoteSummaryResponse {
    pub total_voters: usize,
    pub total_samu_voted: i64,
    pub voter_breakdown: Vec<VoterBreakdown>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContestRevenueResponse {
    pub revenues: Vec<Revenue>,
    pub shares: Vec<RevenueShare>,
    pub vote_summary: VoteSummaryResponse,
    pub share_config: super::revenue::ShareConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct VotingShare {
    pub samu_voted: i64,
    pub vote_percent: f64,
    pub total_contest_samu: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MyShareResponse {
    pub wallet: WalletAddress,
    pub contest_id: EntityId,
    pub voting: VotingShare,
    pub is_creator: bool,
    pub revenue_shares: Vec<RevenueShare>,
    pub total_earned_lamports: i64,
    pub share_config: super::revenue::ShareConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WalletRevenueResponse {
    pub wallet: WalletAddress,
    pub shares: Vec<RevenueShare>,
    pub total_earned_lamports: i64,
}

/// Split of one released escrow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct GoodsRevenueDistribution {
    pub id: EntityId,
    pub order_id: EntityId,
    pub goods_id: EntityId,
    pub contest_id: Option<EntityId>,
    pub creator_wallet: Option<WalletAddress>,
    pub total_lamports: i64,
    pub creator_amount: i64,
    pub voter_pool_amount: i64,
    pub platform_amount: i64,
    pub created_at: DateTime<Utc>,
}

/// Distribution fields before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGoodsDistribution {
    pub order_id: EntityId,
    pub goods_id: EntityId,
    pub contest_id: Option<EntityId>,
    pub creator_wallet: Option<WalletAddress>,
    pub total_lamports: i64,
    pub creator_amount: i64,
    pub voter_pool_amount: i64,
    pub platform_amount: i64,
}

/// Amount added to a contest's voter pool when an escrow is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolCredit {
    pub contest_id: EntityId,
    pub amount_lamports: i64,
    /// Total SAMU voted in the contest; only used when the pool is created.
    pub total_weight: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct VoterRewardPool {
    pub contest_id: EntityId,
    pub total_credited_lamports: i64,
    pub total_weight: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct VoterClaim {
    pub contest_id: EntityId,
    pub wallet_address: WalletAddress,
    pub weight: i64,
    pub claimed_lamports: i64,
    pub last_claimed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct PoolVoter {
    pub wallet: WalletAddress,
    pub samu_amount: i64,
    pub share_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VoterPoolResponse {
    pub pool: Option<VoterRewardPool>,
    pub voters: Vec<PoolVoter>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ClaimableResponse {
    pub contest_id: EntityId,
    pub wallet_address: WalletAddress,
    pub weight: i64,
    pub entitled_lamports: i64,
    pub claimed_lamports: i64,
    pub claimable_lamports: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ClaimRequest {
    #[validate(custom(function = "validate_wallet"))]
    pub wallet_address: WalletAddress,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ClaimResponse {
    pub contest_id: EntityId,
    pub wallet_address: WalletAddress,
    pub claimed_now_lamports: i64,
    pub total_claimed_lamports: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ClaimWithPending {
    #[serde(flatten)]
    pub claim: VoterClaim,
    pub pending_lamports: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoleTotal {
    pub percent: f64,
    pub total_lamports: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardSummary {
    pub total_sales_lamports: i64,
    pub total_orders: usize,
    pub total_distributed_lamports: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RewardsDashboard {
    pub summary: DashboardSummary,
    pub creator: RoleTotal,
    pub voter: RoleTotal,
    pub platform: RoleTotal,
    pub creator_wallets: Vec<WalletAddress>,
    pub treasury_wallet: WalletAddress,
    pub recent_distributions: Vec<GoodsRevenueDistribution>,
    pub share_ratios: super::revenue::GoodsShareConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DistributionParts {
    pub creator_amount: i64,
    pub voter_pool_amount: i64,
    pub platform_amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MapOrder {
    pub id: EntityId,
    pub city: String,
    pub country: String,
    pub status: String,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    pub sol_amount_lamports: Option<i64>,
    pub total_price_cents: i64,
    pub goods_title: String,
    pub goods_image: Option<String>,
    pub product_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub has_revenue: bool,
    pub distribution: Option<DistributionParts>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MapStats {
    pub total: usize,
    pub shipped: usize,
    pub delivered: usize,
    pub countries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderMapResponse {
    pub orders: Vec<MapOrder>,
    pub stats: MapStats,
}

#[derive(Debug, Clone, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderMapQuery {
    pub wallet: Option<WalletAddress>,
}

// ---------------------------------------------------------------------------
// Blockchain
// ---------------------------------------------------------------------------

/// Expected transfer that a submitted transaction signature must prove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCheck {
    pub signature: TransactionId,
    pub source_wallet: WalletAddress,
    pub destination_wallet: WalletAddress,
    /// SPL token mint, `None` for native SOL.
    pub mint: Option<String>,
    /// Minimum amount in raw units (token base units or lamports).
    pub min_amount: u64,
}

// ---------------------------------------------------------------------------
// Pagination, health, errors
// ---------------------------------------------------------------------------

/// Page-based response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
    pub has_more: bool,
}

impl<T> PaginatedResponse<T> {
    /// Wraps one page fetched from storage together with the overall count.
    pub fn from_page(items: Vec<T>, total: u64, page: u32, limit: u32) -> Self {
        let page = page.max(1);
        let limit = limit.max(1);
        let start = u64::from(page - 1).saturating_mul(u64::from(limit));
        let total_pages = total.div_ceil(u64::from(limit)) as u32;
        let has_more = start.saturating_add(items.len() as u64) < total;
        Self {
            items,
            total,
            page,
            limit,
            total_pages,
            has_more,
        }
    }

    /// Slices an already sorted collection into the requested page.
    pub fn from_sorted(all: Vec<T>, page: u32, limit: u32) -> Self {
        let page = page.max(1);
        let limit = limit.max(1);
        let total = all.len() as u64;
        let start = ((page - 1) as usize).saturating_mul(limit as usize);
        let items: Vec<T> = all.into_iter().skip(start).take(limit as usize).collect();
        Self::from_page(items, total, page, limit)
    }
}

/// Health check status for services.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Health check response for the application.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub database: HealthStatus,
    pub blockchain: HealthStatus,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    /// The database is required; a failing blockchain RPC only degrades the service.
    pub fn new(database: HealthStatus, blockchain: HealthStatus) -> Self {
        let status = match (&database, &blockchain) {
            (HealthStatus::Healthy, HealthStatus::Healthy) => HealthStatus::Healthy,
            (HealthStatus::Unhealthy, _) => HealthStatus::Unhealthy,
            _ => HealthStatus::Degraded,
        };

        Self {
            status,
            database,
            blockchain,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    pub r#type: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RateLimitResponse {
    pub error: ErrorDetail,
    pub retry_after: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookAck {
    pub ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn contest(status: ContestStatus) -> Contest {
        let now = Utc::now();
        Contest {
            id: 1,
            title: "Weekly".to_string(),
            description: None,
            status,
            start_time: now - Duration::hours(1),
            end_time: now + Duration::hours(1),
            winner_meme_id: None,
            created_at: now,
            ended_at: None,
        }
    }

    #[test]
    fn test_status_round_trip_through_str() {
        for status in [ContestStatus::Draft, ContestStatus::Active, ContestStatus::Ended] {
            assert_eq!(status.as_str().parse::<ContestStatus>().unwrap(), status);
        }
        assert!("archived".parse::<ContestStatus>().is_err());
        assert_eq!(ShareRole::NftHolder.to_string(), "nft_holder");
        assert_eq!("refunded".parse::<EscrowStatus>().unwrap(), EscrowStatus::Refunded);
    }

    #[test]
    fn test_contest_due_checks() {
        let now = Utc::now();
        let draft = contest(ContestStatus::Draft);
        assert!(draft.is_due_to_start(now));
        assert!(!draft.is_due_to_end(now + Duration::hours(2)));

        let active = contest(ContestStatus::Active);
        assert!(!active.is_due_to_end(now));
        assert!(active.is_due_to_end(now + Duration::hours(2)));
        assert!(!active.is_due_to_start(now));
    }

    #[test]
    fn test_order_status_finality() {
        assert!(OrderStatus::Delivered.is_final());
        assert!(OrderStatus::Canceled.is_final());
        assert!(!OrderStatus::Shipped.is_final());
        assert!(!OrderStatus::Pending.is_final());
    }

    #[test]
    fn test_paginated_response_slices() {
        let page = PaginatedResponse::from_sorted((1..=25).collect::<Vec<_>>(), 2, 10);
        assert_eq!(page.items, (11..=20).collect::<Vec<_>>());
        assert_eq!(page.total, 25);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_more);

        let last = PaginatedResponse::from_sorted((1..=25).collect::<Vec<_>>(), 3, 10);
        assert_eq!(last.items.len(), 5);
        assert!(!last.has_more);

        let beyond = PaginatedResponse::from_sorted((1..=5).collect::<Vec<_>>(), 9, 10);
        assert!(beyond.items.is_empty());
        assert!(!beyond.has_more);
    }

    #[test]
    fn test_paginated_response_zero_page_is_first_page() {
        let page = PaginatedResponse::from_sorted(vec!["a", "b"], 0, 1);
        assert_eq!(page.page, 1);
        assert_eq!(page.items, vec!["a"]);
    }

    #[test]
    fn test_health_response_statuses() {
        let healthy = HealthResponse::new(HealthStatus::Healthy, HealthStatus::Healthy);
        assert_eq!(healthy.status, HealthStatus::Healthy);

        let degraded = HealthResponse::new(HealthStatus::Healthy, HealthStatus::Unhealthy);
        assert_eq!(degraded.status, HealthStatus::Degraded);

        let unhealthy = HealthResponse::new(HealthStatus::Unhealthy, HealthStatus::Healthy);
        assert_eq!(unhealthy.status, HealthStatus::Unhealthy);
    }

    #[test]
    fn test_user_public_name_prefers_display_name() {
        let now = Utc::now();
        let mut user = User {
            wallet_address: "w".to_string(),
            username: "abcd1234...wxyz".to_string(),
            display_name: Some("wolf_master".to_string()),
            avatar_url: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(user.public_name(), "wolf_master");

        user.display_name = Some(String::new());
        assert_eq!(user.public_name(), "abcd1234...wxyz");
    }

    #[test]
    fn test_goods_offers_variant() {
        let goods = Goods {
            id: 1,
            contest_id: None,
            meme_id: None,
            title: "Tee".to_string(),
            description: None,
            image_url: "https://cdn.example.com/a.png".to_string(),
            mockup_urls: vec![],
            category: "clothing".to_string(),
            product_type: "t-shirt".to_string(),
            base_price_cents: 1500,
            retail_price_cents: 2500,
            sizes: vec!["M".to_string(), "L".to_string()],
            colors: vec!["Black".to_string()],
            status: GoodsStatus::Active,
            fulfillment_product_id: None,
            fulfillment_variant_id: None,
            created_at: Utc::now(),
        };
        assert!(goods.offers("M", "Black"));
        assert!(!goods.offers("XL", "Black"));
        assert!(!goods.offers("M", "White"));
    }

    #[test]
    fn test_meme_query_defaults_from_empty_json() {
        let query: MemeQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.sort, MemeSort::Votes);
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 1000);
        assert!(query.contest_id.is_none());
    }

    #[test]
    fn test_meme_query_reads_sort_and_legacy_sort_by() {
        let query: MemeQuery = serde_json::from_str(r#"{"sort":"latest"}"#).unwrap();
        assert_eq!(query.sort, MemeSort::Latest);
        let query: MemeQuery = serde_json::from_str(r#"{"sort_by":"latest"}"#).unwrap();
        assert_eq!(query.sort, MemeSort::Latest);
    }
}
