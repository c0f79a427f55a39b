//! Domain traits defining contracts for external systems.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::{AppError, BlockchainError};
use super::types::{
    Contest, ContestStatus, CreateContestRequest, CreateRevenueRequest, DistributionResult,
    EntityId, Escrow, FulfillmentOrderReceipt, FulfillmentOrderRequest, Goods,
    GoodsRevenueDistribution, Meme, MemeSort, NewGoods, NewGoodsDistribution, NewMeme, NewOrder,
    NewRevenueShare, NewVote, Order, OrderUpdate, PaginatedResponse, PoolCredit, Revenue,
    RevenueShare, ShippingAddress, ShippingRate, TransferCheck, UpdateProfileRequest, User, Vote,
    VoterClaim, VoterRewardPool, VoterTotal,
};

/// Contest persistence.
#[async_trait]
pub trait ContestRepository: Send + Sync {
    async fn create_contest(&self, data: &CreateContestRequest) -> Result<Contest, AppError>;

    async fn get_contest(&self, id: EntityId) -> Result<Option<Contest>, AppError>;

    /// All contests, newest first.
    async fn list_contests(&self) -> Result<Vec<Contest>, AppError>;

    async fn list_contests_by_status(
        &self,
        status: ContestStatus,
    ) -> Result<Vec<Contest>, AppError>;

    async fn get_active_contest(&self) -> Result<Option<Contest>, AppError>;

    /// Moves a draft to `active`.
    ///
    /// Fails with `AppError::Conflict` when the contest is not a draft or
    /// another contest is already active.
    async fn start_contest(&self, id: EntityId) -> Result<Contest, AppError>;

    /// Moves an active contest to `ended`, recording the winner.
    ///
    /// Fails with `AppError::Conflict` when the contest is not active.
    async fn end_contest(
        &self,
        id: EntityId,
        winner_meme_id: Option<EntityId>,
        ended_at: DateTime<Utc>,
    ) -> Result<Contest, AppError>;
}

/// Meme persistence.
#[async_trait]
pub trait MemeRepository: Send + Sync {
    async fn create_meme(&self, data: &NewMeme) -> Result<Meme, AppError>;

    async fn get_meme(&self, id: EntityId) -> Result<Option<Meme>, AppError>;

    /// One page of a contest's memes.
    async fn list_memes(
        &self,
        contest_id: EntityId,
        sort: MemeSort,
        page: u32,
        limit: u32,
    ) -> Result<PaginatedResponse<Meme>, AppError>;

    /// Every meme of a contest, most voted first.
    async fn memes_by_contest(&self, contest_id: EntityId) -> Result<Vec<Meme>, AppError>;

    /// Every meme, newest first.
    async fn list_all_memes(&self) -> Result<Vec<Meme>, AppError>;

    async fn memes_by_author(&self, wallet: &str) -> Result<Vec<Meme>, AppError>;

    async fn delete_meme(&self, id: EntityId) -> Result<bool, AppError>;
}

/// Vote persistence.
#[async_trait]
pub trait VoteRepository: Send + Sync {
    /// Stores a vote and adds its amount to the meme total in one transaction.
    ///
    /// A reused transaction signature yields `DatabaseError::Duplicate`.
    async fn record_vote(&self, data: &NewVote) -> Result<(Vote, Meme), AppError>;

    async fn has_voted(&self, meme_id: EntityId, wallet: &str) -> Result<bool, AppError>;

    async fn votes_by_wallet(&self, wallet: &str) -> Result<Vec<Vote>, AppError>;

    /// SAMU voted per wallet in a contest, largest first.
    async fn voter_totals(&self, contest_id: EntityId) -> Result<Vec<VoterTotal>, AppError>;
}

/// User profile persistence.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_user(&self, wallet: &str) -> Result<Option<User>, AppError>;

    /// Inserts a profile, returning the existing one when the wallet is known.
    async fn create_user(&self, wallet: &str, username: &str) -> Result<User, AppError>;

    async fn update_user(
        &self,
        wallet: &str,
        data: &UpdateProfileRequest,
    ) -> Result<User, AppError>;
}

/// Goods, orders and escrow persistence.
#[async_trait]
pub trait CommerceRepository: Send + Sync {
    async fn create_goods(&self, data: &NewGoods) -> Result<Goods, AppError>;

    async fn get_goods(&self, id: EntityId) -> Result<Option<Goods>, AppError>;

    /// Active goods, newest first.
    async fn list_goods(&self) -> Result<Vec<Goods>, AppError>;

    /// Stores an order and, for paid orders, its escrow in one transaction.
    async fn create_order(
        &self,
        data: &NewOrder,
        escrow_lamports: Option<i64>,
    ) -> Result<(Order, Option<Escrow>), AppError>;

    async fn get_order(&self, id: EntityId) -> Result<Option<Order>, AppError>;

    async fn find_order_by_fulfillment_id(
        &self,
        fulfillment_order_id: i64,
    ) -> Result<Option<Order>, AppError>;

    async fn orders_by_wallet(&self, wallet: &str) -> Result<Vec<Order>, AppError>;

    /// Every order, newest first.
    async fn list_orders(&self) -> Result<Vec<Order>, AppError>;

    async fn update_order(&self, id: EntityId, update: &OrderUpdate) -> Result<Order, AppError>;

    async fn get_escrow_by_order(&self, order_id: EntityId) -> Result<Option<Escrow>, AppError>;

    /// Releases a held escrow, records its distribution and credits the voter
    /// pool in one transaction.
    ///
    /// Returns `None` without side effects when the escrow is not held.
    async fn release_escrow(
        &self,
        order_id: EntityId,
        distribution: &NewGoodsDistribution,
        pool_credit: Option<PoolCredit>,
    ) -> Result<Option<GoodsRevenueDistribution>, AppError>;

    /// Refunds a held escrow. Returns `false` when it was not held.
    async fn refund_escrow(&self, order_id: EntityId) -> Result<bool, AppError>;

    /// Goods distributions, newest first.
    async fn list_distributions(&self) -> Result<Vec<GoodsRevenueDistribution>, AppError>;
}

/// Contest revenue and voter reward persistence.
#[async_trait]
pub trait RevenueRepository: Send + Sync {
    async fn create_revenue(&self, data: &CreateRevenueRequest) -> Result<Revenue, AppError>;

    async fn get_revenue(&self, id: EntityId) -> Result<Option<Revenue>, AppError>;

    async fn revenues_by_contest(&self, contest_id: EntityId) -> Result<Vec<Revenue>, AppError>;

    /// Stores share lines and marks the revenue distributed in one transaction.
    ///
    /// Fails with `AppError::Conflict` when the revenue was already distributed.
    async fn record_distribution(
        &self,
        revenue_id: EntityId,
        shares: &[NewRevenueShare],
    ) -> Result<DistributionResult, AppError>;

    async fn set_memo_signature(&self, revenue_id: EntityId, signature: &str)
    -> Result<(), AppError>;

    async fn shares_by_contest(&self, contest_id: EntityId) -> Result<Vec<RevenueShare>, AppError>;

    async fn shares_by_wallet(&self, wallet: &str) -> Result<Vec<RevenueShare>, AppError>;

    async fn get_pool(&self, contest_id: EntityId) -> Result<Option<VoterRewardPool>, AppError>;

    async fn get_claim(
        &self,
        contest_id: EntityId,
        wallet: &str,
    ) -> Result<Option<VoterClaim>, AppError>;

    async fn claims_by_wallet(&self, wallet: &str) -> Result<Vec<VoterClaim>, AppError>;

    /// Raises a voter's claimed total from `previous_claimed` to `new_claimed`.
    ///
    /// Returns `false` when the stored total no longer equals
    /// `previous_claimed`, i.e. a concurrent claim won.
    async fn record_claim(
        &self,
        contest_id: EntityId,
        wallet: &str,
        weight: i64,
        previous_claimed: i64,
        new_claimed: i64,
    ) -> Result<bool, AppError>;
}

/// Database client aggregating every repository.
#[async_trait]
pub trait DatabaseClient:
    ContestRepository
    + MemeRepository
    + VoteRepository
    + UserRepository
    + CommerceRepository
    + RevenueRepository
    + Send
    + Sync
{
    /// Check database connectivity
    async fn health_check(&self) -> Result<(), AppError>;
}

/// Blockchain client trait for chain operations
#[async_trait]
pub trait BlockchainClient: Send + Sync {
    /// Check blockchain RPC connectivity
    async fn health_check(&self) -> Result<(), AppError>;

    /// Raw token balance of `owner` for `mint`, summed over its token accounts.
    async fn get_token_balance(&self, owner: &str, mint: &str) -> Result<u64, AppError>;

    /// Whether the transaction proves the expected transfer.
    async fn verify_transfer(&self, check: &TransferCheck) -> Result<bool, AppError>;

    /// Submits a memo transaction and returns its signature.
    async fn submit_memo(&self, memo: &str) -> Result<String, AppError>;
}

/// Print-on-demand provider.
#[async_trait]
pub trait FulfillmentClient: Send + Sync {
    async fn create_order(
        &self,
        order: &FulfillmentOrderRequest,
    ) -> Result<FulfillmentOrderReceipt, AppError>;

    async fn shipping_rates(
        &self,
        variant_id: i64,
        address: &ShippingAddress,
        quantity: u32,
    ) -> Result<Vec<ShippingRate>, AppError>;
}

/// Signs transaction messages without exposing key material to the RPC client.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Base58 signature over `message`.
    async fn sign_message(&self, message: &[u8]) -> Result<String, BlockchainError>;

    /// Base58 public key of the signer.
    fn public_key(&self) -> String;
}
