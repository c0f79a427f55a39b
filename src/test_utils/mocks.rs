//! Mock implementations for testing.
//!
//! These mocks provide in-memory implementations of domain traits
//! that can be configured to simulate various scenarios including
//! success, failure, and edge cases.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::domain::{
    AppError, BlockchainClient, BlockchainError, CommerceRepository, Contest, ContestRepository,
    ContestStatus, CreateContestRequest, CreateRevenueRequest, DatabaseClient, DatabaseError,
    DistributionResult, EntityId, Escrow, EscrowStatus, ExternalServiceError,
    FulfillmentClient, FulfillmentOrderReceipt, FulfillmentOrderRequest, Goods, GoodsStatus,
    GoodsRevenueDistribution, Meme, MemeRepository, MemeSort, NewGoods, NewGoodsDistribution,
    NewMeme, NewOrder, NewRevenueShare, NewVote, Order, OrderUpdate, PaginatedResponse,
    PoolCredit, Revenue, RevenueRepository, RevenueShare, RevenueStatus, ShippingAddress,
    ShippingRate, TransferCheck, UpdateProfileRequest, User, UserRepository, Vote,
    VoteRepository, VoterClaim, VoterRewardPool, VoterTotal,
};

/// Configuration for mock behavior.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// If true, operations will fail.
    pub should_fail: bool,
    /// Custom error message for failures.
    pub error_message: Option<String>,
    /// Simulated latency in milliseconds.
    pub latency_ms: Option<u64>,
}

impl MockConfig {
    /// Creates a config that always succeeds.
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    /// Creates a config that always fails.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            should_fail: true,
            error_message: Some(message.into()),
            latency_ms: None,
        }
    }

    /// Adds simulated latency.
    #[must_use]
    pub fn with_latency(mut self, ms: u64) -> Self {
        self.latency_ms = Some(ms);
        self
    }

    async fn simulate_latency(&self) {
        if let Some(ms) = self.latency_ms {
            tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
        }
    }
}

#[derive(Default)]
struct MockStore {
    last_id: i64,
    contests: BTreeMap<EntityId, Contest>,
    memes: BTreeMap<EntityId, Meme>,
    votes: Vec<Vote>,
    users: HashMap<String, User>,
    goods: BTreeMap<EntityId, Goods>,
    orders: BTreeMap<EntityId, Order>,
    escrows: BTreeMap<EntityId, Escrow>,
    distributions: Vec<GoodsRevenueDistribution>,
    revenues: BTreeMap<EntityId, Revenue>,
    shares: Vec<RevenueShare>,
    pools: HashMap<EntityId, VoterRewardPool>,
    claims: HashMap<(EntityId, String), VoterClaim>,
}

impl MockStore {
    fn next_id(&mut self) -> EntityId {
        self.last_id += 1;
        self.last_id
    }
}

fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, EntityId)) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

/// Mock database client for testing.
///
/// Keeps every table in one in-memory store behind a single lock, so the
/// multi-row operations are atomic just like their SQL counterparts.
///
/// # Example
///
/// ```
/// use samu_contest::test_utils::{MockDatabaseClient, mocks::MockConfig};
///
/// // Create a mock that succeeds
/// let mock = MockDatabaseClient::new();
///
/// // Create a mock that fails
/// let failing_mock = MockDatabaseClient::with_config(MockConfig::failure("DB error"));
/// ```
pub struct MockDatabaseClient {
    store: Arc<Mutex<MockStore>>,
    config: MockConfig,
    call_count: AtomicU64,
    is_healthy: AtomicBool,
}

impl MockDatabaseClient {
    /// Creates a new mock with default (success) configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    /// Creates a new mock with the given configuration.
    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            store: Arc::new(Mutex::new(MockStore::default())),
            config,
            call_count: AtomicU64::new(0),
            is_healthy: AtomicBool::new(true),
        }
    }

    /// Creates a mock that always fails.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    /// Gets the number of times any method was called.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Sets the health status.
    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }

    /// Gets all stored votes.
    pub fn all_votes(&self) -> Vec<Vote> {
        self.store.lock().unwrap().votes.clone()
    }

    /// Gets all stored escrows.
    pub fn all_escrows(&self) -> Vec<Escrow> {
        self.store.lock().unwrap().escrows.values().cloned().collect()
    }

    /// Overrides the stored vote total of a meme.
    pub fn set_meme_votes(&self, meme_id: EntityId, votes: i64) {
        if let Some(meme) = self.store.lock().unwrap().memes.get_mut(&meme_id) {
            meme.votes = votes;
        }
    }

    /// Clears all stored data.
    pub fn clear(&self) {
        *self.store.lock().unwrap() = MockStore::default();
    }

    async fn begin(&self) -> Result<(), AppError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.config.simulate_latency().await;
        self.check_should_fail()
    }

    fn check_should_fail(&self) -> Result<(), AppError> {
        if self.config.should_fail {
            let msg = self
                .config
                .error_message
                .clone()
                .unwrap_or_else(|| "Mock database error".to_string());
            return Err(AppError::Database(DatabaseError::Query(msg)));
        }
        Ok(())
    }
}

impl Default for MockDatabaseClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContestRepository for MockDatabaseClient {
    async fn create_contest(&self, data: &CreateContestRequest) -> Result<Contest, AppError> {
        self.begin().await?;
        let mut store = self.store.lock().unwrap();
        let contest = Contest {
            id: store.next_id(),
            title: data.title.clone(),
            description: data.description.clone(),
            status: ContestStatus::Draft,
            start_time: data.start_time,
            end_time: data.end_time,
            winner_meme_id: None,
            created_at: Utc::now(),
            ended_at: None,
        };
        store.contests.insert(contest.id, contest.clone());
        Ok(contest)
    }

    async fn get_contest(&self, id: EntityId) -> Result<Option<Contest>, AppError> {
        self.begin().await?;
        Ok(self.store.lock().unwrap().contests.get(&id).cloned())
    }

    async fn list_contests(&self) -> Result<Vec<Contest>, AppError> {
        self.begin().await?;
        let mut contests: Vec<Contest> =
            self.store.lock().unwrap().contests.values().cloned().collect();
        newest_first(&mut contests, |c| (c.created_at, c.id));
        Ok(contests)
    }

    async fn list_contests_by_status(
        &self,
        status: ContestStatus,
    ) -> Result<Vec<Contest>, AppError> {
        self.begin().await?;
        Ok(self
            .store
            .lock()
            .unwrap()
            .contests
            .values()
            .filter(|c| c.status == status)
            .cloned()
            .collect())
    }

    async fn get_active_contest(&self) -> Result<Option<Contest>, AppError> {
        self.begin().await?;
        Ok(self
            .store
            .lock()
            .unwrap()
            .contests
            .values()
            .find(|c| c.status == ContestStatus::Active)
            .cloned())
    }

    async fn start_contest(&self, id: EntityId) -> Result<Contest, AppError> {
        self.begin().await?;
        let mut store = self.store.lock().unwrap();
        if store
            .contests
            .values()
            .any(|c| c.status == ContestStatus::Active)
        {
            return Err(AppError::Conflict("another contest is already active".to_string()));
        }
        let contest = store
            .contests
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("contest {id}")))?;
        if contest.status != ContestStatus::Draft {
            return Err(AppError::Conflict(format!("contest {id} is not a draft")));
        }
        contest.status = ContestStatus::Active;
        Ok(contest.clone())
    }

    async fn end_contest(
        &self,
        id: EntityId,
        winner_meme_id: Option<EntityId>,
        ended_at: DateTime<Utc>,
    ) -> Result<Contest, AppError> {
        self.begin().await?;
        let mut store = self.store.lock().unwrap();
        let contest = store
            .contests
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("contest {id}")))?;
        if contest.status != ContestStatus::Active {
            return Err(AppError::Conflict(format!("contest {id} is not active")));
        }
        contest.status = ContestStatus::Ended;
        contest.winner_meme_id = winner_meme_id;
        contest.ended_at = Some(ended_at);
        Ok(contest.clone())
    }
}

#[async_trait]
impl MemeRepository for MockDatabaseClient {
    async fn create_meme(&self, data: &NewMeme) -> Result<Meme, AppError> {
        self.begin().await?;
        let mut store = self.store.lock().unwrap();
        let meme = Meme {
            id: store.next_id(),
            contest_id: Some(data.contest_id),
            title: data.title.clone(),
            description: data.description.clone(),
            image_url: data.image_url.clone(),
            author_wallet: data.author_wallet.clone(),
            author_username: data.author_username.clone(),
            votes: 0,
            created_at: Utc::now(),
        };
        store.memes.insert(meme.id, meme.clone());
        Ok(meme)
    }

    async fn get_meme(&self, id: EntityId) -> Result<Option<Meme>, AppError> {
        self.begin().await?;
        Ok(self.store.lock().unwrap().memes.get(&id).cloned())
    }

    async fn list_memes(
        &self,
        contest_id: EntityId,
        sort: MemeSort,
        page: u32,
        limit: u32,
    ) -> Result<PaginatedResponse<Meme>, AppError> {
        self.begin().await?;
        let mut memes: Vec<Meme> = self
            .store
            .lock()
            .unwrap()
            .memes
            .values()
            .filter(|m| m.contest_id == Some(contest_id))
            .cloned()
            .collect();
        match sort {
            MemeSort::Votes => memes.sort_by(|a, b| {
                b.votes
                    .cmp(&a.votes)
                    .then(b.created_at.cmp(&a.created_at))
                    .then(b.id.cmp(&a.id))
            }),
            MemeSort::Latest => newest_first(&mut memes, |m| (m.created_at, m.id)),
        }
        Ok(PaginatedResponse::from_sorted(memes, page, limit))
    }

    async fn memes_by_contest(&self, contest_id: EntityId) -> Result<Vec<Meme>, AppError> {
        self.begin().await?;
        let mut memes: Vec<Meme> = self
            .store
            .lock()
            .unwrap()
            .memes
            .values()
            .filter(|m| m.contest_id == Some(contest_id))
            .cloned()
            .collect();
        memes.sort_by(|a, b| b.votes.cmp(&a.votes).then(a.created_at.cmp(&b.created_at)));
        Ok(memes)
    }

    async fn list_all_memes(&self) -> Result<Vec<Meme>, AppError> {
        self.begin().await?;
        let mut memes: Vec<Meme> = self.store.lock().unwrap().memes.values().cloned().collect();
        newest_first(&mut memes, |m| (m.created_at, m.id));
        Ok(memes)
    }

    async fn memes_by_author(&self, wallet: &str) -> Result<Vec<Meme>, AppError> {
        self.begin().await?;
        let mut memes: Vec<Meme> = self
            .store
            .lock()
            .unwrap()
            .memes
            .values()
            .filter(|m| m.author_wallet == wallet)
            .cloned()
            .collect();
        newest_first(&mut memes, |m| (m.created_at, m.id));
        Ok(memes)
    }

    async fn delete_meme(&self, id: EntityId) -> Result<bool, AppError> {
        self.begin().await?;
        let mut store = self.store.lock().unwrap();
        store.votes.retain(|v| v.meme_id != id);
        Ok(store.memes.remove(&id).is_some())
    }
}

#[async_trait]
impl VoteRepository for MockDatabaseClient {
    async fn record_vote(&self, data: &NewVote) -> Result<(Vote, Meme), AppError> {
        self.begin().await?;
        let mut store = self.store.lock().unwrap();
        if store.votes.iter().any(|v| v.tx_signature == data.tx_signature) {
            return Err(AppError::Database(DatabaseError::Duplicate(
                "transaction signature already used".to_string(),
            )));
        }
        match store.contests.get(&data.contest_id) {
            Some(contest) if contest.status == ContestStatus::Active => {}
            Some(_) => {
                return Err(AppError::Conflict(format!(
                    "contest {} is not active",
                    data.contest_id
                )));
            }
            None => return Err(AppError::not_found(format!("contest {}", data.contest_id))),
        }
        if !store.memes.contains_key(&data.meme_id) {
            return Err(AppError::not_found(format!("meme {}", data.meme_id)));
        }
        let vote = Vote {
            id: store.next_id(),
            meme_id: data.meme_id,
            contest_id: data.contest_id,
            voter_wallet: data.voter_wallet.clone(),
            samu_amount: data.samu_amount,
            tx_signature: data.tx_signature.clone(),
            created_at: Utc::now(),
        };
        store.votes.push(vote.clone());
        let meme = store
            .memes
            .get_mut(&data.meme_id)
            .ok_or_else(|| AppError::not_found(format!("meme {}", data.meme_id)))?;
        meme.votes += data.samu_amount;
        Ok((vote, meme.clone()))
    }

    async fn has_voted(&self, meme_id: EntityId, wallet: &str) -> Result<bool, AppError> {
        self.begin().await?;
        Ok(self
            .store
            .lock()
            .unwrap()
            .votes
            .iter()
            .any(|v| v.meme_id == meme_id && v.voter_wallet == wallet))
    }

    async fn votes_by_wallet(&self, wallet: &str) -> Result<Vec<Vote>, AppError> {
        self.begin().await?;
        let mut votes: Vec<Vote> = self
            .store
            .lock()
            .unwrap()
            .votes
            .iter()
            .filter(|v| v.voter_wallet == wallet)
            .cloned()
            .collect();
        newest_first(&mut votes, |v| (v.created_at, v.id));
        Ok(votes)
    }

    async fn voter_totals(&self, contest_id: EntityId) -> Result<Vec<VoterTotal>, AppError> {
        self.begin().await?;
        let store = self.store.lock().unwrap();
        let mut totals: BTreeMap<String, i64> = BTreeMap::new();
        for vote in store.votes.iter().filter(|v| v.contest_id == contest_id) {
            *totals.entry(vote.voter_wallet.clone()).or_default() += vote.samu_amount;
        }
        let mut totals: Vec<VoterTotal> = totals
            .into_iter()
            .map(|(voter_wallet, total_samu_amount)| VoterTotal {
                voter_wallet,
                total_samu_amount,
            })
            .collect();
        totals.sort_by(|a, b| b.total_samu_amount.cmp(&a.total_samu_amount));
        Ok(totals)
    }
}

#[async_trait]
impl UserRepository for MockDatabaseClient {
    async fn get_user(&self, wallet: &str) -> Result<Option<User>, AppError> {
        self.begin().await?;
        Ok(self.store.lock().unwrap().users.get(wallet).cloned())
    }

    async fn create_user(&self, wallet: &str, username: &str) -> Result<User, AppError> {
        self.begin().await?;
        let mut store = self.store.lock().unwrap();
        let now = Utc::now();
        let user = store
            .users
            .entry(wallet.to_string())
            .or_insert_with(|| User {
                wallet_address: wallet.to_string(),
                username: username.to_string(),
                display_name: None,
                avatar_url: None,
                created_at: now,
                updated_at: now,
            });
        Ok(user.clone())
    }

    async fn update_user(
        &self,
        wallet: &str,
        data: &UpdateProfileRequest,
    ) -> Result<User, AppError> {
        self.begin().await?;
        let mut store = self.store.lock().unwrap();
        let user = store
            .users
            .get_mut(wallet)
            .ok_or_else(|| AppError::not_found(format!("user {wallet}")))?;
        if let Some(name) = &data.display_name {
            user.display_name = Some(name.clone());
        }
        if let Some(avatar) = &data.avatar_url {
            user.avatar_url = Some(avatar.clone());
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }
}

#[async_trait]
impl CommerceRepository for MockDatabaseClient {
    async fn create_goods(&self, data: &NewGoods) -> Result<Goods, AppError> {
        self.begin().await?;
        let mut store = self.store.lock().unwrap();
        let goods = Goods {
            id: store.next_id(),
            contest_id: data.contest_id,
            meme_id: data.meme_id,
            title: data.title.clone(),
            description: data.description.clone(),
            image_url: data.image_url.clone(),
            mockup_urls: data.mockup_urls.clone(),
            category: data.category.clone(),
            product_type: data.product_type.clone(),
            base_price_cents: data.base_price_cents,
            retail_price_cents: data.retail_price_cents,
            sizes: data.sizes.clone(),
            colors: data.colors.clone(),
            status: GoodsStatus::Active,
            fulfillment_product_id: data.fulfillment_product_id,
            fulfillment_variant_id: data.fulfillment_variant_id,
            created_at: Utc::now(),
        };
        store.goods.insert(goods.id, goods.clone());
        Ok(goods)
    }

    async fn get_goods(&self, id: EntityId) -> Result<Option<Goods>, AppError> {
        self.begin().await?;
        Ok(self.store.lock().unwrap().goods.get(&id).cloned())
    }

    async fn list_goods(&self) -> Result<Vec<Goods>, AppError> {
        self.begin().await?;
        let mut goods: Vec<Goods> = self
            .store
            .lock()
            .unwrap()
            .goods
            .values()
            .filter(|g| g.status == GoodsStatus::Active)
            .cloned()
            .collect();
        newest_first(&mut goods, |g| (g.created_at, g.id));
        Ok(goods)
    }

    async fn create_order(
        &self,
        data: &NewOrder,
        escrow_lamports: Option<i64>,
    ) -> Result<(Order, Option<Escrow>), AppError> {
        self.begin().await?;
        let mut store = self.store.lock().unwrap();
        if let Some(sig) = &data.payment_signature {
            if store
                .orders
                .values()
                .any(|o| o.payment_signature.as_deref() == Some(sig.as_str()))
            {
                return Err(AppError::Database(DatabaseError::Duplicate(
                    "payment signature already used".to_string(),
                )));
            }
        }
        let now = Utc::now();
        let order = Order {
            id: store.next_id(),
            goods_id: data.goods_id,
            buyer_wallet: data.buyer_wallet.clone(),
            buyer_email: data.buyer_email.clone(),
            size: data.size.clone(),
            color: data.color.clone(),
            quantity: data.quantity,
            total_price_cents: data.total_price_cents,
            sol_amount_lamports: data.sol_amount_lamports,
            payment_signature: data.payment_signature.clone(),
            shipping: data.shipping.clone(),
            status: data.status,
            fulfillment_order_id: data.fulfillment_order_id,
            fulfillment_status: data.fulfillment_status.clone(),
            tracking_number: None,
            tracking_url: None,
            created_at: now,
            updated_at: now,
        };
        store.orders.insert(order.id, order.clone());
        let escrow = match escrow_lamports {
            Some(amount) => {
                let escrow = Escrow {
                    id: store.next_id(),
                    order_id: order.id,
                    amount_lamports: amount,
                    status: EscrowStatus::Held,
                    created_at: now,
                    settled_at: None,
                };
                store.escrows.insert(order.id, escrow.clone());
                Some(escrow)
            }
            None => None,
        };
        Ok((order, escrow))
    }

    async fn get_order(&self, id: EntityId) -> Result<Option<Order>, AppError> {
        self.begin().await?;
        Ok(self.store.lock().unwrap().orders.get(&id).cloned())
    }

    async fn find_order_by_fulfillment_id(
        &self,
        fulfillment_order_id: i64,
    ) -> Result<Option<Order>, AppError> {
        self.begin().await?;
        Ok(self
            .store
            .lock()
            .unwrap()
            .orders
            .values()
            .find(|o| o.fulfillment_order_id == Some(fulfillment_order_id))
            .cloned())
    }

    async fn orders_by_wallet(&self, wallet: &str) -> Result<Vec<Order>, AppError> {
        self.begin().await?;
        let mut orders: Vec<Order> = self
            .store
            .lock()
            .unwrap()
            .orders
            .values()
            .filter(|o| o.buyer_wallet == wallet)
            .cloned()
            .collect();
        newest_first(&mut orders, |o| (o.created_at, o.id));
        Ok(orders)
    }

    async fn list_orders(&self) -> Result<Vec<Order>, AppError> {
        self.begin().await?;
        let mut orders: Vec<Order> = self.store.lock().unwrap().orders.values().cloned().collect();
        newest_first(&mut orders, |o| (o.created_at, o.id));
        Ok(orders)
    }

    async fn update_order(&self, id: EntityId, update: &OrderUpdate) -> Result<Order, AppError> {
        self.begin().await?;
        let mut store = self.store.lock().unwrap();
        let order = store
            .orders
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("order {id}")))?;
        if let Some(status) = update.status {
            order.status = status;
        }
        if let Some(status) = &update.fulfillment_status {
            order.fulfillment_status = Some(status.clone());
        }
        if let Some(number) = &update.tracking_number {
            order.tracking_number = Some(number.clone());
        }
        if let Some(url) = &update.tracking_url {
            order.tracking_url = Some(url.clone());
        }
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn get_escrow_by_order(&self, order_id: EntityId) -> Result<Option<Escrow>, AppError> {
        self.begin().await?;
        Ok(self.store.lock().unwrap().escrows.get(&order_id).cloned())
    }

    async fn release_escrow(
        &self,
        order_id: EntityId,
        distribution: &NewGoodsDistribution,
        pool_credit: Option<PoolCredit>,
    ) -> Result<Option<GoodsRevenueDistribution>, AppError> {
        self.begin().await?;
        let mut store = self.store.lock().unwrap();
        let now = Utc::now();
        if let Some(credit) = &pool_credit {
            let ended = store
                .contests
                .get(&credit.contest_id)
                .is_some_and(|c| c.status == ContestStatus::Ended);
            if !ended {
                return Err(AppError::Conflict(format!(
                    "contest {} has not ended; its reward pool is closed",
                    credit.contest_id
                )));
            }
        }
        match store.escrows.get_mut(&order_id) {
            Some(escrow) if escrow.status == EscrowStatus::Held => {
                escrow.status = EscrowStatus::Released;
                escrow.settled_at = Some(now);
            }
            _ => return Ok(None),
        }
        let record = GoodsRevenueDistribution {
            id: store.next_id(),
            order_id: distribution.order_id,
            goods_id: distribution.goods_id,
            contest_id: distribution.contest_id,
            creator_wallet: distribution.creator_wallet.clone(),
            total_lamports: distribution.total_lamports,
            creator_amount: distribution.creator_amount,
            voter_pool_amount: distribution.voter_pool_amount,
            platform_amount: distribution.platform_amount,
            created_at: now,
        };
        store.distributions.push(record.clone());
        if let Some(credit) = pool_credit {
            let pool = store
                .pools
                .entry(credit.contest_id)
                .or_insert_with(|| VoterRewardPool {
                    contest_id: credit.contest_id,
                    total_credited_lamports: 0,
                    total_weight: credit.total_weight,
                    updated_at: now,
                });
            pool.total_credited_lamports += credit.amount_lamports;
            pool.updated_at = now;
        }
        Ok(Some(record))
    }

    async fn refund_escrow(&self, order_id: EntityId) -> Result<bool, AppError> {
        self.begin().await?;
        let mut store = self.store.lock().unwrap();
        match store.escrows.get_mut(&order_id) {
            Some(escrow) if escrow.status == EscrowStatus::Held => {
                escrow.status = EscrowStatus::Refunded;
                escrow.settled_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_distributions(&self) -> Result<Vec<GoodsRevenueDistribution>, AppError> {
        self.begin().await?;
        let mut distributions = self.store.lock().unwrap().distributions.clone();
        newest_first(&mut distributions, |d| (d.created_at, d.id));
        Ok(distributions)
    }
}

#[async_trait]
impl RevenueRepository for MockDatabaseClient {
    async fn create_revenue(&self, data: &CreateRevenueRequest) -> Result<Revenue, AppError> {
        self.begin().await?;
        let mut store = self.store.lock().unwrap();
        let revenue = Revenue {
            id: store.next_id(),
            contest_id: data.contest_id,
            source: data.source.clone(),
            description: data.description.clone(),
            total_lamports: data.total_lamports,
            status: RevenueStatus::Pending,
            memo_signature: None,
            created_at: Utc::now(),
            distributed_at: None,
        };
        store.revenues.insert(revenue.id, revenue.clone());
        Ok(revenue)
    }

    async fn get_revenue(&self, id: EntityId) -> Result<Option<Revenue>, AppError> {
        self.begin().await?;
        Ok(self.store.lock().unwrap().revenues.get(&id).cloned())
    }

    async fn revenues_by_contest(&self, contest_id: EntityId) -> Result<Vec<Revenue>, AppError> {
        self.begin().await?;
        let mut revenues: Vec<Revenue> = self
            .store
            .lock()
            .unwrap()
            .revenues
            .values()
            .filter(|r| r.contest_id == contest_id)
            .cloned()
            .collect();
        newest_first(&mut revenues, |r| (r.created_at, r.id));
        Ok(revenues)
    }

    async fn record_distribution(
        &self,
        revenue_id: EntityId,
        shares: &[NewRevenueShare],
    ) -> Result<DistributionResult, AppError> {
        self.begin().await?;
        let mut store = self.store.lock().unwrap();
        let now = Utc::now();
        let revenue = store
            .revenues
            .get_mut(&revenue_id)
            .ok_or_else(|| AppError::not_found(format!("revenue {revenue_id}")))?;
        if revenue.status == RevenueStatus::Distributed {
            return Err(AppError::Conflict(format!(
                "revenue {revenue_id} already distributed"
            )));
        }
        revenue.status = RevenueStatus::Distributed;
        revenue.distributed_at = Some(now);
        let revenue = revenue.clone();

        let mut recorded = Vec::with_capacity(shares.len());
        for share in shares {
            let row = RevenueShare {
                id: store.next_id(),
                revenue_id,
                contest_id: revenue.contest_id,
                wallet_address: share.wallet_address.clone(),
                role: share.role,
                share_bps: share.share_bps,
                amount_lamports: share.amount_lamports,
                status: "pending".to_string(),
                created_at: now,
            };
            store.shares.push(row.clone());
            recorded.push(row);
        }
        Ok(DistributionResult {
            revenue,
            shares: recorded,
        })
    }

    async fn set_memo_signature(
        &self,
        revenue_id: EntityId,
        signature: &str,
    ) -> Result<(), AppError> {
        self.begin().await?;
        let mut store = self.store.lock().unwrap();
        let revenue = store
            .revenues
            .get_mut(&revenue_id)
            .ok_or_else(|| AppError::not_found(format!("revenue {revenue_id}")))?;
        revenue.memo_signature = Some(signature.to_string());
        Ok(())
    }

    async fn shares_by_contest(&self, contest_id: EntityId) -> Result<Vec<RevenueShare>, AppError> {
        self.begin().await?;
        Ok(self
            .store
            .lock()
            .unwrap()
            .shares
            .iter()
            .filter(|s| s.contest_id == contest_id)
            .cloned()
            .collect())
    }

    async fn shares_by_wallet(&self, wallet: &str) -> Result<Vec<RevenueShare>, AppError> {
        self.begin().await?;
        Ok(self
            .store
            .lock()
            .unwrap()
            .shares
            .iter()
            .filter(|s| s.wallet_address == wallet)
            .cloned()
            .collect())
    }

    async fn get_pool(&self, contest_id: EntityId) -> Result<Option<VoterRewardPool>, AppError> {
        self.begin().await?;
        Ok(self.store.lock().unwrap().pools.get(&contest_id).cloned())
    }

    async fn get_claim(
        &self,
        contest_id: EntityId,
        wallet: &str,
    ) -> Result<Option<VoterClaim>, AppError> {
        self.begin().await?;
        Ok(self
            .store
            .lock()
            .unwrap()
            .claims
            .get(&(contest_id, wallet.to_string()))
            .cloned())
    }

    async fn claims_by_wallet(&self, wallet: &str) -> Result<Vec<VoterClaim>, AppError> {
        self.begin().await?;
        let mut claims: Vec<VoterClaim> = self
            .store
            .lock()
            .unwrap()
            .claims
            .values()
            .filter(|c| c.wallet_address == wallet)
            .cloned()
            .collect();
        claims.sort_by_key(|c| c.contest_id);
        Ok(claims)
    }

    async fn record_claim(
        &self,
        contest_id: EntityId,
        wallet: &str,
        weight: i64,
        previous_claimed: i64,
        new_claimed: i64,
    ) -> Result<bool, AppError> {
        self.begin().await?;
        let mut store = self.store.lock().unwrap();
        let key = (contest_id, wallet.to_string());
        let now = Utc::now();
        match store.claims.get_mut(&key) {
            Some(claim) if claim.claimed_lamports == previous_claimed => {
                claim.claimed_lamports = new_claimed;
                claim.weight = weight;
                claim.last_claimed_at = now;
                Ok(true)
            }
            Some(_) => Ok(false),
            None if previous_claimed == 0 => {
                store.claims.insert(
                    key,
                    VoterClaim {
                        contest_id,
                        wallet_address: wallet.to_string(),
                        weight,
                        claimed_lamports: new_claimed,
                        last_claimed_at: now,
                    },
                );
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn health_check(&self) -> Result<(), AppError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);

        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(AppError::Database(DatabaseError::Connection(
                "Mock database unhealthy".to_string(),
            )));
        }

        self.check_should_fail()
    }
}

/// Mock blockchain client for testing.
///
/// Simulates blockchain operations without actual network calls.
///
/// # Example
///
/// ```
/// use samu_contest::test_utils::{MockBlockchainClient, mocks::MockConfig};
///
/// // Create a mock that succeeds
/// let mock = MockBlockchainClient::new();
///
/// // Create a mock that fails
/// let failing_mock = MockBlockchainClient::with_config(MockConfig::failure("RPC error"));
/// ```
pub struct MockBlockchainClient {
    memos: Arc<Mutex<Vec<String>>>,
    checks: Arc<Mutex<Vec<TransferCheck>>>,
    balances: Arc<Mutex<HashMap<String, u64>>>,
    config: MockConfig,
    call_count: AtomicU64,
    is_healthy: AtomicBool,
    transfers_valid: AtomicBool,
}

impl MockBlockchainClient {
    /// Creates a new mock with default (success) configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    /// Creates a new mock with the given configuration.
    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            memos: Arc::new(Mutex::new(Vec::new())),
            checks: Arc::new(Mutex::new(Vec::new())),
            balances: Arc::new(Mutex::new(HashMap::new())),
            config,
            call_count: AtomicU64::new(0),
            is_healthy: AtomicBool::new(true),
            transfers_valid: AtomicBool::new(true),
        }
    }

    /// Creates a mock that always fails.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    /// Gets the number of times any method was called.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Sets the health status.
    pub fn set_healthy(&self, healthy: bool) {
        self.is_healthy.store(healthy, Ordering::Relaxed);
    }

    /// Makes every transfer verification succeed or fail.
    pub fn set_transfers_valid(&self, valid: bool) {
        self.transfers_valid.store(valid, Ordering::Relaxed);
    }

    /// Sets the raw token balance reported for a wallet.
    pub fn set_balance(&self, owner: &str, raw_amount: u64) {
        self.balances
            .lock()
            .unwrap()
            .insert(owner.to_string(), raw_amount);
    }

    /// Gets all submitted memos.
    pub fn get_memos(&self) -> Vec<String> {
        self.memos.lock().unwrap().clone()
    }

    /// Gets all transfer checks that were requested.
    pub fn get_checks(&self) -> Vec<TransferCheck> {
        self.checks.lock().unwrap().clone()
    }

    async fn begin(&self) -> Result<(), AppError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.config.simulate_latency().await;
        self.check_should_fail()
    }

    fn check_should_fail(&self) -> Result<(), AppError> {
        if self.config.should_fail {
            let msg = self
                .config
                .error_message
                .clone()
                .unwrap_or_else(|| "Mock blockchain error".to_string());
            return Err(AppError::Blockchain(BlockchainError::RpcError(msg)));
        }
        Ok(())
    }
}

impl Default for MockBlockchainClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlockchainClient for MockBlockchainClient {
    async fn health_check(&self) -> Result<(), AppError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);

        if !self.is_healthy.load(Ordering::Relaxed) {
            return Err(AppError::Blockchain(BlockchainError::Connection(
                "Mock blockchain unhealthy".to_string(),
            )));
        }

        self.check_should_fail()
    }

    async fn get_token_balance(&self, owner: &str, _mint: &str) -> Result<u64, AppError> {
        self.begin().await?;
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(owner)
            .copied()
            .unwrap_or(0))
    }

    async fn verify_transfer(&self, check: &TransferCheck) -> Result<bool, AppError> {
        self.begin().await?;
        self.checks.lock().unwrap().push(check.clone());
        Ok(self.transfers_valid.load(Ordering::Relaxed))
    }

    async fn submit_memo(&self, memo: &str) -> Result<String, AppError> {
        self.begin().await?;
        let mut memos = self.memos.lock().unwrap();
        memos.push(memo.to_string());
        Ok(format!("sig_{}", memos.len()))
    }
}

/// Mock print-on-demand provider.
pub struct MockFulfillmentClient {
    orders: Arc<Mutex<Vec<FulfillmentOrderRequest>>>,
    next_id: AtomicI64,
    config: MockConfig,
}

impl MockFulfillmentClient {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            orders: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicI64::new(90_000),
            config,
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    /// Gets all orders sent to the provider.
    pub fn get_orders(&self) -> Vec<FulfillmentOrderRequest> {
        self.orders.lock().unwrap().clone()
    }

    fn check_should_fail(&self) -> Result<(), AppError> {
        if self.config.should_fail {
            let msg = self
                .config
                .error_message
                .clone()
                .unwrap_or_else(|| "Mock fulfillment error".to_string());
            return Err(AppError::ExternalService(ExternalServiceError::HttpError(msg)));
        }
        Ok(())
    }
}

impl Default for MockFulfillmentClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FulfillmentClient for MockFulfillmentClient {
    async fn create_order(
        &self,
        order: &FulfillmentOrderRequest,
    ) -> Result<FulfillmentOrderReceipt, AppError> {
        self.config.simulate_latency().await;
        self.check_should_fail()?;
        self.orders.lock().unwrap().push(order.clone());
        Ok(FulfillmentOrderReceipt {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            status: "draft".to_string(),
        })
    }

    async fn shipping_rates(
        &self,
        _variant_id: i64,
        address: &ShippingAddress,
        _quantity: u32,
    ) -> Result<Vec<ShippingRate>, AppError> {
        self.config.simulate_latency().await;
        self.check_should_fail()?;
        Ok(vec![ShippingRate {
            id: "STANDARD".to_string(),
            name: format!("Standard to {}", address.country_code),
            rate: "6.50".to_string(),
            currency: "USD".to_string(),
            min_delivery_days: Some(4),
            max_delivery_days: Some(8),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn contest_request() -> CreateContestRequest {
        let now = Utc::now();
        CreateContestRequest::new("Weekly", now, now + Duration::days(7))
    }

    #[tokio::test]
    async fn test_mock_contest_lifecycle() {
        let mock = MockDatabaseClient::new();
        let contest = mock.create_contest(&contest_request()).await.unwrap();
        assert_eq!(contest.status, ContestStatus::Draft);

        let started = mock.start_contest(contest.id).await.unwrap();
        assert_eq!(started.status, ContestStatus::Active);

        let other = mock.create_contest(&contest_request()).await.unwrap();
        assert!(matches!(
            mock.start_contest(other.id).await,
            Err(AppError::Conflict(_))
        ));

        let ended = mock.end_contest(contest.id, None, Utc::now()).await.unwrap();
        assert_eq!(ended.status, ContestStatus::Ended);
        assert!(mock.get_active_contest().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mock_vote_rejects_reused_signature() {
        let mock = MockDatabaseClient::new();
        let contest = mock.create_contest(&contest_request()).await.unwrap();
        mock.start_contest(contest.id).await.unwrap();
        let meme = mock
            .create_meme(&NewMeme {
                contest_id: contest.id,
                title: "t".to_string(),
                description: None,
                image_url: "https://cdn.example.com/m.png".to_string(),
                author_wallet: "author".to_string(),
                author_username: "author".to_string(),
            })
            .await
            .unwrap();
        let vote = NewVote {
            meme_id: meme.id,
            contest_id: contest.id,
            voter_wallet: "voter".to_string(),
            samu_amount: 10,
            tx_signature: "sig-1".to_string(),
        };

        let (_, updated) = mock.record_vote(&vote).await.unwrap();
        assert_eq!(updated.votes, 10);

        let again = mock.record_vote(&vote).await;
        assert!(matches!(
            again,
            Err(AppError::Database(DatabaseError::Duplicate(_)))
        ));

        mock.end_contest(contest.id, Some(meme.id), Utc::now())
            .await
            .unwrap();
        let late = mock
            .record_vote(&NewVote {
                tx_signature: "sig-2".to_string(),
                ..vote
            })
            .await;
        assert!(matches!(late, Err(AppError::Conflict(_))));
        assert_eq!(mock.all_votes().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_claim_optimistic_check() {
        let mock = MockDatabaseClient::new();
        assert!(mock.record_claim(1, "w", 10, 0, 50).await.unwrap());
        assert!(!mock.record_claim(1, "w", 10, 0, 50).await.unwrap());
        assert!(mock.record_claim(1, "w", 10, 50, 80).await.unwrap());
        let claim = mock.get_claim(1, "w").await.unwrap().unwrap();
        assert_eq!(claim.claimed_lamports, 80);
    }

    #[tokio::test]
    async fn test_mock_database_failure() {
        let mock = MockDatabaseClient::failing("Connection timeout");
        let result = mock.create_contest(&contest_request()).await;
        assert!(matches!(result, Err(AppError::Database(_))));
    }

    #[tokio::test]
    async fn test_mock_database_call_count() {
        let mock = MockDatabaseClient::new();
        assert_eq!(mock.call_count(), 0);

        let _ = mock.health_check().await;
        assert_eq!(mock.call_count(), 1);

        let _ = mock.get_contest(1).await;
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_blockchain_memo_and_balance() {
        let mock = MockBlockchainClient::new();
        mock.set_balance("w", 42);
        assert_eq!(mock.get_token_balance("w", "mint").await.unwrap(), 42);
        assert_eq!(mock.get_token_balance("x", "mint").await.unwrap(), 0);

        let sig = mock.submit_memo("digest").await.unwrap();
        assert_eq!(sig, "sig_1");
        assert_eq!(mock.get_memos(), vec!["digest".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_blockchain_failure() {
        let mock = MockBlockchainClient::failing("RPC timeout");
        assert!(mock.submit_memo("hash").await.is_err());
    }

    #[tokio::test]
    async fn test_mock_health_check() {
        let db_mock = MockDatabaseClient::new();
        let bc_mock = MockBlockchainClient::new();

        assert!(db_mock.health_check().await.is_ok());
        assert!(bc_mock.health_check().await.is_ok());

        db_mock.set_healthy(false);
        bc_mock.set_healthy(false);

        assert!(db_mock.health_check().await.is_err());
        assert!(bc_mock.health_check().await.is_err());
    }
}
