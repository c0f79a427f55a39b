//! PostgreSQL database client implementation.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    PgPool, Row,
    postgres::{PgPoolOptions, PgRow},
};
use tracing::{info, instrument};

use crate::domain::{
    AppError, CommerceRepository, Contest, ContestRepository, ContestStatus,
    CreateContestRequest, CreateRevenueRequest, DatabaseClient, DatabaseError,
    DistributionResult, EntityId, Escrow, Goods, GoodsRevenueDistribution, Meme,
    MemeRepository, MemeSort, NewGoods, NewGoodsDistribution, NewMeme, NewOrder,
    NewRevenueShare, NewVote, Order, OrderUpdate, PaginatedResponse, PoolCredit, Revenue,
    RevenueRepository, RevenueShare, ShippingDetails, UpdateProfileRequest, User,
    UserRepository, Vote, VoteRepository, VoterClaim, VoterRewardPool, VoterTotal,
};

const CONTEST_COLUMNS: &str = "id, title, description, status, start_time, end_time, \
     winner_meme_id, created_at, ended_at";

const MEME_COLUMNS: &str = "id, contest_id, title, description, image_url, author_wallet, \
     author_username, votes, created_at";

const VOTE_COLUMNS: &str =
    "id, meme_id, contest_id, voter_wallet, samu_amount, tx_signature, created_at";

const USER_COLUMNS: &str =
    "wallet_address, username, display_name, avatar_url, created_at, updated_at";

const GOODS_COLUMNS: &str = "id, contest_id, meme_id, title, description, image_url, \
     mockup_urls, category, product_type, base_price_cents, retail_price_cents, sizes, colors, \
     status, fulfillment_product_id, fulfillment_variant_id, created_at";

const ORDER_COLUMNS: &str = "id, goods_id, buyer_wallet, buyer_email, size, color, quantity, \
     total_price_cents, sol_amount_lamports, payment_signature, shipping_name, \
     shipping_address1, shipping_address2, shipping_city, shipping_state, shipping_country, \
     shipping_zip, shipping_phone, status, fulfillment_order_id, fulfillment_status, \
     tracking_number, tracking_url, created_at, updated_at";

const ESCROW_COLUMNS: &str = "id, order_id, amount_lamports, status, created_at, settled_at";

const DISTRIBUTION_COLUMNS: &str = "id, order_id, goods_id, contest_id, creator_wallet, \
     total_lamports, creator_amount, voter_pool_amount, platform_amount, created_at";

const REVENUE_COLUMNS: &str = "id, contest_id, source, description, total_lamports, status, \
     memo_signature, created_at, distributed_at";

const SHARE_COLUMNS: &str = "id, revenue_id, contest_id, wallet_address, role, share_bps, \
     amount_lamports, status, created_at";

const POOL_COLUMNS: &str = "contest_id, total_credited_lamports, total_weight, updated_at";

const CLAIM_COLUMNS: &str =
    "contest_id, wallet_address, weight, claimed_lamports, last_claimed_at";

/// PostgreSQL connection pool configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(3),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

/// PostgreSQL database client with connection pooling
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Create a new PostgreSQL client with custom configuration
    pub async fn new(database_url: &str, config: PostgresConfig) -> Result<Self, AppError> {
        info!("Connecting to PostgreSQL...");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect(database_url)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;
        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a new PostgreSQL client with default configuration
    pub async fn with_defaults(database_url: &str) -> Result<Self, AppError> {
        Self::new(database_url, PostgresConfig::default()).await
    }

    /// Run database migrations using sqlx migrate
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying connection pool (for testing)
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Decodes a status column stored as its lowercase text form.
fn parse_column<T>(row: &PgRow, column: &str) -> Result<T, AppError>
where
    T: FromStr<Err = String>,
{
    let text: String = row.try_get(column)?;
    text.parse()
        .map_err(|e: String| AppError::Database(DatabaseError::Query(e)))
}

fn row_to_contest(row: &PgRow) -> Result<Contest, AppError> {
    Ok(Contest {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        status: parse_column(row, "status")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        winner_meme_id: row.try_get("winner_meme_id")?,
        created_at: row.try_get("created_at")?,
        ended_at: row.try_get("ended_at")?,
    })
}

fn row_to_meme(row: &PgRow) -> Result<Meme, AppError> {
    Ok(Meme {
        id: row.try_get("id")?,
        contest_id: row.try_get("contest_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        image_url: row.try_get("image_url")?,
        author_wallet: row.try_get("author_wallet")?,
        author_username: row.try_get("author_username")?,
        votes: row.try_get("votes")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_vote(row: &PgRow) -> Result<Vote, AppError> {
    Ok(Vote {
        id: row.try_get("id")?,
        meme_id: row.try_get("meme_id")?,
        contest_id: row.try_get("contest_id")?,
        voter_wallet: row.try_get("voter_wallet")?,
        samu_amount: row.try_get("samu_amount")?,
        tx_signature: row.try_get("tx_signature")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_user(row: &PgRow) -> Result<User, AppError> {
    Ok(User {
        wallet_address: row.try_get("wallet_address")?,
        username: row.try_get("username")?,
        display_name: row.try_get("display_name")?,
        avatar_url: row.try_get("avatar_url")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_goods(row: &PgRow) -> Result<Goods, AppError> {
    Ok(Goods {
        id: row.try_get("id")?,
        contest_id: row.try_get("contest_id")?,
        meme_id: row.try_get("meme_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        image_url: row.try_get("image_url")?,
        mockup_urls: row.try_get("mockup_urls")?,
        category: row.try_get("category")?,
        product_type: row.try_get("product_type")?,
        base_price_cents: row.try_get("base_price_cents")?,
        retail_price_cents: row.try_get("retail_price_cents")?,
        sizes: row.try_get("sizes")?,
        colors: row.try_get("colors")?,
        status: parse_column(row, "status")?,
        fulfillment_product_id: row.try_get("fulfillment_product_id")?,
        fulfillment_variant_id: row.try_get("fulfillment_variant_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_order(row: &PgRow) -> Result<Order, AppError> {
    Ok(Order {
        id: row.try_get("id")?,
        goods_id: row.try_get("goods_id")?,
        buyer_wallet: row.try_get("buyer_wallet")?,
        buyer_email: row.try_get("buyer_email")?,
        size: row.try_get("size")?,
        color: row.try_get("color")?,
        quantity: row.try_get("quantity")?,
        total_price_cents: row.try_get("total_price_cents")?,
        sol_amount_lamports: row.try_get("sol_amount_lamports")?,
        payment_signature: row.try_get("payment_signature")?,
        shipping: ShippingDetails {
            name: row.try_get("shipping_name")?,
            address1: row.try_get("shipping_address1")?,
            address2: row.try_get("shipping_address2")?,
            city: row.try_get("shipping_city")?,
            state: row.try_get("shipping_state")?,
            country: row.try_get("shipping_country")?,
            zip: row.try_get("shipping_zip")?,
            phone: row.try_get("shipping_phone")?,
        },
        status: parse_column(row, "status")?,
        fulfillment_order_id: row.try_get("fulfillment_order_id")?,
        fulfillment_status: row.try_get("fulfillment_status")?,
        tracking_number: row.try_get("tracking_number")?,
        tracking_url: row.try_get("tracking_url")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_escrow(row: &PgRow) -> Result<Escrow, AppError> {
    Ok(Escrow {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        amount_lamports: row.try_get("amount_lamports")?,
        status: parse_column(row, "status")?,
        created_at: row.try_get("created_at")?,
        settled_at: row.try_get("settled_at")?,
    })
}

fn row_to_distribution(row: &PgRow) -> Result<GoodsRevenueDistribution, AppError> {
    Ok(GoodsRevenueDistribution {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        goods_id: row.try_get("goods_id")?,
        contest_id: row.try_get("contest_id")?,
        creator_wallet: row.try_get("creator_wallet")?,
        total_lamports: row.try_get("total_lamports")?,
        creator_amount: row.try_get("creator_amount")?,
        voter_pool_amount: row.try_get("voter_pool_amount")?,
        platform_amount: row.try_get("platform_amount")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_revenue(row: &PgRow) -> Result<Revenue, AppError> {
    Ok(Revenue {
        id: row.try_get("id")?,
        contest_id: row.try_get("contest_id")?,
        source: row.try_get("source")?,
        description: row.try_get("description")?,
        total_lamports: row.try_get("total_lamports")?,
        status: parse_column(row, "status")?,
        memo_signature: row.try_get("memo_signature")?,
        created_at: row.try_get("created_at")?,
        distributed_at: row.try_get("distributed_at")?,
    })
}

fn row_to_share(row: &PgRow) -> Result<RevenueShare, AppError> {
    Ok(RevenueShare {
        id: row.try_get("id")?,
        revenue_id: row.try_get("revenue_id")?,
        contest_id: row.try_get("contest_id")?,
        wallet_address: row.try_get("wallet_address")?,
        role: parse_column(row, "role")?,
        share_bps: row.try_get("share_bps")?,
        amount_lamports: row.try_get("amount_lamports")?,
        status: row.try_get("status")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_pool(row: &PgRow) -> Result<VoterRewardPool, AppError> {
    Ok(VoterRewardPool {
        contest_id: row.try_get("contest_id")?,
        total_credited_lamports: row.try_get("total_credited_lamports")?,
        total_weight: row.try_get("total_weight")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_claim(row: &PgRow) -> Result<VoterClaim, AppError> {
    Ok(VoterClaim {
        contest_id: row.try_get("contest_id")?,
        wallet_address: row.try_get("wallet_address")?,
        weight: row.try_get("weight")?,
        claimed_lamports: row.try_get("claimed_lamports")?,
        last_claimed_at: row.try_get("last_claimed_at")?,
    })
}

fn collect<T>(rows: &[PgRow], f: fn(&PgRow) -> Result<T, AppError>) -> Result<Vec<T>, AppError> {
    rows.iter().map(f).collect()
}

#[async_trait]
impl ContestRepository for PostgresClient {
    #[instrument(skip(self, data), fields(title = %data.title))]
    async fn create_contest(&self, data: &CreateContestRequest) -> Result<Contest, AppError> {
        let sql = format!(
            "INSERT INTO contests (title, description, status, start_time, end_time) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {CONTEST_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&data.title)
            .bind(&data.description)
            .bind(ContestStatus::Draft.as_str())
            .bind(data.start_time)
            .bind(data.end_time)
            .fetch_one(&self.pool)
            .await?;
        row_to_contest(&row)
    }

    #[instrument(skip(self))]
    async fn get_contest(&self, id: EntityId) -> Result<Option<Contest>, AppError> {
        let sql = format!("SELECT {CONTEST_COLUMNS} FROM contests WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_contest).transpose()
    }

    #[instrument(skip(self))]
    async fn list_contests(&self) -> Result<Vec<Contest>, AppError> {
        let sql =
            format!("SELECT {CONTEST_COLUMNS} FROM contests ORDER BY created_at DESC, id DESC");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        collect(&rows, row_to_contest)
    }

    #[instrument(skip(self))]
    async fn list_contests_by_status(
        &self,
        status: ContestStatus,
    ) -> Result<Vec<Contest>, AppError> {
        let sql = format!(
            "SELECT {CONTEST_COLUMNS} FROM contests WHERE status = $1 ORDER BY start_time ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;
        collect(&rows, row_to_contest)
    }

    #[instrument(skip(self))]
    async fn get_active_contest(&self) -> Result<Option<Contest>, AppError> {
        let sql = format!("SELECT {CONTEST_COLUMNS} FROM contests WHERE status = 'active' LIMIT 1");
        let row = sqlx::query(&sql).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_contest).transpose()
    }

    #[instrument(skip(self))]
    async fn start_contest(&self, id: EntityId) -> Result<Contest, AppError> {
        let sql = format!(
            "UPDATE contests SET status = 'active' WHERE id = $1 AND status = 'draft' \
             RETURNING {CONTEST_COLUMNS}"
        );
        // The partial unique index on active contests rejects a second one.
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| match DatabaseError::from(e) {
                DatabaseError::Duplicate(_) => {
                    AppError::Conflict("another contest is already active".to_string())
                }
                other => AppError::Database(other),
            })?;

        match row {
            Some(row) => row_to_contest(&row),
            None => match self.get_contest(id).await? {
                Some(_) => Err(AppError::Conflict(format!("contest {id} is not a draft"))),
                None => Err(AppError::not_found(format!("contest {id}"))),
            },
        }
    }

    #[instrument(skip(self))]
    async fn end_contest(
        &self,
        id: EntityId,
        winner_meme_id: Option<EntityId>,
        ended_at: DateTime<Utc>,
    ) -> Result<Contest, AppError> {
        let sql = format!(
            "UPDATE contests SET status = 'ended', winner_meme_id = $2, ended_at = $3 \
             WHERE id = $1 AND status = 'active' RETURNING {CONTEST_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(winner_meme_id)
            .bind(ended_at)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row_to_contest(&row),
            None => match self.get_contest(id).await? {
                Some(_) => Err(AppError::Conflict(format!("contest {id} is not active"))),
                None => Err(AppError::not_found(format!("contest {id}"))),
            },
        }
    }
}

#[async_trait]
impl MemeRepository for PostgresClient {
    #[instrument(skip(self, data), fields(contest_id = data.contest_id))]
    async fn create_meme(&self, data: &NewMeme) -> Result<Meme, AppError> {
        let sql = format!(
            "INSERT INTO memes (contest_id, title, description, image_url, author_wallet, \
             author_username) VALUES ($1, $2, $3, $4, $5, $6) RETURNING {MEME_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(data.contest_id)
            .bind(&data.title)
            .bind(&data.description)
            .bind(&data.image_url)
            .bind(&data.author_wallet)
            .bind(&data.author_username)
            .fetch_one(&self.pool)
            .await?;
        row_to_meme(&row)
    }

    #[instrument(skip(self))]
    async fn get_meme(&self, id: EntityId) -> Result<Option<Meme>, AppError> {
        let sql = format!("SELECT {MEME_COLUMNS} FROM memes WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_meme).transpose()
    }

    #[instrument(skip(self))]
    async fn list_memes(
        &self,
        contest_id: EntityId,
        sort: MemeSort,
        page: u32,
        limit: u32,
    ) -> Result<PaginatedResponse<Meme>, AppError> {
        let page = page.max(1);
        let limit = limit.max(1);
        let offset = i64::from(page - 1) * i64::from(limit);
        let order = match sort {
            MemeSort::Votes => "votes DESC, created_at DESC, id DESC",
            MemeSort::Latest => "created_at DESC, id DESC",
        };

        let total: i64 = sqlx::query("SELECT COUNT(*) AS total FROM memes WHERE contest_id = $1")
            .bind(contest_id)
            .fetch_one(&self.pool)
            .await?
            .try_get("total")?;

        let sql = format!(
            "SELECT {MEME_COLUMNS} FROM memes WHERE contest_id = $1 ORDER BY {order} \
             LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query(&sql)
            .bind(contest_id)
            .bind(i64::from(limit))
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let items = collect(&rows, row_to_meme)?;
        Ok(PaginatedResponse::from_page(
            items,
            u64::try_from(total).unwrap_or_default(),
            page,
            limit,
        ))
    }

    #[instrument(skip(self))]
    async fn memes_by_contest(&self, contest_id: EntityId) -> Result<Vec<Meme>, AppError> {
        let sql = format!(
            "SELECT {MEME_COLUMNS} FROM memes WHERE contest_id = $1 \
             ORDER BY votes DESC, created_at ASC, id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(contest_id)
            .fetch_all(&self.pool)
            .await?;
        collect(&rows, row_to_meme)
    }

    #[instrument(skip(self))]
    async fn list_all_memes(&self) -> Result<Vec<Meme>, AppError> {
        let sql = format!("SELECT {MEME_COLUMNS} FROM memes ORDER BY created_at DESC, id DESC");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        collect(&rows, row_to_meme)
    }

    #[instrument(skip(self))]
    async fn memes_by_author(&self, wallet: &str) -> Result<Vec<Meme>, AppError> {
        let sql = format!(
            "SELECT {MEME_COLUMNS} FROM memes WHERE author_wallet = $1 \
             ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(wallet)
            .fetch_all(&self.pool)
            .await?;
        collect(&rows, row_to_meme)
    }

    #[instrument(skip(self))]
    async fn delete_meme(&self, id: EntityId) -> Result<bool, AppError> {
        // Votes cascade with the meme.
        let result = sqlx::query("DELETE FROM memes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl VoteRepository for PostgresClient {
    #[instrument(skip(self, data), fields(meme_id = data.meme_id, amount = data.samu_amount))]
    async fn record_vote(&self, data: &NewVote) -> Result<(Vote, Meme), AppError> {
        let mut tx = self.pool.begin().await?;

        // Holds off a concurrent end_contest until the vote is committed.
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM contests WHERE id = $1 FOR SHARE")
                .bind(data.contest_id)
                .fetch_optional(&mut *tx)
                .await?;
        match status.as_deref() {
            Some("active") => {}
            Some(_) => {
                return Err(AppError::Conflict(format!(
                    "contest {} is not active",
                    data.contest_id
                )));
            }
            None => return Err(AppError::not_found(format!("contest {}", data.contest_id))),
        }

        let sql = format!(
            "UPDATE memes SET votes = votes + $2 WHERE id = $1 RETURNING {MEME_COLUMNS}"
        );
        let meme_row = sqlx::query(&sql)
            .bind(data.meme_id)
            .bind(data.samu_amount)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found(format!("meme {}", data.meme_id)))?;
        let meme = row_to_meme(&meme_row)?;

        let sql = format!(
            "INSERT INTO votes (meme_id, contest_id, voter_wallet, samu_amount, tx_signature) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {VOTE_COLUMNS}"
        );
        let vote_row = sqlx::query(&sql)
            .bind(data.meme_id)
            .bind(data.contest_id)
            .bind(&data.voter_wallet)
            .bind(data.samu_amount)
            .bind(&data.tx_signature)
            .fetch_one(&mut *tx)
            .await?;
        let vote = row_to_vote(&vote_row)?;

        tx.commit().await?;
        Ok((vote, meme))
    }

    #[instrument(skip(self))]
    async fn has_voted(&self, meme_id: EntityId, wallet: &str) -> Result<bool, AppError> {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM votes WHERE meme_id = $1 AND voter_wallet = $2) AS voted",
        )
        .bind(meme_id)
        .bind(wallet)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("voted")?)
    }

    #[instrument(skip(self))]
    async fn votes_by_wallet(&self, wallet: &str) -> Result<Vec<Vote>, AppError> {
        let sql = format!(
            "SELECT {VOTE_COLUMNS} FROM votes WHERE voter_wallet = $1 \
             ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(wallet)
            .fetch_all(&self.pool)
            .await?;
        collect(&rows, row_to_vote)
    }

    #[instrument(skip(self))]
    async fn voter_totals(&self, contest_id: EntityId) -> Result<Vec<VoterTotal>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT voter_wallet, SUM(samu_amount)::BIGINT AS total
            FROM votes
            WHERE contest_id = $1
            GROUP BY voter_wallet
            ORDER BY total DESC, voter_wallet ASC
            "#,
        )
        .bind(contest_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(VoterTotal {
                    voter_wallet: row.try_get("voter_wallet")?,
                    total_samu_amount: row.try_get("total")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl UserRepository for PostgresClient {
    #[instrument(skip(self))]
    async fn get_user(&self, wallet: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE wallet_address = $1");
        let row = sqlx::query(&sql)
            .bind(wallet)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_user).transpose()
    }

    #[instrument(skip(self))]
    async fn create_user(&self, wallet: &str, username: &str) -> Result<User, AppError> {
        sqlx::query(
            "INSERT INTO users (wallet_address, username) VALUES ($1, $2) \
             ON CONFLICT (wallet_address) DO NOTHING",
        )
        .bind(wallet)
        .bind(username)
        .execute(&self.pool)
        .await?;

        self.get_user(wallet)
            .await?
            .ok_or_else(|| AppError::not_found(format!("user {wallet}")))
    }

    #[instrument(skip(self, data))]
    async fn update_user(
        &self,
        wallet: &str,
        data: &UpdateProfileRequest,
    ) -> Result<User, AppError> {
        let sql = format!(
            "UPDATE users SET display_name = COALESCE($2, display_name), \
             avatar_url = COALESCE($3, avatar_url), updated_at = NOW() \
             WHERE wallet_address = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(wallet)
            .bind(&data.display_name)
            .bind(&data.avatar_url)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found(format!("user {wallet}")))?;
        row_to_user(&row)
    }
}

#[async_trait]
impl CommerceRepository for PostgresClient {
    #[instrument(skip(self, data), fields(title = %data.title))]
    async fn create_goods(&self, data: &NewGoods) -> Result<Goods, AppError> {
        let sql = format!(
            "INSERT INTO goods (contest_id, meme_id, title, description, image_url, mockup_urls, \
             category, product_type, base_price_cents, retail_price_cents, sizes, colors, \
             fulfillment_product_id, fulfillment_variant_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {GOODS_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(data.contest_id)
            .bind(data.meme_id)
            .bind(&data.title)
            .bind(&data.description)
            .bind(&data.image_url)
            .bind(&data.mockup_urls)
            .bind(&data.category)
            .bind(&data.product_type)
            .bind(data.base_price_cents)
            .bind(data.retail_price_cents)
            .bind(&data.sizes)
            .bind(&data.colors)
            .bind(data.fulfillment_product_id)
            .bind(data.fulfillment_variant_id)
            .fetch_one(&self.pool)
            .await?;
        row_to_goods(&row)
    }

    #[instrument(skip(self))]
    async fn get_goods(&self, id: EntityId) -> Result<Option<Goods>, AppError> {
        let sql = format!("SELECT {GOODS_COLUMNS} FROM goods WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_goods).transpose()
    }

    #[instrument(skip(self))]
    async fn list_goods(&self) -> Result<Vec<Goods>, AppError> {
        let sql = format!(
            "SELECT {GOODS_COLUMNS} FROM goods WHERE status = 'active' \
             ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        collect(&rows, row_to_goods)
    }

    #[instrument(skip(self, data), fields(goods_id = data.goods_id))]
    async fn create_order(
        &self,
        data: &NewOrder,
        escrow_lamports: Option<i64>,
    ) -> Result<(Order, Option<Escrow>), AppError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO orders (goods_id, buyer_wallet, buyer_email, size, color, quantity, \
             total_price_cents, sol_amount_lamports, payment_signature, shipping_name, \
             shipping_address1, shipping_address2, shipping_city, shipping_state, \
             shipping_country, shipping_zip, shipping_phone, status, fulfillment_order_id, \
             fulfillment_status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
             $17, $18, $19, $20) RETURNING {ORDER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(data.goods_id)
            .bind(&data.buyer_wallet)
            .bind(&data.buyer_email)
            .bind(&data.size)
            .bind(&data.color)
            .bind(data.quantity)
            .bind(data.total_price_cents)
            .bind(data.sol_amount_lamports)
            .bind(&data.payment_signature)
            .bind(&data.shipping.name)
            .bind(&data.shipping.address1)
            .bind(&data.shipping.address2)
            .bind(&data.shipping.city)
            .bind(&data.shipping.state)
            .bind(&data.shipping.country)
            .bind(&data.shipping.zip)
            .bind(&data.shipping.phone)
            .bind(data.status.as_str())
            .bind(data.fulfillment_order_id)
            .bind(&data.fulfillment_status)
            .fetch_one(&mut *tx)
            .await?;
        let order = row_to_order(&row)?;

        let escrow = match escrow_lamports {
            Some(amount) => {
                let sql = format!(
                    "INSERT INTO escrows (order_id, amount_lamports) VALUES ($1, $2) \
                     RETURNING {ESCROW_COLUMNS}"
                );
                let row = sqlx::query(&sql)
                    .bind(order.id)
                    .bind(amount)
                    .fetch_one(&mut *tx)
                    .await?;
                Some(row_to_escrow(&row)?)
            }
            None => None,
        };

        tx.commit().await?;
        Ok((order, escrow))
    }

    #[instrument(skip(self))]
    async fn get_order(&self, id: EntityId) -> Result<Option<Order>, AppError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_order).transpose()
    }

    #[instrument(skip(self))]
    async fn find_order_by_fulfillment_id(
        &self,
        fulfillment_order_id: i64,
    ) -> Result<Option<Order>, AppError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE fulfillment_order_id = $1 \
             ORDER BY id ASC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(fulfillment_order_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_order).transpose()
    }

    #[instrument(skip(self))]
    async fn orders_by_wallet(&self, wallet: &str) -> Result<Vec<Order>, AppError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE buyer_wallet = $1 \
             ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(wallet)
            .fetch_all(&self.pool)
            .await?;
        collect(&rows, row_to_order)
    }

    #[instrument(skip(self))]
    async fn list_orders(&self) -> Result<Vec<Order>, AppError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        collect(&rows, row_to_order)
    }

    #[instrument(skip(self, update))]
    async fn update_order(&self, id: EntityId, update: &OrderUpdate) -> Result<Order, AppError> {
        let sql = format!(
            "UPDATE orders SET status = COALESCE($2, status), \
             fulfillment_status = COALESCE($3, fulfillment_status), \
             tracking_number = COALESCE($4, tracking_number), \
             tracking_url = COALESCE($5, tracking_url), updated_at = NOW() \
             WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(update.status.map(|s| s.as_str()))
            .bind(&update.fulfillment_status)
            .bind(&update.tracking_number)
            .bind(&update.tracking_url)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found(format!("order {id}")))?;
        row_to_order(&row)
    }

    #[instrument(skip(self))]
    async fn get_escrow_by_order(&self, order_id: EntityId) -> Result<Option<Escrow>, AppError> {
        let sql = format!("SELECT {ESCROW_COLUMNS} FROM escrows WHERE order_id = $1");
        let row = sqlx::query(&sql)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_escrow).transpose()
    }

    #[instrument(skip(self, distribution))]
    async fn release_escrow(
        &self,
        order_id: EntityId,
        distribution: &NewGoodsDistribution,
        pool_credit: Option<PoolCredit>,
    ) -> Result<Option<GoodsRevenueDistribution>, AppError> {
        let mut tx = self.pool.begin().await?;

        if let Some(credit) = &pool_credit {
            let status: Option<String> =
                sqlx::query_scalar("SELECT status FROM contests WHERE id = $1 FOR SHARE")
                    .bind(credit.contest_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if status.as_deref() != Some("ended") {
                return Err(AppError::Conflict(format!(
                    "contest {} has not ended; its reward pool is closed",
                    credit.contest_id
                )));
            }
        }

        let released = sqlx::query(
            "UPDATE escrows SET status = 'released', settled_at = NOW() \
             WHERE order_id = $1 AND status = 'held'",
        )
        .bind(order_id)
        .execute(&mut *tx)
        .await?;
        if released.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let sql = format!(
            "INSERT INTO goods_revenue_distributions (order_id, goods_id, contest_id, \
             creator_wallet, total_lamports, creator_amount, voter_pool_amount, platform_amount) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {DISTRIBUTION_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(distribution.order_id)
            .bind(distribution.goods_id)
            .bind(distribution.contest_id)
            .bind(&distribution.creator_wallet)
            .bind(distribution.total_lamports)
            .bind(distribution.creator_amount)
            .bind(distribution.voter_pool_amount)
            .bind(distribution.platform_amount)
            .fetch_one(&mut *tx)
            .await?;
        let record = row_to_distribution(&row)?;

        if let Some(credit) = pool_credit {
            // total_weight is fixed by the first credit.
            sqlx::query(
                r#"
                INSERT INTO voter_reward_pools (contest_id, total_credited_lamports, total_weight)
                VALUES ($1, $2, $3)
                ON CONFLICT (contest_id) DO UPDATE
                SET total_credited_lamports =
                        voter_reward_pools.total_credited_lamports + EXCLUDED.total_credited_lamports,
                    updated_at = NOW()
                "#,
            )
            .bind(credit.contest_id)
            .bind(credit.amount_lamports)
            .bind(credit.total_weight)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Some(record))
    }

    #[instrument(skip(self))]
    async fn refund_escrow(&self, order_id: EntityId) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE escrows SET status = 'refunded', settled_at = NOW() \
             WHERE order_id = $1 AND status = 'held'",
        )
        .bind(order_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn list_distributions(&self) -> Result<Vec<GoodsRevenueDistribution>, AppError> {
        let sql = format!(
            "SELECT {DISTRIBUTION_COLUMNS} FROM goods_revenue_distributions \
             ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        collect(&rows, row_to_distribution)
    }
}

#[async_trait]
impl RevenueRepository for PostgresClient {
    #[instrument(skip(self, data), fields(contest_id = data.contest_id))]
    async fn create_revenue(&self, data: &CreateRevenueRequest) -> Result<Revenue, AppError> {
        let sql = format!(
            "INSERT INTO revenues (contest_id, source, description, total_lamports) \
             VALUES ($1, $2, $3, $4) RETURNING {REVENUE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(data.contest_id)
            .bind(&data.source)
            .bind(&data.description)
            .bind(data.total_lamports)
            .fetch_one(&self.pool)
            .await?;
        row_to_revenue(&row)
    }

    #[instrument(skip(self))]
    async fn get_revenue(&self, id: EntityId) -> Result<Option<Revenue>, AppError> {
        let sql = format!("SELECT {REVENUE_COLUMNS} FROM revenues WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_revenue).transpose()
    }

    #[instrument(skip(self))]
    async fn revenues_by_contest(&self, contest_id: EntityId) -> Result<Vec<Revenue>, AppError> {
        let sql = format!(
            "SELECT {REVENUE_COLUMNS} FROM revenues WHERE contest_id = $1 \
             ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(contest_id)
            .fetch_all(&self.pool)
            .await?;
        collect(&rows, row_to_revenue)
    }

    #[instrument(skip(self, shares), fields(share_count = shares.len()))]
    async fn record_distribution(
        &self,
        revenue_id: EntityId,
        shares: &[NewRevenueShare],
    ) -> Result<DistributionResult, AppError> {
        let mut tx = self.pool.begin().await?;

        let locked = sqlx::query("SELECT status FROM revenues WHERE id = $1 FOR UPDATE")
            .bind(revenue_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found(format!("revenue {revenue_id}")))?;
        let status: String = locked.try_get("status")?;
        if status == "distributed" {
            return Err(AppError::Conflict(format!(
                "revenue {revenue_id} already distributed"
            )));
        }

        let sql = format!(
            "UPDATE revenues SET status = 'distributed', distributed_at = NOW() \
             WHERE id = $1 RETURNING {REVENUE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(revenue_id)
            .fetch_one(&mut *tx)
            .await?;
        let revenue = row_to_revenue(&row)?;

        let sql = format!(
            "INSERT INTO revenue_shares (revenue_id, contest_id, wallet_address, role, share_bps, \
             amount_lamports) VALUES ($1, $2, $3, $4, $5, $6) RETURNING {SHARE_COLUMNS}"
        );
        let mut recorded = Vec::with_capacity(shares.len());
        for share in shares {
            let row = sqlx::query(&sql)
                .bind(revenue_id)
                .bind(revenue.contest_id)
                .bind(&share.wallet_address)
                .bind(share.role.as_str())
                .bind(share.share_bps)
                .bind(share.amount_lamports)
                .fetch_one(&mut *tx)
                .await?;
            recorded.push(row_to_share(&row)?);
        }

        tx.commit().await?;
        Ok(DistributionResult {
            revenue,
            shares: recorded,
        })
    }

    #[instrument(skip(self))]
    async fn set_memo_signature(
        &self,
        revenue_id: EntityId,
        signature: &str,
    ) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE revenues SET memo_signature = $2 WHERE id = $1")
            .bind(revenue_id)
            .bind(signature)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("revenue {revenue_id}")));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn shares_by_contest(&self, contest_id: EntityId) -> Result<Vec<RevenueShare>, AppError> {
        let sql = format!(
            "SELECT {SHARE_COLUMNS} FROM revenue_shares WHERE contest_id = $1 ORDER BY id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(contest_id)
            .fetch_all(&self.pool)
            .await?;
        collect(&rows, row_to_share)
    }

    #[instrument(skip(self))]
    async fn shares_by_wallet(&self, wallet: &str) -> Result<Vec<RevenueShare>, AppError> {
        let sql = format!(
            "SELECT {SHARE_COLUMNS} FROM revenue_shares WHERE wallet_address = $1 ORDER BY id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(wallet)
            .fetch_all(&self.pool)
            .await?;
        collect(&rows, row_to_share)
    }

    #[instrument(skip(self))]
    async fn get_pool(&self, contest_id: EntityId) -> Result<Option<VoterRewardPool>, AppError> {
        let sql = format!("SELECT {POOL_COLUMNS} FROM voter_reward_pools WHERE contest_id = $1");
        let row = sqlx::query(&sql)
            .bind(contest_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_pool).transpose()
    }

    #[instrument(skip(self))]
    async fn get_claim(
        &self,
        contest_id: EntityId,
        wallet: &str,
    ) -> Result<Option<VoterClaim>, AppError> {
        let sql = format!(
            "SELECT {CLAIM_COLUMNS} FROM voter_claims WHERE contest_id = $1 AND wallet_address = $2"
        );
        let row = sqlx::query(&sql)
            .bind(contest_id)
            .bind(wallet)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_claim).transpose()
    }

    #[instrument(skip(self))]
    async fn claims_by_wallet(&self, wallet: &str) -> Result<Vec<VoterClaim>, AppError> {
        let sql = format!(
            "SELECT {CLAIM_COLUMNS} FROM voter_claims WHERE wallet_address = $1 \
             ORDER BY contest_id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(wallet)
            .fetch_all(&self.pool)
            .await?;
        collect(&rows, row_to_claim)
    }

    #[instrument(skip(self))]
    async fn record_claim(
        &self,
        contest_id: EntityId,
        wallet: &str,
        weight: i64,
        previous_claimed: i64,
        new_claimed: i64,
    ) -> Result<bool, AppError> {
        // Compare-and-set on the claimed total; zero means "no claim yet".
        let result = if previous_claimed == 0 {
            sqlx::query(
                r#"
                INSERT INTO voter_claims (contest_id, wallet_address, weight, claimed_lamports)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (contest_id, wallet_address) DO UPDATE
                SET claimed_lamports = EXCLUDED.claimed_lamports,
                    weight = EXCLUDED.weight,
                    last_claimed_at = NOW()
                WHERE voter_claims.claimed_lamports = 0
                "#,
            )
            .bind(contest_id)
            .bind(wallet)
            .bind(weight)
            .bind(new_claimed)
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query(
                r#"
                UPDATE voter_claims
                SET claimed_lamports = $4, weight = $3, last_claimed_at = NOW()
                WHERE contest_id = $1 AND wallet_address = $2 AND claimed_lamports = $5
                "#,
            )
            .bind(contest_id)
            .bind(wallet)
            .bind(weight)
            .bind(new_claimed)
            .bind(previous_claimed)
            .execute(&self.pool)
            .await?
        };
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;
        Ok(())
    }
}
