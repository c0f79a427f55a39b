//! Application service layer.
//!
//! This module contains the core business logic that orchestrates
//! operations between infrastructure components using trait abstractions.
//! Contest, commerce and reward use cases live in sibling modules as further
//! `impl AppService` blocks.

use std::sync::Arc;

use secrecy::SecretString;
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::config::{DEFAULT_SAMU_MINT, DEFAULT_TREASURY_WALLET};
use crate::domain::revenue::percent_of;
use crate::domain::voting::{
    default_username, is_valid_wallet, raw_to_whole_samu, samu_to_raw, voting_power,
};
use crate::domain::{
    AppError, BlockchainClient, CastVoteRequest, CastVoteResponse, ContestStatus,
    CreateMemeRequest, DatabaseClient, EntityId, FulfillmentClient, GoodsShareConfig,
    HealthResponse, HealthStatus, Meme, MemeQuery, NewMeme, NewVote, PaginatedResponse,
    ShareConfig, TransferCheck, UpdateProfileRequest, User, UserStats, ValidationError, Vote,
    VoteSummaryResponse, VoterBreakdown, VotingPowerResponse,
};

/// Largest page size accepted when listing memes.
pub const MAX_PAGE_LIMIT: u32 = 1000;

/// Settings that shape the service's business rules.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub samu_token_mint: String,
    pub treasury_wallet: String,
    /// When false, vote and order payment signatures are trusted as given.
    pub verify_onchain_payments: bool,
    /// Lowercased admin emails.
    pub admin_emails: Vec<String>,
    pub webhook_secret: Option<SecretString>,
    pub contest_shares: ShareConfig,
    pub goods_shares: GoodsShareConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            samu_token_mint: DEFAULT_SAMU_MINT.to_string(),
            treasury_wallet: DEFAULT_TREASURY_WALLET.to_string(),
            verify_onchain_payments: true,
            admin_emails: Vec::new(),
            webhook_secret: None,
            contest_shares: ShareConfig::contest_default(),
            goods_shares: GoodsShareConfig::goods_default(),
        }
    }
}

/// Application service containing core business logic.
///
/// This service orchestrates operations between the database, the blockchain
/// and the optional print-on-demand provider, implementing the application's
/// use cases. It holds references to the trait abstractions, enabling
/// dependency injection and testability.
///
/// # Example
///
/// ```ignore
/// let db = Arc::new(PostgresClient::new(&config).await?);
/// let blockchain = Arc::new(RpcBlockchainClient::with_defaults(&url, signer)?);
/// let service = AppService::new(db, blockchain).with_config(app_config.service_config());
///
/// let contest = service.get_current_contest().await?;
/// ```
pub struct AppService {
    pub(super) db_client: Arc<dyn DatabaseClient>,
    pub(super) blockchain_client: Arc<dyn BlockchainClient>,
    pub(super) fulfillment_client: Option<Arc<dyn FulfillmentClient>>,
    pub(super) config: ServiceConfig,
}

impl AppService {
    /// Creates a new `AppService` with the default configuration and no
    /// fulfillment provider.
    ///
    /// # Arguments
    ///
    /// * `db_client` - Database client for persistence operations.
    /// * `blockchain_client` - Blockchain client for on-chain operations.
    #[must_use]
    pub fn new(
        db_client: Arc<dyn DatabaseClient>,
        blockchain_client: Arc<dyn BlockchainClient>,
    ) -> Self {
        Self {
            db_client,
            blockchain_client,
            fulfillment_client: None,
            config: ServiceConfig::default(),
        }
    }

    /// Replaces the service configuration.
    #[must_use]
    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Attaches a print-on-demand provider.
    #[must_use]
    pub fn with_fulfillment(mut self, client: Arc<dyn FulfillmentClient>) -> Self {
        self.fulfillment_client = Some(client);
        self
    }

    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Performs a health check on all dependencies.
    ///
    /// Returns the health status of the database and blockchain clients.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> HealthResponse {
        let db_health = match self.db_client.health_check().await {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => {
                warn!(error = ?e, "Database health check failed");
                HealthStatus::Unhealthy
            }
        };

        let blockchain_health = match self.blockchain_client.health_check().await {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => {
                warn!(error = ?e, "Blockchain health check failed");
                HealthStatus::Unhealthy
            }
        };

        HealthResponse::new(db_health, blockchain_health)
    }

    /// Whether `email` is a configured administrator.
    ///
    /// Comparison is case-insensitive and runs in constant time per entry.
    #[must_use]
    pub fn is_admin(&self, email: &str) -> bool {
        let candidate = Sha256::digest(email.trim().to_lowercase().as_bytes());
        self.config
            .admin_emails
            .iter()
            .fold(false, |found, admin| {
                let expected = Sha256::digest(admin.as_bytes());
                constant_time_eq(&candidate, &expected) | found
            })
    }

    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    /// Returns the wallet's profile, creating it on first access.
    ///
    /// New profiles get a `first8...last4` username derived from the wallet.
    #[instrument(skip(self))]
    pub async fn get_or_create_profile(&self, wallet: &str) -> Result<User, AppError> {
        ensure_wallet(wallet)?;
        if let Some(user) = self.db_client.get_user(wallet).await? {
            return Ok(user);
        }
        let user = self
            .db_client
            .create_user(wallet, &default_username(wallet))
            .await?;
        info!(wallet = %wallet, username = %user.username, "Created user profile");
        Ok(user)
    }

    #[instrument(skip(self, request))]
    pub async fn update_profile(
        &self,
        wallet: &str,
        request: &UpdateProfileRequest,
    ) -> Result<User, AppError> {
        validate(request, "update profile")?;
        self.get_or_create_profile(wallet).await?;
        self.db_client.update_user(wallet, request).await
    }

    #[instrument(skip(self))]
    pub async fn user_memes(&self, wallet: &str) -> Result<Vec<Meme>, AppError> {
        ensure_wallet(wallet)?;
        self.db_client.memes_by_author(wallet).await
    }

    #[instrument(skip(self))]
    pub async fn user_votes(&self, wallet: &str) -> Result<Vec<Vote>, AppError> {
        ensure_wallet(wallet)?;
        self.db_client.votes_by_wallet(wallet).await
    }

    /// Aggregates a wallet's submissions and votes.
    #[instrument(skip(self))]
    pub async fn user_stats(&self, wallet: &str) -> Result<UserStats, AppError> {
        let profile = self.get_or_create_profile(wallet).await?;
        let memes = self.db_client.memes_by_author(wallet).await?;
        let votes = self.db_client.votes_by_wallet(wallet).await?;

        Ok(UserStats {
            total_memes: memes.len(),
            total_meme_votes: memes.iter().map(|m| m.votes).sum(),
            total_votes_cast: votes.len(),
            total_samu_spent: votes.iter().map(|v| v.samu_amount).sum(),
            member_since: profile.created_at,
        })
    }

    /// Reads the wallet's SAMU balance on chain and derives its voting power.
    #[instrument(skip(self))]
    pub async fn voting_power(&self, wallet: &str) -> Result<VotingPowerResponse, AppError> {
        ensure_wallet(wallet)?;
        let raw = self
            .blockchain_client
            .get_token_balance(wallet, &self.config.samu_token_mint)
            .await?;
        let samu_balance = raw_to_whole_samu(raw);

        Ok(VotingPowerResponse {
            wallet_address: wallet.to_string(),
            samu_balance,
            voting_power: voting_power(samu_balance),
        })
    }

    // -----------------------------------------------------------------------
    // Memes
    // -----------------------------------------------------------------------

    /// Submits a meme to the active contest.
    ///
    /// When the author has a profile, its public name replaces the
    /// username sent by the client.
    ///
    /// # Errors
    ///
    /// Returns an `AppError` if:
    /// - Validation fails
    /// - No contest is active
    /// - The database operation fails
    #[instrument(skip(self, request), fields(author = %request.author_wallet))]
    pub async fn create_meme(&self, request: &CreateMemeRequest) -> Result<Meme, AppError> {
        validate(request, "create meme")?;

        let contest = self.db_client.get_active_contest().await?.ok_or_else(|| {
            AppError::Validation(ValidationError::field(
                "contest_id",
                "no contest is currently accepting submissions",
            ))
        })?;

        let author_username = match self.db_client.get_user(&request.author_wallet).await? {
            Some(user) => user.public_name().to_string(),
            None => request.author_username.clone(),
        };

        let meme = self
            .db_client
            .create_meme(&NewMeme {
                contest_id: contest.id,
                title: request.title.clone(),
                description: request.description.clone(),
                image_url: request.image_url.clone(),
                author_wallet: request.author_wallet.clone(),
                author_username,
            })
            .await?;

        info!(meme_id = meme.id, contest_id = contest.id, "Meme submitted");
        Ok(meme)
    }

    /// Lists one page of a contest's memes, defaulting to the active contest.
    #[instrument(skip(self))]
    pub async fn list_memes(&self, query: &MemeQuery) -> Result<PaginatedResponse<Meme>, AppError> {
        let page = query.page.max(1);
        let limit = query.limit.clamp(1, MAX_PAGE_LIMIT);

        let contest_id = match query.contest_id {
            Some(id) => Some(id),
            None => self.db_client.get_active_contest().await?.map(|c| c.id),
        };

        match contest_id {
            Some(id) => {
                self.db_client
                    .list_memes(id, query.sort, page, limit)
                    .await
            }
            None => Ok(PaginatedResponse::from_sorted(Vec::new(), page, limit)),
        }
    }

    pub async fn list_all_memes(&self) -> Result<Vec<Meme>, AppError> {
        self.db_client.list_all_memes().await
    }

    #[instrument(skip(self))]
    pub async fn get_meme(&self, id: EntityId) -> Result<Meme, AppError> {
        self.db_client
            .get_meme(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("meme {id}")))
    }

    /// Deletes a meme on behalf of its author.
    ///
    /// # Errors
    ///
    /// - `Authorization` when `author_wallet` is not the author
    /// - `Conflict` when the meme's contest already ended
    #[instrument(skip(self))]
    pub async fn delete_meme(&self, id: EntityId, author_wallet: &str) -> Result<(), AppError> {
        let meme = self.get_meme(id).await?;
        if meme.author_wallet != author_wallet {
            return Err(AppError::Authorization(
                "only the author can delete a meme".to_string(),
            ));
        }

        if let Some(contest_id) = meme.contest_id {
            let contest = self.db_client.get_contest(contest_id).await?;
            if contest.is_some_and(|c| c.status == ContestStatus::Ended) {
                return Err(AppError::Conflict(
                    "memes of an ended contest are archived".to_string(),
                ));
            }
        }

        if !self.db_client.delete_meme(id).await? {
            return Err(AppError::not_found(format!("meme {id}")));
        }
        info!(meme_id = id, "Meme deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Votes
    // -----------------------------------------------------------------------

    /// Records a SAMU vote for a meme of the active contest.
    ///
    /// This method orchestrates the following workflow:
    /// 1. Validates the input data
    /// 2. Checks the meme belongs to an active contest
    /// 3. Verifies the SAMU transfer on chain (when enabled)
    /// 4. Stores the vote and bumps the meme total atomically
    ///
    /// # Errors
    ///
    /// Returns an `AppError` if:
    /// - Validation fails or the transfer cannot be verified
    /// - The meme does not exist
    /// - The transaction signature was already used (`Duplicate`)
    #[instrument(skip(self, request), fields(voter = %request.voter_wallet, samu = request.samu_amount))]
    pub async fn cast_vote(
        &self,
        meme_id: EntityId,
        request: &CastVoteRequest,
    ) -> Result<CastVoteResponse, AppError> {
        validate(request, "cast vote")?;

        let meme = self.get_meme(meme_id).await?;
        let contest_id = meme.contest_id.ok_or_else(|| {
            AppError::Validation(ValidationError::field(
                "meme_id",
                "meme is not part of a contest",
            ))
        })?;
        let contest = self
            .db_client
            .get_contest(contest_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("contest {contest_id}")))?;
        if contest.status != ContestStatus::Active {
            return Err(AppError::Validation(ValidationError::field(
                "meme_id",
                "voting is closed for this contest",
            )));
        }

        if self.config.verify_onchain_payments {
            let min_amount = samu_to_raw(request.samu_amount).ok_or_else(|| {
                AppError::Validation(ValidationError::field("samu_amount", "amount too large"))
            })?;
            let check = TransferCheck {
                signature: request.tx_signature.clone(),
                source_wallet: request.voter_wallet.clone(),
                destination_wallet: self.config.treasury_wallet.clone(),
                mint: Some(self.config.samu_token_mint.clone()),
                min_amount,
            };
            if !self.blockchain_client.verify_transfer(&check).await? {
                warn!(signature = %request.tx_signature, "Vote transfer could not be verified");
                return Err(AppError::Validation(ValidationError::field(
                    "tx_signature",
                    "transaction does not transfer the voted SAMU to the treasury",
                )));
            }
        }

        let (vote, meme) = self
            .db_client
            .record_vote(&NewVote {
                meme_id,
                contest_id,
                voter_wallet: request.voter_wallet.clone(),
                samu_amount: request.samu_amount,
                tx_signature: request.tx_signature.clone(),
            })
            .await?;

        metrics::counter!("votes_cast_total").increment(1);
        info!(vote_id = vote.id, meme_id, total = meme.votes, "Vote recorded");
        Ok(CastVoteResponse { vote, meme })
    }

    pub async fn has_voted(&self, meme_id: EntityId, wallet: &str) -> Result<bool, AppError> {
        self.db_client.has_voted(meme_id, wallet).await
    }

    /// Per-voter SAMU totals of a contest with their share of all votes.
    #[instrument(skip(self))]
    pub async fn contest_vote_summary(
        &self,
        contest_id: EntityId,
    ) -> Result<VoteSummaryResponse, AppError> {
        let totals = self.db_client.voter_totals(contest_id).await?;
        let total_samu_voted: i64 = totals.iter().map(|t| t.total_samu_amount).sum();

        Ok(VoteSummaryResponse {
            total_voters: totals.len(),
            total_samu_voted,
            voter_breakdown: totals
                .into_iter()
                .map(|t| VoterBreakdown {
                    vote_percent: percent_of(t.total_samu_amount, total_samu_voted),
                    wallet: t.voter_wallet,
                    samu_voted: t.total_samu_amount,
                })
                .collect(),
        })
    }
}

/// Runs `validator` rules, logging rejected requests.
pub(super) fn validate<T: Validate>(request: &T, what: &str) -> Result<(), AppError> {
    request.validate().map_err(|e| {
        warn!(error = %e, "Validation failed for {what} request");
        AppError::Validation(ValidationError::Multiple(e.to_string()))
    })
}

pub(super) fn ensure_wallet(wallet: &str) -> Result<(), AppError> {
    if is_valid_wallet(wallet) {
        Ok(())
    } else {
        Err(AppError::Validation(ValidationError::field(
            "wallet",
            "Invalid Solana wallet address",
        )))
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
