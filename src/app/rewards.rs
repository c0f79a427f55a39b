//! Contest revenue distribution, goods reward dashboard and voter pool claims.

use std::collections::{HashMap, HashSet};

use tracing::{info, instrument, warn};

use crate::domain::revenue::{
    BPS_DENOMINATOR, ContestSplitInput, claimable_amount, distribution_digest, percent_of,
    plan_contest_split, pool_entitlement,
};
use crate::domain::{
    AppError, ClaimRequest, ClaimResponse, ClaimWithPending, ClaimableResponse,
    ContestRevenueResponse, CreateRevenueRequest, DashboardSummary, DistributeRevenueRequest,
    DistributionParts, DistributionResult, EntityId, Goods, MapOrder, MapStats, MyShareResponse,
    OrderMapResponse, OrderStatus, PoolVoter, Revenue, RevenueStatus, RewardsDashboard, RoleTotal,
    ShareRole, ValidationError, VoterPoolResponse, VotingShare, WalletRevenueResponse,
};

use super::service::{AppService, ensure_wallet, validate};

/// Distributions listed on the dashboard.
pub const RECENT_DISTRIBUTIONS: usize = 20;

impl AppService {
    // -----------------------------------------------------------------------
    // Contest revenue
    // -----------------------------------------------------------------------

    /// Records revenue earned by a contest, pending distribution.
    #[instrument(skip(self, request), fields(contest_id = request.contest_id))]
    pub async fn create_revenue(&self, request: &CreateRevenueRequest) -> Result<Revenue, AppError> {
        validate(request, "create revenue")?;
        self.get_contest(request.contest_id).await?;

        let revenue = self.db_client.create_revenue(request).await?;
        info!(revenue_id = revenue.id, lamports = revenue.total_lamports, "Revenue recorded");
        Ok(revenue)
    }

    /// Splits a revenue between creator, voters, NFT holder and platform.
    ///
    /// This method orchestrates the following workflow:
    /// 1. Resolves the creator (winner's author) and the contest's voters
    /// 2. Plans the split and checks it against the share configuration
    /// 3. Persists the shares and marks the revenue distributed atomically
    /// 4. Anchors a digest of the plan on chain (best effort)
    ///
    /// # Errors
    ///
    /// - `Conflict` when the revenue was already distributed
    /// - `Validation` when the plan violates the share configuration
    #[instrument(skip(self, request))]
    pub async fn distribute_revenue(
        &self,
        revenue_id: EntityId,
        request: &DistributeRevenueRequest,
    ) -> Result<DistributionResult, AppError> {
        validate(request, "distribute revenue")?;

        let revenue = self
            .db_client
            .get_revenue(revenue_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("revenue {revenue_id}")))?;
        if revenue.status == RevenueStatus::Distributed {
            return Err(AppError::Conflict(format!(
                "revenue {revenue_id} already distributed"
            )));
        }

        let creator = self.winner_author(revenue.contest_id).await?;
        let voters = self.db_client.voter_totals(revenue.contest_id).await?;
        let shares = plan_contest_split(
            &self.config.contest_shares,
            &ContestSplitInput {
                total_lamports: revenue.total_lamports,
                creator_wallet: creator.as_deref(),
                voters: &voters,
                nft_holder_wallet: request.nft_holder_wallet.as_deref(),
                treasury_wallet: &self.config.treasury_wallet,
            },
        )
        .map_err(AppError::Validation)?;

        let mut result = self
            .db_client
            .record_distribution(revenue_id, &shares)
            .await?;
        metrics::counter!("revenue_distributed_total").increment(1);
        info!(revenue_id, lines = shares.len(), "Revenue distributed");

        let digest = distribution_digest(revenue_id, &shares);
        let memo = format!("samu:revenue:{revenue_id}:{digest}");
        match self.blockchain_client.submit_memo(&memo).await {
            Ok(signature) => {
                match self
                    .db_client
                    .set_memo_signature(revenue_id, &signature)
                    .await
                {
                    Ok(()) => result.revenue.memo_signature = Some(signature),
                    Err(e) => warn!(revenue_id, error = ?e, "Failed to store memo signature"),
                }
            }
            Err(e) => {
                warn!(revenue_id, error = ?e, "Failed to anchor distribution on chain");
            }
        }

        Ok(result)
    }

    #[instrument(skip(self))]
    pub async fn contest_revenue(
        &self,
        contest_id: EntityId,
    ) -> Result<ContestRevenueResponse, AppError> {
        self.get_contest(contest_id).await?;
        Ok(ContestRevenueResponse {
            revenues: self.db_client.revenues_by_contest(contest_id).await?,
            shares: self.db_client.shares_by_contest(contest_id).await?,
            vote_summary: self.contest_vote_summary(contest_id).await?,
            share_config: self.config.contest_shares,
        })
    }

    /// A wallet's stake in a contest: SAMU voted, creator flag and shares earned.
    #[instrument(skip(self))]
    pub async fn my_share(
        &self,
        contest_id: EntityId,
        wallet: &str,
    ) -> Result<MyShareResponse, AppError> {
        ensure_wallet(wallet)?;
        self.get_contest(contest_id).await?;

        let totals = self.db_client.voter_totals(contest_id).await?;
        let total_contest_samu: i64 = totals.iter().map(|t| t.total_samu_amount).sum();
        let samu_voted = totals
            .iter()
            .find(|t| t.voter_wallet == wallet)
            .map_or(0, |t| t.total_samu_amount);

        let revenue_shares: Vec<_> = self
            .db_client
            .shares_by_contest(contest_id)
            .await?
            .into_iter()
            .filter(|s| s.wallet_address == wallet)
            .collect();
        let is_creator = self.winner_author(contest_id).await?.as_deref() == Some(wallet)
            || revenue_shares.iter().any(|s| s.role == ShareRole::Creator);

        Ok(MyShareResponse {
            wallet: wallet.to_string(),
            contest_id,
            voting: VotingShare {
                samu_voted,
                vote_percent: percent_of(samu_voted, total_contest_samu),
                total_contest_samu,
            },
            is_creator,
            total_earned_lamports: revenue_shares.iter().map(|s| s.amount_lamports).sum(),
            revenue_shares,
            share_config: self.config.contest_shares,
        })
    }

    #[instrument(skip(self))]
    pub async fn wallet_revenue(&self, wallet: &str) -> Result<WalletRevenueResponse, AppError> {
        ensure_wallet(wallet)?;
        let shares = self.db_client.shares_by_wallet(wallet).await?;
        Ok(WalletRevenueResponse {
            wallet: wallet.to_string(),
            total_earned_lamports: shares.iter().map(|s| s.amount_lamports).sum(),
            shares,
        })
    }

    // -----------------------------------------------------------------------
    // Goods rewards
    // -----------------------------------------------------------------------

    /// Totals of goods sales and escrow distributions.
    #[instrument(skip(self))]
    pub async fn dashboard(&self) -> Result<RewardsDashboard, AppError> {
        let orders = self.db_client.list_orders().await?;
        let sold: Vec<_> = orders
            .iter()
            .filter(|o| {
                matches!(
                    o.status,
                    OrderStatus::Confirmed | OrderStatus::Shipped | OrderStatus::Delivered
                )
            })
            .collect();

        let distributions = self.db_client.list_distributions().await?;
        let mut totals = DistributionParts {
            creator_amount: 0,
            voter_pool_amount: 0,
            platform_amount: 0,
        };
        for d in &distributions {
            totals.creator_amount += d.creator_amount;
            totals.voter_pool_amount += d.voter_pool_amount;
            totals.platform_amount += d.platform_amount;
        }

        let mut creator_wallets: Vec<String> = Vec::new();
        for wallet in distributions.iter().filter_map(|d| d.creator_wallet.as_ref()) {
            if !creator_wallets.contains(wallet) {
                creator_wallets.push(wallet.clone());
            }
        }

        let ratios = self.config.goods_shares;
        let percent = |bps: i64| bps as f64 * 100.0 / BPS_DENOMINATOR as f64;

        Ok(RewardsDashboard {
            summary: DashboardSummary {
                total_sales_lamports: sold.iter().filter_map(|o| o.sol_amount_lamports).sum(),
                total_orders: sold.len(),
                total_distributed_lamports: distributions.iter().map(|d| d.total_lamports).sum(),
            },
            creator: RoleTotal {
                percent: percent(ratios.creator_bps),
                total_lamports: totals.creator_amount,
            },
            voter: RoleTotal {
                percent: percent(ratios.voter_pool_bps),
                total_lamports: totals.voter_pool_amount,
            },
            platform: RoleTotal {
                percent: percent(ratios.platform_bps),
                total_lamports: totals.platform_amount,
            },
            creator_wallets,
            treasury_wallet: self.config.treasury_wallet.clone(),
            recent_distributions: distributions
                .iter()
                .take(RECENT_DISTRIBUTIONS)
                .cloned()
                .collect(),
            share_ratios: ratios,
        })
    }

    /// A contest's reward pool and each voter's weight in it.
    #[instrument(skip(self))]
    pub async fn voter_pool(&self, contest_id: EntityId) -> Result<VoterPoolResponse, AppError> {
        let pool = self.db_client.get_pool(contest_id).await?;
        let totals = self.db_client.voter_totals(contest_id).await?;
        let total: i64 = totals.iter().map(|t| t.total_samu_amount).sum();

        Ok(VoterPoolResponse {
            pool,
            voters: totals
                .into_iter()
                .map(|t| PoolVoter {
                    share_percent: percent_of(t.total_samu_amount, total),
                    wallet: t.voter_wallet,
                    samu_amount: t.total_samu_amount,
                })
                .collect(),
        })
    }

    /// What a voter is entitled to from a contest's pool and can still claim.
    #[instrument(skip(self))]
    pub async fn claimable(
        &self,
        contest_id: EntityId,
        wallet: &str,
    ) -> Result<ClaimableResponse, AppError> {
        ensure_wallet(wallet)?;
        let pool = self.db_client.get_pool(contest_id).await?;
        let claim = self.db_client.get_claim(contest_id, wallet).await?;
        let weight = match &claim {
            Some(claim) => claim.weight,
            None => self
                .db_client
                .voter_totals(contest_id)
                .await?
                .into_iter()
                .find(|t| t.voter_wallet == wallet)
                .map_or(0, |t| t.total_samu_amount),
        };
        let claimed_lamports = claim.map_or(0, |c| c.claimed_lamports);

        let (credited, total_weight) = pool
            .map_or((0, 0), |p| (p.total_credited_lamports, p.total_weight));
        let entitled_lamports = pool_entitlement(weight, credited, total_weight);

        Ok(ClaimableResponse {
            contest_id,
            wallet_address: wallet.to_string(),
            weight,
            entitled_lamports,
            claimed_lamports,
            claimable_lamports: (entitled_lamports - claimed_lamports).max(0),
        })
    }

    /// Claims everything currently claimable from a contest's pool.
    ///
    /// # Errors
    ///
    /// - `Validation` when nothing is claimable
    /// - `Conflict` when a concurrent claim for the same wallet won
    #[instrument(skip(self, request), fields(wallet = %request.wallet_address))]
    pub async fn claim(
        &self,
        contest_id: EntityId,
        request: &ClaimRequest,
    ) -> Result<ClaimResponse, AppError> {
        validate(request, "claim")?;
        let wallet = &request.wallet_address;

        let status = self.claimable(contest_id, wallet).await?;
        if status.claimable_lamports <= 0 {
            return Err(AppError::Validation(ValidationError::field(
                "wallet_address",
                "nothing to claim",
            )));
        }

        let recorded = self
            .db_client
            .record_claim(
                contest_id,
                wallet,
                status.weight,
                status.claimed_lamports,
                status.entitled_lamports,
            )
            .await?;
        if !recorded {
            return Err(AppError::Conflict(
                "a concurrent claim was already recorded".to_string(),
            ));
        }

        info!(contest_id, amount = status.claimable_lamports, "Voter reward claimed");
        Ok(ClaimResponse {
            contest_id,
            wallet_address: wallet.clone(),
            claimed_now_lamports: status.claimable_lamports,
            total_claimed_lamports: status.entitled_lamports,
        })
    }

    #[instrument(skip(self))]
    pub async fn my_claims(&self, wallet: &str) -> Result<Vec<ClaimWithPending>, AppError> {
        ensure_wallet(wallet)?;
        let claims = self.db_client.claims_by_wallet(wallet).await?;

        let mut result = Vec::with_capacity(claims.len());
        for claim in claims {
            let pending_lamports = match self.db_client.get_pool(claim.contest_id).await? {
                Some(pool) => claimable_amount(
                    claim.weight,
                    pool.total_credited_lamports,
                    pool.total_weight,
                    claim.claimed_lamports,
                ),
                None => 0,
            };
            result.push(ClaimWithPending {
                claim,
                pending_lamports,
            });
        }
        Ok(result)
    }

    /// Orders with a shipping destination, their distribution and whether
    /// `wallet` earned from them as creator or voter.
    #[instrument(skip(self))]
    pub async fn order_map(&self, wallet: Option<&str>) -> Result<OrderMapResponse, AppError> {
        let orders: Vec<_> = self
            .db_client
            .list_orders()
            .await?
            .into_iter()
            .filter(|o| !o.shipping.country.trim().is_empty())
            .collect();
        let distributions: HashMap<EntityId, _> = self
            .db_client
            .list_distributions()
            .await?
            .into_iter()
            .map(|d| (d.order_id, d))
            .collect();

        let voted_contests: HashSet<EntityId> = match wallet {
            Some(wallet) => self
                .db_client
                .votes_by_wallet(wallet)
                .await?
                .into_iter()
                .map(|v| v.contest_id)
                .collect(),
            None => HashSet::new(),
        };

        let mut goods_cache: HashMap<EntityId, Option<Goods>> = HashMap::new();
        let mut map_orders = Vec::with_capacity(orders.len());
        for order in &orders {
            if !goods_cache.contains_key(&order.goods_id) {
                let goods = self.db_client.get_goods(order.goods_id).await?;
                goods_cache.insert(order.goods_id, goods);
            }
            let goods = goods_cache.get(&order.goods_id).and_then(Option::as_ref);
            let distribution = distributions.get(&order.id);

            let has_revenue = match (wallet, distribution) {
                (Some(wallet), Some(d)) => {
                    d.creator_wallet.as_deref() == Some(wallet)
                        || (d.voter_pool_amount > 0
                            && d.contest_id.is_some_and(|c| voted_contests.contains(&c)))
                }
                _ => false,
            };

            map_orders.push(MapOrder {
                id: order.id,
                city: order.shipping.city.clone(),
                country: order.shipping.country.clone(),
                status: order.status.to_string(),
                tracking_number: order.tracking_number.clone(),
                tracking_url: order.tracking_url.clone(),
                sol_amount_lamports: order.sol_amount_lamports,
                total_price_cents: order.total_price_cents,
                goods_title: goods.map_or_else(|| "Unknown".to_string(), |g| g.title.clone()),
                goods_image: goods.map(|g| g.image_url.clone()),
                product_type: goods.map(|g| g.product_type.clone()),
                created_at: order.created_at,
                has_revenue,
                distribution: distribution.map(|d| DistributionParts {
                    creator_amount: d.creator_amount,
                    voter_pool_amount: d.voter_pool_amount,
                    platform_amount: d.platform_amount,
                }),
            });
        }

        let countries: HashSet<&str> = orders.iter().map(|o| o.shipping.country.as_str()).collect();
        let stats = MapStats {
            total: orders.len(),
            shipped: orders.iter().filter(|o| o.status == OrderStatus::Shipped).count(),
            delivered: orders
                .iter()
                .filter(|o| o.status == OrderStatus::Delivered)
                .count(),
            countries: countries.len(),
        };

        Ok(OrderMapResponse {
            orders: map_orders,
            stats,
        })
    }
}
