//! Integer revenue arithmetic: share configurations, split plans, escrow profit
//! and voter pool entitlements.
//!
//! Every amount is an integer number of lamports. Shares are expressed in basis
//! points (1/10 000). Whatever a floor division leaves behind is credited to the
//! platform so that a plan always sums to the distributed total.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use super::error::ValidationError;
use super::types::{NewRevenueShare, ShareRole, VoterTotal};

pub const BPS_DENOMINATOR: i64 = 10_000;

/// Allowed deviation of a role's allocation from its configured share.
pub const TOLERANCE_BPS: i64 = 10;

/// Wallet recorded for the NFT holder share when no holder is known yet.
pub const UNASSIGNED_NFT_HOLDER: &str = "unassigned_nft_holder";

/// `amount * bps / 10_000`, floored.
#[must_use]
pub fn apply_bps(amount: i64, bps: i64) -> i64 {
    mul_div(amount, bps, BPS_DENOMINATOR)
}

/// `a * b / c` with a 128-bit intermediate, floored. Returns 0 when `c <= 0`.
#[must_use]
pub fn mul_div(a: i64, b: i64, c: i64) -> i64 {
    if c <= 0 {
        return 0;
    }
    let value = i128::from(a) * i128::from(b) / i128::from(c);
    i64::try_from(value).unwrap_or(if value.is_negative() { i64::MIN } else { i64::MAX })
}

/// Share of `part` in `total` as a percentage, for display only.
#[must_use]
pub fn percent_of(part: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    part as f64 / total as f64 * 100.0
}

/// Split of contest revenue between the four roles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ShareConfig {
    pub creator_bps: i64,
    pub voters_bps: i64,
    pub nft_holder_bps: i64,
    pub platform_bps: i64,
}

impl ShareConfig {
    pub fn new(
        creator_bps: i64,
        voters_bps: i64,
        nft_holder_bps: i64,
        platform_bps: i64,
    ) -> Result<Self, ValidationError> {
        check_bps(&[
            ("creator_bps", creator_bps),
            ("voters_bps", voters_bps),
            ("nft_holder_bps", nft_holder_bps),
            ("platform_bps", platform_bps),
        ])?;
        Ok(Self {
            creator_bps,
            voters_bps,
            nft_holder_bps,
            platform_bps,
        })
    }

    /// Creator 30 %, voters 30 %, NFT holder 25 %, platform 15 %.
    #[must_use]
    pub const fn contest_default() -> Self {
        Self {
            creator_bps: 3000,
            voters_bps: 3000,
            nft_holder_bps: 2500,
            platform_bps: 1500,
        }
    }

    #[must_use]
    pub fn bps_for(&self, role: ShareRole) -> i64 {
        match role {
            ShareRole::Creator => self.creator_bps,
            ShareRole::Voter => self.voters_bps,
            ShareRole::NftHolder => self.nft_holder_bps,
            ShareRole::Platform => self.platform_bps,
        }
    }
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self::contest_default()
    }
}

/// Split of a released goods escrow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct GoodsShareConfig {
    pub creator_bps: i64,
    pub voter_pool_bps: i64,
    pub platform_bps: i64,
}

impl GoodsShareConfig {
    pub fn new(
        creator_bps: i64,
        voter_pool_bps: i64,
        platform_bps: i64,
    ) -> Result<Self, ValidationError> {
        check_bps(&[
            ("creator_bps", creator_bps),
            ("voter_pool_bps", voter_pool_bps),
            ("platform_bps", platform_bps),
        ])?;
        Ok(Self {
            creator_bps,
            voter_pool_bps,
            platform_bps,
        })
    }

    /// Creator 45 %, voter pool 40 %, platform 15 %.
    #[must_use]
    pub const fn goods_default() -> Self {
        Self {
            creator_bps: 4500,
            voter_pool_bps: 4000,
            platform_bps: 1500,
        }
    }
}

impl Default for GoodsShareConfig {
    fn default() -> Self {
        Self::goods_default()
    }
}

fn check_bps(parts: &[(&str, i64)]) -> Result<(), ValidationError> {
    if let Some((field, _)) = parts.iter().find(|(_, bps)| *bps < 0) {
        return Err(ValidationError::field(field, "share must not be negative"));
    }
    let sum: i64 = parts.iter().map(|(_, bps)| bps).sum();
    if sum != BPS_DENOMINATOR {
        return Err(ValidationError::InvalidFormat(format!(
            "shares must sum to {BPS_DENOMINATOR} bps, got {sum}"
        )));
    }
    Ok(())
}

/// Inputs of a contest revenue distribution.
#[derive(Debug, Clone)]
pub struct ContestSplitInput<'a> {
    pub total_lamports: i64,
    pub creator_wallet: Option<&'a str>,
    pub voters: &'a [VoterTotal],
    pub nft_holder_wallet: Option<&'a str>,
    pub treasury_wallet: &'a str,
}

/// Builds the share lines of a contest revenue distribution.
///
/// The creator gets the creator share when one is known, voters split the
/// voter share pro rata to the SAMU they voted and the NFT holder share goes to
/// the given wallet or [`UNASSIGNED_NFT_HOLDER`]. The treasury receives the
/// platform share plus every lamport nobody else was allocated, so the lines
/// always sum to `total_lamports`.
pub fn plan_contest_split(
    config: &ShareConfig,
    input: &ContestSplitInput<'_>,
) -> Result<Vec<NewRevenueShare>, ValidationError> {
    let total = input.total_lamports;
    if total <= 0 {
        return Err(ValidationError::field(
            "total_lamports",
            "revenue must be positive",
        ));
    }

    let mut shares = Vec::with_capacity(input.voters.len() + 3);

    if let Some(creator) = input.creator_wallet {
        let amount = apply_bps(total, config.creator_bps);
        if amount > 0 {
            shares.push(NewRevenueShare {
                wallet_address: creator.to_string(),
                role: ShareRole::Creator,
                share_bps: config.creator_bps,
                amount_lamports: amount,
            });
        }
    }

    let voter_pool = apply_bps(total, config.voters_bps);
    let total_voted: i64 = input
        .voters
        .iter()
        .map(|v| v.total_samu_amount.max(0))
        .sum();
    if total_voted > 0 {
        for voter in input.voters.iter().filter(|v| v.total_samu_amount > 0) {
            let amount = mul_div(voter_pool, voter.total_samu_amount, total_voted);
            if amount == 0 {
                continue;
            }
            shares.push(NewRevenueShare {
                wallet_address: voter.voter_wallet.clone(),
                role: ShareRole::Voter,
                share_bps: mul_div(config.voters_bps, voter.total_samu_amount, total_voted),
                amount_lamports: amount,
            });
        }
    }

    let nft_amount = apply_bps(total, config.nft_holder_bps);
    if nft_amount > 0 {
        shares.push(NewRevenueShare {
            wallet_address: input
                .nft_holder_wallet
                .unwrap_or(UNASSIGNED_NFT_HOLDER)
                .to_string(),
            role: ShareRole::NftHolder,
            share_bps: config.nft_holder_bps,
            amount_lamports: nft_amount,
        });
    }

    let allocated: i64 = shares.iter().map(|s| s.amount_lamports).sum();
    let platform_amount = total - allocated;
    shares.push(NewRevenueShare {
        wallet_address: input.treasury_wallet.to_string(),
        role: ShareRole::Platform,
        share_bps: mul_div(platform_amount, BPS_DENOMINATOR, total),
        amount_lamports: platform_amount,
    });

    verify_contest_split(config, total, &shares)?;
    Ok(shares)
}

/// Checks a plan against the configuration.
///
/// Creator and NFT holder lines must match their share within
/// [`TOLERANCE_BPS`]; voters may receive less (rounding, or no votes) but never
/// more; the platform never receives less than its share. The plan must not
/// exceed the total.
pub fn verify_contest_split(
    config: &ShareConfig,
    total: i64,
    shares: &[NewRevenueShare],
) -> Result<(), ValidationError> {
    if shares.iter().any(|s| s.amount_lamports < 0) {
        return Err(ValidationError::InvalidFormat(
            "share amounts must not be negative".to_string(),
        ));
    }
    let distributed: i64 = shares.iter().map(|s| s.amount_lamports).sum();
    if distributed > total {
        return Err(ValidationError::InvalidFormat(format!(
            "distributed {distributed} lamports exceeds total {total}"
        )));
    }

    let role_total = |role: ShareRole| -> i64 {
        shares
            .iter()
            .filter(|s| s.role == role)
            .map(|s| s.amount_lamports)
            .sum()
    };
    // deviation * 10_000 compared against tolerance * total, both widened
    let deviation = |role: ShareRole| -> i128 {
        i128::from(role_total(role)) * i128::from(BPS_DENOMINATOR)
            - i128::from(config.bps_for(role)) * i128::from(total)
    };
    let tolerance = i128::from(TOLERANCE_BPS) * i128::from(total);

    for role in [ShareRole::Creator, ShareRole::NftHolder] {
        let present = shares.iter().any(|s| s.role == role);
        if present && deviation(role).abs() > tolerance {
            return Err(ValidationError::field(
                role.as_str(),
                "allocation deviates from configured share",
            ));
        }
    }
    if deviation(ShareRole::Voter) > tolerance {
        return Err(ValidationError::field(
            ShareRole::Voter.as_str(),
            "voters allocated more than their share",
        ));
    }
    if deviation(ShareRole::Platform) < -tolerance {
        return Err(ValidationError::field(
            ShareRole::Platform.as_str(),
            "platform allocated less than its share",
        ));
    }
    Ok(())
}

/// Parts of a released escrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoodsSplit {
    pub creator_amount: i64,
    pub voter_pool_amount: i64,
    pub platform_amount: i64,
}

impl GoodsSplit {
    #[must_use]
    pub fn total(&self) -> i64 {
        self.creator_amount + self.voter_pool_amount + self.platform_amount
    }
}

/// Splits an escrowed profit. Parts without a recipient fall to the platform.
#[must_use]
pub fn split_goods_revenue(
    config: &GoodsShareConfig,
    total_lamports: i64,
    has_creator: bool,
    has_voters: bool,
) -> GoodsSplit {
    let total = total_lamports.max(0);
    let creator_amount = if has_creator {
        apply_bps(total, config.creator_bps)
    } else {
        0
    };
    let voter_pool_amount = if has_voters {
        apply_bps(total, config.voter_pool_bps)
    } else {
        0
    };
    GoodsSplit {
        creator_amount,
        voter_pool_amount,
        platform_amount: total - creator_amount - voter_pool_amount,
    }
}

/// Profit portion of a payment: `sol * (retail - base) / retail`, floored.
///
/// Returns 0 when there is no margin.
#[must_use]
pub fn escrow_profit(sol_lamports: i64, retail_price_cents: i64, base_price_cents: i64) -> i64 {
    if sol_lamports <= 0 || retail_price_cents <= 0 || base_price_cents >= retail_price_cents {
        return 0;
    }
    let margin = retail_price_cents - base_price_cents.max(0);
    mul_div(sol_lamports, margin, retail_price_cents)
}

/// Cumulative entitlement of a voter in a reward pool.
#[must_use]
pub fn pool_entitlement(weight: i64, total_credited: i64, total_weight: i64) -> i64 {
    if weight <= 0 || total_credited <= 0 {
        return 0;
    }
    mul_div(weight, total_credited, total_weight)
}

/// What a voter can still claim given what they already claimed.
#[must_use]
pub fn claimable_amount(weight: i64, total_credited: i64, total_weight: i64, claimed: i64) -> i64 {
    (pool_entitlement(weight, total_credited, total_weight) - claimed).max(0)
}

/// Hex SHA-256 of a distribution plan, anchored on chain as a memo.
#[must_use]
pub fn distribution_digest(revenue_id: i64, shares: &[NewRevenueShare]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(revenue_id.to_be_bytes());
    for share in shares {
        hasher.update(share.role.as_str().as_bytes());
        hasher.update(share.wallet_address.as_bytes());
        hasher.update(share.amount_lamports.to_be_bytes());
    }
    hex::encode(hasher.finalize())
}
