//! Voting rules: SAMU units, voting power, wallet checks and winner selection.

use std::borrow::Cow;

use super::types::Meme;

/// Decimals of the SAMU SPL token.
pub const SAMU_DECIMALS: u32 = 8;

pub const BASE_VOTING_POWER: u64 = 3;
pub const POWER_PER_STEP: u64 = 10;
/// Whole SAMU needed for each additional voting power step.
pub const SAMU_PER_POWER_STEP: u64 = 1_000_000;

/// Converts whole SAMU to raw on-chain units. `None` on overflow or negative input.
#[must_use]
pub fn samu_to_raw(whole: i64) -> Option<u64> {
    u64::try_from(whole)
        .ok()?
        .checked_mul(10_u64.pow(SAMU_DECIMALS))
}

/// Converts raw on-chain units to whole SAMU, dropping the fraction.
#[must_use]
pub fn raw_to_whole_samu(raw: u64) -> u64 {
    raw / 10_u64.pow(SAMU_DECIMALS)
}

/// `3 + 10 * floor(balance / 1_000_000)` for a balance in whole SAMU.
#[must_use]
pub fn voting_power(samu_balance: u64) -> u64 {
    BASE_VOTING_POWER.saturating_add((samu_balance / SAMU_PER_POWER_STEP).saturating_mul(POWER_PER_STEP))
}

/// A wallet is a base58 string decoding to a 32-byte public key.
#[must_use]
pub fn is_valid_wallet(address: &str) -> bool {
    matches!(bs58::decode(address).into_vec(), Ok(bytes) if bytes.len() == 32)
}

/// `validator` hook for wallet fields.
pub fn validate_wallet(address: &str) -> Result<(), validator::ValidationError> {
    if is_valid_wallet(address) {
        Ok(())
    } else {
        let mut err = validator::ValidationError::new("wallet");
        err.message = Some(Cow::from("Invalid Solana wallet address"));
        Err(err)
    }
}

/// Username given to auto-created profiles: `first8...last4`.
#[must_use]
pub fn default_username(wallet: &str) -> String {
    let chars: Vec<char> = wallet.chars().collect();
    if chars.len() <= 12 {
        return wallet.to_string();
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Meme with the most votes; ties go to the earliest submission.
#[must_use]
pub fn select_winner(memes: &[Meme]) -> Option<&Meme> {
    memes.iter().min_by(|a, b| {
        b.votes
            .cmp(&a.votes)
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    })
}
