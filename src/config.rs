//! Environment configuration.
//!
//! Values are read from the process environment (a `.env` file is loaded by
//! `main` through `dotenvy`). Secrets stay wrapped in [`SecretString`].

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::app::ServiceConfig;
use crate::domain::ConfigError;
use crate::domain::voting::is_valid_wallet;

pub const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:5000";
pub const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
pub const DEFAULT_SAMU_MINT: &str = "EHy2UQWKKVWYvMTzbEfYy1jvZD8VhRBUAvz3bnJ1GnuF";
pub const DEFAULT_TREASURY_WALLET: &str = "4WjMuna7iLjPE897m5fphErUt7AnSdjJTky1hyfZZaJk";
pub const DEFAULT_PRINTFUL_STORE_ID: &str = "17717241";
pub const DEFAULT_SCHEDULER_POLL_SECS: u64 = 60;

/// Print-on-demand provider credentials.
#[derive(Debug, Clone)]
pub struct PrintfulConfig {
    pub api_key: SecretString,
    pub store_id: String,
}

/// Contest scheduler settings.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub enabled: bool,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: SecretString,
    pub server_addr: SocketAddr,
    pub solana_rpc_url: String,
    pub issuer_private_key: Option<SecretString>,
    pub samu_token_mint: String,
    pub treasury_wallet: String,
    pub admin_emails: Vec<String>,
    pub printful: Option<PrintfulConfig>,
    pub printful_webhook_secret: Option<SecretString>,
    pub verify_onchain_payments: bool,
    pub scheduler: SchedulerSettings,
    pub log_json: bool,
}

impl AppConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which returns a variable's value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = get("DATABASE_URL")
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;

        let server_addr = parse_value(
            "SERVER_ADDR",
            get("SERVER_ADDR").unwrap_or_else(|| DEFAULT_SERVER_ADDR.to_string()),
        )?;

        let samu_token_mint =
            wallet_value("SAMU_TOKEN_MINT", get("SAMU_TOKEN_MINT"), DEFAULT_SAMU_MINT)?;
        let treasury_wallet = wallet_value(
            "TREASURY_WALLET_ADDRESS",
            get("TREASURY_WALLET_ADDRESS"),
            DEFAULT_TREASURY_WALLET,
        )?;

        let admin_emails = get("ADMIN_EMAILS")
            .map(|raw| {
                raw.split(',')
                    .map(|email| email.trim().to_lowercase())
                    .filter(|email| !email.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let printful = get("PRINTFUL_API_KEY").map(|key| PrintfulConfig {
            api_key: SecretString::from(key),
            store_id: get("PRINTFUL_STORE_ID")
                .unwrap_or_else(|| DEFAULT_PRINTFUL_STORE_ID.to_string()),
        });

        let poll_secs: u64 = match get("SCHEDULER_POLL_SECS") {
            Some(raw) => parse_value("SCHEDULER_POLL_SECS", raw)?,
            None => DEFAULT_SCHEDULER_POLL_SECS,
        };
        if poll_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "SCHEDULER_POLL_SECS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            database_url,
            server_addr,
            solana_rpc_url: get("SOLANA_RPC_URL").unwrap_or_else(|| DEFAULT_RPC_URL.to_string()),
            issuer_private_key: get("ISSUER_PRIVATE_KEY").map(SecretString::from),
            samu_token_mint,
            treasury_wallet,
            admin_emails,
            printful,
            printful_webhook_secret: get("PRINTFUL_WEBHOOK_SECRET").map(SecretString::from),
            verify_onchain_payments: bool_value(
                "VERIFY_ONCHAIN_PAYMENTS",
                get("VERIFY_ONCHAIN_PAYMENTS"),
                true,
            )?,
            scheduler: SchedulerSettings {
                enabled: bool_value("SCHEDULER_ENABLED", get("SCHEDULER_ENABLED"), true)?,
                poll_interval: Duration::from_secs(poll_secs),
            },
            log_json: bool_value("LOG_JSON", get("LOG_JSON"), false)?,
        })
    }

    /// Settings the application service needs.
    #[must_use]
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            samu_token_mint: self.samu_token_mint.clone(),
            treasury_wallet: self.treasury_wallet.clone(),
            verify_onchain_payments: self.verify_onchain_payments,
            admin_emails: self.admin_emails.clone(),
            webhook_secret: self.printful_webhook_secret.clone(),
            ..ServiceConfig::default()
        }
    }
}

fn parse_value<T>(key: &str, raw: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn bool_value(key: &str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("true" | "1" | "yes" | "on") => Ok(true),
        Some("false" | "0" | "no" | "off") => Ok(false),
        Some(other) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}

fn wallet_value(key: &str, raw: Option<String>, default: &str) -> Result<String, ConfigError> {
    let value = raw.unwrap_or_else(|| default.to_string());
    if !is_valid_wallet(&value) {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "not a base58 public key".to_string(),
        });
    }
    Ok(value)
}
