//! Test utilities and mock implementations.
//!
//! This module provides reusable mock implementations of domain traits
//! for use in unit and integration tests.

pub mod mocks;

pub use mocks::{MockBlockchainClient, MockDatabaseClient, MockFulfillmentClient};

/// Valid base58 wallets for tests.
pub mod wallets {
    pub const TREASURY: &str = "4WjMuna7iLjPE897m5fphErUt7AnSdjJTky1hyfZZaJk";
    pub const ALICE: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";
    pub const BOB: &str = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";
    pub const CAROL: &str = "HN7cABqLq46Es1jh92dQQisAq662SmxELLLsHHe4YWrH";
}
