//! Domain layer containing core business types, traits, rules and error definitions.

pub mod catalog;
pub mod error;
pub mod revenue;
pub mod traits;
pub mod types;
pub mod voting;
pub mod webhook;

pub use error::{
    AppError, BlockchainError, ConfigError, DatabaseError, ExternalServiceError, ValidationError,
};
pub use revenue::{GoodsShareConfig, ShareConfig};
pub use traits::{
    BlockchainClient, CommerceRepository, ContestRepository, DatabaseClient, FulfillmentClient,
    MemeRepository, RevenueRepository, TransactionSigner, UserRepository, VoteRepository,
};
pub use types::*;
