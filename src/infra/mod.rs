//! Infrastructure layer implementations.

pub mod blockchain;
pub mod database;
pub mod fulfillment;
pub mod observability;

pub use blockchain::{LocalSigner, RpcBlockchainClient, RpcClientConfig, signing_key_from_base58};
pub use database::{PostgresClient, PostgresConfig};
pub use fulfillment::PrintfulClient;
pub use observability::{PrometheusHandle, init_metrics, init_tracing};
