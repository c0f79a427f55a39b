//! Blockchain client implementations.

pub mod signer;
pub mod solana;

pub use signer::{LocalSigner, signing_key_from_base58};
pub use solana::{RpcBlockchainClient, RpcClientConfig};
