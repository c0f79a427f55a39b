//! SAMU meme contest backend
//!
//! Contests where holders vote for memes with SAMU tokens, print-on-demand goods
//! paid in SOL with escrowed profit, and revenue sharing between meme creators,
//! voters and the platform.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                   API Layer                  │
//! │  HTTP handlers, routing, admin guard, limits │
//! ├─────────────────────────────────────────────┤
//! │               Application Layer              │
//! │  Contests, votes, goods, escrow, rewards,    │
//! │  contest scheduler                           │
//! ├─────────────────────────────────────────────┤
//! │                 Domain Layer                 │
//! │  Types, traits, errors, split arithmetic     │
//! ├─────────────────────────────────────────────┤
//! │             Infrastructure Layer             │
//! │  PostgreSQL, Solana RPC, Printful, metrics   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Every external system sits behind a trait in [`domain::traits`] and is
//! injected as `Arc<dyn Trait>`, so the application layer runs unchanged
//! against the in-memory mocks of `test_utils`.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use samu_contest::api::create_router;
//! use samu_contest::app::AppState;
//! use samu_contest::infra::{LocalSigner, PostgresClient, RpcBlockchainClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = Arc::new(PostgresClient::with_defaults(&database_url).await?);
//!     let signer = Arc::new(LocalSigner::generate());
//!     let blockchain = Arc::new(RpcBlockchainClient::with_defaults(&rpc_url, signer)?);
//!
//!     let state = Arc::new(AppState::new(db, blockchain));
//!     let router = create_router(state);
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod app;
pub mod config;
pub mod domain;
pub mod infra;

// Test utilities are available in tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
