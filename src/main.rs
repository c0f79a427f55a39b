use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use secrecy::ExposeSecret;
use tracing::{info, warn};

use samu_contest::api::{RateLimitConfig, create_router_with_rate_limit};
use samu_contest::app::{AppService, AppState, WorkerConfig, spawn_scheduler};
use samu_contest::config::AppConfig;
use samu_contest::domain::{FulfillmentClient, TransactionSigner};
use samu_contest::infra::{
    LocalSigner, PostgresClient, PrintfulClient, RpcBlockchainClient, init_metrics, init_tracing,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let config = AppConfig::from_env().context("invalid configuration")?;
    init_tracing(config.log_json);

    let metrics = match init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Metrics recorder not installed");
            None
        }
    };

    let db = PostgresClient::with_defaults(config.database_url.expose_secret()).await?;
    db.run_migrations().await?;

    let signer: Arc<dyn TransactionSigner> = match &config.issuer_private_key {
        Some(secret) => Arc::new(LocalSigner::new(secret.clone()).context("invalid ISSUER_PRIVATE_KEY")?),
        None => {
            warn!("ISSUER_PRIVATE_KEY not set, generating ephemeral keypair");
            Arc::new(LocalSigner::generate())
        }
    };
    info!(public_key = %signer.public_key(), "Issuer key loaded");

    let blockchain = RpcBlockchainClient::with_defaults(&config.solana_rpc_url, signer)?;

    let mut service = AppService::new(Arc::new(db), Arc::new(blockchain))
        .with_config(config.service_config());
    match &config.printful {
        Some(printful) => {
            let client: Arc<dyn FulfillmentClient> = Arc::new(PrintfulClient::new(printful)?);
            service = service.with_fulfillment(client);
        }
        None => info!("PRINTFUL_API_KEY not set, orders stay local"),
    }
    let service = Arc::new(service);

    let (scheduler, scheduler_shutdown) =
        spawn_scheduler(Arc::clone(&service), WorkerConfig::from(&config.scheduler));

    let mut state = AppState::with_service(service);
    if let Some(handle) = metrics {
        state = state.with_metrics(handle);
    }
    let router = create_router_with_rate_limit(Arc::new(state), RateLimitConfig::from_env());

    let listener = tokio::net::TcpListener::bind(config.server_addr).await?;
    info!(addr = %config.server_addr, "Server starting");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Stopping contest scheduler");
    let _ = scheduler_shutdown.send(true);
    if let Err(e) = scheduler.await {
        warn!(error = %e, "Contest scheduler task failed");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
    }
    info!("Shutdown signal received");
}
