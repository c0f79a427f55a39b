//! Background worker that starts and ends contests on schedule.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{error, info};

use crate::config::{DEFAULT_SCHEDULER_POLL_SECS, SchedulerSettings};

use super::service::AppService;

/// Configuration for the contest scheduler
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Interval between scheduler passes
    pub poll_interval: Duration,
    /// Whether the worker is enabled
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_SCHEDULER_POLL_SECS),
            enabled: true,
        }
    }
}

impl From<&SchedulerSettings> for WorkerConfig {
    fn from(settings: &SchedulerSettings) -> Self {
        Self {
            poll_interval: settings.poll_interval,
            enabled: settings.enabled,
        }
    }
}

/// Polls contest windows and moves contests through their lifecycle
pub struct ContestScheduler {
    service: Arc<AppService>,
    config: WorkerConfig,
    shutdown_rx: watch::Receiver<bool>,
}

impl ContestScheduler {
    pub fn new(
        service: Arc<AppService>,
        config: WorkerConfig,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            service,
            config,
            shutdown_rx,
        }
    }

    /// Run the scheduler loop until shutdown is signalled
    pub async fn run(mut self) {
        if !self.config.enabled {
            info!("Contest scheduler is disabled");
            return;
        }

        info!(
            poll_interval = ?self.config.poll_interval,
            "Starting contest scheduler"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {
                    self.tick().await;
                }
                result = self.shutdown_rx.changed() => {
                    if result.is_err() || *self.shutdown_rx.borrow() {
                        info!("Contest scheduler shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn tick(&self) {
        match self.service.run_scheduler_tick(Utc::now()).await {
            Ok(tick) if tick.started.is_empty() && tick.ended.is_empty() && tick.failed == 0 => {}
            Ok(tick) => {
                info!(
                    started = ?tick.started,
                    ended = ?tick.ended,
                    failed = tick.failed,
                    "Contest scheduler pass"
                );
            }
            Err(e) => {
                error!(error = ?e, "Contest scheduler pass failed");
            }
        }
    }
}

/// Spawn the contest scheduler as a tokio task
pub fn spawn_scheduler(
    service: Arc<AppService>,
    config: WorkerConfig,
) -> (tokio::task::JoinHandle<()>, watch::Sender<bool>) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = ContestScheduler::new(service, config, shutdown_rx);
    let handle = tokio::spawn(worker.run());
    (handle, shutdown_tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ContestStatus, CreateContestRequest};
    use crate::test_utils::{MockBlockchainClient, MockDatabaseClient};

    fn create_test_service() -> Arc<AppService> {
        let db = Arc::new(MockDatabaseClient::new());
        let bc = Arc::new(MockBlockchainClient::new());
        Arc::new(AppService::new(db, bc))
    }

    #[test]
    fn test_worker_config_default() {
        let config = WorkerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert!(config.enabled);
    }

    #[test]
    fn test_worker_config_from_settings() {
        let settings = SchedulerSettings {
            enabled: false,
            poll_interval: Duration::from_secs(5),
        };
        let config = WorkerConfig::from(&settings);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert!(!config.enabled);
    }

    #[tokio::test]
    async fn test_worker_disabled_returns_immediately() {
        let service = create_test_service();
        let config = WorkerConfig {
            poll_interval: Duration::from_millis(100),
            enabled: false,
        };
        let (_, shutdown_rx) = watch::channel(false);
        let worker = ContestScheduler::new(service, config, shutdown_rx);

        let start = std::time::Instant::now();
        worker.run().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_worker_shutdown_via_channel() {
        let service = create_test_service();
        let config = WorkerConfig {
            poll_interval: Duration::from_secs(60),
            enabled: true,
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = ContestScheduler::new(service, config, shutdown_rx);

        let handle = tokio::spawn(worker.run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(2), handle).await;
        assert!(result.is_ok(), "Scheduler should shut down within 2 seconds");
    }

    #[tokio::test]
    async fn test_worker_stops_when_sender_dropped() {
        let service = create_test_service();
        let (handle, shutdown_tx) = spawn_scheduler(
            service,
            WorkerConfig {
                poll_interval: Duration::from_secs(60),
                enabled: true,
            },
        );

        drop(shutdown_tx);
        let result = tokio::time::timeout(Duration::from_secs(2), handle).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_worker_starts_due_contest() {
        let service = create_test_service();
        let now = Utc::now();
        let contest = service
            .create_contest(&CreateContestRequest::new(
                "Due",
                now - chrono::Duration::minutes(1),
                now + chrono::Duration::hours(1),
            ))
            .await
            .unwrap();

        let (handle, shutdown_tx) = spawn_scheduler(
            Arc::clone(&service),
            WorkerConfig {
                poll_interval: Duration::from_millis(10),
                enabled: true,
            },
        );

        let mut status = ContestStatus::Draft;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            status = service.get_contest(contest.id).await.unwrap().status;
            if status == ContestStatus::Active {
                break;
            }
        }
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(status, ContestStatus::Active);
    }

    #[tokio::test]
    async fn test_spawn_scheduler_returns_handles() {
        let service = create_test_service();
        let config = WorkerConfig {
            poll_interval: Duration::from_secs(60),
            enabled: false,
        };

        let (handle, shutdown_tx) = spawn_scheduler(service, config);

        let result = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(result.is_ok());
        let _ = shutdown_tx.send(true);
    }
}
