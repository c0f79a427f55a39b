//! Application layer containing business logic and shared state.

mod commerce;
mod contests;
mod rewards;
pub mod service;
pub mod state;
pub mod worker;

pub use contests::SchedulerTick;
pub use rewards::RECENT_DISTRIBUTIONS;
pub use service::{AppService, MAX_PAGE_LIMIT, ServiceConfig};
pub use state::AppState;
pub use worker::{ContestScheduler, WorkerConfig, spawn_scheduler};
