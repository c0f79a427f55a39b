//! PostgreSQL adapter implementing every repository trait of the domain layer.

pub mod postgres;

pub use postgres::{PostgresClient, PostgresConfig};
