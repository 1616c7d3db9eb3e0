//! Postgres persistence for the card registry.
//!
//! Every model exposes `sqlx::Executor`-generic methods, so a caller can pass
//! either the pool (auto-commit) or an open transaction and compose
//! multi-step atomic operations: the mailbox poller persists one message with
//! all its attachment batches and person records in a single transaction, and
//! the outbound report selects and marks in one statement.

pub mod error;
pub mod migrations;
pub mod models;
pub mod pool;

pub use error::DbError;
pub use migrations::run_migrations;
pub use pool::{connect, PoolConfig};
