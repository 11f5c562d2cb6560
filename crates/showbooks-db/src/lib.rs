//! # showbooks-db
//!
//! Persistence for the showbooks reconciliation engine: the Postgres schema,
//! the row models with their upsert and merge semantics, and the
//! [`LedgerStore`] trait the engine writes through.
//!
//! Three store implementations are provided:
//! - [`PgLedgerStore`]: the production store over a connection pool
//! - [`MemoryLedgerStore`]: hash maps behind a mutex, for tests
//! - [`AuditedStore`]: a decorator appending an audit event per effective write

pub mod audit;
pub mod error;
pub mod memory;
pub mod migrations;
pub mod models;
pub mod pg;
pub mod pool;
pub mod store;

pub use audit::AuditedStore;
pub use error::DbError;
pub use memory::MemoryLedgerStore;
pub use migrations::run_migrations;
pub use pg::PgLedgerStore;
pub use pool::DbPool;
pub use store::{LedgerStore, Upserted, WriteOutcome};
