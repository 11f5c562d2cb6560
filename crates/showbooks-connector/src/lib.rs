//! External-service clients for the showbooks reconciliation engine.
//!
//! The engine pushes purchase orders and detail items to a project-management
//! board (items and subitems) and bills to an accounting ledger. Both services
//! speak the same batch shape: a chunk of records in, one outcome per record
//! out, positionally aligned. This crate defines those traits and types plus
//! the chunked executor that submits a pass worth of records under bounded
//! concurrency with timeouts and transient-error retry.

pub mod batch;
pub mod error;
pub mod traits;
pub mod types;

pub use batch::{run_chunked, BatchPolicy, RetryPolicy};
pub use error::{ConnectorError, ConnectorResult};
pub use traits::{BoardClient, LedgerClient};
pub use types::{BoardItemKind, LedgerRecordKind, RecordOutcome, UpsertRecord};
