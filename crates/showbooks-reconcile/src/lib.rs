//! # Reconciliation Engine
//!
//! Turns parsed purchase-order-log batches into reconciled local state and
//! mirrors that state outward to the production board and the accounting
//! ledger.
//!
//! This crate provides:
//! - Batch-run claiming with one-active-run-per-source enforcement
//! - Four ordered reconciliation passes over a batch
//! - Fingerprint-based sync so unchanged rows never leave the building
//! - Per-record failure absorption into a run summary
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌─────────────────────────────────────────┐
//! │ ParsedBatch  │────►│          ReconciliationEngine           │
//! │ (ingestion)  │     │                                         │
//! └──────────────┘     │  1. contacts        (local only)        │
//!                      │  2. purchase orders ──► board items     │
//!                      │  3. detail items    ──► board subitems  │
//!                      │  4. ledger bills    ──► bills + lines   │
//!                      └──────────┬──────────────────┬───────────┘
//!                                 │                  │
//!                          ┌──────▼──────┐    ┌──────▼──────┐
//!                          │ LedgerStore │    │ Board and   │
//!                          │ (local db)  │    │ Ledger APIs │
//!                          └─────────────┘    └─────────────┘
//! ```
//!
//! Passes run strictly in order so each can resolve the natural-key
//! references the previous one established. Every pass persists locally
//! first; external calls happen afterwards in bounded, retried chunks, and a
//! record that fails outward keeps its local row and is retried next run.
//!
//! ## Example
//!
//! ```ignore
//! use showbooks_reconcile::{ParsedBatch, ReconcileConfig, ReconciliationEngine};
//!
//! let engine = ReconciliationEngine::new(store, board, ledger, ReconcileConfig::default());
//!
//! let run = store
//!     .create_run(CreateBatchRun {
//!         source: "po_log/2417.xlsx".into(),
//!         project_number: Some(2417),
//!     })
//!     .await?;
//!
//! let batch: ParsedBatch = serde_json::from_slice(&payload)?;
//! let summary = engine.run(run.id, &batch).await?;
//! println!("{} purchase orders created", summary.purchase_orders.created);
//! ```

pub mod batch_input;
pub mod config;
pub mod engine;
pub mod error;
pub mod fingerprint;
mod passes;
pub mod summary;
pub mod tracker;

pub use batch_input::{ContactRecord, DetailItemRecord, ParsedBatch, PurchaseOrderRecord};
pub use config::ReconcileConfig;
pub use engine::ReconciliationEngine;
pub use error::EngineError;
pub use fingerprint::fingerprint;
pub use summary::{EntityCounts, EntityKind, FailedRecord, FailureKind, RunSummary};
pub use tracker::RunTracker;
