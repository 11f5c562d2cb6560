//! The four reconciliation passes, one module each.
//!
//! Every pass follows the same shape: upsert the batch's effective records
//! locally, decide per row whether the external copy is missing or stale,
//! submit the stale set in bounded chunks, then write back the returned ids
//! and fingerprints. Only rows whose outward field set changed since the last
//! recorded sync are submitted at all.

mod contacts;
mod detail_items;
mod ledger_bills;
mod purchase_orders;

use uuid::Uuid;

/// Bookkeeping for one record queued for external sync, positionally aligned
/// with the submitted [`UpsertRecord`](showbooks_connector::UpsertRecord)s.
pub(crate) struct QueuedSync {
    /// Local row id to write the returned external id back to.
    pub(crate) record_id: Uuid,
    /// Reference string for logs and failure summaries.
    pub(crate) key: String,
    /// Fingerprint of the submitted field set, recorded on success.
    pub(crate) fingerprint: String,
}
