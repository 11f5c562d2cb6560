//! Shared test support: logging setup, scripted external clients, and batch
//! record builders.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use showbooks_connector::{
    BoardClient, BoardItemKind, ConnectorResult, LedgerClient, LedgerRecordKind, RecordOutcome,
    UpsertRecord,
};
use showbooks_db::models::CreateBatchRun;
use showbooks_db::{LedgerStore, MemoryLedgerStore};
use showbooks_reconcile::{
    ContactRecord, DetailItemRecord, PurchaseOrderRecord, ReconcileConfig, ReconciliationEngine,
};

static INIT: Once = Once::new();

/// Initialize test logging once per binary. Controlled by `RUST_LOG`; silent
/// when unset.
pub fn init_test_logging() {
    INIT.call_once(|| {
        if std::env::var("RUST_LOG").is_ok() {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .with_test_writer()
                .try_init();
        }
    });
}

/// Board double. Assigns `item-N`/`subitem-N` ids on creation, echoes ids on
/// update, and rejects records whose key was scripted to fail.
pub struct MockBoard {
    calls: Mutex<Vec<(BoardItemKind, Vec<UpsertRecord>)>>,
    fail_keys: Mutex<HashSet<String>>,
    next_id: AtomicU32,
}

impl MockBoard {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_keys: Mutex::new(HashSet::new()),
            next_id: AtomicU32::new(1),
        }
    }

    /// Script a per-record rejection for the given reference.
    pub fn fail_key(&self, key: &str) {
        self.fail_keys.lock().unwrap().insert(key.to_string());
    }

    pub fn clear_failures(&self) {
        self.fail_keys.lock().unwrap().clear();
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// All records submitted for a kind, flattened across calls.
    pub fn records_of(&self, kind: BoardItemKind) -> Vec<UpsertRecord> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .flat_map(|(_, records)| records.clone())
            .collect()
    }
}

#[async_trait]
impl BoardClient for MockBoard {
    async fn create_or_update(
        &self,
        kind: BoardItemKind,
        records: &[UpsertRecord],
    ) -> ConnectorResult<Vec<RecordOutcome>> {
        self.calls.lock().unwrap().push((kind, records.to_vec()));
        let fail_keys = self.fail_keys.lock().unwrap();
        Ok(records
            .iter()
            .map(|record| {
                if fail_keys.contains(&record.key) {
                    RecordOutcome::failure("rejected by test double")
                } else if let Some(id) = &record.external_id {
                    RecordOutcome::success(id.clone())
                } else {
                    let n = self.next_id.fetch_add(1, Ordering::SeqCst);
                    RecordOutcome::success(format!("{kind}-{n}"))
                }
            })
            .collect())
    }
}

/// Ledger double, same contract as [`MockBoard`] with `bill-N`/`bill_line-N`
/// ids.
pub struct MockLedger {
    calls: Mutex<Vec<(LedgerRecordKind, Vec<UpsertRecord>)>>,
    fail_keys: Mutex<HashSet<String>>,
    next_id: AtomicU32,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_keys: Mutex::new(HashSet::new()),
            next_id: AtomicU32::new(1),
        }
    }

    #[allow(dead_code)]
    pub fn fail_key(&self, key: &str) {
        self.fail_keys.lock().unwrap().insert(key.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn records_of(&self, kind: LedgerRecordKind) -> Vec<UpsertRecord> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .flat_map(|(_, records)| records.clone())
            .collect()
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn create_or_update(
        &self,
        kind: LedgerRecordKind,
        records: &[UpsertRecord],
    ) -> ConnectorResult<Vec<RecordOutcome>> {
        self.calls.lock().unwrap().push((kind, records.to_vec()));
        let fail_keys = self.fail_keys.lock().unwrap();
        Ok(records
            .iter()
            .map(|record| {
                if fail_keys.contains(&record.key) {
                    RecordOutcome::failure("rejected by test double")
                } else if let Some(id) = &record.external_id {
                    RecordOutcome::success(id.clone())
                } else {
                    let n = self.next_id.fetch_add(1, Ordering::SeqCst);
                    RecordOutcome::success(format!("{kind}-{n}"))
                }
            })
            .collect())
    }
}

/// An engine wired to an in-memory store and scripted externals.
pub struct Harness {
    pub store: Arc<MemoryLedgerStore>,
    pub board: Arc<MockBoard>,
    pub ledger: Arc<MockLedger>,
    pub engine: ReconciliationEngine,
}

pub fn harness() -> Harness {
    init_test_logging();
    let store = Arc::new(MemoryLedgerStore::new());
    let board = Arc::new(MockBoard::new());
    let ledger = Arc::new(MockLedger::new());
    let engine = ReconciliationEngine::new(
        store.clone(),
        board.clone(),
        ledger.clone(),
        ReconcileConfig::default(),
    );
    Harness {
        store,
        board,
        ledger,
        engine,
    }
}

impl Harness {
    /// Register a PENDING run for a source and return its id.
    pub async fn register_run(&self, source: &str) -> Uuid {
        self.store
            .create_run(CreateBatchRun {
                source: source.to_string(),
                project_number: None,
            })
            .await
            .unwrap()
            .id
    }
}

pub fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap()
}

pub fn day(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn contact(name: &str) -> ContactRecord {
    ContactRecord {
        name: name.to_string(),
        ..ContactRecord::default()
    }
}

pub fn purchase_order(project: i32, po: i32, vendor: &str) -> PurchaseOrderRecord {
    PurchaseOrderRecord {
        project_number: project,
        po_number: po,
        vendor_name: Some(vendor.to_string()),
        description: Some(format!("{vendor} services")),
        po_type: Some("STANDARD".to_string()),
        producer: None,
        folder_link: None,
    }
}

pub fn detail_item(project: i32, po: i32, detail: i32, line: i32, rate: &str) -> DetailItemRecord {
    DetailItemRecord {
        project_number: project,
        po_number: po,
        detail_number: detail,
        line_number: line,
        account_code: Some("5100".to_string()),
        vendor: None,
        payment_type: Some("INV".to_string()),
        description: None,
        state: None,
        transaction_date: None,
        due_date: None,
        rate: dec(rate),
        quantity: Decimal::ONE,
        overtime: None,
        fringes: None,
    }
}
