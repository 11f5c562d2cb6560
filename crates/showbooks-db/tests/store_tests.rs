//! Behavioural tests for the store layer, run against the in-memory store.
//!
//! The merge and derivation semantics live on the model types, so what is
//! exercised here holds for the Postgres store as well.

mod common;

use rust_decimal::Decimal;
use showbooks_core::{DetailKey, ExternalId, PoKey};
use showbooks_db::models::{
    AuditOperation, BatchRunStatus, ContactStatus, CreateBatchRun, DetailItemState, UpsertBillLine,
    UpsertContact, UpsertDetailItem, UpsertLedgerBill, UpsertPurchaseOrder,
};
use showbooks_db::{AuditedStore, LedgerStore, MemoryLedgerStore, WriteOutcome};
use uuid::Uuid;

fn contact(name: &str) -> UpsertContact {
    UpsertContact {
        name: name.to_string(),
        ..UpsertContact::default()
    }
}

fn purchase_order(key: PoKey, project_id: Uuid) -> UpsertPurchaseOrder {
    UpsertPurchaseOrder {
        key,
        project_id,
        vendor_name: Some("Acme Films".to_string()),
        description: Some("grip rental".to_string()),
        po_type: None,
        producer: None,
        folder_link: None,
        contact_id: None,
    }
}

fn detail(key: DetailKey, purchase_order_id: Option<Uuid>, rate: Decimal) -> UpsertDetailItem {
    UpsertDetailItem {
        key,
        purchase_order_id,
        account_code: Some("5020".to_string()),
        vendor: Some("Acme Films".to_string()),
        payment_type: Some("INV".to_string()),
        description: None,
        state: DetailItemState::Pending,
        transaction_date: None,
        due_date: None,
        rate,
        quantity: Decimal::ONE,
        overtime: None,
        fringes: None,
    }
}

#[tokio::test]
async fn contact_upsert_creates_then_merges_then_settles() {
    common::init_test_logging();
    let store = MemoryLedgerStore::new();

    let first = store.upsert_contact(contact("Acme Films")).await.unwrap();
    assert_eq!(first.outcome, WriteOutcome::Created);
    assert_eq!(first.record.status, ContactStatus::Pending);

    let mut richer = contact("Acme Films");
    richer.email = Some("ap@acmefilms.test".to_string());
    richer.status = Some(ContactStatus::Approved);
    let second = store.upsert_contact(richer.clone()).await.unwrap();
    assert_eq!(second.outcome, WriteOutcome::Updated);
    assert_eq!(second.record.id, first.record.id);
    assert_eq!(second.record.email.as_deref(), Some("ap@acmefilms.test"));
    assert_eq!(second.record.status, ContactStatus::Approved);

    let third = store.upsert_contact(richer).await.unwrap();
    assert_eq!(third.outcome, WriteOutcome::Unchanged);

    let found = store.find_contact_by_name("Acme Films").await.unwrap();
    assert_eq!(found.map(|c| c.id), Some(first.record.id));
}

#[tokio::test]
async fn contact_external_ids_are_write_once() {
    common::init_test_logging();
    let store = MemoryLedgerStore::new();

    let mut input = contact("Acme Films");
    input.board_item_id = Some("board-1".to_string());
    store.upsert_contact(input).await.unwrap();

    let mut replay = contact("Acme Films");
    replay.board_item_id = Some("board-2".to_string());
    let upserted = store.upsert_contact(replay).await.unwrap();
    assert_eq!(upserted.outcome, WriteOutcome::Unchanged);
    assert_eq!(upserted.record.board_item_id.as_deref(), Some("board-1"));
}

#[tokio::test]
async fn ensure_project_creates_a_placeholder_once() {
    common::init_test_logging();
    let store = MemoryLedgerStore::new();

    let first = store.ensure_project(2417, "2417_untitled").await.unwrap();
    assert_eq!(first.outcome, WriteOutcome::Created);
    assert_eq!(first.record.name, "2417_untitled");

    let second = store.ensure_project(2417, "2417_untitled").await.unwrap();
    assert_eq!(second.outcome, WriteOutcome::Unchanged);
    assert_eq!(second.record.id, first.record.id);
}

#[tokio::test]
async fn recompute_total_sums_only_linked_detail_items() {
    common::init_test_logging();
    let store = MemoryLedgerStore::new();

    let project = store.ensure_project(2417, "2417_untitled").await.unwrap();
    let key = PoKey::new(2417, 5);
    let po = store
        .upsert_purchase_order(purchase_order(key, project.record.id))
        .await
        .unwrap();
    assert_eq!(po.record.amount_total, Decimal::ZERO);

    let po_id = po.record.id;
    store
        .upsert_detail_item(detail(
            DetailKey::new(2417, 5, 1, 1),
            Some(po_id),
            Decimal::new(10000, 2),
        ))
        .await
        .unwrap();
    store
        .upsert_detail_item(detail(
            DetailKey::new(2417, 5, 2, 1),
            Some(po_id),
            Decimal::new(5050, 2),
        ))
        .await
        .unwrap();
    // orphan line: same log, parent never resolved, must not count
    store
        .upsert_detail_item(detail(
            DetailKey::new(2417, 99, 1, 1),
            None,
            Decimal::new(99900, 2),
        ))
        .await
        .unwrap();

    let recomputed = store.recompute_po_total(key).await.unwrap().unwrap();
    assert_eq!(recomputed.amount_total, Decimal::new(15050, 2));

    assert!(store
        .recompute_po_total(PoKey::new(9999, 1))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn record_sync_keeps_the_first_external_id_and_moves_the_fingerprint() {
    common::init_test_logging();
    let store = MemoryLedgerStore::new();

    let project = store.ensure_project(2417, "2417_untitled").await.unwrap();
    let po = store
        .upsert_purchase_order(purchase_order(PoKey::new(2417, 5), project.record.id))
        .await
        .unwrap();

    let first = store
        .record_po_sync(po.record.id, &ExternalId::from("board-10"), "fp-1")
        .await
        .unwrap();
    assert_eq!(first.board_item_id.as_deref(), Some("board-10"));
    assert_eq!(first.synced_fingerprint.as_deref(), Some("fp-1"));

    let second = store
        .record_po_sync(po.record.id, &ExternalId::from("board-11"), "fp-2")
        .await
        .unwrap();
    assert_eq!(second.board_item_id.as_deref(), Some("board-10"));
    assert_eq!(second.synced_fingerprint.as_deref(), Some("fp-2"));

    let missing = store
        .record_po_sync(Uuid::new_v4(), &ExternalId::from("board-12"), "fp-3")
        .await;
    assert!(missing.is_err());
}

#[tokio::test]
async fn detail_sync_stamps_the_parent_board_item_once() {
    common::init_test_logging();
    let store = MemoryLedgerStore::new();

    let item = store
        .upsert_detail_item(detail(DetailKey::new(2417, 5, 1, 1), None, Decimal::ONE))
        .await
        .unwrap();

    let synced = store
        .record_detail_sync(
            item.record.id,
            &ExternalId::from("subitem-1"),
            &ExternalId::from("item-1"),
            "fp-1",
        )
        .await
        .unwrap();
    assert_eq!(synced.board_item_id.as_deref(), Some("subitem-1"));
    assert_eq!(synced.parent_board_id.as_deref(), Some("item-1"));

    // a re-sync moves the fingerprint but never the identities
    let resynced = store
        .record_detail_sync(
            item.record.id,
            &ExternalId::from("subitem-2"),
            &ExternalId::from("item-2"),
            "fp-2",
        )
        .await
        .unwrap();
    assert_eq!(resynced.board_item_id.as_deref(), Some("subitem-1"));
    assert_eq!(resynced.parent_board_id.as_deref(), Some("item-1"));
    assert_eq!(resynced.synced_fingerprint.as_deref(), Some("fp-2"));
}

#[tokio::test]
async fn bill_line_sync_stamps_the_originating_detail_item() {
    common::init_test_logging();
    let store = MemoryLedgerStore::new();

    let key = DetailKey::new(2417, 5, 1, 1);
    let item = store
        .upsert_detail_item(detail(key, None, Decimal::new(10000, 2)))
        .await
        .unwrap();

    let bill = store
        .upsert_ledger_bill(UpsertLedgerBill {
            key: key.bill_key(),
            status: None,
            transaction_date: None,
            due_date: None,
            contact_ledger_id: None,
            link: None,
        })
        .await
        .unwrap();
    let line = store
        .upsert_bill_line(UpsertBillLine {
            key,
            bill_id: bill.record.id,
            description: None,
            account_code: Some("5020".to_string()),
            quantity: Decimal::ONE,
            unit_amount: Decimal::new(10000, 2),
            line_amount: Decimal::new(10000, 2),
        })
        .await
        .unwrap();

    store
        .record_bill_line_sync(line.record.id, &ExternalId::from("line-9"), "fp-1")
        .await
        .unwrap();

    let items = store.list_detail_items(key.po_key()).await.unwrap();
    assert_eq!(items[0].id, item.record.id);
    assert_eq!(items[0].ledger_entry_id.as_deref(), Some("line-9"));
}

#[tokio::test]
async fn detail_items_list_in_detail_then_line_order() {
    common::init_test_logging();
    let store = MemoryLedgerStore::new();

    let po_id = Some(Uuid::new_v4());
    for (d, l) in [(2, 1), (1, 2), (1, 1)] {
        store
            .upsert_detail_item(detail(
                DetailKey::new(2417, 5, d, l),
                po_id,
                Decimal::ONE,
            ))
            .await
            .unwrap();
    }

    let items = store.list_detail_items(PoKey::new(2417, 5)).await.unwrap();
    let order: Vec<(i32, i32)> = items
        .iter()
        .map(|i| (i.detail_number, i.line_number))
        .collect();
    assert_eq!(order, vec![(1, 1), (1, 2), (2, 1)]);
}

#[tokio::test]
async fn run_transitions_are_compare_and_set() {
    common::init_test_logging();
    let store = MemoryLedgerStore::new();

    let run = store
        .create_run(CreateBatchRun {
            source: "board-8821".to_string(),
            project_number: Some(2417),
        })
        .await
        .unwrap();
    assert_eq!(run.status, BatchRunStatus::Pending);

    let started = store.begin_run(run.id).await.unwrap().unwrap();
    assert_eq!(started.status, BatchRunStatus::Started);
    assert!(started.started_at.is_some());

    // a second begin loses the race
    assert!(store.begin_run(run.id).await.unwrap().is_none());

    let completed = store.complete_run(run.id).await.unwrap().unwrap();
    assert_eq!(completed.status, BatchRunStatus::Completed);
    assert!(completed.finished_at.is_some());

    // terminal states never transition again
    assert!(store.complete_run(run.id).await.unwrap().is_none());
    assert!(store.fail_run(run.id, "late").await.unwrap().is_none());
}

#[tokio::test]
async fn fail_requires_a_started_run() {
    common::init_test_logging();
    let store = MemoryLedgerStore::new();

    let run = store
        .create_run(CreateBatchRun {
            source: "board-8821".to_string(),
            project_number: None,
        })
        .await
        .unwrap();

    // still pending
    assert!(store.fail_run(run.id, "too early").await.unwrap().is_none());

    store.begin_run(run.id).await.unwrap().unwrap();
    let failed = store.fail_run(run.id, "source unreachable").await.unwrap().unwrap();
    assert_eq!(failed.status, BatchRunStatus::Failed);
    assert_eq!(failed.error_message.as_deref(), Some("source unreachable"));
}

#[tokio::test]
async fn started_run_is_found_by_source() {
    common::init_test_logging();
    let store = MemoryLedgerStore::new();

    let run = store
        .create_run(CreateBatchRun {
            source: "board-8821".to_string(),
            project_number: None,
        })
        .await
        .unwrap();
    assert!(store
        .find_started_run_for_source("board-8821")
        .await
        .unwrap()
        .is_none());

    store.begin_run(run.id).await.unwrap().unwrap();
    let found = store
        .find_started_run_for_source("board-8821")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, run.id);

    assert!(store
        .find_started_run_for_source("board-other")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn runs_list_with_project_and_status_filters() {
    common::init_test_logging();
    let store = MemoryLedgerStore::new();

    let first = store
        .create_run(CreateBatchRun {
            source: "board-8821".to_string(),
            project_number: Some(2417),
        })
        .await
        .unwrap();
    let second = store
        .create_run(CreateBatchRun {
            source: "board-8822".to_string(),
            project_number: Some(2418),
        })
        .await
        .unwrap();
    store.begin_run(second.id).await.unwrap().unwrap();

    let all = store.list_runs(None, None, 10).await.unwrap();
    assert_eq!(all.len(), 2);

    let for_project = store.list_runs(Some(2417), None, 10).await.unwrap();
    let ids: Vec<Uuid> = for_project.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![first.id]);

    let started = store
        .list_runs(None, Some(BatchRunStatus::Started), 10)
        .await
        .unwrap();
    let ids: Vec<Uuid> = started.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![second.id]);

    assert!(store
        .list_runs(Some(2417), Some(BatchRunStatus::Started), 10)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn audited_store_records_only_effective_writes() {
    common::init_test_logging();
    let store = AuditedStore::new(MemoryLedgerStore::new());

    let upserted = store.upsert_contact(contact("Acme Films")).await.unwrap();
    // identical replay writes nothing and leaves no trace
    store.upsert_contact(contact("Acme Films")).await.unwrap();

    let events = store.list_audit_events(10).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].operation, AuditOperation::Insert);
    assert_eq!(events[0].table_name, "contact");
    assert_eq!(events[0].record_id, upserted.record.id);

    let mut richer = contact("Acme Films");
    richer.email = Some("ap@acmefilms.test".to_string());
    store.upsert_contact(richer).await.unwrap();

    let events = store.list_audit_events(10).await.unwrap();
    assert_eq!(events.len(), 2);
    // newest first
    assert_eq!(events[0].operation, AuditOperation::Update);
}

#[tokio::test]
async fn audited_store_records_syncs_and_run_transitions() {
    common::init_test_logging();
    let store = AuditedStore::new(MemoryLedgerStore::new());

    let project = store.ensure_project(2417, "2417_untitled").await.unwrap();
    let po = store
        .upsert_purchase_order(purchase_order(PoKey::new(2417, 5), project.record.id))
        .await
        .unwrap();
    store
        .record_po_sync(po.record.id, &ExternalId::from("board-10"), "fp-1")
        .await
        .unwrap();

    let run = store
        .create_run(CreateBatchRun {
            source: "board-8821".to_string(),
            project_number: Some(2417),
        })
        .await
        .unwrap();
    store.begin_run(run.id).await.unwrap().unwrap();
    store.complete_run(run.id).await.unwrap().unwrap();
    // a losing CAS leaves no trace
    store.complete_run(run.id).await.unwrap();

    let events = store.list_audit_events(20).await.unwrap();
    // project insert, po insert, po sync update, run insert, run started, run completed
    assert_eq!(events.len(), 6);
    assert!(events
        .iter()
        .any(|e| e.table_name == "purchase_order"
            && e.message.as_deref() == Some("synced to board item board-10")));
    assert!(events
        .iter()
        .any(|e| e.table_name == "batch_run" && e.message.as_deref() == Some("completed")));
}
