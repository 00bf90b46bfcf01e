//! Store tests against a real SQLite database.
//!
//! These cover the guarantees the handlers lean on: conditional status
//! transitions, membership sets that only accept queuecalls in the matching
//! status, and newest-first paging. Creation stamps come from the store,
//! so ordering tests space their inserts out.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use uuid::Uuid;

use rvoip_queue_manager::cache::MemoryCache;
use rvoip_queue_manager::database::{Database, QueueFilter, QueuecallFilter, SqliteDatabase};
use rvoip_queue_manager::error::QueueError;
use rvoip_queue_manager::models::{
    Address, AddressType, Execute, Queue, Queuecall, QueuecallStatus, ReferenceType, RoutingMethod,
};
use rvoip_queue_manager::util::default_timestamp;

async fn create_test_db() -> (SqliteDatabase, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("queue.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    let db = SqliteDatabase::new(&db_url, 4, Arc::new(MemoryCache::new()))
        .await
        .expect("Failed to create test database");

    (db, temp_dir)
}

fn new_queue(customer_id: Uuid) -> Queue {
    let now = Utc::now();
    Queue {
        id: Uuid::new_v4(),
        customer_id,
        name: "support".to_string(),
        detail: "support line".to_string(),
        routing_method: RoutingMethod::Random,
        tag_ids: vec![Uuid::new_v4()],
        execute: Execute::Stop,
        wait_flow_id: Uuid::new_v4(),
        wait_timeout: 60000,
        service_timeout: 0,
        wait_queuecall_ids: vec![],
        service_queuecall_ids: vec![],
        total_incoming_count: 0,
        total_serviced_count: 0,
        total_abandoned_count: 0,
        tm_create: now,
        tm_update: now,
        tm_delete: default_timestamp(),
    }
}

fn new_queuecall(queue: &Queue) -> Queuecall {
    let now = Utc::now();
    Queuecall {
        id: Uuid::new_v4(),
        customer_id: queue.customer_id,
        queue_id: queue.id,
        reference_type: ReferenceType::Call,
        reference_id: Uuid::new_v4(),
        reference_activeflow_id: Uuid::new_v4(),
        forward_action_id: Uuid::new_v4(),
        exit_action_id: Uuid::new_v4(),
        confbridge_id: Uuid::new_v4(),
        source: Address::new(AddressType::Tel, "+821100000001"),
        routing_method: queue.routing_method,
        tag_ids: queue.tag_ids.clone(),
        status: QueuecallStatus::Initiating,
        service_agent_id: Uuid::nil(),
        timeout_wait: queue.wait_timeout,
        timeout_service: queue.service_timeout,
        duration_waiting: 0,
        duration_service: 0,
        tm_create: now,
        tm_service: default_timestamp(),
        tm_update: now,
        tm_end: default_timestamp(),
        tm_delete: default_timestamp(),
    }
}

#[tokio::test]
async fn test_new_queue_has_empty_collections() {
    let (db, _temp_dir) = create_test_db().await;
    let queue = new_queue(Uuid::new_v4());

    db.queue_create(&queue).await.unwrap();
    let stored = db.queue_get(queue.id).await.unwrap();

    assert_eq!(stored.name, "support");
    assert_eq!(stored.tag_ids, queue.tag_ids);
    assert!(stored.wait_queuecall_ids.is_empty());
    assert!(stored.service_queuecall_ids.is_empty());
    assert_eq!(stored.total_incoming_count, 0);
    assert!(!stored.is_deleted());
}

#[tokio::test]
async fn test_get_unknown_queue_is_not_found() {
    let (db, _temp_dir) = create_test_db().await;
    let result = db.queue_get(Uuid::new_v4()).await;
    assert!(matches!(result, Err(QueueError::NotFound(_))));
}

#[tokio::test]
async fn test_wait_set_requires_waiting_status() {
    let (db, _temp_dir) = create_test_db().await;
    let queue = new_queue(Uuid::new_v4());
    db.queue_create(&queue).await.unwrap();
    let qc = new_queuecall(&queue);
    db.queuecall_create(&qc).await.unwrap();

    // still initiating
    db.queue_add_wait_queuecall_id(queue.id, qc.id).await.unwrap();
    assert!(db.queue_get(queue.id).await.unwrap().wait_queuecall_ids.is_empty());

    db.queuecall_set_status_waiting(qc.id).await.unwrap();
    db.queue_add_wait_queuecall_id(queue.id, qc.id).await.unwrap();
    db.queue_add_wait_queuecall_id(queue.id, qc.id).await.unwrap();

    let stored = db.queue_get(queue.id).await.unwrap();
    assert_eq!(stored.wait_queuecall_ids, vec![qc.id]);
    assert_eq!(stored.total_incoming_count, 1);
}

#[tokio::test]
async fn test_incoming_counted_when_claimed_before_wait_add() {
    let (db, _temp_dir) = create_test_db().await;
    let queue = new_queue(Uuid::new_v4());
    db.queue_create(&queue).await.unwrap();
    let qc = new_queuecall(&queue);
    db.queuecall_create(&qc).await.unwrap();

    db.queuecall_set_status_waiting(qc.id).await.unwrap();
    db.queuecall_set_status_connecting(qc.id, Uuid::new_v4()).await.unwrap();
    db.queue_add_wait_queuecall_id(queue.id, qc.id).await.unwrap();

    let stored = db.queue_get(queue.id).await.unwrap();
    assert!(stored.wait_queuecall_ids.is_empty());
    assert_eq!(stored.total_incoming_count, 1);
}

#[tokio::test]
async fn test_service_set_moves_out_of_wait_set() {
    let (db, _temp_dir) = create_test_db().await;
    let queue = new_queue(Uuid::new_v4());
    db.queue_create(&queue).await.unwrap();
    let qc = new_queuecall(&queue);
    db.queuecall_create(&qc).await.unwrap();

    db.queuecall_set_status_waiting(qc.id).await.unwrap();
    db.queue_add_wait_queuecall_id(queue.id, qc.id).await.unwrap();
    db.queuecall_set_status_connecting(qc.id, Uuid::new_v4()).await.unwrap();
    db.queuecall_set_status_service(qc.id, 1500, Utc::now()).await.unwrap();
    db.queue_add_service_queuecall_id(queue.id, qc.id).await.unwrap();

    let stored = db.queue_get(queue.id).await.unwrap();
    assert!(stored.wait_queuecall_ids.is_empty());
    assert_eq!(stored.service_queuecall_ids, vec![qc.id]);
    assert_eq!(stored.total_serviced_count, 1);

    let stored_qc = db.queuecall_get(qc.id).await.unwrap();
    assert_eq!(stored_qc.status, QueuecallStatus::Service);
    assert_eq!(stored_qc.duration_waiting, 1500);
}

#[tokio::test]
async fn test_abandoned_leaves_both_sets_and_counts() {
    let (db, _temp_dir) = create_test_db().await;
    let queue = new_queue(Uuid::new_v4());
    db.queue_create(&queue).await.unwrap();
    let qc = new_queuecall(&queue);
    db.queuecall_create(&qc).await.unwrap();

    db.queuecall_set_status_waiting(qc.id).await.unwrap();
    db.queue_add_wait_queuecall_id(queue.id, qc.id).await.unwrap();
    db.queuecall_set_status_abandoned(qc.id, 3000, Utc::now()).await.unwrap();
    db.queue_add_abandoned_queuecall_id(queue.id, qc.id).await.unwrap();

    let stored = db.queue_get(queue.id).await.unwrap();
    assert!(stored.wait_queuecall_ids.is_empty());
    assert!(stored.service_queuecall_ids.is_empty());
    assert_eq!(stored.total_abandoned_count, 1);
}

#[tokio::test]
async fn test_status_guard_rejects_illegal_transition() {
    let (db, _temp_dir) = create_test_db().await;
    let queue = new_queue(Uuid::new_v4());
    db.queue_create(&queue).await.unwrap();
    let qc = new_queuecall(&queue);
    db.queuecall_create(&qc).await.unwrap();

    // initiating -> service skips connecting
    let result = db.queuecall_set_status_service(qc.id, 0, Utc::now()).await;
    assert!(matches!(result, Err(QueueError::InvalidState(_))));

    db.queuecall_set_status_waiting(qc.id).await.unwrap();
    db.queuecall_set_status_abandoned(qc.id, 0, Utc::now()).await.unwrap();

    // terminal is final
    let result = db.queuecall_set_status_waiting(qc.id).await;
    assert!(matches!(result, Err(QueueError::InvalidState(_))));
    assert_eq!(
        db.queuecall_get(qc.id).await.unwrap().status,
        QueuecallStatus::Abandoned
    );
}

#[tokio::test]
async fn test_only_one_connecting_claim_wins() {
    let (db, _temp_dir) = create_test_db().await;
    let queue = new_queue(Uuid::new_v4());
    db.queue_create(&queue).await.unwrap();
    let qc = new_queuecall(&queue);
    db.queuecall_create(&qc).await.unwrap();
    db.queuecall_set_status_waiting(qc.id).await.unwrap();

    let first = Uuid::new_v4();
    let second = Uuid::new_v4();
    db.queuecall_set_status_connecting(qc.id, first).await.unwrap();
    let result = db.queuecall_set_status_connecting(qc.id, second).await;
    assert!(matches!(result, Err(QueueError::InvalidState(_))));

    assert_eq!(db.queuecall_get(qc.id).await.unwrap().service_agent_id, first);
}

#[tokio::test]
async fn test_oldest_waiting_is_first_created() {
    let (db, _temp_dir) = create_test_db().await;
    let queue = new_queue(Uuid::new_v4());
    db.queue_create(&queue).await.unwrap();

    let older = new_queuecall(&queue);
    let newer = new_queuecall(&queue);
    for qc in [&older, &newer] {
        db.queuecall_create(qc).await.unwrap();
        db.queuecall_set_status_waiting(qc.id).await.unwrap();
        tokio::time::sleep(StdDuration::from_millis(5)).await;
    }

    assert_eq!(db.queuecall_get_oldest_waiting(queue.id).await.unwrap().id, older.id);

    db.queuecall_set_status_abandoned(older.id, 0, Utc::now()).await.unwrap();
    assert_eq!(db.queuecall_get_oldest_waiting(queue.id).await.unwrap().id, newer.id);

    db.queuecall_set_status_abandoned(newer.id, 0, Utc::now()).await.unwrap();
    let result = db.queuecall_get_oldest_waiting(queue.id).await;
    assert!(matches!(result, Err(QueueError::NotFound(_))));
}

#[tokio::test]
async fn test_queue_list_pages_newest_first() {
    let (db, _temp_dir) = create_test_db().await;
    let customer_id = Uuid::new_v4();

    let mut ids = Vec::new();
    for _ in 0..3 {
        let queue = new_queue(customer_id);
        db.queue_create(&queue).await.unwrap();
        ids.push(queue.id);
        tokio::time::sleep(StdDuration::from_millis(5)).await;
    }
    db.queue_create(&new_queue(Uuid::new_v4())).await.unwrap();

    let filter = QueueFilter::new().with_customer_id(customer_id).with_deleted(false);
    let first = db.queue_list(2, None, filter.clone()).await.unwrap();
    assert_eq!(first.iter().map(|q| q.id).collect::<Vec<_>>(), vec![ids[2], ids[1]]);

    let token = first.last().map(|q| q.tm_create);
    let second = db.queue_list(2, token, filter).await.unwrap();
    assert_eq!(second.iter().map(|q| q.id).collect::<Vec<_>>(), vec![ids[0]]);
}

#[tokio::test]
async fn test_deleted_queue_hidden_by_filter() {
    let (db, _temp_dir) = create_test_db().await;
    let customer_id = Uuid::new_v4();
    let queue = new_queue(customer_id);
    db.queue_create(&queue).await.unwrap();

    db.queue_delete(queue.id).await.unwrap();
    assert!(db.queue_get(queue.id).await.unwrap().is_deleted());

    let live = db
        .queue_list(10, None, QueueFilter::new().with_customer_id(customer_id).with_deleted(false))
        .await
        .unwrap();
    assert!(live.is_empty());
}

#[tokio::test]
async fn test_queuecall_by_reference_and_filter() {
    let (db, _temp_dir) = create_test_db().await;
    let queue = new_queue(Uuid::new_v4());
    db.queue_create(&queue).await.unwrap();
    let qc = new_queuecall(&queue);
    db.queuecall_create(&qc).await.unwrap();

    let by_reference = db.queuecall_get_by_reference_id(qc.reference_id).await.unwrap();
    assert_eq!(by_reference.id, qc.id);

    let filter = QueuecallFilter::new()
        .with_queue_id(queue.id)
        .with_status(QueuecallStatus::Initiating);
    let listed = db.queuecall_list(10, None, filter).await.unwrap();
    assert_eq!(listed.len(), 1);

    let filter = QueuecallFilter::new()
        .with_queue_id(queue.id)
        .with_status(QueuecallStatus::Waiting);
    assert!(db.queuecall_list(10, None, filter).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_in_memory_store_starts_empty() {
    let db = SqliteDatabase::new_in_memory(Arc::new(MemoryCache::new()))
        .await
        .unwrap();
    let queues = db.queue_list(10, None, QueueFilter::new()).await.unwrap();
    assert!(queues.is_empty());
}
